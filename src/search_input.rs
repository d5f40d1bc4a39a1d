use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// What a key did to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// The text changed.
    Edited,
    /// Only the cursor moved, or the key was not for us.
    Unchanged,
    Cancelled,
}

/// Single line text field with a character based cursor.
#[derive(Debug, Default, Clone)]
pub struct SearchInput {
    value: String,
    cursor: usize,
}

impl SearchInput {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn read(&mut self, key: KeyEvent) -> InputOutcome {
        let outcome = match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => InputOutcome::Cancelled,
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.move_to(self.cursor.saturating_sub(1)),
            (KeyCode::Right, _) => self.move_to(self.cursor + 1),
            (KeyCode::Home, _) => self.move_to(0),
            (KeyCode::End, _) => self.move_to(usize::MAX),
            (KeyCode::Char(chr), KeyModifiers::NONE | KeyModifiers::SHIFT) => self.insert(chr),
            _ => InputOutcome::Unchanged,
        };
        trace!("Search input {:?} -> {:?} {:?}", key.code, outcome, self.value);
        outcome
    }

    fn insert(&mut self, chr: char) -> InputOutcome {
        let at = self.byte_pos();
        self.value.insert(at, chr);
        self.cursor += 1;
        InputOutcome::Edited
    }

    fn backspace(&mut self) -> InputOutcome {
        if self.cursor == 0 {
            return InputOutcome::Unchanged;
        }
        self.cursor -= 1;
        let at = self.byte_pos();
        self.value.remove(at);
        InputOutcome::Edited
    }

    fn delete(&mut self) -> InputOutcome {
        if self.cursor >= self.len() {
            return InputOutcome::Unchanged;
        }
        let at = self.byte_pos();
        self.value.remove(at);
        InputOutcome::Edited
    }

    fn move_to(&mut self, pos: usize) -> InputOutcome {
        self.cursor = pos.min(self.len());
        InputOutcome::Unchanged
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_pos(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut SearchInput, s: &str) {
        for chr in s.chars() {
            input.read(key(KeyCode::Char(chr)));
        }
    }

    #[test]
    fn typing_and_backspace() {
        let mut input = SearchInput::default();
        type_str(&mut input, "kim");
        assert_eq!(input.value(), "kim");
        assert_eq!(input.read(key(KeyCode::Backspace)), InputOutcome::Edited);
        assert_eq!(input.value(), "ki");
        assert_eq!(input.cursor(), 2);
    }

    #[test]
    fn editing_in_the_middle_of_multibyte_text() {
        let mut input = SearchInput::default();
        type_str(&mut input, "자료구조");
        input.read(key(KeyCode::Left));
        input.read(key(KeyCode::Left));
        type_str(&mut input, "X");
        assert_eq!(input.value(), "자료X구조");
        input.read(key(KeyCode::Delete));
        assert_eq!(input.value(), "자료X조");
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut input = SearchInput::default();
        assert_eq!(input.read(key(KeyCode::Backspace)), InputOutcome::Unchanged);
        input.read(key(KeyCode::Right));
        assert_eq!(input.cursor(), 0);
        type_str(&mut input, "ab");
        input.read(key(KeyCode::Home));
        assert_eq!(input.cursor(), 0);
        input.read(key(KeyCode::End));
        assert_eq!(input.cursor(), 2);
    }

    #[test]
    fn control_chords_are_not_text() {
        let mut input = SearchInput::default();
        let chord = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(input.read(chord), InputOutcome::Unchanged);
        assert_eq!(input.value(), "");
        assert_eq!(input.read(key(KeyCode::Esc)), InputOutcome::Cancelled);
    }
}
