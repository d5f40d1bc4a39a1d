use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, SVConfig, SVError};
use crate::model::Model;
use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &SVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, SVError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    handle_key(key)
                }
            }
            Event::Mouse(mouse) => handle_mouse(mouse, model.is_capturing()),
            Event::Resize(width, height) => Some(Message::Resize(width, height)),
            _ => None,
        };
        Ok(message)
    }
}

fn handle_key(key: KeyEvent) -> Option<Message> {
    let message = match key.code {
        KeyCode::Char('q') => Some(Message::Quit),
        KeyCode::Esc => Some(Message::Exit),
        KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
        KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
        KeyCode::PageUp => Some(Message::MovePageUp),
        KeyCode::PageDown => Some(Message::MovePageDown),
        KeyCode::Home | KeyCode::Char('g') => Some(Message::MoveBeginning),
        KeyCode::End | KeyCode::Char('G') => Some(Message::MoveEnd),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Message::ToggleExpand),
        KeyCode::Char('s') => Some(Message::SortColumn),
        KeyCode::Char('f') => Some(Message::OpenFilter),
        KeyCode::Char('c') => Some(Message::ClearFilter),
        KeyCode::Char('v') => Some(Message::ToggleView),
        KeyCode::Char('x') => Some(Message::ToggleColumnVisibility),
        KeyCode::Char('<') => Some(Message::NarrowColumn),
        KeyCode::Char('>') => Some(Message::WidenColumn),
        KeyCode::Char('y') => Some(Message::CopyRow),
        KeyCode::Char('r') => Some(Message::Reload),
        KeyCode::Char('?') => Some(Message::Help),
        _ => None,
    };
    trace!("Mapped: {key:?} => {message:?}");
    message
}

/// Drag and release only matter while a resize holds the pointer.
fn handle_mouse(mouse: MouseEvent, capturing: bool) -> Option<Message> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(Message::BeginResize {
            x: mouse.column,
            y: mouse.row,
        }),
        MouseEventKind::Drag(MouseButton::Left) if capturing => {
            Some(Message::DragResize { x: mouse.column })
        }
        MouseEventKind::Up(MouseButton::Left) if capturing => Some(Message::EndResize),
        MouseEventKind::ScrollDown => Some(Message::MoveDown),
        MouseEventKind::ScrollUp => Some(Message::MoveUp),
        _ => None,
    }
}
