use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Widget},
};

use crate::model::{FilterView, LineKind, LineView, Model, PopupView, UIData};

pub const BORDER_WIDTH: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;
/// Expand marker in front of master rows.
pub const MARKER_WIDTH: u16 = 2;
pub const DETAIL_INDENT: u16 = 4;
pub const COLUMN_SPACING: u16 = 1;

pub fn draw(model: &Model, frame: &mut Frame) {
    let data = model.get_uidata();
    let area = frame.area();
    frame.render_widget(TableView { data }, area);

    match &data.popup {
        Some(PopupView::Help(text)) => render_help(frame, area, text),
        Some(PopupView::Filter(view)) => render_filter(frame, area, view),
        None => {}
    }
}

struct TableView<'a> {
    data: &'a UIData,
}

impl Widget for TableView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [table_area, status_area] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(area);

        let title = Line::from(format!(" {} ", self.data.name).bold());
        let instructions = Line::from(vec![
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<Q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.right_aligned())
            .border_set(border::THICK);
        let inner = block.inner(table_area);
        block.render(table_area, buf);

        if inner.height > 0 {
            let header = Rect::new(inner.x, inner.y, inner.width, TABLE_HEADER_HEIGHT);
            render_line(&self.data.header, header, None, buf);
        }
        for (idx, line) in self.data.lines.iter().enumerate() {
            let y = inner
                .y
                .saturating_add(TABLE_HEADER_HEIGHT)
                .saturating_add(u16::try_from(idx).unwrap_or(u16::MAX));
            if y >= inner.bottom() {
                break;
            }
            let selected = if line.selected {
                self.data.selected_cell
            } else {
                None
            };
            render_line(line, Rect::new(inner.x, y, inner.width, 1), selected, buf);
        }

        render_status(self.data, status_area, buf);
    }
}

fn line_style(kind: LineKind) -> Style {
    match kind {
        LineKind::Header => Style::new().bold().underlined(),
        LineKind::Master | LineKind::Flat => Style::new(),
        LineKind::DetailHeader => Style::new().italic().dark_gray(),
        LineKind::Detail => Style::new().gray(),
    }
}

fn render_line(line: &LineView, area: Rect, selected_cell: Option<usize>, buf: &mut Buffer) {
    let mut style = line_style(line.kind);
    if line.selected {
        style = style.reversed();
        buf.set_style(area, Style::new().reversed());
    }
    buf.set_stringn(
        area.x,
        area.y,
        &line.marker,
        usize::from(line.indent.min(area.width)),
        style,
    );

    let mut x = area.x.saturating_add(line.indent);
    for (idx, cell) in line.cells.iter().enumerate() {
        if x >= area.right() {
            break;
        }
        let width = cell.width.min(area.right() - x);
        let mut cell_style = style;
        if cell.marked {
            cell_style = cell_style.yellow();
        }
        if selected_cell == Some(idx) {
            cell_style = cell_style.not_reversed().black().on_cyan().bold();
        }
        buf.set_style(Rect::new(x, area.y, width, 1), cell_style);
        buf.set_stringn(
            x,
            area.y,
            fit(&cell.text, cell.width),
            usize::from(width),
            cell_style,
        );
        x = x.saturating_add(cell.width).saturating_add(COLUMN_SPACING);
    }
}

/// Cuts `text` to `width` display cells, marking the cut with an ellipsis.
fn fit(text: &str, width: u16) -> String {
    let width = usize::from(width);
    if Span::raw(text).width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for chr in text.chars() {
        let w = Span::raw(chr.to_string()).width();
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(chr);
    }
    out.push('…');
    out
}

fn render_status(data: &UIData, area: Rect, buf: &mut Buffer) {
    let count_width = u16::try_from(Span::raw(data.count.as_str()).width())
        .unwrap_or(area.width)
        .saturating_add(1);
    let [left, right] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(count_width)]).areas(area);

    Paragraph::new(Line::from(format!(" {}", data.status_message))).render(left, buf);
    Paragraph::new(Line::from(data.count.as_str().blue().bold()))
        .right_aligned()
        .render(right, buf);
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [col] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    col
}

fn render_help(frame: &mut Frame, area: Rect, text: &str) {
    let width = text
        .lines()
        .map(|l| Span::raw(l).width())
        .max()
        .unwrap_or(0)
        .saturating_add(4);
    let height = text.lines().count().saturating_add(2);
    let popup = popup_area(
        area,
        u16::try_from(width).unwrap_or(area.width),
        u16::try_from(height).unwrap_or(area.height),
    );

    let block = Block::bordered()
        .title(Line::from(" Help ".bold()).centered())
        .border_set(border::THICK);
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(text).block(block), popup);
}

fn render_filter(frame: &mut Frame, area: Rect, view: &FilterView) {
    const SEARCH_PROMPT: &str = "Search: ";

    let mut lines = vec![
        Line::from(vec![SEARCH_PROMPT.bold(), Span::raw(view.search.as_str())]),
        Line::from(format!("{} values", view.matches).dark_gray()),
    ];
    for (idx, (value, accepted)) in view.items.iter().enumerate() {
        let mark = if *accepted { "[x] " } else { "[ ] " };
        let mut line = Line::from(format!("{mark}{value}"));
        if view.selected == Some(idx) {
            line = line.reversed();
        }
        lines.push(line);
    }

    let content_width = lines
        .iter()
        .map(Line::width)
        .chain([Span::raw(view.title.as_str()).width()])
        .max()
        .unwrap_or(0)
        .max(30)
        .saturating_add(2);
    let popup = popup_area(
        area,
        u16::try_from(content_width).unwrap_or(area.width),
        u16::try_from(lines.len().saturating_add(2)).unwrap_or(area.height),
    );

    let block = Block::bordered()
        .title(Line::from(view.title.as_str().bold()).centered())
        .title_bottom(Line::from(" Enter toggle  Ctrl-d clear  Esc close ").centered())
        .border_set(border::THICK);
    let inner = block.inner(popup);
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);

    let before: String = view.search.chars().take(view.search_cursor).collect();
    let cursor_x = Span::raw(SEARCH_PROMPT).width() + Span::raw(before).width();
    frame.set_cursor_position((
        inner
            .x
            .saturating_add(u16::try_from(cursor_x).unwrap_or(inner.width)),
        inner.y,
    ));
}
