use arboard::Clipboard;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

use crate::domain::{HELP_TEXT, Message, Preset, SVConfig, SVError, Status};
use crate::engine::{Scope, ShownRows, TableEngine, TableVariant};
use crate::record::{FieldAccess, Record};
use crate::resize::PointerCapture;
use crate::schema::{ColumnSet, ColumnSpec, Schema};
use crate::search_input::{InputOutcome, SearchInput};
use crate::source::{LoadedTable, Loader};
use crate::ui::{
    BORDER_WIDTH, COLUMN_SPACING, DETAIL_INDENT, MARKER_WIDTH, STATUSLINE_HEIGHT,
    TABLE_HEADER_HEIGHT,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    FILTER,
    POPUP,
}

/// One line of the table body, before it is turned into text.
#[derive(Debug, Clone, PartialEq)]
enum DisplayRow {
    Master { key: String, record: Arc<Record>, expanded: bool },
    DetailHeader { key: String },
    Detail { key: String, record: Arc<Record> },
    Flat { record: Arc<Record> },
}

impl DisplayRow {
    fn column_set(&self) -> ColumnSet {
        match self {
            DisplayRow::Master { .. } => ColumnSet::Master,
            DisplayRow::DetailHeader { .. } | DisplayRow::Detail { .. } => ColumnSet::Detail,
            DisplayRow::Flat { .. } => ColumnSet::Total,
        }
    }

    fn scope(&self) -> Scope {
        match self {
            DisplayRow::Master { .. } => Scope::Master,
            DisplayRow::DetailHeader { key } | DisplayRow::Detail { key, .. } => {
                Scope::Detail(key.clone())
            }
            DisplayRow::Flat { .. } => Scope::Total,
        }
    }

    fn group_key(&self) -> Option<&str> {
        match self {
            DisplayRow::Master { key, .. }
            | DisplayRow::DetailHeader { key }
            | DisplayRow::Detail { key, .. } => Some(key),
            DisplayRow::Flat { .. } => None,
        }
    }

    fn record(&self) -> Option<&Arc<Record>> {
        match self {
            DisplayRow::Master { record, .. }
            | DisplayRow::Detail { record, .. }
            | DisplayRow::Flat { record } => Some(record),
            DisplayRow::DetailHeader { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Header,
    Master,
    DetailHeader,
    Detail,
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub text: String,
    pub width: u16,
    /// Header cell of a sorted or filtered column.
    pub marked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineView {
    pub kind: LineKind,
    pub indent: u16,
    pub marker: String,
    pub cells: Vec<CellView>,
    pub selected: bool,
}

impl LineView {
    fn empty() -> Self {
        LineView {
            kind: LineKind::Header,
            indent: 0,
            marker: String::new(),
            cells: Vec::new(),
            selected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterView {
    pub title: String,
    pub search: String,
    pub search_cursor: usize,
    /// Visible window of (value, accepted).
    pub items: Vec<(String, bool)>,
    pub selected: Option<usize>,
    pub matches: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupView {
    Help(String),
    Filter(FilterView),
}

/// Border between two header cells that can be dragged.
#[derive(Debug, Clone, PartialEq)]
struct HitZone {
    x: u16,
    y: u16,
    set: ColumnSet,
    left: String,
    right: String,
}

struct FilterPopup {
    scope: Scope,
    column: String,
    label: String,
    search: SearchInput,
    candidates: Vec<String>,
    curser: usize,
    offset: usize,
}

pub struct UIData {
    pub name: String,
    pub header: LineView,
    pub lines: Vec<LineView>,
    /// Index of the selected cell inside the selected line.
    pub selected_cell: Option<usize>,
    pub count: String,
    pub status_message: String,
    pub popup: Option<PopupView>,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            header: LineView::empty(),
            lines: Vec::new(),
            selected_cell: None,
            count: String::new(),
            status_message: String::new(),
            popup: None,
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: u16,
    pub height: u16,
    pub table_x: u16,
    pub header_y: u16,
    pub body_y: u16,
    pub table_width: u16,
    pub table_height: u16,
}

impl UILayout {
    pub fn from_values(ui_width: u16, ui_height: u16) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_x: BORDER_WIDTH,
            header_y: BORDER_WIDTH,
            body_y: BORDER_WIDTH + TABLE_HEADER_HEIGHT,
            table_width: ui_width.saturating_sub(2 * BORDER_WIDTH),
            table_height: ui_height
                .saturating_sub(2 * BORDER_WIDTH + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: SVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    engine: TableEngine<Arc<Record>>,
    capture: PointerCapture,
    source: Option<PathBuf>,
    name: String,
    headers: Vec<String>,
    variant: TableVariant,
    rows: Vec<DisplayRow>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    filter_popup: Option<FilterPopup>,
    hit_zones: Vec<HitZone>,
    loader: Loader,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
}

impl Model {
    pub fn init(config: &SVConfig, ui_width: u16, ui_height: u16) -> Result<Self, SVError> {
        let capture = PointerCapture::new();
        let schema = Self::preset_schema(config);
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            engine: TableEngine::new(schema, capture.clone()),
            capture,
            source: None,
            name: String::new(),
            headers: Vec::new(),
            variant: config.view,
            rows: Vec::new(),
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            filter_popup: None,
            hit_zones: Vec::new(),
            loader: Loader::new(),
            clipboard: None,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            status_message: "Started seatview!".to_string(),
        };
        model.refresh();
        Ok(model)
    }

    /// Schema for the configured preset. The auto preset starts empty and is
    /// inferred once a file has been read.
    fn preset_schema(config: &SVConfig) -> Schema {
        let mut schema = match config.preset {
            Preset::Subjects => Schema::subjects(),
            Preset::Seats => Schema::seats(),
            Preset::Auto => Schema {
                name: "auto".into(),
                group_by: String::new(),
                master: Vec::new(),
                detail: Vec::new(),
                total: Vec::new(),
            },
        };
        if let Some(group_by) = &config.group_by {
            schema.group_by = group_by.clone();
        }
        schema
    }

    fn schema_for(&self, table: &LoadedTable) -> Result<Schema, SVError> {
        let schema = match self.config.preset {
            Preset::Auto => {
                let group_by = self
                    .config
                    .group_by
                    .clone()
                    .or_else(|| table.headers.first().cloned())
                    .unwrap_or_default();
                Schema::infer(
                    &table.headers,
                    &table.records,
                    &group_by,
                    self.config.master_columns,
                    self.config.max_column_width,
                )
            }
            _ => Self::preset_schema(&self.config),
        };
        if !table.headers.contains(&schema.group_by) {
            return Err(SVError::UnknownColumn(schema.group_by));
        }
        Ok(schema)
    }

    pub fn load(&mut self, path: PathBuf) {
        self.loader.request(path.clone());
        self.source = Some(path);
        self.status = Status::LOADING;
        self.set_status_message("Loading ...");
    }

    fn reload(&mut self) {
        match self.source.clone() {
            Some(path) => self.load(path),
            None => self.set_status_message("Nothing to reload"),
        }
    }

    /// Applies a finished load, if any. Returns whether the view changed.
    fn poll_loader(&mut self) -> bool {
        let Some(response) = self.loader.poll() else {
            return false;
        };
        match response.result {
            Ok(table) => self.apply_loaded(table),
            Err(e) => {
                error!("Loading {} failed: {:?}", response.path.display(), e);
                self.status = if self.engine.records().is_empty() {
                    Status::EMPTY
                } else {
                    Status::READY
                };
                self.set_status_message(format!("Loading failed: {e}"));
            }
        }
        true
    }

    fn apply_loaded(&mut self, table: LoadedTable) {
        let schema = match self.schema_for(&table) {
            Ok(schema) => schema,
            Err(e) => {
                error!("Can not show {}: {:?}", table.name, e);
                self.status = Status::READY;
                self.set_status_message(format!("Can not show {}: {e}", table.name));
                return;
            }
        };
        for id in schema.field_ids() {
            if !table.headers.iter().any(|h| h == id) {
                debug!("Column {id} is not in {}", table.name);
            }
        }
        if &schema != self.engine.schema() {
            debug!("Switching schema to {}", schema.name);
            self.engine = TableEngine::new(schema, self.capture.clone());
        }

        let nrows = table.records.len();
        self.engine.replace_records(table.records);
        self.headers = table.headers;
        self.name = table.name;
        self.curser_row = 0;
        self.offset_row = 0;
        self.status = Status::READY;
        info!("Showing {} rows from {}", nrows, self.name);
        self.set_status_message(format!("Loaded {nrows} rows"));
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FILTER
    }

    /// True while a resize gesture holds the pointer.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_held()
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn quit(&mut self) {
        self.engine.end_resize();
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SVError> {
        let mut dirty = self.poll_loader();

        if let Some(msg) = message {
            dirty = true;
            match (self.modus, msg) {
                (_, Message::Resize(width, height)) => self.ui_resize(width, height),
                // A release ends the gesture whatever is on screen.
                (_, Message::EndResize) => {
                    self.engine.end_resize();
                }
                (Modus::TABLE, msg) => self.handle_table_message(msg),
                (Modus::FILTER, Message::RawKey(key)) => self.filter_input(key),
                (Modus::FILTER, Message::Exit) => self.close_filter(),
                (Modus::POPUP, Message::Quit) => self.quit(),
                (Modus::POPUP, Message::Exit | Message::Help) => self.close_popup(),
                (modus, msg) => trace!("Ignoring {msg:?} in {modus:?}"),
            }
        }

        if dirty {
            self.refresh();
        }
        Ok(())
    }

    fn handle_table_message(&mut self, msg: Message) {
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.move_selection_up(1),
            Message::MoveDown => self.move_selection_down(1),
            Message::MoveLeft => self.move_selection_left(),
            Message::MoveRight => self.move_selection_right(),
            Message::MovePageUp => self.move_selection_up(self.page_size()),
            Message::MovePageDown => self.move_selection_down(self.page_size()),
            Message::MoveBeginning => self.curser_row = 0,
            Message::MoveEnd => self.curser_row = self.rows.len().saturating_sub(1),
            Message::ToggleExpand => self.toggle_expand(),
            Message::SortColumn => self.sort_current_column(),
            Message::OpenFilter => self.open_filter(),
            Message::ClearFilter => self.clear_current_filter(),
            Message::ToggleView => self.toggle_view(),
            Message::ToggleColumnVisibility => self.toggle_column_visibility(),
            Message::NarrowColumn => self.nudge_current_column(-1),
            Message::WidenColumn => self.nudge_current_column(1),
            Message::CopyRow => self.copy_row(),
            Message::Reload => self.reload(),
            Message::Help => self.show_help(),
            Message::BeginResize { x, y } => self.begin_resize(x, y),
            Message::DragResize { x } => {
                self.engine.drag_resize(i32::from(x));
            }
            Message::Exit | Message::EndResize | Message::RawKey(_) | Message::Resize(..) => {}
        }
    }

    fn ui_resize(&mut self, width: u16, height: u16) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
    }

    fn page_size(&self) -> usize {
        usize::from(self.uilayout.table_height.max(1))
    }

    // -------------------- Current selection ---------------------- //

    fn current_row(&self) -> Option<&DisplayRow> {
        self.rows.get(self.curser_row)
    }

    fn current_set(&self) -> ColumnSet {
        self.current_row()
            .map(DisplayRow::column_set)
            .unwrap_or(match self.variant {
                TableVariant::Grouped => ColumnSet::Master,
                TableVariant::Total => ColumnSet::Total,
            })
    }

    fn current_scope(&self) -> Option<Scope> {
        self.current_row().map(DisplayRow::scope)
    }

    fn current_column(&self) -> Option<&ColumnSpec> {
        let columns = self.engine.visible_columns(self.current_set());
        let idx = self.curser_column.min(columns.len().saturating_sub(1));
        columns.get(idx).copied()
    }

    fn select_group(&mut self, key: &str) {
        if let Some(idx) = self
            .rows
            .iter()
            .position(|r| matches!(r, DisplayRow::Master { key: k, .. } if k == key))
        {
            self.curser_row = idx;
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn move_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
    }

    fn move_selection_down(&mut self, size: usize) {
        self.curser_row = (self.curser_row + size).min(self.rows.len().saturating_sub(1));
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_selection_right(&mut self) {
        let ncols = self.engine.visible_columns(self.current_set()).len();
        if self.curser_column + 1 < ncols {
            self.curser_column += 1;
        }
    }

    fn toggle_expand(&mut self) {
        let Some(key) = self
            .current_row()
            .and_then(DisplayRow::group_key)
            .map(str::to_string)
        else {
            return;
        };
        let expanded = self.engine.toggle_expand(&key);
        trace!("Group {key} expanded: {expanded}");
        self.rebuild_rows();
        self.select_group(&key);
    }

    fn sort_current_column(&mut self) {
        let (Some(scope), Some(column)) = (
            self.current_scope(),
            self.current_column().map(|c| c.id().to_string()),
        ) else {
            return;
        };
        let key = self
            .current_row()
            .and_then(DisplayRow::group_key)
            .map(str::to_string);

        if self.engine.sort_by(&scope, &column) {
            self.rebuild_rows();
            if let (Scope::Master, Some(key)) = (&scope, key) {
                self.select_group(&key);
            }
            self.set_status_message(format!("Sorted by {column}"));
        } else {
            self.set_status_message(format!("Column {column} can not be sorted"));
        }
    }

    fn clear_current_filter(&mut self) {
        if let (Some(scope), Some(column)) = (
            self.current_scope(),
            self.current_column().map(|c| c.id().to_string()),
        ) {
            self.engine.clear_filter(&scope, &column);
            self.set_status_message(format!("Cleared filter on {column}"));
        }
    }

    fn toggle_view(&mut self) {
        self.variant = self.variant.toggled();
        self.curser_row = 0;
        self.offset_row = 0;
        self.curser_column = 0;
        self.offset_column = 0;
        debug!("Switched to {:?} view", self.variant);
    }

    fn toggle_column_visibility(&mut self) {
        if self.current_set() != ColumnSet::Total {
            self.set_status_message("Columns can only be hidden in the total view");
            return;
        }
        if let Some(column) = self.current_column().map(|c| c.id().to_string()) {
            let visible = self.engine.toggle_column_visibility(&column);
            self.set_status_message(if visible {
                format!("Column {column} shown")
            } else {
                format!("Column {column} hidden")
            });
        }
    }

    fn nudge_current_column(&mut self, delta: i32) {
        let set = self.current_set();
        if let Some(column) = self.current_column().map(|c| c.id().to_string()) {
            self.engine.nudge_width(set, &column, delta);
        }
    }

    fn begin_resize(&mut self, x: u16, y: u16) {
        let hit = self
            .hit_zones
            .iter()
            .find(|z| z.y == y && (z.x == x || z.x == x.saturating_add(1)))
            .cloned();
        if let Some(zone) = hit {
            self.engine
                .begin_resize(zone.set, &zone.left, &zone.right, i32::from(x));
        }
    }

    fn copy_row(&mut self) {
        let line = match self.current_row().and_then(DisplayRow::record) {
            Some(record) => record.to_csv_line(&self.headers),
            None => {
                self.set_status_message("Nothing to copy");
                return;
            }
        };
        trace!("Row content: {}", line);

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("No clipboard available: {:?}", e);
                    self.set_status_message("No clipboard available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(line) {
                Ok(_) => self.set_status_message("Copied row to clipboard"),
                Err(e) => {
                    error!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Copy failed");
                }
            }
        }
    }

    fn show_help(&mut self) {
        self.engine.end_resize();
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    // -------------------- Filter popup ---------------------- //

    fn open_filter(&mut self) {
        let (Some(scope), Some(column)) = (self.current_scope(), self.current_column()) else {
            return;
        };
        if !column.filterable {
            let message = format!("Column {} can not be filtered", column.id());
            self.set_status_message(message);
            return;
        }
        let mut popup = FilterPopup {
            scope,
            column: column.id().to_string(),
            label: column.label.clone(),
            search: SearchInput::default(),
            candidates: Vec::new(),
            curser: 0,
            offset: 0,
        };
        popup.candidates = self
            .engine
            .filter_candidates(&popup.scope, &popup.column, "");
        trace!("Open filter on {} with {} values", popup.column, popup.candidates.len());

        self.engine.end_resize();
        self.filter_popup = Some(popup);
        self.previous_modus = self.modus;
        self.modus = Modus::FILTER;
    }

    fn close_filter(&mut self) {
        self.filter_popup = None;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::FILTER;
    }

    fn filter_rows(&self) -> usize {
        usize::from(self.uilayout.table_height.saturating_sub(4).max(3))
    }

    fn filter_input(&mut self, key: KeyEvent) {
        let visible_rows = self.filter_rows();
        let Some(popup) = self.filter_popup.as_mut() else {
            self.modus = Modus::TABLE;
            return;
        };

        match (key.code, key.modifiers) {
            (KeyCode::Up, _) => popup.curser = popup.curser.saturating_sub(1),
            (KeyCode::Down, _) => {
                if popup.curser + 1 < popup.candidates.len() {
                    popup.curser += 1;
                }
            }
            (KeyCode::Enter, _) => {
                if let Some(value) = popup.candidates.get(popup.curser) {
                    self.engine
                        .toggle_filter_value(&popup.scope, &popup.column, value);
                }
            }
            (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                self.engine.clear_filter(&popup.scope, &popup.column);
            }
            _ => match popup.search.read(key) {
                InputOutcome::Cancelled => {
                    self.close_filter();
                    return;
                }
                InputOutcome::Edited => {
                    popup.candidates = self.engine.filter_candidates(
                        &popup.scope,
                        &popup.column,
                        popup.search.value(),
                    );
                    popup.curser = popup.curser.min(popup.candidates.len().saturating_sub(1));
                }
                InputOutcome::Unchanged => {}
            },
        }

        if popup.curser < popup.offset {
            popup.offset = popup.curser;
        } else if popup.curser >= popup.offset + visible_rows {
            popup.offset = popup.curser + 1 - visible_rows;
        }
    }

    fn build_filter_view(&self, popup: &FilterPopup) -> FilterView {
        let accepted = self.engine.view_state(&popup.scope).map(|s| &s.filters);
        let items = popup
            .candidates
            .iter()
            .skip(popup.offset)
            .take(self.filter_rows())
            .map(|value| {
                let on = accepted.is_some_and(|f| f.accepts(&popup.column, value));
                let shown = if value.is_empty() {
                    "(none)".to_string()
                } else {
                    value.clone()
                };
                (shown, on)
            })
            .collect();
        let title = match &popup.scope {
            Scope::Detail(key) => format!(" Filter {} [{}] ", popup.label, key),
            _ => format!(" Filter {} ", popup.label),
        };

        FilterView {
            title,
            search: popup.search.value().to_string(),
            search_cursor: popup.search.cursor(),
            items,
            selected: (!popup.candidates.is_empty()).then(|| popup.curser.saturating_sub(popup.offset)),
            matches: popup.candidates.len(),
        }
    }

    // -------------------- View building ---------------------- //

    fn rebuild_rows(&mut self) {
        let mut rows = Vec::new();
        match self.engine.filtered_and_sorted(self.variant) {
            ShownRows::Groups(groups) => {
                for group in groups {
                    let expanded = self.engine.is_expanded(&group.key);
                    rows.push(DisplayRow::Master {
                        key: group.key.clone(),
                        record: Arc::clone(&group.master),
                        expanded,
                    });
                    if let Some(details) = self.engine.visible_details(&group.key) {
                        rows.push(DisplayRow::DetailHeader {
                            key: group.key.clone(),
                        });
                        rows.extend(details.into_iter().map(|record| DisplayRow::Detail {
                            key: group.key.clone(),
                            record: Arc::clone(record),
                        }));
                    }
                }
            }
            ShownRows::Records(records) => {
                rows = records
                    .into_iter()
                    .map(|record| DisplayRow::Flat {
                        record: Arc::clone(record),
                    })
                    .collect();
            }
        }
        self.rows = rows;
        self.curser_row = self.curser_row.min(self.rows.len().saturating_sub(1));
    }

    /// Keeps cursor row and column on screen.
    fn scroll_into_view(&mut self) {
        let height = self.page_size();
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }

        let set = self.current_set();
        let widths: Vec<u16> = self
            .engine
            .visible_columns(set)
            .iter()
            .map(|c| self.engine.width(set, c.id()).unwrap_or(c.width))
            .collect();
        if widths.is_empty() {
            return;
        }
        self.curser_column = self.curser_column.min(widths.len() - 1);
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        let indent = u32::from(self.indent_of(set));
        let available = u32::from(self.uilayout.table_width);
        while self.offset_column < self.curser_column {
            let used: u32 = widths[self.offset_column..=self.curser_column]
                .iter()
                .map(|&w| u32::from(w) + u32::from(COLUMN_SPACING))
                .sum::<u32>()
                + indent;
            if used <= available {
                break;
            }
            self.offset_column += 1;
        }
    }

    fn indent_of(&self, set: ColumnSet) -> u16 {
        match (self.variant, set) {
            (TableVariant::Total, _) | (_, ColumnSet::Total) => 0,
            (_, ColumnSet::Master) => MARKER_WIDTH,
            (_, ColumnSet::Detail) => DETAIL_INDENT,
        }
    }

    /// Columns of a set from the horizontal offset on.
    fn shown_columns(&self, set: ColumnSet) -> Vec<&ColumnSpec> {
        let columns = self.engine.visible_columns(set);
        let start = self.offset_column.min(columns.len().saturating_sub(1));
        columns.into_iter().skip(start).collect()
    }

    fn header_cells(&self, set: ColumnSet, scope: &Scope) -> Vec<CellView> {
        let state = self.engine.view_state(scope);
        self.shown_columns(set)
            .into_iter()
            .map(|column| {
                let mut text = column.label.clone();
                let mut marked = false;
                if let Some(state) = state {
                    if state.sort.is_sorted_by(column.id()) {
                        text.push_str(state.sort.direction().arrow());
                        marked = true;
                    }
                    if state.filters.is_active(column.id()) {
                        text.push('*');
                        marked = true;
                    }
                }
                CellView {
                    text,
                    width: self.engine.width(set, column.id()).unwrap_or(column.width),
                    marked,
                }
            })
            .collect()
    }

    fn record_cells(&self, set: ColumnSet, record: &Record) -> Vec<CellView> {
        self.shown_columns(set)
            .into_iter()
            .map(|column| CellView {
                text: record.field(column.id()).to_string(),
                width: self.engine.width(set, column.id()).unwrap_or(column.width),
                marked: false,
            })
            .collect()
    }

    fn zones_for(&self, line: &LineView, set: ColumnSet, y: u16) -> Vec<HitZone> {
        let ids: Vec<String> = self
            .shown_columns(set)
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        let mut zones = Vec::new();
        let mut x = self.uilayout.table_x.saturating_add(line.indent);
        for (idx, cell) in line.cells.iter().enumerate() {
            x = x.saturating_add(cell.width);
            if let (Some(left), Some(right)) = (ids.get(idx), ids.get(idx + 1)) {
                zones.push(HitZone {
                    x,
                    y,
                    set,
                    left: left.clone(),
                    right: right.clone(),
                });
            }
            x = x.saturating_add(COLUMN_SPACING);
        }
        zones
    }

    fn build_line(&self, row: &DisplayRow) -> LineView {
        let set = row.column_set();
        let indent = self.indent_of(set);
        let (kind, marker, cells) = match row {
            DisplayRow::Master { record, expanded, .. } => (
                LineKind::Master,
                if *expanded { "▾ " } else { "▸ " },
                self.record_cells(set, record),
            ),
            DisplayRow::DetailHeader { .. } => (
                LineKind::DetailHeader,
                "  └ ",
                self.header_cells(set, &row.scope()),
            ),
            DisplayRow::Detail { record, .. } => {
                (LineKind::Detail, "    ", self.record_cells(set, record))
            }
            DisplayRow::Flat { record } => (LineKind::Flat, "", self.record_cells(set, record)),
        };
        LineView {
            kind,
            indent,
            marker: marker.to_string(),
            cells,
            selected: false,
        }
    }

    fn refresh(&mut self) {
        self.rebuild_rows();
        self.scroll_into_view();

        let (top_set, top_scope, unit) = match self.variant {
            TableVariant::Grouped => (ColumnSet::Master, Scope::Master, "courses"),
            TableVariant::Total => (ColumnSet::Total, Scope::Total, "rows"),
        };
        let header = LineView {
            kind: LineKind::Header,
            indent: self.indent_of(top_set),
            marker: String::new(),
            cells: self.header_cells(top_set, &top_scope),
            selected: false,
        };
        let mut zones = self.zones_for(&header, top_set, self.uilayout.header_y);

        let rend = (self.offset_row + self.page_size()).min(self.rows.len());
        let mut lines = Vec::with_capacity(rend.saturating_sub(self.offset_row));
        for (pos, row) in self.rows[self.offset_row.min(rend)..rend].iter().enumerate() {
            let mut line = self.build_line(row);
            line.selected = self.offset_row + pos == self.curser_row;
            if line.kind == LineKind::DetailHeader {
                let y = self
                    .uilayout
                    .body_y
                    .saturating_add(u16::try_from(pos).unwrap_or(u16::MAX));
                zones.extend(self.zones_for(&line, ColumnSet::Detail, y));
            }
            lines.push(line);
        }

        let selected_cell = self.current_row().map(|row| {
            let start = self
                .offset_column
                .min(self.engine.visible_columns(row.column_set()).len().saturating_sub(1));
            self.curser_column.saturating_sub(start)
        });

        let popup = match self.modus {
            Modus::POPUP => Some(PopupView::Help(HELP_TEXT.to_string())),
            Modus::FILTER => self
                .filter_popup
                .as_ref()
                .map(|p| PopupView::Filter(self.build_filter_view(p))),
            Modus::TABLE => None,
        };

        let count = format!(
            "{} of {} {} shown",
            self.engine.shown_count(self.variant),
            self.engine.total_count(self.variant),
            unit
        );
        let name = if self.loader.is_loading() {
            format!("{} (loading)", self.name)
        } else {
            self.name.clone()
        };

        self.hit_zones = zones;
        self.uidata = UIData {
            name,
            header,
            lines,
            selected_cell,
            count,
            status_message: self.status_message.clone(),
            popup,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> Arc<Record> {
        Arc::new(Record::from_pairs(pairs.iter().copied()))
    }

    fn subjects() -> LoadedTable {
        let headers = ["kwamokcode", "kwamokname", "hakjum", "prof", "juya"];
        let rows = [
            ["C3", "Compilers", "3", "Lee", "Day"],
            ["C1", "Algebra", "10", "Kim", "Night"],
            ["C3", "Compilers", "3", "Park", "Night"],
            ["C2", "Circuits", "1", "Choi", "Day"],
        ];
        LoadedTable {
            name: "subjects.csv".into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            records: rows
                .iter()
                .map(|row| rec(&headers.iter().copied().zip(row.iter().copied()).collect::<Vec<_>>()))
                .collect(),
        }
    }

    fn model() -> Model {
        let config = SVConfig::default();
        let mut model = Model::init(&config, 120, 30).expect("model");
        model.apply_loaded(subjects());
        model.refresh();
        model
    }

    fn send(model: &mut Model, msg: Message) {
        model.update(Some(msg)).expect("update");
    }

    fn first_cells(model: &Model) -> Vec<String> {
        model
            .get_uidata()
            .lines
            .iter()
            .map(|l| l.cells.first().map(|c| c.text.clone()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn loads_fixture_in_background() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("subjects.csv");
        let mut model = Model::init(&SVConfig::default(), 120, 30).expect("model");
        model.load(path);
        assert_eq!(model.status, Status::LOADING);

        for _ in 0..500 {
            model.update(None).expect("update");
            if model.status != Status::LOADING {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.get_uidata().name, "subjects.csv");
        assert_eq!(model.get_uidata().count, "5 of 5 courses shown");
    }

    #[test]
    fn layout_reserves_border_header_and_status() {
        let layout = UILayout::from_values(120, 30);
        assert_eq!((layout.table_x, layout.header_y, layout.body_y), (1, 1, 2));
        assert_eq!(layout.table_width, 118);
        assert_eq!(layout.table_height, 26);
        assert_eq!(UILayout::from_values(1, 1).table_height, 0);
    }

    #[test]
    fn grouped_view_lists_courses() {
        let model = model();
        assert_eq!(first_cells(&model), vec!["C3", "C1", "C2"]);
        assert_eq!(model.get_uidata().count, "3 of 3 courses shown");
        assert_eq!(model.get_uidata().status_message, "Loaded 4 rows");
        assert!(model.get_uidata().lines[0].selected);
    }

    #[test]
    fn expanding_shows_section_header_and_rows() {
        let mut model = model();
        send(&mut model, Message::ToggleExpand);
        let kinds: Vec<LineKind> = model.get_uidata().lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Master,
                LineKind::DetailHeader,
                LineKind::Detail,
                LineKind::Detail,
                LineKind::Master,
                LineKind::Master,
            ]
        );
        assert_eq!(model.get_uidata().lines[0].marker, "▾ ");

        // Collapsing from a section row selects its course again.
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::ToggleExpand);
        assert_eq!(model.get_uidata().lines.len(), 3);
        assert!(model.get_uidata().lines[0].selected);
    }

    #[test]
    fn sorting_master_rows_keeps_selection_on_course() {
        let mut model = model();
        // Credits column.
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::SortColumn);
        assert_eq!(first_cells(&model), vec!["C2", "C3", "C1"]);
        assert!(model.get_uidata().lines[1].selected);
        assert!(model.get_uidata().header.cells[3].text.ends_with('↑'));

        send(&mut model, Message::SortColumn);
        assert_eq!(first_cells(&model), vec!["C1", "C3", "C2"]);
    }

    #[test]
    fn non_sortable_column_reports_and_keeps_order() {
        let mut model = model();
        send(&mut model, Message::SortColumn);
        assert_eq!(first_cells(&model), vec!["C3", "C1", "C2"]);
        assert_eq!(
            model.get_uidata().status_message,
            "Column kwamokcode can not be sorted"
        );
    }

    #[test]
    fn filter_popup_toggles_values() {
        let mut model = model();
        // Course name column.
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::OpenFilter);
        assert!(model.raw_keyevents());

        let Some(PopupView::Filter(view)) = model.get_uidata().popup.clone() else {
            panic!("filter popup expected");
        };
        assert_eq!(view.matches, 3);

        for chr in "alg".chars() {
            send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Char(chr), KeyModifiers::NONE)));
        }
        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        let Some(PopupView::Filter(view)) = model.get_uidata().popup.clone() else {
            panic!("filter popup expected");
        };
        assert_eq!(view.items, vec![("Algebra".to_string(), true)]);

        send(&mut model, Message::Exit);
        assert!(!model.raw_keyevents());
        assert_eq!(first_cells(&model), vec!["C1"]);
        assert_eq!(model.get_uidata().count, "1 of 3 courses shown");
        assert!(model.get_uidata().header.cells[1].text.ends_with('*'));

        send(&mut model, Message::ClearFilter);
        assert_eq!(model.get_uidata().count, "3 of 3 courses shown");
    }

    #[test]
    fn escape_in_filter_search_closes_popup() {
        let mut model = model();
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::OpenFilter);
        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(!model.raw_keyevents());
        assert!(model.get_uidata().popup.is_none());
    }

    #[test]
    fn detail_filter_only_touches_its_group() {
        let mut model = model();
        send(&mut model, Message::ToggleExpand);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveDown);
        // Professor column of the section rows.
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::OpenFilter);
        let Some(PopupView::Filter(view)) = model.get_uidata().popup.clone() else {
            panic!("filter popup expected");
        };
        assert_eq!(view.title, " Filter Professor [C3] ");
        assert_eq!(view.matches, 2);

        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE)));
        send(&mut model, Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        send(&mut model, Message::Exit);

        let kinds: Vec<LineKind> = model.get_uidata().lines.iter().map(|l| l.kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == LineKind::Detail).count(), 1);
        assert_eq!(model.get_uidata().count, "3 of 3 courses shown");
    }

    #[test]
    fn total_view_and_hidden_columns() {
        let mut model = model();
        send(&mut model, Message::ToggleView);
        assert_eq!(model.get_uidata().count, "4 of 4 rows shown");
        let before = model.get_uidata().header.cells.len();

        send(&mut model, Message::ToggleColumnVisibility);
        assert_eq!(model.get_uidata().header.cells.len(), before - 1);
        assert_eq!(model.get_uidata().status_message, "Column kwamokcode hidden");
    }

    #[test]
    fn dragging_a_header_border_resizes() {
        let mut model = model();
        // Code column starts after border and marker and is 10 wide.
        let border_x = 1 + MARKER_WIDTH + 10;
        send(&mut model, Message::BeginResize { x: border_x, y: 1 });
        assert!(model.is_capturing());
        send(&mut model, Message::DragResize { x: border_x + 3 });
        send(&mut model, Message::EndResize);
        assert!(!model.is_capturing());

        let cells = &model.get_uidata().header.cells;
        assert_eq!((cells[0].width, cells[1].width), (13, 25));
    }

    #[test]
    fn release_while_popup_is_open_ends_resize() {
        let mut model = model();
        let border_x = 1 + MARKER_WIDTH + 10;
        send(&mut model, Message::BeginResize { x: border_x, y: 1 });
        assert!(model.is_capturing());
        send(&mut model, Message::Help);
        send(&mut model, Message::EndResize);
        assert!(!model.is_capturing());
        send(&mut model, Message::Exit);

        // A later click off every border must not resume the old gesture.
        send(&mut model, Message::BeginResize { x: 60, y: 10 });
        send(&mut model, Message::DragResize { x: border_x + 5 });
        assert!(!model.is_capturing());
        assert_eq!(model.get_uidata().header.cells[0].width, 10);
    }

    #[test]
    fn opening_a_popup_ends_a_running_resize() {
        let mut model = model();
        let border_x = 1 + MARKER_WIDTH + 10;
        send(&mut model, Message::BeginResize { x: border_x, y: 1 });
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::OpenFilter);
        assert!(model.raw_keyevents());
        assert!(!model.is_capturing());
    }

    #[test]
    fn clicks_away_from_borders_do_not_capture() {
        let mut model = model();
        send(&mut model, Message::BeginResize { x: 5, y: 1 });
        assert!(!model.is_capturing());
        send(&mut model, Message::BeginResize { x: 13, y: 7 });
        assert!(!model.is_capturing());
    }

    #[test]
    fn keyboard_resize_respects_floor() {
        let mut model = model();
        for _ in 0..20 {
            send(&mut model, Message::NarrowColumn);
        }
        let cells = &model.get_uidata().header.cells;
        assert_eq!((cells[0].width, cells[1].width), (8, 30));
    }

    #[test]
    fn reload_resets_filters_but_keeps_widths() {
        let mut model = model();
        send(&mut model, Message::WidenColumn);
        send(&mut model, Message::ToggleExpand);
        model.apply_loaded(subjects());
        model.refresh();

        assert_eq!(model.get_uidata().lines.len(), 3);
        assert_eq!(model.get_uidata().header.cells[0].width, 11);
    }

    #[test]
    fn unknown_group_column_keeps_previous_data() {
        let mut model = model();
        let mut table = subjects();
        table.headers.retain(|h| h != "kwamokcode");
        model.apply_loaded(table);
        model.refresh();
        assert_eq!(model.get_uidata().lines.len(), 3);
        assert!(model.get_uidata().status_message.starts_with("Can not show"));
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model();
        send(&mut model, Message::Help);
        assert!(matches!(model.get_uidata().popup, Some(PopupView::Help(_))));
        send(&mut model, Message::Exit);
        assert!(model.get_uidata().popup.is_none());
        send(&mut model, Message::Quit);
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn nothing_to_copy_on_section_header() {
        let mut model = model();
        send(&mut model, Message::ToggleExpand);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::CopyRow);
        assert_eq!(model.get_uidata().status_message, "Nothing to copy");
    }
}
