use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use clap::ValueEnum;
use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::engine::TableVariant;

#[derive(Debug)]
pub enum SVError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    UnknownColumn(String),
    Logging(String),
}

impl fmt::Display for SVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SVError::IoError(e) => write!(f, "I/O error: {e}"),
            SVError::PolarsError(e) => write!(f, "could not read data: {e}"),
            SVError::LoadingFailed(reason) => write!(f, "loading failed: {reason}"),
            SVError::FileNotFound => write!(f, "file not found"),
            SVError::PermissionDenied => write!(f, "permission denied"),
            SVError::UnknownFileType => write!(f, "unknown file type"),
            SVError::UnknownColumn(c) => write!(f, "unknown column {c:?}"),
            SVError::Logging(reason) => write!(f, "could not set up logging: {reason}"),
        }
    }
}

impl std::error::Error for SVError {}

impl From<Error> for SVError {
    fn from(err: Error) -> Self {
        SVError::IoError(err)
    }
}

impl From<PolarsError> for SVError {
    fn from(err: PolarsError) -> Self {
        SVError::PolarsError(err)
    }
}

/// Built-in column layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Course offerings grouped by course code
    #[default]
    Subjects,
    /// Remaining seats grouped by course code
    Seats,
    /// Columns taken from the file header
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    #[default]
    Grouped,
    Total,
}

impl From<ViewArg> for TableVariant {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Grouped => TableVariant::Grouped,
            ViewArg::Total => TableVariant::Total,
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct SVConfig {
    pub event_poll_time: u64,
    pub max_column_width: u16,
    pub preset: Preset,
    /// Overrides the preset's grouping column.
    pub group_by: Option<String>,
    /// Header columns shown on master rows when the schema is inferred.
    pub master_columns: usize,
    pub view: TableVariant,
    pub log_file: PathBuf,
    #[setters(into)]
    pub log_level: String,
}

impl Default for SVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 30,
            preset: Preset::Subjects,
            group_by: None,
            master_columns: 3,
            view: TableVariant::Grouped,
            log_file: PathBuf::from("seatview.log"),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    EMPTY,
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ToggleExpand,
    SortColumn,
    OpenFilter,
    ClearFilter,
    ToggleView,
    ToggleColumnVisibility,
    NarrowColumn,
    WidenColumn,
    CopyRow,
    Reload,
    Help,
    Exit,
    BeginResize { x: u16, y: u16 },
    DragResize { x: u16 },
    EndResize,
    Resize(u16, u16),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
  ↑ ↓ ← → / hjkl   move
  PgUp PgDn        page
  g G              first / last row
  Enter Space      expand / collapse course
  s                sort by column (again to flip)
  f                filter column
  c                clear column filter
  v                switch grouped / total view
  x                hide / show column (total view)
  < >              narrow / widen column
  mouse drag       resize at header border
  y                copy row
  r                reload file
  ?                help
  Esc              close popup
  q                quit

Filter popup: type to search, ↑ ↓ select,
Enter toggle value, Ctrl-d clear, Esc close";
