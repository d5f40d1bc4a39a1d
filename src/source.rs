use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::domain::SVError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
}

/// Rows read from one export file, every value as a string.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub name: String,
    pub headers: Vec<String>,
    pub records: Vec<Arc<Record>>,
}

pub fn detect_file_type(path: &Path) -> Result<FileType, SVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(SVError::UnknownFileType),
    }
}

pub fn get_file_info(path: PathBuf) -> Result<FileInfo, SVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SVError::FileNotFound,
        ErrorKind::PermissionDenied => SVError::PermissionDenied,
        _ => SVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(SVError::LoadingFailed("Not a file!".into()));
    }

    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

/// Reads a whole file into records.
///
/// Columns are decoded in parallel, one rayon task per column, then the rows
/// are stitched back together. Nulls become empty strings and values are
/// trimmed, matching what the portal export looks like once cleaned up.
pub fn load_table(path: &Path) -> Result<LoadedTable, SVError> {
    let file_info = get_file_info(path.to_path_buf())?;
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = Arc::new(frame.collect()?);
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let columns: Result<Vec<Vec<String>>, PolarsError> = headers
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let columns = columns?;

    let nrows = df.height();
    let records: Vec<Arc<Record>> = (0..nrows)
        .into_par_iter()
        .map(|ridx| {
            Arc::new(Record::from_pairs(
                headers
                    .iter()
                    .zip(columns.iter())
                    .map(|(name, column)| (name.clone(), column[ridx].clone())),
            ))
        })
        .collect();

    info!(
        "Loaded {} rows x {} columns ({} bytes) in {}ms",
        nrows,
        headers.len(),
        file_info.file_size,
        start_time.elapsed().as_millis()
    );

    Ok(LoadedTable {
        name: file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string(),
        headers,
        records,
    })
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<String>, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| match value {
            Some(s) => s.trim().replace("\r\n", " ↵ ").replace('\n', " ↵ "),
            None => String::new(),
        })
        .collect();
    trace!("Decoded column {col_name}");
    Ok(data)
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    // Course codes like "0012" must stay strings, so nothing is inferred.
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

/// Identifies one load request. Later requests carry larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn issue(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}

#[derive(Debug)]
pub struct LoadResponse {
    pub token: RequestToken,
    pub path: PathBuf,
    pub result: Result<LoadedTable, SVError>,
}

/// Loads files off the UI thread.
///
/// Only the response to the most recent request is handed back; anything
/// older that arrives later is dropped so a slow load can never overwrite a
/// newer one.
pub struct Loader {
    sequencer: RequestSequencer,
    answered: Option<RequestToken>,
    tx: Sender<LoadResponse>,
    rx: Receiver<LoadResponse>,
}

impl Loader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            sequencer: RequestSequencer::default(),
            answered: None,
            tx,
            rx,
        }
    }

    pub fn request(&mut self, path: PathBuf) -> RequestToken {
        let token = self.sequencer.issue();
        let tx = self.tx.clone();
        debug!("Load request {:?} for {}", token, path.display());
        rayon::spawn(move || {
            let result = load_table(&path);
            if tx.send(LoadResponse { token, path, result }).is_err() {
                trace!("Loader went away before {:?} finished", token);
            }
        });
        token
    }

    /// True while the latest request has not been answered.
    pub fn is_loading(&self) -> bool {
        self.sequencer.latest > 0 && self.answered.map(|t| t.0) != Some(self.sequencer.latest)
    }

    /// Drains finished loads, returning the newest current one.
    pub fn poll(&mut self) -> Option<LoadResponse> {
        let mut latest = None;
        while let Ok(response) = self.rx.try_recv() {
            if let Some(response) = self.accept(response) {
                latest = Some(response);
            }
        }
        latest
    }

    fn accept(&mut self, response: LoadResponse) -> Option<LoadResponse> {
        if self.sequencer.is_current(response.token) {
            self.answered = Some(response.token);
            Some(response)
        } else {
            debug!(
                "Dropping stale load {:?} for {}",
                response.token,
                response.path.display()
            );
            None
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldAccess;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn empty_response(token: RequestToken) -> LoadResponse {
        LoadResponse {
            token,
            path: PathBuf::from("x.csv"),
            result: Err(SVError::FileNotFound),
        }
    }

    #[test]
    fn file_types_by_extension() {
        assert_eq!(detect_file_type(Path::new("a.csv")).ok(), Some(FileType::CSV));
        assert_eq!(detect_file_type(Path::new("a.PQ")).ok(), Some(FileType::PARQUET));
        assert_eq!(detect_file_type(Path::new("a.feather")).ok(), Some(FileType::ARROW));
        assert!(matches!(
            detect_file_type(Path::new("a.xml")),
            Err(SVError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            get_file_info(fixture("does_not_exist.csv")),
            Err(SVError::FileNotFound)
        ));
    }

    #[test]
    fn csv_values_stay_strings() {
        let table = load_table(&fixture("subjects.csv")).expect("fixture loads");
        assert_eq!(table.name, "subjects.csv");
        assert_eq!(table.headers[0], "kwamokcode");
        assert_eq!(table.records.len(), 8);

        let first = &table.records[0];
        assert_eq!(first.field("kwamokcode"), "0012");
        assert_eq!(first.field("kwamokname"), "Data Structures");
        // Empty cells come back as empty strings.
        assert!(table.records.iter().any(|r| r.field("plan").is_empty()));
    }

    #[test]
    fn sequencer_tokens_increase() {
        let mut seq = RequestSequencer::default();
        let a = seq.issue();
        let b = seq.issue();
        assert!(b > a);
        assert!(!seq.is_current(a));
        assert!(seq.is_current(b));
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut loader = Loader::new();
        let first = loader.sequencer.issue();
        let second = loader.sequencer.issue();
        assert!(loader.is_loading());

        loader.tx.send(empty_response(second)).expect("channel open");
        loader.tx.send(empty_response(first)).expect("channel open");

        let accepted = loader.poll().expect("newest response");
        assert_eq!(accepted.token, second);
        assert!(!loader.is_loading());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn old_response_alone_is_not_applied() {
        let mut loader = Loader::new();
        let first = loader.sequencer.issue();
        let _second = loader.sequencer.issue();
        loader.tx.send(empty_response(first)).expect("channel open");
        assert!(loader.poll().is_none());
        assert!(loader.is_loading());
    }
}
