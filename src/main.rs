use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::{error, info};

mod compare;
mod controller;
mod domain;
mod engine;
mod expansion;
mod filter;
mod grouping;
mod logging;
mod model;
mod record;
mod resize;
mod schema;
mod search_input;
mod sort;
mod source;
mod ui;

use controller::Controller;
use domain::{Preset, SVConfig, SVError, Status, ViewArg};
use model::Model;

/// Browse course offerings and seat availability exports.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Export file to show (csv, parquet or arrow)
    path: String,

    /// Column layout
    #[arg(short, long, value_enum, default_value_t = Preset::Subjects)]
    preset: Preset,

    /// Column that groups rows into courses
    #[arg(short, long)]
    group_by: Option<String>,

    /// View shown at start
    #[arg(long, value_enum, default_value_t = ViewArg::Grouped)]
    view: ViewArg,

    /// Width cap for inferred columns
    #[arg(long, default_value_t = 30)]
    max_column_width: u16,

    /// Number of header columns on master rows for the auto preset
    #[arg(long, default_value_t = 3)]
    master_columns: usize,

    #[arg(long, default_value = "seatview.log")]
    log_file: PathBuf,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("Exiting with error: {:?}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), SVError> {
    let path = shellexpand::full(&args.path).map_err(|e| SVError::LoadingFailed(e.to_string()))?;
    let path = PathBuf::from(path.as_ref());
    // Fail before the terminal is taken over.
    source::get_file_info(path.clone())?;

    let config = SVConfig::default()
        .with_preset(args.preset)
        .with_group_by(args.group_by)
        .with_view(args.view.into())
        .with_max_column_width(args.max_column_width)
        .with_master_columns(args.master_columns)
        .with_log_file(args.log_file)
        .with_log_level(args.log_level);
    logging::init(&config)?;
    info!("Starting seatview for {}", path.display());

    let mut terminal = ratatui::init();
    let result = execute!(stdout(), EnableMouseCapture)
        .map_err(SVError::from)
        .and_then(|_| event_loop(&mut terminal, &config, path));

    if let Err(e) = execute!(stdout(), DisableMouseCapture) {
        error!("Could not release mouse: {:?}", e);
    }
    ratatui::restore();
    result
}

fn event_loop(terminal: &mut DefaultTerminal, config: &SVConfig, path: PathBuf) -> Result<(), SVError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, size.width, size.height)?;
    model.load(path);
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui::draw(&model, f))?;

        // Updates also run without input so finished loads are picked up.
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Bye");
    Ok(())
}
