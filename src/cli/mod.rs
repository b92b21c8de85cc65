use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use time::{Date, OffsetDateTime};
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::Board;
use crate::config::ConfigLoader;
use crate::storage;

pub mod commands;

use self::commands::{
    AddArgs, ColorArgs, ExportArgs, IdArgs, ImageArgs, ListArgs, MoveArgs, PasteArgs, SearchArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "daynote",
    version,
    about = "Notes pinned to calendar days"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over DAYNOTE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over DAYNOTE_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a card to a day
    Add(AddArgs),
    /// Print cards grouped by day
    List(ListArgs),
    /// Toggle the completed flag of a card
    Done(IdArgs),
    /// Set or cycle the color of a card
    Color(ColorArgs),
    /// Move cards to another day
    Move(MoveArgs),
    /// Delete a card
    Delete(IdArgs),
    /// Paste clipboard text (read from stdin) into a day
    Paste(PasteArgs),
    /// Attach an image file to a card
    Image(ImageArgs),
    /// Find the first card containing the query
    Search(SearchArgs),
    /// Write a dated snapshot file
    Export(ExportArgs),
    /// Upload the board to the remote snapshot service
    Publish,
    /// Replace the board with the newest remote snapshot
    Pull,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("DAYNOTE_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("DAYNOTE_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;

    let mut board = Board::load(&config, Box::new(storage.clone()), local_today());
    match cli.command {
        Commands::Add(args) => commands::add(&mut board, args),
        Commands::List(args) => commands::list(&board, args),
        Commands::Done(args) => commands::toggle_done(&mut board, args),
        Commands::Color(args) => commands::color(&mut board, args),
        Commands::Move(args) => commands::move_cards(&mut board, args),
        Commands::Delete(args) => commands::delete(&mut board, args),
        Commands::Paste(args) => commands::paste(&mut board, args),
        Commands::Image(args) => commands::image(&mut board, &config, args),
        Commands::Search(args) => commands::search(&mut board, &config, args),
        Commands::Export(args) => commands::export(&mut board, &storage, args),
        Commands::Publish => commands::publish(&mut board, &config),
        Commands::Pull => commands::pull(&mut board, &config),
    }
}

fn local_today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
