//! `whiteboard`: list, create, inspect and watch whiteboard documents from
//! the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use wb_core::{EntityId, paths};
use wb_editor::input::InputEvent;
use wb_editor::persist::{Clock, SystemClock};
use wb_editor::reconcile::CardViewers;
use wb_editor::viewport::NoFrames;
use wb_editor::{SessionServices, WhiteboardSession};
use wb_host::commands::{self, DocumentSummary};
use wb_host::config::DEFAULT_SETTINGS_PATH;
use wb_host::{
    DocumentStore, FsWorkspace, LogUi, SessionRuntime, TokioScheduler, WhiteboardConfig,
    WhiteboardHost,
};

/// Viewport size for headless sessions.
const HEADLESS_VIEWPORT: (f64, f64) = (1280.0, 800.0);

#[derive(Parser)]
#[command(name = "whiteboard")]
#[command(about = "Spatial whiteboard documents linking markdown cards")]
struct Cli {
    /// Workspace root (default: current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Settings file (default: <root>/.whiteboard/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List whiteboard files in the workspace
    List,

    /// Create an empty whiteboard
    New {
        /// Name, without the .whiteboard.json suffix
        name: String,
        /// Directory to create it in (default: workspace root)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print a whiteboard file as plain text
    Show { file: PathBuf },

    /// Load and migrate a whiteboard, then print a summary
    Check { file: PathBuf },

    /// Keep a whiteboard in sync with its workspace until interrupted.
    /// Input events are read from stdin as JSON lines.
    Watch { file: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("reading current directory")?,
    };
    let settings = cli
        .config
        .unwrap_or_else(|| root.join(DEFAULT_SETTINGS_PATH));
    let config = WhiteboardConfig::load(&settings);
    let mut workspace = FsWorkspace::new(Some(root.clone()));

    match cli.command {
        Commands::List => {
            for path in commands::list_whiteboards(&workspace) {
                println!("{}", paths::display_relative(&path, Some(&root)));
            }
        }
        Commands::New { name, dir } => {
            let dir = dir.map_or_else(|| root.clone(), |d| absolute(&root, &d));
            let path = commands::create_whiteboard(&mut workspace, &dir, &name)?;
            println!("{}", path.display());
        }
        Commands::Show { file } => {
            let text = commands::open_as_text(&workspace, &absolute(&root, &file))?;
            print!("{text}");
        }
        Commands::Check { file } => {
            let store = DocumentStore::new(absolute(&root, &file));
            let doc = store.try_load(&workspace, SystemClock.now_ms())?;
            println!("{}", DocumentSummary::of(&store, &doc));
        }
        Commands::Watch { file } => {
            workspace.watch().context("starting file watcher")?;
            let store = DocumentStore::new(absolute(&root, &file));
            watch(WhiteboardHost::new(workspace, LogUi, store, config)).await;
        }
    }
    Ok(())
}

fn absolute(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Prints card content as it arrives.
struct PrintViewers;

impl CardViewers for PrintViewers {
    fn render(&mut self, card: EntityId, content: &str) {
        println!("card {card}: {} bytes", content.len());
    }

    fn destroy(&mut self, card: EntityId) {
        log::debug!("card {card} closed");
    }
}

async fn watch(host: WhiteboardHost<FsWorkspace, LogUi>) {
    let (scheduler, timers) = TokioScheduler::new();
    let services = SessionServices {
        scheduler: Box::new(scheduler),
        frames: Box::new(NoFrames),
        viewers: Box::new(PrintViewers),
        clock: Box::new(SystemClock),
    };
    let (width, height) = HEADLESS_VIEWPORT;
    let mut runtime = SessionRuntime::new(WhiteboardSession::new(width, height, services), host);
    runtime.start();
    println!(
        "{}",
        DocumentSummary::of(runtime.host().store(), &runtime.session().scene().serialize())
    );

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InputEvent>(&line) {
                Ok(event) => {
                    if input_tx.send(event).is_err() {
                        return;
                    }
                }
                Err(err) => log::warn!("ignoring input line: {err}"),
            }
        }
        // Keep watching after stdin closes; only Ctrl-C ends the session.
        log::debug!("stdin closed");
        let _keep_open = input_tx;
        std::future::pending::<()>().await;
    });

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };
    runtime.run(timers, input_rx, shutdown).await;
}
