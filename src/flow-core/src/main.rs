//! Flow - video catalog CLI
//!
//! Ingests video files into a durable catalog with probed metadata and
//! generated thumbnail strips. Files arrive through explicit selection,
//! recursive folder scans, or continuously monitored watch folders.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flow_catalog::{CatalogContext, CatalogEvent, FolderWatchers, IngestionCoordinator};
use flow_store::{ProcessingStatus, Store, ThumbnailSettings};

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Video catalog with automatic thumbnail generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory for the catalog and thumbnails
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest explicitly selected video files
    Add {
        /// Video files to ingest
        paths: Vec<PathBuf>,
    },

    /// Recursively scan a directory and ingest every video file
    Scan {
        /// Directory to scan
        dir: PathBuf,
    },

    /// Monitor all registered watch folders until interrupted
    Watch,

    /// List catalog entries
    List,

    /// Regenerate thumbnails (also retries entries in error state)
    Regen {
        /// Entry id to regenerate
        id: Option<String>,

        /// Regenerate the entire catalog, one entry at a time
        #[arg(long)]
        all: bool,
    },

    /// Remove an entry and its generated thumbnails
    Rm {
        /// Entry id to remove
        id: String,
    },

    /// Manage watch folders
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },

    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Show or change thumbnail settings
    Settings {
        /// Frames per video
        #[arg(long)]
        max_count: Option<u32>,

        /// JPEG quality percentage (1-100)
        #[arg(long)]
        quality: Option<u32>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },

    /// Check external dependencies (ffmpeg, ffprobe)
    Check,
}

#[derive(Subcommand)]
enum FolderCommands {
    /// Register a folder and ingest its current contents
    Add { path: PathBuf },
    /// Unregister a folder (already-ingested entries stay)
    Rm { id: String },
    /// List registered folders
    List,
}

#[derive(Subcommand)]
enum TagCommands {
    /// Create a tag
    Add {
        name: String,
        #[arg(long, default_value = "#808080")]
        color: String,
    },
    /// Delete a tag everywhere it is referenced
    Rm { id: String },
    /// List tags
    List,
    /// Attach a tag to an entry
    Set { video_id: String, tag_id: String },
    /// Detach a tag from an entry
    Unset { video_id: String, tag_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Commands::Add { paths } => cmd_add(data_dir, paths),
        Commands::Scan { dir } => cmd_scan(data_dir, dir),
        Commands::Watch => cmd_watch(data_dir),
        Commands::List => cmd_list(data_dir),
        Commands::Regen { id, all } => cmd_regen(data_dir, id, all),
        Commands::Rm { id } => cmd_rm(data_dir, id),
        Commands::Folder { command } => match command {
            FolderCommands::Add { path } => cmd_folder_add(data_dir, path),
            FolderCommands::Rm { id } => cmd_folder_rm(data_dir, id),
            FolderCommands::List => cmd_folder_list(data_dir),
        },
        Commands::Tag { command } => cmd_tag(data_dir, command),
        Commands::Settings {
            max_count,
            quality,
            width,
            height,
        } => cmd_settings(data_dir, max_count, quality, width, height),
        Commands::Check => cmd_check(),
    }
}

fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Flow")
    })
}

fn open_context(data_dir: &PathBuf) -> Result<Arc<CatalogContext>> {
    let store = Store::open(data_dir).context("failed to open catalog store")?;
    let thumbnail_dir = data_dir.join("thumbnails");
    Ok(Arc::new(CatalogContext::new(Arc::new(store), thumbnail_dir)))
}

fn warn_if_tools_missing() {
    if !flow_media::check_ffprobe() {
        warn!("ffprobe not found in PATH - metadata probing will fail");
    }
    if !flow_media::check_ffmpeg() {
        warn!("ffmpeg not found in PATH - thumbnail extraction will fail");
    }
}

/// Relay bus events to the log while a command is running.
fn spawn_progress_printer(ctx: &CatalogContext) -> tokio::task::JoinHandle<()> {
    let mut rx = ctx.events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(CatalogEvent::EntryProgress { entry_id, percent }) => {
                    info!("{}: {}%", short_id(&entry_id), percent);
                }
                Ok(CatalogEvent::CatalogChanged) => debug!("catalog changed"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    })
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[tokio::main]
async fn cmd_add(data_dir: PathBuf, paths: Vec<PathBuf>) -> Result<()> {
    if paths.is_empty() {
        warn!("nothing to add");
        return Ok(());
    }

    warn_if_tools_missing();
    let ctx = open_context(&data_dir)?;
    let coordinator = IngestionCoordinator::new(ctx.clone());
    let printer = spawn_progress_printer(&ctx);

    let admitted = coordinator.ingest(&paths).await?;
    info!(
        "{} of {} path(s) admitted as new entries",
        admitted.len(),
        paths.len()
    );

    coordinator.wait_idle().await;
    printer.abort();
    print_outcomes(&ctx, &admitted)?;
    Ok(())
}

#[tokio::main]
async fn cmd_scan(data_dir: PathBuf, dir: PathBuf) -> Result<()> {
    warn_if_tools_missing();
    let ctx = open_context(&data_dir)?;
    let coordinator = IngestionCoordinator::new(ctx.clone());

    info!("scanning {:?}", dir);
    let found = flow_catalog::scan(&dir)?;
    info!("found {} video file(s)", found.len());

    let printer = spawn_progress_printer(&ctx);
    let admitted = coordinator.ingest(&found).await?;
    info!("{} new entr(ies)", admitted.len());

    coordinator.wait_idle().await;
    printer.abort();
    print_outcomes(&ctx, &admitted)?;
    Ok(())
}

#[tokio::main]
async fn cmd_watch(data_dir: PathBuf) -> Result<()> {
    warn_if_tools_missing();
    let ctx = open_context(&data_dir)?;
    let coordinator = IngestionCoordinator::new(ctx.clone());
    let watchers = FolderWatchers::new(coordinator.clone());

    let folders = ctx.store.watch_folders()?;
    if folders.is_empty() {
        warn!("no watch folders registered - use `flow folder add <path>`");
        return Ok(());
    }

    let printer = spawn_progress_printer(&ctx);
    watchers.watch_all(&folders).await;
    info!("{} folder watcher(s) active, Ctrl-C to stop", watchers.active_count());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl-C handler")?;

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    watchers.unwatch_all();
    coordinator.wait_idle().await;
    printer.abort();
    info!("watch stopped");
    Ok(())
}

fn cmd_list(data_dir: PathBuf) -> Result<()> {
    let store = Store::open(&data_dir)?;
    let videos = store.videos()?;

    if videos.is_empty() {
        println!("catalog is empty");
        return Ok(());
    }

    println!("{} entr(ies):\n", videos.len());
    for v in videos {
        let status = match v.processing_status {
            ProcessingStatus::Pending => "pending".to_string(),
            ProcessingStatus::Processing => format!("processing {}%", v.processing_progress),
            ProcessingStatus::Completed => "completed".to_string(),
            ProcessingStatus::Error => "error".to_string(),
        };
        let duration = v
            .metadata
            .as_ref()
            .map(|m| format!("{:.0}s", m.duration))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<20}  {:>5}  {:>3} thumb(s)  {}{}",
            short_id(&v.id),
            status,
            duration,
            v.thumbnails.len(),
            v.filename,
            if v.is_favorite { "  *" } else { "" },
        );
    }
    Ok(())
}

enum RegenTarget {
    All,
    One(String),
}

fn regen_target(id: Option<String>, all: bool) -> Result<RegenTarget> {
    match (id, all) {
        (_, true) => Ok(RegenTarget::All),
        (Some(id), false) => Ok(RegenTarget::One(id)),
        (None, false) => bail!("pass an entry id or --all"),
    }
}

#[tokio::main]
async fn cmd_regen(data_dir: PathBuf, id: Option<String>, all: bool) -> Result<()> {
    let target = regen_target(id, all)?;

    warn_if_tools_missing();
    let ctx = open_context(&data_dir)?;
    let coordinator = IngestionCoordinator::new(ctx.clone());
    let printer = spawn_progress_printer(&ctx);

    match target {
        RegenTarget::All => {
            coordinator.regenerate_all().await?;
            info!("bulk regeneration finished");
        }
        RegenTarget::One(id) => {
            let entry = coordinator.regenerate(&id).await?;
            info!(
                "{} -> {:?} with {} thumbnail(s)",
                entry.filename,
                entry.processing_status,
                entry.thumbnails.len()
            );
        }
    }

    printer.abort();
    Ok(())
}

#[tokio::main]
async fn cmd_rm(data_dir: PathBuf, id: String) -> Result<()> {
    let ctx = open_context(&data_dir)?;
    let coordinator = IngestionCoordinator::new(ctx);
    coordinator.remove(&id).await?;
    Ok(())
}

#[tokio::main]
async fn cmd_folder_add(data_dir: PathBuf, path: PathBuf) -> Result<()> {
    warn_if_tools_missing();
    let path = std::fs::canonicalize(&path)
        .with_context(|| format!("folder {path:?} is not accessible"))?;

    let ctx = open_context(&data_dir)?;
    let coordinator = IngestionCoordinator::new(ctx.clone());

    // scan first: if the folder is unreadable the add fails as a whole
    let found = flow_catalog::scan(&path)?;

    match ctx.store.add_watch_folder(&path)? {
        Some(folder) => info!("registered watch folder {} ({})", folder.path, short_id(&folder.id)),
        None => {
            warn!("folder already registered");
            return Ok(());
        }
    }

    let printer = spawn_progress_printer(&ctx);
    let admitted = coordinator.ingest(&found).await?;
    info!(
        "{} video file(s) found, {} new",
        found.len(),
        admitted.len()
    );
    coordinator.wait_idle().await;
    printer.abort();
    info!("folder contents ingested; run `flow watch` for live monitoring");
    Ok(())
}

fn cmd_folder_rm(data_dir: PathBuf, id: String) -> Result<()> {
    let store = Store::open(&data_dir)?;
    let folder = store.remove_watch_folder(&id)?;
    info!("removed watch folder {}", folder.path);
    Ok(())
}

fn cmd_folder_list(data_dir: PathBuf) -> Result<()> {
    let store = Store::open(&data_dir)?;
    let folders = store.watch_folders()?;
    if folders.is_empty() {
        println!("no watch folders registered");
        return Ok(());
    }
    for f in folders {
        println!("  {}  {}", short_id(&f.id), f.path);
    }
    Ok(())
}

fn cmd_tag(data_dir: PathBuf, command: TagCommands) -> Result<()> {
    let store = Store::open(&data_dir)?;
    match command {
        TagCommands::Add { name, color } => {
            let tag = store.add_tag(&name, &color)?;
            info!("created tag {} ({})", tag.name, short_id(&tag.id));
        }
        TagCommands::Rm { id } => {
            let tag = store.remove_tag(&id)?;
            info!("removed tag {} from the catalog and all entries", tag.name);
        }
        TagCommands::List => {
            let tags = store.tags()?;
            if tags.is_empty() {
                println!("no tags");
            }
            for t in tags {
                println!("  {}  {}  {}", short_id(&t.id), t.color, t.name);
            }
        }
        TagCommands::Set { video_id, tag_id } => {
            let entry = store.tag_video(&video_id, &tag_id)?;
            info!("{} now has {} tag(s)", entry.filename, entry.tag_ids.len());
        }
        TagCommands::Unset { video_id, tag_id } => {
            let entry = store.untag_video(&video_id, &tag_id)?;
            info!("{} now has {} tag(s)", entry.filename, entry.tag_ids.len());
        }
    }
    Ok(())
}

fn cmd_settings(
    data_dir: PathBuf,
    max_count: Option<u32>,
    quality: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    let store = Store::open(&data_dir)?;
    let current = store.settings()?.thumbnails;

    if max_count.is_none() && quality.is_none() && width.is_none() && height.is_none() {
        println!("thumbnail settings:");
        println!("  maxCount: {}", current.max_count);
        println!("  quality:  {}", current.quality);
        println!("  size:     {}x{}", current.width, current.height);
        return Ok(());
    }

    let updated = ThumbnailSettings {
        max_count: max_count.unwrap_or(current.max_count),
        quality: quality.unwrap_or(current.quality),
        width: width.unwrap_or(current.width),
        height: height.unwrap_or(current.height),
    };
    store.set_thumbnail_settings(updated)?;
    info!(
        "settings updated: {} frames at {}x{}, quality {} (in-flight jobs unaffected)",
        updated.max_count, updated.width, updated.height, updated.quality
    );
    Ok(())
}

fn cmd_check() -> Result<()> {
    println!("checking dependencies...\n");

    let ffmpeg_ok = flow_media::check_ffmpeg();
    println!("  ffmpeg:  {}", if ffmpeg_ok { "OK" } else { "NOT FOUND" });

    let ffprobe_ok = flow_media::check_ffprobe();
    println!("  ffprobe: {}", if ffprobe_ok { "OK" } else { "NOT FOUND" });

    println!();
    if !ffmpeg_ok || !ffprobe_ok {
        println!("WARNING: FFmpeg (ffmpeg + ffprobe) is required for thumbnail generation.");
        println!("Please install it and ensure both binaries are in your PATH.");
        println!("Download: https://ffmpeg.org/download.html");
    } else {
        println!("all checks passed!");
    }
    Ok(())
}

fn print_outcomes(ctx: &CatalogContext, admitted: &[flow_store::VideoEntry]) -> Result<()> {
    for entry in admitted {
        if let Some(current) = ctx.store.video(&entry.id)? {
            match current.processing_status {
                ProcessingStatus::Completed => info!(
                    "{}: completed with {} thumbnail(s)",
                    current.filename,
                    current.thumbnails.len()
                ),
                ProcessingStatus::Error => warn!("{}: failed, retry with `flow regen {}`",
                    current.filename,
                    short_id(&current.id)
                ),
                status => debug!("{}: {:?}", current.filename, status),
            }
        }
    }
    Ok(())
}
