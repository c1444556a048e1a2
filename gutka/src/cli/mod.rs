use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gurbani::prelude::*;
use gutka::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

mod content;
mod folders;

#[derive(Parser, Debug)]
#[command(name = "gutka")]
#[command(
    author,
    version,
    about = "Gurbani bookmarks with backup, restore, and import",
    long_about = None
)]
pub struct Cli {
    /// Content API URL. Default: environment `GURBANI_URL` or <https://api.gurbaninow.com/v2>
    #[arg(short = 'u', long, env = "GURBANI_URL", global = true)]
    pub url: Option<String>,

    /// Directory holding the library and settings
    #[arg(long, env = "GUTKA_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Print machine-readable output where applicable
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose mode (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Color mode for CLI and log output
    #[arg(long, value_enum, default_value_t = ColorArg::Auto, global = true)]
    pub color: ColorArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a backup of the library
    Backup(BackupArgs),

    /// Restore a backup under a new import folder
    Restore(RestoreArgs),

    /// Import a backup or a bookmarks file from another app
    Import(ImportArgs),

    /// Manage backup files
    Backups(BackupsArgs),

    /// Manage bookmark folders
    Folders(folders::FoldersArgs),

    /// Show a shabad
    Shabad(content::ShabadArgs),

    /// Show the hukamnama
    Hukamnama(content::HukamnamaArgs),

    /// Search lines
    Search(content::SearchArgs),

    /// Recently viewed shabads
    History,

    /// Show or change settings
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Skip the backup if the last one is more recent than the auto-backup interval
    #[arg(long)]
    pub auto: bool,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup file (.gutkabackup)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// File to import
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// File format. Default: from the file extension
    #[arg(long, value_enum)]
    pub format: Option<ImportFormatArg>,
}

#[derive(Args, Debug)]
pub struct BackupsArgs {
    #[command(subcommand)]
    pub command: BackupsCommands,
}

#[derive(Subcommand, Debug)]
pub enum BackupsCommands {
    /// List backup files, newest first
    List,

    /// Delete a backup file
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Print the full path of a backup file
    Path {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show all settings
    Show,

    /// Change one setting
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ImportFormatArg {
    Native,
    Bookmarks,
    Favorites,
}

impl ImportFormatArg {
    fn to_import_format(self) -> ImportFormat {
        match self {
            Self::Native => ImportFormat::Native,
            Self::Bookmarks => ImportFormat::Bookmarks,
            Self::Favorites => ImportFormat::Favorites,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

/// Per-invocation state shared by command handlers
pub struct AppContext {
    pub paths: AppPaths,
    pub url: Option<String>,
    pub json: bool,
}

impl AppContext {
    pub fn client(&self) -> Result<GurbaniClient> {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.url {
            config = config.base_url(url);
        }
        GurbaniClient::with_config(config).context("creating content client")
    }

    pub fn library_store(&self) -> LibraryStore {
        LibraryStore::at(self.paths.library_file())
    }

    pub fn load_library(&self) -> Result<(LibraryStore, Library)> {
        let store = self.library_store();
        let library = store
            .load()
            .with_context(|| format!("loading {}", self.paths.library_file().display()))?;
        Ok((store, library))
    }

    pub fn backup_service(&self) -> BackupService {
        BackupService::new(BackupConfig::default(), &self.paths)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext {
        paths: AppPaths::from_env(cli.data_dir),
        url: cli.url,
        json: cli.json,
    };

    match cli.command {
        Commands::Backup(args) => handle_backup(&ctx, &args),
        Commands::Restore(args) => {
            handle_import(&ctx, &args.file, Some(ImportFormat::Native)).await
        }
        Commands::Import(args) => {
            let format = args.format.map(ImportFormatArg::to_import_format);
            handle_import(&ctx, &args.file, format).await
        }
        Commands::Backups(args) => handle_backups(&ctx, &args.command),
        Commands::Folders(args) => folders::handle(&ctx, args).await,
        Commands::Shabad(args) => content::handle_shabad(&ctx, &args).await,
        Commands::Hukamnama(args) => content::handle_hukamnama(&ctx, &args).await,
        Commands::Search(args) => content::handle_search(&ctx, &args).await,
        Commands::History => content::handle_history(&ctx),
        Commands::Settings(args) => handle_settings(&ctx, args.command),
    }
}

fn handle_backup(ctx: &AppContext, args: &BackupArgs) -> Result<()> {
    let (_, library) = ctx.load_library()?;
    let settings = ctx.paths.settings_store().load();
    let service = ctx.backup_service();
    let written = if args.auto {
        service.resume_auto_backup_clock()?;
        service.auto_backup(&library, &settings)?
    } else {
        Some(service.export(&library, &settings)?)
    };

    if ctx.json {
        return emit_json(&BackupReport {
            path: written.as_deref(),
            skipped: written.is_none(),
        });
    }
    match written {
        Some(path) => println!("backup written: {}", path.display()),
        None => println!("backup skipped: last backup is recent or auto backup is off"),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct BackupReport<'a> {
    path: Option<&'a Path>,
    skipped: bool,
}

async fn handle_import(ctx: &AppContext, file: &Path, format: Option<ImportFormat>) -> Result<()> {
    let client = ctx.client()?;
    let (store, mut library) = ctx.load_library()?;
    let tables = LookupTables::load(&ctx.paths.resources_dir).context("loading lookup tables")?;
    let settings_store = ctx.paths.settings_store();
    let service = ctx.backup_service();

    let (cancel_sender, mut cancel_state) = new_cancel_channel();
    let signal_forwarder = spawn_cancel_signal_forwarder(cancel_sender);
    let reporter = ProgressReporter::new(ctx.json, &format!("importing {}", file.display()));
    let (progress, events) = ChannelProgress::new();
    let progress_task = spawn_progress_consumer(events, reporter.clone());

    let mut import_ctx =
        ImportContext::new(&mut library, &store, &client, &progress, &mut cancel_state)
            .with_settings_store(&settings_store);
    let result = service
        .import_file(file, format, &tables, &mut import_ctx)
        .await;
    let report = import_ctx.finish();
    drop(progress);
    let _ = progress_task.await;
    signal_forwarder.abort();

    match result {
        Ok(_) => reporter.finish(&format!("imported {} items", report.imported)),
        Err(BackupError::Cancelled) => {
            reporter.finish("cancelled");
            bail!(
                "import cancelled after {} items; imported items were kept",
                report.imported
            );
        }
        Err(err) => {
            reporter.finish("failed");
            return Err(err).with_context(|| format!("importing {}", file.display()));
        }
    }

    if ctx.json {
        return emit_json(&report);
    }
    let root_name = report
        .root
        .and_then(|root| library.folder(root).ok())
        .map_or("", |folder| folder.name.as_str());
    println!(
        "imported {} items in {} folders into '{root_name}'",
        report.imported, report.folders
    );
    if report.settings_restored {
        println!("settings restored from backup");
    }
    if !report.skipped.is_empty() {
        eprintln!("warning: {} records were skipped", report.skipped.len());
        for entry in &report.skipped {
            eprintln!("  {}: {}", entry.location, entry.reason);
        }
    }
    Ok(())
}

fn handle_backups(ctx: &AppContext, command: &BackupsCommands) -> Result<()> {
    let service = ctx.backup_service();
    match command {
        BackupsCommands::List => {
            let backups = service.list_backups()?;
            if ctx.json {
                return emit_json(&backups);
            }
            if backups.is_empty() {
                for dir in service.backup_dirs() {
                    println!("no backups in {}", dir.display());
                }
            }
            for backup in &backups {
                println!(
                    "{}  {:>10}  {}",
                    backup.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    backup.size,
                    backup.name
                );
            }
        }
        BackupsCommands::Delete { name } => {
            service.delete_backup(name)?;
            if !ctx.json {
                println!("deleted {name}");
            }
        }
        BackupsCommands::Path { name } => {
            println!("{}", service.backup_path(name)?.display());
        }
    }
    Ok(())
}

fn handle_settings(ctx: &AppContext, command: SettingsCommands) -> Result<()> {
    let store = ctx.paths.settings_store();
    let mut settings = store.load();
    if let SettingsCommands::Set { key, value } = command {
        settings.set(&key, &value)?;
        store.save(&settings)?;
    }
    if ctx.json {
        return emit_json(&settings);
    }
    let value = serde_json::to_value(&settings)?;
    if let Some(fields) = value.as_object() {
        for (key, value) in fields {
            println!("{key} = {value}");
        }
    }
    Ok(())
}

pub fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

fn spawn_cancel_signal_forwarder(sender: mpsc::UnboundedSender<CancelToken>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("failed to register SIGTERM handler: {err:#}");
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = sender.send(CancelToken::Requested);
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = sigterm.recv() => {},
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        let _ = sender.send(CancelToken::Requested);
    })
}

fn spawn_progress_consumer(
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    reporter: ProgressReporter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::FolderCreated { name, .. } => {
                    reporter.set_message(&format!("folder {name}"));
                }
                ProgressEvent::ItemImported { count, title } => {
                    reporter.set_message(&format!("{count} imported: {title}"));
                }
                ProgressEvent::ItemSkipped { location } => {
                    reporter.set_message(&format!("skipped {location}"));
                }
            }
        }
    })
}

fn progress_enabled(json: bool, stderr_is_tty: bool) -> bool {
    !json && stderr_is_tty
}

#[derive(Clone)]
struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    fn new(json: bool, message: &str) -> Self {
        let enabled = progress_enabled(json, io::stderr().is_terminal());
        if enabled {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar.set_message(message.to_string());
            Self { bar: Some(bar) }
        } else {
            Self { bar: None }
        }
    }

    #[cfg(test)]
    fn enabled(&self) -> bool {
        self.bar.is_some()
    }

    fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}
