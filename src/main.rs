//! Deauth Whitelist - keep deauth attacks away from protected networks.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deauth_whitelist::config::{ConfigError, ConfigLoader, WhitelistConfig};
use deauth_whitelist::display;
use deauth_whitelist::guard::{GuardError, WhitelistGuard};
use deauth_whitelist::watcher::{run_reloader, WhitelistWatcher};
use deauth_whitelist::web::{WebError, WebServer};
use deauth_whitelist::whitelist::{
    EnforcementMode, EntryUpdate, ImportMode, ImportOptions, NewEntry, WhitelistDocument,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Strict,
    Lenient,
}

impl From<ModeArg> for EnforcementMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Strict => EnforcementMode::Strict,
            ModeArg::Lenient => EnforcementMode::Lenient,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImportModeArg {
    Merge,
    Replace,
}

impl From<ImportModeArg> for ImportMode {
    fn from(arg: ImportModeArg) -> Self {
        match arg {
            ImportModeArg::Merge => ImportMode::Merge,
            ImportModeArg::Replace => ImportMode::Replace,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "deauth-whitelist",
    about = "Keep deauth attacks away from whitelisted networks",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured enforcement mode.
    #[arg(short, long, value_enum, global = true)]
    mode: Option<ModeArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP management API and reload on file changes.
    Serve {
        /// Address to bind, overriding the config.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding the config.
        #[arg(short, long)]
        port: Option<u16>,
        /// Do not watch the whitelist file for external edits.
        #[arg(long)]
        no_watch: bool,
    },
    /// Preview the decision for a target network.
    Check {
        /// Target BSSID.
        #[arg(short, long, default_value = "")]
        bssid: String,
        /// Target SSID.
        #[arg(short, long, default_value = "")]
        ssid: String,
    },
    /// List whitelisted networks.
    List {
        /// Print raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Add a network.
    Add {
        /// BSSID or SSID, detected automatically.
        identifier: Option<String>,
        #[arg(long)]
        bssid: Option<String>,
        #[arg(long)]
        ssid: Option<String>,
        /// Treat the SSID as a shell-style wildcard.
        #[arg(long)]
        wildcard: bool,
        /// Treat the SSID as a regular expression.
        #[arg(long, conflicts_with = "wildcard")]
        regex: bool,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Add the entry disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// Remove a network by id, BSSID or SSID.
    Remove { target: String },
    /// Change fields of an existing entry.
    Update {
        id: u64,
        #[arg(long)]
        bssid: Option<String>,
        #[arg(long)]
        ssid: Option<String>,
        #[arg(long)]
        wildcard: Option<bool>,
        #[arg(long)]
        regex: Option<bool>,
        #[arg(short, long)]
        description: Option<String>,
        /// Replace all tags.
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,
    },
    /// Enable or disable an entry.
    Toggle {
        id: u64,
        #[arg(long, conflicts_with = "enable")]
        disable: bool,
        #[arg(long)]
        enable: bool,
    },
    /// Export the whitelist as JSON.
    Export {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import networks from a JSON export.
    Import {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = ImportModeArg::Merge)]
        import_mode: ImportModeArg,
        /// Skip the backup taken before importing.
        #[arg(long)]
        no_backup: bool,
    },
    /// Show whitelist statistics.
    Stats,
    /// Back up the whitelist file now.
    Backup,
    /// Restore the newest backup.
    Restore,
}

/// Errors surfaced by the command line.
#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Web(#[from] WebError),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<WhitelistConfig, CliError> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(mode) = cli.mode {
        config.enforcement_mode = mode.into();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(&cli)?;
    if let Commands::Serve {
        host,
        port,
        no_watch,
    } = &cli.command
    {
        if let Some(host) = host {
            config.web.host.clone_from(host);
        }
        if let Some(port) = port {
            config.web.port = *port;
        }
        if *no_watch {
            config.watch_file = false;
        }
    }

    let guard = WhitelistGuard::from_config(&config).await;

    match cli.command {
        Commands::Serve { .. } => serve(guard, &config).await?,
        Commands::Check { bssid, ssid } => {
            let verdict = guard.evaluate(&bssid, &ssid);
            display::print_verdict(&bssid, &ssid, &verdict);
        }
        Commands::List { json } => {
            let entries = guard.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                display::print_entries(&entries);
            }
        }
        Commands::Add {
            identifier,
            bssid,
            ssid,
            wildcard,
            regex,
            description,
            tags,
            disabled,
        } => {
            let mut new = match identifier {
                Some(identifier) => NewEntry::from_identifier(&identifier),
                None => NewEntry::default(),
            };
            if bssid.is_some() {
                new.bssid = bssid;
            }
            if ssid.is_some() {
                new.ssid = ssid;
            }
            if new.bssid.is_none() && new.ssid.is_none() {
                return Err(CliError::Usage(
                    "Provide an identifier, --bssid or --ssid".to_string(),
                ));
            }
            new.use_wildcard = wildcard;
            new.use_regex = regex;
            new.description = description.unwrap_or_default();
            new.tags = tags;
            if disabled {
                new = new.disabled();
            }
            let id = guard.add(new).await?;
            display::print_success(&format!("Added entry {id}"));
        }
        Commands::Remove { target } => {
            if let Ok(id) = target.parse::<u64>() {
                let removed = guard.remove(id).await?;
                display::print_success(&format!("Removed entry {} ({})", removed.id, removed.label()));
            } else {
                let removed = guard.remove_identifier(&target).await?;
                display::print_success(&format!("Removed {} entr(ies) for {target}", removed.len()));
            }
        }
        Commands::Update {
            id,
            bssid,
            ssid,
            wildcard,
            regex,
            description,
            tags,
        } => {
            let update = EntryUpdate {
                bssid,
                ssid,
                description,
                enabled: None,
                use_wildcard: wildcard,
                use_regex: regex,
                tags,
            };
            if update.is_empty() {
                return Err(CliError::Usage("Nothing to update".to_string()));
            }
            let updated = guard.update(id, update).await?;
            display::print_entries(std::slice::from_ref(&updated));
        }
        Commands::Toggle {
            id,
            disable,
            enable,
        } => {
            let enabled = if enable || disable {
                !disable
            } else {
                !guard.get(id).await?.enabled
            };
            let toggled = guard.toggle(id, enabled).await?;
            display::print_entries(std::slice::from_ref(&toggled));
        }
        Commands::Export { output } => {
            let json = serde_json::to_string_pretty(&guard.export().await?)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .map_err(|source| CliError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    display::print_success(&format!("Exported to {}", path.display()));
                }
                None => println!("{json}"),
            }
        }
        Commands::Import {
            file,
            import_mode,
            no_backup,
        } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| CliError::Io {
                    path: file.clone(),
                    source,
                })?;
            let document = WhitelistDocument::from_json(&content)?;
            let options = ImportOptions {
                mode: import_mode.into(),
                create_backup: !no_backup,
            };
            let summary = guard.import(document, options).await?;
            display::print_import_summary(&summary);
        }
        Commands::Stats => display::print_stats(&guard.stats().await?),
        Commands::Backup => match guard.create_backup().await? {
            Some(path) => display::print_backup("Backup created", &path),
            None => display::print_success("Nothing to back up"),
        },
        Commands::Restore => {
            let path = guard.restore_latest_backup().await?;
            display::print_backup("Restored", &path);
        }
    }
    Ok(())
}

async fn serve(guard: WhitelistGuard, config: &WhitelistConfig) -> Result<(), CliError> {
    let cancel = CancellationToken::new();

    // The watcher stops when dropped, so it lives until serve returns.
    let _watcher = if config.watch_file {
        match WhitelistWatcher::new(&config.whitelist_file) {
            Ok((watcher, events)) => {
                tokio::spawn(run_reloader(guard.clone(), events, cancel.clone()));
                Some(watcher)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Whitelist file watching disabled");
                None
            }
        }
    } else {
        None
    };

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Cannot listen for interrupts"),
        }
    });

    WebServer::new(guard)
        .with_config(config.web.clone())
        .with_cancel(cancel.clone())
        .run()
        .await?;
    cancel.cancel();
    Ok(())
}
