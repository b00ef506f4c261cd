//! # Sprout CLI
//!
//! Terminal host for the Sprout storage and authentication core.
//!
//! ## Usage
//!
//! ```bash
//! # Sign up on this device only
//! sprout register --email ada@example.com --first-name Ada --last-name Lovelace
//!
//! # Move to the server and sign in there
//! sprout mode cloud
//! SPROUT_PASSWORD=secret sprout login --email ada@example.com
//!
//! # Keep the device in sync until Ctrl+C
//! sprout watch
//! ```
//!
//! ## Environment Variables
//!
//! - `SPROUT_API_URL`: server base URL
//! - `SPROUT_DATA_DIR`: directory holding `sprout.db`
//! - `SPROUT_PASSWORD`: password for `register` and `login`
//! - `SPROUT_LANG`: message language (`en`, `fr`)
//! - `RUST_LOG`: log filter

mod gate;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use sprout_core::{
    AutoConfirm, ClearOutcome, ConfirmationGate, HttpRemote, Locale, RegisterRequest,
    SproutConfig, SqliteStore, StorageMode, StorageModeController, SwitchOutcome, UnifiedError,
    UserRecord,
};

use gate::PromptGate;

/// Sprout - adaptive local/cloud storage
#[derive(Parser, Debug)]
#[command(name = "sprout", version, about = "Sprout adaptive storage and sign-in")]
struct Args {
    /// Server base URL
    #[arg(long, env = "SPROUT_API_URL", global = true)]
    api_url: Option<String>,

    /// Directory holding the device database
    #[arg(long, env = "SPROUT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Message language
    #[arg(long, default_value = "en", env = "SPROUT_LANG", global = true)]
    lang: String,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show mode, connectivity and storage stats
    Status,
    /// Create an account in the active mode and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SPROUT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Sign in to the active mode
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SPROUT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out of the active mode
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Switch between local and cloud storage
    Mode {
        /// Target mode (local or cloud)
        #[arg(value_parser = parse_mode)]
        mode: StorageMode,
    },
    /// Save a user record read from a JSON file
    Save {
        /// Path to the record
        file: PathBuf,
    },
    /// Print the stored user record
    Show,
    /// Push the local record to the server
    Sync,
    /// Delete the stored record everywhere
    Clear,
    /// Replace the record with its backup copy
    RestoreBackup,
    /// Run the background connectivity poll and auto-sync until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sprout=info,sprout_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let locale = Locale::parse(&args.lang).unwrap_or_default();

    let controller = open_controller(&args).await?;
    controller
        .initialize()
        .await
        .map_err(|e| explain(e, locale))?;

    run(&controller, args.command, locale).await
}

// ── Setup ────────────────────────────────────────────────────────────────────

async fn open_controller(args: &Args) -> color_eyre::Result<Arc<StorageModeController>> {
    let mut config = SproutConfig::from_env();
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .ok_or_else(|| eyre!("could not determine a data directory, pass --data-dir"))?
            .join("sprout"),
    };
    std::fs::create_dir_all(&data_dir)
        .wrap_err_with(|| format!("creating {}", data_dir.display()))?;

    let db_path = data_dir.join("sprout.db");
    tracing::debug!(path = %db_path.display(), api_url = %config.api_url, "Opening device store");

    let store = SqliteStore::open(Some(&db_path)).wrap_err("opening device store")?;
    let remote = HttpRemote::new(&config.api_url).wrap_err("configuring server client")?;

    let gate: Arc<dyn ConfirmationGate> = if args.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(PromptGate)
    };

    let controller =
        StorageModeController::open(&config, Arc::new(store), Arc::new(remote), gate).await;
    Ok(Arc::new(controller))
}

fn parse_mode(raw: &str) -> Result<StorageMode, String> {
    raw.parse().map_err(|e: sprout_core::Error| e.to_string())
}

/// Turn a core failure into a report carrying the user-facing message
fn explain(err: sprout_core::Error, locale: Locale) -> color_eyre::Report {
    let unified = UnifiedError::from_error(&err, locale);
    let headline = match unified.action {
        Some(action) => format!("{} ({})", unified.message, action.label),
        None => unified.message,
    };
    eyre!("[{}] {err}", err.code()).wrap_err(headline)
}

// ── Commands ─────────────────────────────────────────────────────────────────

async fn run(
    controller: &Arc<StorageModeController>,
    command: Command,
    locale: Locale,
) -> color_eyre::Result<()> {
    let auth = controller.auth();

    match command {
        Command::Status => {
            let state = controller.state();
            println!("{}", serde_json::to_string_pretty(&state)?);
            match auth.current_user().await {
                Some(user) => println!("signed in as {} ({})", user.email, user.mode),
                None => println!("not signed in"),
            }
        }
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let request = RegisterRequest::new(email, password, first_name, last_name);
            let session = auth.register(&request).await.map_err(|e| explain(e, locale))?;
            println!("registered {} in {} mode", session.user.email, session.user.mode);
            controller.initialize().await.map_err(|e| explain(e, locale))?;
        }
        Command::Login { email, password } => {
            let session = auth
                .login(&email, &password)
                .await
                .map_err(|e| explain(e, locale))?;
            println!("signed in as {} ({} mode)", session.user.email, session.user.mode);
            controller.initialize().await.map_err(|e| explain(e, locale))?;
        }
        Command::Logout => {
            auth.logout().await.map_err(|e| explain(e, locale))?;
            println!("signed out");
        }
        Command::Whoami => match auth.current_user().await {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("not signed in"),
        },
        Command::Mode { mode } => {
            match controller
                .switch_mode(mode)
                .await
                .map_err(|e| explain(e, locale))?
            {
                SwitchOutcome::Unchanged => println!("already in {mode} mode, signed out"),
                SwitchOutcome::Cancelled => println!("switch cancelled"),
                SwitchOutcome::Switched => println!("now in {mode} mode, sign in again"),
            }
        }
        Command::Save { file } => {
            let raw = std::fs::read_to_string(&file)
                .wrap_err_with(|| format!("reading {}", file.display()))?;
            let mut record: UserRecord =
                serde_json::from_str(&raw).wrap_err("parsing user record")?;
            if record.id.is_none() {
                record.id = auth.current_user().await.map(|u| u.id);
            }

            let outcome = controller
                .save_record(&record)
                .await
                .map_err(|e| explain(e, locale))?;
            println!(
                "saved to {:?}{}",
                outcome.source,
                if outcome.needs_sync { ", sync pending" } else { "" }
            );
        }
        Command::Show => {
            let outcome = controller.load_record().await.map_err(|e| explain(e, locale))?;
            match outcome.record {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    tracing::info!(source = ?outcome.source, needs_sync = outcome.needs_sync, "Loaded record");
                }
                None => println!("no record stored"),
            }
        }
        Command::Sync => match controller.sync_data().await.map_err(|e| explain(e, locale))? {
            Some(outcome) if !outcome.needs_sync => println!("synced"),
            Some(_) => println!("server unreachable, sync still pending"),
            None => println!("local mode has nothing to sync"),
        },
        Command::Clear => match controller
            .clear_all_data()
            .await
            .map_err(|e| explain(e, locale))?
        {
            ClearOutcome::Cancelled => println!("clear cancelled"),
            ClearOutcome::Cleared { remote_deleted } => {
                println!("cleared local data");
                if controller.state().mode == StorageMode::Cloud && !remote_deleted {
                    println!("server copy could not be deleted");
                }
            }
        },
        Command::RestoreBackup => {
            let record = controller
                .restore_from_backup()
                .await
                .map_err(|e| explain(e, locale))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Watch => watch(controller).await?,
    }

    Ok(())
}

async fn watch(controller: &Arc<StorageModeController>) -> color_eyre::Result<()> {
    let timers = controller.start_timers();
    let mut states = controller.subscribe();
    tracing::info!(mode = %controller.state().mode, "Watching, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                tracing::info!(
                    online = state.is_online,
                    needs_sync = state.needs_sync,
                    generation = state.generation,
                    "State changed"
                );
            }
        }
    }

    timers.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_core::Error;

    #[test]
    fn test_mode_argument() {
        let args = Args::try_parse_from(["sprout", "--yes", "mode", "Cloud"]).unwrap();
        assert!(args.yes);
        assert!(matches!(args.command, Command::Mode { mode: StorageMode::Cloud }));

        assert!(Args::try_parse_from(["sprout", "mode", "hybrid"]).is_err());
    }

    #[test]
    fn test_login_requires_email() {
        assert!(Args::try_parse_from(["sprout", "login", "--password", "secret"]).is_err());

        let args = Args::try_parse_from([
            "sprout", "login", "--email", "a@b.co", "--password", "secret",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Login { .. }));
    }

    #[test]
    fn test_explain_uses_localized_message() {
        let report = explain(Error::InvalidCredentials, Locale::En);
        let unified = UnifiedError::from_error(&Error::InvalidCredentials, Locale::En);
        assert!(report.to_string().starts_with(&unified.message));
    }
}
