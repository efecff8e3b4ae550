use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_center::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_REMOTE_TIMEOUT_SEC, DEFAULT_TOAST_AUTO_CLOSE_MS,
};
use notification_center::notifications::{now_millis, DEFAULT_RETENTION_CAP};
use notification_center::panel::time_ago;
use notification_center::{
    BackendMode, DeliveryListener, HttpRemoteStore, InboundMessage, LocalNotificationStore,
    NotificationCenter, NotificationPanel, PushPayload, RelayMessage, RemoteNotificationStore,
    SqliteKeyValueStore, TracingAlertSink,
};

mod cli_style;
use cli_style::get_styles;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Directory holding the local notification database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Where the authoritative notification list lives.
    #[clap(long, value_enum, default_value_t = BackendMode::Local)]
    pub backend: BackendMode,

    /// Base URL of the remote notification document service.
    #[clap(long)]
    pub remote_url: Option<String>,

    /// Timeout in seconds for remote requests.
    #[clap(long, default_value_t = DEFAULT_REMOTE_TIMEOUT_SEC)]
    pub remote_timeout_sec: u64,

    /// Deployment environment tag, appended to the remote collection name.
    #[clap(long)]
    pub environment: Option<String>,

    /// User whose notifications to work with.
    #[clap(long)]
    pub user: Option<String>,

    /// Maximum number of notifications kept.
    #[clap(long, default_value_t = DEFAULT_RETENTION_CAP)]
    pub retention_cap: usize,

    /// How long toasts stay up, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TOAST_AUTO_CLOSE_MS)]
    pub toast_auto_close_ms: u64,

    #[command(subcommand)]
    command: Command,
}

impl CliArgs {
    fn cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            backend: self.backend,
            remote_url: self.remote_url.clone(),
            remote_timeout_sec: self.remote_timeout_sec,
            environment: self.environment.clone(),
            user_id: self.user.clone(),
            retention_cap: self.retention_cap,
            toast_auto_close_ms: self.toast_auto_close_ms,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows all notifications, newest first.
    List,

    /// Delivers a foreground push payload given as JSON.
    Push { payload: String },

    /// Delivers a background relay message given as JSON.
    Relay { message: String },

    /// Marks one notification as read.
    MarkRead { id: String },

    /// Marks every notification as read.
    MarkAllRead,

    /// Deletes one notification.
    Delete { id: String },

    /// Deletes every notification already read.
    DeleteRead,

    /// Deletes every notification.
    Clear,

    /// Subscribes to the list and raises alerts for new arrivals, while
    /// delivering JSON messages read line by line from stdin.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.cli_config(), file_config)?;

    let kv = Arc::new(SqliteKeyValueStore::new(config.local_db_path())?);
    let local = Arc::new(LocalNotificationStore::new(kv, config.retention_cap));
    let remote: Option<Arc<dyn RemoteNotificationStore>> = match &config.remote_url {
        Some(url) => Some(Arc::new(
            HttpRemoteStore::new(url, config.remote_timeout())
                .context("Failed to set up remote notification store")?,
        )),
        None => None,
    };
    let center = Arc::new(NotificationCenter::new(
        config.center_settings(),
        local,
        remote,
    ));
    center.set_user(config.user_id.clone());
    info!("Using {:?} notification storage", center.active_backend());

    if let Err(e) = run_command(cli_args.command, &config, center).await {
        cli_style::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(
    command: Command,
    config: &AppConfig,
    center: Arc<NotificationCenter>,
) -> Result<()> {
    match command {
        Command::List => {
            let records = center.get_all().await;
            cli_style::print_panel_header(NotificationCenter::unread_count(&records));
            if records.is_empty() {
                cli_style::print_empty_list();
            }
            let now = now_millis();
            for record in &records {
                cli_style::print_notification(record, &time_ago(record.timestamp, now));
            }
        }
        Command::Push { payload } => {
            let payload: PushPayload =
                serde_json::from_str(&payload).context("Invalid push payload")?;
            let listener = DeliveryListener::new(center);
            if let Some(id) = listener.deliver(InboundMessage::Foreground(payload)).await {
                cli_style::print_success(&format!("Saved notification {}", id));
            }
        }
        Command::Relay { message } => {
            let message: RelayMessage =
                serde_json::from_str(&message).context("Invalid relay message")?;
            let listener = DeliveryListener::new(center);
            match listener.deliver(InboundMessage::Background(message)).await {
                Some(id) => cli_style::print_success(&format!("Saved notification {}", id)),
                None => cli_style::print_error("Relay message carried no notification"),
            }
        }
        Command::MarkRead { id } => {
            center.mark_as_read(&id).await;
            cli_style::print_success(&format!("Marked {} as read", id));
        }
        Command::MarkAllRead => {
            center.mark_all_as_read().await;
            cli_style::print_success("Marked all notifications as read");
        }
        Command::Delete { id } => {
            center.delete_notification(&id).await;
            cli_style::print_success(&format!("Deleted {}", id));
        }
        Command::DeleteRead => {
            center.delete_all_read().await;
            cli_style::print_success("Deleted read notifications");
        }
        Command::Clear => {
            center.delete_all().await;
            cli_style::print_success("Cleared all notifications");
        }
        Command::Watch => watch(config, center).await?,
    }
    Ok(())
}

async fn watch(config: &AppConfig, center: Arc<NotificationCenter>) -> Result<()> {
    let panel = NotificationPanel::new(center.clone(), config.toast_auto_close());
    let _subscription = panel.attach(Arc::new(TracingAlertSink));
    let listener = DeliveryListener::new(center);

    info!("Watching notifications, reading deliveries from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    if listener.deliver_json(&line).await.is_none() {
                        warn!("Nothing delivered for input line");
                    }
                }
                None => {
                    info!("Input closed, shutting down");
                    break;
                }
            }
        }
    }

    info!(
        "{} notifications, {} unread",
        panel.notifications().len(),
        panel.unread_count()
    );
    Ok(())
}
