//! slotbot: WhatsApp appointment booking bot
//!
//! Main entry point.
//!
//! Usage:
//!   slotbot                 - Start the webhook server
//!   slotbot --check-config  - Validate configuration and exit
//!   slotbot --help          - Show help

use std::future::Future;
use std::sync::Arc;

use slotbot_calendar::{
    AppointmentBooker, AvailabilityPlanner, CalendarService, GoogleCalendarClient, InMemoryCalendar,
};
use slotbot_core::{CalendarMode, Clock, Config, SessionManager, SystemClock};
use slotbot_whatsapp::{AppState, ConversationHandler, NotifierGateway, start_webhook_server};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Webhook server
    Server,
    /// Load and validate configuration only
    CheckConfig,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("slotbot {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Load .env file before anything reads the environment
    dotenvy::dotenv().ok();

    init_logging();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    match mode {
        RunMode::CheckConfig => {
            println!("Configuration OK");
            println!("  port:      {}", config.server.port);
            println!("  database:  {}", config.session.db_path);
            println!("  timezone:  {}", config.schedule.timezone.name());
            println!(
                "  calendar:  {} ({})",
                config.calendar.calendar_id,
                config.calendar.mode.as_str()
            );
            println!(
                "  whatsapp:  {}",
                if config.whatsapp.has_credentials() {
                    "configured"
                } else {
                    "disabled (no credentials)"
                }
            );
            Ok(())
        }
        _ => run_server(config).await,
    }
}

/// Install the tracing subscriber; `LOG_FORMAT=json` switches to JSON lines
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if wants_json_logs(std::env::var("LOG_FORMAT").ok().as_deref()) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn wants_json_logs(format: Option<&str>) -> bool {
    format.is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check-config" => return RunMode::CheckConfig,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("slotbot - WhatsApp appointment booking bot");
    println!();
    println!("Usage:");
    println!("  slotbot                 Start the webhook server");
    println!("  slotbot --check-config  Validate configuration and exit");
    println!("  slotbot --help          Show this help message");
    println!("  slotbot --version       Show version");
    println!();
    println!("Configuration is read from slotbot.toml (if present) and the environment.");
    println!("Environment Variables:");
    println!("  PORT                    HTTP port (default: 8000)");
    println!("  DB_PATH                 Session database (default: data/slotbot.db)");
    println!("  TZ                      IANA timezone (default: Asia/Jerusalem)");
    println!("  WA_TOKEN / PHONE_ID     WhatsApp Cloud API credentials");
    println!("  VERIFY_TOKEN            Webhook verification token");
    println!("  CALENDAR_ID             Calendar to book into (default: primary)");
    println!("  SA_CREDS_PATH           Google service account key file");
    println!("  CALENDAR_DELEGATED_USER User impersonated by the service account");
    println!("  CALENDAR_ACCESS_TOKEN   Static calendar bearer token");
    println!("  CALENDAR_MODE           google (default) or local (in-process, not persisted)");
    println!("  OPERATOR_PHONE          Receives new booking notifications");
    println!("  LOG_FORMAT              text (default) or json");
}

/// Wire the components and serve until Ctrl+C
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting slotbot...");
    tracing::info!("Timezone: {}", config.schedule.timezone.name());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sessions = SessionManager::with_options(&config.session.db_path, clock.clone(), config.session.ttl())
        .map_err(|e| anyhow::anyhow!("Failed to open session store: {}", e))?;
    tracing::info!("Session store: {}", config.session.db_path);

    let calendar: Arc<dyn CalendarService> = match config.calendar.mode {
        CalendarMode::Local => {
            tracing::warn!("CALENDAR_MODE=local: bookings are kept in memory and lost on restart");
            Arc::new(InMemoryCalendar::new())
        }
        CalendarMode::Google => Arc::new(
            GoogleCalendarClient::new(&config.calendar)
                .map_err(|e| anyhow::anyhow!("Failed to create calendar client: {}", e))?,
        ),
    };

    let notifier = NotifierGateway::from_config(&config.whatsapp)
        .map_err(|e| anyhow::anyhow!("Failed to create WhatsApp client: {}", e))?;

    let planner = AvailabilityPlanner::new(calendar.clone(), clock);
    let booker = AppointmentBooker::new(calendar, &config.calendar, config.schedule.timezone);
    let handler = ConversationHandler::new(sessions.clone(), planner, booker, Arc::new(notifier), &config);

    let state = AppState {
        handler: Arc::new(handler),
        sessions,
        verify_token: config.whatsapp.verify_token.clone(),
    };

    let port = config.server.port;
    let server = tokio::spawn(start_webhook_server(port, state));

    tracing::info!("slotbot initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    supervise(server, tokio::signal::ctrl_c()).await
}

/// Wait for shutdown; a server that stops on its own is an error
async fn supervise<F>(mut server: JoinHandle<slotbot_whatsapp::Result<()>>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        signal = shutdown => {
            signal?;
            tracing::info!("Shutting down...");
            server.abort();
            Ok(())
        }
        joined = &mut server => {
            let served = joined.map_err(|e| anyhow::anyhow!("Webhook server task failed: {}", e))?;
            served.map_err(|e| anyhow::anyhow!("Webhook server error: {}", e))?;
            Err(anyhow::anyhow!("Webhook server stopped unexpectedly"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbot_whatsapp::WhatsAppError;

    #[test]
    fn test_log_format_selection() {
        assert!(wants_json_logs(Some("json")));
        assert!(wants_json_logs(Some(" JSON ")));
        assert!(!wants_json_logs(Some("text")));
        assert!(!wants_json_logs(None));
    }

    #[tokio::test]
    async fn test_server_failure_is_an_error() {
        let server = tokio::spawn(async {
            Err::<(), _>(WhatsAppError::Config("Address already in use".to_string()))
        });
        let err = supervise(server, std::future::pending::<std::io::Result<()>>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Address already in use"));
    }

    #[tokio::test]
    async fn test_server_exit_is_an_error() {
        let server = tokio::spawn(async { Ok::<(), WhatsAppError>(()) });
        let err = supervise(server, std::future::pending::<std::io::Result<()>>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("stopped unexpectedly"));
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_server() {
        let server = tokio::spawn(std::future::pending::<slotbot_whatsapp::Result<()>>());
        supervise(server, async { Ok::<(), std::io::Error>(()) }).await.unwrap();
    }
}

