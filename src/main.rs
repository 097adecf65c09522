use std::sync::Arc;

use clap::{Parser, Subcommand};
use smallbiz_mcp::{
    build_app,
    calendar_client::GoogleCalendarClient,
    config::{CalendarSettings, Config, ConfigError, Transport},
    database::{DatabaseProbe, PgDatabase, UnconfiguredDatabase},
    google_auth::GoogleAuthorizer,
    logging,
    square_client::SquareClient,
    stdio, AppState,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "smallbiz-mcp", version, about = "MCP server for Square and Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP over the transport selected by MCP_TRANSPORT (default).
    Serve,
    /// Run the Google consent flow once and save the calendar token.
    AuthorizeCalendar,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::AuthorizeCalendar => authorize_calendar().await,
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let payments = Arc::new(SquareClient::new(
        &config.square_access_token,
        config.square_base_url.clone(),
    )?);

    let http = GoogleCalendarClient::http_client()?;
    let authorizer = Arc::new(GoogleAuthorizer::new(http.clone(), config.calendar.clone()));
    let calendar = Arc::new(GoogleCalendarClient::new(
        http,
        config.calendar.calendar_id.clone(),
        authorizer,
    ));

    let database: Arc<dyn DatabaseProbe> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgDatabase::connect_lazy(url)?),
        None => Arc::new(UnconfiguredDatabase),
    };

    let state = AppState::new(
        payments,
        calendar,
        database,
        &config.calendar.default_time_zone,
    );

    match config.transport {
        Transport::Stdio => stdio::serve_stdio(state).await?,
        Transport::Http => {
            let api_token = config.api_token.clone().ok_or(ConfigError::MissingApiToken)?;
            let bind_socket = config.bind_socket()?;
            let app = build_app(state, api_token);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                "server starting"
            );

            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

async fn authorize_calendar() -> Result<(), Box<dyn std::error::Error>> {
    let settings = CalendarSettings::from_env();
    let http = GoogleCalendarClient::http_client()?;
    let authorizer = GoogleAuthorizer::new(http, settings);
    authorizer.authorize().await?;

    info!(path = %authorizer.token_path().display(), "calendar authorization ready");
    Ok(())
}
