use std::sync::Arc;
use std::time::Duration;

use survey_bot::bot::SurveyBot;
use survey_bot::catalog::Catalog;
use survey_bot::channels::{Channel, CliChannel, TelegramChannel};
use survey_bot::config::{Config, SubmitPolicy};
use survey_bot::engine::ConversationEngine;
use survey_bot::persist::SheetsGateway;
use survey_bot::session::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Configuration problems must keep us out of the event loop entirely.
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Required: BOT_TOKEN, SPREADSHEET_ID, GOOGLE_SA_KEY");
        std::process::exit(1);
    });

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_path(path).unwrap_or_else(|e| {
            eprintln!("Error: invalid catalog at {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => Catalog::builtin(),
    };

    eprintln!("📋 Survey Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Categories: {}",
        catalog
            .categories()
            .iter()
            .map(|c| c.key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!(
        "   Submit policy: {}",
        match config.submit_policy {
            SubmitPolicy::Auto => "auto (last answer submits)",
            SubmitPolicy::Explicit => "explicit (submit button)",
        }
    );
    eprintln!("   Spreadsheet: {}", config.spreadsheet_id);

    let store = Arc::new(SessionStore::new());
    let mut engine = ConversationEngine::new(
        Arc::new(catalog),
        Arc::clone(&store),
        config.submit_policy,
    );
    if let Some(url) = &config.banner_url {
        engine = engine.with_banner(url.clone());
    }

    // SURVEY_CHANNEL=cli exercises the same flow from a terminal.
    let channel: Arc<dyn Channel> = match std::env::var("SURVEY_CHANNEL").as_deref() {
        Ok("cli") => {
            eprintln!("   Channel: cli (type :token to press a button)\n");
            Arc::new(CliChannel::new())
        }
        _ => {
            eprintln!("   Channel: telegram\n");
            Arc::new(TelegramChannel::new(config.bot_token.clone()))
        }
    };

    let gateway = Arc::new(SheetsGateway::new(
        config.service_account.clone(),
        config.spreadsheet_id.clone(),
    ));

    let bot = SurveyBot::new(
        Arc::new(engine),
        channel,
        gateway,
        store,
        Duration::from_secs(config.session_idle_secs),
    );
    bot.run().await?;

    Ok(())
}
