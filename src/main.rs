use dotenvy::dotenv;
use gatekeeper_bot::backup::Backup;
use gatekeeper_bot::bot::handlers::Command;
use gatekeeper_bot::bot::telegram::TelegramTransport;
use gatekeeper_bot::bot::{handlers, App};
use gatekeeper_bot::broadcast::Broadcaster;
use gatekeeper_bot::catalog::Catalog;
use gatekeeper_bot::config::Settings;
use gatekeeper_bot::moderation::Moderation;
use gatekeeper_bot::session::Sessions;
use gatekeeper_bot::storage::Storage;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    info!("Starting gatekeeper bot...");

    let settings = init_settings();
    let storage = init_storage(&settings).await;

    let bot = Bot::new(settings.telegram_token.clone());
    let transport = Arc::new(TelegramTransport::new(bot.clone()));

    let catalog = Arc::new(Catalog::new(storage.clone()));
    let moderation = Arc::new(Moderation::new(
        storage.clone(),
        transport.clone(),
        transport.clone(),
    ));
    let broadcaster = Arc::new(Broadcaster::new(storage.clone(), transport));
    let backup = Arc::new(Backup::new(storage.clone()));
    let sessions = Sessions::new(
        storage.clone(),
        catalog.clone(),
        moderation.clone(),
        broadcaster.clone(),
        backup.clone(),
    );

    if let Err(e) = moderation.seed_admins(settings.admin_ids()).await {
        error!("Failed to seed configured admins: {e}");
        std::process::exit(1);
    }

    let app = Arc::new(App {
        settings,
        storage,
        catalog,
        moderation,
        broadcaster,
        backup,
        sessions,
    });

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

async fn init_storage(settings: &Settings) -> Arc<Storage> {
    match Storage::open(&settings.data_dir).await {
        Ok(s) => {
            info!("Store opened at {}.", settings.data_dir);
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to open the store: {e}");
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message().branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            ),
        )
        .branch(Update::filter_message().endpoint(handle_message))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg, app).await,
        Command::Help => handlers::help(bot, msg, app).await,
    };
    if let Err(e) = res {
        error!("Command error: {e:#}");
    }
    respond(())
}

async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::route_message(bot, msg, app).await {
        error!("Message handler error: {e:#}");
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::route_callback(bot, q, app).await {
        error!("Callback handler error: {e:#}");
    }
    respond(())
}
