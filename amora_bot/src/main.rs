use anyhow::{Context, Result};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;

use amora_core::helpers::bot_commands::ChatState;

mod ai;
mod bot;
mod callbacks;
mod characters;
mod config;
mod dependencies;
mod entitlements;
mod payment;

use crate::bot::handler_tree::handler_tree;
use crate::characters::handler::CharacterCatalog;
use crate::config::BotConfig;
use crate::dependencies::BotDependencies;
use crate::entitlements::handler::EntitlementStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    log::info!("Starting amora_bot...");

    let config = BotConfig::from_env()?;

    // a bad or empty catalog aborts the boot; a running bot with no
    // characters would silently serve nothing
    let catalog = CharacterCatalog::load(std::path::Path::new(&config.characters_path))
        .with_context(|| format!("failed to load catalog from {}", config.characters_path))?;
    log::info!("loaded {} characters", catalog.len());

    let db = sled::open(&config.db_path)
        .with_context(|| format!("failed to open sled DB at {}", config.db_path))?;
    let entitlements = EntitlementStore::new(&db).context("failed to open entitlement trees")?;

    let bot = Bot::from_env();
    let bot_deps = BotDependencies::new(config, entitlements, catalog);

    Dispatcher::builder(bot, handler_tree())
        .dependencies(dptree::deps![bot_deps, InMemStorage::<ChatState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
