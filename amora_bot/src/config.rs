use std::env;

use anyhow::{bail, Context, Result};

/// Everything the bot reads from the environment, resolved once at startup.
/// Missing required values abort the boot instead of surfacing mid-chat.
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub free_message_limit: u32,
    pub expected_upi_id: String,
    pub expected_amount: u32,
    pub qr_image_path: Option<String>,
    pub fuzzy_match_threshold: f64,
    pub characters_path: String,
    pub upi_ledger_path: String,
    pub db_path: String,
    pub unlimited_price_stars: u32,
    pub payment_link_endpoint: Option<String>,
    pub payment_link_api_key: Option<String>,
    pub ocr_endpoint: Option<String>,
    pub admin_user_id: Option<u64>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let openrouter_api_key =
            env::var("OPENROUTER_API_KEY").context("OPENROUTER_API_KEY not set")?;
        let openrouter_base_url = var_or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1");

        let free_message_limit: u32 = var_or("FREE_MESSAGE_LIMIT", "10")
            .parse()
            .context("FREE_MESSAGE_LIMIT must be a number")?;

        let expected_upi_id = env::var("EXPECTED_UPI_ID").context("EXPECTED_UPI_ID not set")?;
        let expected_amount: u32 = var_or("EXPECTED_AMOUNT", "49")
            .parse()
            .context("EXPECTED_AMOUNT must be a number")?;

        let fuzzy_match_threshold: f64 = var_or("FUZZY_MATCH_THRESHOLD", "0.6")
            .parse()
            .context("FUZZY_MATCH_THRESHOLD must be a number")?;
        if !(0.0..=1.0).contains(&fuzzy_match_threshold) {
            bail!("FUZZY_MATCH_THRESHOLD must be between 0 and 1");
        }

        let unlimited_price_stars: u32 = var_or("UNLIMITED_PRICE_STARS", "150")
            .parse()
            .context("UNLIMITED_PRICE_STARS must be a number")?;

        let admin_user_id = match opt_var("ADMIN_USER_ID") {
            Some(raw) => Some(raw.parse().context("ADMIN_USER_ID must be a number")?),
            None => None,
        };

        Ok(BotConfig {
            openrouter_api_key,
            openrouter_base_url,
            free_message_limit,
            expected_upi_id,
            expected_amount,
            qr_image_path: opt_var("QR_IMAGE_PATH"),
            fuzzy_match_threshold,
            characters_path: var_or("CHARACTERS_PATH", "characters.json"),
            upi_ledger_path: var_or("UPI_LEDGER_PATH", "upi_ledger.json"),
            db_path: var_or("AMORA_DB_PATH", "amora_db"),
            unlimited_price_stars,
            payment_link_endpoint: opt_var("PAYMENT_LINK_ENDPOINT"),
            payment_link_api_key: opt_var("PAYMENT_LINK_API_KEY"),
            ocr_endpoint: opt_var("OCR_ENDPOINT"),
            admin_user_id,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn opt_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}
