//! Message-level handlers: persona onboarding, gated chat, payment proofs
//! and Telegram Stars settlement.

use anyhow::Result;
use log::{error, info, warn};
use teloxide::{
    net::Download,
    prelude::*,
    types::{KeyboardRemove, ParseMode, PreCheckoutQuery},
};

use amora_core::helpers::bot_commands::ChatState;

use crate::ai::models::ModelTier;
use crate::ai::prompt::{build_prompt, persona_prompt, HISTORY_WINDOW};
use crate::callbacks::{offer_keyboard, offer_text};
use crate::dependencies::BotDependencies;
use crate::entitlements::dto::Direction;
use crate::entitlements::gate::{self, GateDecision, QuotaWarning};
use crate::entitlements::handler::StoreError;
use crate::payment::stars::SuccessfulPaymentEvent;

use super::answers::{persona_keyboard, PERSONA_OPTIONS};
use super::ChatDialogue;

pub async fn handle_persona_choice(
    bot: Bot,
    msg: Message,
    dialogue: ChatDialogue,
    bot_deps: BotDependencies,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    let Some(persona) = PERSONA_OPTIONS
        .iter()
        .find(|p| p.eq_ignore_ascii_case(text.trim()))
    else {
        bot.send_message(msg.chat.id, "Pick one of the options below 👇")
            .reply_markup(persona_keyboard())
            .await?;
        return Ok(());
    };

    let username = user.username.clone().unwrap_or_else(|| user.first_name.clone());
    bot_deps
        .entitlements
        .record_user(user_id, &username, Some(&persona.to_lowercase()))?;
    dialogue.update(ChatState::Chat).await?;
    info!("user {} chose persona {}", user_id, persona);

    bot.send_message(
        msg.chat.id,
        format!(
            "😘 Mmm, {} it is. I like that.\n\nSay hi, or pick a companion with /characters 💕",
            persona
        ),
    )
    .reply_markup(KeyboardRemove::new())
    .await?;
    Ok(())
}

pub async fn handle_chat_message(bot: Bot, msg: Message, bot_deps: BotDependencies) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let Some(text) = msg.text().map(str::to_owned) else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    let lock = bot_deps.lock_for(user_id);
    let _guard = lock.lock().await;

    let username = user.username.clone().unwrap_or_else(|| user.first_name.clone());

    // store failures deny the serve but still resolve to a visible reply;
    // the typed error never escapes the message boundary
    if let Err(e) = chat_turn(&bot, &msg, &bot_deps, user_id, &username, &text).await {
        match e.downcast_ref::<StoreError>() {
            Some(store_error) => {
                error!("chat turn denied for user {}: {}", user_id, store_error);
                bot.send_message(
                    msg.chat.id,
                    "😔 Something glitched on my side... give me a moment and try again?",
                )
                .await?;
            }
            None => return Err(e),
        }
    }
    Ok(())
}

async fn chat_turn(
    bot: &Bot,
    msg: &Message,
    bot_deps: &BotDependencies,
    user_id: i64,
    username: &str,
    text: &str,
) -> Result<()> {
    bot_deps.entitlements.record_user(user_id, username, None)?;

    match gate::evaluate(
        &bot_deps.entitlements,
        user_id,
        bot_deps.config.free_message_limit,
    )? {
        GateDecision::Offer { used, limit } => {
            // denied messages are never appended, so they don't consume quota
            info!("user {} hit the free limit ({}/{})", user_id, used, limit);
            bot.send_message(msg.chat.id, offer_text(used, limit))
                .reply_markup(offer_keyboard(bot_deps))
                .await?;
            return Ok(());
        }
        GateDecision::Serve { .. } => {}
    }

    let (character_prompt, tier) = match bot_deps.entitlements.get_active_character(user_id)? {
        Some(id) => match bot_deps.catalog.by_id(&id) {
            Some(character) => (
                character.prompt.clone(),
                ModelTier::for_price(character.price_stars),
            ),
            None => {
                warn!("user {} has stale active character '{}'", user_id, id);
                (default_prompt(bot_deps, user_id)?, ModelTier::Free)
            }
        },
        None => (default_prompt(bot_deps, user_id)?, ModelTier::Free),
    };

    let history = bot_deps.entitlements.recent_messages(user_id, HISTORY_WINDOW)?;
    let prompt = build_prompt(&character_prompt, &history, text);

    bot.send_chat_action(msg.chat.id, teloxide::types::ChatAction::Typing)
        .await
        .ok();

    let reply = match bot_deps.ai.generate_reply(&prompt, tier).await {
        Ok(reply) => reply,
        Err(e) => {
            // the message is not recorded, so the failed turn costs nothing
            error!("generation failed for user {}: {}", user_id, e);
            bot.send_message(
                msg.chat.id,
                "😔 I spaced out for a second... say that again?",
            )
            .await?;
            return Ok(());
        }
    };

    bot_deps
        .entitlements
        .append_message(user_id, text, Direction::FromUser)?;
    bot_deps
        .entitlements
        .append_message(user_id, &reply, Direction::FromBot)?;

    bot.send_message(msg.chat.id, &reply).await?;

    if !bot_deps.entitlements.has_unlimited_access(user_id)? {
        let used = bot_deps.entitlements.count_user_messages(user_id)?;
        match gate::quota_warning(used, bot_deps.config.free_message_limit) {
            Some(QuotaWarning::LastFree) => {
                bot.send_message(
                    msg.chat.id,
                    "💔 That was your last free message! Unlock me with /pay and we never have to stop 😘",
                )
                .await?;
            }
            Some(QuotaWarning::Remaining(n)) => {
                bot.send_message(
                    msg.chat.id,
                    format!("💕 Just so you know... only {} free messages left!", n),
                )
                .await?;
            }
            None => {}
        }
    }
    Ok(())
}

fn default_prompt(bot_deps: &BotDependencies, user_id: i64) -> Result<String> {
    let persona = bot_deps
        .entitlements
        .persona(user_id)?
        .unwrap_or_else(|| "sweet".to_string());
    Ok(persona_prompt(&persona))
}

/// Photo in a private chat is treated as a UPI payment proof: download,
/// OCR outside the per-user lock, then settle under it.
pub async fn handle_payment_proof(bot: Bot, msg: Message, bot_deps: BotDependencies) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let Some(photos) = msg.photo() else {
        return Ok(());
    };
    let Some(photo) = photos.last() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    info!("user {} sent a payment proof", user_id);

    bot.send_message(msg.chat.id, "🔍 Checking your payment, give me a moment...")
        .await?;

    let file_info = bot.get_file(photo.file.id.clone()).await?;
    let local_path = format!("/tmp/{}_proof_{}.jpg", user_id, photo.file.id);
    let mut dst = tokio::fs::File::create(&local_path).await?;
    bot.download_file(&file_info.path, &mut dst).await?;
    let image = tokio::fs::read(&local_path).await?;
    tokio::fs::remove_file(&local_path).await.ok();

    let extracted = match bot_deps.ocr.extract_text(&image).await {
        Ok(text) => text,
        Err(e) => {
            warn!("OCR failed for user {}: {}", user_id, e);
            bot.send_message(
                msg.chat.id,
                "😔 I couldn't read that screenshot. Please try a clearer one, \
                 or wait a bit and resend it.",
            )
            .await?;
            return Ok(());
        }
    };

    let lock = bot_deps.lock_for(user_id);
    let _guard = lock.lock().await;

    let outcome = match bot_deps
        .manual
        .settle(&bot_deps.entitlements, user_id, &extracted)
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // fail closed, but still answer the user
            error!("UPI settlement failed for user {}: {}", user_id, e);
            bot.send_message(
                msg.chat.id,
                "😔 Something went wrong verifying your payment. \
                 Please send the screenshot again in a moment.",
            )
            .await?;
            return Ok(());
        }
    };
    match outcome {
        Some(settlement) if settlement.already_settled => {
            bot.send_message(
                msg.chat.id,
                "👑 You already have unlimited access! Just keep chatting 😘",
            )
            .await?;
        }
        Some(_) => {
            info!("UPI proof accepted for user {}", user_id);
            bot.send_message(
                msg.chat.id,
                "🎉 <b>Payment verified!</b>\n\nYou now have unlimited access, baby 👑😘",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        None => {
            info!("UPI proof rejected for user {}", user_id);
            bot.send_message(
                msg.chat.id,
                "😕 I couldn't match that payment. Make sure the screenshot clearly \
                 shows the amount and the UPI id, then send it again.",
            )
            .await?;
        }
    }
    Ok(())
}

pub async fn handle_pre_checkout(
    bot: Bot,
    query: PreCheckoutQuery,
    bot_deps: BotDependencies,
) -> Result<()> {
    match bot_deps.stars.validate_pre_checkout(&query.currency) {
        Ok(()) => {
            bot.answer_pre_checkout_query(query.id, true).await?;
        }
        Err(e) => {
            warn!("pre-checkout rejected: {}", e);
            bot.answer_pre_checkout_query(query.id, false)
                .error_message("This payment can't be processed.")
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_successful_payment(
    bot: Bot,
    msg: Message,
    bot_deps: BotDependencies,
) -> Result<()> {
    let Some(payment) = msg.successful_payment() else {
        return Ok(());
    };
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;

    let lock = bot_deps.lock_for(user_id);
    let _guard = lock.lock().await;

    let event = SuccessfulPaymentEvent {
        currency: payment.currency.to_string(),
        total_amount: payment.total_amount as u32,
        invoice_payload: payment.invoice_payload.clone(),
        telegram_payment_charge_id: payment.telegram_payment_charge_id.to_string(),
    };

    match bot_deps
        .stars
        .settle(&bot_deps.entitlements, &bot_deps.catalog, &event)
    {
        Ok(settlement) if settlement.already_settled => {
            info!("replayed stars payment {} ignored", event.telegram_payment_charge_id);
        }
        Ok(settlement) => {
            let text = match settlement.target.character_id() {
                Some(id) => {
                    let name = bot_deps
                        .catalog
                        .by_id(id)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| id.to_string());
                    format!(
                        "🎉 <b>{} is yours now!</b>\n\nShe's already waiting for you... say hi 😘",
                        name
                    )
                }
                None => "🎉 <b>Unlimited access unlocked!</b>\n\nNo more limits, baby 👑".to_string(),
            };
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            // fail closed: nothing was granted, but the user did pay
            error!(
                "stars settlement failed for user {} (charge {}): {}",
                user_id, event.telegram_payment_charge_id, e
            );
            bot.send_message(
                msg.chat.id,
                "😔 Something went wrong finalizing your payment. \
                 Support will sort it out shortly.",
            )
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characters::handler::CharacterCatalog;
    use crate::config::BotConfig;
    use crate::entitlements::handler::EntitlementStore;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> BotConfig {
        BotConfig {
            openrouter_api_key: "sk-test".to_string(),
            openrouter_base_url: "http://localhost:1".to_string(),
            free_message_limit: 10,
            expected_upi_id: "amora@upi".to_string(),
            expected_amount: 49,
            qr_image_path: None,
            fuzzy_match_threshold: 0.6,
            characters_path: "characters.json".to_string(),
            upi_ledger_path: std::env::temp_dir()
                .join(format!("ledger-{}.json", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            db_path: "unused".to_string(),
            unlimited_price_stars: 150,
            payment_link_endpoint: None,
            payment_link_api_key: None,
            ocr_endpoint: None,
            admin_user_id: None,
        }
    }

    fn incoming_text_message(user_id: i64, text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 10,
            "date": 1,
            "chat": {"id": user_id, "type": "private", "first_name": "Test"},
            "from": {"id": user_id, "is_bot": false, "first_name": "Test"},
            "text": text
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn store_failure_on_the_chat_path_still_answers_the_user() {
        let server = MockServer::start().await;
        // stand-in Telegram API: every call succeeds and the handler's
        // outgoing reply is counted
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "message_id": 1,
                    "date": 1,
                    "chat": {"id": 7, "type": "private", "first_name": "Test"},
                    "text": "ok"
                }
            })))
            .expect(1..)
            .mount(&server)
            .await;
        let bot =
            Bot::new("123:test").set_api_url(reqwest::Url::parse(&server.uri()).unwrap());

        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = EntitlementStore::new(&db).unwrap();
        // a corrupt user record makes every store read on the gate path fail
        db.open_tree("users")
            .unwrap()
            .insert(7i64.to_be_bytes(), &b"not json"[..])
            .unwrap();

        let catalog = CharacterCatalog::from_slice(
            br#"[{"id": "aisha", "name": "Aisha", "age": 21, "role": "College student",
                  "region": "Mumbai", "language": "Hinglish",
                  "description": "Sweet", "is_locked": false,
                  "price_stars": 0, "prompt": "You are Aisha."}]"#,
        )
        .unwrap();
        let bot_deps = BotDependencies::new(test_config(), store, catalog);

        let result = handle_chat_message(bot, incoming_text_message(7, "hi"), bot_deps).await;
        assert!(result.is_ok());
        // the mock's expect(1..) verifies on drop that a reply went out
    }
}
