//! Command handlers. Chat and payment-proof traffic lives in `handler`.

use anyhow::Result;
use log::{info, warn};
use teloxide::{
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, ParseMode},
    utils::command::BotCommands,
};

use amora_core::helpers::bot_commands::{ChatState, Command};

use crate::callbacks::{offer_keyboard, offer_text};
use crate::characters::helpers::character_page;
use crate::dependencies::BotDependencies;

use super::ChatDialogue;

pub const PERSONA_OPTIONS: [&str; 4] = ["Sweet", "Flirty", "Dominant", "Submissive"];

pub fn persona_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("Sweet"), KeyboardButton::new("Flirty")],
        vec![
            KeyboardButton::new("Dominant"),
            KeyboardButton::new("Submissive"),
        ],
    ])
}

pub async fn answers(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: ChatDialogue,
    bot_deps: BotDependencies,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let username = user.username.clone().unwrap_or_else(|| user.first_name.clone());

    match cmd {
        Command::Start => {
            bot_deps.entitlements.record_user(user_id, &username, None)?;
            dialogue.update(ChatState::ChoosingPersona).await?;
            bot.send_message(
                msg.chat.id,
                "💕 <b>Hey, I'm Amora!</b>\n\nBefore we start... how do you want me to be with you? 😘",
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(persona_keyboard())
            .await?;
            info!("user {} started onboarding", user_id);
        }
        Command::Characters => {
            let (text, keyboard) =
                character_page(&bot_deps.catalog, &bot_deps.entitlements, user_id, 0)?;
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        Command::Pay => {
            if bot_deps.entitlements.has_unlimited_access(user_id)? {
                bot.send_message(
                    msg.chat.id,
                    "👑 You already have unlimited access! Just keep chatting with me 😘",
                )
                .await?;
            } else {
                let used = bot_deps.entitlements.count_user_messages(user_id)?;
                bot.send_message(
                    msg.chat.id,
                    offer_text(used, bot_deps.config.free_message_limit),
                )
                .reply_markup(offer_keyboard(&bot_deps))
                .await?;
            }
        }
        Command::Status => {
            let used = bot_deps.entitlements.count_user_messages(user_id)?;
            let unlimited = bot_deps.entitlements.has_unlimited_access(user_id)?;
            let active = bot_deps.entitlements.get_active_character(user_id)?;
            let unlocked = bot_deps.entitlements.unlocked_characters(user_id)?;

            let active_name = active
                .as_deref()
                .and_then(|id| bot_deps.catalog.by_id(id))
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "none yet".to_string());
            let access = if unlimited {
                "👑 Unlimited".to_string()
            } else {
                format!("{}/{} free messages used", used, bot_deps.config.free_message_limit)
            };
            bot.send_message(
                msg.chat.id,
                format!(
                    "📊 <b>Your status</b>\n\n💬 Access: {}\n💕 Chatting with: {}\n🔓 Unlocked characters: {}",
                    access,
                    teloxide::utils::html::escape(&active_name),
                    unlocked.len(),
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::ConfirmPayment(args) => {
            if bot_deps.config.admin_user_id != Some(user.id.0) {
                warn!("non-admin {} attempted /confirmpayment", user_id);
                bot.send_message(msg.chat.id, "❌ You can't use this command.")
                    .await?;
                return Ok(());
            }
            let mut parts = args.split_whitespace();
            let (Some(target_user), Some(external_ref)) = (parts.next(), parts.next()) else {
                bot.send_message(msg.chat.id, "Usage: /confirmpayment <user_id> <payment_id>")
                    .await?;
                return Ok(());
            };
            let Ok(target_user) = target_user.parse::<i64>() else {
                bot.send_message(msg.chat.id, "❌ user_id must be a number")
                    .await?;
                return Ok(());
            };
            match bot_deps
                .checkout
                .settle(&bot_deps.entitlements, target_user, external_ref)
            {
                Ok(settlement) if settlement.already_settled => {
                    bot.send_message(
                        msg.chat.id,
                        format!("ℹ️ Payment {} was already settled.", external_ref),
                    )
                    .await?;
                }
                Ok(_) => {
                    bot.send_message(
                        msg.chat.id,
                        format!(
                            "✅ Payment {} settled: user {} now has unlimited access.",
                            external_ref, target_user
                        ),
                    )
                    .await?;
                    bot.send_message(
                        ChatId(target_user),
                        "🎉 Your payment is confirmed! You now have unlimited access 👑",
                    )
                    .await
                    .ok();
                }
                Err(e) => {
                    bot.send_message(msg.chat.id, format!("❌ Settlement failed: {}", e))
                        .await?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_keyboard_offers_every_persona_option() {
        let keyboard = persona_keyboard();
        let labels: Vec<&str> = keyboard
            .keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(labels.len(), PERSONA_OPTIONS.len());
        for option in PERSONA_OPTIONS {
            assert!(labels.contains(&option));
        }
    }
}
