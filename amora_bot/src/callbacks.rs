//! Callback query handling: one tagged action type with a single
//! encode/decode pair, and the dispatcher that turns decoded actions into
//! store mutations and edited messages.

use anyhow::Result;
use log::{error, warn};
use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LabeledPrice,
        MaybeInaccessibleMessage,
    },
};
use thiserror::Error;

use crate::characters::helpers::character_page;
use crate::dependencies::BotDependencies;
use crate::payment::dto::QrRender;
use crate::payment::stars::{StarsInvoice, STARS_CURRENCY};

#[derive(Debug, Error)]
#[error("unknown callback action '{0}'")]
pub struct UnknownAction(String);

/// Every button the bot renders, as a closed set. Unknown data is rejected
/// on decode instead of being pattern-matched ad hoc at each call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    CharPage(usize),
    SelectChar(String),
    UnlockChar(String),
    PayStars(String),
    PayUnlimited,
    PayUpi,
    PayLink,
    CancelUnlock,
    CloseCharacters,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::CharPage(page) => format!("char_page:{}", page),
            CallbackAction::SelectChar(id) => format!("select_char:{}", id),
            CallbackAction::UnlockChar(id) => format!("unlock_char:{}", id),
            CallbackAction::PayStars(id) => format!("pay_stars:{}", id),
            CallbackAction::PayUnlimited => "pay_unlimited".to_string(),
            CallbackAction::PayUpi => "pay_upi".to_string(),
            CallbackAction::PayLink => "pay_link".to_string(),
            CallbackAction::CancelUnlock => "cancel_unlock".to_string(),
            CallbackAction::CloseCharacters => "close_characters".to_string(),
        }
    }

    pub fn decode(data: &str) -> Result<Self, UnknownAction> {
        if let Some(page) = data.strip_prefix("char_page:") {
            let page = page
                .parse()
                .map_err(|_| UnknownAction(data.to_string()))?;
            return Ok(CallbackAction::CharPage(page));
        }
        if let Some(id) = data.strip_prefix("select_char:") {
            return Ok(CallbackAction::SelectChar(id.to_string()));
        }
        if let Some(id) = data.strip_prefix("unlock_char:") {
            return Ok(CallbackAction::UnlockChar(id.to_string()));
        }
        if let Some(id) = data.strip_prefix("pay_stars:") {
            return Ok(CallbackAction::PayStars(id.to_string()));
        }
        match data {
            "pay_unlimited" => Ok(CallbackAction::PayUnlimited),
            "pay_upi" => Ok(CallbackAction::PayUpi),
            "pay_link" => Ok(CallbackAction::PayLink),
            "cancel_unlock" => Ok(CallbackAction::CancelUnlock),
            "close_characters" => Ok(CallbackAction::CloseCharacters),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Payment-offer keyboard listing every configured adjudicator.
pub fn offer_keyboard(bot_deps: &BotDependencies) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![InlineKeyboardButton::callback(
            format!(
                "💫 Unlimited Access ({} Stars)",
                bot_deps.config.unlimited_price_stars
            ),
            CallbackAction::PayUnlimited.encode(),
        )],
        vec![InlineKeyboardButton::callback(
            format!("🇮🇳 Pay ₹{} via UPI", bot_deps.config.expected_amount),
            CallbackAction::PayUpi.encode(),
        )],
    ];
    if bot_deps.checkout.is_enabled() {
        rows.push(vec![InlineKeyboardButton::callback(
            "💳 Pay by Card / Link",
            CallbackAction::PayLink.encode(),
        )]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn offer_text(used: u32, limit: u32) -> String {
    format!(
        "💋 I'm loving our chat, but I need you to unlock me for more!\n\n\
         You've used {}/{} free messages.\n\n\
         Pick an option below and you'll get unlimited messages with me! 😘",
        used, limit
    )
}

async fn send_stars_invoice(bot: &Bot, chat_id: ChatId, invoice: StarsInvoice) -> Result<()> {
    bot.send_invoice(
        chat_id,
        invoice.title,
        invoice.description,
        invoice.payload,
        STARS_CURRENCY.to_string(),
        vec![LabeledPrice {
            label: invoice.price_label,
            amount: invoice.amount,
        }],
    )
    .await?;
    Ok(())
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    bot_deps: BotDependencies,
) -> Result<()> {
    let Some(data) = &query.data else {
        return Ok(());
    };
    let user_id = query.from.id.0 as i64;

    let action = match CallbackAction::decode(data) {
        Ok(action) => action,
        Err(e) => {
            warn!("rejected callback from user {}: {}", user_id, e);
            bot.answer_callback_query(query.id)
                .text("❌ Unknown action")
                .await?;
            return Ok(());
        }
    };

    let message = match &query.message {
        Some(MaybeInaccessibleMessage::Regular(m)) => Some((m.chat.id, m.id)),
        _ => None,
    };

    match action {
        CallbackAction::CharPage(page) => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, message_id)) = message {
                let (text, keyboard) =
                    character_page(&bot_deps.catalog, &bot_deps.entitlements, user_id, page)?;
                bot.edit_message_text(chat_id, message_id, text)
                    .parse_mode(teloxide::types::ParseMode::Html)
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        CallbackAction::SelectChar(character_id) => {
            let Some(character) = bot_deps.catalog.by_id(&character_id).cloned() else {
                bot.answer_callback_query(query.id)
                    .text("❌ Unknown character")
                    .await?;
                return Ok(());
            };
            let activated = bot_deps.entitlements.set_active_character(
                user_id,
                &character.id,
                character.is_locked,
            )?;
            if activated {
                bot.answer_callback_query(query.id)
                    .text(format!("👑 You're now chatting with {}", character.name))
                    .await?;
                if let Some((chat_id, message_id)) = message {
                    let (text, keyboard) =
                        character_page(&bot_deps.catalog, &bot_deps.entitlements, user_id, 0)?;
                    bot.edit_message_text(chat_id, message_id, text)
                        .parse_mode(teloxide::types::ParseMode::Html)
                        .reply_markup(keyboard)
                        .await?;
                }
            } else {
                // locked and not yet unlocked: offer the unlock instead
                bot.answer_callback_query(query.id).await?;
                if let Some((chat_id, _)) = message {
                    send_unlock_offer(&bot, chat_id, &bot_deps, &character_id).await?;
                }
            }
        }
        CallbackAction::UnlockChar(character_id) => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, _)) = message {
                send_unlock_offer(&bot, chat_id, &bot_deps, &character_id).await?;
            }
        }
        CallbackAction::PayStars(character_id) => {
            bot.answer_callback_query(query.id).await?;
            let Some(character) = bot_deps.catalog.by_id(&character_id) else {
                return Ok(());
            };
            if let Some((chat_id, _)) = message {
                let invoice = bot_deps.stars.character_invoice(user_id, character);
                send_stars_invoice(&bot, chat_id, invoice).await?;
            }
        }
        CallbackAction::PayUnlimited => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, _)) = message {
                let invoice = bot_deps.stars.unlimited_invoice(user_id);
                send_stars_invoice(&bot, chat_id, invoice).await?;
            }
        }
        CallbackAction::PayUpi => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, _)) = message {
                match bot_deps.manual.initiate(user_id) {
                    Ok(instructions) => {
                        let text = format!(
                            "🇮🇳 <b>UPI Payment</b>\n\nPay ₹{} to <code>{}</code>\n\n\
                             📸 Then send me a screenshot of the payment and I'll verify it!",
                            instructions.amount, instructions.upi_id
                        );
                        match instructions.qr {
                            QrRender::File(path) => {
                                bot.send_photo(chat_id, InputFile::file(path))
                                    .caption(text)
                                    .parse_mode(teloxide::types::ParseMode::Html)
                                    .await?;
                            }
                            QrRender::Unicode(code) => {
                                bot.send_message(
                                    chat_id,
                                    format!("{}\n\n<pre>{}</pre>", text, code),
                                )
                                .parse_mode(teloxide::types::ParseMode::Html)
                                .await?;
                            }
                        }
                    }
                    Err(e) => {
                        error!("UPI initiate failed for user {}: {}", user_id, e);
                        bot.send_message(
                            chat_id,
                            "❌ Couldn't prepare the payment right now. Please try again.",
                        )
                        .await?;
                    }
                }
            }
        }
        CallbackAction::PayLink => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, _)) = message {
                match bot_deps
                    .checkout
                    .initiate(&bot_deps.entitlements, user_id)
                    .await
                {
                    Ok(link) => {
                        bot.send_message(
                            chat_id,
                            format!(
                                "💳 Click here to unlock unlimited access: {}\n\n\
                                 After payment, you'll get unlimited messages with me! 😘",
                                link.short_url
                            ),
                        )
                        .await?;
                    }
                    Err(e) => {
                        error!("checkout-link initiate failed for user {}: {}", user_id, e);
                        bot.send_message(
                            chat_id,
                            "❌ Couldn't create a payment link right now. Please try again.",
                        )
                        .await?;
                    }
                }
            }
        }
        CallbackAction::CancelUnlock => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, message_id)) = message {
                let (text, keyboard) =
                    character_page(&bot_deps.catalog, &bot_deps.entitlements, user_id, 0)?;
                bot.edit_message_text(chat_id, message_id, text)
                    .parse_mode(teloxide::types::ParseMode::Html)
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        CallbackAction::CloseCharacters => {
            bot.answer_callback_query(query.id).await?;
            if let Some((chat_id, message_id)) = message {
                bot.delete_message(chat_id, message_id).await?;
            }
        }
    }
    Ok(())
}

async fn send_unlock_offer(
    bot: &Bot,
    chat_id: ChatId,
    bot_deps: &BotDependencies,
    character_id: &str,
) -> Result<()> {
    let Some(character) = bot_deps.catalog.by_id(character_id) else {
        bot.send_message(chat_id, "❌ Unknown character").await?;
        return Ok(());
    };
    let tier = crate::ai::models::ModelTier::for_price(character.price_stars);
    let text = format!(
        "🔒 <b>{}</b> ({})\n🎭 {}\n🤖 {}\n\n💫 Unlock her for {} Stars?",
        character.name, character.age, character.role, tier.benefits_text(), character.price_stars
    );
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("💫 Unlock {} ({} Stars)", character.name, character.price_stars),
            CallbackAction::PayStars(character.id.clone()).encode(),
        )],
        vec![InlineKeyboardButton::callback(
            "❌ Cancel",
            CallbackAction::CancelUnlock.encode(),
        )],
    ]);
    bot.send_message(chat_id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}
