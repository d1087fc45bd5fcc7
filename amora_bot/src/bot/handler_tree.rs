use anyhow::Result;
use teloxide::{
    dispatching::{dialogue::InMemStorage, DpHandlerDescription, HandlerExt, UpdateFilterExt},
    dptree::{self, Handler},
    types::{Message, Update},
};

use amora_core::helpers::bot_commands::{ChatState, Command};

use crate::bot::answers::answers;
use crate::bot::handler::{
    handle_chat_message, handle_payment_proof, handle_persona_choice, handle_pre_checkout,
    handle_successful_payment,
};
use crate::callbacks::handle_callback_query;
use crate::dependencies::BotDependencies;

pub fn handler_tree() -> Handler<'static, Result<()>, DpHandlerDescription> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<ChatState>, ChatState>()
                // Settlements must run before anything that could swallow the
                // update; a paid user who gets no entitlement is the one bug
                // this bot is not allowed to have.
                .branch(
                    dptree::entry()
                        .filter(|msg: Message| msg.successful_payment().is_some())
                        .endpoint(handle_successful_payment),
                )
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(answers),
                )
                .branch(
                    dptree::case![ChatState::ChoosingPersona]
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_persona_choice),
                )
                .branch(
                    dptree::entry()
                        .filter(|msg: Message| msg.photo().is_some() && msg.chat.is_private())
                        .filter(|msg: Message, bot_deps: BotDependencies| {
                            msg.from
                                .as_ref()
                                .is_some_and(|user| bot_deps.manual.awaiting_proof(user.id.0 as i64))
                        })
                        .endpoint(handle_payment_proof),
                )
                .branch(
                    dptree::entry()
                        .filter(|msg: Message| msg.text().is_some() && msg.chat.is_private())
                        .endpoint(handle_chat_message),
                ),
        )
        .branch(Update::filter_pre_checkout_query().endpoint(handle_pre_checkout))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query))
}
