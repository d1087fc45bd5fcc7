use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::ai::models::ModelTier;
use crate::callbacks::CallbackAction;
use crate::characters::handler::CharacterCatalog;
use crate::entitlements::handler::{EntitlementStore, StoreError};

/// Renders one catalog page for a given user: the HTML body plus the
/// paging/selection keyboard. Out-of-range pages are clamped to the last one.
pub fn character_page(
    catalog: &CharacterCatalog,
    store: &EntitlementStore,
    user_id: i64,
    page: usize,
) -> Result<(String, InlineKeyboardMarkup), StoreError> {
    let page_count = catalog.page_count();
    let page = page.min(page_count.saturating_sub(1));
    let characters = catalog.page(page);

    let unlimited = store.has_unlimited_access(user_id)?;
    let active = store.get_active_character(user_id)?;

    let mut text = format!(
        "💕 <b>Choose your companion</b> (page {}/{})\n",
        page + 1,
        page_count
    );
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for character in characters {
        let unlocked = unlimited
            || store.is_character_unlocked(user_id, &character.id, character.is_locked)?;
        let is_active = active.as_deref() == Some(character.id.as_str());

        let badge = if is_active {
            "💬"
        } else if unlocked {
            "👑"
        } else {
            "🔒"
        };
        let tier = ModelTier::for_price(character.price_stars);
        text.push_str(&format!(
            "\n{} <b>{}</b> ({}) — {}\n🌏 {} · 🗣 {}\n🤖 {}\n<i>{}</i>\n",
            badge,
            character.name,
            character.age,
            character.role,
            character.region,
            character.language,
            tier.benefits_text(),
            character.description,
        ));

        let (label, action) = if unlocked {
            (
                format!("{} Chat with {}", badge, character.name),
                CallbackAction::SelectChar(character.id.clone()),
            )
        } else {
            (
                format!("🔒 Unlock {} ({} Stars)", character.name, character.price_stars),
                CallbackAction::UnlockChar(character.id.clone()),
            )
        };
        rows.push(vec![InlineKeyboardButton::callback(label, action.encode())]);
    }

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(InlineKeyboardButton::callback(
            "⬅️ Prev",
            CallbackAction::CharPage(page - 1).encode(),
        ));
    }
    if page + 1 < page_count {
        nav.push(InlineKeyboardButton::callback(
            "Next ➡️",
            CallbackAction::CharPage(page + 1).encode(),
        ));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "❌ Close",
        CallbackAction::CloseCharacters.encode(),
    )]);

    Ok((text, InlineKeyboardMarkup::new(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CharacterCatalog {
        CharacterCatalog::from_slice(
            br#"[
                {"id": "aisha", "name": "Aisha", "age": 21, "role": "College student",
                 "region": "Mumbai", "language": "Hinglish",
                 "description": "Bubbly and sweet", "is_locked": false,
                 "price_stars": 0, "prompt": "You are Aisha."},
                {"id": "priya", "name": "Priya", "age": 24, "role": "Yoga teacher",
                 "region": "Delhi", "language": "Hindi",
                 "description": "Calm and caring", "is_locked": true,
                 "price_stars": 80, "prompt": "You are Priya."},
                {"id": "meera", "name": "Meera", "age": 23, "role": "Artist",
                 "region": "Jaipur", "language": "English",
                 "description": "Dreamy painter", "is_locked": true,
                 "price_stars": 70, "prompt": "You are Meera."},
                {"id": "ishita", "name": "Ishita", "age": 26, "role": "Doctor",
                 "region": "Kolkata", "language": "Bengali",
                 "description": "Sharp and witty", "is_locked": true,
                 "price_stars": 120, "prompt": "You are Ishita."}
            ]"#,
        )
        .unwrap()
    }

    fn store() -> EntitlementStore {
        let dir = std::env::temp_dir().join(format!("amora-page-{}", uuid::Uuid::new_v4()));
        let db = sled::open(dir).unwrap();
        EntitlementStore::new(&db).unwrap()
    }

    #[test]
    fn locked_characters_get_unlock_buttons_and_unlocked_get_chat() {
        let store = store();
        store.unlock_character(7, "priya").unwrap();

        let (text, keyboard) = character_page(&catalog(), &store, 7, 0).unwrap();
        assert!(text.contains("page 1/2"));

        let labels: Vec<&str> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect();
        assert!(labels.iter().any(|l| l.contains("Chat with Aisha")));
        assert!(labels.iter().any(|l| l.contains("Chat with Priya")));
        assert!(labels.iter().any(|l| l.contains("Unlock Meera (70 Stars)")));
        assert!(labels.iter().any(|l| *l == "Next ➡️"));
    }

    #[test]
    fn unlimited_access_unlocks_the_whole_page() {
        let store = store();
        store.grant_unlimited_access(7).unwrap();

        let (_, keyboard) = character_page(&catalog(), &store, 7, 0).unwrap();
        let labels: Vec<&str> = keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.as_str())
            .collect();
        assert!(labels.iter().all(|l| !l.contains("Unlock")));
    }

    #[test]
    fn out_of_range_pages_clamp_to_the_last_page() {
        let store = store();
        let (text, _) = character_page(&catalog(), &store, 7, 99).unwrap();
        assert!(text.contains("page 2/2"));
        assert!(text.contains("Ishita"));
    }
}
