//! Character catalog: parsed once at startup, read-only afterwards and
//! shared across users without locking.

use std::path::Path;

use thiserror::Error;

use super::dto::Character;

/// Characters shown per page in the selection list.
pub const PAGE_SIZE: usize = 3;

/// Fatal at startup: the bot must not serve with an empty or
/// half-parsed catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read character catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse character catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("character catalog is empty")]
    Empty,
    #[error("duplicate character id '{0}'")]
    DuplicateId(String),
    #[error("character '{0}' violates the price/locked invariant")]
    PriceLockMismatch(String),
}

#[derive(Clone)]
pub struct CharacterCatalog {
    characters: Vec<Character>,
}

impl CharacterCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read(path)?;
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, CatalogError> {
        let characters: Vec<Character> = serde_json::from_slice(raw)?;
        if characters.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, character) in characters.iter().enumerate() {
            if characters[..i].iter().any(|c| c.id == character.id) {
                return Err(CatalogError::DuplicateId(character.id.clone()));
            }
            // price 0 means always unlocked; a price means locked
            let consistent = (character.price_stars == 0) != character.is_locked;
            if !consistent {
                return Err(CatalogError::PriceLockMismatch(character.id.clone()));
            }
        }
        Ok(Self { characters })
    }

    pub fn by_id(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn page(&self, page: usize) -> &[Character] {
        let start = page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.characters.len());
        if start >= self.characters.len() {
            &[]
        } else {
            &self.characters[start..end]
        }
    }

    pub fn page_count(&self) -> usize {
        self.characters.len().div_ceil(PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_json() -> String {
        r#"[
            {"id": "aisha", "name": "Aisha", "age": 21, "role": "College Student",
             "region": "Mumbai", "language": "Hindi, English",
             "description": "Sweet and talkative.", "is_locked": false,
             "price_stars": 0, "prompt": "You are Aisha."},
            {"id": "priya", "name": "Priya", "age": 23, "role": "Yoga Instructor",
             "region": "Delhi", "language": "Hindi, English",
             "description": "Calm and teasing.", "is_locked": true,
             "price_stars": 80, "prompt": "You are Priya."},
            {"id": "riya", "name": "Riya", "age": 24, "role": "Actress",
             "region": "Mumbai", "language": "Hindi, English",
             "description": "Glamorous.", "is_locked": true,
             "price_stars": 150, "prompt": "You are Riya."},
            {"id": "meera", "name": "Meera", "age": 25, "role": "Designer",
             "region": "Jaipur", "language": "Hindi",
             "description": "Artsy.", "is_locked": true,
             "price_stars": 70, "prompt": "You are Meera."}
        ]"#
        .to_string()
    }

    #[test]
    fn loads_and_indexes_characters() {
        let catalog = CharacterCatalog::from_slice(catalog_json().as_bytes()).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.by_id("priya").unwrap().price_stars, 80);
        assert!(catalog.by_id("nonexistent").is_none());
    }

    #[test]
    fn pages_are_fixed_size_with_a_short_tail() {
        let catalog = CharacterCatalog::from_slice(catalog_json().as_bytes()).unwrap();
        assert_eq!(catalog.page_count(), 2);
        assert_eq!(catalog.page(0).len(), 3);
        assert_eq!(catalog.page(1).len(), 1);
        assert!(catalog.page(2).is_empty());
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(
            CharacterCatalog::from_slice(b"[]"),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn rejects_malformed_catalog() {
        assert!(matches!(
            CharacterCatalog::from_slice(b"{not json"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn rejects_free_character_marked_locked() {
        let raw = r#"[{"id": "x", "name": "X", "age": 20, "role": "r",
            "region": "r", "language": "l", "description": "d",
            "is_locked": true, "price_stars": 0, "prompt": "p"}]"#;
        assert!(matches!(
            CharacterCatalog::from_slice(raw.as_bytes()),
            Err(CatalogError::PriceLockMismatch(_))
        ));
    }

    #[test]
    fn rejects_priced_character_marked_unlocked() {
        let raw = r#"[{"id": "x", "name": "X", "age": 20, "role": "r",
            "region": "r", "language": "l", "description": "d",
            "is_locked": false, "price_stars": 80, "prompt": "p"}]"#;
        assert!(matches!(
            CharacterCatalog::from_slice(raw.as_bytes()),
            Err(CatalogError::PriceLockMismatch(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"[
            {"id": "x", "name": "X", "age": 20, "role": "r", "region": "r",
             "language": "l", "description": "d", "is_locked": false,
             "price_stars": 0, "prompt": "p"},
            {"id": "x", "name": "Y", "age": 21, "role": "r", "region": "r",
             "language": "l", "description": "d", "is_locked": true,
             "price_stars": 80, "prompt": "p"}
        ]"#;
        assert!(matches!(
            CharacterCatalog::from_slice(raw.as_bytes()),
            Err(CatalogError::DuplicateId(_))
        ));
    }
}
