use serde::{Deserialize, Serialize};

/// A static character definition from characters.json. Immutable after
/// load; age/role/region/language/image are presentation only.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub age: u8,
    pub role: String,
    pub region: String,
    pub language: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_locked: bool,
    pub price_stars: u32,
    pub prompt: String,
}
