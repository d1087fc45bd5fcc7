//! Price-band to model-tier mapping. A closed enum with an explicit lookup
//! table; unknown prices fall back to Premium with a logged warning.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Free,
    Premium,
    UltraPremium,
}

const PREMIUM_PRICES: &[u32] = &[70, 80, 85, 90, 100, 110];
const ULTRA_PREMIUM_PRICES: &[u32] = &[120, 150];

impl ModelTier {
    pub fn for_price(price: u32) -> Self {
        if price == 0 {
            ModelTier::Free
        } else if PREMIUM_PRICES.contains(&price) {
            ModelTier::Premium
        } else if ULTRA_PREMIUM_PRICES.contains(&price) {
            ModelTier::UltraPremium
        } else {
            log::warn!("price {} not in any tier band, defaulting to premium", price);
            ModelTier::Premium
        }
    }

    pub fn model(&self) -> &'static str {
        match self {
            ModelTier::Free => "cognitivecomputations/dolphin-mistral-24b-venice-edition:free",
            ModelTier::Premium => "mistralai/mistral-nemo:free",
            ModelTier::UltraPremium => "gryphe/mythomax-l2-13b",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            ModelTier::Free => 2000,
            ModelTier::Premium => 3000,
            ModelTier::UltraPremium => 5000,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            ModelTier::Free => 0.7,
            ModelTier::Premium => 0.8,
            ModelTier::UltraPremium => 0.9,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelTier::Free => "Venice",
            ModelTier::Premium => "Mistral",
            ModelTier::UltraPremium => "Mythomax",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelTier::Free => "Free",
            ModelTier::Premium => "Premium",
            ModelTier::UltraPremium => "Ultra Premium",
        }
    }

    /// Human-readable benefit line for the character list.
    pub fn benefits_text(&self) -> String {
        let benefit = match self {
            ModelTier::Free => "🆓 Basic AI responses",
            ModelTier::Premium => "💫 Enhanced AI with better understanding",
            ModelTier::UltraPremium => "🌟 Ultra-high quality AI with advanced capabilities",
        };
        format!("{} Tier: {}", self.label(), benefit)
    }
}
