use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::ai::handler::AI;
use crate::characters::handler::CharacterCatalog;
use crate::config::BotConfig;
use crate::entitlements::handler::EntitlementStore;
use crate::payment::checkout::CheckoutLinkAdjudicator;
use crate::payment::ledger::ManualLedger;
use crate::payment::manual::ManualProofAdjudicator;
use crate::payment::ocr::OcrClient;
use crate::payment::stars::StarsAdjudicator;

/// Shared state injected into every handler through the dispatcher.
#[derive(Clone)]
pub struct BotDependencies {
    pub config: BotConfig,
    pub entitlements: EntitlementStore,
    pub catalog: Arc<CharacterCatalog>,
    pub ai: AI,
    pub checkout: CheckoutLinkAdjudicator,
    pub manual: ManualProofAdjudicator,
    pub stars: StarsAdjudicator,
    pub ocr: OcrClient,
    user_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl BotDependencies {
    pub fn new(config: BotConfig, entitlements: EntitlementStore, catalog: CharacterCatalog) -> Self {
        let ai = AI::new(
            config.openrouter_api_key.clone(),
            config.openrouter_base_url.clone(),
        );
        let checkout = CheckoutLinkAdjudicator::new(
            config.payment_link_endpoint.clone(),
            config.payment_link_api_key.clone(),
            config.expected_amount,
        );
        let manual = ManualProofAdjudicator::new(
            config.expected_upi_id.clone(),
            config.expected_amount,
            config.fuzzy_match_threshold,
            config
                .qr_image_path
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_default(),
            ManualLedger::new(Path::new(&config.upi_ledger_path)),
        );
        let stars = StarsAdjudicator::new(config.unlimited_price_stars);
        let ocr = OcrClient::new(config.ocr_endpoint.clone());

        Self {
            config,
            entitlements,
            catalog: Arc::new(catalog),
            ai,
            checkout,
            manual,
            stars,
            ocr,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    /// Per-user mutex so a burst of updates from one user can't interleave
    /// the quota check and the history append.
    pub fn lock_for(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
