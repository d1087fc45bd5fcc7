//! Telegram Stars adjudicator: builds digital-goods invoices and settles
//! successful payments in two phases. Pre-checkout approves only the XTR
//! currency; the payment payload is parsed back into a tagged purchase
//! intent and dispatched, failing closed on anything unrecognized.

use amora_core::helpers::dto::{InvoicePayload, PurchaseTarget, Settlement};
use log::{info, warn};

use crate::characters::dto::Character;
use crate::characters::handler::CharacterCatalog;
use crate::entitlements::dto::TransactionStatus;
use crate::entitlements::handler::EntitlementStore;

use super::dto::SettlementError;

/// Telegram's in-app currency code. The only one this bot accepts.
pub const STARS_CURRENCY: &str = "XTR";

/// Invoice descriptor for the platform's native checkout. Digital goods:
/// no provider token, currency fixed to XTR.
#[derive(Debug, Clone)]
pub struct StarsInvoice {
    pub title: String,
    pub description: String,
    pub payload: String,
    pub price_label: String,
    pub amount: u32,
}

/// The fields of a successful-payment event the adjudicator consumes,
/// decoupled from the transport types.
#[derive(Debug, Clone)]
pub struct SuccessfulPaymentEvent {
    pub currency: String,
    pub total_amount: u32,
    pub invoice_payload: String,
    pub telegram_payment_charge_id: String,
}

#[derive(Clone)]
pub struct StarsAdjudicator {
    unlimited_price: u32,
}

impl StarsAdjudicator {
    pub fn new(unlimited_price: u32) -> Self {
        Self { unlimited_price }
    }

    pub fn character_invoice(&self, user_id: i64, character: &Character) -> StarsInvoice {
        StarsInvoice {
            title: format!("Unlock {}", character.name),
            description: format!(
                "Unlock {} for unlimited chat access - Digital Service",
                character.name
            ),
            payload: InvoicePayload::CharacterUnlock {
                user_id,
                character_id: character.id.clone(),
            }
            .encode(),
            price_label: format!("{} Unlock", character.name),
            amount: character.price_stars,
        }
    }

    pub fn unlimited_invoice(&self, user_id: i64) -> StarsInvoice {
        StarsInvoice {
            title: "Unlimited Access".to_string(),
            description: "Unlimited messages with every unlocked character - Digital Service"
                .to_string(),
            payload: InvoicePayload::UnlimitedAccess { user_id }.encode(),
            price_label: "Unlimited Access".to_string(),
            amount: self.unlimited_price,
        }
    }

    /// Pre-checkout validation: anything that is not Stars is rejected.
    pub fn validate_pre_checkout(&self, currency: &str) -> Result<(), SettlementError> {
        if currency != STARS_CURRENCY {
            return Err(SettlementError::InvalidCurrency(currency.to_string()));
        }
        Ok(())
    }

    fn is_completed(
        &self,
        store: &EntitlementStore,
        external_ref: &str,
    ) -> Result<bool, SettlementError> {
        Ok(store
            .transaction(external_ref)?
            .map(|r| r.status == TransactionStatus::Completed)
            .unwrap_or(false))
    }

    /// Applies the entitlement effect of a successful payment exactly once.
    /// A replayed charge id reports success without a second effect. A charge
    /// whose transaction is still pending (a prior attempt failed between
    /// recording and granting) is settled again rather than skipped.
    pub fn settle(
        &self,
        store: &EntitlementStore,
        catalog: &CharacterCatalog,
        event: &SuccessfulPaymentEvent,
    ) -> Result<Settlement, SettlementError> {
        if event.currency != STARS_CURRENCY {
            return Err(SettlementError::InvalidCurrency(event.currency.clone()));
        }
        let payload = InvoicePayload::decode(&event.invoice_payload)?;
        let external_ref = event.telegram_payment_charge_id.clone();

        match payload {
            InvoicePayload::CharacterUnlock {
                user_id,
                character_id,
            } => {
                let character = catalog
                    .by_id(&character_id)
                    .ok_or_else(|| SettlementError::UnknownCharacter(character_id.clone()))?;
                let target = PurchaseTarget::Character(character_id.clone());

                // pending row first, entitlement second, completion last: a
                // charge id is only marked completed once the grant is durable
                let fresh = store.record_transaction(
                    &external_ref,
                    user_id,
                    target.clone(),
                    event.total_amount,
                    TransactionStatus::Pending,
                )?;
                if !fresh && self.is_completed(store, &external_ref)? {
                    info!(
                        "replayed stars charge {} for user {}, nothing to do",
                        external_ref, user_id
                    );
                    return Ok(Settlement {
                        user_id,
                        target,
                        external_ref,
                        already_settled: true,
                    });
                }
                if !fresh {
                    info!(
                        "resuming interrupted settlement of stars charge {}",
                        external_ref
                    );
                }

                let newly_unlocked = store.unlock_character(user_id, &character_id)?;
                if !newly_unlocked {
                    warn!(
                        "user {} paid twice for character {} under different charges",
                        user_id, character_id
                    );
                }
                store.set_active_character(user_id, &character_id, character.is_locked)?;
                store.complete_transaction(&external_ref)?;
                info!("user {} unlocked character {}", user_id, character_id);
                Ok(Settlement {
                    user_id,
                    target,
                    external_ref,
                    already_settled: false,
                })
            }
            InvoicePayload::UnlimitedAccess { user_id } => {
                let fresh = store.record_transaction(
                    &external_ref,
                    user_id,
                    PurchaseTarget::UnlimitedAccess,
                    event.total_amount,
                    TransactionStatus::Pending,
                )?;
                if !fresh && self.is_completed(store, &external_ref)? {
                    return Ok(Settlement {
                        user_id,
                        target: PurchaseTarget::UnlimitedAccess,
                        external_ref,
                        already_settled: true,
                    });
                }
                store.grant_unlimited_access(user_id)?;
                store.complete_transaction(&external_ref)?;
                info!("user {} granted unlimited access", user_id);
                Ok(Settlement {
                    user_id,
                    target: PurchaseTarget::UnlimitedAccess,
                    external_ref,
                    already_settled: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> EntitlementStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        EntitlementStore::new(&db).unwrap()
    }

    fn catalog() -> CharacterCatalog {
        CharacterCatalog::from_slice(
            br#"[
                {"id": "aisha", "name": "Aisha", "age": 21, "role": "College Student",
                 "region": "Mumbai", "language": "Hindi, English",
                 "description": "Sweet.", "is_locked": false,
                 "price_stars": 0, "prompt": "You are Aisha."},
                {"id": "priya", "name": "Priya", "age": 23, "role": "Yoga Instructor",
                 "region": "Delhi", "language": "Hindi, English",
                 "description": "Calm.", "is_locked": true,
                 "price_stars": 80, "prompt": "You are Priya."}
            ]"#,
        )
        .unwrap()
    }

    fn event(payload: &str, charge_id: &str) -> SuccessfulPaymentEvent {
        SuccessfulPaymentEvent {
            currency: STARS_CURRENCY.to_string(),
            total_amount: 80,
            invoice_payload: payload.to_string(),
            telegram_payment_charge_id: charge_id.to_string(),
        }
    }

    #[test]
    fn pre_checkout_rejects_non_stars_currency() {
        let adj = StarsAdjudicator::new(150);
        assert!(adj.validate_pre_checkout("XTR").is_ok());
        assert!(matches!(
            adj.validate_pre_checkout("USD"),
            Err(SettlementError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn character_unlock_payload_unlocks_exactly_that_character() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let payload = r#"{"type": "character_unlock", "userId": 42, "characterId": "priya"}"#;

        let settlement = adj
            .settle(&store, &catalog(), &event(payload, "charge-1"))
            .unwrap();
        assert!(!settlement.already_settled);
        assert!(store.is_character_unlocked(42, "priya", true).unwrap());
        assert_eq!(
            store.get_active_character(42).unwrap().as_deref(),
            Some("priya")
        );
        // no unlimited access from a character purchase
        assert!(!store.has_unlimited_access(42).unwrap());
    }

    #[test]
    fn unlimited_access_payload_lifts_the_gate() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let payload = r#"{"type": "unlimited_access", "userId": 42}"#;

        let settlement = adj
            .settle(&store, &catalog(), &event(payload, "charge-2"))
            .unwrap();
        assert!(!settlement.already_settled);
        assert!(store.has_unlimited_access(42).unwrap());
        assert!(!store.is_character_unlocked(42, "priya", true).unwrap());
    }

    #[test]
    fn replayed_charge_id_settles_without_double_effect() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let payload = r#"{"type": "character_unlock", "userId": 42, "characterId": "priya"}"#;

        let first = adj
            .settle(&store, &catalog(), &event(payload, "charge-1"))
            .unwrap();
        assert!(!first.already_settled);
        let second = adj
            .settle(&store, &catalog(), &event(payload, "charge-1"))
            .unwrap();
        assert!(second.already_settled);
        assert_eq!(store.unlocked_characters(42).unwrap(), vec!["priya"]);
        assert_eq!(
            store.transaction("charge-1").unwrap().unwrap().status,
            TransactionStatus::Completed
        );
    }

    #[test]
    fn interrupted_settlement_is_finished_on_redelivery() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let payload = r#"{"type": "character_unlock", "userId": 42, "characterId": "priya"}"#;

        // a prior attempt recorded the charge but died before granting
        store
            .record_transaction(
                "charge-1",
                42,
                PurchaseTarget::Character("priya".to_string()),
                80,
                TransactionStatus::Pending,
            )
            .unwrap();
        assert!(!store.is_character_unlocked(42, "priya", true).unwrap());

        let settlement = adj
            .settle(&store, &catalog(), &event(payload, "charge-1"))
            .unwrap();
        assert!(!settlement.already_settled);
        assert!(store.is_character_unlocked(42, "priya", true).unwrap());
        assert_eq!(
            store.transaction("charge-1").unwrap().unwrap().status,
            TransactionStatus::Completed
        );
    }

    #[test]
    fn unknown_payload_type_fails_closed() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let payload = r#"{"type": "free_everything", "userId": 42}"#;

        let err = adj
            .settle(&store, &catalog(), &event(payload, "charge-3"))
            .unwrap_err();
        assert!(matches!(err, SettlementError::UnknownPayloadType(_)));
        assert!(!store.has_unlimited_access(42).unwrap());
        // a rejected payment records no transaction
        assert!(store.transaction("charge-3").unwrap().is_none());
    }

    #[test]
    fn unknown_character_fails_closed() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let payload = r#"{"type": "character_unlock", "userId": 42, "characterId": "nobody"}"#;
        assert!(matches!(
            adj.settle(&store, &catalog(), &event(payload, "charge-4")),
            Err(SettlementError::UnknownCharacter(_))
        ));
    }

    #[test]
    fn wrong_currency_at_settlement_fails_closed() {
        let adj = StarsAdjudicator::new(150);
        let store = temp_store();
        let mut e = event(r#"{"type": "unlimited_access", "userId": 42}"#, "charge-5");
        e.currency = "INR".to_string();
        assert!(matches!(
            adj.settle(&store, &catalog(), &e),
            Err(SettlementError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn invoices_carry_the_stars_payload() {
        let adj = StarsAdjudicator::new(150);
        let invoice = adj.unlimited_invoice(42);
        assert_eq!(invoice.amount, 150);
        let decoded = InvoicePayload::decode(&invoice.payload).unwrap();
        assert_eq!(decoded, InvoicePayload::UnlimitedAccess { user_id: 42 });
    }
}
