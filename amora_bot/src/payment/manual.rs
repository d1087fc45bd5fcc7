//! Manual-proof adjudicator: static UPI payment instructions out, OCR text
//! from a screenshot in, fuzzy-matched against the expected amount and
//! account id. Heuristic by design; the threshold is configuration.

use std::path::PathBuf;

use amora_core::helpers::dto::{PurchaseTarget, Settlement};
use log::{info, warn};
use qrcode::render::unicode;
use qrcode::QrCode;
use uuid::Uuid;

use crate::entitlements::dto::TransactionStatus;
use crate::entitlements::handler::EntitlementStore;

use super::dto::{AdjudicatorError, PaymentInstructions, QrRender};
use super::ledger::ManualLedger;

#[derive(Clone)]
pub struct ManualProofAdjudicator {
    expected_upi_id: String,
    expected_amount: u32,
    threshold: f64,
    qr_image_path: PathBuf,
    ledger: ManualLedger,
}

/// Case-insensitive token similarity, strictly greater than the threshold
/// so boundary behavior is deterministic for a fixed threshold value.
fn fuzzy_match(text: &str, pattern: &str, threshold: f64) -> bool {
    strsim::jaro_winkler(&text.to_lowercase(), &pattern.to_lowercase()) > threshold
}

impl ManualProofAdjudicator {
    pub fn new(
        expected_upi_id: String,
        expected_amount: u32,
        threshold: f64,
        qr_image_path: PathBuf,
        ledger: ManualLedger,
    ) -> Self {
        Self {
            expected_upi_id,
            expected_amount,
            threshold,
            qr_image_path,
            ledger,
        }
    }

    /// Payment instructions plus a QR render. Marks the user pending in the
    /// support ledger; pending never grants anything.
    pub fn initiate(&self, user_id: i64) -> Result<PaymentInstructions, AdjudicatorError> {
        if let Err(e) = self.ledger.mark_pending(user_id) {
            warn!("failed to record pending UPI user {}: {}", user_id, e);
        }
        let qr = if self.qr_image_path.exists() {
            QrRender::File(self.qr_image_path.clone())
        } else {
            let code = QrCode::new(self.expected_upi_id.as_bytes())
                .map_err(|e| AdjudicatorError::Qr(e.to_string()))?;
            QrRender::Unicode(
                code.render::<unicode::Dense1x2>()
                    .quiet_zone(false)
                    .build(),
            )
        };
        Ok(PaymentInstructions {
            upi_id: self.expected_upi_id.clone(),
            amount: self.expected_amount,
            qr,
        })
    }

    /// Whether the user has asked for UPI instructions and not yet been
    /// verified. Photos from anyone else are ordinary chat content, not
    /// payment proof.
    pub fn awaiting_proof(&self, user_id: i64) -> bool {
        self.ledger.is_pending(user_id).unwrap_or(false)
    }

    /// Both the amount and the UPI id must appear in the extracted text.
    /// Amount tokens are stripped of currency decorations first.
    pub fn matches_expected(&self, extracted_text: &str) -> bool {
        let amount_token = self.expected_amount.to_string();
        let amount_match = extracted_text.split_whitespace().any(|word| {
            let cleaned = word.trim_matches(|c: char| "₹rs.".contains(c.to_ascii_lowercase()));
            !cleaned.is_empty() && fuzzy_match(cleaned, &amount_token, self.threshold)
        });
        let upi_match = extracted_text
            .split_whitespace()
            .any(|word| fuzzy_match(word, &self.expected_upi_id, self.threshold));
        amount_match && upi_match
    }

    /// Returns `Ok(None)` when the proof does not match (false negatives are
    /// an accepted risk). A user who already holds unlimited access settles
    /// as an idempotent no-op: re-sent screenshots never double-grant.
    pub fn settle(
        &self,
        store: &EntitlementStore,
        user_id: i64,
        extracted_text: &str,
    ) -> Result<Option<Settlement>, AdjudicatorError> {
        if !self.matches_expected(extracted_text) {
            info!("UPI proof from user {} did not match expectations", user_id);
            return Ok(None);
        }

        if store.has_unlimited_access(user_id)? {
            return Ok(Some(Settlement {
                user_id,
                target: PurchaseTarget::UnlimitedAccess,
                external_ref: String::new(),
                already_settled: true,
            }));
        }

        let external_ref = format!("upi-{}", Uuid::new_v4());
        // entitlement first; a failure here leaves no completed transaction,
        // so a re-sent screenshot settles cleanly
        store.grant_unlimited_access(user_id)?;
        store.record_transaction(
            &external_ref,
            user_id,
            PurchaseTarget::UnlimitedAccess,
            self.expected_amount,
            TransactionStatus::Completed,
        )?;
        if let Err(e) = self.ledger.mark_paid(user_id) {
            warn!("failed to move UPI user {} to paid list: {}", user_id, e);
        }
        info!("UPI payment verified for user {}", user_id);
        Ok(Some(Settlement {
            user_id,
            target: PurchaseTarget::UnlimitedAccess,
            external_ref,
            already_settled: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.6;

    fn adjudicator(threshold: f64) -> ManualProofAdjudicator {
        let ledger_path =
            std::env::temp_dir().join(format!("upi_test_{}.json", Uuid::new_v4()));
        ManualProofAdjudicator::new(
            "amora@upi".to_string(),
            49,
            threshold,
            PathBuf::from("/nonexistent/qr.png"),
            ManualLedger::new(&ledger_path),
        )
    }

    fn temp_store() -> EntitlementStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        EntitlementStore::new(&db).unwrap()
    }

    #[test]
    fn exact_amount_and_upi_id_match() {
        let adj = adjudicator(THRESHOLD);
        assert!(adj.matches_expected("Paid ₹49 to amora@upi via UPI"));
        assert!(adj.matches_expected("PAID RS.49 AMORA@UPI SUCCESS"));
    }

    #[test]
    fn text_missing_both_fields_does_not_match() {
        let adj = adjudicator(THRESHOLD);
        assert!(!adj.matches_expected("lunch receipt total 840 thanks"));
    }

    #[test]
    fn both_fields_must_match_not_just_one() {
        let adj = adjudicator(THRESHOLD);
        assert!(!adj.matches_expected("sent 49 to somebody else entirely xxxxxxx"));
        assert!(!adj.matches_expected("amora@upi received nothing"));
    }

    #[test]
    fn threshold_boundary_is_deterministic() {
        // comparison is strictly greater-than: an exact match scores 1.0
        // and fails a threshold of 1.0, passes anything below it
        let strict = adjudicator(1.0);
        assert!(!strict.matches_expected("49 amora@upi"));
        let lenient = adjudicator(0.999);
        assert!(lenient.matches_expected("49 amora@upi"));
    }

    #[test]
    fn unmatched_proof_settles_nothing() {
        let adj = adjudicator(THRESHOLD);
        let store = temp_store();
        let outcome = adj.settle(&store, 42, "random text").unwrap();
        assert!(outcome.is_none());
        assert!(!store.has_unlimited_access(42).unwrap());
    }

    #[test]
    fn matched_proof_grants_unlimited_access_once() {
        let adj = adjudicator(THRESHOLD);
        let store = temp_store();
        let text = "Payment of ₹49 to amora@upi successful";

        let first = adj.settle(&store, 42, text).unwrap().unwrap();
        assert!(!first.already_settled);
        assert!(store.has_unlimited_access(42).unwrap());
        assert!(store.transaction(&first.external_ref).unwrap().is_some());
        assert!(adj.ledger.is_paid(42).unwrap());

        // re-sent screenshot: no second grant, no second transaction
        let second = adj.settle(&store, 42, text).unwrap().unwrap();
        assert!(second.already_settled);
        assert!(second.external_ref.is_empty());
    }

    #[test]
    fn only_users_with_pending_instructions_are_awaiting_proof() {
        let adj = adjudicator(THRESHOLD);

        // a photo from a user who never asked for UPI instructions is
        // ordinary chat content
        assert!(!adj.awaiting_proof(42));

        adj.initiate(42).unwrap();
        assert!(adj.awaiting_proof(42));
        assert!(!adj.awaiting_proof(7));

        // once verified the user leaves the pending list
        let store = temp_store();
        adj.settle(&store, 42, "Paid ₹49 to amora@upi").unwrap();
        assert!(!adj.awaiting_proof(42));
    }
}
