//! Checkout-link adjudicator: requests a hosted payment-link from the
//! configured provider. The provider's completion callback lives outside
//! this process; settlement is driven by the operator /confirmpayment
//! command against the recorded reference.

use amora_core::helpers::dto::{PurchaseTarget, Settlement};
use log::info;
use reqwest::Client;

use crate::entitlements::dto::TransactionStatus;
use crate::entitlements::handler::EntitlementStore;

use super::dto::{AdjudicatorError, CheckoutLink};

#[derive(Clone)]
pub struct CheckoutLinkAdjudicator {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    amount: u32,
}

impl CheckoutLinkAdjudicator {
    pub fn new(endpoint: Option<String>, api_key: Option<String>, amount: u32) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            amount,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Requests a hosted payment link and records a pending transaction
    /// keyed by the provider's reference id. Pending grants nothing.
    pub async fn initiate(
        &self,
        store: &EntitlementStore,
        user_id: i64,
    ) -> Result<CheckoutLink, AdjudicatorError> {
        let endpoint = self.endpoint.as_ref().ok_or(AdjudicatorError::Disabled)?;

        let body = serde_json::json!({
            "amount": self.amount * 100,
            "currency": "INR",
            "description": "Unlimited access to your AI girlfriend",
            "notes": { "user_id": user_id },
        });
        let mut request = self.client.post(endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdjudicatorError::Provider(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AdjudicatorError::Provider(format!(
                "payment-link provider returned {}",
                response.status()
            )));
        }
        let link: CheckoutLink = response
            .json()
            .await
            .map_err(|e| AdjudicatorError::Provider(e.to_string()))?;

        store.record_transaction(
            &link.id,
            user_id,
            PurchaseTarget::UnlimitedAccess,
            self.amount,
            TransactionStatus::Pending,
        )?;
        info!("payment link {} created for user {}", link.id, user_id);
        Ok(link)
    }

    /// Completes the referenced transaction and grants unlimited access.
    /// Safe to invoke repeatedly: an already-completed reference reports
    /// success without a second grant.
    pub fn settle(
        &self,
        store: &EntitlementStore,
        user_id: i64,
        external_ref: &str,
    ) -> Result<Settlement, AdjudicatorError> {
        match store.transaction(external_ref)? {
            Some(record) if record.status == TransactionStatus::Completed => Ok(Settlement {
                user_id: record.user_id,
                target: record.target,
                external_ref: external_ref.to_string(),
                already_settled: true,
            }),
            Some(record) => {
                // entitlement first: a reference is only marked completed
                // once the grant is durable
                store.grant_unlimited_access(record.user_id)?;
                store.complete_transaction(external_ref)?;
                info!(
                    "payment link {} settled for user {}",
                    external_ref, record.user_id
                );
                Ok(Settlement {
                    user_id: record.user_id,
                    target: record.target,
                    external_ref: external_ref.to_string(),
                    already_settled: false,
                })
            }
            None => {
                // reference confirmed straight from the provider dashboard,
                // with no pending row recorded by this process
                store.grant_unlimited_access(user_id)?;
                store.record_transaction(
                    external_ref,
                    user_id,
                    PurchaseTarget::UnlimitedAccess,
                    self.amount,
                    TransactionStatus::Completed,
                )?;
                info!(
                    "payment link {} settled for user {} without a pending row",
                    external_ref, user_id
                );
                Ok(Settlement {
                    user_id,
                    target: PurchaseTarget::UnlimitedAccess,
                    external_ref: external_ref.to_string(),
                    already_settled: false,
                })
            }
        }
    }
}
