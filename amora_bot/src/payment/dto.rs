use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::entitlements::handler::StoreError;

/// Offer returned by the manual-proof adjudicator: pay this much to this
/// UPI id, then send a screenshot.
#[derive(Debug, Clone)]
pub struct PaymentInstructions {
    pub upi_id: String,
    pub amount: u32,
    pub qr: QrRender,
}

/// Render target for the payment QR: the configured static image when it
/// exists, otherwise a generated code encoding the UPI id.
#[derive(Debug, Clone)]
pub enum QrRender {
    File(PathBuf),
    Unicode(String),
}

/// Offer returned by the checkout-link adjudicator.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLink {
    pub id: String,
    pub short_url: String,
}

/// Adjudicator failures surfaced to the user as "try again"; the
/// transaction is left absent or pending, never falsely completed.
#[derive(Debug, Error)]
pub enum AdjudicatorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("payment provider error: {0}")]
    Provider(String),
    #[error("payment proof verification is not configured")]
    OcrUnavailable,
    #[error("this payment method is not configured")]
    Disabled,
    #[error("failed to render payment QR code: {0}")]
    Qr(String),
}

/// Fail-closed settlement rejections for the in-platform invoice path.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("invalid currency '{0}', expected XTR")]
    InvalidCurrency(String),
    #[error(transparent)]
    UnknownPayloadType(#[from] amora_core::helpers::dto::PayloadError),
    #[error("payload references unknown character '{0}'")]
    UnknownCharacter(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
