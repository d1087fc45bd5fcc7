pub mod checkout;
pub mod dto;
pub mod ledger;
pub mod manual;
pub mod ocr;
pub mod stars;
