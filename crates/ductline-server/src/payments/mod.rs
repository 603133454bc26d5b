//! Fast Track payments.
//!
//! A [`PaymentGateway`] talks to the processor; [`CheckoutService`] keeps
//! the local payment records in step with it and triggers the paid bump
//! once a capture succeeds. [`PayPalClient`] is the production gateway.

mod checkout;
mod gateway;
pub mod money;
mod paypal;


use thiserror::Error;

pub use checkout::{CaptureResult, Checkout, CheckoutRequest, CheckoutService, PaidBumpRequest};
pub use gateway::{CaptureOutcome, CheckoutOrder, CreatedPayment, PaymentGateway};
pub use paypal::{PayPalClient, PayPalConfig};

/// Payment processor errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected payment API response: {0}")]
    Response(String),
}
