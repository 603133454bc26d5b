//! Processor abstraction.

use async_trait::async_trait;

use super::PaymentError;

/// What the payer is asked to approve.
#[derive(Debug, Clone)]
pub struct CheckoutOrder<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub description: &'a str,
    /// Where the processor sends the payer after approval.
    pub return_url: &'a str,
    /// Where the processor sends the payer after cancelling.
    pub cancel_url: &'a str,
}

/// A payment opened at the processor, awaiting payer approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub approval_url: String,
}

/// Result of asking the processor to capture an approved payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Funds were captured.
    pub completed: bool,
    /// Processor-reported state, for logs.
    pub state: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, order: &CheckoutOrder<'_>)
    -> Result<CreatedPayment, PaymentError>;

    async fn capture_payment(
        &self,
        payment_id: &str,
        payer_ref: &str,
    ) -> Result<CaptureOutcome, PaymentError>;
}
