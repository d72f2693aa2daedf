use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters of a payment triggered by a webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Amount in minor currency units.
    pub amount: i64,
}

impl PaymentRequest {
    pub fn new(amount: i64) -> Self {
        Self { amount }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Succeeded,
}

/// Transaction returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn succeeded(id: impl Into<String>, amount: i64) -> Self {
        Self {
            id: id.into(),
            amount,
            status: TransactionStatus::Succeeded,
            created_at: Utc::now(),
        }
    }
}

/// Failure reported by the gateway. The display text is what gets cached and replayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Payment gateway timeout")]
    Timeout,

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// The side-effecting downstream call guarded by the webhook processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Transaction, GatewayError>;
}

/// Gateway stand-in that approves every payment with id `txn_{amount}`.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway;

impl SimulatedGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Transaction, GatewayError> {
        tracing::debug!(amount = request.amount, "Simulated payment created");
        Ok(Transaction::succeeded(format!("txn_{}", request.amount), request.amount))
    }
}
