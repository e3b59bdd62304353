use thiserror::Error;

#[derive(Debug, Error)]
pub enum GasError {
    #[error("gas token balance lookup failed: {0}")]
    BalanceLookup(String),

    #[error("gas token transfer failed: {0}")]
    Transfer(String),

    #[error("insufficient gas: have {balance}, need {required}")]
    Insufficient { balance: u64, required: u64 },
}
