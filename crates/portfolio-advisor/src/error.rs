//! Error Types for the Portfolio Advisor

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Questionnaire answer outside 1..=3
    #[error("Answer #{index} out of range: {value} (expected {min}..={max})")]
    InvalidAnswerRange {
        index: usize,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Algorithm preference outside 0..=1
    #[error("Preference '{field}' out of range: {value} (expected 0 or 1)")]
    InvalidPreference { field: &'static str, value: i64 },

    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Insufficient universe: got {got} instruments, need at least {min}")]
    InsufficientUniverse { got: usize, min: usize },

    #[error("Corrupt data for {symbol}: non-finite return at period {index}")]
    CorruptInstrumentData { symbol: String, index: usize },

    #[error("Sample count must be at least 1")]
    InvalidSampleCount,

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid investment amount: {0}")]
    InvalidAmount(rust_decimal::Decimal),

    #[error("Invalid instrument {symbol}: {reason}")]
    InvalidInstrument { symbol: String, reason: String },

    #[error("Instrument not available: {0}")]
    UnknownInstrument(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    /// The source answered but refused the request (4xx)
    #[error("Market data request rejected: {0}")]
    MarketDataRejected(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    /// Only failures of the market data collaborator are worth retrying;
    /// validation errors fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdvisorError::Network(_) | AdvisorError::MarketData(_))
    }

    /// Convert to a message suitable for a page or console prompt
    pub fn user_message(&self) -> String {
        match self {
            AdvisorError::InvalidAnswerRange { index, min, max, .. } => {
                format!("Question #{index} must be answered with a value from {min} to {max}.")
            }
            AdvisorError::InvalidPreference { field, .. } => {
                format!("Please answer '{field}' with 0 or 1.")
            }
            AdvisorError::InsufficientHistory(_) => {
                "Not enough market history is available to build a portfolio.".into()
            }
            AdvisorError::InsufficientUniverse { .. } => {
                "Not enough instruments are available to build a portfolio.".into()
            }
            AdvisorError::CorruptInstrumentData { symbol, .. } => {
                format!("Market data for {symbol} is corrupt. Please try again later.")
            }
            AdvisorError::InvalidAmount(_) => {
                "The investment amount must be non-negative with at most 2 decimal places.".into()
            }
            AdvisorError::UnknownInstrument(symbol) => {
                format!("No market data is available for {symbol}.")
            }
            AdvisorError::Network(_) | AdvisorError::MarketData(_) | AdvisorError::MarketDataRejected(_) => {
                "The market data service is currently unavailable. Please try again.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}
