use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Insufficient data: need at least {required} bars, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Indicator {indicator} undefined at bar {index}")]
    IndicatorUndefined { indicator: String, index: usize },

    #[error("No data available for {instrument}")]
    NoData { instrument: String },

    #[error("Order rejected with code {code}")]
    OrderRejected { code: i32 },

    #[error("Bars out of order at index {index}: timestamps must be strictly increasing")]
    UnorderedBars { index: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Data loading error: {0}")]
    DataLoadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    CsvError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl SimError {
    /// Whether a multi-instrument batch may carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::InsufficientData { .. }
                | SimError::IndicatorUndefined { .. }
                | SimError::NoData { .. }
                | SimError::OrderRejected { .. }
                | SimError::UnorderedBars { .. }
                | SimError::DataLoadError(_)
                | SimError::CsvError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
