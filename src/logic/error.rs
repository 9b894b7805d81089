//! Engine error taxonomy
//!
//! Recoverable variants are handled at the stage that raised them; fatal
//! variants terminate ingestion after a diagnostic is logged.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A stage's required attribute key is absent. Recovered locally by
    /// skipping that stage.
    #[error("required attribute `{0}` missing")]
    MissingAttribute(&'static str),

    /// A logical-address binding was attempted before the device was ever
    /// upserted. Logged and skipped.
    #[error("no device registered for hardware address {0}")]
    UnknownHardwareAddress(String),

    /// A detection-flagged record matched no rule in the table.
    #[error("record matched no detection rule (pkt {0:?})")]
    UnrecognizedDetection(Option<i64>),

    /// Storage or transaction error. The in-flight transaction is rolled
    /// back; partial device state is worse than stopping.
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    /// Live feed timestamps lag wall-clock time beyond the threshold.
    /// External restart required.
    #[error("capture feed stale: record lags wall clock by {lag_secs}s")]
    StaleCaptureFeed { lag_secs: i64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}
