//! Error taxonomy for the scoring / mining / lifecycle core.
//!
//! Expected control-flow outcomes (a skipped retrain, a rolled-back
//! challenger) are modelled as result variants elsewhere; the variants here
//! are what those outcomes carry as their reason.

use thiserror::Error;

pub type FraudResult<T> = Result<T, FraudError>;

#[derive(Debug, Error)]
pub enum FraudError {
    /// Negative / NaN / infinite amount, malformed identifier
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Too few labeled samples for at least one class
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Numerical / optimizer failure while fitting a model
    #[error("training failure: {0}")]
    TrainingFailure(String),

    /// Challenger did not beat the champion by the promotion margin
    #[error("evaluation regression: challenger auc {challenger:.4} < champion auc {champion:.4} + margin {margin:.4}")]
    EvaluationRegression {
        challenger: f64,
        champion: f64,
        margin: f64,
    },

    /// Another retrain cycle holds the lifecycle lock
    #[error("lock contention: {0}")]
    LockContention(String),

    /// Feature layout or model schema does not match the running engine
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FraudError {
    /// Failures that count towards the guardian's backoff counter
    pub fn is_training_failure(&self) -> bool {
        matches!(
            self,
            FraudError::TrainingFailure(_)
                | FraudError::Storage(_)
                | FraudError::Io(_)
                | FraudError::Serialization(_)
                | FraudError::SchemaMismatch(_)
        )
    }
}
