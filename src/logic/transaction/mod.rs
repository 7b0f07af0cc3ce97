//! Transaction domain records and input validation.

mod types;
mod validate;

pub use types::{AnalystLabel, Channel, Decision, RiskResult, Transaction, TransactionType};
pub use validate::{validate_amount, validate_transaction};
