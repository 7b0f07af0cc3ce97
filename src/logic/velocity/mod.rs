//! Velocity Module - transaction history and windowed aggregates.

mod aggregates;
mod store;

pub use aggregates::{AggregateQuery, AggregateReader, HistoricalAggregates};
pub use store::TransactionStore;
