//! Result Log - append-only JSONL record of every RiskResult
//!
//! Scored transactions (features + score + model version) land in
//! `{dir}/results-<timestamp>.jsonl` with automatic size rotation.
//! Gated by `SafetyConfig::is_result_log_enabled`.

pub mod writer;

#[cfg(test)]
mod tests;

pub use writer::{ResultLogStatus, ResultWriter};
