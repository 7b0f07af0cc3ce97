//! Logic Module - Business Logic & Engines
//!
//! Chứa các engines xử lý: Feature Engine, Velocity Reader, Pattern Miner,
//! Scorer, Guardian.
//!
//! ## Architecture
//! - `features/` - fixed-schema feature vector (serving == training)
//! - `velocity/` - SQLite history + windowed aggregates
//! - `patterns/` - graph pattern mining + entity index
//! - `model/` - classifier, versions, registry, scorer
//! - `guardian/` - autonomous retrain / promote / rollback
//! - `engine` / `scheduler` / `runtime` - wiring

// Core types
pub mod config;
pub mod error;
pub mod transaction;

// Engines
pub mod features;
pub mod guardian;
pub mod model;
pub mod patterns;
pub mod velocity;

// Wiring
pub mod dataset;
pub mod engine;
pub mod runtime;
pub mod scheduler;
