//! Feature computation.
//!
//! `compute_features` is pure; `assemble_features` adds the two lookups
//! (velocity aggregates + pattern flags) and is the only entry point used by
//! both the scoring path and the training path.

use std::f64::consts::PI;

use chrono::{Datelike, Timelike};

use super::layout::Feature;
use super::risk_tables;
use super::vector::FeatureVector;
use crate::logic::error::FraudResult;
use crate::logic::patterns::{PatternFlags, PatternIndex};
use crate::logic::transaction::Transaction;
use crate::logic::velocity::{AggregateQuery, AggregateReader, HistoricalAggregates};

// ============================================================================
// SCALES (raw / scale, capped at 1.0)
// ============================================================================

const AMOUNT_SCALE: f64 = 10_000.0;
const AMOUNT_RATIO_SCALE: f64 = 10.0;
const COUNT_1H_SCALE: f64 = 10.0;
const COUNT_24H_SCALE: f64 = 50.0;
const SUM_1H_SCALE: f64 = 10_000.0;
const SUM_24H_SCALE: f64 = 50_000.0;
const FANOUT_SCALE: f64 = 20.0;
const REUSE_SCALE: f64 = 5.0;

const ROUND_AMOUNT_UNIT: f64 = 100.0;
const NIGHT_END_HOUR: u32 = 6;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Pure feature computation. `tx.amount` must already be validated.
pub fn compute_features(
    tx: &Transaction,
    aggregates: &HistoricalAggregates,
    flags: &PatternFlags,
) -> FeatureVector {
    let mut v = FeatureVector::new();
    let amount = tx.amount;

    // Amount
    v.set(Feature::AmountLog, (amount + 1.0).ln());
    v.set(Feature::AmountScaled, ratio(amount, AMOUNT_SCALE));
    let sender_avg = if aggregates.sender_count_24h > 0 {
        aggregates.sender_sum_24h / aggregates.sender_count_24h as f64
    } else {
        0.0
    };
    if sender_avg > 0.0 {
        v.set(Feature::AmountToSenderAvg, ratio(amount / sender_avg, AMOUNT_RATIO_SCALE));
    }
    v.set(
        Feature::IsRoundAmount,
        flag(amount >= ROUND_AMOUNT_UNIT && amount % ROUND_AMOUNT_UNIT == 0.0),
    );

    // Time
    let hour = tx.timestamp.hour() as f64 + tx.timestamp.minute() as f64 / 60.0;
    let hour_angle = 2.0 * PI * hour / 24.0;
    v.set(Feature::HourSin, hour_angle.sin());
    v.set(Feature::HourCos, hour_angle.cos());
    let dow_angle = 2.0 * PI * tx.timestamp.weekday().num_days_from_monday() as f64 / 7.0;
    v.set(Feature::DowSin, dow_angle.sin());
    v.set(Feature::DowCos, dow_angle.cos());
    v.set(Feature::IsNight, flag(tx.timestamp.hour() < NIGHT_END_HOUR));

    // Sender velocity
    v.set(Feature::SenderCount1h, ratio(aggregates.sender_count_1h as f64, COUNT_1H_SCALE));
    v.set(Feature::SenderCount24h, ratio(aggregates.sender_count_24h as f64, COUNT_24H_SCALE));
    v.set(Feature::SenderSum1h, ratio(aggregates.sender_sum_1h, SUM_1H_SCALE));
    v.set(Feature::SenderSum24h, ratio(aggregates.sender_sum_24h, SUM_24H_SCALE));
    v.set(Feature::SenderFanout24h, ratio(aggregates.sender_distinct_receivers_24h as f64, FANOUT_SCALE));

    // Receiver velocity
    v.set(Feature::ReceiverCount1h, ratio(aggregates.receiver_count_1h as f64, COUNT_1H_SCALE));
    v.set(Feature::ReceiverCount24h, ratio(aggregates.receiver_count_24h as f64, COUNT_24H_SCALE));
    v.set(Feature::ReceiverSum24h, ratio(aggregates.receiver_sum_24h, SUM_24H_SCALE));
    v.set(Feature::ReceiverFanin24h, ratio(aggregates.receiver_distinct_senders_24h as f64, FANOUT_SCALE));

    // Reuse
    v.set(Feature::DeviceReuse24h, ratio(aggregates.device_other_senders_24h as f64, REUSE_SCALE));
    v.set(Feature::IpReuse24h, ratio(aggregates.ip_other_senders_24h as f64, REUSE_SCALE));
    v.set(Feature::MissingDevice, flag(tx.device_id.is_none()));
    v.set(Feature::MissingIp, flag(tx.ip.is_none()));

    v.set(Feature::NewCounterparty, flag(!aggregates.has_prior_counterparty));

    // Risk lookups
    v.set(Feature::CountryRisk, risk_tables::country_risk(tx.country()));
    v.set(Feature::BinRisk, risk_tables::bin_risk(tx.card_bin.as_deref()));
    v.set(Feature::TypeRisk, risk_tables::type_risk(tx.tx_type));
    v.set(Feature::ChannelRisk, risk_tables::channel_risk(tx.channel));

    // Pattern-derived
    v.set(Feature::InRing, flag(flags.in_ring));
    v.set(Feature::RingConfidence, flags.ring_confidence);
    v.set(Feature::IsHub, flag(flags.is_hub));
    v.set(Feature::InVelocityCluster, flag(flags.in_velocity_cluster));
    v.set(Feature::VelocityConfidence, flags.velocity_confidence);
    v.set(Feature::InDenseSubgraph, flag(flags.in_dense_subgraph));
    v.set(Feature::DenseConfidence, flags.dense_confidence);

    v
}

/// Aggregate lookup + pattern lookup + `compute_features`
pub fn assemble_features(
    tx: &Transaction,
    reader: &dyn AggregateReader,
    index: &PatternIndex,
) -> FraudResult<FeatureVector> {
    let aggregates = reader.aggregates(&AggregateQuery::for_transaction(tx))?;
    let flags = index.flags_for_transaction(tx);
    Ok(compute_features(tx, &aggregates, &flags))
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

#[inline]
fn ratio(raw: f64, scale: f64) -> f64 {
    (raw / scale).clamp(0.0, 1.0)
}

#[inline]
fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
