//! Feature computation tests
//!
//! Covers the pure `compute_features` contract and the shared assembly path.

#[cfg(test)]
mod compute_tests {
    use chrono::{TimeZone, Utc};

    use crate::logic::features::{compute_features, Feature, FeatureVector};
    use crate::logic::patterns::PatternFlags;
    use crate::logic::transaction::{Channel, Transaction, TransactionType};
    use crate::logic::velocity::HistoricalAggregates;

    fn sample_tx(amount: f64) -> Transaction {
        // Wednesday 03:30 UTC
        let ts = Utc.with_ymd_and_hms(2026, 3, 4, 3, 30, 0).unwrap();
        Transaction::new("tx_100", "acct_s", "acct_r", amount, ts)
            .with_type(TransactionType::Withdrawal)
            .with_channel(Channel::Api)
            .with_metadata("country", "NG")
    }

    fn busy_sender() -> HistoricalAggregates {
        HistoricalAggregates {
            sender_count_1h: 4,
            sender_count_24h: 10,
            sender_sum_1h: 400.0,
            sender_sum_24h: 1_000.0,
            sender_distinct_receivers_24h: 8,
            receiver_count_1h: 1,
            receiver_count_24h: 2,
            receiver_sum_24h: 150.0,
            receiver_distinct_senders_24h: 2,
            device_other_senders_24h: 3,
            ip_other_senders_24h: 0,
            has_prior_counterparty: false,
        }
    }

    #[test]
    fn test_deterministic() {
        let tx = sample_tx(500.0);
        let agg = busy_sender();
        let flags = PatternFlags::default();
        assert_eq!(compute_features(&tx, &agg, &flags), compute_features(&tx, &agg, &flags));
    }

    #[test]
    fn test_amount_features() {
        let v = compute_features(&sample_tx(500.0), &busy_sender(), &PatternFlags::default());
        assert!((v.get(Feature::AmountLog) - 501f64.ln()).abs() < 1e-12);
        assert!((v.get(Feature::AmountScaled) - 0.05).abs() < 1e-12);
        // sender avg = 100 → ratio 5 / 10
        assert!((v.get(Feature::AmountToSenderAvg) - 0.5).abs() < 1e-12);
        assert_eq!(v.get(Feature::IsRoundAmount), 1.0);
    }

    #[test]
    fn test_ratios_are_capped() {
        let mut agg = busy_sender();
        agg.sender_count_1h = 10_000;
        agg.sender_sum_24h = 1e12;
        let v = compute_features(&sample_tx(1e9), &agg, &PatternFlags::default());
        assert_eq!(v.get(Feature::SenderCount1h), 1.0);
        assert_eq!(v.get(Feature::SenderSum24h), 1.0);
        assert_eq!(v.get(Feature::AmountScaled), 1.0);
        for value in v.as_slice() {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_cyclical_time_encoding() {
        let v = compute_features(&sample_tx(10.0), &HistoricalAggregates::default(), &PatternFlags::default());
        let (s, c) = (v.get(Feature::HourSin), v.get(Feature::HourCos));
        assert!((s * s + c * c - 1.0).abs() < 1e-9);
        assert_eq!(v.get(Feature::IsNight), 1.0);
        // Wednesday → day index 2
        let angle = 2.0 * std::f64::consts::PI * 2.0 / 7.0;
        assert!((v.get(Feature::DowSin) - angle.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_cold_start_zeros() {
        let v = compute_features(&sample_tx(75.0), &HistoricalAggregates::default(), &PatternFlags::default());
        assert_eq!(v.get(Feature::SenderCount24h), 0.0);
        assert_eq!(v.get(Feature::AmountToSenderAvg), 0.0);
        assert_eq!(v.get(Feature::NewCounterparty), 1.0);
        assert_eq!(v.get(Feature::MissingDevice), 1.0);
    }

    #[test]
    fn test_pattern_flags_flow_into_vector() {
        let flags = PatternFlags {
            in_ring: true,
            ring_confidence: 0.8,
            is_hub: true,
            ..PatternFlags::default()
        };
        let v = compute_features(&sample_tx(10.0), &busy_sender(), &flags);
        assert_eq!(v.get(Feature::InRing), 1.0);
        assert_eq!(v.get(Feature::RingConfidence), 0.8);
        assert_eq!(v.get(Feature::IsHub), 1.0);
        assert_eq!(v.get(Feature::InDenseSubgraph), 0.0);
    }

    #[test]
    fn test_risk_lookups() {
        let v = compute_features(&sample_tx(10.0), &busy_sender(), &PatternFlags::default());
        assert_eq!(v.get(Feature::CountryRisk), 0.7);
        assert_eq!(v.get(Feature::ChannelRisk), 0.6);
        assert_eq!(v.get(Feature::TypeRisk), 0.6);
        assert!(FeatureVector::new().is_compatible() && v.is_compatible());
    }
}
