//! End-to-end scoring: validation, feature parity, pattern feedback.

use chrono::{DateTime, Duration, TimeZone, Utc};

use fraud_shield::logic::features::Feature;
use fraud_shield::{AnalystLabel, EngineConfig, FraudError, FraudShield, Transaction};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
}

fn shield() -> FraudShield {
    FraudShield::open(EngineConfig::in_memory()).unwrap()
}

#[test]
fn invalid_amounts_rejected_before_anything_is_stored() {
    let shield = shield();
    for amount in [-5.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let tx = Transaction::new("bad", "alice", "bob", amount, t0());
        let err = shield.score(&tx).unwrap_err();
        assert!(matches!(err, FraudError::InvalidInput(_)), "amount {amount}: {err}");
    }
    assert_eq!(shield.engine().store().transaction_count().unwrap(), 0);
    assert_eq!(shield.engine().scorer().status().score_count, 0);
}

#[test]
fn scoring_is_deterministic_for_fixed_model() {
    let shield = shield();
    let history = Transaction::new("h1", "alice", "bob", 250.0, t0() - Duration::minutes(20)).with_device("d1");
    shield.score(&history).unwrap();

    let tx = Transaction::new("tx", "alice", "carol", 980.0, t0())
        .with_device("d1")
        .with_ip("10.0.0.7")
        .with_metadata("country", "NG");
    let a = shield.engine().serving_features(&tx).unwrap();
    let b = shield.engine().serving_features(&tx).unwrap();
    assert_eq!(a, b);

    let scorer = shield.engine().scorer();
    assert_eq!(scorer.score(&a).unwrap(), scorer.score(&b).unwrap());
}

#[test]
fn serving_and_training_features_are_identical() {
    let shield = shield();
    let engine = shield.engine();

    let mut served = Vec::new();
    for i in 0..6 {
        let tx = Transaction::new(
            format!("tx_{i}"),
            if i % 2 == 0 { "alice" } else { "bob" },
            if i % 3 == 0 { "carol" } else { "dave" },
            100.0 + i as f64 * 35.0,
            t0() + Duration::minutes(i * 7),
        )
        .with_device(if i < 3 { "dev_a" } else { "dev_b" });
        served.push(shield.score(&tx).unwrap());
    }

    // a later transaction must not leak into earlier training examples
    shield
        .score(&Transaction::new("late", "alice", "carol", 5000.0, t0() + Duration::hours(2)))
        .unwrap();

    shield.record_label(&AnalystLabel::new("tx_2", true, t0() + Duration::hours(3))).unwrap();
    shield.record_label(&AnalystLabel::new("tx_4", false, t0() + Duration::hours(3))).unwrap();

    let dataset = engine.training_dataset().unwrap();
    assert_eq!(dataset.len(), 2);
    for example in dataset {
        let result = served
            .iter()
            .find(|r| r.transaction_id == example.transaction_id)
            .unwrap();
        assert_eq!(result.features.values, example.features.values);
        assert_eq!(result.features.layout_hash, example.features.layout_hash);
    }
}

#[test]
fn result_model_version_is_registered() {
    let shield = shield();
    let result = shield
        .score(&Transaction::new("tx", "alice", "bob", 42.0, t0()))
        .unwrap();
    assert!(shield.registry().contains(result.model_version));
    assert_eq!(result.model_version, shield.registry().active_version());
    assert!((0.0..=1.0).contains(&result.score));
}

#[test]
fn mined_ring_feeds_back_into_features() {
    let shield = shield();
    let ring = [("user_1", "user_2"), ("user_2", "user_3"), ("user_3", "user_1")];
    for (i, (from, to)) in ring.iter().enumerate() {
        shield
            .score(&Transaction::new(format!("r{i}"), *from, *to, 900.0, t0() + Duration::minutes(i as i64)))
            .unwrap();
    }

    let summary = shield.mine_patterns(t0() + Duration::minutes(10)).unwrap().unwrap();
    assert!(summary.stats.rings >= 1);

    let member = Transaction::new("m", "user_1", "shop", 20.0, t0() + Duration::minutes(11));
    let outsider = Transaction::new("o", "user_10", "shop", 20.0, t0() + Duration::minutes(11));

    let fv_member = shield.engine().serving_features(&member).unwrap();
    let fv_outsider = shield.engine().serving_features(&outsider).unwrap();
    assert_eq!(fv_member.get(Feature::InRing), 1.0);
    assert!(fv_member.get(Feature::RingConfidence) > 0.0);
    assert_eq!(fv_outsider.get(Feature::InRing), 0.0);

    let risky = shield.score(&member).unwrap();
    let clean = shield.score(&outsider).unwrap();
    assert!(risky.score > clean.score);
}
