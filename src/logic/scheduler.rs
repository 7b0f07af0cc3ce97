//! Background Scheduler
//!
//! Two tokio tasks, both off the scoring path:
//! - mining: every `mining_interval_secs`, mine the recent window
//! - lifecycle: every `lifecycle_interval_secs` OR on label arrival, let the
//!   guardian check its triggers
//!
//! Blocking work (SQLite reads, graph mining, training) runs in
//! `spawn_blocking`. Shutdown via a watch channel.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::logic::config::SchedulerConfig;
use crate::logic::engine::ScoringEngine;
use crate::logic::guardian::{CycleOutcome, Guardian};

// ============================================================================
// INTERVAL TRIGGER
// ============================================================================

/// Pure "is it time yet" computation; fires immediately the first time
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    period: Duration,
    last_fired: Option<DateTime<Utc>>,
}

impl IntervalTrigger {
    pub fn new(period_secs: u64) -> Self {
        Self {
            period: Duration::seconds(period_secs.min(i64::MAX as u64) as i64),
            last_fired: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now - last >= self.period,
        }
    }

    pub fn mark_fired(&mut self, now: DateTime<Utc>) {
        self.last_fired = Some(now);
    }

    /// `is_due` + `mark_fired` in one step
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_due(now) {
            self.mark_fired(now);
            true
        } else {
            false
        }
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.last_fired.map(|last| last + self.period)
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

pub struct Scheduler {
    engine: Arc<ScoringEngine>,
    guardian: Arc<Guardian>,
    config: SchedulerConfig,
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(engine: Arc<ScoringEngine>, guardian: Arc<Guardian>, config: SchedulerConfig) -> Self {
        Self {
            engine,
            guardian,
            config,
        }
    }

    /// Spawn the background tasks. Must be called inside a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tick = StdDuration::from_millis(self.config.tick_millis.max(1));
        let labels = self.engine.subscribe_labels();

        let mining = tokio::spawn(mining_loop(
            self.engine.clone(),
            IntervalTrigger::new(self.config.mining_interval_secs),
            tick,
            shutdown_rx.clone(),
        ));
        let lifecycle = tokio::spawn(lifecycle_loop(
            self.guardian.clone(),
            IntervalTrigger::new(self.config.lifecycle_interval_secs),
            labels,
            tick,
            shutdown_rx,
        ));

        log::info!(
            "Scheduler started: mining every {}s, lifecycle every {}s (+ on label)",
            self.config.mining_interval_secs,
            self.config.lifecycle_interval_secs
        );

        SchedulerHandle {
            shutdown: shutdown_tx,
            tasks: vec![mining, lifecycle],
        }
    }
}

impl SchedulerHandle {
    /// Signal shutdown and wait for in-flight work to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::warn!("Scheduler task ended abnormally: {}", e);
            }
        }
        log::info!("Scheduler stopped");
    }
}

// ============================================================================
// TASKS
// ============================================================================

async fn mining_loop(
    engine: Arc<ScoringEngine>,
    mut trigger: IntervalTrigger,
    tick: StdDuration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                if !trigger.poll(now) {
                    continue;
                }
                let engine = engine.clone();
                match tokio::task::spawn_blocking(move || engine.mine_patterns(now)).await {
                    Ok(Ok(Some(summary))) => log::debug!(
                        "Mining run {} published {} active cards",
                        summary.run,
                        summary.active_cards
                    ),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => log::error!("Pattern mining failed: {}", e),
                    Err(e) => log::error!("Pattern mining task aborted: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn lifecycle_loop(
    guardian: Arc<Guardian>,
    mut trigger: IntervalTrigger,
    mut labels: mpsc::UnboundedReceiver<()>,
    tick: StdDuration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut labels_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if trigger.poll(Utc::now()) {
                    run_check(&guardian).await;
                }
            }
            event = labels.recv(), if labels_open => {
                match event {
                    Some(()) => {
                        // coalesce a burst of labels into one check
                        while labels.try_recv().is_ok() {}
                        trigger.mark_fired(Utc::now());
                        run_check(&guardian).await;
                    }
                    None => labels_open = false,
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn run_check(guardian: &Arc<Guardian>) {
    let guardian = guardian.clone();
    match tokio::task::spawn_blocking(move || guardian.check_triggers(Utc::now())).await {
        Ok(CycleOutcome::NotTriggered { reason }) => log::trace!("Lifecycle check: {}", reason),
        Ok(outcome) => log::debug!("Lifecycle cycle finished: {:?}", outcome),
        Err(e) => log::error!("Lifecycle task aborted: {}", e),
    }
}
