//! Confirmation under contention
//!
//! Competing writers keep relabelling one object while a confirmer stamps
//! the deletion confirmation onto it. Afterwards the object must be
//! confirmed and every writer's last label must have survived.

use dgate_core::{
    is_deletion_confirmed, ConfirmError, ConfirmOutcome, DeletionConfirmer, InMemoryStore,
    ManagedResource, ObjectKey, OperationContext, StoreStats,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Simulation parameters
#[derive(Debug, Clone)]
pub(crate) struct ContendConfig {
    pub(crate) seed: u64,
    pub(crate) writers: usize,
    pub(crate) rounds: u32,
    /// Artificial latency of every store call
    pub(crate) latency: Duration,
    /// Upper bound on the pause between two writes of the same writer
    pub(crate) max_pause: Duration,
    pub(crate) timeout: Duration,
}

impl Default for ContendConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            writers: 4,
            rounds: 20,
            latency: Duration::from_millis(1),
            max_pause: Duration::from_millis(3),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ContendReport {
    pub(crate) config: ContendConfig,
    pub(crate) outcome: Result<ConfirmOutcome, ConfirmError>,
    pub(crate) stats: StoreStats,
    pub(crate) confirmed: bool,
    /// Writers whose final label did not make it into the stored object
    pub(crate) lost_labels: Vec<String>,
}

impl ContendReport {
    pub(crate) fn passed(&self) -> bool {
        self.outcome.is_ok() && self.confirmed && self.lost_labels.is_empty()
    }

    pub(crate) fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Deletion Gate Contention Report ===\n\n");
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Writers: {}\n", self.config.writers));
        report.push_str(&format!("Rounds: {}\n", self.config.rounds));
        match &self.outcome {
            Ok(outcome) => report.push_str(&format!("Outcome: {outcome:?}\n")),
            Err(err) => report.push_str(&format!("Outcome: error: {err}\n")),
        }
        report.push_str(&format!("Store Gets: {}\n", self.stats.gets));
        report.push_str(&format!("Store Updates: {}\n", self.stats.updates));
        report.push_str(&format!("Conflicts: {}\n", self.stats.conflicts));
        report.push_str(&format!("Confirmed: {}\n", self.confirmed));

        if !self.lost_labels.is_empty() {
            report.push_str("\n=== Lost Labels ===\n");
            for (i, label) in self.lost_labels.iter().enumerate() {
                report.push_str(&format!("{}. {label}\n", i + 1));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

fn target_key() -> ObjectKey {
    ObjectKey::namespaced("Shoot", "garden-sim", "contended")
}

fn writer_label(writer: usize) -> String {
    format!("sim.gardener.cloud/writer-{writer}")
}

/// Relabel the target `rounds` times with random pauses
async fn run_writer(store: Arc<InMemoryStore>, writer: usize, config: ContendConfig) {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(writer as u64));
    let key = target_key();
    let max_pause = u64::try_from(config.max_pause.as_micros()).unwrap_or(u64::MAX);

    for round in 0..config.rounds {
        let pause = rng.random_range(0..=max_pause);
        tokio::time::sleep(Duration::from_micros(pause)).await;

        let label = writer_label(writer);
        let result = store.modify(&key, |obj| {
            obj.labels.insert(label, round.to_string());
        });
        if let Err(err) = result {
            tracing::warn!(writer, round, %err, "writer stopped");
            return;
        }
    }
    tracing::debug!(writer, "writer finished");
}

/// Run one contention scenario to completion
pub(crate) async fn run_contention(
    config: ContendConfig,
    confirmer: &DeletionConfirmer,
) -> ContendReport {
    let store = Arc::new(InMemoryStore::new().with_latency(config.latency));
    let key = target_key();
    if let Err(err) = store.create(ManagedResource::new(key.clone())) {
        tracing::error!(%err, "seeding target failed");
    }

    tracing::info!(
        seed = config.seed,
        writers = config.writers,
        rounds = config.rounds,
        "starting contention run"
    );

    let writers: Vec<_> = (0..config.writers)
        .map(|writer| tokio::spawn(run_writer(Arc::clone(&store), writer, config.clone())))
        .collect();

    let ctx = OperationContext::new().with_timeout(config.timeout);
    let mut resource = ManagedResource::new(key.clone());
    let outcome = confirmer
        .confirm_deletion(&ctx, &store, &mut resource)
        .await;

    for (writer, handle) in writers.into_iter().enumerate() {
        if let Err(err) = handle.await {
            tracing::error!(writer, %err, "writer task failed");
        }
    }

    let stored = store.peek(&key);
    let confirmed = stored.as_ref().is_some_and(is_deletion_confirmed);
    let final_round = config.rounds.checked_sub(1).map(|r| r.to_string());
    let lost_labels = match final_round {
        None => Vec::new(),
        Some(expected) => (0..config.writers)
            .map(writer_label)
            .filter(|label| {
                stored
                    .as_ref()
                    .and_then(|obj| obj.labels.get(label))
                    .map_or(true, |round| *round != expected)
            })
            .collect(),
    };

    ContendReport {
        config,
        outcome,
        stats: store.stats(),
        confirmed,
        lost_labels,
    }
}
