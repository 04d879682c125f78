use std::sync::Arc;

use chrono::Local;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::category::City;
use crate::config::ScrapeConfig;
use crate::info_time;
use crate::session::SessionFactory;
use crate::shard::{partition, Shard, ShardResult};
use crate::store::ShardStore;
use crate::worker::run_shard;
use crate::Result;

/// What a run did with every shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub shards: usize,
    /// Completed and marked during this run.
    pub completed: Vec<usize>,
    /// Already marked before this run.
    pub skipped: Vec<usize>,
    /// Left without a marker, with the reason. They are redone on the next run.
    pub failed: Vec<(usize, String)>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Splits the city list into shards, runs one worker per unfinished shard, and marks
/// every shard whose result is consistent. Running it again only redoes unmarked shards.
pub struct Orchestrator<F> {
    config: Arc<ScrapeConfig>,
    factory: Arc<F>,
    store: ShardStore,
}

type WorkerOutcome = (Shard, core::result::Result<Result<ShardResult>, JoinError>);

impl<F: SessionFactory> Orchestrator<F> {
    pub fn new(config: ScrapeConfig, factory: F) -> Self {
        let store = ShardStore::new(config.output_dir.clone());
        Orchestrator {
            config: Arc::new(config),
            factory: Arc::new(factory),
            store,
        }
    }

    pub fn store(&self) -> &ShardStore {
        &self.store
    }

    /// Returns once every launched worker has finished.
    pub async fn run(&self, cities: &[City]) -> Result<RunReport> {
        self.config.validate()?;
        let start_time = Local::now();

        let shards = partition(cities, self.config.workers);
        self.store.check_plan(&shards).await?;

        let mut report = RunReport {
            shards: shards.len(),
            ..RunReport::default()
        };

        // Settle every marker before the first worker starts, so an error here
        // never leaves workers running that nobody waits for.
        let mut pending = Vec::with_capacity(shards.len());
        for shard in shards {
            if self.store.is_complete(shard.index, &self.config.categories).await? {
                report.skipped.push(shard.index);
                continue;
            }
            // Whatever an interrupted run left behind is not trusted.
            self.store.discard(shard.index).await?;
            pending.push(shard);
        }

        let mut workers: JoinSet<WorkerOutcome> = JoinSet::new();
        for shard in pending {
            let factory = self.factory.clone();
            let config = self.config.clone();
            workers.spawn(async move {
                // A panicking worker must only take its own shard down.
                let outcome = tokio::spawn(run_shard(shard.clone(), factory, config)).await;
                (shard, outcome)
            });
        }
        info!(
            launched = workers.len(),
            skipped = report.skipped.len(),
            "workers started"
        );

        while let Some(joined) = workers.join_next().await {
            let (shard, outcome) = joined?;
            let index = shard.index;
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => {
                    warn!(shard = index, "shard failed: {err}");
                    report.failed.push((index, err.to_string()));
                    continue;
                }
                Err(err) => {
                    warn!(shard = index, "worker died: {err}");
                    report.failed.push((index, format!("worker died: {err}")));
                    continue;
                }
            };
            match self.settle(&shard, &result).await {
                Ok(()) => report.completed.push(index),
                Err(reason) => report.failed.push((index, reason)),
            }
        }

        report.completed.sort_unstable();
        report.failed.sort_unstable();
        info_time!(
            start_time,
            "Run finished: {} completed, {} skipped, {} failed",
            report.completed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Validates a shard result and persists it with its marker. On any problem
    /// the shard's output is removed so the next run starts it from scratch.
    async fn settle(&self, shard: &Shard, result: &ShardResult) -> core::result::Result<(), String> {
        let reason = match result.validate(shard, &self.config.categories) {
            Ok(()) => match self.store.commit(shard, result).await {
                Ok(()) => {
                    info!(shard = shard.index, cities = shard.len(), "shard complete");
                    return Ok(());
                }
                Err(err) => format!("couldn't write output: {err}"),
            },
            Err(inconsistency) => format!("inconsistent result: {inconsistency}"),
        };

        warn!(shard = shard.index, "shard left pending: {reason}");
        if let Err(err) = self.store.discard(shard.index).await {
            warn!(shard = shard.index, "couldn't remove partial output: {err}");
        }
        Err(reason)
    }
}
