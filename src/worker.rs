use std::sync::Arc;

use chrono::Local;
use tracing::warn;

use crate::category::CityRecord;
use crate::config::ScrapeConfig;
use crate::fetch::CityFetcher;
use crate::info_time;
use crate::session::SessionFactory;
use crate::shard::{Shard, ShardResult};
use crate::Result;

/// Scrapes every city of `shard`, in order, through one session of its own.
/// Nothing is handed back before the whole shard is done.
pub async fn run_shard<F: SessionFactory>(
    shard: Shard,
    factory: Arc<F>,
    config: Arc<ScrapeConfig>,
) -> Result<ShardResult> {
    let start_time = Local::now();
    info_time!("Shard {}: starting, {} cities", shard.index, shard.len());

    let session = factory.open().await?;
    let mut fetcher = CityFetcher::new(session, config.clone());

    let mut records: Vec<CityRecord> = Vec::with_capacity(shard.len());
    let mut failure = None;
    for city in &shard.cities {
        match fetcher.fetch_city(city).await {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(shard = shard.index, city = %city.id, "session failed: {err}");
                failure = Some(err);
                break;
            }
        }
    }
    fetcher.close().await;

    if let Some(err) = failure {
        return Err(err);
    }
    info_time!(start_time, "Shard {}: fetched {} cities", shard.index, records.len());
    Ok(ShardResult::from_records(&records, &config.categories))
}
