use std::collections::{BTreeMap, HashSet};

use tokio::fs;
use tracing::{info, warn};

use crate::category::Category;
use crate::store::ShardStore;
use crate::tsv::Sheet;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Marked shards that went into the merge, ascending.
    pub shards: Vec<usize>,
    pub rows: BTreeMap<Category, usize>,
}

/// Rebuilds one table per category from every marked shard, in ascending shard order.
/// Unmarked shards, and shards marked for a set of categories that lacks one of
/// `categories`, are ignored entirely, whatever files they have.
pub async fn merge(store: &ShardStore, categories: &[Category]) -> Result<MergeReport> {
    let mut shards = Vec::new();
    let mut counts = BTreeMap::new();
    for index in store.completed_shards().await? {
        let Some(marker) = store.read_marker(index).await? else {
            continue;
        };
        if !marker.covers(categories) {
            warn!(shard = index, "completed for other categories, left out of the merge");
            continue;
        }
        shards.push(index);
        counts.insert(index, marker.cities);
    }
    fs::create_dir_all(store.root()).await?;
    let mut report = MergeReport {
        shards: shards.clone(),
        ..MergeReport::default()
    };

    for category in categories {
        let header = category.header();
        let mut merged = Sheet::new(header.clone());
        let mut seen = HashSet::new();

        for index in &shards {
            let sheet = store.read_table(*index, *category).await?;
            let path = store.table_path(*index, *category);
            if sheet.header != header {
                return Err(Error::MalformedTable {
                    path,
                    reason: format!("unexpected header {:?}", sheet.header),
                });
            }
            let expected = counts[index];
            if sheet.rows.len() != expected {
                return Err(Error::MalformedTable {
                    path,
                    reason: format!("{} rows, marker says {expected}", sheet.rows.len()),
                });
            }
            for row in sheet.rows {
                if !seen.insert(row[0].clone()) {
                    return Err(Error::DuplicateCity(row[0].clone()));
                }
                merged.rows.push(row);
            }
        }

        merged.write(&store.unified_path(*category)).await?;
        info!(category = category.name(), rows = merged.rows.len(), "merged");
        report.rows.insert(*category, merged.rows.len());
    }

    Ok(report)
}
