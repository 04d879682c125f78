//! On-disk layout of a run.
//!
//! ```text
//! <root>/plan.tsv                     shard index and city of every city
//! <root>/shards/0003/<category>.tsv   one table per category
//! <root>/shards/0003/_COMPLETE        written last, only for validated shards
//! <root>/<category>.tsv               merged tables
//! <root>/data_warehouse.tsv
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::shard::{Shard, ShardResult};
use crate::tsv::{write_atomic, Sheet};
use crate::{Error, Result};

const SHARDS_DIR: &str = "shards";
const MARKER_FILE: &str = "_COMPLETE";
const PLAN_FILE: &str = "plan.tsv";
const WAREHOUSE_FILE: &str = "data_warehouse.tsv";

/// Contents of `_COMPLETE`: how many cities the shard holds and which categories
/// were validated for it, one tab-separated key and value per line.
///
/// ```text
/// cities      3
/// categories  gdp,population
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub cities: usize,
    pub categories: BTreeSet<Category>,
}

impl Marker {
    fn render(&self) -> String {
        let names: Vec<&str> = self.categories.iter().map(|c| c.name()).collect();
        format!("cities\t{}\ncategories\t{}\n", self.cities, names.join(","))
    }

    fn parse(text: &str) -> Option<Marker> {
        let mut cities = None;
        let mut categories = None;
        for line in text.lines() {
            match line.split_once('\t') {
                Some(("cities", n)) => cities = n.trim().parse().ok(),
                Some(("categories", names)) => {
                    categories = names
                        .split(',')
                        .filter(|n| !n.is_empty())
                        .map(Category::from_name)
                        .collect::<Option<BTreeSet<_>>>()
                }
                _ => {}
            }
        }
        Some(Marker {
            cities: cities?,
            categories: categories?,
        })
    }

    pub fn covers_exactly(&self, categories: &[Category]) -> bool {
        let wanted: BTreeSet<Category> = categories.iter().copied().collect();
        self.categories == wanted
    }

    pub fn covers(&self, categories: &[Category]) -> bool {
        categories.iter().all(|c| self.categories.contains(c))
    }
}

#[derive(Debug, Clone)]
pub struct ShardStore {
    root: PathBuf,
}

impl ShardStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ShardStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shard_dir(&self, index: usize) -> PathBuf {
        self.root.join(SHARDS_DIR).join(format!("{index:04}"))
    }

    pub fn marker_path(&self, index: usize) -> PathBuf {
        self.shard_dir(index).join(MARKER_FILE)
    }

    pub fn table_path(&self, index: usize, category: Category) -> PathBuf {
        self.shard_dir(index).join(format!("{}.tsv", category.name()))
    }

    pub fn unified_path(&self, category: Category) -> PathBuf {
        self.root.join(format!("{}.tsv", category.name()))
    }

    pub fn warehouse_path(&self) -> PathBuf {
        self.root.join(WAREHOUSE_FILE)
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join(PLAN_FILE)
    }

    /// Whether the shard has a marker for exactly `categories`. A marker written for
    /// another category set, or one that can't be read, doesn't count.
    pub async fn is_complete(&self, index: usize, categories: &[Category]) -> Result<bool> {
        match self.read_marker(index).await {
            Ok(Some(marker)) => Ok(marker.covers_exactly(categories)),
            Ok(None) => Ok(false),
            Err(Error::MalformedTable { path, reason }) => {
                warn!(path = %path.display(), "ignoring completion marker: {reason}");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Removes everything a shard has written, marker included.
    pub async fn discard(&self, index: usize) -> Result<()> {
        let dir = self.shard_dir(index);
        if fs::try_exists(&dir).await? {
            debug!(shard = index, "discarding partial output");
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Writes every category table, then the marker. The caller validates first.
    pub async fn commit(&self, shard: &Shard, result: &ShardResult) -> Result<()> {
        let dir = self.shard_dir(shard.index);
        fs::create_dir_all(&dir).await?;

        for (category, rows) in &result.tables {
            let mut sheet = Sheet::new(category.header());
            sheet.rows = rows.iter().map(|r| r.cells()).collect();
            sheet.write(&self.table_path(shard.index, *category)).await?;
        }

        let marker = Marker {
            cities: shard.len(),
            categories: result.tables.keys().copied().collect(),
        };
        write_atomic(&self.marker_path(shard.index), marker.render().as_bytes()).await?;
        Ok(())
    }

    /// The shard's marker, `None` if there is none.
    pub async fn read_marker(&self, index: usize) -> Result<Option<Marker>> {
        let path = self.marker_path(index);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).await?;
        Marker::parse(&text).map(Some).ok_or_else(|| Error::MalformedTable {
            path,
            reason: "unreadable completion marker".into(),
        })
    }

    /// Indices of every shard with a marker, ascending.
    pub async fn completed_shards(&self) -> Result<Vec<usize>> {
        let dir = self.root.join(SHARDS_DIR);
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut indices = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(index) = entry.file_name().to_str().and_then(|n| n.parse::<usize>().ok()) else {
                continue;
            };
            if fs::try_exists(self.marker_path(index)).await? {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    pub async fn read_table(&self, index: usize, category: Category) -> Result<Sheet> {
        Sheet::read(&self.table_path(index, category)).await
    }

    /// Records the partition on the first run and refuses to continue a run that was
    /// partitioned differently, since its markers would describe other cities.
    /// A changed plan with no completed shard is simply replaced.
    pub async fn check_plan(&self, shards: &[Shard]) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let mut plan = Sheet::new(vec!["shard".into(), "city".into()]);
        for shard in shards {
            for city in &shard.cities {
                plan.rows.push(vec![shard.index.to_string(), city.id.clone()]);
            }
        }

        let path = self.plan_path();
        if fs::try_exists(&path).await? {
            let stored = Sheet::read(&path).await?;
            if stored == plan {
                return Ok(());
            }
            if !self.completed_shards().await?.is_empty() {
                return Err(Error::PlanMismatch { path });
            }
            info!("shard plan changed and nothing was completed, starting over");
            let dir = self.root.join(SHARDS_DIR);
            if fs::try_exists(&dir).await? {
                fs::remove_dir_all(&dir).await?;
            }
        }
        plan.write(&path).await
    }
}
