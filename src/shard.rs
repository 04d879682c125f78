use std::collections::BTreeMap;

use crate::category::{Category, City, CityRecord, Row};

/// A contiguous slice of the city list, handled by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub index: usize,
    pub cities: Vec<City>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

/// Splits `cities` into `min(workers, cities.len())` contiguous shards, in order.
/// Sizes differ by at most one; the first `len % n` shards get the extra city.
pub fn partition(cities: &[City], workers: usize) -> Vec<Shard> {
    let n = workers.min(cities.len());
    if n == 0 {
        return Vec::new();
    }
    let base = cities.len() / n;
    let extra = cities.len() % n;

    let mut shards = Vec::with_capacity(n);
    let mut start = 0;
    for index in 0..n {
        let size = base + usize::from(index < extra);
        shards.push(Shard {
            index,
            cities: cities[start..start + size].to_vec(),
        });
        start += size;
    }
    shards
}

/// The rows of every category for one shard, in city order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardResult {
    pub tables: BTreeMap<Category, Vec<Row>>,
}

/// Why a shard result can't be marked complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    MissingCategory(Category),
    Length { category: Category, expected: usize, got: usize },
    Order { category: Category, position: usize },
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Inconsistency::MissingCategory(c) => write!(f, "category {} is missing", c.name()),
            Inconsistency::Length { category, expected, got } => write!(
                f,
                "category {} has {got} rows, expected {expected}",
                category.name()
            ),
            Inconsistency::Order { category, position } => write!(
                f,
                "category {} has the wrong city at row {position}",
                category.name()
            ),
        }
    }
}

impl ShardResult {
    /// Splits the per-city records into one table per category.
    pub fn from_records(records: &[CityRecord], categories: &[Category]) -> Self {
        let tables = categories
            .iter()
            .map(|c| (*c, records.iter().map(|r| r.row(*c)).collect()))
            .collect();
        ShardResult { tables }
    }

    /// Every category must hold exactly one row per shard city, in shard order.
    pub fn validate(&self, shard: &Shard, categories: &[Category]) -> Result<(), Inconsistency> {
        for category in categories {
            let rows = self
                .tables
                .get(category)
                .ok_or(Inconsistency::MissingCategory(*category))?;
            if rows.len() != shard.len() {
                return Err(Inconsistency::Length {
                    category: *category,
                    expected: shard.len(),
                    got: rows.len(),
                });
            }
            if let Some(position) = rows
                .iter()
                .zip(&shard.cities)
                .position(|(row, city)| row.city != city.id)
            {
                return Err(Inconsistency::Order {
                    category: *category,
                    position,
                });
            }
        }
        Ok(())
    }
}
