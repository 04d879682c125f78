//! Joins the merged category tables into a single table per city, filling gaps with
//! column means. This is a reporting convenience; the category tables keep their nulls.

use std::collections::HashMap;

use tracing::info;

use crate::category::{format_number, Category, CITY_COLUMN};
use crate::parse::parse_number;
use crate::store::ShardStore;
use crate::tsv::Sheet;
use crate::{Error, Result};

/// Builds `data_warehouse.tsv` from the merged tables: every city of the first table,
/// in its order. Cities missing from a later table get nulls there, then imputed.
pub async fn build_warehouse(store: &ShardStore, categories: &[Category]) -> Result<Sheet> {
    let mut sheets = Vec::with_capacity(categories.len());
    for category in categories {
        let path = store.unified_path(*category);
        let sheet = Sheet::read(&path).await?;
        if sheet.header != category.header() {
            return Err(Error::MalformedTable {
                path,
                reason: format!("unexpected header {:?}", sheet.header),
            });
        }
        sheets.push((*category, sheet));
    }

    let warehouse = join(&sheets);
    warehouse.write(&store.warehouse_path()).await?;
    info!(rows = warehouse.rows.len(), "warehouse written");
    Ok(warehouse)
}

fn join(sheets: &[(Category, Sheet)]) -> Sheet {
    let mut header = vec![CITY_COLUMN.to_string()];
    for (category, _) in sheets {
        header.extend(category.fields().iter().map(|f| f.to_string()));
    }

    // city -> fields of each category, year column dropped
    let lookups: Vec<HashMap<&str, &[String]>> = sheets
        .iter()
        .map(|(category, sheet)| {
            let width = category.fields().len();
            sheet
                .rows
                .iter()
                .map(|row| (row[0].as_str(), &row[1..=width]))
                .collect()
        })
        .collect();

    let mut values: Vec<Vec<Option<f64>>> = Vec::new();
    let mut cities = Vec::new();
    if let Some((_, first)) = sheets.first() {
        for row in &first.rows {
            let city = row[0].as_str();
            let mut joined = Vec::with_capacity(header.len() - 1);
            for ((category, _), lookup) in sheets.iter().zip(&lookups) {
                match lookup.get(city) {
                    Some(cells) => joined.extend(cells.iter().map(|c| parse_number_cell(c))),
                    // Absent from this table: nulls, imputed like any other gap.
                    None => joined.extend(std::iter::repeat(None).take(category.fields().len())),
                }
            }
            cities.push(city.to_string());
            values.push(joined);
        }
    }

    impute_means(&mut values, header.len() - 1);

    let mut sheet = Sheet::new(header);
    sheet.rows = cities
        .into_iter()
        .zip(values)
        .map(|(city, row)| {
            let mut cells = vec![city];
            cells.extend(row.into_iter().map(format_number));
            cells
        })
        .collect();
    sheet
}

/// Cells are written by `format_number`, plain `f64` display. Anything else is
/// attempted with the portal's number format.
fn parse_number_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().or_else(|| parse_number(cell))
}

/// Fills every gap with the truncated mean of its column. Columns with no value stay empty.
fn impute_means(rows: &mut [Vec<Option<f64>>], width: usize) {
    for col in 0..width {
        let present: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
        if present.is_empty() {
            continue;
        }
        let mean = (present.iter().sum::<f64>() / present.len() as f64).trunc();
        for row in rows.iter_mut() {
            row[col].get_or_insert(mean);
        }
    }
}
