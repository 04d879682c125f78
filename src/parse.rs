use scraper::{ElementRef, Html, Selector};
use tokio::task::spawn_blocking;

use crate::{Error, Result};

/// The rows of one `<table>`, every cell as trimmed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Table { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.rows.iter().any(|r| r.first().is_some_and(|c| c == label))
    }

    /// Second cell of every row whose first cell is `label`, top to bottom.
    pub fn values_for_label(&self, label: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.first().is_some_and(|c| c == label))
            .filter_map(|r| r.get(1).map(String::as_str))
            .collect()
    }
}

/// What a settled page gave us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub tables: Vec<Table>,
    /// First entry of the year selector, the most recent year available.
    pub year: Option<String>,
}

/// First row labelled `label`, parsed as a number.
pub fn number_after_label(table: &Table, label: &str) -> Option<f64> {
    table
        .values_for_label(label)
        .first()
        .and_then(|v| parse_number(v))
}

/// Parses portal numbers: `.` groups thousands and `,` is the decimal separator.
/// Anything after the first whitespace (units, footnote marks) is ignored.
pub fn parse_number(raw: &str) -> Option<f64> {
    let token = raw.split_whitespace().next()?;
    let normalized = token.replace('.', "").replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses the page off the runtime threads.
pub(crate) async fn parse_page(html: String) -> Result<Snapshot> {
    let snapshot = spawn_blocking(move || parse_snapshot(&html)).await??;
    Ok(snapshot)
}

pub fn parse_snapshot(html: &str) -> Result<Snapshot> {
    let doc = Html::parse_document(html);

    let table_selector = create_selector("table")?;
    let row_selector = create_selector("tr")?;
    let cell_selector = create_selector("th, td")?;
    let year_selector = create_selector("select.select-ano option")?;

    let tables = doc
        .select(&table_selector)
        .map(|table| {
            let rows = table
                .select(&row_selector)
                .map(|row| row.select(&cell_selector).map(element_text).collect::<Vec<_>>())
                .filter(|cells| !cells.is_empty())
                .collect::<Vec<_>>();
            Table::new(rows)
        })
        .filter(|t| !t.rows().is_empty())
        .collect();

    let year = doc
        .select(&year_selector)
        .next()
        .map(element_text)
        .filter(|y| !y.is_empty());

    Ok(Snapshot { tables, year })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseSelector(sel_str.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <select class="select-ano"><option>2019</option><option>2018</option></select>
          <table>
            <tr><td>População residente (pessoas)</td><td>890.480</td></tr>
            <tr><th>Frequentavam   (pessoas)</th><td> 12,5 </td></tr>
          </table>
          <table></table>
        </body></html>
    "#;

    #[test]
    fn parses_tables_and_year() {
        let snapshot = parse_snapshot(PAGE).unwrap();
        assert_eq!(snapshot.year.as_deref(), Some("2019"));
        assert_eq!(snapshot.tables.len(), 1);
        let table = &snapshot.tables[0];
        assert_eq!(number_after_label(table, "População residente (pessoas)"), Some(890_480.0));
        assert_eq!(number_after_label(table, "Frequentavam (pessoas)"), Some(12.5));
        assert_eq!(number_after_label(table, "Ausente"), None);
    }

    #[test]
    fn page_without_tables_is_empty() {
        let snapshot = parse_snapshot("<html><body><div>carregando</div></body></html>").unwrap();
        assert!(snapshot.tables.is_empty());
        assert_eq!(snapshot.year, None);
    }

    #[test]
    fn parses_portal_numbers() {
        assert_eq!(parse_number("1.234.567,89"), Some(1_234_567.89));
        assert_eq!(parse_number("42 pessoas"), Some(42.0));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number(""), None);
    }

    #[tokio::test]
    async fn parses_off_the_runtime() {
        let snapshot = parse_page(PAGE.to_string()).await.unwrap();
        assert_eq!(snapshot.tables.len(), 1);
    }
}
