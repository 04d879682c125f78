use std::collections::HashSet;
use std::path::Path;

use tokio::fs;

use crate::category::City;
use crate::{Error, Result};

/// Reads `identifier \t display name` lines. Blank lines are skipped; a missing
/// display name falls back to the identifier.
pub async fn read_city_list(path: &Path) -> Result<Vec<City>> {
    let text = fs::read_to_string(path).await?;
    parse_city_list(&text)
}

pub fn parse_city_list(text: &str) -> Result<Vec<City>> {
    let mut cities = Vec::new();
    let mut seen = HashSet::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (id, name) = match line.split_once('\t') {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (line.trim(), ""),
        };
        if id.is_empty() || id.contains(char::is_whitespace) || id.contains('/') {
            return Err(Error::CityList {
                line: i + 1,
                reason: format!("invalid identifier {id:?}"),
            });
        }
        if !seen.insert(id.to_string()) {
            return Err(Error::CityList {
                line: i + 1,
                reason: format!("duplicate identifier {id:?}"),
            });
        }
        let name = if name.is_empty() { id } else { name };
        cities.push(City::new(id, name));
    }
    Ok(cities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ids_and_names() {
        let cities = parse_city_list("natal\tNatal\n\nacu\tAçu\r\nares\n").unwrap();
        assert_eq!(
            cities,
            vec![
                City::new("natal", "Natal"),
                City::new("acu", "Açu"),
                City::new("ares", "ares"),
            ]
        );
    }

    #[test]
    fn rejects_duplicates_and_bad_ids() {
        let err = parse_city_list("natal\tNatal\nnatal\tNatal\n").unwrap_err();
        assert!(matches!(err, Error::CityList { line: 2, .. }));
        let err = parse_city_list("sao paulo\tSão Paulo\n").unwrap_err();
        assert!(matches!(err, Error::CityList { line: 1, .. }));
    }
}
