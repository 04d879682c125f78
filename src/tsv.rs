//! Tab-separated tables: a header row, then one row per city.

use std::path::Path;

use tokio::{fs, io::AsyncWriteExt};

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(header: Vec<String>) -> Self {
        Sheet {
            header,
            rows: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, &self.header);
        for row in &self.rows {
            push_line(&mut out, row);
        }
        out
    }

    /// Every row must have as many cells as the header.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| malformed(path, "missing header"))?;
        let header: Vec<String> = header.split('\t').map(str::to_string).collect();

        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let row: Vec<String> = line.split('\t').map(str::to_string).collect();
            if row.len() != header.len() {
                return Err(malformed(
                    path,
                    format!("row {} has {} cells, header has {}", i + 1, row.len(), header.len()),
                ));
            }
            rows.push(row);
        }
        Ok(Sheet { header, rows })
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        Sheet::parse(&text, path)
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_tsv().as_bytes()).await
    }
}

fn push_line(out: &mut String, cells: &[String]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        // Tabs and newlines would break the row structure.
        out.push_str(&cell.replace(['\t', '\n', '\r'], " "));
    }
    out.push('\n');
}

fn malformed(path: &Path, reason: impl Into<String>) -> Error {
    Error::MalformedTable {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Writes next to `path` and renames over it, so readers never see a half-written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await?;
    Ok(())
}
