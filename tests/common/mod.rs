#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ibge_scrape::category::{Category, City};
use ibge_scrape::config::ScrapeConfig;
use ibge_scrape::retry::RetryPolicy;
use ibge_scrape::session::{BrowserSession, SessionFactory};
use ibge_scrape::{Error, Result};

pub const BASE_URL: &str = "http://portal.test/rn/";

/// One table carrying every label the extractors look for.
pub const PAGE: &str = r#"<html><body>
<select class="select-ano"><option>2019</option><option>2010</option></select>
<table>
<tr><td>Indicador</td><td>Valor</td></tr>
<tr><td>PIB a preços correntes</td><td>2.500</td></tr>
<tr><td>População residente (pessoas)</td><td>1.000</td></tr>
<tr><td>Frequentavam (pessoas)</td><td>300</td></tr>
<tr><td>Não frequentavam (pessoas)</td><td>700</td></tr>
<tr><td>Matrículas</td><td></td></tr>
<tr><td>Ensino infantil (matrículas)</td><td>40</td></tr>
<tr><td>Ensino fundamental (matrículas)</td><td>150</td></tr>
<tr><td>Ensino médio (matrículas)</td><td>60</td></tr>
<tr><td>Público (estabelecimentos)</td><td>3</td></tr>
</table>
</body></html>"#;

pub const EMPTY_PAGE: &str = "<html><body><div class=\"loading\"></div></body></html>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Loads, but the tables never show up.
    Empty,
    Transient,
    Fatal,
    Panic,
}

/// Serves `PAGE` for every URL except the scripted ones, and counts navigations.
#[derive(Default)]
pub struct Script {
    rules: Mutex<Vec<(String, Behavior)>>,
    gotos: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    obstacle: Mutex<Option<(String, PathBuf)>>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Script::default())
    }

    /// Every URL containing `pattern` behaves as `behavior`.
    pub fn on(&self, pattern: impl Into<String>, behavior: Behavior) {
        self.rules.lock().unwrap().push((pattern.into(), behavior));
    }

    /// The first navigation to `url` creates a directory at `path`, once.
    /// Used to make a later write to `path` fail.
    pub fn obstruct_on(&self, url: impl Into<String>, path: impl Into<PathBuf>) {
        *self.obstacle.lock().unwrap() = Some((url.into(), path.into()));
    }

    fn place_obstacle(&self, url: &str) {
        let mut obstacle = self.obstacle.lock().unwrap();
        if obstacle.as_ref().is_some_and(|(at, _)| at == url) {
            if let Some((_, path)) = obstacle.take() {
                std::fs::create_dir_all(path).unwrap();
            }
        }
    }

    pub fn heal(&self) {
        self.rules.lock().unwrap().clear();
    }

    pub fn gotos(&self) -> usize {
        self.gotos.load(Ordering::SeqCst)
    }

    pub fn gotos_for(&self, url: &str) -> usize {
        self.per_url.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    fn behavior(&self, url: &str) -> Option<Behavior> {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, b)| *b)
    }
}

pub struct ScriptedFactory(pub Arc<Script>);

impl SessionFactory for ScriptedFactory {
    type Session = ScriptedSession;

    async fn open(&self) -> Result<ScriptedSession> {
        self.0.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            script: self.0.clone(),
            page: None,
        })
    }
}

pub struct ScriptedSession {
    script: Arc<Script>,
    page: Option<String>,
}

impl BrowserSession for ScriptedSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.script.gotos.fetch_add(1, Ordering::SeqCst);
        *self
            .script
            .per_url
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        self.script.place_obstacle(url);
        self.page = None;
        match self.script.behavior(url) {
            None => self.page = Some(PAGE.to_string()),
            Some(Behavior::Empty) => self.page = Some(EMPTY_PAGE.to_string()),
            Some(Behavior::Transient) => return Err(Error::Transient(format!("{url} timed out"))),
            Some(Behavior::Fatal) => return Err(Error::SessionFatal("browser process died".into())),
            Some(Behavior::Panic) => panic!("scripted panic on {url}"),
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page.clone().ok_or_else(|| Error::Transient("nothing loaded".into()))
    }

    async fn close(self) {
        self.script.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn cities(ids: &[&str]) -> Vec<City> {
    ids.iter().map(|id| City::new(*id, id.to_uppercase())).collect()
}

pub fn config(output: &Path, workers: usize) -> ScrapeConfig {
    ScrapeConfig {
        base_url: BASE_URL.to_string(),
        settle_delay: Duration::ZERO,
        retry: RetryPolicy::new(4, Duration::ZERO),
        workers,
        output_dir: output.to_path_buf(),
        ..ScrapeConfig::default()
    }
}

pub fn url(city: &str, category: Category) -> String {
    format!("{BASE_URL}{city}/pesquisa{}", category.default_path_suffix())
}

/// Every file under `dir` with its contents, sorted by path.
pub fn snapshot_files(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(dir).unwrap().display().to_string();
                files.push((rel, std::fs::read(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}
