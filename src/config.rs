use std::path::PathBuf;
use std::time::Duration;

use crate::category::Category;
use crate::retry::RetryPolicy;
use crate::{Error, Result};

/// City pages of the state of Rio Grande do Norte on the IBGE cities portal.
pub const DEFAULT_BASE_URL: &str = "https://cidades.ibge.gov.br/brasil/rn/";
/// The portal renders its tables asynchronously, so every load is followed by this pause.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(3500);
pub const DEFAULT_MAX_ATTEMPTS: usize = 4;
pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OUTPUT_DIR: &str = "output/city_data";

/// Where rendered pages come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renderer {
    /// Plain GET of the page, no script execution.
    Http,
    /// A Browserless-compatible service exposing `POST /content`.
    Service { endpoint: String, token: Option<String> },
}

/// Everything a run needs. Built once and handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Path suffix per category, appended after `/pesquisa`.
    pub path_suffixes: Vec<(Category, String)>,
    pub categories: Vec<Category>,
    pub settle_delay: Duration,
    pub retry: RetryPolicy,
    pub workers: usize,
    pub output_dir: PathBuf,
    pub renderer: Renderer,
    pub request_timeout: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path_suffixes: Category::ALL
                .iter()
                .map(|c| (*c, c.default_path_suffix().to_string()))
                .collect(),
            categories: Category::ALL.to_vec(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            retry: RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF),
            workers: DEFAULT_WORKERS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            renderer: Renderer::Http,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("worker count must be at least 1".into()));
        }
        if self.retry.max_attempts() == 0 {
            return Err(Error::Config("max attempts must be at least 1".into()));
        }
        if self.categories.is_empty() {
            return Err(Error::Config("no categories configured".into()));
        }
        for category in &self.categories {
            if !self.path_suffixes.iter().any(|(c, _)| c == category) {
                return Err(Error::Config(format!("no path suffix for category {}", category.name())));
            }
        }
        Ok(())
    }

    /// Only a render service executes the portal's scripts. Without one the tables
    /// never show up and every category ends up null after all retries.
    pub fn renders_scripts(&self) -> bool {
        matches!(self.renderer, Renderer::Service { .. })
    }

    pub fn path_suffix(&self, category: Category) -> &str {
        self.path_suffixes
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, suffix)| suffix.as_str())
            .unwrap_or_else(|| category.default_path_suffix())
    }

    /// `{base}{city}/pesquisa{suffix}`
    pub fn city_url(&self, city_id: &str, category: Category) -> String {
        let mut url = self.base_url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(city_id);
        url.push_str("/pesquisa");
        url.push_str(self.path_suffix(category));
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_city_url_from_suffix() {
        let config = ScrapeConfig::default();
        assert_eq!(
            config.city_url("natal", Category::Gdp),
            "https://cidades.ibge.gov.br/brasil/rn/natal/pesquisa/38/46996"
        );

        let config = ScrapeConfig {
            base_url: "http://localhost:8080/rn".into(),
            ..ScrapeConfig::default()
        };
        assert_eq!(
            config.city_url("acu", Category::Health),
            "http://localhost:8080/rn/acu/pesquisa/32/28163"
        );
    }

    #[test]
    fn rejects_zero_workers() {
        let config = ScrapeConfig {
            workers: 0,
            ..ScrapeConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(ScrapeConfig::default().validate().is_ok());
    }

    #[test]
    fn only_a_render_service_renders_scripts() {
        assert!(!ScrapeConfig::default().renders_scripts());
        let config = ScrapeConfig {
            renderer: Renderer::Service {
                endpoint: "http://localhost:3000".into(),
                token: None,
            },
            ..ScrapeConfig::default()
        };
        assert!(config.renders_scripts());
    }
}
