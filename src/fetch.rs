use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::category::{
    Category, City, CityRecord, Education, Enrollment, Gdp, Health, Indicator, Population, Reading,
};
use crate::config::ScrapeConfig;
use crate::parse::{parse_page, Snapshot};
use crate::session::BrowserSession;
use crate::Result;

/// Loads city pages through one session, one category at a time.
pub struct CityFetcher<S> {
    session: S,
    config: Arc<ScrapeConfig>,
}

impl<S: BrowserSession> CityFetcher<S> {
    pub fn new(session: S, config: Arc<ScrapeConfig>) -> Self {
        CityFetcher { session, config }
    }

    /// Every configured category for `city`. Unconfigured ones stay all-null.
    pub async fn fetch_city(&mut self, city: &City) -> Result<CityRecord> {
        let mut record = CityRecord::empty(city.clone());
        for category in self.config.categories.clone() {
            match category {
                Category::Gdp => record.gdp = self.fetch_category::<Gdp>(city).await?,
                Category::Population => record.population = self.fetch_category::<Population>(city).await?,
                Category::Education => record.education = self.fetch_category::<Education>(city).await?,
                Category::Enrollment => record.enrollment = self.fetch_category::<Enrollment>(city).await?,
                Category::Health => record.health = self.fetch_category::<Health>(city).await?,
            }
        }
        Ok(record)
    }

    /// Retries while the page has no tables. Running out of attempts is not an error,
    /// the reading just comes back all-null. Only session failures are returned as `Err`.
    pub async fn fetch_category<T: Indicator>(&mut self, city: &City) -> Result<Reading<T>> {
        let url = self.config.city_url(&city.id, T::CATEGORY);
        let mut schedule = self.config.retry.schedule();

        while let Some(attempt) = schedule.next().await {
            match self.snapshot(&url).await {
                Ok(snapshot) if !snapshot.tables.is_empty() => {
                    debug!(city = %city.id, category = T::CATEGORY.name(), attempt, "got tables");
                    return Ok(Reading {
                        values: T::extract(&snapshot.tables),
                        year: snapshot.year,
                    });
                }
                Ok(_) => warn!(
                    %url,
                    remaining = schedule.remaining(),
                    "no tables on the page"
                ),
                Err(err) if err.is_transient() => warn!(
                    %url,
                    remaining = schedule.remaining(),
                    "failed to load the page: {err}"
                ),
                Err(err) => return Err(err),
            }
        }

        warn!(
            city = %city.id,
            category = T::CATEGORY.name(),
            attempts = schedule.attempts(),
            "giving up, recording the category as missing"
        );
        Ok(Reading::missing())
    }

    async fn snapshot(&mut self, url: &str) -> Result<Snapshot> {
        self.session.goto(url).await?;
        // Tables are filled in by scripts after navigation returns.
        sleep(self.config.settle_delay).await;
        let html = self.session.content().await?;
        parse_page(html).await
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}
