//! Page loading. A session stands in for one browser: it's opened per worker, used
//! sequentially and closed when the worker is done.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::config::{Renderer, ScrapeConfig};
use crate::{Error, Result};

pub trait BrowserSession: Send + 'static {
    /// Navigates to `url`. Returns once the page has been delivered, not once it settled.
    fn goto(&mut self, url: &str) -> impl Future<Output = Result<()>> + Send;

    /// The current document's HTML.
    fn content(&mut self) -> impl Future<Output = Result<String>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens one fresh session per worker.
pub trait SessionFactory: Send + Sync + 'static {
    type Session: BrowserSession;

    fn open(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Fetches pages with a plain GET. Script-rendered content won't be there.
pub struct HttpSession {
    client: Client,
    page: Option<String>,
}

impl BrowserSession for HttpSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page = None;
        let res = self.client.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::Transient(format!("{url} answered {status}")));
        }
        self.page = Some(res.text().await?);
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page
            .clone()
            .ok_or_else(|| Error::Transient("no page loaded".into()))
    }

    async fn close(self) {}
}

/// Fetches rendered pages from a Browserless-compatible `/content` endpoint.
pub struct RenderSession {
    client: Client,
    endpoint: Url,
    page: Option<String>,
}

impl BrowserSession for RenderSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page = None;
        let body = serde_json::json!({ "url": url });
        let res = self.client.post(self.endpoint.clone()).json(&body).send().await?;

        let status = res.status();
        match status {
            s if s.is_success() => {
                self.page = Some(res.text().await?);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::SessionFatal(format!(
                "render service rejected the token ({status})"
            ))),
            _ => {
                let message = res.text().await.unwrap_or_default();
                Err(Error::Transient(format!("render service answered {status}: {message}")))
            }
        }
    }

    async fn content(&mut self) -> Result<String> {
        self.page
            .clone()
            .ok_or_else(|| Error::Transient("no page rendered".into()))
    }

    async fn close(self) {
        debug!("render session closed");
    }
}

/// One session of either kind, so a single factory type can serve both.
pub enum AnySession {
    Http(HttpSession),
    Render(RenderSession),
}

impl BrowserSession for AnySession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        match self {
            AnySession::Http(s) => s.goto(url).await,
            AnySession::Render(s) => s.goto(url).await,
        }
    }

    async fn content(&mut self) -> Result<String> {
        match self {
            AnySession::Http(s) => s.content().await,
            AnySession::Render(s) => s.content().await,
        }
    }

    async fn close(self) {
        match self {
            AnySession::Http(s) => s.close().await,
            AnySession::Render(s) => s.close().await,
        }
    }
}

/// Builds the session kind the configuration asks for.
#[derive(Debug, Clone)]
pub struct ConfiguredFactory {
    renderer: Renderer,
    timeout: Duration,
}

impl ConfiguredFactory {
    pub fn new(config: &ScrapeConfig) -> Self {
        ConfiguredFactory {
            renderer: config.renderer.clone(),
            timeout: config.request_timeout,
        }
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::SessionFatal(format!("couldn't build the HTTP client: {e}")))
    }
}

/// `{base}/content`, with the token as a properly encoded query parameter.
fn content_endpoint(base: &str, token: Option<&str>) -> Result<Url> {
    let raw = format!("{}/content", base.trim_end_matches('/'));
    let mut url = Url::parse(&raw)
        .map_err(|e| Error::SessionFatal(format!("invalid render endpoint {raw:?}: {e}")))?;
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

impl SessionFactory for ConfiguredFactory {
    type Session = AnySession;

    async fn open(&self) -> Result<AnySession> {
        let client = self.client()?;
        let session = match &self.renderer {
            Renderer::Http => AnySession::Http(HttpSession { client, page: None }),
            Renderer::Service { endpoint, token } => {
                let endpoint = content_endpoint(endpoint, token.as_deref())?;
                AnySession::Render(RenderSession {
                    client,
                    endpoint,
                    page: None,
                })
            }
        };
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_builds_configured_session() {
        let config = ScrapeConfig::default();
        let session = ConfiguredFactory::new(&config).open().await.unwrap();
        assert!(matches!(session, AnySession::Http(_)));

        let config = ScrapeConfig {
            renderer: Renderer::Service {
                endpoint: "http://localhost:3000/".into(),
                token: Some("secret".into()),
            },
            ..ScrapeConfig::default()
        };
        match ConfiguredFactory::new(&config).open().await.unwrap() {
            AnySession::Render(s) => assert_eq!(s.endpoint.as_str(), "http://localhost:3000/content?token=secret"),
            AnySession::Http(_) => panic!("expected a render session"),
        }
    }

    #[test]
    fn token_is_encoded_into_the_query() {
        let url = content_endpoint("http://localhost:3000", Some("a&b#c d")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/content?token=a%26b%23c+d");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("token".to_string(), "a&b#c d".to_string())]);
        assert!(matches!(content_endpoint("not a url", None), Err(Error::SessionFatal(_))));
    }

    #[tokio::test]
    async fn content_before_navigation_is_transient() {
        let config = ScrapeConfig::default();
        let mut session = ConfiguredFactory::new(&config).open().await.unwrap();
        let err = session.content().await.unwrap_err();
        assert!(err.is_transient());
    }
}
