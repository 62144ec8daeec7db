use crate::config::Settings;
use crate::ingest::types::RawCountryPayload;
use anyhow::{Context, Result};
use std::time::Duration;

#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Downloads the whole multi-country document. Not retried.
    async fn fetch_payload(&self) -> Result<RawCountryPayload>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    http: reqwest::Client,
    url: String,
}

impl HttpJsonSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.require_data_source_url()?;
        Self::new(url, Duration::from_secs(settings.data_source_timeout_secs))
    }

    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build data source http client")?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl SourceClient for HttpJsonSource {
    fn source_name(&self) -> &'static str {
        "http_json"
    }

    async fn fetch_payload(&self) -> Result<RawCountryPayload> {
        tracing::info!(url = %self.url, "fetching data source");

        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("data source request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read data source response")?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            anyhow::bail!("data source HTTP {status}: {snippet}");
        }

        serde_json::from_str::<RawCountryPayload>(&text)
            .context("data source response is not a list of country blocks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpJsonSource {
        HttpJsonSource::new(format!("{}/data.json", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn parses_country_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "country": {"name": "India"},
                    "dates": {"2021-01-01": {"new": {"cases": 1, "deaths": 0}}}
                }
            ])))
            .mount(&server)
            .await;

        let payload = client(&server).fetch_payload().await.unwrap();
        assert_eq!(payload.blocks.len(), 1);
        assert_eq!(payload.blocks[0].name(), "India");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).fetch_payload().await.unwrap_err();
        assert!(err.to_string().contains("503"), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"not": "a list"})))
            .mount(&server)
            .await;

        assert!(client(&server).fetch_payload().await.is_err());
    }
}
