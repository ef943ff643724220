use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::models::ParserResponse;

/// Bound on a single parser call. Expiry is fatal for the invocation; the
/// trigger layer owns retries.
const PARSER_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote service that turns report PDF bytes into structured KPI rows.
#[async_trait]
pub trait ReportParser: Send + Sync {
    async fn parse(&self, bytes: Vec<u8>, filename: &str) -> Result<ParserResponse>;
}

/// HTTP client for the KPI parser service. The endpoint comes from
/// `PARSER_URL`; a missing endpoint fails at call time so the report still
/// gets marked failed.
pub struct HttpParserClient {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpParserClient {
    pub fn new(endpoint: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PARSER_TIMEOUT)
            .build()
            .context("failed to build parser HTTP client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ReportParser for HttpParserClient {
    async fn parse(&self, bytes: Vec<u8>, filename: &str) -> Result<ParserResponse> {
        let endpoint = self
            .endpoint
            .as_deref()
            .context("PARSER_URL is not configured")?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .context("invalid multipart content type")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .context("KPI parser request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(300).collect::<String>();
            bail!("KPI parser returned {status}: {body}");
        }

        let parsed: ParserResponse = response
            .json()
            .await
            .context("malformed KPI parser response")?;

        if parsed.count != parsed.drivers.len() {
            warn!(
                count = parsed.count,
                rows = parsed.drivers.len(),
                "parser row count does not match returned rows"
            );
        }

        Ok(parsed)
    }
}
