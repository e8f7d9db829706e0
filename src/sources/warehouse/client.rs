use std::collections::HashSet;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::auth::Token;
use crate::error::{DigestError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ERROR_BODY_CHARS: usize = 512;
const MAX_PAGES: usize = 1_000;

pub struct WarehouseClient {
    client: Client,
    query_url: Url,
    token: Option<Token>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

/// One page of query results.
#[derive(Debug, Default, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl WarehouseClient {
    pub fn new(query_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stale-digest/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to create HTTP client: {e}")))?;

        let query_url = Url::parse(query_url)
            .map_err(|e| DigestError::Config(format!("Invalid warehouse URL: {e}")))?;

        Ok(Self {
            client,
            query_url,
            token,
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Fetch one page of results for `query`.
    pub async fn fetch_page(&self, query: &str, page_token: Option<&str>) -> Result<QueryPage> {
        debug!("Requesting query page (token: {page_token:?})");

        let request = self
            .client
            .post(self.query_url.clone())
            .json(&QueryRequest { query, page_token });
        let request = self.auth_request(request);

        let response = request
            .send()
            .await
            .map_err(|e| DigestError::Retrieval(format!("warehouse unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(DigestError::Retrieval(format!(
                "warehouse returned {status}: {body}"
            )));
        }

        response
            .json::<QueryPage>()
            .await
            .map_err(|e| DigestError::Retrieval(format!("undecodable warehouse response: {e}")))
    }

    /// Fetch every row for `query`, following page tokens in order.
    pub async fn fetch_all(&self, query: &str) -> Result<Vec<Value>> {
        let mut all_rows = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut page = 1;

        loop {
            let result = self.fetch_page(query, page_token.as_deref()).await?;
            debug!("Page {page}: {} rows", result.rows.len());
            all_rows.extend(result.rows);

            let next = match result.next_page_token {
                Some(next) if !next.is_empty() => next,
                _ => break,
            };

            if !seen_tokens.insert(next.clone()) {
                return Err(DigestError::Retrieval(format!(
                    "warehouse repeated page token '{next}'"
                )));
            }

            if page >= MAX_PAGES {
                return Err(DigestError::Retrieval(format!(
                    "warehouse result exceeds {MAX_PAGES} pages"
                )));
            }

            page_token = Some(next);
            page += 1;
        }

        Ok(all_rows)
    }
}
