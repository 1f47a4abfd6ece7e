//! HTTP client for the remote diagram table.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::wire::{created_id, WireList, WireRecord, WireWrite};
use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;
use crate::models::{DiagramId, DiagramRecord};
use crate::util::{compact_text, is_http_url, trim_url};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const PAGE_SIZE: usize = 100;
/// Upper bound on list pages, guarding against a backend that never reports
/// its last page.
const MAX_PAGES: usize = 1_000;

/// `RemoteStore` over a table-style REST API:
/// `{base}/api/v2/tables/{table}/records[/{id}]` with a bearer token.
#[derive(Clone)]
pub struct HttpRecordClient {
    records_url: String,
    api_token: String,
    client: Client,
}

impl fmt::Debug for HttpRecordClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpRecordClient")
            .field("records_url", &self.records_url)
            .field("api_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRecordClient {
    pub fn new(
        base_url: impl AsRef<str>,
        table_id: impl AsRef<str>,
        api_token: impl Into<String>,
    ) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;
        let table_id = table_id.as_ref().trim();
        if table_id.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "table id must not be empty".to_string(),
            ));
        }
        let api_token = api_token.into().trim().to_string();
        if api_token.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "API token must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| {
                RemoteError::InvalidConfiguration(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self {
            records_url: format!(
                "{base_url}/api/v2/tables/{}/records",
                urlencoding::encode(table_id)
            ),
            api_token,
            client,
        })
    }

    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when no remote settings are present (local-only mode)
    /// and an error when they are only partially filled in.
    pub fn from_config(config: &RemoteConfig) -> RemoteResult<Option<Self>> {
        if !config.is_any_set() {
            return Ok(None);
        }
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(RemoteError::InvalidConfiguration(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let (Some(base_url), Some(table_id), Some(api_token)) =
            (&config.base_url, &config.table_id, &config.api_token)
        else {
            return Ok(None);
        };
        Self::new(base_url, table_id, api_token.clone()).map(Some)
    }

    fn record_url(&self, id: &DiagramId) -> String {
        format!("{}/{}", self.records_url, urlencoding::encode(id.as_str()))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        self.authorized(request)
            .send()
            .await
            .map_err(classify_transport)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> RemoteResult<T> {
        let body = response.text().await.map_err(classify_transport)?;
        serde_json::from_str(&body).map_err(|error| {
            RemoteError::InvalidPayload(format!("{error}: {}", compact_text(&body)))
        })
    }

    async fn fetch_page(&self, offset: usize) -> RemoteResult<(Vec<DiagramRecord>, bool)> {
        let response = self
            .send(
                self.client
                    .get(&self.records_url)
                    .query(&[("limit", PAGE_SIZE), ("offset", offset)]),
            )
            .await?;
        let response = ensure_success(response).await?;

        let (items, last_page) = match Self::read_json::<WireList>(response).await? {
            WireList::Page { list, page_info } => {
                // Without pageInfo only a short page can be the last one.
                let short = list.len() < PAGE_SIZE;
                let last = page_info
                    .and_then(|info| info.is_last_page)
                    .unwrap_or(short);
                (list, last)
            }
            WireList::Bare(list) => (list, true),
        };

        let records = items
            .into_iter()
            .map(WireRecord::into_record)
            .collect::<RemoteResult<Vec<_>>>()?;
        let last_page = last_page || records.is_empty();
        Ok((records, last_page))
    }
}

impl RemoteStore for HttpRecordClient {
    async fn create(&self, record: &DiagramRecord) -> RemoteResult<DiagramRecord> {
        let response = self
            .send(
                self.client
                    .post(&self.records_url)
                    .json(&WireWrite::from(record)),
            )
            .await?;
        let response = ensure_success(response).await?;
        let payload = Self::read_json::<Value>(response).await?;

        let id = created_id(&payload).ok_or_else(|| {
            RemoteError::InvalidPayload("create response did not include an Id".to_string())
        })?;
        tracing::debug!("Remote assigned id {} to diagram {}", id, record.id);

        Ok(DiagramRecord {
            id: DiagramId::canonical(id),
            dirty: false,
            retry_count: 0,
            ..record.clone()
        })
    }

    async fn update(&self, record: &DiagramRecord) -> RemoteResult<()> {
        let response = self
            .send(
                self.client
                    .patch(self.record_url(&record.id))
                    .json(&WireWrite::from(record)),
            )
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_by_id(&self, id: &DiagramId) -> RemoteResult<Option<DiagramRecord>> {
        let response = self.send(self.client.get(self.record_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        let payload = Self::read_json::<Value>(response).await?;

        // Some backends answer an unknown id with an empty object.
        if payload.as_object().is_some_and(serde_json::Map::is_empty) {
            return Ok(None);
        }
        let wire: WireRecord = serde_json::from_value(payload)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        wire.into_record().map(Some)
    }

    async fn fetch_all(&self) -> RemoteResult<Vec<DiagramRecord>> {
        let mut records = Vec::new();
        for _ in 0..MAX_PAGES {
            let (page, last_page) = self.fetch_page(records.len()).await?;
            records.extend(page);
            if last_page {
                return Ok(records);
            }
        }
        tracing::warn!(
            "Stopped listing remote records after {} pages",
            MAX_PAGES
        );
        Ok(records)
    }

    async fn delete_by_id(&self, id: &DiagramId) -> RemoteResult<()> {
        let response = self.send(self.client.delete(self.record_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Remote diagram {} already absent", id);
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn verify_accessible(&self) -> RemoteResult<()> {
        let response = self
            .send(self.client.get(&self.records_url).query(&[("limit", 1)]))
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> RemoteResult<String> {
    let trimmed = trim_url(raw);
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidConfiguration(
            "base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(RemoteError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(status, body);
    match status.as_u16() {
        401 | 403 => RemoteError::Unauthorized(message),
        404 => RemoteError::NotFound(message),
        408 | 429 | 500..=599 => RemoteError::Unreachable(message),
        _ => RemoteError::Rejected(message),
    }
}

fn classify_transport(error: reqwest::Error) -> RemoteError {
    if error.is_decode() {
        RemoteError::InvalidPayload(error.to_string())
    } else {
        RemoteError::Unreachable(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.msg).or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
