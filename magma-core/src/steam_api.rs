use serde::{Deserialize, Deserializer};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ApiError;

pub const PUBLISHED_FILE_DETAILS_URL: &str =
    "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/";

const RESULT_OK: i64 = 1;
const RESULT_FILE_NOT_FOUND: i64 = 9;

/// One record of `publishedfiledetails`. Missing items only carry the id and result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedFile {
    #[serde(deserialize_with = "u64_from_any")]
    pub publishedfileid: u64,
    pub result: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time_updated: i64,
    #[serde(default, deserialize_with = "opt_u64_from_any")]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Per-item result of a lenient lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Found(PublishedFile),
    Missing(u64),
    Failed { id: u64, code: i64 },
}

impl ItemOutcome {
    fn classify(file: PublishedFile) -> Self {
        match file.result {
            RESULT_OK => ItemOutcome::Found(file),
            RESULT_FILE_NOT_FOUND => ItemOutcome::Missing(file.publishedfileid),
            code => ItemOutcome::Failed { id: file.publishedfileid, code },
        }
    }
}

/// Turns lenient outcomes into the strict form: any missing or failed item fails the batch.
pub fn require_all(outcomes: Vec<ItemOutcome>) -> Result<Vec<PublishedFile>, ApiError> {
    outcomes
        .into_iter()
        .map(|outcome| match outcome {
            ItemOutcome::Found(file) => Ok(file),
            ItemOutcome::Missing(id) => Err(ApiError::ItemNotFound(id)),
            ItemOutcome::Failed { id, code } => Err(ApiError::ItemFailed { id, code }),
        })
        .collect()
}

/// Form fields for `GetPublishedFileDetails`.
pub fn details_form(ids: &[u64]) -> Vec<(String, String)> {
    let mut form = Vec::with_capacity(ids.len() + 1);
    form.push(("itemcount".to_string(), ids.len().to_string()));
    for (index, id) in ids.iter().enumerate() {
        form.push((format!("publishedfileids[{index}]"), id.to_string()));
    }
    form
}

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    response: DetailsResponse,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<PublishedFile>,
}

fn parse_details(body: &str, requested: usize) -> Result<Vec<ItemOutcome>, ApiError> {
    let envelope: DetailsEnvelope = serde_json::from_str(body).map_err(ApiError::Malformed)?;
    let files = envelope.response.publishedfiledetails;
    if files.len() != requested {
        return Err(ApiError::CountMismatch { requested, returned: files.len() });
    }
    Ok(files.into_iter().map(ItemOutcome::classify).collect())
}

/// Workshop metadata lookups. Orchestration goes through this so tests can swap in a fake.
pub trait WorkshopApi: Send + Sync {
    /// One outcome per id, in request order.
    fn published_file_outcomes(&self, ids: &[u64]) -> impl Future<Output = Result<Vec<ItemOutcome>, ApiError>> + Send;

    /// Every id must resolve, otherwise the whole call fails.
    fn published_files(&self, ids: &[u64]) -> impl Future<Output = Result<Vec<PublishedFile>, ApiError>> + Send {
        async move { require_all(self.published_file_outcomes(ids).await?) }
    }
}

#[derive(Debug, Clone)]
pub struct SteamApi {
    client: reqwest::Client,
    endpoint: String,
}

impl SteamApi {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_endpoint(PUBLISHED_FILE_DETAILS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("magma/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }
}

impl WorkshopApi for SteamApi {
    async fn published_file_outcomes(&self, ids: &[u64]) -> Result<Vec<ItemOutcome>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        info!("Steam API lookup for {} item(s)", ids.len());
        let resp = self.client.post(&self.endpoint).form(&details_form(ids)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        let body = resp.text().await?;
        debug!("Steam API returned {} bytes", body.len());
        parse_details(&body, ids.len())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s.parse().map_err(E::custom),
        }
    }
}

fn u64_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(deserializer)?.into_u64()
}

fn opt_u64_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(v) => v.into_u64().map(Some),
        None => Ok(None),
    }
}
