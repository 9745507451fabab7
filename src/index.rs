//! Client for the remote inscription index.
//!
//! Two read-only endpoints are used: the item record (for its declared
//! parents) and one page of a parent's children. All calls go through a
//! single `&mut` handle and a [`Throttle`], so requests are strictly
//! sequential and spaced by the configured delay.

use std::time::Duration;

use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::Instant;

use crate::config::IndexConfig;
use crate::error::ParentScanError;

/// An item as reported by the index. Only the parent list matters here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// One page of a parent's children.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChildrenPage {
    pub ids: Vec<String>,
    pub more: bool,
}

/// Read access to the remote index.
///
/// Implementations must not overlap requests; taking `&mut self` makes every
/// caller wait for the previous call to finish.
#[allow(async_fn_in_trait)]
pub trait IndexSource {
    async fn fetch_record(&mut self, id: &str) -> Result<ItemRecord, ParentScanError>;

    async fn fetch_children_page(
        &mut self,
        parent_id: &str,
        page_index: u64,
    ) -> Result<ChildrenPage, ParentScanError>;
}

/// Fixed spacing between consecutive requests.
///
/// The delay is measured from the end of one call to the start of the next,
/// which matches sleeping after every call without a trailing sleep.
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Throttle {
            delay,
            last_call: None,
        }
    }

    pub async fn wait(&self) {
        if let Some(last_call) = self.last_call {
            tokio::time::sleep_until(last_call + self.delay).await;
        }
    }

    pub fn mark(&mut self) {
        self.last_call = Some(Instant::now());
    }
}

pub struct HttpIndex {
    client: reqwest::Client,
    base_url: String,
    throttle: Throttle,
}

impl HttpIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, ParentScanError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| ParentScanError::Error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpIndex {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            throttle: Throttle::new(config.delay()),
        })
    }

    pub fn record_url(&self, id: &str) -> String {
        format!("{}/inscription/{}", self.base_url, id)
    }

    pub fn children_url(&self, parent_id: &str, page_index: u64) -> String {
        format!("{}/children/{}/{}", self.base_url, parent_id, page_index)
    }

    async fn get_json<T: DeserializeOwned>(&mut self, url: String) -> Result<T, ParentScanError> {
        self.throttle.wait().await;
        let result = self.send(&url).await;
        self.throttle.mark();
        result
    }

    async fn send<T: DeserializeOwned>(&self, url: &str) -> Result<T, ParentScanError> {
        trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ParentScanError::Request {
                url: url.to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} for {}", status, url);
            return Err(ParentScanError::Fetch {
                status: Some(status.as_u16()),
                url: url.to_owned(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ParentScanError::Request {
                url: url.to_owned(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| ParentScanError::parse(url, e))
    }
}

impl IndexSource for HttpIndex {
    async fn fetch_record(&mut self, id: &str) -> Result<ItemRecord, ParentScanError> {
        let url = self.record_url(id);
        let mut record: ItemRecord = self.get_json(url).await?;
        if record.id.is_empty() {
            record.id = id.to_owned();
        }
        Ok(record)
    }

    async fn fetch_children_page(
        &mut self,
        parent_id: &str,
        page_index: u64,
    ) -> Result<ChildrenPage, ParentScanError> {
        let url = self.children_url(parent_id, page_index);
        self.get_json(url).await
    }
}
