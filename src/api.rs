use std::{sync::Arc, time::Duration};

use log::debug;
use reqwest::StatusCode;
use scraper::Html;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::{
    parser::extract_rated_level_id,
    schema::{
        is_truthy, LevelDetails, LevelId, LevelSearchResponse, ModerationEvent,
        RateLookupResponse,
    },
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { url: Url, status: StatusCode },
    #[error("Unexpected response body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{url} reported an unsuccessful lookup")]
    Unsuccessful { url: Url },
    #[error("Level search response does not contain a level")]
    MissingLevel,
    #[error("No \"Rated a level\" entry with a level id was found in the moderation log")]
    NoRatedLevel,
}

/// The two lookups a `/api/newrate` request is built from.
#[allow(async_fn_in_trait)]
pub trait Upstream {
    async fn scan(&self) -> Result<ModerationEvent, FetchError>;

    async fn level_details(&self, level_id: &LevelId) -> Result<LevelDetails, FetchError>;
}

#[derive(Clone, Debug)]
pub struct Endpoints {
    pub moderation_log: Url,
    pub rate_lookup: Url,
    pub level_details: Url,
}

#[derive(Clone, Debug)]
pub struct GdpsClient {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl GdpsClient {
    pub fn new(endpoints: Endpoints, user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, FetchError> {
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let body = self.get(url).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Looks for the newest "Rated a level" entry and asks who rated it.
    pub async fn scan(&self) -> Result<ModerationEvent, FetchError> {
        let html = self
            .get(self.endpoints.moderation_log.clone())
            .await?
            .text()
            .await?;
        let level_id = extract_rated_level_id(&Html::parse_document(&html))
            .ok_or(FetchError::NoRatedLevel)?;
        debug!("Found rated level {level_id}");

        let url = with_level(&self.endpoints.rate_lookup, &level_id);
        let response: RateLookupResponse = self.get_json(url.clone()).await?;
        if !is_truthy(&response.success) {
            return Err(FetchError::Unsuccessful { url });
        }
        Ok(ModerationEvent {
            level: response.level,
            level_id,
            rates: response.rates,
        })
    }

    pub async fn level_details(&self, level_id: &LevelId) -> Result<LevelDetails, FetchError> {
        let url = with_level(&self.endpoints.level_details, level_id);
        let response: LevelSearchResponse = self.get_json(url.clone()).await?;
        if !is_truthy(&response.success) {
            return Err(FetchError::Unsuccessful { url });
        }
        Ok(response.level.ok_or(FetchError::MissingLevel)?.into())
    }
}

impl Upstream for GdpsClient {
    async fn scan(&self) -> Result<ModerationEvent, FetchError> {
        GdpsClient::scan(self).await
    }

    async fn level_details(&self, level_id: &LevelId) -> Result<LevelDetails, FetchError> {
        GdpsClient::level_details(self, level_id).await
    }
}

fn with_level(url: &Url, level_id: &LevelId) -> Url {
    let mut url = url.clone();
    url.query_pairs_mut().append_pair("level", level_id.as_ref());
    url
}
