use std::{fmt::Debug, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use url::Url;

use crate::{api::Endpoints, pipeline::RetryPolicy};

pub const MODERATION_LOG_URL: &str =
    "https://www.rickgdps.xyz/datastore/dashboard/stats/modActionsList.php";
pub const RATE_LOOKUP_URL: &str = "https://www.rickgdps.xyz/datastore/dashboard/api/whoRated.php";
pub const LEVEL_DETAILS_URL: &str =
    "https://www.rickgdps.xyz/datastore/dashboard/api/searchLevel.php";

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub user_agent: String,
    pub moderation_log_url: Url,
    pub rate_lookup_url: Url,
    pub level_details_url: Url,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(rename = "request_timeout_secs")]
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_owned(),
            port: 25622,
            user_agent: "Mozilla/5.0".to_owned(),
            moderation_log_url: Url::parse(MODERATION_LOG_URL).unwrap(),
            rate_lookup_url: Url::parse(RATE_LOOKUP_URL).unwrap(),
            level_details_url: Url::parse(LEVEL_DETAILS_URL).unwrap(),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Reads the config from a TOML file, or falls back to the defaults without one.
    pub fn load<P: Into<PathBuf> + Debug>(path: Option<P>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let path = path.into();
        (|| toml::from_str(&fs_err::read_to_string(&path)?).map_err(anyhow::Error::new))()
            .with_context(|| format!("While trying to parse {path:?} as a config"))
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            moderation_log: self.moderation_log_url.clone(),
            rate_lookup: self.rate_lookup_url.clone(),
            level_details: self.level_details_url.clone(),
        }
    }
}
