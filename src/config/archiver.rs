// src/config/archiver.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::agency::{AgencyEntry, AgencyId, AgencyIdList};
use crate::feed::transport::DEFAULT_USER_AGENT;
use crate::feed::FeedSources;
use crate::poller::FaultIsolation;
use crate::scheduler::{MissedTick, TaskConfig};

pub const ENV_CONFIG_PATH: &str = "ARCHIVER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/archiver.toml";

pub const ENV_TRIP_UPDATES_URL: &str = "ARCHIVER_TRIP_UPDATES_URL";
pub const ENV_VEHICLE_POSITIONS_URL: &str = "ARCHIVER_VEHICLE_POSITIONS_URL";
pub const ENV_ALERTS_URL: &str = "ARCHIVER_ALERTS_URL";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "ARCHIVER_REFRESH_INTERVAL_SECS";
pub const ENV_AGENCY_IDS: &str = "ARCHIVER_AGENCY_IDS";
pub const ENV_LISTEN_ADDR: &str = "ARCHIVER_LISTEN_ADDR";

fn default_refresh_interval_secs() -> i64 {
    30
}
fn default_ready_reminder_secs() -> u64 {
    10
}
fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    #[serde(default)]
    pub trip_updates_url: Option<Url>,
    #[serde(default)]
    pub vehicle_positions_url: Option<Url>,
    #[serde(default)]
    pub alerts_url: Option<Url>,
    /// Seconds between cycles; zero or negative disables polling.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: i64,
    /// Single agency, listed before `agency_ids`.
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub agency_ids: Vec<String>,
    /// Entries served by the in-process agency directory.
    #[serde(default)]
    pub agencies: Vec<AgencyEntry>,
    #[serde(default)]
    pub fault_isolation: FaultIsolation,
    #[serde(default)]
    pub missed_tick: MissedTick,
    #[serde(default = "default_ready_reminder_secs")]
    pub ready_reminder_secs: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            trip_updates_url: None,
            vehicle_positions_url: None,
            alerts_url: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            agency_id: None,
            agency_ids: Vec::new(),
            agencies: Vec::new(),
            fault_isolation: FaultIsolation::default(),
            missed_tick: MissedTick::default(),
            ready_reminder_secs: default_ready_reminder_secs(),
            listen_addr: default_listen_addr(),
            http: HttpConfig::default(),
        }
    }
}

impl ArchiverConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing archiver config")
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading archiver config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $ARCHIVER_CONFIG_PATH (must exist)
    /// 2) config/archiver.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            Self::load_from_file(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from_file(&p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Override fields from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_TRIP_UPDATES_URL) {
            self.trip_updates_url = Some(parse_url(ENV_TRIP_UPDATES_URL, &v)?);
        }
        if let Some(v) = get(ENV_VEHICLE_POSITIONS_URL) {
            self.vehicle_positions_url = Some(parse_url(ENV_VEHICLE_POSITIONS_URL, &v)?);
        }
        if let Some(v) = get(ENV_ALERTS_URL) {
            self.alerts_url = Some(parse_url(ENV_ALERTS_URL, &v)?);
        }
        if let Some(v) = get(ENV_REFRESH_INTERVAL_SECS) {
            self.refresh_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_REFRESH_INTERVAL_SECS}={v} is not an integer"))?;
        }
        if let Some(v) = get(ENV_AGENCY_IDS) {
            self.agency_id = None;
            self.agency_ids = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get(ENV_LISTEN_ADDR) {
            self.listen_addr = v.trim().to_string();
        }
        Ok(())
    }

    pub fn sources(&self) -> FeedSources {
        FeedSources {
            trip_updates: self.trip_updates_url.clone(),
            vehicle_positions: self.vehicle_positions_url.clone(),
            alerts: self.alerts_url.clone(),
        }
    }

    /// `agency_id` then `agency_ids`, first occurrence wins.
    pub fn agency_ids(&self) -> Vec<AgencyId> {
        let mut ids = AgencyIdList::new();
        ids.extend(self.agency_id.iter().cloned());
        ids.extend(self.agency_ids.iter().cloned());
        ids.into_vec()
    }

    /// `None` when polling is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        u64::try_from(self.refresh_interval_secs)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }

    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            sources: self.sources(),
            refresh_interval: self.refresh_interval(),
            agency_ids: self.agency_ids(),
            fault_isolation: self.fault_isolation,
            missed_tick: self.missed_tick,
            ready_reminder: Duration::from_secs(self.ready_reminder_secs.max(1)),
        }
    }
}

fn parse_url(key: &str, v: &str) -> Result<Url> {
    Url::parse(v.trim()).with_context(|| format!("{key}={v} is not a valid url"))
}
