use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::predict::Observer;
use crate::tracker::{DisplayFilter, SchedulePolicy, TrailConfig};

/// Upper bound on trail points per entity per tick.
pub const MAX_TRAIL_SAMPLES: u128 = 721;
const MAX_HORIZON: Duration = Duration::from_secs(14 * 86_400);
const MAX_RETRY: Duration = Duration::from_secs(86_400);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Session configuration. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub min_elevation_deg: f64,
    #[serde(default)]
    pub mode: DisplayFilter,
    #[serde(default = "default_trail_minutes")]
    pub trail_minutes: u32,
    #[serde(default = "default_trail_step", with = "duration_str")]
    pub trail_step: Duration,
    /// Comma-separated catalog group names
    #[serde(default = "default_groups")]
    pub groups: String,
    #[serde(default = "default_tle_dir")]
    pub tle_dir: PathBuf,
    #[serde(default = "default_max_sats")]
    pub max_sats: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_apogee_km: Option<f64>,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt_km: f64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        // Greenwich
        Self {
            lat: 51.4779,
            lon: 0.0,
            alt_km: 0.046,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_tick", with = "duration_str")]
    pub tick: Duration,
    #[serde(default = "default_horizon", with = "duration_str")]
    pub horizon: Duration,
    #[serde(default = "default_refresh_lead", with = "duration_str")]
    pub refresh_lead: Duration,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_degraded_after")]
    pub degraded_after: u32,
    #[serde(default = "default_retry_base", with = "duration_str")]
    pub retry_base: Duration,
    #[serde(default = "default_retry_max", with = "duration_str")]
    pub retry_max: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tick: default_tick(),
            horizon: default_horizon(),
            refresh_lead: default_refresh_lead(),
            workers: default_workers(),
            degraded_after: default_degraded_after(),
            retry_base: default_retry_base(),
            retry_max: default_retry_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_mirror_bind")]
    pub bind: String,
    #[serde(default = "default_io_timeout", with = "duration_str")]
    pub io_timeout: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            bind: default_mirror_bind(),
            io_timeout: default_io_timeout(),
        }
    }
}

fn default_trail_minutes() -> u32 {
    5
}

fn default_trail_step() -> Duration {
    Duration::from_secs(60)
}

fn default_groups() -> String {
    "visual".to_string()
}

fn default_tle_dir() -> PathBuf {
    PathBuf::from("tle_cache")
}

fn default_max_sats() -> usize {
    100
}

fn default_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_horizon() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_refresh_lead() -> Duration {
    Duration::ZERO
}

fn default_workers() -> usize {
    4
}

fn default_degraded_after() -> u32 {
    3
}

fn default_retry_base() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_max() -> Duration {
    Duration::from_secs(600)
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_mirror_bind() -> String {
    "0.0.0.0:12345".to_string()
}

fn default_io_timeout() -> Duration {
    Duration::from_millis(200)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            observer: ObserverConfig::default(),
            min_elevation_deg: 0.0,
            mode: DisplayFilter::default(),
            trail_minutes: default_trail_minutes(),
            trail_step: default_trail_step(),
            groups: default_groups(),
            tle_dir: default_tle_dir(),
            max_sats: default_max_sats(),
            max_apogee_km: None,
            tracking: TrackingConfig::default(),
            web: WebConfig::default(),
            mirror: MirrorConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Read `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(-90.0..=90.0).contains(&self.observer.lat) {
            return invalid("observer.lat must be within [-90, 90]");
        }
        if !(-180.0..=180.0).contains(&self.observer.lon) {
            return invalid("observer.lon must be within [-180, 180]");
        }
        if !(-90.0..=90.0).contains(&self.min_elevation_deg) {
            return invalid("min_elevation_deg must be within [-90, 90]");
        }
        if self.group_list().is_empty() {
            return invalid("groups must name at least one catalog group");
        }
        if self.max_sats == 0 {
            return invalid("max_sats must be positive");
        }
        if self.trail_step.is_zero() {
            return invalid("trail_step must be positive");
        }
        if self.trail_samples() > MAX_TRAIL_SAMPLES {
            return Err(ConfigError::Invalid(format!(
                "trail of {} min at {} spacing needs {} samples, limit is {}",
                self.trail_minutes,
                humantime::format_duration(self.trail_step),
                self.trail_samples(),
                MAX_TRAIL_SAMPLES
            )));
        }
        if self.tracking.tick.is_zero() {
            return invalid("tracking.tick must be positive");
        }
        if self.tracking.horizon.is_zero() || self.tracking.horizon > MAX_HORIZON {
            return invalid("tracking.horizon must be within (0, 14d]");
        }
        if self.tracking.refresh_lead >= self.tracking.horizon {
            return invalid("tracking.refresh_lead must be shorter than tracking.horizon");
        }
        if self.tracking.workers == 0 {
            return invalid("tracking.workers must be positive");
        }
        if self.tracking.degraded_after == 0 {
            return invalid("tracking.degraded_after must be positive");
        }
        if self.tracking.retry_base > self.tracking.retry_max {
            return invalid("tracking.retry_base must not exceed tracking.retry_max");
        }
        if self.tracking.retry_max > MAX_RETRY {
            return invalid("tracking.retry_max must not exceed 24h");
        }
        Ok(())
    }

    /// Points sampled over `[now - trail, now + trail]`, zero when disabled.
    pub fn trail_samples(&self) -> u128 {
        let step_ms = self.trail_step.as_millis();
        if self.trail_minutes == 0 || step_ms == 0 {
            return 0;
        }
        2 * u128::from(self.trail_minutes) * 60_000 / step_ms + 1
    }

    pub fn group_list(&self) -> Vec<String> {
        self.groups
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn observer(&self) -> Observer {
        Observer::new(self.observer.lat, self.observer.lon, self.observer.alt_km)
    }

    pub fn schedule_policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            horizon: span(self.tracking.horizon),
            refresh_lead: span(self.tracking.refresh_lead),
            min_elevation_deg: self.min_elevation_deg,
            retry_base: span(self.tracking.retry_base),
            retry_max: span(self.tracking.retry_max),
            degraded_after: self.tracking.degraded_after,
        }
    }

    pub fn trail(&self) -> TrailConfig {
        TrailConfig {
            window: chrono::Duration::minutes(i64::from(self.trail_minutes)),
            step: span(self.trail_step),
        }
    }
}

fn span(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Observer latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,
    /// Observer longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,
    /// Observer altitude in km
    #[arg(long)]
    pub alt: Option<f64>,
    /// Minimum elevation in degrees
    #[arg(long = "min-el", allow_negative_numbers = true)]
    pub min_elevation_deg: Option<f64>,
    #[arg(long, value_enum)]
    pub mode: Option<DisplayFilter>,
    /// Trail half-window in minutes (0 disables)
    #[arg(long = "trail")]
    pub trail_minutes: Option<u32>,
    /// Comma-separated catalog groups
    #[arg(long)]
    pub groups: Option<String>,
    #[arg(long)]
    pub tle_dir: Option<PathBuf>,
    #[arg(long)]
    pub max_sats: Option<usize>,
    #[arg(long = "max-apo")]
    pub max_apogee_km: Option<f64>,
    #[arg(long)]
    pub web_bind: Option<String>,
    #[arg(long)]
    pub mirror_bind: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(lat) = self.lat {
            config.observer.lat = lat;
        }
        if let Some(lon) = self.lon {
            config.observer.lon = lon;
        }
        if let Some(alt) = self.alt {
            config.observer.alt_km = alt;
        }
        if let Some(min_el) = self.min_elevation_deg {
            config.min_elevation_deg = min_el;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(trail) = self.trail_minutes {
            config.trail_minutes = trail;
        }
        if let Some(groups) = self.groups {
            config.groups = groups;
        }
        if let Some(dir) = self.tle_dir {
            config.tle_dir = dir;
        }
        if let Some(max_sats) = self.max_sats {
            config.max_sats = max_sats;
        }
        if let Some(max_apo) = self.max_apogee_km {
            config.max_apogee_km = Some(max_apo);
        }
        if let Some(bind) = self.web_bind {
            config.web.bind = bind;
        }
        if let Some(bind) = self.mirror_bind {
            config.mirror.bind = bind;
        }
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}
