//! Configuration for the ghostseed seed emulator.
//!
//! The configuration lives in a `config.json` file at the root of the
//! configuration directory. Unknown fields are ignored so that newer files
//! keep working with older binaries. Out-of-range values fail the load with a
//! descriptive integrity error; nothing else in the application starts when
//! that happens.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 72 hours, the default tolerated non-seeding window.
const DEFAULT_MAX_NON_SEEDING_TIME_MS: u64 = 259_200_000;

/// 7 days, the default required total seeding time.
const DEFAULT_REQUIRED_SEEDING_TIME_MS: u64 = 604_800_000;

const DEFAULT_HIT_AND_RUN_CHECK_INTERVAL_MS: u64 = 60_000;

/// Errors that can happen while loading or validating the configuration.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration file not found: {path}")]
    MissingConfigFile { path: PathBuf },

    #[error("unable to read configuration file {path}: {source}")]
    UnreadableConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration json: {source}")]
    InvalidJson { source: serde_json::Error },

    #[error("maxUploadRate must be greater or equal to minUploadRate")]
    UploadRateRangeInverted,

    #[error("simultaneousSeed must be greater than 0, or -1 for unbounded")]
    InvalidSimultaneousSeed,

    #[error("client is required, no file name given")]
    MissingClient,

    #[error("uploadRatioTarget must be greater or equal to 0 (or equal to -1)")]
    InvalidUploadRatioTarget,

    #[error("hitAndRunCheckIntervalMs must be greater than 0")]
    InvalidHitAndRunCheckInterval,
}

/// The application configuration.
///
/// See the field docs for the meaning of each setting. All rates are in bytes
/// per second and all times in milliseconds.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AppConfiguration {
    /// Lower bound of the randomized global upload budget.
    pub min_upload_rate: u64,

    /// Upper bound of the randomized global upload budget.
    pub max_upload_rate: u64,

    /// How many torrents are seeded at once. `-1` means unbounded.
    pub simultaneous_seed: i32,

    /// Name of the emulated client file (in the `clients` directory) to use.
    pub client: String,

    /// When false, a torrent whose swarm has no seeders or no leechers left is
    /// archived and replaced.
    pub keep_torrent_with_zero_leechers: bool,

    /// Archive a torrent once `uploaded / size` exceeds this. `-1` disables
    /// the ratio limit.
    #[serde(default = "AppConfiguration::default_upload_ratio_target")]
    pub upload_ratio_target: f64,

    /// Non-seeding window after which a hit-and-run warning is raised.
    #[serde(default = "AppConfiguration::default_max_non_seeding_time_ms")]
    pub max_non_seeding_time_ms: u64,

    /// Total seeding time required before a torrent may be retired.
    #[serde(default = "AppConfiguration::default_required_seeding_time_ms")]
    pub required_seeding_time_ms: u64,

    /// When true, a torrent that fails too many announces in a row is archived
    /// and a replacement is promoted. When false it is only removed from the
    /// active set.
    #[serde(default)]
    pub archive_on_too_many_fails: bool,

    /// Period of the hit-and-run review loop.
    #[serde(default = "AppConfiguration::default_hit_and_run_check_interval_ms")]
    pub hit_and_run_check_interval_ms: u64,
}

impl AppConfiguration {
    fn default_upload_ratio_target() -> f64 {
        -1.0
    }

    fn default_max_non_seeding_time_ms() -> u64 {
        DEFAULT_MAX_NON_SEEDING_TIME_MS
    }

    fn default_required_seeding_time_ms() -> u64 {
        DEFAULT_REQUIRED_SEEDING_TIME_MS
    }

    fn default_hit_and_run_check_interval_ms() -> u64 {
        DEFAULT_HIT_AND_RUN_CHECK_INTERVAL_MS
    }

    /// Loads and validates the configuration from `config.json` inside
    /// `config_dir`.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] when the file is missing or unreadable, when
    /// it is not valid JSON, or when a value is out of range.
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, Error> {
        let path = config_dir.join(CONFIG_FILE_NAME);

        if !path.is_file() {
            return Err(Error::MissingConfigFile { path });
        }

        tracing::debug!("Reading json configuration from {} ...", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|source| Error::UnreadableConfigFile {
            path: path.clone(),
            source,
        })?;

        let configuration = Self::load_from_json(&contents)?;

        tracing::info!("App configuration has been successfully loaded");

        Ok(configuration)
    }

    /// Parses and validates the configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] when the JSON is malformed or a value is out
    /// of range.
    pub fn load_from_json(json: &str) -> Result<Self, Error> {
        let configuration: Self = serde_json::from_str(json).map_err(|source| Error::InvalidJson { source })?;

        configuration.validate()?;

        Ok(configuration)
    }

    /// Checks every integrity rule on the already-parsed values.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_upload_rate < self.min_upload_rate {
            return Err(Error::UploadRateRangeInverted);
        }

        if self.simultaneous_seed == 0 || self.simultaneous_seed < -1 {
            return Err(Error::InvalidSimultaneousSeed);
        }

        if self.client.trim().is_empty() {
            return Err(Error::MissingClient);
        }

        if self.upload_ratio_target < 0.0 && (self.upload_ratio_target + 1.0).abs() > f64::EPSILON {
            return Err(Error::InvalidUploadRatioTarget);
        }

        if self.hit_and_run_check_interval_ms == 0 {
            return Err(Error::InvalidHitAndRunCheckInterval);
        }

        Ok(())
    }

    /// Whether the number of simultaneously seeded torrents is unbounded.
    #[must_use]
    pub fn seeds_unbounded(&self) -> bool {
        self.simultaneous_seed == -1
    }

    /// Whether the upload-ratio limit is enabled.
    #[must_use]
    pub fn upload_ratio_limit_enabled(&self) -> bool {
        self.upload_ratio_target >= 0.0
    }
}
