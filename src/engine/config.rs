//! Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::{
    CollectionAllocator, CollectionPoint, DiversionOrder, DEFAULT_DISTANCE_THRESHOLD,
    DEFAULT_FUTILE_THRESHOLD,
};
use crate::models::TimeWindow;
use crate::simulation::{MissingWindow, TimeWindowPolicy};

/// Problems loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for a multi-day run.
///
/// Every field has a default, so a JSON config only needs the fields it
/// changes.
///
/// # Examples
///
/// ```
/// use u_delivery::engine::SimulationConfig;
/// use u_delivery::simulation::TimeWindowPolicy;
///
/// let json = r#"{"days": 3, "policy": "arrival-wait"}"#;
/// let config = SimulationConfig::from_json_str(json).unwrap();
/// assert_eq!(config.days, 3);
/// assert_eq!(config.policy, TimeWindowPolicy::ArrivalWait);
/// assert_eq!(config.replications, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of days to simulate.
    pub days: usize,
    /// Start of the working day.
    pub day_start: f64,
    /// End of the working day.
    pub day_end: f64,
    /// Seed for the run's random stream. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Route simulations per day. Only the last one changes package state.
    pub replications: usize,
    /// How drivers treat time windows.
    pub policy: TimeWindowPolicy,
    /// How stops without a time window are treated.
    pub missing_window: MissingWindow,
    /// Chance that an on-time delivery fails anyway.
    pub failure_probability: f64,
    /// Collection points, if any.
    pub collection: Option<CollectionConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 5,
            day_start: 0.0,
            day_end: 28_800.0,
            seed: None,
            replications: 1,
            policy: TimeWindowPolicy::default(),
            missing_window: MissingWindow::default(),
            failure_probability: 0.0,
            collection: None,
        }
    }
}

impl SimulationConfig {
    /// Sets the horizon.
    pub fn with_days(mut self, days: usize) -> Self {
        self.days = days;
        self
    }

    /// Sets the working day.
    pub fn with_day_span(mut self, start: f64, end: f64) -> Self {
        self.day_start = start;
        self.day_end = end;
        self
    }

    /// Fixes the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the number of replications per day.
    pub fn with_replications(mut self, replications: usize) -> Self {
        self.replications = replications;
        self
    }

    /// Sets the time-window policy.
    pub fn with_policy(mut self, policy: TimeWindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the handling of stops without a time window.
    pub fn with_missing_window(mut self, missing_window: MissingWindow) -> Self {
        self.missing_window = missing_window;
        self
    }

    /// Sets the probability of a customer not being home.
    pub fn with_failure_probability(mut self, p: f64) -> Self {
        self.failure_probability = p;
        self
    }

    /// Enables collection points.
    pub fn with_collection(mut self, collection: CollectionConfig) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Parses a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The working day as a window.
    pub fn day_span(&self) -> Result<TimeWindow, ConfigError> {
        TimeWindow::new(self.day_start, self.day_end).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "day span [{}, {}] is not a valid window",
                self.day_start, self.day_end
            ))
        })
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replications == 0 {
            return Err(ConfigError::Invalid(
                "at least one replication is required".into(),
            ));
        }
        let span = self.day_span()?;
        if span.due() <= span.ready() {
            return Err(ConfigError::Invalid(format!(
                "day span [{}, {}] is empty",
                self.day_start, self.day_end
            )));
        }
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(ConfigError::Invalid(format!(
                "failure probability {} is outside [0, 1]",
                self.failure_probability
            )));
        }
        if let Some(collection) = &self.collection {
            collection.validate()?;
        }
        Ok(())
    }
}

/// Collection-point settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Pickup locations and their capacities.
    pub points: Vec<CollectionPoint>,
    /// Packages farther than this from every point are never diverted.
    pub distance_threshold: f64,
    /// Futile count at which a package becomes eligible.
    pub futile_threshold: u32,
    /// How diversion interacts with alternate groups.
    pub diversion_order: DiversionOrder,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            futile_threshold: DEFAULT_FUTILE_THRESHOLD,
            diversion_order: DiversionOrder::default(),
        }
    }
}

impl CollectionConfig {
    /// Settings for the given points with default thresholds.
    pub fn new(points: Vec<CollectionPoint>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// Sets the diversion order.
    pub fn with_diversion_order(mut self, order: DiversionOrder) -> Self {
        self.diversion_order = order;
        self
    }

    /// Sets the distance threshold.
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Sets the futile threshold.
    pub fn with_futile_threshold(mut self, threshold: u32) -> Self {
        self.futile_threshold = threshold;
        self
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(i) = self.points.iter().position(|p| p.capacity() == 0) {
            return Err(ConfigError::Invalid(format!(
                "collection point {i} has zero capacity"
            )));
        }
        if self.distance_threshold.is_nan() || self.distance_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "distance threshold {} must be positive",
                self.distance_threshold
            )));
        }
        Ok(())
    }

    /// Builds an allocator with empty points.
    pub fn allocator(&self) -> CollectionAllocator {
        CollectionAllocator::new(self.points.clone())
            .with_distance_threshold(self.distance_threshold)
            .with_futile_threshold(self.futile_threshold)
            .with_order(self.diversion_order)
    }
}
