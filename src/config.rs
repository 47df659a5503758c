// src/config.rs

use crate::error::ConfigError;
use crate::global_variables::{
    AMQP_URL, CONGESTION_CHECK_CADENCE, CONNECT_ATTEMPTS, CONNECT_BACKOFF_SECS,
    ERROR_COOLDOWN_SECS, FLEET_SIZE, MAX_BATCH_VEHICLES, MAX_PROFILE_SPEED_KMH, SINK_PUSH_CADENCE,
    TICK_INTERVAL_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inclusive range of hours (0-23) during which the rush profile applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RushHourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl RushHourWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour <= self.end_hour
    }
}

/// Generation parameters for one part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    /// km/h
    pub base_speed: f64,
    /// Speeds are drawn uniformly from `base_speed ± speed_variation`.
    pub speed_variation: f64,
    pub min_vehicles: usize,
    pub max_vehicles: usize,
}

impl TrafficProfile {
    pub fn rush_hour() -> Self {
        Self {
            base_speed: 20.0,
            speed_variation: 15.0,
            min_vehicles: 15,
            max_vehicles: 25,
        }
    }

    pub fn off_peak() -> Self {
        Self {
            base_speed: 45.0,
            speed_variation: 25.0,
            min_vehicles: 8,
            max_vehicles: 15,
        }
    }

    fn validate(&self, profile: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidProfile { profile, reason };
        let speed_range = 0.0..=MAX_PROFILE_SPEED_KMH;
        if !speed_range.contains(&self.base_speed) {
            return Err(invalid(format!(
                "base speed {} must be within 0-{} km/h",
                self.base_speed, MAX_PROFILE_SPEED_KMH
            )));
        }
        if !speed_range.contains(&self.speed_variation) {
            return Err(invalid(format!(
                "speed variation {} must be within 0-{} km/h",
                self.speed_variation, MAX_PROFILE_SPEED_KMH
            )));
        }
        if self.max_vehicles == 0 || self.min_vehicles > self.max_vehicles {
            return Err(invalid(format!(
                "vehicle range {}-{} is empty",
                self.min_vehicles, self.max_vehicles
            )));
        }
        if self.max_vehicles > MAX_BATCH_VEHICLES {
            return Err(invalid(format!(
                "at most {} vehicles per batch, got {}",
                MAX_BATCH_VEHICLES, self.max_vehicles
            )));
        }
        Ok(())
    }
}

/// Thresholds for the per-road congestion rule. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CongestionThresholds {
    /// A road needs more than this many records in the batch.
    pub min_vehicle_count: usize,
    /// ... and an average speed below this (km/h).
    pub max_average_speed: f64,
    /// Averages below this are reported as high severity.
    pub high_severity_speed: f64,
}

impl Default for CongestionThresholds {
    fn default() -> Self {
        Self {
            min_vehicle_count: 10,
            max_average_speed: 25.0,
            high_severity_speed: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_interval_secs: u64,
    pub fleet_size: usize,
    /// Run the congestion detector every N ticks.
    pub congestion_check_cadence: u64,
    /// Push one sample record to the telemetry sink every M ticks.
    pub sink_push_cadence: u64,
    pub error_cooldown_secs: u64,
    pub rush_hour_windows: Vec<RushHourWindow>,
    pub rush_profile: TrafficProfile,
    pub off_peak_profile: TrafficProfile,
    pub thresholds: CongestionThresholds,
    pub amqp_url: String,
    pub connect_attempts: u32,
    pub connect_backoff_secs: u64,
    /// Seed for the simulation RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Pin the hour of day instead of reading the local clock.
    pub fixed_hour: Option<u32>,
    /// Stop after this many ticks; `None` runs until shutdown.
    pub max_ticks: Option<u64>,
    pub telemetry_csv: Option<PathBuf>,
    pub alerts_csv: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: TICK_INTERVAL_SECS,
            fleet_size: FLEET_SIZE,
            congestion_check_cadence: CONGESTION_CHECK_CADENCE,
            sink_push_cadence: SINK_PUSH_CADENCE,
            error_cooldown_secs: ERROR_COOLDOWN_SECS,
            rush_hour_windows: vec![RushHourWindow::new(7, 9), RushHourWindow::new(16, 18)],
            rush_profile: TrafficProfile::rush_hour(),
            off_peak_profile: TrafficProfile::off_peak(),
            thresholds: CongestionThresholds::default(),
            amqp_url: AMQP_URL.to_string(),
            connect_attempts: CONNECT_ATTEMPTS,
            connect_backoff_secs: CONNECT_BACKOFF_SECS,
            seed: None,
            fixed_hour: None,
            max_ticks: None,
            telemetry_csv: None,
            alerts_csv: None,
        }
    }
}

impl SimulationConfig {
    /// Load from a JSON file. Missing fields fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fleet_size == 0 {
            return Err(ConfigError::EmptyFleet);
        }
        if self.congestion_check_cadence == 0 {
            return Err(ConfigError::ZeroCadence {
                name: "congestion check",
            });
        }
        if self.sink_push_cadence == 0 {
            return Err(ConfigError::ZeroCadence { name: "sink push" });
        }
        for window in &self.rush_hour_windows {
            if window.start_hour > 23 || window.end_hour > 23 || window.start_hour > window.end_hour
            {
                return Err(ConfigError::InvalidRushWindow {
                    start_hour: window.start_hour,
                    end_hour: window.end_hour,
                });
            }
        }
        if let Some(hour) = self.fixed_hour {
            if hour > 23 {
                return Err(ConfigError::InvalidHour(hour));
            }
        }
        self.rush_profile.validate("rush hour")?;
        self.off_peak_profile.validate("off-peak")?;

        let t = &self.thresholds;
        if !(t.max_average_speed.is_finite() && t.high_severity_speed.is_finite()) {
            return Err(ConfigError::InvalidThresholds(
                "speeds must be finite".to_string(),
            ));
        }
        if t.high_severity_speed > t.max_average_speed {
            return Err(ConfigError::InvalidThresholds(format!(
                "high severity speed {} exceeds congestion speed {}",
                t.high_severity_speed, t.max_average_speed
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_secs(self.connect_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn rush_windows_are_inclusive() {
        let windows = SimulationConfig::default().rush_hour_windows;
        let in_rush = |hour: u32| windows.iter().any(|w| w.contains(hour));
        for hour in [7, 8, 9, 16, 17, 18] {
            assert!(in_rush(hour), "hour {}", hour);
        }
        for hour in [0, 6, 10, 13, 15, 19, 23] {
            assert!(!in_rush(hour), "hour {}", hour);
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut config = SimulationConfig::default();
        config.fleet_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyFleet)));

        let mut config = SimulationConfig::default();
        config.congestion_check_cadence = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCadence { .. })
        ));

        let mut config = SimulationConfig::default();
        config.rush_hour_windows = vec![RushHourWindow::new(18, 16)];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRushWindow { .. })
        ));

        let mut config = SimulationConfig::default();
        config.rush_hour_windows = vec![RushHourWindow::new(22, 24)];
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.off_peak_profile.min_vehicles = 20;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProfile { .. })
        ));

        let mut config = SimulationConfig::default();
        config.fixed_hour = Some(24);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHour(24))));
    }

    #[test]
    fn rejects_profiles_that_cannot_be_sampled() {
        // A finite but enormous variation overflows the sampling range.
        let mut config = SimulationConfig::default();
        config.off_peak_profile.speed_variation = 1e308;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProfile { profile: "off-peak", .. })
        ));

        let mut config = SimulationConfig::default();
        config.rush_profile.base_speed = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.rush_profile.max_vehicles = usize::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProfile { profile: "rush hour", .. })
        ));

        let mut config = SimulationConfig::default();
        config.rush_profile.base_speed = MAX_PROFILE_SPEED_KMH;
        config.rush_profile.speed_variation = MAX_PROFILE_SPEED_KMH;
        config.rush_profile.max_vehicles = MAX_BATCH_VEHICLES;
        config.validate().unwrap();
    }

    #[test]
    fn loads_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "fleet_size": 50, "rush_hour_windows": [{{ "start_hour": 6, "end_hour": 8 }}] }}"#
        )
        .unwrap();

        let config = SimulationConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.fleet_size, 50);
        assert_eq!(config.rush_hour_windows, vec![RushHourWindow::new(6, 8)]);
        assert_eq!(config.tick_interval_secs, TICK_INTERVAL_SECS);
    }

    #[test]
    fn rejects_invalid_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "fleet_size": 0 }}"#).unwrap();
        assert!(matches!(
            SimulationConfig::from_json_file(file.path()),
            Err(ConfigError::EmptyFleet)
        ));
    }
}
