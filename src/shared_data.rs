// src/shared_data.rs

use crate::global_variables::{HIGH_CONGESTION_BELOW, MEDIUM_CONGESTION_BELOW};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vehicle categories reported in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    Car,
    Truck,
    Bus,
    Motorcycle,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 4] = [
        VehicleCategory::Car,
        VehicleCategory::Truck,
        VehicleCategory::Bus,
        VehicleCategory::Motorcycle,
    ];
}

/// Congestion label attached to a single telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl CongestionLevel {
    /// Label for a speed in km/h: below 20 is high, below 40 medium, else low.
    pub fn from_speed(speed: f64) -> Self {
        if speed < HIGH_CONGESTION_BELOW {
            CongestionLevel::High
        } else if speed < MEDIUM_CONGESTION_BELOW {
            CongestionLevel::Medium
        } else {
            CongestionLevel::Low
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CongestionLevel::Low => write!(f, "low"),
            CongestionLevel::Medium => write!(f, "medium"),
            CongestionLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Informational cause attached to an alert. It is drawn at random and says
/// nothing about what actually slowed the traffic down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionCause {
    Accident,
    Construction,
    Volume,
    Weather,
}

impl CongestionCause {
    pub const ALL: [CongestionCause; 4] = [
        CongestionCause::Accident,
        CongestionCause::Construction,
        CongestionCause::Volume,
        CongestionCause::Weather,
    ];
}

/// One vehicle observation within a tick. Published on the `vehicle_gps` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub vehicle_id: String,
    pub timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    /// km/h, never below 5.
    pub speed: f64,
    pub road_id: String,
    pub road_name: String,
    pub vehicle_type: VehicleCategory,
    pub congestion_level: CongestionLevel,
}

/// Raised by the congestion detector. Published on the `congestion_alerts`
/// topic; resolution happens downstream, so `resolved` is always false here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionAlert {
    pub alert_id: String,
    pub timestamp: String,
    pub road_id: String,
    pub road_name: String,
    pub severity: Severity,
    pub avg_speed: f64,
    pub vehicle_count: usize,
    pub cause: CongestionCause,
    pub resolved: bool,
}

/// Local wall-clock time as an ISO-8601 string.
pub fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
