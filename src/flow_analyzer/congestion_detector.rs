// congestion_detector.rs

use crate::config::CongestionThresholds;
use crate::shared_data::{
    current_timestamp, round_to, CongestionAlert, CongestionCause, Severity, TelemetryRecord,
};
use rand::Rng;
use std::collections::BTreeMap;
use uuid::Builder;

/// Per-road aggregate of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSummary {
    pub road_id: String,
    pub road_name: String,
    pub vehicle_count: usize,
    pub average_speed: f64,
}

/// Groups a batch by road id, ordered by id. Repeated vehicle ids count once
/// per record, the same way they appear in the batch.
pub fn summarize_by_road(batch: &[TelemetryRecord]) -> Vec<RoadSummary> {
    let mut groups: BTreeMap<&str, (&str, usize, f64)> = BTreeMap::new();
    for record in batch {
        let entry = groups
            .entry(record.road_id.as_str())
            .or_insert((record.road_name.as_str(), 0, 0.0));
        entry.1 += 1;
        entry.2 += record.speed;
    }
    groups
        .into_iter()
        .map(|(road_id, (road_name, count, total_speed))| RoadSummary {
            road_id: road_id.to_string(),
            road_name: road_name.to_string(),
            vehicle_count: count,
            average_speed: total_speed / count as f64,
        })
        .collect()
}

/// Stateless congestion rule over a single batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CongestionDetector {
    thresholds: CongestionThresholds,
}

impl CongestionDetector {
    pub fn new(thresholds: CongestionThresholds) -> Self {
        Self { thresholds }
    }

    /// Severity for a road, or `None` when it is not congested. A road is
    /// congested with strictly more than `min_vehicle_count` records and an
    /// average strictly below `max_average_speed`.
    pub fn classify(&self, summary: &RoadSummary) -> Option<Severity> {
        let t = &self.thresholds;
        if summary.vehicle_count <= t.min_vehicle_count
            || summary.average_speed >= t.max_average_speed
        {
            return None;
        }
        if summary.average_speed < t.high_severity_speed {
            Some(Severity::High)
        } else {
            Some(Severity::Medium)
        }
    }

    /// One alert per congested road in the batch. The alert id and the cause
    /// are drawn from `rng`; the cause is a placeholder, not a diagnosis.
    pub fn detect<R: Rng>(&self, batch: &[TelemetryRecord], rng: &mut R) -> Vec<CongestionAlert> {
        let timestamp = current_timestamp();
        summarize_by_road(batch)
            .into_iter()
            .filter_map(|summary| {
                let severity = self.classify(&summary)?;
                let mut bytes = [0u8; 16];
                rng.fill(&mut bytes[..]);
                let alert_id = format!(
                    "CONG_{}",
                    Builder::from_random_bytes(bytes).into_uuid().simple()
                );
                let cause =
                    CongestionCause::ALL[rng.random_range(0..CongestionCause::ALL.len())];
                log::debug!(
                    "Congestion on {} ({}): {} vehicles averaging {:.2} km/h -> {}",
                    summary.road_name,
                    summary.road_id,
                    summary.vehicle_count,
                    summary.average_speed,
                    severity
                );
                Some(CongestionAlert {
                    alert_id,
                    timestamp: timestamp.clone(),
                    road_id: summary.road_id,
                    road_name: summary.road_name,
                    severity,
                    avg_speed: round_to(summary.average_speed, 2),
                    vehicle_count: summary.vehicle_count,
                    cause,
                    resolved: false,
                })
            })
            .collect()
    }
}
