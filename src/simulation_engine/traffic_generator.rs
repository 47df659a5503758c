use crate::communication::StreamingPublisher;
use crate::config::{RushHourWindow, SimulationConfig, TrafficProfile};
use crate::error::SimulationError;
use crate::global_variables::{MIN_SPEED_KMH, QUEUE_VEHICLE_GPS};
use crate::shared_data::{
    current_timestamp, round_to, CongestionLevel, TelemetryRecord, VehicleCategory,
};
use crate::simulation_engine::vehicles::VehiclePositionModel;
use rand::Rng;

/// The records produced by one tick. Consuming it with `into_iter` yields each
/// record once; nothing is kept after that.
#[derive(Debug, Clone)]
pub struct TelemetryBatch {
    pub batch_number: u64,
    pub hour: u32,
    pub rush_hour: bool,
    records: Vec<TelemetryRecord>,
}

impl TelemetryBatch {
    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn average_speed(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let total: f64 = self.records.iter().map(|r| r.speed).sum();
        Some(total / self.records.len() as f64)
    }
}

impl IntoIterator for TelemetryBatch {
    type Item = TelemetryRecord;
    type IntoIter = std::vec::IntoIter<TelemetryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Builds one batch of telemetry per tick, with the number of vehicles and
/// their speeds depending on the time of day.
#[derive(Debug, Clone)]
pub struct TrafficBatchGenerator {
    rush_hour_windows: Vec<RushHourWindow>,
    rush_profile: TrafficProfile,
    off_peak_profile: TrafficProfile,
}

impl TrafficBatchGenerator {
    pub fn new(
        rush_hour_windows: Vec<RushHourWindow>,
        rush_profile: TrafficProfile,
        off_peak_profile: TrafficProfile,
    ) -> Self {
        Self {
            rush_hour_windows,
            rush_profile,
            off_peak_profile,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.rush_hour_windows.clone(),
            config.rush_profile,
            config.off_peak_profile,
        )
    }

    pub fn is_rush_hour(&self, hour: u32) -> bool {
        self.rush_hour_windows.iter().any(|w| w.contains(hour))
    }

    pub fn profile_for_hour(&self, hour: u32) -> &TrafficProfile {
        if self.is_rush_hour(hour) {
            &self.rush_profile
        } else {
            &self.off_peak_profile
        }
    }

    /// Speed for one observation: base ± uniform variation, never below 5 km/h.
    pub fn sample_speed<R: Rng>(profile: &TrafficProfile, rng: &mut R) -> f64 {
        let variation = profile.speed_variation;
        let offset = if variation > 0.0 {
            rng.random_range(-variation..=variation)
        } else {
            0.0
        };
        (profile.base_speed + offset).max(MIN_SPEED_KMH)
    }

    /// Generates the batch for `batch_number` at the given hour of day.
    ///
    /// Vehicles are drawn with replacement, so one vehicle may appear (and be
    /// moved) several times in the same batch. Every record is offered to
    /// `publisher`; a publisher failure never interrupts generation.
    pub fn generate_batch<R: Rng>(
        &self,
        batch_number: u64,
        hour: u32,
        model: &mut VehiclePositionModel,
        publisher: &mut StreamingPublisher,
        rng: &mut R,
    ) -> Result<TelemetryBatch, SimulationError> {
        let rush_hour = self.is_rush_hour(hour);
        let profile = *self.profile_for_hour(hour);
        let vehicle_count = rng.random_range(profile.min_vehicles..=profile.max_vehicles);

        let mut records = Vec::with_capacity(vehicle_count);
        if !model.is_empty() {
            for _ in 0..vehicle_count {
                let index = rng.random_range(0..model.len());
                let position = model.advance(index, rng)?;
                let coordinate = position.coordinate();
                let vehicle_id = position.vehicle_id.clone();
                let road_id = position.segment.road_id.clone();
                let road_name = position.segment.name.clone();

                let speed = round_to(Self::sample_speed(&profile, rng), 2);
                let vehicle_type =
                    VehicleCategory::ALL[rng.random_range(0..VehicleCategory::ALL.len())];

                let record = TelemetryRecord {
                    vehicle_id,
                    timestamp: current_timestamp(),
                    latitude: round_to(coordinate.latitude, 6),
                    longitude: round_to(coordinate.longitude, 6),
                    speed,
                    road_id,
                    road_name,
                    vehicle_type,
                    congestion_level: CongestionLevel::from_speed(speed),
                };
                publisher.publish(QUEUE_VEHICLE_GPS, &record);
                records.push(record);
            }
        }

        Ok(TelemetryBatch {
            batch_number,
            hour,
            rush_hour,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::publisher::tests::RecordingBus;
    use crate::simulation_engine::road_network::create_road_network;
    use crate::simulation_engine::vehicles::fleet_ids;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    fn setup(seed: u64) -> (TrafficBatchGenerator, VehiclePositionModel, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let network = create_road_network();
        let model = VehiclePositionModel::initialize(fleet_ids(200), &network, &mut rng);
        let generator = TrafficBatchGenerator::from_config(&SimulationConfig::default());
        (generator, model, rng)
    }

    #[test]
    fn rush_hour_uses_rush_profile() {
        let (generator, mut model, mut rng) = setup(8);
        let mut publisher = StreamingPublisher::offline();
        assert_eq!(generator.profile_for_hour(8).base_speed, 20.0);
        for n in 1..=50 {
            let batch = generator
                .generate_batch(n, 8, &mut model, &mut publisher, &mut rng)
                .unwrap();
            assert!(batch.rush_hour);
            assert!((15..=25).contains(&batch.len()), "got {}", batch.len());
            for record in batch.records() {
                assert!((5.0..=35.0).contains(&record.speed), "{}", record.speed);
            }
        }
    }

    #[test]
    fn off_peak_uses_off_peak_profile() {
        let (generator, mut model, mut rng) = setup(13);
        let mut publisher = StreamingPublisher::offline();
        assert_eq!(generator.profile_for_hour(13).base_speed, 45.0);
        for n in 1..=50 {
            let batch = generator
                .generate_batch(n, 13, &mut model, &mut publisher, &mut rng)
                .unwrap();
            assert!(!batch.rush_hour);
            assert!((8..=15).contains(&batch.len()), "got {}", batch.len());
            for record in batch.records() {
                assert!((20.0..=70.0).contains(&record.speed), "{}", record.speed);
            }
        }
    }

    #[test]
    fn speeds_never_drop_below_minimum_and_labels_match() {
        let (generator, mut model, mut rng) = setup(5);
        let mut publisher = StreamingPublisher::offline();
        for hour in 0..24 {
            let batch = generator
                .generate_batch(hour as u64, hour, &mut model, &mut publisher, &mut rng)
                .unwrap();
            for record in batch {
                assert!(record.speed >= MIN_SPEED_KMH);
                let expected = if record.speed < 20.0 {
                    CongestionLevel::High
                } else if record.speed < 40.0 {
                    CongestionLevel::Medium
                } else {
                    CongestionLevel::Low
                };
                assert_eq!(record.congestion_level, expected);
            }
        }
    }

    #[test]
    fn heavy_variation_is_clamped_at_five() {
        let profile = TrafficProfile {
            base_speed: 0.0,
            speed_variation: 3.0,
            min_vehicles: 1,
            max_vehicles: 1,
        };
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(TrafficBatchGenerator::sample_speed(&profile, &mut rng), 5.0);
        }
    }

    #[test]
    fn records_match_vehicle_positions() {
        let (generator, mut model, mut rng) = setup(21);
        let mut publisher = StreamingPublisher::offline();
        let batch = generator
            .generate_batch(1, 12, &mut model, &mut publisher, &mut rng)
            .unwrap();
        let by_id: HashMap<&str, usize> = model
            .positions()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.vehicle_id.as_str(), i))
            .collect();
        for record in batch.records() {
            let position = model.get(by_id[record.vehicle_id.as_str()]).unwrap();
            assert_eq!(record.road_id, position.segment.road_id);
            assert_eq!(record.road_name, position.segment.name);
        }
    }

    #[test]
    fn duplicate_vehicles_are_kept() {
        // A two-vehicle fleet sampled 15+ times must repeat ids.
        let mut rng = StdRng::seed_from_u64(2);
        let network = create_road_network();
        let mut model = VehiclePositionModel::initialize(fleet_ids(2), &network, &mut rng);
        let generator = TrafficBatchGenerator::from_config(&SimulationConfig::default());
        let mut publisher = StreamingPublisher::offline();
        let batch = generator
            .generate_batch(1, 17, &mut model, &mut publisher, &mut rng)
            .unwrap();
        assert!(batch.len() >= 15);
        assert!(batch
            .records()
            .iter()
            .all(|r| r.vehicle_id == "V0001" || r.vehicle_id == "V0002"));
    }

    #[test]
    fn every_record_is_published_while_online() {
        let (generator, mut model, mut rng) = setup(4);
        let bus = RecordingBus::default();
        let mut publisher = StreamingPublisher::with_bus(Box::new(bus.clone()));
        let batch = generator
            .generate_batch(1, 8, &mut model, &mut publisher, &mut rng)
            .unwrap();
        assert_eq!(bus.sent_count(), batch.len());
        assert!(bus
            .sent
            .lock()
            .unwrap()
            .iter()
            .all(|(topic, _)| topic == QUEUE_VEHICLE_GPS));
    }

    #[test]
    fn generation_continues_after_publish_failure() {
        let (generator, mut model, mut rng) = setup(6);
        let bus = RecordingBus::default();
        bus.fail.store(true, Ordering::SeqCst);
        let mut publisher = StreamingPublisher::with_bus(Box::new(bus.clone()));

        let first = generator
            .generate_batch(1, 8, &mut model, &mut publisher, &mut rng)
            .unwrap();
        assert!(!first.is_empty());
        assert!(!publisher.is_online());

        bus.fail.store(false, Ordering::SeqCst);
        let second = generator
            .generate_batch(2, 8, &mut model, &mut publisher, &mut rng)
            .unwrap();
        assert!(!second.is_empty());
        assert_eq!(bus.sent_count(), 0);
    }

    #[test]
    fn empty_fleet_yields_empty_batch() {
        let generator = TrafficBatchGenerator::from_config(&SimulationConfig::default());
        let mut model = VehiclePositionModel::default();
        let mut publisher = StreamingPublisher::offline();
        let mut rng = StdRng::seed_from_u64(1);
        let batch = generator
            .generate_batch(1, 8, &mut model, &mut publisher, &mut rng)
            .unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.average_speed(), None);
    }
}
