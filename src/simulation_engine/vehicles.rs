use crate::error::SimulationError;
use crate::global_variables::MAX_PROGRESS_STEP;
use crate::simulation_engine::road_network::{Coordinate, RoadNetwork, RoadSegment};
use rand::Rng;
use std::sync::Arc;

/// Where one vehicle of the fleet currently is.
#[derive(Debug, Clone)]
pub struct VehiclePosition {
    pub vehicle_id: String,
    pub segment: Arc<RoadSegment>,
    progress: f64,
    coordinate: Coordinate,
}

impl VehiclePosition {
    pub fn new(vehicle_id: String, segment: Arc<RoadSegment>, progress: f64) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        let coordinate = segment.point_at(progress);
        Self {
            vehicle_id,
            segment,
            progress,
            coordinate,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Shift progress by `delta`, clamped to [0, 1], and re-derive the coordinate.
    pub fn nudge(&mut self, delta: f64) {
        self.progress = (self.progress + delta).clamp(0.0, 1.0);
        self.coordinate = self.segment.point_at(self.progress);
    }
}

/// Owns the position of every vehicle for the lifetime of the run. The fleet
/// is fixed once initialized; `advance` is the only way to move a vehicle.
#[derive(Debug, Clone, Default)]
pub struct VehiclePositionModel {
    positions: Vec<VehiclePosition>,
}

/// Fleet ids `V0001`, `V0002`, ...
pub fn fleet_ids(fleet_size: usize) -> Vec<String> {
    (1..=fleet_size).map(|i| format!("V{:04}", i)).collect()
}

impl VehiclePositionModel {
    /// Places each vehicle on a random segment at a random progress.
    pub fn initialize<R: Rng>(
        vehicle_ids: Vec<String>,
        network: &RoadNetwork,
        rng: &mut R,
    ) -> Self {
        let positions = vehicle_ids
            .into_iter()
            .map(|id| {
                let segment = network.random_segment(rng);
                let progress: f64 = rng.random_range(0.0..=1.0);
                VehiclePosition::new(id, segment, progress)
            })
            .collect();
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&VehiclePosition> {
        self.positions.get(index)
    }

    pub fn positions(&self) -> &[VehiclePosition] {
        &self.positions
    }

    /// Moves the vehicle at `index` a small random step forward or back along
    /// its segment (at most 5% of the segment per call).
    ///
    /// Vehicles are addressed by fleet index rather than id: the fleet is fixed
    /// at `initialize`, index `i` always holds the `i`-th id given there, and
    /// the generator samples indices directly so no id lookup is needed.
    pub fn advance<R: Rng>(
        &mut self,
        index: usize,
        rng: &mut R,
    ) -> Result<&VehiclePosition, SimulationError> {
        let position = self
            .positions
            .get_mut(index)
            .ok_or(SimulationError::UnknownVehicle(index))?;
        let delta = rng.random_range(-MAX_PROGRESS_STEP..=MAX_PROGRESS_STEP);
        position.nudge(delta);
        Ok(position)
    }
}
