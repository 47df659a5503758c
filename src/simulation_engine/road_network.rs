use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        Coordinate {
            latitude: self.latitude * (1.0 - t) + other.latitude * t,
            longitude: self.longitude * (1.0 - t) + other.longitude * t,
        }
    }

    fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A fixed stretch of road between two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub road_id: String,
    pub name: String,
    pub start: Coordinate,
    pub end: Coordinate,
}

impl RoadSegment {
    pub fn new(road_id: &str, name: &str, start: Coordinate, end: Coordinate) -> Self {
        Self {
            road_id: road_id.to_string(),
            name: name.to_string(),
            start,
            end,
        }
    }

    /// Point at `progress` along the segment (0 = start, 1 = end).
    pub fn point_at(&self, progress: f64) -> Coordinate {
        self.start.lerp(&self.end, progress)
    }
}

/// Read-only road table shared by every vehicle in the fleet.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    segments: Vec<Arc<RoadSegment>>,
}

impl RoadNetwork {
    /// Builds the network, rejecting an empty table, duplicate ids and
    /// coordinates that are not valid latitude/longitude pairs.
    pub fn new(segments: Vec<RoadSegment>) -> Result<Self, ConfigError> {
        if segments.is_empty() {
            return Err(ConfigError::EmptyRoadNetwork);
        }
        let mut seen = HashSet::new();
        for segment in &segments {
            if !seen.insert(segment.road_id.clone()) {
                return Err(ConfigError::DuplicateRoad(segment.road_id.clone()));
            }
            for point in [segment.start, segment.end] {
                if !point.is_valid() {
                    return Err(ConfigError::InvalidCoordinate {
                        road_id: segment.road_id.clone(),
                        latitude: point.latitude,
                        longitude: point.longitude,
                    });
                }
            }
        }
        Ok(Self {
            segments: segments.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn segments(&self) -> &[Arc<RoadSegment>] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Uniformly chosen segment. Only used to place vehicles at startup.
    pub fn random_segment<R: Rng>(&self, rng: &mut R) -> Arc<RoadSegment> {
        let idx = rng.random_range(0..self.segments.len());
        Arc::clone(&self.segments[idx])
    }
}

/// The four-street downtown grid the simulator ships with.
pub fn create_road_network() -> RoadNetwork {
    let segments = vec![
        RoadSegment::new(
            "RD001",
            "Main Street",
            Coordinate::new(40.7500, -74.0050),
            Coordinate::new(40.7600, -73.9950),
        ),
        RoadSegment::new(
            "RD002",
            "Broadway",
            Coordinate::new(40.7550, -74.0100),
            Coordinate::new(40.7650, -74.0000),
        ),
        RoadSegment::new(
            "RD003",
            "5th Avenue",
            Coordinate::new(40.7450, -74.0050),
            Coordinate::new(40.7550, -73.9950),
        ),
        RoadSegment::new(
            "RD004",
            "Park Avenue",
            Coordinate::new(40.7480, -74.0150),
            Coordinate::new(40.7580, -74.0050),
        ),
    ];
    RoadNetwork {
        segments: segments.into_iter().map(Arc::new).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn default_network_passes_validation() {
        let network = create_road_network();
        let segments: Vec<RoadSegment> =
            network.segments().iter().map(|s| (**s).clone()).collect();
        assert_eq!(RoadNetwork::new(segments).unwrap().len(), 4);
    }

    #[test]
    fn interpolation_is_exact_at_known_points() {
        let segment = RoadSegment::new(
            "RD9",
            "Test",
            Coordinate::new(10.0, 20.0),
            Coordinate::new(12.0, 16.0),
        );
        assert_eq!(segment.point_at(0.0), segment.start);
        assert_eq!(segment.point_at(1.0), segment.end);
        assert_eq!(segment.point_at(0.5), Coordinate::new(11.0, 18.0));
    }

    #[test]
    fn rejects_malformed_tables() {
        assert!(matches!(
            RoadNetwork::new(vec![]),
            Err(ConfigError::EmptyRoadNetwork)
        ));

        let a = RoadSegment::new("R1", "A", Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0));
        assert!(matches!(
            RoadNetwork::new(vec![a.clone(), a.clone()]),
            Err(ConfigError::DuplicateRoad(id)) if id == "R1"
        ));

        let bad = RoadSegment::new(
            "R2",
            "B",
            Coordinate::new(95.0, 0.0),
            Coordinate::new(1.0, 1.0),
        );
        assert!(matches!(
            RoadNetwork::new(vec![a, bad]),
            Err(ConfigError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn random_segment_covers_every_road() {
        let network = create_road_network();
        let mut rng = StdRng::seed_from_u64(7);
        let seen: HashSet<String> = (0..200)
            .map(|_| network.random_segment(&mut rng).road_id.clone())
            .collect();
        assert_eq!(seen.len(), network.len());
    }
}
