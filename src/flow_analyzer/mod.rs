pub mod congestion_detector;

pub use congestion_detector::{summarize_by_road, CongestionDetector, RoadSummary};
