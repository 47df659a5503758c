// simulation_engine/mod.rs
pub mod road_network;
pub mod simulation;
pub mod traffic_generator;
pub mod vehicles;
