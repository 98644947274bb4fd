//! # Docking library.
//!
//! This library allows other crates in the workspace to access items defined inside the docking
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Background thread handling shared by every long running component
pub mod bg_thread;

/// Command client - sends vehicle commands and recieves their responses
pub mod cmd_client;

/// Docking controller - drives the vehicle onto a docking station
pub mod docker;

/// Docking executable parameters
pub mod params;

/// Planner interfaces and reference planners used by the docking controller
pub mod planner;

/// Pose sources - provide camera relative fiducial poses
pub mod pose_source;

/// Station database - the known docking stations
pub mod station_db;

/// Station finder - publishes the docking stations currently in view
pub mod station_finder;

/// Telemetry source - provides the docking rail telemetry
pub mod telem_source;
