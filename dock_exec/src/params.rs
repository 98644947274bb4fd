//! # Docking Executable Parameters
//!
//! This module provides parameters for the docking executable, loaded from `dock_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    docker::ControllerOptions,
    planner::{ArcPlannerParams, RailIkParams},
    station_finder::StationFinderParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DockExecParams {
    /// Path to the station database, relative to the software root.
    pub station_db_path: String,

    /// Topic ground truth pose samples are published under.
    pub pose_topic: String,

    /// Topic rail telemetry is published under.
    pub telemetry_topic: String,

    pub controller: ControllerOptions,

    pub station_finder: StationFinderParams,

    pub arc_planner: ArcPlannerParams,

    pub rail_ik: RailIkParams,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_params_parse() {
        let params: DockExecParams =
            util::params::parse(include_str!("../../params/dock_exec.toml")).unwrap();

        // The planner must leave room for the fail-safe stop after the last element
        assert!(
            params.arc_planner.horizon_s * 1000.0 < params.controller.last_command_period_ms as f32
        );
        assert_eq!(params.station_finder.topic, "stations");
        assert!(params.controller.use_ground_truth_fiducials);
    }

    #[test]
    fn test_default_station_db_parses() {
        let stations =
            crate::station_db::parse(include_str!("../../params/stations.json")).unwrap();
        assert!(!stations.is_empty());
    }
}
