//! Parameters structure for the docking controller

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Options of the docking controller.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerOptions {
    // ---- TERMINATION ----
    /// The controller succeeds once the remaining distance falls below this value.
    ///
    /// Units: meters
    pub stop_criteria_remaining_distance: f32,

    /// Number of consecutive planning failures after which the controller gives up.
    pub max_consecutive_failures: u32,

    // ---- COMMANDING ----
    /// Scale applied to the planned velocities.
    pub velocity_alpha: f32,

    /// Time after the first segment of a command at which the vehicle stops if no further
    /// command arrives.
    ///
    /// Units: milliseconds
    pub last_command_period_ms: u64,

    /// Send and receive timeout of the command transport.
    ///
    /// Units: milliseconds
    pub command_timeout_ms: i32,

    // ---- SLEW CONTROL ----
    /// If true the rails are commanded along with the drive.
    pub slew_control: bool,

    /// The rails are only moved once the remaining distance is within this value.
    ///
    /// Units: meters
    pub max_distance_to_control_slew: f32,

    // ---- FIDUCIALS ----
    /// Use ground truth poses rather than poses from the marker detector.
    pub use_ground_truth_fiducials: bool,

    /// Side length of the markers the detector looks for.
    ///
    /// Units: meters
    pub fiducial_side_length_m: f64,

    // ---- STATUS ----
    /// Topic the docking status is published under.
    pub status_topic: String,
}

#[cfg(test)]
impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            stop_criteria_remaining_distance: 0.05,
            max_consecutive_failures: 3,
            velocity_alpha: 1.0,
            last_command_period_ms: 500,
            command_timeout_ms: 100,
            slew_control: false,
            max_distance_to_control_slew: 1.0,
            use_ground_truth_fiducials: true,
            fiducial_side_length_m: 0.16,
            status_topic: "dock_status".into(),
        }
    }
}
