//! # Docking Planner Interfaces
//!
//! The docking controller depends on two planning collaborators:
//!
//! - A [`DockPlanner`], which knows how far the vehicle still is from the docking target and
//!   plans arc trajectories to target points.
//! - An [`IkSolver`], which turns the camera's pose relative to the docking target, and the
//!   current rail telemetry, into wheel-centre offsets and rail deltas.
//!
//! Reference implementations of both are provided by [`ArcPlanner`] and [`RailIkSolver`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod arc_planner;
mod rail_ik;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::fiducial::CoordinateTransformation;
use nalgebra::Vector2;

use crate::telem_source::TelemetryState;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use arc_planner::{ArcPlanner, ArcPlannerParams};
pub use rail_ik::{RailIkParams, RailIkSolver};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Plans the vehicle's path to the docking target.
pub trait DockPlanner {
    /// Distance and angle remaining to the docking target.
    fn remaining_to_target(&self) -> Remaining;

    /// Plan a trajectory to the given target point.
    ///
    /// The target is given in the vehicle frame as `(forward, lateral)` in meters. An empty
    /// trajectory means no path could be planned.
    fn plan_trajectory(&mut self, target_m: Vector2<f32>) -> Trajectory;
}

/// Solves the docking inverse kinematics.
pub trait IkSolver {
    /// Compute the offsets needed to bring the camera onto the docking target.
    fn plan_to(
        &mut self,
        camera_wrt_target: &CoordinateTransformation,
        telemetry: &TelemetryState,
    ) -> RawCommand;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Remaining offset to the docking target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Remaining {
    /// Units: meters
    pub distance_x: f32,

    /// Units: meters
    pub distance_y: f32,

    /// Units: radians
    pub angle: f32,
}

/// One constant-curvature element of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryElement {
    /// Units: 1/meters
    pub curvature: f32,

    /// Units: meters/second
    pub linear_velocity: f32,

    /// Start of this element relative to the start of the trajectory.
    ///
    /// Units: seconds
    pub relative_time_s: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub elements: Vec<TrajectoryElement>,
}

/// Output of the inverse kinematics solver.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawCommand {
    /// Lateral offset of the wheel centre to the target.
    ///
    /// Units: meters
    pub delta_wheel_center_x: f32,

    /// Forward offset of the wheel centre to the target.
    ///
    /// Units: meters
    pub delta_wheel_center_z: f32,

    /// Units: radians
    pub delta_left_rail_servo: f32,

    /// Units: radians
    pub delta_right_rail_servo: f32,

    /// Units: meters
    pub delta_left_slider: f32,

    /// Units: meters
    pub delta_right_slider: f32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Remaining {
    /// Straight line distance to the target.
    pub fn distance(&self) -> f32 {
        self.distance_x.hypot(self.distance_y)
    }
}

impl Trajectory {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
