//! # Rail inverse kinematics
//!
//! Geometric solver for the docking rails. Frames follow the camera's optical convention: `z`
//! forward, `x` right, `y` down.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::fiducial::CoordinateTransformation;
use serde::Deserialize;

use super::{IkSolver, RawCommand};
use crate::telem_source::TelemetryState;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RailIkParams {
    /// Lateral distance between the left and right rails.
    ///
    /// Units: meters
    pub rail_separation_m: f64,
}

pub struct RailIkSolver {
    params: RailIkParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RailIkSolver {
    pub fn new(params: RailIkParams) -> Self {
        Self { params }
    }
}

impl IkSolver for RailIkSolver {
    fn plan_to(
        &mut self,
        camera_wrt_target: &CoordinateTransformation,
        telemetry: &TelemetryState,
    ) -> RawCommand {
        // Where the target is as seen from the camera
        let target_wrt_camera = camera_wrt_target.to_isometry().inverse();
        let offset = target_wrt_camera.translation.vector;

        // Rotation about x pitches the rails, rotation about z (forward) rolls them
        let (pitch_rad, _, roll_rad) = target_wrt_camera.rotation.euler_angles();

        // Height the rails must rise by, positive roll raises the left rail
        let rise_m = -offset.y;
        let roll_rise_m = roll_rad * 0.5 * self.params.rail_separation_m;
        let left_height_m = rise_m + roll_rise_m;
        let right_height_m = rise_m - roll_rise_m;

        RawCommand {
            delta_wheel_center_x: offset.x as f32,
            delta_wheel_center_z: offset.z as f32,
            delta_left_rail_servo: pitch_rad as f32 - telemetry.left_angle.value,
            delta_right_rail_servo: pitch_rad as f32 - telemetry.right_angle.value,
            delta_left_slider: left_height_m as f32 - telemetry.left_height.value,
            delta_right_slider: right_height_m as f32 - telemetry.right_height.value,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::fiducial::{CoordinateFrame, Device};
    use nalgebra::Vector3;

    fn camera_wrt_target(translation: Vector3<f64>, rotation: Vector3<f64>) -> CoordinateTransformation {
        CoordinateTransformation {
            source_frame: CoordinateFrame::new(Device::new("dock_cam", 0)),
            target_frame: CoordinateFrame::new(Device::new("dock_target", 0)),
            translation,
            rotation,
        }
    }

    fn solver() -> RailIkSolver {
        RailIkSolver::new(RailIkParams {
            rail_separation_m: 0.4,
        })
    }

    #[test]
    fn test_target_straight_ahead() {
        let cmd = solver().plan_to(
            &camera_wrt_target(Vector3::new(0.0, 0.0, -2.0), Vector3::zeros()),
            &TelemetryState::zeroed(0),
        );

        assert!((cmd.delta_wheel_center_z - 2.0).abs() < 1e-6);
        assert!(cmd.delta_wheel_center_x.abs() < 1e-6);
        assert!(cmd.delta_left_rail_servo.abs() < 1e-6);
        assert!(cmd.delta_right_slider.abs() < 1e-6);
    }

    #[test]
    fn test_rail_deltas_relative_to_telemetry() {
        let mut telem = TelemetryState::zeroed(0);
        telem.left_angle.value = 0.1;
        telem.right_height.value = 0.05;

        // Camera sat 0.2 m below the target (y is down)
        let cmd = solver().plan_to(
            &camera_wrt_target(Vector3::new(0.0, 0.2, -1.0), Vector3::zeros()),
            &telem,
        );

        assert!((cmd.delta_left_rail_servo + 0.1).abs() < 1e-6);
        assert!(cmd.delta_right_rail_servo.abs() < 1e-6);
        assert!((cmd.delta_left_slider - 0.2).abs() < 1e-6);
        assert!((cmd.delta_right_slider - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_roll_splits_rail_heights() {
        // Camera rolled about its forward axis relative to the target
        let cmd = solver().plan_to(
            &camera_wrt_target(Vector3::new(0.0, 0.0, -1.0), Vector3::new(0.0, 0.0, -0.1)),
            &TelemetryState::zeroed(0),
        );

        assert!((cmd.delta_left_slider - 0.02).abs() < 1e-5);
        assert!((cmd.delta_right_slider + 0.02).abs() < 1e-5);
    }
}
