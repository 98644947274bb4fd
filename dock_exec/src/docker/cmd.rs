//! # Docking command construction
//!
//! Every command built here ends with a fail-safe stop segment starting
//! `last_command_period_ms` after the command's first segment. If the vehicle receives no further
//! command it comes to rest at that time.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::dock::{ArcDriveSegment, RailControlSegment, VehicleCommand};
use nalgebra::Vector2;

use super::ControllerOptions;
use crate::planner::{RawCommand, Trajectory};
use util::time;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Delay between building a command and its first segment starting, leaving time for the command
/// to reach the vehicle.
pub const COMMAND_START_DELAY_MS: u64 = 10;

/// Targets further ahead than this are pulled in to this distance before planning.
///
/// Units: meters
pub const MAX_TARGET_DISTANCE_M: f32 = 5.0;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Target point for the planner, as `(forward, lateral)`, from the IK output.
///
/// Both axes are scaled down together so the forward distance is at most
/// [`MAX_TARGET_DISTANCE_M`].
pub fn clamp_target(raw: &RawCommand) -> Vector2<f32> {
    let forward = raw.delta_wheel_center_z;
    let scale = (MAX_TARGET_DISTANCE_M / forward.abs()).min(1.0);

    Vector2::new(forward * scale, raw.delta_wheel_center_x * scale)
}

/// Build an arc drive command following the trajectory.
///
/// Returns `None` if the trajectory is empty or a segment start time can't be represented.
pub fn build_arc_drive_command(
    sequence_number: u64,
    trajectory: &Trajectory,
    options: &ControllerOptions,
    now_nanos: u64,
) -> Option<VehicleCommand> {
    let mut segments: Vec<ArcDriveSegment> = trajectory
        .elements
        .iter()
        .map(|e| {
            Some(ArcDriveSegment {
                curvature_inverse_m: e.curvature,
                linear_velocity_mps: options.velocity_alpha * e.linear_velocity,
                target_start_time_nanos: segment_start(now_nanos, e.relative_time_s)?,
            })
        })
        .collect::<Option<_>>()?;

    let first = *segments.first()?;

    segments.push(ArcDriveSegment {
        curvature_inverse_m: first.curvature_inverse_m,
        linear_velocity_mps: 0.0,
        target_start_time_nanos: stop_time(first.target_start_time_nanos, options)?,
    });

    Some(VehicleCommand::ArcDrive {
        sequence_number,
        segments,
    })
}

/// Build a rail control command.
///
/// Segments follow the trajectory if there is one, with the rails held while the target is out of
/// slew range. With no trajectory but within slew range a single segment moves only the rails.
/// Returns `None` if there is neither a trajectory nor anything to slew, or if a segment start
/// time can't be represented.
pub fn build_rail_control_command(
    sequence_number: u64,
    trajectory: &Trajectory,
    raw: &RawCommand,
    within_slew_range: bool,
    options: &ControllerOptions,
    now_nanos: u64,
) -> Option<VehicleCommand> {
    let rails = if within_slew_range {
        *raw
    } else {
        RawCommand::default()
    };

    let mut segments: Vec<RailControlSegment> = if !trajectory.is_empty() {
        trajectory
            .elements
            .iter()
            .map(|e| {
                Some(rail_segment(
                    ArcDriveSegment {
                        curvature_inverse_m: e.curvature,
                        linear_velocity_mps: options.velocity_alpha * e.linear_velocity,
                        target_start_time_nanos: segment_start(now_nanos, e.relative_time_s)?,
                    },
                    &rails,
                ))
            })
            .collect::<Option<_>>()?
    } else if within_slew_range {
        vec![rail_segment(
            ArcDriveSegment {
                curvature_inverse_m: 0.0,
                linear_velocity_mps: 0.0,
                target_start_time_nanos: segment_start(now_nanos, 0.0)?,
            },
            raw,
        )]
    } else {
        return None;
    };

    let first_start = segments.first()?.drive.target_start_time_nanos;
    segments.push(RailControlSegment::stop(stop_time(first_start, options)?));

    Some(VehicleCommand::RailControl {
        sequence_number,
        segments,
    })
}

fn rail_segment(drive: ArcDriveSegment, rails: &RawCommand) -> RailControlSegment {
    RailControlSegment {
        drive,
        left_rail_pitch: rails.delta_left_rail_servo,
        right_rail_pitch: rails.delta_right_rail_servo,
        left_rail_elevation: rails.delta_left_slider,
        right_rail_elevation: rails.delta_right_slider,
    }
}

/// Absolute start time of a trajectory element, `None` if it overflows.
fn segment_start(now_nanos: u64, relative_time_s: f32) -> Option<u64> {
    now_nanos
        .checked_add(time::seconds_to_nanos(relative_time_s as f64))?
        .checked_add(time::millis_to_nanos(COMMAND_START_DELAY_MS))
}

fn stop_time(first_start_nanos: u64, options: &ControllerOptions) -> Option<u64> {
    first_start_nanos.checked_add(time::millis_to_nanos(options.last_command_period_ms))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::planner::TrajectoryElement;

    const NOW: u64 = 5_000_000_000;

    fn trajectory(n: usize) -> Trajectory {
        Trajectory {
            elements: (0..n)
                .map(|i| TrajectoryElement {
                    curvature: 0.2,
                    linear_velocity: 0.4,
                    relative_time_s: i as f32 * 0.1,
                })
                .collect(),
        }
    }

    fn raw() -> RawCommand {
        RawCommand {
            delta_wheel_center_x: 0.1,
            delta_wheel_center_z: 0.8,
            delta_left_rail_servo: 0.01,
            delta_right_rail_servo: 0.02,
            delta_left_slider: 0.03,
            delta_right_slider: 0.04,
        }
    }

    #[test]
    fn test_clamp_target() {
        let mut r = raw();
        assert_eq!(clamp_target(&r), Vector2::new(0.8, 0.1));

        r.delta_wheel_center_z = 10.0;
        r.delta_wheel_center_x = 2.0;
        assert_eq!(clamp_target(&r), Vector2::new(5.0, 1.0));
    }

    #[test]
    fn test_arc_drive_command() {
        let options = ControllerOptions {
            velocity_alpha: 0.5,
            last_command_period_ms: 500,
            ..Default::default()
        };

        let cmd = build_arc_drive_command(7, &trajectory(3), &options, NOW).unwrap();
        assert_eq!(cmd.validate(), Ok(()));
        assert_eq!(cmd.sequence_number(), 7);

        let segs = cmd.drive_segments();
        assert_eq!(segs.len(), 4);
        assert_eq!(segs[0].target_start_time_nanos, NOW + 10_000_000);
        assert_eq!(segs[0].linear_velocity_mps, 0.2);

        let stop = segs[3];
        assert_eq!(stop.linear_velocity_mps, 0.0);
        assert_eq!(stop.curvature_inverse_m, 0.2);
        assert_eq!(
            stop.target_start_time_nanos,
            segs[0].target_start_time_nanos + 500_000_000
        );

        assert!(build_arc_drive_command(8, &Trajectory::default(), &options, NOW).is_none());
    }

    #[test]
    fn test_unrepresentable_start_times() {
        let options = ControllerOptions::default();

        let mut far = trajectory(2);
        far.elements[1].relative_time_s = 1e12;

        assert!(build_arc_drive_command(1, &far, &options, NOW).is_none());
        assert!(build_rail_control_command(1, &far, &raw(), true, &options, NOW).is_none());

        // Stop segment past the end of time
        let options = ControllerOptions {
            last_command_period_ms: u64::MAX,
            ..Default::default()
        };
        assert!(build_arc_drive_command(1, &trajectory(1), &options, NOW).is_none());
        assert!(
            build_rail_control_command(1, &Trajectory::default(), &raw(), true, &options, NOW)
                .is_none()
        );
    }

    #[test]
    fn test_rail_control_out_of_slew_range() {
        let options = ControllerOptions::default();

        let cmd =
            build_rail_control_command(1, &trajectory(2), &raw(), false, &options, NOW).unwrap();
        assert_eq!(cmd.validate(), Ok(()));

        match cmd {
            VehicleCommand::RailControl { segments, .. } => {
                assert_eq!(segments.len(), 3);
                assert_eq!(segments[0].left_rail_pitch, 0.0);
                assert_eq!(segments[1].right_rail_elevation, 0.0);
                assert_eq!(segments[1].drive.linear_velocity_mps, 0.4);
                assert_eq!(segments[2], RailControlSegment::stop(NOW + 510_000_000));
            }
            _ => panic!("Expected a rail control command"),
        }

        // Nothing to do
        assert!(
            build_rail_control_command(1, &Trajectory::default(), &raw(), false, &options, NOW)
                .is_none()
        );
    }

    #[test]
    fn test_rail_control_in_slew_range() {
        let options = ControllerOptions::default();

        let cmd = build_rail_control_command(2, &trajectory(1), &raw(), true, &options, NOW)
            .unwrap();
        match cmd {
            VehicleCommand::RailControl { segments, .. } => {
                assert_eq!(segments[0].left_rail_pitch, 0.01);
                assert_eq!(segments[0].right_rail_elevation, 0.04);
            }
            _ => panic!("Expected a rail control command"),
        }

        // Rails only
        let cmd =
            build_rail_control_command(3, &Trajectory::default(), &raw(), true, &options, NOW)
                .unwrap();
        assert_eq!(cmd.validate(), Ok(()));
        match cmd {
            VehicleCommand::RailControl { segments, .. } => {
                assert_eq!(segments.len(), 2);
                assert_eq!(segments[0].drive.linear_velocity_mps, 0.0);
                assert_eq!(segments[0].drive.curvature_inverse_m, 0.0);
                assert_eq!(segments[0].left_rail_elevation, 0.03);
            }
            _ => panic!("Expected a rail control command"),
        }
    }
}
