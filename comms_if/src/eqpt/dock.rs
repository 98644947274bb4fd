//! # Docking Equipment Communications Module
//!
//! Messages exchanged between the docking controller, the docking mechanism, and the vehicle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry message published by the docking mechanism.
///
/// A message only carries the fields which were measured, unset fields must leave the receiver's
/// previous values untouched.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct TelemetryMsg {
    /// Wall clock time (nanoseconds since the unix epoch) at which the values were measured.
    pub timestamp_nanos: u64,

    /// Units: radians
    pub left_angle: Option<f32>,

    /// Units: radians
    pub right_angle: Option<f32>,

    /// Units: meters
    pub left_height: Option<f32>,

    /// Units: meters
    pub right_height: Option<f32>,
}

/// Status of a docking attempt, published once per control iteration.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct DockingStatus {
    /// Units: meters
    pub remaining_distance_x: f32,

    /// Units: meters
    pub remaining_distance_y: f32,

    /// Units: radians
    pub remaining_angle: f32,

    pub status: DockState,
}

/// One segment of an arc-drive trajectory.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ArcDriveSegment {
    /// Curvature (1/radius) of the arc.
    ///
    /// Units: 1/meters
    pub curvature_inverse_m: f32,

    /// Units: meters/second
    pub linear_velocity_mps: f32,

    /// Wall clock time (nanoseconds since the unix epoch) at which the segment shall start.
    pub target_start_time_nanos: u64,
}

/// One segment of an IK rail-control command.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RailControlSegment {
    #[serde(flatten)]
    pub drive: ArcDriveSegment,

    /// Units: radians
    pub left_rail_pitch: f32,

    /// Units: radians
    pub right_rail_pitch: f32,

    /// Units: meters
    pub left_rail_elevation: f32,

    /// Units: meters
    pub right_rail_elevation: f32,
}

/// Response from the vehicle to a command.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CommandResponse {
    /// Sequence number of the command this is a response to
    pub sequence_number: u64,

    pub error_code: CommandErrorCode,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Docking attempt state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DockState {
    InProgress,
    Success,
    Failure,
}

/// A command for the vehicle. Segments are executed in order at their target start times.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum VehicleCommand {
    /// Drive along a sequence of arcs.
    ArcDrive {
        sequence_number: u64,
        segments: Vec<ArcDriveSegment>,
    },

    /// Drive along a sequence of arcs while slewing the docking rails.
    RailControl {
        sequence_number: u64,
        segments: Vec<RailControlSegment>,
    },
}

/// Disposition of a command reported by the vehicle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorCode {
    /// Command was valid and will be executed
    Ok,

    /// Command was structurally invalid and has been rejected
    InvalidCommand,

    /// Command arrived after its first segment's start time
    StaleCommand,

    /// Equipment is invalid so the command cannot be actuated
    EqptInvalid,
}

/// Structural problems found in a command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandValidationError {
    #[error("The command contains no segments")]
    NoSegments,

    #[error("Segment {0} contains a non-finite value")]
    NonFiniteValue(usize),

    #[error("Segment {0} does not start after segment {1}")]
    StartTimeNotIncreasing(usize, usize),

    #[error("The final segment has a non-zero velocity ({0} m/s)")]
    FinalSegmentMoving(f32),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DockState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DockState::InProgress)
    }
}

impl RailControlSegment {
    /// Segment which holds the rails still and stops the vehicle at the given time.
    pub fn stop(target_start_time_nanos: u64) -> Self {
        Self {
            drive: ArcDriveSegment {
                curvature_inverse_m: 0.0,
                linear_velocity_mps: 0.0,
                target_start_time_nanos,
            },
            left_rail_pitch: 0.0,
            right_rail_pitch: 0.0,
            left_rail_elevation: 0.0,
            right_rail_elevation: 0.0,
        }
    }

    fn is_finite(&self) -> bool {
        self.drive.is_finite()
            && self.left_rail_pitch.is_finite()
            && self.right_rail_pitch.is_finite()
            && self.left_rail_elevation.is_finite()
            && self.right_rail_elevation.is_finite()
    }
}

impl ArcDriveSegment {
    fn is_finite(&self) -> bool {
        self.curvature_inverse_m.is_finite() && self.linear_velocity_mps.is_finite()
    }
}

impl VehicleCommand {
    pub fn sequence_number(&self) -> u64 {
        match self {
            VehicleCommand::ArcDrive {
                sequence_number, ..
            } => *sequence_number,
            VehicleCommand::RailControl {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    pub fn num_segments(&self) -> usize {
        match self {
            VehicleCommand::ArcDrive { segments, .. } => segments.len(),
            VehicleCommand::RailControl { segments, .. } => segments.len(),
        }
    }

    /// The drive part of every segment, in order.
    pub fn drive_segments(&self) -> Vec<ArcDriveSegment> {
        match self {
            VehicleCommand::ArcDrive { segments, .. } => segments.clone(),
            VehicleCommand::RailControl { segments, .. } => {
                segments.iter().map(|s| s.drive).collect()
            }
        }
    }

    /// Check the structure of the command.
    ///
    /// A valid command has at least one segment, only finite values, start times which strictly
    /// increase after the first segment, and a final segment with zero velocity.
    pub fn validate(&self) -> Result<(), CommandValidationError> {
        let finite: Vec<bool> = match self {
            VehicleCommand::ArcDrive { segments, .. } => {
                segments.iter().map(ArcDriveSegment::is_finite).collect()
            }
            VehicleCommand::RailControl { segments, .. } => {
                segments.iter().map(RailControlSegment::is_finite).collect()
            }
        };
        if let Some(i) = finite.iter().position(|f| !f) {
            return Err(CommandValidationError::NonFiniteValue(i));
        }

        let drive = self.drive_segments();

        let last = match drive.last() {
            Some(s) => s,
            None => return Err(CommandValidationError::NoSegments),
        };

        for i in 1..drive.len() {
            if drive[i].target_start_time_nanos <= drive[i - 1].target_start_time_nanos {
                return Err(CommandValidationError::StartTimeNotIncreasing(i, i - 1));
            }
        }

        if last.linear_velocity_mps != 0.0 {
            return Err(CommandValidationError::FinalSegmentMoving(
                last.linear_velocity_mps,
            ));
        }

        Ok(())
    }
}
