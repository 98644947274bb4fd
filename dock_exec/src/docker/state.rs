//! Docking control loop state

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::{
    eqpt::{
        dock::{CommandErrorCode, DockState, DockingStatus, VehicleCommand},
        fiducial::{CoordinateTransformation, DockingStation},
    },
    net::pubsub::Publisher,
};
use log::{debug, info, trace, warn};

use super::{cmd, ControllerError, ControllerOptions};
use crate::{
    bg_thread,
    cmd_client::CommandTransport,
    planner::{DockPlanner, IkSolver, Remaining},
    pose_source::PoseSource,
    telem_source::{TelemetrySource, TelemetryState, TELEMETRY_FRESHNESS_WINDOW_MS},
};
use util::time;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Everything the docking controller talks to.
pub struct Collaborators {
    /// Source of ground truth fiducial poses, required if `use_ground_truth_fiducials` is set.
    pub ground_truth_source: Option<Arc<dyn PoseSource>>,

    /// Source of detected fiducial poses, required if `use_ground_truth_fiducials` is not set.
    pub detector_source: Option<Arc<dyn PoseSource>>,

    pub telem_source: Arc<dyn TelemetrySource>,
    pub planner: Box<dyn DockPlanner + Send>,
    pub ik_solver: Box<dyn IkSolver + Send>,
    pub cmd_transport: Box<dyn CommandTransport + Send>,
    pub status_publisher: Box<dyn Publisher<DockingStatus> + Send>,
}

/// The docking control loop, advanced one iteration at a time by [`ControlLoop::step`].
pub struct ControlLoop {
    options: ControllerOptions,
    station: DockingStation,

    pose_source: Arc<dyn PoseSource>,
    telem_source: Arc<dyn TelemetrySource>,
    planner: Box<dyn DockPlanner + Send>,
    ik_solver: Box<dyn IkSolver + Send>,
    cmd_transport: Box<dyn CommandTransport + Send>,
    status_publisher: Box<dyn Publisher<DockingStatus> + Send>,

    /// Last published status, shared with the controller handle.
    status: Arc<Mutex<Option<DockingStatus>>>,

    /// Sequence number of the last emitted command.
    sequence_number: u64,

    /// Number of consecutive iterations in which no trajectory could be planned while out of slew
    /// range.
    num_consecutive_failures: u32,

    /// Remaining distance reported at the start of the latest iteration.
    last_remaining: Option<Remaining>,

    state: DockState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of a single control loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The iteration ended early without sending a command.
    Skipped(SkipReason),

    /// A command with the given sequence number was sent.
    CommandSent(u64),

    /// The loop reached a terminal state and must not be stepped again.
    Finished(DockState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TelemetryUnavailable,
    PosesUnavailable,
    NoMatchingFiducial,
    NonPositiveForward,

    /// No command could be built, either nothing to do or unschedulable segment times.
    NothingToCommand,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlLoop {
    /// Create a new control loop docking with `station`.
    pub fn new(
        options: ControllerOptions,
        station: DockingStation,
        collaborators: Collaborators,
        status: Arc<Mutex<Option<DockingStatus>>>,
    ) -> Result<Self, ControllerError> {
        let pose_source = if options.use_ground_truth_fiducials {
            collaborators
                .ground_truth_source
                .ok_or(ControllerError::PoseSourceMissing("ground truth"))?
        } else {
            collaborators
                .detector_source
                .ok_or(ControllerError::PoseSourceMissing("detector"))?
        };

        Ok(Self {
            options,
            station,
            pose_source,
            telem_source: collaborators.telem_source,
            planner: collaborators.planner,
            ik_solver: collaborators.ik_solver,
            cmd_transport: collaborators.cmd_transport,
            status_publisher: collaborators.status_publisher,
            status,
            sequence_number: 0,
            num_consecutive_failures: 0,
            last_remaining: None,
            state: DockState::InProgress,
        })
    }

    pub fn state(&self) -> DockState {
        self.state
    }

    /// Run one iteration of the control loop.
    pub fn step(&mut self) -> StepOutcome {
        if self.state.is_terminal() {
            return StepOutcome::Finished(self.state);
        }

        // ---- REMAINING DISTANCE ----

        let remaining = self.planner.remaining_to_target();
        self.last_remaining = Some(remaining);
        self.publish_status(remaining, DockState::InProgress);

        let remaining_distance = remaining.distance();
        if remaining_distance < self.options.stop_criteria_remaining_distance {
            info!(
                "Docked with station {}, {:.3} m remaining",
                self.station.station_id, remaining_distance
            );
            return self.finish(remaining, DockState::Success);
        }

        // ---- INPUTS ----

        let telemetry = if self.options.slew_control {
            match self
                .telem_source
                .read_telemetry(time::millis_to_nanos(TELEMETRY_FRESHNESS_WINDOW_MS))
            {
                Some(t) => t,
                None => return self.skip(SkipReason::TelemetryUnavailable),
            }
        } else {
            TelemetryState::zeroed(time::now_nanos())
        };

        let poses = match self.pose_source.read_poses(&self.station) {
            Some(p) if !p.is_empty() => p,
            _ => return self.skip(SkipReason::PosesUnavailable),
        };

        let camera_wrt_target = match self.camera_wrt_target(&poses) {
            Some(t) => t,
            None => return self.skip(SkipReason::NoMatchingFiducial),
        };

        // ---- PLANNING ----

        let raw = self.ik_solver.plan_to(&camera_wrt_target, &telemetry);
        trace!("IK output: {:?}", raw);

        // NaN forward distances skip too
        if !(raw.delta_wheel_center_z > 0.0) {
            return self.skip(SkipReason::NonPositiveForward);
        }

        let trajectory = self.planner.plan_trajectory(cmd::clamp_target(&raw));

        let within_slew_range = remaining_distance <= self.options.max_distance_to_control_slew;

        if !within_slew_range && trajectory.is_empty() {
            self.num_consecutive_failures += 1;
            warn!(
                "No trajectory to station {} ({} consecutive failures)",
                self.station.station_id, self.num_consecutive_failures
            );

            if self.num_consecutive_failures >= self.options.max_consecutive_failures {
                warn!(
                    "Docking with station {} failed, no trajectory in {} attempts",
                    self.station.station_id, self.num_consecutive_failures
                );
                return self.finish(remaining, DockState::Failure);
            }
        } else {
            self.num_consecutive_failures = 0;
        }

        // ---- COMMANDING ----

        let sequence_number = self.sequence_number + 1;
        let now = time::now_nanos();

        let command = if self.options.slew_control {
            cmd::build_rail_control_command(
                sequence_number,
                &trajectory,
                &raw,
                within_slew_range,
                &self.options,
                now,
            )
        } else {
            cmd::build_arc_drive_command(sequence_number, &trajectory, &self.options, now)
        };

        match command {
            Some(c) => {
                self.sequence_number = sequence_number;
                self.send_command(&c);
                StepOutcome::CommandSent(sequence_number)
            }
            None => self.skip(SkipReason::NothingToCommand),
        }
    }

    /// Pose of the camera relative to the station.
    ///
    /// Only the last pose with a matching station fiducial is used, poses of several markers are
    /// not fused.
    fn camera_wrt_target(&self, poses: &[CoordinateTransformation]) -> Option<CoordinateTransformation> {
        poses
            .iter()
            .filter_map(|pose| {
                self.station
                    .fiducial_for_device(&pose.source_frame.device)
                    .map(|fid| fid.transformation.compose(&pose.inverse()))
            })
            .last()
    }

    /// End docking with failure after an iteration could not complete.
    ///
    /// The latest remaining distance is reported, or zeros if none was ever read.
    pub fn abort(&mut self) -> StepOutcome {
        if self.state.is_terminal() {
            return StepOutcome::Finished(self.state);
        }

        let remaining = self.last_remaining.unwrap_or(Remaining {
            distance_x: 0.0,
            distance_y: 0.0,
            angle: 0.0,
        });
        self.finish(remaining, DockState::Failure)
    }

    fn send_command(&mut self, command: &VehicleCommand) {
        if let Err(e) = command.validate() {
            warn!(
                "Command {} failed validation: {}",
                command.sequence_number(),
                e
            );
        }

        match self.cmd_transport.send_command(command) {
            Ok(r) if r.error_code == CommandErrorCode::Ok => {
                debug!("Command {} accepted", r.sequence_number)
            }
            Ok(r) => warn!(
                "Command {} rejected by the vehicle: {:?}",
                r.sequence_number, r.error_code
            ),
            Err(e) => warn!(
                "Could not send command {}: {}",
                command.sequence_number(),
                e
            ),
        }
    }

    fn skip(&self, reason: SkipReason) -> StepOutcome {
        trace!("Control iteration skipped: {:?}", reason);
        StepOutcome::Skipped(reason)
    }

    fn finish(&mut self, remaining: Remaining, state: DockState) -> StepOutcome {
        self.state = state;
        self.publish_status(remaining, state);
        StepOutcome::Finished(state)
    }

    fn publish_status(&mut self, remaining: Remaining, state: DockState) {
        let status = DockingStatus {
            remaining_distance_x: remaining.distance_x,
            remaining_distance_y: remaining.distance_y,
            remaining_angle: remaining.angle,
            status: state,
        };

        if let Err(e) = self
            .status_publisher
            .publish(&self.options.status_topic, &status)
        {
            warn!("Could not publish the docking status: {}", e);
        }

        *bg_thread::lock(&self.status) = Some(status);
    }
}
