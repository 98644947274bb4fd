//! # Docking Controller
//!
//! The docking controller drives the vehicle onto a docking station. Each iteration of its control
//! loop:
//!
//! 1. Publishes the remaining distance to the station, finishing with success once it is within
//!    the stop criteria.
//! 2. Reads the rail telemetry (when slew control is enabled) and the station's fiducial poses.
//! 3. Finds the camera's pose relative to the station and solves the docking inverse kinematics.
//! 4. Plans a trajectory towards the resulting target point, counting consecutive planning
//!    failures while out of slew range and finishing with failure when there are too many.
//! 5. Sends an arc drive or rail control command ending in a fail-safe stop segment.
//!
//! Iterations which lack fresh data, or produce an unusable target, are skipped.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cmd;
mod params;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc, Mutex},
    thread,
    time::Duration,
};

use comms_if::eqpt::{
    dock::{DockState, DockingStatus},
    fiducial::DockingStation,
};
use log::{error, info};

use crate::bg_thread::{self, BgThread};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use cmd::{COMMAND_START_DELAY_MS, MAX_TARGET_DISTANCE_M};
pub use params::ControllerOptions;
pub use state::{Collaborators, ControlLoop, SkipReason, StepOutcome};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Pause after a skipped iteration, sources don't produce new data any faster than this.
const SKIP_BACKOFF: Duration = Duration::from_millis(1);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Clears the shared running flag when dropped, including while unwinding.
struct RunningGuard(Arc<Mutex<bool>>);

/// Handle to a running docking controller.
///
/// The control loop runs on its own thread from construction until it reaches a terminal state
/// or the controller is stopped or dropped.
pub struct DockingController {
    running: Arc<Mutex<bool>>,
    status: Arc<Mutex<Option<DockingStatus>>>,
    bg: BgThread,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No {0} pose source was provided")]
    PoseSourceMissing(&'static str),

    #[error("Could not start the control loop thread: {0}")]
    SpawnError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Drop for RunningGuard {
    fn drop(&mut self) {
        *bg_thread::lock(&self.0) = false;
    }
}

impl DockingController {
    /// Start docking with `station`.
    pub fn new(
        options: ControllerOptions,
        station: DockingStation,
        collaborators: Collaborators,
    ) -> Result<Self, ControllerError> {
        let running = Arc::new(Mutex::new(true));
        let status = Arc::new(Mutex::new(None));

        let station_id = station.station_id;
        let mut control_loop = ControlLoop::new(options, station, collaborators, status.clone())?;

        let guard = RunningGuard(running.clone());
        let bg = BgThread::spawn("docking_controller", move |run| {
            let _guard = guard;
            info!("Docking with station {} started", station_id);

            while run.load(Ordering::Relaxed) {
                let step = panic::catch_unwind(AssertUnwindSafe(|| control_loop.step()));
                let outcome = match step {
                    Ok(o) => o,
                    Err(_) => {
                        error!(
                            "Docking control loop for station {} panicked, aborting",
                            station_id
                        );
                        control_loop.abort()
                    }
                };

                match outcome {
                    StepOutcome::Finished(state) => {
                        info!("Docking with station {} finished: {:?}", station_id, state);
                        break;
                    }
                    StepOutcome::Skipped(_) => thread::sleep(SKIP_BACKOFF),
                    StepOutcome::CommandSent(_) => (),
                }
            }
        })
        .map_err(ControllerError::SpawnError)?;

        Ok(Self {
            running,
            status,
            bg,
        })
    }

    /// Returns true while the control loop is running.
    pub fn is_running(&self) -> bool {
        *bg_thread::lock(&self.running)
    }

    /// The most recently published docking status.
    pub fn status(&self) -> Option<DockingStatus> {
        *bg_thread::lock(&self.status)
    }

    /// The current docking state, `InProgress` until the loop reaches a terminal state.
    pub fn state(&self) -> DockState {
        self.status()
            .map(|s| s.status)
            .unwrap_or(DockState::InProgress)
    }

    /// Stop the control loop and wait for it to exit.
    pub fn stop(&mut self) {
        self.bg.stop();
        *bg_thread::lock(&self.running) = false;
    }
}

#[cfg(test)]
mod test {
    use super::state::test::*;
    use super::*;
    use std::time::Instant;

    fn wait_until_stopped(controller: &DockingController) {
        let start = Instant::now();
        while controller.is_running() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_controller_succeeds() {
        let mut fx = fixture(
            remaining(2.0, 0.0),
            trajectory(2),
            forward_raw(1.0),
            default_poses(),
            None,
        );

        let controller = DockingController::new(
            ControllerOptions::default(),
            default_station(),
            fx.collaborators.take().unwrap(),
        )
        .unwrap();

        assert!(controller.is_running());

        // Let some commands go out before arriving
        let start = Instant::now();
        while fx.sent.lock().unwrap().len() < 3 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
        *fx.remaining.lock().unwrap() = remaining(0.01, 0.0);

        wait_until_stopped(&controller);
        assert!(!controller.is_running());
        assert_eq!(controller.state(), DockState::Success);

        // Nothing sent once stopped
        let num_sent = fx.sent.lock().unwrap().len();
        assert!(num_sent >= 3);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(fx.sent.lock().unwrap().len(), num_sent);

        // Sequence numbers increase by one
        for (i, cmd) in fx.sent.lock().unwrap().iter().enumerate() {
            assert_eq!(cmd.sequence_number(), i as u64 + 1);
        }
    }

    /// Planner which panics once asked for a trajectory.
    struct PanickingPlanner;

    impl crate::planner::DockPlanner for PanickingPlanner {
        fn remaining_to_target(&self) -> crate::planner::Remaining {
            remaining(2.0, 0.0)
        }

        fn plan_trajectory(
            &mut self,
            _target_m: nalgebra::Vector2<f32>,
        ) -> crate::planner::Trajectory {
            panic!("planner fault");
        }
    }

    #[test]
    fn test_controller_fails_on_collaborator_panic() {
        let mut fx = fixture(
            remaining(2.0, 0.0),
            trajectory(1),
            forward_raw(1.0),
            default_poses(),
            None,
        );
        let mut collaborators = fx.collaborators.take().unwrap();
        collaborators.planner = Box::new(PanickingPlanner);

        let controller =
            DockingController::new(ControllerOptions::default(), default_station(), collaborators)
                .unwrap();

        wait_until_stopped(&controller);
        assert!(!controller.is_running());
        assert_eq!(controller.state(), DockState::Failure);

        let status = fx.status_rx.try_iter().last().unwrap().1;
        assert_eq!(status.status, DockState::Failure);
        assert_eq!(status.remaining_distance_x, 2.0);
        assert!(fx.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_controller_stop() {
        // Never able to get a trajectory but within slew range, so runs forever
        let mut fx = fixture(
            remaining(0.5, 0.0),
            trajectory(0),
            forward_raw(1.0),
            default_poses(),
            None,
        );

        let mut controller = DockingController::new(
            ControllerOptions::default(),
            default_station(),
            fx.collaborators.take().unwrap(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(controller.is_running());
        assert_eq!(controller.state(), DockState::InProgress);

        controller.stop();
        assert!(!controller.is_running());
    }
}
