//! # Pose Sources
//!
//! A pose source provides the poses of fiducial markers relative to the vehicle's camera. Each
//! source owns a background listener which caches the most recent [`PoseSample`], and answers
//! queries for the poses belonging to a particular docking station.
//!
//! Two sources are provided:
//!
//! - [`GroundTruthPoseSource`] - receives already computed pose samples, for example from a
//!   simulator. Each sample is handed off once, reading it clears the cache.
//! - [`DetectorPoseSource`] - receives raw camera frames and runs a [`MarkerDetector`] on each of
//!   them. The latest detector output is kept until it is overwritten.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod detector;
mod ground_truth;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::fiducial::{CoordinateTransformation, DockingStation, PoseSample};
use log::trace;

use util::time;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use detector::{DetectorPoseSource, MarkerDetector};
pub use ground_truth::GroundTruthPoseSource;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum age of a cached pose sample which can still be returned by a query.
pub const POSE_FRESHNESS_WINDOW_MS: u64 = 100;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Provides camera relative fiducial poses for a docking station.
///
/// Sources are shared between the station finder and the docking controller, so queries take
/// `&self` and implementors synchronise their own caches.
pub trait PoseSource: Send + Sync {
    /// Get the cached poses of the given station's fiducials.
    ///
    /// Returns `None` if no sample has been received or the cached sample is older than
    /// [`POSE_FRESHNESS_WINDOW_MS`]. Otherwise returns the transformations whose source device
    /// is one of the station's fiducials, which may be empty.
    fn read_poses(&self, station: &DockingStation) -> Option<Vec<CoordinateTransformation>>;
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Returns true if `sample` is young enough to be used at `now_nanos`.
pub(crate) fn sample_is_fresh(sample: &PoseSample, now_nanos: u64) -> bool {
    let fresh = time::is_fresh(
        sample.system_timestamp_nanos,
        now_nanos,
        time::millis_to_nanos(POSE_FRESHNESS_WINDOW_MS),
    );

    if !fresh {
        trace!(
            "Pose sample from {} ns is stale at {} ns",
            sample.system_timestamp_nanos,
            now_nanos
        );
    }

    fresh
}

/// Select the transformations in `sample` whose source device is a fiducial of `station`.
pub(crate) fn filter_for_station(
    sample: &PoseSample,
    station: &DockingStation,
) -> Vec<CoordinateTransformation> {
    sample
        .transformations
        .iter()
        .filter(|t| station.has_fiducial_device(&t.source_frame.device))
        .cloned()
        .collect()
}

/// Apply the freshness check and station filter to an optional cached sample.
pub(crate) fn poses_from_sample(
    sample: Option<&PoseSample>,
    station: &DockingStation,
    now_nanos: u64,
) -> Option<Vec<CoordinateTransformation>> {
    match sample {
        Some(s) if sample_is_fresh(s, now_nanos) => Some(filter_for_station(s, station)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use comms_if::eqpt::fiducial::{
        CoordinateFrame, CoordinateTransformation, Device, DockingStation, DockingStationFiducial,
        FiducialConfiguration, StationType,
    };
    use nalgebra::Vector3;

    pub fn camera_frame() -> CoordinateFrame {
        CoordinateFrame::new(Device::new("dock_cam", 0))
    }

    pub fn station_frame(station_id: i32) -> CoordinateFrame {
        CoordinateFrame::new(Device::new("station", station_id as u64))
    }

    /// Pose of the given marker seen `range_m` ahead of the camera.
    pub fn marker_pose(name: &str, serial: u64, range_m: f64) -> CoordinateTransformation {
        CoordinateTransformation {
            source_frame: CoordinateFrame::new(Device::new(name, serial)),
            target_frame: camera_frame(),
            translation: Vector3::new(range_m, 0.0, 0.0),
            rotation: Vector3::zeros(),
        }
    }

    /// A station with one marker per `(name, serial)` pair, each sat on the station's origin.
    pub fn station(station_id: i32, markers: &[(&str, u64)]) -> DockingStation {
        DockingStation {
            station_id,
            station_type: StationType::Charger,
            fiducials: markers
                .iter()
                .map(|(name, serial)| DockingStationFiducial {
                    configuration: FiducialConfiguration {
                        family: "tag36h11".into(),
                        border_width: 1,
                        side_length_m: 0.16,
                    },
                    transformation: CoordinateTransformation::identity(
                        CoordinateFrame::new(Device::new(*name, *serial)),
                        station_frame(station_id),
                    ),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::test_util::*;
    use super::*;
    use comms_if::eqpt::fiducial::Device;
    use util::time::millis_to_nanos;

    const NOW: u64 = 1_000_000_000_000;

    fn sample(age_ms: u64, poses: Vec<CoordinateTransformation>) -> PoseSample {
        PoseSample {
            system_timestamp_nanos: NOW - millis_to_nanos(age_ms),
            transformations: poses,
        }
    }

    #[test]
    fn test_fresh_matching_pose_returned() {
        let station = station(1, &[("AprilTag36h11", 7)]);
        let s = sample(10, vec![marker_pose("AprilTag36h11", 7, 2.0)]);

        let poses = poses_from_sample(Some(&s), &station, NOW).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].source_frame.device.serial_number, 7);
    }

    #[test]
    fn test_stale_sample_rejected() {
        let station = station(1, &[("AprilTag36h11", 7)]);
        let s = sample(200, vec![marker_pose("AprilTag36h11", 7, 2.0)]);

        assert!(poses_from_sample(Some(&s), &station, NOW).is_none());
        assert!(poses_from_sample(None, &station, NOW).is_none());

        // Exactly on the window is still fresh
        let edge = sample(POSE_FRESHNESS_WINDOW_MS, vec![]);
        assert!(sample_is_fresh(&edge, NOW));
    }

    #[test]
    fn test_non_matching_poses_filtered() {
        let station = station(1, &[("AprilTag36h11", 7), ("AprilTag36h11", 8)]);
        let s = sample(
            0,
            vec![
                marker_pose("AprilTag36h11", 8, 1.0),
                // Same name different serial
                marker_pose("AprilTag36h11", 9, 1.0),
                // Same serial different name
                marker_pose("AprilTag25h9", 7, 1.0),
            ],
        );

        let poses = poses_from_sample(Some(&s), &station, NOW).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].source_frame.device, Device::new("AprilTag36h11", 8));
    }

    #[test]
    fn test_fresh_but_unmatched_is_empty() {
        let station = station(1, &[("AprilTag36h11", 7)]);
        let s = sample(0, vec![marker_pose("AprilTag36h11", 3, 1.0)]);

        assert_eq!(poses_from_sample(Some(&s), &station, NOW), Some(vec![]));
    }
}
