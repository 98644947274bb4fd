//! # Station Finder
//!
//! The station finder periodically checks which of the known docking stations can currently be
//! seen by a pose source, and publishes the list of those stations.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::Arc, time::Duration};

use comms_if::{
    eqpt::fiducial::{CoordinateTransformation, DockingStation, DockingStationList},
    net::pubsub::Publisher,
};
use log::{debug, warn};
use serde::Deserialize;

use crate::{
    bg_thread::{self, BgThread},
    pose_source::PoseSource,
};
use util::time;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publishes the list of docking stations visible to a pose source.
pub struct StationFinder {
    bg: BgThread,
}

/// Parameters of the station finder.
#[derive(Debug, Clone, Deserialize)]
pub struct StationFinderParams {
    /// Period between published station lists.
    pub publish_interval_ms: u64,

    /// Topic the station lists are published under.
    pub topic: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StationFinder {
    /// Start the station finder.
    ///
    /// Every `publish_interval` the given stations are checked against `pose_source` and the
    /// feasible ones published on `topic`, even if there are none.
    pub fn new(
        pose_source: Arc<dyn PoseSource>,
        mut publisher: Box<dyn Publisher<DockingStationList> + Send>,
        publish_interval: Duration,
        topic: String,
        stations: Arc<[DockingStation]>,
    ) -> std::io::Result<Self> {
        let bg = BgThread::spawn("station_finder", move |run| loop {
            let list = DockingStationList {
                timestamp_nanos: time::now_nanos(),
                stations: find_feasible(pose_source.as_ref(), &stations),
            };

            debug!(
                "Feasible stations: {:?}",
                list.stations.iter().map(|s| s.station_id).collect::<Vec<_>>()
            );

            if let Err(e) = publisher.publish(&topic, &list) {
                warn!("Could not publish the feasible station list: {}", e);
            }

            if !bg_thread::sleep_while_running(&run, publish_interval) {
                break;
            }
        })?;

        Ok(Self { bg })
    }

    /// Returns true until the finder has been stopped.
    pub fn is_running(&self) -> bool {
        self.bg.is_running()
    }

    /// Stop the finder and wait for its thread to exit.
    pub fn stop(&mut self) {
        self.bg.stop()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find the stations for which `pose_source` currently sees at least one fiducial.
///
/// The returned stations are copies, `stations` is left untouched.
pub fn find_feasible(pose_source: &dyn PoseSource, stations: &[DockingStation]) -> Vec<DockingStation> {
    stations
        .iter()
        .filter(|station| match pose_source.read_poses(station) {
            Some(poses) => confirms_station(station, &poses),
            None => false,
        })
        .cloned()
        .collect()
}

/// Returns true if any of `poses` was measured from one of the station's fiducials.
fn confirms_station(station: &DockingStation, poses: &[CoordinateTransformation]) -> bool {
    station.fiducials.iter().any(|fid| {
        let fid_device = &fid.transformation.source_frame.device;

        poses.iter().any(|pose| {
            let pose_device = &pose.source_frame.device;
            fid_device.name == pose_device.name
                && fid_device.serial_number == pose_device.serial_number
        })
    })
}
