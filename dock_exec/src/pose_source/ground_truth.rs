//! # Ground Truth Pose Source
//!
//! Receives pose samples which have already been computed elsewhere, for example the true marker
//! poses reported by a simulator.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::{
    eqpt::fiducial::{CoordinateTransformation, DockingStation, PoseSample},
    net::pubsub::Subscriber,
};
use log::trace;

use super::{poses_from_sample, sample_is_fresh, PoseSource};
use crate::bg_thread::{self, BgThread};
use util::time;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pose source fed directly with [`PoseSample`]s.
///
/// A sample is handed off once: the first query which finds it fresh also removes it from the
/// cache.
pub struct GroundTruthPoseSource {
    latest: Arc<Mutex<Option<PoseSample>>>,
    _bg: BgThread,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GroundTruthPoseSource {
    /// Start listening for pose samples on the given subscriber.
    pub fn new(mut subscriber: Box<dyn Subscriber<PoseSample> + Send>) -> std::io::Result<Self> {
        let latest = Arc::new(Mutex::new(None));
        let latest_clone = latest.clone();

        let bg = BgThread::spawn("gt_pose_source", move |run| {
            bg_thread::listen("Ground truth pose", subscriber.as_mut(), &run, |sample| {
                trace!(
                    "Received {} ground truth poses",
                    sample.transformations.len()
                );
                *bg_thread::lock(&latest_clone) = Some(sample);
            })
        })?;

        Ok(Self { latest, _bg: bg })
    }
}

impl PoseSource for GroundTruthPoseSource {
    fn read_poses(&self, station: &DockingStation) -> Option<Vec<CoordinateTransformation>> {
        let mut latest = bg_thread::lock(&self.latest);
        let now = time::now_nanos();

        // Only a fresh sample is consumed, a stale one is left to be overwritten
        let sample = match latest.as_ref() {
            Some(s) if sample_is_fresh(s, now) => latest.take(),
            _ => None,
        };

        poses_from_sample(sample.as_ref(), station, now)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pose_source::test_util::*;
    use comms_if::net::pubsub::ChannelSubscriber;
    use std::{
        sync::mpsc::channel,
        thread,
        time::{Duration, Instant},
    };
    use util::time::millis_to_nanos;

    /// Poll the source until it returns something or a second has passed.
    fn wait_for_poses(
        source: &dyn PoseSource,
        station: &DockingStation,
    ) -> Option<Vec<CoordinateTransformation>> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            if let Some(p) = source.read_poses(station) {
                return Some(p);
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_sample_handed_off_once() {
        let (tx, rx) = channel();
        let source =
            GroundTruthPoseSource::new(Box::new(ChannelSubscriber::new(rx, Duration::from_millis(1))))
                .unwrap();
        let station = station(4, &[("AprilTag36h11", 7)]);

        // Nothing received yet
        assert!(source.read_poses(&station).is_none());

        tx.send(PoseSample {
            system_timestamp_nanos: time::now_nanos(),
            transformations: vec![marker_pose("AprilTag36h11", 7, 1.5)],
        })
        .unwrap();

        let poses = wait_for_poses(&source, &station).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].translation.x, 1.5);

        // The sample was consumed by the first read
        assert!(source.read_poses(&station).is_none());
    }

    #[test]
    fn test_stale_sample_ignored() {
        let (tx, rx) = channel();
        let source =
            GroundTruthPoseSource::new(Box::new(ChannelSubscriber::new(rx, Duration::from_millis(1))))
                .unwrap();
        let station = station(4, &[("AprilTag36h11", 7)]);

        tx.send(PoseSample {
            system_timestamp_nanos: time::now_nanos() - millis_to_nanos(200),
            transformations: vec![marker_pose("AprilTag36h11", 7, 1.5)],
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(source.read_poses(&station).is_none());
    }
}
