//! # Detector Pose Source
//!
//! Receives camera frames and runs a fiducial marker detector on each of them to produce pose
//! samples.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::{
    eqpt::{
        cam::{CamFrame, CamImage},
        fiducial::{CoordinateTransformation, DockingStation, PoseSample},
    },
    net::pubsub::Subscriber,
};
use log::{trace, warn};

use super::{poses_from_sample, PoseSource};
use crate::bg_thread::{self, BgThread};
use util::time;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Detects fiducial markers in a camera image.
pub trait MarkerDetector {
    /// Detect every marker in the image, returning their poses relative to the camera.
    ///
    /// `side_length_m` is the physical side length of the markers being looked for.
    fn detect(&mut self, image: &CamImage, side_length_m: f64) -> PoseSample;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pose source which runs a [`MarkerDetector`] on incoming camera frames.
///
/// Unlike the ground truth source the latest detection is kept until it is replaced by the next
/// frame's detection, so several queries may see the same sample.
pub struct DetectorPoseSource {
    latest: Arc<Mutex<Option<PoseSample>>>,
    _bg: BgThread,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DetectorPoseSource {
    /// Start listening for camera frames on the given subscriber.
    pub fn new(
        mut subscriber: Box<dyn Subscriber<CamFrame> + Send>,
        mut detector: Box<dyn MarkerDetector + Send>,
        side_length_m: f64,
    ) -> std::io::Result<Self> {
        let latest = Arc::new(Mutex::new(None));
        let latest_clone = latest.clone();

        let bg = BgThread::spawn("detector_pose_source", move |run| {
            bg_thread::listen("Camera frame", subscriber.as_mut(), &run, |frame| {
                let image = match frame.to_cam_image() {
                    Ok(i) => i,
                    Err(e) => {
                        warn!("Could not decode frame from {:?}: {}", frame.cam_id, e);
                        return;
                    }
                };

                let sample = detector.detect(&image, side_length_m);
                trace!(
                    "Detected {} markers in frame from {:?}",
                    sample.transformations.len(),
                    frame.cam_id
                );

                *bg_thread::lock(&latest_clone) = Some(sample);
            })
        })?;

        Ok(Self { latest, _bg: bg })
    }
}

impl PoseSource for DetectorPoseSource {
    fn read_poses(&self, station: &DockingStation) -> Option<Vec<CoordinateTransformation>> {
        let latest = bg_thread::lock(&self.latest);
        poses_from_sample(latest.as_ref(), station, time::now_nanos())
    }
}
