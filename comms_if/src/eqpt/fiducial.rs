//! # Fiducial Equipment Communications Module
//!
//! Coordinate frames, rigid transformations between them, and the docking station database
//! entries which describe where each fiducial marker sits on a station.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Rotation vectors with a magnitude below this are treated as the identity rotation.
pub const MIN_ROTATION_ANGLE_RAD: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Identifies a physical or virtual anchor of a coordinate frame, such as a camera, one fiducial
/// marker instance, or a reference point on the vehicle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    pub name: String,
    pub serial_number: u64,
}

/// A named reference frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateFrame {
    pub device: Device,
}

/// A rigid transformation which maps points expressed in `source_frame` into `target_frame`.
///
/// Equivalently this is the pose of the source frame with respect to the target frame.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CoordinateTransformation {
    pub source_frame: CoordinateFrame,

    pub target_frame: CoordinateFrame,

    /// Position of the source frame origin in the target frame.
    ///
    /// Units: meters
    pub translation: Vector3<f64>,

    /// Rotation vector (axis scaled by angle). The zero vector is the identity rotation.
    ///
    /// Units: radians
    pub rotation: Vector3<f64>,
}

/// How a fiducial marker is to be recognised and sized.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FiducialConfiguration {
    /// Marker family identifier, for example `"AprilTag36h11"`.
    pub family: String,

    /// Width of the marker border in bits.
    pub border_width: u32,

    /// Physical length of one side of the marker.
    ///
    /// Units: meters
    pub side_length_m: f64,
}

/// A fiducial registered on a docking station.
///
/// The transformation's source frame is the marker and its target frame is the station anchor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DockingStationFiducial {
    pub configuration: FiducialConfiguration,

    pub transformation: CoordinateTransformation,
}

/// An entry of the docking station database.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DockingStation {
    pub station_id: i32,

    pub station_type: StationType,

    pub fiducials: Vec<DockingStationFiducial>,
}

/// The list of stations which are currently observable, published by the station finder.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DockingStationList {
    /// Wall clock time at which the list was built.
    pub timestamp_nanos: u64,

    pub stations: Vec<DockingStation>,
}

/// A batch of camera-relative marker poses produced at one instant.
///
/// Each transformation maps the marker frame (source) into the camera frame (target).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PoseSample {
    /// Wall clock time (nanoseconds since the unix epoch) at which the poses were observed.
    pub system_timestamp_nanos: u64,

    pub transformations: Vec<CoordinateTransformation>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Kinds of docking station.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StationType {
    /// Charging station
    Charger,

    /// Payload exchange station
    PayloadExchange,

    /// Station of an unrecognised kind
    Unknown,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Device {
    pub fn new<S: Into<String>>(name: S, serial_number: u64) -> Self {
        Self {
            name: name.into(),
            serial_number,
        }
    }
}

impl CoordinateFrame {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl CoordinateTransformation {
    /// The identity transformation between two frames.
    pub fn identity(source_frame: CoordinateFrame, target_frame: CoordinateFrame) -> Self {
        Self {
            source_frame,
            target_frame,
            translation: Vector3::zeros(),
            rotation: Vector3::zeros(),
        }
    }

    /// Build a transformation from an isometry mapping `source_frame` into `target_frame`.
    pub fn from_isometry(
        source_frame: CoordinateFrame,
        target_frame: CoordinateFrame,
        isometry: &Isometry3<f64>,
    ) -> Self {
        Self {
            source_frame,
            target_frame,
            translation: isometry.translation.vector,
            rotation: isometry.rotation.scaled_axis(),
        }
    }

    /// Get the rotation as a unit quaternion.
    pub fn unit_quaternion(&self) -> UnitQuaternion<f64> {
        // `from_scaled_axis` would normalise the zero vector, so the identity is special cased
        if self.rotation.norm() < MIN_ROTATION_ANGLE_RAD {
            UnitQuaternion::identity()
        } else {
            UnitQuaternion::from_scaled_axis(self.rotation)
        }
    }

    /// Get the transformation as an isometry.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.unit_quaternion())
    }

    /// Get the inverse transformation, mapping `target_frame` back into `source_frame`.
    pub fn inverse(&self) -> Self {
        Self::from_isometry(
            self.target_frame.clone(),
            self.source_frame.clone(),
            &self.to_isometry().inverse(),
        )
    }

    /// Compose two transformations as `self ∘ inner`, i.e. `inner` is applied first.
    ///
    /// The result maps `inner.source_frame` into `self.target_frame`. Frames are not checked for
    /// continuity, `inner.target_frame` is expected to be `self.source_frame`.
    pub fn compose(&self, inner: &Self) -> Self {
        Self::from_isometry(
            inner.source_frame.clone(),
            self.target_frame.clone(),
            &(self.to_isometry() * inner.to_isometry()),
        )
    }

    /// Transform a point from the source frame into the target frame.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.to_isometry().transform_point(point)
    }

    /// Rotation angle in radians.
    pub fn angle_rad(&self) -> f64 {
        self.rotation.norm()
    }
}

impl DockingStation {
    /// Returns true if one of this station's fiducials is anchored on the given device.
    pub fn has_fiducial_device(&self, device: &Device) -> bool {
        self.fiducials
            .iter()
            .any(|f| f.transformation.source_frame.device == *device)
    }

    /// Find the fiducial anchored on the given device.
    pub fn fiducial_for_device(&self, device: &Device) -> Option<&DockingStationFiducial> {
        self.fiducials
            .iter()
            .find(|f| f.transformation.source_frame.device == *device)
    }
}
