//! # Camera Equipment Communications Module
//!
//! Frames published by the docking camera, consumed by the detector-backed pose source.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use image::{DynamicImage, ImageResult};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An individual frame from a camera
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CamFrame {
    /// The camera which acquired this frame
    pub cam_id: CamId,

    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The format of this frame
    pub format: ImageFormat,

    /// The formatted image data
    pub data: Vec<u8>,
}

/// A decoded camera frame.
#[derive(Clone)]
pub struct CamImage {
    /// The camera which acquired this image
    pub cam_id: CamId,

    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The image itself
    pub image: DynamicImage,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Cameras available to the docking subsystem
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, Eq, PartialEq)]
pub enum CamId {
    /// The forward facing docking camera
    DockFront,

    /// The rear facing docking camera
    DockRear,
}

/// Possible formats for camera images. This is used rather than image::ImageFormat to:
///     1. Restrict the formats that can be sent back and forth
///     2. Allow serialisation as image::ImageFormat does not implement serde.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub enum ImageFormat {
    /// PNG image
    Png,

    /// JPEG image with a quality value between 1 and 100, where 100 is best.
    Jpeg(u8),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamFrame {
    /// Convert this camera frame into a camera image
    pub fn to_cam_image(&self) -> ImageResult<CamImage> {
        let format = match self.format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg(_) => image::ImageFormat::Jpeg,
        };

        let image = image::load_from_memory_with_format(&self.data, format)?;

        Ok(CamImage {
            cam_id: self.cam_id,
            timestamp: self.timestamp,
            image,
        })
    }
}

impl CamImage {
    /// Convert this camera image into a camera frame with the given format
    pub fn to_cam_frame(&self, format: ImageFormat) -> ImageResult<CamFrame> {
        let mut data = Vec::<u8>::new();

        let output_format = match format {
            ImageFormat::Png => image::ImageOutputFormat::Png,
            ImageFormat::Jpeg(q) => image::ImageOutputFormat::Jpeg(q),
        };

        self.image.write_to(&mut data, output_format)?;

        Ok(CamFrame {
            cam_id: self.cam_id,
            timestamp: self.timestamp,
            format,
            data,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_png_frame_decodes_to_same_size() {
        let buffer: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(16, 8, Luma([128]));
        let image = CamImage {
            cam_id: CamId::DockFront,
            timestamp: Utc::now(),
            image: DynamicImage::ImageLuma8(buffer),
        };

        let frame = image.to_cam_frame(ImageFormat::Png).unwrap();
        let decoded = frame.to_cam_image().unwrap();

        assert_eq!(decoded.cam_id, CamId::DockFront);
        assert_eq!(decoded.image.to_luma8().dimensions(), (16, 8));
    }

    #[test]
    fn test_garbage_frame_is_an_error() {
        let frame = CamFrame {
            cam_id: CamId::DockRear,
            timestamp: Utc::now(),
            format: ImageFormat::Png,
            data: vec![1, 2, 3],
        };

        assert!(frame.to_cam_image().is_err());
    }
}
