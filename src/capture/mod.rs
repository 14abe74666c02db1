pub mod system;

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CaptureError, ConfigError};

pub use system::{CaptureBackend, CaptureTool, SystemCapturer};

/// Produces one screenshot per call.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    fn name(&self) -> &str;

    async fn capture(&self) -> Result<CaptureArtifact, CaptureError>;
}

/// Rectangle in screen pixels, written `x,y,width,height` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for CaptureRegion {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidRegion {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let parts = spec
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid("expected four non-negative integers x,y,width,height"))?;

        let [x, y, width, height] = parts[..] else {
            return Err(invalid("expected four values x,y,width,height"));
        };

        if width == 0 || height == 0 {
            return Err(invalid("width and height must be greater than zero"));
        }

        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// A PNG screenshot owned by exactly one pipeline run.
///
/// Not `Clone`: OCR takes it by value and it is dropped with the run.
#[derive(Debug)]
pub struct CaptureArtifact {
    id: Uuid,
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl CaptureArtifact {
    /// Wraps raw PNG bytes, cropping to `region` when one is given.
    ///
    /// Without a region only the header is read; with one the image is fully
    /// decoded and re-encoded, so call this off the async executor.
    pub fn from_png(png: Vec<u8>, region: Option<&CaptureRegion>) -> Result<Self, CaptureError> {
        let Some(region) = region else {
            let (width, height) = ImageReader::new(Cursor::new(&png))
                .with_guessed_format()
                .and_then(|reader| reader.into_dimensions().map_err(std::io::Error::other))
                .map_err(|e| CaptureError::InvalidImage {
                    reason: e.to_string(),
                })?;
            return Ok(Self {
                id: Uuid::new_v4(),
                png,
                width,
                height,
            });
        };

        let image = image::load_from_memory(&png).map_err(|e| CaptureError::InvalidImage {
            reason: e.to_string(),
        })?;

        let (full_w, full_h) = (image.width(), image.height());
        if region.x >= full_w || region.y >= full_h {
            return Err(CaptureError::RegionOutOfBounds {
                region: region.to_string(),
                width: full_w,
                height: full_h,
            });
        }

        let width = region.width.min(full_w - region.x);
        let height = region.height.min(full_h - region.y);
        let cropped = image.crop_imm(region.x, region.y, width, height);

        let mut buf = Vec::new();
        cropped
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| CaptureError::InvalidImage {
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            png: buf,
            width,
            height,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        self.png = b"definitely not an image".to_vec();
    }
}
