use std::fmt;

use crate::{Result, VisionNetError};

/// Spatial layout of a single observation, channel-last: `(width, height, channels)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationShape {
    pub width: i64,
    pub height: i64,
    pub channels: i64,
}

impl ObservationShape {
    pub fn new(width: i64, height: i64, channels: i64) -> Result<Self> {
        Self::from_dims(&[width, height, channels])
    }

    /// Build from raw dims, as found on an observation space.
    pub fn from_dims(dims: &[i64]) -> Result<Self> {
        match dims {
            &[width, height, channels] if width > 0 && height > 0 && channels > 0 => Ok(Self {
                width,
                height,
                channels,
            }),
            _ => Err(VisionNetError::Configuration(format!(
                "observation shape must be exactly 3 positive integers (width, height, channels), got {:?}",
                dims
            ))),
        }
    }

    /// Spatial extent `[width, height]`.
    pub fn spatial(&self) -> [i64; 2] {
        [self.width, self.height]
    }

    pub fn dims(&self) -> [i64; 3] {
        [self.width, self.height, self.channels]
    }
}

impl fmt::Display for ObservationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}
