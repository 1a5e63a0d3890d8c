//! Model options
//!
//! Options are plain serde structs so they can be read from the same JSON
//! documents that configure the rest of an agent. Unknown keys are ignored.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, VisionNetError};

/// One convolution in the stack: `(out_channels, kernel, stride)`.
///
/// Serialized as a JSON triple. The kernel may be written either as an
/// integer or as a square `[k, k]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter", into = "RawFilter")]
pub struct FilterSpec {
    pub out_channels: i64,
    pub kernel: i64,
    pub stride: i64,
}

impl FilterSpec {
    pub const fn new(out_channels: i64, kernel: i64, stride: i64) -> Self {
        Self {
            out_channels,
            kernel,
            stride,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.out_channels > 0 && self.kernel > 0 && self.stride > 0 {
            Ok(())
        } else {
            Err(VisionNetError::Configuration(format!(
                "filter {} must have positive out_channels, kernel and stride",
                self
            )))
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.out_channels, self.kernel, self.stride)
    }
}

impl From<(i64, i64, i64)> for FilterSpec {
    fn from((out_channels, kernel, stride): (i64, i64, i64)) -> Self {
        Self::new(out_channels, kernel, stride)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum KernelRepr {
    Square(i64),
    Pair([i64; 2]),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFilter(i64, KernelRepr, i64);

impl TryFrom<RawFilter> for FilterSpec {
    type Error = String;

    fn try_from(RawFilter(out_channels, kernel, stride): RawFilter) -> std::result::Result<Self, String> {
        let kernel = match kernel {
            KernelRepr::Square(k) => k,
            KernelRepr::Pair([kh, kw]) if kh == kw => kh,
            KernelRepr::Pair([kh, kw]) => {
                return Err(format!("non-square kernel [{kh}, {kw}] is not supported"));
            }
        };
        let spec = FilterSpec::new(out_channels, kernel, stride);
        spec.validate().map_err(|e| e.to_string())?;
        Ok(spec)
    }
}

impl From<FilterSpec> for RawFilter {
    fn from(spec: FilterSpec) -> Self {
        RawFilter(spec.out_channels, KernelRepr::Square(spec.kernel), spec.stride)
    }
}

/// Options recognised by [`crate::VisionNetwork`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Explicit conv stack. `None` or empty falls back to the filter resolver.
    pub conv_filters: Option<Vec<FilterSpec>>,
    /// Row norm for the value head's normc initializer
    pub value_init_std: f64,
    /// Constant initial bias of every convolution
    pub conv_bias_init: f64,
    /// Constant initial bias of both heads
    pub fc_bias_init: f64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            conv_filters: None,
            value_init_std: 1.0,
            conv_bias_init: 0.0,
            fc_bias_init: 0.0,
        }
    }
}

impl ModelOptions {
    pub fn with_filters(filters: impl IntoIterator<Item = FilterSpec>) -> Self {
        Self {
            conv_filters: Some(filters.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Explicit filters, if any were configured.
    pub fn explicit_filters(&self) -> Option<&[FilterSpec]> {
        self.conv_filters.as_deref().filter(|f| !f.is_empty())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded model options from {}", path.as_ref().display());
        Self::from_json_str(&content)
    }
}
