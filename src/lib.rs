//! # Vision Network Library
//!
//! A convolutional policy/value network for reinforcement-learning agents,
//! built on top of `tch` (libtorch bindings).
//!
//! ## Features
//!
//! - **Shape inference**: conv stack sized from the observation's spatial shape
//! - **Default filters**: injectable resolver with the standard 84×84 / 42×42 tables
//! - **Two heads**: action logits and a scalar value baseline over shared features
//! - **Model I/O**: safetensors or libtorch-native weight persistence
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tch::{nn, Device, Kind, Tensor};
//! use vision_net::{ModelInput, ModelOptions, ObservationShape, TorchModel, VisionNetwork};
//!
//! let vs = nn::VarStore::new(Device::Cpu);
//! let shape = ObservationShape::new(84, 84, 4)?;
//! let net = VisionNetwork::new(&vs.root(), shape, 6, &ModelOptions::default())?;
//!
//! let obs = Tensor::rand([2, 84, 84, 4], (Kind::Float, Device::Cpu));
//! let out = net.forward(&ModelInput::new(obs), Vec::new())?;
//! assert_eq!(out.logits.size(), vec![2, 6]);
//! # Ok::<(), vision_net::VisionNetError>(())
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Neural network components
pub mod neural;

/// Logger bootstrap for binaries
pub mod logging;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use neural::*;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for the vision network library
#[derive(Debug, thiserror::Error)]
pub enum VisionNetError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Shape mismatch at {stage}: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        stage: &'static str,
        expected: String,
        actual: Vec<i64>,
    },

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("Safetensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VisionNetError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
