pub mod filters;
pub mod init;
pub mod layers;
pub mod model;
pub mod model_io;
pub mod observation;
pub mod options;
pub mod padding;
pub mod vision_net;

// Re-export key components for convenience
pub use filters::{DefaultFilterResolver, FilterResolver, ResolverError};
pub use model::{HiddenState, ModelInput, ModelOutput, TorchModel};
pub use observation::ObservationShape;
pub use options::{FilterSpec, ModelOptions};
pub use vision_net::{ConvLayerSpec, NetworkSummary, VisionNetwork};
