//! Generic vision network
//!
//! A stack of strided convolutions sized from the observation shape, followed
//! by two affine heads over the same feature vector:
//!
//! ```text
//! obs [B, W, H, C]
//!   ↓ permute → [B, C, W, H]
//!   ↓ SlimConv2d × (n-1)   zero-padded so every position is covered
//!   ↓ SlimConv2d           unpadded, must collapse to 1×1
//!   ↓ squeeze → features [B, C_last]
//!   ├─→ logits head (Xavier uniform) → [B, num_outputs]
//!   └─→ value head  (normc)          → [B]
//! ```

use std::fmt;
use std::path::Path;

use tch::{nn, Device, Tensor};

use crate::neural::filters::{DefaultFilterResolver, FilterResolver};
use crate::neural::init::Initializer;
use crate::neural::layers::{SlimConv2d, SlimFc};
use crate::neural::model::{HiddenState, ModelOutput, TorchModel};
use crate::neural::model_io;
use crate::neural::observation::ObservationShape;
use crate::neural::options::{FilterSpec, ModelOptions};
use crate::neural::padding::{conv_output_size, valid_padding, Padding2d};
use crate::{Result, VisionNetError};

/// Resolved geometry of one convolution in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvLayerSpec {
    pub in_channels: i64,
    pub out_channels: i64,
    pub kernel: i64,
    pub stride: i64,
    /// `None` for the final layer
    pub padding: Option<Padding2d>,
    pub in_size: [i64; 2],
    pub out_size: [i64; 2],
}

impl ConvLayerSpec {
    fn parameter_count(&self) -> i64 {
        self.out_channels * self.in_channels * self.kernel * self.kernel + self.out_channels
    }
}

/// Resolve per-layer channels, padding and spatial sizes for a filter stack.
pub fn plan_layers(shape: &ObservationShape, filters: &[FilterSpec]) -> Result<Vec<ConvLayerSpec>> {
    let Some((last, hidden)) = filters.split_last() else {
        return Err(VisionNetError::Configuration(
            "conv_filters resolved to an empty list".to_string(),
        ));
    };
    for filter in filters {
        filter.validate()?;
    }

    let mut layers = Vec::with_capacity(filters.len());
    let mut in_channels = shape.channels;
    let mut in_size = shape.spatial();

    for filter in hidden {
        let (padding, out_size) = valid_padding(in_size, filter.kernel, filter.stride);
        layers.push(ConvLayerSpec {
            in_channels,
            out_channels: filter.out_channels,
            kernel: filter.kernel,
            stride: filter.stride,
            padding: Some(padding),
            in_size,
            out_size,
        });
        in_channels = filter.out_channels;
        in_size = out_size;
    }

    let out_size = in_size.map(|size| conv_output_size(size, last.kernel, last.stride));
    if out_size.contains(&0) {
        return Err(VisionNetError::Configuration(format!(
            "final filter {} does not fit its {}x{} input",
            last, in_size[0], in_size[1]
        )));
    }
    layers.push(ConvLayerSpec {
        in_channels,
        out_channels: last.out_channels,
        kernel: last.kernel,
        stride: last.stride,
        padding: None,
        in_size,
        out_size,
    });

    Ok(layers)
}

#[derive(Debug)]
pub struct VisionNetwork {
    obs_shape: ObservationShape,
    num_outputs: i64,
    device: Device,
    layers: Vec<ConvLayerSpec>,
    convs: nn::Sequential,
    logits_head: SlimFc,
    value_head: SlimFc,
}

impl VisionNetwork {
    /// Build with the built-in default filter table as fallback.
    pub fn new(
        path: &nn::Path,
        obs_shape: ObservationShape,
        num_outputs: i64,
        options: &ModelOptions,
    ) -> Result<Self> {
        Self::with_resolver(path, obs_shape, num_outputs, options, &DefaultFilterResolver)
    }

    /// Build with a custom resolver, consulted only when `options` has no filters.
    pub fn with_resolver<R>(
        path: &nn::Path,
        obs_shape: ObservationShape,
        num_outputs: i64,
        options: &ModelOptions,
        resolver: &R,
    ) -> Result<Self>
    where
        R: FilterResolver + ?Sized,
    {
        if num_outputs <= 0 {
            return Err(VisionNetError::Configuration(format!(
                "num_outputs must be positive, got {}",
                num_outputs
            )));
        }

        let filters = match options.explicit_filters() {
            Some(filters) => filters.to_vec(),
            None => {
                log::debug!("No conv_filters given, resolving defaults for {}", obs_shape);
                resolver.resolve(&obs_shape)?
            }
        };
        let layers = plan_layers(&obs_shape, &filters)?;

        let convs_path = path / "convs";
        let mut convs = nn::seq();
        for (idx, layer) in layers.iter().enumerate() {
            log::debug!(
                "conv {}: {}→{} k={} s={} pad={:?} {:?}→{:?}",
                idx,
                layer.in_channels,
                layer.out_channels,
                layer.kernel,
                layer.stride,
                layer.padding,
                layer.in_size,
                layer.out_size
            );
            convs = convs.add(SlimConv2d::new(
                &(&convs_path / idx),
                layer.in_channels,
                layer.out_channels,
                layer.kernel,
                layer.stride,
                layer.padding,
                options.conv_bias_init,
            )?);
        }

        let feature_size = filters[filters.len() - 1].out_channels;
        let logits_head = SlimFc::new(
            &(path / "logits"),
            feature_size,
            num_outputs,
            Initializer::XavierUniform,
            options.fc_bias_init,
        )?;
        let value_head = SlimFc::new(
            &(path / "value_branch"),
            feature_size,
            1,
            Initializer::NormC {
                std: options.value_init_std,
            },
            options.fc_bias_init,
        )?;

        let net = Self {
            obs_shape,
            num_outputs,
            device: path.device(),
            layers,
            convs,
            logits_head,
            value_head,
        };

        if let Err(e) = net.check_spatial_collapse() {
            log::warn!("⚠️ VisionNetwork for {}: {}; forward will fail", obs_shape, e);
        }
        log::info!(
            "✅ VisionNetwork created: obs={} convs={} features={} outputs={}",
            obs_shape,
            net.layers.len(),
            feature_size,
            num_outputs
        );

        Ok(net)
    }

    pub fn layers(&self) -> &[ConvLayerSpec] {
        &self.layers
    }

    /// Width of the feature vector shared by both heads.
    pub fn feature_size(&self) -> i64 {
        self.layers[self.layers.len() - 1].out_channels
    }

    /// Fail if the planned conv stack does not end at 1×1.
    pub fn check_spatial_collapse(&self) -> Result<()> {
        let out_size = self.layers[self.layers.len() - 1].out_size;
        if out_size == [1, 1] {
            Ok(())
        } else {
            Err(VisionNetError::ShapeMismatch {
                stage: "conv plan",
                expected: "[1, 1]".to_string(),
                actual: out_size.to_vec(),
            })
        }
    }

    /// Flattened conv features for a float observation batch.
    fn hidden_layers(&self, obs: &Tensor) -> Result<Tensor> {
        // switch to channel-major
        let res = obs.permute([0, 3, 1, 2]).apply(&self.convs);
        let size = res.size();
        if size.len() != 4 || size[2] != 1 || size[3] != 1 {
            return Err(VisionNetError::ShapeMismatch {
                stage: "conv output",
                expected: format!("[batch, {}, 1, 1]", self.feature_size()),
                actual: size,
            });
        }
        Ok(res.squeeze_dim(3).squeeze_dim(2))
    }

    pub fn parameter_count(&self) -> i64 {
        let conv_params: i64 = self.layers.iter().map(ConvLayerSpec::parameter_count).sum();
        let features = self.feature_size();
        conv_params + (features + 1) * self.num_outputs + (features + 1)
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            observation_shape: self.obs_shape,
            layers: self.layers.clone(),
            feature_size: self.feature_size(),
            num_outputs: self.num_outputs,
            parameters: self.parameter_count(),
            device: format!("{:?}", self.device),
        }
    }

    /// Save weights; `.safetensors` paths use safetensors, anything else libtorch's format.
    pub fn save_model(&self, vs: &nn::VarStore, path: impl AsRef<Path>) -> Result<()> {
        model_io::save_weights(vs, path)
    }

    pub fn load_model(&self, vs: &mut nn::VarStore, path: impl AsRef<Path>) -> Result<()> {
        model_io::load_weights(vs, path)
    }
}

impl TorchModel for VisionNetwork {
    fn observation_shape(&self) -> &ObservationShape {
        &self.obs_shape
    }

    fn num_outputs(&self) -> i64 {
        self.num_outputs
    }

    fn device(&self) -> Device {
        self.device
    }

    fn forward_impl(&self, obs: &Tensor, hidden_state: HiddenState) -> Result<ModelOutput> {
        let size = obs.size();
        if size.len() != 4 || size[1..] != self.obs_shape.dims()[..] {
            return Err(VisionNetError::ShapeMismatch {
                stage: "observation",
                expected: format!("[batch, {}, {}, {}]", self.obs_shape.width, self.obs_shape.height, self.obs_shape.channels),
                actual: size,
            });
        }

        let features = self.hidden_layers(obs)?;
        let logits = features.apply(&self.logits_head);
        let value = features.apply(&self.value_head).squeeze_dim(1);

        Ok(ModelOutput {
            logits,
            features,
            value,
            hidden_state,
        })
    }
}

/// Summary information about a vision network
#[derive(Debug)]
pub struct NetworkSummary {
    pub observation_shape: ObservationShape,
    pub layers: Vec<ConvLayerSpec>,
    pub feature_size: i64,
    pub num_outputs: i64,
    pub parameters: i64,
    pub device: String,
}

impl fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vision Network Summary:")?;
        writeln!(f, "📐 Observation: {}", self.observation_shape)?;
        for (idx, layer) in self.layers.iter().enumerate() {
            writeln!(
                f,
                "   conv{}: {}→{} k={} s={} {}x{} → {}x{}",
                idx,
                layer.in_channels,
                layer.out_channels,
                layer.kernel,
                layer.stride,
                layer.in_size[0],
                layer.in_size[1],
                layer.out_size[0],
                layer.out_size[1]
            )?;
        }
        writeln!(f, "🧩 Features: {}", self.feature_size)?;
        writeln!(f, "🎯 Outputs: {} logits + 1 value", self.num_outputs)?;
        writeln!(f, "💻 Device: {}", self.device)?;
        write!(f, "🔢 Parameters: {}", self.parameters)
    }
}
