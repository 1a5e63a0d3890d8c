use tch::{nn, Tensor};

use crate::neural::init::{constant_, xavier_uniform_, Initializer};
use crate::neural::padding::Padding2d;
use crate::Result;

/// Zero padding, a strided convolution and a ReLU.
///
/// Weights are Xavier-uniform, biases constant.
#[derive(Debug)]
pub struct SlimConv2d {
    padding: Option<Padding2d>,
    conv: nn::Conv2D,
}

impl SlimConv2d {
    pub fn new(
        path: &nn::Path,
        in_channels: i64,
        out_channels: i64,
        kernel: i64,
        stride: i64,
        padding: Option<Padding2d>,
        bias_init: f64,
    ) -> Result<Self> {
        let mut conv = nn::conv2d(
            path / "conv",
            in_channels,
            out_channels,
            kernel,
            nn::ConvConfig {
                stride,
                ..Default::default()
            },
        );
        xavier_uniform_(&mut conv.ws)?;
        if let Some(bs) = conv.bs.as_mut() {
            constant_(bs, bias_init)?;
        }

        Ok(Self {
            padding: padding.filter(|p| !p.is_zero()),
            conv,
        })
    }
}

impl nn::Module for SlimConv2d {
    fn forward(&self, xs: &Tensor) -> Tensor {
        let xs = match &self.padding {
            Some(p) => xs.zero_pad2d(p.left, p.right, p.top, p.bottom),
            None => xs.shallow_clone(),
        };
        xs.apply(&self.conv).relu()
    }
}

/// Affine layer with a pluggable weight initializer and constant bias.
#[derive(Debug)]
pub struct SlimFc {
    linear: nn::Linear,
}

impl SlimFc {
    pub fn new(
        path: &nn::Path,
        in_size: i64,
        out_size: i64,
        initializer: Initializer,
        bias_init: f64,
    ) -> Result<Self> {
        let mut linear = nn::linear(path / "linear", in_size, out_size, Default::default());
        initializer.apply(&mut linear.ws)?;
        if let Some(bs) = linear.bs.as_mut() {
            constant_(bs, bias_init)?;
        }
        Ok(Self { linear })
    }
}

impl nn::Module for SlimFc {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.apply(&self.linear)
    }
}
