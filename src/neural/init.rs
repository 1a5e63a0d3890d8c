//! In-place weight initializers.
//!
//! All functions run under `no_grad` and overwrite the given parameter.

use tch::{Kind, Tensor};

use crate::Result;

/// Initialization scheme for an affine layer's weight matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Initializer {
    /// Glorot/Xavier uniform
    XavierUniform,
    /// Gaussian rows rescaled to the given L2 norm
    NormC { std: f64 },
}

impl Initializer {
    pub fn apply(&self, param: &mut Tensor) -> Result<()> {
        match *self {
            Initializer::XavierUniform => xavier_uniform_(param),
            Initializer::NormC { std } => normc_(param, std),
        }
    }
}

/// `(fan_in, fan_out)` of a linear `[out, in]` or conv `[out, in, kh, kw]` weight.
pub fn fan_in_out(size: &[i64]) -> (f64, f64) {
    match size {
        [] => (1.0, 1.0),
        [n] => (*n as f64, *n as f64),
        [out, inp, receptive @ ..] => {
            let receptive: i64 = receptive.iter().product();
            ((inp * receptive) as f64, (out * receptive) as f64)
        }
    }
}

pub fn xavier_uniform_bound(size: &[i64]) -> f64 {
    let (fan_in, fan_out) = fan_in_out(size);
    (6.0 / (fan_in + fan_out)).sqrt()
}

pub fn xavier_uniform_(param: &mut Tensor) -> Result<()> {
    let bound = xavier_uniform_bound(&param.size());
    tch::no_grad(|| param.f_uniform_(-bound, bound))?;
    Ok(())
}

pub fn normc_(param: &mut Tensor, std: f64) -> Result<()> {
    tch::no_grad(|| -> Result<()> {
        param.f_normal_(0.0, 1.0)?;
        let norms = param
            .square()
            .sum_dim_intlist([1].as_slice(), true, Kind::Float)
            .sqrt();
        let scaled = &*param * std / norms;
        param.f_copy_(&scaled)?;
        Ok(())
    })
}

pub fn constant_(param: &mut Tensor, value: f64) -> Result<()> {
    tch::no_grad(|| param.f_fill_(value))?;
    Ok(())
}
