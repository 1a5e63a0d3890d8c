//! Model I/O utilities
//!
//! Weights are written either in safetensors format, which stays readable
//! across libtorch versions, or in libtorch's native format. The format is
//! picked from the file extension.

use std::fs;
use std::path::Path;

use safetensors::serialize_to_file;
use safetensors::tensor::{Dtype, SafeTensors, TensorView};
use tch::{nn, Kind, Tensor};

use crate::{Result, VisionNetError};

fn is_safetensors(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "safetensors")
}

/// Save a VarStore, creating parent directories as needed.
pub fn save_weights(vs: &nn::VarStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if is_safetensors(path) {
        save_varstore(vs, path)?;
    } else {
        vs.save(path)?;
    }
    log::info!("💾 Saved {} tensors to {}", vs.variables().len(), path.display());
    Ok(())
}

pub fn load_weights(vs: &mut nn::VarStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if is_safetensors(path) {
        load_varstore(vs, path)?;
    } else {
        vs.load(path)?;
    }
    log::info!("📂 Loaded weights from {}", path.display());
    Ok(())
}

/// Save a VarStore to a safetensors file
pub fn save_varstore(vs: &nn::VarStore, path: impl AsRef<Path>) -> Result<()> {
    let mut entries = Vec::new();
    for (name, tensor) in vs.variables() {
        let shape: Vec<usize> = tensor.size().iter().map(|&d| d as usize).collect();
        let (dtype, data) = tensor_to_bytes(&tensor)?;
        entries.push((name, dtype, shape, data));
    }

    let views = entries
        .iter()
        .map(|(name, dtype, shape, data)| -> Result<(String, TensorView<'_>)> {
            Ok((name.clone(), TensorView::new(*dtype, shape.clone(), data)?))
        })
        .collect::<Result<Vec<_>>>()?;

    serialize_to_file(views, &None, path.as_ref())?;
    Ok(())
}

/// Load a VarStore from a safetensors file.
///
/// Variables absent from the file keep their current values.
pub fn load_varstore(vs: &mut nn::VarStore, path: impl AsRef<Path>) -> Result<()> {
    let buffer = fs::read(path.as_ref())?;
    let tensors = SafeTensors::deserialize(&buffer)?;

    for (name, mut var) in vs.variables() {
        match tensors.tensor(&name) {
            Ok(view) => {
                let loaded = tensor_view_to_tensor(&view)?;
                tch::no_grad(|| var.f_copy_(&loaded))?;
            }
            Err(_) => log::warn!("⚠️ tensor '{}' not found in {}", name, path.as_ref().display()),
        }
    }

    Ok(())
}

fn encode<T: Copy, const N: usize>(values: Vec<T>, to_bytes: fn(T) -> [u8; N]) -> Vec<u8> {
    values.into_iter().flat_map(to_bytes).collect()
}

fn decode<T, const N: usize>(data: &[u8], from_bytes: fn([u8; N]) -> T) -> Vec<T> {
    data.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            from_bytes(bytes)
        })
        .collect()
}

fn tensor_to_bytes(tensor: &Tensor) -> Result<(Dtype, Vec<u8>)> {
    let flat = tensor.to_device(tch::Device::Cpu).flatten(0, -1).contiguous();

    match tensor.kind() {
        Kind::Float => Ok((Dtype::F32, encode::<f32, 4>(Vec::try_from(&flat)?, f32::to_le_bytes))),
        Kind::Double => Ok((Dtype::F64, encode::<f64, 8>(Vec::try_from(&flat)?, f64::to_le_bytes))),
        Kind::Int => Ok((Dtype::I32, encode::<i32, 4>(Vec::try_from(&flat)?, i32::to_le_bytes))),
        Kind::Int64 => Ok((Dtype::I64, encode::<i64, 8>(Vec::try_from(&flat)?, i64::to_le_bytes))),
        // Half kinds are widened and narrowed back by copy_ on load
        Kind::Half | Kind::BFloat16 => {
            let widened = Vec::<f32>::try_from(&flat.to_kind(Kind::Float))?;
            Ok((Dtype::F32, encode::<f32, 4>(widened, f32::to_le_bytes)))
        }
        kind => Err(VisionNetError::Configuration(format!(
            "unsupported tensor kind for safetensors: {:?}",
            kind
        ))),
    }
}

fn tensor_view_to_tensor(view: &TensorView) -> Result<Tensor> {
    let shape: Vec<i64> = view.shape().iter().map(|&d| d as i64).collect();
    let data = view.data();

    let flat = match view.dtype() {
        Dtype::F32 => Tensor::from_slice(&decode::<f32, 4>(data, f32::from_le_bytes)),
        Dtype::F64 => Tensor::from_slice(&decode::<f64, 8>(data, f64::from_le_bytes)),
        Dtype::I32 => Tensor::from_slice(&decode::<i32, 4>(data, i32::from_le_bytes)),
        Dtype::I64 => Tensor::from_slice(&decode::<i64, 8>(data, i64::from_le_bytes)),
        dtype => {
            return Err(VisionNetError::Configuration(format!(
                "unsupported safetensors dtype: {:?}",
                dtype
            )))
        }
    };
    Ok(flat.f_reshape(shape.as_slice())?)
}
