use std::path::PathBuf;

use clap::Parser;
use tch::{nn, Device, Kind, Tensor};

use vision_net::logging::setup_logging;
use vision_net::{ModelInput, ModelOptions, ObservationShape, TorchModel, VisionNetwork};

#[derive(Parser, Debug)]
#[command(name = "vision_net", version, about = "Build a vision network and run a forward pass")]
struct Config {
    /// Observation shape as width,height,channels
    #[arg(long, value_delimiter = ',', required = true)]
    obs_shape: Vec<i64>,

    /// Number of action logits
    #[arg(short = 'n', long)]
    num_outputs: i64,

    /// JSON file with model options (conv_filters, ...)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Size of the random observation batch
    #[arg(short = 'b', long, default_value_t = 1)]
    batch_size: i64,

    /// Seed for parameter init and the random batch
    #[arg(long)]
    seed: Option<i64>,

    /// Run on CUDA when available
    #[arg(long, default_value_t = false)]
    cuda: bool,

    /// Save initialized weights (.safetensors or libtorch format)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write rotated log files to this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    let _logger = setup_logging(config.log_dir.as_deref())?;

    if let Some(seed) = config.seed {
        tch::manual_seed(seed);
    }

    let options = match &config.options {
        Some(path) => ModelOptions::from_json_file(path)?,
        None => ModelOptions::default(),
    };
    let shape = ObservationShape::from_dims(&config.obs_shape)?;
    let device = if config.cuda {
        Device::cuda_if_available()
    } else {
        Device::Cpu
    };
    log::debug!("Using device {:?}", device);

    let vs = nn::VarStore::new(device);
    let net = VisionNetwork::new(&vs.root(), shape, config.num_outputs, &options)?;
    println!("{}", net.summary());

    let obs = Tensor::rand(
        [config.batch_size, shape.width, shape.height, shape.channels],
        (Kind::Float, Device::Cpu),
    );
    let out = tch::no_grad(|| net.forward(&ModelInput::new(obs), Vec::new()))?;

    println!("\n📊 Forward pass:");
    println!("   logits:   {:?}", out.logits.size());
    println!("   features: {:?}", out.features.size());
    println!("   value:    {:?}", out.value.size());
    println!(
        "   mean value: {:.4}",
        out.value.mean(Kind::Float).double_value(&[])
    );

    if let Some(path) = &config.save {
        net.save_model(&vs, path)?;
        println!("💾 Weights saved to {}", path.display());
    }

    Ok(())
}
