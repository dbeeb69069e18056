//! Fxsim - audio-effects FPGA co-simulator
//!
//! Streams a test tone (or the input file) through the device model while
//! loading the configured effects, then writes the device output.
//!
//! # Usage
//!
//! ```bash
//! fxsim input.wav output.wav --config fxsim.toml --cross-validate
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info, warn};

use fxsim_core::{
    audio::AudioClip,
    config::{Config, StimulusSource},
    device::{Bench, FpgaModel},
    emulated_path,
    error::Result,
    Driver,
};

/// Audio-effects FPGA co-simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mono 16-bit PCM WAV input
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Destination for the device output
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// TOML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump a VCD waveform of the device pins
    #[arg(long)]
    trace: bool,

    /// Waveform file, implies --trace
    #[arg(long, value_name = "PATH")]
    trace_path: Option<PathBuf>,

    /// Compare the device against the reference emulator
    #[arg(long)]
    cross_validate: bool,

    /// Maximum number of samples to process
    #[arg(short = 'n', long)]
    sample_limit: Option<usize>,

    /// Feed the input file to the device instead of the test tone
    #[arg(long)]
    use_input: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if args.trace {
        config.driver.trace = true;
    }
    if let Some(path) = &args.trace_path {
        config.driver.trace = true;
        config.driver.trace_path = path.clone();
    }
    if args.cross_validate {
        config.driver.cross_validate = true;
    }
    if let Some(limit) = args.sample_limit {
        config.driver.sample_limit = limit;
    }
    if args.use_input {
        config.stimulus.source = StimulusSource::Input;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args)?;

    // Decode before touching the device so format errors abort early
    let input = AudioClip::read(&args.input)?;
    info!(
        "loaded {} samples at {} Hz from {}",
        input.samples.len(),
        input.sample_rate,
        args.input.display()
    );
    config.driver.sample_limit = config.driver.sample_limit.min(input.samples.len());

    let stimulus = config.stimulus.build(&input.samples);
    let bench = Bench::new(FpgaModel::new(&config.device));
    let mut driver = Driver::new(bench, config.driver.clone(), stimulus, input.sample_rate)?;

    driver.schedule_effects(&config.effects)?;

    driver.reset(config.driver.warmup_ticks);
    driver.run()?;

    let out = driver.finish();
    out.stats.log_summary();
    if !out.mismatches.is_empty() {
        warn!(
            "{} samples diverged from the emulator, first at sample {}",
            out.mismatches.len(),
            out.mismatches[0].sample
        );
    }

    AudioClip::new(input.sample_rate, out.samples).write(&args.output)?;
    info!("wrote {}", args.output.display());

    if let Some(predicted) = out.predicted {
        let path = emulated_path(&args.output);
        AudioClip::new(input.sample_rate, predicted).write(&path)?;
        info!("wrote {}", path.display());
    }

    Ok(())
}
