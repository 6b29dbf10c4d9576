use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use guestbridge_core::layout::PointerWidth;
use guestbridge_core::{BridgeConfig, HostState, NativeAudio, TraceBackend, WasmtimeRuntime, loader};

/// Rate the native mixer is drained at between frames.
const OUTPUT_RATE: f64 = 48_000.0;

#[derive(Parser, Debug)]
#[command(
    name = "guestbridge",
    about = "Run a guest WASM/WAT module against the recording GPU backend and the native audio backend."
)]
struct Args {
    /// Guest module (.wasm or .wat; auto-detected)
    module: PathBuf,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Frames to run (overrides the config)
    #[arg(long, value_name = "N")]
    frames: Option<u32>,

    /// Guest pointer width, 32 or 64 (overrides the config)
    #[arg(long, value_name = "BITS", value_parser = parse_pointer_width)]
    pointer_width: Option<PointerWidth>,

    /// Print every recorded GPU call on exit
    #[arg(long, action = clap::ArgAction::SetTrue)]
    dump_trace: bool,
}

fn parse_pointer_width(text: &str) -> Result<PointerWidth, String> {
    let bits: u32 = text.parse().map_err(|e| format!("{e}"))?;
    PointerWidth::try_from(bits)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.frames = frames;
    }
    if let Some(width) = args.pointer_width {
        config.pointer_width = width;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    run(args, config)
}

fn run(args: Args, config: BridgeConfig) -> anyhow::Result<()> {
    let frames = config.frames;
    let delta_ms = config.frame_delta_ms;
    let state = HostState::new(config, TraceBackend::new(), NativeAudio::new())?;

    let mut runtime = WasmtimeRuntime::new(state).context("creating wasmtime engine")?;
    runtime.define_imports().context("defining host imports")?;

    let module = loader::load_file(&runtime.engine, &args.module)
        .with_context(|| format!("loading {}", args.module.display()))?;
    runtime.instantiate(&module)?;
    runtime.start()?;

    let samples = (delta_ms * OUTPUT_RATE / 1000.0).round() as usize * 2;
    let mut mix = vec![0i16; samples];
    for frame in 0..frames {
        log::trace!("frame {frame}");
        runtime.frame(delta_ms)?;
        runtime.state_mut().audio.mix(&mut mix);
    }

    let state = runtime.state();
    log::info!(
        "ran {frames} frame(s); {} GPU call(s) recorded",
        state.gpu.backend.calls.len()
    );
    if args.dump_trace {
        for call in &state.gpu.backend.calls {
            println!("{call}");
        }
    }
    Ok(())
}
