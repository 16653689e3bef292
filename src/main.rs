use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use h2md_player::native::{NativeLibrary, SyntheticDecoder, SyntheticMovie};
use h2md_player::utils::{format_duration, load_config, movie_duration, Config};
use h2md_player::{ControllerOptions, ImageFormat, MovieController, NativeDecoder, PlaybackDriver};

/// h2md-player - plays H2MD movies through the native decoding engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Movie file to play (optional with --synthetic)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Read the file into memory and open it from there
    #[arg(short, long)]
    memory: bool,

    /// Decode on a background worker
    #[arg(short = 'a', long = "async")]
    async_decode: bool,

    /// Use the built-in test-pattern engine instead of the shared library
    #[arg(long)]
    synthetic: bool,

    /// Path of the h2md_dec shared library
    #[arg(long, value_name = "PATH")]
    library: Option<PathBuf>,

    /// Request BGRA instead of RGBA pixels
    #[arg(long)]
    bgra: bool,

    /// Engine decoding threads (0 = automatic)
    #[arg(short, long, value_name = "N")]
    threads: Option<u32>,

    /// Stop after this many seconds
    #[arg(short, long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Play once instead of looping
    #[arg(long = "no-loop", action = ArgAction::SetFalse)]
    loop_playback: bool,

    /// Load configuration from this file only
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print playback statistics as JSON when done
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path),
        None => load_config(),
    }
    .context("Failed to load configuration")?;
    apply_args(&mut config, &args);

    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting h2md-player v{}", env!("CARGO_PKG_VERSION"));

    let engine: Arc<dyn NativeDecoder> = if args.synthetic {
        info!("Using the synthetic test-pattern engine");
        Arc::new(SyntheticDecoder::new())
    } else {
        Arc::new(
            NativeLibrary::load_or_default(config.decoder.library_path.as_deref())
                .context("Failed to load the H2MD decoder library")?,
        )
    };

    let mut controller = MovieController::with_options(engine, ControllerOptions::from(&config.decoder));

    let opened = match (&args.file, args.synthetic) {
        (Some(path), _) if args.memory => {
            let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            controller.try_open_from_memory(data)
        }
        (Some(path), _) => controller.try_open(path),
        (None, true) => controller.try_open_from_memory(SyntheticMovie::new(64, 36, 90).encode()),
        (None, false) => anyhow::bail!("No movie file given"),
    };
    if let Err(e) = opened {
        error!("Failed to open movie: {}", e);
        return Err(e.into());
    }

    if let Some(info) = controller.movie_info() {
        info!(
            "Playing {} frames ({}) in {:?} mode",
            info.total_frames,
            format_duration(movie_duration(info.total_frames, controller.frame_rate())),
            controller.decode_mode()
        );
    }

    let mut driver = PlaybackDriver::from_config(&config.playback);
    if !config.playback.loop_playback && config.playback.max_duration_secs.is_none() {
        info!("Playing once");
    } else if config.playback.max_duration_secs.is_none() {
        driver = driver.with_max_duration(Duration::from_secs(10));
        info!("No duration given, stopping after 10 seconds");
    }

    let ticks = driver.run(&mut controller);
    let stats = controller.stats();
    controller.dispose();

    info!(
        "{} ticks, {} decodes requested, {} dropped, {} failed, {} images",
        ticks, stats.decodes_requested, stats.submissions_dropped, stats.decodes_failed, stats.images_transferred
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

/// Command line flags override the loaded configuration
fn apply_args(config: &mut Config, args: &Args) {
    if args.async_decode {
        config.decoder.async_decode = true;
    }
    if args.bgra {
        config.decoder.image_format = ImageFormat::Bgra;
    }
    if let Some(threads) = args.threads {
        config.decoder.threads = threads;
    }
    if let Some(library) = &args.library {
        config.decoder.library_path = Some(library.clone());
    }
    if let Some(duration) = args.duration {
        config.playback.max_duration_secs = Some(duration.max(0.0));
    }
    if !args.loop_playback {
        config.playback.loop_playback = false;
    }
}
