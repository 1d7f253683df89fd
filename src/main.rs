use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use framepipe::core::PipelineStats;
use framepipe::decoder::synthetic::{SyntheticConfig, SyntheticOpener};
use framepipe::decoder::StreamOpener;
use framepipe::events::PlayerEvent;
use framepipe::sink::{FrameSink, RawFileSink, StatsSink};
use framepipe::utils::{file_utils, logger};
use framepipe::{PipelineConfig, VideoPlayer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a video file through the pipeline
    Play {
        #[arg(short, long)]
        video: String,
        #[arg(short, long, help = "Append raw decoded pixels to this file instead of only counting frames")]
        output: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, help = "Stop after this many seconds")]
        seconds: Option<f64>,
    },
    /// Play a generated test pattern
    Synthetic {
        #[arg(short, long, default_value_t = 30.0)]
        fps: f64,
        #[arg(short = 'W', long, default_value_t = 64)]
        width: u32,
        #[arg(short = 'H', long, default_value_t = 36)]
        height: u32,
        #[arg(short = 'n', long, default_value_t = 90)]
        frames: u64,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        seconds: Option<f64>,
    },
    /// Print stream metadata as JSON
    Probe {
        #[arg(short, long)]
        video: String,
    },
    /// Print the effective pipeline configuration
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Play { video, output, config, seconds } => {
            let config = load_config(config.as_deref())?;
            let path = file_utils::resolve_media_path(&video)?;
            if !file_utils::is_video_file(&path) {
                logger::warn(&format!("{} does not look like a video file", path.display()));
            }
            let opener = video_opener()?;
            play(opener, &path.to_string_lossy(), output.as_deref(), config, seconds)?;
        }
        Commands::Synthetic { fps, width, height, frames, config, seconds } => {
            let config = load_config(config.as_deref())?;
            let opener = SyntheticOpener::new(SyntheticConfig {
                frame_rate: fps,
                width,
                height,
                frame_count: Some(frames),
                ..Default::default()
            });
            play(opener, "synthetic", None, config, seconds)?;
        }
        Commands::Probe { video } => {
            let mut opener = video_opener()?;
            let path = file_utils::resolve_media_path(&video)?;
            let (info, _source) = opener.open(&path.to_string_lossy())?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", config.to_json());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = PipelineConfig::load(path).context("Failed to load pipeline config")?;
    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    logger::init(Some(log_dir.as_path()), true);
    Ok(config)
}

#[cfg(feature = "opencv")]
fn video_opener() -> Result<framepipe::decoder::OpenCvOpener> {
    Ok(framepipe::decoder::OpenCvOpener)
}

#[cfg(not(feature = "opencv"))]
fn video_opener() -> Result<SyntheticOpener> {
    anyhow::bail!("Decoding video files requires building with `--features opencv`")
}

fn play(
    opener: impl StreamOpener + 'static,
    path: &str,
    output: Option<&Path>,
    config: PipelineConfig,
    seconds: Option<f64>,
) -> Result<()> {
    let stats_sink = StatsSink::new();
    let counters = stats_sink.counters();
    let sink: Box<dyn FrameSink> = match output {
        Some(out) => Box::new(RawFileSink::new(out)),
        None => Box::new(stats_sink),
    };

    let player = Arc::new(VideoPlayer::new(opener, sink, config)?);
    let events = player.events();

    let summary = player.init(path)?;
    println!(
        "Opened {}: {}x{} @ {} fps",
        path, summary.width, summary.height, summary.frame_rate_rounded
    );
    match player.timing().and_then(|t| t.frame_interval) {
        Some(interval) => println!("Frame interval: {:.3} ms", interval.as_secs_f64() * 1_000.0),
        None => println!("Frame interval unknown; rendering unpaced"),
    }

    let stopper = Arc::clone(&player);
    ctrlc::set_handler(move || {
        logger::info("Ctrl-C received, stopping playback");
        stopper.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    if !player.start()? {
        anyhow::bail!("Playback did not start; see the log for details");
    }

    let limit = seconds.filter(|s| s.is_finite() && *s > 0.0).map(Duration::from_secs_f64);
    let started = Instant::now();
    let mut sink_errors = 0u64;
    loop {
        for event in events.try_iter() {
            match event {
                PlayerEvent::Progress { position, duration } => match duration {
                    Some(total) => println!("{:>8.2}s / {:.2}s", position.as_secs_f64(), total.as_secs_f64()),
                    None => println!("{:>8.2}s", position.as_secs_f64()),
                },
                PlayerEvent::SinkError(_) => sink_errors += 1,
                PlayerEvent::MetadataReady { .. } | PlayerEvent::EndOfStream => {}
            }
        }
        if player.is_finished() || player.state() != framepipe::PlayerState::Running {
            break;
        }
        if limit.map_or(false, |l| started.elapsed() >= l) {
            player.stop();
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    player.release();
    print_summary(&player.stats(), counters.bytes(), sink_errors, started.elapsed());
    Ok(())
}

fn print_summary(stats: &PipelineStats, bytes: u64, sink_errors: u64, elapsed: Duration) {
    println!("--- Playback summary ---");
    println!("Elapsed:   {:.2}s", elapsed.as_secs_f64());
    println!("Decoded:   {}", stats.producer.decoded);
    println!("Queued:    {}", stats.producer.pushed);
    println!("Dropped:   {}", stats.producer.dropped);
    println!("Rendered:  {}", stats.consumer.rendered);
    println!("Failures:  {} ({} reported)", stats.consumer.delivery_failures, sink_errors);
    if bytes > 0 {
        println!("Bytes:     {}", bytes);
    }
    if let Some(exit) = stats.producer_exit {
        println!("Decoder:   {:?}", exit);
    }
}
