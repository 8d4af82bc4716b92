//! A thin player shell around the mixer core (§10.6): opens the default
//! device, plays each file passed on the command line onto its own channel,
//! and runs the periodic reaper on a timer until every channel finishes.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use loomcast::audio::output::AudioOutput;
use loomcast::audio::symphonia_decoder::SymphoniaDecoderFactory;
use loomcast::config::MixerConfig;
use loomcast::playback::PlayRequest;
use loomcast::MixerContext;

#[derive(Parser)]
#[command(about = "Play one or more audio files through the mixer core")]
struct Args {
    /// Audio files to play, one per channel.
    files: Vec<PathBuf>,

    /// Optional TOML config file (sample rate, buffer size, ...).
    #[arg(long)]
    config: Option<PathBuf>,

    /// List available output devices and exit.
    #[arg(long)]
    list_devices: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MixerConfig::load(path)?,
        None => MixerConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .init();

    if args.list_devices {
        for name in AudioOutput::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    if args.files.is_empty() {
        println!("usage: mixer-demo [--config FILE] FILE...");
        return Ok(());
    }

    let decoder_factory = Arc::new(SymphoniaDecoderFactory::new(config.sample_rate));
    let ctx = Arc::new(MixerContext::with_channel_table_limit(
        config.sample_rate,
        decoder_factory,
        config.channel_table_capacity.max(args.files.len()),
    ));

    for (idx, path) in args.files.iter().enumerate() {
        let file = File::open(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        ctx.play(
            idx as i64,
            false,
            PlayRequest {
                source: Box::new(file),
                ext,
                name,
                fadein_ms: 0,
                tight: false,
                start_s: 0.0,
                end_s: 0.0,
                relative_volume: 1.0,
            },
        )?;
        info!(channel = idx, file = %path.display(), "queued for playback");
    }

    let mut output = AudioOutput::open(
        config.device_name.as_deref(),
        config.sample_rate,
        config.output_channels,
        config.buffer_frames,
    )?;
    output.start(ctx.clone())?;
    ctx.unpause_all_at_start();

    loop {
        let mut finished = 0;
        ctx.reap(|event| info!(channel = event.channel, tag = event.tag, "channel event"));
        for idx in 0..args.files.len() {
            if ctx.queue_depth(idx as i64)? == 0 {
                finished += 1;
            }
        }
        if finished == args.files.len() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    Ok(())
}
