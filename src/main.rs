mod audio;
mod cli;
mod config;
mod dsp;
mod error;
mod render;
mod spectrum;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use audio::player::{CpalPlayer, Transport, WallClock};
use cli::{Cli, SourceModeArg};
use dsp::extract::FrameGeometry;
use render::bars::TerminalRenderer;
use spectrum::{CachedFrameSource, DirectFrameSource, FrameSource, SpectrumFrame};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect spectro.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("spectro.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("spectro").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.frame_rate == 60 { cli.frame_rate = cfg.spectrum.frame_rate; }
            if cli.zoom == 1 { cli.zoom = cfg.spectrum.zoom; }
            if cli.buffer_duration == 3.0 { cli.buffer_duration = cfg.spectrum.buffer_duration; }
            if cli.columns == 72 { cli.columns = cfg.display.columns; }
            if cli.rows == 16 { cli.rows = cfg.display.rows; }
            if cli.volume == 1.0 { cli.volume = cfg.playback.volume; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    anyhow::ensure!(cli.frame_rate >= 1, "--frame-rate must be at least 1");
    anyhow::ensure!(cli.zoom >= 1, "--zoom must be at least 1");
    anyhow::ensure!(cli.buffer_duration > 0.0, "--buffer-duration must be positive");
    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("Input: {}", cli.input.display());

    let buffer = Arc::new(audio::decode::decode_audio(&cli.input)?);
    log::info!(
        "Decoded {} channels, {} Hz, {:.1}s",
        buffer.num_channels(),
        buffer.sample_rate(),
        buffer.duration_seconds()
    );

    let geometry = FrameGeometry::derive(buffer.sample_rate(), cli.frame_rate, cli.frame_length);
    log::info!(
        "Analysis window: {} samples, {} bins at zoom {}",
        geometry.frame_length,
        geometry.frame_length * cli.zoom,
        cli.zoom
    );

    let mut source: Box<dyn FrameSource> = match cli.mode {
        SourceModeArg::Buffered => Box::new(CachedFrameSource::new(
            cli.buffer_duration,
            cli.frame_rate,
            cli.zoom,
            cli.frame_length,
        )?),
        SourceModeArg::Direct => {
            Box::new(DirectFrameSource::new(cli.frame_rate, cli.zoom, cli.frame_length)?)
        }
    };
    source.set_buffer(Arc::clone(&buffer))?;

    let mut transport: Box<dyn Transport> = match CpalPlayer::new(Arc::clone(&buffer)) {
        Ok(player) => Box::new(player),
        Err(e) => {
            log::warn!("Audio playback unavailable ({}); running silent", e);
            Box::new(WallClock::new(buffer.duration_seconds()))
        }
    };
    transport.set_volume(cli.volume.clamp(0.0, 1.0));
    transport.start(cli.start_at).context("Failed to start playback")?;

    let mut renderer = TerminalRenderer::new(cli.columns, cli.rows);
    let placeholder = SpectrumFrame::empty(geometry.frame_length * cli.zoom);
    let duration = transport.duration_seconds();

    let tick = Duration::from_secs_f64(1.0 / cli.frame_rate as f64);
    let mut next_deadline = Instant::now() + tick;

    loop {
        let time = transport.time_seconds().max(0.0);
        let index = (time * cli.frame_rate as f32).floor() as usize;

        let frame = source.frame_at(index)?;
        renderer.draw(frame.as_ref().unwrap_or(&placeholder), time, duration)?;

        if !transport.is_playing() {
            break;
        }

        let now = Instant::now();
        if next_deadline > now {
            std::thread::sleep(next_deadline - now);
            next_deadline += tick;
        } else {
            // Fell behind; rebase rather than burning CPU catching up.
            next_deadline = now + tick;
        }
    }

    transport.stop(true);
    log::info!("Done");
    Ok(())
}
