mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use cli::{Cli, Command};
use speechfx::audio::{list_input_devices, Acquirer, Band};
use speechfx::config::{self, Config};
use speechfx::{AcquireError, ControlFrame, Pipeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut cfg = Config::default();
    if let Some(path) = config::discover_config(cli.config.as_deref()) {
        match config::load_config(&path) {
            Ok(loaded) => {
                log::info!("Loaded config from {}", path.display());
                cfg = loaded;
            }
            Err(err) => log::warn!("Failed to load config from {}: {}", path.display(), err),
        }
    }
    // Config values apply only when the CLI is at its default
    if cli.width == 1920 { cli.width = cfg.output.width; }
    if cli.height == 1080 { cli.height = cfg.output.height; }
    if cli.fps == 60 { cli.fps = cfg.output.fps; }
    if cli.device.is_none() { cli.device = cfg.output.device.clone(); }
    cfg.output.width = cli.width;
    cfg.output.height = cli.height;
    cfg.output.fps = cli.fps.max(1);

    if cli.list_devices {
        let devices = list_input_devices();
        println!("Available input devices:");
        for name in &devices {
            println!("  {}", name);
        }
        if devices.is_empty() {
            println!("  (none)");
        }
        return Ok(());
    }

    log::info!("speechfx - live speech control values");
    log::info!("Viewport: {}x{} @ {} ticks/s", cfg.output.width, cfg.output.height, cfg.output.fps);
    log::info!(
        "Compressor: threshold={}dB knee={}dB ratio={} attack={}s release={}s",
        cfg.compressor.threshold, cfg.compressor.knee, cfg.compressor.ratio,
        cfg.compressor.attack, cfg.compressor.release
    );
    if cfg.pending.watchdog > 0.0 {
        log::info!("Pending watchdog flips the target after {:.1}s without a request", cfg.pending.watchdog);
    }

    let acquirer = Acquirer::new(cfg.compressor.clone(), cfg.analyser.clone(), cli.device.clone());
    let mut pipeline = Pipeline::new(acquirer, &cfg);
    if !cli.no_mic {
        try_acquire(&mut pipeline);
    }

    // stdin: parsed commands are applied by the tick loop
    let (tx, rx) = mpsc::channel::<Command>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Some(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                None => log::warn!("Unrecognized command: {}", line.trim()),
            }
        }
    });

    let spinner = if cli.json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {msg}")
                .context("Invalid status line template")?,
        );
        Some(pb)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let frame_interval = Duration::from_secs_f64(1.0 / cfg.output.fps as f64);
    let start = Instant::now();
    let mut next_tick = start;
    let mut ticks: u64 = 0;
    let pending = pipeline.pending_handle();

    'run: loop {
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::Acquire => try_acquire(&mut pipeline),
                Command::Release => pipeline.release(),
                Command::Pending(active) => pending.set_pending(active),
                Command::Quit => break 'run,
            }
        }

        let now = start.elapsed().as_secs_f64();
        if cli.duration.is_some_and(|d| now >= d) {
            break;
        }

        let frame = pipeline.frame(now);
        ticks += 1;

        if cli.json {
            let line = serde_json::to_string(&frame.to_uniforms())?;
            writeln!(out, "{}", line).context("Failed to write control frame")?;
        } else if let Some(ref pb) = spinner {
            if ticks % 6 == 0 {
                pb.set_message(status_line(&frame, pipeline.source().device_name()));
                pb.tick();
            }
        }

        next_tick += frame_interval;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            // fell behind; don't try to catch up with a burst of ticks
            next_tick = now;
        }
    }

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    out.flush().context("Failed to flush stdout")?;
    pipeline.release();

    log::info!("Done after {:.1}s ({} ticks)", start.elapsed().as_secs_f64(), ticks);
    Ok(())
}

/// Failures are reported once and not retried; `mic` on stdin retries.
fn try_acquire(pipeline: &mut Pipeline<Acquirer>) {
    match pipeline.source_mut().acquire() {
        Ok(()) => {}
        Err(AcquireError::PermissionDenied) => {
            log::warn!("Microphone permission denied; continuing with a neutral signal (send `mic` to retry)");
        }
        Err(err) => {
            log::warn!("Microphone unavailable: {}; continuing with a neutral signal (send `mic` to retry)", err);
        }
    }
}

fn status_line(frame: &ControlFrame, device: Option<&str>) -> String {
    let features = frame.features();
    let bands: Vec<String> = Band::ALL
        .iter()
        .map(|&band| format!("{} {:.2}", band.name(), features.band(band)))
        .collect();
    format!(
        "mic {} | level {:.2} | {} | pending {:.2} | t_eff {:.1}s",
        device.map_or_else(|| "off".to_string(), |name| format!("'{}'", name)),
        frame.level,
        bands.join(" "),
        frame.pending_smoothed,
        frame.effective_time,
    )
}
