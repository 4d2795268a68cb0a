use clap::Parser;
use std::path::PathBuf;

use speechfx::control::pending::parse_pending_word;

#[derive(Parser, Debug)]
#[command(name = "speechfx", about = "Live speech features and pending-state control values for audio-reactive visuals")]
pub struct Cli {
    /// Config file (default: ./speechfx.toml or ~/.config/speechfx/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Viewport width reported in each control frame
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Viewport height reported in each control frame
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Render ticks per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Stop after this many seconds (runs until `quit` otherwise)
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Input device name (substring match)
    #[arg(long)]
    pub device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Do not open the microphone at startup (use the `mic` command later)
    #[arg(long)]
    pub no_mic: bool,

    /// Emit one JSON control frame per tick on stdout
    #[arg(long)]
    pub json: bool,
}

/// Line commands read from stdin while running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Pending(bool),
    Acquire,
    Release,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let first = words.next()?.to_ascii_lowercase();
        match first.as_str() {
            "mic" | "acquire" => Some(Command::Acquire),
            "release" => Some(Command::Release),
            "quit" | "exit" => Some(Command::Quit),
            "pending" => match words.next() {
                Some(word) => parse_pending_word(word).map(Command::Pending),
                None => Some(Command::Pending(true)),
            },
            other => parse_pending_word(other).map(Command::Pending),
        }
    }
}
