use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compressor: CompressorConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub pending: PendingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Dynamics compressor in front of the analyser. Fixed for the lifetime of
/// an acquirer.
#[derive(Debug, Clone, Deserialize)]
pub struct CompressorConfig {
    /// dB level above which compression begins
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// dB width of the soft transition around the threshold
    #[serde(default = "default_knee")]
    pub knee: f32,
    /// dB of input change per dB of output change above the threshold
    #[serde(default = "default_ratio")]
    pub ratio: f32,
    /// Seconds to engage
    #[serde(default = "default_attack")]
    pub attack: f32,
    /// Seconds to disengage
    #[serde(default = "default_release")]
    pub release: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyserConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Per-bin magnitude smoothing (0.0-1.0)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_level_gate")]
    pub level_gate: f32,
    #[serde(default = "default_level_alpha")]
    pub level_alpha: f32,
    #[serde(default = "default_level_max")]
    pub level_max: f32,
    /// Upper bound on feature refreshes per second
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: f32,
    /// Hz ranges for the four bands: F0, formant 1, formants 2-3, sibilance
    #[serde(default = "default_bands")]
    pub bands: [[f32; 2]; 4],
}

#[derive(Debug, Clone, Deserialize)]
pub struct PendingConfig {
    #[serde(default = "default_pending_alpha")]
    pub alpha: f32,
    /// Fraction of speed removed from effective time when fully calm
    #[serde(default = "default_calm_slowdown")]
    pub calm_slowdown: f32,
    /// Seconds without a request before the target flips; 0 disables
    #[serde(default = "default_watchdog")]
    pub watchdog: f64,
    #[serde(default = "default_max_frame_delta")]
    pub max_frame_delta: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Input device name (substring match); default device when unset
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            knee: default_knee(),
            ratio: default_ratio(),
            attack: default_attack(),
            release: default_release(),
        }
    }
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            level_gate: default_level_gate(),
            level_alpha: default_level_alpha(),
            level_max: default_level_max(),
            refresh_hz: default_refresh_hz(),
            bands: default_bands(),
        }
    }
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            alpha: default_pending_alpha(),
            calm_slowdown: default_calm_slowdown(),
            watchdog: default_watchdog(),
            max_frame_delta: default_max_frame_delta(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            device: None,
        }
    }
}

fn default_threshold() -> f32 { -28.0 }
fn default_knee() -> f32 { 18.0 }
fn default_ratio() -> f32 { 4.0 }
fn default_attack() -> f32 { 0.012 }
fn default_release() -> f32 { 0.20 }
fn default_fft_size() -> usize { 1024 }
fn default_smoothing() -> f32 { 0.65 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_level_gate() -> f32 { 0.02 }
fn default_level_alpha() -> f32 { 0.2 }
fn default_level_max() -> f32 { 0.6 }
fn default_refresh_hz() -> f32 { 60.0 }
fn default_bands() -> [[f32; 2]; 4] {
    [[85.0, 300.0], [300.0, 1000.0], [1000.0, 3000.0], [3000.0, 8000.0]]
}
fn default_pending_alpha() -> f32 { 0.05 }
fn default_calm_slowdown() -> f32 { 0.75 }
fn default_watchdog() -> f64 { 5.0 }
fn default_max_frame_delta() -> f64 { 0.25 }
fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fps() -> u32 { 60 }

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config.sanitized())
}

/// Explicit path first, then `./speechfx.toml`, then the per-user config.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("speechfx.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("speechfx").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("speechfx").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

impl Config {
    /// Replace out-of-range values with defaults. Never fails.
    pub fn sanitized(mut self) -> Self {
        let a = &mut self.analyser;
        if !a.fft_size.is_power_of_two() || !(32..=32768).contains(&a.fft_size) {
            log::warn!("analyser.fft_size {} must be a power of two in 32..=32768, using {}", a.fft_size, default_fft_size());
            a.fft_size = default_fft_size();
        }
        if !(0.0..1.0).contains(&a.smoothing) {
            log::warn!("analyser.smoothing {} out of range, using {}", a.smoothing, default_smoothing());
            a.smoothing = default_smoothing();
        }
        if !(a.min_decibels < a.max_decibels) {
            log::warn!("analyser decibel range [{}, {}] is empty, using defaults", a.min_decibels, a.max_decibels);
            a.min_decibels = default_min_decibels();
            a.max_decibels = default_max_decibels();
        }

        let c = &mut self.compressor;
        if !(c.ratio >= 1.0) {
            log::warn!("compressor.ratio {} below 1, using {}", c.ratio, default_ratio());
            c.ratio = default_ratio();
        }
        if !(c.knee >= 0.0) {
            c.knee = default_knee();
        }
        if !(c.attack >= 0.0) {
            c.attack = default_attack();
        }
        if !(c.release >= 0.0) {
            c.release = default_release();
        }

        let f = &mut self.features;
        if !(f.level_alpha > 0.0 && f.level_alpha <= 1.0) {
            log::warn!("features.level_alpha {} out of range, using {}", f.level_alpha, default_level_alpha());
            f.level_alpha = default_level_alpha();
        }
        if !(f.level_max > 0.0 && f.level_max <= 1.0) {
            f.level_max = default_level_max();
        }
        if !(f.refresh_hz > 0.0) {
            f.refresh_hz = default_refresh_hz();
        }

        let p = &mut self.pending;
        if !(p.alpha > 0.0 && p.alpha <= 1.0) {
            log::warn!("pending.alpha {} out of range, using {}", p.alpha, default_pending_alpha());
            p.alpha = default_pending_alpha();
        }
        if !(0.0..=1.0).contains(&p.calm_slowdown) {
            p.calm_slowdown = default_calm_slowdown();
        }
        if !(p.watchdog >= 0.0) {
            p.watchdog = default_watchdog();
        }
        if !(p.max_frame_delta > 0.0) {
            p.max_frame_delta = default_max_frame_delta();
        }

        let o = &mut self.output;
        if o.fps == 0 {
            o.fps = default_fps();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.compressor.threshold, -28.0);
        assert_eq!(cfg.compressor.ratio, 4.0);
        assert_eq!(cfg.analyser.fft_size, 1024);
        assert_eq!(cfg.features.bands[1], [300.0, 1000.0]);
        assert_eq!(cfg.pending.watchdog, 5.0);
        assert_eq!(cfg.output.fps, 60);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [pending]
            watchdog = 0.0

            [output]
            device = "USB"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pending.watchdog, 0.0);
        assert_eq!(cfg.pending.alpha, 0.05);
        assert_eq!(cfg.output.device.as_deref(), Some("USB"));
    }

    #[test]
    fn example_config_matches_defaults() {
        let cfg: Config = toml::from_str(include_str!("../speechfx.example.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.features.bands, defaults.features.bands);
        assert_eq!(cfg.compressor.attack, defaults.compressor.attack);
        assert_eq!(cfg.pending.max_frame_delta, defaults.pending.max_frame_delta);
        assert!(cfg.output.device.is_none());
    }

    #[test]
    fn sanitize_replaces_invalid_values() {
        let cfg: Config = toml::from_str(
            r#"
            [analyser]
            fft_size = 1000
            min_decibels = -20.0
            max_decibels = -30.0

            [pending]
            alpha = 0.0
            "#,
        )
        .unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.analyser.fft_size, 1024);
        assert!(cfg.analyser.min_decibels < cfg.analyser.max_decibels);
        assert_eq!(cfg.pending.alpha, 0.05);
    }
}
