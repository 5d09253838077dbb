use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use amuse_types::{Configuration, Key, MusicalKey, Scale, DEFAULT_RAMP_MS};

use crate::driver::{Canvas, EngineLimits};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    canvas: CanvasConfig,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    music: MusicConfig,
    #[serde(default)]
    audio: AudioConfig,
}

#[derive(Deserialize, Default)]
struct CanvasConfig {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize, Default)]
struct EngineConfig {
    max_segments: Option<usize>,
    max_frames: Option<u64>,
    max_substeps: Option<u32>,
}

#[derive(Deserialize, Default)]
struct MusicConfig {
    key: Option<String>,
    scale: Option<String>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    osc_addr: Option<String>,
    ramp_ms: Option<f64>,
}

/// Application settings: canvas, engine limits, starting key, audio sink.
pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any. A
    /// broken user file is logged and ignored.
    pub fn load() -> Self {
        let mut base = embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config { file: base }
    }

    /// Embedded defaults overlaid with an explicitly named file. Unlike
    /// [`Config::load`], failures are returned.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let user: ConfigFile = toml::from_str(&contents)?;
        let mut base = embedded();
        merge(&mut base, user);
        Ok(Config { file: base })
    }

    pub fn canvas(&self) -> Canvas {
        let fallback = Canvas::default();
        Canvas::new(
            self.file.canvas.width.map_or(fallback.width, f64::from),
            self.file.canvas.height.map_or(fallback.height, f64::from),
        )
    }

    pub fn limits(&self) -> EngineLimits {
        let fallback = EngineLimits::default();
        let engine = &self.file.engine;
        EngineLimits {
            max_substeps: engine.max_substeps.unwrap_or(fallback.max_substeps).max(1),
            max_frames: engine.max_frames.unwrap_or(fallback.max_frames),
            max_segments: engine.max_segments.unwrap_or(fallback.max_segments).max(2),
            ramp_ms: self.ramp_ms(),
        }
    }

    /// Starting tonality; unknown names fall back to C major.
    pub fn musical_key(&self) -> MusicalKey {
        let root = self.file.music.key.as_deref().and_then(parse_key).unwrap_or(Key::C);
        let scale = self
            .file
            .music
            .scale
            .as_deref()
            .and_then(parse_scale)
            .unwrap_or(Scale::Major);
        MusicalKey::new(root, scale)
    }

    pub fn osc_addr(&self) -> Option<&str> {
        self.file.audio.osc_addr.as_deref().filter(|a| !a.is_empty())
    }

    /// Length of every melody ramp, at least 1 ms.
    pub fn ramp_ms(&self) -> f64 {
        self.file
            .audio
            .ramp_ms
            .filter(|ms| ms.is_finite())
            .map_or(DEFAULT_RAMP_MS, |ms| ms.max(1.0))
    }
}

/// Read a JSON parameter snapshot. Missing fields take their defaults.
pub fn load_preset(path: &Path) -> Result<Configuration, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn embedded() -> ConfigFile {
    match toml::from_str(DEFAULT_CONFIG) {
        Ok(file) => file,
        Err(e) => {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("amuse").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.canvas.width.is_some() {
        base.canvas.width = user.canvas.width;
    }
    if user.canvas.height.is_some() {
        base.canvas.height = user.canvas.height;
    }
    if user.engine.max_segments.is_some() {
        base.engine.max_segments = user.engine.max_segments;
    }
    if user.engine.max_frames.is_some() {
        base.engine.max_frames = user.engine.max_frames;
    }
    if user.engine.max_substeps.is_some() {
        base.engine.max_substeps = user.engine.max_substeps;
    }
    if user.music.key.is_some() {
        base.music.key = user.music.key;
    }
    if user.music.scale.is_some() {
        base.music.scale = user.music.scale;
    }
    if user.audio.osc_addr.is_some() {
        base.audio.osc_addr = user.audio.osc_addr;
    }
    if user.audio.ramp_ms.is_some() {
        base.audio.ramp_ms = user.audio.ramp_ms;
    }
}

fn parse_key(s: &str) -> Option<Key> {
    match s {
        "C" => Some(Key::C),
        "C#" | "Cs" => Some(Key::Cs),
        "D" => Some(Key::D),
        "D#" | "Ds" => Some(Key::Ds),
        "E" => Some(Key::E),
        "F" => Some(Key::F),
        "F#" | "Fs" => Some(Key::Fs),
        "G" => Some(Key::G),
        "G#" | "Gs" => Some(Key::Gs),
        "A" => Some(Key::A),
        "A#" | "As" => Some(Key::As),
        "B" => Some(Key::B),
        _ => None,
    }
}

fn parse_scale(s: &str) -> Option<Scale> {
    Scale::ALL
        .iter()
        .copied()
        .find(|scale| scale.name().eq_ignore_ascii_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_defaults() {
        let config = Config { file: embedded() };
        assert_eq!(config.canvas(), Canvas::new(2400.0, 1800.0));
        assert_eq!(config.limits(), EngineLimits::default());
        assert_eq!(config.musical_key(), MusicalKey::default());
        assert_eq!(config.osc_addr(), None);
        assert_eq!(config.ramp_ms(), 10.0);
    }

    #[test]
    fn user_file_overrides_field_by_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[engine]\nmax_substeps = 50\n[music]\nkey = \"F#\"\nscale = \"minor\"\n[audio]\nosc_addr = \"127.0.0.1:57110\""
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        let limits = config.limits();
        assert_eq!(limits.max_substeps, 50);
        assert_eq!(limits.max_frames, 1_000_000);
        assert_eq!(config.musical_key(), MusicalKey::new(Key::Fs, Scale::Minor));
        assert_eq!(config.osc_addr(), Some("127.0.0.1:57110"));
        assert_eq!(config.canvas().width, 2400.0);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nmax_substeps = ").unwrap();
        assert!(matches!(Config::load_from(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(err, Err(ConfigError::Io(_))));
    }

    #[test]
    fn unknown_names_fall_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[music]\nkey = \"H\"\nscale = \"Lydian\"\n[audio]\nramp_ms = 0.0").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.musical_key(), MusicalKey::default());
        assert_eq!(config.ramp_ms(), 1.0);
    }

    #[test]
    fn preset_loads_camel_case_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"rotorRPM": 1.25, "symmetry": 8, "synthArpSpeed": 5}}"#).unwrap();
        let preset = load_preset(file.path()).unwrap();
        assert_eq!(preset.rotor_rpm, 1.25);
        assert_eq!(preset.symmetry.folds(), 8);
        assert_eq!(preset.synth.arp_speed, 5);
        assert_eq!(preset.lrpm, 2.0);
    }

    #[test]
    fn bad_preset_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"symmetry": 7}}"#).unwrap();
        assert!(matches!(load_preset(file.path()), Err(ConfigError::Parse(_))));
    }
}
