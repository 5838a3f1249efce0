//! Configuration file management.
//!
//! Handles loading and saving user preferences to `~/.night-flight.toml`.
//! Every field is optional; missing values fall back to the core defaults.

use night_flight_core::{
    CameraConfig, CityGrid, ClassifierConfig, DirectorConfig, FlightConfig, TurnConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 3;
const DEFAULT_SEED: u64 = 0x6e69_6768_7466;
const DEFAULT_VIEW_RADIUS: i32 = 2;
const DEFAULT_EMPTY_LOT_CHANCE: f32 = 0.12;

const CONFIG_TEMPLATE: &str = r#"# night-flight configuration file

# Timeout in seconds when opening an audio device (default: 3)
# device_timeout_secs = 3

# Last selected audio device (auto-saved)
# last_device = "Device Name"
# last_device_is_input = false

# =============================================================================
# City
# =============================================================================

# seed = 123456                   # Same seed, same city
# view_radius = 2                 # Chunks generated around the camera
# empty_lot_chance = 0.12

# Street grid. Buildings plus safety buffer must stay out of the streets:
# max_building_half_width + safety_buffer < (street_width + cell_size) / 2
# max_building_half_width <= cell_size / 2
# cell_size = 20.0
# slots_per_block = 3
# street_width = 24.0
# min_building_half_width = 4.0
# max_building_half_width = 8.0
# safety_buffer = 2.0
# min_building_height = 15.0
# max_building_height = 120.0

# =============================================================================
# Beat detection
# =============================================================================

# band_low_hz = 60.0              # Kick band
# band_high_hz = 150.0
# beat_threshold = 1.5            # x short-window mean
# beat_debounce_ms = 100.0
# heavy_threshold = 2.5           # x short-window mean, after quiet
# heavy_debounce_ms = 2000.0
# transition_debounce_ms = 8000.0
# min_short_mean = 10.0           # Silence floor for beats/heavy shifts
# min_long_mean = 15.0            # Silence floor for transitions

# =============================================================================
# Flight
# =============================================================================

# altitude = 30.0
# base_speed = 60.0
# turn_duration_secs = 0.175
# max_bank = 0.35                 # Radians
# perspective_transition_secs = 0.8
# third_person_hold_secs = 6.0
# max_boost = 1.6                 # Speed multiplier on a full-strength beat
# ease_factor = 0.05              # Per-frame return to base speed
"#;

#[derive(Serialize, Deserialize, Default, Debug)]
pub struct Config {
    #[serde(skip)]
    path: Option<PathBuf>,

    pub last_device: Option<String>,
    pub last_device_is_input: Option<bool>,
    pub device_timeout_secs: Option<u64>,

    // City
    pub seed: Option<u64>,
    pub view_radius: Option<i32>,
    pub empty_lot_chance: Option<f32>,
    pub cell_size: Option<f32>,
    pub slots_per_block: Option<u32>,
    pub street_width: Option<f32>,
    pub min_building_half_width: Option<f32>,
    pub max_building_half_width: Option<f32>,
    pub safety_buffer: Option<f32>,
    pub min_building_height: Option<f32>,
    pub max_building_height: Option<f32>,

    // Beat detection (flattened for simpler TOML)
    pub band_low_hz: Option<f32>,
    pub band_high_hz: Option<f32>,
    pub beat_threshold: Option<f32>,
    pub beat_debounce_ms: Option<f64>,
    pub heavy_threshold: Option<f32>,
    pub heavy_debounce_ms: Option<f64>,
    pub transition_debounce_ms: Option<f64>,
    pub min_short_mean: Option<f32>,
    pub min_long_mean: Option<f32>,

    // Flight
    pub altitude: Option<f32>,
    pub base_speed: Option<f32>,
    pub turn_duration_secs: Option<f32>,
    pub max_bank: Option<f32>,
    pub perspective_transition_secs: Option<f32>,
    pub third_person_hold_secs: Option<f32>,
    pub max_boost: Option<f32>,
    pub ease_factor: Option<f32>,
}

impl Config {
    fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".night-flight.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location is created from the commented
    /// template. Unreadable or invalid files fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            match fs::write(&path, CONFIG_TEMPLATE) {
                Ok(()) => log::info!("Created config template at {:?}", path),
                Err(e) => log::warn!("Could not create config template at {:?}: {}", path, e),
            }
        }

        let mut config = match fs::read_to_string(&path) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.path = Some(path);
        config
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self) {
        let Some(path) = self.path.clone().or_else(Self::default_path) else {
            return;
        };
        match toml::to_string(self) {
            Ok(content) => match fs::write(&path, content) {
                Ok(()) => log::info!("Config saved to {:?}", path),
                Err(e) => log::warn!("Could not save config to {:?}: {}", path, e),
            },
            Err(e) => log::warn!("Could not serialize config: {}", e),
        }
    }

    pub fn set_device(&mut self, name: &str, is_input: bool) {
        self.last_device = Some(name.to_string());
        self.last_device_is_input = Some(is_input);
        self.save();
    }

    pub fn device_timeout_secs(&self) -> u64 {
        self.device_timeout_secs.unwrap_or(DEFAULT_DEVICE_TIMEOUT_SECS)
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn view_radius(&self) -> i32 {
        self.view_radius.unwrap_or(DEFAULT_VIEW_RADIUS)
    }

    pub fn empty_lot_chance(&self) -> f32 {
        self.empty_lot_chance.unwrap_or(DEFAULT_EMPTY_LOT_CHANCE)
    }

    /// Street grid, validated. A layout that would put buildings in the
    /// streets is rejected in favour of the defaults.
    pub fn grid(&self) -> CityGrid {
        let d = CityGrid::default();
        let grid = CityGrid {
            cell_size: self.cell_size.unwrap_or(d.cell_size),
            slots_per_block: self.slots_per_block.unwrap_or(d.slots_per_block),
            street_width: self.street_width.unwrap_or(d.street_width),
            min_building_half_width: self.min_building_half_width.unwrap_or(d.min_building_half_width),
            max_building_half_width: self.max_building_half_width.unwrap_or(d.max_building_half_width),
            safety_buffer: self.safety_buffer.unwrap_or(d.safety_buffer),
            min_building_height: self.min_building_height.unwrap_or(d.min_building_height),
            max_building_height: self.max_building_height.unwrap_or(d.max_building_height),
            ..d
        };
        match grid.validate() {
            Ok(()) => grid,
            Err(e) => {
                log::warn!("Invalid street grid in config ({}), using defaults", e);
                d
            }
        }
    }

    pub fn classifier(&self) -> ClassifierConfig {
        let d = ClassifierConfig::default();
        ClassifierConfig {
            band_low_hz: self.band_low_hz.unwrap_or(d.band_low_hz),
            band_high_hz: self.band_high_hz.unwrap_or(d.band_high_hz),
            beat_threshold: self.beat_threshold.unwrap_or(d.beat_threshold),
            beat_debounce_ms: self.beat_debounce_ms.unwrap_or(d.beat_debounce_ms),
            heavy_threshold: self.heavy_threshold.unwrap_or(d.heavy_threshold),
            heavy_debounce_ms: self.heavy_debounce_ms.unwrap_or(d.heavy_debounce_ms),
            transition_debounce_ms: self.transition_debounce_ms.unwrap_or(d.transition_debounce_ms),
            min_short_mean: self.min_short_mean.unwrap_or(d.min_short_mean),
            min_long_mean: self.min_long_mean.unwrap_or(d.min_long_mean),
            ..d
        }
    }

    /// Flight path settings. Segments are one block long so control points
    /// land on intersections.
    pub fn flight(&self, grid: &CityGrid) -> FlightConfig {
        let d = FlightConfig::default();
        FlightConfig {
            altitude: self.altitude.unwrap_or(d.altitude),
            base_speed: self.base_speed.unwrap_or(d.base_speed),
            segment_length: grid.block_pitch(),
            street_pitch: grid.block_pitch(),
            ..d
        }
    }

    pub fn turn(&self) -> TurnConfig {
        let d = TurnConfig::default();
        TurnConfig {
            duration_secs: self.turn_duration_secs.unwrap_or(d.duration_secs).max(0.01),
            max_bank: self.max_bank.unwrap_or(d.max_bank),
            ..d
        }
    }

    pub fn camera(&self) -> CameraConfig {
        let d = CameraConfig::default();
        CameraConfig {
            transition_secs: self.perspective_transition_secs.unwrap_or(d.transition_secs),
            third_person_hold_secs: self.third_person_hold_secs.unwrap_or(d.third_person_hold_secs),
            ..d
        }
    }

    pub fn director(&self) -> DirectorConfig {
        let d = DirectorConfig::default();
        DirectorConfig {
            max_boost: self.max_boost.unwrap_or(d.max_boost),
            ease_factor: self.ease_factor.unwrap_or(d.ease_factor),
            ..d
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = Config::parse(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.grid(), CityGrid::default());
        assert_eq!(config.seed(), DEFAULT_SEED);
        assert_eq!(config.device_timeout_secs(), 3);
        assert_eq!(config.classifier().beat_threshold, 1.5);
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse(
            r#"
            seed = 7
            street_width = 30.0
            beat_threshold = 1.8
            base_speed = 80.0
            max_boost = 2.0
            last_device = "pulse"
            "#,
        )
        .unwrap();

        assert_eq!(config.seed(), 7);
        let grid = config.grid();
        assert_eq!(grid.street_width, 30.0);
        assert_eq!(config.classifier().beat_threshold, 1.8);
        assert_eq!(config.classifier().heavy_threshold, 2.5);

        let flight = config.flight(&grid);
        assert_eq!(flight.base_speed, 80.0);
        assert_eq!(flight.segment_length, grid.block_pitch());
        assert_eq!(flight.street_pitch, grid.block_pitch());
        assert_eq!(config.director().max_boost, 2.0);
        assert_eq!(config.last_device.as_deref(), Some("pulse"));
    }

    #[test]
    fn test_grid_that_blocks_streets_falls_back() {
        let config = Config::parse("street_width = 2.0\nsafety_buffer = 10.0").unwrap();
        assert_eq!(config.grid(), CityGrid::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("seed = \"not a number\"").is_err());
    }
}
