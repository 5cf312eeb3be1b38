use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::renderer::driver::MAX_TEXTURE_UNITS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_max_quads")]
    pub max_quads: u32,
    #[serde(default = "RenderSettings::default_max_lines")]
    pub max_lines: u32,
    #[serde(default = "RenderSettings::default_max_texture_slots")]
    pub max_texture_slots: u32,
    #[serde(default = "RenderSettings::default_sample_count")]
    pub sample_count: u32,
    #[serde(default)]
    pub driver: DriverKind,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_quads: Self::default_max_quads(),
            max_lines: Self::default_max_lines(),
            max_texture_slots: Self::default_max_texture_slots(),
            sample_count: Self::default_sample_count(),
            driver: DriverKind::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub(crate) fn validate(mut self) -> Self {
        if self.max_quads == 0 {
            warn!("Quad capacity must be greater than zero. Using default value.");
            self.max_quads = Self::default_max_quads();
        }

        if self.max_lines == 0 {
            warn!("Line capacity must be greater than zero. Using default value.");
            self.max_lines = Self::default_max_lines();
        }

        if self.max_texture_slots < 2 || self.max_texture_slots > MAX_TEXTURE_UNITS as u32 {
            warn!(
                "Texture slot count must be between 2 and {}. Using default value.",
                MAX_TEXTURE_UNITS
            );
            self.max_texture_slots = Self::default_max_texture_slots();
        }

        if self.sample_count == 0 {
            warn!("Sample count must be greater than zero. Using 1 instead.");
            self.sample_count = Self::default_sample_count();
        }

        self
    }

    const fn default_max_quads() -> u32 {
        10_000
    }

    const fn default_max_lines() -> u32 {
        2_000
    }

    const fn default_max_texture_slots() -> u32 {
        MAX_TEXTURE_UNITS as u32
    }

    const fn default_sample_count() -> u32 {
        1
    }
}

/// Which concrete driver backs the context; resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Wgpu,
    /// CPU bookkeeping only; tests and CI.
    Headless,
}

impl Default for DriverKind {
    fn default() -> Self {
        DriverKind::Wgpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            max_quads: 0,
            max_lines: 0,
            max_texture_slots: 1,
            sample_count: 0,
            driver: DriverKind::Headless,
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();

        assert_eq!(validated.max_quads, RenderSettings::default().max_quads);
        assert_eq!(validated.max_lines, RenderSettings::default().max_lines);
        assert_eq!(
            validated.max_texture_slots,
            RenderSettings::default().max_texture_slots
        );
        assert_eq!(validated.sample_count, 1);
        assert_eq!(validated.driver, DriverKind::Headless);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            max_quads: 5_000,
            max_lines: 500,
            max_texture_slots: 8,
            sample_count: 4,
            driver: DriverKind::Wgpu,
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.max_quads, valid.max_quads);
        assert_eq!(validated.max_lines, valid.max_lines);
        assert_eq!(validated.max_texture_slots, valid.max_texture_slots);
        assert_eq!(validated.sample_count, valid.sample_count);
    }

    #[test]
    fn oversized_slot_count_is_rejected() {
        let settings = RenderSettings {
            max_texture_slots: 64,
            ..RenderSettings::default()
        };
        assert_eq!(
            settings.validate().max_texture_slots,
            RenderSettings::default().max_texture_slots
        );
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = RenderSettings {
            max_quads: 123,
            driver: DriverKind::Headless,
            ..RenderSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: RenderSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_quads, 123);
        assert_eq!(parsed.driver, DriverKind::Headless);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let parsed: RenderSettings = serde_json::from_str(r#"{"max_quads": 64}"#).unwrap();
        assert_eq!(parsed.max_quads, 64);
        assert_eq!(
            parsed.max_texture_slots,
            RenderSettings::default().max_texture_slots
        );
        assert_eq!(parsed.driver, DriverKind::Wgpu);
    }
}
