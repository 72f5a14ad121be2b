//! Sandbox settings and preferences
//!
//! Persisted separately from scenes: LocalStorage on the web, an optional
//! JSON file on native.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_PARTICLES, TRAIL_LENGTH};

/// Rendering detail; trades particle and trail density for speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Live particle budget
    pub fn max_particles(&self) -> usize {
        MAX_PARTICLES / self.particle_divisor()
    }

    fn particle_divisor(&self) -> usize {
        match self {
            QualityPreset::Low => 8,
            QualityPreset::Medium => 2,
            QualityPreset::High => 1,
        }
    }

    /// Fraction of `TRAIL_LENGTH` kept per ball
    pub fn trail_quality(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.25,
            QualityPreset::Medium => 0.6,
            QualityPreset::High => 1.0,
        }
    }
}

/// User preferences; unknown JSON fields are ignored, missing ones defaulted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quality: QualityPreset,
    /// Draw ball trails
    pub trails: bool,
    /// Hit and wake-up bursts
    pub particles: bool,
    /// 0-1
    pub master_volume: f32,
    /// 0-1, applied to notes on top of master
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,
            trails: true,
            particles: true,
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

/// LocalStorage key
#[cfg(target_arch = "wasm32")]
const STORAGE_KEY: &str = "marble_run_settings";

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

impl Settings {
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Particle cap after the particles toggle
    pub fn max_particles(&self) -> usize {
        if self.particles {
            self.quality.max_particles()
        } else {
            0
        }
    }

    /// Trail points per ball after the trails toggle
    pub fn trail_length(&self) -> usize {
        if self.trails {
            (TRAIL_LENGTH as f32 * self.quality.trail_quality()).round() as usize
        } else {
            0
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    /// Volumes forced into 0-1
    fn sanitized(mut self) -> Self {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 };
        self.master_volume = unit(self.master_volume);
        self.sfx_volume = unit(self.sfx_volume);
        self
    }

    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let stored = local_storage()
            .and_then(|storage| storage.get_item(STORAGE_KEY).ok().flatten())
            .and_then(|json| match Self::from_json(&json) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    log::warn!("Ignoring stored settings: {e}");
                    None
                }
            });
        match stored {
            Some(settings) => {
                log::info!("Loaded settings ({} quality)", settings.quality.as_str());
                settings
            }
            None => Self::default(),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let (Some(storage), Ok(json)) = (local_storage(), serde_json::to_string(self)) else {
            return;
        };
        if storage.set_item(STORAGE_KEY, &json).is_err() {
            log::warn!("Failed to persist settings");
        }
    }

    /// Native builds take settings from a file passed to the binary
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {}
}
