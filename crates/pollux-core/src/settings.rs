// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Global settings for the lighting core.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A collection of global settings that shape the lighting passes.
///
/// Every field has a default, so a settings file only needs the values it
/// overrides:
///
/// ```
/// use pollux_core::settings::RenderSettings;
///
/// let settings = RenderSettings::from_ron_str("(lpv_propagation_steps: 4)").unwrap();
/// assert_eq!(settings.lpv_propagation_steps, 4);
/// assert!(settings.gi_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Master switch for the global-illumination chains.
    pub gi_enabled: bool,
    /// Number of propagation passes in a light propagation volume.
    pub lpv_propagation_steps: u32,
    /// Edge length, in cells, of a light propagation volume.
    pub lpv_grid_size: u32,
    /// Number of samples taken per pixel by reflective shadow maps.
    pub rsm_sample_count: u32,
    /// Edge length, in texels, of a shadow map.
    pub shadow_map_size: u32,
    /// Number of light records reserved per light type in the light buffer.
    pub max_lights_per_type: u32,
    /// Size of the lighting render targets.
    pub render_size: (u32, u32),
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            gi_enabled: true,
            lpv_propagation_steps: 8,
            lpv_grid_size: 32,
            rsm_sample_count: 32,
            shadow_map_size: 2048,
            max_lights_per_type: 64,
            render_size: (1280, 720),
        }
    }
}

impl RenderSettings {
    /// Parses settings from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).context("Invalid render settings")
    }

    /// Loads settings from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read render settings from '{}'", path.display()))?;
        let settings = Self::from_ron_str(&text)
            .with_context(|| format!("Failed to parse '{}'", path.display()))?;
        log::info!("Loaded render settings from '{}'", path.display());
        Ok(settings)
    }

    /// Serialises the settings as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).context("Failed to serialise render settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let settings = RenderSettings::from_ron_str("()").unwrap();
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn text_round_trips() {
        let settings = RenderSettings {
            gi_enabled: false,
            render_size: (640, 480),
            ..Default::default()
        };
        let text = settings.to_ron_string().unwrap();
        assert_eq!(RenderSettings::from_ron_str(&text).unwrap(), settings);
    }

    #[test]
    fn invalid_text_is_an_error() {
        assert!(RenderSettings::from_ron_str("(gi_enabled: 12)").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RenderSettings::load("/definitely/not/here.ron").unwrap_err();
        assert!(format!("{err}").contains("Failed to read render settings"));
    }
}
