use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_point_shadow_map_size")]
    pub point_shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_frame_count")]
    pub frame_count: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            point_shadow_map_size: Self::default_point_shadow_map_size(),
            frame_count: Self::default_frame_count(),
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

    fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.point_shadow_map_size == 0 {
            warn!("Point shadow map size must be greater than zero. Using default value.");
            self.point_shadow_map_size = Self::default_point_shadow_map_size();
        }

        if self.frame_count == 0 {
            warn!("Frame count must be greater than zero. Using default value.");
            self.frame_count = Self::default_frame_count();
        }

        self
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    const fn default_point_shadow_map_size() -> u32 {
        1024
    }

    const fn default_frame_count() -> u32 {
        300
    }
}
