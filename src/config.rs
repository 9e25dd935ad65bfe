//! Runtime configuration.
//!
//! Settings are layered: an optional TOML file named by `MOTIONVIEW_CONFIG`,
//! then `MOTIONVIEW_*` environment variables, then command-line overrides.
//! Later layers win. The merged configuration is validated once before the
//! pipeline starts.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

const CONFIG_ENV: &str = "MOTIONVIEW_CONFIG";

const DEFAULT_MIN_AREA: u32 = 100;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    video: Option<String>,
    min_area: Option<u32>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    privacy_blur: Option<bool>,
    headless: Option<bool>,
    fps: Option<f64>,
}

/// Command-line layer. Flags that were not given leave the lower layers
/// untouched; boolean flags only ever turn a mode on.
#[derive(Debug, Default)]
pub struct Overrides {
    pub video: Option<String>,
    pub min_area: Option<u32>,
    pub privacy_blur: bool,
    pub headless: bool,
    pub fps: Option<f64>,
}

/// Fully merged, validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the video to analyze (or a `stub://` synthetic source).
    pub video: String,
    /// Minimum contour area, in pixels, for a region to count as motion.
    pub min_area: u32,
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub privacy_blur: bool,
    pub headless: bool,
    /// Presentation rate override. When absent the source's reported rate is
    /// used, with a fallback of 30.
    pub fps_override: Option<f64>,
}

impl AppConfig {
    /// Load and merge all layers, then validate.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let file_cfg = match std::env::var(CONFIG_ENV).ok() {
            Some(path) => read_config_file(Path::new(&path))?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let render = file.render.unwrap_or_default();
        Self {
            video: file.video.unwrap_or_default(),
            min_area: file.min_area.unwrap_or(DEFAULT_MIN_AREA),
            render: RenderSettings {
                privacy_blur: render.privacy_blur.unwrap_or(false),
                headless: render.headless.unwrap_or(false),
                fps_override: render.fps,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(video) = std::env::var("MOTIONVIEW_VIDEO") {
            self.video = video;
        }
        if let Ok(min_area) = std::env::var("MOTIONVIEW_MIN_AREA") {
            self.min_area = min_area
                .parse()
                .context("MOTIONVIEW_MIN_AREA must be an integer")?;
        }
        if let Ok(headless) = std::env::var("MOTIONVIEW_HEADLESS") {
            self.render.headless = headless == "1" || headless.eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(video) = overrides.video {
            self.video = video;
        }
        if let Some(min_area) = overrides.min_area {
            self.min_area = min_area;
        }
        if overrides.privacy_blur {
            self.render.privacy_blur = true;
        }
        if overrides.headless {
            self.render.headless = true;
        }
        if let Some(fps) = overrides.fps {
            self.render.fps_override = Some(fps);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.video.is_empty() {
            return Err(anyhow!(
                "no video source configured (use --video, MOTIONVIEW_VIDEO, or the config file)"
            ));
        }
        if self.min_area == 0 {
            return Err(anyhow!("min_area must be at least 1"));
        }
        if let Some(fps) = self.render.fps_override {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(anyhow!("fps override must be a positive number"));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("failed to parse config file {}", path.display()))
}

fn parse_config(text: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_file_is_empty() {
        let cfg = AppConfig::from_file(ConfigFile::default());
        assert_eq!(cfg.min_area, DEFAULT_MIN_AREA);
        assert!(cfg.video.is_empty());
        assert!(!cfg.render.privacy_blur);
        assert!(cfg.render.fps_override.is_none());
    }

    #[test]
    fn file_layer_parses_all_sections() {
        let file = parse_config(
            r#"
            video = "clips/door.mp4"
            min_area = 250

            [render]
            privacy_blur = true
            fps = 24.0
            "#,
        )
        .unwrap();
        let cfg = AppConfig::from_file(file);
        assert_eq!(cfg.video, "clips/door.mp4");
        assert_eq!(cfg.min_area, 250);
        assert!(cfg.render.privacy_blur);
        assert_eq!(cfg.render.fps_override, Some(24.0));
    }

    #[test]
    fn cli_layer_wins_over_file_layer() {
        let file = parse_config(r#"video = "clips/a.mp4""#).unwrap();
        let mut cfg = AppConfig::from_file(file);
        cfg.apply_overrides(Overrides {
            video: Some("clips/b.mp4".into()),
            min_area: Some(500),
            ..Overrides::default()
        });
        assert_eq!(cfg.video, "clips/b.mp4");
        assert_eq!(cfg.min_area, 500);
    }

    #[test]
    fn validation_requires_a_video_path() {
        let cfg = AppConfig::from_file(ConfigFile::default());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_min_area() {
        let mut cfg = AppConfig::from_file(ConfigFile::default());
        cfg.video = "clips/a.mp4".into();
        cfg.min_area = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_non_positive_fps() {
        let mut cfg = AppConfig::from_file(ConfigFile::default());
        cfg.video = "clips/a.mp4".into();
        cfg.render.fps_override = Some(0.0);
        assert!(cfg.validate().is_err());
    }
}
