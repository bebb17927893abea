use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::LedgerLeafError;
use crate::font::{FontRegistry, SANS, SANS_BOLD};
use crate::theme::Theme;
use crate::types::{Color, Size};

pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to generate PDF. Please try again.";

/// Settings for the generation pipeline. Built through
/// [`GeneratorConfig::builder`], which validates everything up front.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub page_size: Size,
    pub capture_scale: f32,
    pub settle_delay: Duration,
    pub light_background: Color,
    pub dark_background: Color,
    pub allow_cross_origin: bool,
    pub font_file: Option<PathBuf>,
    pub bold_font_file: Option<PathBuf>,
    pub system_fonts: bool,
    pub perf_log: Option<PathBuf>,
    pub failure_message: String,
}

impl GeneratorConfig {
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::new()
    }

    pub fn background(&self, theme: Theme) -> Color {
        match theme {
            Theme::Light => self.light_background,
            Theme::Dark => self.dark_background,
        }
    }

    /// Font registry with the configured regular and bold faces.
    pub fn load_fonts(&self) -> Result<FontRegistry, LedgerLeafError> {
        let mut registry = FontRegistry::new();
        registry.set_system_fallback(self.system_fonts);
        if let Some(path) = &self.font_file {
            registry.register_file(SANS, path)?;
        }
        if let Some(path) = &self.bold_font_file {
            registry.register_file(SANS_BOLD, path)?;
        }
        Ok(registry)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfigBuilder::new().into_config()
    }
}

pub struct GeneratorConfigBuilder {
    page_size: Size,
    capture_scale: f32,
    settle_delay: Duration,
    light_background: Color,
    dark_background: Color,
    allow_cross_origin: bool,
    font_file: Option<PathBuf>,
    bold_font_file: Option<PathBuf>,
    system_fonts: bool,
    perf_log: Option<PathBuf>,
    failure_message: String,
}

impl GeneratorConfigBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            capture_scale: 2.0,
            settle_delay: Duration::from_millis(500),
            light_background: Color::rgb8(0xff, 0xff, 0xff),
            dark_background: Color::rgb8(0x09, 0x09, 0x0b),
            allow_cross_origin: true,
            font_file: None,
            bold_font_file: None,
            system_fonts: true,
            perf_log: None,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn capture_scale(mut self, scale: f32) -> Self {
        self.capture_scale = scale;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn light_background(mut self, color: Color) -> Self {
        self.light_background = color;
        self
    }

    pub fn dark_background(mut self, color: Color) -> Self {
        self.dark_background = color;
        self
    }

    pub fn allow_cross_origin(mut self, enabled: bool) -> Self {
        self.allow_cross_origin = enabled;
        self
    }

    pub fn font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    pub fn bold_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.bold_font_file = Some(path.into());
        self
    }

    // Off makes text rendering depend only on registered font files.
    pub fn system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_log = Some(path.into());
        self
    }

    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    fn into_config(self) -> GeneratorConfig {
        GeneratorConfig {
            page_size: self.page_size,
            capture_scale: self.capture_scale,
            settle_delay: self.settle_delay,
            light_background: self.light_background,
            dark_background: self.dark_background,
            allow_cross_origin: self.allow_cross_origin,
            font_file: self.font_file,
            bold_font_file: self.bold_font_file,
            system_fonts: self.system_fonts,
            perf_log: self.perf_log,
            failure_message: self.failure_message,
        }
    }

    pub fn build(self) -> Result<GeneratorConfig, LedgerLeafError> {
        if !self.page_size.is_positive() {
            return Err(LedgerLeafError::InvalidConfiguration(format!(
                "page size must be positive, got {}x{}pt",
                self.page_size.width.to_f32(),
                self.page_size.height.to_f32()
            )));
        }
        if !self.capture_scale.is_finite() || self.capture_scale <= 0.0 {
            return Err(LedgerLeafError::InvalidConfiguration(format!(
                "capture_scale must be > 0, got {}",
                self.capture_scale
            )));
        }
        if self.failure_message.trim().is_empty() {
            return Err(LedgerLeafError::InvalidConfiguration(
                "failure_message cannot be empty".to_string(),
            ));
        }
        Ok(self.into_config())
    }
}

impl Default for GeneratorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk overrides, all optional:
///
/// ```toml
/// page = "a4"            # or "letter"
/// page_width_pt = 595.28 # custom size, both dimensions required
/// page_height_pt = 841.89
/// capture_scale = 2.0
/// settle_delay_ms = 500
/// light_background = "#ffffff"
/// dark_background = "#09090b"
/// allow_cross_origin = true
/// font_file = "fonts/Inter-Regular.ttf"
/// bold_font_file = "fonts/Inter-Bold.ttf"
/// system_fonts = true
/// perf_log = "perf.jsonl"
/// failure_message = "Failed to generate PDF. Please try again."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub page: Option<String>,
    pub page_width_pt: Option<f32>,
    pub page_height_pt: Option<f32>,
    pub capture_scale: Option<f32>,
    pub settle_delay_ms: Option<u64>,
    pub light_background: Option<String>,
    pub dark_background: Option<String>,
    pub allow_cross_origin: Option<bool>,
    pub font_file: Option<PathBuf>,
    pub bold_font_file: Option<PathBuf>,
    pub system_fonts: Option<bool>,
    pub perf_log: Option<PathBuf>,
    pub failure_message: Option<String>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self, LedgerLeafError> {
        toml::from_str(text).map_err(|e| LedgerLeafError::InvalidConfiguration(e.to_string()))
    }

    /// Reads a config file. Relative font and log paths resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, LedgerLeafError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LedgerLeafError::InvalidConfiguration(format!("{}: {e}", path.display()))
        })?;
        let mut file = Self::parse(&text)?;
        if let Some(base) = path.parent() {
            for slot in [
                &mut file.font_file,
                &mut file.bold_font_file,
                &mut file.perf_log,
            ] {
                if let Some(p) = slot.as_mut() {
                    if p.is_relative() {
                        *p = base.join(&*p);
                    }
                }
            }
        }
        Ok(file)
    }

    pub fn apply(
        self,
        mut builder: GeneratorConfigBuilder,
    ) -> Result<GeneratorConfigBuilder, LedgerLeafError> {
        if let Some(page) = self.page.as_deref() {
            builder = builder.page_size(named_page_size(page)?);
        }
        match (self.page_width_pt, self.page_height_pt) {
            (Some(w), Some(h)) => builder = builder.page_size(Size::new(w, h)),
            (None, None) => {}
            _ => {
                return Err(LedgerLeafError::InvalidConfiguration(
                    "page_width_pt and page_height_pt must be set together".to_string(),
                ));
            }
        }
        if let Some(scale) = self.capture_scale {
            builder = builder.capture_scale(scale);
        }
        if let Some(ms) = self.settle_delay_ms {
            builder = builder.settle_delay(Duration::from_millis(ms));
        }
        if let Some(raw) = self.light_background.as_deref() {
            builder = builder.light_background(parse_color("light_background", raw)?);
        }
        if let Some(raw) = self.dark_background.as_deref() {
            builder = builder.dark_background(parse_color("dark_background", raw)?);
        }
        if let Some(enabled) = self.allow_cross_origin {
            builder = builder.allow_cross_origin(enabled);
        }
        if let Some(path) = self.font_file {
            builder = builder.font_file(path);
        }
        if let Some(path) = self.bold_font_file {
            builder = builder.bold_font_file(path);
        }
        if let Some(enabled) = self.system_fonts {
            builder = builder.system_fonts(enabled);
        }
        if let Some(path) = self.perf_log {
            builder = builder.perf_log(path);
        }
        if let Some(message) = self.failure_message {
            builder = builder.failure_message(message);
        }
        Ok(builder)
    }
}

fn named_page_size(raw: &str) -> Result<Size, LedgerLeafError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "a4" => Ok(Size::a4()),
        "letter" => Ok(Size::letter()),
        other => Err(LedgerLeafError::InvalidConfiguration(format!(
            "unknown page size {other:?} (expected a4 or letter)"
        ))),
    }
}

fn parse_color(key: &str, raw: &str) -> Result<Color, LedgerLeafError> {
    Color::from_hex(raw).ok_or_else(|| {
        LedgerLeafError::InvalidConfiguration(format!("{key}: {raw:?} is not a #rgb or #rrggbb color"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn defaults_match_export_contract() {
        let config = GeneratorConfig::builder().build().expect("config");
        assert_eq!(config.page_size, Size::a4());
        assert_eq!(config.capture_scale, 2.0);
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.background(Theme::Light).to_rgb8(), [255, 255, 255]);
        assert_eq!(config.background(Theme::Dark).to_rgb8(), [9, 9, 11]);
        assert!(config.allow_cross_origin);
        assert_eq!(config.failure_message, DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn build_rejects_invalid_values() {
        let err = GeneratorConfig::builder()
            .capture_scale(0.0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
        assert!(
            GeneratorConfig::builder()
                .page_size(Size::new(0.0, 100.0))
                .build()
                .is_err()
        );
        assert!(
            GeneratorConfig::builder()
                .failure_message(" ")
                .build()
                .is_err()
        );
    }

    #[test]
    fn file_overrides_builder_defaults() {
        let file = ConfigFile::parse(
            r##"
page = "letter"
capture_scale = 3.0
settle_delay_ms = 0
dark_background = "#000"
allow_cross_origin = false
"##,
        )
        .expect("parse");
        let config = file
            .apply(GeneratorConfig::builder())
            .expect("apply")
            .build()
            .expect("build");
        assert_eq!(config.page_size, Size::letter());
        assert_eq!(config.capture_scale, 3.0);
        assert_eq!(config.settle_delay, Duration::ZERO);
        assert_eq!(config.dark_background.to_rgb8(), [0, 0, 0]);
        assert!(!config.allow_cross_origin);
    }

    #[test]
    fn file_errors_are_configuration_errors() {
        assert!(ConfigFile::parse("unknown_key = 1").is_err());
        let bad_color = ConfigFile::parse("light_background = \"white\"").expect("parse");
        assert!(bad_color.apply(GeneratorConfig::builder()).is_err());
        let multibyte = ConfigFile::parse("light_background = \"#aééb\"").expect("parse");
        let err = multibyte.apply(GeneratorConfig::builder()).err().expect("rejected");
        assert_eq!(err.kind(), FailureKind::Config);
        let half_size = ConfigFile::parse("page_width_pt = 100.0").expect("parse");
        assert!(half_size.apply(GeneratorConfig::builder()).is_err());
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledgerleaf.toml");
        std::fs::write(&path, "perf_log = \"perf.jsonl\"\n").expect("write");
        let file = ConfigFile::load(&path).expect("load");
        assert_eq!(file.perf_log, Some(dir.path().join("perf.jsonl")));
    }

    #[test]
    fn missing_font_file_fails_font_loading() {
        let config = GeneratorConfig::builder()
            .font_file("/definitely/not/here.ttf")
            .build()
            .expect("config");
        assert!(config.load_fonts().is_err());
    }
}
