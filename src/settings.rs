use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::error::{OcrWarning, Result};
use crate::sink::{TracingSink, WarningSink};

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

/// What to do when a page exceeds the encoding-fallback threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingPolicy {
    /// Record an [`OcrWarning::EncodingIssues`] and keep going.
    #[default]
    Warn,
    /// Fail the whole operation with `OcrError::EncodingFailure`.
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontConfig {
    /// One of the standard PDF families: Helvetica, Times, Courier.
    pub family: String,
    /// "", "B", "I" or "BI".
    pub style: String,
    /// Base point size before width scaling.
    pub size: f64,
    /// Baseline offset from the box top, as a fraction of the font size.
    pub ascent_ratio: f64,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "Helvetica".to_string(),
            style: String::new(),
            size: 10.0,
            ascent_ratio: 0.718,
        }
    }
}

#[derive(Clone)]
pub struct OcrConfig {
    /// Visible red text plus an outline around every word box.
    pub debug: bool,
    /// Proceed even when the target PDF already has an OCR layer.
    pub force: bool,
    /// Abort when the target PDF already has an OCR layer, unless `force`.
    pub strict: bool,
    /// 1-based page of the source PDF that receives the first hOCR page.
    pub start_page: usize,
    /// Base name for created layers and for detection.
    pub layer_name: String,
    pub font: FontConfig,
    pub log_warnings: bool,
    /// Log the head of the source PDF and its first `/OCG` context.
    pub dump_pdf: bool,
    pub encoding_policy: EncodingPolicy,
    /// Where warnings go when `log_warnings` is set; `None` means `tracing`.
    pub warning_sink: Option<Arc<dyn WarningSink>>,
}

static EMBEDDED_DEFAULTS: LazyLock<OcrConfig> = LazyLock::new(|| {
    let mut config = OcrConfig::builtin();
    match toml::from_str::<SettingsFile>(DEFAULT_SETTINGS_TOML) {
        Ok(parsed) => config.merge(parsed),
        Err(err) => debug!("embedded settings.toml is invalid: {}", err),
    }
    config
});

/// Values from the embedded `settings.toml`.
impl Default for OcrConfig {
    fn default() -> Self {
        EMBEDDED_DEFAULTS.clone()
    }
}

impl OcrConfig {
    fn builtin() -> Self {
        Self {
            debug: false,
            force: false,
            strict: false,
            start_page: 1,
            layer_name: "OCR Text".to_string(),
            font: FontConfig::default(),
            log_warnings: true,
            dump_pdf: false,
            encoding_policy: EncodingPolicy::Warn,
            warning_sink: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("debug", &self.debug)
            .field("force", &self.force)
            .field("strict", &self.strict)
            .field("start_page", &self.start_page)
            .field("layer_name", &self.layer_name)
            .field("font", &self.font)
            .field("log_warnings", &self.log_warnings)
            .field("dump_pdf", &self.dump_pdf)
            .field("encoding_policy", &self.encoding_policy)
            .field("warning_sink", &self.warning_sink.is_some())
            .finish()
    }
}

impl OcrConfig {
    pub fn with_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warning_sink = Some(sink);
        self
    }

    /// Layer name for the n-th (1-based) page of the output document.
    pub fn page_layer_name(&self, page_number: usize) -> String {
        format!("{} (Page {})", self.layer_name, page_number)
    }

    pub(crate) fn emit(&self, warning: &OcrWarning) {
        self.notify(&warning.to_string());
    }

    pub(crate) fn notify(&self, message: &str) {
        if !self.log_warnings {
            return;
        }
        match &self.warning_sink {
            Some(sink) => sink.warn(message),
            None => TracingSink.warn(message),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: SettingsFile =
            toml::from_str(content).with_context(|| "failed to parse OCR settings")?;
        let mut config = Self::default();
        config.merge(parsed);
        Ok(config)
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(debug) = ocr.debug {
                self.debug = debug;
            }
            if let Some(force) = ocr.force {
                self.force = force;
            }
            if let Some(strict) = ocr.strict {
                self.strict = strict;
            }
            if let Some(start_page) = ocr.start_page {
                if start_page > 0 {
                    self.start_page = start_page;
                }
            }
            if let Some(name) = ocr.layer_name {
                if !name.trim().is_empty() {
                    self.layer_name = name;
                }
            }
            if let Some(log_warnings) = ocr.log_warnings {
                self.log_warnings = log_warnings;
            }
            if let Some(dump_pdf) = ocr.dump_pdf {
                self.dump_pdf = dump_pdf;
            }
            if let Some(policy) = ocr.encoding_policy {
                self.encoding_policy = policy;
            }
        }
        if let Some(font) = incoming.font {
            if let Some(family) = font.family {
                if !family.trim().is_empty() {
                    self.font.family = family;
                }
            }
            if let Some(style) = font.style {
                self.font.style = style;
            }
            if let Some(size) = font.size {
                if size > 0.0 {
                    self.font.size = size;
                }
            }
            if let Some(ratio) = font.ascent_ratio {
                if ratio > 0.0 {
                    self.font.ascent_ratio = ratio;
                }
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    font: Option<FontSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    debug: Option<bool>,
    force: Option<bool>,
    strict: Option<bool>,
    start_page: Option<usize>,
    layer_name: Option<String>,
    log_warnings: Option<bool>,
    dump_pdf: Option<bool>,
    encoding_policy: Option<EncodingPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    family: Option<String>,
    style: Option<String>,
    size: Option<f64>,
    ascent_ratio: Option<f64>,
}

/// Loads `ocr.toml`, `ocr.local.toml` and `extra_path`, later files winning.
pub fn load_config(extra_path: Option<&Path>) -> Result<OcrConfig> {
    Ok(read_config_files(extra_path)?)
}

fn read_config_files(extra_path: Option<&Path>) -> anyhow::Result<OcrConfig> {
    let mut config = OcrConfig::default();

    let mut ordered_paths = vec![PathBuf::from("ocr.toml"), PathBuf::from("ocr.local.toml")];
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            config.merge(parsed);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_come_from_embedded_settings() {
        let file: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML).expect("parse defaults");
        let ocr = file.ocr.expect("[ocr] table");
        let font = file.font.expect("[font] table");
        let defaults = OcrConfig::default();
        assert_eq!(Some(defaults.layer_name.clone()), ocr.layer_name);
        assert_eq!(Some(defaults.start_page), ocr.start_page);
        assert_eq!(Some(defaults.strict), ocr.strict);
        assert_eq!(Some(defaults.log_warnings), ocr.log_warnings);
        assert_eq!(Some(defaults.encoding_policy), ocr.encoding_policy);
        assert_eq!(Some(defaults.font.family.clone()), font.family);
        assert_eq!(Some(defaults.font.size), font.size);
        assert_eq!(Some(defaults.font.ascent_ratio), font.ascent_ratio);

        let mut shifted = OcrConfig::builtin();
        shifted.layer_name = "Scratch".to_string();
        shifted.font.size = 3.0;
        shifted.merge(toml::from_str(DEFAULT_SETTINGS_TOML).expect("parse defaults"));
        assert_eq!(shifted.layer_name, defaults.layer_name);
        assert_eq!(shifted.font, defaults.font);
    }

    #[test]
    fn partial_file_only_overrides_what_it_sets() {
        let config = OcrConfig::from_toml_str(
            r#"
[ocr]
strict = true
encoding_policy = "abort"

[font]
size = 12.5
"#,
        )
        .expect("parse");
        assert!(config.strict);
        assert!(!config.force);
        assert_eq!(config.encoding_policy, EncodingPolicy::Abort);
        assert_eq!(config.font.size, 12.5);
        assert_eq!(config.font.family, "Helvetica");
        assert_eq!(config.layer_name, "OCR Text");
    }

    #[test]
    fn broken_toml_is_a_config_error() {
        let err = OcrConfig::from_toml_str("[ocr\nstrict = ").expect_err("broken");
        assert!(matches!(err, crate::OcrError::Config(_)));
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = OcrConfig::from_toml_str("[ocr]\nstart_page = 0\nlayer_name = \" \"\n")
            .expect("parse");
        assert_eq!(config.start_page, 1);
        assert_eq!(config.layer_name, "OCR Text");
    }

    #[test]
    fn load_config_requires_explicit_path_to_exist() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(crate::OcrError::Config(_))
        ));

        let path = dir.path().join("custom.toml");
        fs::write(&path, "[ocr]\nlayer_name = \"Scan Text\"\n").expect("write settings");
        let config = load_config(Some(&path)).expect("load");
        assert_eq!(config.layer_name, "Scan Text");
        assert_eq!(config.page_layer_name(3), "Scan Text (Page 3)");
    }
}
