//! Bridge runtime configuration.
//!
//! [`BridgeConfig`] is read once by the binary (YAML file plus environment overrides) and turned
//! into a [`BridgeContext`], which the orchestrator holds for its whole life. Nothing in here
//! touches the environment itself.

use crate::constants::{DEFAULT_DOCUMENT_BATCH_SIZE, DEFAULT_LOCALE};
use crate::{CoreError, CoreResult};
use bridge_wire::{Decoder, Encoder, NumberLocale};
use health_records::{Aggregation, DataType, DefaultUnits, TemperatureScale, Unit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

// ============================================================================
// File schema
// ============================================================================

/// Configuration as written in YAML.
///
/// ```yaml
/// locale: de_DE
/// temperature_scale: celsius
/// unit_overrides:
///   bodyMass: lb
/// combine_aggregation:
///   heartRate: maximum
/// document_batch_size: 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BridgeConfig {
    pub locale: String,
    pub temperature_scale: Option<TemperatureScale>,
    /// Data type identifier to unit symbol.
    pub unit_overrides: BTreeMap<String, String>,
    /// Data type identifier to aggregation name.
    pub combine_aggregation: BTreeMap<String, String>,
    pub document_batch_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.into(),
            temperature_scale: None,
            unit_overrides: BTreeMap::new(),
            combine_aggregation: BTreeMap::new(),
            document_batch_size: DEFAULT_DOCUMENT_BATCH_SIZE,
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from YAML text.
    ///
    /// Schema errors name the offending key path, e.g. `unit_overrides` or `colour`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the YAML is malformed, a field has an unexpected type, or
    /// an unknown key is present.
    pub fn from_yaml(yaml_text: &str) -> CoreResult<Self> {
        if yaml_text.trim().is_empty() {
            return Ok(Self::default());
        }
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        serde_path_to_error::deserialize::<_, BridgeConfig>(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() {
                "<root>"
            } else {
                path.as_str()
            };
            CoreError::Config(format!("config schema mismatch at {path}: {source}"))
        })
    }

    /// Read and parse a YAML config file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(CoreError::ConfigRead)?;
        Self::from_yaml(&text)
    }

    /// Resolve configuration from already-read process inputs.
    ///
    /// `config_path` and `locale` are the values of the config path and locale environment
    /// variables, read once by the binary. A non-empty `locale` wins over the file.
    pub fn resolve(config_path: Option<String>, locale: Option<String>) -> CoreResult<Self> {
        let config_path = config_path
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let mut config = match config_path {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(locale) = locale.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            config.locale = locale;
        }
        Ok(config)
    }
}

// ============================================================================
// Resolved context
// ============================================================================

/// Read-only state shared by every query: default units, locale and combine settings.
#[derive(Debug, Clone)]
pub struct BridgeContext {
    locale: String,
    units: DefaultUnits,
    number_locale: NumberLocale,
    combine: HashMap<DataType, Aggregation>,
    document_batch_size: usize,
}

impl BridgeContext {
    /// Validate `config` and build the shared tables.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for a zero batch size, unknown identifiers or units,
    /// overrides on types without a quantity, unit overrides of the wrong dimension, and unknown
    /// aggregation names.
    pub fn from_config(config: &BridgeConfig) -> CoreResult<Self> {
        if config.document_batch_size == 0 {
            return Err(CoreError::Config(
                "document_batch_size must be at least 1".into(),
            ));
        }
        let locale = config.locale.trim();
        if locale.is_empty() {
            return Err(CoreError::Config("locale cannot be empty".into()));
        }

        let scale = config
            .temperature_scale
            .unwrap_or_else(|| TemperatureScale::for_locale(locale));
        let mut units = DefaultUnits::new(scale).map_err(config_error("temperature_scale"))?;
        for (identifier, symbol) in &config.unit_overrides {
            let field = format!("unit_overrides.{identifier}");
            let data_type = DataType::parse(identifier).map_err(config_error(&field))?;
            let unit = Unit::parse(symbol).map_err(config_error(&field))?;
            units = units
                .with_override(data_type, unit)
                .map_err(config_error(&field))?;
        }

        let mut combine = HashMap::new();
        for (identifier, name) in &config.combine_aggregation {
            let field = format!("combine_aggregation.{identifier}");
            let data_type = DataType::parse(identifier).map_err(config_error(&field))?;
            if !data_type.is_quantity() {
                return Err(CoreError::Config(format!(
                    "{field}: {data_type} is not a quantity type"
                )));
            }
            let aggregation = Aggregation::parse(name).map_err(config_error(&field))?;
            combine.insert(data_type, aggregation);
        }

        tracing::debug!(
            "bridge context ready: locale={locale}, temperature={}, {} unit override(s)",
            units.temperature_unit(),
            config.unit_overrides.len()
        );

        Ok(Self {
            locale: locale.to_owned(),
            units,
            number_locale: NumberLocale::for_identifier(locale),
            combine,
            document_batch_size: config.document_batch_size,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn units(&self) -> &DefaultUnits {
        &self.units
    }

    pub fn encoder(&self) -> Encoder<'_> {
        Encoder::new(&self.units)
    }

    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.number_locale.clone())
    }

    /// Aggregation used when combining samples of `data_type`.
    pub fn combine_aggregation(&self, data_type: &DataType) -> Aggregation {
        self.combine.get(data_type).copied().unwrap_or_else(|| {
            data_type
                .aggregation_style()
                .map(Aggregation::default_for)
                .unwrap_or(Aggregation::Sum)
        })
    }

    pub fn document_batch_size(&self) -> usize {
        self.document_batch_size
    }
}

fn config_error<E: std::fmt::Display>(field: &str) -> impl Fn(E) -> CoreError + '_ {
    move |err| CoreError::Config(format!("{field}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_is_the_default() {
        let config = BridgeConfig::from_yaml("").expect("empty config");
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.document_batch_size, DEFAULT_DOCUMENT_BATCH_SIZE);
    }

    #[test]
    fn unknown_keys_report_their_path() {
        let err = BridgeConfig::from_yaml("locale: en_GB\ncolour: blue\n").expect_err("unknown key");
        let CoreError::Config(message) = err else {
            panic!("expected config error");
        };
        assert!(message.contains("schema mismatch"), "{message}");
        assert!(message.contains("colour"), "{message}");
    }

    #[test]
    fn loads_from_file_and_locale_override_wins() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "locale: de_DE\nunit_overrides:\n  bodyMass: lb\ndocument_batch_size: 3")
            .expect("write config");
        let path = file.path().to_string_lossy().into_owned();

        let config = BridgeConfig::resolve(Some(path.clone()), None).expect("loads");
        assert_eq!(config.locale, "de_DE");
        assert_eq!(config.document_batch_size, 3);

        let config = BridgeConfig::resolve(Some(path), Some("fr_FR".into())).expect("loads");
        assert_eq!(config.locale, "fr_FR");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.yaml").to_string_lossy().into_owned();
        let err = BridgeConfig::resolve(Some(path), None).expect_err("no file");
        assert!(matches!(err, CoreError::ConfigRead(_)));
    }

    #[test]
    fn context_follows_locale_and_overrides() {
        let mut config = BridgeConfig {
            locale: "en_US".into(),
            ..BridgeConfig::default()
        };
        config.unit_overrides.insert("bodyMass".into(), "lb".into());
        config
            .combine_aggregation
            .insert("heartRate".into(), "maximum".into());

        let context = BridgeContext::from_config(&config).expect("valid config");
        assert_eq!(context.units().temperature_unit().symbol(), "degF");
        let body_mass = DataType::parse("bodyMass").expect("known");
        assert_eq!(context.units().resolve(&body_mass).expect("unit").symbol(), "lb");

        let heart_rate = DataType::parse("heartRate").expect("known");
        assert_eq!(context.combine_aggregation(&heart_rate), Aggregation::Maximum);
        let steps = DataType::parse("stepCount").expect("known");
        assert_eq!(context.combine_aggregation(&steps), Aggregation::Sum);
        let mass = DataType::parse("leanBodyMass").expect("known");
        assert_eq!(context.combine_aggregation(&mass), Aggregation::Average);
    }

    #[test]
    fn temperature_scale_overrides_locale() {
        let config = BridgeConfig {
            locale: "en_US".into(),
            temperature_scale: Some(TemperatureScale::Celsius),
            ..BridgeConfig::default()
        };
        let context = BridgeContext::from_config(&config).expect("valid config");
        assert_eq!(context.units().temperature_unit().symbol(), "degC");
    }

    #[test]
    fn invalid_settings_are_rejected_eagerly() {
        let cases = [
            ("document_batch_size: 0", "document_batch_size"),
            ("unit_overrides:\n  bogus: kg", "unit_overrides.bogus"),
            ("unit_overrides:\n  bodyMass: furlong", "unit_overrides.bodyMass"),
            ("unit_overrides:\n  bodyMass: m", "unit_overrides.bodyMass"),
            ("combine_aggregation:\n  sleepAnalysis: sum", "combine_aggregation.sleepAnalysis"),
            ("combine_aggregation:\n  stepCount: median", "combine_aggregation.stepCount"),
        ];
        for (yaml, field) in cases {
            let config = BridgeConfig::from_yaml(yaml).expect("schema is fine");
            let err = BridgeContext::from_config(&config).expect_err(yaml);
            let CoreError::Config(message) = err else {
                panic!("expected config error for {yaml}");
            };
            assert!(message.starts_with(field), "{yaml}: {message}");
        }
    }
}
