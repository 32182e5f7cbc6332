//! Default-unit resolution.
//!
//! Every quantity leaves the bridge in the default unit of its data type so two documents for
//! the same identifier are always comparable. [`DefaultUnits`] is built once at startup and
//! shared read-only afterwards.

use crate::data_types::{DataType, UnitRule};
use crate::units::Unit;
use crate::{RecordsError, RecordsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Regions whose convention is Fahrenheit.
const FAHRENHEIT_REGIONS: &[&str] = &["US", "LR", "MM"];

/// Temperature scale used for temperature-typed quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureScale {
    Celsius,
    Fahrenheit,
}

impl TemperatureScale {
    /// Conventional scale for a locale identifier such as `en_US` or `de-DE`.
    ///
    /// Locales without a region fall back to Celsius.
    pub fn for_locale(locale: &str) -> Self {
        let region = locale
            .split(['_', '-'])
            .nth(1)
            .map(str::to_ascii_uppercase)
            .unwrap_or_default();
        if FAHRENHEIT_REGIONS.contains(&region.as_str()) {
            TemperatureScale::Fahrenheit
        } else {
            TemperatureScale::Celsius
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureScale::Celsius => "degC",
            TemperatureScale::Fahrenheit => "degF",
        }
    }
}

/// Process-wide map from data type to its default unit.
#[derive(Debug, Clone)]
pub struct DefaultUnits {
    temperature: Unit,
    overrides: HashMap<DataType, Unit>,
}

impl DefaultUnits {
    pub fn new(scale: TemperatureScale) -> RecordsResult<Self> {
        Ok(Self {
            temperature: Unit::parse(scale.symbol())?,
            overrides: HashMap::new(),
        })
    }

    pub fn for_locale(locale: &str) -> RecordsResult<Self> {
        Self::new(TemperatureScale::for_locale(locale))
    }

    /// Replace the default unit of one quantity type.
    ///
    /// # Errors
    ///
    /// - [`RecordsError::NoDefaultUnit`] if `data_type` is not a quantity type.
    /// - [`RecordsError::IncompatibleUnits`] if `unit` measures a different dimension than the
    ///   built-in default.
    pub fn with_override(mut self, data_type: DataType, unit: Unit) -> RecordsResult<Self> {
        let builtin = self.builtin(&data_type)?;
        if !builtin.is_compatible_with(&unit) {
            return Err(RecordsError::IncompatibleUnits {
                from: builtin.symbol().to_owned(),
                to: unit.symbol().to_owned(),
            });
        }
        self.overrides.insert(data_type, unit);
        Ok(self)
    }

    /// Default unit for `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::NoDefaultUnit`] when the type carries no quantity.
    pub fn resolve(&self, data_type: &DataType) -> RecordsResult<Unit> {
        if let Some(unit) = self.overrides.get(data_type) {
            return Ok(*unit);
        }
        self.builtin(data_type)
    }

    /// Resolve straight from a host identifier string.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::UnknownDataType`] for identifiers outside the catalogue, then
    /// behaves as [`DefaultUnits::resolve`].
    pub fn resolve_identifier(&self, identifier: &str) -> RecordsResult<Unit> {
        let data_type = DataType::parse(identifier)?;
        self.resolve(&data_type)
    }

    pub fn temperature_unit(&self) -> Unit {
        self.temperature
    }

    fn builtin(&self, data_type: &DataType) -> RecordsResult<Unit> {
        match data_type.unit_rule() {
            UnitRule::Fixed(symbol) => Unit::parse(symbol),
            UnitRule::Temperature => Ok(self.temperature),
            UnitRule::Unitless => {
                tracing::debug!(identifier = data_type.identifier(), "no default unit");
                Err(RecordsError::NoDefaultUnit(
                    data_type.identifier().to_owned(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(scale: TemperatureScale) -> DefaultUnits {
        DefaultUnits::new(scale).expect("temperature units are registered")
    }

    #[test]
    fn every_quantity_type_resolves() {
        let table = units(TemperatureScale::Celsius);
        for data_type in DataType::all().filter(DataType::is_quantity) {
            table
                .resolve(&data_type)
                .unwrap_or_else(|e| panic!("{data_type} failed to resolve: {e}"));
        }
    }

    #[test]
    fn temperature_follows_locale() {
        assert_eq!(TemperatureScale::for_locale("en_US"), TemperatureScale::Fahrenheit);
        assert_eq!(TemperatureScale::for_locale("es-us"), TemperatureScale::Fahrenheit);
        assert_eq!(TemperatureScale::for_locale("en_GB"), TemperatureScale::Celsius);
        assert_eq!(TemperatureScale::for_locale("fr"), TemperatureScale::Celsius);

        let us = DefaultUnits::for_locale("en_US").expect("table");
        let unit = us.resolve_identifier("bodyTemperature").expect("temperature type");
        assert_eq!(unit.symbol(), "degF");

        let de = DefaultUnits::for_locale("de_DE").expect("table");
        let unit = de.resolve_identifier("bodyTemperature").expect("temperature type");
        assert_eq!(unit.symbol(), "degC");
    }

    #[test]
    fn fixed_units_match_catalogue() {
        let table = units(TemperatureScale::Celsius);
        let resolve = |id: &str| table.resolve_identifier(id).expect(id).symbol();
        assert_eq!(resolve("stepCount"), "count");
        assert_eq!(resolve("heartRate"), "count/min");
        assert_eq!(resolve("distanceWalkingRunning"), "m");
        assert_eq!(resolve("activeEnergyBurned"), "kcal");
        assert_eq!(resolve("bloodPressureSystolic"), "mmHg");
    }

    #[test]
    fn resolution_errors_are_distinct() {
        let table = units(TemperatureScale::Celsius);
        let err = table
            .resolve_identifier("bogus.identifier")
            .expect_err("unknown identifier");
        assert!(matches!(err, RecordsError::UnknownDataType(_)));

        let err = table
            .resolve_identifier("sleepAnalysis")
            .expect_err("category type has no unit");
        assert_eq!(
            err,
            RecordsError::NoDefaultUnit("HKCategoryTypeIdentifierSleepAnalysis".into())
        );
    }

    #[test]
    fn overrides_must_share_dimension() {
        let distance = DataType::parse("distanceWalkingRunning").expect("known");
        let table = units(TemperatureScale::Celsius)
            .with_override(distance, Unit::parse("km").expect("unit"))
            .expect("km is a length");
        assert_eq!(table.resolve(&distance).expect("resolves").symbol(), "km");

        let err = units(TemperatureScale::Celsius)
            .with_override(distance, Unit::parse("kg").expect("unit"))
            .expect_err("kg is not a length");
        assert!(matches!(err, RecordsError::IncompatibleUnits { .. }));

        let sleep = DataType::parse("sleepAnalysis").expect("known");
        let err = units(TemperatureScale::Celsius)
            .with_override(sleep, Unit::parse("min").expect("unit"))
            .expect_err("category has no unit");
        assert!(matches!(err, RecordsError::NoDefaultUnit(_)));
    }
}
