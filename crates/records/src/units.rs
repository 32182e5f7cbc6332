//! Units of measure and quantity conversion.
//!
//! Every unit belongs to a [`Dimension`] and converts linearly to that dimension's base unit:
//! `base = value * scale + offset`. Only temperatures use a non-zero offset.

use crate::{RecordsError, RecordsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const METERS_PER_KM: f64 = 1000.0;
const METERS_PER_MILE: f64 = 1609.344;
const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_INCH: f64 = 0.0254;
const GRAMS_PER_POUND: f64 = 453.592_37;
const GRAMS_PER_OUNCE: f64 = 28.349_523_125;
const JOULES_PER_KCAL: f64 = 4184.0;
const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const LITERS_PER_US_FLUID_OUNCE: f64 = 0.029_573_529_562_5;
const PASCALS_PER_MMHG: f64 = 133.322_387_415;
/// mg/dL per mmol/L for glucose (molar mass 180.156 g/mol).
const MG_PER_DL_PER_MMOL_PER_L: f64 = 18.0156;

/// Physical dimension a unit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Count,
    Percent,
    Length,
    Mass,
    Energy,
    Temperature,
    Time,
    Volume,
    Pressure,
    Frequency,
    Speed,
    Power,
    Conductance,
    Pharmacology,
    SoundLevel,
    BloodGlucose,
    VolumeFlow,
    OxygenConsumption,
}

/// Static description of a unit.
#[derive(Debug, PartialEq)]
pub struct UnitInfo {
    pub symbol: &'static str,
    pub dimension: Dimension,
    scale: f64,
    offset: f64,
}

const fn unit(symbol: &'static str, dimension: Dimension, scale: f64) -> UnitInfo {
    UnitInfo {
        symbol,
        dimension,
        scale,
        offset: 0.0,
    }
}

static UNITS: &[UnitInfo] = &[
    unit("count", Dimension::Count, 1.0),
    unit("%", Dimension::Percent, 1.0),
    // Length, base metre.
    unit("m", Dimension::Length, 1.0),
    unit("cm", Dimension::Length, 0.01),
    unit("mm", Dimension::Length, 0.001),
    unit("km", Dimension::Length, METERS_PER_KM),
    unit("mi", Dimension::Length, METERS_PER_MILE),
    unit("ft", Dimension::Length, METERS_PER_FOOT),
    unit("in", Dimension::Length, METERS_PER_INCH),
    // Mass, base gram.
    unit("g", Dimension::Mass, 1.0),
    unit("kg", Dimension::Mass, 1000.0),
    unit("mg", Dimension::Mass, 0.001),
    unit("mcg", Dimension::Mass, 0.000_001),
    unit("lb", Dimension::Mass, GRAMS_PER_POUND),
    unit("oz", Dimension::Mass, GRAMS_PER_OUNCE),
    // Energy, base joule.
    unit("J", Dimension::Energy, 1.0),
    unit("kJ", Dimension::Energy, 1000.0),
    unit("kcal", Dimension::Energy, JOULES_PER_KCAL),
    unit("Cal", Dimension::Energy, JOULES_PER_KCAL),
    unit("cal", Dimension::Energy, JOULES_PER_KCAL / 1000.0),
    // Temperature, base kelvin.
    UnitInfo {
        symbol: "K",
        dimension: Dimension::Temperature,
        scale: 1.0,
        offset: 0.0,
    },
    UnitInfo {
        symbol: "degC",
        dimension: Dimension::Temperature,
        scale: 1.0,
        offset: 273.15,
    },
    UnitInfo {
        symbol: "degF",
        dimension: Dimension::Temperature,
        scale: 5.0 / 9.0,
        offset: 273.15 - 32.0 * 5.0 / 9.0,
    },
    // Time, base second.
    unit("s", Dimension::Time, 1.0),
    unit("ms", Dimension::Time, 0.001),
    unit("min", Dimension::Time, SECONDS_PER_MINUTE),
    unit("hr", Dimension::Time, SECONDS_PER_HOUR),
    unit("d", Dimension::Time, SECONDS_PER_DAY),
    // Volume, base litre.
    unit("L", Dimension::Volume, 1.0),
    unit("mL", Dimension::Volume, 0.001),
    unit("fl_oz_us", Dimension::Volume, LITERS_PER_US_FLUID_OUNCE),
    // Pressure, base pascal.
    unit("Pa", Dimension::Pressure, 1.0),
    unit("kPa", Dimension::Pressure, 1000.0),
    unit("mmHg", Dimension::Pressure, PASCALS_PER_MMHG),
    unit("inHg", Dimension::Pressure, 3386.389),
    // Frequency, base count per second.
    unit("count/s", Dimension::Frequency, 1.0),
    unit("count/min", Dimension::Frequency, 1.0 / SECONDS_PER_MINUTE),
    unit("count/hr", Dimension::Frequency, 1.0 / SECONDS_PER_HOUR),
    // Speed, base metre per second.
    unit("m/s", Dimension::Speed, 1.0),
    unit("km/hr", Dimension::Speed, METERS_PER_KM / SECONDS_PER_HOUR),
    unit("mi/hr", Dimension::Speed, METERS_PER_MILE / SECONDS_PER_HOUR),
    unit("W", Dimension::Power, 1.0),
    unit("S", Dimension::Conductance, 1.0),
    unit("mcS", Dimension::Conductance, 0.000_001),
    unit("IU", Dimension::Pharmacology, 1.0),
    unit("dBASPL", Dimension::SoundLevel, 1.0),
    // Blood glucose, base mg/dL.
    unit("mg/dL", Dimension::BloodGlucose, 1.0),
    unit("mmol/L", Dimension::BloodGlucose, MG_PER_DL_PER_MMOL_PER_L),
    unit("L/min", Dimension::VolumeFlow, 1.0),
    unit("mL/min", Dimension::VolumeFlow, 0.001),
    unit("mL/(kg*min)", Dimension::OxygenConsumption, 1.0),
];

/// A unit from the registry.
///
/// Compared and serialized by symbol.
#[derive(Clone, Copy)]
pub struct Unit(&'static UnitInfo);

impl Unit {
    /// Look up a unit by its symbol, e.g. `"kcal"` or `"count/min"`.
    pub fn parse(symbol: &str) -> RecordsResult<Self> {
        UNITS
            .iter()
            .find(|info| info.symbol == symbol)
            .map(Unit)
            .ok_or_else(|| RecordsError::UnknownUnit(symbol.to_owned()))
    }

    pub fn symbol(&self) -> &'static str {
        self.0.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.0.dimension
    }

    pub fn is_compatible_with(&self, other: &Unit) -> bool {
        self.0.dimension == other.0.dimension
    }

    fn to_base(self, value: f64) -> f64 {
        value * self.0.scale + self.0.offset
    }

    fn from_base(self, base: f64) -> f64 {
        (base - self.0.offset) / self.0.scale
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.0.symbol == other.0.symbol
    }
}

impl Eq for Unit {}

impl std::hash::Hash for Unit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.symbol.hash(state);
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit({})", self.0.symbol)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.symbol)
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbol = String::deserialize(deserializer)?;
        Unit::parse(&symbol).map_err(serde::de::Error::custom)
    }
}

/// A numeric value paired with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Express this quantity in `target`.
    ///
    /// Converting to the unit already held returns the value untouched, so no floating point
    /// noise is introduced for the common case.
    pub fn convert_to(self, target: Unit) -> RecordsResult<Quantity> {
        if self.unit == target {
            return Ok(self);
        }
        if !self.unit.is_compatible_with(&target) {
            return Err(RecordsError::IncompatibleUnits {
                from: self.unit.symbol().to_owned(),
                to: target.symbol().to_owned(),
            });
        }
        let base = self.unit.to_base(self.value);
        Ok(Quantity::new(target.from_base(base), target))
    }

    /// Numeric value in `target`, see [`Quantity::convert_to`].
    pub fn value_in(self, target: Unit) -> RecordsResult<f64> {
        self.convert_to(target).map(|q| q.value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn every_symbol_is_unique() {
        for (i, info) in UNITS.iter().enumerate() {
            assert!(
                UNITS[i + 1..].iter().all(|other| other.symbol != info.symbol),
                "duplicate unit symbol {}",
                info.symbol
            );
        }
    }

    #[test]
    fn converts_within_dimension() {
        let miles = Quantity::new(1.0, Unit::parse("mi").unwrap());
        let meters = miles.convert_to(Unit::parse("m").unwrap()).unwrap();
        assert!(approx(meters.value, 1609.344));

        let kcal = Quantity::new(1.0, Unit::parse("kcal").unwrap());
        assert!(approx(kcal.value_in(Unit::parse("kJ").unwrap()).unwrap(), 4.184));

        let per_second = Quantity::new(1.0, Unit::parse("count/s").unwrap());
        assert!(approx(per_second.value_in(Unit::parse("count/min").unwrap()).unwrap(), 60.0));
    }

    #[test]
    fn converts_temperatures_with_offset() {
        let body = Quantity::new(98.6, Unit::parse("degF").unwrap());
        assert!(approx(body.value_in(Unit::parse("degC").unwrap()).unwrap(), 37.0));

        let freezing = Quantity::new(0.0, Unit::parse("degC").unwrap());
        assert!(approx(freezing.value_in(Unit::parse("degF").unwrap()).unwrap(), 32.0));
        assert!(approx(freezing.value_in(Unit::parse("K").unwrap()).unwrap(), 273.15));
    }

    #[test]
    fn same_unit_conversion_is_exact() {
        let q = Quantity::new(0.1 + 0.2, Unit::parse("count").unwrap());
        assert_eq!(q.convert_to(q.unit).unwrap().value, 0.1 + 0.2);
    }

    #[test]
    fn rejects_cross_dimension_conversion() {
        let steps = Quantity::new(10.0, Unit::parse("count").unwrap());
        let err = steps
            .convert_to(Unit::parse("kg").unwrap())
            .expect_err("count is not mass");
        assert!(matches!(err, RecordsError::IncompatibleUnits { ref from, ref to } if from == "count" && to == "kg"));
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let err = Unit::parse("furlong").expect_err("not registered");
        assert_eq!(err, RecordsError::UnknownUnit("furlong".into()));
    }
}
