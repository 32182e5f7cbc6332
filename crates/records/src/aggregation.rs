//! Reducing quantity samples: combined totals and statistics.

use crate::data_types::{AggregationStyle, DataType};
use crate::record::{CombinedTotal, QuantitySample, StatisticsRecord};
use crate::units::{Quantity, Unit};
use crate::{RecordsError, RecordsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    Sum,
    Average,
    Minimum,
    Maximum,
    MostRecent,
}

impl Aggregation {
    pub const ALL: [Aggregation; 5] = [
        Aggregation::Sum,
        Aggregation::Average,
        Aggregation::Minimum,
        Aggregation::Maximum,
        Aggregation::MostRecent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Average => "average",
            Aggregation::Minimum => "minimum",
            Aggregation::Maximum => "maximum",
            Aggregation::MostRecent => "mostRecent",
        }
    }

    pub fn parse(text: &str) -> RecordsResult<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(text))
            .ok_or_else(|| RecordsError::UnknownAggregation(text.to_owned()))
    }

    /// Aggregation used to combine samples when none is configured.
    pub fn default_for(style: AggregationStyle) -> Self {
        if style.is_cumulative() {
            Aggregation::Sum
        } else {
            Aggregation::Average
        }
    }
}

/// Which statistics a statistics query computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatisticsOption {
    None,
    SeparateBySource,
    DiscreteAverage,
    DiscreteMin,
    DiscreteMax,
    CumulativeSum,
    DiscreteMostRecent,
}

impl StatisticsOption {
    pub const ALL: [StatisticsOption; 7] = [
        StatisticsOption::None,
        StatisticsOption::SeparateBySource,
        StatisticsOption::DiscreteAverage,
        StatisticsOption::DiscreteMin,
        StatisticsOption::DiscreteMax,
        StatisticsOption::CumulativeSum,
        StatisticsOption::DiscreteMostRecent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatisticsOption::None => "none",
            StatisticsOption::SeparateBySource => "separateBySource",
            StatisticsOption::DiscreteAverage => "discreteAverage",
            StatisticsOption::DiscreteMin => "discreteMin",
            StatisticsOption::DiscreteMax => "discreteMax",
            StatisticsOption::CumulativeSum => "cumulativeSum",
            StatisticsOption::DiscreteMostRecent => "discreteMostRecent",
        }
    }

    /// Parse an option name; the host sends both `CumulativeSum` and `cumulativeSum`.
    pub fn parse(text: &str) -> RecordsResult<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(text))
            .ok_or_else(|| RecordsError::UnknownStatisticsOption(text.to_owned()))
    }

    /// Whether this option can be asked of a type with the given style.
    ///
    /// `cumulativeSum` needs a cumulative type and the `discrete*` options a discrete one.
    pub fn supports(self, style: AggregationStyle) -> bool {
        match self {
            StatisticsOption::None | StatisticsOption::SeparateBySource => true,
            StatisticsOption::CumulativeSum => style.is_cumulative(),
            StatisticsOption::DiscreteAverage
            | StatisticsOption::DiscreteMin
            | StatisticsOption::DiscreteMax
            | StatisticsOption::DiscreteMostRecent => !style.is_cumulative(),
        }
    }

    /// Aggregates computed for a type with the given style.
    ///
    /// `None` and `SeparateBySource` compute the natural set for the style: a sum for
    /// cumulative types, average/minimum/maximum otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::InvalidInput`] when the option does not fit the style.
    pub fn aggregations(self, style: AggregationStyle) -> RecordsResult<&'static [Aggregation]> {
        if !self.supports(style) {
            return Err(RecordsError::InvalidInput(format!(
                "statistics option {} does not apply to {} types",
                self.as_str(),
                style.as_str()
            )));
        }
        let aggregations: &'static [Aggregation] = match self {
            StatisticsOption::DiscreteAverage => &[Aggregation::Average],
            StatisticsOption::DiscreteMin => &[Aggregation::Minimum],
            StatisticsOption::DiscreteMax => &[Aggregation::Maximum],
            StatisticsOption::CumulativeSum => &[Aggregation::Sum],
            StatisticsOption::DiscreteMostRecent => &[Aggregation::MostRecent],
            StatisticsOption::None | StatisticsOption::SeparateBySource => {
                if style.is_cumulative() {
                    &[Aggregation::Sum]
                } else {
                    &[
                        Aggregation::Average,
                        Aggregation::Minimum,
                        Aggregation::Maximum,
                    ]
                }
            }
        };
        Ok(aggregations)
    }
}

/// Apply one aggregate to values already expressed in a common unit.
///
/// `values` are `(end, value)` pairs; `None` for an empty slice.
fn apply(aggregation: Aggregation, values: &[(DateTime<Utc>, f64)]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let numbers = values.iter().map(|(_, v)| *v);
    Some(match aggregation {
        Aggregation::Sum => numbers.sum(),
        Aggregation::Average => numbers.sum::<f64>() / values.len() as f64,
        Aggregation::Minimum => numbers.fold(f64::INFINITY, f64::min),
        Aggregation::Maximum => numbers.fold(f64::NEG_INFINITY, f64::max),
        Aggregation::MostRecent => values
            .iter()
            .max_by_key(|(end, _)| *end)
            .map(|(_, v)| *v)
            .unwrap_or_default(),
    })
}

fn values_in(
    data_type: &DataType,
    samples: &[QuantitySample],
    unit: Unit,
) -> RecordsResult<Vec<(DateTime<Utc>, f64)>> {
    samples
        .iter()
        .map(|sample| {
            if sample.data_type != *data_type {
                return Err(RecordsError::InvalidInput(format!(
                    "cannot reduce {} sample into {}",
                    sample.data_type, data_type
                )));
            }
            Ok((sample.header.end, sample.quantity.value_in(unit)?))
        })
        .collect()
}

/// Reduce `samples` to a single total in `unit`.
///
/// An empty set sums to zero; any other aggregation of an empty set yields `None`.
///
/// # Errors
///
/// Fails if a sample belongs to a different data type or its unit cannot convert to `unit`.
pub fn combine(
    data_type: DataType,
    samples: &[QuantitySample],
    aggregation: Aggregation,
    unit: Unit,
) -> RecordsResult<Option<CombinedTotal>> {
    let values = values_in(&data_type, samples, unit)?;
    let value = match apply(aggregation, &values) {
        Some(value) => value,
        None if aggregation == Aggregation::Sum => 0.0,
        None => return Ok(None),
    };

    Ok(Some(CombinedTotal {
        data_type,
        value: Quantity::new(value, unit),
        aggregation,
        count: samples.len(),
        start: samples.iter().map(|s| s.header.start).min(),
        end: samples.iter().map(|s| s.header.end).max(),
    }))
}

/// Compute the statistics `option` asks for over `samples` within `[start, end)`.
///
/// Samples outside the range are ignored. Aggregates of an empty range are left unset, except a
/// cumulative sum, which is zero.
///
/// # Errors
///
/// Fails for non-quantity types, for an option that does not fit the type's aggregation style,
/// and for samples that cannot be reduced into `unit`.
pub fn summarize(
    data_type: DataType,
    samples: &[QuantitySample],
    option: StatisticsOption,
    unit: Unit,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> RecordsResult<StatisticsRecord> {
    let style = data_type.aggregation_style().ok_or_else(|| {
        RecordsError::InvalidInput(format!("{data_type} is not a quantity type"))
    })?;

    let aggregations = option.aggregations(style)?;

    let in_range: Vec<QuantitySample> = samples
        .iter()
        .filter(|s| s.header.start >= start && s.header.start < end)
        .cloned()
        .collect();
    let values = values_in(&data_type, &in_range, unit)?;

    let mut record = StatisticsRecord::empty(data_type, start, end, option);
    for aggregation in aggregations {
        let value = match apply(*aggregation, &values) {
            Some(v) => Some(v),
            None if *aggregation == Aggregation::Sum => Some(0.0),
            None => None,
        };
        record.set(*aggregation, value.map(|v| Quantity::new(v, unit)));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SampleHeader;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn sample(id: &str, hour: u32, value: f64, unit: &str) -> QuantitySample {
        QuantitySample {
            data_type: DataType::parse(id).unwrap(),
            header: SampleHeader::new(at(hour), at(hour + 1)),
            quantity: Quantity::new(value, Unit::parse(unit).unwrap()),
            count: None,
        }
    }

    #[test]
    fn default_aggregation_follows_style() {
        assert_eq!(
            Aggregation::default_for(AggregationStyle::Cumulative),
            Aggregation::Sum
        );
        assert_eq!(
            Aggregation::default_for(AggregationStyle::DiscreteTemporallyWeighted),
            Aggregation::Average
        );
    }

    #[test]
    fn combine_converts_before_reducing() {
        let distance = DataType::parse("distanceWalkingRunning").unwrap();
        let samples = vec![
            sample("distanceWalkingRunning", 8, 1.0, "km"),
            sample("distanceWalkingRunning", 9, 500.0, "m"),
        ];
        let total = combine(distance, &samples, Aggregation::Sum, Unit::parse("m").unwrap())
            .expect("same dimension")
            .expect("sum is always present");
        assert_eq!(total.value.value, 1500.0);
        assert_eq!(total.count, 2);
        assert_eq!(total.start, Some(at(8)));
        assert_eq!(total.end, Some(at(10)));
    }

    #[test]
    fn combine_supports_configured_aggregations() {
        let heart_rate = DataType::parse("heartRate").unwrap();
        let bpm = Unit::parse("count/min").unwrap();
        let samples = vec![
            sample("heartRate", 8, 60.0, "count/min"),
            sample("heartRate", 10, 90.0, "count/min"),
            sample("heartRate", 9, 75.0, "count/min"),
        ];
        let reduce = |aggregation| {
            combine(heart_rate, &samples, aggregation, bpm)
                .unwrap()
                .unwrap()
                .value
                .value
        };
        assert_eq!(reduce(Aggregation::Average), 75.0);
        assert_eq!(reduce(Aggregation::Minimum), 60.0);
        assert_eq!(reduce(Aggregation::Maximum), 90.0);
        assert_eq!(reduce(Aggregation::MostRecent), 90.0);
    }

    #[test]
    fn combine_of_nothing() {
        let steps = DataType::parse("stepCount").unwrap();
        let count = Unit::parse("count").unwrap();
        let sum = combine(steps, &[], Aggregation::Sum, count).unwrap().unwrap();
        assert_eq!(sum.value.value, 0.0);
        assert!(combine(steps, &[], Aggregation::Average, count)
            .unwrap()
            .is_none());
    }

    #[test]
    fn combine_rejects_foreign_samples() {
        let steps = DataType::parse("stepCount").unwrap();
        let samples = vec![sample("heartRate", 8, 60.0, "count/min")];
        let err = combine(steps, &samples, Aggregation::Sum, Unit::parse("count").unwrap())
            .expect_err("heart rate is not steps");
        assert!(matches!(err, RecordsError::InvalidInput(_)));
    }

    #[test]
    fn summarize_picks_aggregates_from_option() {
        let heart_rate = DataType::parse("heartRate").unwrap();
        let bpm = Unit::parse("count/min").unwrap();
        let samples = vec![
            sample("heartRate", 8, 60.0, "count/min"),
            sample("heartRate", 9, 80.0, "count/min"),
            sample("heartRate", 20, 200.0, "count/min"),
        ];
        let natural = summarize(heart_rate, &samples, StatisticsOption::None, bpm, at(0), at(12))
            .expect("summary");
        assert_eq!(natural.average.map(|q| q.value), Some(70.0));
        assert_eq!(natural.maximum.map(|q| q.value), Some(80.0));
        assert!(natural.sum.is_none());

        let max_only =
            summarize(heart_rate, &samples, StatisticsOption::DiscreteMax, bpm, at(0), at(23))
                .expect("summary");
        assert_eq!(max_only.values().count(), 1);
        assert_eq!(max_only.maximum.map(|q| q.value), Some(200.0));
    }

    #[test]
    fn options_must_fit_the_aggregation_style() {
        let steps = DataType::parse("stepCount").unwrap();
        let heart_rate = DataType::parse("heartRate").unwrap();
        let count = Unit::parse("count").unwrap();
        let bpm = Unit::parse("count/min").unwrap();

        let err = summarize(heart_rate, &[], StatisticsOption::CumulativeSum, bpm, at(0), at(1))
            .expect_err("heart rates do not add up");
        assert!(matches!(err, RecordsError::InvalidInput(_)));
        let err = summarize(steps, &[], StatisticsOption::DiscreteAverage, count, at(0), at(1))
            .expect_err("step counts are cumulative");
        assert!(matches!(err, RecordsError::InvalidInput(_)));

        for option in [StatisticsOption::None, StatisticsOption::SeparateBySource] {
            assert!(option.supports(AggregationStyle::Cumulative));
            assert!(option.supports(AggregationStyle::DiscreteArithmetic));
        }
        assert!(summarize(steps, &[], StatisticsOption::CumulativeSum, count, at(0), at(1)).is_ok());
    }

    #[test]
    fn statistics_option_parses_host_spellings() {
        assert_eq!(
            StatisticsOption::parse("CumulativeSum").unwrap(),
            StatisticsOption::CumulativeSum
        );
        assert_eq!(
            StatisticsOption::parse("discreteMostRecent").unwrap(),
            StatisticsOption::DiscreteMostRecent
        );
        assert!(matches!(
            StatisticsOption::parse("median"),
            Err(RecordsError::UnknownStatisticsOption(_))
        ));
    }
}
