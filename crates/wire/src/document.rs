//! Reads wire record documents back into typed records.
//!
//! This is the host's side of the contract. It lets tooling inspect query results and lets
//! tests verify that what the encoder wrote can be recovered.

use crate::number::parse_bridge;
use crate::wf::{tags, Element};
use crate::{WireError, WireResult};
use bridge_types::{parse_timestamp, NonEmptyText};
use chrono::{DateTime, Utc};
use health_records::labels::{
    ActivityMoveMode, BiologicalSex, BloodType, FitzpatrickSkinType, WheelchairUse,
    WorkoutActivityType, WorkoutEventType,
};
use health_records::record::Characteristic;
use health_records::{
    Aggregation, CalendarUnit, CategorySample, CharacteristicRecord, CombinedTotal,
    CorrelatedSample, CorrelationSample, DataType, DocumentRecord, ErrorRecord, HealthRecord,
    IntervalSpec, MetadataValue, PedometerSummary, Quantity, QuantitySample, SampleHeader,
    SourceRevision, StatisticsCollection, StatisticsOption, StatisticsRecord, Unit, WorkoutEvent,
    WorkoutSample,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Everything a wire document can carry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedDocument {
    /// Declared data type; `None` for error documents.
    pub data_type: Option<DataType>,
    pub records: Vec<HealthRecord>,
    pub error: Option<ErrorRecord>,
    /// The `done` flag of document batches.
    pub done: Option<bool>,
}

/// Decode a record or error document.
///
/// # Errors
///
/// Returns [`WireError::MalformedDocument`] for anything that does not follow the record
/// document shapes, and [`WireError::UnknownDataType`] for an undeclared `type`.
pub fn decode_document(xml: &str) -> WireResult<DecodedDocument> {
    let root = Element::parse(xml).map_err(|err| match err {
        WireError::Xml(reason) => WireError::malformed_document(reason, xml),
        other => other,
    })?;

    if root.tag == tags::ERROR {
        let error = ErrorRecord::new(
            required(&root, "domain")?,
            integer(&root, "code")?,
            required(&root, "description")?,
        )
        .map_err(|e| WireError::malformed_document(e.to_string(), root.to_xml()))?;
        return Ok(DecodedDocument {
            error: Some(error),
            ..DecodedDocument::default()
        });
    }

    let data_type = DataType::parse(required(&root, "type")?)?;
    let mut decoded = DecodedDocument {
        data_type: Some(data_type),
        ..DecodedDocument::default()
    };

    match root.tag.as_str() {
        tags::QUANTITY => {
            for child in children(&root, tags::QUANTITY_SAMPLE)? {
                decoded
                    .records
                    .push(HealthRecord::Quantity(quantity_sample(child, data_type)?));
            }
        }
        tags::CATEGORY => {
            for child in children(&root, tags::CATEGORY_SAMPLE)? {
                decoded
                    .records
                    .push(HealthRecord::Category(category_sample(child, data_type)?));
            }
        }
        tags::CORRELATION => {
            for child in children(&root, tags::CORRELATION_SAMPLE)? {
                decoded
                    .records
                    .push(HealthRecord::Correlation(correlation_sample(child, data_type)?));
            }
        }
        tags::CHARACTERISTIC => {
            for child in &root.children {
                decoded.records.push(HealthRecord::Characteristic(CharacteristicRecord {
                    characteristic: characteristic(child)?,
                }));
            }
        }
        tags::WORKOUT => {
            for child in children(&root, tags::WORKOUT_SAMPLE)? {
                decoded.records.push(HealthRecord::Workout(workout_sample(child)?));
            }
        }
        tags::STATISTICS => {
            let unit = unit(&root, "unit")?;
            let option = option(&root)?;
            for child in children(&root, tags::STATISTIC)? {
                decoded.records.push(HealthRecord::Statistics(statistic(
                    child, data_type, option, unit,
                )?));
            }
        }
        tags::STATISTICS_COLLECTION => {
            decoded.records.push(HealthRecord::StatisticsCollection(
                statistics_collection(&root, data_type)?,
            ));
        }
        tags::DOCUMENTS => {
            decoded.done = Some(boolean(&root, "done")?);
            for child in children(&root, tags::DOCUMENT)? {
                decoded
                    .records
                    .push(HealthRecord::Document(document(child, data_type)?));
            }
        }
        tags::PEDOMETER => {
            for child in children(&root, tags::PEDOMETER_DATA)? {
                decoded.records.push(HealthRecord::Pedometer(pedometer(child)?));
            }
        }
        tags::COMBINED => {
            let unit = unit(&root, "unit")?;
            for child in children(&root, tags::TOTAL)? {
                decoded
                    .records
                    .push(HealthRecord::CombinedTotal(combined(child, data_type, unit)?));
            }
        }
        other => {
            return Err(WireError::malformed_document(
                format!("unknown document root <{other}>"),
                root.to_xml(),
            ));
        }
    }
    Ok(decoded)
}

// ============================================================================
// Attribute helpers
// ============================================================================

fn required<'e>(node: &'e Element, key: &str) -> WireResult<&'e str> {
    node.attribute(key).ok_or_else(|| {
        WireError::malformed_document(format!("<{}> is missing '{key}'", node.tag), node.to_xml())
    })
}

fn invalid(node: &Element, key: &str) -> WireError {
    WireError::malformed_document(
        format!("<{}> has an invalid '{key}'", node.tag),
        node.to_xml(),
    )
}

fn parsed<T: FromStr>(node: &Element, key: &str) -> WireResult<T> {
    required(node, key)?.parse().map_err(|_| invalid(node, key))
}

fn optional_parsed<T: FromStr>(node: &Element, key: &str) -> WireResult<Option<T>> {
    node.attribute(key)
        .map(|raw| raw.parse().map_err(|_| invalid(node, key)))
        .transpose()
}

fn integer(node: &Element, key: &str) -> WireResult<i64> {
    parsed(node, key)
}

fn boolean(node: &Element, key: &str) -> WireResult<bool> {
    parsed(node, key)
}

fn number(node: &Element, key: &str) -> WireResult<f64> {
    parse_bridge(required(node, key)?).map_err(|_| invalid(node, key))
}

fn optional_number(node: &Element, key: &str) -> WireResult<Option<f64>> {
    node.attribute(key)
        .map(|raw| parse_bridge(raw).map_err(|_| invalid(node, key)))
        .transpose()
}

fn timestamp(node: &Element, key: &str) -> WireResult<DateTime<Utc>> {
    parse_timestamp(required(node, key)?).map_err(|_| invalid(node, key))
}

fn optional_timestamp(node: &Element, key: &str) -> WireResult<Option<DateTime<Utc>>> {
    node.attribute(key)
        .map(|raw| parse_timestamp(raw).map_err(|_| invalid(node, key)))
        .transpose()
}

fn unit(node: &Element, key: &str) -> WireResult<Unit> {
    Unit::parse(required(node, key)?).map_err(|_| invalid(node, key))
}

fn option(node: &Element) -> WireResult<StatisticsOption> {
    StatisticsOption::parse(required(node, "option")?).map_err(|_| invalid(node, "option"))
}

/// All children, which must share one tag.
fn children<'e>(node: &'e Element, tag: &str) -> WireResult<&'e [Element]> {
    match node.children.iter().find(|c| c.tag != tag) {
        Some(stray) => Err(WireError::malformed_document(
            format!("unexpected <{}> inside <{}>", stray.tag, node.tag),
            node.to_xml(),
        )),
        None => Ok(&node.children),
    }
}

fn labelled<T>(node: &Element, from_code: impl Fn(i64) -> Option<T>) -> WireResult<T> {
    from_code(integer(node, "value")?).ok_or_else(|| invalid(node, "value"))
}

// ============================================================================
// Shared parts
// ============================================================================

fn header(node: &Element) -> WireResult<SampleHeader> {
    let mut header = SampleHeader::new(timestamp(node, "start")?, timestamp(node, "end")?);
    header.uuid = optional_parsed::<Uuid>(node, "uuid")?;
    if let Some(source) = node.find(tags::SOURCE) {
        header.source = Some(source_revision(source)?);
    }
    if let Some(metadata) = node.find(tags::METADATA) {
        header.metadata = entries(metadata)?;
    }
    Ok(header)
}

fn source_revision(node: &Element) -> WireResult<SourceRevision> {
    let text = |key: &str| {
        NonEmptyText::new(required(node, key)?).map_err(|_| invalid(node, key))
    };
    Ok(SourceRevision {
        name: text("name")?,
        bundle_id: text("bundleID")?,
        version: node.attribute("version").map(str::to_owned),
        product_type: node.attribute("productType").map(str::to_owned),
    })
}

fn entries(node: &Element) -> WireResult<BTreeMap<String, MetadataValue>> {
    let mut map = BTreeMap::new();
    for entry in children(node, tags::ENTRY)? {
        let key = required(entry, "key")?.to_owned();
        let value = match required(entry, "type")? {
            "string" => MetadataValue::Text(required(entry, "value")?.to_owned()),
            "number" => MetadataValue::Number(number(entry, "value")?),
            "bool" => MetadataValue::Bool(boolean(entry, "value")?),
            "date" => MetadataValue::Date(timestamp(entry, "value")?),
            "quantity" => {
                MetadataValue::Quantity(Quantity::new(number(entry, "value")?, unit(entry, "unit")?))
            }
            "dictionary" => MetadataValue::Dictionary(entries(entry)?),
            _ => return Err(invalid(entry, "type")),
        };
        map.insert(key, value);
    }
    Ok(map)
}

// ============================================================================
// Record shapes
// ============================================================================

fn quantity_sample(node: &Element, data_type: DataType) -> WireResult<QuantitySample> {
    Ok(QuantitySample {
        data_type,
        header: header(node)?,
        quantity: Quantity::new(number(node, "value")?, unit(node, "unit")?),
        count: optional_parsed(node, "count")?,
    })
}

fn category_sample(node: &Element, data_type: DataType) -> WireResult<CategorySample> {
    Ok(CategorySample {
        data_type,
        header: header(node)?,
        value: integer(node, "value")?,
    })
}

fn nested_type(node: &Element) -> WireResult<DataType> {
    DataType::parse(required(node, "type")?).map_err(|_| invalid(node, "type"))
}

fn correlation_sample(node: &Element, data_type: DataType) -> WireResult<CorrelationSample> {
    let mut objects = Vec::new();
    for child in &node.children {
        match child.tag.as_str() {
            tags::QUANTITY_SAMPLE => objects.push(CorrelatedSample::Quantity(quantity_sample(
                child,
                nested_type(child)?,
            )?)),
            tags::CATEGORY_SAMPLE => objects.push(CorrelatedSample::Category(category_sample(
                child,
                nested_type(child)?,
            )?)),
            tags::SOURCE | tags::METADATA => {}
            other => {
                return Err(WireError::malformed_document(
                    format!("<{other}> cannot be nested in a correlation"),
                    node.to_xml(),
                ));
            }
        }
    }
    Ok(CorrelationSample {
        data_type,
        header: header(node)?,
        objects,
    })
}

fn characteristic(node: &Element) -> WireResult<Characteristic> {
    Ok(match node.tag.as_str() {
        "sex" => Characteristic::BiologicalSex(labelled(node, BiologicalSex::from_code)?),
        "bloodType" => Characteristic::BloodType(labelled(node, BloodType::from_code)?),
        "skinType" => {
            Characteristic::FitzpatrickSkinType(labelled(node, FitzpatrickSkinType::from_code)?)
        }
        "wheelchairUse" => Characteristic::WheelchairUse(labelled(node, WheelchairUse::from_code)?),
        "activityMoveMode" => {
            Characteristic::ActivityMoveMode(labelled(node, ActivityMoveMode::from_code)?)
        }
        "DOB" => Characteristic::DateOfBirth(timestamp(node, "value")?),
        other => {
            return Err(WireError::malformed_document(
                format!("unknown characteristic <{other}>"),
                node.to_xml(),
            ));
        }
    })
}

fn workout_sample(node: &Element) -> WireResult<WorkoutSample> {
    let activity_type = WorkoutActivityType::from_code(integer(node, "activityType")?)
        .ok_or_else(|| invalid(node, "activityType"))?;
    let total = |tag: &str| -> WireResult<Option<Quantity>> {
        node.find(tag)
            .map(|t| Ok(Quantity::new(number(t, "value")?, unit(t, "unit")?)))
            .transpose()
    };
    let mut events = Vec::new();
    for event in node.children.iter().filter(|c| c.tag == tags::EVENT) {
        events.push(WorkoutEvent {
            event_type: WorkoutEventType::from_label(required(event, "type")?)
                .ok_or_else(|| invalid(event, "type"))?,
            date: timestamp(event, "date")?,
        });
    }
    Ok(WorkoutSample {
        header: header(node)?,
        activity_type,
        duration: optional_number(node, "duration")?,
        total_distance: total(tags::TOTAL_DISTANCE)?,
        total_energy_burned: total(tags::TOTAL_ENERGY_BURNED)?,
        events,
    })
}

fn statistic(
    node: &Element,
    data_type: DataType,
    option: StatisticsOption,
    unit: Unit,
) -> WireResult<StatisticsRecord> {
    let mut record =
        StatisticsRecord::empty(data_type, timestamp(node, "start")?, timestamp(node, "end")?, option);
    for aggregation in Aggregation::ALL {
        let value = optional_number(node, aggregation.as_str())?;
        record.set(aggregation, value.map(|v| Quantity::new(v, unit)));
    }
    Ok(record)
}

fn statistics_collection(root: &Element, data_type: DataType) -> WireResult<StatisticsCollection> {
    let unit = unit(root, "unit")?;
    let option = option(root)?;
    let mut interval = None;
    let mut statistics = Vec::new();
    for child in &root.children {
        match child.tag.as_str() {
            tags::INTERVAL if interval.is_none() => {
                let mut spec = IntervalSpec::new();
                for (name, value) in child.attributes() {
                    let unit = CalendarUnit::parse(name).map_err(|_| invalid(child, name))?;
                    spec.set(unit, value.parse().map_err(|_| invalid(child, name))?);
                }
                interval = Some(spec);
            }
            tags::STATISTIC => statistics.push(statistic(child, data_type, option, unit)?),
            other => {
                return Err(WireError::malformed_document(
                    format!("unexpected <{other}> inside <{}>", root.tag),
                    root.to_xml(),
                ));
            }
        }
    }
    Ok(StatisticsCollection {
        data_type,
        option,
        anchor: timestamp(root, "anchor")?,
        interval: interval.ok_or_else(|| {
            WireError::malformed_document("collection without <interval>", root.to_xml())
        })?,
        statistics,
    })
}

fn document(node: &Element, data_type: DataType) -> WireResult<DocumentRecord> {
    let text = |key: &str| node.attribute(key).map(str::to_owned);
    Ok(DocumentRecord {
        data_type,
        header: header(node)?,
        title: text("title"),
        author: text("author"),
        custodian: text("custodian"),
        patient: text("patient"),
        content: node
            .find(tags::CONTENT)
            .map(|c| c.text.clone().unwrap_or_default()),
    })
}

fn pedometer(node: &Element) -> WireResult<PedometerSummary> {
    Ok(PedometerSummary {
        start: timestamp(node, "start")?,
        end: timestamp(node, "end")?,
        steps: parsed(node, "steps")?,
        distance: optional_number(node, "distance")?,
        floors_ascended: optional_parsed(node, "floorsAscended")?,
        floors_descended: optional_parsed(node, "floorsDescended")?,
    })
}

fn combined(node: &Element, data_type: DataType, unit: Unit) -> WireResult<CombinedTotal> {
    Ok(CombinedTotal {
        data_type,
        value: Quantity::new(number(node, "value")?, unit),
        aggregation: Aggregation::parse(required(node, "aggregation")?)
            .map_err(|_| invalid(node, "aggregation"))?,
        count: parsed(node, "count")?,
        start: optional_timestamp(node, "start")?,
        end: optional_timestamp(node, "end")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeOptions, Encoder};
    use chrono::TimeZone;
    use health_records::error_record::codes;
    use health_records::{DefaultUnits, TemperatureScale};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn units() -> DefaultUnits {
        DefaultUnits::new(TemperatureScale::Celsius).expect("builtin units")
    }

    fn sample(id: &str, value: f64, symbol: &str) -> QuantitySample {
        QuantitySample {
            data_type: DataType::parse(id).expect("known type"),
            header: SampleHeader::new(at(8), at(9))
                .with_uuid(Uuid::new_v4())
                .with_metadata(
                    "HKMetadataKeyDevicePlacementSide",
                    MetadataValue::Dictionary(BTreeMap::from([(
                        "side".to_owned(),
                        MetadataValue::Text("left".into()),
                    )])),
                ),
            quantity: Quantity::new(value, Unit::parse(symbol).expect("unit")),
            count: Some(2),
        }
    }

    #[test]
    fn quantity_values_survive_a_round_trip() {
        let units = units();
        let original = sample("bodyMass", 150.0, "lb");
        let xml = Encoder::new(&units)
            .encode(&[HealthRecord::Quantity(original.clone())], "bodyMass", None)
            .expect("encodes");
        let decoded = decode_document(&xml).expect("decodes");
        let [HealthRecord::Quantity(recovered)] = decoded.records.as_slice() else {
            panic!("expected one quantity sample, got {:?}", decoded.records);
        };

        let kg = units.resolve(&original.data_type).expect("default unit");
        assert_eq!(recovered.quantity.unit, kg);
        assert_eq!(
            recovered.quantity.value,
            original.quantity.value_in(kg).expect("convertible")
        );
        assert_eq!(recovered.header, original.header);
        assert_eq!(recovered.count, Some(2));
    }

    #[test]
    fn metadata_text_keeps_line_breaks_and_tabs() {
        let units = units();
        let mut original = sample("stepCount", 42.0, "count");
        original.header = original
            .header
            .with_metadata("note", MetadataValue::Text("a\nb\tc".into()));
        let xml = Encoder::new(&units)
            .encode(&[HealthRecord::Quantity(original.clone())], "stepCount", None)
            .expect("encodes");
        assert!(!xml.contains('\n'), "{xml}");
        assert!(!xml.contains('\t'), "{xml}");

        let decoded = decode_document(&xml).expect("decodes");
        let [HealthRecord::Quantity(recovered)] = decoded.records.as_slice() else {
            panic!("expected one quantity sample, got {:?}", decoded.records);
        };
        assert_eq!(
            recovered.header.metadata.get("note"),
            Some(&MetadataValue::Text("a\nb\tc".into()))
        );
    }

    #[test]
    fn correlations_never_nest_after_a_round_trip() {
        let units = units();
        let correlation = CorrelationSample {
            data_type: DataType::parse("HKCorrelationTypeIdentifierBloodPressure").expect("known"),
            header: SampleHeader::new(at(8), at(8)),
            objects: vec![
                CorrelatedSample::Quantity(sample("bloodPressureSystolic", 118.0, "mmHg")),
                CorrelatedSample::Quantity(sample("bloodPressureDiastolic", 76.0, "mmHg")),
            ],
        };
        let id = "HKCorrelationTypeIdentifierBloodPressure";
        let encoder = Encoder::new(&units);
        let first = encoder
            .encode(&[HealthRecord::Correlation(correlation)], id, None)
            .expect("encodes");
        let decoded = decode_document(&first).expect("decodes");
        let second = encoder.encode(&decoded.records, id, None).expect("re-encodes");
        assert_eq!(first, second);

        let tree = Element::parse(&second).expect("well formed");
        for sample in &tree.children {
            assert!(sample.children.iter().all(|c| c.tag != tags::CORRELATION_SAMPLE));
        }
    }

    #[test]
    fn nested_correlation_is_rejected() {
        let xml = concat!(
            r#"<correlation type="HKCorrelationTypeIdentifierFood">"#,
            r#"<correlationSample start="2024-03-01T08:00:00.000Z" end="2024-03-01T08:00:00.000Z">"#,
            r#"<correlationSample start="2024-03-01T08:00:00.000Z" end="2024-03-01T08:00:00.000Z"/>"#,
            r#"</correlationSample></correlation>"#
        );
        let err = decode_document(xml).expect_err("nested correlation");
        assert!(matches!(err, WireError::MalformedDocument { .. }));
    }

    #[test]
    fn error_documents_decode_to_error_records() {
        let error = ErrorRecord::bridge(codes::HEALTH_STORE_UNAVAILABLE, "offline");
        let xml = crate::encoder::encode_error(&error);
        let decoded = decode_document(&xml).expect("decodes");
        assert_eq!(decoded.error, Some(error));
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.data_type, None);
    }

    #[test]
    fn document_batches_keep_done_flag_and_content() {
        let units = units();
        let record = DocumentRecord {
            data_type: DataType::parse("cda").expect("known"),
            header: SampleHeader::new(at(9), at(10)),
            title: Some("Discharge".into()),
            author: Some("Dr. Who".into()),
            custodian: None,
            patient: Some("Ann".into()),
            content: Some("<ClinicalDocument>…</ClinicalDocument>".into()),
        };
        let xml = Encoder::new(&units)
            .encode_with(
                &[HealthRecord::Document(record.clone())],
                "cda",
                None,
                EncodeOptions {
                    include_document_data: true,
                    done: false,
                },
            )
            .expect("encodes");
        let decoded = decode_document(&xml).expect("decodes");
        assert_eq!(decoded.done, Some(false));
        assert_eq!(decoded.records, vec![HealthRecord::Document(record)]);
    }

    #[test]
    fn characteristics_and_pedometer_round_trip() {
        let units = units();
        let encoder = Encoder::new(&units);

        let dob = HealthRecord::Characteristic(CharacteristicRecord {
            characteristic: Characteristic::DateOfBirth(at(0)),
        });
        let xml = encoder
            .encode_one(&dob, "HKCharacteristicTypeIdentifierDateOfBirth", None)
            .expect("encodes");
        assert_eq!(decode_document(&xml).expect("decodes").records, vec![dob]);

        let summary = HealthRecord::Pedometer(PedometerSummary {
            start: at(0),
            end: at(23),
            steps: 8042,
            distance: Some(6120.5),
            floors_ascended: Some(4),
            floors_descended: None,
        });
        let xml = encoder.encode_one(&summary, "pedometer", None).expect("encodes");
        assert_eq!(decode_document(&xml).expect("decodes").records, vec![summary]);
    }

    #[test]
    fn malformed_documents_are_reported() {
        for bad in [
            "<quantity unit=\"count\"/>",
            "<quantity type=\"stepCount\" unit=\"count\"><categorySample/></quantity>",
            "<mystery type=\"stepCount\"/>",
            "<quantity type=\"stepCount\"",
        ] {
            let err = decode_document(bad).expect_err(bad);
            assert!(matches!(err, WireError::MalformedDocument { .. }), "{bad}: {err:?}");
        }
        let err = decode_document("<quantity type=\"bogus\" unit=\"count\"/>")
            .expect_err("unknown type");
        assert!(matches!(err, WireError::UnknownDataType(_)));
    }
}
