//! Record Encoder: typed records in, one wire document out.
//!
//! The first record selects the document root; every other record must fit under the same root
//! and be declared with the same data type. Any failure aborts the whole call, so the caller gets
//! either a complete document or an error, never a partial tree.

use crate::decoder::interval_element;
use crate::number::format_bridge;
use crate::wf::{tags, Element};
use crate::{WireError, WireResult};
use bridge_types::format_timestamp;
use health_records::record::Characteristic;
use health_records::{
    AggregationStyle, CategorySample, CharacteristicRecord, CombinedTotal, CorrelatedSample,
    CorrelationSample, DataKind, DataType, DefaultUnits, DocumentRecord, ErrorRecord, HealthRecord,
    MetadataValue, PedometerSummary, QuantitySample, SampleHeader, SourceRevision,
    StatisticsCollection, StatisticsRecord, Unit, WorkoutSample,
};
use std::collections::BTreeMap;

const WORKOUT_DISTANCE_TYPE: &str = "HKQuantityTypeIdentifierDistanceWalkingRunning";
const WORKOUT_ENERGY_TYPE: &str = "HKQuantityTypeIdentifierActiveEnergyBurned";

/// Per-call switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Append each document's full body as a `content` child.
    pub include_document_data: bool,
    /// Whether this is the last batch of a streamed document query.
    pub done: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            include_document_data: false,
            done: true,
        }
    }
}

/// Document root, chosen by record variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Quantity,
    Category,
    Correlation,
    Characteristic,
    Workout,
    Statistics,
    StatisticsCollection,
    Documents,
    Pedometer,
    Combined,
}

impl Root {
    fn of(record: &HealthRecord) -> Self {
        match record {
            HealthRecord::Quantity(_) => Root::Quantity,
            HealthRecord::Category(_) => Root::Category,
            HealthRecord::Correlation(_) => Root::Correlation,
            HealthRecord::Characteristic(_) => Root::Characteristic,
            HealthRecord::Workout(_) => Root::Workout,
            HealthRecord::Statistics(_) => Root::Statistics,
            HealthRecord::StatisticsCollection(_) => Root::StatisticsCollection,
            HealthRecord::Document(_) => Root::Documents,
            HealthRecord::Pedometer(_) => Root::Pedometer,
            HealthRecord::CombinedTotal(_) => Root::Combined,
        }
    }

    /// Root of an empty document for a data kind.
    fn for_kind(kind: DataKind) -> Self {
        match kind {
            DataKind::Quantity => Root::Quantity,
            DataKind::Category => Root::Category,
            DataKind::Characteristic => Root::Characteristic,
            DataKind::Correlation => Root::Correlation,
            DataKind::Document => Root::Documents,
            DataKind::Workout => Root::Workout,
            DataKind::Pedometer => Root::Pedometer,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Root::Quantity => tags::QUANTITY,
            Root::Category => tags::CATEGORY,
            Root::Correlation => tags::CORRELATION,
            Root::Characteristic => tags::CHARACTERISTIC,
            Root::Workout => tags::WORKOUT,
            Root::Statistics => tags::STATISTICS,
            Root::StatisticsCollection => tags::STATISTICS_COLLECTION,
            Root::Documents => tags::DOCUMENTS,
            Root::Pedometer => tags::PEDOMETER,
            Root::Combined => tags::COMBINED,
        }
    }

    fn carries_unit(self) -> bool {
        matches!(
            self,
            Root::Quantity | Root::Statistics | Root::StatisticsCollection | Root::Combined
        )
    }
}

/// Encodes records against a read-only default-unit table.
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    units: &'a DefaultUnits,
}

impl<'a> Encoder<'a> {
    pub fn new(units: &'a DefaultUnits) -> Self {
        Self { units }
    }

    /// Encode `records` declared as `data_type`, or `error` when one is given.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnknownDataType`] if `data_type` is not in the catalogue (only checked when
    ///   `error` is `None`).
    /// - [`WireError::RecordMismatch`] if a record does not fit the document.
    /// - [`WireError::Records`] if a value cannot be converted to its default unit.
    pub fn encode(
        &self,
        records: &[HealthRecord],
        data_type: &str,
        error: Option<&ErrorRecord>,
    ) -> WireResult<String> {
        self.encode_with(records, data_type, error, EncodeOptions::default())
    }

    /// Single-record form of [`Encoder::encode`].
    pub fn encode_one(
        &self,
        record: &HealthRecord,
        data_type: &str,
        error: Option<&ErrorRecord>,
    ) -> WireResult<String> {
        self.encode(std::slice::from_ref(record), data_type, error)
    }

    pub fn encode_with(
        &self,
        records: &[HealthRecord],
        data_type: &str,
        error: Option<&ErrorRecord>,
        options: EncodeOptions,
    ) -> WireResult<String> {
        if let Some(error) = error {
            return Ok(encode_error(error));
        }
        let data_type = DataType::parse(data_type).inspect_err(|err| {
            tracing::debug!("refusing to encode: {err}");
        })?;
        Ok(self.document(records, data_type, options)?.to_xml())
    }

    /// Build the document tree without rendering it.
    pub fn document(
        &self,
        records: &[HealthRecord],
        data_type: DataType,
        options: EncodeOptions,
    ) -> WireResult<Element> {
        let root = records
            .first()
            .map(Root::of)
            .unwrap_or_else(|| Root::for_kind(data_type.kind()));
        self.render(records, root, data_type, options)
    }

    /// Encode the outcome of a combined read, which may have produced no total.
    ///
    /// The root is `combined` even when `total` is `None`.
    ///
    /// # Errors
    ///
    /// As [`Encoder::encode`]; a non-quantity `data_type` is a [`WireError::RecordMismatch`].
    pub fn encode_combined(&self, total: Option<&CombinedTotal>, data_type: &str) -> WireResult<String> {
        let data_type = DataType::parse(data_type)?;
        if !data_type.is_quantity() {
            return Err(WireError::RecordMismatch(format!(
                "{data_type} cannot be combined"
            )));
        }
        let records: Vec<HealthRecord> = total
            .cloned()
            .map(HealthRecord::CombinedTotal)
            .into_iter()
            .collect();
        let document = self.render(&records, Root::Combined, data_type, EncodeOptions::default())?;
        Ok(document.to_xml())
    }

    fn render(
        &self,
        records: &[HealthRecord],
        root: Root,
        data_type: DataType,
        options: EncodeOptions,
    ) -> WireResult<Element> {
        for record in records {
            check_fits(record, root, data_type)?;
        }

        let mut document = Element::new(root.tag()).attr("type", data_type.identifier());
        if root.carries_unit() {
            document.set_attr("unit", self.units.resolve(&data_type)?.symbol());
        }

        match root {
            Root::Quantity => {
                for record in records {
                    if let HealthRecord::Quantity(sample) = record {
                        document.children.push(self.quantity_sample(sample, false)?);
                    }
                }
            }
            Root::Category => {
                for record in records {
                    if let HealthRecord::Category(sample) = record {
                        document.children.push(category_sample(sample, false)?);
                    }
                }
            }
            Root::Correlation => {
                for record in records {
                    if let HealthRecord::Correlation(sample) = record {
                        document.children.push(self.correlation_sample(sample)?);
                    }
                }
            }
            Root::Characteristic => {
                for record in records {
                    if let HealthRecord::Characteristic(record) = record {
                        document.children.push(characteristic(record));
                    }
                }
            }
            Root::Workout => {
                for record in records {
                    if let HealthRecord::Workout(sample) = record {
                        document.children.push(self.workout_sample(sample)?);
                    }
                }
            }
            Root::Statistics => {
                let unit = self.units.resolve(&data_type)?;
                let mut option = None;
                for record in records {
                    if let HealthRecord::Statistics(statistics) = record {
                        if *option.get_or_insert(statistics.option) != statistics.option {
                            return Err(WireError::RecordMismatch(format!(
                                "statistics computed with '{}' and '{}' in one document",
                                option.map_or("", |o| o.as_str()),
                                statistics.option.as_str()
                            )));
                        }
                        document.children.push(statistic(statistics, unit)?);
                    }
                }
                if let Some(option) = option {
                    document.set_attr("option", option.as_str());
                }
            }
            Root::StatisticsCollection => {
                if records.len() > 1 {
                    return Err(WireError::RecordMismatch(
                        "only one statistics collection fits in a document".into(),
                    ));
                }
                if let Some(HealthRecord::StatisticsCollection(collection)) = records.first() {
                    let unit = self.units.resolve(&data_type)?;
                    document = self.statistics_collection(document, collection, unit)?;
                }
            }
            Root::Documents => {
                document.set_attr("done", options.done.to_string());
                for record in records {
                    if let HealthRecord::Document(record) = record {
                        document
                            .children
                            .push(document_node(record, options.include_document_data)?);
                    }
                }
            }
            Root::Pedometer => {
                for record in records {
                    if let HealthRecord::Pedometer(summary) = record {
                        document.children.push(pedometer_data(summary)?);
                    }
                }
            }
            Root::Combined => {
                let unit = self.units.resolve(&data_type)?;
                for record in records {
                    if let HealthRecord::CombinedTotal(total) = record {
                        document.children.push(combined_total(total, unit)?);
                    }
                }
            }
        }

        tracing::debug!(
            "encoded {} record(s) as <{}> for {}",
            records.len(),
            root.tag(),
            data_type
        );
        Ok(document)
    }

    fn quantity_sample(&self, sample: &QuantitySample, nested: bool) -> WireResult<Element> {
        let unit = self.units.resolve(&sample.data_type)?;
        let mut element = Element::new(tags::QUANTITY_SAMPLE);
        if nested {
            element.set_attr("type", sample.data_type.identifier());
        }
        let element = element
            .attr("start", format_timestamp(&sample.header.start))
            .attr("end", format_timestamp(&sample.header.end))
            .attr("value", number(sample.quantity.value_in(unit)?)?)
            .attr("unit", unit.symbol())
            .attr_opt(
                "aggregationStyle",
                sample.data_type.aggregation_style().map(AggregationStyle::as_str),
            )
            .attr_opt("count", sample.count.map(|c| c.to_string()));
        sample_trailer(element, &sample.header)
    }

    fn correlation_sample(&self, sample: &CorrelationSample) -> WireResult<Element> {
        let element = Element::new(tags::CORRELATION_SAMPLE)
            .attr("start", format_timestamp(&sample.header.start))
            .attr("end", format_timestamp(&sample.header.end));
        let mut element = sample_trailer(element, &sample.header)?;
        for object in &sample.objects {
            let child = match object {
                CorrelatedSample::Quantity(sample) => self.quantity_sample(sample, true)?,
                CorrelatedSample::Category(sample) => category_sample(sample, true)?,
            };
            element.children.push(child);
        }
        Ok(element)
    }

    fn workout_sample(&self, sample: &WorkoutSample) -> WireResult<Element> {
        let element = Element::new(tags::WORKOUT_SAMPLE)
            .attr("start", format_timestamp(&sample.header.start))
            .attr("end", format_timestamp(&sample.header.end))
            .attr("activityType", sample.activity_type.code().to_string())
            .attr("activityName", sample.activity_type.label())
            .attr_opt("duration", sample.duration.map(number).transpose()?);
        let mut element = sample_trailer(element, &sample.header)?;

        if let Some(distance) = sample.total_distance {
            let unit = self.units.resolve_identifier(WORKOUT_DISTANCE_TYPE)?;
            element.children.push(
                Element::new(tags::TOTAL_DISTANCE)
                    .attr("value", number(distance.value_in(unit)?)?)
                    .attr("unit", unit.symbol()),
            );
        }
        if let Some(energy) = sample.total_energy_burned {
            let unit = self.units.resolve_identifier(WORKOUT_ENERGY_TYPE)?;
            element.children.push(
                Element::new(tags::TOTAL_ENERGY_BURNED)
                    .attr("value", number(energy.value_in(unit)?)?)
                    .attr("unit", unit.symbol()),
            );
        }
        for event in &sample.events {
            element.children.push(
                Element::new(tags::EVENT)
                    .attr("type", event.event_type.label())
                    .attr("date", format_timestamp(&event.date)),
            );
        }
        Ok(element)
    }

    fn statistics_collection(
        &self,
        document: Element,
        collection: &StatisticsCollection,
        unit: Unit,
    ) -> WireResult<Element> {
        let mut document = document
            .attr("option", collection.option.as_str())
            .attr("anchor", format_timestamp(&collection.anchor))
            .child(interval_element(&collection.interval));
        for statistics in &collection.statistics {
            if statistics.data_type != collection.data_type {
                return Err(WireError::RecordMismatch(format!(
                    "statistics of {} inside a collection of {}",
                    statistics.data_type, collection.data_type
                )));
            }
            document.children.push(statistic(statistics, unit)?);
        }
        Ok(document)
    }
}

/// Render an error document.
pub fn encode_error(error: &ErrorRecord) -> String {
    error_element(error).to_xml()
}

pub fn error_element(error: &ErrorRecord) -> Element {
    Element::new(tags::ERROR)
        .attr("domain", error.domain())
        .attr("code", error.code().to_string())
        .attr("description", error.description())
}

fn check_fits(record: &HealthRecord, root: Root, data_type: DataType) -> WireResult<()> {
    if Root::of(record) != root {
        return Err(WireError::RecordMismatch(format!(
            "a {} cannot share a <{}> document",
            record.variant_name(),
            root.tag()
        )));
    }
    if record.expected_kind() != data_type.kind() {
        return Err(WireError::RecordMismatch(format!(
            "a {} cannot be encoded as {}",
            record.variant_name(),
            data_type
        )));
    }
    match record.data_type() {
        Some(own) if own != data_type => Err(WireError::RecordMismatch(format!(
            "{} of {} in a document for {}",
            record.variant_name(),
            own,
            data_type
        ))),
        _ => Ok(()),
    }
}

fn number(value: f64) -> WireResult<String> {
    if value.is_finite() {
        Ok(format_bridge(value))
    } else {
        Err(WireError::InvalidNumber(value.to_string()))
    }
}

/// Adds the uuid attribute and the source and metadata children shared by sample-like nodes.
fn sample_trailer(element: Element, header: &SampleHeader) -> WireResult<Element> {
    let mut element = element.attr_opt("uuid", header.uuid.map(|u| u.to_string()));
    if let Some(source) = &header.source {
        element.children.push(source_node(source));
    }
    if !header.metadata.is_empty() {
        element.children.push(metadata_node(&header.metadata)?);
    }
    Ok(element)
}

fn source_node(source: &SourceRevision) -> Element {
    Element::new(tags::SOURCE)
        .attr("name", source.name.as_str())
        .attr("bundleID", source.bundle_id.as_str())
        .attr_opt("version", source.version.as_deref())
        .attr_opt("productType", source.product_type.as_deref())
}

fn metadata_node(metadata: &BTreeMap<String, MetadataValue>) -> WireResult<Element> {
    let mut element = Element::new(tags::METADATA);
    for (key, value) in metadata {
        element.children.push(metadata_entry(key, value)?);
    }
    Ok(element)
}

fn metadata_entry(key: &str, value: &MetadataValue) -> WireResult<Element> {
    let entry = Element::new(tags::ENTRY).attr("key", key);
    Ok(match value {
        MetadataValue::Text(text) => entry.attr("type", "string").attr("value", text.as_str()),
        MetadataValue::Number(n) => entry.attr("type", "number").attr("value", number(*n)?),
        MetadataValue::Bool(b) => entry.attr("type", "bool").attr("value", b.to_string()),
        MetadataValue::Date(date) => entry
            .attr("type", "date")
            .attr("value", format_timestamp(date)),
        MetadataValue::Quantity(quantity) => entry
            .attr("type", "quantity")
            .attr("value", number(quantity.value)?)
            .attr("unit", quantity.unit.symbol()),
        MetadataValue::Dictionary(map) => {
            let mut entry = entry.attr("type", "dictionary");
            for (key, value) in map {
                entry.children.push(metadata_entry(key, value)?);
            }
            entry
        }
    })
}

fn category_sample(sample: &CategorySample, nested: bool) -> WireResult<Element> {
    let mut element = Element::new(tags::CATEGORY_SAMPLE);
    if nested {
        element.set_attr("type", sample.data_type.identifier());
    }
    let element = element
        .attr("start", format_timestamp(&sample.header.start))
        .attr("end", format_timestamp(&sample.header.end))
        .attr("value", sample.value.to_string())
        .attr_opt("label", sample.label());
    sample_trailer(element, &sample.header)
}

fn characteristic(record: &CharacteristicRecord) -> Element {
    let (tag, code, label) = match record.characteristic {
        Characteristic::DateOfBirth(date) => {
            return Element::new("DOB").attr("value", format_timestamp(&date));
        }
        Characteristic::BiologicalSex(v) => ("sex", v.code(), v.label()),
        Characteristic::BloodType(v) => ("bloodType", v.code(), v.label()),
        Characteristic::FitzpatrickSkinType(v) => ("skinType", v.code(), v.label()),
        Characteristic::WheelchairUse(v) => ("wheelchairUse", v.code(), v.label()),
        Characteristic::ActivityMoveMode(v) => ("activityMoveMode", v.code(), v.label()),
    };
    Element::new(tag)
        .attr("value", code.to_string())
        .attr("label", label)
}

fn statistic(statistics: &StatisticsRecord, unit: Unit) -> WireResult<Element> {
    let mut element = Element::new(tags::STATISTIC)
        .attr("start", format_timestamp(&statistics.start))
        .attr("end", format_timestamp(&statistics.end))
        .attr_opt(
            "aggregationStyle",
            statistics.aggregation_style().map(AggregationStyle::as_str),
        );
    for (aggregation, quantity) in statistics.values() {
        element.set_attr(aggregation.as_str(), number(quantity.value_in(unit)?)?);
    }
    Ok(element)
}

fn document_node(record: &DocumentRecord, include_content: bool) -> WireResult<Element> {
    let element = Element::new(tags::DOCUMENT)
        .attr("start", format_timestamp(&record.header.start))
        .attr("end", format_timestamp(&record.header.end))
        .attr_opt("title", record.title.as_deref())
        .attr_opt("author", record.author.as_deref())
        .attr_opt("custodian", record.custodian.as_deref())
        .attr_opt("patient", record.patient.as_deref());
    let mut element = sample_trailer(element, &record.header)?;
    if include_content {
        if let Some(content) = &record.content {
            element
                .children
                .push(Element::new(tags::CONTENT).with_text(content.as_str()));
        }
    }
    Ok(element)
}

fn pedometer_data(summary: &PedometerSummary) -> WireResult<Element> {
    Ok(Element::new(tags::PEDOMETER_DATA)
        .attr("start", format_timestamp(&summary.start))
        .attr("end", format_timestamp(&summary.end))
        .attr("steps", summary.steps.to_string())
        .attr_opt("distance", summary.distance.map(number).transpose()?)
        .attr_opt("floorsAscended", summary.floors_ascended.map(|f| f.to_string()))
        .attr_opt("floorsDescended", summary.floors_descended.map(|f| f.to_string())))
}

fn combined_total(total: &CombinedTotal, unit: Unit) -> WireResult<Element> {
    Ok(Element::new(tags::TOTAL)
        .attr("value", number(total.value.value_in(unit)?)?)
        .attr("aggregation", total.aggregation.as_str())
        .attr("count", total.count.to_string())
        .attr_opt("start", total.start.as_ref().map(format_timestamp))
        .attr_opt("end", total.end.as_ref().map(format_timestamp)))
}
