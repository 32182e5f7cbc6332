//! Query orchestration: host strings in, wire documents out.
//!
//! Each read decodes its raw host arguments, queries the store on the blocking pool, reduces
//! where asked, and encodes the result. Every failure along that path comes back as an error
//! document rather than a Rust error, because the host only understands wire strings.

use crate::config::BridgeContext;
use crate::constants::{DOCUMENT_CHANNEL_CAPACITY, MAX_COLLECTION_BUCKETS, OBSERVER_CHANNEL_CAPACITY};
use crate::registry::LongRunningQueries;
use crate::store::{DateRange, HealthStore};
use crate::{CoreError, CoreResult};
use bridge_wire::encoder::encode_error;
use bridge_wire::{ConstraintExpression, Decoder, EncodeOptions};
use health_records::labels::WorkoutActivityType;
use health_records::{
    combine, summarize, DataKind, DataType, HealthRecord, QuantitySample, StatisticsCollection,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use uuid::Uuid;

const CDA_DOCUMENT_TYPE: &str = "HKDocumentTypeIdentifierCDA";

/// A running background observer.
#[derive(Debug)]
pub struct ObserverQuery {
    pub id: Uuid,
    /// Registration this one replaced, if any.
    pub replaced: Option<Uuid>,
    /// One wire document per matching record stored after registration.
    pub updates: mpsc::Receiver<String>,
}

pub struct QueryOrchestrator<S> {
    store: Arc<S>,
    context: Arc<BridgeContext>,
    observers: Arc<LongRunningQueries>,
}

impl<S> Clone for QueryOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            context: Arc::clone(&self.context),
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<S: HealthStore> QueryOrchestrator<S> {
    pub fn new(store: Arc<S>, context: BridgeContext) -> Self {
        Self {
            store,
            context: Arc::new(context),
            observers: Arc::new(LongRunningQueries::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn context(&self) -> &BridgeContext {
        &self.context
    }

    // ========================================================================
    // One-shot reads
    // ========================================================================

    /// Quantity samples of `identifier` starting in `[start, end)`.
    ///
    /// With `combine` set, the samples are reduced to one total using the aggregation
    /// configured for the identifier.
    pub async fn read_quantity(&self, identifier: &str, start: &str, end: &str, combine: bool) -> String {
        let (identifier, start, end) = owned3(identifier, start, end);
        self.respond("read_quantity", move |store, context| {
            let decoder = context.decoder();
            let data_type = typed(&decoder, &identifier, &[DataKind::Quantity])?;
            let range = range(&decoder, &start, &end)?;
            let records = store.samples(data_type, &range)?;
            if combine {
                combined(context, data_type, records)
            } else {
                encode(context, &records, data_type)
            }
        })
        .await
    }

    pub async fn read_category(&self, identifier: &str, start: &str, end: &str) -> String {
        self.read_samples("read_category", DataKind::Category, identifier, start, end)
            .await
    }

    pub async fn read_correlation(&self, identifier: &str, start: &str, end: &str) -> String {
        self.read_samples("read_correlation", DataKind::Correlation, identifier, start, end)
            .await
    }

    pub async fn read_characteristic(&self, identifier: &str) -> String {
        let identifier = identifier.to_owned();
        self.respond("read_characteristic", move |store, context| {
            let data_type = typed(&context.decoder(), &identifier, &[DataKind::Characteristic])?;
            let records: Vec<HealthRecord> = store.characteristic(data_type)?.into_iter().collect();
            encode(context, &records, data_type)
        })
        .await
    }

    /// Workouts of the activity with integer code `activity`.
    pub async fn read_workout(&self, activity: i64, start: &str, end: &str) -> String {
        let (start, end) = (start.to_owned(), end.to_owned());
        self.respond("read_workout", move |store, context| {
            let activity = WorkoutActivityType::from_code(activity).ok_or_else(|| {
                CoreError::InvalidRequest(format!("unknown workout activity type {activity}"))
            })?;
            let range = range(&context.decoder(), &start, &end)?;
            let data_type = DataType::workout();
            let records: Vec<HealthRecord> = store
                .samples(data_type, &range)?
                .into_iter()
                .filter(|record| {
                    matches!(record, HealthRecord::Workout(w) if w.activity_type == activity)
                })
                .collect();
            encode(context, &records, data_type)
        })
        .await
    }

    /// One statistics record over `[start, end)`.
    pub async fn read_statistics(&self, identifier: &str, start: &str, end: &str, option: &str) -> String {
        let (identifier, start, end) = owned3(identifier, start, end);
        let option = option.to_owned();
        self.respond("read_statistics", move |store, context| {
            let decoder = context.decoder();
            let data_type = typed(&decoder, &identifier, &[DataKind::Quantity])?;
            let option = decoder.decode_statistics_option(&option)?;
            let range = range(&decoder, &start, &end)?;
            let samples = quantity_samples(store.samples(data_type, &range)?);
            let unit = context.units().resolve(&data_type)?;
            let statistics = summarize(data_type, &samples, option, unit, range.start, range.end)?;
            encode(context, &[HealthRecord::Statistics(statistics)], data_type)
        })
        .await
    }

    /// Statistics bucketed by `interval_xml`, starting at `anchor`.
    ///
    /// Buckets run from the anchor up to the one holding the latest matching sample. An
    /// optional predicate filters samples before they are bucketed.
    pub async fn read_statistics_collection(
        &self,
        identifier: &str,
        predicate_xml: Option<&str>,
        option: &str,
        anchor: &str,
        interval_xml: &str,
    ) -> String {
        let identifier = identifier.to_owned();
        let predicate_xml = predicate_xml.map(str::to_owned);
        let (option, anchor, interval_xml) = owned3(option, anchor, interval_xml);
        self.respond("read_statistics_collection", move |store, context| {
            let decoder = context.decoder();
            let data_type = typed(&decoder, &identifier, &[DataKind::Quantity])?;
            let option = decoder.decode_statistics_option(&option)?;
            if let Some(style) = data_type.aggregation_style() {
                option.aggregations(style)?;
            }
            let anchor = decoder.decode_timestamp(&anchor)?;
            let interval = decoder.decode_date_components(&interval_xml)?;
            if interval.is_empty() {
                return Err(CoreError::InvalidRequest(
                    "a statistics collection needs a non-empty interval".into(),
                ));
            }
            let predicate = predicate(&decoder, predicate_xml.as_deref())?;

            let records = store.samples(data_type, &DateRange::new(anchor, DateRange::unbounded().end)?)?;
            let records = filtered(records, predicate.as_ref(), context);
            let samples = quantity_samples(records);
            let unit = context.units().resolve(&data_type)?;

            let mut statistics = Vec::new();
            if let Some(last) = samples.iter().map(|s| s.header.start).max() {
                let mut bucket_start = anchor;
                let mut index: i64 = 0;
                while bucket_start <= last {
                    if statistics.len() >= MAX_COLLECTION_BUCKETS {
                        return Err(CoreError::InvalidRequest(format!(
                            "collection would exceed {MAX_COLLECTION_BUCKETS} buckets"
                        )));
                    }
                    index += 1;
                    let bucket_end = interval.nth(anchor, index)?;
                    if bucket_end <= bucket_start {
                        return Err(CoreError::InvalidRequest(
                            "interval must move forward in time".into(),
                        ));
                    }
                    statistics.push(summarize(
                        data_type,
                        &samples,
                        option,
                        unit,
                        bucket_start,
                        bucket_end,
                    )?);
                    bucket_start = bucket_end;
                }
            }

            let collection = StatisticsCollection {
                data_type,
                option,
                anchor,
                interval,
                statistics,
            };
            encode(context, &[HealthRecord::StatisticsCollection(collection)], data_type)
        })
        .await
    }

    /// Pedometer summaries starting in `[start, end)`.
    pub async fn read_pedometer(&self, start: &str, end: &str) -> String {
        let (start, end) = (start.to_owned(), end.to_owned());
        self.respond("read_pedometer", move |store, context| {
            let range = range(&context.decoder(), &start, &end)?;
            let records: Vec<HealthRecord> = store
                .pedometer(&range)?
                .into_iter()
                .map(HealthRecord::Pedometer)
                .collect();
            encode(context, &records, DataType::pedometer())
        })
        .await
    }

    /// Clinical documents, delivered in batches.
    ///
    /// Every batch but the last carries `done="false"`. A `limit` of zero means no limit. A
    /// failure is delivered as a single error document. Must be called from within a Tokio
    /// runtime.
    pub fn read_documents(
        &self,
        predicate_xml: Option<&str>,
        limit: usize,
        include_data: bool,
    ) -> mpsc::Receiver<String> {
        let (batches, receiver) = mpsc::channel(DOCUMENT_CHANNEL_CAPACITY);
        let store = Arc::clone(&self.store);
        let context = Arc::clone(&self.context);
        let predicate_xml = predicate_xml.map(str::to_owned);

        tokio::task::spawn_blocking(move || {
            let send = |document: String| batches.blocking_send(document).is_ok();
            let outcome = document_batches(
                store.as_ref(),
                &context,
                predicate_xml.as_deref(),
                limit,
                include_data,
                &send,
            );
            if let Err(err) = outcome {
                tracing::warn!("read_documents failed: {err}");
                send(encode_error(&err.to_error_record()));
            }
        });
        receiver
    }

    // ========================================================================
    // Background observers
    // ========================================================================

    /// Watch the store for new records of `identifier`.
    ///
    /// Replaces any observer already registered for the same identifier. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails for unknown identifiers, for types that have no samples, and when the store is
    /// unavailable.
    pub fn begin_observer_query(&self, identifier: &str) -> CoreResult<ObserverQuery> {
        let data_type = typed(
            &self.context.decoder(),
            identifier,
            &[
                DataKind::Quantity,
                DataKind::Category,
                DataKind::Correlation,
                DataKind::Workout,
                DataKind::Document,
            ],
        )?;
        if !self.store.is_available() {
            return Err(CoreError::HealthStoreUnavailable);
        }

        let mut changes = self.store.subscribe();
        let (updates, receiver) = mpsc::channel(OBSERVER_CHANNEL_CAPACITY);
        let context = Arc::clone(&self.context);

        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(record) if record.data_type() == Some(data_type) => {
                        let document = encode(&context, std::slice::from_ref(&record), data_type)
                            .unwrap_or_else(|err| encode_error(&err.to_error_record()));
                        if updates.send(document).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("observer for {data_type} missed {missed} change(s)");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let (id, replaced) = self.observers.insert(data_type, handle);
        tracing::debug!("observer {id} registered for {data_type}");
        Ok(ObserverQuery {
            id,
            replaced,
            updates: receiver,
        })
    }

    /// Stop the observer for `identifier`. Returns `false` if none was running.
    pub fn stop_observer_query(&self, identifier: &str) -> bool {
        match DataType::parse(identifier) {
            Ok(data_type) => self.observers.remove(&data_type),
            Err(_) => false,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    async fn read_samples(
        &self,
        operation: &'static str,
        kind: DataKind,
        identifier: &str,
        start: &str,
        end: &str,
    ) -> String {
        let (identifier, start, end) = owned3(identifier, start, end);
        self.respond(operation, move |store, context| {
            let decoder = context.decoder();
            let data_type = typed(&decoder, &identifier, &[kind])?;
            let range = range(&decoder, &start, &end)?;
            let records = store.samples(data_type, &range)?;
            encode(context, &records, data_type)
        })
        .await
    }

    /// Run `query` on the blocking pool and turn any failure into an error document.
    async fn respond<F>(&self, operation: &'static str, query: F) -> String
    where
        F: FnOnce(&S, &BridgeContext) -> CoreResult<String> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let context = Arc::clone(&self.context);
        let outcome = tokio::task::spawn_blocking(move || {
            if !store.is_available() {
                return Err(CoreError::HealthStoreUnavailable);
            }
            query(store.as_ref(), &context)
        })
        .await
        .map_err(|err| CoreError::Task(err.to_string()))
        .and_then(std::convert::identity);

        match outcome {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!("{operation} failed: {err}");
                encode_error(&err.to_error_record())
            }
        }
    }
}

fn owned3(a: &str, b: &str, c: &str) -> (String, String, String) {
    (a.to_owned(), b.to_owned(), c.to_owned())
}

fn typed(decoder: &Decoder, identifier: &str, kinds: &[DataKind]) -> CoreResult<DataType> {
    let data_type = decoder.decode_data_type(identifier)?;
    if !kinds.contains(&data_type.kind()) {
        return Err(CoreError::InvalidRequest(format!(
            "{data_type} cannot be read this way"
        )));
    }
    Ok(data_type)
}

fn range(decoder: &Decoder, start: &str, end: &str) -> CoreResult<DateRange> {
    DateRange::new(decoder.decode_timestamp(start)?, decoder.decode_timestamp(end)?)
}

fn predicate(decoder: &Decoder, xml: Option<&str>) -> CoreResult<Option<ConstraintExpression>> {
    match xml.map(str::trim).filter(|xml| !xml.is_empty()) {
        Some(xml) => Ok(Some(decoder.decode_predicate(xml)?)),
        None => Ok(None),
    }
}

fn filtered(
    records: Vec<HealthRecord>,
    predicate: Option<&ConstraintExpression>,
    context: &BridgeContext,
) -> Vec<HealthRecord> {
    match predicate {
        Some(predicate) => records
            .into_iter()
            .filter(|record| predicate.matches(record, context.units()))
            .collect(),
        None => records,
    }
}

fn quantity_samples(records: Vec<HealthRecord>) -> Vec<QuantitySample> {
    records
        .into_iter()
        .filter_map(|record| match record {
            HealthRecord::Quantity(sample) => Some(sample),
            _ => None,
        })
        .collect()
}

fn encode(context: &BridgeContext, records: &[HealthRecord], data_type: DataType) -> CoreResult<String> {
    Ok(context
        .encoder()
        .encode(records, data_type.identifier(), None)?)
}

fn combined(context: &BridgeContext, data_type: DataType, records: Vec<HealthRecord>) -> CoreResult<String> {
    let samples = quantity_samples(records);
    let unit = context.units().resolve(&data_type)?;
    let aggregation = context.combine_aggregation(&data_type);
    let total = combine(data_type, &samples, aggregation, unit)?;
    Ok(context
        .encoder()
        .encode_combined(total.as_ref(), data_type.identifier())?)
}

fn document_batches<S: HealthStore>(
    store: &S,
    context: &BridgeContext,
    predicate_xml: Option<&str>,
    limit: usize,
    include_data: bool,
    send: &dyn Fn(String) -> bool,
) -> CoreResult<()> {
    if !store.is_available() {
        return Err(CoreError::HealthStoreUnavailable);
    }
    let decoder = context.decoder();
    let data_type = decoder.decode_data_type(CDA_DOCUMENT_TYPE)?;
    let predicate = predicate(&decoder, predicate_xml)?;

    let mut records = filtered(
        store.samples(data_type, &DateRange::unbounded())?,
        predicate.as_ref(),
        context,
    );
    if limit > 0 {
        records.truncate(limit);
    }

    let encoder = context.encoder();
    let batch_size = context.document_batch_size();
    let batch_count = records.len().div_ceil(batch_size).max(1);
    for index in 0..batch_count {
        let from = (index * batch_size).min(records.len());
        let to = (from + batch_size).min(records.len());
        let options = EncodeOptions {
            include_document_data: include_data,
            done: index + 1 == batch_count,
        };
        let document = encoder.encode_with(&records[from..to], data_type.identifier(), None, options)?;
        if !send(document) {
            tracing::debug!("document receiver dropped after {index} batch(es)");
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::store::InMemoryHealthStore;
    use bridge_types::format_timestamp;
    use bridge_wire::decode_document;
    use chrono::{DateTime, TimeZone, Utc};
    use health_records::error_record::codes;
    use health_records::labels::BloodType;
    use health_records::{
        Characteristic, CharacteristicRecord, DocumentRecord, ErrorRecord, Quantity,
        SampleHeader, Unit, WorkoutSample,
    };

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn ts(hour: u32) -> String {
        format_timestamp(&at(hour))
    }

    fn steps(hour: u32, value: f64) -> HealthRecord {
        HealthRecord::Quantity(QuantitySample {
            data_type: DataType::parse("stepCount").unwrap(),
            header: SampleHeader::new(at(hour), at(hour) + chrono::Duration::minutes(30)),
            quantity: Quantity::new(value, Unit::parse("count").unwrap()),
            count: None,
        })
    }

    fn cda(hour: u32, title: &str) -> HealthRecord {
        HealthRecord::Document(DocumentRecord {
            data_type: DataType::parse("HKDocumentTypeIdentifierCDA").unwrap(),
            header: SampleHeader::new(at(hour), at(hour)),
            title: Some(title.into()),
            author: None,
            custodian: None,
            patient: None,
            content: Some(format!("<ClinicalDocument>{title}</ClinicalDocument>")),
        })
    }

    fn orchestrator_with(
        config: BridgeConfig,
        records: Vec<HealthRecord>,
    ) -> QueryOrchestrator<InMemoryHealthStore> {
        let store = InMemoryHealthStore::new();
        store.insert_all(records).expect("seed");
        let context = BridgeContext::from_config(&config).expect("config");
        QueryOrchestrator::new(Arc::new(store), context)
    }

    fn orchestrator() -> QueryOrchestrator<InMemoryHealthStore> {
        orchestrator_with(
            BridgeConfig::default(),
            vec![steps(0, 100.0), steps(1, 200.0), steps(2, 300.0)],
        )
    }

    fn error_code(document: &str) -> i64 {
        decode_document(document)
            .expect("decodes")
            .error
            .expect("error document")
            .code()
    }

    #[tokio::test]
    async fn reads_quantity_samples_in_range() {
        let bridge = orchestrator();
        let document = bridge.read_quantity("stepCount", &ts(0), &ts(2), false).await;
        let decoded = decode_document(&document).expect("decodes");
        assert_eq!(decoded.records.len(), 2);
        assert!(document.starts_with("<quantity type=\"HKQuantityTypeIdentifierStepCount\" unit=\"count\">"));
    }

    #[tokio::test]
    async fn combine_sums_cumulative_types() {
        let bridge = orchestrator();
        let document = bridge.read_quantity("stepCount", &ts(0), &ts(12), true).await;
        let decoded = decode_document(&document).expect("decodes");
        let [HealthRecord::CombinedTotal(total)] = decoded.records.as_slice() else {
            panic!("expected one combined total: {document}");
        };
        assert_eq!(total.value.value, 600.0);
        assert_eq!(total.count, 3);
    }

    #[tokio::test]
    async fn combine_uses_configured_aggregation() {
        let mut config = BridgeConfig::default();
        config
            .combine_aggregation
            .insert("stepCount".into(), "maximum".into());
        let bridge = orchestrator_with(config, vec![steps(0, 100.0), steps(1, 250.0)]);
        let document = bridge.read_quantity("stepCount", &ts(0), &ts(12), true).await;
        assert!(document.contains("aggregation=\"maximum\""), "{document}");
        assert!(document.contains("value=\"250\""), "{document}");
    }

    #[tokio::test]
    async fn combine_without_samples_still_answers_combined() {
        let bridge = orchestrator();
        let document = bridge.read_quantity("heartRate", &ts(0), &ts(12), true).await;
        assert_eq!(
            document,
            "<combined type=\"HKQuantityTypeIdentifierHeartRate\" unit=\"count/min\"/>"
        );
        let decoded = decode_document(&document).expect("decodes");
        assert!(decoded.records.is_empty());
        assert!(decoded.error.is_none());
    }

    #[tokio::test]
    async fn failures_become_error_documents() {
        let bridge = orchestrator();

        let document = bridge.read_quantity("bogus.identifier", &ts(0), &ts(1), false).await;
        assert_eq!(error_code(&document), codes::UNKNOWN_DATA_TYPE);

        let document = bridge.read_category("stepCount", &ts(0), &ts(1)).await;
        assert_eq!(error_code(&document), codes::BRIDGE_FAILURE);

        let document = bridge.read_quantity("stepCount", "yesterday", &ts(1), false).await;
        assert!(decode_document(&document).expect("decodes").error.is_some());

        bridge.store().set_available(false);
        let document = bridge.read_quantity("stepCount", &ts(0), &ts(1), false).await;
        assert_eq!(error_code(&document), codes::HEALTH_STORE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn native_failures_keep_their_domain() {
        let bridge = orchestrator();
        let native = ErrorRecord::new("com.apple.healthkit", 5, "not authorized").unwrap();
        bridge.store().fail_next(native.clone());
        let document = bridge.read_quantity("stepCount", &ts(0), &ts(1), false).await;
        let decoded = decode_document(&document).expect("decodes");
        assert_eq!(decoded.error, Some(native));
    }

    #[tokio::test]
    async fn reads_characteristics() {
        let bridge = orchestrator_with(
            BridgeConfig::default(),
            vec![HealthRecord::Characteristic(CharacteristicRecord {
                characteristic: Characteristic::BloodType(BloodType::BNegative),
            })],
        );
        let document = bridge.read_characteristic("bloodType").await;
        let decoded = decode_document(&document).expect("decodes");
        assert_eq!(decoded.records.len(), 1);

        let document = bridge.read_characteristic("biologicalSex").await;
        let decoded = decode_document(&document).expect("decodes");
        assert!(decoded.records.is_empty());
    }

    #[tokio::test]
    async fn reads_workouts_by_activity() {
        let workout = HealthRecord::Workout(WorkoutSample {
            header: SampleHeader::new(at(3), at(4)),
            activity_type: WorkoutActivityType::Running,
            duration: Some(3600.0),
            total_distance: None,
            total_energy_burned: None,
            events: Vec::new(),
        });
        let bridge = orchestrator_with(BridgeConfig::default(), vec![workout]);

        let running = WorkoutActivityType::Running.code();
        let document = bridge.read_workout(running, &ts(0), &ts(12)).await;
        assert_eq!(decode_document(&document).expect("decodes").records.len(), 1);

        let walking = WorkoutActivityType::Walking.code();
        let document = bridge.read_workout(walking, &ts(0), &ts(12)).await;
        assert!(decode_document(&document).expect("decodes").records.is_empty());

        let document = bridge.read_workout(9999, &ts(0), &ts(12)).await;
        assert_eq!(error_code(&document), codes::BRIDGE_FAILURE);
    }

    #[tokio::test]
    async fn statistics_over_a_range() {
        let bridge = orchestrator();
        let document = bridge
            .read_statistics("stepCount", &ts(0), &ts(12), "CumulativeSum")
            .await;
        let decoded = decode_document(&document).expect("decodes");
        let [HealthRecord::Statistics(statistics)] = decoded.records.as_slice() else {
            panic!("expected statistics: {document}");
        };
        let sum = statistics.sum.expect("sum");
        assert_eq!(sum.value, 600.0);
    }

    #[tokio::test]
    async fn statistics_collection_buckets_from_the_anchor() {
        let bridge = orchestrator();
        let document = bridge
            .read_statistics_collection(
                "stepCount",
                None,
                "cumulativeSum",
                &ts(0),
                "<interval hour='1'/>",
            )
            .await;
        let decoded = decode_document(&document).expect("decodes");
        let [HealthRecord::StatisticsCollection(collection)] = decoded.records.as_slice() else {
            panic!("expected a collection: {document}");
        };
        let sums: Vec<f64> = collection
            .statistics
            .iter()
            .map(|s| s.sum.map(|q| q.value).unwrap_or(-1.0))
            .collect();
        assert_eq!(sums, vec![100.0, 200.0, 300.0]);
    }

    #[tokio::test]
    async fn statistics_collection_applies_the_predicate() {
        let bridge = orchestrator();
        let document = bridge
            .read_statistics_collection(
                "stepCount",
                Some("<gt field='value' type='number' value='150'/>"),
                "cumulativeSum",
                &ts(0),
                "<interval hour='1'/>",
            )
            .await;
        let decoded = decode_document(&document).expect("decodes");
        let [HealthRecord::StatisticsCollection(collection)] = decoded.records.as_slice() else {
            panic!("expected a collection: {document}");
        };
        let sums: Vec<f64> = collection
            .statistics
            .iter()
            .map(|s| s.sum.map(|q| q.value).unwrap_or(-1.0))
            .collect();
        assert_eq!(sums, vec![0.0, 200.0, 300.0]);
    }

    #[tokio::test]
    async fn monthly_buckets_stay_on_the_anchor_day() {
        let day = |month: u32, day: u32| Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap();
        let sample = |start: DateTime<Utc>, value: f64| {
            HealthRecord::Quantity(QuantitySample {
                data_type: DataType::parse("stepCount").unwrap(),
                header: SampleHeader::new(start, start + chrono::Duration::hours(1)),
                quantity: Quantity::new(value, Unit::parse("count").unwrap()),
                count: None,
            })
        };
        let bridge = orchestrator_with(
            BridgeConfig::default(),
            vec![
                sample(day(2, 10), 10.0),
                sample(day(3, 30), 20.0),
                sample(day(4, 15), 40.0),
            ],
        );

        let document = bridge
            .read_statistics_collection(
                "stepCount",
                None,
                "cumulativeSum",
                &format_timestamp(&day(1, 31)),
                "<interval month='1'/>",
            )
            .await;
        let decoded = decode_document(&document).expect("decodes");
        let [HealthRecord::StatisticsCollection(collection)] = decoded.records.as_slice() else {
            panic!("expected a collection: {document}");
        };
        let starts: Vec<_> = collection.statistics.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![day(1, 31), day(2, 29), day(3, 31)]);
        let sums: Vec<f64> = collection
            .statistics
            .iter()
            .map(|s| s.sum.map(|q| q.value).unwrap_or(-1.0))
            .collect();
        // Mar 30 falls before the Mar 31 boundary.
        assert_eq!(sums, vec![10.0, 20.0, 40.0]);
    }

    #[tokio::test]
    async fn statistics_collection_rejects_an_empty_interval() {
        let bridge = orchestrator();
        let document = bridge
            .read_statistics_collection("stepCount", None, "cumulativeSum", &ts(0), "<interval day='0'/>")
            .await;
        assert_eq!(error_code(&document), codes::BRIDGE_FAILURE);

        let document = bridge
            .read_statistics_collection("stepCount", None, "cumulativeSum", &ts(0), "<interval fortnight='1'/>")
            .await;
        assert_eq!(error_code(&document), codes::MALFORMED_CONSTRAINT);
    }

    #[tokio::test]
    async fn statistics_option_must_fit_the_type() {
        let bridge = orchestrator();
        let document = bridge
            .read_statistics("stepCount", &ts(0), &ts(12), "discreteAverage")
            .await;
        assert_eq!(error_code(&document), codes::BRIDGE_FAILURE);

        let document = bridge
            .read_statistics_collection("heartRate", None, "cumulativeSum", &ts(0), "<interval hour='1'/>")
            .await;
        assert_eq!(error_code(&document), codes::BRIDGE_FAILURE);
    }

    #[tokio::test]
    async fn documents_arrive_in_batches() {
        let config = BridgeConfig {
            document_batch_size: 2,
            ..BridgeConfig::default()
        };
        let bridge = orchestrator_with(
            config,
            vec![cda(1, "first"), cda(2, "second"), cda(3, "third")],
        );

        let mut batches = bridge.read_documents(None, 0, true);
        let mut decoded = Vec::new();
        while let Some(batch) = batches.recv().await {
            decoded.push(decode_document(&batch).expect("decodes"));
        }
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].done, Some(false));
        assert_eq!(decoded[0].records.len(), 2);
        assert_eq!(decoded[1].done, Some(true));
        assert_eq!(decoded[1].records.len(), 1);
        let HealthRecord::Document(last) = &decoded[1].records[0] else {
            panic!("expected a document");
        };
        assert!(last.content.is_some());
    }

    #[tokio::test]
    async fn document_limit_and_empty_result() {
        let bridge = orchestrator_with(
            BridgeConfig::default(),
            vec![cda(1, "first"), cda(2, "second"), cda(3, "third")],
        );
        let mut batches = bridge.read_documents(None, 1, false);
        let batch = batches.recv().await.expect("one batch");
        let decoded = decode_document(&batch).expect("decodes");
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.done, Some(true));
        assert!(batches.recv().await.is_none());

        let empty = orchestrator();
        let mut batches = empty.read_documents(None, 0, false);
        let batch = batches.recv().await.expect("one batch");
        let decoded = decode_document(&batch).expect("decodes");
        assert!(decoded.records.is_empty());
        assert_eq!(decoded.done, Some(true));
    }

    #[tokio::test]
    async fn reads_pedometer_summaries() {
        let bridge = orchestrator_with(
            BridgeConfig::default(),
            vec![HealthRecord::Pedometer(health_records::PedometerSummary {
                start: at(0),
                end: at(6),
                steps: 4200,
                distance: Some(3100.0),
                floors_ascended: None,
                floors_descended: None,
            })],
        );
        let document = bridge.read_pedometer(&ts(0), &ts(12)).await;
        assert!(document.starts_with("<pedometer type=\"pedometer\">"), "{document}");
        assert!(document.contains("steps=\"4200\""), "{document}");
    }

    #[tokio::test]
    async fn observers_receive_new_records() {
        let bridge = orchestrator();
        let mut observer = bridge.begin_observer_query("stepCount").expect("registers");
        assert_eq!(observer.replaced, None);
        assert_eq!(bridge.observer_count(), 1);

        bridge
            .store()
            .insert(HealthRecord::Characteristic(CharacteristicRecord {
                characteristic: Characteristic::BloodType(BloodType::APositive),
            }))
            .expect("insert");
        bridge.store().insert(steps(5, 42.0)).expect("insert");

        let update = observer.updates.recv().await.expect("update");
        let decoded = decode_document(&update).expect("decodes");
        assert_eq!(decoded.records, vec![steps(5, 42.0)]);
    }

    #[tokio::test]
    async fn reregistering_an_observer_replaces_it() {
        let bridge = orchestrator();
        let mut first = bridge.begin_observer_query("stepCount").expect("registers");
        let second = bridge
            .begin_observer_query("HKQuantityTypeIdentifierStepCount")
            .expect("registers");
        assert_eq!(second.replaced, Some(first.id));
        assert_eq!(bridge.observer_count(), 1);

        // The replaced task is aborted, which closes its channel.
        assert!(first.updates.recv().await.is_none());

        assert!(bridge.stop_observer_query("stepCount"));
        assert!(!bridge.stop_observer_query("stepCount"));
        assert!(!bridge.stop_observer_query("bogus.identifier"));
        assert_eq!(bridge.observer_count(), 0);
    }

    #[tokio::test]
    async fn observers_need_a_sample_type_and_a_store() {
        let bridge = orchestrator();
        let err = bridge.begin_observer_query("bloodType").expect_err("not a sample type");
        assert!(matches!(err, CoreError::InvalidRequest(_)));

        bridge.store().set_available(false);
        let err = bridge.begin_observer_query("stepCount").expect_err("unavailable");
        assert!(matches!(err, CoreError::HealthStoreUnavailable));
    }
}
