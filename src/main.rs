use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bridge_core::constants::{CONFIG_PATH_ENV, LOCALE_ENV};
use bridge_core::{BridgeConfig, BridgeContext, InMemoryHealthStore, QueryOrchestrator};
use bridge_types::format_timestamp;
use bridge_wire::encoder::encode_error;
use health_records::{DataType, HealthRecord, Quantity, QuantitySample, SampleHeader, Unit};

/// Separates a command from its arguments on one input line. XML arguments contain spaces.
const FIELD_SEPARATOR: char = '|';

/// Host simulator for the health bridge
///
/// Plays the part of the managed host: it sends primitive strings to the orchestrator and prints
/// every wire document it gets back, one per line. Commands are read from stdin, one per line,
/// with `|` between fields:
///
/// ```text
/// readQuantity|stepCount|2024-05-01T00:00:00.000Z|2024-05-02T00:00:00.000Z|false
/// readStatisticsCollection|stepCount||cumulativeSum|2024-05-01T00:00:00.000Z|<interval hour='1'/>
/// beginObserverQuery|stepCount
/// addSteps|120
/// ```
///
/// Pass `--demo` to run a scripted session against the seeded store instead.
///
/// # Environment Variables
/// - `HEALTHBRIDGE_CONFIG`: YAML config file (optional)
/// - `HEALTHBRIDGE_LOCALE`: locale identifier, overrides the config file
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("healthbridge_run=info".parse()?)
                .add_directive("bridge_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = BridgeConfig::resolve(
        std::env::var(CONFIG_PATH_ENV).ok(),
        std::env::var(LOCALE_ENV).ok(),
    )?;
    let context = BridgeContext::from_config(&config)?;
    tracing::info!("++ Starting health bridge host simulator (locale {})", context.locale());

    let now = Utc::now();
    let store = Arc::new(InMemoryHealthStore::new());
    bridge_core::demo::seed(&store, now)?;
    tracing::info!("++ Seeded {} demo records", store.len());

    let mut host = Host::new(QueryOrchestrator::new(store, context), now);

    if std::env::args().any(|arg| arg == "--demo") {
        for line in demo_script(now) {
            host.emit(format!("> {line}"));
            host.handle(&line).await;
            // Gives observers a chance to report before the next command.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    } else {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if !host.handle(&line).await {
                break;
            }
        }
    }

    host.finish().await;
    Ok(())
}

/// The host side of the string channel.
struct Host {
    bridge: QueryOrchestrator<InMemoryHealthStore>,
    now: DateTime<Utc>,
    output: mpsc::UnboundedSender<String>,
    printer: JoinHandle<()>,
}

impl Host {
    fn new(bridge: QueryOrchestrator<InMemoryHealthStore>, now: DateTime<Utc>) -> Self {
        let (output, mut printed) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            while let Some(document) = printed.recv().await {
                println!("{document}");
            }
        });
        Self {
            bridge,
            now,
            output,
            printer,
        }
    }

    /// Stop observers and wait until everything emitted has been printed.
    async fn finish(self) {
        let Host {
            bridge,
            output,
            printer,
            ..
        } = self;
        drop(bridge);
        drop(output);
        if let Err(err) = printer.await {
            tracing::warn!("printer stopped: {err}");
        }
    }

    fn emit(&self, document: String) {
        if self.output.send(document).is_err() {
            tracing::warn!("output closed");
        }
    }

    /// Run one command line. Returns `false` when the host asked to quit.
    async fn handle(&mut self, line: &str) -> bool {
        let fields: Vec<&str> = line.trim().split(FIELD_SEPARATOR).collect();
        let arg = |index: usize| fields.get(index).copied().unwrap_or_default();
        let flag = |index: usize| arg(index).eq_ignore_ascii_case("true");

        match fields.first().copied().unwrap_or_default() {
            "" => {}
            "quit" | "exit" => return false,
            "readQuantity" => {
                let document = self.bridge.read_quantity(arg(1), arg(2), arg(3), flag(4)).await;
                self.emit(document);
            }
            "readCategory" => {
                let document = self.bridge.read_category(arg(1), arg(2), arg(3)).await;
                self.emit(document);
            }
            "readCorrelation" => {
                let document = self.bridge.read_correlation(arg(1), arg(2), arg(3)).await;
                self.emit(document);
            }
            "readCharacteristic" => {
                let document = self.bridge.read_characteristic(arg(1)).await;
                self.emit(document);
            }
            "readWorkout" => {
                let document = match arg(1).trim().parse::<i64>() {
                    Ok(activity) => self.bridge.read_workout(activity, arg(2), arg(3)).await,
                    Err(_) => host_error(format!("invalid activity code '{}'", arg(1))),
                };
                self.emit(document);
            }
            "readStatistics" => {
                let document = self
                    .bridge
                    .read_statistics(arg(1), arg(2), arg(3), arg(4))
                    .await;
                self.emit(document);
            }
            "readStatisticsCollection" => {
                let predicate = Some(arg(2)).filter(|p| !p.trim().is_empty());
                let document = self
                    .bridge
                    .read_statistics_collection(arg(1), predicate, arg(3), arg(4), arg(5))
                    .await;
                self.emit(document);
            }
            "readDocuments" => {
                let predicate = Some(arg(1)).filter(|p| !p.trim().is_empty());
                let limit = arg(2).trim().parse::<usize>().unwrap_or(0);
                let mut batches = self.bridge.read_documents(predicate, limit, flag(3));
                while let Some(batch) = batches.recv().await {
                    self.emit(batch);
                }
            }
            "readPedometer" => {
                let document = self.bridge.read_pedometer(arg(1), arg(2)).await;
                self.emit(document);
            }
            "beginObserverQuery" => match self.bridge.begin_observer_query(arg(1)) {
                Ok(mut observer) => {
                    if let Some(replaced) = observer.replaced {
                        tracing::info!("observer {replaced} replaced by {}", observer.id);
                    }
                    let output = self.output.clone();
                    tokio::spawn(async move {
                        while let Some(update) = observer.updates.recv().await {
                            if output.send(update).is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(err) => self.emit(encode_error(&err.to_error_record())),
            },
            "stopObserverQuery" => {
                let stopped = self.bridge.stop_observer_query(arg(1));
                tracing::info!("stop observer {}: {stopped}", arg(1));
            }
            "addSteps" => {
                let document = match arg(1).trim().parse::<f64>() {
                    Ok(value) => match self.add_steps(value) {
                        Ok(()) => return true,
                        Err(err) => encode_error(&err.to_error_record()),
                    },
                    Err(_) => host_error(format!("invalid step count '{}'", arg(1))),
                };
                self.emit(document);
            }
            other => self.emit(host_error(format!("unknown command '{other}'"))),
        }
        true
    }

    fn add_steps(&mut self, value: f64) -> bridge_core::CoreResult<()> {
        let start = self.now;
        self.now += Duration::minutes(1);
        self.bridge
            .store()
            .insert(HealthRecord::Quantity(QuantitySample {
                data_type: DataType::parse("stepCount")?,
                header: SampleHeader::new(start, self.now),
                quantity: Quantity::new(value, Unit::parse("count")?),
                count: None,
            }))
    }
}

fn host_error(description: String) -> String {
    let error = bridge_core::CoreError::InvalidRequest(description);
    encode_error(&error.to_error_record())
}

fn demo_script(now: DateTime<Utc>) -> Vec<String> {
    let start = format_timestamp(&(now - Duration::hours(25)));
    let end = format_timestamp(&(now + Duration::hours(1)));
    let anchor = format_timestamp(&(now - Duration::hours(24)));
    vec![
        format!("readQuantity|stepCount|{start}|{end}|false"),
        format!("readQuantity|stepCount|{start}|{end}|true"),
        format!("readQuantity|bodyTemperature|{start}|{end}|false"),
        format!("readCategory|sleepAnalysis|{start}|{end}"),
        format!("readCorrelation|HKCorrelationTypeIdentifierBloodPressure|{start}|{end}"),
        "readCharacteristic|biologicalSex".into(),
        "readCharacteristic|dateOfBirth".into(),
        format!("readWorkout|37|{start}|{end}"),
        format!("readStatistics|heartRate|{start}|{end}|discreteMax"),
        format!(
            "readStatisticsCollection|stepCount|<ge field='value' type='number' value='100'/>|cumulativeSum|{anchor}|<interval hour='6'/>"
        ),
        "readDocuments||0|true".into(),
        format!("readPedometer|{start}|{end}"),
        "beginObserverQuery|stepCount".into(),
        "addSteps|120".into(),
        "stopObserverQuery|stepCount".into(),
        format!("readQuantity|bogus.identifier|{start}|{end}|false"),
    ]
}
