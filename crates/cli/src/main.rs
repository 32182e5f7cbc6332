use bridge_core::{BridgeConfig, BridgeContext};
use bridge_wire::{decode_document, encode_interval, EncodeOptions, NumberFormat};
use clap::{Parser, Subcommand};
use health_records::{DataType, HealthRecord};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hbridge")]
#[command(about = "Health bridge encode/decode CLI")]
struct Cli {
    /// YAML config file
    #[arg(long, global = true)]
    config: Option<String>,
    /// Locale identifier, e.g. en_US or de_DE (overrides the config file)
    #[arg(long, global = true)]
    locale: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported data types and their default units
    Types,
    /// Show the default unit for a data type
    DefaultUnit {
        /// Canonical identifier or short alias
        identifier: String,
    },
    /// Decode a predicate document and print it in canonical form
    DecodePredicate {
        /// Predicate XML
        xml: String,
    },
    /// Decode an interval document and print it in canonical form
    DecodeInterval {
        /// Interval XML, e.g. "<interval day='1'/>"
        xml: String,
    },
    /// Parse a number
    DecodeNumber {
        text: String,
        /// Use the locale's separators instead of the bridge format
        #[arg(long)]
        localized: bool,
    },
    /// Encode JSON records into a wire document
    Encode {
        /// Data type identifier the records are declared as
        data_type: String,
        /// JSON file holding an array of records (stdin when omitted)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Include full document bodies
        #[arg(long)]
        include_data: bool,
    },
    /// Decode a wire document and print its records as JSON
    DecodeDocument {
        /// Wire document XML
        xml: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = BridgeConfig::resolve(cli.config, cli.locale)?;
    let context = BridgeContext::from_config(&config)?;

    match cli.command {
        Some(Commands::Types) => {
            for data_type in DataType::all() {
                match context.units().resolve(&data_type) {
                    Ok(unit) => println!("{} ({}) [{}]", data_type, data_type.alias(), unit),
                    Err(_) => println!("{} ({})", data_type, data_type.alias()),
                }
            }
        }
        Some(Commands::DefaultUnit { identifier }) => {
            match context.units().resolve_identifier(&identifier) {
                Ok(unit) => println!("{}", unit),
                Err(e) => eprintln!("Error resolving default unit: {}", e),
            }
        }
        Some(Commands::DecodePredicate { xml }) => match context.decoder().decode_predicate(&xml) {
            Ok(expression) => println!("{}", expression.to_xml()),
            Err(e) => eprintln!("Error decoding predicate: {}", e),
        },
        Some(Commands::DecodeInterval { xml }) => {
            match context.decoder().decode_date_components(&xml) {
                Ok(interval) => println!("{}", encode_interval(&interval)),
                Err(e) => eprintln!("Error decoding interval: {}", e),
            }
        }
        Some(Commands::DecodeNumber { text, localized }) => {
            let format = if localized {
                NumberFormat::Localized
            } else {
                NumberFormat::Bridge
            };
            match context.decoder().decode_number(&text, format) {
                Ok(value) => println!("{}", value),
                Err(e) => eprintln!("Error decoding number: {}", e),
            }
        }
        Some(Commands::Encode {
            data_type,
            file,
            include_data,
        }) => {
            let json = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let records: Vec<HealthRecord> = serde_json::from_str(&json)?;
            let options = EncodeOptions {
                include_document_data: include_data,
                ..EncodeOptions::default()
            };
            match context
                .encoder()
                .encode_with(&records, &data_type, None, options)
            {
                Ok(document) => println!("{}", document),
                Err(e) => println!("{}", bridge_wire::encoder::encode_error(&e.to_error_record())),
            }
        }
        Some(Commands::DecodeDocument { xml }) => match decode_document(&xml) {
            Ok(decoded) => {
                if let Some(error) = decoded.error {
                    println!(
                        "error {} {}: {}",
                        error.domain(),
                        error.code(),
                        error.description()
                    );
                } else {
                    println!("{}", serde_json::to_string_pretty(&decoded.records)?);
                    if let Some(done) = decoded.done {
                        println!("done: {}", done);
                    }
                }
            }
            Err(e) => eprintln!("Error decoding document: {}", e),
        },
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}
