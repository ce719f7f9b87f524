//! Realmload CLI - Import OggDude exports into Realm VTT campaigns
//!
//! # Main Commands
//!
//! ```bash
//! realmload import --campaign <ID> --xml-dir Data --json-dir Adversaries
//! realmload scan --xml-dir Data --json-dir Adversaries
//! realmload sources                 # List recognized sourcebooks
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! realmload decode Data/Weapons.xml   # Dump normalized records as JSON
//! realmload map Data/Weapons.xml      # Decode + map, show outcomes
//! realmload example-profile           # Show an example mapping profile
//! ```

use clap::{Parser, Subcommand};
use realmload::{
    discover, example_profile, load_profiles, map_record, FileFormat, HttpClient, ImportJob,
    ImportManager, NullClient, RecordType, SourceFile, SourcesConfig, UploadClient,
    DEFAULT_API_URL,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "realmload")]
#[command(about = "Import OggDude XML and Adversaries JSON exports into Realm VTT", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and count importable records without uploading anything
    Scan {
        /// OggDude XML export directory
        #[arg(long)]
        xml_dir: Option<PathBuf>,

        /// Adversaries JSON directory
        #[arg(long)]
        json_dir: Option<PathBuf>,
    },

    /// Decode one source file and print its normalized records
    Decode {
        /// XML or JSON source file
        input: PathBuf,
    },

    /// Decode one source file and run it through the mapping engine
    Map {
        /// XML or JSON source file
        input: PathBuf,

        /// Field mapping configuration
        #[arg(long, default_value = "config/field_mapping.json")]
        mapping_config: PathBuf,
    },

    /// List recognized sourcebooks
    Sources {
        /// Sources configuration
        #[arg(long, default_value = "config/sources.json")]
        sources_config: PathBuf,
    },

    /// Show an example mapping profile
    ExampleProfile,

    /// Run a full import into a campaign
    Import {
        /// Campaign to import into
        #[arg(short, long)]
        campaign: String,

        /// OggDude XML export directory
        #[arg(long)]
        xml_dir: Option<PathBuf>,

        /// Adversaries JSON directory
        #[arg(long)]
        json_dir: Option<PathBuf>,

        /// Sourcebook keys to allow (default: every enabled source)
        #[arg(long, value_delimiter = ',')]
        sources: Vec<String>,

        /// Record types to import (default: all with a mapping profile)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,

        /// Upload batch size
        #[arg(long, default_value = "20")]
        batch_size: usize,

        /// Cap records per type, for trial imports
        #[arg(long)]
        limit: Option<usize>,

        /// Sources configuration
        #[arg(long, default_value = "config/sources.json")]
        sources_config: PathBuf,

        /// Field mapping configuration
        #[arg(long, default_value = "config/field_mapping.json")]
        mapping_config: PathBuf,

        /// API endpoint (default: REALM_API_URL or the public endpoint)
        #[arg(long)]
        api_url: Option<String>,

        /// Map everything but upload nothing
        #[arg(long)]
        dry_run: bool,

        /// Write the final result as JSON to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan { xml_dir, json_dir } => cmd_scan(xml_dir.as_deref(), json_dir.as_deref()),

        Commands::Decode { input } => cmd_decode(&input),

        Commands::Map {
            input,
            mapping_config,
        } => cmd_map(&input, &mapping_config),

        Commands::Sources { sources_config } => cmd_sources(&sources_config),

        Commands::ExampleProfile => cmd_example_profile(),

        Commands::Import {
            campaign,
            xml_dir,
            json_dir,
            sources,
            types,
            batch_size,
            limit,
            sources_config,
            mapping_config,
            api_url,
            dry_run,
            output,
        } => {
            cmd_import(ImportArgs {
                campaign,
                xml_dir,
                json_dir,
                sources,
                types,
                batch_size,
                limit,
                sources_config,
                mapping_config,
                api_url,
                dry_run,
                output,
            })
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("✗ Error: {e}");
        std::process::exit(1);
    }
}

struct ImportArgs {
    campaign: String,
    xml_dir: Option<PathBuf>,
    json_dir: Option<PathBuf>,
    sources: Vec<String>,
    types: Vec<String>,
    batch_size: usize,
    limit: Option<usize>,
    sources_config: PathBuf,
    mapping_config: PathBuf,
    api_url: Option<String>,
    dry_run: bool,
    output: Option<PathBuf>,
}

fn cmd_scan(
    xml_dir: Option<&Path>,
    json_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = discover(xml_dir, json_dir)?;
    eprintln!("Found {} source files", files.len());

    let mut counts: BTreeMap<RecordType, (usize, usize)> = BTreeMap::new();
    for file in &files {
        let entry = counts.entry(file.record_type).or_default();
        entry.0 += 1;
        match realmload::decode::decode(file) {
            Ok(records) => entry.1 += records.len(),
            Err(e) => eprintln!("  ⚠ {e}"),
        }
    }

    for (record_type, (file_count, record_count)) in counts {
        println!(
            "{:22} {:4} files  {:6} records",
            record_type.display_name(),
            file_count,
            record_count
        );
    }
    Ok(())
}

/// Classify a standalone file the way discovery would.
fn classify_input(input: &Path) -> Result<SourceFile, Box<dyn std::error::Error>> {
    let is_json = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        return Ok(SourceFile::new(input, RecordType::Adversary, FileFormat::Json));
    }

    let record_type = realmload::locate::classify_xml(input)
        .ok_or_else(|| format!("cannot classify {}", input.display()))?;
    Ok(SourceFile::new(input, record_type, FileFormat::Xml))
}

fn cmd_decode(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = classify_input(input)?;
    let records = realmload::decode::decode(&file)?;

    eprintln!(
        "Decoded {} {} records from {}",
        records.len(),
        file.record_type,
        input.display()
    );
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn cmd_map(input: &Path, mapping_config: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let profiles = load_profiles(mapping_config)?;
    let file = classify_input(input)?;
    let profile = profiles
        .get(file.record_type)
        .ok_or_else(|| format!("no mapping profile for {}", file.record_type))?;

    let records = realmload::decode::decode(&file)?;
    let mut mapped = Vec::new();
    let mut failed = 0usize;

    for raw in &records {
        match map_record(raw, profile) {
            Ok(target) => {
                for note in &target.notes {
                    eprintln!("  ⚠ {} / {}: {}", target.name, note.field, note.message);
                }
                mapped.push(target);
            }
            Err(failure) => {
                failed += 1;
                eprintln!(
                    "  ✗ {}: {} on '{}': {}",
                    failure.record, failure.reason, failure.rule, failure.detail
                );
            }
        }
    }

    eprintln!("Mapped {}/{} records ({failed} failed)", mapped.len(), records.len());
    let fields: Vec<_> = mapped.iter().map(|t| &t.fields).collect();
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

fn cmd_sources(sources_config: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = SourcesConfig::load(sources_config)?;
    for book in &config.sources {
        println!(
            "{} {:28} {}",
            if book.enabled { "[x]" } else { "[ ]" },
            book.key,
            book.name
        );
    }
    Ok(())
}

fn cmd_example_profile() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&example_profile())?);
    Ok(())
}

async fn cmd_import(args: ImportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let sources_config = SourcesConfig::load(&args.sources_config)?;
    let profiles = load_profiles(&args.mapping_config)?;

    let record_types = args
        .types
        .iter()
        .map(|t| RecordType::from_key(t).ok_or_else(|| format!("unknown record type: {t}")))
        .collect::<Result<Vec<_>, _>>()?;

    let client: Arc<dyn UploadClient> = if args.dry_run {
        eprintln!("Dry run: nothing will be uploaded");
        Arc::new(NullClient)
    } else {
        let base_url = args
            .api_url
            .or_else(|| std::env::var("REALM_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let token = std::env::var("REALM_API_TOKEN")
            .map_err(|_| realmload::UploadError::MissingToken)?;
        Arc::new(HttpClient::new(base_url, token)?)
    };

    let manager = ImportManager::new(client, profiles, sources_config);

    // Ctrl-C requests cooperative cancellation; in-flight work completes.
    let mut job = ImportJob::new(args.campaign)
        .with_sources(args.sources)
        .with_record_types(record_types)
        .with_batch_size(args.batch_size);
    if let Some(xml_dir) = args.xml_dir {
        job = job.with_xml_root(xml_dir);
    }
    if let Some(json_dir) = args.json_dir {
        job = job.with_json_root(json_dir);
    }
    if let Some(limit) = args.limit {
        job = job.with_limit(limit);
    }

    let cancel = job.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancellation requested; finishing in-flight work…");
            cancel.cancel();
        }
    });

    let result = manager.run(job).await?;

    println!();
    for (record_type, report) in result.reports() {
        let c = report.counts;
        println!(
            "{:22} {:9}  discovered {:5}  filtered {:5}  mapped {:5}  failed {:5}  uploaded {:5}  rejected {:5}",
            record_type.display_name(),
            report.stage.to_string(),
            c.discovered,
            c.filtered_out,
            c.mapped,
            c.failed_mapping,
            c.uploaded,
            c.failed_upload
        );
        if let Some(fatal) = &report.fatal {
            println!("{:22} stopped: {}", "", fatal);
        }
    }

    if let Some(output) = args.output {
        std::fs::write(&output, serde_json::to_string_pretty(&result)?)?;
        eprintln!("Result written to {}", output.display());
    }

    Ok(())
}
