use clap::{Parser, Subcommand, ValueEnum};
use kioskdb::catalog::RecordKind;
use kioskdb::report::{self, Report, ReportFormat};
use kioskdb::{builtin_catalog, parse_catalog, Filter, PageRequest, RecordSet, Store, UploadMode};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::process;

/// KioskDB CLI - inspect and edit event-registration and kiosk data from the command line
#[derive(Parser)]
#[command(name = "kioskdb", version, about)]
struct Cli {
    /// Path to the SQLite document database
    #[arg(long, env = "KIOSKDB_DATABASE_URL", default_value = "kioskdb.sqlite")]
    database_url: String,

    /// Replacement dataset catalog (YAML)
    #[arg(long, env = "KIOSKDB_CATALOG")]
    catalog: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
    Html,
}

impl From<ExportFormat> for ReportFormat {
    fn from(f: ExportFormat) -> Self {
        match f {
            ExportFormat::Csv => ReportFormat::Csv,
            ExportFormat::Json => ReportFormat::Json,
            ExportFormat::Html => ReportFormat::Html,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Get a single document by ID
    Get {
        /// Database name
        database: String,
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
    },

    /// List documents in a collection, one page at a time
    List {
        database: String,
        collection: String,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
        /// Case-insensitive search over the collection's search fields
        #[arg(long)]
        search: Option<String>,
    },

    /// Insert a JSON object, or every object of a JSON array
    Insert {
        database: String,
        collection: String,
        /// Read the JSON body from a file (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Merge a JSON object into an existing document
    Update {
        database: String,
        collection: String,
        id: String,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Fail unless the document is still at this version
        #[arg(long)]
        version: Option<i64>,
    },

    /// Delete a document, or every document with --all
    Delete {
        database: String,
        collection: String,
        /// Document ID (omit with --all)
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        #[arg(long, conflicts_with = "id")]
        all: bool,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        version: Option<i64>,
    },

    /// Flattened record listing of a catalog dataset
    Records {
        /// Catalog dataset name
        #[arg(default_value = "uploaded_data")]
        dataset: String,
        /// Fetch one record by plain or composite id
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        search: Option<String>,
    },

    /// Upload JSON into a flattened dataset
    Upload {
        #[arg(default_value = "uploaded_data")]
        dataset: String,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Store an array as one document per element or one bundled document
        #[arg(long, default_value = "split")]
        mode: String,
    },

    /// Write a dataset report to a file or stdout
    Export {
        /// Catalog dataset name
        dataset: String,
        #[arg(long, default_value = "csv")]
        output: ExportFormat,
        #[arg(long)]
        search: Option<String>,
        /// Destination file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show database health and collection counts
    Status,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = match &cli.catalog {
        Some(path) => parse_catalog(path)?,
        None => builtin_catalog()?,
    };
    let store = Store::open(&cli.database_url, catalog)?;

    match cli.command {
        Command::Get {
            database,
            collection,
            id,
        } => {
            let doc = store.collection(&database, &collection)?.get(&id)?;
            print_output(&doc.to_json(), &cli.format)?;
        }

        Command::List {
            database,
            collection,
            page,
            limit,
            search,
        } => {
            let col = store.collection(&database, &collection)?;
            let request = PageRequest::new(page, limit, col.definition().page_size)?;
            let filter = col.search_filter(search.as_deref())?;
            let result = col.list(&filter, request)?;
            print_output(
                &serde_json::json!({
                    "data": result.data,
                    "pagination": result.pagination,
                }),
                &cli.format,
            )?;
        }

        Command::Insert {
            database,
            collection,
            file,
        } => {
            let body = read_json(file)?;
            let created = store.collection(&database, &collection)?.create(body)?;
            print_output(&created_value(created), &cli.format)?;
        }

        Command::Update {
            database,
            collection,
            id,
            file,
            version,
        } => {
            let patch = read_json(file)?;
            let doc = store
                .collection(&database, &collection)?
                .update(&id, patch, version)?;
            print_output(
                &serde_json::json!({ "ok": true, "id": doc.id, "version": doc.version }),
                &cli.format,
            )?;
        }

        Command::Delete {
            database,
            collection,
            id,
            all,
            dry_run,
            version,
        } => {
            let col = store.collection(&database, &collection)?;
            match (id, all) {
                (_, true) if dry_run => {
                    let count = col.count(&Filter::All)?;
                    print_output(
                        &serde_json::json!({
                            "dry_run": true,
                            "would_delete": { "database": database, "collection": collection, "count": count },
                        }),
                        &cli.format,
                    )?;
                }
                (_, true) => {
                    let deleted = col.delete_all()?;
                    log::warn!("Deleted all {deleted} documents from {database}/{collection}");
                    print_output(
                        &serde_json::json!({ "ok": true, "deletedCount": deleted }),
                        &cli.format,
                    )?;
                }
                (Some(id), false) if dry_run => {
                    let doc = col.get(&id)?;
                    print_output(
                        &serde_json::json!({
                            "dry_run": true,
                            "would_delete": { "database": database, "collection": collection, "id": id },
                            "document": doc.to_json(),
                        }),
                        &cli.format,
                    )?;
                }
                (Some(id), false) => {
                    col.delete(&id, version)?;
                    log::info!("Deleted {database}/{collection}/{id}");
                    print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
                }
                (None, false) => return Err("a document id or --all is required".into()),
            }
        }

        Command::Records {
            dataset,
            id,
            page,
            limit,
            search,
        } => {
            let records = RecordSet::new(store.dataset(&dataset)?)?;
            match id {
                Some(id) => print_output(&records.get_record(&id)?.to_json(), &cli.format)?,
                None => {
                    let page_size = records.collection().definition().page_size;
                    let request = PageRequest::new(page, limit, page_size)?;
                    let listing = records.list_records(search.as_deref(), request)?;
                    print_output(
                        &serde_json::json!({
                            "data": listing.page.data,
                            "pagination": listing.page.pagination,
                            "counts": listing.counts,
                        }),
                        &cli.format,
                    )?;
                }
            }
        }

        Command::Upload {
            dataset,
            file,
            mode,
        } => {
            let mode = UploadMode::parse(Some(&mode))?;
            let body = read_json(file)?;
            let created = RecordSet::new(store.dataset(&dataset)?)?.upload(body, mode)?;
            print_output(&created_value(created), &cli.format)?;
        }

        Command::Export {
            dataset,
            output,
            search,
            out,
        } => {
            let report = export(&store, &dataset, output.into(), search.as_deref())?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &report.body)
                        .map_err(|e| format!("Failed to write '{}': {e}", path.display()))?;
                    print_output(
                        &serde_json::json!({ "ok": true, "file": path, "suggestedName": report.filename }),
                        &cli.format,
                    )?;
                }
                None => print!("{}", report.body),
            }
        }

        Command::Status => {
            let result = store.status()?;
            print_output(&result, &cli.format)?;
        }
    }

    Ok(())
}

/// Render a dataset as a report: flattened datasets as uploaded-data
/// exports, registrations with their dedicated layout, anything else as JSON.
fn export(
    store: &Store,
    dataset: &str,
    format: ReportFormat,
    search: Option<&str>,
) -> kioskdb::Result<Report> {
    let col = store.dataset(dataset)?;
    let def = col.definition().clone();
    let now = chrono::Utc::now();

    if def.flatten {
        let records = RecordSet::new(col)?.matching_records(search)?;
        return match format {
            ReportFormat::Csv => report::uploaded_csv(&def, &records, now),
            ReportFormat::Json => report::uploaded_json(&records, now),
            ReportFormat::Html => Ok(report::uploaded_html(&def, &records, search, now)),
        };
    }

    let docs = col.find(&col.search_filter(search)?)?;
    match (def.kind, format) {
        (RecordKind::Registration, ReportFormat::Csv) => Ok(report::registrations_csv(&docs, now)),
        (RecordKind::Registration, ReportFormat::Html) => {
            Ok(report::registrations_html(&def, &docs, search, now))
        }
        (_, ReportFormat::Json) => {
            let body = serde_json::to_string_pretty(&docs)?;
            Ok(Report::new(ReportFormat::Json, dataset, now, body))
        }
        (_, other) => Err(kioskdb::KioskDbError::BadRequest(format!(
            "Dataset '{dataset}' has no {} report",
            other.extension()
        ))),
    }
}

fn created_value(created: kioskdb::Created) -> Value {
    match created {
        kioskdb::Created::One(doc) => serde_json::json!({ "id": doc.id }),
        kioskdb::Created::Many(ids) => serde_json::json!({ "count": ids.len(), "ids": ids }),
    }
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn read_json(file: Option<PathBuf>) -> Result<Value, Box<dyn std::error::Error>> {
    let content = match file {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?,
        None => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            content
        }
    };
    Ok(serde_json::from_str(&content)?)
}
