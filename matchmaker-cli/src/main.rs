use clap::{Parser, Subcommand, ValueEnum};
use matchmaker::schema::parse_schema;
use matchmaker::{EngineConfig, Store, ViewEngine};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

/// Matchmaker CLI: manage collections and view schemas, and materialize views
#[derive(Parser)]
#[command(name = "matchmaker", version, about)]
struct Cli {
    /// Path to the store database
    #[arg(long, default_value = "matchmaker.db")]
    db: PathBuf,

    /// Engine config file (YAML); MATCHMAKER_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

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

#[derive(Subcommand)]
enum Command {
    /// List collections
    Collections,

    /// Create an empty collection
    CreateCollection {
        /// Collection name (letters and underscores)
        name: String,
    },

    /// Insert documents into a collection
    Insert {
        /// Collection name
        collection: String,
        /// JSON file holding an array of objects ("-" for stdin)
        #[arg(long)]
        file: Option<String>,
        /// Field values for a single document (e.g. --field FK_movieDetails=5f1e...)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Store a view schema and create its manual collection
    CreateView {
        /// Schema file (YAML, or JSON with a .json extension)
        #[arg(long)]
        schema: PathBuf,
    },

    /// List stored view schemas
    Views,

    /// Show one stored view schema
    ShowView {
        /// View name
        name: String,
    },

    /// Insert hand-entered records into a view's manual collection
    InsertManual {
        /// View name
        view: String,
        /// JSON file holding an array of objects ("-" for stdin)
        #[arg(long)]
        file: Option<String>,
        /// Field values for a single document
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Materialize a source collection through a view schema
    Materialize {
        /// Source collection
        #[arg(long)]
        source: String,
        /// Schema file to materialize with
        #[arg(long, conflicts_with = "view", required_unless_present = "view")]
        schema: Option<PathBuf>,
        /// Stored view to materialize with
        #[arg(long)]
        view: Option<String>,
        /// Override the configured deadline
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Include warnings and pass statistics in the output
        #[arg(long)]
        warnings: bool,
    },

    /// Show collection counts and stored views
    Status,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(&cli.db)?;

    match cli.command {
        Command::Collections => {
            let names = store.list_collections().await?;
            print_output(&serde_json::json!(names), &cli.format)?;
        }

        Command::CreateCollection { name } => {
            store.create_collection(&name).await?;
            print_output(&serde_json::json!({ "ok": true, "created": name }), &cli.format)?;
        }

        Command::Insert {
            collection,
            file,
            fields,
        } => {
            let docs = read_documents(file.as_deref(), &fields)?;
            let ids = store.insert_many(&collection, docs).await?;
            print_output(&ids_output(&ids), &cli.format)?;
        }

        Command::CreateView { schema } => {
            let schema = parse_schema(&schema)?;
            let id = store.create_view(&schema).await?;
            print_output(
                &serde_json::json!({
                    "ok": true,
                    "view": schema.name,
                    "id": id.to_hex(),
                    "manual_collection": schema.manual_collection(),
                }),
                &cli.format,
            )?;
        }

        Command::Views => {
            let views = store.list_views().await?;
            print_output(&serde_json::to_value(views)?, &cli.format)?;
        }

        Command::ShowView { name } => {
            let view = store.get_view(&name).await?;
            print_output(&serde_json::to_value(view)?, &cli.format)?;
        }

        Command::InsertManual { view, file, fields } => {
            let docs = read_documents(file.as_deref(), &fields)?;
            let ids = store.insert_manual(&view, docs).await?;
            print_output(&ids_output(&ids), &cli.format)?;
        }

        Command::Materialize {
            source,
            schema,
            view,
            deadline_ms,
            warnings,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let deadline = deadline_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.deadline());
            let schema = match (schema, view) {
                (Some(path), _) => parse_schema(&path)?,
                (None, Some(name)) => store.get_view(&name).await?,
                (None, None) => return Err("either --schema or --view is required".into()),
            };

            let engine = ViewEngine::new(Arc::new(store), config);
            let result = engine
                .materialize_with_deadline(&schema, &source, deadline)
                .await?;

            if result.timed_out {
                log::warn!(
                    "Deadline reached: {} of {} documents materialized",
                    result.completed,
                    result.launched
                );
            }
            let output = if warnings {
                serde_json::to_value(&result)?
            } else {
                serde_json::to_value(&result.records)?
            };
            print_output(&output, &cli.format)?;
        }

        Command::Status => {
            let result = store.status().await?;
            print_output(&result, &cli.format)?;
        }
    }

    Ok(())
}

/// Config file when given, then environment overrides.
fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let base = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(base.with_env_overrides(|key| std::env::var(key).ok())?)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn ids_output(ids: &[matchmaker::DocumentId]) -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "ids": ids.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
    })
}

/// Documents from a JSON array file, or one document built from `--field` pairs.
fn read_documents(
    file: Option<&str>,
    fields: &[(String, String)],
) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    let Some(path) = file else {
        if fields.is_empty() {
            return Err("nothing to insert: pass --file or --field".into());
        }
        return Ok(vec![fields_to_value(fields)]);
    };

    let content = if path == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        content
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read document file '{path}': {e}"))?
    };

    match serde_json::from_str(&content)? {
        serde_json::Value::Array(docs) => Ok(docs),
        doc @ serde_json::Value::Object(_) => Ok(vec![doc]),
        _ => Err(format!("'{path}' must hold a JSON object or an array of objects").into()),
    }
}

fn fields_to_value(fields: &[(String, String)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, val) in fields {
        // Numbers, booleans and nested JSON keep their type; anything else is a string
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    serde_json::Value::Object(map)
}
