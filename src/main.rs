use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudrec::aws::auth;
use cloudrec::aws::AwsClient;
use cloudrec::config::Config;
use cloudrec::resource::schema::Presence;
use cloudrec::resource::{self, get_data_source, get_resource};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Inspect and remove AWS resources through their typed handlers
#[derive(Parser, Debug)]
#[command(name = "cloudrec", version = cloudrec::VERSION, about, long_about = None)]
struct Args {
    /// AWS region to use
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Profile in the shared credentials file
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered resource and data source types
    Types,
    /// Show the attribute schema of a type
    Schema {
        type_name: String,
        /// Look up the data source instead of the resource
        #[arg(long)]
        data: bool,
    },
    /// Read one or more resources by identifier
    Read { type_name: String, ids: Vec<String> },
    /// Delete a resource by identifier
    Delete { type_name: String, id: String },
    /// Query a data source with JSON arguments
    Data {
        type_name: String,
        /// Arguments as a JSON object, e.g. '{"name": "web"}'
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Persist settings to the config file
    Configure {
        #[arg(long)]
        default_region: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudrec started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cloudrec").join("cloudrec.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudrec").join("cloudrec.log");
    }
    PathBuf::from("cloudrec.log")
}

async fn build_client(args: &Args, config: &Config) -> Result<AwsClient> {
    let profile = args.profile.as_deref().or(config.profile.as_deref());
    let identity = auth::load_identity(profile).await?;
    let region = config.effective_region(args.region.as_deref(), identity.region.as_deref());

    tracing::info!("Using region: {}", region);
    config.build_client(identity.credentials, &region)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = Config::load();
    if args.profile.is_some() {
        config.profile = args.profile.clone();
    }

    match &args.command {
        Command::Types => {
            for key in resource::get_all_resource_keys() {
                println!("resource     {}", key);
            }
            for key in resource::get_all_data_source_keys() {
                println!("data source  {}", key);
            }
        }
        Command::Schema { type_name, data } => {
            let schema = if *data {
                get_data_source(type_name).map(|d| d.schema())
            } else {
                get_resource(type_name).map(|r| r.schema())
            }
            .with_context(|| format!("unknown type {}", type_name))?;

            for attribute in &schema.attributes {
                let presence = match attribute.presence {
                    Presence::Required => "required",
                    Presence::Optional => "optional",
                    Presence::Computed => "computed",
                    Presence::OptionalComputed => "optional, computed",
                };
                let replace = if attribute.force_new { ", forces replacement" } else { "" };
                println!("{:<28} {:?} ({}{})", attribute.name, attribute.ty, presence, replace);
            }
        }
        Command::Read { type_name, ids } => {
            let handler = get_resource(type_name).with_context(|| format!("unknown resource type {}", type_name))?;
            let client = build_client(&args, &config).await?;

            // Independent reads run concurrently
            let results = futures::future::join_all(ids.iter().map(|id| handler.read(&client, id))).await;

            let mut states = Vec::with_capacity(results.len());
            for (id, result) in ids.iter().zip(results) {
                match result.with_context(|| format!("reading {} {}", type_name, id))? {
                    Some(state) => states.push(state),
                    None => eprintln!("{} {} no longer exists", type_name, id),
                }
            }
            print_json(&Value::Array(states))?;
        }
        Command::Delete { type_name, id } => {
            let handler = get_resource(type_name).with_context(|| format!("unknown resource type {}", type_name))?;
            let client = build_client(&args, &config).await?;

            handler
                .delete(&client, id)
                .await
                .with_context(|| format!("deleting {} {}", type_name, id))?;
            eprintln!("deleted {} {}", type_name, id);
        }
        Command::Data { type_name, args: raw } => {
            let handler =
                get_data_source(type_name).with_context(|| format!("unknown data source type {}", type_name))?;
            let input: Value = serde_json::from_str(raw).context("parsing --args as JSON")?;
            let client = build_client(&args, &config).await?;

            let output = handler
                .read(&client, input)
                .await
                .with_context(|| format!("reading data source {}", type_name))?;
            print_json(&output)?;
        }
        Command::Configure { default_region } => {
            config.set_region(default_region)?;
            if let Some(path) = Config::config_path() {
                eprintln!("saved {:?}", path);
            }
        }
    }

    Ok(())
}
