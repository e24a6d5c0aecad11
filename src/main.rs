//! CLI entry point for the lamp survey tool.
//!
//! Provides subcommands for transforming a saved or downloaded submissions
//! payload, fetching a form from KoboToolbox (with a local cache), listing
//! forms, and looking up individual students and schools.

mod infra;
mod services;

use crate::infra::kobo::client::KoboClient;
use crate::services::submission_api::SubmissionSource;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use lamp_survey::{
    cache::OutputCache,
    config::{KoboConfig, ttl_from_hours},
    fetch::{BasicClient, RetryOn429, auth::ApiKey, fetch_bytes},
    output::{print_json, print_pretty, read_output, write_json, write_schools_csv, write_students_csv},
    parser::parse_payload,
    publish::{DEFAULT_KEY, DashboardDocument, write_json_to_s3},
    transform::{TransformOutput, transform},
};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "lamp_survey")]
#[command(about = "Turns solar-lamp survey submissions into dashboard data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where and how to write the transformed data.
#[derive(Args)]
struct OutputArgs {
    /// Dashboard JSON file to write
    #[arg(short, long, default_value = "dashboard.json")]
    output: String,

    /// Optional: also write the schools table as CSV
    #[arg(long)]
    schools_csv: Option<String>,

    /// Optional: also write the students table as CSV
    #[arg(long)]
    students_csv: Option<String>,

    /// Gzip compress every file written
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a submissions payload from a file or URL
    Summarize {
        /// Path to a JSON file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[command(flatten)]
        out: OutputArgs,
    },
    /// Fetch the configured form from KoboToolbox and transform it
    Fetch {
        /// Form uid; defaults to KOBOTOOLBOX_FORM_ID
        #[arg(long)]
        form_id: Option<String>,

        #[command(flatten)]
        out: OutputArgs,

        /// Ignore and do not update the local cache
        #[arg(long, default_value_t = false)]
        no_cache: bool,

        /// Cache file; defaults to LAMP_SURVEY_CACHE_PATH
        #[arg(long)]
        cache_path: Option<String>,

        /// Cache time-to-live in hours; defaults to LAMP_SURVEY_CACHE_TTL_HOURS
        #[arg(long)]
        ttl_hours: Option<u64>,

        /// Dashboard JSON to fall back on when the fetch fails
        #[arg(long)]
        fallback: Option<String>,

        /// Optional: S3 bucket to publish the dashboard JSON to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// S3 object key for the published JSON
        #[arg(long, default_value = DEFAULT_KEY)]
        s3_key: String,
    },
    /// List the forms visible to the configured token
    ListForms,
    /// Show one student from a payload or dashboard JSON
    Student {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Student id, e.g. st4411
        id: String,
    },
    /// Show one school and its students from a payload or dashboard JSON
    School {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// School id, e.g. s1
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/lamp_survey.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("lamp_survey.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = KoboConfig::from_env()?;

    match cli.command {
        Commands::Summarize { source, out } => {
            let payload = load_payload(&source, &config).await?;
            let output = transform(&payload);
            write_outputs(&output, &out)?;
        }
        Commands::Fetch {
            form_id,
            out,
            no_cache,
            cache_path,
            ttl_hours,
            fallback,
            s3_bucket,
            s3_key,
        } => {
            let form_id = config.resolve_form_id(form_id.as_deref())?.to_string();
            let ttl = match ttl_hours {
                Some(hours) => ttl_from_hours(hours).context("--ttl-hours")?,
                None => config.cache_ttl,
            };
            let cache = (!no_cache).then(|| {
                OutputCache::new(cache_path.unwrap_or_else(|| config.cache_path.clone()), ttl)
            });

            let output = fetch_form(&config, &form_id, cache.as_ref(), fallback.as_deref()).await?;
            write_outputs(&output, &out)?;

            if let Some(bucket) = s3_bucket {
                let aws = aws_config::load_from_env().await;
                let s3 = aws_sdk_s3::Client::new(&aws);
                let doc = DashboardDocument::new(&output, Some(&form_id));
                write_json_to_s3(&s3, &bucket, &s3_key, &doc).await?;
            }
        }
        Commands::ListForms => {
            let client = KoboClient::from_config(&config)?;
            let forms = client.list_forms().await?;

            info!(total = forms.len(), "Form list fetched");

            for form in &forms {
                info!(
                    uid = %form.uid,
                    name = %form.name,
                    created = form.date_created.as_deref().unwrap_or("unknown"),
                    submissions = form.submission_count,
                    "Form"
                );
            }
        }
        Commands::Student { source, id } => {
            let output = load_output(&source, &config).await?;
            match output.student_by_id(&id) {
                Some(student) => info!("{}", serde_json::to_string_pretty(student)?),
                None => bail!("no student with id '{id}'"),
            }
        }
        Commands::School { source, id } => {
            let output = load_output(&source, &config).await?;
            let Some(school) = output.school_by_id(&id) else {
                bail!("no school with id '{id}'");
            };
            info!("{}", serde_json::to_string_pretty(school)?);
            for student in output.students_by_school(&id) {
                info!(
                    id = %student.id,
                    name = %student.name,
                    gender = %student.gender,
                    age = student.age,
                    aspiration = %student.career_aspiration,
                    "Student"
                );
            }
        }
    }

    Ok(())
}

/// Loads a payload from a local file path or fetches it over HTTP.
///
/// URLs are fetched with the configured token when one is set.
#[tracing::instrument(skip(config), fields(source = %source))]
async fn load_payload(source: &str, config: &KoboConfig) -> Result<Value> {
    let bytes = if source.starts_with("http") {
        let client = RetryOn429::new(BasicClient::new()?);
        match config.token.as_deref() {
            Some(token) => fetch_bytes(&ApiKey::token(client, token)?, source).await?,
            None => fetch_bytes(&client, source).await?,
        }
    } else {
        std::fs::read(source).with_context(|| format!("reading {source}"))?
    };
    parse_payload(&bytes)
}

/// Accepts either a dashboard JSON written by this tool or a raw payload.
async fn load_output(source: &str, config: &KoboConfig) -> Result<TransformOutput> {
    if source.ends_with(".gz") {
        return read_output(source);
    }

    let payload = load_payload(source, config).await?;
    if payload.get("students").is_some() && payload.get("summary").is_some() {
        let mut output: TransformOutput = serde_json::from_value(payload)?;
        output.relink_schools();
        return Ok(output);
    }
    Ok(transform(&payload))
}

/// Cache, then network, then the fallback file.
#[tracing::instrument(skip(config, cache, fallback))]
async fn fetch_form(
    config: &KoboConfig,
    form_id: &str,
    cache: Option<&OutputCache>,
    fallback: Option<&str>,
) -> Result<TransformOutput> {
    if let Some(output) = cache.and_then(|c| c.load(form_id)) {
        info!(students = output.students.len(), "Using cached dashboard data");
        return Ok(output);
    }

    let fetched = async {
        let client = KoboClient::from_config(config)?;
        client.fetch_submissions(form_id).await
    }
    .await;

    match fetched {
        Ok(payload) => {
            let output = transform(&payload);
            if let Some(cache) = cache {
                if let Err(e) = cache.store(form_id, &output) {
                    warn!(error = %e, "Failed to update cache");
                }
            }
            Ok(output)
        }
        Err(e) => {
            error!(error = %e, "Failed to load data from KoboToolbox");
            let Some(path) = fallback else {
                return Err(e);
            };
            warn!(path, "Using fallback dashboard data instead");
            read_output(path)
        }
    }
}

fn write_outputs(output: &TransformOutput, out: &OutputArgs) -> Result<()> {
    print_pretty(output);
    print_json(output)?;

    write_json(&out.output, output, out.gzip)?;
    if let Some(path) = &out.schools_csv {
        write_schools_csv(path, &output.summary.schools, out.gzip)?;
    }
    if let Some(path) = &out.students_csv {
        write_students_csv(path, &output.students, out.gzip)?;
    }

    info!(
        students = output.summary.total_students,
        schools = output.summary.schools.len(),
        lamps = output.summary.total_lamps,
        "Dashboard data written"
    );
    Ok(())
}
