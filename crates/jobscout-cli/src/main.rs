mod display;
mod export;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use jobscout_client::{ClientConfig, McpToolClient};
use jobscout_core::models::DEFAULT_LOCATION;
use jobscout_core::traits::{Capability, JobStore, ToolClient};
use jobscout_core::{
    AppError, FilterCriteria, RetryingToolClient, SearchRequest, SearchService, ServiceConfig,
    SortKey, Source, TracingSearchReporter,
};
use jobscout_db::{Database, JobRepository, StoreConfig};

use crate::export::ExportFormat;

/// How many cached rows `show <n>` indexes into.
const SHOW_INDEX_WINDOW: usize = 100;

#[derive(Parser)]
#[command(
    name = "jobscout",
    version,
    about = "Aggregate software engineering job listings from Zhaopin and LinkedIn"
)]
struct Cli {
    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Comma-separated tech tags, e.g. "rust,kafka"
    #[arg(short, long)]
    tech: Option<String>,

    /// Minimum monthly salary in thousands (20 means ¥20k)
    #[arg(long)]
    salary_min: Option<u32>,

    /// Years of experience, "3-5" or "5+"
    #[arg(long)]
    exp: Option<String>,
}

impl From<FilterArgs> for FilterCriteria {
    fn from(args: FilterArgs) -> Self {
        FilterCriteria {
            tech: args.tech,
            salary_min: args.salary_min,
            experience: args.exp,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search for jobs, serving from the cache when possible
    Search {
        /// Job title or keywords
        query: String,

        #[arg(short, long, env = "JOBSCOUT_DEFAULT_LOCATION", default_value = DEFAULT_LOCATION)]
        location: String,

        /// zhaopin, linkedin or all
        #[arg(short, long, default_value = "zhaopin")]
        platform: String,

        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Skip the cache and query the platforms
        #[arg(long)]
        no_cache: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List cached jobs
    List {
        #[arg(short, long)]
        source: Option<String>,

        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// date, salary or company
        #[arg(long, default_value = "date")]
        sort_by: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show one job by id or by its number in `list`
    Show {
        /// Job id, or `#n`/`n` for the n-th most recent job
        id: String,

        /// Fetch the full posting page (uses one request)
        #[arg(long)]
        detail: bool,
    },

    /// Request quota and cache statistics
    Stats,

    /// Inspect configuration
    Config {
        #[arg(long)]
        show: bool,
    },

    /// Export cached jobs to JSON or CSV
    Export {
        /// Output file; the extension picks the format unless --format is given
        output: PathBuf,

        #[arg(short, long)]
        format: Option<ExportFormat>,

        #[arg(short, long)]
        source: Option<String>,

        #[arg(short = 'n', long, default_value_t = 1000)]
        limit: usize,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Fetch fresh listings into the cache
    Refresh {
        /// zhaopin, linkedin or all
        #[arg(short, long, default_value = "all")]
        platform: String,

        #[arg(short, long, default_value = "软件工程师")]
        query: String,

        #[arg(short, long, env = "JOBSCOUT_DEFAULT_LOCATION", default_value = DEFAULT_LOCATION)]
        location: String,
    },

    /// Delete old jobs from the cache
    ClearCache {
        /// Delete jobs fetched more than this many days ago
        #[arg(short = 'd', long = "older-than", default_value_t = 30)]
        days: u32,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Check the remote service and list its tools
    TestConnection,
}

/// Remote access for the service. Local-only commands run offline so they
/// work without a token.
#[derive(Clone)]
enum Remote {
    Online(RetryingToolClient<McpToolClient>),
    Offline,
}

impl ToolClient for Remote {
    async fn invoke(&self, capability: &Capability) -> Result<String, AppError> {
        match self {
            Remote::Online(client) => client.invoke(capability).await,
            Remote::Offline => Err(AppError::ConfigError(
                "remote access is not configured for this command".into(),
            )),
        }
    }
}

type Service = SearchService<Remote, JobRepository>;

struct App {
    client_config: ClientConfig,
    store_config: StoreConfig,
    service_config: ServiceConfig,
    quiet: bool,
}

impl App {
    fn from_env(quiet: bool) -> Result<Self> {
        Ok(Self {
            client_config: ClientConfig::from_env()?,
            store_config: StoreConfig::from_env()?,
            service_config: ServiceConfig::from_env()?,
            quiet,
        })
    }

    async fn store(&self) -> Result<JobRepository> {
        let db = Database::open(&self.store_config)
            .await
            .context("Failed to open job cache")?;
        Ok(db.job_repo())
    }

    /// The token check happens here, before anything touches the network.
    async fn service(&self, online: bool) -> Result<Service> {
        let remote = if online {
            Remote::Online(jobscout_client::connect(&self.client_config)?)
        } else {
            Remote::Offline
        };
        Ok(SearchService::new(
            remote,
            self.store().await?,
            self.service_config.clone(),
        ))
    }

    fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("Info: {message}");
        }
    }
}

fn warn(message: &str) {
    eprintln!("Warning: {message}");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose {
        "jobscout=debug"
    } else if cli.quiet {
        "jobscout=error"
    } else {
        "jobscout=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let app = App::from_env(cli.quiet)?;

    match cli.command {
        Commands::Search {
            query,
            location,
            platform,
            limit,
            no_cache,
            filters,
        } => {
            let mut request = SearchRequest::new(query)
                .with_location(location)
                .with_sources(parse_platforms(&platform)?)
                .with_limit(limit)
                .with_criteria(filters.into());
            if no_cache {
                request = request.bypass_cache();
            }
            cmd_search(&app, &request).await?;
        }
        Commands::List {
            source,
            limit,
            sort_by,
            filters,
        } => {
            let source = parse_source(source.as_deref())?;
            let sort: SortKey = sort_by.parse()?;
            cmd_list(&app, source, &filters.into(), sort, limit).await?;
        }
        Commands::Show { id, detail } => cmd_show(&app, &id, detail).await?,
        Commands::Stats => cmd_stats(&app).await?,
        Commands::Config { show } => cmd_config(&app, show),
        Commands::Export {
            output,
            format,
            source,
            limit,
            filters,
        } => {
            let format = ExportFormat::resolve(format, &output)?;
            let source = parse_source(source.as_deref())?;
            cmd_export(&app, &output, format, source, &filters.into(), limit).await?;
        }
        Commands::Refresh {
            platform,
            query,
            location,
        } => {
            let sources = parse_platforms(&platform)?;
            cmd_refresh(&app, &sources, &query, &location).await?;
        }
        Commands::ClearCache { days, force } => cmd_clear_cache(&app, days, force).await?,
        Commands::TestConnection => cmd_test_connection(&app).await?,
    }

    Ok(())
}

/// `all` expands to every platform.
fn parse_platforms(platform: &str) -> Result<Vec<Source>> {
    if platform.trim().eq_ignore_ascii_case("all") {
        return Ok(Source::ALL.to_vec());
    }
    Ok(vec![platform.parse()?])
}

fn parse_source(source: Option<&str>) -> Result<Option<Source>> {
    Ok(source.map(str::parse::<Source>).transpose()?)
}

fn describe_filters(criteria: &FilterCriteria) -> String {
    let mut parts = Vec::new();
    if let Some(tech) = &criteria.tech {
        parts.push(format!("tech={tech}"));
    }
    if let Some(min) = criteria.salary_min {
        parts.push(format!("salary>=¥{min}k"));
    }
    if let Some(exp) = &criteria.experience {
        parts.push(format!("exp={exp}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

async fn cmd_search(app: &App, request: &SearchRequest) -> Result<()> {
    let service = app.service(true).await?;
    let report = service.search(request, &TracingSearchReporter).await?;

    for warning in &report.warnings {
        warn(warning);
    }

    if report.jobs.is_empty() {
        if report.rate_limited {
            bail!("No cached data available and API limit reached.");
        }
        app.info("No jobs found. Try a different search query or platform.");
        return Ok(());
    }

    let filters = describe_filters(&request.criteria);
    let title = if report.rate_limited {
        format!("Cached Jobs (rate limited){filters}")
    } else {
        format!("Jobs matching '{}'{filters}", request.query)
    };
    if report.from_cache && !report.rate_limited {
        app.info(&format!(
            "Showing {} of {} cached results. Use --no-cache to refresh.",
            report.jobs.len(),
            report.total_matches
        ));
    }
    println!("{}", display::jobs_table(&report.jobs, &title));
    Ok(())
}

async fn cmd_list(
    app: &App,
    source: Option<Source>,
    criteria: &FilterCriteria,
    sort: SortKey,
    limit: usize,
) -> Result<()> {
    let service = app.service(false).await?;
    let jobs = service.list(source, criteria, sort, limit).await?;

    if jobs.is_empty() {
        if criteria.is_empty() {
            app.info("No jobs in cache. Run 'jobscout search <query>' to fetch jobs.");
        } else {
            app.info("No cached jobs match the specified filters.");
        }
        return Ok(());
    }

    let title = format!("Cached Jobs{}", describe_filters(criteria));
    println!("{}", display::jobs_table(&jobs, &title));
    Ok(())
}

async fn cmd_show(app: &App, id: &str, fetch: bool) -> Result<()> {
    let service = app.service(fetch).await?;
    let key = id.trim().trim_start_matches('#');

    let mut report = service.detail(key, fetch).await?;
    if report.is_none()
        && let Ok(n) = key.parse::<usize>()
    {
        let recent = service.store().get_jobs(None, SHOW_INDEX_WINDOW, 0).await?;
        if let Some(job) = n.checked_sub(1).and_then(|i| recent.get(i)) {
            report = service.detail(&job.id, fetch).await?;
        }
    }

    let Some(report) = report else {
        bail!("Job not found: {id}");
    };
    if let Some(warning) = &report.warning {
        warn(warning);
    }
    println!("{}", display::job_detail(&report.job, Utc::now()));
    Ok(())
}

async fn cmd_stats(app: &App) -> Result<()> {
    let service = app.service(false).await?;
    let stats = service.stats().await?;
    println!("{}", display::stats_view(&stats, Utc::now()));
    Ok(())
}

fn cmd_config(app: &App, show: bool) {
    if !show {
        println!("Use --show to display current configuration.");
        println!("Configuration is read from environment variables and a .env file.");
        return;
    }

    let client = &app.client_config;
    let store = &app.store_config;
    println!("Current Configuration:\n");
    println!("  API Token:        {}", client.masked_token());
    println!("  Endpoint:         {}", client.endpoint);
    println!("  Request Timeout:  {}s", client.request_timeout.as_secs());
    println!("  Max Retries:      {}", client.retry.max_retries);
    println!("  Cache Directory:  {}", store.cache_dir.display());
    println!("  Database:         {}", store.db_path().display());
    println!("  Monthly Limit:    {} requests", store.monthly_limit);
    println!(
        "  Cache Expiry:     {} hours",
        app.service_config.cache_expiry_hours
    );
    println!("  Default Location: {DEFAULT_LOCATION}");
    let platforms: Vec<&str> = Source::ALL.iter().map(Source::as_str).collect();
    println!("  Platforms:        {}", platforms.join(", "));
}

async fn cmd_export(
    app: &App,
    output: &std::path::Path,
    format: ExportFormat,
    source: Option<Source>,
    criteria: &FilterCriteria,
    limit: usize,
) -> Result<()> {
    let service = app.service(false).await?;
    let jobs = service
        .list(source, criteria, SortKey::Date, limit)
        .await?;

    if jobs.is_empty() {
        app.info("No jobs match the specified filters.");
        return Ok(());
    }

    export::export_to_file(output, &jobs, format)?;
    app.info(&format!(
        "Exported {} jobs to {} ({format})",
        jobs.len(),
        output.display()
    ));
    Ok(())
}

async fn cmd_refresh(app: &App, sources: &[Source], query: &str, location: &str) -> Result<()> {
    let service = app.service(true).await?;
    let report = service
        .refresh(sources, query, location, &TracingSearchReporter)
        .await?;

    if report.rate_limited {
        warn(&format!(
            "Monthly request limit reached ({}/{}). Nothing refreshed.",
            report.quota.requests_used, report.quota.monthly_limit
        ));
    }
    for entry in &report.sources {
        match &entry.error {
            Some(error) => warn(&format!("{}: {error}", entry.source)),
            None if entry.fetched == 0 => println!("{}: no jobs found", entry.source),
            None => println!(
                "{}: {} jobs ({} new)",
                entry.source, entry.fetched, entry.new
            ),
        }
    }
    println!(
        "Refresh complete. {} total jobs cached.",
        report.total_cached
    );
    println!(
        "API Usage: {}/{} requests this month",
        report.quota.requests_used, report.quota.monthly_limit
    );
    Ok(())
}

async fn cmd_clear_cache(app: &App, days: u32, force: bool) -> Result<()> {
    let service = app.service(false).await?;
    let current = service.store().job_count(None).await?;
    if current == 0 {
        app.info("Cache is already empty.");
        return Ok(());
    }

    if !force {
        println!("This will delete jobs older than {days} days from the cache.");
        println!("Current cache has {current} jobs.");
    }
    if !confirm("Continue?", force)? {
        app.info("Cancelled.");
        return Ok(());
    }

    let deleted = service.expire(days).await?;
    let remaining = service.store().job_count(None).await?;
    println!("Deleted {deleted} old jobs. {remaining} jobs remaining in cache.");
    Ok(())
}

/// Ask a yes/no question, defaulting to no. `force` answers yes without prompting.
fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

async fn cmd_test_connection(app: &App) -> Result<()> {
    let client = jobscout_client::connect(&app.client_config)?;
    println!("Testing connection to {} ...", app.client_config.endpoint);

    let tools = client
        .inner()
        .list_tools()
        .await
        .context("Connection failed")?;

    println!("Connection successful. {} tools available:", tools.len());
    for tool in &tools {
        match &tool.description {
            Some(description) => println!("  {} - {}", tool.name, display::truncate(description, 80)),
            None => println!("  {}", tool.name),
        }
    }
    Ok(())
}
