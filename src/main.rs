//! Provenance search CLI.
//! Submits searches against a dataflow provenance query service, polls them
//! to completion, and prints the matching events.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use provenance_search::detail::EventDetail;
use provenance_search::renderer::print_event_detail;
use provenance_search::{
    Config, FilterProperty, QueryClient, ReplayRequest, RowFilter, SearchOutcome, SearchRequest,
    SearchService, SortColumn, SortSpec, TableRenderer,
};

#[derive(Parser, Debug)]
#[command(
    name = "provenance_search",
    version,
    about = "Search provenance events recorded by a dataflow service"
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Query service base URL, overriding the configuration
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a search and display the matching events
    Search(SearchArgs),
    /// Show the full detail of one event
    Event {
        event_id: u64,
        /// Node that recorded the event, for clustered services
        #[arg(long)]
        node: Option<String>,
    },
    /// List the fields the service accepts search terms for
    Fields,
    /// List cluster nodes a search may be scoped to
    Nodes,
    /// Replay the flowfile content an event operated on
    Replay {
        event_id: u64,
        /// Node that recorded the event, for clustered services
        #[arg(long)]
        node: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Earliest event time, e.g. "09/23/2016 00:00:00 EDT"
    #[arg(long)]
    start_date: Option<String>,

    /// Latest event time
    #[arg(long)]
    end_date: Option<String>,

    /// Only events at least this large, e.g. "1 KB"
    #[arg(long, value_name = "SIZE")]
    min_file_size: Option<String>,

    /// Only events at most this large
    #[arg(long, value_name = "SIZE")]
    max_file_size: Option<String>,

    /// Restrict the search to one cluster node id
    #[arg(long)]
    node: Option<String>,

    /// Search term as FIELD=VALUE, using field ids from `fields`; repeatable
    #[arg(long = "term", value_name = "FIELD=VALUE")]
    terms: Vec<String>,

    /// Column to order the table by
    #[arg(long, value_enum, default_value_t = SortColumnArg::EventTime)]
    sort_by: SortColumnArg,

    /// Sort direction for the chosen column
    #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
    order: SortOrder,

    /// Only display rows whose property matches this pattern
    #[arg(long, value_name = "PATTERN")]
    filter: Option<String>,

    /// Row property the display filter applies to
    #[arg(long, value_enum, default_value_t = FilterPropertyArg::ComponentName)]
    filter_by: FilterPropertyArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortColumnArg {
    EventTime,
    EventType,
    FlowFileUuid,
    FileSize,
    ComponentName,
    ComponentType,
    NodeAddress,
}

impl From<SortColumnArg> for SortColumn {
    fn from(arg: SortColumnArg) -> Self {
        match arg {
            SortColumnArg::EventTime => SortColumn::EventTime,
            SortColumnArg::EventType => SortColumn::EventType,
            SortColumnArg::FlowFileUuid => SortColumn::FlowFileUuid,
            SortColumnArg::FileSize => SortColumn::FileSize,
            SortColumnArg::ComponentName => SortColumn::ComponentName,
            SortColumnArg::ComponentType => SortColumn::ComponentType,
            SortColumnArg::NodeAddress => SortColumn::NodeAddress,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortOrder {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FilterPropertyArg {
    ComponentName,
    ComponentType,
    EventType,
    NodeAddress,
}

impl From<FilterPropertyArg> for FilterProperty {
    fn from(arg: FilterPropertyArg) -> Self {
        match arg {
            FilterPropertyArg::ComponentName => FilterProperty::ComponentName,
            FilterPropertyArg::ComponentType => FilterProperty::ComponentType,
            FilterPropertyArg::EventType => FilterProperty::EventType,
            FilterPropertyArg::NodeAddress => FilterProperty::NodeAddress,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::from_env().context("Failed to load configuration from environment")?,
    };

    if let Some(api_url) = &cli.api_url {
        config.api.base_url = Url::parse(api_url).context("Invalid --api-url")?;
    }
    config.validate().context("Configuration validation failed")?;

    match cli.command {
        Commands::Search(args) => run_search(&config, args).await,
        Commands::Event { event_id, node } => show_event(&config, event_id, node).await,
        Commands::Fields => list_fields(&config).await,
        Commands::Nodes => list_nodes(&config).await,
        Commands::Replay { event_id, node } => replay_event(&config, event_id, node).await,
    }
}

async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let request = build_request(&args)?;
    let filter = args.filter.map(|text| RowFilter {
        text,
        property: args.filter_by.into(),
    });

    let client = QueryClient::new(config)?;
    let renderer = Arc::new(TableRenderer::new(filter));
    let mut service = SearchService::new(client, renderer, config);
    service.set_sort(SortSpec {
        column: args.sort_by.into(),
        ascending: matches!(args.order, SortOrder::Asc),
    });

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    service.set_progress_channel(progress_tx);
    let progress_task = tokio::spawn(async move {
        let mut last_reported = None;
        while let Some(percent) = progress_rx.recv().await {
            if last_reported != Some(percent) {
                info!("search progress: {}%", percent);
                last_reported = Some(percent);
            }
        }
    });

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, stopping the search");
            signal_cancel.cancel();
        }
    });

    let outcome = service.run_search(Some(request), cancel).await;
    drop(service);
    let _ = progress_task.await;

    match outcome? {
        SearchOutcome::Completed(summary) => {
            info!(
                displayed = summary.displayed,
                total = summary.total_count,
                "search complete"
            );
            Ok(())
        }
        SearchOutcome::Cancelled => {
            info!("search cancelled");
            Ok(())
        }
    }
}

fn build_request(args: &SearchArgs) -> Result<SearchRequest> {
    let mut request = SearchRequest {
        start_date: args.start_date.clone(),
        end_date: args.end_date.clone(),
        minimum_file_size: args.min_file_size.clone(),
        maximum_file_size: args.max_file_size.clone(),
        cluster_node_id: args.node.clone(),
        ..SearchRequest::default()
    };

    for term in &args.terms {
        let (field, value) = parse_term(term)?;
        request
            .search_terms
            .insert(field.to_string(), value.to_string());
    }

    request.validate()?;
    Ok(request)
}

fn parse_term(term: &str) -> Result<(&str, &str)> {
    match term.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => Ok((field.trim(), value.trim())),
        _ => anyhow::bail!("Search terms use FIELD=VALUE, got: {}", term),
    }
}

async fn show_event(config: &Config, event_id: u64, node: Option<String>) -> Result<()> {
    let client = QueryClient::new(config)?;
    let event = client.event(event_id, node.as_deref()).await?;
    print_event_detail(&EventDetail::from_event(&event));
    Ok(())
}

async fn list_fields(config: &Config) -> Result<()> {
    let client = QueryClient::new(config)?;
    let fields = client.search_options().await?;
    if fields.is_empty() {
        println!("The query service reports no searchable fields.");
        return Ok(());
    }

    println!("{:<28}  {:<28}  {}", "Id", "Label", "Type");
    for field in fields {
        println!(
            "{:<28}  {:<28}  {}",
            field.id, field.label, field.field_type
        );
    }
    Ok(())
}

async fn list_nodes(config: &Config) -> Result<()> {
    let client = QueryClient::new(config)?;
    let nodes = client.cluster_nodes().await?;
    if nodes.is_empty() {
        println!("The query service is not clustered.");
        return Ok(());
    }

    println!("{:<40}  {}", "Id", "Address");
    for node in nodes {
        println!("{:<40}  {}", node.id, node.address);
    }
    Ok(())
}

async fn replay_event(config: &Config, event_id: u64, node: Option<String>) -> Result<()> {
    let client = QueryClient::new(config)?;
    let replay = ReplayRequest {
        event_id,
        cluster_node_id: node,
    };
    let event = client.submit_replay(&replay).await?;
    println!("Successfully submitted replay request.");
    println!(
        "Recorded as event {} ({}).",
        event.event_id, event.event_type
    );
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "provenance_search=debug"
    } else {
        "provenance_search=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
