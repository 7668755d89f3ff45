use std::path::Path;
use std::time::Duration;

use dspace_aip_archiver::config::Config;
use dspace_aip_archiver::export::DspaceExporter;
use dspace_aip_archiver::harvest::{HarvestWindow, OaiClient};
use dspace_aip_archiver::ledger::{HandleStore, Resolver};
use dspace_aip_archiver::noid;
use dspace_aip_archiver::observability::init_tracing;
use dspace_aip_archiver::pipeline::{Pipeline, PipelineSettings};
use dspace_aip_archiver::storage::StorageClient;
use tracing::info;

use crate::cli::{Cli, Commands, HandleArgs, MintArgs, RunArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn dispatch(cli: Cli) -> Result<(), AnyError> {
    let path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => run(path, args).await,
        Commands::InitDb => init_db(path),
        Commands::Resolve(args) => resolve(path, args),
        Commands::Show(args) => show(path, args),
        Commands::Mint(args) => mint(path, args),
    }
}

fn open_store(config: &Config) -> Result<HandleStore, AnyError> {
    let timeout = Duration::from_millis(config.database.busy_timeout_ms);
    Ok(HandleStore::open_with_timeout(&config.database.path, timeout)?)
}

fn load_lenient(path: Option<&Path>) -> Result<Config, AnyError> {
    let config = Config::load_unchecked(path)?;
    init_tracing(&config.logging);
    Ok(config)
}

async fn run(path: Option<&Path>, args: RunArgs) -> Result<(), AnyError> {
    let config = Config::load_with(path)?;
    init_tracing(&config.logging);

    let window = match (args.from, args.days) {
        (Some(from), _) => HarvestWindow::since(from),
        (None, days) => HarvestWindow::last_days(days.unwrap_or(config.oai.days)),
    };

    let resolver = Resolver::with_template(open_store(&config)?, &config.noid.template)?;
    let source = OaiClient::new(
        &config.oai.url,
        &config.oai.metadata_prefix,
        Duration::from_secs(config.oai.timeout_secs),
    )?;
    let exporter = DspaceExporter::new(&config.dspace.cli, &config.dspace.eperson);
    let storage = StorageClient::from_config(&config.storage)?;

    let pipeline = Pipeline::new(
        Box::new(source),
        Box::new(exporter),
        resolver,
        storage,
        PipelineSettings::from_config(&config),
    );

    let summary = pipeline.run(window).await;
    pipeline.close()?;
    let summary = summary?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.headline());
        for failure in &summary.failures {
            println!("  failed {}: {}", failure.handle, failure.error);
        }
    }
    Ok(())
}

fn init_db(path: Option<&Path>) -> Result<(), AnyError> {
    let config = load_lenient(path)?;
    let mut store = open_store(&config)?;
    let count = store.count()?;
    store.close()?;

    info!(path = %config.database.path.display(), count, "Handle store ready");
    println!("{} ({count} handles)", config.database.path.display());
    Ok(())
}

fn resolve(path: Option<&Path>, args: HandleArgs) -> Result<(), AnyError> {
    let config = load_lenient(path)?;
    let resolver = Resolver::with_template(open_store(&config)?, &config.noid.template)?;

    let noid = resolver.resolve_with_retry(&args.handle);
    resolver.close()?;
    println!("{}", noid?);
    Ok(())
}

fn show(path: Option<&Path>, args: HandleArgs) -> Result<(), AnyError> {
    let config = load_lenient(path)?;
    let mut store = open_store(&config)?;

    let record = store.get(&args.handle);
    store.close()?;

    match record? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => Err(format!("handle {} is not recorded", args.handle).into()),
    }
}

fn mint(path: Option<&Path>, args: MintArgs) -> Result<(), AnyError> {
    let template = match args.template {
        Some(template) => template,
        None => load_lenient(path)?.noid.template,
    };
    println!("{}", noid::mint(&template)?);
    Ok(())
}
