//! Command-line front end: search the catalog, resolve names and check a
//! stack against either a local SQLite catalog or the hosted API.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use interaction_checker_core::backend::{AdditionRequest, HttpBackend, InteractionBackend, LocalBackend};
use interaction_checker_core::cache::isolated_search_cache;
use interaction_checker_core::models::{CheckOutcome, CheckerMode, NotFoundItem};
use interaction_checker_core::resolver::Resolution;
use interaction_checker_core::{
    CheckOptions, CheckerConfig, Database, Normalizer, StackChecker, Substance, SubstanceResolver,
    SubstanceType,
};

#[derive(Parser, Debug)]
#[command(
    name = "interaction-checker",
    version,
    about = "Check supplements and medications for known interactions"
)]
struct Cli {
    /// Local catalog database. Without it the hosted API is used
    /// (SUPABASE_URL / SUPABASE_ANON_KEY).
    #[arg(long, global = true, env = "CHECKER_DB")]
    db: Option<PathBuf>,

    /// JSON config file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Autocomplete suggestions for a query.
    Search {
        query: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Resolve names and check every pair among them.
    Check {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Check every supplement against every medication.
    CheckCross {
        #[arg(long = "supplement", required = true)]
        supplements: Vec<String>,
        #[arg(long = "medication", required = true)]
        medications: Vec<String>,
    },
    /// Catalog counts.
    Stats,
    /// Ask for a missing substance to be added.
    RequestAdd {
        name: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Import a catalog JSON document into the local database.
    Import { file: PathBuf },
    /// Map built-in brand names onto local catalog substances.
    SeedBrands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Drug,
    Supplement,
}

impl From<KindArg> for SubstanceType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Drug => SubstanceType::Drug,
            KindArg::Supplement => SubstanceType::Supplement,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Import { file } => return import(&cli, file),
        Command::SeedBrands => return seed_brands(&cli),
        _ => {}
    }

    let backend = open_backend(&cli, &config)?;
    let resolver = SubstanceResolver::with_cache(
        Arc::clone(&backend),
        isolated_search_cache(config.cache_capacity, config.cache_ttl()),
    )
    .configured(&config);
    let checker = StackChecker::with_options(Arc::clone(&backend), CheckOptions::from(&config));

    match &cli.command {
        Command::Search { query, kind } => {
            let suggestions = resolver.suggest(query, kind.map(Into::into)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            } else if suggestions.is_empty() {
                println!("No matches for \"{}\"", suggestions.query);
            } else {
                for s in &suggestions.items {
                    println!("{:<12} {:<40} {}", s.kind.as_str(), s.display_name, s.substance_id);
                }
            }
        }
        Command::Check { names } => {
            let (stack, missing) = resolve_all(&resolver, names, None).await;
            let outcome = checker.check_with_unresolved(&CheckerMode::Stack(stack), &missing).await?;
            print_outcome(&cli, &outcome, &missing)?;
        }
        Command::CheckCross { supplements, medications } => {
            let (supplements, mut missing) =
                resolve_all(&resolver, supplements, Some(SubstanceType::Supplement)).await;
            let (medications, missing_meds) =
                resolve_all(&resolver, medications, Some(SubstanceType::Drug)).await;
            missing.extend(missing_meds);
            let mode = CheckerMode::SupplementsDrugs { supplements, medications };
            let outcome = checker.check_with_unresolved(&mode, &missing).await?;
            print_outcome(&cli, &outcome, &missing)?;
        }
        Command::Stats => {
            let stats = backend.stats().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let count = |n: Option<u64>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
                println!("Supplements:  {}", count(stats.supplements));
                println!("Drugs:        {}", count(stats.drugs));
                println!("Interactions: {}", stats.interactions);
                println!("Tokens:       {}", stats.tokens);
            }
        }
        Command::RequestAdd { name, kind } => {
            let request = AdditionRequest::new(name.as_str(), kind.map(Into::into));
            if request.raw_name.is_empty() {
                bail!("substance name is empty");
            }
            let id = backend.request_addition(&request).await?;
            println!("Request submitted ({id})");
        }
        Command::Import { .. } | Command::SeedBrands => {}
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<CheckerConfig> {
    let mut config = match &cli.config {
        Some(path) => CheckerConfig::from_json_file(path)?,
        None => CheckerConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn open_backend(cli: &Cli, config: &CheckerConfig) -> Result<Arc<dyn InteractionBackend>> {
    match &cli.db {
        Some(path) => {
            let db = Database::open(path)
                .with_context(|| format!("opening catalog {}", path.display()))?;
            debug!(path = %path.display(), "using local catalog");
            Ok(Arc::new(LocalBackend::new(db)))
        }
        None => {
            let backend = HttpBackend::from_config(config)
                .context("no --db given and the hosted API is not configured")?;
            Ok(Arc::new(backend))
        }
    }
}

fn local_db(cli: &Cli) -> Result<Database> {
    let Some(path) = &cli.db else {
        bail!("this command needs --db");
    };
    Database::open(path).with_context(|| format!("opening catalog {}", path.display()))
}

fn import(cli: &Cli, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let mut db = local_db(cli)?;
    let summary = db.import_catalog_json(&json)?;
    info!(
        substances = summary.substances,
        interactions = summary.interactions,
        brand_aliases = summary.brand_aliases,
        "catalog imported"
    );
    println!(
        "Imported {} substances, {} interactions, {} brand aliases",
        summary.substances, summary.interactions, summary.brand_aliases
    );
    Ok(())
}

fn seed_brands(cli: &Cli) -> Result<()> {
    let db = local_db(cli)?;
    let written = db.seed_alias_packs(&Normalizer::new())?;
    println!("Seeded {written} brand aliases");
    Ok(())
}

/// Resolve each name the way a submit would. Unresolved names come back
/// separately with their suggestions.
async fn resolve_all(
    resolver: &SubstanceResolver,
    names: &[String],
    kind: Option<SubstanceType>,
) -> (Vec<Substance>, Vec<NotFoundItem>) {
    let mut resolved: Vec<Substance> = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        // "a, b, c" adds each listed name
        let resolutions = match resolver.submit_many(name, kind).await {
            Some(list) => list,
            None => resolver.submit(name, kind, None).await.into_iter().collect(),
        };
        for resolution in resolutions {
            match resolution {
                Resolution::Resolved { substance, via } => {
                    debug!(input = %name, id = %substance.substance_id, ?via, "resolved");
                    if !resolved.iter().any(|s| s.substance_id == substance.substance_id) {
                        resolved.push(substance);
                    }
                }
                Resolution::NotFound(item) => missing.push(item),
            }
        }
    }
    (resolved, missing)
}

fn print_outcome(cli: &Cli, outcome: &CheckOutcome, missing: &[NotFoundItem]) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    for item in missing {
        let hint: Vec<&str> = item.suggestions.iter().map(|s| s.display_name.as_str()).collect();
        if hint.is_empty() {
            println!("Not found: {}", item.raw_name);
        } else {
            println!("Not found: {} (did you mean {}?)", item.raw_name, hint.join(", "));
        }
    }

    let s = &outcome.summary;
    println!(
        "{} pairs checked, {} interactions ({} major, {} moderate, {} minor, {} monitor)",
        outcome.pair_count, s.total, s.major, s.moderate, s.minor, s.monitor
    );
    if let Some(top) = &outcome.top_concern {
        println!("Top concern: {} [{}]", top.summary, top.severity.clinical_label());
    }
    for i in &outcome.interactions {
        let safety = i.safety_label();
        println!(
            "- {:<10} {} + {}: {} ({})",
            i.severity.clinical_label(),
            i.substance_a.label(),
            i.substance_b.label(),
            i.summary,
            safety.confidence_label
        );
    }
    for failed in &outcome.failed_pairs {
        println!("! {} + {} not checked: {}", failed.token_a, failed.token_b, failed.reason);
    }
    Ok(())
}
