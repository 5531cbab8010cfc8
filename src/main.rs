//! Rank Tuner CLI
//!
//! Records relevance judgments, tunes ranking functions against them and runs
//! searches with the best trained ranker.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rank_tuner::{
    config::Config,
    context::Context,
    legacy::{QueryFileLayout, import_legacy},
    ranker::RankerFamily,
    scoring::{DocId, ReplayEngine},
    search::{SearchOptions, SortKey, TimeWindow},
    training::default_grids,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Rank Tuner - relevance evaluation and ranker tuning for post search
#[derive(Parser)]
#[command(name = "rank-tuner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a query and the documents judged relevant for it
    Record {
        /// Evaluator id
        evaluator: String,

        /// The query text
        query: String,

        /// Ids of documents judged relevant
        #[arg(short, long, num_args = 1..)]
        relevant: Vec<String>,
    },

    /// Merge an evaluator's judgments into the master record
    Merge {
        /// Evaluator id
        evaluator: String,

        /// Master record id (defaults to the configured master id)
        #[arg(short, long)]
        master: Option<String>,
    },

    /// Import judgments from the older line-based text files
    ImportLegacy {
        /// Evaluator id to store the judgments under
        evaluator: String,

        /// Query file (`<id>_queries.txt`)
        #[arg(long)]
        queries: PathBuf,

        /// Judgment file (`<id>_evals.txt`)
        #[arg(long)]
        evals: PathBuf,

        /// The query file has no count line (merged master files)
        #[arg(long)]
        plain: bool,

        /// Replace an existing record
        #[arg(long)]
        force: bool,
    },

    /// Show an evaluator's queries and judgments
    Show {
        /// Evaluator id (defaults to the master record)
        evaluator: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List evaluators with a relevance record
    List,

    /// Compute MAP of a ranker on a relevance record
    Evaluate {
        /// Run file replayed as the scoring engine
        #[arg(short, long)]
        runs: PathBuf,

        /// Ranker identifier: best, bm25 or jelinek-mercer
        #[arg(long, default_value = "best")]
        ranker: String,

        /// Evaluator record to use (defaults to the master record)
        #[arg(short, long)]
        evaluator: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Tune ranker parameters on the master record
    Train {
        /// Run file replayed as the scoring engine
        #[arg(short, long)]
        runs: PathBuf,

        /// Family to train: bm25, jelinek-mercer or all
        #[arg(short, long, default_value = "all")]
        family: String,
    },

    /// Print the ranker selected for an identifier
    Select {
        /// Ranker identifier: best, bm25 or jelinek-mercer
        #[arg(default_value = "best")]
        identifier: String,
    },

    /// Search posts with a trained ranker
    Search {
        /// The search query
        query: String,

        /// Run file replayed as the scoring engine
        #[arg(short, long)]
        runs: PathBuf,

        /// Ranker identifier: best, bm25 or jelinek-mercer
        #[arg(long, default_value = "best")]
        ranker: String,

        /// Number of ranked posts to consider
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Start date (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// End date, inclusive (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// Sort by `date` or `upvotes`
        #[arg(short, long)]
        sort: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rank_tuner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Record {
            evaluator,
            query,
            relevant,
        } => cmd_record(config_path, &evaluator, &query, relevant),
        Commands::Merge { evaluator, master } => cmd_merge(config_path, &evaluator, master),
        Commands::ImportLegacy {
            evaluator,
            queries,
            evals,
            plain,
            force,
        } => cmd_import_legacy(config_path, &evaluator, &queries, &evals, plain, force),
        Commands::Show { evaluator, json } => cmd_show(config_path, evaluator, json),
        Commands::List => cmd_list(config_path),
        Commands::Evaluate {
            runs,
            ranker,
            evaluator,
            json,
        } => cmd_evaluate(config_path, &runs, &ranker, evaluator, json),
        Commands::Train { runs, family } => cmd_train(config_path, &runs, &family),
        Commands::Select { identifier } => cmd_select(config_path, &identifier),
        Commands::Search {
            query,
            runs,
            ranker,
            top_k,
            start,
            end,
            sort,
            json,
        } => cmd_search(
            config_path,
            &query,
            &runs,
            &ranker,
            top_k,
            start.as_deref(),
            end.as_deref(),
            sort.as_deref(),
            json,
        ),
    }
}

/// Build the process context, replaying `runs` as the scoring engine if given.
fn open_context(config_path: Option<&Path>, runs: Option<&Path>) -> Result<Context<ReplayEngine>> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let engine = match runs {
        Some(path) => ReplayEngine::from_file(path)
            .with_context(|| format!("Failed to load run file '{}'", path.display()))?,
        None => ReplayEngine::new(),
    };
    Context::new(config, engine).context("Invalid configuration")
}

fn cmd_record(
    config_path: Option<&Path>,
    evaluator: &str,
    query: &str,
    relevant: Vec<String>,
) -> Result<()> {
    let ctx = open_context(config_path, None)?;
    let doc_ids: Vec<DocId> = relevant.into_iter().map(DocId::from).collect();

    let query_number = ctx
        .relevance()
        .record_query(evaluator, query)
        .context("Failed to record query")?;
    ctx.relevance()
        .record_relevant_docs(evaluator, query_number, &doc_ids)
        .context("Failed to record relevant documents")?;

    println!(
        "Recorded query {} for '{}' with {} relevant document(s)",
        query_number,
        evaluator,
        doc_ids.len()
    );
    Ok(())
}

fn cmd_merge(config_path: Option<&Path>, evaluator: &str, master: Option<String>) -> Result<()> {
    let ctx = open_context(config_path, None)?;
    let master = master.unwrap_or_else(|| ctx.config().paths.master_id.clone());

    let merged = ctx
        .relevance()
        .merge_into_master(evaluator, &master)
        .with_context(|| format!("Failed to merge '{}' into '{}'", evaluator, master))?;

    println!(
        "Merged '{}' into '{}': {} queries, {} judgments",
        evaluator,
        master,
        merged.query_count,
        merged.judgments.len()
    );
    Ok(())
}

fn cmd_import_legacy(
    config_path: Option<&Path>,
    evaluator: &str,
    queries: &Path,
    evals: &Path,
    plain: bool,
    force: bool,
) -> Result<()> {
    let ctx = open_context(config_path, None)?;

    if !force && ctx.relevance().load(evaluator)?.is_some() {
        anyhow::bail!(
            "A record for '{}' already exists at '{}'. Use --force to replace it.",
            evaluator,
            ctx.relevance().path_for(evaluator).display()
        );
    }

    let layout = if plain {
        QueryFileLayout::Plain
    } else {
        QueryFileLayout::Counted
    };
    let record =
        import_legacy(evaluator, queries, evals, layout).context("Failed to import legacy files")?;
    ctx.relevance()
        .save(&record)
        .context("Failed to save relevance record")?;

    println!(
        "Imported {} queries and {} judgments for '{}'",
        record.query_count,
        record.judgments.len(),
        evaluator
    );
    Ok(())
}

fn cmd_show(config_path: Option<&Path>, evaluator: Option<String>, json: bool) -> Result<()> {
    let ctx = open_context(config_path, None)?;
    let evaluator = evaluator.unwrap_or_else(|| ctx.config().paths.master_id.clone());

    let Some(record) = ctx.relevance().load(&evaluator)? else {
        println!("No relevance record for '{}'.", evaluator);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Relevance record: {}", record.evaluator);
    println!("{}", "─".repeat(60));
    for (query_number, query) in record.queries_from(1) {
        let mut docs: Vec<_> = record
            .relevant_docs(query_number)
            .into_iter()
            .map(DocId::to_string)
            .collect();
        docs.sort();
        println!("{:>4}. {}", query_number, query);
        if !docs.is_empty() {
            println!("      relevant: {}", docs.join(", "));
        }
    }
    println!("{}", "─".repeat(60));
    println!(
        "{} queries, {} judgments",
        record.query_count,
        record.judgments.len()
    );
    Ok(())
}

fn cmd_list(config_path: Option<&Path>) -> Result<()> {
    let ctx = open_context(config_path, None)?;
    let evaluators = ctx.relevance().list_evaluators()?;

    if evaluators.is_empty() {
        println!(
            "No relevance records in '{}'.",
            ctx.relevance().dir().display()
        );
        return Ok(());
    }
    for evaluator in evaluators {
        let marker = if evaluator == ctx.config().paths.master_id {
            " (master)"
        } else {
            ""
        };
        println!("{}{}", evaluator, marker);
    }
    Ok(())
}

fn cmd_evaluate(
    config_path: Option<&Path>,
    runs: &Path,
    ranker_id: &str,
    evaluator: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = open_context(config_path, Some(runs))?;
    let evaluator = evaluator.unwrap_or_else(|| ctx.config().paths.master_id.clone());

    let record = ctx
        .relevance()
        .load(&evaluator)?
        .with_context(|| format!("No relevance record for '{}'", evaluator))?;
    let ranker = ctx
        .selector()
        .load(ranker_id)?
        .with_context(|| format!("No ranker available for '{}'", ranker_id))?;

    let report = ctx
        .evaluator()
        .evaluate(&ranker, &record)
        .context("Evaluation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Ranker: {}  (cutoff {})", report.ranker, report.cutoff);
    println!("{}", "─".repeat(60));
    for q in &report.queries {
        println!(
            "{:>4}. AP {:.4}  ({} relevant, {} retrieved)  {}",
            q.query_number, q.average_precision, q.relevant, q.retrieved, q.query
        );
    }
    println!("{}", "─".repeat(60));
    println!("MAP: {:.4} over {} queries", report.map, report.queries.len());
    Ok(())
}

fn cmd_train(config_path: Option<&Path>, runs: &Path, family: &str) -> Result<()> {
    let ctx = open_context(config_path, Some(runs))?;
    let families = if family.eq_ignore_ascii_case("all") {
        RankerFamily::ALL.to_vec()
    } else {
        let parsed = RankerFamily::parse(family)
            .with_context(|| format!("Unknown ranker family '{}'", family))?;
        vec![parsed]
    };

    let master = ctx.master_record()?;
    let search = ctx.parameter_search();

    for family in families {
        let start = Instant::now();
        let result = search
            .search(family, &default_grids(family), master.as_ref())
            .with_context(|| format!("Training {} failed", family))?;

        println!(
            "{:<16} MAP {:.4}  {}  ({:.2?})",
            family.id(),
            result.map,
            result.ranker,
            start.elapsed()
        );
    }
    println!(
        "\nTraining results saved to: {}",
        ctx.training().dir().display()
    );
    Ok(())
}

fn cmd_select(config_path: Option<&Path>, identifier: &str) -> Result<()> {
    let ctx = open_context(config_path, None)?;
    match ctx.selector().load(identifier)? {
        Some(ranker) => println!("{}", ranker),
        None => println!("No ranker available for '{}'.", identifier),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    config_path: Option<&Path>,
    query: &str,
    runs: &Path,
    ranker_id: &str,
    top_k: Option<usize>,
    start: Option<&str>,
    end: Option<&str>,
    sort: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = open_context(config_path, Some(runs))?;
    let ranker = ctx.resolve_ranker(ranker_id)?;

    let sort_key = match sort {
        Some(name) => name.parse::<SortKey>()?,
        None => ctx.config().search.sort,
    };
    let options = SearchOptions {
        top_k: top_k.unwrap_or(ctx.config().search.top_k),
        time_window: TimeWindow::from_optional_dates(start, end)?,
        sort_key,
    };

    let begin = Instant::now();
    let results = ctx
        .searcher()
        .search(query, &ranker, &options)
        .context("Search failed")?;
    let duration = begin.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("Searching for: \"{}\"", query);
    println!("Using ranker: {}", ranker);
    println!();

    if results.is_empty() {
        println!("No posts found.");
        return Ok(());
    }

    println!("Results:");
    println!("{}", "─".repeat(60));
    for (i, post) in results.iter().enumerate() {
        println!(
            "{:>2}. [{}] {} upvotes  {}",
            i + 1,
            post.formatted_date(),
            post.upvotes,
            post.url
        );
        let preview: String = post.content.chars().take(200).collect();
        for line in preview.lines().take(3) {
            println!("      {}", line);
        }
        if post.content.chars().count() > 200 {
            println!("      ...");
        }
        println!();
    }
    println!("{}", "─".repeat(60));
    println!("Found {} posts in {:.2?}", results.len(), duration);
    Ok(())
}
