//! # graphann CLI
//!
//! Build, search and evaluate graph indexes over `.fbin` / `.u8bin` / `.i8bin`
//! vector files.
//!
//! ```text
//! graphann build --metric l2 --element-type uint8 --data base.u8bin --output idx/
//! graphann groundtruth --metric l2 --element-type uint8 --data base.u8bin --queries q.u8bin -k 10 --output gt.bin
//! graphann search --metric l2 --element-type uint8 --data base.u8bin --index idx/ \
//!     --count 1000000 --dim 128 --queries q.u8bin --num-queries 10000 -k 10 --l-search 100 --ground-truth gt.bin
//! graphann stats --index idx/ --data base.u8bin
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use graphann_api::load_index;
use graphann_core::config::{LogFormat, LogLevel};
use graphann_core::{Config, ElementType, Metric};
use graphann_index::{FlatIndex, GraphIndex, GraphIndexBuilder, IndexMetadata};
use graphann_storage::VectorStore;

#[derive(Parser)]
#[command(name = "graphann")]
#[command(version, about = "graphann - graph-based approximate nearest neighbor search")]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    log_level: Option<LevelArg>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<FormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelArg> for LogLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Trace => LogLevel::Trace,
            LevelArg::Debug => LogLevel::Debug,
            LevelArg::Info => LogLevel::Info,
            LevelArg::Warn => LogLevel::Warn,
            LevelArg::Error => LogLevel::Error,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph index from a vector file
    Build {
        #[arg(long)]
        metric: Metric,
        #[arg(long)]
        element_type: ElementType,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Max out-degree R
        #[arg(long, short = 'R')]
        max_degree: Option<usize>,
        /// Build candidate list size L
        #[arg(long, short = 'L')]
        l_build: Option<usize>,
        #[arg(long)]
        alpha: Option<f32>,
        #[arg(long)]
        threads: Option<usize>,
        /// Largest insertion batch as a fraction of the dataset
        #[arg(long)]
        batch_fraction: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Search a saved index with a query file
    Search {
        #[arg(long)]
        metric: Metric,
        #[arg(long)]
        element_type: ElementType,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        count: usize,
        #[arg(long)]
        dim: usize,
        #[arg(long)]
        queries: PathBuf,
        #[arg(long)]
        num_queries: usize,
        #[arg(short)]
        k: Option<usize>,
        #[arg(long)]
        l_search: Option<usize>,
        #[arg(long)]
        visit_limit: Option<usize>,
        #[arg(long)]
        threads: Option<usize>,
        /// Ground truth file for recall@k
        #[arg(long)]
        ground_truth: Option<PathBuf>,
    },
    /// Compute exact nearest neighbors by brute force
    Groundtruth {
        #[arg(long)]
        metric: Metric,
        #[arg(long)]
        element_type: ElementType,
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        queries: PathBuf,
        #[arg(short)]
        k: usize,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Print index metadata, plus degree statistics when `--data` is given
    Stats {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = match format {
            FormatArg::Text => LogFormat::Text,
            FormatArg::Json => LogFormat::Json,
        };
    }
    init_logging(&config);

    match cli.command {
        Commands::Build {
            metric,
            element_type,
            data,
            output,
            max_degree,
            l_build,
            alpha,
            threads,
            batch_fraction,
            seed,
        } => {
            let mut build = config.build.clone();
            build.max_degree = max_degree.unwrap_or(build.max_degree);
            build.l_build = l_build.unwrap_or(build.l_build);
            build.alpha = alpha.unwrap_or(build.alpha);
            build.num_threads = threads.unwrap_or(build.num_threads);
            build.batch_fraction = batch_fraction.unwrap_or(build.batch_fraction);
            build.seed = seed.unwrap_or(build.seed);
            let params = build.to_params();
            params.validate()?;

            let store = Arc::new(
                VectorStore::open_with_header(&data, element_type)
                    .with_context(|| format!("opening {}", data.display()))?,
            );
            let (index, stats) = GraphIndexBuilder::new(metric, params).build_with_stats(store)?;
            index
                .save(&output)
                .with_context(|| format!("saving index to {}", output.display()))?;

            println!("vectors:               {}", stats.num_vectors);
            println!("build time:            {:.2}s", stats.total_time.as_secs_f64());
            println!("distance computations: {}", stats.distance_computations);
            println!("avg degree:            {:.2}", stats.avg_degree);
            println!("max degree:            {}", stats.max_degree);
            println!("entry point:           {}", stats.entry_point);
        }
        Commands::Search {
            metric,
            element_type,
            data,
            index,
            count,
            dim,
            queries,
            num_queries,
            k,
            l_search,
            visit_limit,
            threads,
            ground_truth,
        } => {
            let mut search = config.search.clone();
            search.k = k.unwrap_or(search.k);
            search.l_search = l_search.unwrap_or(search.l_search);
            search.visit_limit = visit_limit.or(search.visit_limit);
            search.num_threads = threads.unwrap_or(search.num_threads);
            let params = search.to_params();
            params.validate()?;

            let handle = load_index(metric, element_type, &data, &index, count, dim)
                .with_context(|| format!("loading index {}", index.display()))?
                .with_threads(search.threads())?;
            let query_store = VectorStore::open_with_header(&queries, element_type)
                .with_context(|| format!("opening {}", queries.display()))?;
            anyhow::ensure!(
                query_store.len() == num_queries,
                "{} holds {} queries, expected {}",
                queries.display(),
                query_store.len(),
                num_queries
            );

            let started = Instant::now();
            let (ids, _distances) = handle.install(|| handle.graph().batch_search_matrix(&query_store, &params))?;
            let elapsed = started.elapsed().as_secs_f64();

            let snapshot = handle.graph().metrics().snapshot();
            println!("queries:                {}", num_queries);
            println!("QPS:                    {:.0}", num_queries as f64 / elapsed.max(f64::EPSILON));
            println!("mean distance comps:    {:.1}", snapshot.mean_distance_computations());
            if let Some(gt_path) = ground_truth {
                let recall = handle.check_recall(&gt_path, &ids, params.k)?;
                println!("recall@{}:              {:.4}", params.k, recall);
            }
        }
        Commands::Groundtruth {
            metric,
            element_type,
            data,
            queries,
            k,
            output,
            threads,
        } => {
            let base = Arc::new(
                VectorStore::open_with_header(&data, element_type)
                    .with_context(|| format!("opening {}", data.display()))?,
            );
            let query_store = VectorStore::open_with_header(&queries, element_type)
                .with_context(|| format!("opening {}", queries.display()))?;
            let threads = threads.unwrap_or_else(|| config.search.threads());

            let gt = FlatIndex::new(base, metric).compute_ground_truth(&query_store, k, threads)?;
            gt.write(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), queries = gt.num_queries(), k, "Wrote ground truth");
        }
        Commands::Stats { index, data } => {
            let metadata = IndexMetadata::read(&index)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);

            if let Some(data) = data {
                let store = Arc::new(VectorStore::open(&data, metadata.element_type, metadata.count, metadata.dim)?);
                let graph = GraphIndex::load(&index, store, metadata.count, metadata.dim)?;
                let stats = graph.stats();
                println!("nodes:             {}", stats.num_nodes);
                println!("edges:             {}", stats.num_edges);
                println!("avg degree:        {:.2}", stats.avg_degree);
                println!("min / max degree:  {} / {}", stats.min_degree, stats.max_degree);
                println!("zero degree nodes: {}", stats.zero_degree_nodes);
                println!("entry points:      {}", stats.entry_points);
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let level = config.logging.level.as_tracing();
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init(),
    }
}

