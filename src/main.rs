use clap::Parser;
use clap::Subcommand;
use stagerag::config::AppConfig;
use stagerag::rag::PipelineQuery;
use stagerag::rag::RagPipeline;
use stagerag::Result;

#[derive(Parser)]
#[command(name = "stagerag")]
#[command(about = "StageRAG CLI tool for multi-stage retrieval-augmented question answering")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a configuration file (defaults to config.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the answer
    Ask {
        /// The question to answer
        question: String,
        /// Number of candidates to retrieve
        #[arg(short, long)]
        top_k: Option<usize>,
        /// Print the full result as JSON, including the raw model response
        #[arg(long)]
        json: bool,
    },
    /// Run the retrieval stage only and print the candidates
    Search {
        /// The search query
        query: String,
        /// Maximum number of candidates to return
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    if cli.verbose {
        stagerag::logging::init_simple_logging("debug")?;
    } else {
        stagerag::logging::init_logging(Some(&config))?;
    }

    let pipeline = RagPipeline::new(&config)?;

    match cli.command {
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            let result = pipeline
                .run_with_options(PipelineQuery {
                    question,
                    retrieval_limit: top_k.unwrap_or(config.search.default_top_k),
                    context_top_k: config.pipeline.context_top_k,
                })
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer);
            }
        }
        Commands::Search { query, limit } => {
            let candidates = pipeline.search_candidates(&query, limit).await?;
            for candidate in &candidates {
                println!("[{}] id={}", candidate.rank, candidate.id);
                println!("{}\n", candidate.content);
            }
            eprintln!("{} candidate(s)", candidates.len());
        }
    }

    Ok(())
}
