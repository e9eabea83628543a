//! Command-line front end for `tutor-rag`.
//!
//! Loads a JSON corpus of textbooks into an in-memory index, then answers,
//! retrieves or maps a single question and prints the result as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tutor_rag::{
    CurriculumFilter, CurriculumInfo, EngineConfig, HashingEmbeddingProvider,
    InMemoryVectorIndex, QueryContext, RagError, Syllabus, TextbookDocument, TutorEngine,
};

/// Ask a curriculum-aware tutor about your textbooks
#[derive(Parser, Debug)]
#[command(name = "tutor", version, about, long_about = None)]
pub struct Cli {
    /// JSON file holding an array of textbooks
    #[arg(long, global = true, default_value = "corpus.json")]
    pub corpus: PathBuf,

    /// JSON engine configuration; missing fields take their defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the number of chunks retrieved
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Answer with an OpenAI chat model (needs OPENAI_API_KEY)
    #[cfg(feature = "openai")]
    #[arg(long, global = true)]
    pub openai: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a question with citations and confidence
    Ask {
        question: String,
        #[command(flatten)]
        student: StudentArgs,
        /// Preferred explanation style, e.g. "step by step"
        #[arg(long)]
        style: Option<String>,
    },
    /// Show which chapters and topics a question belongs to
    Map {
        question: String,
        #[command(flatten)]
        student: StudentArgs,
    },
    /// List the chunks retrieved for a question
    Retrieve {
        question: String,
        #[command(flatten)]
        student: StudentArgs,
        /// Only search chunks of this subject
        #[arg(long)]
        subject: Option<String>,
    },
}

/// The student's curriculum position.
#[derive(Args, Debug, Clone, Default)]
pub struct StudentArgs {
    #[arg(long, value_parser = clap::value_parser!(u8).range(5..=10))]
    pub grade: Option<u8>,

    /// cbse or state
    #[arg(long)]
    pub syllabus: Option<Syllabus>,
}

impl StudentArgs {
    /// Both grade and syllabus, or neither.
    pub fn curriculum(&self) -> Result<Option<CurriculumInfo>> {
        match (self.grade, self.syllabus) {
            (Some(grade), Some(syllabus)) => Ok(Some(CurriculumInfo::new(grade, syllabus)?)),
            (None, None) => Ok(None),
            _ => bail!("--grade and --syllabus must be given together"),
        }
    }
}

/// Initialise the global tracing subscriber; `RUST_LOG` overrides `info`.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

/// Read the engine configuration, applying command-line overrides.
pub fn load_config(path: Option<&Path>, top_k: Option<usize>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<EngineConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(top_k) = top_k {
        config.top_k = top_k;
    }
    config.validate()?;
    Ok(config)
}

/// Read an array of textbooks from a JSON file.
pub fn load_corpus(path: &Path) -> Result<Vec<TextbookDocument>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading corpus {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing corpus {}", path.display()))
}

/// Build an engine over a fresh in-memory index.
pub fn build_engine(cli: &Cli, config: EngineConfig) -> Result<TutorEngine> {
    let builder = TutorEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_index(Arc::new(InMemoryVectorIndex::new()));

    #[cfg(feature = "openai")]
    let builder = if cli.openai {
        builder.language_model(Arc::new(tutor_rag::openai::OpenAIChatService::from_env()?))
    } else {
        builder
    };
    #[cfg(not(feature = "openai"))]
    let _ = cli;

    Ok(builder.build()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute one command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.top_k)?;
    let top_k = config.top_k;
    let engine = build_engine(&cli, config)?;

    let corpus = load_corpus(&cli.corpus)?;
    let chunk_count = engine.ingest_batch(&corpus).await?;
    info!(documents = corpus.len(), chunk_count, "corpus indexed");

    match &cli.command {
        Command::Ask { question, student, style } => {
            let mut context = match student.curriculum()? {
                Some(curriculum) => {
                    QueryContext::for_student(curriculum.grade(), curriculum.syllabus())
                }
                None => QueryContext::default(),
            };
            if let Some(style) = style {
                context = context.with_style(style.clone());
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            match engine.query_with_cancel(question, Some(&context), &cancel).await {
                Ok(response) => print_json(&response),
                Err(RagError::Cancelled(_)) => bail!("interrupted"),
                Err(e) => Err(e.into()),
            }
        }
        Command::Map { question, student } => {
            let curriculum = student.curriculum()?;
            let mapping = engine.map_question_to_curriculum(question, curriculum.as_ref()).await?;
            print_json(&mapping)
        }
        Command::Retrieve { question, student, subject } => {
            let chunks = match (student.curriculum()?, subject) {
                (Some(curriculum), None) => {
                    engine.retrieve_with_curriculum_priority(question, &curriculum, None).await?
                }
                (curriculum, subject) => {
                    let mut filter = CurriculumFilter::new();
                    if let Some(curriculum) = &curriculum {
                        filter = filter.grade(curriculum.grade()).syllabus(curriculum.syllabus());
                    }
                    if let Some(subject) = subject {
                        filter = filter.subject(subject.clone());
                    }
                    engine.retrieve(question, Some(&filter), top_k).await?
                }
            };
            print_json(&chunks)
        }
    }
}
