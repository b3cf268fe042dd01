use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ppm_survey_scoring::catalog::Catalog;
use ppm_survey_scoring::config::AppConfig;
use ppm_survey_scoring::csv_codec;
use ppm_survey_scoring::db::{self, PgInterviewStore};
use ppm_survey_scoring::import::{self, ImportStatus};
use ppm_survey_scoring::kv_store::FileKeyValueStore;
use ppm_survey_scoring::models::{AnalysisType, CategoryWeightEntry, Interview, WeightEntry};
use ppm_survey_scoring::report;
use ppm_survey_scoring::scoring::ScoreAggregator;
use ppm_survey_scoring::store::{InterviewStore, MemoryInterviewStore};
use ppm_survey_scoring::weights::{WeightRegistry, WeightSnapshot};

#[derive(Parser)]
#[command(name = "ppm-survey")]
#[command(about = "Scoring and consolidation of PPM tool-assessment interviews", long_about = None)]
struct Cli {
    /// Directory holding the persisted weight configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Question catalog JSON; the built-in questionnaire is used otherwise
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Score one interview
    Score {
        #[arg(long)]
        interview: Uuid,
        /// Also score questions switched off in the catalog
        #[arg(long)]
        include_inactive: bool,
    },
    /// Generate the consolidated report of one interview
    Report {
        #[arg(long)]
        interview: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Also write the per-question breakdown as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        include_inactive: bool,
    },
    /// Average scores across all completed interviews
    Summary {
        #[arg(long)]
        include_inactive: bool,
    },
    /// Export answers of every interview as CSV
    Export {
        /// Restrict the export to one form (f1, f2 or f3)
        #[arg(long)]
        form: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Import interviews from an exported CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Parse and group the file without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect or edit the weight configuration
    Weights {
        #[command(subcommand)]
        command: WeightsCommand,
    },
}

#[derive(Subcommand)]
enum WeightsCommand {
    /// Print every question and category weight
    Show,
    /// Restore the default weights
    Reset,
    /// Add or update a question weight
    SetQuestion {
        question_id: String,
        weight: u8,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        analysis_type: Option<AnalysisType>,
    },
    /// Add or update a category weight
    SetCategory {
        category: String,
        weight: u8,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a question weight
    Remove { question_id: String },
    /// Write the weight configuration as JSON
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Replace the weight configuration with a JSON file
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ppm_survey_scoring=info,ppm_survey=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .with_data_dir(cli.data_dir)
        .with_catalog_path(cli.catalog);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Score {
            interview,
            include_inactive,
        } => {
            let catalog = load_catalog(&config)?;
            let weights = WeightRegistry::open(config.weights_store());
            let store = PgInterviewStore::new(connect(&config).await?);
            let interview = fetch_interview(&store, interview).await?;

            let aggregator =
                ScoreAggregator::new(&catalog, &weights).include_inactive(include_inactive);
            let analysis = aggregator.overall(&interview.answers);

            println!(
                "Overall {:.1}% ({:.1} of {:.1})",
                analysis.overall_score.percentage,
                analysis.overall_score.score,
                analysis.overall_score.max_score
            );
            for dimension in [
                &analysis.satisfaction_score,
                &analysis.functionality_score,
                &analysis.integration_score,
                &analysis.usage_score,
            ] {
                println!("- {} {:.1}%", dimension.label, dimension.percentage);
            }
            if analysis.category_scores.is_empty() {
                println!("No answered categories for this interview.");
                return Ok(());
            }
            println!("Categories:");
            for category in analysis.category_scores.iter() {
                println!(
                    "- {} {:.1}% (weight {}, {} questions)",
                    category.label, category.percentage, category.weight, category.question_count
                );
            }
        }
        Commands::Report {
            interview,
            out,
            csv,
            include_inactive,
        } => {
            let catalog = load_catalog(&config)?;
            let weights = WeightRegistry::open(config.weights_store());
            let store = PgInterviewStore::new(connect(&config).await?);
            let interview = fetch_interview(&store, interview).await?;

            let aggregator =
                ScoreAggregator::new(&catalog, &weights).include_inactive(include_inactive);
            let data = report::build_report(&aggregator, &interview, Utc::now());
            std::fs::write(&out, report::render_markdown(&data))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = csv {
                std::fs::write(&path, csv_codec::export_report_csv(&data)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Breakdown written to {}.", path.display());
            }
        }
        Commands::Summary { include_inactive } => {
            let catalog = load_catalog(&config)?;
            let weights = WeightRegistry::open(config.weights_store());
            let store = PgInterviewStore::new(connect(&config).await?);
            let aggregator =
                ScoreAggregator::new(&catalog, &weights).include_inactive(include_inactive);

            let generated_at = Utc::now();
            let reports: Vec<_> = store
                .list_interviews()
                .await?
                .iter()
                .filter(|interview| interview.is_completed)
                .map(|interview| report::build_report(&aggregator, interview, generated_at))
                .collect();
            if reports.is_empty() {
                println!("No completed interviews found.");
                return Ok(());
            }

            let summary = report::summarize_reports(&reports);
            println!(
                "{} interviews, average overall {:.1}%, completion {:.1}%",
                summary.interview_count, summary.average_overall, summary.average_completion_rate
            );
            println!(
                "- Satisfação {:.1}% / Funcionalidade {:.1}% / Integração {:.1}% / Uso {:.1}%",
                summary.average_satisfaction,
                summary.average_functionality,
                summary.average_integration,
                summary.average_usage
            );
            for category in summary.category_averages.iter() {
                println!(
                    "- {} {:.1}% across {} interviews",
                    category.category, category.average_percentage, category.interviews
                );
            }
        }
        Commands::Export { form, out } => {
            let catalog = load_catalog(&config)?;
            let store = PgInterviewStore::new(connect(&config).await?);
            let interviews = store.list_interviews().await?;

            let csv = match form.as_deref() {
                Some(form_id) => {
                    csv_codec::export_form_consolidated(&catalog, form_id, &interviews, Utc::now())?
                }
                None => csv_codec::export_consolidated(&catalog, &interviews)?,
            };
            std::fs::write(&out, csv)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Exported {} interviews to {}.",
                interviews.len(),
                out.display()
            );
        }
        Commands::Import { csv, dry_run } => {
            let text = std::fs::read_to_string(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let report = if dry_run {
                import::import_csv(&MemoryInterviewStore::new(), &text).await?
            } else {
                let store = PgInterviewStore::new(connect(&config).await?);
                import::import_csv(&store, &text).await?
            };

            for warning in report.warnings.iter() {
                println!("warning: {warning}");
            }
            for error in report.errors.iter() {
                println!("error: {error}");
            }
            let verb = if dry_run { "Would import" } else { "Imported" };
            println!(
                "{verb} {} of {} interviews from {} ({} already present).",
                report.imported,
                report.groups,
                csv.display(),
                report.skipped
            );
            if report.status() == ImportStatus::Failed {
                bail!("no interview could be imported");
            }
        }
        Commands::Weights { command } => {
            let mut weights = WeightRegistry::open(config.weights_store());
            run_weights(&mut weights, command)?;
        }
    }

    Ok(())
}

fn run_weights(
    weights: &mut WeightRegistry<FileKeyValueStore>,
    command: WeightsCommand,
) -> anyhow::Result<()> {
    match command {
        WeightsCommand::Show => {
            println!("Category weights:");
            for entry in weights.category_weights() {
                println!("- {} = {} ({})", entry.category, entry.weight, entry.description);
            }
            println!("Question weights:");
            for entry in weights.question_weights() {
                println!(
                    "- {} = {} [{}, {}]",
                    entry.question_id,
                    entry.weight,
                    entry.category,
                    entry.analysis_type.as_str()
                );
            }
        }
        WeightsCommand::Reset => {
            weights.reset_to_defaults()?;
            println!("Weights reset to defaults.");
        }
        WeightsCommand::SetQuestion {
            question_id,
            weight,
            category,
            analysis_type,
        } => {
            let existing = weights.question_weight(&question_id).cloned();
            let category = category
                .or_else(|| existing.as_ref().map(|e| e.category.clone()))
                .with_context(|| format!("--category is required for new question {question_id}"))?;
            let analysis_type = analysis_type
                .or_else(|| existing.as_ref().map(|e| e.analysis_type))
                .with_context(|| {
                    format!("--analysis-type is required for new question {question_id}")
                })?;
            weights.upsert_question_weight(WeightEntry {
                question_id: question_id.clone(),
                weight,
                category,
                analysis_type,
            })?;
            println!("Question {question_id} weight set to {weight}.");
        }
        WeightsCommand::SetCategory {
            category,
            weight,
            description,
        } => {
            let description = description
                .or_else(|| weights.category_weight(&category).map(|e| e.description.clone()))
                .unwrap_or_default();
            weights.upsert_category_weight(CategoryWeightEntry {
                category: category.clone(),
                weight,
                description,
            })?;
            println!("Category {category} weight set to {weight}.");
        }
        WeightsCommand::Remove { question_id } => match weights.remove(&question_id)? {
            Some(_) => println!("Removed weight for {question_id}."),
            None => println!("No weight configured for {question_id}."),
        },
        WeightsCommand::Export { out } => {
            let json = serde_json::to_string_pretty(&weights.export_all())?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Weights written to {}.", out.display());
        }
        WeightsCommand::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let snapshot: WeightSnapshot = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a weight configuration", file.display()))?;
            weights.import_all(snapshot)?;
            println!("Weights imported from {}.", file.display());
        }
    }
    Ok(())
}

fn load_catalog(config: &AppConfig) -> anyhow::Result<Catalog> {
    config.load_catalog().context("failed to load question catalog")
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url()
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn fetch_interview(store: &PgInterviewStore, id: Uuid) -> anyhow::Result<Interview> {
    store
        .get_interview(id)
        .await?
        .with_context(|| format!("interview {id} not found"))
}
