use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use jr_common::config::{RankingConfig, RankingContext};
use jr_common::data::{load_jobs, load_resumes, require_ids};
use jr_common::embedding::provider_from_env;
use jr_common::eval::loocv::{AblationResults, EvalOptions, EvaluationEngine};
use jr_common::eval::{BasicEvalOptions, run_basic_eval};
use jr_common::labels::load_labels;
use jr_common::skills::SkillVocabulary;
use jr_common::{JobPosting, Resume};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "jr-eval", about = "Offline evaluation of ranking variants")]
struct Cli {
    /// Path to resumes JSONL file
    #[arg(long, env = "JR_RESUMES_PATH", default_value = "data/resumes.jsonl")]
    resumes: PathBuf,

    /// Path to jobs JSONL file
    #[arg(long, env = "JR_JOBS_PATH", default_value = "data/jobs.jsonl")]
    jobs: PathBuf,

    /// Optional skills vocabulary file (one term per line, # comments).
    /// When omitted, the vocabulary is built from the declared skills of the
    /// loaded resumes and jobs.
    #[arg(long, env = "JR_VOCAB_PATH")]
    vocab: Option<PathBuf>,

    /// Optional ranking config JSON file
    #[arg(long, env = "JR_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// LOOCV + ablation study against 1-5 weak labels
    Ablation {
        /// Path to weak labels JSONL file (1-5 scale)
        #[arg(long, default_value = "eval/labels_suggested.jsonl")]
        labels: PathBuf,

        /// Minimum relevance difference for pairwise construction
        #[arg(long, default_value_t = 2)]
        min_rel_diff: i32,

        /// Minimum pairwise samples required to train LTR in a fold
        #[arg(long, default_value_t = 10)]
        min_pairs: usize,

        /// Output path for the results JSON
        #[arg(long, default_value = "results/ablation_results.json")]
        out: PathBuf,

        /// Output path for the Markdown report
        #[arg(long, default_value = "eval/eval_report.md")]
        report: PathBuf,
    },
    /// Whole-set evaluation of the heuristic ranking against 0-3 labels
    Basic {
        /// Path to labels JSONL file (0-3 scale)
        #[arg(long, default_value = "eval/labels_final.jsonl")]
        labels: PathBuf,

        /// Number of recommendations to keep per resume
        #[arg(long, default_value_t = 15)]
        top_k: usize,

        /// Output path for the results JSON
        #[arg(long, default_value = "eval/eval_results.json")]
        out: PathBuf,
    },
}

fn main() {
    dotenv().ok();
    jr_common::logging::init_tracing_subscriber("jr-eval");
    jr_common::logging::install_tracing_panic_hook("jr-eval");

    if let Err(err) = run(Cli::parse()) {
        tracing::error!(error = %err, "evaluation failed");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let resumes = load_resumes(&cli.resumes)?;
    let jobs = load_jobs(&cli.jobs)?;
    require_ids(&resumes, &jobs, "input records")?;
    info!(resumes = resumes.len(), jobs = jobs.len(), "loaded data");

    let ctx = build_context(cli.vocab.as_deref(), cli.config.as_deref(), &resumes, &jobs)?;
    let provider = provider_from_env();

    match cli.command {
        Command::Ablation {
            labels,
            min_rel_diff,
            min_pairs,
            out,
            report,
        } => {
            let labels = load_labels(&labels)?;
            info!(labels = labels.len(), "loaded weak labels");

            let options = EvalOptions {
                min_rel_diff,
                min_pairs,
                ..EvalOptions::default()
            };
            let engine = EvaluationEngine::new(&ctx, provider.as_ref(), options);
            let results = engine.run(&resumes, &jobs, &labels)?;

            write_json(&out, &results)?;
            write_report(&report, &results)?;
            info!(out = %out.display(), report = %report.display(), "ablation complete");

            for (variant, metrics) in &results.aggregated_results {
                for (name, summary) in metrics {
                    info!(
                        variant = %variant,
                        metric = %name,
                        mean = summary.mean,
                        std = summary.std,
                        "aggregated"
                    );
                }
            }
        }
        Command::Basic { labels, top_k, out } => {
            let labels = load_labels(&labels)?;
            info!(labels = labels.len(), "loaded labels");

            let options = BasicEvalOptions {
                top_k,
                ..BasicEvalOptions::default()
            };
            let results =
                run_basic_eval(&ctx, provider.as_ref(), &resumes, &jobs, &labels, &options)?;

            write_json(&out, &results)?;
            info!(
                evaluated = results.n_evaluated,
                skipped = results.n_skipped,
                out = %out.display(),
                "basic evaluation complete"
            );
            for (name, value) in &results.aggregated_metrics {
                info!(metric = %name, mean = *value, "aggregated");
            }
        }
    }

    Ok(())
}

fn build_context(
    vocab_path: Option<&Path>,
    config_path: Option<&Path>,
    resumes: &[Resume],
    jobs: &[JobPosting],
) -> Result<RankingContext, Box<dyn std::error::Error>> {
    let vocab = match vocab_path {
        Some(path) => SkillVocabulary::load_from_file(path)?,
        None => {
            let declared = resumes
                .iter()
                .flat_map(|r| r.skills.iter())
                .chain(jobs.iter().flat_map(|j| j.skills.iter()))
                .cloned();
            SkillVocabulary::from_terms(declared)
        }
    };
    info!(terms = vocab.len(), "vocabulary ready");

    let config = match config_path {
        Some(path) => RankingConfig::from_json_file(path)?,
        None => RankingConfig::default(),
    }
    .with_env_overrides();

    Ok(RankingContext::new(config, vocab))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

fn write_report(path: &Path, results: &AblationResults) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = vec![
        "# Evaluation Report: LOOCV + Ablation Study".to_string(),
        String::new(),
        format!("**Generated:** {}", results.generated_at.to_rfc3339()),
        "**Evaluation Method:** Leave-One-Out Cross-Validation (LOOCV)".to_string(),
        format!("**Number of Folds:** {}", results.n_folds),
        format!("**Number of Jobs:** {}", results.n_jobs),
        String::new(),
        "## Ablation Study Results".to_string(),
        String::new(),
        "| Variant | NDCG@5 | NDCG@10 | Precision@5 | Precision@10 |".to_string(),
        "|---------|--------|---------|-------------|--------------|".to_string(),
    ];

    for (variant, metrics) in &results.aggregated_results {
        let cell = |name: &str| {
            metrics
                .get(name)
                .map(|s| format!("{:.3}±{:.3}", s.mean, s.std))
                .unwrap_or_else(|| "n/a".to_string())
        };
        lines.push(format!(
            "| {variant} | {} | {} | {} | {} |",
            cell("ndcg@5"),
            cell("ndcg@10"),
            cell("precision@5"),
            cell("precision@10"),
        ));
    }

    lines.extend([
        String::new(),
        "## Variants".to_string(),
        String::new(),
        "- **embedding_only:** baseline using only semantic similarity".to_string(),
        "- **heuristic:** weighted features (embedding + skill overlap + keyword bonus - gap penalty)".to_string(),
        "- **ltr_logreg:** pairwise learning-to-rank with logistic regression".to_string(),
        "- **ltr_logreg_fallback:** LTR fell back to the heuristic (insufficient training pairs)".to_string(),
        String::new(),
    ]);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, lines.join("\n"))?;
    Ok(())
}
