use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use dotenvy::dotenv;
use jr_common::config::{RankingConfig, RankingContext};
use jr_common::data::{load_jobs, load_resumes, require_ids};
use jr_common::embedding::provider_from_env;
use jr_common::labels::{LabelScale, load_labels, validate_scale};
use jr_common::ltr::{PairwiseLtrModel, TrainOptions, construct_pairwise_data};
use jr_common::ranking::features::{LTR_FEATURE_NAMES, build_features};
use jr_common::retrieval::SimilarityScorer;
use jr_common::skills::SkillVocabulary;
use tracing::{info, warn};

/// Train the production pairwise LTR model on all available data. Unlike the
/// evaluation engine there is no heuristic fallback here: insufficient
/// training data is a hard stop.
#[derive(Debug, Parser)]
#[command(name = "jr-train", about = "Train the production LTR model")]
struct Cli {
    /// Path to resumes JSONL file
    #[arg(long, env = "JR_RESUMES_PATH")]
    resumes_path: PathBuf,

    /// Path to jobs JSONL file
    #[arg(long, env = "JR_JOBS_PATH")]
    jds_path: PathBuf,

    /// Path to weak labels JSONL file (1-5 scale)
    #[arg(long, env = "JR_LABELS_PATH")]
    labels_path: PathBuf,

    /// Minimum relevance difference for pairwise construction
    #[arg(long, default_value_t = 2)]
    min_rel_diff: i32,

    /// Disable mirrored negative pairs (mirroring is what guarantees both
    /// target classes; without it a single-class set aborts the run)
    #[arg(long, default_value_t = false)]
    no_mirror: bool,

    /// Optional skills vocabulary file
    #[arg(long, env = "JR_VOCAB_PATH")]
    vocab: Option<PathBuf>,

    /// Optional ranking config JSON file
    #[arg(long, env = "JR_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Output path for the trained model
    #[arg(long, default_value = "models/ltr_logreg.json")]
    out: PathBuf,
}

fn main() {
    dotenv().ok();
    jr_common::logging::init_tracing_subscriber("jr-train");
    jr_common::logging::install_tracing_panic_hook("jr-train");

    if let Err(err) = run(Cli::parse()) {
        tracing::error!(error = %err, "training failed");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let resumes = load_resumes(&cli.resumes_path)?;
    let jobs = load_jobs(&cli.jds_path)?;
    let labels = load_labels(&cli.labels_path)?;
    require_ids(&resumes, &jobs, "input records")?;
    validate_scale(&labels, LabelScale::OneToFive)?;
    info!(
        resumes = resumes.len(),
        jobs = jobs.len(),
        labels = labels.len(),
        "loaded data"
    );

    let expected_pairs = resumes.len() * jobs.len();
    if labels.len() != expected_pairs {
        warn!(
            expected = expected_pairs,
            found = labels.len(),
            "label coverage is incomplete; unlabeled pairs cannot form training pairs"
        );
    }

    let ctx = build_context(cli.vocab.as_deref(), cli.config.as_deref(), &resumes, &jobs)?;
    let provider = provider_from_env();

    // Pre-compute embedding scores once per (resume, job batch).
    info!("computing embedding scores for all pairs");
    let scorer = SimilarityScorer::new(provider.as_ref());
    let mut embedding_cache: HashMap<(String, String), f64> = HashMap::new();
    for resume in &resumes {
        let resume_id = resume.resume_id.clone().unwrap_or_default();
        for matched in scorer.rank_jobs(resume, &jobs, jobs.len())? {
            let job_id = matched.job.job_id.clone().unwrap_or_default();
            embedding_cache.insert((resume_id.clone(), job_id), matched.score);
        }
    }
    info!(pairs = embedding_cache.len(), "embedding cache ready");

    // Feature vectors for every pair, in the LTR feature order.
    let mut features: HashMap<(String, String), Vec<f64>> = HashMap::new();
    for resume in &resumes {
        let resume_id = resume.resume_id.clone().unwrap_or_default();
        for job in &jobs {
            let job_id = job.job_id.clone().unwrap_or_default();
            let key = (resume_id.clone(), job_id);
            let embedding_score = embedding_cache.get(&key).copied().unwrap_or(0.0);
            let set = build_features(resume, job, embedding_score, &ctx.config, &ctx.vocab);
            features.insert(key, set.ltr_vector().to_vec());
        }
    }
    info!(
        vectors = features.len(),
        dimension = LTR_FEATURE_NAMES.len(),
        names = ?LTR_FEATURE_NAMES,
        "feature cache ready"
    );

    let mirror = !cli.no_mirror;
    let mut pairwise = construct_pairwise_data(&labels, &features, cli.min_rel_diff, mirror);
    if pairwise.is_empty() {
        return Err(format!(
            "no pairwise samples constructed (min_rel_diff={}); \
             labels may have insufficient variance",
            cli.min_rel_diff
        )
        .into());
    }

    // A single-class target set cannot fit a classifier. Reconstructing with
    // mirroring guarantees both classes whenever any pair exists; if that
    // still fails, the run is fatal.
    if pairwise.classes().len() < 2 {
        if mirror {
            return Err("pairwise targets collapsed to a single class even with mirroring".into());
        }
        warn!("pairwise targets have a single class; reconstructing with mirroring");
        pairwise = construct_pairwise_data(&labels, &features, cli.min_rel_diff, true);
        if pairwise.classes().len() < 2 {
            return Err("pairwise targets collapsed to a single class even with mirroring".into());
        }
    }
    info!(
        samples = pairwise.len(),
        classes = ?pairwise.classes(),
        "pairwise training data ready"
    );

    let model = PairwiseLtrModel::train(&pairwise, &TrainOptions::default())?;
    for (name, weight) in model.feature_weights() {
        info!(feature = %name, weight, "learned weight");
    }

    model.save(&cli.out)?;
    info!(out = %cli.out.display(), "model saved");
    Ok(())
}

fn build_context(
    vocab_path: Option<&Path>,
    config_path: Option<&Path>,
    resumes: &[jr_common::Resume],
    jobs: &[jr_common::JobPosting],
) -> Result<RankingContext, Box<dyn std::error::Error>> {
    let vocab = match vocab_path {
        Some(path) => SkillVocabulary::load_from_file(path)?,
        None => SkillVocabulary::from_terms(
            resumes
                .iter()
                .flat_map(|r| r.skills.iter())
                .chain(jobs.iter().flat_map(|j| j.skills.iter()))
                .cloned(),
        ),
    };

    let config = match config_path {
        Some(path) => RankingConfig::from_json_file(path)?,
        None => RankingConfig::default(),
    }
    .with_env_overrides();

    Ok(RankingContext::new(config, vocab))
}
