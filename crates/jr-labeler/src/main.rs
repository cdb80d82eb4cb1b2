use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use dotenvy::dotenv;
use jr_common::data::{load_jobs, load_resumes, require_ids};
use jr_common::labeling::{LabelProvider, LlmLabelerConfig, OverlapLabelProvider, judge_pair};
use jr_common::labels::{LabelRecord, LabelScale, load_labels, validate_coverage};
use jr_common::skills::SkillVocabulary;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

/// Generate weak relevance labels for every (resume, job) pair. Pairs are
/// visited in seeded-shuffled order to reduce positional bias; existing
/// labels in the output file are reused so an interrupted run resumes
/// instead of re-judging.
#[derive(Debug, Parser)]
#[command(name = "jr-labeler", about = "Generate weak labels for all resume-job pairs")]
struct Cli {
    /// Path to resumes JSONL file
    #[arg(long, env = "JR_RESUMES_PATH", default_value = "data/resumes.jsonl")]
    resumes: PathBuf,

    /// Path to jobs JSONL file
    #[arg(long, env = "JR_JOBS_PATH", default_value = "data/jobs.jsonl")]
    jobs: PathBuf,

    /// Output labels JSONL file (also read for resume support)
    #[arg(long, default_value = "eval/labels_suggested.jsonl")]
    out: PathBuf,

    /// Label scale: "one_to_five" or "zero_to_three"
    #[arg(long, default_value = "one_to_five")]
    scale: String,

    /// Shuffle seed for pair ordering
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Optional skills vocabulary file for the overlap provider
    #[arg(long, env = "JR_VOCAB_PATH")]
    vocab: Option<PathBuf>,
}

fn main() {
    dotenv().ok();
    jr_common::logging::init_tracing_subscriber("jr-labeler");
    jr_common::logging::install_tracing_panic_hook("jr-labeler");

    if let Err(err) = run(Cli::parse()) {
        tracing::error!(error = %err, "label generation failed");
        std::process::exit(1);
    }
}

fn parse_scale(value: &str) -> Result<LabelScale, String> {
    match value {
        "one_to_five" => Ok(LabelScale::OneToFive),
        "zero_to_three" => Ok(LabelScale::ZeroToThree),
        other => Err(format!(
            "unknown label scale '{other}' (expected one_to_five or zero_to_three)"
        )),
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let scale = parse_scale(&cli.scale)?;
    let resumes = load_resumes(&cli.resumes)?;
    let jobs = load_jobs(&cli.jobs)?;
    require_ids(&resumes, &jobs, "input records")?;
    info!(
        resumes = resumes.len(),
        jobs = jobs.len(),
        pairs = resumes.len() * jobs.len(),
        scale = scale.as_ref(),
        "loaded data"
    );

    // Resume support: reuse labels already present in the output file.
    let existing: HashMap<(String, String), LabelRecord> = if cli.out.exists() {
        load_labels(&cli.out)?
            .into_iter()
            .map(|record| ((record.resume_id.clone(), record.job_id.clone()), record))
            .collect()
    } else {
        HashMap::new()
    };
    if !existing.is_empty() {
        info!(existing = existing.len(), "found existing labels; resuming");
    }

    let provider = build_provider(cli.vocab.as_deref(), &resumes, &jobs)?;
    info!(provider = provider.name(), "label provider ready");

    let mut pairs: Vec<(usize, usize)> = (0..resumes.len())
        .flat_map(|r| (0..jobs.len()).map(move |j| (r, j)))
        .collect();
    let mut rng = StdRng::seed_from_u64(cli.seed);
    pairs.shuffle(&mut rng);

    let mut records = Vec::with_capacity(pairs.len());
    let mut skipped = 0usize;
    let mut generated = 0usize;
    let mut fallbacks = 0usize;

    for (resume_idx, job_idx) in pairs {
        let resume = &resumes[resume_idx];
        let job = &jobs[job_idx];
        let key = (
            resume.resume_id.clone().unwrap_or_default(),
            job.job_id.clone().unwrap_or_default(),
        );

        if let Some(record) = existing.get(&key) {
            records.push(record.clone());
            skipped += 1;
            continue;
        }

        let outcome = judge_pair(provider.as_ref(), resume, job, scale);
        if outcome.is_fallback() {
            fallbacks += 1;
        }
        records.push(outcome.into_record());
        generated += 1;
    }
    info!(total = records.len(), skipped, generated, fallbacks, "labeling pass complete");

    // Abort before writing partial coverage as if it were complete.
    validate_coverage(&records, &resumes, &jobs)?;

    write_labels(&cli.out, &records)?;
    info!(out = %cli.out.display(), "labels saved");

    summarize(&records, scale);
    Ok(())
}

fn build_provider(
    vocab_path: Option<&Path>,
    resumes: &[jr_common::Resume],
    jobs: &[jr_common::JobPosting],
) -> Result<Box<dyn LabelProvider>, Box<dyn std::error::Error>> {
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

    let config = LlmLabelerConfig::from_env();
    if config.enabled && config.provider != "overlap" {
        warn!(
            provider = %config.provider,
            "no client wired for external provider; using the overlap judge"
        );
    }
    Ok(Box::new(OverlapLabelProvider::new(vocab)))
}

fn write_labels(path: &Path, records: &[LabelRecord]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = fs::File::create(path)?;
    for record in records {
        serde_json::to_writer(&mut file, record)?;
        writeln!(file)?;
    }
    Ok(())
}

fn summarize(records: &[LabelRecord], scale: LabelScale) {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for label in scale.min_label()..=scale.max_label() {
        counts.insert(label, 0);
    }
    for record in records {
        *counts.entry(record.label).or_insert(0) += 1;
    }

    let total = records.len().max(1);
    for (label, count) in &counts {
        info!(
            label = *label,
            count = *count,
            percent = *count as f64 / total as f64 * 100.0,
            "label distribution"
        );
    }

    let avg_confidence =
        records.iter().map(|r| r.confidence).sum::<f64>() / records.len().max(1) as f64;
    info!(avg_confidence, "confidence summary");
}
