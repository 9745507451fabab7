use std::path::PathBuf;

use log::info;

use crate::collections::Collection;
use crate::detect::Detector;
use crate::error::ParentScanError;
use crate::index::IndexSource;
use crate::reconcile::{verify_collection, VerifiedCollection};
use crate::report::{log_summary, MismatchReport};
use crate::sampling::SampleSelector;
use crate::sort::NameCollator;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub legacy_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sample_size: usize,
}

/// Counts from one run, returned to the caller rather than kept globally.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub loaded: usize,
    pub detected: usize,
    pub failed_samples: usize,
    pub mismatched: usize,
    pub minor: usize,
    pub major: usize,
}

/// Detection for every collection, then verification for every detected one.
/// Verification does not start until detection has finished for all of them.
pub async fn detect_and_verify<S, P>(
    index: &mut S,
    sampler: &mut P,
    collections: &[Collection],
    sample_size: usize,
) -> Result<(RunSummary, Vec<VerifiedCollection>), ParentScanError>
where
    S: IndexSource,
    P: SampleSelector,
{
    let mut summary = RunSummary {
        loaded: collections.len(),
        ..RunSummary::default()
    };

    info!("Phase 2: Detecting parent/child collections...");
    let detection = Detector::new(index, sampler, sample_size)
        .detect_all(collections)
        .await;
    summary.detected = detection.detected.len();
    summary.failed_samples = detection.failed_samples;

    info!("Phase 3: Verifying detected collections...");
    let mut verified = Vec::with_capacity(detection.detected.len());
    for detected in &detection.detected {
        verified.push(verify_collection(index, detected).await?);
    }
    summary.mismatched = verified.iter().filter(|v| v.mismatch_count() > 0).count();

    Ok((summary, verified))
}

/// Full run: load the corpus, detect, verify, then write the three artifacts.
pub async fn run<S, P>(
    index: &mut S,
    sampler: &mut P,
    options: &RunOptions,
    collator: &NameCollator,
) -> Result<RunSummary, ParentScanError>
where
    S: IndexSource,
    P: SampleSelector,
{
    info!("Phase 1: Loading collections...");
    let collections = Collection::load_all(&options.legacy_dir)?;

    let (mut summary, verified) =
        detect_and_verify(index, sampler, &collections, options.sample_size).await?;

    let report = MismatchReport::build(&verified, collator);
    report.write(&options.output_dir)?;
    summary.minor = report.minor.len();
    summary.major = report.major.len();

    log_summary(&verified);
    Ok(summary)
}
