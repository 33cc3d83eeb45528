//! Offline threshold validation.
//!
//! No merge threshold ships on intuition: candidate configs are scored
//! against a hand-labeled golden set of story pairs before promotion, and
//! a shadow comparison logs every case where two candidate configs
//! disagree so the disagreements can be labeled and used to estimate a
//! false-positive rate.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use newsloom_core::MergeConfig;

use crate::merge::{evaluate_signals, MergeVerdict, PairSignals};

/// Stratification bucket of a golden pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldenBucket {
    /// Hand-confirmed same event.
    ConfirmedSame,
    /// High similarity but left unmerged in production (recall risk).
    HighSimUnmerged,
    /// Exactly one shared entity (stress test).
    SingleEntity,
    /// Same topic, different event (precision risk / adversarial).
    SameTopicDifferent,
}

impl GoldenBucket {
    pub fn all() -> [GoldenBucket; 4] {
        [
            Self::ConfirmedSame,
            Self::HighSimUnmerged,
            Self::SingleEntity,
            Self::SameTopicDifferent,
        ]
    }
}

/// One hand-labeled story pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenPair {
    /// Stable label for audit trails (e.g. "2025-11-steel-tariffs-01").
    pub id: String,
    pub bucket: GoldenBucket,
    /// Ground truth: do these stories describe the same event?
    pub same_event: bool,
    /// Retrieval signals captured when the pair was labeled.
    pub signals: PairSignals,
}

/// Confusion counts for one config over a pair set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketScore {
    pub pairs: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

impl BucketScore {
    pub fn precision(&self) -> Option<f64> {
        let predicted = self.true_positives + self.false_positives;
        (predicted > 0).then(|| self.true_positives as f64 / predicted as f64)
    }

    pub fn recall(&self) -> Option<f64> {
        let actual = self.true_positives + self.false_negatives;
        (actual > 0).then(|| self.true_positives as f64 / actual as f64)
    }

    /// Share of predicted merges that are wrong.
    pub fn false_positive_rate(&self) -> Option<f64> {
        self.precision().map(|p| 1.0 - p)
    }

    fn record(&mut self, predicted: bool, actual: bool) {
        self.pairs += 1;
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, true) => self.false_negatives += 1,
            (false, false) => self.true_negatives += 1,
        }
    }
}

/// Full scoring report for one candidate config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall: BucketScore,
    pub per_bucket: Vec<(GoldenBucket, BucketScore)>,
}

/// Score one config against the golden set.
pub fn score(config: &MergeConfig, pairs: &[GoldenPair]) -> ValidationReport {
    let mut overall = BucketScore::default();
    let mut per_bucket: Vec<(GoldenBucket, BucketScore)> = GoldenBucket::all()
        .into_iter()
        .map(|b| (b, BucketScore::default()))
        .collect();

    for pair in pairs {
        let predicted = evaluate_signals(config, &pair.signals).is_merge();
        overall.record(predicted, pair.same_event);
        if let Some((_, bucket_score)) =
            per_bucket.iter_mut().find(|(b, _)| *b == pair.bucket)
        {
            bucket_score.record(predicted, pair.same_event);
        }
    }

    ValidationReport {
        overall,
        per_bucket,
    }
}

/// A pair on which two candidate configs disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disagreement {
    pub pair_id: String,
    pub bucket: GoldenBucket,
    pub baseline_verdict: MergeVerdict,
    pub candidate_verdict: MergeVerdict,
    pub same_event: bool,
}

/// Shadow comparison: every pair where `baseline` and `candidate` would
/// decide differently, without committing either decision.
pub fn disagreements(
    baseline: &MergeConfig,
    candidate: &MergeConfig,
    pairs: &[GoldenPair],
) -> Vec<Disagreement> {
    pairs
        .iter()
        .filter_map(|pair| {
            let baseline_verdict = evaluate_signals(baseline, &pair.signals);
            let candidate_verdict = evaluate_signals(candidate, &pair.signals);
            (baseline_verdict.is_merge() != candidate_verdict.is_merge()).then(|| Disagreement {
                pair_id: pair.id.clone(),
                bucket: pair.bucket,
                baseline_verdict,
                candidate_verdict,
                same_event: pair.same_event,
            })
        })
        .collect()
}

/// Seeded uniform sample, for the random-baseline false-positive estimate.
/// Seeding keeps threshold-sweep results reproducible run to run.
pub fn sample_baseline(pairs: &[GoldenPair], n: usize, seed: u64) -> Vec<GoldenPair> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampled: Vec<GoldenPair> = pairs.to_vec();
    sampled.shuffle(&mut rng);
    sampled.truncate(n);
    sampled
}

/// Seeded risk-stratified sample: oversamples the precision-risk buckets
/// (single-entity and same-topic-different-event), which is where bad
/// thresholds actually fail.
pub fn sample_risk_stratified(pairs: &[GoldenPair], n: usize, seed: u64) -> Vec<GoldenPair> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut risky: Vec<GoldenPair> = pairs
        .iter()
        .filter(|p| {
            matches!(
                p.bucket,
                GoldenBucket::SingleEntity | GoldenBucket::SameTopicDifferent
            )
        })
        .cloned()
        .collect();
    let mut rest: Vec<GoldenPair> = pairs
        .iter()
        .filter(|p| {
            !matches!(
                p.bucket,
                GoldenBucket::SingleEntity | GoldenBucket::SameTopicDifferent
            )
        })
        .cloned()
        .collect();

    risky.shuffle(&mut rng);
    rest.shuffle(&mut rng);

    // Two thirds risky, one third rest, topped up from whichever remains.
    let risky_quota = (n * 2).div_ceil(3).min(risky.len());
    let mut sampled: Vec<GoldenPair> = risky.drain(..risky_quota).collect();
    let rest_quota = (n - sampled.len()).min(rest.len());
    sampled.extend(rest.drain(..rest_quota));
    let top_up = (n - sampled.len()).min(risky.len());
    sampled.extend(risky.drain(..top_up));
    sampled
}

/// Estimated false-positive rate of a config over a sample.
pub fn estimate_fp_rate(config: &MergeConfig, sample: &[GoldenPair]) -> Option<f64> {
    score(config, sample).overall.false_positive_rate()
}
