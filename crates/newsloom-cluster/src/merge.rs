//! Periodic merge reconciliation.
//!
//! Catches story pairs the real-time attach path never compared directly:
//! different candidate windows, or entity extraction that finished after
//! the window closed. Gates are stricter than attach because merges are
//! harder to undo than a later reconciliation pass.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chrono::Duration;
use newsloom_core::{
    MergeAudit, MergeConfig, MergeOutcome, MergeSignal, MergeTier, Result, Story, StoryRepository,
};

use crate::centroid::CentroidMaintainer;

/// Upstream extractors emit the same entity under inconsistent type and
/// locale prefixes ("person:en:jane_doe" vs "per/jane_doe"). Matching
/// without stripping them silently suppresses true merges.
static ENTITY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z_]+[:/])?(?:[a-z]{2}(?:-[a-z]{2})?[:/])?").expect("static pattern")
});

/// Title tokens shorter than this carry no signal.
const MIN_TITLE_TOKEN_LEN: usize = 4;

/// High-frequency headline words excluded from token overlap.
const TITLE_STOPWORDS: &[&str] = &[
    "about", "after", "against", "amid", "been", "before", "could", "from", "have", "into",
    "over", "report", "says", "than", "their", "these", "this", "update", "what", "will", "with",
];

/// Strip type/locale prefixes from an entity id and lowercase it.
pub fn normalize_entity_id(id: &str) -> String {
    let lowered = id.trim().to_lowercase();
    ENTITY_PREFIX.replace(&lowered, "").to_string()
}

/// Significant lowercase tokens of a headline.
pub fn title_tokens(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TITLE_TOKEN_LEN)
        .filter(|t| !TITLE_STOPWORDS.contains(t))
        .map(String::from)
        .collect()
}

/// The comparable signals of one candidate story pair, independent of
/// where they came from. The reconciler builds these from live stories;
/// the validation harness builds them from hand-labeled golden rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSignals {
    pub similarity: f32,
    /// Gap to the second-best candidate; `None` when the pair had no
    /// runner-up.
    pub margin: Option<f32>,
    pub shared_entities: usize,
    pub shared_topic_tag: bool,
    pub shared_title_tokens: bool,
}

impl PairSignals {
    /// Build signals from two stories plus retrieval scores.
    pub fn from_stories(a: &Story, b: &Story, similarity: f32, second_best: Option<f32>) -> Self {
        let a_entities: HashSet<String> =
            a.top_entities.iter().map(|e| normalize_entity_id(e)).collect();
        let shared_entities = b
            .top_entities
            .iter()
            .map(|e| normalize_entity_id(e))
            .filter(|e| !e.is_empty() && a_entities.contains(e))
            .collect::<HashSet<_>>()
            .len();

        let shared_topic_tag = a.topic_tags.iter().any(|t| b.topic_tags.contains(t));

        let a_tokens = title_tokens(&a.primary_headline);
        let b_tokens = title_tokens(&b.primary_headline);
        let shared_title_tokens = a_tokens.intersection(&b_tokens).next().is_some();

        Self {
            similarity,
            margin: second_best.map(|s| similarity - s),
            shared_entities,
            shared_topic_tag,
            shared_title_tokens,
        }
    }

    fn corroboration(&self) -> Option<MergeSignal> {
        if self.shared_entities >= 1 {
            Some(MergeSignal::SharedEntity)
        } else if self.shared_topic_tag {
            Some(MergeSignal::SharedTopicTag)
        } else if self.shared_title_tokens {
            Some(MergeSignal::SharedTitleTokens)
        } else {
            None
        }
    }
}

/// Why a pair was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Below every enabled tier's similarity threshold.
    BelowThreshold,
    /// Tier A similarity but the margin was ambiguous and no bypass
    /// signal existed.
    AmbiguousMargin,
    /// Tier B similarity but no corroborating signal.
    Uncorroborated,
}

/// Verdict for one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MergeVerdict {
    Merge {
        tier: MergeTier,
        signal: Option<MergeSignal>,
    },
    Skip(SkipReason),
}

impl MergeVerdict {
    pub fn is_merge(&self) -> bool {
        matches!(self, MergeVerdict::Merge { .. })
    }
}

/// Evaluate the tier gates for one pair.
///
/// Tier A: similarity and an unambiguous margin, with the margin
/// requirement bypassable only on a strong corroborating signal. Tier B
/// (when enabled): lower similarity but corroboration always required,
/// no margin condition. Zero shared signals with the thresholds unmet is
/// always a skip; a failing gate never forces through.
pub fn evaluate_signals(config: &MergeConfig, signals: &PairSignals) -> MergeVerdict {
    if signals.similarity >= config.tier_a_min_sim {
        let margin_ok = signals
            .margin
            .map_or(true, |m| m >= config.tier_a_margin);

        if margin_ok {
            return MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: signals.corroboration(),
            };
        }

        // Ambiguous margin: two stories are both plausible winners.
        // Bypass only on strong corroboration.
        if signals.shared_entities >= 1 {
            return MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: Some(MergeSignal::SharedEntity),
            };
        }
        if signals.shared_topic_tag {
            return MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: Some(MergeSignal::SharedTopicTag),
            };
        }
        if signals.shared_title_tokens && signals.similarity >= config.title_bypass_min_sim {
            return MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: Some(MergeSignal::SharedTitleTokens),
            };
        }
        return MergeVerdict::Skip(SkipReason::AmbiguousMargin);
    }

    if config.tier_b_enabled && signals.similarity >= config.tier_b_min_sim {
        return match signals.corroboration() {
            Some(signal) => MergeVerdict::Merge {
                tier: MergeTier::B,
                signal: Some(signal),
            },
            None => MergeVerdict::Skip(SkipReason::Uncorroborated),
        };
    }

    MergeVerdict::Skip(SkipReason::BelowThreshold)
}

/// Decide absorption direction: older absorbs newer; ties go to the
/// larger story, then the smaller id for determinism.
pub fn merge_direction<'a>(a: &'a Story, b: &'a Story) -> (&'a Story, &'a Story) {
    let a_wins = match a.first_seen_at.cmp(&b.first_seen_at) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => match a.member_count.cmp(&b.member_count) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => a.id <= b.id,
        },
    };
    if a_wins {
        (a, b)
    } else {
        (b, a)
    }
}

/// A decision the reconciler made (or would have made, in shadow mode).
#[derive(Debug, Clone)]
pub struct MergeDecision {
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub signals: PairSignals,
    pub tier: MergeTier,
    pub signal: Option<MergeSignal>,
    pub committed: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct MergePassReport {
    pub scanned: usize,
    pub merged: Vec<MergeAudit>,
    /// Decisions evaluated but not committed (shadow mode).
    pub shadow_decisions: Vec<MergeDecision>,
    pub skipped: usize,
}

/// Scheduled reconciler over recent open stories.
pub struct MergeReconciler {
    stories: Arc<dyn StoryRepository>,
    centroids: CentroidMaintainer,
    config: MergeConfig,
}

impl MergeReconciler {
    pub fn new(stories: Arc<dyn StoryRepository>, config: MergeConfig) -> Self {
        let centroids = CentroidMaintainer::new(stories.clone());
        Self {
            stories,
            centroids,
            config,
        }
    }

    /// Run one pass: for each recently updated open story, find its best
    /// and second-best neighbors and evaluate the tier gates.
    pub async fn run_pass(&self) -> Result<MergePassReport> {
        let seeds = self
            .stories
            .recently_updated(
                Duration::hours(self.config.scan_window_hours),
                self.config.scan_limit,
            )
            .await?;

        let mut report = MergePassReport {
            scanned: seeds.len(),
            ..Default::default()
        };
        // Stories absorbed earlier in this pass must not merge again.
        let mut consumed: HashSet<Uuid> = HashSet::new();

        for seed in &seeds {
            if consumed.contains(&seed.id) {
                continue;
            }
            let Some(centroid) = seed.centroid.as_ref() else {
                continue;
            };

            // Top-3 covers self, best, and runner-up.
            let neighbors = self
                .stories
                .find_candidates(
                    centroid,
                    3,
                    self.config.tier_b_min_sim.min(self.config.tier_a_min_sim),
                    Duration::hours(self.config.scan_window_hours),
                )
                .await?;

            let mut others = neighbors
                .iter()
                .filter(|c| c.story.id != seed.id && !consumed.contains(&c.story.id));
            let Some(best) = others.next() else {
                report.skipped += 1;
                continue;
            };
            let second_best = others.next().map(|c| c.similarity);

            let signals =
                PairSignals::from_stories(seed, &best.story, best.similarity, second_best);
            let verdict = evaluate_signals(&self.config, &signals);

            let MergeVerdict::Merge { tier, signal } = verdict else {
                debug!(
                    subsystem = "cluster",
                    component = "merge",
                    story_id = %seed.id,
                    candidate_id = %best.story.id,
                    similarity = best.similarity,
                    "Pair skipped"
                );
                report.skipped += 1;
                continue;
            };

            let (winner, loser) = merge_direction(seed, &best.story);

            if self.config.shadow {
                info!(
                    subsystem = "cluster",
                    component = "merge",
                    op = "shadow",
                    winner_id = %winner.id,
                    loser_id = %loser.id,
                    similarity = signals.similarity,
                    tier = tier.as_str(),
                    "Shadow mode: merge evaluated, not committed"
                );
                report.shadow_decisions.push(MergeDecision {
                    winner_id: winner.id,
                    loser_id: loser.id,
                    signals,
                    tier,
                    signal,
                    committed: false,
                });
                continue;
            }

            let outcome = MergeOutcome {
                winner_id: winner.id,
                loser_id: loser.id,
                similarity: signals.similarity,
                margin: signals.margin,
                tier,
                signal,
            };

            match self.stories.absorb(&outcome).await {
                Ok(audit) => {
                    consumed.insert(loser.id);
                    // Combined membership changed; recompute from scratch.
                    self.centroids.refresh(winner.id).await?;

                    info!(
                        subsystem = "cluster",
                        component = "merge",
                        op = "absorb",
                        winner_id = %winner.id,
                        loser_id = %loser.id,
                        similarity = audit.similarity,
                        tier = audit.tier.as_str(),
                        repointed = audit.repointed_links,
                        "Story absorbed"
                    );
                    report.merged.push(audit);
                }
                Err(e) => {
                    // The winner can close between retrieval and absorb;
                    // the pair simply waits for the next pass.
                    warn!(
                        subsystem = "cluster",
                        component = "merge",
                        winner_id = %winner.id,
                        loser_id = %loser.id,
                        error = %e,
                        "Absorb refused; pair deferred"
                    );
                    report.skipped += 1;
                }
            }
        }

        info!(
            subsystem = "cluster",
            component = "merge",
            op = "pass",
            scanned = report.scanned,
            merged = report.merged.len(),
            skipped = report.skipped,
            shadow = self.config.shadow,
            "Merge pass finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(
        similarity: f32,
        margin: Option<f32>,
        shared_entities: usize,
    ) -> PairSignals {
        PairSignals {
            similarity,
            margin,
            shared_entities,
            shared_topic_tag: false,
            shared_title_tokens: false,
        }
    }

    #[test]
    fn normalize_strips_type_prefix() {
        assert_eq!(normalize_entity_id("person:jane_doe"), "jane_doe");
        assert_eq!(normalize_entity_id("org/acme"), "acme");
    }

    #[test]
    fn normalize_strips_type_and_locale_prefix() {
        assert_eq!(normalize_entity_id("person:en:jane_doe"), "jane_doe");
        assert_eq!(normalize_entity_id("per:en-us:jane_doe"), "jane_doe");
    }

    #[test]
    fn normalize_is_case_insensitive() {
        assert_eq!(normalize_entity_id("PERSON:Jane_Doe"), "jane_doe");
    }

    #[test]
    fn normalize_leaves_bare_ids_alone() {
        assert_eq!(normalize_entity_id("jane_doe"), "jane_doe");
    }

    #[test]
    fn inconsistent_prefixes_still_match() {
        // The failure mode: same person, different extractor runs.
        assert_eq!(
            normalize_entity_id("person:en:senator_x"),
            normalize_entity_id("per/senator_x")
        );
    }

    #[test]
    fn title_tokens_filter_short_and_stopwords() {
        let tokens = title_tokens("Senator X resigns after report");
        assert!(tokens.contains("senator"));
        assert!(tokens.contains("resigns"));
        assert!(!tokens.contains("x"));
        assert!(!tokens.contains("after"));
        assert!(!tokens.contains("report"));
    }

    #[test]
    fn tier_a_merges_with_clear_margin() {
        let cfg = MergeConfig::default();
        let verdict = evaluate_signals(&cfg, &signals(0.92, Some(0.05), 0));
        assert_eq!(
            verdict,
            MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: None
            }
        );
    }

    #[test]
    fn tier_a_merges_with_no_runner_up() {
        let cfg = MergeConfig::default();
        assert!(evaluate_signals(&cfg, &signals(0.91, None, 0)).is_merge());
    }

    #[test]
    fn tier_a_ambiguous_margin_skips_without_signal() {
        let cfg = MergeConfig::default();
        let verdict = evaluate_signals(&cfg, &signals(0.92, Some(0.01), 0));
        assert_eq!(verdict, MergeVerdict::Skip(SkipReason::AmbiguousMargin));
    }

    #[test]
    fn tier_a_margin_bypass_via_shared_entity() {
        let cfg = MergeConfig::default();
        let verdict = evaluate_signals(&cfg, &signals(0.91, Some(0.01), 1));
        assert_eq!(
            verdict,
            MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: Some(MergeSignal::SharedEntity)
            }
        );
    }

    #[test]
    fn tier_a_margin_bypass_via_topic_tag() {
        let cfg = MergeConfig::default();
        let mut s = signals(0.91, Some(0.01), 0);
        s.shared_topic_tag = true;
        assert!(evaluate_signals(&cfg, &s).is_merge());
    }

    #[test]
    fn tier_a_title_bypass_needs_higher_similarity() {
        let cfg = MergeConfig::default();
        let mut s = signals(0.901, Some(0.01), 0);
        s.shared_title_tokens = true;
        assert_eq!(
            evaluate_signals(&cfg, &s),
            MergeVerdict::Skip(SkipReason::AmbiguousMargin)
        );

        s.similarity = 0.906;
        assert_eq!(
            evaluate_signals(&cfg, &s),
            MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: Some(MergeSignal::SharedTitleTokens)
            }
        );
    }

    #[test]
    fn tier_b_disabled_by_default() {
        let cfg = MergeConfig::default();
        let verdict = evaluate_signals(&cfg, &signals(0.89, Some(0.1), 2));
        assert_eq!(verdict, MergeVerdict::Skip(SkipReason::BelowThreshold));
    }

    #[test]
    fn tier_b_requires_corroboration() {
        let cfg = MergeConfig::default().with_tier_b(true);
        assert_eq!(
            evaluate_signals(&cfg, &signals(0.89, None, 0)),
            MergeVerdict::Skip(SkipReason::Uncorroborated)
        );
        assert_eq!(
            evaluate_signals(&cfg, &signals(0.89, None, 1)),
            MergeVerdict::Merge {
                tier: MergeTier::B,
                signal: Some(MergeSignal::SharedEntity)
            }
        );
    }

    #[test]
    fn tier_b_has_no_margin_requirement() {
        let cfg = MergeConfig::default().with_tier_b(true);
        // Margin far below the Tier A requirement.
        assert!(evaluate_signals(&cfg, &signals(0.885, Some(0.001), 1)).is_merge());
    }

    #[test]
    fn same_topic_different_event_never_merges() {
        // Two tariff stories, zero shared entities, similarity 0.80.
        let cfg = MergeConfig::default().with_tier_b(true);
        let verdict = evaluate_signals(&cfg, &signals(0.80, Some(0.2), 0));
        assert_eq!(verdict, MergeVerdict::Skip(SkipReason::BelowThreshold));
    }

    #[test]
    fn senator_resignation_scenario_merges_tier_a() {
        // sim 0.91, margin below 0.04, one shared person entity.
        let cfg = MergeConfig::default();
        let verdict = evaluate_signals(&cfg, &signals(0.91, Some(0.02), 1));
        assert_eq!(
            verdict,
            MergeVerdict::Merge {
                tier: MergeTier::A,
                signal: Some(MergeSignal::SharedEntity)
            }
        );
    }

    #[test]
    fn direction_older_absorbs_newer() {
        use chrono::{Duration, Utc};
        use newsloom_core::StoryState;

        let mk = |hours_old: i64, members: i32| Story {
            id: Uuid::new_v4(),
            primary_headline: String::new(),
            centroid: None,
            top_entities: vec![],
            topic_tags: vec![],
            first_seen_at: Utc::now() - Duration::hours(hours_old),
            last_updated_at: Utc::now(),
            state: StoryState::Growing,
            member_count: members,
            version: 0,
        };

        let older = mk(48, 2);
        let newer = mk(2, 10);
        let (winner, loser) = merge_direction(&older, &newer);
        assert_eq!(winner.id, older.id);
        assert_eq!(loser.id, newer.id);

        // Same age: larger absorbs smaller.
        let mut a = mk(10, 3);
        let b = mk(10, 8);
        a.first_seen_at = b.first_seen_at;
        let (winner, _) = merge_direction(&a, &b);
        assert_eq!(winner.id, b.id);
    }

    #[test]
    fn pair_signals_from_stories_normalizes_entities() {
        use chrono::Utc;
        use newsloom_core::StoryState;

        let mk = |headline: &str, entities: &[&str]| Story {
            id: Uuid::new_v4(),
            primary_headline: headline.into(),
            centroid: None,
            top_entities: entities.iter().map(|s| s.to_string()).collect(),
            topic_tags: vec![],
            first_seen_at: Utc::now(),
            last_updated_at: Utc::now(),
            state: StoryState::Growing,
            member_count: 1,
            version: 0,
        };

        let a = mk("Senator X resigns", &["person:en:senator_x"]);
        let b = mk("Senator X resignation confirmed", &["per/senator_x"]);
        let signals = PairSignals::from_stories(&a, &b, 0.91, Some(0.89));

        assert_eq!(signals.shared_entities, 1);
        assert!(signals.shared_title_tokens);
        assert_eq!(signals.margin, Some(0.91 - 0.89));
    }
}
