//! Decision-engine configuration.
//!
//! The attach and merge engines take an explicit immutable config rather
//! than reading module globals, so offline validation sweeps can score
//! per-call overrides without touching process state.

use std::collections::HashSet;

use crate::defaults;

/// Configuration for the real-time attach decision.
#[derive(Debug, Clone)]
pub struct AttachConfig {
    /// Trailing candidate window in hours.
    pub window_hours: i64,
    /// Candidates retrieved per decision.
    pub top_k: i64,
    /// Minimum-similarity floor for candidate retrieval.
    pub similarity_floor: f32,
    /// Similarity required with >= 3 shared entities.
    pub multi_entity_min_sim: f32,
    /// Similarity required with exactly 2 shared entities.
    pub two_entity_min_sim: f32,
    /// Reserved flag for a stricter single-shared-entity path.
    /// The path is intentionally not active; the flag exists so rollout
    /// tooling can already carry it.
    pub single_entity_lane: bool,
    /// Reject candidates whose category differs from the article's.
    /// Off by default: category metadata is sparse upstream.
    pub check_category: bool,
    /// Entity ids that provide no discriminating signal (wire services,
    /// media orgs). Discounted from the shared-entity set.
    pub generic_entities: HashSet<String>,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            window_hours: defaults::ATTACH_WINDOW_HOURS,
            top_k: defaults::ATTACH_TOP_K,
            similarity_floor: defaults::ATTACH_SIMILARITY_FLOOR,
            multi_entity_min_sim: defaults::ATTACH_MULTI_ENTITY_MIN_SIM,
            two_entity_min_sim: defaults::ATTACH_TWO_ENTITY_MIN_SIM,
            single_entity_lane: false,
            check_category: false,
            generic_entities: HashSet::new(),
        }
    }
}

impl AttachConfig {
    /// Set the generic-entity blocklist.
    pub fn with_generic_entities<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_entities = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the trailing candidate window.
    pub fn with_window_hours(mut self, hours: i64) -> Self {
        self.window_hours = hours;
        self
    }

    /// Enable category mismatch rejection.
    pub fn with_category_check(mut self, enabled: bool) -> Self {
        self.check_category = enabled;
        self
    }
}

/// Configuration for the merge reconciler.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Tier A similarity threshold.
    pub tier_a_min_sim: f32,
    /// Tier A margin over the second-best candidate.
    pub tier_a_margin: f32,
    /// Similarity required for the shared-title-token margin bypass.
    pub title_bypass_min_sim: f32,
    /// Tier B enabled. Ships false; flipped only after the candidate
    /// thresholds score acceptably on the golden set.
    pub tier_b_enabled: bool,
    /// Tier B similarity threshold.
    pub tier_b_min_sim: f32,
    /// Stories scanned per pass.
    pub scan_limit: i64,
    /// Only stories updated within this window are scanned.
    pub scan_window_hours: i64,
    /// Log decisions without committing them.
    pub shadow: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            tier_a_min_sim: defaults::MERGE_TIER_A_MIN_SIM,
            tier_a_margin: defaults::MERGE_TIER_A_MARGIN,
            title_bypass_min_sim: defaults::MERGE_TITLE_BYPASS_MIN_SIM,
            tier_b_enabled: false,
            tier_b_min_sim: defaults::MERGE_TIER_B_MIN_SIM,
            scan_limit: defaults::MERGE_SCAN_LIMIT,
            scan_window_hours: defaults::MERGE_SCAN_WINDOW_HOURS,
            shadow: false,
        }
    }
}

impl MergeConfig {
    /// Override the Tier A similarity threshold (per-pass override from
    /// the `story.merge` payload).
    pub fn with_tier_a_min_sim(mut self, sim: f32) -> Self {
        self.tier_a_min_sim = sim;
        self
    }

    /// Enable Tier B.
    pub fn with_tier_b(mut self, enabled: bool) -> Self {
        self.tier_b_enabled = enabled;
        self
    }

    /// Run in shadow mode: evaluate but commit nothing.
    pub fn with_shadow(mut self, shadow: bool) -> Self {
        self.shadow = shadow;
        self
    }
}

/// Thresholds for the periodic lifecycle sweep, in hours.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Age since first-seen graduating emerging → growing.
    pub growing_after_hours: i64,
    /// Age since first-seen graduating growing → stable.
    pub stable_after_hours: i64,
    /// Inactivity marking an open story stale.
    pub stale_after_hours: i64,
    /// Inactivity closing a story.
    pub close_after_hours: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            growing_after_hours: defaults::LIFECYCLE_GROWING_AFTER_HOURS,
            stable_after_hours: defaults::LIFECYCLE_STABLE_AFTER_HOURS,
            stale_after_hours: defaults::LIFECYCLE_STALE_AFTER_HOURS,
            close_after_hours: defaults::LIFECYCLE_CLOSE_AFTER_HOURS,
        }
    }
}
