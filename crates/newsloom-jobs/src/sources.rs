//! Feed source scheduling: per-tier poll cadence with failure backoff.
//!
//! The fetch mechanics live upstream; this module only answers "may this
//! source be polled now, and when next." Repeated failures double the
//! poll interval, and a source past the failure threshold is excluded
//! from scheduling entirely until its cooldown expires.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use newsloom_core::defaults;

/// Source tier: how aggressively a feed is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    /// Wire services and high-volume outlets.
    Primary,
    /// Standard outlets.
    Standard,
    /// Low-volume or rarely updated feeds.
    Low,
}

impl SourceTier {
    /// Base poll interval for a healthy source of this tier.
    pub fn base_interval(&self) -> Duration {
        match self {
            Self::Primary => Duration::minutes(5),
            Self::Standard => Duration::minutes(20),
            Self::Low => Duration::minutes(60),
        }
    }
}

/// Poll interval for a source with the given consecutive-failure streak.
///
/// The first failure costs nothing (feeds hiccup); from the second on,
/// the interval doubles per failure, capped at
/// [`defaults::SOURCE_BACKOFF_MAX_MULTIPLIER`] times base.
pub fn poll_interval(tier: SourceTier, consecutive_failures: u32) -> Duration {
    let base = tier.base_interval();
    if consecutive_failures < 2 {
        return base;
    }
    let multiplier = 2u32
        .saturating_pow(consecutive_failures - 1)
        .min(defaults::SOURCE_BACKOFF_MAX_MULTIPLIER);
    base * multiplier as i32
}

/// Tracked health of one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub tier: SourceTier,
    pub consecutive_failures: u32,
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Set when the failure threshold was crossed.
    pub excluded_until: Option<DateTime<Utc>>,
}

impl SourceHealth {
    pub fn new(tier: SourceTier) -> Self {
        Self {
            tier,
            consecutive_failures: 0,
            last_polled_at: None,
            excluded_until: None,
        }
    }
}

/// Scheduling decisions for a set of feed sources.
#[derive(Default)]
pub struct SourceScheduler {
    sources: HashMap<String, SourceHealth>,
}

impl SourceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source with its tier. Re-registering keeps health.
    pub fn register(&mut self, name: impl Into<String>, tier: SourceTier) {
        self.sources
            .entry(name.into())
            .or_insert_with(|| SourceHealth::new(tier));
    }

    /// Whether a source may be polled at `now`.
    ///
    /// A source is eligible when it is registered, outside any exclusion
    /// cooldown, and its (backoff-adjusted) interval has elapsed since
    /// the last poll.
    pub fn is_eligible(&self, name: &str, now: DateTime<Utc>) -> bool {
        let Some(health) = self.sources.get(name) else {
            return false;
        };
        if let Some(until) = health.excluded_until {
            if now < until {
                return false;
            }
        }
        match health.last_polled_at {
            Some(last) => now - last >= poll_interval(health.tier, health.consecutive_failures),
            None => true,
        }
    }

    /// Record a successful poll: the failure streak and any exclusion
    /// are cleared.
    pub fn record_success(&mut self, name: &str, now: DateTime<Utc>) {
        if let Some(health) = self.sources.get_mut(name) {
            if health.excluded_until.is_some() {
                info!(
                    subsystem = "jobs",
                    component = "sources",
                    source = name,
                    "Source recovered from exclusion"
                );
            }
            health.consecutive_failures = 0;
            health.excluded_until = None;
            health.last_polled_at = Some(now);
        }
    }

    /// Record a failed poll: the streak grows, and crossing the
    /// threshold excludes the source for a cooldown.
    pub fn record_failure(&mut self, name: &str, now: DateTime<Utc>) {
        if let Some(health) = self.sources.get_mut(name) {
            health.consecutive_failures += 1;
            health.last_polled_at = Some(now);

            if health.consecutive_failures >= defaults::SOURCE_FAILURE_THRESHOLD {
                health.excluded_until =
                    Some(now + Duration::minutes(defaults::SOURCE_EXCLUSION_COOLDOWN_MINS));
                warn!(
                    subsystem = "jobs",
                    component = "sources",
                    source = name,
                    consecutive_failures = health.consecutive_failures,
                    "Source excluded from scheduling until cooldown expires"
                );
            }
        }
    }

    /// Health snapshot for one source.
    pub fn health(&self, name: &str) -> Option<&SourceHealth> {
        self.sources.get(name)
    }
}
