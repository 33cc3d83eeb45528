//! Real-time article-to-story attachment.
//!
//! Embedding similarity alone produces false positives on topically
//! similar but distinct events (two different tariff announcements read
//! alike), so similarity is necessary but never sufficient: every lane
//! also requires entity corroboration, trading required similarity
//! against required shared-entity count.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use uuid::Uuid;

use newsloom_core::{
    Article, AttachConfig, CreateStoryRequest, Error, Result, Story, StoryRepository,
};

/// Entity-overlap lane a decision was resolved through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Two or more shared entities.
    MultiEntity,
    /// Exactly one shared entity (reserved, never attaches).
    SingleEntity,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiEntity => "multi_entity",
            Self::SingleEntity => "single_entity",
        }
    }
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Article or story has no extracted entities.
    NoEntities,
    /// Candidate fell outside the trailing time window.
    OutsideTimeWindow,
    /// Candidate category differs (only with the category check enabled).
    CategoryMismatch,
    /// No shared entities after the generic-entity discount.
    NoSharedEntities,
    /// One shared entity; the strict single-entity path is not active.
    SingleEntityReserved,
    /// Shared entities present but similarity below the lane's gate.
    BelowSimilarity { required: f32 },
}

/// Structured record of one candidate evaluation. Every decision returns
/// one of these, attach or reject, so the pipeline is auditable after the
/// fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub story_id: Uuid,
    pub similarity: f32,
    pub attach: bool,
    pub lane: Option<Lane>,
    pub shared_entities: Vec<String>,
    pub reject: Option<RejectReason>,
}

/// Result of running the attach flow for one article.
#[derive(Debug, Clone)]
pub enum AttachOutcome {
    /// Article joined an existing story.
    Attached { story_id: Uuid, similarity: f32 },
    /// No candidate qualified; a new story was created.
    Created { story_id: Uuid },
}

/// Outcome plus the per-candidate traces that led to it.
#[derive(Debug, Clone)]
pub struct AttachResolution {
    pub outcome: AttachOutcome,
    pub traces: Vec<DecisionTrace>,
}

/// Evaluate one candidate story for one article.
///
/// Gate order: entity presence, time window, optional category, then the
/// tiered (shared-entity count, similarity) gates.
pub fn decide(config: &AttachConfig, article: &Article, candidate: &Story, similarity: f32) -> DecisionTrace {
    let mut trace = DecisionTrace {
        story_id: candidate.id,
        similarity,
        attach: false,
        lane: None,
        shared_entities: Vec::new(),
        reject: None,
    };

    if article.entity_ids.is_empty() || candidate.top_entities.is_empty() {
        trace.reject = Some(RejectReason::NoEntities);
        return trace;
    }

    let gap = (article.published_at - candidate.last_updated_at).abs();
    if gap > Duration::hours(config.window_hours) {
        trace.reject = Some(RejectReason::OutsideTimeWindow);
        return trace;
    }

    if config.check_category {
        if let Some(category) = &article.category {
            if !candidate.topic_tags.is_empty() && !candidate.topic_tags.contains(category) {
                trace.reject = Some(RejectReason::CategoryMismatch);
                return trace;
            }
        }
    }

    // Shared entities, discounting ids that corroborate nothing
    // (wire services, media orgs).
    let mut shared: Vec<String> = article
        .entity_ids
        .iter()
        .filter(|id| candidate.top_entities.contains(id))
        .filter(|id| !config.generic_entities.contains(id.as_str()))
        .cloned()
        .collect();
    shared.sort();
    shared.dedup();
    trace.shared_entities = shared;

    match trace.shared_entities.len() {
        0 => {
            // Never attach on similarity alone, no matter how high.
            trace.reject = Some(RejectReason::NoSharedEntities);
        }
        1 => {
            trace.lane = Some(Lane::SingleEntity);
            // The flag only reserves the lane; the strict path behind it
            // is not active.
            trace.reject = Some(RejectReason::SingleEntityReserved);
        }
        2 => {
            trace.lane = Some(Lane::MultiEntity);
            if similarity >= config.two_entity_min_sim {
                trace.attach = true;
            } else {
                trace.reject = Some(RejectReason::BelowSimilarity {
                    required: config.two_entity_min_sim,
                });
            }
        }
        _ => {
            trace.lane = Some(Lane::MultiEntity);
            if similarity >= config.multi_entity_min_sim {
                trace.attach = true;
            } else {
                trace.reject = Some(RejectReason::BelowSimilarity {
                    required: config.multi_entity_min_sim,
                });
            }
        }
    }

    trace
}

/// Attach engine: candidate retrieval, per-candidate decision, and the
/// new-story fallback.
pub struct AttachEngine {
    stories: Arc<dyn StoryRepository>,
    config: AttachConfig,
}

impl AttachEngine {
    pub fn new(stories: Arc<dyn StoryRepository>, config: AttachConfig) -> Self {
        Self { stories, config }
    }

    /// Run the attach flow for one enriched article.
    ///
    /// Candidates are evaluated most-similar first (ties broken by story
    /// recency, as retrieved); the first attaching candidate wins. A
    /// candidate whose guarded membership update is refused (closed by a
    /// concurrent merge or sweep) is skipped. No qualifying candidate
    /// means a new story: over-fragmentation beats a wrongful merge,
    /// which a later reconciliation pass cannot cheaply undo.
    pub async fn attach(&self, article: &Article) -> Result<AttachResolution> {
        let embedding = article
            .embedding
            .as_ref()
            .ok_or_else(|| Error::InvalidInput(format!("article {} has no embedding", article.id)))?;

        let candidates = self
            .stories
            .find_candidates(
                embedding,
                self.config.top_k,
                self.config.similarity_floor,
                Duration::hours(self.config.window_hours),
            )
            .await?;

        debug!(
            subsystem = "cluster",
            component = "attach",
            op = "decide",
            article_id = %article.id,
            candidate_count = candidates.len(),
            "Evaluating attach candidates"
        );

        let mut traces = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let trace = decide(&self.config, article, &candidate.story, candidate.similarity);
            trace!(
                subsystem = "cluster",
                component = "attach",
                story_id = %trace.story_id,
                similarity = trace.similarity,
                attach = trace.attach,
                "Candidate evaluated"
            );

            if trace.attach {
                let attached = self
                    .stories
                    .attach_article(candidate.story.id, article.id, candidate.similarity, Utc::now())
                    .await?;
                if attached {
                    self.stories
                        .union_entities(candidate.story.id, &article.entity_ids)
                        .await?;

                    info!(
                        subsystem = "cluster",
                        component = "attach",
                        op = "attached",
                        article_id = %article.id,
                        story_id = %candidate.story.id,
                        similarity = candidate.similarity,
                        lane = trace.lane.map(|l| l.as_str()).unwrap_or(""),
                        "Article attached to story"
                    );

                    let outcome = AttachOutcome::Attached {
                        story_id: candidate.story.id,
                        similarity: candidate.similarity,
                    };
                    traces.push(trace);
                    return Ok(AttachResolution { outcome, traces });
                }
                // Story vanished between retrieval and update; next candidate.
                debug!(
                    subsystem = "cluster",
                    component = "attach",
                    story_id = %candidate.story.id,
                    "Candidate closed concurrently; skipping"
                );
            }
            traces.push(trace);
        }

        let story = self
            .stories
            .create(CreateStoryRequest {
                headline: article.title.clone(),
                article_id: article.id,
                entity_ids: article.entity_ids.clone(),
                topic_tags: article.category.iter().cloned().collect(),
                embedding: article.embedding.clone(),
                similarity: 1.0,
                published_at: article.published_at,
            })
            .await?;

        info!(
            subsystem = "cluster",
            component = "attach",
            op = "created",
            article_id = %article.id,
            story_id = %story.id,
            candidate_count = traces.len(),
            "No candidate qualified; created new story"
        );

        Ok(AttachResolution {
            outcome: AttachOutcome::Created { story_id: story.id },
            traces,
        })
    }
}
