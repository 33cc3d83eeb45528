//! Article enrichment handler: entities, embedding, then attachment.

use std::sync::Arc;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::json;
use tracing::{debug, warn};

use newsloom_cluster::{AttachEngine, AttachOutcome, CentroidMaintainer};
use newsloom_core::{
    ArticleEnrichPayload, ArticleRepository, EmbeddingClient, EntityExtractor, JobType,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Enriches one article and runs the attach decision.
///
/// Pipeline: extract entities → embed → persist both → attach (join a
/// story or create one) → refresh the affected story's centroid.
pub struct ArticleEnrichHandler {
    articles: Arc<dyn ArticleRepository>,
    embedder: Arc<dyn EmbeddingClient>,
    extractor: Arc<dyn EntityExtractor>,
    attach: AttachEngine,
    centroids: CentroidMaintainer,
}

impl ArticleEnrichHandler {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        embedder: Arc<dyn EmbeddingClient>,
        extractor: Arc<dyn EntityExtractor>,
        attach: AttachEngine,
        centroids: CentroidMaintainer,
    ) -> Self {
        Self {
            articles,
            embedder,
            extractor,
            attach,
            centroids,
        }
    }
}

#[async_trait]
impl JobHandler for ArticleEnrichHandler {
    fn job_type(&self) -> JobType {
        JobType::ArticleEnrich
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: ArticleEnrichPayload = match ctx.typed_payload() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e),
        };

        let mut article = match self.articles.get(payload.article_id).await {
            Ok(Some(article)) => article,
            Ok(None) => {
                return JobResult::Failed(format!("article {} not found", payload.article_id))
            }
            Err(e) => return JobResult::from_error(e),
        };

        // Entity extraction, validated at the boundary: entries without
        // an id carry no matching signal and are dropped here, not deep
        // in decision logic.
        let extracted = match self.extractor.extract(&article.title).await {
            Ok(entities) => entities,
            Err(e) => return JobResult::from_error(e),
        };
        let dropped = extracted.iter().filter(|e| !e.is_valid()).count();
        if dropped > 0 {
            warn!(
                subsystem = "jobs",
                component = "article_enrich",
                article_id = %article.id,
                dropped,
                "Dropped invalid entity references from extractor output"
            );
        }
        let entity_ids: Vec<String> = extracted
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| e.id.clone())
            .collect();

        let embedding = match self.embedder.embed(&article.title).await {
            Ok(vector) => Vector::from(vector),
            Err(e) => return JobResult::from_error(e),
        };

        if let Err(e) = self.articles.set_entities(article.id, &entity_ids).await {
            return JobResult::from_error(e);
        }
        if let Err(e) = self.articles.set_embedding(article.id, &embedding).await {
            return JobResult::from_error(e);
        }

        article.entity_ids = entity_ids;
        article.embedding = Some(embedding);

        let resolution = match self.attach.attach(&article).await {
            Ok(resolution) => resolution,
            Err(e) => return JobResult::from_error(e),
        };

        let (story_id, outcome) = match resolution.outcome {
            AttachOutcome::Attached { story_id, similarity } => {
                debug!(
                    subsystem = "jobs",
                    component = "article_enrich",
                    article_id = %article.id,
                    story_id = %story_id,
                    similarity,
                    "Article attached"
                );
                (story_id, "attached")
            }
            AttachOutcome::Created { story_id } => (story_id, "created"),
        };

        // Membership changed either way; bring the centroid up to date.
        if let Err(e) = self.centroids.refresh(story_id).await {
            return JobResult::from_error(e);
        }

        JobResult::Success(Some(json!({
            "story_id": story_id,
            "outcome": outcome,
            "entities": article.entity_ids.len(),
            "candidates_evaluated": resolution.traces.len(),
        })))
    }
}
