//! Story re-enrichment handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use newsloom_core::{
    EntityExtractor, JobType, StoryEnrichPayload, StoryRepository,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Re-extracts the entity set for one story.
///
/// Runs when extraction finished after the attach window closed, or after
/// an extractor upgrade: the story headline goes back through extraction
/// and the result is unioned into the top-entity set.
pub struct StoryEnrichHandler {
    stories: Arc<dyn StoryRepository>,
    extractor: Arc<dyn EntityExtractor>,
}

impl StoryEnrichHandler {
    pub fn new(stories: Arc<dyn StoryRepository>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self { stories, extractor }
    }
}

#[async_trait]
impl JobHandler for StoryEnrichHandler {
    fn job_type(&self) -> JobType {
        JobType::StoryEnrich
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: StoryEnrichPayload = match ctx.typed_payload() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e),
        };

        let story = match self.stories.get(payload.story_id).await {
            Ok(Some(story)) => story,
            Ok(None) => return JobResult::Failed(format!("story {} not found", payload.story_id)),
            Err(e) => return JobResult::from_error(e),
        };

        let extracted = match self.extractor.extract(&story.primary_headline).await {
            Ok(entities) => entities,
            Err(e) => return JobResult::from_error(e),
        };
        let entity_ids: Vec<String> = extracted
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| e.id.clone())
            .collect();

        if !entity_ids.is_empty() {
            if let Err(e) = self.stories.union_entities(story.id, &entity_ids).await {
                return JobResult::from_error(e);
            }
        }

        JobResult::Success(Some(json!({
            "story_id": story.id,
            "entities_added": entity_ids.len(),
        })))
    }
}
