//! In-memory repository fakes for engine tests.
//!
//! Mirrors the semantics of the PostgreSQL implementations closely enough
//! for the engines: guarded attachment into closed stories, link
//! repointing on absorb, state-filtered candidate retrieval.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pgvector::Vector;
use uuid::Uuid;

use newsloom_cluster::cosine_similarity;
use newsloom_core::{
    new_v7, Article, ArticleStoryLink, CreateStoryRequest, Error, LifecycleConfig,
    LifecycleSweepReport, MergeAudit, MergeOutcome, Result, Story, StoryCandidate,
    StoryRepository, StoryState,
};

#[derive(Default)]
pub struct InMemoryStoryRepo {
    pub stories: Mutex<HashMap<Uuid, Story>>,
    pub links: Mutex<Vec<ArticleStoryLink>>,
    /// Embeddings of known articles, consulted by member_embeddings.
    pub article_embeddings: Mutex<HashMap<Uuid, Option<Vector>>>,
    /// Stories that refuse attachment regardless of state, to simulate a
    /// story closed between candidate retrieval and the guarded update.
    pub refuse_attach: Mutex<HashSet<Uuid>>,
    pub audits: Mutex<Vec<MergeAudit>>,
}

impl InMemoryStoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_story(&self, story: Story) {
        self.stories.lock().unwrap().insert(story.id, story);
    }

    pub fn register_article(&self, article: &Article) {
        self.article_embeddings
            .lock()
            .unwrap()
            .insert(article.id, article.embedding.clone());
    }

    pub fn story(&self, id: Uuid) -> Story {
        self.stories.lock().unwrap().get(&id).cloned().expect("story")
    }

    pub fn links_for(&self, story_id: Uuid) -> Vec<ArticleStoryLink> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.story_id == story_id)
            .cloned()
            .collect()
    }

    /// Seed a primary article link for a directly inserted story.
    pub fn seed_primary_link(&self, story_id: Uuid, embedding: Option<Vec<f32>>) -> Uuid {
        let article_id = new_v7();
        self.article_embeddings
            .lock()
            .unwrap()
            .insert(article_id, embedding.map(Vector::from));
        self.links.lock().unwrap().push(ArticleStoryLink {
            article_id,
            story_id,
            similarity_score: 1.0,
            is_primary: true,
            matched_at: Utc::now(),
        });
        article_id
    }
}

/// Builder for test stories.
pub fn make_story(
    headline: &str,
    entities: &[&str],
    centroid: Option<Vec<f32>>,
    first_seen_hours_ago: i64,
    updated_hours_ago: i64,
) -> Story {
    Story {
        id: new_v7(),
        primary_headline: headline.to_string(),
        centroid: centroid.map(Vector::from),
        top_entities: entities.iter().map(|s| s.to_string()).collect(),
        topic_tags: vec![],
        first_seen_at: Utc::now() - Duration::hours(first_seen_hours_ago),
        last_updated_at: Utc::now() - Duration::hours(updated_hours_ago),
        state: StoryState::Growing,
        member_count: 1,
        version: 0,
    }
}

/// Builder for test articles.
pub fn make_article(title: &str, entities: &[&str], embedding: Vec<f32>) -> Article {
    Article {
        id: new_v7(),
        dedup_key: format!("test:{}", new_v7()),
        title: title.to_string(),
        source: "test".to_string(),
        category: None,
        published_at: Utc::now() - Duration::hours(1),
        entity_ids: entities.iter().map(|s| s.to_string()).collect(),
        embedding: Some(Vector::from(embedding)),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl StoryRepository for InMemoryStoryRepo {
    async fn create(&self, req: CreateStoryRequest) -> Result<Story> {
        let now = Utc::now();
        let story = Story {
            id: new_v7(),
            primary_headline: req.headline,
            centroid: req.embedding,
            top_entities: req.entity_ids,
            topic_tags: req.topic_tags,
            first_seen_at: req.published_at,
            last_updated_at: now,
            state: StoryState::Emerging,
            member_count: 1,
            version: 0,
        };
        self.stories.lock().unwrap().insert(story.id, story.clone());
        self.links.lock().unwrap().push(ArticleStoryLink {
            article_id: req.article_id,
            story_id: story.id,
            similarity_score: req.similarity,
            is_primary: true,
            matched_at: now,
        });
        Ok(story)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>> {
        Ok(self.stories.lock().unwrap().get(&id).cloned())
    }

    async fn find_candidates(
        &self,
        query: &Vector,
        limit: i64,
        floor: f32,
        updated_within: Duration,
    ) -> Result<Vec<StoryCandidate>> {
        let since = Utc::now() - updated_within;
        let mut candidates: Vec<StoryCandidate> = self
            .stories
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.state.is_open() && s.last_updated_at >= since)
            .filter_map(|s| {
                let centroid = s.centroid.as_ref()?;
                let similarity = cosine_similarity(query, centroid);
                (similarity >= floor).then(|| StoryCandidate {
                    story: s.clone(),
                    similarity,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.story.last_updated_at.cmp(&a.story.last_updated_at))
        });
        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    async fn attach_article(
        &self,
        story_id: Uuid,
        article_id: Uuid,
        similarity: f32,
        matched_at: DateTime<Utc>,
    ) -> Result<bool> {
        if self.refuse_attach.lock().unwrap().contains(&story_id) {
            return Ok(false);
        }

        let mut stories = self.stories.lock().unwrap();
        let Some(story) = stories.get_mut(&story_id) else {
            return Ok(false);
        };
        if !story.state.is_open() {
            return Ok(false);
        }

        let mut links = self.links.lock().unwrap();
        if links.iter().any(|l| l.article_id == article_id) {
            return Ok(false);
        }

        story.member_count += 1;
        story.last_updated_at = matched_at;
        story.version += 1;
        links.push(ArticleStoryLink {
            article_id,
            story_id,
            similarity_score: similarity,
            is_primary: false,
            matched_at,
        });
        Ok(true)
    }

    async fn member_embeddings(&self, story_id: Uuid) -> Result<Vec<Vector>> {
        let links = self.links.lock().unwrap();
        let embeddings = self.article_embeddings.lock().unwrap();
        Ok(links
            .iter()
            .filter(|l| l.story_id == story_id)
            .filter_map(|l| embeddings.get(&l.article_id).cloned().flatten())
            .collect())
    }

    async fn update_centroid(&self, story_id: Uuid, centroid: Option<&Vector>) -> Result<()> {
        let mut stories = self.stories.lock().unwrap();
        let story = stories.get_mut(&story_id).ok_or(Error::StoryNotFound(story_id))?;
        story.centroid = centroid.cloned();
        story.version += 1;
        Ok(())
    }

    async fn union_entities(&self, story_id: Uuid, entity_ids: &[String]) -> Result<()> {
        let mut stories = self.stories.lock().unwrap();
        let story = stories.get_mut(&story_id).ok_or(Error::StoryNotFound(story_id))?;
        for id in entity_ids {
            if !story.top_entities.contains(id) {
                story.top_entities.push(id.clone());
            }
        }
        story.version += 1;
        Ok(())
    }

    async fn lifecycle_sweep(&self, config: &LifecycleConfig) -> Result<LifecycleSweepReport> {
        let now = Utc::now();
        let mut report = LifecycleSweepReport::default();
        let mut stories = self.stories.lock().unwrap();

        for story in stories.values_mut() {
            let inactive = now - story.last_updated_at;
            let age = now - story.first_seen_at;

            if story.state.is_open() && inactive > Duration::hours(config.close_after_hours) {
                story.state = StoryState::Closed;
                report.closed += 1;
            } else if matches!(
                story.state,
                StoryState::Emerging | StoryState::Growing | StoryState::Stable
            ) && inactive > Duration::hours(config.stale_after_hours)
            {
                story.state = StoryState::Stale;
                report.to_stale += 1;
            } else if story.state == StoryState::Growing
                && age > Duration::hours(config.stable_after_hours)
            {
                story.state = StoryState::Stable;
                report.to_stable += 1;
            } else if story.state == StoryState::Emerging
                && age > Duration::hours(config.growing_after_hours)
            {
                story.state = StoryState::Growing;
                report.to_growing += 1;
            }
        }
        Ok(report)
    }

    async fn absorb(&self, outcome: &MergeOutcome) -> Result<MergeAudit> {
        let now = Utc::now();
        let mut stories = self.stories.lock().unwrap();

        let winner_open = stories
            .get(&outcome.winner_id)
            .map(|s| s.state.is_open())
            .ok_or(Error::StoryNotFound(outcome.winner_id))?;
        if !winner_open {
            return Err(Error::InvalidInput(format!(
                "cannot merge into closed story {}",
                outcome.winner_id
            )));
        }

        let mut links = self.links.lock().unwrap();
        let mut repointed = 0i64;
        for link in links.iter_mut() {
            if link.story_id == outcome.loser_id {
                link.story_id = outcome.winner_id;
                link.is_primary = false;
                repointed += 1;
            }
        }

        let loser_entities = stories
            .get(&outcome.loser_id)
            .map(|s| s.top_entities.clone())
            .unwrap_or_default();

        if let Some(winner) = stories.get_mut(&outcome.winner_id) {
            for id in loser_entities {
                if !winner.top_entities.contains(&id) {
                    winner.top_entities.push(id);
                }
            }
            winner.member_count += repointed as i32;
            winner.last_updated_at = now;
            winner.version += 1;
        }
        if let Some(loser) = stories.get_mut(&outcome.loser_id) {
            loser.state = StoryState::Closed;
            loser.member_count = 0;
            loser.version += 1;
        }

        let audit = MergeAudit {
            id: new_v7(),
            winner_id: outcome.winner_id,
            loser_id: outcome.loser_id,
            similarity: outcome.similarity,
            margin: outcome.margin,
            tier: outcome.tier,
            signal: outcome.signal,
            repointed_links: repointed,
            decided_at: now,
        };
        self.audits.lock().unwrap().push(audit.clone());
        Ok(audit)
    }

    async fn missing_centroids(&self, limit: i64) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .stories
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.centroid.is_none() && s.member_count > 0 && s.state.is_open())
            .map(|s| s.id)
            .collect();
        ids.sort();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn recently_updated(&self, window: Duration, limit: i64) -> Result<Vec<Story>> {
        let since = Utc::now() - window;
        let mut stories: Vec<Story> = self
            .stories
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.state.is_open() && s.last_updated_at >= since)
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        stories.truncate(limit as usize);
        Ok(stories)
    }

    async fn links(&self, story_id: Uuid) -> Result<Vec<ArticleStoryLink>> {
        Ok(self.links_for(story_id))
    }
}
