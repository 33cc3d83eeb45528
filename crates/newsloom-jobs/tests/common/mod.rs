//! In-memory repository fakes for worker and handler tests.

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pgvector::Vector;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use newsloom_cluster::cosine_similarity;
use newsloom_core::{
    new_v7, payload_hash, Article, ArticleRepository, ArticleStoryLink, CreateArticleRequest,
    CreateStoryRequest, Error, Job, JobRepository, JobStatus, JobType, LifecycleConfig,
    LifecycleSweepReport, MergeAudit, MergeOutcome, QueueStats, Result, Story, StoryCandidate,
    StoryRepository, StoryState,
};

// =============================================================================
// JOB QUEUE FAKE
// =============================================================================

#[derive(Default)]
pub struct InMemoryJobRepo {
    pub jobs: Mutex<Vec<Job>>,
}

impl InMemoryJobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, id: Uuid) -> Job {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .expect("job")
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepo {
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let hash = payload_hash(payload.as_ref());
        let mut jobs = self.jobs.lock().unwrap();

        if let Some(existing) = jobs
            .iter()
            .find(|j| j.job_type == job_type && j.payload_hash == hash && !j.status.is_terminal())
        {
            return Ok(existing.id);
        }

        let job = Job {
            id: new_v7(),
            job_type,
            status: JobStatus::Pending,
            priority,
            payload,
            payload_hash: hash,
            result: None,
            error_message: None,
            attempts: 0,
            max_attempts: 3,
            run_at,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        let id = job.id;
        jobs.push(job);
        Ok(id)
    }

    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>> {
        self.claim_next_for_types(std::slice::from_ref(&job_type))
            .await
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();

        let mut runnable: Vec<&mut Job> = jobs
            .iter_mut()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.run_at <= now
                    && (job_types.is_empty() || job_types.contains(&j.job_type))
            })
            .collect();
        runnable.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.run_at.cmp(&b.run_at))
                .then(a.created_at.cmp(&b.created_at))
        });

        if let Some(job) = runnable.into_iter().next() {
            job.status = JobStatus::Processing;
            job.started_at = Some(now);
            job.attempts += 1;
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Completed;
            job.result = result;
            job.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str, retryable: bool) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.error_message = Some(error.to_string());
            if retryable && job.attempts < job.max_attempts {
                // Immediate re-queue keeps the tests fast; the production
                // implementation applies exponential backoff here.
                job.status = JobStatus::Pending;
                job.started_at = None;
            } else {
                job.status = JobStatus::Failed;
                job.finished_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == job_id).cloned())
    }

    async fn reset_stuck(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - older_than;
        let mut count = 0;
        let mut jobs = self.jobs.lock().unwrap();
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Processing
                && job.started_at.map(|s| s < cutoff).unwrap_or(false)
            {
                job.status = JobStatus::Pending;
                job.started_at = None;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn runnable_count(&self, job_type: JobType) -> Result<i64> {
        let now = Utc::now();
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending && j.job_type == job_type && j.run_at <= now)
            .count() as i64)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let jobs = self.jobs.lock().unwrap();
        Ok(QueueStats {
            pending: jobs.iter().filter(|j| j.status == JobStatus::Pending).count() as i64,
            processing: jobs.iter().filter(|j| j.status == JobStatus::Processing).count() as i64,
            completed_last_hour: jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .count() as i64,
            failed_last_hour: jobs.iter().filter(|j| j.status == JobStatus::Failed).count()
                as i64,
            total: jobs.len() as i64,
        })
    }
}

// =============================================================================
// ARTICLE FAKE
// =============================================================================

#[derive(Default)]
pub struct InMemoryArticleRepo {
    pub articles: Mutex<HashMap<Uuid, Article>>,
    pub links: Mutex<HashMap<Uuid, Uuid>>,
}

impl InMemoryArticleRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_article(&self, article: Article) {
        self.articles.lock().unwrap().insert(article.id, article);
    }

    pub fn article(&self, id: Uuid) -> Article {
        self.articles.lock().unwrap().get(&id).cloned().expect("article")
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepo {
    async fn insert(&self, req: CreateArticleRequest) -> Result<Uuid> {
        let mut articles = self.articles.lock().unwrap();
        if let Some(existing) = articles.values().find(|a| a.dedup_key == req.dedup_key) {
            return Ok(existing.id);
        }
        let article = Article {
            id: new_v7(),
            dedup_key: req.dedup_key,
            title: req.title,
            source: req.source,
            category: req.category,
            published_at: req.published_at,
            entity_ids: vec![],
            embedding: None,
            created_at: Utc::now(),
        };
        let id = article.id;
        articles.insert(id, article);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.articles.lock().unwrap().get(&id).cloned())
    }

    async fn set_entities(&self, id: Uuid, entity_ids: &[String]) -> Result<()> {
        let mut articles = self.articles.lock().unwrap();
        let article = articles.get_mut(&id).ok_or(Error::ArticleNotFound(id))?;
        article.entity_ids = entity_ids.to_vec();
        Ok(())
    }

    async fn set_embedding(&self, id: Uuid, embedding: &Vector) -> Result<()> {
        let mut articles = self.articles.lock().unwrap();
        let article = articles.get_mut(&id).ok_or(Error::ArticleNotFound(id))?;
        article.embedding = Some(embedding.clone());
        Ok(())
    }

    async fn current_story(&self, article_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.links.lock().unwrap().get(&article_id).copied())
    }
}

// =============================================================================
// STORY FAKE
// =============================================================================

#[derive(Default)]
pub struct InMemoryStoryRepo {
    pub stories: Mutex<HashMap<Uuid, Story>>,
    pub links: Mutex<Vec<ArticleStoryLink>>,
    pub article_embeddings: Mutex<HashMap<Uuid, Option<Vector>>>,
}

impl InMemoryStoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_story(&self, story: Story) {
        self.stories.lock().unwrap().insert(story.id, story);
    }

    pub fn story(&self, id: Uuid) -> Story {
        self.stories.lock().unwrap().get(&id).cloned().expect("story")
    }

    pub fn all_stories(&self) -> Vec<Story> {
        self.stories.lock().unwrap().values().cloned().collect()
    }

    pub fn register_embedding(&self, article_id: Uuid, embedding: Option<Vector>) {
        self.article_embeddings
            .lock()
            .unwrap()
            .insert(article_id, embedding);
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
        Ok(())
    }

    async fn lifecycle_sweep(&self, config: &LifecycleConfig) -> Result<LifecycleSweepReport> {
        let now = Utc::now();
        let mut report = LifecycleSweepReport::default();
        let mut stories = self.stories.lock().unwrap();
        for story in stories.values_mut() {
            if story.state.is_open()
                && now - story.last_updated_at > Duration::hours(config.close_after_hours)
            {
                story.state = StoryState::Closed;
                report.closed += 1;
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
            return Err(Error::InvalidInput("winner closed".into()));
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
        if let Some(winner) = stories.get_mut(&outcome.winner_id) {
            winner.member_count += repointed as i32;
            winner.last_updated_at = now;
        }
        if let Some(loser) = stories.get_mut(&outcome.loser_id) {
            loser.state = StoryState::Closed;
            loser.member_count = 0;
        }

        Ok(MergeAudit {
            id: new_v7(),
            winner_id: outcome.winner_id,
            loser_id: outcome.loser_id,
            similarity: outcome.similarity,
            margin: outcome.margin,
            tier: outcome.tier,
            signal: outcome.signal,
            repointed_links: repointed,
            decided_at: now,
        })
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
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.story_id == story_id)
            .cloned()
            .collect())
    }
}
