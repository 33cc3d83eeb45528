//! External enrichment provider traits.
//!
//! Embeddings and entity extraction are consumed as black boxes. The
//! implementations (HTTP clients in `newsloom-jobs`) must carry a request
//! timeout and a bounded response cap; violations surface as retryable
//! errors, never hangs.

use async_trait::async_trait;

use crate::models::EntityRef;
use crate::Result;

/// Produces a fixed-length embedding vector per text.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed one text. The returned vector always has `dimension()`
    /// elements.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The fixed output dimension.
    fn dimension(&self) -> usize;
}

/// Extracts normalized entity references from text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract entities. Implementations return raw upstream output;
    /// callers validate with [`EntityRef::is_valid`] at the boundary.
    async fn extract(&self, text: &str) -> Result<Vec<EntityRef>>;
}
