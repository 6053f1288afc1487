//! Outbound platform calls used by the raid core.
//!
//! The core only talks to the messaging platform through these traits, so the
//! whole pipeline runs against in-memory fakes in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::TypedCache;
use crate::error::Result;

/// Moderation side effects.
#[async_trait]
pub trait ModerationApi: Send + Sync {
    /// Ban a member. `until = None` bans forever.
    async fn ban_member(
        &self,
        chat_id: i64,
        user_id: u64,
        revoke_messages: bool,
        until: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;

    /// Send an HTML message and return its ID.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i32>;

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()>;
}

/// Profile lookups used by the heuristic checks.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn profile_photo_count(&self, user_id: u64) -> Result<u32>;
}

/// Profile lookup that remembers successful answers for a while.
///
/// Failures are never cached, so a transient error does not stick.
pub struct CachedProfileLookup {
    inner: Arc<dyn ProfileLookup>,
    cache: TypedCache<u64, u32>,
}

impl CachedProfileLookup {
    pub fn new(inner: Arc<dyn ProfileLookup>) -> Self {
        Self {
            inner,
            cache: TypedCache::new("profile_photos", 20_000, Duration::from_secs(600)),
        }
    }
}

#[async_trait]
impl ProfileLookup for CachedProfileLookup {
    async fn profile_photo_count(&self, user_id: u64) -> Result<u32> {
        if let Some(count) = self.cache.get(&user_id) {
            debug!("Profile photo cache hit for user {}", user_id);
            return Ok(count);
        }

        let count = self.inner.profile_photo_count(user_id).await?;
        self.cache.insert(user_id, count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::raid::testing::FakePlatform;

    #[tokio::test]
    async fn test_cached_lookup_hits_platform_once() {
        let mut fake = FakePlatform::default();
        fake.photos.insert(1, 3);
        let fake = Arc::new(fake);
        let lookup = CachedProfileLookup::new(fake.clone());

        assert_eq!(lookup.profile_photo_count(1).await.unwrap(), 3);
        assert_eq!(lookup.profile_photo_count(1).await.unwrap(), 3);
        assert_eq!(fake.lookups.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_lookup_does_not_cache_errors() {
        let fake = Arc::new(FakePlatform {
            failing_lookups: HashSet::from([9]),
            ..Default::default()
        });
        let lookup = CachedProfileLookup::new(fake.clone());

        assert!(lookup.profile_photo_count(9).await.is_err());
        assert!(lookup.profile_photo_count(9).await.is_err());
        assert_eq!(fake.lookups.lock().len(), 2);
    }
}
