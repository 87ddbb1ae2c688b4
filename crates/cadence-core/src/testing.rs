//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cadence_types::api_call::ApiCallRecord;
use cadence_types::conversation::ConversationRecord;
use cadence_types::engagement::{
    EngagementEvent, EngagementKind, EngagementPage, EngagementQuery, PostRequest, PostedItem,
};
use cadence_types::error::{ApiError, GenerationError, RepositoryError};
use chrono::{DateTime, Utc};

use crate::client::SocialApi;
use crate::generation::{ContentGenerator, GenerationContext};
use crate::repository::{ApiCallLog, BacklogFilter, ConversationRepository, EngagementRepository};

pub fn event(id: &str, kind: EngagementKind, actor: &str) -> EngagementEvent {
    EngagementEvent {
        external_id: id.to_string(),
        kind,
        actor_id: format!("id-{actor}"),
        actor_handle: actor.to_string(),
        text: Some(format!("@agent hello from {actor}")),
        created_at: Utc::now(),
        conversation_id: None,
        parent_event_id: None,
    }
}

pub fn mention(id: &str, actor: &str) -> EngagementEvent {
    event(id, EngagementKind::Mention, actor)
}

#[derive(Clone, Default)]
pub struct InMemoryApiCallLog {
    pub entries: Arc<Mutex<Vec<ApiCallRecord>>>,
}

impl InMemoryApiCallLog {
    pub fn entries(&self) -> Vec<ApiCallRecord> {
        self.entries.lock().unwrap().clone()
    }
}

impl ApiCallLog for InMemoryApiCallLog {
    async fn record(&self, entry: &ApiCallRecord) -> Result<(), RepositoryError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ApiCallRecord>, RepositoryError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64, RepositoryError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().filter(|e| e.created_at >= since).count() as i64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryConversationRepository {
    pub records: Arc<Mutex<Vec<ConversationRecord>>>,
}

impl InMemoryConversationRepository {
    pub fn all(&self) -> Vec<ConversationRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ConversationRepository for InMemoryConversationRepository {
    async fn exists(&self, source_event_id: &str) -> Result<bool, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().any(|r| r.source_event_id == source_event_id))
    }

    async fn insert(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.source_event_id == record.source_event_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "source event '{}' already recorded",
                record.source_event_id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn get(&self, source_event_id: &str) -> Result<Option<ConversationRecord>, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .find(|r| r.source_event_id == source_event_id)
            .cloned())
    }

    async fn recent_for_actor(
        &self,
        actor_id: &str,
        limit: i64,
    ) -> Result<Vec<ConversationRecord>, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.actor_id == actor_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ConversationRecord>, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn count_processed(&self) -> Result<i64, RepositoryError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().filter(|r| r.is_processed).count() as i64)
    }
}

#[derive(Clone)]
pub struct InMemoryEngagementRepository {
    pub events: Arc<Mutex<Vec<EngagementEvent>>>,
    pub cursors: Arc<Mutex<HashMap<String, String>>>,
    pub failures: Arc<Mutex<HashMap<String, u32>>>,
    conversations: InMemoryConversationRepository,
}

impl InMemoryEngagementRepository {
    pub fn new(conversations: InMemoryConversationRepository) -> Self {
        Self {
            events: Arc::default(),
            cursors: Arc::default(),
            failures: Arc::default(),
            conversations,
        }
    }

    pub fn cursor(&self, source: &str) -> Option<String> {
        self.cursors.lock().unwrap().get(source).cloned()
    }

    pub fn failures(&self, external_id: &str) -> u32 {
        self.failures
            .lock()
            .unwrap()
            .get(external_id)
            .copied()
            .unwrap_or(0)
    }
}

impl EngagementRepository for InMemoryEngagementRepository {
    async fn save_events(&self, events: &[EngagementEvent]) -> Result<u64, RepositoryError> {
        let mut stored = self.events.lock().unwrap();
        let mut inserted = 0;
        for event in events {
            if !stored.iter().any(|e| e.external_id == event.external_id) {
                stored.push(event.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn get(&self, external_id: &str) -> Result<Option<EngagementEvent>, RepositoryError> {
        let stored = self.events.lock().unwrap();
        Ok(stored.iter().find(|e| e.external_id == external_id).cloned())
    }

    async fn unanswered(&self, filter: &BacklogFilter) -> Result<Vec<EngagementEvent>, RepositoryError> {
        let answered: Vec<String> = self
            .conversations
            .all()
            .into_iter()
            .map(|r| r.source_event_id)
            .collect();
        let failures = self.failures.lock().unwrap().clone();
        let mut stored: Vec<EngagementEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.created_at > filter.since
                    && filter.kinds.contains(&e.kind)
                    && !answered.contains(&e.external_id)
                    && failures.get(&e.external_id).copied().unwrap_or(0) < filter.max_failures
            })
            .cloned()
            .collect();
        stored.sort_by_key(|e| e.created_at);
        stored.truncate(filter.limit as usize);
        Ok(stored)
    }

    async fn record_failure(&self, external_id: &str, _error: &str) -> Result<u32, RepositoryError> {
        if !self
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.external_id == external_id)
        {
            return Err(RepositoryError::NotFound);
        }
        let mut failures = self.failures.lock().unwrap();
        let count = failures.entry(external_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn load_cursor(&self, source: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.cursor(source))
    }

    async fn save_cursor(&self, source: &str, since_id: &str) -> Result<(), RepositoryError> {
        self.cursors
            .lock()
            .unwrap()
            .insert(source.to_string(), since_id.to_string());
        Ok(())
    }
}

/// Platform fake with queued responses. Unqueued searches return an empty
/// page; unqueued posts succeed with sequential ids.
#[derive(Clone, Default)]
pub struct ScriptedSocialApi {
    pub search_results: Arc<Mutex<VecDeque<Result<EngagementPage, ApiError>>>>,
    pub post_results: Arc<Mutex<VecDeque<Result<PostedItem, ApiError>>>>,
    pub searches: Arc<Mutex<Vec<EngagementQuery>>>,
    pub posts: Arc<Mutex<Vec<PostRequest>>>,
}

impl ScriptedSocialApi {
    pub fn push_search(&self, result: Result<EngagementPage, ApiError>) {
        self.search_results.lock().unwrap().push_back(result);
    }

    pub fn push_page(&self, events: Vec<EngagementEvent>) {
        self.push_search(Ok(EngagementPage {
            events,
            cursor: None,
        }));
    }

    pub fn push_post(&self, result: Result<PostedItem, ApiError>) {
        self.post_results.lock().unwrap().push_back(result);
    }

    pub fn posts(&self) -> Vec<PostRequest> {
        self.posts.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<EngagementQuery> {
        self.searches.lock().unwrap().clone()
    }
}

impl SocialApi for ScriptedSocialApi {
    async fn search(&self, query: &EngagementQuery) -> Result<EngagementPage, ApiError> {
        self.searches.lock().unwrap().push(query.clone());
        self.search_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(EngagementPage::default()))
    }

    async fn post(&self, request: &PostRequest) -> Result<PostedItem, ApiError> {
        let mut posts = self.posts.lock().unwrap();
        posts.push(request.clone());
        let n = posts.len();
        drop(posts);
        self.post_results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(PostedItem {
                id: format!("reply-{n}"),
            })
        })
    }
}

/// Generator returning a fixed result and counting calls.
pub struct StaticGenerator {
    name: String,
    result: Result<String, GenerationError>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticGenerator {
    pub fn ok(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            result: Ok(text.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: Err(GenerationError::Provider {
                provider: name.to_string(),
                message: "upstream unavailable".to_string(),
            }),
            calls: Arc::default(),
        }
    }
}

impl ContentGenerator for StaticGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _context: &GenerationContext) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
