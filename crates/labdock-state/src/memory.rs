//! In-memory catalog store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use labdock_core::{Lesson, LiveEndpoint, LiveLesson, LiveLessonStatus, VerificationTask};

use crate::error::{Result, StateError};
use crate::store::CatalogStore;

/// DashMap-backed [`CatalogStore`].
///
/// Lessons are seeded at construction and never change afterwards.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lessons: DashMap<String, Lesson>,
    live_lessons: DashMap<String, LiveLesson>,
    verifications: DashMap<String, VerificationTask>,
}

impl MemoryStore {
    /// Creates a store seeded with the given lesson catalog.
    pub fn new(lessons: impl IntoIterator<Item = Lesson>) -> Self {
        let store = Self::default();
        for lesson in lessons {
            store.lessons.insert(lesson.slug.clone(), lesson);
        }
        store
    }

    fn with_live_lesson<F>(&self, id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut LiveLesson),
    {
        let mut entry = self
            .live_lessons
            .get_mut(id)
            .ok_or_else(|| StateError::LiveLessonNotFound(id.to_string()))?;
        mutate(&mut entry);
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_lesson(&self, slug: &str) -> Result<Lesson> {
        self.lessons
            .get(slug)
            .map(|l| l.clone())
            .ok_or_else(|| StateError::LessonNotFound(slug.to_string()))
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>> {
        Ok(self.lessons.iter().map(|l| l.clone()).collect())
    }

    async fn get_live_lesson(&self, id: &str) -> Result<LiveLesson> {
        self.live_lessons
            .get(id)
            .map(|l| l.clone())
            .ok_or_else(|| StateError::LiveLessonNotFound(id.to_string()))
    }

    async fn create_live_lesson(&self, ll: LiveLesson) -> Result<()> {
        match self.live_lessons.entry(ll.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StateError::LiveLessonExists(ll.id))
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(ll);
                Ok(())
            }
        }
    }

    async fn list_live_lessons(&self) -> Result<Vec<LiveLesson>> {
        Ok(self.live_lessons.iter().map(|l| l.clone()).collect())
    }

    async fn delete_live_lesson(&self, id: &str) -> Result<()> {
        self.live_lessons
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StateError::LiveLessonNotFound(id.to_string()))
    }

    async fn update_live_lesson_status(&self, id: &str, status: LiveLessonStatus) -> Result<()> {
        self.with_live_lesson(id, |ll| ll.status = status)
    }

    async fn update_live_lesson_stage(&self, id: &str, stage: usize) -> Result<()> {
        self.with_live_lesson(id, |ll| ll.current_stage = stage)
    }

    async fn update_live_lesson_error(&self, id: &str, error: bool) -> Result<()> {
        self.with_live_lesson(id, |ll| ll.error = error)
    }

    async fn update_live_lesson_endpoint_ip(
        &self,
        id: &str,
        endpoint: &str,
        ip: &str,
    ) -> Result<()> {
        self.with_live_lesson(id, |ll| {
            if let Some(ep) = ll.endpoints.get_mut(endpoint) {
                ep.host = ip.to_string();
            }
        })
    }

    async fn upsert_live_lesson_endpoint(&self, id: &str, endpoint: LiveEndpoint) -> Result<()> {
        self.with_live_lesson(id, |ll| {
            ll.endpoints.insert(endpoint.name.clone(), endpoint);
        })
    }

    async fn update_live_lesson_tests(&self, id: &str, healthy: usize, total: usize) -> Result<()> {
        self.with_live_lesson(id, |ll| {
            ll.healthy_tests = healthy;
            ll.total_tests = total;
        })
    }

    async fn update_live_lesson_interaction(&self, id: &str, when: DateTime<Utc>) -> Result<()> {
        self.with_live_lesson(id, |ll| ll.last_interaction_at = when)
    }

    async fn get_verification_task(&self, id: &str) -> Result<VerificationTask> {
        self.verifications
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| StateError::VerificationNotFound(id.to_string()))
    }

    async fn put_verification_task(&self, task: VerificationTask) -> Result<()> {
        self.verifications.insert(task.id(), task);
        Ok(())
    }

    async fn delete_verification_task(&self, id: &str) -> Result<()> {
        self.verifications
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StateError::VerificationNotFound(id.to_string()))
    }

    async fn list_verification_tasks(&self) -> Result<Vec<VerificationTask>> {
        Ok(self.verifications.iter().map(|t| t.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lesson(slug: &str) -> Lesson {
        Lesson {
            slug: slug.to_string(),
            name: slug.to_string(),
            stages: vec![],
            endpoints: vec![],
            connections: vec![],
            prereqs: vec![],
        }
    }

    fn live_lesson(id: &str) -> LiveLesson {
        LiveLesson::new(id, "s1", "bgp-basics", 0, BTreeMap::new(), Utc::now())
    }

    #[tokio::test]
    async fn lessons_are_seeded_and_read_only() {
        let store = MemoryStore::new(vec![lesson("bgp-basics"), lesson("ospf-areas")]);

        assert_eq!(store.get_lesson("bgp-basics").await.unwrap().slug, "bgp-basics");
        assert_eq!(store.list_lessons().await.unwrap().len(), 2);
        assert_eq!(
            store.get_lesson("nope").await,
            Err(StateError::LessonNotFound("nope".to_string()))
        );
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let store = MemoryStore::new(vec![]);

        store.create_live_lesson(live_lesson("bgp-basics-s1")).await.unwrap();
        let second = store.create_live_lesson(live_lesson("bgp-basics-s1")).await;

        assert_eq!(
            second,
            Err(StateError::LiveLessonExists("bgp-basics-s1".to_string()))
        );
        assert_eq!(store.list_live_lessons().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn field_updates_land_on_the_record() {
        let store = MemoryStore::new(vec![]);
        store.create_live_lesson(live_lesson("ll-1")).await.unwrap();

        store
            .update_live_lesson_status("ll-1", LiveLessonStatus::Booting)
            .await
            .unwrap();
        store.update_live_lesson_stage("ll-1", 2).await.unwrap();
        store.update_live_lesson_error("ll-1", true).await.unwrap();
        store.update_live_lesson_tests("ll-1", 1, 2).await.unwrap();

        let ll = store.get_live_lesson("ll-1").await.unwrap();
        assert_eq!(ll.status, LiveLessonStatus::Booting);
        assert_eq!(ll.current_stage, 2);
        assert!(ll.error);
        assert_eq!((ll.healthy_tests, ll.total_tests), (1, 2));
    }

    #[tokio::test]
    async fn updates_on_missing_records_fail() {
        let store = MemoryStore::new(vec![]);
        let err = store
            .update_live_lesson_status("ghost", LiveLessonStatus::Ready)
            .await;
        assert_eq!(err, Err(StateError::LiveLessonNotFound("ghost".to_string())));

        assert!(store.delete_live_lesson("ghost").await.is_err());
    }

    #[tokio::test]
    async fn verification_tasks_round_trip() {
        let store = MemoryStore::new(vec![]);
        let task = VerificationTask::started("ll-1", 1);
        let id = task.id();

        store.put_verification_task(task).await.unwrap();
        assert!(store.get_verification_task(&id).await.unwrap().working);

        store.delete_verification_task(&id).await.unwrap();
        assert_eq!(
            store.get_verification_task(&id).await,
            Err(StateError::VerificationNotFound(id))
        );
    }
}
