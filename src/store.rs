use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Interview, NewInterview};

/// CRUD over interview records.
#[allow(async_fn_in_trait)]
pub trait InterviewStore {
    async fn list_interviews(&self) -> Result<Vec<Interview>>;

    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>>;

    /// The interview with exactly this respondent name and creation time.
    async fn find_by_respondent(
        &self,
        respondent_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Interview>>;

    async fn create_interview(&self, interview: NewInterview) -> Result<Interview>;

    async fn update_interview(&self, interview: &Interview) -> Result<()>;

    async fn delete_interview(&self, id: Uuid) -> Result<bool>;
}

#[derive(Debug, Default)]
pub struct MemoryInterviewStore {
    interviews: Mutex<Vec<Interview>>,
}

impl MemoryInterviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.interviews().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn interviews(&self) -> std::sync::MutexGuard<'_, Vec<Interview>> {
        self.interviews
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InterviewStore for MemoryInterviewStore {
    async fn list_interviews(&self) -> Result<Vec<Interview>> {
        let mut interviews = self.interviews().clone();
        interviews.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(interviews)
    }

    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>> {
        Ok(self.interviews().iter().find(|i| i.id == id).cloned())
    }

    async fn find_by_respondent(
        &self,
        respondent_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Option<Interview>> {
        Ok(self
            .interviews()
            .iter()
            .find(|i| {
                i.respondent_name.as_deref().unwrap_or("") == respondent_name
                    && i.created_at == created_at
            })
            .cloned())
    }

    async fn create_interview(&self, interview: NewInterview) -> Result<Interview> {
        let created = interview.into_interview(Uuid::new_v4());
        self.interviews().push(created.clone());
        Ok(created)
    }

    async fn update_interview(&self, interview: &Interview) -> Result<()> {
        let mut interviews = self.interviews();
        let slot = interviews
            .iter_mut()
            .find(|i| i.id == interview.id)
            .ok_or_else(|| Error::NotFound(format!("interview {}", interview.id)))?;
        *slot = interview.clone();
        Ok(())
    }

    async fn delete_interview(&self, id: Uuid) -> Result<bool> {
        let mut interviews = self.interviews();
        let before = interviews.len();
        interviews.retain(|i| i.id != id);
        Ok(interviews.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, InterviewAnswers};
    use chrono::TimeZone;

    fn new_interview(name: &str, created_at: DateTime<Utc>) -> NewInterview {
        NewInterview {
            is_interviewer: false,
            interviewer_name: None,
            respondent_name: Some(name.to_string()),
            respondent_department: None,
            answers: InterviewAnswers::default(),
            is_completed: false,
            completed_at: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let store = MemoryInterviewStore::new();
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let created = store.create_interview(new_interview("Ana", at)).await.unwrap();
        assert_eq!(store.len(), 1);

        let mut fetched = store.get_interview(created.id).await.unwrap().unwrap();
        fetched.answers.insert("f2_desempenho", Answer::from("4"));
        fetched.is_completed = true;
        store.update_interview(&fetched).await.unwrap();

        let reloaded = store.get_interview(created.id).await.unwrap().unwrap();
        assert!(reloaded.is_completed);
        assert_eq!(reloaded.answers.f2.len(), 1);

        assert!(store.delete_interview(created.id).await.unwrap());
        assert!(!store.delete_interview(created.id).await.unwrap());
        assert!(store.is_empty());
        assert!(store.update_interview(&reloaded).await.is_err());
    }

    #[tokio::test]
    async fn finds_by_exact_name_and_timestamp() {
        let store = MemoryInterviewStore::new();
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        store.create_interview(new_interview("Ana", at)).await.unwrap();

        assert!(store.find_by_respondent("Ana", at).await.unwrap().is_some());
        assert!(store.find_by_respondent("ana", at).await.unwrap().is_none());
        let later = at + chrono::Duration::seconds(1);
        assert!(store.find_by_respondent("Ana", later).await.unwrap().is_none());
    }
}
