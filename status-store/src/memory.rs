use crate::StatusStore;
use async_trait::async_trait;
use chrono::Utc;
use radar_core::{
    AnalysisReport, CoreError, RequestState, RequestStatus, StatusStoreError,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// In-process status store for tests and single-instance dev deployments.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<String, RequestStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate<F>(&self, request_id: &str, apply: F) -> Result<RequestStatus, CoreError>
    where
        F: FnOnce(&mut RequestStatus),
    {
        let mut records = self.records.write().await;
        let record = records.get_mut(request_id).ok_or_else(|| {
            CoreError::StatusStore(StatusStoreError::RecordNotFound {
                request_id: request_id.to_string(),
            })
        })?;

        if record.state.is_terminal() {
            warn!(
                "ignoring status mutation for request {} already in terminal state {}",
                request_id, record.state
            );
            return Ok(record.clone());
        }

        apply(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn create_request(
        &self,
        targets: &[String],
        keywords: &[String],
    ) -> Result<RequestStatus, CoreError> {
        let now = Utc::now();
        let record = RequestStatus {
            id: Uuid::new_v4().to_string(),
            state: RequestState::Pending,
            message: "Request created".to_string(),
            progress: 0,
            targets: targets.to_vec(),
            keywords: keywords.to_vec(),
            report: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        info!(
            "created request {} for targets: [{}]",
            record.id,
            targets.join(", ")
        );
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_status(
        &self,
        request_id: &str,
        state: RequestState,
        message: &str,
        progress: u8,
    ) -> Result<RequestStatus, CoreError> {
        let record = self
            .mutate(request_id, |record| {
                record.state = state;
                record.message = message.to_string();
                record.progress = progress.min(100);
            })
            .await?;
        info!(
            "updated request {} status: {} ({}%) - {}",
            request_id, record.state, record.progress, record.message
        );
        Ok(record)
    }

    async fn mark_completed(
        &self,
        request_id: &str,
        report: AnalysisReport,
    ) -> Result<RequestStatus, CoreError> {
        let record = self
            .mutate(request_id, |record| {
                record.state = RequestState::Completed;
                record.message = "Analysis completed successfully".to_string();
                record.progress = 100;
                record.report = Some(report);
            })
            .await?;
        info!("completed request {}", request_id);
        Ok(record)
    }

    async fn mark_failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> Result<RequestStatus, CoreError> {
        let record = self
            .mutate(request_id, |record| {
                record.state = RequestState::Failed;
                record.message = "Analysis failed".to_string();
                record.error = Some(error_message.to_string());
            })
            .await?;
        error!("failed request {}: {}", request_id, error_message);
        Ok(record)
    }

    async fn get_request_status(
        &self,
        request_id: &str,
    ) -> Result<Option<RequestStatus>, CoreError> {
        Ok(self.records.read().await.get(request_id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RequestStatus>, CoreError> {
        let records = self.records.read().await;
        let mut recent: Vec<RequestStatus> = records.values().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_parts() -> (Vec<String>, Vec<String>) {
        (
            vec!["startups".to_string()],
            vec!["SaaS".to_string()],
        )
    }

    fn empty_report(targets: &[String], keywords: &[String]) -> AnalysisReport {
        AnalysisReport {
            targets: targets.to_vec(),
            keywords: keywords.to_vec(),
            total_posts: 0,
            filtered_posts: 0,
            post_results: Vec::new(),
            comment_results: Vec::new(),
            post_match_count: 0,
            comment_match_count: 0,
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn lifecycle_happy_path() {
        let store = MemoryStatusStore::new();
        let (targets, keywords) = request_parts();

        let record = store.create_request(&targets, &keywords).await.unwrap();
        assert_eq!(record.state, RequestState::Pending);
        assert_eq!(record.progress, 0);

        let record = store
            .update_status(&record.id, RequestState::InProgress, "Fetching posts", 10)
            .await
            .unwrap();
        assert_eq!(record.state, RequestState::InProgress);
        assert_eq!(record.progress, 10);

        let record = store
            .mark_completed(&record.id, empty_report(&targets, &keywords))
            .await
            .unwrap();
        assert_eq!(record.state, RequestState::Completed);
        assert_eq!(record.progress, 100);
        assert!(record.report.is_some());
    }

    #[tokio::test]
    async fn terminal_states_do_not_transition() {
        let store = MemoryStatusStore::new();
        let (targets, keywords) = request_parts();
        let record = store.create_request(&targets, &keywords).await.unwrap();
        store.mark_failed(&record.id, "upstream exploded").await.unwrap();

        let after = store
            .update_status(&record.id, RequestState::InProgress, "restarting", 10)
            .await
            .unwrap();
        assert_eq!(after.state, RequestState::Failed);
        assert_eq!(after.error.as_deref(), Some("upstream exploded"));
    }

    #[tokio::test]
    async fn unknown_id_is_an_error_for_mutation_and_none_for_lookup() {
        let store = MemoryStatusStore::new();
        assert!(store
            .update_status("missing", RequestState::InProgress, "x", 1)
            .await
            .is_err());
        assert!(store.get_request_status("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_bounded() {
        let store = MemoryStatusStore::new();
        let (targets, keywords) = request_parts();
        let mut ids = Vec::new();
        for _ in 0..5 {
            // Distinct creation instants keep the ordering deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            ids.push(store.create_request(&targets, &keywords).await.unwrap().id);
        }

        let recent = store.list_recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, ids[4]);
        assert_eq!(recent[1].id, ids[3]);
        assert_eq!(recent[2].id, ids[2]);
    }
}
