pub mod memory;
pub mod sqlite;

pub use memory::MemoryStatusStore;
pub use sqlite::SqliteStatusStore;

use async_trait::async_trait;
use radar_core::{AnalysisReport, CoreError, RequestState, RequestStatus};

/// Durable record of a request's lifecycle, mutated only by the
/// orchestrator. Terminal states never transition further; stores return
/// the unchanged record when asked to move one. Records are never deleted
/// by the core.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn create_request(
        &self,
        targets: &[String],
        keywords: &[String],
    ) -> Result<RequestStatus, CoreError>;

    async fn update_status(
        &self,
        request_id: &str,
        state: RequestState,
        message: &str,
        progress: u8,
    ) -> Result<RequestStatus, CoreError>;

    async fn mark_completed(
        &self,
        request_id: &str,
        report: AnalysisReport,
    ) -> Result<RequestStatus, CoreError>;

    async fn mark_failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> Result<RequestStatus, CoreError>;

    async fn get_request_status(
        &self,
        request_id: &str,
    ) -> Result<Option<RequestStatus>, CoreError>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<RequestStatus>, CoreError>;
}
