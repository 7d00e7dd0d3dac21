use crate::StatusStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radar_core::{
    AnalysisReport, CoreError, RequestState, RequestStatus, StatusStoreError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{error, info, warn};
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS request_status (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    message TEXT NOT NULL,
    progress INTEGER NOT NULL,
    targets TEXT NOT NULL,
    keywords TEXT NOT NULL,
    report TEXT,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQLite-backed status store. Reports and string lists are stored as JSON
/// text; timestamps as RFC3339.
pub struct SqliteStatusStore {
    pool: SqlitePool,
}

impl SqliteStatusStore {
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sql_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(sql_err)?;

        let store = Self { pool };
        store.init().await?;
        info!("status store connected at {}", url);
        Ok(store)
    }

    async fn init(&self) -> Result<(), CoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(())
    }

    async fn fetch(&self, request_id: &str) -> Result<Option<RequestStatus>, CoreError> {
        let row = sqlx::query("SELECT * FROM request_status WHERE id = ?")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_err)?;
        row.map(row_to_status).transpose()
    }

    async fn fetch_required(&self, request_id: &str) -> Result<RequestStatus, CoreError> {
        self.fetch(request_id).await?.ok_or_else(|| {
            CoreError::StatusStore(StatusStoreError::RecordNotFound {
                request_id: request_id.to_string(),
            })
        })
    }
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
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

        sqlx::query(
            r#"
            INSERT INTO request_status (
                id, state, message, progress, targets, keywords,
                report, error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.state.as_str())
        .bind(&record.message)
        .bind(record.progress as i64)
        .bind(serde_json::to_string(&record.targets)?)
        .bind(serde_json::to_string(&record.keywords)?)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;

        info!(
            "created request {} for targets: [{}]",
            record.id,
            targets.join(", ")
        );
        Ok(record)
    }

    async fn update_status(
        &self,
        request_id: &str,
        state: RequestState,
        message: &str,
        progress: u8,
    ) -> Result<RequestStatus, CoreError> {
        let current = self.fetch_required(request_id).await?;
        if current.state.is_terminal() {
            warn!(
                "ignoring status mutation for request {} already in terminal state {}",
                request_id, current.state
            );
            return Ok(current);
        }

        sqlx::query(
            "UPDATE request_status SET state = ?, message = ?, progress = ?, updated_at = ? WHERE id = ?",
        )
        .bind(state.as_str())
        .bind(message)
        .bind(progress.min(100) as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(request_id)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;

        let record = self.fetch_required(request_id).await?;
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
        let current = self.fetch_required(request_id).await?;
        if current.state.is_terminal() {
            warn!(
                "ignoring completion for request {} already in terminal state {}",
                request_id, current.state
            );
            return Ok(current);
        }

        sqlx::query(
            r#"
            UPDATE request_status
            SET state = ?, message = 'Analysis completed successfully',
                progress = 100, report = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(RequestState::Completed.as_str())
        .bind(serde_json::to_string(&report)?)
        .bind(Utc::now().to_rfc3339())
        .bind(request_id)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;

        info!("completed request {}", request_id);
        self.fetch_required(request_id).await
    }

    async fn mark_failed(
        &self,
        request_id: &str,
        error_message: &str,
    ) -> Result<RequestStatus, CoreError> {
        let current = self.fetch_required(request_id).await?;
        if current.state.is_terminal() {
            warn!(
                "ignoring failure for request {} already in terminal state {}",
                request_id, current.state
            );
            return Ok(current);
        }

        sqlx::query(
            r#"
            UPDATE request_status
            SET state = ?, message = 'Analysis failed', error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(RequestState::Failed.as_str())
        .bind(error_message)
        .bind(Utc::now().to_rfc3339())
        .bind(request_id)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;

        error!("failed request {}: {}", request_id, error_message);
        self.fetch_required(request_id).await
    }

    async fn get_request_status(
        &self,
        request_id: &str,
    ) -> Result<Option<RequestStatus>, CoreError> {
        self.fetch(request_id).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RequestStatus>, CoreError> {
        let rows = sqlx::query("SELECT * FROM request_status ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_err)?;
        rows.into_iter().map(row_to_status).collect()
    }
}

fn sql_err(error: sqlx::Error) -> CoreError {
    CoreError::StatusStore(StatusStoreError::Sql(error))
}

fn corrupt(details: impl Into<String>) -> CoreError {
    CoreError::StatusStore(StatusStoreError::CorruptRecord {
        details: details.into(),
    })
}

fn row_to_status(row: SqliteRow) -> Result<RequestStatus, CoreError> {
    let state_raw: String = row.try_get("state").map_err(sql_err)?;
    let state = state_raw
        .parse::<RequestState>()
        .map_err(|details| corrupt(details))?;

    let targets_raw: String = row.try_get("targets").map_err(sql_err)?;
    let keywords_raw: String = row.try_get("keywords").map_err(sql_err)?;
    let report_raw: Option<String> = row.try_get("report").map_err(sql_err)?;
    let progress: i64 = row.try_get("progress").map_err(sql_err)?;

    let report: Option<AnalysisReport> = match report_raw {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };

    Ok(RequestStatus {
        id: row.try_get("id").map_err(sql_err)?,
        state,
        message: row.try_get("message").map_err(sql_err)?,
        progress: progress.clamp(0, 100) as u8,
        targets: serde_json::from_str(&targets_raw)?,
        keywords: serde_json::from_str(&keywords_raw)?,
        report,
        error: row.try_get("error").map_err(sql_err)?,
        created_at: parse_timestamp(row.try_get::<String, _>("created_at").map_err(sql_err)?)?,
        updated_at: parse_timestamp(row.try_get::<String, _>("updated_at").map_err(sql_err)?)?,
    })
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("bad timestamp {raw}: {e}")))
}
