//! SQLite-backed [`ActivityStore`]: one pooled connection guarded by a
//! write mutex (SQLite allows one writer at a time regardless of pool
//! size), reads go straight through the pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use oak_ci_domain::entities::{
    Activity, IndexedFile, Observation, PromptBatch, PromptBatchClassification, PromptBatchStatus,
    PromptSourceType, Session,
};
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::{ActivityStore, ObservationFilter, StaleRecoveryOutcome};
use oak_ci_domain::value_objects::{BatchId, ObservationId, SessionId};
#[cfg(test)]
use oak_ci_domain::entities::SessionStatus;
#[cfg(test)]
use oak_ci_domain::value_objects::ActivityId;

use super::migrations;
use super::rows;

/// Activities are appended individually but may be buffered here before a
/// background flush; kept small since spec.md §5 bounds the buffer at 500.
const ACTIVITY_BUFFER_LIMIT: usize = 500;

pub struct SqliteActivityStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    buffer: Mutex<Vec<Activity>>,
}

impl SqliteActivityStore {
    /// Open (creating if absent) the database at `path`, applying
    /// migrations before returning.
    pub async fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(store_err)?;
        migrations::run(&pool).await?;
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            buffer: Mutex::new(Vec::with_capacity(ACTIVITY_BUFFER_LIMIT)),
        })
    }

    async fn flush_locked(&self) -> Result<()> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for activity in buffer.drain(..) {
            insert_activity(&mut tx, &activity).await?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }
}

async fn insert_activity(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, activity: &Activity) -> Result<()> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO activities \
         (id, session_id, prompt_batch_id, tool_name, tool_input, tool_output_summary, \
          file_path, success, error_message, created_at, dedup_key) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(activity.id.as_uuid().to_string())
    .bind(activity.session_id.as_str())
    .bind(activity.prompt_batch_id.as_uuid().to_string())
    .bind(&activity.tool_name)
    .bind(serde_json::to_string(&activity.tool_input).map_err(Error::from)?)
    .bind(&activity.tool_output_summary)
    .bind(&activity.file_path)
    .bind(activity.success as i64)
    .bind(&activity.error_message)
    .bind(activity.created_at.to_rfc3339())
    .bind(&activity.dedup_key)
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;

    // `INSERT OR IGNORE` silently drops duplicate dedup_keys; only bump the
    // counters when a row actually landed, or a replayed activity double-counts.
    if result.rows_affected() == 1 {
        sqlx::query("UPDATE prompt_batches SET activity_count = activity_count + 1 WHERE id = ?1")
            .bind(activity.prompt_batch_id.as_uuid().to_string())
            .execute(&mut **tx)
            .await
            .map_err(store_err)?;
        sqlx::query("UPDATE sessions SET tool_count = tool_count + 1, last_activity_at = ?1 WHERE id = ?2")
            .bind(activity.created_at.to_rfc3339())
            .bind(activity.session_id.as_str())
            .execute(&mut **tx)
            .await
            .map_err(store_err)?;
    }
    Ok(())
}

fn store_err(e: sqlx::Error) -> Error {
    Error::Store { message: e.to_string() }
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    async fn create_session(&self, session: Session) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO sessions \
             (id, agent, project_root, started_at, ended_at, status, prompt_count, tool_count, \
              title, summary, current_prompt_batch_id, last_activity_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(session.id.as_str())
        .bind(&session.agent)
        .bind(&session.project_root)
        .bind(session.started_at.to_rfc3339())
        .bind(session.ended_at.map(|t| t.to_rfc3339()))
        .bind(rows::session_status_str(session.status))
        .bind(session.prompt_count)
        .bind(session.tool_count)
        .bind(&session.title)
        .bind(&session.summary)
        .bind(session.current_prompt_batch_id.map(|id| id.as_uuid().to_string()))
        .bind(session.started_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(rows::session_from_row).transpose()
    }

    async fn update_session(&self, session: Session) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "UPDATE sessions SET agent = ?1, project_root = ?2, status = ?3, prompt_count = ?4, \
             tool_count = ?5, title = ?6, summary = ?7, current_prompt_batch_id = ?8, ended_at = ?9 \
             WHERE id = ?10",
        )
        .bind(&session.agent)
        .bind(&session.project_root)
        .bind(rows::session_status_str(session.status))
        .bind(session.prompt_count)
        .bind(session.tool_count)
        .bind(&session.title)
        .bind(&session.summary)
        .bind(session.current_prompt_batch_id.map(|id| id.as_uuid().to_string()))
        .bind(session.ended_at.map(|t| t.to_rfc3339()))
        .bind(session.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(session)
    }

    async fn end_session(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE sessions SET status = 'completed', ended_at = ?1 WHERE id = ?2")
            .bind(now.to_rfc3339())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        drop(_guard);
        self.get_session(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("session {id}")))
    }

    async fn reactivate_if_needed(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Session> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE sessions SET status = 'active', ended_at = NULL, last_activity_at = ?1 \
                     WHERE id = ?2 AND status = 'completed'")
            .bind(now.to_rfc3339())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        drop(_guard);
        self.get_session(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("session {id}")))
    }

    async fn ensure_session_exists(
        &self,
        id: &SessionId,
        agent: &str,
        project_root: &str,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        if let Some(existing) = self.get_session(id).await? {
            return self.reactivate_if_needed(&existing.id, now).await;
        }
        self.create_session(Session::new(id.clone(), agent, project_root, now)).await
    }

    async fn delete_session_cascade(&self, id: &SessionId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn list_sessions(&self, agent: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Session>> {
        let rows = if let Some(agent) = agent {
            sqlx::query("SELECT * FROM sessions WHERE agent = ?1 ORDER BY started_at DESC LIMIT ?2 OFFSET ?3")
                .bind(agent)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query("SELECT * FROM sessions ORDER BY started_at DESC LIMIT ?1 OFFSET ?2")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(store_err)?;
        rows.iter().map(rows::session_from_row).collect()
    }

    async fn get_stale_sessions(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let cutoff = now - timeout;
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE status = 'active' AND last_activity_at < ?1",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(rows::session_from_row).collect()
    }

    async fn create_batch(
        &self,
        session_id: &SessionId,
        user_prompt: &str,
        source_type: PromptSourceType,
        plan_content: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PromptBatch> {
        let _guard = self.write_lock.lock().await;
        let next_number: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(prompt_number), 0) + 1 FROM prompt_batches WHERE session_id = ?1",
        )
        .bind(session_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        let mut batch = PromptBatch::new(
            BatchId::new(),
            session_id.clone(),
            next_number,
            user_prompt,
            source_type,
            now,
        );
        batch.plan_content = plan_content;

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query(
            "UPDATE prompt_batches SET status = ?1, ended_at = ?2 \
             WHERE session_id = ?3 AND status = ?4",
        )
        .bind(rows::batch_status_str(PromptBatchStatus::Completed))
        .bind(now.to_rfc3339())
        .bind(session_id.as_str())
        .bind(rows::batch_status_str(PromptBatchStatus::Active))
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "INSERT INTO prompt_batches \
             (id, session_id, prompt_number, user_prompt, started_at, ended_at, status, \
              activity_count, classification, source_type, plan_file_path, plan_content, plan_embedded) \
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 0, NULL, ?7, NULL, ?8, 0)",
        )
        .bind(batch.id.as_uuid().to_string())
        .bind(session_id.as_str())
        .bind(batch.prompt_number)
        .bind(&batch.user_prompt)
        .bind(batch.started_at.to_rfc3339())
        .bind(rows::batch_status_str(PromptBatchStatus::Active))
        .bind(rows::source_type_str(batch.source_type))
        .bind(&batch.plan_content)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "UPDATE sessions SET prompt_count = prompt_count + 1, current_prompt_batch_id = ?1, \
             last_activity_at = ?2 WHERE id = ?3",
        )
        .bind(batch.id.as_uuid().to_string())
        .bind(now.to_rfc3339())
        .bind(session_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(batch)
    }

    async fn get_batch(&self, id: &BatchId) -> Result<Option<PromptBatch>> {
        let row = sqlx::query("SELECT * FROM prompt_batches WHERE id = ?1")
            .bind(id.as_uuid().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(rows::batch_from_row).transpose()
    }

    async fn classify_batch(&self, batch_id: &BatchId, label: PromptBatchClassification) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE prompt_batches SET classification = ?1 WHERE id = ?2")
            .bind(rows::classification_str(label))
            .bind(batch_id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn set_plan_embedded(&self, batch_id: &BatchId, embedded: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE prompt_batches SET plan_embedded = ?1 WHERE id = ?2")
            .bind(embedded as i64)
            .bind(batch_id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn get_batches_needing_plan_embedding(&self) -> Result<Vec<PromptBatch>> {
        let rows = sqlx::query(
            "SELECT * FROM prompt_batches WHERE source_type = 'plan' \
             AND plan_content IS NOT NULL AND plan_content != '' AND plan_embedded = 0",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(rows::batch_from_row).collect()
    }

    async fn get_batches_needing_classification(&self, older_than: DateTime<Utc>) -> Result<Vec<PromptBatch>> {
        let rows = sqlx::query(
            "SELECT * FROM prompt_batches WHERE classification IS NULL AND started_at < ?1",
        )
        .bind(older_than.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(rows::batch_from_row).collect()
    }

    async fn get_batches_needing_extraction(&self) -> Result<Vec<PromptBatch>> {
        let rows = sqlx::query(
            "SELECT * FROM prompt_batches WHERE status = ?1 AND observations_extracted = 0",
        )
        .bind(rows::batch_status_str(PromptBatchStatus::Completed))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(rows::batch_from_row).collect()
    }

    async fn mark_observations_extracted(&self, batch_id: &BatchId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE prompt_batches SET observations_extracted = 1 WHERE id = ?1")
            .bind(batch_id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn list_batches_for_session(&self, session_id: &SessionId) -> Result<Vec<PromptBatch>> {
        let rows = sqlx::query(
            "SELECT * FROM prompt_batches WHERE session_id = ?1 ORDER BY prompt_number DESC",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(rows::batch_from_row).collect()
    }

    async fn list_plan_batches(
        &self,
        session_id: Option<&SessionId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PromptBatch>> {
        let rows = if let Some(session_id) = session_id {
            sqlx::query(
                "SELECT * FROM prompt_batches WHERE source_type = 'plan' AND session_id = ?1 \
                 ORDER BY started_at DESC LIMIT ?2 OFFSET ?3",
            )
            .bind(session_id.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                "SELECT * FROM prompt_batches WHERE source_type = 'plan' \
                 ORDER BY started_at DESC LIMIT ?1 OFFSET ?2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(store_err)?;
        rows.iter().map(rows::batch_from_row).collect()
    }

    async fn append_activity(&self, activity: Activity) -> Result<Activity> {
        if let Some(dedup_key) = &activity.dedup_key {
            let existing = sqlx::query(
                "SELECT * FROM activities WHERE prompt_batch_id = ?1 AND dedup_key = ?2",
            )
            .bind(activity.prompt_batch_id.as_uuid().to_string())
            .bind(dedup_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
            if let Some(row) = existing {
                return rows::activity_from_row(&row);
            }
        }

        let mut buffer = self.buffer.lock().await;
        buffer.push(activity.clone());
        let should_flush = buffer.len() >= ACTIVITY_BUFFER_LIMIT;
        drop(buffer);
        if should_flush {
            self.flush_activities().await?;
        }
        Ok(activity)
    }

    async fn flush_activities(&self) -> Result<()> {
        self.flush_locked().await
    }

    async fn list_activities_for_batch(&self, batch_id: &BatchId) -> Result<Vec<Activity>> {
        self.flush_locked().await?;
        let rows = sqlx::query("SELECT * FROM activities WHERE prompt_batch_id = ?1 ORDER BY created_at ASC")
            .bind(batch_id.as_uuid().to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(rows::activity_from_row).collect()
    }

    async fn add_observation(&self, observation: Observation) -> Result<Observation> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO observations \
             (id, session_id, prompt_batch_id, type, observation, context, tags, importance, \
              file_path, created_at, embedded, archived) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(observation.id.as_uuid().to_string())
        .bind(observation.session_id.as_str())
        .bind(observation.prompt_batch_id.map(|id| id.as_uuid().to_string()))
        .bind(rows::observation_type_str(observation.r#type))
        .bind(&observation.observation)
        .bind(&observation.context)
        .bind(serde_json::to_string(&observation.tags).map_err(Error::from)?)
        .bind(rows::importance_str(observation.importance))
        .bind(&observation.file_path)
        .bind(observation.created_at.to_rfc3339())
        .bind(observation.embedded as i64)
        .bind(observation.archived as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(observation)
    }

    async fn list_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>> {
        let mut sql = String::from("SELECT * FROM observations WHERE 1 = 1");
        if !filter.include_archived {
            sql.push_str(" AND archived = 0");
        }
        if filter.r#type.is_some() {
            sql.push_str(" AND type = ?");
        }
        if filter.tag.is_some() {
            sql.push_str(" AND tags LIKE ?");
        }
        if filter.start_date.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if filter.end_date.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(r#type) = filter.r#type {
            query = query.bind(rows::observation_type_str(r#type));
        }
        if let Some(tag) = &filter.tag {
            query = query.bind(format!("%\"{tag}\"%"));
        }
        if let Some(start) = filter.start_date {
            query = query.bind(start.to_rfc3339());
        }
        if let Some(end) = filter.end_date {
            query = query.bind(end.to_rfc3339());
        }
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        query = query.bind(limit).bind(filter.offset);

        let result = query.fetch_all(&self.pool).await.map_err(store_err)?;
        result.iter().map(rows::observation_from_row).collect()
    }

    async fn set_archived(&self, id: &ObservationId, archived: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("UPDATE observations SET archived = ?1 WHERE id = ?2")
            .bind(archived as i64)
            .bind(id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn delete_observation(&self, id: &ObservationId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM observations WHERE id = ?1")
            .bind(id.as_uuid().to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn get_unembedded_observations(&self) -> Result<Vec<Observation>> {
        let rows = sqlx::query("SELECT * FROM observations WHERE embedded = 0")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(rows::observation_from_row).collect()
    }

    async fn mark_observations_embedded(&self, ids: &[ObservationId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for id in ids {
            sqlx::query("UPDATE observations SET embedded = 1 WHERE id = ?1")
                .bind(id.as_uuid().to_string())
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn search_fts(&self, query: &str, limit: i64) -> Result<Vec<Observation>> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT observations.* FROM observations_fts \
             JOIN observations ON observations.rowid = observations_fts.rowid \
             WHERE observations_fts MATCH ?1 AND observations.archived = 0 \
             ORDER BY rank LIMIT ?2",
        )
        .bind(&sanitized)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(rows::observation_from_row).collect()
    }

    async fn upsert_indexed_file(&self, file: IndexedFile) -> Result<IndexedFile> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO indexed_files (filepath, content_hash, mtime, chunk_count, last_indexed_at, last_error) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (filepath) DO UPDATE SET \
             content_hash = excluded.content_hash, mtime = excluded.mtime, \
             chunk_count = excluded.chunk_count, last_indexed_at = excluded.last_indexed_at, \
             last_error = excluded.last_error",
        )
        .bind(&file.filepath)
        .bind(&file.content_hash)
        .bind(file.mtime.to_rfc3339())
        .bind(file.chunk_count as i64)
        .bind(file.last_indexed_at.to_rfc3339())
        .bind(&file.last_error)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(file)
    }

    async fn get_indexed_file(&self, filepath: &str) -> Result<Option<IndexedFile>> {
        let row = sqlx::query("SELECT * FROM indexed_files WHERE filepath = ?1")
            .bind(filepath)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(rows::indexed_file_from_row).transpose()
    }

    async fn delete_indexed_file(&self, filepath: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM indexed_files WHERE filepath = ?1")
            .bind(filepath)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>> {
        let rows = sqlx::query("SELECT * FROM indexed_files")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(rows::indexed_file_from_row).collect()
    }

    async fn run_stale_recovery(
        &self,
        timeout: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<StaleRecoveryOutcome> {
        let stale = self.get_stale_sessions(timeout, now).await?;
        let mut outcome = StaleRecoveryOutcome::default();
        for session in stale {
            if session.is_empty() {
                self.delete_session_cascade(&session.id).await?;
                outcome.deleted_ids.push(session.id);
            } else {
                self.end_session(&session.id, now).await?;
                outcome.recovered_ids.push(session.id);
            }
        }
        Ok(outcome)
    }

    async fn schema_version(&self) -> Result<i64> {
        migrations::current_version(&self.pool).await
    }

    async fn export_sql(&self) -> Result<String> {
        self.flush_locked().await?;
        super::backup::export(&self.pool).await
    }

    async fn import_sql(&self, sql: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        super::backup::import(&self.pool, sql).await
    }
}

fn sanitize_fts_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| token.replace(['"', '*', ':'], ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, SqliteActivityStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteActivityStore::open(&dir.path().join("activities.db")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn creates_and_reads_back_session() {
        let (_dir, store) = open_temp().await;
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let session = Session::new(SessionId::new("sess-1"), "claude", "/repo", now);
        store.create_session(session.clone()).await.unwrap();
        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.agent, "claude");
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_dedup_key_is_idempotent() {
        let (_dir, store) = open_temp().await;
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let session = store
            .create_session(Session::new(SessionId::new("sess-2"), "claude", "/repo", now))
            .await
            .unwrap();
        let batch = store
            .create_batch(&session.id, "do the thing", PromptSourceType::User, None, now)
            .await
            .unwrap();

        let activity = Activity {
            id: ActivityId::new(),
            session_id: session.id.clone(),
            prompt_batch_id: batch.id,
            tool_name: "Read".into(),
            tool_input: serde_json::json!({"file_path": "a.rs"}),
            tool_output_summary: None,
            file_path: Some("a.rs".into()),
            success: true,
            error_message: None,
            created_at: now,
            dedup_key: Some("tool-use-1".into()),
        };
        store.append_activity(activity.clone()).await.unwrap();
        store.append_activity(activity).await.unwrap();
        store.flush_activities().await.unwrap();

        let refetched = store.get_batch(&batch.id).await.unwrap().unwrap();
        assert_eq!(refetched.activity_count, 1);
    }

    #[tokio::test]
    async fn stale_recovery_deletes_empty_and_completes_nonempty() {
        let (_dir, store) = open_temp().await;
        let old = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);

        let empty = store
            .create_session(Session::new(SessionId::new("empty"), "claude", "/repo", old))
            .await
            .unwrap();
        let busy = store
            .create_session(Session::new(SessionId::new("busy"), "claude", "/repo", old))
            .await
            .unwrap();
        store
            .create_batch(&busy.id, "hi", PromptSourceType::User, None, old)
            .await
            .unwrap();

        let outcome = store.run_stale_recovery(chrono::Duration::seconds(3600), now).await.unwrap();
        assert!(outcome.deleted_ids.contains(&empty.id));
        assert!(outcome.recovered_ids.contains(&busy.id));
    }

    #[tokio::test]
    async fn indexed_file_upsert_replaces_prior_hash() {
        let (_dir, store) = open_temp().await;
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let file = IndexedFile {
            filepath: "src/lib.rs".into(),
            content_hash: "abc".into(),
            mtime: now,
            chunk_count: 3,
            last_indexed_at: now,
            last_error: None,
        };
        store.upsert_indexed_file(file.clone()).await.unwrap();
        let mut updated = file;
        updated.content_hash = "def".into();
        updated.chunk_count = 5;
        store.upsert_indexed_file(updated).await.unwrap();

        let fetched = store.get_indexed_file("src/lib.rs").await.unwrap().unwrap();
        assert_eq!(fetched.content_hash, "def");
        assert_eq!(fetched.chunk_count, 5);
        assert_eq!(store.list_indexed_files().await.unwrap().len(), 1);
    }
}
