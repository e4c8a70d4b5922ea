//! Literal SQL export/import for [`super::SqliteActivityStore`] (spec.md
//! §6.1 "SQL-text round-trip"). Export walks each table through the same
//! entity types the store already reads into, and re-renders them as plain
//! `INSERT` statements; import replays the script inside one transaction.

use sqlx::SqlitePool;

use oak_ci_domain::entities::{Observation, PromptBatch, Session};
use oak_ci_domain::error::{Error, Result};

use super::rows;

fn store_err(e: sqlx::Error) -> Error {
    Error::Store { message: e.to_string() }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_opt(value: Option<&str>) -> String {
    value.map_or_else(|| "NULL".to_owned(), quote)
}

fn quote_time(value: chrono::DateTime<chrono::Utc>) -> String {
    quote(&value.to_rfc3339())
}

fn quote_time_opt(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value.map_or_else(|| "NULL".to_owned(), quote_time)
}

fn bool_literal(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn session_insert(session: &Session) -> String {
    format!(
        "INSERT INTO sessions (id, agent, project_root, started_at, ended_at, status, prompt_count, tool_count, title, summary, current_prompt_batch_id) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
        quote(session.id.as_str()),
        quote(&session.agent),
        quote(&session.project_root),
        quote_time(session.started_at),
        quote_time_opt(session.ended_at),
        quote(rows::session_status_str(session.status)),
        session.prompt_count,
        session.tool_count,
        quote_opt(session.title.as_deref()),
        quote_opt(session.summary.as_deref()),
        session.current_prompt_batch_id.map_or_else(|| "NULL".to_owned(), |id| quote(&id.as_uuid().to_string())),
    )
}

fn batch_insert(batch: &PromptBatch) -> String {
    format!(
        "INSERT INTO prompt_batches (id, session_id, prompt_number, user_prompt, started_at, ended_at, status, activity_count, classification, source_type, plan_file_path, plan_content, plan_embedded, observations_extracted) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
        quote(&batch.id.as_uuid().to_string()),
        quote(batch.session_id.as_str()),
        batch.prompt_number,
        quote(&batch.user_prompt),
        quote_time(batch.started_at),
        quote_time_opt(batch.ended_at),
        quote(rows::batch_status_str(batch.status)),
        batch.activity_count,
        batch.classification.map_or_else(|| "NULL".to_owned(), |c| quote(rows::classification_str(c))),
        quote(rows::source_type_str(batch.source_type)),
        quote_opt(batch.plan_file_path.as_deref()),
        quote_opt(batch.plan_content.as_deref()),
        bool_literal(batch.plan_embedded),
        bool_literal(batch.observations_extracted),
    )
}

fn activity_insert(activity: &oak_ci_domain::entities::Activity) -> Result<String> {
    let tool_input = serde_json::to_string(&activity.tool_input).map_err(Error::from)?;
    Ok(format!(
        "INSERT INTO activities (id, session_id, prompt_batch_id, tool_name, tool_input, tool_output_summary, file_path, success, error_message, created_at, dedup_key) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
        quote(&activity.id.as_uuid().to_string()),
        quote(activity.session_id.as_str()),
        quote(&activity.prompt_batch_id.as_uuid().to_string()),
        quote(&activity.tool_name),
        quote(&tool_input),
        quote_opt(activity.tool_output_summary.as_deref()),
        quote_opt(activity.file_path.as_deref()),
        bool_literal(activity.success),
        quote_opt(activity.error_message.as_deref()),
        quote_time(activity.created_at),
        quote_opt(activity.dedup_key.as_deref()),
    ))
}

fn observation_insert(observation: &Observation) -> Result<String> {
    let tags = serde_json::to_string(&observation.tags).map_err(Error::from)?;
    Ok(format!(
        "INSERT INTO observations (id, session_id, prompt_batch_id, type, observation, context, tags, importance, file_path, created_at, embedded, archived) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
        quote(&observation.id.as_uuid().to_string()),
        quote(observation.session_id.as_str()),
        observation.prompt_batch_id.map_or_else(|| "NULL".to_owned(), |id| quote(&id.as_uuid().to_string())),
        quote(rows::observation_type_str(observation.r#type)),
        quote(&observation.observation),
        quote_opt(observation.context.as_deref()),
        quote(&tags),
        quote(rows::importance_str(observation.importance)),
        quote_opt(observation.file_path.as_deref()),
        quote_time(observation.created_at),
        bool_literal(observation.embedded),
        bool_literal(observation.archived),
    ))
}

fn indexed_file_insert(file: &oak_ci_domain::entities::IndexedFile) -> String {
    format!(
        "INSERT INTO indexed_files (filepath, content_hash, mtime, chunk_count, last_indexed_at, last_error) VALUES ({}, {}, {}, {}, {}, {});",
        quote(&file.filepath),
        quote(&file.content_hash),
        quote_time(file.mtime),
        file.chunk_count,
        quote_time(file.last_indexed_at),
        quote_opt(file.last_error.as_deref()),
    )
}

/// Render the whole database as a replayable SQL script, table by table in
/// foreign-key-safe order.
pub async fn export(pool: &SqlitePool) -> Result<String> {
    let mut script = String::from("BEGIN TRANSACTION;\n");
    script.push_str("DELETE FROM observations;\nDELETE FROM activities;\nDELETE FROM prompt_batches;\nDELETE FROM sessions;\nDELETE FROM indexed_files;\n");

    let session_rows = sqlx::query("SELECT * FROM sessions ORDER BY started_at ASC").fetch_all(pool).await.map_err(store_err)?;
    for row in &session_rows {
        script.push_str(&session_insert(&rows::session_from_row(row)?));
        script.push('\n');
    }

    let batch_rows = sqlx::query("SELECT * FROM prompt_batches ORDER BY started_at ASC").fetch_all(pool).await.map_err(store_err)?;
    for row in &batch_rows {
        script.push_str(&batch_insert(&rows::batch_from_row(row)?));
        script.push('\n');
    }

    let activity_rows = sqlx::query("SELECT * FROM activities ORDER BY created_at ASC").fetch_all(pool).await.map_err(store_err)?;
    for row in &activity_rows {
        script.push_str(&activity_insert(&rows::activity_from_row(row)?)?);
        script.push('\n');
    }

    let observation_rows = sqlx::query("SELECT * FROM observations ORDER BY created_at ASC").fetch_all(pool).await.map_err(store_err)?;
    for row in &observation_rows {
        script.push_str(&observation_insert(&rows::observation_from_row(row)?)?);
        script.push('\n');
    }

    let file_rows = sqlx::query("SELECT * FROM indexed_files ORDER BY filepath ASC").fetch_all(pool).await.map_err(store_err)?;
    for row in &file_rows {
        script.push_str(&indexed_file_insert(&rows::indexed_file_from_row(row)?));
        script.push('\n');
    }

    script.push_str("COMMIT;\n");
    Ok(script)
}

/// Replay a previously exported script. The script is trusted input (it was
/// produced by [`export`] or a human operator with file-system access), so
/// statements are executed verbatim rather than parsed into a safe subset.
pub async fn import(pool: &SqlitePool, sql: &str) -> Result<()> {
    sqlx::raw_sql(sql).execute(pool).await.map_err(store_err)?;
    Ok(())
}
