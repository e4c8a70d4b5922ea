//! Row <-> entity conversions for the SQLite-backed `ActivityStore`.
//!
//! Kept as free functions operating on `sqlx::sqlite::SqliteRow` rather than
//! `#[derive(FromRow)]` structs: a clean split between "what the driver
//! gives us" and "what the domain wants" (enums and ids round-trip through
//! plain `TEXT` columns).

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use oak_ci_domain::entities::{
    Activity, IndexedFile, Observation, ObservationImportance, ObservationType, PromptBatch,
    PromptBatchClassification, PromptBatchStatus, PromptSourceType, Session, SessionStatus,
};
use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::value_objects::{ActivityId, BatchId, ObservationId, SessionId};

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store { message: format!("bad timestamp '{raw}': {e}") })
}

pub fn session_from_row(row: &SqliteRow) -> Result<Session> {
    let started_at: String = row.try_get("started_at").map_err(store_err)?;
    let ended_at: Option<String> = row.try_get("ended_at").map_err(store_err)?;
    let status: String = row.try_get("status").map_err(store_err)?;
    let current_batch: Option<String> = row.try_get("current_prompt_batch_id").map_err(store_err)?;
    Ok(Session {
        id: SessionId::new(row.try_get::<String, _>("id").map_err(store_err)?),
        agent: row.try_get("agent").map_err(store_err)?,
        project_root: row.try_get("project_root").map_err(store_err)?,
        started_at: parse_time(&started_at)?,
        ended_at: ended_at.map(|s| parse_time(&s)).transpose()?,
        status: parse_session_status(&status)?,
        prompt_count: row.try_get("prompt_count").map_err(store_err)?,
        tool_count: row.try_get("tool_count").map_err(store_err)?,
        title: row.try_get("title").map_err(store_err)?,
        summary: row.try_get("summary").map_err(store_err)?,
        current_prompt_batch_id: current_batch
            .map(|s| parse_uuid_id(&s).map(BatchId::from_uuid))
            .transpose()?,
    })
}

pub fn batch_from_row(row: &SqliteRow) -> Result<PromptBatch> {
    let started_at: String = row.try_get("started_at").map_err(store_err)?;
    let ended_at: Option<String> = row.try_get("ended_at").map_err(store_err)?;
    let status: String = row.try_get("status").map_err(store_err)?;
    let classification: Option<String> = row.try_get("classification").map_err(store_err)?;
    let source_type: String = row.try_get("source_type").map_err(store_err)?;
    Ok(PromptBatch {
        id: BatchId::from_uuid(parse_uuid_id(&row.try_get::<String, _>("id").map_err(store_err)?)?),
        session_id: SessionId::new(row.try_get::<String, _>("session_id").map_err(store_err)?),
        prompt_number: row.try_get("prompt_number").map_err(store_err)?,
        user_prompt: row.try_get("user_prompt").map_err(store_err)?,
        started_at: parse_time(&started_at)?,
        ended_at: ended_at.map(|s| parse_time(&s)).transpose()?,
        status: parse_batch_status(&status)?,
        activity_count: row.try_get("activity_count").map_err(store_err)?,
        classification: classification.map(|s| parse_classification(&s)).transpose()?,
        source_type: parse_source_type(&source_type)?,
        plan_file_path: row.try_get("plan_file_path").map_err(store_err)?,
        plan_content: row.try_get("plan_content").map_err(store_err)?,
        plan_embedded: row.try_get::<i64, _>("plan_embedded").map_err(store_err)? != 0,
        observations_extracted: row.try_get::<i64, _>("observations_extracted").map_err(store_err)? != 0,
    })
}

pub fn activity_from_row(row: &SqliteRow) -> Result<Activity> {
    let created_at: String = row.try_get("created_at").map_err(store_err)?;
    let tool_input_raw: String = row.try_get("tool_input").map_err(store_err)?;
    Ok(Activity {
        id: ActivityId::from_uuid(parse_uuid_id(&row.try_get::<String, _>("id").map_err(store_err)?)?),
        session_id: SessionId::new(row.try_get::<String, _>("session_id").map_err(store_err)?),
        prompt_batch_id: BatchId::from_uuid(parse_uuid_id(
            &row.try_get::<String, _>("prompt_batch_id").map_err(store_err)?,
        )?),
        tool_name: row.try_get("tool_name").map_err(store_err)?,
        tool_input: serde_json::from_str(&tool_input_raw).map_err(Error::from)?,
        tool_output_summary: row.try_get("tool_output_summary").map_err(store_err)?,
        file_path: row.try_get("file_path").map_err(store_err)?,
        success: row.try_get::<i64, _>("success").map_err(store_err)? != 0,
        error_message: row.try_get("error_message").map_err(store_err)?,
        created_at: parse_time(&created_at)?,
        dedup_key: row.try_get("dedup_key").map_err(store_err)?,
    })
}

pub fn observation_from_row(row: &SqliteRow) -> Result<Observation> {
    let created_at: String = row.try_get("created_at").map_err(store_err)?;
    let r#type: String = row.try_get("type").map_err(store_err)?;
    let importance: String = row.try_get("importance").map_err(store_err)?;
    let tags_raw: String = row.try_get("tags").map_err(store_err)?;
    let batch_id: Option<String> = row.try_get("prompt_batch_id").map_err(store_err)?;
    Ok(Observation {
        id: ObservationId::from_uuid(parse_uuid_id(&row.try_get::<String, _>("id").map_err(store_err)?)?),
        session_id: SessionId::new(row.try_get::<String, _>("session_id").map_err(store_err)?),
        prompt_batch_id: batch_id.map(|s| parse_uuid_id(&s).map(BatchId::from_uuid)).transpose()?,
        r#type: parse_observation_type(&r#type)?,
        observation: row.try_get("observation").map_err(store_err)?,
        context: row.try_get("context").map_err(store_err)?,
        tags: serde_json::from_str(&tags_raw).unwrap_or_default(),
        importance: parse_importance(&importance)?,
        file_path: row.try_get("file_path").map_err(store_err)?,
        created_at: parse_time(&created_at)?,
        embedded: row.try_get::<i64, _>("embedded").map_err(store_err)? != 0,
        archived: row.try_get::<i64, _>("archived").map_err(store_err)? != 0,
    })
}

pub fn indexed_file_from_row(row: &SqliteRow) -> Result<IndexedFile> {
    let mtime: String = row.try_get("mtime").map_err(store_err)?;
    let last_indexed_at: String = row.try_get("last_indexed_at").map_err(store_err)?;
    Ok(IndexedFile {
        filepath: row.try_get("filepath").map_err(store_err)?,
        content_hash: row.try_get("content_hash").map_err(store_err)?,
        mtime: parse_time(&mtime)?,
        chunk_count: row.try_get::<i64, _>("chunk_count").map_err(store_err)? as usize,
        last_indexed_at: parse_time(&last_indexed_at)?,
        last_error: row.try_get("last_error").map_err(store_err)?,
    })
}

fn store_err(e: sqlx::Error) -> Error {
    Error::Store { message: e.to_string() }
}

fn parse_uuid_id(raw: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| Error::Store { message: format!("bad uuid '{raw}': {e}") })
}

pub fn session_status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
    }
}

fn parse_session_status(raw: &str) -> Result<SessionStatus> {
    match raw {
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        other => Err(Error::Store { message: format!("unknown session status '{other}'") }),
    }
}

pub fn batch_status_str(status: PromptBatchStatus) -> &'static str {
    match status {
        PromptBatchStatus::Active => "active",
        PromptBatchStatus::Completed => "completed",
    }
}

fn parse_batch_status(raw: &str) -> Result<PromptBatchStatus> {
    match raw {
        "active" => Ok(PromptBatchStatus::Active),
        "completed" => Ok(PromptBatchStatus::Completed),
        other => Err(Error::Store { message: format!("unknown batch status '{other}'") }),
    }
}

pub fn classification_str(value: PromptBatchClassification) -> &'static str {
    match value {
        PromptBatchClassification::Exploration => "exploration",
        PromptBatchClassification::Implementation => "implementation",
        PromptBatchClassification::Debugging => "debugging",
        PromptBatchClassification::Refactoring => "refactoring",
        PromptBatchClassification::Plan => "plan",
        PromptBatchClassification::Other => "other",
    }
}

fn parse_classification(raw: &str) -> Result<PromptBatchClassification> {
    match raw {
        "exploration" => Ok(PromptBatchClassification::Exploration),
        "implementation" => Ok(PromptBatchClassification::Implementation),
        "debugging" => Ok(PromptBatchClassification::Debugging),
        "refactoring" => Ok(PromptBatchClassification::Refactoring),
        "plan" => Ok(PromptBatchClassification::Plan),
        "other" => Ok(PromptBatchClassification::Other),
        other => Err(Error::Store { message: format!("unknown classification '{other}'") }),
    }
}

pub fn source_type_str(value: PromptSourceType) -> &'static str {
    match value {
        PromptSourceType::User => "user",
        PromptSourceType::AgentNotification => "agent_notification",
        PromptSourceType::Plan => "plan",
    }
}

fn parse_source_type(raw: &str) -> Result<PromptSourceType> {
    match raw {
        "user" => Ok(PromptSourceType::User),
        "agent_notification" => Ok(PromptSourceType::AgentNotification),
        "plan" => Ok(PromptSourceType::Plan),
        other => Err(Error::Store { message: format!("unknown source type '{other}'") }),
    }
}

pub fn observation_type_str(value: ObservationType) -> &'static str {
    match value {
        ObservationType::Discovery => "discovery",
        ObservationType::Gotcha => "gotcha",
        ObservationType::Decision => "decision",
        ObservationType::BugFix => "bug_fix",
        ObservationType::TradeOff => "trade_off",
        ObservationType::SessionSummary => "session_summary",
        ObservationType::Plan => "plan",
    }
}

fn parse_observation_type(raw: &str) -> Result<ObservationType> {
    match raw {
        "discovery" => Ok(ObservationType::Discovery),
        "gotcha" => Ok(ObservationType::Gotcha),
        "decision" => Ok(ObservationType::Decision),
        "bug_fix" => Ok(ObservationType::BugFix),
        "trade_off" => Ok(ObservationType::TradeOff),
        "session_summary" => Ok(ObservationType::SessionSummary),
        "plan" => Ok(ObservationType::Plan),
        other => Err(Error::Store { message: format!("unknown observation type '{other}'") }),
    }
}

pub fn importance_str(value: ObservationImportance) -> &'static str {
    match value {
        ObservationImportance::Low => "low",
        ObservationImportance::Medium => "medium",
        ObservationImportance::High => "high",
    }
}

fn parse_importance(raw: &str) -> Result<ObservationImportance> {
    match raw {
        "low" => Ok(ObservationImportance::Low),
        "medium" => Ok(ObservationImportance::Medium),
        "high" => Ok(ObservationImportance::High),
        other => Err(Error::Store { message: format!("unknown importance '{other}'") }),
    }
}
