//! Job record decoding (§4.3 "Record decoding").
//!
//! The broker hands back a job record as a flat map of strings. Payload
//! fields (`data`, `opts`, `returnvalue`, `stacktrace`) are JSON-encoded but
//! a parse failure there is not fatal — the raw string is kept so a caller
//! can still inspect a malformed job. Structural fields (timestamps,
//! `attemptsMade`) are not JSON; a parse failure there fails the fetch,
//! since the adapter cannot synthesize a `created_at`/`attempts` value.

use std::collections::HashMap;

use broker_types::{AdapterError, AdapterResult, Job, JobError, JobStatus};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn field<'a>(record: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    record.get(name).map(String::as_str)
}

/// Parses a JSON payload field leniently: invalid JSON surfaces as a raw
/// string value rather than failing the decode.
fn decode_payload_field(record: &HashMap<String, String>, name: &str) -> Option<serde_json::Value> {
    let raw = field(record, name)?;
    Some(serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string())))
}

fn decode_stack(record: &HashMap<String, String>) -> Vec<String> {
    let Some(raw) = field(record, "stacktrace") else {
        return Vec::new();
    };
    serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|_| vec![raw.to_string()])
}

/// Parses a structural field as a raw integer count of milliseconds.
/// Absence is not an error; a present-but-malformed value is (§4.3:
/// structural fields fail the fetch).
fn decode_millis_value(
    record: &HashMap<String, String>,
    field_name: &str,
) -> AdapterResult<Option<i64>> {
    let Some(raw) = field(record, field_name) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|_| AdapterError::Decode {
        field: field_name.to_string(),
        reason: format!("{raw:?} is not an integer millisecond count"),
    })
}

/// Parses a structural field as an absolute epoch-millisecond timestamp.
fn decode_millis(
    record: &HashMap<String, String>,
    field_name: &str,
) -> AdapterResult<Option<DateTime<Utc>>> {
    let Some(millis) = decode_millis_value(record, field_name)? else {
        return Ok(None);
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(Some)
        .ok_or_else(|| AdapterError::Decode {
            field: field_name.to_string(),
            reason: format!("{millis} is out of range for a timestamp"),
        })
}

fn decode_u32(record: &HashMap<String, String>, field_name: &str, default: u32) -> AdapterResult<u32> {
    match field(record, field_name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| AdapterError::Decode {
            field: field_name.to_string(),
            reason: format!("{raw:?} is not a non-negative integer"),
        }),
    }
}

fn decode_max_attempts(opts: Option<&serde_json::Value>) -> Option<u32> {
    opts?.get("attempts")?.as_u64().map(|n| n as u32)
}

/// Assembles a [`Job`] from a raw broker record and a status already
/// resolved by the caller (index-probe order, §4.3 "FetchJob").
///
/// Fails with [`AdapterError::Decode`] when a structural field is present
/// but unparsable, or when `timestamp` (the job's creation time) is absent
/// entirely — the adapter has no other source for `created_at`.
pub fn decode_job(
    queue: &str,
    id: &str,
    status: JobStatus,
    record: &HashMap<String, String>,
) -> AdapterResult<Job> {
    let created_at = decode_millis(record, "timestamp")?.ok_or_else(|| AdapterError::Decode {
        field: "timestamp".to_string(),
        reason: "job record has no creation timestamp".to_string(),
    })?;
    let processed_at = decode_millis(record, "processedOn")?;
    let finished_at = decode_millis(record, "finishedOn")?;
    // `delay` is a duration in ms relative to creation, not an epoch
    // timestamp (§6) — the release time is `created_at` shifted forward.
    let scheduled_at = decode_millis_value(record, "delay")?
        .map(|delay_ms| created_at + Duration::milliseconds(delay_ms));

    let payload = decode_payload_field(record, "data").unwrap_or(serde_json::Value::Null);
    let opts = decode_payload_field(record, "opts");
    let return_value = decode_payload_field(record, "returnvalue");

    let attempts = decode_u32(record, "attemptsMade", 0)?;
    let max_attempts = decode_max_attempts(opts.as_ref());

    let error = field(record, "failedReason").map(|message| JobError {
        message: message.to_string(),
        stack: decode_stack(record),
    });

    Ok(Job {
        queue: queue.to_string(),
        id: id.to_string(),
        status,
        payload,
        return_value,
        error,
        attempts,
        max_attempts,
        created_at,
        processed_at,
        finished_at,
        scheduled_at,
    })
}
