//! Line-to-event parsing.
//!
//! Each transcript line is parsed independently: a malformed line maps to
//! zero events, never an error, and the stream continues. Dispatch is an
//! exhaustive match on the `type` tag; the `event_msg` and `response_item`
//! envelopes dispatch again on their nested payload tag.

use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_stream::StreamExt;

use crate::tail::RawLine;

use super::event::{EventKind, SessionEvent};
use super::response_item::ResponseItem;
use super::usage::TokenUsage;

/// Parse one transcript line into a typed event.
///
/// Requires top-level `timestamp` and `type` fields; a line missing
/// either is logged and skipped. Unrecognized type tags yield
/// [`EventKind::Unknown`] with the whole line preserved in `raw`.
#[must_use]
pub fn parse_line(line: &str) -> Option<SessionEvent> {
    let raw: Value = match serde_json::from_str(line) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            tracing::warn!(line, "Skipping non-object transcript line");
            return None;
        }
        Err(e) => {
            tracing::warn!(line, error = %e, "Skipping malformed transcript line");
            return None;
        }
    };

    let Some(timestamp_value) = raw.get("timestamp") else {
        tracing::warn!(line, "Skipping transcript line without timestamp");
        return None;
    };
    let timestamp: DateTime<Utc> = match serde_json::from_value(timestamp_value.clone()) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::warn!(line, error = %e, "Skipping transcript line with bad timestamp");
            return None;
        }
    };

    let Some(event_type) = raw.get("type").and_then(Value::as_str) else {
        tracing::warn!(line, "Skipping transcript line without type");
        return None;
    };

    let payload = raw.get("payload").cloned().unwrap_or(Value::Null);
    let kind = match event_type {
        "session_meta" | "session_start" => {
            EventKind::SessionStart(decode(event_type, &payload)?)
        }
        "turn_context" => EventKind::TurnContext(decode(event_type, &payload)?),
        "response_item" => EventKind::ResponseItem(ResponseItem::from_payload(&payload)?),
        "event_msg" => {
            // Older generations nest the body under `msg` instead.
            let body = match raw.get("payload").filter(|v| !v.is_null()) {
                Some(p) => p.clone(),
                None => raw.get("msg").cloned().unwrap_or(Value::Null),
            };
            let Some(tag) = body.get("type").and_then(Value::as_str) else {
                tracing::warn!(line, "Skipping event_msg without nested type");
                return None;
            };
            event_kind(tag, &body)?
        }
        // Known event tags are also accepted flat at the top level.
        other => event_kind(other, &payload)?,
    };

    Some(SessionEvent {
        timestamp,
        kind,
        raw,
    })
}

/// Dispatch one event tag against its body.
///
/// Used both for the `event_msg` envelope and for flat top-level tags.
/// Unknown tags become [`EventKind::Unknown`].
fn event_kind(tag: &str, body: &Value) -> Option<EventKind> {
    let kind = match tag {
        "user_message" => EventKind::UserMessage(decode(tag, body)?),
        "agent_message" => EventKind::AgentMessage(decode(tag, body)?),
        "agent_reasoning" => EventKind::AgentReasoning(decode(tag, body)?),
        "agent_reasoning_section_break" => EventKind::AgentReasoningSectionBreak,
        "token_count" => match TokenUsage::from_payload(body) {
            Some(usage) => EventKind::TokenUsage(usage),
            None => {
                tracing::warn!(tag, "Skipping token_count without usage data");
                return None;
            }
        },
        "turn_aborted" => EventKind::TurnAborted(decode(tag, body)?),
        "turn_diff" => EventKind::TurnDiff(decode(tag, body)?),
        "background_event" => EventKind::BackgroundNotice(decode(tag, body)?),
        "compacted" | "compaction_checkpoint" => {
            EventKind::CompactionCheckpointWarning(decode(tag, body)?)
        }
        "error" => EventKind::Error(decode(tag, body)?),
        "entered_review_mode" => EventKind::EnteredReviewMode(decode(tag, body)?),
        "exited_review_mode" => EventKind::ExitedReviewMode(decode(tag, body)?),
        "plan_update" => EventKind::PlanUpdate(decode(tag, body)?),
        "patch_apply_begin" => EventKind::PatchApplyBegin(decode(tag, body)?),
        "patch_apply_end" => EventKind::PatchApplyEnd(decode(tag, body)?),
        "task_started" => EventKind::TaskStarted(decode(tag, body)?),
        "task_complete" => EventKind::TaskComplete(decode(tag, body)?),
        unknown => EventKind::Unknown {
            event_type: unknown.to_string(),
        },
    };
    Some(kind)
}

/// Decode one payload into its event struct, logging on failure.
///
/// Every constructor validates its own required sub-fields here; a
/// partially constructed event is never produced.
fn decode<T: DeserializeOwned>(tag: &str, body: &Value) -> Option<T> {
    match serde_json::from_value(body.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(tag, error = %e, "Skipping event with malformed payload");
            None
        }
    }
}

/// Convert a raw line stream into a typed event stream, 1:1 or 0:1 per
/// line. No state crosses lines, so parsing a concatenation equals
/// concatenating parses.
pub fn events<S>(lines: S) -> impl Stream<Item = SessionEvent>
where
    S: Stream<Item = RawLine>,
{
    lines.filter_map(|raw| parse_line(&raw.text))
}

/// Like [`events`], keeping only events strictly after `after`.
///
/// This is how [`StreamPosition::AfterTimestamp`](crate::tail::StreamPosition)
/// positioning is realized: timestamps do not share an index space with
/// byte offsets, so the filter lives here rather than in the tailer.
pub fn events_after<S>(lines: S, after: DateTime<Utc>) -> impl Stream<Item = SessionEvent>
where
    S: Stream<Item = RawLine>,
{
    events(lines).filter(move |event| event.timestamp > after)
}
