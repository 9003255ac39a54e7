//! Typed session events.
//!
//! Every event keeps the complete original line object in `raw`, so
//! consumers survive schema additions without losing data.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::response_item::ResponseItem;
use super::usage::TokenUsage;

/// One parsed transcript line.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// Timestamp from the line's top-level `timestamp` field.
    pub timestamp: DateTime<Utc>,
    /// The typed event.
    pub kind: EventKind,
    /// The complete original JSON object for this line.
    pub raw: Value,
}

/// The closed-but-extensible set of event kinds.
///
/// Unrecognized type tags land in [`EventKind::Unknown`] instead of
/// failing the parse.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EventKind {
    SessionStart(SessionStart),
    UserMessage(UserMessage),
    AgentMessage(AgentMessage),
    AgentReasoning(AgentReasoning),
    AgentReasoningSectionBreak,
    TokenUsage(TokenUsage),
    TurnContext(TurnContext),
    TurnAborted(TurnAborted),
    TurnDiff(TurnDiff),
    BackgroundNotice(BackgroundNotice),
    CompactionCheckpointWarning(CompactionCheckpointWarning),
    Error(ErrorEvent),
    EnteredReviewMode(EnteredReviewMode),
    ExitedReviewMode(ExitedReviewMode),
    PlanUpdate(PlanUpdate),
    PatchApplyBegin(PatchApplyBegin),
    PatchApplyEnd(PatchApplyEnd),
    TaskStarted(TaskStarted),
    TaskComplete(TaskComplete),
    ResponseItem(ResponseItem),
    Unknown { event_type: String },
}

/// Session metadata from the first transcript line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionStart {
    /// Opaque session id. Never validated as a UUID.
    #[serde(rename = "id")]
    pub session_id: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub originator: Option<String>,
    #[serde(default)]
    pub cli_version: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserMessage {
    pub message: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentMessage {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentReasoning {
    pub text: String,
}

/// Per-turn execution context.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnContext {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub effort: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub approval_policy: Option<Value>,
    #[serde(default)]
    pub sandbox_policy: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnAborted {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnDiff {
    pub unified_diff: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackgroundNotice {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompactionCheckpointWarning {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnteredReviewMode {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub user_facing_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExitedReviewMode {
    #[serde(default)]
    pub review_output: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanUpdate {
    #[serde(default)]
    pub explanation: Option<String>,
    pub plan: Vec<PlanItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanItem {
    pub step: String,
    pub status: PlanStepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    Pending,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatchApplyBegin {
    pub call_id: String,
    #[serde(default)]
    pub auto_approved: bool,
    #[serde(default)]
    pub changes: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatchApplyEnd {
    pub call_id: String,
    pub success: bool,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStarted {
    #[serde(default)]
    pub model_context_window: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskComplete {
    #[serde(default)]
    pub last_agent_message: Option<String>,
}
