//! Resilient transcript event parsing.
//!
//! One JSON object per line; each line parses independently into a
//! [`SessionEvent`] or is skipped with a warning. Unknown event types
//! are preserved, never fatal.

mod event;
mod parse;
mod response_item;
mod usage;

pub use event::{
    AgentMessage, AgentReasoning, BackgroundNotice, CompactionCheckpointWarning,
    EnteredReviewMode, ErrorEvent, EventKind, ExitedReviewMode, PatchApplyBegin, PatchApplyEnd,
    PlanItem, PlanStepStatus, PlanUpdate, SessionEvent, SessionStart, TaskComplete, TaskStarted,
    TurnAborted, TurnContext, TurnDiff, UserMessage,
};
pub use parse::{events, events_after, parse_line};
pub use response_item::{FunctionOutput, MessageContent, ReasoningSummary, ResponseItem};
pub use usage::{RateLimitSnapshot, RateLimitWindow, TokenCounts, TokenUsage};
