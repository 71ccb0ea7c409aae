//! Rate-limit policy, tier escalation and action dispatch.

/// Executes an action batch against the moderation transport.
pub mod dispatch;
/// Maps a recorded count to an action tier and target set.
pub mod escalation;
/// Validated policy snapshots and the atomic active-policy handle.
pub mod policy;
/// Pure renderer for operator-authored message templates.
pub mod template;
