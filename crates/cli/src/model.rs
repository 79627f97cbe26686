// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core entities: Session, Prompt, ConfirmationRecord, Policy.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Stored as `INTEGER` columns in Store.
pub type EpochMs = i64;

/// Current wall-clock time, in milliseconds since the Unix epoch.
pub fn now_ms() -> EpochMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Known agent providers a pane can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Claude,
    Codex,
    Gemini,
    Browser,
    Unknown,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Browser => "browser",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "claude" => Self::Claude,
            "codex" => Self::Codex,
            "gemini" => Self::Gemini,
            "browser" => Self::Browser,
            _ => Self::Unknown,
        }
    }

    /// Capabilities implied by provider identity alone. `Unknown` carries none,
    /// per spec: the Assigner will not match an unknown-provider session to
    /// any prompt unless a `target_session` pin forces it.
    pub fn default_capabilities(&self) -> BTreeSet<String> {
        match self {
            Self::Unknown => BTreeSet::new(),
            other => BTreeSet::from([other.as_str().to_string()]),
        }
    }
}

/// Session status as tracked in Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Busy,
    Unreachable,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Unreachable => "unreachable",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "busy" => Self::Busy,
            "unreachable" => Self::Unreachable,
            _ => Self::Idle,
        }
    }
}

/// A row in Store's `sessions` table, keyed by pane name.
#[derive(Debug, Clone)]
pub struct Session {
    pub name: String,
    pub provider: Provider,
    pub capabilities: BTreeSet<String>,
    pub status: SessionStatus,
    pub current_prompt_id: Option<i64>,
    pub last_seen_at: EpochMs,
    pub last_assigned_at: Option<EpochMs>,
}

/// Prompt lifecycle status. See spec state machine in `assigner.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl PromptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "assigned" => Self::Assigned,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A row in Store's `prompts` table.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub id: i64,
    pub content: String,
    pub priority: i64,
    pub required_capabilities: BTreeSet<String>,
    pub target_session: Option<String>,
    pub status: PromptStatus,
    pub assigned_session: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub created_at: EpochMs,
    pub updated_at: EpochMs,
}

impl Prompt {
    pub fn is_eligible_for(&self, capabilities: &BTreeSet<String>) -> bool {
        self.required_capabilities.is_subset(capabilities)
    }
}

/// Final disposition recorded by `release_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Decision recorded for every ConfirmScanner tick that inspects a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    AutoConfirm,
    SkippedUnsafe,
    SkippedActive,
    SkippedKillswitch,
    DryRun,
}

impl ConfirmDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoConfirm => "auto_confirm",
            Self::SkippedUnsafe => "skipped_unsafe",
            Self::SkippedActive => "skipped_active",
            Self::SkippedKillswitch => "skipped_killswitch",
            Self::DryRun => "dry_run",
        }
    }
}

/// Append-only audit row in Store's `confirmations` table.
#[derive(Debug, Clone)]
pub struct ConfirmationRecord {
    pub id: i64,
    pub session_name: String,
    pub operation: String,
    pub operation_detail: String,
    /// Dedup key for the 2s auto-confirm window; a hash of
    /// (session, operation_class, operation_detail), not human-readable.
    pub fingerprint: String,
    pub decision: ConfirmDecision,
    pub observed_at: EpochMs,
    pub keystroke_sent: Option<String>,
}

/// Singleton runtime policy (component G).
#[derive(Debug, Clone)]
pub struct Policy {
    pub excluded_sessions: BTreeSet<String>,
    pub safe_operations: BTreeSet<String>,
    pub requires_approval: BTreeSet<String>,
    pub idle_threshold_ms: i64,
    pub dry_run: bool,
    pub kill_switch: bool,
}

/// Default idle threshold, per the design's resolution of the open question
/// (sources disagreed between 3s and 30s): 30s default, 3s floor.
pub const DEFAULT_IDLE_THRESHOLD_MS: i64 = 30_000;
pub const MIN_IDLE_THRESHOLD_MS: i64 = 3_000;

impl Default for Policy {
    fn default() -> Self {
        Self {
            excluded_sessions: BTreeSet::new(),
            safe_operations: BTreeSet::from([
                "read".to_string(),
                "grep".to_string(),
                "glob".to_string(),
                "accept_edits".to_string(),
            ]),
            requires_approval: BTreeSet::from([
                "bash".to_string(),
                "write".to_string(),
                "edit".to_string(),
                "delete".to_string(),
            ]),
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            dry_run: false,
            kill_switch: false,
        }
    }
}

impl Policy {
    /// `true` when an operation class is safe to auto-confirm under this
    /// policy. Anything not explicitly listed in `safe_operations`, or
    /// explicitly listed in `requires_approval`, is unsafe.
    pub fn is_safe(&self, operation_class: &str) -> bool {
        self.safe_operations.contains(operation_class)
            && !self.requires_approval.contains(operation_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_has_no_capabilities() {
        assert!(Provider::Unknown.default_capabilities().is_empty());
    }

    #[test]
    fn claude_provider_capability_matches_name() {
        let caps = Provider::Claude.default_capabilities();
        assert!(caps.contains("claude"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn default_policy_matches_spec_default_partition() {
        let policy = Policy::default();
        assert!(policy.is_safe("read"));
        assert!(policy.is_safe("accept_edits"));
        assert!(!policy.is_safe("bash"));
        assert!(!policy.is_safe("write"));
        // Anything unlisted is implicitly unsafe.
        assert!(!policy.is_safe("frobnicate"));
    }

    #[test]
    fn requires_approval_wins_even_if_also_marked_safe() {
        let mut policy = Policy::default();
        policy.safe_operations.insert("bash".to_string());
        assert!(!policy.is_safe("bash"));
    }

    #[test]
    fn prompt_eligibility_is_subset_check() {
        let mut prompt = sample_prompt();
        prompt.required_capabilities = BTreeSet::from(["claude".to_string()]);
        let caps = BTreeSet::from(["claude".to_string(), "vision".to_string()]);
        assert!(prompt.is_eligible_for(&caps));
        prompt.required_capabilities.insert("codex".to_string());
        assert!(!prompt.is_eligible_for(&caps));
    }

    fn sample_prompt() -> Prompt {
        Prompt {
            id: 1,
            content: "hello".to_string(),
            priority: 0,
            required_capabilities: BTreeSet::new(),
            target_session: None,
            status: PromptStatus::Pending,
            assigned_session: None,
            retry_count: 0,
            max_retries: 3,
            last_error: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}
