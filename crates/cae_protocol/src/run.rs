//! `HeadfulRun`: a persistent, operator-visible automated browser
//! session (§3.1, §4.4).

use cae_ids::{PlatformKey, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// States of the run state machine (§4.4). `Failed` is reachable from
/// every other state; it has no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadfulState {
    Created,
    BrowserStarted,
    Authenticated,
    Ready,
    Executing,
    Closed,
    Failed,
}

impl HeadfulState {
    /// Property 10: a run never accepts `execute_action` outside
    /// `Ready`.
    pub fn admits_execute_action(self) -> bool {
        matches!(self, HeadfulState::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventKind {
    RunStarted,
    Info,
    Success,
    Action,
    Warning,
    Error,
    RunClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub kind: TimelineEventKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadfulRun {
    pub run_id: RunId,
    pub platform_key: PlatformKey,
    pub tenant_id: String,
    pub storage_state_ref: String,
    pub allowlisted_domain: String,
    pub state: HeadfulState,
    pub timeline: Vec<TimelineEvent>,
    pub risk_level: RiskLevel,
}

impl HeadfulRun {
    /// Recomputed on every timeline write (§4.4): `high` if any `Error`
    /// event occurred; `medium` if more than `warning_action_threshold`
    /// `Warning`/`Action` events occurred; else `low`.
    pub fn recompute_risk_level(&mut self, warning_action_threshold: usize) {
        let has_error = self
            .timeline
            .iter()
            .any(|e| e.kind == TimelineEventKind::Error);
        if has_error {
            self.risk_level = RiskLevel::High;
            return;
        }
        let warn_action_count = self
            .timeline
            .iter()
            .filter(|e| matches!(e.kind, TimelineEventKind::Warning | TimelineEventKind::Action))
            .count();
        self.risk_level = if warn_action_count > warning_action_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
    }

    pub fn push_event(&mut self, kind: TimelineEventKind, message: impl Into<String>, now: DateTime<Utc>, warning_action_threshold: usize) {
        self.timeline.push(TimelineEvent {
            kind,
            message: message.into(),
            at: now,
        });
        self.recompute_risk_level(warning_action_threshold);
    }
}

pub const DEFAULT_WARNING_ACTION_THRESHOLD: usize = 3;
