//! Domain types shared by every crate in the CAE submission core:
//! the repository's catalog and document entities, the matching
//! engine's inputs/outputs, decision packs, learned hints, headful
//! runs, plans, jobs, the closed error taxonomy, and the trace event
//! schema.
//!
//! This crate holds data only — no I/O, no browser driving, no HTTP.
//! Everything here is `Serialize`/`Deserialize` and cheap to construct,
//! so the rest of the workspace can pass it across thread and process
//! boundaries without friction.

pub mod catalog;
pub mod config;
pub mod decision_pack;
pub mod document;
pub mod error;
pub mod history;
pub mod job;
pub mod learning;
pub mod matching;
pub mod plan;
pub mod rules;
pub mod run;
pub mod trace;

pub use catalog::{DocumentType, PeriodKind, Scope, ValidityBasis, ValidityPolicy, ValidityStartMode};
pub use config::{CoordRecord, LoginSelectors, OrgRecord, PersonRecord, PlatformRecord};
pub use decision_pack::{DecisionAction, DecisionEntry, DecisionPack};
pub use document::{ComputedValidity, DocumentInstance, DocumentStatus, ExtractedMeta, ValidityOverride, ValidityStatus};
pub use error::{CaeError, CaeErrorCode, Severity, Stage};
pub use history::{Action, SubmissionRecord};
pub use job::{ApplyJobSpec, Job, JobState};
pub use learning::{HintConditions, HintStrength, LearnedHint, LearnedMapping};
pub use matching::{
    AppliedHint, CandidateDoc, CandidateType, Decision, HintEffect, InputsSnapshot, MatchOutcome,
    MatchingDebugReport, PendingRequirement, ReasonCode,
};
pub use plan::{DecisionSource, ExecutionResult, ItemExecutionOutcome, ItemOutcome, Plan, PlanItemDecision, PlanSummary, RunMetrics};
pub use rules::{DateFieldSource, DateFieldSpec, FormSpec, MatchCriteria, RuleScope, SubmissionRule};
pub use run::{HeadfulRun, HeadfulState, RiskLevel, TimelineEvent, TimelineEventKind, DEFAULT_WARNING_ACTION_THRESHOLD};
pub use trace::{TraceEvent, TraceEventType};
