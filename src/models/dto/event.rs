use std::fmt;

use serde::{Deserialize, Serialize};

/// Events the engine reacts to. Each maps to an ordered list of steps.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    AttemptSubmitted { attempt_id: String },
    QuestExpired { quest_id: String },
    CourseExpired { course_id: String },
}

/// A named unit of work run for an event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EngineStep {
    AggregateAttempt,
    PointsLedger,
    FirstAttemptBadge,
    PerfectionistBadge,
    CourseCompletion,
    ExpertBadge,
    SpeedsterBadge,
}

const SUBMISSION_STEPS: &[EngineStep] = &[
    EngineStep::AggregateAttempt,
    EngineStep::PointsLedger,
    EngineStep::FirstAttemptBadge,
    EngineStep::PerfectionistBadge,
    EngineStep::CourseCompletion,
];

const QUEST_EXPIRY_STEPS: &[EngineStep] = &[EngineStep::ExpertBadge, EngineStep::SpeedsterBadge];

const COURSE_EXPIRY_STEPS: &[EngineStep] = &[EngineStep::CourseCompletion];

impl EngineEvent {
    pub fn steps(&self) -> &'static [EngineStep] {
        match self {
            EngineEvent::AttemptSubmitted { .. } => SUBMISSION_STEPS,
            EngineEvent::QuestExpired { .. } => QUEST_EXPIRY_STEPS,
            EngineEvent::CourseExpired { .. } => COURSE_EXPIRY_STEPS,
        }
    }

    pub fn subject_id(&self) -> &str {
        match self {
            EngineEvent::AttemptSubmitted { attempt_id } => attempt_id,
            EngineEvent::QuestExpired { quest_id } => quest_id,
            EngineEvent::CourseExpired { course_id } => course_id,
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::AttemptSubmitted { attempt_id } => {
                write!(f, "attempt_submitted({})", attempt_id)
            }
            EngineEvent::QuestExpired { quest_id } => write!(f, "quest_expired({})", quest_id),
            EngineEvent::CourseExpired { course_id } => write!(f, "course_expired({})", course_id),
        }
    }
}

impl fmt::Display for EngineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStep::AggregateAttempt => "aggregate_attempt",
            EngineStep::PointsLedger => "points_ledger",
            EngineStep::FirstAttemptBadge => "first_attempt_badge",
            EngineStep::PerfectionistBadge => "perfectionist_badge",
            EngineStep::CourseCompletion => "course_completion",
            EngineStep::ExpertBadge => "expert_badge",
            EngineStep::SpeedsterBadge => "speedster_badge",
        };
        f.write_str(name)
    }
}
