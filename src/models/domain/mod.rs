pub mod attempt;
pub mod badge;
pub mod course;
pub mod quest;
pub mod user;
pub use attempt::{UserAnswerAttempt, UserQuestAttempt};
pub use badge::{Badge, BadgeKind, UserCourseBadge, UserQuestBadge};
pub use course::{Course, CourseEnrollment};
pub use quest::{Answer, Quest, Question};
pub use user::{EduquestUser, PointsCredit};
