pub mod attempt_service;
pub mod badge_rules;
pub mod course_completion;
pub mod expiry_sweeper;
pub mod load;
pub mod points_ledger;
pub mod reward_engine;
pub mod scoring;
pub mod task_queue;

pub use attempt_service::AttemptService;
pub use expiry_sweeper::{ExpirySweeper, SweepSummary};
pub use reward_engine::RewardEngine;
pub use task_queue::{TaskQueue, TaskWorker};
