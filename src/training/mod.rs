/// Learning rate scheduling and the training loop around it

pub mod scheduler;
pub mod param_groups;
pub mod checkpoint;
pub mod trainer;

pub use scheduler::{LrSchedule, ResumePosition, SchedulerState, WarmupScheduler};
pub use param_groups::{CandleGroups, GroupedRates, ParamGroup, ParamGroups};
pub use checkpoint::ResumeMetadata;
pub use trainer::{ScheduledOptimizer, Trainer, TrainingConfig};
