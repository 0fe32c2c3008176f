//! tock-core: command grammar, task model and scheduler for the tock reminder bot

pub mod alert;
pub mod channel;
pub mod clock;
pub mod commands;
pub mod error;
pub mod parse;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod time;
pub mod wakeup;

pub use alert::{Alert, TaskId};
pub use channel::{
    ChannelId, ChannelSender, MessageHandle, MessageId, RecordingSender, SentMessage, TODO_EMOJI,
    UserId, WARNING_EMOJI,
};
pub use clock::{Clock, ManualSource, SystemSource, TimeSource};
pub use commands::{Action, ChatMessage, CommandProcessor, Outcome, Reply, grammar};
pub use error::{MISSING_TIMEZONE_HELP, Result, TockError};
pub use scheduler::{Scheduler, SweepReport};
pub use store::{JsonFileRepository, MemoryRepository, Repository, Snapshot, TaskStore};
pub use task::{MonthlyTask, PeriodicTask, Schedule, SingleTask, Task, Timing};
pub use wakeup::Wakeup;
