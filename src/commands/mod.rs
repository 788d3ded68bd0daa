pub mod collect;
pub mod misc;
pub mod summary;

pub use collect::{collect_command, CollectArgs};
pub use misc::generate_completions;
pub use summary::summary_command;
