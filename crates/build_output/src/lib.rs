//! Build output: recorded build logs, their node trees, and the view state
//! that processes, navigates and searches them.

mod error;
mod kind;
mod log;
mod status;
mod view;

pub use error::{BuildLogError, Result};
pub use kind::NodeKind;
pub use log::{BuildEvent, BuildLog, EXTENSION, MessageImportance, RecordedBuildLog, with_log_extension};
pub use status::{SearchDirection, SearchStatus};
pub use view::{BuildOutputEvent, BuildOutputView, NO_SELECTION, PathEntry, TaskReference};
