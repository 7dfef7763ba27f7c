//! Filesystem watching that feeds edits into the coordinator

pub mod watcher;

pub use watcher::{FileWatcher, PendingChanges, WatchEvent, WatcherService};
