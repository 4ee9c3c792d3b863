//! Reclaim Watcher: filesystem change events for a live index

pub mod watcher;


pub use watcher::{FileWatcher, WatchEvent, WatchScope, apply_event};
