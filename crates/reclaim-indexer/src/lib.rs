//! Incremental index building and the bundled filesystem collaborators

pub mod background;
pub mod scheduler;
pub mod config;
pub mod fs;
pub mod resolver;
pub mod report;


#[cfg(test)]
pub mod test_utils;

pub use background::{BackgroundTask, TaskStatus};
pub use scheduler::{Collaborators, CycleOutcome, IncrementalScheduler, Phase};
pub use config::ReclaimConfig;
pub use fs::{FsSizeProbe, GlobClassifier, WalkPathSource, relative_asset_path};
pub use resolver::TextReferenceResolver;
pub use report::{render_folder_report, top_folders};
