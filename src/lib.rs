pub mod config;
pub mod diff_detector;
pub mod domain;
pub mod error;
pub mod git;
pub mod manifest;
pub mod namer;
pub mod reactor;
pub mod release;
pub mod tag_finder;
pub mod ui;

pub use error::{ReleaseError, Result};
