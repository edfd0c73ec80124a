pub mod commands;
pub mod completions;
pub mod config;
pub mod error;
pub mod fs;
pub mod gate;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod process;
pub mod report;
pub mod steps;
pub mod transaction;
pub mod utils;
pub mod validation;

pub use error::{HardenError, Result};

/// ASCII art logo for the rampart CLI
pub const LOGO: &str = "\
   ┬─┐┌─┐┌┬┐┌─┐┌─┐┬─┐┌┬┐
   ├┬┘├─┤│││├─┘├─┤├┬┘ │
   ┴└─┴ ┴┴ ┴┴  ┴ ┴┴└─ ┴";
