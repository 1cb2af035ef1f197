//! Pipeline entry points for harvester operations.
//!
//! - `CrawlController`: frontier state machine from seeds to quota
//! - `run_crawler`: wire live transport and run the controller

pub mod controller;
pub mod crawl;
pub mod state;

pub use controller::CrawlController;
pub use crawl::{log_summary, run_crawler};
pub use state::CrawlState;
