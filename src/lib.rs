pub mod config;
pub mod engine;
pub mod extractor;
pub mod features;
pub mod models;
pub mod report;

pub use config::ScanConfig;
pub use engine::{ModelVerdict, ScanEngine, ScanReport};
pub use extractor::{EmailRecord, HeaderBag};
pub use models::Verdict;
