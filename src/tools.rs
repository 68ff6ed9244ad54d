pub mod key_metrics;
pub mod opportunity_report;
pub mod summary;
