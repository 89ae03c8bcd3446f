mod aggregator;
mod summary;
pub mod views;

pub use aggregator::ReportAggregator;
pub use summary::{DailyCollections, MethodTotal};
