//! Output module for crawl reporting

mod report;

pub use report::{print_report, CrawlReport};
