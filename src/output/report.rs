//! Crawl report
//!
//! The only direct output of a crawl: what happened and how long it took.

use std::time::Duration;

/// Counters collected over one crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    /// Listener tasks (and pooled fetchers) used
    pub workers: usize,

    /// Distinct pages submitted to the work queue
    pub submitted: usize,

    /// Rows written by the persistence task
    pub persisted: usize,

    /// Extracted records that left the store as it was, such as a headshot
    /// already on file or one for a player not yet stored
    pub unchanged: usize,

    /// Failed extraction attempts, retried or not
    pub failures: usize,

    /// Pages dropped after exhausting their attempts
    pub abandoned: usize,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Pages per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.persisted as f64 / secs
        } else {
            0.0
        }
    }

    /// True when every submitted page was extracted and handed to the store
    pub fn is_complete(&self) -> bool {
        self.abandoned == 0 && self.persisted + self.unchanged == self.submitted
    }
}

/// Prints a report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("  Workers: {}", report.workers);
    println!("  Pages submitted: {}", report.submitted);
    println!("  Records persisted: {}", report.persisted);
    println!("  Records unchanged: {}", report.unchanged);
    println!("  Failed attempts: {}", report.failures);
    println!("  Pages abandoned: {}", report.abandoned);
    println!(
        "  Elapsed: {:.2}s ({:.2} pages/sec)",
        report.elapsed.as_secs_f64(),
        report.rate()
    );
}
