/*!
 * Reporting functionality for flattree
 *
 * Renders a summary of a flatten run using the tabled library.
 */

use std::time::Duration;

use strum::IntoEnumIterator;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::scanner::{ScanStatistics, SkipReason};
use crate::utils::format_file_size;

/// Summary of a flatten run
#[derive(Debug, Clone)]
pub struct FlattenReport {
    /// Where the document was written
    pub output: String,
    /// Time taken to scan and encode
    pub duration: Duration,
    /// Scanner statistics
    pub statistics: ScanStatistics,
}

/// Report generator for flatten results
pub struct Reporter;

impl Reporter {
    /// Create a new reporter
    pub fn new() -> Self {
        Self
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Generate the report table
    pub fn generate_report(&self, report: &FlattenReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let stats = &report.statistics;
        let mut rows = vec![
            SummaryRow {
                key: "Output".to_string(),
                value: report.output.clone(),
            },
            SummaryRow {
                key: "Process Time".to_string(),
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "Files Collected".to_string(),
                value: self.format_number(stats.files_collected),
            },
            SummaryRow {
                key: "Total Size".to_string(),
                value: format_file_size(stats.total_bytes),
            },
            SummaryRow {
                key: "Pruned Directories".to_string(),
                value: self.format_number(stats.pruned_dirs),
            },
        ];

        // Only list skip reasons that actually occurred
        for reason in SkipReason::iter() {
            let count = stats.skipped(reason);
            if count > 0 {
                rows.push(SummaryRow {
                    key: format!("Skipped ({})", reason),
                    value: self.format_number(count),
                });
            }
        }

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    /// Print the report to stderr, keeping stdout free for the document
    pub fn print_report(&self, report: &FlattenReport) {
        eprintln!("\n{}", self.generate_report(report));
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
