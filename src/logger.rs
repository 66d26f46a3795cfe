use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::driver::{average, FlowReport};
use crate::error::Result;

pub const CSV_HEADER: &str =
    "time_s,algorithm,memory_kb,flow_id,k,window_us,packets,are,cosine_sim,euclidean_dist,energy_sim";

/// Appends flow reports to a results CSV, writing the header into an empty file.
pub struct ReportLogger {
    log_file: BufWriter<File>,
}

impl ReportLogger {
    pub fn new(log_file_path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        let empty = file.metadata()?.len() == 0;
        let mut log_file = BufWriter::new(file);
        if empty {
            writeln!(log_file, "{}", CSV_HEADER)?;
        }
        Ok(Self { log_file })
    }

    pub fn log_reports(&mut self, reports: &[FlowReport]) -> Result<()> {
        for r in reports {
            writeln!(
                self.log_file,
                "{},{},{},{},{},{},{},{},{},{},{}",
                r.time_s,
                r.algorithm,
                r.memory_kb,
                r.flow_id,
                r.k,
                r.window_us,
                r.packets,
                r.metrics.are,
                r.metrics.cosine_sim,
                r.metrics.euclidean_dist,
                r.metrics.energy_sim
            )?;
        }
        self.log_file.flush()?;
        Ok(())
    }
}

/// Human-readable run summary, one block per scheme.
pub fn summarize(reports: &[FlowReport]) -> String {
    let Some(first) = reports.first() else {
        return String::from("no flows evaluated\n");
    };
    let mut out = String::new();
    out.push_str(&format!(
        "===== {} ({} KB, K={}) =====\n",
        first.algorithm, first.memory_kb, first.k
    ));
    out.push_str(&format!(
        "Average ARE: {:.4}\n",
        average(reports.iter().map(|r| r.metrics.are))
    ));
    out.push_str(&format!(
        "Average cosine similarity: {:.4}\n",
        average(reports.iter().map(|r| r.metrics.cosine_sim))
    ));
    out.push_str(&format!(
        "Average energy similarity: {:.4}\n",
        average(reports.iter().map(|r| r.metrics.energy_sim))
    ));
    out.push_str(&format!(
        "Flows: {}, packets: {}\n",
        reports.len(),
        reports.iter().map(|r| r.packets).sum::<u64>()
    ));
    out
}
