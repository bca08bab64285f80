//! One-shot check report.

use serde::Serialize;

use boxwatch_core::TargetSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// False if the deadline passed before every target finished a cycle.
    pub complete: bool,
    pub targets: Vec<TargetSnapshot>,
}

impl CheckReport {
    /// Build a report with targets sorted by hostname.
    pub fn new(mut targets: Vec<TargetSnapshot>, complete: bool) -> Self {
        targets.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Self { complete, targets }
    }

    pub fn reachable(&self) -> usize {
        self.targets.iter().filter(|t| t.status.is_reachable()).count()
    }

    pub fn all_reachable(&self) -> bool {
        self.complete && self.reachable() == self.targets.len()
    }
}

pub fn format_report(report: &CheckReport) -> String {
    let width = report
        .targets
        .iter()
        .map(|t| t.hostname.len())
        .max()
        .unwrap_or(0)
        .max("HOST".len());

    let mut out = format!("{:<width$}  {:<9}  {}\n", "HOST", "STATUS", "CYCLES");
    for target in &report.targets {
        out.push_str(&format!(
            "{:<width$}  {:<9}  {}\n",
            target.hostname,
            target.status.as_str(),
            target.cycles
        ));
    }
    out.push_str(&format!(
        "\n{}/{} reachable\n",
        report.reachable(),
        report.targets.len()
    ));
    if !report.complete {
        out.push_str("deadline passed before every target finished a probe\n");
    }
    out
}
