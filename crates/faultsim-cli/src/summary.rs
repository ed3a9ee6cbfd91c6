//! Coverage summary over a persisted report tree

use faultsim_core::ReportTree;

/// Rolled-up view of one report.
pub struct Summary {
    pub attempts: usize,
    pub caught: usize,
    /// One line per undetected fault: "endpoint field kind (test)"
    pub gaps: Vec<String>,
}

impl Summary {
    #[must_use]
    pub fn not_detected(&self) -> usize {
        self.attempts - self.caught
    }
}

/// Walk the nested tree and count detections and gaps.
#[must_use]
pub fn summarize(tree: &ReportTree) -> Summary {
    let mut summary = Summary {
        attempts: 0,
        caught: 0,
        gaps: Vec::new(),
    };
    for (endpoint, fields) in tree {
        for (field, kinds) in fields {
            for (kind, attempts) in kinds {
                for attempt in attempts {
                    summary.attempts += 1;
                    if attempt.caught {
                        summary.caught += 1;
                    } else {
                        summary
                            .gaps
                            .push(format!("{endpoint} {field} {kind} ({})", attempt.test));
                    }
                }
            }
        }
    }
    summary
}

/// Human-readable rendering, one block per endpoint plus totals.
#[must_use]
pub fn render(tree: &ReportTree) -> String {
    let mut out = String::new();
    for (endpoint, fields) in tree {
        out.push_str(&format!("{endpoint}\n"));
        for (field, kinds) in fields {
            for (kind, attempts) in kinds {
                let caught = attempts.iter().filter(|a| a.caught).count();
                out.push_str(&format!(
                    "  {field:<16} {kind:<20} {caught}/{} caught\n",
                    attempts.len()
                ));
            }
        }
    }

    let summary = summarize(tree);
    out.push_str(&format!(
        "\n{} attempts, {} caught, {} not detected\n",
        summary.attempts,
        summary.caught,
        summary.not_detected()
    ));
    if !summary.gaps.is_empty() {
        out.push_str("\ncoverage gaps:\n");
        for gap in &summary.gaps {
            out.push_str(&format!("  {gap}\n"));
        }
    }
    out
}
