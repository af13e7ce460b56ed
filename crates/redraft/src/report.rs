//! Human-readable summaries on stderr and the process exit code.

use colored::Colorize;

use redraft_core::StopReason;

use crate::run::{CritiqueReport, DocumentReport};

pub fn print_report(report: &DocumentReport) {
    eprintln!();
    match (&report.result, &report.error) {
        (Some(result), None) => {
            let heading = match result.stop_reason {
                StopReason::MaxIterations => "=== INCOMPLETE ===".bright_yellow(),
                _ => "=== CONVERGED ===".bright_green(),
            };
            eprintln!("{} {}", heading, report.input);
            eprintln!("Stop reason: {}", result.stop_reason);
            eprintln!(
                "Refinements: {} ({} critique passes)",
                result.iterations.len(),
                result.passes
            );
            eprintln!(
                "Scores: {}",
                result
                    .score_trajectory
                    .iter()
                    .map(|s| format!("{:.2}", s))
                    .collect::<Vec<_>>()
                    .join(" → ")
            );
            eprintln!("Duration: {:.1}s", result.total_duration_secs);
            if let Some(ref violation) = result.protected_field_violation {
                eprintln!("{} {}", "Revision rejected:".bright_red(), violation);
            }
            if let Some(ref path) = report.output_path {
                eprintln!("Output: {}", path.display());
            }
            if let Some(ref path) = report.session_path {
                eprintln!("Session: {}", path.display());
            }
        }
        (_, error) => {
            eprintln!("{} {}", "=== FAILED ===".bright_red(), report.input);
            if let Some(error) = error {
                eprintln!("Error: {}", error);
            }
            if let Some(ref path) = report.session_path {
                eprintln!("Session: {}", path.display());
            }
        }
    }
}

pub fn print_critique(report: &CritiqueReport) {
    eprintln!();
    match (&report.critique, &report.error) {
        (Some(critique), _) => {
            eprintln!("=== CRITIQUE === {}", report.input);
            eprintln!("Score: {:.2}", critique.overall_score());
            for issue in critique.issues() {
                eprintln!(
                    "  - [{}] {}: {}",
                    issue.severity, issue.category, issue.description
                );
            }
            if !critique.missing_sections().is_empty() {
                let missing: Vec<&str> = critique
                    .missing_sections()
                    .iter()
                    .map(String::as_str)
                    .collect();
                eprintln!("Missing sections: {}", missing.join(", "));
            }
            for (original, replacement) in critique.suggested_corrections() {
                eprintln!("  \"{}\" → \"{}\"", original, replacement);
            }
        }
        (None, error) => {
            eprintln!("{} {}", "=== FAILED ===".bright_red(), report.input);
            if let Some(error) = error {
                eprintln!("Error: {}", error);
            }
        }
    }
}

/// 2 if any document failed, 1 if any hit the iteration cap, else 0
pub fn exit_code(reports: &[DocumentReport]) -> i32 {
    let mut code = 0;
    for report in reports {
        match (&report.result, &report.error) {
            (Some(result), None) => code = code.max(result.exit_code()),
            _ => return 2,
        }
    }
    code
}

pub fn critique_exit_code(reports: &[CritiqueReport]) -> i32 {
    if reports.iter().all(|r| r.error.is_none()) {
        0
    } else {
        2
    }
}
