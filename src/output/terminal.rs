//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::config::Alternative;
use crate::result::{RarefactionPoint, ShiftReport};

/// Significance level used for the headline verdict.
const REPORT_ALPHA: f64 = 0.05;

/// Format a ShiftReport for human-readable terminal output.
pub fn format_report(report: &ShiftReport) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);
    let test = &report.test;

    output.push_str("clade-shift\n");
    output.push_str(&sep);
    output.push('\n');
    output.push('\n');

    output.push_str(&format!("  Method: {}\n", report.method));
    if let Some(reconstruction) = &report.reconstruction {
        output.push_str(&format!(
            "  Transition rate: {:.4} (log-likelihood {:.3})\n",
            reconstruction.rate, reconstruction.log_likelihood
        ));
    }
    output.push_str(&format!(
        "  Clades: {}, change points: {}\n",
        report.bundle.clades.len(),
        report.bundle.node_changes.len()
    ));
    output.push_str(&format!(
        "  Values: {} normal, {} at a change\n",
        report.bundle.num_normal(),
        report.bundle.num_change()
    ));
    output.push('\n');

    if test.is_significant(REPORT_ALPHA) {
        output.push_str(&format!("  {}\n\n", "\u{26A0} Shift detected at changes".yellow().bold()));
    } else {
        output.push_str(&format!("  {}\n\n", "\u{2713} No shift detected".green().bold()));
    }

    output.push_str(&format!(
        "    Observed effect: {:.4} ({}(all) - {}(change))\n",
        test.observed, test.statistic, test.statistic
    ));
    output.push_str(&format!(
        "    p-value: {:.4} ({}, {} replicates)\n",
        test.p_value,
        format_alternative(test.alternative),
        test.replicates
    ));
    output.push_str(&format!(
        "    Null {:.0}% interval: [{:.4}, {:.4}]\n",
        test.expvar.level * 100.0,
        test.expvar.lower,
        test.expvar.upper
    ));

    if let Some(curve) = &test.rarefaction {
        output.push('\n');
        output.push_str("    Rarefaction (size: median p, fraction significant):\n");
        for point in curve {
            output.push_str(&format_rarefaction_point(point));
        }
    }

    output.push('\n');
    output.push_str(&sep);
    output.push('\n');
    output.push_str(&format!(
        "Seed {}, runtime {:.2}s\n",
        test.seed, report.runtime_secs
    ));

    output
}

fn format_alternative(alternative: Alternative) -> &'static str {
    match alternative {
        Alternative::TwoSided => "two-sided",
        Alternative::Less => "less",
        Alternative::Greater => "greater",
    }
}

fn format_rarefaction_point(point: &RarefactionPoint) -> String {
    let p = format!("{:.3}", point.median_p_value);
    let p = if point.median_p_value < REPORT_ALPHA {
        p.red().to_string()
    } else {
        p
    };
    format!(
        "      {:>4}: {}  {:.0}%\n",
        point.size,
        p,
        point.fraction_significant * 100.0
    )
}
