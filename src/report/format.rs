//! Formatted terminal output for fit results.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{BinomialFit, JumpFit, OrderDiagnostic};

/// Format the cluster-size fit summary (chosen model + per-order diagnostics).
pub fn format_cluster_fit(fit: &BinomialFit, sample_count: usize) -> String {
    let mut out = String::new();

    out.push_str("=== Cluster-size fit (zero-truncated binomial) ===\n");
    out.push_str(&format!("Sample: n={sample_count}\n"));

    out.push_str("\nOrder diagnostics:\n");
    out.push_str(&format_order_table(&fit.orders, fit.n_trials));

    out.push_str("\nChosen model:\n");
    out.push_str(&format!("- N = {}\n", fit.n_trials));
    out.push_str(&format!("- p = {:.6}\n", fit.p));
    out.push_str(&format!("- SSE = {:.6e}\n", fit.sum_of_squares));
    out.push('\n');

    out
}

/// Format the jump-distance fit summary (chosen mixture + diagnostics +
/// rejected orders).
pub fn format_jump_fit(fit: &JumpFit, sample_count: usize) -> String {
    let mut out = String::new();

    out.push_str("=== Jump-distance fit (exponential mixture) ===\n");
    out.push_str(&format!("Sample: n={sample_count}\n"));

    out.push_str("\nOrder diagnostics:\n");
    out.push_str(&format_order_table(&fit.orders, fit.order));
    for (order, reason) in &fit.rejected {
        out.push_str(&format!("  (rejected order {order}) {reason}\n"));
    }

    out.push_str("\nChosen model:\n");
    out.push_str(&format!("- populations: {}\n", fit.order));
    out.push_str(&format!("- coefficients: {}\n", fmt_vec(&fit.coefficients)));
    out.push_str(&format!("- fractions   : {}\n", fmt_vec(&fit.fractions)));
    out.push_str(&format!("- SSE = {:.6e}\n", fit.sum_of_squares));
    out.push('\n');

    out
}

fn format_order_table(orders: &[OrderDiagnostic], chosen: usize) -> String {
    let mut out = String::new();
    for diag in orders {
        let marker = if diag.order == chosen { "*" } else { " " };
        out.push_str(&format!(
            "{marker} order {:<3} SSE={:.6e} BIC={:.3}\n",
            diag.order, diag.sum_of_squares, diag.ic
        ));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}
