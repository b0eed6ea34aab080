//! Table and JSON rendering of a deletion outcome

use decom_orchestrator::DeletionOutcome;

use crate::commands::OutputFormat;
use crate::Result;

/// Print the outcome of a deletion run in the requested format
pub fn print_outcome(outcome: &DeletionOutcome, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Table => print!("{}", render_outcome(outcome)),
    }
    Ok(())
}

fn render_outcome(outcome: &DeletionOutcome) -> String {
    let mut rows: Vec<Vec<String>> = outcome
        .removed
        .iter()
        .map(|id| vec![id.clone(), "Deleted".to_string(), String::new()])
        .collect();
    rows.extend(outcome.failed.iter().map(|f| {
        vec![f.unit.clone(), f.kind.to_string(), f.reason.clone()]
    }));

    let mut out = format!("Cluster {}: {}\n\n", outcome.cluster, outcome.status());
    out.push_str(&render_table(&["UNIT", "RESULT", "REASON"], &rows));

    if !outcome.warnings.is_empty() {
        out.push('\n');
        for warning in &outcome.warnings {
            out.push_str(&format!("warning ({}): {}\n", warning.kind, warning.message));
        }
    }
    out
}

/// Render rows as a column-aligned table under the given headers.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = w)
            })
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers.to_vec());
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}
