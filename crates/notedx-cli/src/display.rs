//! Terminal rendering for predictions and classification reports.

use notedx_ai::{ClassMetrics, ClassificationReport};
use notedx_core::PredictionResult;

/// Label on the first line, then probabilities, highest first, to three
/// decimals.
pub fn print_prediction(result: &PredictionResult) {
    print!("{}", format_prediction(result));
}

pub fn print_report(report: &ClassificationReport) {
    print!("{}", format_report(report));
}

fn format_prediction(result: &PredictionResult) -> String {
    let mut out = format!("Predicted label: {}\n", result.label);
    if result.probabilities.is_none() {
        out.push_str("Probabilities: not available for this model\n");
        return out;
    }
    out.push_str("Probabilities:\n");
    let ranked = result.ranked();
    let width = ranked.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (label, p) in ranked {
        out.push_str(&format!("  {label:<width$}  {p:.3}\n"));
    }
    out
}

fn format_report(report: &ClassificationReport) -> String {
    let width = report
        .classes
        .keys()
        .map(String::len)
        .chain(["weighted avg".len()])
        .max()
        .unwrap_or(0);

    let mut out = format!(
        "{:<width$}  {:>9}  {:>6}  {:>8}  {:>7}\n",
        "", "precision", "recall", "f1-score", "support"
    );
    for (label, m) in &report.classes {
        out.push_str(&metrics_row(label, m, width));
    }
    out.push('\n');
    out.push_str(&format!(
        "{:<width$}  {:>9}  {:>6}  {:>8.3}  {:>7}\n",
        "accuracy", "", "", report.accuracy, report.n_samples
    ));
    out.push_str(&metrics_row("macro avg", &report.macro_avg, width));
    out.push_str(&metrics_row("weighted avg", &report.weighted_avg, width));
    out
}

fn metrics_row(label: &str, m: &ClassMetrics, width: usize) -> String {
    format!(
        "{label:<width$}  {:>9.3}  {:>6.3}  {:>8.3}  {:>7}\n",
        m.precision, m.recall, m.f1_score, m.support
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probabilities_are_sorted_descending() {
        let result = PredictionResult {
            label: "flu".into(),
            probabilities: Some(vec![
                ("asthma".into(), 0.1),
                ("flu".into(), 0.7),
                ("migraine".into(), 0.2),
            ]),
        };
        let text = format_prediction(&result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Predicted label: flu");
        assert_eq!(lines[2], "  flu       0.700");
        assert_eq!(lines[3], "  migraine  0.200");
        assert_eq!(lines[4], "  asthma    0.100");
    }

    #[test]
    fn label_only_prediction() {
        let text = format_prediction(&PredictionResult::label_only("flu"));
        assert!(text.contains("not available"));
    }

    #[test]
    fn report_lists_every_class_and_averages() {
        let y = vec!["flu".to_string(), "migraine".to_string()];
        let report = notedx_ai::classification_report(&y, &y);
        let text = format_report(&report);
        for needle in ["flu", "migraine", "accuracy", "macro avg", "weighted avg", "1.000"] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }
}
