//! Code-execution sandbox tool: runs an analysis script against the
//! dataset and extracts a single result value.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::script::{render_value, Interpreter};
use super::{Tool, FAILURE_MARKER, INFO_MARKER};
use crate::dataset::DataFrame;

/// Reserved variable the script must leave its answer in.
pub const RESULT_VAR: &str = "result";

/// Tabular results render at most this many data rows.
const MAX_RESULT_ROWS: usize = 50;

const BLOCK_KEYWORDS: &[&str] = &["import", "def", "class", "for", "while", "if"];

pub struct SandboxTool {
    df: Arc<DataFrame>,
}

impl SandboxTool {
    pub fn new(df: Arc<DataFrame>) -> Self {
        Self { df }
    }

    /// Run a script. All outcomes are strings: the rendered result, an
    /// `[INFO]` notice when no result variable was set, or a `[FAILURE]`
    /// message for any caught error. Never returns `Err`, never panics.
    pub fn execute(&self, snippet: &str) -> String {
        let rewritten = apply_capture(snippet);
        debug!(script = %rewritten, "sandbox execution");

        let mut interp = Interpreter::new(Arc::clone(&self.df));
        for line in rewritten.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Err(e) = interp.exec_line(line) {
                return format!("{FAILURE_MARKER} error while executing the script: {e}");
            }
        }

        match interp.get(RESULT_VAR) {
            Some(value) => render_value(value, MAX_RESULT_ROWS),
            None => format!(
                "{INFO_MARKER} the script ran but did not set the '{RESULT_VAR}' variable. \
                 Executed script:\n{rewritten}"
            ),
        }
    }
}

impl Tool for SandboxTool {
    fn name(&self) -> &str {
        "run_analysis_script"
    }

    fn description(&self) -> &str {
        "Executes an analysis script against the loaded dataset. The dataset is bound to 'df'; \
         select a column with df[\"name\"]. Tabular helpers live under 'tab' (head, tail, shape, \
         columns, describe, value_counts, group_sum) and numeric helpers under 'num' (mean, \
         median, std, var, min, max, sum, count, corr, quantile, abs, sqrt, round). One statement \
         per line; assign intermediate values with '='. End with a bare expression, or assign to \
         'result', to report the answer."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The analysis script to execute against 'df'."
                }
            },
            "required": ["code"]
        })
    }

    fn invoke(&self, args_json: &str) -> String {
        #[derive(Deserialize)]
        struct Args {
            code: String,
        }
        match serde_json::from_str::<Args>(args_json) {
            Ok(args) => self.execute(&args.code),
            Err(e) => format!("{FAILURE_MARKER} invalid tool arguments: {e}"),
        }
    }
}

/// Last-expression capture: when the final non-empty, non-comment line is
/// neither an assignment nor a block-opening statement, rewrite it into an
/// assignment to the reserved result variable.
fn apply_capture(snippet: &str) -> String {
    let lines: Vec<&str> = snippet.lines().collect();
    let last = lines
        .iter()
        .rposition(|l| !l.trim().is_empty() && !l.trim().starts_with('#'));
    let Some(last) = last else {
        return snippet.to_string();
    };

    let trimmed = lines[last].trim();
    let first_word = trimmed.split_whitespace().next().unwrap_or("");
    if has_top_level_assign(trimmed) || BLOCK_KEYWORDS.contains(&first_word) {
        return snippet.to_string();
    }

    let mut out: Vec<String> = lines[..last].iter().map(|l| l.to_string()).collect();
    out.push(format!("{RESULT_VAR} = {trimmed}"));
    out.join("\n")
}

/// Detects a plain `=` outside string literals, ignoring the comparison
/// spellings `==`, `<=`, `>=` and `!=`.
fn has_top_level_assign(line: &str) -> bool {
    let chars: Vec<char> = line.chars().collect();
    let mut quote: Option<char> = None;
    for (i, &c) in chars.iter().enumerate() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '#' => return false,
                '=' => {
                    let prev = i.checked_sub(1).and_then(|j| chars.get(j).copied());
                    let next = chars.get(i + 1).copied();
                    let comparison = matches!(prev, Some('=' | '<' | '>' | '!'))
                        || matches!(next, Some('='));
                    if !comparison {
                        return true;
                    }
                }
                _ => {}
            },
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnValues};

    fn tool() -> SandboxTool {
        SandboxTool::new(Arc::new(DataFrame::from_columns(vec![
            Column {
                name: "age".into(),
                values: ColumnValues::Numeric(vec![Some(20.0), Some(30.0), Some(40.0)]),
            },
            Column {
                name: "label".into(),
                values: ColumnValues::Text((0..120).map(|i| Some(format!("id-{i:03}"))).collect()),
            },
        ])))
    }

    #[test]
    fn bare_trailing_expression_is_captured() {
        assert_eq!(tool().execute("num.mean(df[\"age\"])"), "30");
    }

    #[test]
    fn explicit_result_assignment_works() {
        assert_eq!(tool().execute("result = num.max(df[\"age\"]) - num.min(df[\"age\"])"), "20");
    }

    #[test]
    fn assignment_on_last_line_is_not_rewritten() {
        let out = tool().execute("x = num.sum(df[\"age\"])");
        assert!(out.starts_with(INFO_MARKER), "got: {out}");
        assert!(out.contains("x = num.sum"));
    }

    #[test]
    fn errors_come_back_as_failure_strings() {
        let out = tool().execute("num.mean(df[\"missing\"])");
        assert!(out.starts_with(FAILURE_MARKER));
        assert!(out.contains("unknown column 'missing'"));

        let out = tool().execute("this is not ( valid");
        assert!(out.starts_with(FAILURE_MARKER));
    }

    #[test]
    fn long_tables_are_truncated_to_fifty_rows() {
        let out = tool().execute("tab.value_counts(df[\"label\"])");
        assert!(out.contains("[truncated: showing 50 of 120 rows]"));
        let data_rows = out.lines().count() - 2; // header + notice
        assert_eq!(data_rows, 50);
    }

    #[test]
    fn comparison_spellings_do_not_count_as_assignment() {
        assert!(!has_top_level_assign("a == b"));
        assert!(!has_top_level_assign("a <= b"));
        assert!(!has_top_level_assign("x != 1"));
        assert!(has_top_level_assign("x = 1"));
        assert!(!has_top_level_assign("tab.head(df, 2)"));
        assert!(!has_top_level_assign("df[\"a=b\"]"));
    }

    #[test]
    fn block_keyword_lines_are_left_alone() {
        let out = tool().execute("if something");
        // not rewritten into an assignment, so parsing fails inside the line
        assert!(out.starts_with(FAILURE_MARKER));
    }

    #[test]
    fn invoke_rejects_malformed_arguments() {
        let out = tool().invoke("{not json");
        assert!(out.starts_with(FAILURE_MARKER));
    }

    #[test]
    fn multi_line_script_keeps_intermediate_state() {
        let script = "m = num.mean(df[\"age\"])\ns = num.std(df[\"age\"])\nnum.round(m + s, 2)";
        assert_eq!(tool().execute(script), "40");
    }
}
