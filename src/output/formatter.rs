//! Output formatters for runs and results
//!
//! Provides table, JSON, CSV and summary output formats.

use serde::Serialize;

use crate::models::{Outcome, RunRecord, RunStatus};
use crate::results::{StoredResult, StoredRun};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn outcome_label(&self, outcome: Outcome) -> String {
        let label = format!("{} {}", outcome.symbol(), outcome.as_str().to_uppercase());
        if !self.colorize {
            return label;
        }
        let color = match outcome {
            Outcome::Success => "32",
            Outcome::Failure | Outcome::Error => "31",
            Outcome::Skip | Outcome::ExpectedFailure | Outcome::UnexpectedSuccess => "33",
        };
        format!("\x1b[{color}m{label}\x1b[0m")
    }

    fn status_label(&self, status: RunStatus) -> String {
        let label = status.as_str().to_uppercase();
        match (self.colorize, status) {
            (false, _) => label,
            (true, RunStatus::Success) => format!("\x1b[32m{label}\x1b[0m"),
            (true, RunStatus::Failure) => format!("\x1b[31m{label}\x1b[0m"),
        }
    }

    /// Format a single result
    pub fn format_result(&self, result: &StoredResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(result),
            OutputFormat::Csv => to_csv(&[], [Self::result_row(result)]).trim_end().to_string(),
            OutputFormat::Summary => self.format_result_summary(result),
        }
    }

    fn format_result_table(&self, result: &StoredResult) -> String {
        let record = &result.record;
        let mut line = format!(
            "{:3}. {:50} {:22} [{:>8}]",
            record.execution_order,
            record.full_name,
            self.outcome_label(record.status),
            record
                .duration_seconds
                .map(|d| format!("{d:.3}s"))
                .unwrap_or_else(|| "-".to_string())
        );
        if !record.sub_tests.is_empty() {
            let failed = record
                .sub_tests
                .iter()
                .filter(|s| s.result.fails_run())
                .count();
            line.push_str(&format!(" sub-tests: {}/{} failed", failed, record.sub_tests.len()));
        }
        if let Some(reason) = &record.reason_skipped {
            line.push_str(&format!(" ({reason})"));
        }
        line
    }

    fn result_row(result: &StoredResult) -> Vec<String> {
        let record = &result.record;
        vec![
            record.execution_order.to_string(),
            record.full_name.clone(),
            record.status.to_string(),
            record
                .duration_seconds
                .map(|d| format!("{d:.3}"))
                .unwrap_or_default(),
            record.sub_tests.len().to_string(),
            record.reason_skipped.clone().unwrap_or_default(),
        ]
    }

    fn format_result_summary(&self, result: &StoredResult) -> String {
        format!(
            "{} {}",
            result.record.status.symbol(),
            result.record.full_name
        )
    }

    /// Format the results of one run
    pub fn format_results(&self, results: &[StoredResult]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(results),
            OutputFormat::Csv => {
                to_csv(RESULT_CSV_HEADER, results.iter().map(Self::result_row))
            }
            OutputFormat::Table | OutputFormat::Summary => results
                .iter()
                .map(|r| self.format_result(r))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Format a run record
    pub fn format_run(&self, run: &RunRecord) -> String {
        match self.format {
            OutputFormat::Table => self.format_run_table(run),
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(run),
            OutputFormat::Csv => to_csv(RUN_CSV_HEADER, [Self::run_row(None, run)]),
            OutputFormat::Summary => self.format_run_brief(run),
        }
    }

    fn format_run_table(&self, run: &RunRecord) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Run {:20} {:35} ║\n",
            run.suite_name.as_deref().unwrap_or("-"),
            run.environment.as_deref().unwrap_or("")
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for outcome in Outcome::all() {
            output.push_str(&format!(
                "║  {:20} {:>6}                                   ║\n",
                outcome.as_str(),
                run.count(outcome)
            ));
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Executed: {:4} | Planned: {:>4} | Status: {}\n",
            run.tests_executed_count,
            run.total_tests_planned
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.status_label(run.status)
        ));
        output.push_str(&format!(
            "║  Started: {} by {}\n",
            run.start_time.format("%Y-%m-%d %H:%M:%S"),
            run.started_by
        ));
        if let Some(end) = run.end_time {
            output.push_str(&format!(
                "║  Ended:   {} ({:.1}s)\n",
                end.format("%Y-%m-%d %H:%M:%S"),
                (end - run.start_time).num_milliseconds() as f64 / 1000.0
            ));
        }
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn run_row(id: Option<&str>, run: &RunRecord) -> Vec<String> {
        vec![
            id.unwrap_or("").to_string(),
            run.suite_name.clone().unwrap_or_default(),
            run.start_time.to_rfc3339(),
            run.end_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
            run.tests_executed_count.to_string(),
            run.count(Outcome::Failure).to_string(),
            run.count(Outcome::Error).to_string(),
            run.status.to_string(),
        ]
    }

    fn format_run_brief(&self, run: &RunRecord) -> String {
        format!(
            "{} {}: {} executed, {} passed, {} failed, {} errors, {} skipped",
            self.status_label(run.status),
            run.suite_name.as_deref().unwrap_or("run"),
            run.tests_executed_count,
            run.count(Outcome::Success),
            run.count(Outcome::Failure),
            run.count(Outcome::Error),
            run.count(Outcome::Skip)
        )
    }

    /// Format a list of stored runs
    pub fn format_runs(&self, runs: &[StoredRun]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(runs),
            OutputFormat::Csv => to_csv(
                RUN_CSV_HEADER,
                runs.iter()
                    .map(|run| Self::run_row(Some(run.id.as_str()), &run.record)),
            ),
            OutputFormat::Summary => runs
                .iter()
                .map(|run| format!("{} {}", run.id, self.format_run_brief(&run.record)))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Table => self.format_runs_table(runs),
        }
    }

    fn format_runs_table(&self, runs: &[StoredRun]) -> String {
        let mut output = String::new();

        output.push_str(
            "┌──────────────────────────┬──────────────────────┬─────────────────────┬──────────┬──────────┐\n",
        );
        output.push_str(
            "│ Run ID                   │ Suite                │ Started             │ Executed │ Status   │\n",
        );
        output.push_str(
            "├──────────────────────────┼──────────────────────┼─────────────────────┼──────────┼──────────┤\n",
        );

        for run in runs {
            let status = self.status_label(run.record.status);
            output.push_str(&format!(
                "│ {:24} │ {:20} │ {:19} │ {:>8} │ {:8} │\n",
                run.id.as_str(),
                run.record.suite_name.as_deref().unwrap_or("-"),
                run.record.start_time.format("%Y-%m-%d %H:%M:%S"),
                run.record.tests_executed_count,
                status
            ));
        }

        output.push_str(
            "└──────────────────────────┴──────────────────────┴─────────────────────┴──────────┴──────────┘\n",
        );

        output
    }
}

const RUN_CSV_HEADER: &[&str] = &[
    "id", "suite", "start_time", "end_time", "executed", "failures", "errors", "status",
];

const RESULT_CSV_HEADER: &[&str] = &[
    "execution_order", "full_name", "status", "duration_seconds", "sub_tests", "reason_skipped",
];

/// Quoted CSV, header row first unless empty; rows that fail to serialize are dropped
fn to_csv<I>(header: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    if !header.is_empty() && writer.write_record(header).is_err() {
        return String::new();
    }
    for row in rows {
        if let Err(e) = writer.write_record(&row) {
            tracing::warn!("Skipping CSV row: {}", e);
        }
    }
    writer
        .into_inner()
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, ResultRecord, RunPlan, SubTestRecord};
    use crate::store::DocumentId;
    use chrono::Utc;

    fn result(status: Outcome) -> StoredResult {
        StoredResult {
            id: DocumentId::new("r1"),
            record: ResultRecord {
                run_id: Some(DocumentId::new("run")),
                suite: Some("api".to_string()),
                full_name: "api.T.test_a".to_string(),
                description: None,
                execution_order: 1,
                priority: Priority::Low,
                components: Vec::new(),
                main_component: None,
                tags: Vec::new(),
                defects: Vec::new(),
                start_time: Utc::now(),
                duration_seconds: Some(0.25),
                status,
                reason_skipped: None,
                stacktrace: None,
                log: None,
                sub_tests: vec![SubTestRecord {
                    params: serde_json::json!({"n": 1}),
                    result: Outcome::Failure,
                    stacktrace: None,
                }],
            },
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(OutputFormat::Json).no_color();
        assert_eq!(formatter.format, OutputFormat::Json);
        assert!(!formatter.colorize);
    }

    #[test]
    fn test_format_result_table() {
        let formatter = ResultFormatter::new(OutputFormat::Table).no_color();
        let output = formatter.format_result(&result(Outcome::Failure));
        assert!(output.contains("api.T.test_a"));
        assert!(output.contains("FAILURE"));
        assert!(output.contains("sub-tests: 1/1 failed"));
    }

    #[test]
    fn test_format_results_json_carries_id() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let output = formatter.format_results(&[result(Outcome::Success)]);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["id"], "r1");
        assert_eq!(value[0]["status"], "success");
    }

    #[test]
    fn test_format_run_summary() {
        let mut run = RunRecord::new(&RunPlan::new("api"), "host");
        run.result_counts.insert(Outcome::Success, 3);
        run.result_counts.insert(Outcome::Failure, 1);
        run.tests_executed_count = 4;
        run.status = RunStatus::Failure;

        let formatter = ResultFormatter::new(OutputFormat::Summary).no_color();
        assert_eq!(
            formatter.format_run(&run),
            "FAILURE api: 4 executed, 3 passed, 1 failed, 0 errors, 0 skipped"
        );
    }

    #[test]
    fn test_format_runs_csv() {
        let run = StoredRun {
            id: DocumentId::new("abc"),
            record: RunRecord::new(&RunPlan::new("api"), "host"),
        };
        let formatter = ResultFormatter::new(OutputFormat::Csv);
        let output = formatter.format_runs(&[run]);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], RUN_CSV_HEADER.join(","));
        assert!(lines[1].starts_with("abc,api,"));
        assert!(lines[1].ends_with(",0,0,0,success"));
    }

    #[test]
    fn test_csv_quotes_fields_with_commas() {
        let mut skipped = result(Outcome::Skip);
        skipped.record.full_name = "(tearDown, test_pass)".to_string();
        skipped.record.reason_skipped = Some("said \"no\", twice".to_string());
        let formatter = ResultFormatter::new(OutputFormat::Csv);

        let output = formatter.format_results(&[skipped.clone(), result(Outcome::Success)]);
        let mut reader = csv::Reader::from_reader(output.as_bytes());
        assert_eq!(reader.headers().unwrap().len(), RESULT_CSV_HEADER.len());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == RESULT_CSV_HEADER.len()));
        assert_eq!(&rows[0][1], "(tearDown, test_pass)");
        assert_eq!(&rows[0][2], "skip");
        assert_eq!(&rows[0][5], "said \"no\", twice");

        let single = formatter.format_result(&skipped);
        assert!(!single.ends_with('\n'));
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(single.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "(tearDown, test_pass)");

        let plan = RunPlan::new("api, nightly").with_environment("staging");
        let run = StoredRun {
            id: DocumentId::new("abc"),
            record: RunRecord::new(&plan, "host"),
        };
        let output = formatter.format_runs(&[run]);
        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), RUN_CSV_HEADER.len());
        assert_eq!(&row[1], "api, nightly");
        assert_eq!(&row[7], "success");
    }
}
