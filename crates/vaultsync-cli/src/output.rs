use vaultsync_sync::SyncReport;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

// ============================================================================
// Report rendering
// ============================================================================

pub fn report_json(operation: &str, report: &SyncReport) -> serde_json::Value {
    serde_json::json!({
        "operation": operation,
        "refused": report.refused,
        "downloaded": report.downloaded,
        "uploaded": report.uploaded,
        "deleted": report.deleted,
        "skipped": report.skipped,
        "failed": report.failed,
        "duration_ms": report.duration_ms,
    })
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Print the summary of one operation
pub fn print_report(
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
    operation: &str,
    report: &SyncReport,
) {
    if format == OutputFormat::Json {
        fmt.print_json(&report_json(operation, report));
        return;
    }

    if let Some(reason) = &report.refused {
        fmt.warn(&format!("{operation} not started: {reason}"));
        return;
    }

    let total = report.downloaded + report.uploaded + report.deleted;
    if total == 0 && report.failed.is_empty() {
        fmt.success("Already up to date");
    } else {
        fmt.success(&format!(
            "{} completed in {}",
            capitalize(operation),
            format_duration(report.duration_ms)
        ));
    }

    if report.downloaded > 0 {
        fmt.info(&format!(
            "Downloaded: {} item{}",
            report.downloaded,
            plural(report.downloaded)
        ));
    }
    if report.uploaded > 0 {
        fmt.info(&format!(
            "Uploaded:   {} item{}",
            report.uploaded,
            plural(report.uploaded)
        ));
    }
    if report.deleted > 0 {
        fmt.info(&format!(
            "Deleted:    {} item{}",
            report.deleted,
            plural(report.deleted)
        ));
    }
    if report.skipped > 0 {
        fmt.info(&format!("Skipped:    {}", report.skipped));
    }

    if !report.failed.is_empty() {
        fmt.error(&format!(
            "{} item{} failed and stay pending:",
            report.failed.len(),
            plural(report.failed.len())
        ));
        for path in &report.failed {
            fmt.info(&format!("  - {}", path));
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
