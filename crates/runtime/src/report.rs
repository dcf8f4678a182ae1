//! At-exit report for compiled programs
//!
//! Dumps runtime counters when the program finishes, controlled by the
//! `DRAKE_REPORT` env var:
//! - Unset or `0` → no report
//! - `1` → human-readable to stderr
//! - `classes` → human-readable plus a per-class method listing
//! - `json` → JSON to stderr
//! - `json:/path` → JSON to file
//!
//! JSON needs the `report-json` feature (default); without it the human
//! format is used instead.

use crate::error::ConfigError;
use crate::platform::Stream;
use crate::runtime::Runtime;
use serde::Serialize;
use std::io::Write;

/// Output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    Stderr,
    File(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub destination: ReportDestination,
    /// List every class with its method count
    pub include_classes: bool,
}

impl ReportConfig {
    pub fn human() -> Self {
        Self {
            format: ReportFormat::Human,
            destination: ReportDestination::Stderr,
            include_classes: false,
        }
    }

    /// Parse a `DRAKE_REPORT` value; `Ok(None)` means reporting is off
    pub fn parse(value: &str) -> Result<Option<Self>, ConfigError> {
        let config = match value {
            "" | "0" => return Ok(None),
            "1" => Self::human(),
            "classes" => Self {
                include_classes: true,
                ..Self::human()
            },
            "json" => Self {
                format: ReportFormat::Json,
                ..Self::human()
            },
            s => match s.strip_prefix("json:") {
                Some(path) if !path.is_empty() => Self {
                    format: ReportFormat::Json,
                    destination: ReportDestination::File(path.to_string()),
                    include_classes: false,
                },
                _ => return Err(ConfigError::InvalidReport(value.to_string())),
            },
        };
        Ok(Some(config))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub name: String,
    pub methods: usize,
    pub constants: usize,
    pub superclass: Option<String>,
}

/// Collected metrics for the report
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub classes: usize,
    pub methods: usize,
    pub singleton_methods: usize,
    pub constants: usize,
    pub invocations: u64,
    pub soft_failures: u64,
    pub raises: u64,
    pub peak_frames: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_summaries: Option<Vec<ClassSummary>>,
}

pub fn collect_report_data(rt: &Runtime, include_classes: bool) -> ReportData {
    let classes = rt.classes.borrow();
    let class_summaries = include_classes.then(|| {
        classes
            .iter()
            .map(|(_, class)| ClassSummary {
                name: class.name.to_string(),
                methods: class.methods().len(),
                constants: class.constants().len(),
                superclass: class
                    .superclass
                    .and_then(|id| classes.name(id))
                    .map(|n| n.to_string()),
            })
            .collect()
    });
    ReportData {
        classes: classes.len(),
        methods: classes.method_count(),
        singleton_methods: rt.singletons.borrow().len(),
        constants: rt.constants.borrow().len(),
        invocations: rt.stats.invocations.get(),
        soft_failures: rt.stats.soft_failures.get(),
        raises: rt.stats.raises.get(),
        peak_frames: rt.stats.peak_frames.get(),
        class_summaries,
    }
}

pub fn format_human(data: &ReportData) -> String {
    let mut out = String::new();
    out.push_str("=== DRAKE REPORT ===\n");
    out.push_str(&format!("Classes:          {}\n", data.classes));
    out.push_str(&format!("Methods:          {}\n", data.methods));
    out.push_str(&format!("Singletons:       {}\n", data.singleton_methods));
    out.push_str(&format!("Constants:        {}\n", data.constants));
    out.push_str(&format!("Invocations:      {}\n", data.invocations));
    out.push_str(&format!("Soft failures:    {}\n", data.soft_failures));
    out.push_str(&format!("Raises:           {}\n", data.raises));
    out.push_str(&format!("Peak frames:      {}\n", data.peak_frames));

    if let Some(ref classes) = data.class_summaries {
        out.push_str("\n--- Classes ---\n");
        for class in classes {
            let parent = class.superclass.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "  {:24} < {:16} {} methods, {} constants\n",
                class.name, parent, class.methods, class.constants
            ));
        }
    }

    out.push_str("====================\n");
    out
}

#[cfg(feature = "report-json")]
pub fn format_json(data: &ReportData) -> String {
    serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(not(feature = "report-json"))]
pub fn format_json(data: &ReportData) -> String {
    tracing::warn!(
        target: "drake_runtime",
        "DRAKE_REPORT=json requires the 'report-json' feature, falling back to human format"
    );
    format_human(data)
}

impl Runtime {
    /// Emit the report configured in `RuntimeConfig::report`, if any
    pub fn emit_report(&self) {
        let Some(config) = self.config.report.clone() else {
            return;
        };
        let data = collect_report_data(self, config.include_classes);
        let output = match config.format {
            ReportFormat::Human => format_human(&data),
            ReportFormat::Json => format_json(&data),
        };

        match &config.destination {
            ReportDestination::Stderr => self.platform.write(Stream::Stderr, output.as_bytes()),
            ReportDestination::File(path) => {
                let written =
                    std::fs::File::create(path).and_then(|mut f| f.write_all(output.as_bytes()));
                if let Err(e) = written {
                    tracing::warn!(
                        target: "drake_runtime",
                        "could not write report to {}: {}",
                        path,
                        e
                    );
                    self.platform.write(Stream::Stderr, output.as_bytes());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Method;
    use crate::config::RuntimeConfig;
    use crate::error::RtResult;
    use crate::platform::CapturePlatform;
    use crate::value::Value;
    use std::rc::Rc;

    fn noop(_rt: &Runtime, _recv: &Value, _args: &[Value]) -> RtResult<Value> {
        Ok(Value::Nil)
    }

    #[test]
    fn test_parse_variants() {
        let test_cases = vec![
            ("", None),
            ("0", None),
            ("1", Some(ReportConfig::human())),
            (
                "classes",
                Some(ReportConfig {
                    include_classes: true,
                    ..ReportConfig::human()
                }),
            ),
            (
                "json",
                Some(ReportConfig {
                    format: ReportFormat::Json,
                    ..ReportConfig::human()
                }),
            ),
            (
                "json:/tmp/report.json",
                Some(ReportConfig {
                    format: ReportFormat::Json,
                    destination: ReportDestination::File("/tmp/report.json".to_string()),
                    include_classes: false,
                }),
            ),
        ];
        for (input, expected) in test_cases {
            assert_eq!(ReportConfig::parse(input).unwrap(), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            ReportConfig::parse("xml"),
            Err(ConfigError::InvalidReport("xml".to_string()))
        );
        assert!(ReportConfig::parse("json:").is_err());
    }

    #[test]
    fn test_collect_counts() {
        let rt = Runtime::new();
        let animal = rt.define_class("Animal");
        let dog = rt.define_class("Dog");
        rt.set_superclass(&dog, &animal);
        rt.define_method(&animal, Method::native("speak", noop));
        rt.define_singleton_method(&dog, Method::native("create", noop));
        rt.invoke(&dog, "create", &[], None).unwrap();

        let data = collect_report_data(&rt, true);
        assert_eq!(data.classes, 2);
        assert_eq!(data.methods, 1);
        assert_eq!(data.singleton_methods, 1);
        assert_eq!(data.constants, 2);
        assert_eq!(data.invocations, 1);
        let summaries = data.class_summaries.unwrap();
        assert_eq!(summaries[1].superclass.as_deref(), Some("Animal"));
    }

    #[test]
    fn test_format_human() {
        let rt = Runtime::new();
        rt.define_class("Solo");
        let text = format_human(&collect_report_data(&rt, true));
        assert!(text.starts_with("=== DRAKE REPORT ===\n"));
        assert!(text.contains("Classes:          1\n"));
        assert!(text.contains("--- Classes ---"));
        assert!(text.contains("Solo"));
    }

    #[cfg(feature = "report-json")]
    #[test]
    fn test_format_json() {
        let rt = Runtime::new();
        let json = format_json(&collect_report_data(&rt, false));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["classes"], 0);
        assert!(parsed.get("class_summaries").is_none());
    }

    #[test]
    fn test_emit_to_error_stream() {
        let platform = Rc::new(CapturePlatform::new());
        let config = RuntimeConfig::default().with_report(Some(ReportConfig::human()));
        let rt = Runtime::with_platform(config, platform.clone());
        rt.emit_report();
        assert!(platform.stderr_string().contains("DRAKE REPORT"));
    }

    #[test]
    fn test_emit_without_config_is_silent() {
        let platform = Rc::new(CapturePlatform::new());
        let rt = Runtime::with_platform(RuntimeConfig::default(), platform.clone());
        rt.emit_report();
        assert!(platform.stderr_string().is_empty());
    }
}
