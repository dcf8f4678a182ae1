//! At-exit report destinations and environment parsing

use drake_runtime::{
    CapturePlatform, ReportConfig, ReportDestination, ReportFormat, Runtime, RuntimeConfig, Value,
};
use serial_test::serial;
use std::rc::Rc;

#[cfg(feature = "report-json")]
#[test]
fn test_json_report_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let report = ReportConfig {
        format: ReportFormat::Json,
        destination: ReportDestination::File(path.to_string_lossy().into_owned()),
        include_classes: false,
    };
    let platform = Rc::new(CapturePlatform::new());
    let config = RuntimeConfig::default().with_report(Some(report));
    let rt = Runtime::with_platform(config, platform.clone());

    rt.define_class("Widget");
    rt.invoke(&Value::Int64(1), "succ", &[], None).unwrap();
    rt.emit_report();

    let text = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["classes"], 1);
    assert_eq!(json["invocations"], 1);
    assert!(platform.stderr_string().is_empty());
}

#[test]
fn test_unwritable_path_falls_back_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("report.txt");
    let report = ReportConfig {
        format: ReportFormat::Human,
        destination: ReportDestination::File(path.to_string_lossy().into_owned()),
        include_classes: true,
    };
    let platform = Rc::new(CapturePlatform::new());
    let config = RuntimeConfig::default().with_report(Some(report));
    let rt = Runtime::with_platform(config, platform.clone());
    rt.define_class("Gadget");
    rt.emit_report();

    let errors = platform.stderr_string();
    assert!(errors.contains("=== DRAKE REPORT ==="));
    assert!(errors.contains("Gadget"));
}

#[test]
#[serial]
fn test_report_from_environment() {
    unsafe {
        std::env::set_var("DRAKE_REPORT", "classes");
    }
    let config = RuntimeConfig::from_env();
    unsafe {
        std::env::remove_var("DRAKE_REPORT");
    }
    let report = config.report.unwrap();
    assert!(report.include_classes);
    assert_eq!(report.destination, ReportDestination::Stderr);
}

#[test]
#[serial]
fn test_quiet_from_environment_silences_diagnostics() {
    unsafe {
        std::env::set_var("DRAKE_QUIET", "1");
    }
    let config = RuntimeConfig::from_env();
    unsafe {
        std::env::remove_var("DRAKE_QUIET");
    }
    let platform = Rc::new(CapturePlatform::new());
    let rt = Runtime::with_platform(config, platform.clone());
    rt.invoke(&Value::Nil, "boom", &[], None).unwrap();
    assert!(platform.stderr_string().is_empty());
    assert_eq!(rt.stats().soft_failures.get(), 1);
}
