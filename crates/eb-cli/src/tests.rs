use super::*;
use eb_core::ErrorKind;

fn demo_output(kind: EngineKind) -> String {
    let mut out = Vec::new();
    run_demo(kind, ContextOptions::default(), &mut out).expect("demo should pass");
    String::from_utf8(out).expect("utf8 output")
}

fn engine_args(engine: EngineChoice, timeout_ms: Option<u64>) -> EngineArgs {
    EngineArgs { engine, timeout_ms }
}

#[test]
fn demo_walkthrough_matches_on_every_engine() {
    for kind in EngineKind::ALL {
        let output = demo_output(kind);
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                format!("ENGINE:{}", kind).as_str(),
                "STEP:eval|4",
                "STEP:add|3",
                "STEP:sub|9",
                "STEP:obj.abc|123",
                "STEP:abc|3",
                r#"ECHO_JSON:"abc 123 {\"abc\":123}""#,
                "ECHO_JSON:\"456\"",
                "STEP:echo|\"something\"",
                "STEP:abc + 321|777",
            ],
            "{}",
            kind
        );
    }
}

#[test]
fn bench_prints_one_line_per_workload() {
    let mut out = Vec::new();
    run_bench(EngineKind::QuickJs, ContextOptions::default(), 2, &mut out)
        .expect("bench should pass");
    let output = String::from_utf8(out).expect("utf8 output");
    let lines = output.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("BENCH:quickjs|add|iterations=2|result=3|"));
    assert!(lines[1].starts_with("BENCH:quickjs|sum|iterations=2|result=4999950000|"));
    assert!(lines[2].starts_with("BENCH:quickjs|shared-add|"));
    assert!(lines[3].starts_with("BENCH:quickjs|shared-sum|"));
}

#[test]
fn timeout_applies_only_where_it_can_be_enforced() {
    let args = engine_args(EngineChoice::All, Some(250));
    assert_eq!(
        options_for(EngineKind::Rhai, &args).timeout,
        Some(Duration::from_millis(250))
    );
    assert_eq!(
        options_for(EngineKind::QuickJs, &args).timeout,
        Some(Duration::from_millis(250))
    );
    assert_eq!(options_for(EngineKind::Boa, &args).timeout, None);
    assert_eq!(
        options_for(EngineKind::Rhai, &engine_args(EngineChoice::Rhai, None)),
        ContextOptions::default()
    );
}

#[test]
fn engine_choice_expands_to_kinds() {
    assert_eq!(EngineChoice::All.kinds(), EngineKind::ALL.to_vec());
    assert_eq!(EngineChoice::Quickjs.kinds(), vec![EngineKind::QuickJs]);
}

#[test]
fn run_cli_from_args_reports_exit_codes() {
    assert_eq!(
        run_cli_from_args(["embedbridge", "demo", "--engine", "rhai"]),
        0
    );
    assert_eq!(
        run_cli_from_args([
            "embedbridge",
            "bench",
            "--engine",
            "boa",
            "--iterations",
            "1",
            "--timeout-ms",
            "1000",
        ]),
        0
    );
    assert_eq!(run_cli_from_args(["embedbridge", "demo", "--engine", "v8"]), 2);
    assert_eq!(
        run_cli_from_args(["embedbridge", "bench", "--iterations", "0"]),
        2
    );
}

#[test]
fn bridge_errors_keep_their_codes_through_the_cli() {
    let error = CliError::from(eb_core::BridgeError::new(ErrorKind::RuntimeInUse, "busy"));
    assert_eq!(error.code(), "RUNTIME_IN_USE");
    assert_eq!(emit_error(error), 1);
}
