use std::process::Command;

fn run(args: &[&str]) -> String {
    let bin = env!("CARGO_BIN_EXE_embedbridge");
    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("cli should execute");
    if !output.status.success() {
        panic!(
            "embedbridge {:?} failed\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn demo_runs_on_all_engines() {
    let stdout = run(&["demo"]);
    assert!(stdout.starts_with("RESULT:OK"), "{}", stdout);
    for engine in ["rhai", "boa", "quickjs"] {
        assert!(
            stdout.contains(&format!("ENGINE:{}", engine)),
            "missing {} in {}",
            engine,
            stdout
        );
    }
    assert_eq!(stdout.matches("STEP:sub|9").count(), 3);
    assert_eq!(stdout.matches("ECHO_JSON:\"456\"").count(), 3);
    assert_eq!(stdout.matches("STEP:abc + 321|777").count(), 3);
}

#[test]
fn demo_accepts_a_deadline() {
    let stdout = run(&["demo", "--engine", "all", "--timeout-ms", "5000"]);
    assert_eq!(stdout.matches("STEP:add|3").count(), 3);
}

#[test]
fn bench_reports_every_workload() {
    let stdout = run(&["bench", "--engine", "all", "--iterations", "1"]);
    assert!(stdout.contains("BENCH:rhai|sum|iterations=1|result=4999950000|"));
    assert!(stdout.contains("BENCH:boa|add|iterations=1|result=3|"));
    assert!(stdout.contains("BENCH:quickjs|shared-sum|iterations=1|result=4999950000|"));
    assert!(!stdout.contains("BENCH:rhai|shared-add"));
}

#[test]
fn usage_errors_exit_with_clap_code() {
    let bin = env!("CARGO_BIN_EXE_embedbridge");
    let output = Command::new(bin)
        .args(["bench", "--engine", "lua"])
        .output()
        .expect("cli should execute");
    assert_eq!(output.status.code(), Some(2));
}
