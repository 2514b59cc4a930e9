use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Env {
    dir: TempDir,
    config: PathBuf,
}

fn setup() -> Env {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = root.join("config.toml");
    fs::write(
        &config,
        format!(
            "[paths]\nstate_dir = {:?}\nworkbenches_root = {:?}\n\n[tmux]\nenabled = false\n",
            root.join("state").to_string_lossy(),
            root.join("worktrees").to_string_lossy(),
        ),
    )
    .unwrap();
    Env { dir, config }
}

fn orc(env: &Env, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_orc"))
        .arg("--config")
        .arg(&env.config)
        .args(args)
        .env_remove("ORC_CONFIG")
        .env_remove("ORC_LOG")
        .output()
        .unwrap()
}

fn stdout_ok(env: &Env, args: &[&str]) -> String {
    let out = orc(env, args);
    assert!(
        out.status.success(),
        "orc {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).unwrap()
}

fn seed(env: &Env) -> String {
    let factory = stdout_ok(env, &["catalog", "factory", "add", "main"]);
    assert_eq!(factory.trim(), "FACT-001");
    let workshop = stdout_ok(env, &["catalog", "workshop", "add", "forge", "--factory", "FACT-001"]);
    assert_eq!(workshop.trim(), "WORK-001");
    let bench = stdout_ok(
        env,
        &["catalog", "workbench", "add", "bench-a", "--workshop", "WORK-001"],
    );
    assert_eq!(bench.trim(), "BENCH-001");
    workshop.trim().to_string()
}

fn root(env: &Env) -> &Path {
    env.dir.path()
}

#[test]
fn catalog_init_prints_database_path() {
    let env = setup();
    let out = stdout_ok(&env, &["catalog", "init"]);
    let expected = root(&env).join("state").join("orc.db");
    assert_eq!(out.trim(), expected.to_string_lossy());
    assert!(expected.is_file());
}

#[test]
fn plan_apply_plan_round_trip() {
    let env = setup();
    let workshop = seed(&env);

    let plan: Value = serde_json::from_str(&stdout_ok(
        &env,
        &["infra", "plan", "--workshop", &workshop, "--format", "json"],
    ))
    .unwrap();
    assert_eq!(plan["workshop_id"], "WORK-001");
    assert_eq!(plan["gatehouse"]["status"], "create");
    assert_eq!(plan["workbenches"][0]["status"], "create");
    assert!(plan["tmux"].is_null());

    let applied: Value = serde_json::from_str(&stdout_ok(
        &env,
        &["infra", "apply", "--workshop", &workshop, "--format", "json"],
    ))
    .unwrap();
    assert_eq!(applied["workbenches_created"], 1);
    assert_eq!(applied["nothing_to_do"], false);
    assert!(root(&env).join("worktrees/bench-a/.orc/config.json").is_file());
    assert!(
        root(&env)
            .join("state/gatehouses/WORK-001/.orc/config.json")
            .is_file()
    );

    let text = stdout_ok(&env, &["infra", "plan", "--workshop", &workshop]);
    assert!(text.contains("Nothing to do."), "plan text was: {}", text);
}

#[test]
fn unknown_workshop_exits_nonzero_with_error_line() {
    let env = setup();
    stdout_ok(&env, &["catalog", "init"]);
    let out = orc(&env, &["infra", "plan", "--workshop", "WORK-404"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.starts_with("Error: Not found"),
        "stderr was: {}",
        stderr
    );
    assert!(out.stdout.is_empty());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let env = setup();
    let out = Command::new(env!("CARGO_BIN_EXE_orc"))
        .arg("--config")
        .arg(root(&env).join("nope.toml"))
        .args(["catalog", "init"])
        .env_remove("ORC_CONFIG")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Config error"));
}
