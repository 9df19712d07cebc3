use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde_json::Value;
use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("tollgate-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn tollgate() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tollgate"));
    cmd.env_remove("TOLLGATE_LOG");
    cmd
}

/// A stand-in for `ansible-playbook` that marks its start, waits `delay`
/// seconds, records its arguments next to the playbook and exits with
/// `status`.
fn write_fake_runner(dir: &Path, status: i32, delay: u32) -> PathBuf {
    let script = dir.join("fake-playbook");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\ntouch started\nsleep {delay}\nprintf '%s\\n' \"$@\" > recorded-args\nexit {status}\n"
        ),
    )
    .expect("failed to write fake runner");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
        .expect("failed to make fake runner executable");
    script
}

/// A tool manifest in `dir` whose playbook is run by a fake runner.
fn write_tool(dir: &Path, runner_status: i32) -> PathBuf {
    write_slow_tool(dir, runner_status, 0)
}

fn write_slow_tool(dir: &Path, runner_status: i32, delay: u32) -> PathBuf {
    let playbook = dir.join("site.yml");
    fs::write(&playbook, "- hosts: all\n").expect("failed to write playbook");
    let program = write_fake_runner(dir, runner_status, delay);

    let manifest = serde_json::json!({
        "schemaVersion": 1,
        "description": "Manage a server",
        "successMsg": "server updated",
        "parameters": [
            {"name": "name", "short": "n", "help": "server name",
             "type": "restricted_str", "typeParams": {"allowedChars": "a-z"}},
            {"name": "mailserver", "action": "store_const", "const": "mail", "dest": "server"},
            {"name": "webserver", "action": "store_const", "const": "web", "dest": "server"},
            {"name": "ssl", "action": "store_true", "dependsOn": "webserver"},
            {"name": "password", "type": "restricted_str",
             "typeParams": {"allowedChars": "a-z0-9"},
             "prompt": true, "promptOptions": {"confirm": true, "noEcho": true}}
        ],
        "mutuallyExclusive": [["mailserver", "webserver"]],
        "requiredOneOf": [["mailserver", "webserver"]],
        "runner": {"playbook": playbook, "program": program}
    });
    let path = dir.join("server.json");
    fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap())
        .expect("failed to write manifest");
    path
}

fn run_with_input(cmd: &mut Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run tollgate");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for tollgate")
}

fn recorded_args(dir: &Path) -> Option<Vec<String>> {
    let text = fs::read_to_string(dir.join("recorded-args")).ok()?;
    Some(text.lines().map(str::to_string).collect())
}

fn extra_vars(args: &[String]) -> Value {
    let pos = args
        .iter()
        .position(|arg| arg == "--extra-vars")
        .expect("--extra-vars missing");
    serde_json::from_str(&args[pos + 1]).expect("extra vars are not JSON")
}

#[test]
fn help_works() {
    let out = tollgate()
        .arg("--help")
        .output()
        .expect("failed to run tollgate --help");
    assert!(
        out.status.success(),
        "tollgate --help failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("MANIFEST"), "unexpected help output:\n{stdout}");
}

#[test]
fn tool_help_is_rendered_from_manifest() {
    let dir = make_temp_dir("tool-help");
    let manifest = write_tool(&dir, 0);

    let out = tollgate()
        .arg(&manifest)
        .arg("--help")
        .output()
        .expect("failed to run tollgate");
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Manage a server"), "{stdout}");
    assert!(stdout.contains("server name"), "{stdout}");
    assert!(recorded_args(&dir).is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn runner_receives_variables() {
    let dir = make_temp_dir("runner-vars");
    let manifest = write_tool(&dir, 0);

    let out = run_with_input(
        tollgate()
            .arg(&manifest)
            .args(["-n", "alpha", "--webserver", "--ssl", "-vvv"]),
        "secret1\nsecret1\n",
    );
    assert!(
        out.status.success(),
        "tollgate failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    assert!(String::from_utf8_lossy(&out.stdout).ends_with("server updated\n"));

    let args = recorded_args(&dir).expect("runner was not called");
    assert_eq!(&args[..4], ["--inventory", "localhost,", "--connection", "local"]);
    assert!(args.contains(&"-vv".to_string()), "{args:?}");
    assert_eq!(args.last().map(String::as_str), dir.join("site.yml").to_str());

    let vars = extra_vars(&args);
    assert_eq!(vars["script_name"], "server.json");
    assert_eq!(vars["param_name"], "alpha");
    assert_eq!(vars["param_server"], "web");
    assert_eq!(vars["param_ssl"], true);
    assert_eq!(vars["param_password"], "secret1");
    assert_eq!(vars["param_verbose"], 3);
    assert!(vars.get("param_webserver").is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn constraint_failure_exits_two() {
    let dir = make_temp_dir("constraint");
    let manifest = write_tool(&dir, 0);

    let out = run_with_input(
        tollgate().arg(&manifest).args(["--mailserver", "--ssl"]),
        "secret\nsecret\n",
    );
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("argument --ssl requires --webserver to be present."),
        "{stderr}"
    );
    assert!(recorded_args(&dir).is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_value_exits_two() {
    let dir = make_temp_dir("invalid-value");
    let manifest = write_tool(&dir, 0);

    let out = tollgate()
        .arg(&manifest)
        .args(["--mailserver", "--name", "Alpha"])
        .stdin(Stdio::null())
        .output()
        .expect("failed to run tollgate");
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--name"), "{stderr}");
    assert!(recorded_args(&dir).is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn prompt_mismatch_exits_three() {
    let dir = make_temp_dir("prompt-mismatch");
    let manifest = write_tool(&dir, 0);

    let out = run_with_input(
        tollgate().arg(&manifest).arg("--mailserver"),
        "secret\nother\n",
    );
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("ERROR: input does not match its confirmation"),
        "{stderr}"
    );
    assert!(recorded_args(&dir).is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn runner_failure_exits_one() {
    let dir = make_temp_dir("runner-failure");
    let manifest = write_tool(&dir, 4);

    let out = run_with_input(
        tollgate().arg(&manifest).args(["--mailserver", "--password", "x"]),
        "",
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&out.stdout).contains("server updated"));
    assert!(recorded_args(&dir).is_some());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn broken_manifest_exits_two() {
    let dir = make_temp_dir("broken-manifest");
    let manifest = dir.join("broken.json");
    fs::write(&manifest, "{ not json").unwrap();

    let out = tollgate()
        .arg(&manifest)
        .output()
        .expect("failed to run tollgate");
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed to parse manifest"), "{stderr}");

    let missing = tollgate()
        .arg(dir.join("missing.json"))
        .output()
        .expect("failed to run tollgate");
    assert_eq!(missing.status.code(), Some(2));

    let _ = fs::remove_dir_all(&dir);
}

fn interrupt(pid: u32) {
    kill(Pid::from_raw(pid as i32), Signal::SIGINT).expect("failed to send SIGINT");
}

#[test]
fn interrupted_prompt_exits_three() {
    let dir = make_temp_dir("prompt-interrupt");
    let manifest = write_tool(&dir, 0);

    let mut child = tollgate()
        .arg(&manifest)
        .arg("--mailserver")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run tollgate");
    // Keep stdin open so the prompt stays blocked on input.
    let _stdin = child.stdin.take().expect("stdin is piped");
    let mut stdout = child.stdout.take().expect("stdout is piped");

    let mut shown = Vec::new();
    let mut buf = [0u8; 256];
    while !String::from_utf8_lossy(&shown).contains("Password: ") {
        let n = stdout.read(&mut buf).expect("failed to read stdout");
        assert!(n > 0, "tollgate closed stdout before prompting");
        shown.extend_from_slice(&buf[..n]);
    }
    interrupt(child.id());

    let out = child.wait_with_output().expect("failed to wait for tollgate");
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cancelled"), "{stderr}");
    assert!(recorded_args(&dir).is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn interrupt_while_running_waits_for_runner() {
    let dir = make_temp_dir("runner-interrupt");
    let manifest = write_slow_tool(&dir, 0, 1);

    let mut child = tollgate()
        .arg(&manifest)
        .args(["--mailserver", "--password", "x"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run tollgate");

    let deadline = Instant::now() + Duration::from_secs(10);
    while !dir.join("started").exists() {
        assert!(Instant::now() < deadline, "runner never started");
        std::thread::sleep(Duration::from_millis(10));
    }
    interrupt(child.id());

    let out = child.wait_with_output().expect("failed to wait for tollgate");
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(recorded_args(&dir).is_some(), "runner did not finish");

    let _ = fs::remove_dir_all(&dir);
}
