#![cfg(all(unix, feature = "cli"))]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/arqcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_path(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be readable") {
            return status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            panic!("child did not exit in time");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn version_prints_package_name() {
    let output = Command::new(env!("CARGO_BIN_EXE_arqlink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("arqlink "));
}

#[test]
fn send_to_missing_socket_returns_transport_code() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_arqlink"))
        .arg("--log-level")
        .arg("error")
        .arg("send")
        .arg(dir.join("absent.sock"))
        .arg("--data")
        .arg("x")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_duration_is_usage_error() {
    let dir = unique_temp_dir("usage");
    let output = Command::new(env!("CARGO_BIN_EXE_arqlink"))
        .arg("send")
        .arg(dir.join("line.sock"))
        .arg("--timeout")
        .arg("soon")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_prints_payload_from_send() {
    let dir = unique_temp_dir("roundtrip");
    let sock_path = dir.join("line.sock");

    let mut listener = Command::new(env!("CARGO_BIN_EXE_arqlink"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .arg("--count")
        .arg("1")
        .arg("--retransmit-timeout")
        .arg("100ms")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen should start");

    wait_for_path(&sock_path, Duration::from_secs(3));

    let sent = Command::new(env!("CARGO_BIN_EXE_arqlink"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&sock_path)
        .arg("--data")
        .arg("hello")
        .arg("--timeout")
        .arg("10s")
        .arg("--retransmit-timeout")
        .arg("100ms")
        .output()
        .expect("send should run");

    assert!(
        sent.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&sent.stderr)
    );
    let report: serde_json::Value =
        serde_json::from_slice(&sent.stdout).expect("send output should be json");
    assert_eq!(report["bytes_sent"], 5);
    assert_eq!(report["channel"], 0);

    let status = wait_with_timeout(&mut listener, Duration::from_secs(15));
    assert!(status.success());
    let mut stdout = String::new();
    listener
        .stdout
        .take()
        .expect("listener stdout should be piped")
        .read_to_string(&mut stdout)
        .expect("listener stdout should be readable");
    assert!(stdout.contains("\"payload\":\"hello\""), "got: {stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}
