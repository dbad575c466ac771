#![cfg(all(target_os = "linux", feature = "cli"))]

use std::ffi::CStr;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{FromRawFd, OwnedFd};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use pibridge_frame::{encode, Frame};

/// Master end of a fresh pseudo-terminal plus the slave's path.
fn open_pty() -> (File, String) {
    // SAFETY: plain libc calls on a descriptor we own; results checked.
    unsafe {
        let master = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
        assert!(master >= 0, "posix_openpt failed");
        assert_eq!(libc::grantpt(master), 0);
        assert_eq!(libc::unlockpt(master), 0);
        let mut name = [0 as libc::c_char; 128];
        assert_eq!(libc::ptsname_r(master, name.as_mut_ptr(), name.len()), 0);
        let path = CStr::from_ptr(name.as_ptr()).to_string_lossy().into_owned();
        (File::from(OwnedFd::from_raw_fd(master)), path)
    }
}

fn pibridge(device: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pibridge"));
    cmd.arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("--device")
        .arg(device)
        .args(args)
        .env_remove("PIBRIDGE_BAUD")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Config file with a local I/O timeout that tolerates a slow test host.
fn relaxed_config(tag: &str) -> String {
    let path = format!(
        "/tmp/pibridge-cli-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    );
    std::fs::write(&path, r#"{ "io_timeout_ms": 500, "gate_timeout_ms": 500 }"#)
        .expect("config should be writable");
    path
}

fn wire(frame: &Frame) -> Vec<u8> {
    encode(frame).expect("frame should encode").to_vec()
}

/// Run the CLI while a simulated module on the pty master answers one
/// request with `reply`. Returns the CLI output and the request bytes.
fn run_against_module(args: &[&str], request_len: usize, reply: Option<Vec<u8>>) -> (Output, Vec<u8>) {
    let (mut master, path) = open_pty();
    let config = relaxed_config("module");
    let child = pibridge(&path, args)
        .arg("--config")
        .arg(&config)
        .spawn()
        .expect("pibridge should start");

    let module = thread::spawn(move || {
        let mut request = vec![0u8; request_len];
        master.read_exact(&mut request).expect("request should arrive");
        if let Some(reply) = reply {
            master.write_all(&reply).expect("reply should be written");
        }
        // Keep the master open until the CLI is done with the line.
        thread::sleep(Duration::from_millis(300));
        request
    });

    let output = child.wait_with_output().expect("pibridge should finish");
    let request = module.join().expect("module thread should not panic");
    let _ = std::fs::remove_file(&config);
    (output, request)
}

#[test]
fn io_request_prints_reply() {
    let request = Frame::local_io(0x05, 0x10, vec![0x01, 0x02]);
    let reply = wire(&Frame::local_io(0x05, 0x10, vec![0x0A, 0x0B]));

    let (output, seen) = run_against_module(
        &["io", "5", "0x10", "--data", "0102", "--max-len", "8"],
        request.wire_size(),
        Some(reply),
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(seen, wire(&request));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"domain\":\"local-io\""));
    assert!(stdout.contains("\"payload\":\"0a0b\""));
}

#[test]
fn gate_request_honours_timeout() {
    let request = Frame::gateway(0x20, 0x1234, vec![]);
    let reply = wire(&Frame::gateway(0x20, 0x1234, vec![0xFF]));

    let (output, seen) = run_against_module(
        &["gate", "0x20", "0x1234", "--timeout", "1s"],
        request.wire_size(),
        Some(reply),
    );

    assert!(output.status.success());
    assert_eq!(seen, wire(&request));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"command\":4660"));
}

#[test]
fn silent_module_exits_124() {
    let request = Frame::local_io(0x07, 0x01, vec![]);
    let (output, _) = run_against_module(&["io", "7", "1"], request.wire_size(), None);

    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no response"));
}

#[test]
fn send_io_writes_frame() {
    let request = Frame::local_io(0x03, 0x20, vec![0x7F]);
    let (output, seen) = run_against_module(
        &["send-io", "3", "0x20", "-d", "7f"],
        request.wire_size(),
        None,
    );

    assert!(output.status.success());
    assert_eq!(seen, wire(&request));
}

#[test]
fn invalid_address_exits_64() {
    let (_master, path) = open_pty();
    let output = pibridge(&path, &["io", "0", "1"])
        .output()
        .expect("pibridge should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_device_exits_3() {
    let missing = format!("/dev/pibridge-missing-{}", std::process::id());
    let output = pibridge(&missing, &["clear"])
        .output()
        .expect("pibridge should run");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn recv_collects_raw_bytes() {
    let (mut master, path) = open_pty();
    let child = pibridge(&path, &["recv", "--len", "3", "--timeout", "2s"])
        .spawn()
        .expect("pibridge should start");

    // Give the CLI time to open and configure the line.
    thread::sleep(Duration::from_millis(300));
    master.write_all(&[0xAA, 0xBB, 0xCC]).expect("bytes should be written");

    let output = child.wait_with_output().expect("pibridge should finish");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"data\":\"aabbcc\""));
}

#[test]
fn version_needs_no_device() {
    let output = Command::new(env!("CARGO_BIN_EXE_pibridge"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("pibridge "));
}
