use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

/// Run the binary with `args`, feed it `chunks` on stdin, then close stdin
fn run(args: &[&str], chunks: &[&[u8]]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_wongus-probe"))
        .args(["--wait-secs", "10"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    for chunk in chunks {
        stdin.write_all(chunk).unwrap();
        stdin.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
    }
    drop(stdin);
    child.wait_with_output().unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_read_answered_before_eof() {
    let output = run(&["read", "/etc/hosts"], &[b"{\"id\":1,\"body\":{\"ok\":\"hello\"}}\n"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("hello"));
    let request = String::from_utf8_lossy(&output.stdout);
    assert!(request.contains(r#""window":{"id":1"#), "stdout: {request}");
}

#[test]
fn test_stream_ended_before_eof() {
    let output = run(
        &["stream", "tail"],
        &[
            b"{\"id\":1,\"line\":\"a\"}\n",
            b"{\"id\":1,\"body\":{\"ok\":{}}}\n",
            b"{\"id\":1,\"line\":\"b\"}\n",
            b"{\"id\":1,\"end\":{}}\n",
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("a\n") && err.contains("b\n"), "stderr: {err}");
}

#[test]
fn test_invalid_utf8_line_is_skipped() {
    let output = run(
        &["read", "/etc/hosts"],
        &[b"\xff\xfe garbage\n", b"{\"id\":1,\"body\":{\"ok\":\"hello\"}}\n"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("hello"));
}

#[test]
fn test_host_error_exits_with_one() {
    let output = run(&["read", "/nope"], &[b"{\"id\":1,\"body\":{\"err\":\"no such file\"}}\n"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("no such file"));
}

#[test]
fn test_host_gone_exits_with_two() {
    let output = run(&["read", "/etc/hosts"], &[]);

    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
}
