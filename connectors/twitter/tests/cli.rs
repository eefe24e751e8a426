//! Integration tests for the `twsd` binary.

use std::fs;
use std::path::Path;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn twsd_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_twsd"));
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

fn write_keychain(path: &Path) {
    fs::write(
        path,
        r#"{"__consumer__": {"key": "ck", "secret": "cs"}, "me": ["tok", "ts"]}"#,
    )
    .unwrap();
}

#[test]
fn filter_without_tracking_params_fails_fast() {
    let tmp = TempDir::new().unwrap();
    let prefix = tmp.path().join("out");

    twsd_cmd(tmp.path())
        .arg("filter")
        .arg(&prefix)
        .arg("-p")
        .arg("language=en")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("track, locations, follow"));

    assert!(!tmp.path().join("out.log").exists());
    assert!(!tmp.path().join(".twsd.auth").exists());
}

#[test]
fn malformed_param_is_rejected() {
    let tmp = TempDir::new().unwrap();

    twsd_cmd(tmp.path())
        .args(["sample", "out", "-p", "track"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[test]
fn zero_timeout_is_rejected() {
    let tmp = TempDir::new().unwrap();

    twsd_cmd(tmp.path())
        .args(["sample", "out", "--timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout"));
}

#[test]
fn streaming_requires_fileprefix() {
    let tmp = TempDir::new().unwrap();

    twsd_cmd(tmp.path())
        .arg("firehose")
        .assert()
        .failure()
        .stderr(predicate::str::contains("FILEPREFIX"));
}

#[test]
fn help_lists_endpoints() {
    let tmp = TempDir::new().unwrap();

    twsd_cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("firehose")
                .and(predicate::str::contains("authorize"))
                .and(predicate::str::contains("--delay")),
        );
}

#[test]
fn declining_consumer_credentials_exits_cleanly() {
    let tmp = TempDir::new().unwrap();

    twsd_cmd(tmp.path())
        .arg("authorize")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Create a new application"));

    assert!(!tmp.path().join(".twsd.auth").exists());
}

#[test]
fn authorize_finds_home_without_env() {
    let tmp = TempDir::new().unwrap();

    twsd_cmd(tmp.path())
        .env_remove("HOME")
        .arg("authorize")
        .write_stdin("n\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("home directory").not());
}

#[tokio::test(flavor = "multi_thread")]
async fn captures_stream_to_dated_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1.1/statuses/filter.json"))
        .and(body_string_contains("track=rust"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"id\":1}\r\n\r\n{\"limit\":{\"track\":5}}\r\nnot json\r\n",
        ))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let auth = tmp.path().join("auth.json");
    write_keychain(&auth);
    let prefix = tmp.path().join("data/out");
    let home = tmp.path().to_path_buf();
    let uri = server.uri();

    // The crawler reconnects forever; stop it after a few sessions.
    tokio::task::spawn_blocking(move || {
        let _ = twsd_cmd(&home)
            .arg("filter")
            .arg(&prefix)
            .args(["-p", "track=rust", "--delay", "1", "--auth-file"])
            .arg(&auth)
            .args(["--stream-url", &uri])
            .timeout(Duration::from_millis(1500))
            .output();
    })
    .await
    .unwrap();

    let data_dir = tmp.path().join("data");
    let outputs: Vec<_> = fs::read_dir(&data_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("out_") && name.ends_with(".json"))
        .collect();
    assert_eq!(outputs.len(), 1, "{outputs:?}");

    let contents = fs::read_to_string(data_dir.join(&outputs[0])).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("{\"id\":1}"));
    assert_eq!(lines.next(), Some("{\"limit\":{\"track\":5}}"));
    assert_eq!(lines.next(), Some("not json"));

    let log = fs::read_to_string(data_dir.join("out.log")).unwrap();
    assert!(log.contains("Requesting stream"));
    assert!(log.contains("LIMIT: 5 tweets retained"));
    assert!(log.contains("Keep-alive message"));
}
