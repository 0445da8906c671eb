// tests/cli_tests.rs
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

const FIREWALL: &str = r#"
origin: firehose
sender: APP/FW
format: '{{if eq (ikey "verdict") "drop"}}{{dsonde "err"}}{{else}}{{dsonde "out"}}{{end}}{{template "f1"}}'
f1: '{{ikey "ip.saddr"}} -> port {{ikey "tcp.dport"}}'
fields:
  - name: ip.saddr
    type: ipv4
  - name: tcp.dport
    type: uint16
  - name: verdict
    type: string
"#;

#[test]
fn test_stdout_sink_routes_by_verdict() {
    let config = config_file(FIREWALL);
    let input = concat!(
        r#"{"cf.sinstance":"GUID-1/0","ip.saddr":"10.0.0.1","tcp.dport":22,"verdict":"drop"}"#,
        "\n",
        r#"{"cf.dinstance":"GUID-2/3","ip.saddr":"10.0.0.2","tcp.dport":443,"verdict":"accept"}"#,
        "\n",
    );

    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(concat!(
            "ERR GUID-1/0 APP/FW: 10.0.0.1 -> port 22\n",
            "OUT GUID-2/3 APP/FW: 10.0.0.2 -> port 443\n",
        ));
}

#[test]
fn test_quote_fixup_in_config() {
    let config = config_file(
        r#"
origin: o
sender: s
format: '{{dsonde \x22out\x22}}user={{ikey \x22uid\x22}}'
fields:
  - name: uid
    type: string
"#,
    );

    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("-c")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .write_stdin(r#"{"cf.sinstance":"GUID-1/0","uid":"alice"}"#)
        .assert()
        .success()
        .stdout("OUT GUID-1/0 s: user=alice\n");
}

#[test]
fn test_exit_code_no_flushes() {
    let config = config_file(FIREWALL);
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .write_stdin(r#"{"ip.saddr":"10.0.0.1","tcp.dport":22}"#)
        .assert()
        .code(2)
        .stdout("");
}

#[test]
fn test_exit_code_errors() {
    let config = config_file(FIREWALL);
    let input = concat!(
        r#"{"cf.sinstance":"GUID-1/0","tcp.dport":70000}"#,
        "\n",
        r#"{"cf.sinstance":"GUID-1/0","tcp.dport":80,"verdict":"drop"}"#,
        "\n",
    );
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .write_stdin(input)
        .assert()
        .code(1)
        .stdout("ERR GUID-1/0 APP/FW:  -> port 80\n")
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_fail_fast_stops() {
    let config = config_file(FIREWALL);
    let input = concat!(
        "not json\n",
        r#"{"cf.sinstance":"GUID-1/0","tcp.dport":80,"verdict":"drop"}"#,
        "\n",
    );
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .arg("--fail-fast")
        .write_stdin(input)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("processing failed"));
}

#[test]
fn test_unresolved_field_fails_configuration() {
    let config = config_file(
        r#"
origin: o
sender: s
format: '{{ikey "nope"}}'
"#,
    );
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuring plugin"))
        .stderr(predicate::str::contains("\"nope\""));
}

#[test]
fn test_invalid_destination_fails_configuration() {
    let config = config_file(
        r#"
destination: no-port-here
origin: o
sender: s
format: x
"#,
    );
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("host:port"));
}

#[test]
fn test_missing_mandatory_key() {
    let config = config_file("origin: o\nformat: x\n");
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("`sender`"));
}

#[test]
fn test_debug_prints_statistics() {
    let config = config_file(FIREWALL);
    let mut cmd = Command::cargo_bin("dsonde").unwrap();
    cmd.arg("--config")
        .arg(config.path())
        .arg("--sink")
        .arg("stdout")
        .arg("--debug")
        .write_stdin(r#"{"cf.sinstance":"G/1","verdict":"accept"}"#)
        .assert()
        .success()
        .stderr(predicate::str::contains("Entries flushed: 1"));
}
