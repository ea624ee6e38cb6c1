#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORE_ENV: [&str; 6] = [
    "BOTDIAG_CONFIG",
    "BOTDIAG_STORE_URL",
    "BOTDIAG_STORE_DATABASE",
    "BOTDIAG_STORE_USERNAME",
    "BOTDIAG_STORE_PASSWORD",
    "BOTDIAG_STORE_TIMEOUT",
];

fn botdiag() -> Command {
    let mut cmd = Command::cargo_bin("botdiag").expect("cargo bin");
    for var in STORE_ENV {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn touch(path: &Path, age_days: u64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"data").unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(age_days * 86_400 + 60);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

/// Archive contents keyed by path below the top-level directory.
fn unpack(archive: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = fs::File::open(archive).unwrap();
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut out = BTreeMap::new();
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        let (_, rel) = path.split_once('/').unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        out.insert(rel.to_string(), bytes);
    }
    out
}

fn archive_path(stdout: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8(stdout.to_vec()).unwrap().trim())
}

#[test]
fn version_prints_package_version() {
    botdiag()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn number_and_all_are_mutually_exclusive() {
    botdiag()
        .args(["collect", "-n", "2", "-a"])
        .assert()
        .code(2);
}

#[test]
fn missing_config_file_is_config_error() {
    let temp = tempdir().unwrap();
    botdiag()
        .current_dir(temp.path())
        .arg("collect")
        .arg("--config")
        .arg(temp.path().join("nope.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.yaml"));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn collect_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xcs/_design/bot/_view/all-bots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": [
            {"id": "b1", "key": "b1", "value": null, "doc": {"_id": "b1", "name": "My Bot!"}}
        ]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/xcs/_design/integration/_view/integrations-by-bot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": [
            {"id": "i7", "key": ["b1", 7], "value": null,
             "doc": {"number": 7, "bot": {"name": "My Bot!"}}}
        ]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/xcs/_design/settings/_view/all-settings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/xcs/_design/version/_view/all-versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let logs = temp.path().join("src-logs");
    touch(&logs.join("fresh.log"), 0);
    touch(&logs.join("nested/edge.log"), 3);
    touch(&logs.join("nested/stale.log"), 30);

    let assets = temp.path().join("assets");
    for (bot, runs) in [("A", 1..=5), ("B", 1..=12)] {
        for run in runs {
            touch(&assets.join(bot).join(run.to_string()).join("build.log"), 0);
        }
    }

    let config = temp.path().join("botdiag.yaml");
    fs::write(
        &config,
        format!(
            "default_max_age_days: 3\n\
             log_roots:\n  - label: app\n    path: {}\n\
             commands:\n  - name: greeting\n    program: echo\n    args: [\"hi\"]\n",
            logs.display()
        ),
    )
    .unwrap();
    let out = temp.path().join("out");

    let assert = botdiag()
        .arg("collect")
        .arg("-c")
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .arg("--asset-root")
        .arg(&assets)
        .arg("--store-url")
        .arg(server.uri())
        .assert()
        .success();

    let archive = archive_path(&assert.get_output().stdout);
    assert!(archive.starts_with(&out));
    let name = archive.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("botdiag-") && name.ends_with(".tar.gz"));

    let files = unpack(&archive);
    assert_eq!(files["commands/greeting.txt"], b"hi\n");
    assert!(files.contains_key("logs/app/fresh.log"));
    assert!(files.contains_key("logs/app/nested/edge.log"));
    assert!(!files.contains_key("logs/app/nested/stale.log"));

    for run in 1..=5 {
        assert!(files.contains_key(&format!("assets/A/{run}/build.log")));
    }
    for run in 1..=12 {
        let key = format!("assets/B/{run}/build.log");
        assert_eq!(files.contains_key(&key), run >= 3, "{key}");
    }

    assert!(files.contains_key("database/My_Bot_/bot.json"));
    assert!(files.contains_key("database/My_Bot_/7.json"));
    assert!(!files.contains_key("database/settings.json"));
    assert!(!files.contains_key("database/versions.json"));

    let log = String::from_utf8(files["collector.log"].clone()).unwrap();
    assert!(log.contains("HTTP 503"));
    assert!(files.contains_key("errors.log"));

    let summary: Value = serde_json::from_slice(&files["summary.json"]).unwrap();
    let statuses: Vec<_> = summary["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["name"].as_str().unwrap(), p["status"].as_str().unwrap()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("commands", "ok"),
            ("logs", "ok"),
            ("assets", "ok"),
            ("database", "ok")
        ]
    );
}

#[test]
fn skipped_phases_still_produce_archive() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("botdiag.yaml");
    fs::write(&config, "log_roots: []\n").unwrap();
    let out = temp.path().join("out");

    let assert = botdiag()
        .arg("collect")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&out)
        .arg("--asset-root")
        .arg(temp.path().join("no-assets"))
        .arg("--skip-database")
        .arg("--skip-commands")
        .assert()
        .success();

    let files = unpack(&archive_path(&assert.get_output().stdout));
    let summary: Value = serde_json::from_slice(&files["summary.json"]).unwrap();
    for phase in summary["phases"].as_array().unwrap() {
        let expected = if phase["name"] == "logs" { "ok" } else { "skipped" };
        assert_eq!(phase["status"], expected, "{phase}");
    }
    assert!(!files.keys().any(|k| k.starts_with("database/")));
}

#[test]
fn unwritable_output_exits_one() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("botdiag.yaml");
    fs::write(&config, "log_roots: []\ncommands: []\n").unwrap();
    let blocker = temp.path().join("out");
    fs::write(&blocker, b"not a directory").unwrap();

    botdiag()
        .arg("collect")
        .arg("-c")
        .arg(&config)
        .arg("-o")
        .arg(blocker.join("nested"))
        .arg("--asset-root")
        .arg(temp.path())
        .arg("--skip-database")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to write archive"));
}
