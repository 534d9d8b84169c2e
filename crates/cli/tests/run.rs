//! End-to-end runs against a checkout on disk and a mock Gitee.

use std::fs;
use std::path::Path;

use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cli::{execute, AppConfig, Cli, Settings};

const ROSTER_BEFORE_B64: &str = "bWFpbnRhaW5lcnM6CiAgLSBnaXRlZV9pZDogYWxpY2UK";
const ROSTER_AFTER_B64: &str = "bWFpbnRhaW5lcnM6CiAgLSBnaXRlZV9pZDogYWxpY2UKICAtIGdpdGVlX2lkOiB6b2UK";
const CHECKLIST: &str = "The following table is the PR review checklist generated by the review_tool of openEuler-Advisor\n|1|sig-info|new maintainer|@rev|[&#x1F534;]|\n";

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn checkout(root: &Path) {
    write(
        root,
        "sig/Compiler/sig-info.yaml",
        r#"
maintainers:
  - gitee_id: alice
    email: alice@example.org
repositories:
  - repo: [src-openeuler/gcc]
    committers:
      - gitee_id: carol
        email: carol@example.org
"#,
    );
    write(root, "sig/Compiler/src-openeuler/gcc.yaml", "name: gcc");
    write(root, "sig/Compiler/src-openeuler/llvm.yaml", "name: llvm");
    write(root, "sig/Kernel/OWNERS", "maintainers:\n  - dave\n");
    write(root, "sig/Kernel/src-openeuler/kernel.yaml", "name: kernel");
    write(
        root,
        "sig/TC/sig-info.yaml",
        "maintainers:\n  - gitee_id: tc1\n    email: tc1@example.org\n",
    );
}

fn settings(server: &MockServer, root: &Path, args: &[&str]) -> Settings {
    let checkout = root.join("community");
    let output = root.join("data");
    let mut argv = vec![
        "sig-attention".to_string(),
        "--checkout".to_string(),
        checkout.display().to_string(),
        "--output".to_string(),
        output.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    let mut config = AppConfig::default();
    config.source.api_url = server.uri();
    config.source.index_url = server.uri();
    config.activity.url = server.uri();
    Settings::from_parts(Cli::try_parse_from(argv).unwrap(), config, None).unwrap()
}

fn read_report(root: &Path, recipient: &str) -> Value {
    let path = root.join("data").join(format!("statistics_{recipient}.json"));
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn index_entry(link: &str, draft: bool, labels: &str) -> Value {
    json!({
        "link": link,
        "title": "change",
        "created_at": "2024-05-01 10:00:00",
        "draft": draft,
        "mergeable": true,
        "labels": labels,
        "ref": "master"
    })
}

#[tokio::test]
async fn all_sigs_run_writes_one_report_per_recipient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pulls"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                index_entry("https://gitee.com/src-openeuler/gcc/pulls/1", false, "openeuler-cla/yes"),
                index_entry("https://gitee.com/src-openeuler/llvm/pulls/2", true, "openeuler-cla/yes"),
                index_entry("https://gitee.com/src-openeuler/kernel/pulls/3", false, ""),
                index_entry("https://gitee.com/mindspore/mindspore/pulls/4", false, "")
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query/sig/pr/state"))
        .and(query_param("sig", "Compiler"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"merged": 3, "closed": 1, "open": 1}
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    checkout(&dir.path().join("community"));

    let summary = execute(&settings(&server, dir.path(), &[])).await.unwrap();

    assert_eq!(summary.pulls, 4);
    assert_eq!(summary.recipients, 3);
    assert_eq!(summary.rows, 3);

    let carol = read_report(dir.path(), "carol");
    assert_eq!(carol["address"], "carol@example.org");
    assert_eq!(carol["rows"][0]["repo"], "src-openeuler/gcc");
    assert_eq!(carol["rows"][0]["status"], "Ready to merge");
    assert_eq!(
        carol["processed_rates"],
        json!({"Compiler": {"current": 80, "previous": 80, "trend": "unchanged", "change": 0}})
    );

    let alice = read_report(dir.path(), "alice");
    assert_eq!(alice["rows"][0]["repo"], "src-openeuler/llvm");
    assert_eq!(alice["rows"][0]["status"], "Draft");

    let dave = read_report(dir.path(), "dave");
    assert_eq!(dave["address"], Value::Null);
    assert_eq!(dave["rows"][0]["sig"], "Kernel");
    assert_eq!(dave["rows"][0]["status"], "CLA failed");
    // The data service knows nothing about Kernel.
    assert!(dave.get("processed_rates").is_none());
}

#[tokio::test]
async fn membership_run_notifies_new_member_and_both_sigs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/openeuler/community/pulls"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "number": 7,
            "title": "Add zoe to Compiler",
            "html_url": "https://gitee.com/openeuler/community/pulls/7",
            "created_at": "2024-05-01T10:00:00+08:00",
            "draft": false,
            "mergeable": true,
            "labels": [{"name": "openeuler-cla/yes"}],
            "base": {"ref": "master"}
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/openeuler/community/pulls/7/files"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"filename": "sig/Compiler/sig-info.yaml"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/openeuler/community/pulls/7/commits"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"sha": "c1", "parents": [{"sha": "base"}]}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/openeuler/community/pulls/7/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "user": {"login": "openeuler-ci-bot"},
            "body": CHECKLIST
        }])))
        .mount(&server)
        .await;
    for (sha, content) in [("base", ROSTER_BEFORE_B64), ("c1", ROSTER_AFTER_B64)] {
        Mock::given(method("GET"))
            .and(path("/repos/openeuler/community/contents/sig/Compiler/sig-info.yaml"))
            .and(query_param("ref", sha))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"encoding": "base64", "content": content})),
            )
            .mount(&server)
            .await;
    }
    let dir = tempfile::tempdir().unwrap();
    checkout(&dir.path().join("community"));

    let summary = execute(&settings(&server, dir.path(), &["--scope", "sig", "--sig", "TC"]))
        .await
        .unwrap();

    assert_eq!(summary.pulls, 1);
    let names: Vec<String> = summary
        .reports
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "statistics_alice.json",
            "statistics_rev.json",
            "statistics_tc1.json",
            "statistics_zoe.json"
        ]
    );
    let zoe = read_report(dir.path(), "zoe");
    assert_eq!(zoe["rows"][0]["sig"], "TC");
    assert_eq!(zoe["rows"][0]["number"], 7);
    assert!(zoe.get("processed_rates").is_none());
}

#[tokio::test]
async fn failed_listing_writes_no_reports() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pulls"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    checkout(&dir.path().join("community"));

    let err = execute(&settings(&server, dir.path(), &[])).await.unwrap_err();

    assert!(err.to_string().contains("503"), "{err:#}");
    assert!(!dir.path().join("data").exists());
}

#[tokio::test]
async fn missing_checkout_fails_before_listing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let err = execute(&settings(&server, dir.path(), &[])).await.unwrap_err();

    assert!(format!("{err:#}").contains("reading SIG directory"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
