use assert_cmd::prelude::*;
use axum::response::IntoResponse;
use predicates::prelude::*;
use std::net::SocketAddr;
use std::process::Command;

fn webforage() -> Command {
    Command::new(env!("CARGO_BIN_EXE_webforage"))
}

/// Stub summary endpoint: `/summary/:title` answers one known title,
/// everything else 404s. The runtime must outlive the child process runs.
fn spawn_summary_stub(rt: &tokio::runtime::Runtime) -> SocketAddr {
    use axum::{routing::get, Router};

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().route(
            "/summary/:title",
            get(|axum::extract::Path(title): axum::extract::Path<String>| async move {
                if title == "borrow_checker" {
                    axum::Json(serde_json::json!({
                        "title": "Borrow checker",
                        "extract": "The borrow checker enforces aliasing rules at compile time.",
                    }))
                    .into_response()
                } else {
                    axum::http::StatusCode::NOT_FOUND.into_response()
                }
            }),
        );

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("axum serve");
        });
        addr
    })
}

#[test]
fn lookup_json_contract_stubbed_localhost() {
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let addr = spawn_summary_stub(&rt);
    let endpoint = format!("http://{addr}/summary");

    let mut cmd = webforage();
    cmd.args(["lookup", "borrow checker", "--json"]);
    cmd.env("WEBFORAGE_DICT_PT_ENDPOINT", &endpoint);
    cmd.env("WEBFORAGE_DICT_EN_ENDPOINT", &endpoint);

    let assert = cmd.assert().success();
    let v: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("parse lookup json");

    assert_eq!(v["title"].as_str(), Some("Borrow checker"));
    assert!(v["extract"]
        .as_str()
        .unwrap_or("")
        .contains("aliasing rules"));
    assert!(v["sourceUrl"]
        .as_str()
        .unwrap_or("")
        .ends_with("/summary/borrow_checker"));
}

#[test]
fn lookup_json_miss_prints_null_and_succeeds() {
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let addr = spawn_summary_stub(&rt);
    let endpoint = format!("http://{addr}/summary");

    let mut cmd = webforage();
    cmd.args(["lookup", "no such page", "--json"]);
    cmd.env("WEBFORAGE_DICT_PT_ENDPOINT", &endpoint);
    cmd.env("WEBFORAGE_DICT_EN_ENDPOINT", &endpoint);

    cmd.assert()
        .success()
        .stdout(predicate::str::diff("null\n"));
}

#[test]
fn lookup_human_miss_is_an_error() {
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let addr = spawn_summary_stub(&rt);
    let endpoint = format!("http://{addr}/summary");

    let mut cmd = webforage();
    cmd.args(["lookup", "no such page"]);
    cmd.env("WEBFORAGE_DICT_PT_ENDPOINT", &endpoint);
    cmd.env("WEBFORAGE_DICT_EN_ENDPOINT", &endpoint);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no summary found"));
}
