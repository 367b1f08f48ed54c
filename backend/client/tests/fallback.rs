use std::sync::Arc;

use client::{
    Outcome,
    api::create_submission,
    error::ClientError,
    models::{Admin, AnswerValue, SubmissionPayload},
    storage::LocalStore,
    submit,
};
use server::{config::Config, memory::MemoryDatabase, router, state::State};
use tempfile::tempdir;
use tokio::net::TcpListener;

async fn spawn_server(database: MemoryDatabase) -> String {
    let state = State::with_connector(Config::from_lookup(|_| None), Arc::new(database));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });

    format!("http://{address}/")
}

fn payload(repeat_count: u32) -> SubmissionPayload {
    SubmissionPayload {
        admin: Some(Admin {
            user_id: "u1".into(),
            repeat_count,
            db_password: "x".into(),
        }),
        answers: vec![AnswerValue {
            id: "q1".into(),
            value: 7.5,
        }],
    }
}

#[tokio::test]
async fn remote_success_skips_local_storage() {
    let database = MemoryDatabase::new();
    let base = spawn_server(database.clone()).await;
    let dir = tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());

    let outcome = submit(&reqwest::Client::new(), Some(base.as_str()), &payload(2), &store)
        .await
        .expect("submit");

    let Outcome::Remote { id } = outcome else {
        panic!("expected remote outcome, got {outcome:?}");
    };
    assert_eq!(database.snapshot().submissions[0].id.to_string(), id);
    assert!(store.load_submissions().is_empty());
}

#[tokio::test]
async fn rejection_falls_back_once() {
    let database = MemoryDatabase::new();
    let base = spawn_server(database.clone()).await;
    let dir = tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());

    let outcome = submit(&reqwest::Client::new(), Some(base.as_str()), &payload(0), &store)
        .await
        .expect("submit");

    assert!(matches!(outcome, Outcome::Local(_)));
    assert_eq!(store.load_submissions().len(), 1);
    assert!(database.snapshot().submissions.is_empty());
}

#[tokio::test]
async fn missing_base_url_falls_back() {
    let dir = tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());

    let outcome = submit(&reqwest::Client::new(), None, &payload(1), &store)
        .await
        .expect("submit");

    let Outcome::Local(entry) = outcome else {
        panic!("expected local outcome");
    };
    assert_eq!(store.load_submissions(), vec![entry]);
}

#[tokio::test]
async fn unreachable_server_falls_back() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);

    let dir = tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());

    let base = format!("http://{address}");
    let outcome = submit(&reqwest::Client::new(), Some(base.as_str()), &payload(1), &store)
        .await
        .expect("submit");

    assert!(matches!(outcome, Outcome::Local(_)));
}

#[tokio::test]
async fn missing_admin_falls_back_without_admin() {
    let database = MemoryDatabase::new();
    let base = spawn_server(database.clone()).await;
    let dir = tempdir().expect("tempdir");
    let store = LocalStore::new(dir.path());
    let mut payload = payload(1);
    payload.admin = None;

    let outcome = submit(&reqwest::Client::new(), Some(base.as_str()), &payload, &store)
        .await
        .expect("submit");

    let Outcome::Local(entry) = outcome else {
        panic!("expected local outcome");
    };
    assert_eq!(entry.admin, None);
    assert_eq!(entry.answers, payload.answers);
    assert_eq!(store.load_submissions(), vec![entry]);
    assert!(database.snapshot().submissions.is_empty());
}

#[tokio::test]
async fn api_refuses_payload_without_admin() {
    let mut payload = payload(1);
    payload.admin = None;

    let err = create_submission(&reqwest::Client::new(), "http://127.0.0.1:9", &payload)
        .await
        .expect_err("missing admin");

    assert!(matches!(err, ClientError::MissingAdmin));
}
