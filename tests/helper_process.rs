//! Tests for the helper-process capability, using a small shell helper.

#![cfg(unix)]

mod common;

use followee_broker::capability::{Capability, CapabilityError, Credentials, HelperProcess};
use followee_broker::config::HelperCommand;
use followee_broker::{BrokerConfig, Dispatcher, ExitReason, SessionManager, ShutdownTrigger};
use serde_json::json;
use std::time::Duration;

use common::Script;

const HELPER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"op":"authenticate"'*)
      case "$line" in
        *'"password":"wrong"'*) echo '{"ok":false,"error":"bad credentials"}' ;;
        *) echo '{"ok":true,"session":{"token":"t1"}}' ;;
      esac ;;
    *'"op":"resolve_account"'*)
      case "$line" in
        *'"username":"ghost"'*) echo '{"ok":false,"error":"User not found"}' ;;
        *) echo '{"ok":true,"account_id":1784}' ;;
      esac ;;
    *'"op":"list_followees"'*)
      echo '{"ok":true,"followees":[{"username":"a","full_name":"A"},{"username":"b"}]}' ;;
    *'"op":"end_session"'*)
      echo '{"ok":true}' ;;
    *)
      echo '{"ok":false}' ;;
  esac
done
"#;

fn helper_command() -> HelperCommand {
    HelperCommand::new("sh").arg("-c").arg(HELPER)
}

/// A helper that prints diagnostics on stdout before each reply.
const CHATTY_HELPER: &str = r#"
while IFS= read -r line; do
  echo "loading session cache..."
  echo '{"progress":1}'
  case "$line" in
    *'"op":"authenticate"'*) echo '{"ok":true,"session":"s1"}' ;;
    *'"op":"resolve_account"'*) echo '{"ok":true,"account_id":"42"}' ;;
    *'"op":"list_followees"'*) echo '{"ok":true,"followees":[{"username":"c","full_name":"C"}]}' ;;
    *) echo '{"ok":true}' ;;
  esac
done
"#;

/// A helper that never answers `list_followees`.
const STALLING_HELPER: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"op":"authenticate"'*) echo '{"ok":true,"session":"s1"}' ;;
    *'"op":"list_followees"'*) sleep 5; echo '{"ok":true,"followees":[]}' ;;
    *) echo '{"ok":true}' ;;
  esac
done
"#;

#[tokio::test]
async fn full_conversation() {
    let mut helper = HelperProcess::spawn(&helper_command()).unwrap();
    assert!(helper.pid().is_some());

    let session = helper
        .authenticate(&Credentials::new("alice", "pw"))
        .await
        .unwrap();
    assert_eq!(session, json!({"token": "t1"}));

    let account = helper.resolve_account(&session, "nasa").await.unwrap();
    assert_eq!(account.as_str(), "1784");

    let followees = helper.list_followees(&session, &account).await.unwrap();
    assert_eq!(followees.len(), 2);
    assert_eq!(followees[0].username, "a");
    assert_eq!(followees[0].full_name, "A");
    assert_eq!(followees[1].full_name, "");

    helper.end_session(session).await.unwrap();
}

#[tokio::test]
async fn helper_errors_are_relayed() {
    let mut helper = HelperProcess::spawn(&helper_command()).unwrap();

    let err = helper
        .authenticate(&Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.message(), "bad credentials");

    let session = helper
        .authenticate(&Credentials::new("alice", "pw"))
        .await
        .unwrap();
    let err = helper.resolve_account(&session, "ghost").await.unwrap_err();
    assert_eq!(err.message(), "User not found");
}

#[tokio::test]
async fn stray_helper_output_is_skipped() {
    let mut helper =
        HelperProcess::spawn(&HelperCommand::new("sh").arg("-c").arg(CHATTY_HELPER)).unwrap();

    let session = helper
        .authenticate(&Credentials::new("alice", "pw"))
        .await
        .unwrap();
    assert_eq!(session, json!("s1"));

    // Each reply still lines up with its own request.
    let account = helper.resolve_account(&session, "nasa").await.unwrap();
    assert_eq!(account.as_str(), "42");
    let followees = helper.list_followees(&session, &account).await.unwrap();
    assert_eq!(followees.len(), 1);
    assert_eq!(followees[0].username, "c");
    helper.end_session(session).await.unwrap();
}

#[tokio::test]
async fn abandoned_call_poisons_the_helper() {
    let mut helper =
        HelperProcess::spawn(&HelperCommand::new("sh").arg("-c").arg(STALLING_HELPER)).unwrap();
    let session = helper
        .authenticate(&Credentials::new("alice", "pw"))
        .await
        .unwrap();

    let account = followee_broker::capability::AccountId::new("1");
    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        helper.list_followees(&session, &account),
    )
    .await;
    assert!(abandoned.is_err());

    let err = helper.end_session(session).await.unwrap_err();
    assert!(err.message().contains("out of sync"), "{}", err);
}

#[tokio::test]
async fn helper_exit_is_an_error() {
    let mut helper = HelperProcess::spawn(&HelperCommand::new("sh").arg("-c").arg("exit 0")).unwrap();
    let err = helper
        .authenticate(&Credentials::new("alice", "pw"))
        .await
        .unwrap_err();
    assert!(!err.message().is_empty());
}

#[tokio::test]
async fn broker_over_helper_process() {
    let command = helper_command();
    let sessions =
        SessionManager::new(move || HelperProcess::spawn(&command).map_err(CapabilityError::from));

    let input = Script::new()
        .login(1, "alice", "pw")
        .fetch(2, "nasa")
        .logout(3)
        .shutdown()
        .build();
    let mut dispatcher = Dispatcher::new(
        sessions,
        input.as_bytes(),
        Vec::new(),
        &BrokerConfig::default(),
        ShutdownTrigger::new(),
    );
    assert_eq!(dispatcher.run().await.unwrap(), ExitReason::ShutdownCommand);

    let messages = common::parse_output(&dispatcher.into_output());
    let batch = messages
        .iter()
        .find(|m| m["command"] == "fetch_batch")
        .unwrap();
    assert_eq!(batch["request_id"], 2);
    assert_eq!(
        batch["data"],
        json!([{"username": "a", "full_name": "A"}, {"username": "b", "full_name": ""}])
    );
    assert!(messages
        .iter()
        .any(|m| m["command"] == "logout" && m["request_id"] == 3));
}

#[tokio::test]
async fn missing_helper_fails_login() {
    let command = HelperCommand::new("/nonexistent/followee-helper");
    let sessions =
        SessionManager::new(move || HelperProcess::spawn(&command).map_err(CapabilityError::from));

    let input = Script::new().login(1, "alice", "pw").build();
    let mut dispatcher = Dispatcher::new(
        sessions,
        input.as_bytes(),
        Vec::new(),
        &BrokerConfig::default(),
        ShutdownTrigger::new(),
    );
    dispatcher.run().await.unwrap();

    let messages = common::parse_output(&dispatcher.into_output());
    let login = messages
        .iter()
        .find(|m| m["command"] == "login_response")
        .unwrap();
    assert_eq!(login["success"], false);
    assert!(messages.iter().any(|m| m["status"] == "login_error"));
}
