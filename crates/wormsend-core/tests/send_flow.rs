//! End-to-end send tests against a fake `wormhole` script.
//!
//! These tests verify:
//! - Both stages resolve in order with the scraped code and receiver
//! - Early exits and timeouts resolve the pending stage with an error
//! - Cancelling or abandoning a send kills the tool

#![cfg(unix)]

mod common;

use std::time::Duration;

use wormsend_core::config::parse_duration;
use wormsend_core::session::{SendState, Stage};
use wormsend_core::transfer::SendRequest;
use wormsend_core::Error;

use common::{create_fake_tool, create_temp_dir, create_test_file, start_send, HAPPY_PATH_SCRIPT};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_code_then_confirmation() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "notes.txt", b"payload");
    let tool = create_fake_tool(dir.path(), HAPPY_PATH_SCRIPT);

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let progress = pending.progress();

    let ready = tokio::time::timeout(TEST_TIMEOUT, pending.code())
        .await
        .expect("code should arrive")
        .expect("code stage should succeed");
    assert_eq!(ready.code.as_str(), "7-crossover-clockwork");

    let receipt = tokio::time::timeout(TEST_TIMEOUT, ready.completion.wait())
        .await
        .expect("confirmation should arrive")
        .expect("confirmation stage should succeed");
    assert_eq!(receipt.receiver, "(<-192.168.1.5:4321)");
    assert_eq!(receipt.code.as_str(), "7-crossover-clockwork");

    let snapshot = progress.borrow().clone();
    assert_eq!(snapshot.state, SendState::Confirmed);
    assert_eq!(snapshot.percent, Some(100));
    assert_eq!(snapshot.receiver.as_deref(), Some("(<-192.168.1.5:4321)"));
}

#[tokio::test]
async fn test_confirmation_without_receiver_line() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.bin", b"x");
    let tool = create_fake_tool(
        dir.path(),
        r#"
echo "Wormhole code is: 3-apollo-babylon" >&2
echo "Confirmation received. Transfer complete." >&2
"#,
    );

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let ready = pending.code().await.expect("code");
    let receipt = ready.completion.wait().await.expect("confirmation");

    assert_eq!(receipt.code.as_str(), "3-apollo-babylon");
    assert_eq!(receipt.receiver, "");
}

#[tokio::test]
async fn test_all_paths_are_passed_in_order() {
    let dir = create_temp_dir();
    let first = create_test_file(dir.path(), "first.txt", b"1");
    let second = create_test_file(dir.path(), "folder/second.txt", b"2");
    let folder = second.parent().unwrap().to_path_buf();
    let args_file = dir.path().join("args.txt");

    let tool = create_fake_tool(
        dir.path(),
        &format!(
            r#"
for arg in "$@"; do echo "$arg" >> '{}'; done
echo "Wormhole code is: 9-a-b" >&2
echo "Confirmation received" >&2
"#,
            args_file.display()
        ),
    );

    let pending =
        start_send(SendRequest::new(vec![first.clone(), folder.clone()]).with_tool(&tool)).await;
    let ready = pending.code().await.expect("code");
    ready.completion.wait().await.expect("confirmation");

    let args = std::fs::read_to_string(&args_file).expect("args recorded");
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(
        args,
        vec![
            "send",
            first.to_str().unwrap(),
            folder.to_str().unwrap()
        ]
    );
}

#[tokio::test]
async fn test_exit_before_code() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(
        dir.path(),
        r#"
echo "ERROR: could not reach the rendezvous server" >&2
exit 1
"#,
    );

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let err = tokio::time::timeout(TEST_TIMEOUT, pending.code())
        .await
        .expect("stage should resolve on exit")
        .expect_err("no code was printed");

    match err {
        Error::ExitedBeforeCode { status } => assert!(status.contains('1'), "{status}"),
        other => panic!("expected ExitedBeforeCode, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exit_before_confirmation() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(
        dir.path(),
        r#"
echo "Wormhole code is: 5-tolerance-vertigo" >&2
echo "Sending (<-10.1.1.1:9999).." >&2
exit 2
"#,
    );

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let ready = pending.code().await.expect("code");
    assert_eq!(ready.code.as_str(), "5-tolerance-vertigo");

    let err = tokio::time::timeout(TEST_TIMEOUT, ready.completion.wait())
        .await
        .expect("stage should resolve on exit")
        .expect_err("receiver never confirmed");
    assert!(matches!(err, Error::ExitedBeforeConfirmation { .. }));
}

#[tokio::test]
async fn test_code_stage_stays_pending_without_timeout() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(dir.path(), "exec sleep 30");

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let progress = pending.progress();

    let result = tokio::time::timeout(Duration::from_millis(500), pending.code()).await;
    assert!(result.is_err(), "no code line, so stage 1 must not resolve");
    assert_eq!(progress.borrow().state, SendState::Started);
}

#[tokio::test]
async fn test_code_timeout() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(dir.path(), "exec sleep 30");

    let request = SendRequest::new(vec![file])
        .with_tool(&tool)
        .with_code_timeout(Some(Duration::from_millis(200)));
    let pending = start_send(request).await;
    let progress = pending.progress();

    let err = tokio::time::timeout(TEST_TIMEOUT, pending.code())
        .await
        .expect("timeout should resolve the stage")
        .expect_err("should time out");
    assert!(matches!(
        err,
        Error::Timeout {
            stage: Stage::Code,
            ..
        }
    ));
    assert_eq!(progress.borrow().state, SendState::Failed);
}

#[tokio::test]
async fn test_confirm_timeout() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(
        dir.path(),
        r#"
echo "Wormhole code is: 2-a-b" >&2
exec sleep 30
"#,
    );

    let request = SendRequest::new(vec![file])
        .with_tool(&tool)
        .with_code_timeout(Some(Duration::from_secs(5)))
        .with_confirm_timeout(Some(Duration::from_millis(200)));
    let pending = start_send(request).await;
    let ready = pending.code().await.expect("code");

    let err = tokio::time::timeout(TEST_TIMEOUT, ready.completion.wait())
        .await
        .expect("timeout should resolve the stage")
        .expect_err("should time out");
    assert!(matches!(
        err,
        Error::Timeout {
            stage: Stage::Confirmation,
            ..
        }
    ));
    assert!(err.to_string().contains("200ms"), "{err}");
}

#[tokio::test]
async fn test_unrepresentable_timeout_means_no_limit() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(dir.path(), HAPPY_PATH_SCRIPT);

    let huge = parse_duration("5000000000000000h").expect("duration parses");
    let request = SendRequest::new(vec![file])
        .with_tool(&tool)
        .with_code_timeout(Some(huge))
        .with_confirm_timeout(Some(huge));
    let pending = start_send(request).await;

    let ready = tokio::time::timeout(TEST_TIMEOUT, pending.code())
        .await
        .expect("code should arrive")
        .expect("a huge timeout must not break the send");
    assert_eq!(ready.code.as_str(), "7-crossover-clockwork");

    let receipt = tokio::time::timeout(TEST_TIMEOUT, ready.completion.wait())
        .await
        .expect("confirmation should arrive")
        .expect("confirmation stage should succeed");
    assert_eq!(receipt.receiver, "(<-192.168.1.5:4321)");
}

#[tokio::test]
async fn test_tool_lingering_after_confirmation_is_killed() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(
        dir.path(),
        r#"
echo "Wormhole code is: 6-a-b" >&2
echo "Confirmation received" >&2
exec sleep 60
"#,
    );

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let mut progress = pending.progress();
    let ready = pending.code().await.expect("code");
    ready.completion.wait().await.expect("confirmation");

    // The driver drops its progress sender once the grace period has run
    // out and the tool is killed.
    let closed = tokio::time::timeout(Duration::from_secs(20), async {
        while progress.changed().await.is_ok() {}
    })
    .await;
    assert!(closed.is_ok(), "lingering tool should be killed after the grace period");
    assert_eq!(progress.borrow().state, SendState::Confirmed);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_receiver() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(
        dir.path(),
        r#"
echo "Wormhole code is: 4-a-b" >&2
exec sleep 30
"#,
    );

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let ready = pending.code().await.expect("code");
    let cancel = ready.completion.cancel_handle();

    cancel.cancel();
    let err = tokio::time::timeout(TEST_TIMEOUT, ready.completion.wait())
        .await
        .expect("cancel should resolve the stage")
        .expect_err("cancelled");
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_cancel_before_code() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(dir.path(), "exec sleep 30");

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    pending.cancel();

    let err = tokio::time::timeout(TEST_TIMEOUT, pending.code())
        .await
        .expect("cancel should resolve the stage")
        .expect_err("cancelled");
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_dropping_send_kills_tool() {
    let dir = create_temp_dir();
    let file = create_test_file(dir.path(), "a.txt", b"x");
    let tool = create_fake_tool(dir.path(), "exec sleep 30");

    let pending = start_send(SendRequest::new(vec![file]).with_tool(&tool)).await;
    let mut progress = pending.progress();
    drop(pending);

    // The driver drops its progress sender once it has killed the tool.
    let closed = tokio::time::timeout(TEST_TIMEOUT, async {
        while progress.changed().await.is_ok() {}
    })
    .await;
    assert!(closed.is_ok(), "driver should stop once the send is dropped");
}
