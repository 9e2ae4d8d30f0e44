//! Command classification and per-branch responses of the dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cmd_broker::dispatch::{
    not_registered_msg, too_long_msg, truncate_to_boundary, Command, Dispatcher, ALL_HIDDEN_MSG,
    ALREADY_HIDDEN_MSG, EXEC_FAILED_MSG, LIST_HEADER, NOT_HIDDEN_MSG, NOW_HIDDEN_MSG,
    NOW_VISIBLE_MSG,
};
use cmd_broker::exec::Executor;
use cmd_broker::models::client::ClientId;
use cmd_broker::models::request::Request;
use cmd_broker::registry::Registry;
use cmd_broker::{AppError, Result};

/// Returns a fixed transformation of the command without running anything.
struct EchoExecutor;

impl Executor for EchoExecutor {
    fn execute<'a>(
        &'a self,
        command: &'a str,
        _max_output_bytes: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move { Ok(format!("ran: {command}").into_bytes()) })
    }
}

/// Ignores the output limit and returns `output` verbatim.
struct FixedOutputExecutor(Vec<u8>);

impl Executor for FixedOutputExecutor {
    fn execute<'a>(
        &'a self,
        _command: &'a str,
        _max_output_bytes: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

struct FailingExecutor;

impl Executor for FailingExecutor {
    fn execute<'a>(
        &'a self,
        _command: &'a str,
        _max_output_bytes: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move { Err(AppError::Exec("no such shell".into())) })
    }
}

fn dispatcher_with(executor: Arc<dyn Executor>, max_payload_bytes: usize) -> Dispatcher {
    Dispatcher::new(Arc::new(Registry::new(10)), executor, max_payload_bytes)
}

fn dispatcher() -> Dispatcher {
    dispatcher_with(Arc::new(EchoExecutor), 1023)
}

async fn send(dispatcher: &Dispatcher, pid: u32, command: &str) -> String {
    dispatcher
        .dispatch(&Request::new(ClientId(pid), command))
        .await
}

// ─── Classification ────────────────────────────────────────────────────

#[test]
fn reserved_keywords_match_exactly() {
    assert_eq!(Command::parse("LIST"), Command::List);
    assert_eq!(Command::parse("HIDE"), Command::Hide);
    assert_eq!(Command::parse("UNHIDE"), Command::Unhide);
}

#[test]
fn keyword_matching_is_case_sensitive_and_untrimmed() {
    assert_eq!(Command::parse("list"), Command::External("list"));
    assert_eq!(Command::parse(" LIST"), Command::External(" LIST"));
    assert_eq!(Command::parse("HIDE "), Command::External("HIDE "));
    assert_eq!(Command::parse("ls -la"), Command::External("ls -la"));
}

// ─── LIST ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_with_no_registered_clients_reports_all_hidden() {
    let dispatcher = dispatcher();
    assert_eq!(send(&dispatcher, 1, "LIST").await, ALL_HIDDEN_MSG);
}

#[tokio::test]
async fn list_with_every_client_hidden_reports_all_hidden() {
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    for pid in [1, 2] {
        registry.register_if_new(ClientId(pid)).await;
        registry.hide(ClientId(pid)).await;
    }

    assert_eq!(send(&dispatcher, 1, "LIST").await, ALL_HIDDEN_MSG);
}

#[tokio::test]
async fn list_renders_header_and_one_line_per_visible_client() {
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    for pid in [300, 100, 200] {
        registry.register_if_new(ClientId(pid)).await;
    }
    registry.hide(ClientId(100)).await;

    let reply = send(&dispatcher, 300, "LIST").await;
    assert_eq!(
        reply,
        format!("{LIST_HEADER}Client PID: 300\nClient PID: 200\n")
    );
}

#[tokio::test]
async fn list_is_truncated_to_payload_limit() {
    let dispatcher = dispatcher_with(Arc::new(EchoExecutor), 63);
    let registry = dispatcher.registry();
    for pid in 1_000_000..1_000_010 {
        registry.register_if_new(ClientId(pid)).await;
    }

    let reply = send(&dispatcher, 1_000_000, "LIST").await;
    assert!(reply.len() <= 63);
    assert!(reply.starts_with(LIST_HEADER));
}

// ─── HIDE / UNHIDE ─────────────────────────────────────────────────────

#[tokio::test]
async fn hide_then_hide_again_reports_already_hidden() {
    let dispatcher = dispatcher();
    dispatcher.registry().register_if_new(ClientId(42)).await;

    assert_eq!(send(&dispatcher, 42, "HIDE").await, NOW_HIDDEN_MSG);
    assert_eq!(send(&dispatcher, 42, "HIDE").await, ALREADY_HIDDEN_MSG);
    assert!(dispatcher.registry().list_visible().await.is_empty());
}

#[tokio::test]
async fn hide_then_unhide_restores_listing() {
    let dispatcher = dispatcher();
    dispatcher.registry().register_if_new(ClientId(42)).await;

    send(&dispatcher, 42, "HIDE").await;
    assert_eq!(send(&dispatcher, 42, "LIST").await, ALL_HIDDEN_MSG);

    assert_eq!(send(&dispatcher, 42, "UNHIDE").await, NOW_VISIBLE_MSG);
    assert!(send(&dispatcher, 42, "LIST").await.contains("Client PID: 42\n"));
}

#[tokio::test]
async fn unhide_on_visible_client_reports_not_hidden() {
    let dispatcher = dispatcher();
    dispatcher.registry().register_if_new(ClientId(8)).await;

    assert_eq!(send(&dispatcher, 8, "UNHIDE").await, NOT_HIDDEN_MSG);
    assert_eq!(send(&dispatcher, 8, "UNHIDE").await, NOT_HIDDEN_MSG);
    assert_eq!(dispatcher.registry().list_visible().await, vec![ClientId(8)]);
}

#[tokio::test]
async fn hide_and_unhide_from_unregistered_client_return_explicit_error() {
    let dispatcher = dispatcher();

    assert_eq!(send(&dispatcher, 77, "HIDE").await, not_registered_msg(ClientId(77)));
    assert_eq!(send(&dispatcher, 77, "UNHIDE").await, not_registered_msg(ClientId(77)));
    assert!(dispatcher.registry().is_empty().await);
}

#[tokio::test]
async fn hide_only_affects_the_sender() {
    let dispatcher = dispatcher();
    for pid in [1, 2] {
        dispatcher.registry().register_if_new(ClientId(pid)).await;
    }

    send(&dispatcher, 1, "HIDE").await;
    assert_eq!(dispatcher.registry().list_visible().await, vec![ClientId(2)]);
}

// ─── External commands ─────────────────────────────────────────────────

#[tokio::test]
async fn other_text_goes_to_executor() {
    let dispatcher = dispatcher();
    assert_eq!(send(&dispatcher, 1, "uname -a").await, "ran: uname -a");
}

#[tokio::test]
async fn executor_failure_yields_fixed_error() {
    let dispatcher = dispatcher_with(Arc::new(FailingExecutor), 1023);
    assert_eq!(send(&dispatcher, 1, "whatever").await, EXEC_FAILED_MSG);
}

#[tokio::test]
async fn oversized_output_is_truncated_on_char_boundary() {
    let output = "é".repeat(1000).into_bytes();
    let dispatcher = dispatcher_with(Arc::new(FixedOutputExecutor(output)), 1023);

    let reply = send(&dispatcher, 1, "cat big").await;
    assert!(reply.len() <= 1023);
    assert!(reply.chars().all(|c| c == 'é'));
    assert_eq!(reply.len(), 1022);
}

#[tokio::test]
async fn invalid_utf8_output_is_replaced() {
    let dispatcher = dispatcher_with(Arc::new(FixedOutputExecutor(vec![b'o', b'k', 0xff])), 1023);
    assert_eq!(send(&dispatcher, 1, "binary").await, "ok\u{fffd}");
}

#[tokio::test]
async fn command_over_payload_limit_is_refused() {
    let dispatcher = dispatcher_with(Arc::new(EchoExecutor), 63);
    let reply = send(&dispatcher, 1, &"x".repeat(64)).await;
    assert_eq!(reply, too_long_msg(63));
}

#[test]
fn truncate_keeps_short_text_intact() {
    assert_eq!(truncate_to_boundary("short".into(), 1023), "short");
    assert_eq!(truncate_to_boundary("abcdef".into(), 3), "abc");
    assert_eq!(truncate_to_boundary("aé".into(), 2), "a");
}
