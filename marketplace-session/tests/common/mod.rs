//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use marketplace_session::medium::MemoryMedium;
use marketplace_session::{RoutePolicy, SessionConfig, SessionEngine, SessionEvent, SessionHandle};
use tokio::sync::broadcast;

pub const KEY: &str = "session.v1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> SessionConfig {
    SessionConfig::new(std::env::temp_dir().join("marketplace-session-tests"))
        .with_storage_key(KEY)
        .with_sync_poll_interval(Duration::from_millis(20))
}

/// Engine for one context of `medium`
pub fn engine_on(medium: &MemoryMedium) -> SessionEngine {
    SessionEngine::start(&test_config(), Arc::new(medium.clone()), RoutePolicy::marketplace())
}

pub async fn login_as(handle: &SessionHandle, subject: &str, role: &str) {
    handle
        .login(subject.into(), role.into(), format!("token-{subject}"), None)
        .await
        .unwrap();
}

/// Next event, failing the test after two seconds
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}
