//! Shared test fixtures for the container integration tests.

#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use parking_lot::Mutex;
use statekit::{Action, State};

/// Counter state used across scenarios.
#[derive(Clone, Debug, PartialEq)]
pub struct Counter {
    pub value: i64,
}

impl Counter {
    pub fn new(value: i64) -> Self {
        Self { value }
    }
}

impl State for Counter {}

/// Actions driving the counter fixtures.
#[derive(Clone, Debug, PartialEq)]
pub enum CounterAction {
    Increment,
    Add(i64),
    Boom,
}

impl Action for CounterAction {}

/// Append-only state for ordering assertions.
#[derive(Clone, Debug, PartialEq)]
pub struct Journal {
    pub entries: Vec<i64>,
}

impl Journal {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl State for Journal {}

/// Opt-in log output for debugging test failures:
/// `STATEKIT_TEST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STATEKIT_TEST_LOG"))
        .try_init();
}

/// Collects strings from handlers and effect leaves.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn push(log: &EventLog, entry: impl Into<String>) {
    log.lock().push(entry.into());
}

pub fn entries(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}
