//! In-memory transport replaying a script of outcomes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use kyte::{Error, Request, Response, Result, Transport};
use tokio::time::Instant;

/// What the transport does for one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Response),
    Fail(Error),
    /// Never completes.
    Hang,
}

/// A request as seen by the transport, with the (virtual) time it arrived.
#[derive(Debug, Clone)]
pub struct Sent {
    pub request: Request,
    pub at: Instant,
}

/// Replays its steps in order; once exhausted, repeats the last one.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            sent: Arc::default(),
        }
    }

    /// Always answers with this status.
    pub fn status(status: u16) -> Self {
        Self::new([Step::Respond(Response::with_status(status))])
    }

    /// Always fails to connect.
    pub fn refusing() -> Self {
        Self::new([Step::Fail(Error::connection("connection refused"))])
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().expect("lock").len()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("lock").clone()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().expect("lock");
        if steps.len() > 1 {
            steps.pop_front().expect("non empty")
        } else {
            steps.front().cloned().expect("script must not be empty")
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        self.sent.lock().expect("lock").push(Sent {
            request,
            at: Instant::now(),
        });
        let step = self.next_step();
        async move {
            match step {
                Step::Respond(response) => Ok(response),
                Step::Fail(error) => Err(error),
                Step::Hang => std::future::pending().await,
            }
        }
    }
}
