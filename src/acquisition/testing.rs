//! In-process fakes for the network feed and the clock.

use crate::acquisition::error::FeedError;
use crate::acquisition::feed::{FeedResponse, GridFeed};
use crate::acquisition::retry::Sleeper;
use crate::types::variable::ObservationInstant;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

type Responder = dyn Fn(ObservationInstant, &str, usize) -> FeedResponse + Send + Sync;

/// Answers every request through a closure and records what was asked.
/// The closure receives the instant, the variable and how many times this
/// (instant, variable) pair was requested before.
pub struct ScriptedFeed {
    responder: Box<Responder>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedFeed {
    pub fn new(
        responder: impl Fn(ObservationInstant, &str, usize) -> FeedResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A feed that always answers with `count` values of `value`.
    pub fn constant(count: usize, value: f64) -> Self {
        let body = vec![format!("{}", value); count].join(" ");
        Self::new(move |_, _, _| FeedResponse::ok(body.clone()))
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GridFeed for ScriptedFeed {
    async fn request(
        &self,
        instant: ObservationInstant,
        variable: &str,
    ) -> Result<FeedResponse, FeedError> {
        let tm = instant.tm();
        let previous = match self.calls.lock() {
            Ok(mut calls) => {
                let previous = calls
                    .iter()
                    .filter(|(t, v)| *t == tm && v == variable)
                    .count();
                calls.push((tm, variable.to_string()));
                previous
            }
            Err(_) => 0,
        };
        Ok((self.responder)(instant, variable, previous))
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}
