use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_messages: usize,
    pub average_response_ms: f64,
    pub success_rate: f64,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TrackedMessage {
    message: String,
    response: Option<(bool, Duration)>,
}

#[derive(Debug, Default)]
struct MetricsState {
    messages: Vec<TrackedMessage>,
    pending: HashMap<String, Instant>,
}

/// Per-session chat counters. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    state: Arc<Mutex<MetricsState>>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MetricsState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    pub fn track_message(&self, message: &str) {
        self.with_state(|state| {
            state.pending.insert(message.to_string(), Instant::now());
            state.messages.push(TrackedMessage {
                message: message.to_string(),
                response: None,
            });
        });
    }

    /// Records the outcome of a tracked message. Unknown messages are ignored.
    /// `elapsed` defaults to the time since [`Self::track_message`].
    pub fn track_response(&self, message: &str, success: bool, elapsed: Option<Duration>) {
        self.with_state(|state| {
            let Some(started) = state.pending.remove(message) else {
                return;
            };
            let elapsed = elapsed.unwrap_or_else(|| started.elapsed());
            if let Some(tracked) = state
                .messages
                .iter_mut()
                .find(|row| row.message == message && row.response.is_none())
            {
                tracked.response = Some((success, elapsed));
            }
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.with_state(|state| {
            let total_messages = state.messages.len();
            let answered: Vec<(bool, Duration)> =
                state.messages.iter().filter_map(|row| row.response).collect();
            let successes = answered.iter().filter(|(success, _)| *success).count();
            let success_rate = if total_messages == 0 {
                100.0
            } else {
                successes as f64 / total_messages as f64 * 100.0
            };
            let average_response_ms = if answered.is_empty() {
                0.0
            } else {
                answered
                    .iter()
                    .map(|(_, elapsed)| elapsed.as_secs_f64() * 1000.0)
                    .sum::<f64>()
                    / answered.len() as f64
            };
            MetricsSnapshot {
                total_messages,
                average_response_ms,
                success_rate,
                last_update: Utc::now(),
            }
        })
    }

    pub fn clear(&self) {
        self.with_state(|state| {
            state.messages.clear();
            state.pending.clear();
        });
    }
}
