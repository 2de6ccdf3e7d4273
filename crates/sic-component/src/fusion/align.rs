//! Timestamp alignment across declared inputs.
//!
//! ```text
//!   push(A@1.00) ─┐
//!   push(B@1.05) ─┼──► buffers ──► try_align ──► FusedInputs{A@1.00, B@1.05}
//!   push(A@2.00) ─┘     (type, origin) → newest-first deque
//! ```
//!
//! The candidate timestamp is the minimum over participating buffers of
//! their newest timestamp. Each participating buffer contributes its newest
//! message within the tolerance of the candidate; if any buffer has none,
//! nothing is consumed.

use super::buffer::{is_drop_warning, InputBuffer};
use super::inputs::{FusedInputs, InputSpec};
use crate::config::FusionConfig;
use crate::error::ComponentError;
use parking_lot::Mutex;
use serde_json::json;
use sic_message::Message;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct BufferKey {
    tag: String,
    origin: Option<String>,
}

/// Result of offering a message to the buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    /// Buffered after evicting the oldest entry of a full buffer.
    Evicted { dropped: u64, warn: bool },
    /// No declared input accepts this (type, origin).
    Undeclared,
    MissingTimestamp,
}

/// Result of one alignment attempt.
#[derive(Debug)]
pub enum Alignment {
    Fused(FusedInputs),
    /// Some declared input has no buffered message yet.
    Incomplete,
    /// Every input has data but some buffer has nothing near the candidate.
    OutOfTolerance { candidate: f64 },
}

#[derive(Debug)]
struct FusionState {
    buffers: BTreeMap<BufferKey, InputBuffer>,
    received: u64,
    fused: u64,
    since_progress: u64,
    last_progress: Instant,
    stall_warned: bool,
}

/// Per-stream buffers of one service, shared between its input
/// subscriptions and its fusion loop.
#[derive(Debug)]
pub struct FusionBuffers {
    specs: Vec<InputSpec>,
    config: FusionConfig,
    state: Mutex<FusionState>,
    notify: Notify,
}

impl FusionBuffers {
    pub fn new(specs: Vec<InputSpec>, config: FusionConfig) -> Result<Self, ComponentError> {
        if specs.is_empty() {
            return Err(ComponentError::Conf {
                name: "fusion".to_string(),
                reason: "a service must declare at least one input".to_string(),
            });
        }
        if !config.is_valid() {
            return Err(ComponentError::Conf {
                name: "fusion".to_string(),
                reason: format!("invalid fusion configuration: {config:?}"),
            });
        }
        Ok(Self {
            specs,
            config,
            state: Mutex::new(FusionState {
                buffers: BTreeMap::new(),
                received: 0,
                fused: 0,
                since_progress: 0,
                last_progress: Instant::now(),
                stall_warned: false,
            }),
            notify: Notify::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    #[must_use]
    pub fn specs(&self) -> &[InputSpec] {
        &self.specs
    }

    /// Declared input a (type, origin) stream feeds. An input pinned to the
    /// origin wins over an unpinned input of the same type.
    fn owner(&self, tag: &str, origin: Option<&str>) -> Option<usize> {
        let keyed = self.specs.iter().position(|spec| {
            spec.type_tag == tag && spec.origin.is_some() && spec.origin.as_deref() == origin
        });
        keyed.or_else(|| {
            self.specs
                .iter()
                .position(|spec| spec.type_tag == tag && spec.origin.is_none())
        })
    }

    pub fn push(&self, message: Box<dyn Message>) -> PushOutcome {
        let tag = message.type_tag();
        let origin = message.origin().map(str::to_string);
        if self.owner(tag, origin.as_deref()).is_none() {
            return PushOutcome::Undeclared;
        }
        if !message.timestamp().is_some_and(f64::is_finite) {
            return PushOutcome::MissingTimestamp;
        }

        let outcome = {
            let mut state = self.state.lock();
            state.received += 1;
            state.since_progress += 1;
            let capacity = self.config.capacity;
            let buffer = state
                .buffers
                .entry(BufferKey {
                    tag: tag.to_string(),
                    origin,
                })
                .or_insert_with(|| InputBuffer::new(capacity));
            match buffer.push(message) {
                None => PushOutcome::Buffered,
                Some(dropped) => PushOutcome::Evicted {
                    dropped,
                    warn: is_drop_warning(dropped),
                },
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Attempt one alignment, consuming the selected messages on success.
    pub fn try_align(&self) -> Alignment {
        let mut state = self.state.lock();

        let mut satisfied = vec![false; self.specs.len()];
        let mut participating = Vec::new();
        for (key, buffer) in &state.buffers {
            if buffer.is_empty() {
                continue;
            }
            if let Some(index) = self.owner(&key.tag, key.origin.as_deref()) {
                satisfied[index] = true;
                participating.push(key.clone());
            }
        }
        if !satisfied.iter().all(|s| *s) {
            return Alignment::Incomplete;
        }

        let candidate = participating
            .iter()
            .filter_map(|key| state.buffers.get(key).and_then(InputBuffer::newest_timestamp))
            .fold(f64::INFINITY, f64::min);

        let mut picks = Vec::with_capacity(participating.len());
        for key in &participating {
            let position = state
                .buffers
                .get(key)
                .and_then(|b| b.position_within(candidate, self.config.tolerance));
            match position {
                Some(index) => picks.push((key, index)),
                None => return Alignment::OutOfTolerance { candidate },
            }
        }

        let messages: Vec<Box<dyn Message>> = picks
            .into_iter()
            .filter_map(|(key, index)| state.buffers.get_mut(key).and_then(|b| b.take(index)))
            .collect();

        state.fused += 1;
        state.since_progress = 0;
        state.last_progress = Instant::now();
        state.stall_warned = false;
        Alignment::Fused(FusedInputs::new(candidate, messages))
    }

    pub fn pop_aligned(&self) -> Option<FusedInputs> {
        match self.try_align() {
            Alignment::Fused(inputs) => Some(inputs),
            _ => None,
        }
    }

    /// Inputs holding up fusion, once per stall.
    ///
    /// A stall is data arriving for longer than `stall_warning_after`
    /// without a fused tuple. Re-armed by the next successful alignment.
    /// The returned list is empty when every input has data but none line
    /// up.
    pub fn check_stall(&self) -> Option<Vec<String>> {
        let mut state = self.state.lock();
        if state.stall_warned
            || state.since_progress == 0
            || state.last_progress.elapsed() < self.config.stall_warning_after
        {
            return None;
        }
        state.stall_warned = true;

        let missing = self
            .specs
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                !state.buffers.iter().any(|(key, buffer)| {
                    !buffer.is_empty()
                        && self.owner(&key.tag, key.origin.as_deref()) == Some(*index)
                })
            })
            .map(|(_, spec)| spec.to_string())
            .collect();
        Some(missing)
    }

    /// Wait for the next push.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.state.lock().buffers.values().map(InputBuffer::len).sum()
    }

    pub fn stats(&self) -> serde_json::Value {
        let state = self.state.lock();
        let buffers: Vec<serde_json::Value> = state
            .buffers
            .iter()
            .map(|(key, buffer)| {
                json!({
                    "type": key.tag,
                    "origin": key.origin,
                    "buffered": buffer.len(),
                    "dropped": buffer.dropped(),
                })
            })
            .collect();
        json!({
            "inputs": self.specs.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "received": state.received,
            "fused": state.fused,
            "buffers": buffers,
        })
    }
}
