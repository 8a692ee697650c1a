//! Download progress reporting.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Text shown by loading indicators when the pipeline fails.
pub const FAILURE_TEXT: &str = "Could not load model";

/// Bytes received so far, and the announced total if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub received: u64,
    pub total: Option<u64>,
}

impl Progress {
    /// Completion percentage, rounded, or `None` when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|&t| t > 0)?;
        let pct = (self.received as f64 / total as f64 * 100.0).round();
        Some(pct.clamp(0.0, 100.0) as u8)
    }
}

/// Receives progress updates, in strictly increasing percentage order.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, percent: u8, progress: Progress);
}

/// Filters raw fetch progress into the ordered event stream consumers see.
///
/// Only strictly increasing percentages are forwarded, so a fallback strategy
/// that restarts the download never moves the indicator backwards. Once
/// closed the reporter drops everything, which keeps progress strictly
/// before the terminal cache transition.
pub struct ProgressReporter {
    state: Mutex<ReporterState>,
    sinks: Vec<Arc<dyn ProgressSink>>,
}

struct ReporterState {
    last_percent: Option<u8>,
    closed: bool,
}

impl ProgressReporter {
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self {
            state: Mutex::new(ReporterState {
                last_percent: None,
                closed: false,
            }),
            sinks,
        }
    }

    /// Forward an update if it advances the percentage. Unknown totals are
    /// suppressed.
    pub fn report(&self, progress: Progress) {
        let Some(percent) = progress.percent() else {
            return;
        };

        {
            let mut state = self.state.lock();
            if state.closed || state.last_percent.is_some_and(|last| percent <= last) {
                return;
            }
            state.last_percent = Some(percent);
        }

        for sink in &self.sinks {
            sink.on_progress(percent, progress);
        }
    }

    /// Stop forwarding. Called before the terminal event is published.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.state.lock().last_percent
    }
}

/// Visual state of one loading indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorState {
    pub text: String,
    pub visible: bool,
    pub error: bool,
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            text: "Loading…".into(),
            visible: true,
            error: false,
        }
    }
}

/// A text slot a host displays while the model loads.
///
/// Cheap to clone; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct LoadingIndicator {
    state: Arc<Mutex<IndicatorState>>,
}

impl LoadingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> IndicatorState {
        self.state.lock().clone()
    }

    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    /// Show a percentage, unless the indicator has been hidden.
    pub fn show_percent(&self, percent: u8) {
        let mut state = self.state.lock();
        if state.visible {
            state.text = format!("Loading… {}%", percent);
        }
    }

    /// Replace the text with the failure message.
    pub fn show_failure(&self) {
        let mut state = self.state.lock();
        state.text = FAILURE_TEXT.into();
        state.error = true;
        state.visible = true;
    }

    pub fn hide(&self) {
        self.state.lock().visible = false;
    }

    fn downgrade(&self) -> Weak<Mutex<IndicatorState>> {
        Arc::downgrade(&self.state)
    }
}

/// Every loading indicator currently present, held weakly.
///
/// Indicators disappear from the registry when their owner drops them, so
/// an absent indicator is never an error.
#[derive(Default)]
pub struct LoadingIndicators {
    slots: Mutex<Vec<Weak<Mutex<IndicatorState>>>>,
}

impl LoadingIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, indicator: &LoadingIndicator) {
        let mut slots = self.slots.lock();
        slots.retain(|w| w.strong_count() > 0);
        slots.push(indicator.downgrade());
    }

    /// Indicators still alive.
    pub fn live(&self) -> Vec<LoadingIndicator> {
        let mut slots = self.slots.lock();
        slots.retain(|w| w.strong_count() > 0);
        slots
            .iter()
            .filter_map(Weak::upgrade)
            .map(|state| LoadingIndicator { state })
            .collect()
    }
}

impl ProgressSink for LoadingIndicators {
    fn on_progress(&self, percent: u8, _progress: Progress) {
        for indicator in self.live() {
            indicator.show_percent(percent);
        }
    }
}

/// Logs progress at every `step` percent.
pub struct ProgressLog {
    step: u8,
}

impl ProgressLog {
    pub fn new(step: u8) -> Self {
        Self { step: step.max(1) }
    }
}

impl ProgressSink for ProgressLog {
    fn on_progress(&self, percent: u8, progress: Progress) {
        if percent % self.step == 0 {
            info!(
                "Model download {}% ({} / {} bytes)",
                percent,
                progress.received,
                progress.total.unwrap_or(0)
            );
        }
    }
}
