use std::sync::Mutex;

use paykeep_core::models::{Toast, ToastKind};
use paykeep_core::traits::ToastSink;

/// Keeps every toast shown, in order.
#[derive(Debug, Default)]
pub struct RecordingToastSink {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingToastSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: ToastKind) -> Vec<Toast> {
        self.toasts()
            .into_iter()
            .filter(|t| t.kind == kind)
            .collect()
    }
}

impl ToastSink for RecordingToastSink {
    fn show(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}
