use crate::models::Toast;

/// Where user-facing notifications go. Implementations must not block.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}
