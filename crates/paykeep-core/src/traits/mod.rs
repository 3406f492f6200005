mod cache_store;
mod clock;
mod queue_store;
mod toast;
mod transport;

pub use cache_store::CacheStore;
pub use clock::{Clock, SystemClock};
pub use queue_store::QueueStore;
pub use toast::ToastSink;
pub use transport::HttpTransport;
