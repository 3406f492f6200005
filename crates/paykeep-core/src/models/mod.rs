mod body;
mod cache;
mod connection;
mod http;
mod queued_request;
mod snapshot;
mod stats;
mod toast;

pub use body::{FormEntry, SerializedBody};
pub use cache::{Category, CategoryRef, Payment, PaymentFilter, PaymentStatus, UserProfile};
pub use connection::ConnectionStatus;
pub use http::{ByteStream, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use queued_request::{QueueEntryStatus, QueuedRequest, QueuedRequestPatch, Reservation};
pub use snapshot::{OfflineData, OfflineSnapshot};
pub use stats::{QueueCounts, QueueStats};
pub use toast::{Toast, ToastKind};
