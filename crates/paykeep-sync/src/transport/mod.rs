//! Network transport. [`ReqwestTransport`] is the production
//! `HttpTransport`; tests use the scripted mock from `test-fixtures`.

mod http_client;

pub use http_client::ReqwestTransport;
