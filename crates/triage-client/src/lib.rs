//! HTTP implementation of the backend API, plus a scripted mock for tests.

pub mod http;
pub mod mock;
pub mod models;

pub use http::HttpTriageApi;
pub use mock::MockApi;
