mod client;
mod mock;
mod transport;

pub use client::ReqwestTransport;
pub use mock::MockTransport;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method};
