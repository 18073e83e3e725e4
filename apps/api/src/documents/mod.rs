pub mod extractor;
pub mod handlers;
pub mod service_client;
pub mod upload;
