pub mod client;
pub mod request;
pub mod response;
pub mod types;

pub use client::{Client, Transport};
pub use request::Request;
pub use response::Response;
pub use types::{Method, Status};
