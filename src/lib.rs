pub mod access;
pub mod config;
pub mod exception;
pub mod mime;
pub mod param;
pub mod request;
pub mod response;
pub mod server;
pub mod session;
pub mod stream;
pub mod util;

pub use access::DocumentRoot;
pub use config::Config;
pub use exception::{AccessError, ParseError};
pub use param::{ContentType, HttpVersion, StatusCode};
pub use request::Request;
pub use response::ResponseHeaders;
pub use server::Server;
