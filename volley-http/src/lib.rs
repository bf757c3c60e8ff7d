#![forbid(unsafe_code)]

mod client;
mod connect;
mod error;
mod trace;
mod types;
mod util;

pub use client::HttpClient;
pub use error::{Error, Result};
pub use trace::{Event, EventName, Tracer};
pub use types::{HttpRequest, HttpResponse};
