pub mod push;
pub mod rest;
pub mod surface;

pub use push::{Backoff, WsTransport};
pub use rest::RestApiAdapter;
pub use surface::ConsoleSurface;
