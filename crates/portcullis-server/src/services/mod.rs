//! Built-in services.

pub mod echo;
pub mod ping;

pub use echo::EchoService;
pub use ping::PingService;
