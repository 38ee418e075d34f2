pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod header;
pub mod hook;
pub mod hooks;
pub mod json;
pub mod message;
pub mod settings;

pub use config::*;
pub use delivery::*;
pub use error::*;
pub use filter::*;
pub use header::*;
pub use hook::*;
pub use hooks::*;
pub use json::*;
pub use message::*;
pub use settings::*;
