//! Built-in send hooks.
//!
//! Currently provides the [`SmtpApiHook`], which validates the message
//! overrides and writes the merged `X-SMTPAPI` header.

pub mod smtpapi;

pub use smtpapi::*;
