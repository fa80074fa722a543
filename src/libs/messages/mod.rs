//! User-facing messages.
//!
//! All text shown to the user goes through the [`Message`] enum and the
//! `msg_*!` macros in [`macros`], so wording is defined in one place.

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;
