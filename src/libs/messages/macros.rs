//! Macros for user-facing output.
//!
//! Each macro prints a [`Message`](super::Message) to the terminal, or routes
//! it through `tracing` when debug mode is on, so a running agent either
//! talks to the user or logs, never both.
//!
//! ## Debug mode
//!
//! Enabled when `ACTRAIL_DEBUG` or `RUST_LOG` is set. Checked once and cached.
//!
//! ## Macros
//!
//! - `msg_print!`: plain message
//! - `msg_success!`, `msg_info!`, `msg_warning!`, `msg_error!`: prefixed
//!   messages; errors and warnings go to stderr outside debug mode
//! - `msg_debug!`: only emitted in debug mode
//! - `msg_error_anyhow!`, `msg_bail_anyhow!`: build or return an
//!   `anyhow::Error` carrying the message
//!
//! ```rust
//! use actrail::libs::messages::Message;
//! use actrail::{msg_info, msg_bail_anyhow};
//!
//! fn check(running: bool) -> anyhow::Result<()> {
//!     if !running {
//!         msg_bail_anyhow!(Message::AgentNotRunning);
//!     }
//!     msg_info!(Message::StatusHeader);
//!     Ok(())
//! }
//! ```

use std::sync::OnceLock;

static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

#[doc(hidden)]
pub fn is_debug_mode() -> bool {
    *DEBUG_MODE.get_or_init(|| std::env::var("ACTRAIL_DEBUG").is_ok() || std::env::var("RUST_LOG").is_ok())
}

#[macro_export]
macro_rules! msg_print {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::info!("{}", $msg);
        } else {
            println!("{}", $msg);
        }
    };
    ($msg:expr, true) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::info!("\n{}\n", $msg);
        } else {
            println!("\n{}\n", $msg);
        }
    };
}

#[macro_export]
macro_rules! msg_success {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::info!("✅ {}", $msg);
        } else {
            println!("✅ {}", $msg);
        }
    };
}

#[macro_export]
macro_rules! msg_error {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::error!("❌ {}", $msg);
        } else {
            eprintln!("❌ {}", $msg);
        }
    };
}

#[macro_export]
macro_rules! msg_warning {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::warn!("⚠️ {}", $msg);
        } else {
            eprintln!("⚠️ {}", $msg);
        }
    };
}

#[macro_export]
macro_rules! msg_info {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::info!("ℹ️ {}", $msg);
        } else {
            println!("ℹ️ {}", $msg);
        }
    };
    ($msg:expr, true) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::info!("\nℹ️ {}\n", $msg);
        } else {
            println!("\nℹ️ {}\n", $msg);
        }
    };
}

#[macro_export]
macro_rules! msg_debug {
    ($msg:expr) => {
        if $crate::libs::messages::macros::is_debug_mode() {
            tracing::debug!("🔍 {}", $msg);
        }
    };
}

#[macro_export]
macro_rules! msg_error_anyhow {
    ($msg:expr) => {
        anyhow::anyhow!("❌ {}", $msg)
    };
}

#[macro_export]
macro_rules! msg_bail_anyhow {
    ($msg:expr) => {
        anyhow::bail!("❌ {}", $msg)
    };
}
