//! Kernel utilities shared by the container crates.
//! Keep this crate lightweight: request ids, layered config loading, and the runtime profile.
//!
//! ## Request ids
//! Use `request_id!` for short, unambiguous composite request ids:
//! ```rust
//! # use capstan_kernel::request_id;
//! let id = request_id!();
//! assert_eq!(id.len(), 12);
//! ```
//!
//! ## Config loading
//! ```rust,no_run
//! use capstan_kernel::config::load_config;
//! use capstan_kernel::domain::config::KernelConfig;
//!
//! let cfg: KernelConfig = load_config(Some("capstan.toml")).unwrap_or_default();
//! ```
pub mod config;
pub mod error;
pub mod runtime;

// Alphabet excludes visually ambiguous characters (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub use capstan_domain as domain;
pub use nanoid::nanoid;

/// Generates an unambiguous id for a composite request.
#[macro_export]
macro_rules! request_id {
    () => {
        $crate::nanoid!(12, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}
