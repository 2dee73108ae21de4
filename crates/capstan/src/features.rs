//! Subsystems compiled into this build.

use capstan_controller::Extension;

#[cfg(feature = "ee")]
pub use capstan_ee as ee;
#[cfg(feature = "ejb3")]
pub use capstan_ejb3 as ejb3;
#[cfg(feature = "elytron")]
pub use capstan_elytron as elytron;
#[cfg(feature = "undertow")]
pub use capstan_undertow as undertow;

/// Build-time enabled subsystems (by Cargo feature).
pub const ENABLED: &[&str] = &[
    #[cfg(feature = "elytron")]
    "elytron",
    #[cfg(feature = "undertow")]
    "undertow",
    #[cfg(feature = "ee")]
    "ee",
    #[cfg(feature = "ejb3")]
    "remoting",
    #[cfg(feature = "ejb3")]
    "ejb3",
];

#[must_use]
pub fn is_enabled(name: &str) -> bool {
    ENABLED.contains(&name)
}

/// One extension per enabled subsystem, providers before consumers.
#[must_use]
pub fn extensions() -> Vec<Box<dyn Extension>> {
    let mut extensions: Vec<Box<dyn Extension>> = Vec::new();
    #[cfg(feature = "elytron")]
    extensions.push(Box::new(elytron::ElytronExtension));
    #[cfg(feature = "undertow")]
    extensions.push(Box::new(undertow::UndertowExtension));
    #[cfg(feature = "ee")]
    extensions.push(Box::new(ee::EeExtension));
    #[cfg(feature = "ejb3")]
    {
        extensions.push(Box::new(ejb3::RemotingExtension));
        extensions.push(Box::new(ejb3::Ejb3Extension));
    }
    extensions
}
