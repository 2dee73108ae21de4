use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

macro_rules! dotted_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// `<self>.<segment>`
            #[must_use]
            pub fn append(&self, segment: &str) -> Self {
                Self(format!("{}.{segment}", self.0))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

dotted_name! {
    /// Unique name of a runtime service, e.g. `jboss.ee.concurrent.executor.default`.
    ServiceName
}

dotted_name! {
    /// Abstract name a service publishes so others can depend on it without knowing the
    /// provider. Dynamic capabilities carry the resource name as a final segment.
    CapabilityName
}
