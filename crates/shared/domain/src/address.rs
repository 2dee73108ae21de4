//! Resource addresses.
//!
//! A [`PathAddress`] identifies one node in the configuration tree as an ordered list of
//! `key=value` elements, written `/subsystem=ejb3/application-security-domain=other`.
//! An [`AddressPattern`] is the same shape with optional `*` wildcards and acts as the
//! resource-type tag that schemas and service providers are registered under.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub const WILDCARD: &str = "*";

/// Errors produced while parsing the textual address form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("Address must start with '/': {0}")]
    MissingLeadingSlash(String),
    #[error("Malformed path element '{0}', expected key=value")]
    MalformedElement(String),
}

/// One `key=value` step of an address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathElement {
    pub key: String,
    pub value: String,
}

impl PathElement {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }
}

impl Display for PathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl FromStr for PathElement {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                Ok(Self::new(key, value))
            },
            _ => Err(AddressParseError::MalformedElement(s.to_owned())),
        }
    }
}

/// Absolute address of a resource. The empty address is the root.
///
/// Ordering is lexicographic over elements, so every descendant of an address sorts
/// directly after it and before any sibling.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathAddress(Vec<PathElement>);

impl PathAddress {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds an address from `(key, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| PathElement::new(k, v)).collect())
    }

    /// `/subsystem=<name>`
    pub fn subsystem(name: impl Into<String>) -> Self {
        Self::root().append("subsystem", name)
    }

    /// Returns a new address with one more element.
    #[must_use]
    pub fn append(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::new(key, value));
        Self(elements)
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    #[must_use]
    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    /// Value of the last element, which is the resource's own name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.last().map(|e| e.value.as_str())
    }

    /// Value of the first element with the given key.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|e| e.key == key).map(|e| e.value.as_str())
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    /// True when `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// True when `other` is a direct child of `self`.
    #[must_use]
    pub fn is_parent_of(&self, other: &Self) -> bool {
        other.len() == self.len() + 1 && self.is_prefix_of(other)
    }
}

impl Display for PathAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for element in &self.0 {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

impl FromStr for PathAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest =
            s.strip_prefix('/').ok_or_else(|| AddressParseError::MissingLeadingSlash(s.to_owned()))?;
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .map(PathElement::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl Serialize for PathAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Address template with optional wildcard values, e.g. `/subsystem=ee/context-service=*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressPattern(Vec<PathElement>);

impl AddressPattern {
    /// `/subsystem=<name>`
    pub fn subsystem(name: impl Into<String>) -> Self {
        Self(vec![PathElement::new("subsystem", name)])
    }

    /// Adds a concrete element.
    #[must_use]
    pub fn child(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push(PathElement::new(key, value));
        self
    }

    /// Adds a wildcard element for `key`.
    #[must_use]
    pub fn any(self, key: impl Into<String>) -> Self {
        self.child(key, WILDCARD)
    }

    #[must_use]
    pub fn matches(&self, address: &PathAddress) -> bool {
        self.0.len() == address.len()
            && self
                .0
                .iter()
                .zip(address.elements())
                .all(|(p, e)| p.key == e.key && (p.is_wildcard() || p.value == e.value))
    }

    /// Number of concrete (non-wildcard) elements; more specific patterns win lookups.
    #[must_use]
    pub fn specificity(&self) -> usize {
        self.0.iter().filter(|e| !e.is_wildcard()).count()
    }

    /// Concrete address for a wildcard pattern with every `*` replaced by `name`.
    #[must_use]
    pub fn instance(&self, name: &str) -> PathAddress {
        PathAddress(
            self.0
                .iter()
                .map(|e| {
                    if e.is_wildcard() { PathElement::new(e.key.clone(), name) } else { e.clone() }
                })
                .collect(),
        )
    }
}

impl Display for AddressPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&PathAddress(self.0.clone()), f)
    }
}

impl FromStr for AddressPattern {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathAddress::from_str(s).map(|address| Self(address.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_cli_form() {
        let address: PathAddress =
            "/subsystem=ejb3/application-security-domain=other".parse().unwrap();
        assert_eq!(address.len(), 2);
        assert_eq!(address.name(), Some("other"));
        assert_eq!(address.value_of("subsystem"), Some("ejb3"));
        assert_eq!(address.to_string(), "/subsystem=ejb3/application-security-domain=other");
        assert_eq!(PathAddress::root().to_string(), "/");
        assert_eq!("/".parse::<PathAddress>().unwrap(), PathAddress::root());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(
            "subsystem=ee".parse::<PathAddress>(),
            Err(AddressParseError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            "/subsystem".parse::<PathAddress>(),
            Err(AddressParseError::MalformedElement(_))
        ));
    }

    #[test]
    fn descendants_sort_directly_after_their_ancestor() {
        let parent = PathAddress::subsystem("elytron");
        let child = parent.append("security-domain", "a");
        let grandchild = child.append("realm", "r");
        let sibling = PathAddress::subsystem("elytron2");

        let mut all = vec![sibling.clone(), grandchild.clone(), parent.clone(), child.clone()];
        all.sort();
        assert_eq!(all, vec![parent.clone(), child.clone(), grandchild, sibling]);
        assert!(parent.is_parent_of(&child));
        assert!(parent.is_prefix_of(&child));
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn patterns_match_wildcards() {
        let pattern = AddressPattern::subsystem("ee").any("context-service");
        assert!(pattern.matches(&"/subsystem=ee/context-service=default".parse().unwrap()));
        assert!(!pattern.matches(&"/subsystem=ee".parse().unwrap()));
        assert!(!pattern.matches(&"/subsystem=ejb3/context-service=x".parse().unwrap()));
        assert_eq!(pattern.specificity(), 1);
        assert_eq!(pattern.instance("default").to_string(), "/subsystem=ee/context-service=default");
    }
}
