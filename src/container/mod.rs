use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;
mod utils;

pub use error::{Error, Result};
pub(crate) use utils::is_hex_id;

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// Number of leading characters that identify a container (Docker short id).
pub const SHORT_ID_LEN: usize = 12;

/// A validated container identifier.
///
/// The id is reference counted so that runtime nodes can share the string held
/// by the configuration store instead of copying it.
///
/// # Examples
///
/// ```
/// # use sched_orchestrator::container::ContainerID;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.short(), "abc123abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or its length
    /// exceeds [`CONTAINER_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > CONTAINER_ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn to_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }

    /// Returns at most the first [`SHORT_ID_LEN`] characters of the id.
    pub fn short(&self) -> &str {
        short(&self.0)
    }

    /// Compares against another id on the short-id prefix only.
    pub fn matches(&self, other: &str) -> bool {
        short_id_eq(&self.0, other)
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn short(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Compares two container ids on their first [`SHORT_ID_LEN`] characters.
///
/// Ids shorter than the prefix must match completely.
pub fn short_id_eq(a: &str, b: &str) -> bool {
    short(a) == short(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_and_long() {
        assert!(ContainerID::new("").is_err());
        assert!(ContainerID::new("a".repeat(256)).is_err());
        assert!(ContainerID::new("a".repeat(255)).is_ok());
    }

    #[test]
    fn test_short_id_eq() {
        assert!(short_id_eq("abc123456789", "abc123456789deadbeef"));
        assert!(short_id_eq("abc123456789ffff", "abc123456789eeee"));
        assert!(!short_id_eq("abc12345678", "abc123456789"));
        assert!(short_id_eq("abc", "abc"));
        assert!(!short_id_eq("abc", "abd"));
    }

    #[test]
    fn test_short() {
        let id = ContainerID::new("0123456789abcdef").unwrap();
        assert_eq!(id.short(), "0123456789ab");
        assert!(id.matches("0123456789ab"));
        let id = ContainerID::new("short").unwrap();
        assert_eq!(id.short(), "short");
    }
}
