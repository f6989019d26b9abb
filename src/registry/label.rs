use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A string attached to a runtime node.
///
/// `Owned` strings belong to the node and are released with it. `Borrowed`
/// strings share the allocation held by the configuration store; dropping the
/// node only releases its reference.
#[derive(Debug, Clone)]
pub enum Label {
    Owned(Box<str>),
    Borrowed(Arc<str>),
}

impl Label {
    pub fn owned(value: impl Into<Box<str>>) -> Self {
        Self::Owned(value.into())
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }

    /// Returns a shared handle to the text, allocating one for owned labels.
    pub fn to_arc(&self) -> Arc<str> {
        match self {
            Self::Owned(value) => Arc::from(&**value),
            Self::Borrowed(value) => Arc::clone(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Owned(value) => value,
            Self::Borrowed(value) => value,
        }
    }
}

impl Deref for Label {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Label {}

impl PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Owned(value.into())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self::Owned(value.into_boxed_str())
    }
}

impl From<Arc<str>> for Label {
    fn from(value: Arc<str>) -> Self {
        Self::Borrowed(value)
    }
}
