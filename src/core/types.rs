//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated branch name, usable as a directory name
//! - [`Name`] - Dotted definition name (`List.map`)
//! - [`Hash`] - SHA-256 content hash
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use trellis::core::types::{BranchName, Hash, Name};
//!
//! let branch = BranchName::new("feature-a").unwrap();
//! let name = Name::new("List.map").unwrap();
//! let hash = Hash::of(b"hello");
//!
//! assert!(BranchName::new("bad/name").is_err());
//! assert!(Name::new("a..b").is_err());
//! assert_eq!(hash.as_str().len(), 64);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

/// A validated branch name.
///
/// Each branch is stored in a directory of the same name, so names must be
/// a single path component:
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot contain `/`, `\`, whitespace, or ASCII control characters
/// - Cannot contain `:`, `*`, `?`, `"`, `<`, `>`, `|`
///
/// # Example
///
/// ```
/// use trellis::core::types::BranchName;
///
/// let name = BranchName::new("feature_x").unwrap();
/// assert_eq!(name.as_str(), "feature_x");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("a/b").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name cannot be used as a
    /// branch directory.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }

        if name.starts_with('.') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '.'".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }

        const INVALID_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }

        for c in name.chars() {
            if c.is_whitespace() || c.is_control() {
                return Err(TypeError::InvalidBranchName(
                    "branch name cannot contain whitespace or control characters".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dotted definition name such as `foo` or `List.map`.
///
/// Segments are separated by `.` and none may be empty. Names are matched
/// by suffix: the query `map` matches both `map` and `List.map`.
///
/// # Example
///
/// ```
/// use trellis::core::types::Name;
///
/// let full = Name::new("base.List.map").unwrap();
/// assert!(full.ends_with(&Name::new("map").unwrap()));
/// assert!(full.ends_with(&Name::new("List.map").unwrap()));
/// assert!(!full.ends_with(&Name::new("ap").unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Create a new validated name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidName` for empty names, empty segments, or
    /// names containing whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidName("name cannot be empty".into()));
        }
        if name.split('.').any(str::is_empty) {
            return Err(TypeError::InvalidName(format!(
                "name '{name}' has an empty segment"
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidName(format!(
                "name '{name}' cannot contain whitespace"
            )));
        }
        Ok(Self(name))
    }

    /// Iterate over the dot-separated segments.
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.split('.')
    }

    /// Whether the trailing segments of `self` are exactly the segments of `suffix`.
    pub fn ends_with(&self, suffix: &Name) -> bool {
        let mut mine = self.segments().rev();
        for theirs in suffix.segments().rev() {
            match mine.next() {
                Some(segment) if segment == theirs => {}
                _ => return false,
            }
        }
        true
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Name {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A SHA-256 content hash, stored as 64 lowercase hex characters.
///
/// # Example
///
/// ```
/// use trellis::core::types::Hash;
///
/// let a = Hash::of(b"definition");
/// let b = Hash::of(b"definition");
/// assert_eq!(a, b);
/// assert_eq!(a.short(8).len(), 8);
///
/// let parsed = Hash::new(a.as_str().to_uppercase()).unwrap();
/// assert_eq!(parsed, a);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

impl Hash {
    /// Parse a hex hash, normalizing to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidHash` unless the input is 64 hex characters.
    pub fn new(hash: impl Into<String>) -> Result<Self, TypeError> {
        let hash = hash.into().to_ascii_lowercase();
        if hash.len() != 64 {
            return Err(TypeError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                hash.len()
            )));
        }
        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHash("hash must be hexadecimal".into()));
        }
        Ok(Self(hash))
    }

    /// Hash a byte string.
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        Self::of_parts(&[bytes.as_ref()])
    }

    /// Hash a sequence of byte strings, each terminated by a NUL separator.
    pub fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
            hasher.update(b"\0");
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Get an abbreviated form of the hash.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Hash {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
