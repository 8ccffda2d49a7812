//! Canonical subtree addresses.
//!
//! Any path-shaped input is normalized into an ordered list of segments. The
//! first segment names the root container ("site"), the remainder is the path
//! inside it:
//!
//! ```
//! use graft::Address;
//!
//! let address = Address::parse("/sites/site-a//section/page/").unwrap();
//! assert_eq!(address.to_string(), "site-a/section/page");
//! assert_eq!(address.full_path(), "/sites/site-a/section/page");
//! assert_eq!(address.root_name(), "site-a");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Absolute path under which every root container lives in the store.
pub const SITES_ROOT_PATH: &str = "/sites";

pub const SEPARATOR: char = '/';

/// Split `input` into non-empty segments, dropping a leading
/// [`SITES_ROOT_PATH`] prefix.
pub fn normalize(input: &str) -> Result<Vec<String>> {
    let stripped = strip_root_prefix(input);

    let segments: Vec<String> = stripped
        .split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        return Err(Error::InvalidAddress(input.to_string()));
    }
    Ok(segments)
}

/// Re-prefix normalized segments with the root container path.
pub fn resolve_to_full_address<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::from(SITES_ROOT_PATH);
    for segment in segments {
        path.push(SEPARATOR);
        path.push_str(segment.as_ref());
    }
    path
}

fn strip_root_prefix(input: &str) -> &str {
    match input.strip_prefix(SITES_ROOT_PATH) {
        Some(rest) if rest.is_empty() || rest.starts_with(SEPARATOR) => rest,
        _ => input,
    }
}

/// Ordered, non-empty segment path relative to [`SITES_ROOT_PATH`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    segments: Vec<String>,
}

impl Address {
    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self {
            segments: normalize(input)?,
        })
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let joined = segments.join("/");
        if segments.iter().any(|s| s.is_empty() || s.contains(SEPARATOR)) {
            return Err(Error::InvalidAddress(joined));
        }
        Self::parse(&joined)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Name of the root container this address lives in.
    pub fn root_name(&self) -> &str {
        &self.segments[0]
    }

    /// Last segment (the addressed node's own name).
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True when the address names a root container itself.
    pub fn is_root_container(&self) -> bool {
        self.segments.len() == 1
    }

    /// The address with its last segment dropped, or `None` for a root container.
    pub fn parent(&self) -> Option<Address> {
        if self.is_root_container() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> Result<Address> {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self::from_segments(segments)
    }

    /// Every address from the root container down to `self`, inclusive.
    pub fn ancestry(&self) -> Vec<Address> {
        (1..=self.segments.len())
            .map(|n| Self {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// Absolute store path, e.g. `/sites/site-a/section`.
    pub fn full_path(&self) -> String {
        resolve_to_full_address(&self.segments)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}
