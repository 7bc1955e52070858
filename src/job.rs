//! Job identifiers.
//!
//! A [`JobId`] names every artifact produced for one upload: the original,
//! the processed image and the PDF all share its string form as their
//! filename stem. There is no job record anywhere else; the filesystem is
//! the index.
//!
//! Identifiers arriving from the outside (the `/download/:id` path segment)
//! only ever become a `JobId` through [`JobId::parse`], which accepts the
//! canonical lowercase hyphenated UUID form and nothing else. Anything that
//! could smuggle a path separator or `..` is rejected before a path is built.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Opaque per-request token. Generated fresh for every upload, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier supplied by a client.
    ///
    /// Returns `None` unless `s` is exactly the canonical form produced by
    /// [`JobId`]'s `Display` (36 chars, lowercase hex, hyphenated).
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 36 {
            return None;
        }
        let id = Uuid::parse_str(s).ok()?;
        let canonical = id.hyphenated().to_string();
        (canonical == s).then_some(Self(id))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parse() {
        let id = JobId::new();
        assert_eq!(JobId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn fresh_ids_differ() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn parse_rejects_non_canonical_forms() {
        let id = JobId::new().to_string();
        assert!(JobId::parse(&id.to_uppercase()).is_none());
        assert!(JobId::parse(&id.replace('-', "")).is_none());
        assert!(JobId::parse(&format!("{{{id}}}")).is_none());
        assert!(JobId::parse(&format!("urn:uuid:{id}")).is_none());
    }

    #[test]
    fn parse_rejects_path_injection() {
        assert!(JobId::parse("../../etc/passwd").is_none());
        assert!(JobId::parse("..").is_none());
        assert!(JobId::parse("").is_none());
        assert!(JobId::parse("0b0e5bfa-6a3c-4d5e-9f7a-1c2d3e4f5a6b/../x").is_none());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = JobId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
