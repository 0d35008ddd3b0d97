//! Namespace path addressing.
//!
//! An [`EventPath`] is an ordered sequence of non-empty string segments,
//! e.g. `root.foo.bar`. The dot-joined form is the unique registry key;
//! the slash-joined form appears inside action type strings
//! (`event:root/foo/bar:save`). Two paths name the same namespace iff
//! their segment sequences are equal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EventsError;

/// A validated, non-empty namespace path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPath {
    segments: Vec<String>,
}

impl EventPath {
    /// Build a path from segments.
    ///
    /// Fails if the sequence is empty, any segment is empty, or a segment
    /// contains `.` (which would collide with another path's dotted key).
    pub fn new<I, S>(segments: I) -> Result<Self, EventsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(EventsError::InvalidPath("empty path".to_string()));
        }
        for seg in &segments {
            validate_segment(seg)?;
        }
        Ok(EventPath { segments })
    }

    /// Parse a dotted string like `root.foo.bar`.
    pub fn parse(input: &str) -> Result<Self, EventsError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(EventsError::InvalidPath("empty path".to_string()));
        }
        EventPath::new(input.split('.'))
    }

    /// Rebuild a path from segments that already passed validation
    /// (used by the reducer composer walking the namespace graph).
    pub(crate) fn from_validated(segments: Vec<String>) -> EventPath {
        EventPath { segments }
    }

    /// The path's segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The dot-joined form — the unique registry key.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// The slash-joined form — used inside action type strings.
    pub fn slashed(&self) -> String {
        self.segments.join("/")
    }

    /// The child path `self.segment`.
    pub fn child(&self, segment: &str) -> Result<EventPath, EventsError> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(EventPath { segments })
    }
}

impl fmt::Display for EventPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

fn validate_segment(segment: &str) -> Result<(), EventsError> {
    if segment.is_empty() {
        return Err(EventsError::InvalidPath("empty segment".to_string()));
    }
    if segment.contains('.') {
        return Err(EventsError::InvalidPath(format!(
            "segment '{}' contains '.'",
            segment
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_segment() {
        let p = EventPath::parse("tests").unwrap();
        assert_eq!(p.segments(), ["tests"]);
        assert_eq!(p.dotted(), "tests");
        assert_eq!(p.slashed(), "tests");
    }

    #[test]
    fn parse_nested() {
        let p = EventPath::parse("root.foo.bar").unwrap();
        assert_eq!(p.segments().len(), 3);
        assert_eq!(p.dotted(), "root.foo.bar");
        assert_eq!(p.slashed(), "root/foo/bar");
    }

    #[test]
    fn new_from_slice() {
        let p = EventPath::new(["root", "foo"]).unwrap();
        assert_eq!(p.dotted(), "root.foo");
    }

    #[test]
    fn child_descends() {
        let p = EventPath::parse("root").unwrap();
        let c = p.child("foo").unwrap();
        assert_eq!(c.dotted(), "root.foo");
        // parent unchanged
        assert_eq!(p.dotted(), "root");
    }

    #[test]
    fn equality_is_segment_equality() {
        let a = EventPath::parse("a.b").unwrap();
        let b = EventPath::new(["a", "b"]).unwrap();
        assert_eq!(a, b);
        let c = EventPath::parse("a.c").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn parse_empty_path_fails() {
        assert!(EventPath::parse("").is_err());
        assert!(EventPath::parse("   ").is_err());
    }

    #[test]
    fn parse_empty_segment_fails() {
        assert!(EventPath::parse("a..b").is_err());
        assert!(EventPath::parse(".a").is_err());
    }

    #[test]
    fn new_empty_sequence_fails() {
        let none: [&str; 0] = [];
        assert!(EventPath::new(none).is_err());
    }

    #[test]
    fn segment_with_dot_fails() {
        assert!(EventPath::new(["a.b"]).is_err());
        let p = EventPath::parse("a").unwrap();
        assert!(p.child("b.c").is_err());
    }

    #[test]
    fn display_is_dotted() {
        let p = EventPath::parse("root.foo").unwrap();
        assert_eq!(p.to_string(), "root.foo");
    }

    #[test]
    fn metacharacter_segments_are_plain_data() {
        // Segments with regex-looking characters are ordinary strings;
        // nothing downstream interprets them as patterns.
        let p = EventPath::new(["a+b", "c*d"]).unwrap();
        assert_eq!(p.dotted(), "a+b.c*d");
        assert_eq!(p.slashed(), "a+b/c*d");
    }
}
