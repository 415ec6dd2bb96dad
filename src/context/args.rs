// src/context/args.rs

//! Launch arguments as an ordered list of atomic segments.
//!
//! Hooks often need to keep a group of tokens together, e.g. a binary and
//! the flag that must immediately follow it. Each such group is one
//! [`ArgSegment`]; other hooks insert whole segments before or after it but
//! never between its tokens. Flattening is a single concatenation pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{LaunchError, Result};

/// An ordered run of tokens that always stays contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSegment(Vec<String>);

impl ArgSegment {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Build one segment from an arbitrarily nested JSON value.
    ///
    /// Nested arrays are unwrapped depth-first, keeping relative order;
    /// empty arrays contribute nothing. Numbers and booleans are rendered as
    /// strings, objects and nulls are rejected.
    pub fn from_nested(value: &Value) -> Result<Self> {
        let mut tokens = Vec::new();
        collect_tokens(value, &mut tokens)?;
        Ok(Self(tokens))
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn collect_tokens(value: &Value, out: &mut Vec<String>) -> Result<()> {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => {
            for item in items {
                collect_tokens(item, out)?;
            }
        }
        Value::Null | Value::Object(_) => {
            return Err(LaunchError::Config(format!(
                "launch arguments must be strings or lists of strings, got {value}"
            )));
        }
    }
    Ok(())
}

/// All launch arguments of a context, in segment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchArgs {
    segments: Vec<ArgSegment>,
}

impl LaunchArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every token becomes its own single-token segment.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = Self::new();
        for token in tokens {
            args.push(token);
        }
        args
    }

    /// Build from a nested JSON array such as `[["a", ["b", "c"]], "d", ["e", "f"]]`.
    ///
    /// Each top-level element becomes one segment (nested lists collapse
    /// into that segment). A top-level string is treated as a single token.
    pub fn from_nested(value: &Value) -> Result<Self> {
        let mut args = Self::new();
        match value {
            Value::Array(items) => {
                for item in items {
                    args.push_segment(ArgSegment::from_nested(item)?);
                }
            }
            other => args.push_segment(ArgSegment::from_nested(other)?),
        }
        Ok(args)
    }

    /// Append a single token as its own segment.
    pub fn push(&mut self, token: impl Into<String>) {
        self.segments.push(ArgSegment(vec![token.into()]));
    }

    /// Append an atomic segment. Empty segments are dropped.
    pub fn push_segment(&mut self, segment: ArgSegment) {
        if !segment.is_empty() {
            self.segments.push(segment);
        }
    }

    /// Insert an atomic segment at `index` (clamped to the end).
    pub fn insert_segment(&mut self, index: usize, segment: ArgSegment) {
        if segment.is_empty() {
            return;
        }
        let index = index.min(self.segments.len());
        self.segments.insert(index, segment);
    }

    /// Insert right after the first segment, which holds the executable.
    pub fn insert_after_executable(&mut self, segment: ArgSegment) {
        let index = usize::from(!self.segments.is_empty());
        self.insert_segment(index, segment);
    }

    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for token in tokens {
            self.push(token);
        }
    }

    pub fn segments(&self) -> &[ArgSegment] {
        &self.segments
    }

    /// Mutable access for hooks that need to rewrite existing segments.
    pub fn segments_mut(&mut self) -> &mut Vec<ArgSegment> {
        &mut self.segments
    }

    /// Replace the first token of the first segment.
    pub fn replace_first_token(&mut self, token: impl Into<String>) {
        match self.segments.first_mut() {
            Some(segment) if !segment.0.is_empty() => segment.0[0] = token.into(),
            _ => self.segments.insert(0, ArgSegment(vec![token.into()])),
        }
    }

    pub fn first_token(&self) -> Option<&str> {
        self.segments
            .iter()
            .flat_map(|s| s.0.iter())
            .next()
            .map(String::as_str)
    }

    pub fn token_count(&self) -> usize {
        self.segments.iter().map(ArgSegment::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.token_count() == 0
    }

    /// Final flat token list, in order.
    pub fn flatten(&self) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|segment| segment.0.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_structure_flattens_in_order() {
        let args = LaunchArgs::from_nested(&json!([["a", ["b", "c"]], "d", ["e", "f"]])).unwrap();
        assert_eq!(args.flatten(), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(args.segments().len(), 3);
    }

    #[test]
    fn flat_input_is_unchanged() {
        let args = LaunchArgs::from_nested(&json!(["a", "b", "c"])).unwrap();
        assert_eq!(args.flatten(), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_lists_are_dropped() {
        let args = LaunchArgs::from_nested(&json!([[], "a", [[], []], ["b"]])).unwrap();
        assert_eq!(args.flatten(), vec!["a", "b"]);
        assert_eq!(args.segments().len(), 2);
    }

    #[test]
    fn objects_are_rejected() {
        assert!(LaunchArgs::from_nested(&json!([{"a": 1}])).is_err());
    }

    #[test]
    fn segments_stay_atomic_when_inserting() {
        let mut args = LaunchArgs::from_tokens(["nuke"]);
        args.push_segment(ArgSegment::new(["--script", "a.py"]));
        args.insert_after_executable(ArgSegment::new(["--nukex"]));
        args.insert_segment(99, ArgSegment::new(["-V", "2"]));

        assert_eq!(
            args.flatten(),
            vec!["nuke", "--nukex", "--script", "a.py", "-V", "2"]
        );
    }

    #[test]
    fn replace_first_token_updates_executable() {
        let mut args = LaunchArgs::from_tokens(["/old/bin", "-x"]);
        args.replace_first_token("/new/bin");
        assert_eq!(args.first_token(), Some("/new/bin"));
        assert_eq!(args.token_count(), 2);
    }
}
