//! Flat `key: value` property lists used to save and restore component
//! configuration.
//!
//! ```text
//! resampler.type: bicubic
//! resampler.cubic_parameter: -0.5
//! cache.tile_size: 64 64
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{RasterError, Result};
use crate::geometry::{DPoint, IntRect};

/// An ordered set of `key: value` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordList {
    entries: BTreeMap<String, String>,
}

impl KeywordList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `prefix + key`.
    pub fn add(&mut self, prefix: &str, key: &str, value: impl fmt::Display) {
        self.entries
            .insert(format!("{prefix}{key}"), value.to_string());
    }

    /// Store several values under one key, space separated.
    pub fn add_values<T: fmt::Display>(&mut self, prefix: &str, key: &str, values: &[T]) {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.add(prefix, key, joined);
    }

    pub fn add_point(&mut self, prefix: &str, key: &str, point: DPoint) {
        self.add_values(prefix, key, &[point.x, point.y]);
    }

    pub fn add_rect(&mut self, prefix: &str, key: &str, rect: IntRect) {
        self.add_values(
            prefix,
            key,
            &[
                rect.ul().x as i64,
                rect.ul().y as i64,
                rect.width() as i64,
                rect.height() as i64,
            ],
        );
    }

    pub fn find(&self, prefix: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&format!("{prefix}{key}"))
            .map(String::as_str)
    }

    /// Look up and parse a value. A missing key is `Ok(None)`; a value that
    /// does not parse is an error.
    pub fn find_parsed<T>(&self, prefix: &str, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.find(prefix, key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| RasterError::keyword(format!("{prefix}{key}"), e.to_string())),
        }
    }

    /// Look up a space separated list of values.
    pub fn find_values<T>(&self, prefix: &str, key: &str) -> Result<Option<Vec<T>>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.find(prefix, key) else {
            return Ok(None);
        };
        raw.split_whitespace()
            .map(|part| {
                part.parse::<T>()
                    .map_err(|e| RasterError::keyword(format!("{prefix}{key}"), e.to_string()))
            })
            .collect::<Result<Vec<T>>>()
            .map(Some)
    }

    pub fn find_point(&self, prefix: &str, key: &str) -> Result<Option<DPoint>> {
        match self.find_values::<f64>(prefix, key)? {
            None => Ok(None),
            Some(v) if v.len() == 2 => Ok(Some(DPoint::new(v[0], v[1]))),
            Some(v) => Err(RasterError::keyword(
                format!("{prefix}{key}"),
                format!("expected 2 values, found {}", v.len()),
            )),
        }
    }

    pub fn find_rect(&self, prefix: &str, key: &str) -> Result<Option<IntRect>> {
        match self.find_values::<i64>(prefix, key)? {
            None => Ok(None),
            Some(v) if v.len() == 4 && v[2] >= 0 && v[3] >= 0 => Ok(Some(IntRect::new(
                v[0] as i32,
                v[1] as i32,
                v[2] as u32,
                v[3] as u32,
            ))),
            Some(_) => Err(RasterError::keyword(
                format!("{prefix}{key}"),
                "expected 'x y width height'",
            )),
        }
    }

    pub fn remove(&mut self, prefix: &str, key: &str) -> Option<String> {
        self.entries.remove(&format!("{prefix}{key}"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for KeywordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

impl FromStr for KeywordList {
    type Err = RasterError;

    /// Parse `key: value` lines. Blank lines and `//` comments are skipped.
    fn from_str(s: &str) -> Result<Self> {
        let mut kwl = KeywordList::new();
        for (n, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or(RasterError::KeywordSyntax {
                line: n + 1,
                message: "missing ':' separator".to_string(),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(RasterError::KeywordSyntax {
                    line: n + 1,
                    message: "empty key".to_string(),
                });
            }
            kwl.entries.insert(key.to_string(), value.trim().to_string());
        }
        Ok(kwl)
    }
}

/// Components whose configuration round-trips through a [`KeywordList`].
///
/// `load_state` leaves fields untouched when their key is absent.
pub trait StatePersistence {
    fn save_state(&self, kwl: &mut KeywordList, prefix: &str);

    fn load_state(&mut self, kwl: &KeywordList, prefix: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let mut kwl = KeywordList::new();
        kwl.add("resampler.", "type", "bilinear");
        kwl.add("resampler.", "cubic_parameter", -0.5);

        assert_eq!(kwl.find("resampler.", "type"), Some("bilinear"));
        assert_eq!(
            kwl.find_parsed::<f64>("resampler.", "cubic_parameter").unwrap(),
            Some(-0.5)
        );
        assert_eq!(kwl.find_parsed::<f64>("resampler.", "missing").unwrap(), None);
    }

    #[test]
    fn test_parse_error_reports_key() {
        let mut kwl = KeywordList::new();
        kwl.add("", "max_iterations", "ten");
        let err = kwl.find_parsed::<u32>("", "max_iterations").unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn test_text_roundtrip() {
        let mut kwl = KeywordList::new();
        kwl.add_point("t.", "dx_dy", DPoint::new(0.5, 2.0));
        kwl.add_rect("cache.", "rect", IntRect::new(-4, 8, 16, 32));

        let text = kwl.to_string();
        let parsed: KeywordList = text.parse().unwrap();
        assert_eq!(parsed, kwl);
        assert_eq!(
            parsed.find_point("t.", "dx_dy").unwrap(),
            Some(DPoint::new(0.5, 2.0))
        );
        assert_eq!(
            parsed.find_rect("cache.", "rect").unwrap(),
            Some(IntRect::new(-4, 8, 16, 32))
        );
    }

    #[test]
    fn test_parse_skips_comments_and_rejects_garbage() {
        let kwl: KeywordList = "// header\n\nkey: value with: colon\n".parse().unwrap();
        assert_eq!(kwl.find("", "key"), Some("value with: colon"));

        let err = "no separator here".parse::<KeywordList>().unwrap_err();
        assert!(matches!(err, RasterError::KeywordSyntax { line: 1, .. }));
    }
}
