//! Query-string backed UI state.
//!
//! A [`UrlSlot`] binds one query parameter to a typed value with a default.
//! Reads never fail: a missing or malformed parameter yields the default.
//! Writes go through [`History`], which keeps every location as a separate
//! entry so navigation can step back to earlier query states.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use url::{form_urlencoded, Url};

/// Oldest entries are dropped past this many.
pub const HISTORY_LIMIT: usize = 50;

/// Navigable list of locations with a cursor, like a browser history stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<Url>,
    cursor: usize,
}

impl History {
    pub fn new(initial: Url) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    pub fn parse(initial: &str) -> Result<Self, url::ParseError> {
        Url::parse(initial).map(Self::new)
    }

    /// Rebuilds a saved history. The cursor is clamped to the last entry and
    /// only the newest [`HISTORY_LIMIT`] entries are kept; `None` when there
    /// are no entries.
    pub fn restore(mut entries: Vec<Url>, cursor: usize) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let mut cursor = cursor.min(entries.len() - 1);
        let excess = entries.len().saturating_sub(HISTORY_LIMIT);
        entries.drain(..excess);
        cursor = cursor.saturating_sub(excess);
        Some(Self { entries, cursor })
    }

    pub fn entries(&self) -> &[Url] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &Url {
        &self.entries[self.cursor]
    }

    /// Pushes a new entry, dropping anything ahead of the cursor. Pushing
    /// the current location again is a no-op.
    pub fn push(&mut self, location: Url) {
        if *self.current() == location {
            return;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(location);
        let excess = self.entries.len().saturating_sub(HISTORY_LIMIT);
        self.entries.drain(..excess);
        self.cursor = self.entries.len() - 1;
    }

    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A named, typed binding between a value and a query parameter.
#[derive(Debug, Clone)]
pub struct UrlSlot<T> {
    name: &'static str,
    default: T,
    serialize: fn(&T) -> String,
    deserialize: fn(&str) -> Option<T>,
}

impl<T: Clone + PartialEq> UrlSlot<T> {
    pub fn new(
        name: &'static str,
        default: T,
        serialize: fn(&T) -> String,
        deserialize: fn(&str) -> Option<T>,
    ) -> Self {
        Self {
            name,
            default,
            serialize,
            deserialize,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Parsed parameter, or `None` when missing or malformed.
    pub fn read(&self, location: &Url) -> Option<T> {
        location
            .query_pairs()
            .find(|(key, _)| key == self.name)
            .and_then(|(_, value)| (self.deserialize)(&value))
    }

    pub fn get(&self, location: &Url) -> T {
        self.read(location).unwrap_or_else(|| self.default.clone())
    }

    /// Returns `location` with this slot's parameter rewritten. Every other
    /// segment of the query is kept byte for byte in its position; writing
    /// the default removes the parameter.
    pub fn write(&self, location: &Url, value: &T) -> Url {
        let encoded = (*value != self.default).then(|| {
            form_urlencoded::Serializer::new(String::new())
                .append_pair(self.name, &(self.serialize)(value))
                .finish()
        });

        let mut segments: Vec<&str> = Vec::new();
        let mut written = false;
        for segment in location.query().unwrap_or_default().split('&') {
            if segment.is_empty() {
                continue;
            }
            if segment_key(segment).as_deref() != Some(self.name) {
                segments.push(segment);
                continue;
            }
            if !written {
                if let Some(encoded) = &encoded {
                    segments.push(encoded);
                }
                written = true;
            }
        }
        if !written {
            if let Some(encoded) = &encoded {
                segments.push(encoded);
            }
        }

        let mut next = location.clone();
        if segments.is_empty() {
            next.set_query(None);
        } else {
            next.set_query(Some(&segments.join("&")));
        }
        next
    }

    /// Writes the value into the current location as a new history entry.
    pub fn set(&self, history: &mut History, value: &T) {
        let next = self.write(history.current(), value);
        history.push(next);
    }
}

/// Decoded parameter name of one raw `key=value` query segment.
fn segment_key(segment: &str) -> Option<String> {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
}

pub fn int_serializer(value: &usize) -> String {
    value.to_string()
}

/// Accepts plain ASCII digits only; signs, blanks and overflow are rejected.
pub fn int_deserializer(raw: &str) -> Option<usize> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

pub fn positive_int_deserializer(raw: &str) -> Option<usize> {
    int_deserializer(raw).filter(|value| *value > 0)
}

pub fn date_time_serializer(value: &Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

pub fn date_time_deserializer(raw: &str) -> Option<Option<DateTime<Utc>>> {
    parse_date_time(raw).map(Some)
}

/// Parses RFC 3339, a naive date-time (taken as UTC) or a bare date
/// (midnight UTC).
pub(crate) fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
