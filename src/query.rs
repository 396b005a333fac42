//! URL-synchronized query state for the suggestion and search pages.
//!
//! Every recognized parameter is declared once as a [`Param`] carrying its key,
//! parser and serializer. Decoding never fails: a missing or malformed field
//! falls back to the model's default. Encoding always emits every key, so
//! `decode(encode(x)) == x` for every valid value.
//!
//! A size is valid in `1..=`[`MAX_SIZE`]. Anything else in the URL decodes to
//! [`DEFAULT_SIZE`], and a [`SuggestQueryPatch`] carrying one keeps the
//! current size.

use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_SIZE: u32 = 25;
pub const MAX_SIZE: u32 = 100;
/// Choices offered by the size selector.
pub const SIZE_OPTIONS: [u32; 5] = [10, 15, 20, 25, 50];

pub const SUGGEST_PATH: &str = "/suggestKeywords";
pub const SEARCH_PATH: &str = "/search";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum Service {
    #[default]
    Note,
    Google,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::Note, Service::Google];

    /// Exact, case-sensitive URL literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Note => "Note",
            Service::Google => "Google",
        }
    }

    pub fn from_literal(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|service| service.as_str() == value)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named query parameter with its parser/serializer pair.
pub struct Param<T> {
    pub key: &'static str,
    parse: fn(&str) -> Option<T>,
    serialize: fn(&T) -> String,
}

impl<T> Param<T> {
    pub fn parse(&self, raw: &str) -> Option<T> {
        (self.parse)(raw)
    }

    pub fn serialize(&self, value: &T) -> String {
        (self.serialize)(value)
    }
}

pub const SERVICE: Param<Service> = Param {
    key: "service",
    parse: Service::from_literal,
    serialize: |service| service.as_str().to_string(),
};

pub const QUERY: Param<String> = Param {
    key: "query",
    parse: |raw| Some(raw.to_string()),
    serialize: |value| value.clone(),
};

pub const SIZE: Param<u32> = Param {
    key: "size",
    parse: parse_size,
    serialize: |size| size.to_string(),
};

pub const RELATED: Param<bool> = Param {
    key: "related",
    parse: |raw| match raw {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    },
    serialize: |flag| flag.to_string(),
};

fn parse_size(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|size| is_valid_size(*size))
}

pub fn is_valid_size(size: u32) -> bool {
    (1..=MAX_SIZE).contains(&size)
}

/// Decoded `key=value` pairs of a URL query string, in order of appearance.
#[derive(Debug, Default)]
pub struct QueryString {
    pairs: Vec<(String, Option<String>)>,
}

impl QueryString {
    pub fn parse(input: &str) -> Self {
        let input = input.strip_prefix('?').unwrap_or(input);
        let pairs = input
            .split('&')
            .filter(|chunk| !chunk.is_empty())
            .filter_map(|chunk| {
                let (key, value) = chunk.split_once('=').unwrap_or((chunk, ""));
                let key = decode_component(key)?;
                Some((key, decode_component(value)))
            })
            .collect();
        Self { pairs }
    }

    /// First occurrence wins. A value that is not valid UTF-8 counts as malformed.
    pub fn get<T>(&self, param: &Param<T>) -> Option<T> {
        self.pairs
            .iter()
            .find(|(key, _)| key == param.key)
            .and_then(|(_, value)| value.as_deref())
            .and_then(|value| param.parse(value))
    }
}

#[derive(Debug, Default)]
struct QueryStringBuilder {
    out: String,
}

impl QueryStringBuilder {
    fn push<T>(mut self, param: &Param<T>, value: &T) -> Self {
        if !self.out.is_empty() {
            self.out.push('&');
        }
        self.out.push_str(param.key);
        self.out.push('=');
        self.out.push_str(&encode_component(&param.serialize(value)));
        self
    }

    fn finish(self) -> String {
        self.out
    }
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn decode_component(value: &str) -> Option<String> {
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// State of the suggestion page.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SuggestQuery {
    pub service: Service,
    pub query: String,
    pub size: u32,
    /// Only meaningful for [`Service::Note`].
    pub related: bool,
}

impl Default for SuggestQuery {
    fn default() -> Self {
        Self {
            service: Service::Note,
            query: String::new(),
            size: DEFAULT_SIZE,
            related: false,
        }
    }
}

impl SuggestQuery {
    pub fn decode(input: &str) -> Self {
        let parsed = QueryString::parse(input);
        let defaults = Self::default();
        Self {
            service: parsed.get(&SERVICE).unwrap_or(defaults.service),
            query: parsed.get(&QUERY).unwrap_or(defaults.query),
            size: parsed.get(&SIZE).unwrap_or(defaults.size),
            related: parsed.get(&RELATED).unwrap_or(defaults.related),
        }
    }

    pub fn encode(&self) -> String {
        QueryStringBuilder::default()
            .push(&SERVICE, &self.service)
            .push(&QUERY, &self.query)
            .push(&SIZE, &self.size)
            .push(&RELATED, &self.related)
            .finish()
    }

    pub fn href(&self) -> String {
        format!("{SUGGEST_PATH}?{}", self.encode())
    }

    /// True when the related-hashtag mode is in effect.
    pub fn related_active(&self) -> bool {
        self.service == Service::Note && self.related
    }
}

/// State of the full search page targeted by pivot links.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub service: Service,
    pub query: String,
    pub size: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            service: Service::Note,
            query: String::new(),
            size: DEFAULT_SIZE,
        }
    }
}

impl SearchQuery {
    pub fn decode(input: &str) -> Self {
        let parsed = QueryString::parse(input);
        let defaults = Self::default();
        Self {
            service: parsed.get(&SERVICE).unwrap_or(defaults.service),
            query: parsed.get(&QUERY).unwrap_or(defaults.query),
            size: parsed.get(&SIZE).unwrap_or(defaults.size),
        }
    }

    pub fn encode(&self) -> String {
        QueryStringBuilder::default()
            .push(&SERVICE, &self.service)
            .push(&QUERY, &self.query)
            .push(&SIZE, &self.size)
            .finish()
    }

    pub fn href(&self) -> String {
        format!("{SEARCH_PATH}?{}", self.encode())
    }
}

/// Partial update of a [`SuggestQuery`]; unset fields are left untouched.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SuggestQueryPatch {
    pub service: Option<Service>,
    pub query: Option<String>,
    pub size: Option<u32>,
    pub related: Option<bool>,
}

impl SuggestQueryPatch {
    pub fn service(service: Service) -> Self {
        Self {
            service: Some(service),
            ..Self::default()
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn size(size: u32) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn related(related: bool) -> Self {
        Self {
            related: Some(related),
            ..Self::default()
        }
    }

    /// An out-of-range size is dropped so the result always survives a URL
    /// round trip.
    pub fn apply(&self, state: &SuggestQuery) -> SuggestQuery {
        SuggestQuery {
            service: self.service.unwrap_or(state.service),
            query: self.query.clone().unwrap_or_else(|| state.query.clone()),
            size: self
                .size
                .filter(|size| is_valid_size(*size))
                .unwrap_or(state.size),
            related: self.related.unwrap_or(state.related),
        }
    }
}

/// Normalizes raw search-bar input. Note takes bare keywords, so leading `#`
/// characters are dropped for that service.
pub fn normalize_search_input(service: Service, raw: &str) -> String {
    let trimmed = raw.trim();
    match service {
        Service::Note => trimmed.trim_start_matches('#').trim().to_string(),
        Service::Google => trimmed.to_string(),
    }
}

/// Push-style navigation history. Every distinct state change becomes its own
/// entry; moving back or forward never creates one.
#[derive(Debug, Clone)]
pub struct QueryHistory<T> {
    entries: Vec<T>,
    cursor: usize,
}

impl<T: PartialEq> QueryHistory<T> {
    pub fn new(initial: T) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    /// Returns false when `entry` equals the current state.
    pub fn push(&mut self, entry: T) -> bool {
        if *self.current() == entry {
            return false;
        }
        self.entries.truncate(self.cursor + 1);
        self.entries.push(entry);
        self.cursor += 1;
        true
    }

    pub fn back(&mut self) -> Option<&T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&T> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
