//! Contact file codec: YAML header between `---` lines, free-form body after.
//!
//! # Responsibility
//! - Decode raw file text into a [`Contact`], accepting both header layouts.
//! - Encode a [`Contact`] back into the current header layout only.
//!
//! # Invariants
//! - Decode never returns a contact without the `contact` tag.
//! - `decode(encode(c)) == c` for any `c` produced by decode.
//! - Unknown header keys survive a decode/encode cycle untouched.
//! - Relation arrays are always written, as `[]` when empty.

use crate::model::contact::{CadenceStyle, Category, Contact, CONTACT_TAG};
use crate::model::relations::{dedupe_preserving_order, Relations};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Line that opens and closes the header block.
pub const FRONTMATTER_DELIMITER: &str = "---";

/// Header keys that only appear in the older layout.
const LEGACY_KEYS: [&str; 4] = ["name", "relationship", "last_contact", "archived"];

/// Header keys modeled by [`CurrentHeader`]; everything else lands in `extra`.
const CURRENT_KEYS: &[&str] = &[
    "title",
    "date",
    "tags",
    "identifier",
    "index_id",
    "email",
    "phone",
    "relationship_type",
    "state",
    "label",
    "contact_style",
    "last_contacted",
    "last_bump_date",
    "bump_count",
    "updated_at",
    "company",
    "role",
    "location",
    "birthday",
    "linkedin",
    "twitter",
    "website",
    "notes",
    "custom_frequency_days",
    "last_interaction_type",
    "related_contact_labels",
    "related_people",
    "related_tasks",
    "related_ideas",
];

/// Errors produced while decoding or encoding a contact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than two delimiter lines.
    MissingFrontmatter,
    /// Header is not a mapping or a field has the wrong shape.
    InvalidHeader(String),
    /// The `contact` sentinel tag is absent.
    MissingTypeTag,
    /// File content is not valid UTF-8.
    InvalidEncoding,
    /// Header serialization failed.
    Encode(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFrontmatter => write!(f, "invalid file format: no frontmatter found"),
            Self::InvalidHeader(message) => write!(f, "error parsing frontmatter: {message}"),
            Self::MissingTypeTag => {
                write!(f, "not a contact file: missing `{CONTACT_TAG}` tag")
            }
            Self::InvalidEncoding => write!(f, "invalid file format: content is not UTF-8"),
            Self::Encode(message) => write!(f, "error encoding frontmatter: {message}"),
        }
    }
}

impl Error for ParseError {}

/// Decodes raw file content into a contact.
///
/// `path` is left empty; callers that read from disk set it.
pub fn decode_contact(raw: &str) -> Result<Contact, ParseError> {
    let (header, body) = split_frontmatter(raw).ok_or(ParseError::MissingFrontmatter)?;
    let mapping = parse_header_mapping(header)?;
    let (known, extra) = split_known_keys(mapping);
    let header = HeaderLayout::detect(known).into_current()?;

    if !header.tags.iter().any(|tag| tag == CONTACT_TAG) {
        return Err(ParseError::MissingTypeTag);
    }

    let mut contact = header.into_contact();
    contact.extra = extra;
    contact.body = body.to_string();
    Ok(contact)
}

/// Encodes a contact using the current header layout.
pub fn encode_contact(contact: &Contact) -> Result<String, ParseError> {
    let header = CurrentHeader::from_contact(contact);
    let mut mapping = match serde_yaml::to_value(&header) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(_) => return Err(ParseError::Encode("header is not a mapping".to_string())),
        Err(err) => return Err(ParseError::Encode(err.to_string())),
    };
    for (key, value) in &contact.extra {
        if !mapping.contains_key(key) {
            mapping.insert(key.clone(), value.clone());
        }
    }
    let yaml = serde_yaml::to_string(&Value::Mapping(mapping))
        .map_err(|err| ParseError::Encode(err.to_string()))?;

    let mut out = String::with_capacity(yaml.len() + contact.body.len() + 8);
    out.push_str(FRONTMATTER_DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FRONTMATTER_DELIMITER);
    out.push('\n');
    out.push_str(&contact.body);
    Ok(out)
}

/// Splits `raw` into `(header, body)` on the first two delimiter lines.
///
/// Text before the opening delimiter is ignored.
fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    let mut header_start: Option<usize> = None;
    for line in raw.split_inclusive('\n') {
        let line_end = offset + line.len();
        if line.trim_end_matches(['\n', '\r']) == FRONTMATTER_DELIMITER {
            match header_start {
                None => header_start = Some(line_end),
                Some(start) => return Some((&raw[start..offset], &raw[line_end..])),
            }
        }
        offset = line_end;
    }
    None
}

fn parse_header_mapping(header: &str) -> Result<Mapping, ParseError> {
    if header.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(header) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(ParseError::InvalidHeader(
            "header is not a key/value mapping".to_string(),
        )),
        Err(err) => Err(ParseError::InvalidHeader(err.to_string())),
    }
}

/// Splits a header into `(known, extra)`. Non-string keys are always extra.
fn split_known_keys(mapping: Mapping) -> (Mapping, Mapping) {
    let mut known = Mapping::new();
    let mut extra = Mapping::new();
    for (key, value) in mapping {
        let is_known = key
            .as_str()
            .is_some_and(|name| CURRENT_KEYS.contains(&name) || LEGACY_KEYS.contains(&name));
        if is_known {
            known.insert(key, value);
        } else {
            extra.insert(key, value);
        }
    }
    (known, extra)
}

/// Header generations found on disk.
enum HeaderLayout {
    Current(Mapping),
    Legacy(Mapping),
}

impl HeaderLayout {
    fn detect(mapping: Mapping) -> Self {
        let is_legacy = LEGACY_KEYS
            .iter()
            .any(|key| mapping.contains_key(Value::from(*key)));
        if is_legacy {
            Self::Legacy(mapping)
        } else {
            Self::Current(mapping)
        }
    }

    fn into_current(self) -> Result<CurrentHeader, ParseError> {
        match self {
            Self::Current(mapping) => from_mapping::<CurrentHeader>(mapping),
            Self::Legacy(mut mapping) => {
                let mut legacy = Mapping::new();
                for key in LEGACY_KEYS {
                    if let Some(value) = mapping.remove(key) {
                        legacy.insert(Value::from(key), value);
                    }
                }
                let fields = from_mapping::<LegacyFields>(legacy)?;
                Ok(fields.normalize(from_mapping::<CurrentHeader>(mapping)?))
            }
        }
    }
}

fn from_mapping<T: for<'de> Deserialize<'de>>(mapping: Mapping) -> Result<T, ParseError> {
    serde_yaml::from_value(Value::Mapping(mapping))
        .map_err(|err| ParseError::InvalidHeader(err.to_string()))
}

/// Current on-disk header layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CurrentHeader {
    #[serde(default, deserialize_with = "scalar_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "string_list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    identifier: String,
    #[serde(default, deserialize_with = "count", skip_serializing_if = "is_zero")]
    index_id: u32,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    email: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    relationship_type: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    state: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    label: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    contact_style: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    last_contacted: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    last_bump_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "count", skip_serializing_if = "is_zero")]
    bump_count: u32,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    company: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    role: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    location: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    birthday: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    linkedin: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    twitter: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    website: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    notes: Option<String>,
    #[serde(default, deserialize_with = "count", skip_serializing_if = "is_zero")]
    custom_frequency_days: u32,
    #[serde(default, deserialize_with = "opt_scalar_string", skip_serializing_if = "is_blank")]
    last_interaction_type: Option<String>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    related_contact_labels: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    related_people: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    related_tasks: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    related_ideas: Vec<String>,
}

impl CurrentHeader {
    fn from_contact(contact: &Contact) -> Self {
        let mut normalized = contact.clone();
        normalized.normalize_tags();
        normalized.relations.normalize();

        Self {
            title: normalized.title,
            date: normalized.created,
            tags: normalized.tags,
            identifier: normalized.identifier,
            index_id: normalized.index,
            email: normalized.email,
            phone: normalized.phone,
            relationship_type: normalized.category.map(String::from),
            state: normalized.state,
            label: normalized.label,
            contact_style: normalized.cadence.map(String::from),
            last_contacted: normalized.last_contacted,
            last_bump_date: normalized.last_reviewed,
            bump_count: normalized.review_count,
            updated_at: normalized.updated_at,
            company: normalized.company,
            role: normalized.role,
            location: normalized.location,
            birthday: normalized.birthday,
            linkedin: normalized.linkedin,
            twitter: normalized.twitter,
            website: normalized.website,
            notes: normalized.notes,
            custom_frequency_days: normalized.custom_frequency_days,
            last_interaction_type: normalized.last_interaction,
            related_contact_labels: normalized.related_contact_labels,
            related_people: normalized.relations.people,
            related_tasks: normalized.relations.tasks,
            related_ideas: normalized.relations.ideas,
        }
    }

    fn into_contact(self) -> Contact {
        let mut contact = Contact::new(self.identifier, self.title);
        contact.created = self.date;
        contact.tags = self.tags;
        contact.normalize_tags();
        contact.index = self.index_id;
        contact.email = self.email;
        contact.phone = self.phone;
        contact.category = self.relationship_type.map(Category::from);
        contact.cadence = self.contact_style.map(CadenceStyle::from);
        contact.state = self.state;
        contact.label = self.label;
        contact.last_contacted = self.last_contacted;
        contact.last_reviewed = self.last_bump_date;
        contact.review_count = self.bump_count;
        contact.updated_at = self.updated_at;
        contact.company = self.company;
        contact.role = self.role;
        contact.location = self.location;
        contact.birthday = self.birthday;
        contact.linkedin = self.linkedin;
        contact.twitter = self.twitter;
        contact.website = self.website;
        contact.notes = self.notes;
        contact.custom_frequency_days = self.custom_frequency_days;
        contact.last_interaction = self.last_interaction_type;
        contact.related_contact_labels = self.related_contact_labels;
        dedupe_preserving_order(&mut contact.related_contact_labels);
        contact.relations = Relations {
            people: self.related_people,
            tasks: self.related_tasks,
            ideas: self.related_ideas,
        };
        contact.relations.normalize();
        contact
    }
}

/// Keys of the older layout: `name`/`relationship`/`last_contact`/`archived`.
#[derive(Debug, Deserialize)]
struct LegacyFields {
    #[serde(default, deserialize_with = "opt_scalar_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string")]
    relationship: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string")]
    last_contact: Option<String>,
    #[serde(default)]
    archived: Option<Value>,
}

impl LegacyFields {
    /// Folds the legacy keys into `header`; current keys win when both exist.
    fn normalize(self, mut header: CurrentHeader) -> CurrentHeader {
        if header.title.trim().is_empty() {
            if let Some(name) = self.name {
                header.title = name;
            }
        }
        if header.relationship_type.is_none() {
            header.relationship_type = self.relationship;
        }
        if header.last_contacted.is_none() {
            header.last_contacted = self.last_contact.as_deref().and_then(parse_timestamp);
        }

        header.contact_style = header.contact_style.map(|style| match style.as_str() {
            "professional" => "periodic".to_string(),
            _ => style,
        });
        header.state = header.state.map(|state| match state.as_str() {
            "write" => "followup".to_string(),
            _ => state,
        });
        if self.archived.as_ref().is_some_and(is_truthy) {
            header.state = Some("archived".to_string());
        }

        header
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim_matches(['\'', '"']).eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Parses RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (as UTC) or a bare date.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_matches(['\'', '"']);
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn opt_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if matches!(value, Value::Sequence(_) | Value::Mapping(_)) {
        return Err(serde::de::Error::custom("expected a scalar value"));
    }
    Ok(scalar_to_string(value).filter(|text| !text.is_empty()))
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_scalar_string(deserializer)?.unwrap_or_default())
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => Ok(items
            .into_iter()
            .filter_map(scalar_to_string)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()),
        Value::Mapping(_) => Err(serde::de::Error::custom("expected a list of strings")),
        // A single scalar is read as a one-element list.
        scalar => Ok(scalar_to_string(scalar)
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .into_iter()
            .collect()),
    }
}

fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(0),
        Value::Number(number) => number
            .as_i64()
            .map(i128::from)
            .or_else(|| number.as_u64().map(i128::from))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid count `{number}`")))?,
        Value::String(text) if text.trim().is_empty() => return Ok(0),
        Value::String(text) => text
            .trim()
            .parse::<i128>()
            .map_err(|_| serde::de::Error::custom(format!("invalid count `{text}`")))?,
        _ => return Err(serde::de::Error::custom("expected a non-negative integer")),
    };
    Ok(clamp_count(parsed))
}

/// Out-of-range counts read as `0` (unassigned) instead of rejecting the record.
fn clamp_count(value: i128) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!("event=header_count_reset module=codec status=degraded value={value}");
        0
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match opt_scalar_string(deserializer)? {
        None => Ok(None),
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{text}`"))),
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::{decode_contact, encode_contact, parse_timestamp, split_frontmatter, ParseError};

    #[test]
    fn split_requires_two_delimiter_lines() {
        assert!(split_frontmatter("---\ntitle: x\n").is_none());
        let (header, body) = split_frontmatter("---\ntitle: x\n---\nbody\n").unwrap();
        assert_eq!(header, "title: x\n");
        assert_eq!(body, "body\n");
    }

    #[test]
    fn split_ignores_indented_dashes_inside_header() {
        let raw = "---\nnotes: |\n  ---\n  kept\ntags: [contact]\n---\nbody";
        let (header, body) = split_frontmatter(raw).unwrap();
        assert!(header.contains("kept"));
        assert_eq!(body, "body");
    }

    #[test]
    fn split_accepts_crlf_delimiters() {
        let (header, body) = split_frontmatter("---\r\ntitle: x\r\n---\r\nbody").unwrap();
        assert_eq!(header, "title: x\r\n");
        assert_eq!(body, "body");
    }

    #[test]
    fn scalar_header_is_rejected() {
        let err = decode_contact("---\njust text\n---\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeader(_)));
    }

    #[test]
    fn numeric_phone_is_read_as_text() {
        let contact =
            decode_contact("---\ntitle: Num\ntags: [contact]\nphone: 5551234\n---\n").unwrap();
        assert_eq!(contact.phone.as_deref(), Some("5551234"));
    }

    #[test]
    fn encode_omits_blank_optional_fields() {
        let mut contact =
            decode_contact("---\ntitle: Blank\ntags: [contact]\n---\n").unwrap();
        contact.email = Some(String::new());
        let encoded = encode_contact(&contact).unwrap();
        assert!(!encoded.contains("email"));
        assert!(encoded.contains("related_people: []"));
    }

    #[test]
    fn legacy_keys_never_land_in_extra() {
        let raw = "---\nname: Old\ntags: [contact]\narchived: true\nmet_via: !ref alice\n---\n";
        let contact = decode_contact(raw).unwrap();
        assert_eq!(contact.title, "Old");
        assert_eq!(contact.state.as_deref(), Some("archived"));
        assert_eq!(contact.extra.len(), 1);
        assert!(contact.extra.contains_key("met_via"));

        let encoded = encode_contact(&contact).unwrap();
        assert!(!encoded.contains("archived: true"));
        assert!(encoded.contains("met_via: !ref alice"));
    }

    #[test]
    fn parse_timestamp_accepts_dates_and_offsets() {
        let midnight = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        let offset = parse_timestamp("2024-03-05T10:00:00-08:00").unwrap();
        assert_eq!(offset.to_rfc3339(), "2024-03-05T18:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
