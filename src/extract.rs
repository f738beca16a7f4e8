//! Pulls the classification object out of free-form model output.
//!
//! Models are asked for bare JSON but often wrap it in a fenced code block or
//! surround it with commentary. Each strategy below is a pure function over the
//! raw text; they are tried in order and the first JSON object wins.

use serde_json::{Map, Value};

use crate::error::ClassifyError;
use crate::types::Classification;

type Object = Map<String, Value>;
type Strategy = fn(&str) -> Option<Object>;

const FENCE: &str = "```";

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("fenced", parse_fenced),
    ("brace_slice", parse_brace_slice),
];

pub const REQUIRED_FIELDS: [&str; 2] = ["ddc_number", "description"];

/// Finds the first JSON object in `raw`, trying each strategy in turn.
pub fn extract_object(raw: &str) -> Result<Object, ClassifyError> {
    for (name, strategy) in STRATEGIES {
        if let Some(object) = strategy(raw) {
            tracing::trace!(strategy = *name, "extracted JSON object");
            return Ok(object);
        }
    }
    tracing::debug!(content = %raw, "no JSON object found in model response");
    Err(ClassifyError::Unparseable)
}

/// Whole trimmed text is the object.
pub fn parse_direct(raw: &str) -> Option<Object> {
    parse_object(raw.trim())
}

/// Middle of the first fenced block, minus any language tag.
pub fn parse_fenced(raw: &str) -> Option<Object> {
    strip_fence(raw).and_then(parse_object)
}

/// Span from the first `{` to the last `}`, looked for inside the fenced block
/// first and then in the whole text.
pub fn parse_brace_slice(raw: &str) -> Option<Object> {
    strip_fence(raw)
        .into_iter()
        .chain(std::iter::once(raw))
        .find_map(|candidate| brace_span(candidate).and_then(parse_object))
}

/// Builds a [`Classification`] from an extracted object, naming every required
/// field that is absent or empty.
pub fn validate(mut object: Object) -> Result<Classification, ClassifyError> {
    let ddc_number = take_field(&mut object, "ddc_number");
    let description = take_field(&mut object, "description");

    match (ddc_number, description) {
        (Some(ddc_number), Some(description)) => Ok(Classification {
            ddc_number,
            description,
            extra: object,
        }),
        (ddc_number, description) => {
            let missing = REQUIRED_FIELDS
                .into_iter()
                .zip([ddc_number.is_none(), description.is_none()])
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
            Err(ClassifyError::MissingFields(missing))
        }
    }
}

fn parse_object(candidate: &str) -> Option<Object> {
    match serde_json::from_str(candidate).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

fn strip_fence(raw: &str) -> Option<&str> {
    let mut segments = raw.split(FENCE);
    segments.next()?;
    let inner = segments.next()?;
    // The closing delimiter must exist for `inner` to be a block body.
    segments.next()?;

    let inner = inner.trim_start();
    let tag_len = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(inner.len());
    let body = if inner.starts_with(|c: char| c.is_ascii_alphabetic()) {
        &inner[tag_len..]
    } else {
        inner
    };
    Some(body.trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn take_field(object: &mut Object, name: &str) -> Option<String> {
    let value = match object.remove(name)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            object.insert(name.to_string(), other);
            return None;
        }
    };
    (!value.is_empty()).then_some(value)
}
