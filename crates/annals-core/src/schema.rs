//! Schema-document-driven event types.
//!
//! Supports the subset of JSON Schema that event payloads actually use:
//! `type`, `properties`, `required`, `additionalProperties` (boolean),
//! `enum`, `const`, numeric bounds, string length and array size. The
//! document is compiled once at construction; unknown keywords are ignored.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::error::{ValidationError, ValidationIssue};
use crate::event_type::EventType;
use crate::rng::DeterministicRng;

const SAMPLE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Width of the sampled range when a number has at most one bound.
const SAMPLE_RANGE: i128 = 1000;

/// A schema document that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema for event type {event_type} at `{path}`: {reason}")]
pub struct SchemaError {
    /// The event type being constructed.
    pub event_type: String,
    /// JSON pointer into the schema document.
    pub path: String,
    /// What is wrong with the keyword.
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if is_integral(n) => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    fn matches(self, value: &Value) -> bool {
        let actual = Self::of(value);
        actual == self || (self == Self::Number && actual == Self::Integer)
    }
}

fn is_integral(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

#[derive(Debug, Clone)]
struct SchemaNode {
    kinds: Option<Vec<JsonKind>>,
    properties: BTreeMap<String, SchemaNode>,
    required: Vec<String>,
    additional_properties: bool,
    enum_values: Option<Vec<Value>>,
    const_value: Option<Value>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    items: Option<Box<SchemaNode>>,
    min_items: Option<usize>,
    max_items: Option<usize>,
}

impl Default for SchemaNode {
    fn default() -> Self {
        Self {
            kinds: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: true,
            enum_values: None,
            const_value: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
            min_length: None,
            max_length: None,
            items: None,
            min_items: None,
            max_items: None,
        }
    }
}

type CompileResult<T> = Result<T, (String, String)>;

fn pointer_push(path: &str, segment: &str) -> String {
    format!("{path}/{}", segment.replace('~', "~0").replace('/', "~1"))
}

fn number_keyword(
    doc: &serde_json::Map<String, Value>,
    key: &str,
    path: &str,
) -> CompileResult<Option<f64>> {
    match doc.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| (pointer_push(path, key), "must be a number".to_owned())),
    }
}

fn size_keyword(
    doc: &serde_json::Map<String, Value>,
    key: &str,
    path: &str,
) -> CompileResult<Option<usize>> {
    match doc.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                (
                    pointer_push(path, key),
                    "must be a non-negative integer".to_owned(),
                )
            }),
    }
}

impl SchemaNode {
    fn compile(document: &Value, path: &str) -> CompileResult<Self> {
        let doc = match document {
            Value::Bool(true) => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => return Err((path.to_owned(), "schema must be an object".to_owned())),
        };

        let mut node = Self::default();

        if let Some(kinds) = doc.get("type") {
            let names: Vec<&Value> = match kinds {
                Value::Array(list) => list.iter().collect(),
                other => vec![other],
            };
            let mut parsed = Vec::with_capacity(names.len());
            for name in names {
                let kind = name.as_str().and_then(JsonKind::parse).ok_or_else(|| {
                    (
                        pointer_push(path, "type"),
                        format!("unsupported type {name}"),
                    )
                })?;
                parsed.push(kind);
            }
            node.kinds = Some(parsed);
        }

        if let Some(properties) = doc.get("properties") {
            let Value::Object(properties) = properties else {
                return Err((pointer_push(path, "properties"), "must be an object".to_owned()));
            };
            let base = pointer_push(path, "properties");
            for (name, sub) in properties {
                let child = Self::compile(sub, &pointer_push(&base, name))?;
                node.properties.insert(name.clone(), child);
            }
        }

        if let Some(required) = doc.get("required") {
            let list = required.as_array().ok_or_else(|| {
                (pointer_push(path, "required"), "must be an array".to_owned())
            })?;
            for name in list {
                let name = name.as_str().ok_or_else(|| {
                    (
                        pointer_push(path, "required"),
                        "must contain only strings".to_owned(),
                    )
                })?;
                node.required.push(name.to_owned());
            }
        }

        match doc.get("additionalProperties") {
            None => {}
            Some(Value::Bool(allowed)) => node.additional_properties = *allowed,
            Some(_) => {
                return Err((
                    pointer_push(path, "additionalProperties"),
                    "only boolean values are supported".to_owned(),
                ));
            }
        }

        if let Some(values) = doc.get("enum") {
            let list = values
                .as_array()
                .ok_or_else(|| (pointer_push(path, "enum"), "must be an array".to_owned()))?;
            node.enum_values = Some(list.clone());
        }
        node.const_value = doc.get("const").cloned();

        node.minimum = number_keyword(doc, "minimum", path)?;
        node.maximum = number_keyword(doc, "maximum", path)?;
        node.exclusive_minimum = number_keyword(doc, "exclusiveMinimum", path)?;
        node.exclusive_maximum = number_keyword(doc, "exclusiveMaximum", path)?;
        node.min_length = size_keyword(doc, "minLength", path)?;
        node.max_length = size_keyword(doc, "maxLength", path)?;
        node.min_items = size_keyword(doc, "minItems", path)?;
        node.max_items = size_keyword(doc, "maxItems", path)?;

        if let Some(items) = doc.get("items") {
            let child = Self::compile(items, &pointer_push(path, "items"))?;
            node.items = Some(Box::new(child));
        }

        Ok(node)
    }

    fn validate(&self, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
        if let Some(expected) = &self.const_value {
            if value != expected {
                issues.push(ValidationIssue::new(path, format!("must equal {expected}")));
            }
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                let rendered: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                issues.push(ValidationIssue::new(
                    path,
                    format!("must be one of [{}]", rendered.join(", ")),
                ));
            }
        }

        if let Some(kinds) = &self.kinds {
            if !kinds.iter().any(|kind| kind.matches(value)) {
                let expected: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
                issues.push(ValidationIssue::new(
                    path,
                    format!(
                        "expected {}, found {}",
                        expected.join(" or "),
                        JsonKind::of(value).as_str()
                    ),
                ));
                return;
            }
        }

        match value {
            Value::Number(n) => self.validate_number(n.as_f64().unwrap_or(f64::NAN), path, issues),
            Value::String(s) => self.validate_string(s, path, issues),
            Value::Array(items) => self.validate_array(items, path, issues),
            Value::Object(map) => self.validate_object(map, path, issues),
            Value::Null | Value::Bool(_) => {}
        }
    }

    fn validate_number(&self, n: f64, path: &str, issues: &mut Vec<ValidationIssue>) {
        if let Some(min) = self.minimum {
            if n < min {
                issues.push(ValidationIssue::new(path, format!("must be >= {min}")));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                issues.push(ValidationIssue::new(path, format!("must be <= {max}")));
            }
        }
        if let Some(min) = self.exclusive_minimum {
            if n <= min {
                issues.push(ValidationIssue::new(path, format!("must be > {min}")));
            }
        }
        if let Some(max) = self.exclusive_maximum {
            if n >= max {
                issues.push(ValidationIssue::new(path, format!("must be < {max}")));
            }
        }
    }

    fn validate_string(&self, s: &str, path: &str, issues: &mut Vec<ValidationIssue>) {
        let len = s.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                issues.push(ValidationIssue::new(
                    path,
                    format!("must be at least {min} characters long"),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                issues.push(ValidationIssue::new(
                    path,
                    format!("must be at most {max} characters long"),
                ));
            }
        }
    }

    fn validate_array(&self, items: &[Value], path: &str, issues: &mut Vec<ValidationIssue>) {
        if let Some(min) = self.min_items {
            if items.len() < min {
                issues.push(ValidationIssue::new(
                    path,
                    format!("must contain at least {min} items"),
                ));
            }
        }
        if let Some(max) = self.max_items {
            if items.len() > max {
                issues.push(ValidationIssue::new(
                    path,
                    format!("must contain at most {max} items"),
                ));
            }
        }
        if let Some(schema) = &self.items {
            for (index, item) in items.iter().enumerate() {
                schema.validate(item, &pointer_push(path, &index.to_string()), issues);
            }
        }
    }

    fn validate_object(
        &self,
        map: &serde_json::Map<String, Value>,
        path: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for name in &self.required {
            if !map.contains_key(name) {
                issues.push(ValidationIssue::new(pointer_push(path, name), "is required"));
            }
        }
        for (name, value) in map {
            let child_path = pointer_push(path, name);
            match self.properties.get(name) {
                Some(schema) => schema.validate(value, &child_path, issues),
                None if !self.additional_properties => {
                    issues.push(ValidationIssue::new(child_path, "is not allowed"));
                }
                None => {}
            }
        }
    }

    fn sample_kind(&self) -> Option<JsonKind> {
        match &self.kinds {
            Some(kinds) => kinds
                .iter()
                .copied()
                .find(|k| *k != JsonKind::Null)
                .or_else(|| kinds.first().copied()),
            None if !self.properties.is_empty() || !self.required.is_empty() => {
                Some(JsonKind::Object)
            }
            None if self.items.is_some() => Some(JsonKind::Array),
            None => None,
        }
    }

    fn sample(&self, rng: &mut dyn DeterministicRng) -> Value {
        if let Some(value) = &self.const_value {
            return value.clone();
        }
        if let Some(values) = self.enum_values.as_ref().filter(|v| !v.is_empty()) {
            return values[pick_index(rng, values.len())].clone();
        }

        match self.sample_kind() {
            None | Some(JsonKind::Null) => Value::Null,
            Some(JsonKind::Boolean) => Value::Bool(rng.next_bool()),
            Some(JsonKind::Integer) => Value::from(self.sample_integer(rng)),
            Some(JsonKind::Number) => serde_json::json!(self.sample_number(rng)),
            Some(JsonKind::String) => Value::String(self.sample_string(rng)),
            Some(JsonKind::Array) => {
                let min = self.min_items.unwrap_or(0);
                let max = self.max_items.unwrap_or(min + 3).max(min);
                let count = min + pick_index(rng, max - min + 1);
                let items = (0..count)
                    .map(|_| self.items.as_ref().map_or(Value::Null, |s| s.sample(rng)))
                    .collect();
                Value::Array(items)
            }
            Some(JsonKind::Object) => {
                let mut map = serde_json::Map::new();
                for (name, schema) in &self.properties {
                    if self.required.contains(name) || rng.next_bool() {
                        map.insert(name.clone(), schema.sample(rng));
                    }
                }
                for name in &self.required {
                    map.entry(name.clone()).or_insert(Value::Null);
                }
                Value::Object(map)
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sample_integer(&self, rng: &mut dyn DeterministicRng) -> i64 {
        // Float-to-int casts saturate; i128 keeps the arithmetic below exact.
        let lower = tighter(
            self.minimum.map(|min| min.ceil() as i128),
            self.exclusive_minimum.map(|min| (min.floor() as i128).saturating_add(1)),
            i128::max,
        );
        let upper = tighter(
            self.maximum.map(|max| max.floor() as i128),
            self.exclusive_maximum.map(|max| (max.ceil() as i128).saturating_sub(1)),
            i128::min,
        );
        let (lower, upper) = match (lower, upper) {
            (Some(lower), Some(upper)) => (lower, upper),
            (Some(lower), None) => (lower, lower.saturating_add(SAMPLE_RANGE)),
            (None, Some(upper)) => (upper.saturating_sub(SAMPLE_RANGE), upper),
            (None, None) => (0, SAMPLE_RANGE),
        };
        let floor = i128::from(i64::MIN);
        let ceiling = i128::from(i64::MAX);
        let lower = lower.clamp(floor, ceiling);
        let upper = upper.clamp(floor, ceiling);
        let value = if upper <= lower {
            lower
        } else {
            let span = u32::try_from(upper - lower).unwrap_or(u32::MAX);
            lower + i128::from(rng.next_u32_range(0, span))
        };
        i64::try_from(value).unwrap_or(i64::MAX)
    }

    #[allow(clippy::cast_precision_loss)]
    fn sample_number(&self, rng: &mut dyn DeterministicRng) -> f64 {
        let lower = tighter(self.minimum, self.exclusive_minimum, f64::max);
        let upper = tighter(self.maximum, self.exclusive_maximum, f64::min);
        let range = SAMPLE_RANGE as f64;
        let (lower, upper) = match (lower, upper) {
            (Some(lower), Some(upper)) => (lower, upper),
            (Some(lower), None) => (lower, lower + range),
            (None, Some(upper)) => (upper - range, upper),
            (None, None) => (0.0, range),
        };
        if upper <= lower {
            return lower;
        }
        // Stay strictly inside the interval so exclusive bounds hold.
        let t = rng.next_f64().mul_add(0.98, 0.01);
        lower.mul_add(1.0 - t, t * upper)
    }

    fn sample_string(&self, rng: &mut dyn DeterministicRng) -> String {
        let max_hint = self.max_length.unwrap_or(usize::MAX);
        let min = self.min_length.unwrap_or(1).min(max_hint);
        let max = self.max_length.unwrap_or(min + 11).max(min);
        let len = min + pick_index(rng, max - min + 1);
        (0..len)
            .map(|_| char::from(SAMPLE_ALPHABET[pick_index(rng, SAMPLE_ALPHABET.len())]))
            .collect()
    }
}

fn tighter<T>(a: Option<T>, b: Option<T>, pick: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

fn pick_index(rng: &mut dyn DeterministicRng, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let max = u32::try_from(len - 1).unwrap_or(u32::MAX);
    usize::try_from(rng.next_u32_range(0, max)).unwrap_or(0)
}

/// An event type validated by a JSON schema document.
#[derive(Debug, Clone)]
pub struct SchemaEventType {
    name: String,
    document: Value,
    root: SchemaNode,
}

impl SchemaEventType {
    /// Compiles `document` into an event type called `name`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if a supported keyword has a malformed value.
    pub fn new(name: impl Into<String>, document: Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let root = SchemaNode::compile(&document, "").map_err(|(path, reason)| SchemaError {
            event_type: name.clone(),
            path,
            reason,
        })?;
        Ok(Self {
            name,
            document,
            root,
        })
    }

    /// The schema document this type was compiled from.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl EventType for SchemaEventType {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        self.root.validate(payload, "", &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                event_type: self.name.clone(),
                issues,
            })
        }
    }

    fn sample_payload(&self, rng: &mut dyn DeterministicRng) -> Option<Value> {
        Some(self.root.sample(rng))
    }
}
