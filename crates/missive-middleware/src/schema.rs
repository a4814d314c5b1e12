//! Declarative request schemas.
//!
//! A [`ValidationSchema`] describes what a route accepts. It comes in two
//! layouts, fixed when the schema is built:
//!
//! - [`ValidationSchema::Parts`] declares any of `body`, `query`, and
//!   `params`. Only the declared parts are checked and replaced.
//! - [`ValidationSchema::WholeBody`] is the legacy layout: one shape that
//!   describes the body directly, with violation paths relative to the body.
//!
//! Checking walks the parts in the order body, query, params, and the fields
//! of each shape in declaration order, depth-first. Each field reports at
//! most one violation. On success the checked parts come back normalized:
//! query and params strings coerced to their declared scalar types, defaults
//! filled in, and undeclared keys dropped.
//!
//! # Example
//!
//! ```
//! use missive_middleware::schema::{Check, FieldRule, ObjectShape, ValidationSchema};
//!
//! let schema = ValidationSchema::parts().body(
//!     ObjectShape::new()
//!         .field("email", FieldRule::string().email().with_message(Check::Format, "Invalid email address"))
//!         .field("password", FieldRule::string().min(8)),
//! );
//! assert!(schema.declares_body());
//! ```

use crate::error::SchemaError;
use indexmap::IndexMap;
use missive_core::{RequestParts, ViolationCode, ViolationRecord};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::OnceLock;

/// The type a field must have.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A JSON string.
    String,
    /// A whole number.
    Integer,
    /// Any finite number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A nested object.
    Object(ObjectShape),
    /// An array whose items all follow one rule.
    Array(Box<FieldRule>),
    /// Anything at all.
    Any,
}

impl FieldType {
    fn expected(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Any => "any",
        }
    }
}

/// Well-known string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    /// An email address.
    Email,
    /// An absolute URL with a scheme and host.
    Url,
    /// A hyphenated UUID.
    Uuid,
}

impl StringFormat {
    fn matches(self, value: &str) -> bool {
        static EMAIL: OnceLock<Regex> = OnceLock::new();
        static URL: OnceLock<Regex> = OnceLock::new();
        static UUID: OnceLock<Regex> = OnceLock::new();

        match self {
            Self::Email => {
                let re = EMAIL.get_or_init(|| {
                    Regex::new(
                        r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$",
                    )
                    .expect("valid regex")
                });
                !value.starts_with('.') && !value.contains("..") && re.is_match(value)
            }
            Self::Url => URL
                .get_or_init(|| {
                    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+(?:[/?#]\S*)?$")
                        .expect("valid regex")
                })
                .is_match(value),
            Self::Uuid => UUID
                .get_or_init(|| {
                    Regex::new(
                        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
                    )
                    .expect("valid regex")
                })
                .is_match(value),
        }
    }

    const fn default_message(self) -> &'static str {
        match self {
            Self::Email => "Invalid email",
            Self::Url => "Invalid url",
            Self::Uuid => "Invalid uuid",
        }
    }
}

/// A check whose message can be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// The field is missing.
    Required,
    /// The field has the wrong type.
    Type,
    /// Below the minimum.
    Min,
    /// Above the maximum.
    Max,
    /// Fails its string format.
    Format,
    /// Not one of the allowed values.
    Enum,
}

/// Per-check message overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleMessages {
    /// Message when the field is missing.
    #[serde(default)]
    pub required: Option<String>,
    /// Message when the field has the wrong type.
    #[serde(default, rename = "type")]
    pub invalid_type: Option<String>,
    /// Message when below the minimum.
    #[serde(default)]
    pub min: Option<String>,
    /// Message when above the maximum.
    #[serde(default)]
    pub max: Option<String>,
    /// Message when the format does not match.
    #[serde(default)]
    pub format: Option<String>,
    /// Message when the value is not allowed.
    #[serde(default, rename = "enum")]
    pub allowed: Option<String>,
}

impl RuleMessages {
    fn get(&self, check: Check) -> Option<&str> {
        match check {
            Check::Required => self.required.as_deref(),
            Check::Type => self.invalid_type.as_deref(),
            Check::Min => self.min.as_deref(),
            Check::Max => self.max.as_deref(),
            Check::Format => self.format.as_deref(),
            Check::Enum => self.allowed.as_deref(),
        }
    }

    fn set(&mut self, check: Check, message: String) {
        let slot = match check {
            Check::Required => &mut self.required,
            Check::Type => &mut self.invalid_type,
            Check::Min => &mut self.min,
            Check::Max => &mut self.max,
            Check::Format => &mut self.format,
            Check::Enum => &mut self.allowed,
        };
        *slot = Some(message);
    }
}

/// Rule for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    field_type: FieldType,
    optional: bool,
    nullable: bool,
    min: Option<f64>,
    max: Option<f64>,
    format: Option<StringFormat>,
    allowed: Option<Vec<Value>>,
    default: Option<Value>,
    messages: RuleMessages,
}

impl FieldRule {
    /// Creates a required rule of the given type.
    #[must_use]
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            optional: false,
            nullable: false,
            min: None,
            max: None,
            format: None,
            allowed: None,
            default: None,
            messages: RuleMessages::default(),
        }
    }

    /// A required string.
    #[must_use]
    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    /// A required integer.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    /// A required number.
    #[must_use]
    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    /// A required boolean.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    /// A required nested object.
    #[must_use]
    pub fn object(shape: ObjectShape) -> Self {
        Self::new(FieldType::Object(shape))
    }

    /// A required array of `items`.
    #[must_use]
    pub fn array(items: FieldRule) -> Self {
        Self::new(FieldType::Array(Box::new(items)))
    }

    /// A required value of any type.
    #[must_use]
    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    /// Allows the field to be absent.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Allows an explicit `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Minimum length (strings, arrays) or value (numbers).
    #[must_use]
    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.min = Some(min.into());
        self
    }

    /// Maximum length (strings, arrays) or value (numbers).
    #[must_use]
    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Requires a string format.
    #[must_use]
    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Requires an email address.
    #[must_use]
    pub fn email(self) -> Self {
        self.format(StringFormat::Email)
    }

    /// Requires an absolute URL.
    #[must_use]
    pub fn url(self) -> Self {
        self.format(StringFormat::Url)
    }

    /// Requires a UUID.
    #[must_use]
    pub fn uuid(self) -> Self {
        self.format(StringFormat::Uuid)
    }

    /// Restricts the value to a fixed set.
    #[must_use]
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Value used when the field is absent. Implies optional.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Overrides the message reported for `check`.
    #[must_use]
    pub fn with_message(mut self, check: Check, message: impl Into<String>) -> Self {
        self.messages.set(check, message.into());
        self
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns `true` if the field may be absent.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional || self.default.is_some()
    }

    fn message_or(&self, check: Check, fallback: impl FnOnce() -> String) -> String {
        self.messages
            .get(check)
            .map_or_else(fallback, str::to_string)
    }

    fn check(
        &self,
        value: Option<&Value>,
        path: &mut Vec<String>,
        coercion: Coercion,
        out: &mut Vec<ViolationRecord>,
    ) -> Option<Value> {
        let value = match value {
            None => return self.check_missing(path, out),
            Some(Value::Null) if self.nullable => return Some(Value::Null),
            Some(value) => value,
        };

        match &self.field_type {
            FieldType::Object(shape) => {
                if !value.is_object() {
                    self.report_type(value, path, out);
                    return None;
                }
                shape.check_object(value, path, coercion, out)
            }
            FieldType::Array(items) => self.check_array(items, value, path, coercion, out),
            _ => self.check_scalar(value, path, coercion, out),
        }
    }

    fn check_missing(&self, path: &[String], out: &mut Vec<ViolationRecord>) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        if !self.optional {
            let message = self.message_or(Check::Required, || "Required".to_string());
            out.push(ViolationRecord::new(path.iter().cloned(), message, ViolationCode::InvalidType));
        }
        None
    }

    fn report_type(&self, value: &Value, path: &[String], out: &mut Vec<ViolationRecord>) {
        let message = self.message_or(Check::Type, || {
            format!(
                "Expected {}, received {}",
                self.field_type.expected(),
                received_type(value)
            )
        });
        out.push(ViolationRecord::new(path.iter().cloned(), message, ViolationCode::InvalidType));
    }

    fn check_array(
        &self,
        items: &FieldRule,
        value: &Value,
        path: &mut Vec<String>,
        coercion: Coercion,
        out: &mut Vec<ViolationRecord>,
    ) -> Option<Value> {
        let elements: Vec<Value> = match value {
            Value::Array(elements) => elements.clone(),
            // `?tag=a` arrives as a single string.
            Value::String(_) if coercion == Coercion::FromStrings => vec![value.clone()],
            other => {
                self.report_type(other, path, out);
                return None;
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let len = elements.len() as f64;
        if let Some(record) = self.check_bounds(len, Bound::Items, path) {
            out.push(record);
            return None;
        }

        let mut normalized = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            path.push(index.to_string());
            if let Some(value) = items.check(Some(element), path, coercion, out) {
                normalized.push(value);
            }
            path.pop();
        }
        Some(Value::Array(normalized))
    }

    fn check_scalar(
        &self,
        value: &Value,
        path: &[String],
        coercion: Coercion,
        out: &mut Vec<ViolationRecord>,
    ) -> Option<Value> {
        let Some(value) = self.coerce(value, coercion) else {
            self.report_type(value, path, out);
            return None;
        };

        if let Some(record) = self.check_constraints(&value, path) {
            out.push(record);
            return None;
        }
        Some(value)
    }

    /// Returns the value in its declared type, or `None` on a type mismatch.
    fn coerce(&self, value: &Value, coercion: Coercion) -> Option<Value> {
        match (&self.field_type, value) {
            (FieldType::Any, v) => Some(v.clone()),
            (FieldType::String, Value::String(_)) | (FieldType::Boolean, Value::Bool(_)) => {
                Some(value.clone())
            }
            (FieldType::Integer, Value::Number(n)) => is_whole(n).then(|| value.clone()),
            (FieldType::Number, Value::Number(_)) => Some(value.clone()),
            (_, Value::String(raw)) if coercion == Coercion::FromStrings => {
                self.coerce_string(raw.trim())
            }
            _ => None,
        }
    }

    fn coerce_string(&self, raw: &str) -> Option<Value> {
        match self.field_type {
            FieldType::Integer => raw.parse::<i64>().ok().map(Value::from),
            FieldType::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            FieldType::Boolean => match raw {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }

    fn check_constraints(&self, value: &Value, path: &[String]) -> Option<ViolationRecord> {
        match value {
            Value::String(s) => {
                #[allow(clippy::cast_precision_loss)]
                let len = s.chars().count() as f64;
                if let Some(record) = self.check_bounds(len, Bound::Chars, path) {
                    return Some(record);
                }
                if let Some(format) = self.format {
                    if !format.matches(s) {
                        let message =
                            self.message_or(Check::Format, || format.default_message().to_string());
                        return Some(ViolationRecord::new(
                            path.iter().cloned(),
                            message,
                            ViolationCode::InvalidFormat,
                        ));
                    }
                }
            }
            Value::Number(n) => {
                if let Some(record) = n
                    .as_f64()
                    .and_then(|v| self.check_bounds(v, Bound::Value, path))
                {
                    return Some(record);
                }
            }
            _ => {}
        }

        self.check_allowed(value, path)
    }

    fn check_bounds(&self, measured: f64, bound: Bound, path: &[String]) -> Option<ViolationRecord> {
        if let Some(min) = self.min {
            if measured < min {
                let message = self.message_or(Check::Min, || bound.too_small(min));
                return Some(ViolationRecord::new(path.iter().cloned(), message, ViolationCode::TooSmall));
            }
        }
        if let Some(max) = self.max {
            if measured > max {
                let message = self.message_or(Check::Max, || bound.too_big(max));
                return Some(ViolationRecord::new(path.iter().cloned(), message, ViolationCode::TooBig));
            }
        }
        None
    }

    fn check_allowed(&self, value: &Value, path: &[String]) -> Option<ViolationRecord> {
        let allowed = self.allowed.as_ref()?;
        if allowed.contains(value) {
            return None;
        }
        let message = self.message_or(Check::Enum, || {
            let expected = allowed
                .iter()
                .map(display_literal)
                .collect::<Vec<_>>()
                .join(" | ");
            format!(
                "Invalid enum value. Expected {expected}, received {}",
                display_literal(value)
            )
        });
        Some(ViolationRecord::new(path.iter().cloned(), message, ViolationCode::InvalidValue))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Chars,
    Items,
    Value,
}

impl Bound {
    fn too_small(self, min: f64) -> String {
        match self {
            Self::Chars => format!("String must contain at least {min} character(s)"),
            Self::Items => format!("Array must contain at least {min} element(s)"),
            Self::Value => format!("Number must be greater than or equal to {min}"),
        }
    }

    fn too_big(self, max: f64) -> String {
        match self {
            Self::Chars => format!("String must contain at most {max} character(s)"),
            Self::Items => format!("Array must contain at most {max} element(s)"),
            Self::Value => format!("Number must be less than or equal to {max}"),
        }
    }
}

/// Whether strings may stand in for scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    Strict,
    FromStrings,
}

/// Ordered set of named field rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectShape {
    fields: IndexMap<String, FieldRule>,
}

impl ObjectShape {
    /// Creates an empty shape.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Fields are checked in the order they are added.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// Returns the field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the rule for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn check_part(
        &self,
        value: &Value,
        path: &mut Vec<String>,
        coercion: Coercion,
        out: &mut Vec<ViolationRecord>,
    ) -> Option<Value> {
        match value {
            Value::Object(_) => self.check_object(value, path, coercion, out),
            Value::Null => {
                out.push(ViolationRecord::new(path.iter().cloned(), "Required", ViolationCode::InvalidType));
                None
            }
            other => {
                out.push(ViolationRecord::new(
                    path.iter().cloned(),
                    format!("Expected object, received {}", received_type(other)),
                    ViolationCode::InvalidType,
                ));
                None
            }
        }
    }

    fn check_object(
        &self,
        value: &Value,
        path: &mut Vec<String>,
        coercion: Coercion,
        out: &mut Vec<ViolationRecord>,
    ) -> Option<Value> {
        let map = value.as_object()?;
        let mut normalized = Map::new();
        for (name, rule) in &self.fields {
            path.push(name.clone());
            if let Some(value) = rule.check(map.get(name), path, coercion, out) {
                normalized.insert(name.clone(), value);
            }
            path.pop();
        }
        Some(Value::Object(normalized))
    }
}

/// Schema attached to a route.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationSchema {
    /// Any of body, query, and params, each with its own shape.
    Parts {
        /// Shape of the JSON body.
        body: Option<ObjectShape>,
        /// Shape of the query string.
        query: Option<ObjectShape>,
        /// Shape of the path parameters.
        params: Option<ObjectShape>,
    },
    /// A single shape for the body, with paths relative to the body.
    WholeBody(ObjectShape),
}

impl ValidationSchema {
    /// Starts an empty multi-part schema.
    ///
    /// Until a part is declared it validates like
    /// `whole_body(ObjectShape::new())`: the body must be an object.
    #[must_use]
    pub fn parts() -> Self {
        Self::Parts {
            body: None,
            query: None,
            params: None,
        }
    }

    /// Creates a legacy body-only schema.
    #[must_use]
    pub fn whole_body(shape: ObjectShape) -> Self {
        Self::WholeBody(shape)
    }

    /// Declares the body shape.
    ///
    /// On a [`ValidationSchema::WholeBody`] schema this replaces the shape.
    #[must_use]
    pub fn body(self, shape: ObjectShape) -> Self {
        match self {
            Self::Parts { query, params, .. } => Self::Parts {
                body: Some(shape),
                query,
                params,
            },
            Self::WholeBody(_) => Self::WholeBody(shape),
        }
    }

    /// Declares the query shape.
    #[must_use]
    pub fn query(self, shape: ObjectShape) -> Self {
        match self {
            Self::Parts { body, params, .. } => Self::Parts {
                body,
                query: Some(shape),
                params,
            },
            Self::WholeBody(body) => Self::Parts {
                body: Some(body),
                query: Some(shape),
                params: None,
            },
        }
    }

    /// Declares the params shape.
    #[must_use]
    pub fn params(self, shape: ObjectShape) -> Self {
        match self {
            Self::Parts { body, query, .. } => Self::Parts {
                body,
                query,
                params: Some(shape),
            },
            Self::WholeBody(body) => Self::Parts {
                body: Some(body),
                query: None,
                params: Some(shape),
            },
        }
    }

    /// Returns `true` if the body is checked.
    #[must_use]
    pub const fn declares_body(&self) -> bool {
        matches!(
            self,
            Self::Parts { body: Some(_), .. }
                | Self::Parts { body: None, query: None, params: None }
                | Self::WholeBody(_)
        )
    }

    /// Parses a JSON declaration.
    ///
    /// A top-level object with any of the keys `body`, `query`, or `params`
    /// is a multi-part schema; anything else is a legacy body-only schema
    /// whose keys are field names. Field order is taken from the document.
    ///
    /// ```
    /// use missive_middleware::schema::ValidationSchema;
    ///
    /// let schema = ValidationSchema::from_json(r#"{
    ///     "body": { "name": { "type": "string", "min": 1, "message": "Name is required" } },
    ///     "query": { "page": { "type": "integer", "min": 1, "default": 1 } }
    /// }"#).unwrap();
    /// assert!(matches!(schema, ValidationSchema::Parts { .. }));
    ///
    /// let legacy = ValidationSchema::from_json(r#"{ "name": { "type": "string" } }"#).unwrap();
    /// assert!(matches!(legacy, ValidationSchema::WholeBody(_)));
    /// ```
    pub fn from_json(declaration: &str) -> Result<Self, SchemaError> {
        let keys: IndexMap<String, serde::de::IgnoredAny> = serde_json::from_str(declaration)?;
        let is_parts = keys
            .keys()
            .any(|key| matches!(key.as_str(), "body" | "query" | "params"));

        if is_parts {
            let parts: PartsDeclaration = serde_json::from_str(declaration)?;
            let schema = Self::Parts {
                body: parts.body.map(shape_from_declaration).transpose()?,
                query: parts.query.map(shape_from_declaration).transpose()?,
                params: parts.params.map(shape_from_declaration).transpose()?,
            };
            Ok(if schema.is_empty_parts() {
                Self::WholeBody(ObjectShape::new())
            } else {
                schema
            })
        } else {
            let fields: IndexMap<String, FieldDeclaration> = serde_json::from_str(declaration)?;
            Ok(Self::WholeBody(shape_from_declaration(fields)?))
        }
    }

    const fn is_empty_parts(&self) -> bool {
        matches!(self, Self::Parts { body: None, query: None, params: None })
    }

    /// Checks `parts` against the schema.
    ///
    /// Returns the normalized parts, or every violation in traversal order.
    pub fn validate(&self, parts: &RequestParts) -> Result<RequestParts, Vec<ViolationRecord>> {
        let mut violations = Vec::new();
        let mut normalized = parts.clone();

        match self {
            Self::Parts { .. } if self.is_empty_parts() => {
                let mut path = Vec::new();
                if let Some(checked) = ObjectShape::new().check_part(
                    &parts.body,
                    &mut path,
                    Coercion::Strict,
                    &mut violations,
                ) {
                    normalized.body = checked;
                }
            }
            Self::Parts { body, query, params } => {
                let declared = [
                    ("body", body, &parts.body, Coercion::Strict),
                    ("query", query, &parts.query, Coercion::FromStrings),
                    ("params", params, &parts.params, Coercion::FromStrings),
                ];
                for (name, shape, value, coercion) in declared {
                    let Some(shape) = shape else { continue };
                    let mut path = vec![name.to_string()];
                    if let Some(checked) = shape.check_part(value, &mut path, coercion, &mut violations) {
                        match name {
                            "body" => normalized.body = checked,
                            "query" => normalized.query = checked,
                            _ => normalized.params = checked,
                        }
                    }
                }
            }
            Self::WholeBody(shape) => {
                let mut path = Vec::new();
                if let Some(checked) =
                    shape.check_part(&parts.body, &mut path, Coercion::Strict, &mut violations)
                {
                    normalized.body = checked;
                }
            }
        }

        if violations.is_empty() {
            Ok(normalized)
        } else {
            Err(violations)
        }
    }
}

impl fmt::Display for ValidationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parts { body, query, params } => {
                let declared: Vec<&str> = [("body", body), ("query", query), ("params", params)]
                    .into_iter()
                    .filter_map(|(name, shape)| shape.as_ref().map(|_| name))
                    .collect();
                write!(f, "parts({})", declared.join(", "))
            }
            Self::WholeBody(shape) => write!(f, "whole_body({} fields)", shape.len()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartsDeclaration {
    #[serde(default)]
    body: Option<IndexMap<String, FieldDeclaration>>,
    #[serde(default)]
    query: Option<IndexMap<String, FieldDeclaration>>,
    #[serde(default)]
    params: Option<IndexMap<String, FieldDeclaration>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DeclaredType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDeclaration {
    #[serde(rename = "type")]
    kind: DeclaredType,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    format: Option<StringFormat>,
    #[serde(default, rename = "enum")]
    allowed: Option<Vec<Value>>,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    messages: RuleMessages,
    #[serde(default)]
    fields: Option<IndexMap<String, FieldDeclaration>>,
    #[serde(default)]
    items: Option<Box<FieldDeclaration>>,
}

fn shape_from_declaration(
    fields: IndexMap<String, FieldDeclaration>,
) -> Result<ObjectShape, SchemaError> {
    fields
        .into_iter()
        .try_fold(ObjectShape::new(), |shape, (name, declaration)| {
            let rule = rule_from_declaration(&name, declaration)?;
            Ok(shape.field(name, rule))
        })
}

fn rule_from_declaration(name: &str, decl: FieldDeclaration) -> Result<FieldRule, SchemaError> {
    let field_type = match decl.kind {
        DeclaredType::String => FieldType::String,
        DeclaredType::Integer => FieldType::Integer,
        DeclaredType::Number => FieldType::Number,
        DeclaredType::Boolean => FieldType::Boolean,
        DeclaredType::Any => FieldType::Any,
        DeclaredType::Object => {
            let fields = decl.fields.ok_or_else(|| SchemaError::MissingFields {
                field: name.to_string(),
            })?;
            FieldType::Object(shape_from_declaration(fields)?)
        }
        DeclaredType::Array => {
            let items = decl.items.ok_or_else(|| SchemaError::MissingItems {
                field: name.to_string(),
            })?;
            FieldType::Array(Box::new(rule_from_declaration(name, *items)?))
        }
    };

    if decl.format.is_some() && field_type != FieldType::String {
        return Err(SchemaError::FormatOnNonString {
            field: name.to_string(),
        });
    }
    if let (Some(min), Some(max)) = (decl.min, decl.max) {
        if min > max {
            return Err(SchemaError::InvertedBounds {
                field: name.to_string(),
                min,
                max,
            });
        }
    }

    // A blanket `message` fills every check without an explicit override.
    let mut messages = decl.messages;
    if let Some(message) = decl.message {
        for check in [Check::Required, Check::Type, Check::Min, Check::Max, Check::Format, Check::Enum] {
            if messages.get(check).is_none() {
                messages.set(check, message.clone());
            }
        }
    }

    Ok(FieldRule {
        field_type,
        optional: decl.optional,
        nullable: decl.nullable,
        min: decl.min,
        max: decl.max,
        format: decl.format,
        allowed: decl.allowed,
        default: decl.default,
        messages,
    })
}

fn is_whole(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn received_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if is_whole(n) => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}
