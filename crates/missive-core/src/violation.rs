//! Schema violation records.

use serde::{Serialize, Serializer};
use std::fmt;

/// Machine-readable reason a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    /// Missing value or a value of the wrong type.
    InvalidType,
    /// String/array shorter than, or number below, the declared minimum.
    TooSmall,
    /// String/array longer than, or number above, the declared maximum.
    TooBig,
    /// String that does not match its declared format.
    InvalidFormat,
    /// Value outside the declared set of allowed values.
    InvalidValue,
}

impl ViolationCode {
    /// Returns the wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidType => "invalid_type",
            Self::TooSmall => "too_small",
            Self::TooBig => "too_big",
            Self::InvalidFormat => "invalid_format",
            Self::InvalidValue => "invalid_value",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected field.
///
/// Serializes as `{ "field": "body.email", "message": "...", "code": "..." }`,
/// with the path segments joined by `.`.
///
/// # Example
///
/// ```
/// use missive_core::{ViolationCode, ViolationRecord};
///
/// let record = ViolationRecord::new(
///     ["body", "email"],
///     "Invalid email address",
///     ViolationCode::InvalidFormat,
/// );
/// assert_eq!(record.field(), "body.email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationRecord {
    field_path: Vec<String>,
    message: String,
    code: ViolationCode,
}

impl ViolationRecord {
    /// Creates a record for the field at `path`.
    pub fn new<I, S>(path: I, message: impl Into<String>, code: ViolationCode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
            code,
        }
    }

    /// Returns the path segments of the rejected field.
    #[must_use]
    pub fn field_path(&self) -> &[String] {
        &self.field_path
    }

    /// Returns the dotted field name.
    #[must_use]
    pub fn field(&self) -> String {
        self.field_path.join(".")
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the violation code.
    #[must_use]
    pub const fn code(&self) -> ViolationCode {
        self.code
    }
}

impl fmt::Display for ViolationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field(), self.message, self.code)
    }
}

impl Serialize for ViolationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            field: String,
            message: &'a str,
            code: ViolationCode,
        }

        Wire {
            field: self.field(),
            message: &self.message,
            code: self.code,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_joins_path() {
        let record = ViolationRecord::new(
            ["body", "address", "zip"],
            "Required",
            ViolationCode::InvalidType,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "field": "body.address.zip",
                "message": "Required",
                "code": "invalid_type"
            })
        );
    }

    #[test]
    fn test_empty_path_is_empty_field() {
        let record = ViolationRecord::new(Vec::<String>::new(), "Expected object", ViolationCode::InvalidType);
        assert_eq!(record.field(), "");
    }

    #[test]
    fn test_display() {
        let record = ViolationRecord::new(["query", "page"], "Too small", ViolationCode::TooSmall);
        assert_eq!(record.to_string(), "query.page: Too small (too_small)");
    }
}
