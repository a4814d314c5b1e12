//! Request schemas for the auth routes.

use missive_middleware::schema::{Check, FieldRule, ObjectShape, ValidationSchema};

/// Minimum password length on sign-up.
pub const MIN_PASSWORD_LEN: u32 = 8;

fn email_rule() -> FieldRule {
    FieldRule::string()
        .email()
        .with_message(Check::Format, "Invalid email address")
}

/// Body of `POST /signup`: `email`, `password` (8+ characters), `name`.
#[must_use]
pub fn sign_up_schema() -> ValidationSchema {
    ValidationSchema::parts().body(
        ObjectShape::new()
            .field("email", email_rule())
            .field(
                "password",
                FieldRule::string().min(MIN_PASSWORD_LEN).with_message(
                    Check::Min,
                    format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
                ),
            )
            .field(
                "name",
                FieldRule::string()
                    .min(1)
                    .with_message(Check::Min, "Name is required"),
            ),
    )
}

/// Body of `POST /signin`: `email` and a non-empty `password`.
#[must_use]
pub fn sign_in_schema() -> ValidationSchema {
    ValidationSchema::parts().body(
        ObjectShape::new().field("email", email_rule()).field(
            "password",
            FieldRule::string()
                .min(1)
                .with_message(Check::Min, "Password is required"),
        ),
    )
}

/// Body of a profile update: optional `name` and optional `image` URL.
#[must_use]
pub fn update_profile_schema() -> ValidationSchema {
    ValidationSchema::parts().body(
        ObjectShape::new()
            .field(
                "name",
                FieldRule::string()
                    .min(1)
                    .optional()
                    .with_message(Check::Min, "Name is required"),
            )
            .field(
                "image",
                FieldRule::string()
                    .url()
                    .optional()
                    .with_message(Check::Format, "Invalid image URL"),
            ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use missive_core::RequestParts;
    use serde_json::{json, Value};

    fn body(value: Value) -> RequestParts {
        RequestParts {
            body: value,
            query: json!({}),
            params: json!({}),
        }
    }

    fn messages(schema: &ValidationSchema, value: Value) -> Vec<(String, String)> {
        schema
            .validate(&body(value))
            .unwrap_err()
            .iter()
            .map(|v| (v.field(), v.message().to_string()))
            .collect()
    }

    #[test]
    fn test_sign_up_schema_messages() {
        let found = messages(
            &sign_up_schema(),
            json!({"email": "nope", "password": "short", "name": ""}),
        );
        assert_eq!(
            found,
            vec![
                ("body.email".to_string(), "Invalid email address".to_string()),
                (
                    "body.password".to_string(),
                    "Password must be at least 8 characters".to_string()
                ),
                ("body.name".to_string(), "Name is required".to_string()),
            ]
        );
    }

    #[test]
    fn test_sign_up_schema_accepts_valid_body() {
        let parts = sign_up_schema()
            .validate(&body(json!({
                "email": "ada@example.com",
                "password": "correct horse",
                "name": "Ada",
                "role": "admin"
            })))
            .unwrap();
        assert!(parts.body.get("role").is_none());
    }

    #[test]
    fn test_sign_in_schema_requires_password() {
        let found = messages(
            &sign_in_schema(),
            json!({"email": "ada@example.com", "password": ""}),
        );
        assert_eq!(
            found,
            vec![("body.password".to_string(), "Password is required".to_string())]
        );
    }

    #[test]
    fn test_update_profile_schema() {
        let schema = update_profile_schema();
        assert!(schema.validate(&body(json!({}))).is_ok());
        let found = messages(&schema, json!({"image": "not a url"}));
        assert_eq!(
            found,
            vec![("body.image".to_string(), "Invalid image URL".to_string())]
        );
    }
}
