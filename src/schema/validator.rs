//! A single compiled JSON Schema, compiled once and reused for every
//! message that declares it.
use jsonschema::JSONSchema;
use serde_json::Value;

use super::Error;

pub struct SchemaValidator {
    name: String,
    compiled: JSONSchema,
}

impl SchemaValidator {
    pub fn compile(name: impl Into<String>, schema: &Value) -> Result<Self, Error> {
        let name = name.into();
        let compiled = JSONSchema::compile(schema)
            .map_err(|e| Error::SchemaMalformed(name.clone(), e.to_string()))?;
        Ok(SchemaValidator { name, compiled })
    }

    pub fn validate(&self, instance: &Value) -> Result<(), Error> {
        if let Err(errors) = self.compiled.validate(instance) {
            let mut messages = Vec::new();
            let mut additional_property = None;
            for error in errors {
                let message = error.to_string();
                if additional_property.is_none() && message.contains("Additional properties are not allowed")
                {
                    additional_property = extract_quoted(&message);
                }
                messages.push(message);
            }
            if let Some(property) = additional_property {
                return Err(Error::AdditionalPropertyNotAllowed { schema: self.name.clone(), property });
            }
            return Err(Error::SchemaValidationFailure { schema: self.name.clone(), errors: messages });
        }
        Ok(())
    }
}

/// Best-effort extraction of the first `'...'`-quoted token in a jsonschema
/// error message, used to name the offending property without depending on
/// the crate's internal error-kind representation.
fn extract_quoted(message: &str) -> Option<String> {
    let start = message.find('\'')? + 1;
    let end = message[start..].find('\'')? + start;
    Some(message[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_instance_passes() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"],
            "additionalProperties": false,
        });
        let validator = SchemaValidator::compile("person", &schema).unwrap();
        assert!(validator.validate(&json!({"name": "alice"})).is_ok());
    }

    #[test]
    fn missing_required_property_fails() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"],
        });
        let validator = SchemaValidator::compile("person", &schema).unwrap();
        assert!(validator.validate(&json!({})).is_err());
    }

    #[test]
    fn additional_property_is_named_in_the_error() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "additionalProperties": false,
        });
        let validator = SchemaValidator::compile("person", &schema).unwrap();
        let err = validator.validate(&json!({"name": "alice", "extra": true})).unwrap_err();
        match err {
            Error::AdditionalPropertyNotAllowed { property, .. } => assert_eq!(property, "extra"),
            other => panic!("expected AdditionalPropertyNotAllowed, got {other:?}"),
        }
    }
}
