#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    #[error("schema {0} is not a valid JSON Schema: {1}")]
    SchemaMalformed(String, String),
    #[error("schema validation failed for {schema}: {errors:?}")]
    SchemaValidationFailure { schema: String, errors: Vec<String> },
    #[error("additional property not allowed by schema {schema}: {property}")]
    AdditionalPropertyNotAllowed { schema: String, property: String },
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}
