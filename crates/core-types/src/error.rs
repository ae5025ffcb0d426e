use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unsupported PostgreSQL type `{0}`")]
    UnsupportedType(String),

    #[error("Array elements must share one type, found {first} and {other}")]
    MixedArray { first: &'static str, other: &'static str },

    #[error("Nested arrays are not supported")]
    NestedArray,

    #[error("Arrays of {0} are not supported")]
    UnsupportedArrayElement(&'static str),

    #[error("Number {0} cannot be represented as an integer or a float")]
    InvalidNumber(String),

    #[error("Failed to decode column `{column}`: {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}
