use thiserror::Error;

/// Errors produced while parsing a resource id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
  #[error("resource id must start with `/`")]
  MissingLeadingSlash,

  #[error("resource id is missing the `{key}` segment")]
  MissingSegment { key: &'static str },

  #[error("expected segment `{expected}` but found `{found}`")]
  UnexpectedSegment { expected: &'static str, found: String },

  #[error("segment `{key}` has an empty value")]
  EmptyValue { key: &'static str },

  #[error("unsupported provider namespace `{found}`")]
  UnexpectedProvider { found: String },

  #[error("resource id has unexpected trailing segments: `{rest}`")]
  TrailingSegments { rest: String },
}
