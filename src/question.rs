use serde::Serialize;
use thiserror::Error;

pub const MIN_LENGTH: usize = 3;
pub const MAX_LENGTH: usize = 100;

/// Why a question was refused before it reached the network.
///
/// The `Display` text is exactly what is shown inline under the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a question")]
    Required,
    #[error("Min length is 3")]
    TooShort,
    #[error("Max length is 100")]
    TooLong,
}

/// A question that passed validation. Only `validate` builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rules are checked in order: required, minimum, maximum.
///
/// Lengths count characters, not bytes, and are taken on the text as typed.
pub fn validate(input: &str) -> Result<Question, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::Required);
    }

    let length = input.chars().count();
    if length < MIN_LENGTH {
        return Err(ValidationError::TooShort);
    }
    if length > MAX_LENGTH {
        return Err(ValidationError::TooLong);
    }

    Ok(Question(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank_are_required() {
        assert_eq!(validate(""), Err(ValidationError::Required));
        assert_eq!(validate("   \t "), Err(ValidationError::Required));
        assert_eq!(
            ValidationError::Required.to_string(),
            "Please enter a question"
        );
    }

    #[test]
    fn test_too_short() {
        let err = validate("Hi").unwrap_err();
        assert_eq!(err, ValidationError::TooShort);
        assert_eq!(err.to_string(), "Min length is 3");
    }

    #[test]
    fn test_too_long() {
        let input = "a".repeat(101);
        let err = validate(&input).unwrap_err();
        assert_eq!(err, ValidationError::TooLong);
        assert_eq!(err.to_string(), "Max length is 100");
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(validate("abc").is_ok());
        assert!(validate(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        // Three characters, nine bytes.
        assert!(validate("日本語").is_ok());
        assert_eq!(validate("日本"), Err(ValidationError::TooShort));
    }

    #[test]
    fn test_valid_question_keeps_text() {
        let question = validate("What is the capital of France?").unwrap();
        assert_eq!(question.as_str(), "What is the capital of France?");
    }
}
