use thiserror::Error;

/// Core error taxonomy.
///
/// An infeasible charging plan is deliberately NOT represented here: it is a
/// valid plan with `is_feasible = false` and a warning, and callers branch on
/// that field instead of catching an error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient training data: {available} usable rows, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("demand model not trained")]
    ModelNotTrained,

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Collaborator (store) or internal failures, surfaced as-is.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InsufficientData {
            available: 50,
            required: 100,
        };
        assert_eq!(
            err.to_string(),
            "insufficient training data: 50 usable rows, need at least 100"
        );

        assert_eq!(
            CoreError::ModelNotTrained.to_string(),
            "demand model not trained"
        );
    }

    #[test]
    fn test_validation_errors_convert() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(range(min = 0.0, max = 100.0))]
            soc: f64,
        }

        let err: CoreError = Probe { soc: 140.0 }.validate().unwrap_err().into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
