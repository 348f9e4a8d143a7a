//! Domain error types.

/// Top-level error type for crossbt.
#[derive(Debug, thiserror::Error)]
pub enum CrossbtError {
    #[error("no data for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("insufficient history: have {bars} bars, need {required}")]
    InsufficientHistory { bars: usize, required: usize },

    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CrossbtError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        CrossbtError::InvalidParameters {
            reason: reason.into(),
        }
    }

    pub fn unavailable(ticker: &str, reason: impl Into<String>) -> Self {
        CrossbtError::DataUnavailable {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&CrossbtError> for std::process::ExitCode {
    fn from(err: &CrossbtError) -> Self {
        let code: u8 = match err {
            CrossbtError::Io(_) | CrossbtError::Csv(_) | CrossbtError::Report { .. } => 1,
            CrossbtError::ConfigParse { .. }
            | CrossbtError::ConfigMissing { .. }
            | CrossbtError::ConfigInvalid { .. } => 2,
            CrossbtError::DataUnavailable { .. } => 3,
            CrossbtError::InvalidParameters { .. } => 4,
            CrossbtError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_message() {
        let err = CrossbtError::InsufficientHistory {
            bars: 12,
            required: 30,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history: have 12 bars, need 30"
        );
    }

    #[test]
    fn unavailable_helper_names_ticker() {
        let err = CrossbtError::unavailable("AAPL", "empty range");
        assert!(matches!(
            &err,
            CrossbtError::DataUnavailable { ticker, .. } if ticker == "AAPL"
        ));
        assert_eq!(err.to_string(), "no data for AAPL: empty range");
    }

    #[test]
    fn invalid_helper_wraps_reason() {
        let err = CrossbtError::invalid("fast must be below slow");
        assert_eq!(
            err.to_string(),
            "invalid parameters: fast must be below slow"
        );
    }

    #[test]
    fn exit_codes_distinguish_categories() {
        use std::process::ExitCode;

        let cases = [
            (CrossbtError::invalid("x"), ExitCode::from(4)),
            (
                CrossbtError::InsufficientHistory {
                    bars: 1,
                    required: 2,
                },
                ExitCode::from(5),
            ),
            (CrossbtError::unavailable("X", "y"), ExitCode::from(3)),
            (
                CrossbtError::ConfigMissing {
                    section: "backtest".into(),
                    key: "ticker".into(),
                },
                ExitCode::from(2),
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(
                format!("{:?}", ExitCode::from(err)),
                format!("{:?}", expected),
                "{err}"
            );
        }
    }
}
