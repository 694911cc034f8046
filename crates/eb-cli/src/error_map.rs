use eb_core::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode value: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{engine} {workload} returned {actual}, expected {expected}")]
    Mismatch {
        engine: String,
        workload: String,
        expected: i64,
        actual: i64,
    },
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bridge(error) => error.code(),
            Self::Io(_) => "CLI_IO",
            Self::Json(_) => "CLI_JSON",
            Self::Mismatch { .. } => "BENCH_MISMATCH",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Bridge(error) => error.message.clone(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn emit_error(error: CliError) -> i32 {
    tracing::debug!(code = error.code(), %error, "command failed");
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code());
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message())
            .unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    1
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(CliError::from(BridgeError::syntax("failed")));
        assert_eq!(code, 1);
    }

    #[test]
    fn codes_follow_the_error_source() {
        assert_eq!(
            CliError::from(BridgeError::timeout("slow")).code(),
            "SCRIPT_TIMEOUT"
        );
        assert_eq!(
            CliError::from(BridgeError::timeout("slow")).message(),
            "slow"
        );
        assert_eq!(CliError::from(std::io::Error::other("io")).code(), "CLI_IO");

        let mismatch = CliError::Mismatch {
            engine: "rhai".to_string(),
            workload: "sum".to_string(),
            expected: 4_999_950_000,
            actual: 0,
        };
        assert_eq!(mismatch.code(), "BENCH_MISMATCH");
        assert_eq!(
            mismatch.message(),
            "rhai sum returned 0, expected 4999950000"
        );
    }
}
