use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Which stream a generated line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Stdout,
    Stderr,
}

/// Callback invoked for each line of output as it is produced
pub type OutputCallback = Arc<dyn Fn(&str, OutputType) + Send + Sync>;

/// Output captured from a generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Generated text (stdout for CLI backends, message content for HTTP)
    pub text: String,
    /// Diagnostic output, empty for HTTP backends
    pub stderr: String,
    /// Exit code from the process (0 for HTTP backends)
    pub exit_code: i32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl AgentOutput {
    pub fn new(text: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            text,
            stderr,
            exit_code,
            duration,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last few lines of stderr, for error messages
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail() {
        let output = AgentOutput::new(
            String::new(),
            "one\ntwo\nthree\nfour".into(),
            1,
            Duration::from_millis(10),
        );
        assert_eq!(output.stderr_tail(2), "three\nfour");
        assert_eq!(output.stderr_tail(10), "one\ntwo\nthree\nfour");
        assert!(!output.success());
    }
}
