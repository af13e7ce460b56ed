use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// First line of a session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,
    pub document_type: String,
    pub jurisdiction: Option<String>,
    pub document_sha256: String,
    pub document_chars: usize,
    pub critic_agent: String,
    pub refiner_agent: String,
    pub critic_model: Option<String>,
    pub refiner_model: Option<String>,
    pub max_iterations: usize,
    pub quality_threshold: f64,
    pub min_improvement: f64,
}

/// One refine pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIteration {
    pub index: usize,
    pub score: f64,
    pub score_delta: f64,
    pub issues: usize,
    pub missing_sections: Vec<String>,
    pub input_chars: usize,
    pub output_chars: usize,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

/// Last line of a session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnd {
    pub stop_reason: String,
    pub converged: bool,
    pub iterations: usize,
    pub passes: usize,
    pub final_score: Option<f64>,
    pub final_text: String,
    pub protected_field_violation: Option<String>,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

/// Each line type in the session JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart(SessionStart),
    Iteration(SessionIteration),
    SessionEnd(SessionEnd),
}

/// Writes one refinement run as JSONL under `$XDG_DATA_HOME/redraft/sessions/`.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
    run_id: String,
}

impl SessionWriter {
    /// Open a session file in the default sessions directory
    pub fn new(document: &str) -> io::Result<Self> {
        Self::in_dir(&Self::sessions_dir()?, document)
    }

    /// Open a session file in `dir`. The file name combines the UTC start
    /// time, a short hash of the document and the run id.
    pub fn in_dir(dir: &Path, document: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let run_id = Uuid::new_v4().to_string();
        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
        let hash = document_hash(document);

        let filename = format!("{}_{}_{}.jsonl", timestamp_str, &hash[..6], &run_id[..8]);
        let path = dir.join(filename);

        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
            run_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn write_start(&self, start: SessionStart) {
        self.write_line(&SessionLine::SessionStart(start));
    }

    pub fn write_iteration(&self, iteration: SessionIteration) {
        self.write_line(&SessionLine::Iteration(iteration));
    }

    pub fn write_end(&self, end: SessionEnd) {
        self.write_line(&SessionLine::SessionEnd(end));
    }

    fn write_line(&self, line: &SessionLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    pub fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("redraft").join("sessions"))
    }
}

/// Hex-encoded SHA-256 of a document
pub fn document_hash(document: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(run_id: &str, document: &str) -> SessionStart {
        SessionStart {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            source: Some("letter.md".to_string()),
            document_type: "engagement letter".to_string(),
            jurisdiction: Some("California".to_string()),
            document_sha256: document_hash(document),
            document_chars: document.chars().count(),
            critic_agent: "Claude Code".to_string(),
            refiner_agent: "Claude Code".to_string(),
            critic_model: None,
            refiner_model: Some("sonnet".to_string()),
            max_iterations: 3,
            quality_threshold: 0.85,
            min_improvement: 0.05,
        }
    }

    #[test]
    fn test_session_file_lines() {
        let dir = tempfile::tempdir().unwrap();
        let document = "Dear Sir, we will represent you.";
        let writer = SessionWriter::in_dir(dir.path(), document).unwrap();

        let name = writer.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jsonl"));
        assert!(name.contains(&document_hash(document)[..6]));
        assert!(name.contains(&writer.run_id()[..8]));

        writer.write_start(start(writer.run_id(), document));
        writer.write_iteration(SessionIteration {
            index: 1,
            score: 0.5,
            score_delta: 0.0,
            issues: 2,
            missing_sections: vec!["Scope of Representation".to_string()],
            input_chars: 32,
            output_chars: 120,
            duration_secs: 1.5,
            timestamp: Utc::now(),
        });
        writer.write_end(SessionEnd {
            stop_reason: "quality_met".to_string(),
            converged: true,
            iterations: 1,
            passes: 2,
            final_score: Some(0.9),
            final_text: "Dear Ms. Patel".to_string(),
            protected_field_violation: None,
            duration_secs: 3.0,
            timestamp: Utc::now(),
        });

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<SessionLine> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert!(matches!(&lines[0], SessionLine::SessionStart(s) if s.max_iterations == 3));
        assert!(matches!(&lines[1], SessionLine::Iteration(i) if i.index == 1));
        assert!(matches!(&lines[2], SessionLine::SessionEnd(e) if e.converged));

        let raw: serde_json::Value =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(raw["type"], "session_start");
        assert_eq!(raw["document_type"], "engagement letter");
    }

    #[test]
    fn test_same_document_gets_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = SessionWriter::in_dir(dir.path(), "same").unwrap();
        let b = SessionWriter::in_dir(dir.path(), "same").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
