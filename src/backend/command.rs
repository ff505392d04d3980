// External-program backend
// Writes the request as JSON on stdin and reads an artifact as JSON from stdout

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::backend::{Backend, BackendError, GenerateRequest, GenerationKind};
use crate::domain::{Artifact, ArtifactFile};

/// Shape of the program's stdout
#[derive(Debug, Deserialize)]
struct CommandOutput {
    #[serde(default)]
    summary: String,
    files: Vec<ArtifactFile>,
}

/// Backend that delegates generation to an external program
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Get the program
    pub fn program(&self) -> &str {
        &self.program
    }

    fn parse_output(request: &GenerateRequest, stdout: &[u8]) -> Result<Artifact, BackendError> {
        let output: CommandOutput =
            serde_json::from_slice(stdout).map_err(|e| BackendError::InvalidOutput(e.to_string()))?;
        if output.files.is_empty() {
            return Err(BackendError::InvalidOutput("no files in output".to_string()));
        }

        let task_id = match request.kind {
            GenerationKind::Improvement => None,
            _ => Some(request.task.id.clone()),
        };
        Ok(Artifact::new(task_id, output.summary, output.files).with_revision(request.next_revision()))
    }
}

#[async_trait]
impl Backend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Artifact, BackendError> {
        let input = serde_json::to_vec(request).map_err(|e| BackendError::Failed(e.to_string()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("CommandBackend: spawning {} for {}", self.program, request.task.id);
        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Failed(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        Self::parse_output(request, &output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    fn request() -> GenerateRequest {
        GenerateRequest::fresh(
            "run-1",
            Task::new(0, "add a lexer", vec!["lexer handles comments".to_string()], "command"),
        )
    }

    #[test]
    fn test_parse_output() {
        let stdout = br#"{"summary":"lexer","files":[{"path":"src/lexer.rs","content":"fn lex() {}"}]}"#;
        let artifact = CommandBackend::parse_output(&request(), stdout).unwrap();
        assert_eq!(artifact.task_id.as_deref(), Some("task-001"));
        assert_eq!(artifact.files.len(), 1);
        assert_eq!(artifact.revision, 0);
    }

    #[test]
    fn test_parse_output_rejects_garbage() {
        let result = CommandBackend::parse_output(&request(), b"not json");
        assert!(matches!(result, Err(BackendError::InvalidOutput(_))));

        let result = CommandBackend::parse_output(&request(), br#"{"files":[]}"#);
        assert!(matches!(result, Err(BackendError::InvalidOutput(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_via_shell() {
        let script = r#"cat > /dev/null; echo '{"summary":"ok","files":[{"path":"a.rs","content":"x"}]}'"#;
        let backend = CommandBackend::new("sh", vec!["-c".to_string(), script.to_string()]);
        let artifact = backend.generate(&request()).await.unwrap();
        assert_eq!(artifact.summary, "ok");
        assert_eq!(artifact.files[0].path, "a.rs");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_nonzero_exit() {
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo boom >&2; exit 3".to_string()],
        );
        match backend.generate(&request()).await {
            Err(BackendError::Failed(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_not_retryable() {
        let backend = CommandBackend::new("/nonexistent/tandem-backend", vec![]);
        let err = backend.generate(&request()).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
