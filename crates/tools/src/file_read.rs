//! File read tool: reads a text file from inside the sandbox root.

use agentrelay_core::context::ToolContext;
use agentrelay_core::error::ToolError;
use agentrelay_core::tool::{ParamType, Parameter, Tool, ToolArgs, ToolOutput};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::sandbox::Sandbox;

pub struct FileReadTool {
    sandbox: Sandbox,
    params: Vec<Parameter>,
}

impl FileReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox: Sandbox::new(root),
            params: vec![Parameter::required(
                "path",
                ParamType::String,
                "Path of the file to read, relative to the working directory",
            )],
        }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file."
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    async fn call(&self, _ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("path must be a string".into()))?;

        let resolved = self
            .sandbox
            .resolve(path)
            .map_err(|reason| ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason,
            })?;

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => {
                debug!(path = %resolved.display(), bytes = content.len(), "file read");
                Ok(ToolOutput::success(content))
            }
            Err(e) => Ok(ToolOutput::error(format!("failed to read {path}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{args, context};

    #[tokio::test]
    async fn reads_file_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "Hello, world!\n").unwrap();
        let (ctx, _events) = context();

        let tool = FileReadTool::new(dir.path());
        let out = tool
            .call(&ctx, args(serde_json::json!({"path": "hello.txt"})))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.result, "Hello, world!\n");
    }

    #[tokio::test]
    async fn missing_file_is_a_failed_output() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _events) = context();

        let out = FileReadTool::new(dir.path())
            .call(&ctx, args(serde_json::json!({"path": "nope.txt"})))
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.error.contains("failed to read nope.txt"));
    }

    #[tokio::test]
    async fn escaping_the_root_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _events) = context();

        let err = FileReadTool::new(dir.path())
            .call(&ctx, args(serde_json::json!({"path": "../../etc/passwd"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
        assert!(err.to_string().contains("path escapes sandbox root"));
    }
}
