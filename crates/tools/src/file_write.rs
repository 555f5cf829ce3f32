//! File write tool: creates or overwrites a file inside the sandbox root.

use agentrelay_core::context::ToolContext;
use agentrelay_core::error::ToolError;
use agentrelay_core::tool::{ParamType, Parameter, Tool, ToolArgs, ToolOutput};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::sandbox::Sandbox;

pub struct FileWriteTool {
    sandbox: Sandbox,
    params: Vec<Parameter>,
}

impl FileWriteTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox: Sandbox::new(root),
            params: vec![
                Parameter::required("path", ParamType::String, "Path of the file to write"),
                Parameter::required("content", ParamType::String, "Full content of the file"),
            ],
        }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and missing directories, overwrites an existing file."
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    async fn call(&self, _ctx: &ToolContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let (Some(path), Some(content)) = (
            args.get("path").and_then(|v| v.as_str()),
            args.get("content").and_then(|v| v.as_str()),
        ) else {
            return Err(ToolError::InvalidArguments(
                "path and content must be strings".into(),
            ));
        };

        let resolved = self
            .sandbox
            .resolve(path)
            .map_err(|reason| ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason,
            })?;

        if let Some(parent) = resolved.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolOutput::error(format!("failed to create directory: {e}")));
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => {
                debug!(path = %resolved.display(), bytes = content.len(), "file written");
                Ok(ToolOutput::success(format!(
                    "wrote {} bytes to {path}",
                    content.len()
                )))
            }
            Err(e) => Ok(ToolOutput::error(format!("failed to write {path}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{args, context};

    #[tokio::test]
    async fn writes_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _events) = context();

        let out = FileWriteTool::new(dir.path())
            .call(
                &ctx,
                args(serde_json::json!({"path": "deep/nested/out.txt", "content": "hi"})),
            )
            .await
            .unwrap();
        assert!(out.success, "{}", out.error);
        assert_eq!(out.result, "wrote 2 bytes to deep/nested/out.txt");
        let written = std::fs::read_to_string(dir.path().join("deep/nested/out.txt")).unwrap();
        assert_eq!(written, "hi");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "old").unwrap();
        let (ctx, _events) = context();

        FileWriteTool::new(dir.path())
            .call(&ctx, args(serde_json::json!({"path": "f.txt", "content": "new"})))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn escaping_the_root_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _events) = context();

        let err = FileWriteTool::new(dir.path().join("inner"))
            .call(&ctx, args(serde_json::json!({"path": "../x.txt", "content": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path escapes sandbox root"));
        assert!(!dir.path().join("x.txt").exists());
    }
}
