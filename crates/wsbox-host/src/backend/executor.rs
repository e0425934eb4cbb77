use std::path::PathBuf;

use axum::http::StatusCode;
use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::ExecError;
use crate::protocol::{Method, RequestFrame, ResponseFrame};
use crate::sandbox::{SandboxRoot, secure_create_dir};

/// Tracing target for per-request audit records.
pub const AUDIT_TARGET: &str = "wsbox::audit";

#[derive(Debug, Serialize)]
struct UploadReceipt {
    written_bytes: u64,
}

/// Performs LIST, GET and PUT against paths resolved under the sandbox root.
#[derive(Debug, Clone)]
pub struct Executor {
    root: SandboxRoot,
}

impl Executor {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    pub async fn execute(&self, client: &str, request: RequestFrame) -> ResponseFrame {
        match request.method {
            Method::List => self.list(client, &request.path).await,
            Method::Get => self.get(client, &request.path).await,
            Method::Put => {
                let payload = request.payload.unwrap_or_default();
                self.put(client, &request.path, &payload).await
            }
            Method::Other(token) => rejected(client, &token, ExecError::MethodNotAllowed),
        }
    }

    /// Enumerate the immediate children of `dir`; directories carry a
    /// trailing `/`. The body is a JSON array of names.
    pub async fn list(&self, client: &str, dir: &str) -> ResponseFrame {
        let dir = if dir.is_empty() { "/" } else { dir };
        match self.try_list(dir).await {
            Ok(names) => match serde_json::to_vec(&names) {
                Ok(body) => {
                    audited(client, "LIST", format!("dir={dir} count={}", names.len()));
                    ResponseFrame::new(StatusCode::OK.as_u16(), body)
                }
                Err(err) => rejected(client, "LIST", ExecError::io("encode listing", err.into())),
            },
            Err(err) => rejected(client, "LIST", err),
        }
    }

    pub async fn get(&self, client: &str, path: &str) -> ResponseFrame {
        match self.try_get(path).await {
            Ok(content) => {
                audited(client, "DOWNLOAD", format!("file={path} size={}", content.len()));
                ResponseFrame::new(StatusCode::OK.as_u16(), content)
            }
            Err(err) => rejected(client, "DOWNLOAD", err),
        }
    }

    /// Create or truncate `path` and write `payload` to it. Missing parent
    /// directories are created under the directory policy.
    pub async fn put(&self, client: &str, path: &str, payload: &[u8]) -> ResponseFrame {
        match self.try_put(path, payload).await {
            Ok(written_bytes) => match serde_json::to_vec(&UploadReceipt { written_bytes }) {
                Ok(body) => {
                    audited(client, "UPLOAD", format!("file={path} size={written_bytes}"));
                    ResponseFrame::new(StatusCode::CREATED.as_u16(), body)
                }
                Err(err) => rejected(client, "UPLOAD", ExecError::io("encode receipt", err.into())),
            },
            Err(err) => rejected(client, "UPLOAD", err),
        }
    }

    async fn try_list(&self, dir: &str) -> Result<Vec<String>, ExecError> {
        let real = self.root.resolve(dir)?;
        let metadata = match tokio::fs::metadata(&real).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExecError::NotFound(format!("directory not found: {dir}")));
            }
            Err(err) => return Err(ExecError::io(format!("stat '{dir}'"), err)),
        };
        if !metadata.is_dir() {
            return Err(ExecError::NotADirectory);
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&real)
            .await
            .map_err(|err| ExecError::io(format!("read dir '{dir}'"), err))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|err| ExecError::io(format!("read dir '{dir}'"), err))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();
        Ok(entries)
    }

    async fn try_get(&self, path: &str) -> Result<Bytes, ExecError> {
        let real = self.root.resolve(path)?;
        match tokio::fs::metadata(&real).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(ExecError::NotFound(format!("not found: {path}"))),
        }
        let content = tokio::fs::read(&real)
            .await
            .map_err(|err| ExecError::io(format!("read '{path}'"), err))?;
        Ok(Bytes::from(content))
    }

    async fn try_put(&self, path: &str, payload: &[u8]) -> Result<u64, ExecError> {
        let real = self.root.resolve(path)?;
        let Some(parent) = self.upload_parent(&real) else {
            return Err(ExecError::BadRequest(format!(
                "path '{path}' does not name a file"
            )));
        };
        secure_create_dir(&self.root, &parent).await?;

        let mut file = tokio::fs::File::create(&real)
            .await
            .map_err(|err| ExecError::io(format!("create file '{path}'"), err))?;
        file.write_all(payload)
            .await
            .map_err(|err| ExecError::io(format!("write body '{path}'"), err))?;
        file.flush()
            .await
            .map_err(|err| ExecError::io(format!("write body '{path}'"), err))?;
        Ok(payload.len() as u64)
    }

    fn upload_parent(&self, real: &std::path::Path) -> Option<PathBuf> {
        if real == self.root.path() {
            return None;
        }
        real.parent().map(|parent| parent.to_path_buf())
    }
}

fn audited(client: &str, action: &str, event: String) {
    tracing::info!(target: AUDIT_TARGET, client, action, "{event}");
}

fn rejected(client: &str, action: &str, err: ExecError) -> ResponseFrame {
    let status = err.status();
    tracing::warn!(target: AUDIT_TARGET, client, action, status = status.as_u16(), "{err}");
    ResponseFrame::message(status.as_u16(), err.to_string())
}
