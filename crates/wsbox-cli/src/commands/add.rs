//! `wsbox client add` command.

use std::path::Path;

use anyhow::{Context, Result};

use crate::opts::ClientOpts;

pub async fn cmd_add(opts: &ClientOpts, local: &Path, remote: Option<&str>) -> Result<()> {
    let remote = match remote {
        Some(remote) => remote.to_string(),
        None => local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive a remote name from '{}'", local.display()))?,
    };

    let client = opts.connect()?;
    let receipt = client
        .add(local, &remote)
        .await
        .with_context(|| format!("upload '{}'", local.display()))?;
    println!("upload done: {receipt}");
    Ok(())
}
