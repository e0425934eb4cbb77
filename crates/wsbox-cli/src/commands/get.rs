//! `wsbox client get` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::opts::ClientOpts;

pub async fn cmd_get(opts: &ClientOpts, remote: &str, local: Option<&Path>) -> Result<()> {
    let local = match local {
        Some(local) => local.to_path_buf(),
        None => default_local(remote)
            .with_context(|| format!("cannot derive a local name from '{remote}'"))?,
    };

    let client = opts.connect()?;
    client
        .get(remote, &local)
        .await
        .with_context(|| format!("download '{remote}'"))?;
    println!("download done -> {}", local.display());
    Ok(())
}

/// Last segment of the remote path.
fn default_local(remote: &str) -> Option<PathBuf> {
    remote
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(PathBuf::from)
}
