//! `wsbox client list` command.

use anyhow::{Context, Result};

use crate::opts::ClientOpts;
use crate::output::render_tree;

pub async fn cmd_list(opts: &ClientOpts, dir: &str) -> Result<()> {
    let client = opts.connect()?;
    let names = client
        .list(dir)
        .await
        .with_context(|| format!("list '{dir}'"))?;
    print!("{}", render_tree(&names, dir));
    Ok(())
}
