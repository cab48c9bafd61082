//! beets passthrough. The tagger is a black box: its interactive prompts
//! must reach the operator's terminal unmodified, and only its exit code
//! matters to the pipeline.

use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use anyhow::{Result, bail};

use super::process::{run_interactive, with_sigint_ignored};
use crate::paths;

#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub import: bool,
    pub tag_only: bool,
    pub dry_run: bool,
    pub config: Option<PathBuf>,
}

pub fn run_organize(target: &Path, opts: &OrganizeOptions) -> Result<()> {
    if !target.exists() {
        bail!("path not found: {}", target.display());
    }

    let config = opts.config.clone().or_else(paths::default_beets_config);

    let mut cmd = ProcessCommand::new("beet");
    if let Some(config) = &config
        && config.is_file()
    {
        cmd.arg("-c").arg(config);
    }

    if opts.tag_only {
        println!("  beet write (tag-only) {}", target.display());
        cmd.arg("write");
        if !opts.dry_run {
            cmd.arg("--yes");
        }
        cmd.arg(target);
    } else {
        // Default and --import both run an incremental import; --incremental
        // makes already-imported directories a no-op.
        println!("  beet import {}", target.display());
        cmd.arg("import").arg("--incremental");
        if opts.dry_run {
            cmd.arg("--pretend");
        }
        cmd.arg(target);
    }

    let status = with_sigint_ignored(|| run_interactive(cmd, "beet"))?;
    if !status.success() {
        bail!("beet exited with {status}");
    }
    Ok(())
}
