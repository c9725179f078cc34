//! Encrypt subcommand for the conftree CLI
//!
//! Produces values for `${decrypt(...)}` with the master key from
//! `CONFTREE_MASTER_KEY` or `CONFTREE_MASTER_KEY_PATH`.

use crate::function::{MasterKey, encrypt};
use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;

/// Arguments for the encrypt subcommand
#[derive(Args, Debug, Clone)]
pub struct EncryptArgs {
    /// Value to encrypt
    #[arg(required_unless_present = "generate_key")]
    pub plaintext: Option<String>,

    /// Print a new random base64 master key instead
    #[arg(long, conflicts_with = "plaintext")]
    pub generate_key: bool,
}

/// Run the subcommand against an environment snapshot.
pub fn run(args: &EncryptArgs, env: &BTreeMap<String, String>) -> Result<String> {
    if args.generate_key {
        return Ok(MasterKey::generate().to_base64());
    }
    let plaintext = args.plaintext.as_deref().unwrap_or_default();
    let key = MasterKey::from_env(env).context("Cannot encrypt without a master key")?;
    Ok(encrypt(&key, plaintext)?)
}
