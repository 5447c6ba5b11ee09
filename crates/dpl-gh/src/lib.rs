//! GitHub CLI (`gh`) and `git` adapters.
//!
//! Implements the `dpl-core` secrets ports by shelling out with argument
//! vectors. Secret values are written to `gh`'s stdin, never passed as args.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use dpl_core::{
    errors::Error,
    process::{self, CliInvocation, CliOutput},
    repo::RepoSlug,
    secrets::{GitRemote, SecretsCli},
    Result,
};

#[derive(Clone, Debug)]
pub struct GhCli {
    program: PathBuf,
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new("gh")
    }
}

impl GhCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn invocation(&self) -> CliInvocation {
        CliInvocation::new(self.program.clone())
    }

    pub fn set_secret_invocation(&self, repo: &RepoSlug, name: &str) -> CliInvocation {
        self.invocation()
            .args(["secret", "set", name, "--repo"])
            .arg(repo.to_string())
    }

    pub fn list_secrets_invocation(&self, repo: &RepoSlug) -> CliInvocation {
        self.invocation()
            .args(["secret", "list", "--repo"])
            .arg(repo.to_string())
            .args(["--json", "name"])
    }

    async fn run_checked(&self, inv: &CliInvocation, stdin: Option<&str>) -> Result<CliOutput> {
        tracing::debug!(command = %inv.display(), "running gh");
        let out = process::run(inv, stdin).await?;
        if !out.success {
            return Err(Error::External(format!("gh {}", out.failure_detail())));
        }
        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct SecretEntry {
    name: String,
}

/// Parse `gh secret list --json name` output.
pub fn parse_secret_list(json: &str) -> Result<Vec<String>> {
    let entries: Vec<SecretEntry> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(|e| e.name).collect())
}

#[async_trait]
impl SecretsCli for GhCli {
    async fn version(&self) -> Result<String> {
        let out = self
            .run_checked(&self.invocation().arg("--version"), None)
            .await?;
        Ok(out.stdout.trim().to_string())
    }

    async fn auth_status(&self) -> Result<()> {
        self.run_checked(&self.invocation().args(["auth", "status"]), None)
            .await?;
        Ok(())
    }

    async fn set_secret(&self, repo: &RepoSlug, name: &str, value: &str) -> Result<()> {
        self.run_checked(&self.set_secret_invocation(repo, name), Some(value))
            .await?;
        Ok(())
    }

    async fn list_secrets(&self, repo: &RepoSlug) -> Result<Vec<String>> {
        let out = self
            .run_checked(&self.list_secrets_invocation(repo), None)
            .await?;
        parse_secret_list(&out.stdout)
    }
}

/// Reads `origin` through the `git` binary.
#[derive(Clone, Debug)]
pub struct GitCli {
    program: PathBuf,
    remote: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            remote: "origin".to_string(),
        }
    }
}

#[async_trait]
impl GitRemote for GitCli {
    async fn origin_url(&self) -> Result<String> {
        let inv = CliInvocation::new(self.program.clone()).args([
            "remote",
            "get-url",
            self.remote.as_str(),
        ]);
        let out = process::run(&inv, None).await?;
        if !out.success {
            return Err(Error::RepositoryResolution(format!(
                "git {}",
                out.failure_detail()
            )));
        }
        Ok(out.stdout.trim().to_string())
    }
}
