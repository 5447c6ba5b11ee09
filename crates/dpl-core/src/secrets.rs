//! Secrets configurator: push local configuration to GitHub Actions secrets.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::SecretsConfig,
    errors::Error,
    repo::{parse_github_remote, RepoSlug},
    Result,
};

const GH_INSTALL_HINT: &str = "Please install it first: https://cli.github.com/";
const GH_LOGIN_HINT: &str = "Please run: gh auth login";

/// Port for the git-hosting CLI (`gh`).
#[async_trait]
pub trait SecretsCli: Send + Sync {
    /// `gh --version`; an error means the tool is unusable.
    async fn version(&self) -> Result<String>;
    /// `gh auth status`; an error means there is no valid session.
    async fn auth_status(&self) -> Result<()>;
    async fn set_secret(&self, repo: &RepoSlug, name: &str, value: &str) -> Result<()>;
    async fn list_secrets(&self, repo: &RepoSlug) -> Result<Vec<String>>;
}

/// Port for reading the version-control remote.
#[async_trait]
pub trait GitRemote: Send + Sync {
    async fn origin_url(&self) -> Result<String>;
}

/// Outcome of the best-effort read-back after writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    AllPresent(Vec<String>),
    Missing(Vec<String>),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigureReport {
    pub repo: RepoSlug,
    pub set: Vec<String>,
    pub verification: Verification,
}

pub struct SecretsConfigurator {
    cli: Arc<dyn SecretsCli>,
    git: Arc<dyn GitRemote>,
}

impl SecretsConfigurator {
    pub fn new(cli: Arc<dyn SecretsCli>, git: Arc<dyn GitRemote>) -> Self {
        Self { cli, git }
    }

    /// Check the CLI, resolve the repo, set every secret, then read them back.
    ///
    /// A failing `set` aborts the loop; secrets already written stay written.
    pub async fn run(&self, cfg: &SecretsConfig) -> Result<ConfigureReport> {
        self.ensure_cli_ready().await?;
        let repo = self.resolve_repo().await?;

        println!("🔧 Configuring GitHub Secrets");
        println!("📦 Repository: {repo}\n");

        let mut set = Vec::with_capacity(cfg.secrets.len());
        for (name, value) in &cfg.secrets {
            self.cli
                .set_secret(&repo, name, value)
                .await
                .map_err(|e| Error::External(format!("Failed to set secret {name}: {e}")))?;
            println!("✅ Set secret: {name}");
            set.push(name.clone());
        }
        println!("\n✅ All secrets configured successfully!");

        let verification = self.verify(&repo, &cfg.names()).await;
        Ok(ConfigureReport {
            repo,
            set,
            verification,
        })
    }

    async fn ensure_cli_ready(&self) -> Result<()> {
        match self.cli.version().await {
            Ok(v) => tracing::debug!(version = %v.lines().next().unwrap_or(""), "gh found"),
            Err(e) => {
                tracing::debug!(error = %e, "gh --version failed");
                return Err(Error::MissingDependency {
                    tool: "GitHub CLI (gh)".to_string(),
                    hint: GH_INSTALL_HINT.to_string(),
                });
            }
        }

        if let Err(e) = self.cli.auth_status().await {
            tracing::debug!(error = %e, "gh auth status failed");
            return Err(Error::NotAuthenticated {
                tool: "GitHub CLI".to_string(),
                hint: GH_LOGIN_HINT.to_string(),
            });
        }
        Ok(())
    }

    async fn resolve_repo(&self) -> Result<RepoSlug> {
        let url = self.git.origin_url().await.map_err(|e| match e {
            Error::RepositoryResolution(_) => e,
            other => Error::RepositoryResolution(other.to_string()),
        })?;
        parse_github_remote(&url)
    }

    async fn verify(&self, repo: &RepoSlug, required: &[String]) -> Verification {
        println!("\n🔍 Verifying secrets...");
        let listed = match self.cli.list_secrets(repo).await {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "⚠️  Could not verify secrets");
                return Verification::Failed(e.to_string());
            }
        };

        let (present, missing): (Vec<String>, Vec<String>) = required
            .iter()
            .cloned()
            .partition(|name| listed.iter().any(|l| l == name));

        if missing.is_empty() {
            println!("✅ All required secrets are configured:");
            for name in &present {
                println!("   ✓ {name}");
            }
            Verification::AllPresent(present)
        } else {
            println!("⚠️  Some secrets might be missing:");
            for name in &missing {
                println!("   ✗ {name}");
            }
            Verification::Missing(missing)
        }
    }
}
