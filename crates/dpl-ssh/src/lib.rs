//! SSH adapter (`sshpass` + `scp` / `ssh`).
//!
//! Implements the `dpl-core` `RemoteHost` port. The password reaches `sshpass`
//! through the child's `SSHPASS` environment variable (`sshpass -e`), so it
//! never shows up in the process list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use dpl_core::{
    domain::ServerDescriptor,
    errors::Error,
    process::{self, CliInvocation},
    remote::RemoteHost,
    Result,
};

#[derive(Clone, Debug)]
pub struct SshRemote {
    sshpass: PathBuf,
    strict_host_key_checking: bool,
}

impl Default for SshRemote {
    fn default() -> Self {
        Self::new(false)
    }
}

impl SshRemote {
    pub fn new(strict_host_key_checking: bool) -> Self {
        Self {
            sshpass: PathBuf::from("sshpass"),
            strict_host_key_checking,
        }
    }

    fn host_key_option(&self) -> String {
        let v = if self.strict_host_key_checking {
            "yes"
        } else {
            "no"
        };
        format!("StrictHostKeyChecking={v}")
    }

    fn base(&self, server: &ServerDescriptor, tool: &str) -> CliInvocation {
        CliInvocation::new(self.sshpass.clone())
            .args(["-e", tool])
            .env("SSHPASS", server.password.clone())
    }

    /// `sshpass -e scp -P <port> -o StrictHostKeyChecking=.. user@host:<remote> <local>`
    pub fn download_invocation(
        &self,
        server: &ServerDescriptor,
        remote_path: &str,
        local_path: &Path,
    ) -> CliInvocation {
        self.base(server, "scp")
            .args(["-P", server.port.as_str(), "-o"])
            .arg(self.host_key_option())
            .arg(format!("{}@{}:{}", server.user, server.host, remote_path))
            .arg(local_path.display().to_string())
    }

    /// `sshpass -e ssh -p <port> -o StrictHostKeyChecking=.. user@host rm -f -- '<remote>'`
    pub fn remove_invocation(&self, server: &ServerDescriptor, remote_path: &str) -> CliInvocation {
        self.base(server, "ssh")
            .args(["-p", server.port.as_str(), "-o"])
            .arg(self.host_key_option())
            .arg(format!("{}@{}", server.user, server.host))
            .arg(format!("rm -f -- {}", shell_quote(remote_path)))
    }
}

/// Single-quote `s` for a POSIX shell on the remote side.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[async_trait]
impl RemoteHost for SshRemote {
    async fn download(
        &self,
        server: &ServerDescriptor,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<()> {
        let inv = self.download_invocation(server, remote_path, local_path);
        tracing::debug!(command = %inv.display(), "running scp");
        let out = process::run(&inv, None)
            .await
            .map_err(|e| Error::Transfer(format!("failed to start sshpass: {e}")))?;
        if !out.success {
            return Err(Error::Transfer(format!("scp {}", out.failure_detail())));
        }
        Ok(())
    }

    async fn remove(&self, server: &ServerDescriptor, remote_path: &str) -> Result<()> {
        let inv = self.remove_invocation(server, remote_path);
        tracing::debug!(command = %inv.display(), "running ssh");
        let out = process::run(&inv, None).await?;
        if !out.success {
            return Err(Error::External(format!("ssh {}", out.failure_detail())));
        }
        Ok(())
    }
}
