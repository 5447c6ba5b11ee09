use std::path::Path;

use async_trait::async_trait;

use crate::{domain::ServerDescriptor, Result};

/// Remote host port: pull a file over scp, delete it over ssh.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Copy `remote_path` from the server into `local_path`.
    ///
    /// Failures are reported as `Error::Transfer`.
    async fn download(
        &self,
        server: &ServerDescriptor,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<()>;

    /// Delete `remote_path` on the server.
    async fn remove(&self, server: &ServerDescriptor, remote_path: &str) -> Result<()>;
}
