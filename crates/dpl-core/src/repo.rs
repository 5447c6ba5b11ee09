use std::{fmt, sync::OnceLock};

use regex::Regex;

use crate::{errors::Error, Result};

/// GitHub repository identifier (`owner/name`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn github_remote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"github\.com[:/]([^/]+)/(.+?)(\.git)?$").expect("valid regex"))
}

/// Parse a git remote URL (ssh or https form) into `owner/name`.
pub fn parse_github_remote(url: &str) -> Result<RepoSlug> {
    let url = url.trim();
    let caps = github_remote_re()
        .captures(url)
        .ok_or_else(|| Error::RepositoryResolution(format!("unrecognized remote URL: {url}")))?;

    Ok(RepoSlug {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}
