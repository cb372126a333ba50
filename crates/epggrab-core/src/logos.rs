//! Channel logo retrieval.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use epggrab_api::feed::LocalFeedApi;
use tracing::{debug, info, warn};

/// Per-run cache of channel logos stored as `<dir>/<channel>.png`.
///
/// Every channel is resolved at most once per run; a failure is remembered
/// as "no logo".
#[derive(Debug, Clone)]
pub struct LogoCache {
    dir: PathBuf,
    resolved: BTreeMap<String, Option<PathBuf>>,
}

impl LogoCache {
    /// Creates a cache backed by `dir`. The directory is created on the
    /// first download.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            resolved: BTreeMap::new(),
        }
    }

    /// Logo directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the logo of `channel`, downloading it if not on disk yet.
    pub async fn resolve<A: LocalFeedApi>(&mut self, api: &A, channel: &str) -> Option<&Path> {
        if !self.resolved.contains_key(channel) {
            let logo = match self.locate_or_download(api, channel).await {
                Ok(logo) => logo,
                Err(e) => {
                    warn!(channel, error = %format!("{e:#}"), "no logo for channel");
                    None
                }
            };
            self.resolved.insert(channel.to_owned(), logo);
        }
        self.get(channel)
    }

    /// Returns the logo already resolved for `channel` in this run.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&Path> {
        self.resolved.get(channel)?.as_deref()
    }

    /// Resolves a logo from disk only, without any network access.
    pub fn resolve_local(&mut self, channel: &str) -> Option<&Path> {
        if !self.resolved.contains_key(channel) {
            let logo = self
                .logo_path(channel)
                .ok()
                .filter(|path| path.is_file())
                .map(absolute);
            self.resolved.insert(channel.to_owned(), logo);
        }
        self.get(channel)
    }

    async fn locate_or_download<A: LocalFeedApi>(
        &self,
        api: &A,
        channel: &str,
    ) -> Result<Option<PathBuf>> {
        let path = self.logo_path(channel)?;
        if path.is_file() {
            debug!(channel, path = %path.display(), "reusing logo");
            return Ok(Some(absolute(path)));
        }

        let Some(png) = api.fetch_logo(channel).await? else {
            debug!(channel, "no logo published");
            return Ok(None);
        };

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        std::fs::write(&path, &png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(channel, path = %path.display(), bytes = png.len(), "downloaded logo");
        Ok(Some(absolute(path)))
    }

    fn logo_path(&self, channel: &str) -> Result<PathBuf> {
        if channel.is_empty()
            || channel.contains(['/', '\\'])
            || channel.contains("..")
        {
            bail!("channel id is not a safe file name: {channel:?}");
        }
        Ok(self.dir.join(format!("{channel}.png")))
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}
