//! Construction-time configuration for a [`crate::Resolver`].
//!
//! All paths are validated up front and threaded into the resolver; there
//! is no process-wide mutable state.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// File locations the resolver is built from. The root-hints file is
/// read-only after load; the cache file is rewritten on close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub root_hints: PathBuf,
    pub cache: PathBuf,
    /// Trace log destination. `None` sends trace logs to standard output.
    pub log_file: Option<PathBuf>,
}

impl ResolverConfig {
    pub fn new(root_hints: &Path, cache: &Path) -> Result<Self> {
        Ok(Self {
            root_hints: absolute(root_hints)?,
            cache: absolute(cache)?,
            log_file: None,
        })
    }

    pub fn with_log_file(mut self, path: &Path) -> Result<Self> {
        self.log_file = Some(absolute(path)?);
        Ok(self)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Err(Error::NotAbsolutePath(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_relative_paths() {
        assert!(matches!(
            ResolverConfig::new(Path::new("hints.conf"), Path::new("/tmp/cache.conf")),
            Err(Error::NotAbsolutePath(_))
        ));
        assert!(matches!(
            ResolverConfig::new(Path::new("/tmp/hints.conf"), Path::new("cache.conf")),
            Err(Error::NotAbsolutePath(_))
        ));

        let config =
            ResolverConfig::new(Path::new("/tmp/hints.conf"), Path::new("/tmp/cache.conf"))
                .unwrap();
        assert!(matches!(
            config.with_log_file(Path::new("trace.log")),
            Err(Error::NotAbsolutePath(_))
        ));
    }

    #[test]
    fn test_accepts_absolute_paths() {
        let config =
            ResolverConfig::new(Path::new("/tmp/hints.conf"), Path::new("/tmp/cache.conf"))
                .unwrap()
                .with_log_file(Path::new("/tmp/trace.log"))
                .unwrap();
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/trace.log")));
    }
}
