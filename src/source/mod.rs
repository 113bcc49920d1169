//! Feed sources and their cache files.
//!
//! Each [`Source`] is one upstream endpoint whose response is stored as a
//! blob file `<NAME>.source` in the cache directory. Access to a source's
//! file is serialized through [`SourceLocks`].

mod lock;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

pub use lock::{LockHolder, SourceGuard, SourceLocks};

/// Suffix of cached blob files.
pub const FILE_SUFFIX: &str = ".source";

/// Number of [`Source`] variants.
pub const SOURCE_COUNT: usize = 11;

/// One upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    Home,
    News,
    Inland,
    Ausland,
    Wirtschaft,
    Sport,
    Video,
    Investigativ,
    Wissen,
    Regional,
    Channels,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown source: {0}")]
pub struct UnknownSource(pub String);

impl Source {
    pub const ALL: [Source; SOURCE_COUNT] = [
        Source::Home,
        Source::News,
        Source::Inland,
        Source::Ausland,
        Source::Wirtschaft,
        Source::Sport,
        Source::Video,
        Source::Investigativ,
        Source::Wissen,
        Source::Regional,
        Source::Channels,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Source::Home => "HOME",
            Source::News => "NEWS",
            Source::Inland => "INLAND",
            Source::Ausland => "AUSLAND",
            Source::Wirtschaft => "WIRTSCHAFT",
            Source::Sport => "SPORT",
            Source::Video => "VIDEO",
            Source::Investigativ => "INVESTIGATIV",
            Source::Wissen => "WISSEN",
            Source::Regional => "REGIONAL",
            Source::Channels => "CHANNELS",
        }
    }

    /// Dense index, used for per-source tables.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// `HOME.source`, `REGIONAL.source`, ...
    pub fn file_name(self) -> String {
        format!("{}{}", self.name(), FILE_SUFFIX)
    }

    /// Recovers the source from a cache file name.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        file_name.strip_suffix(FILE_SUFFIX)?.parse().ok()
    }

    /// Location of this source's blob inside `cache_dir`.
    pub fn cache_path(self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.file_name())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = UnknownSource;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Source::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}
