//! Archive discovery and member enumeration
//!
//! Finds the zip archives of an input folder in filename order and yields
//! the selected members of each archive, in the archive's own ordering,
//! as `(archive_id, member_name, text)` triples.

use crate::config::CtdConfig;
use crate::constants::ARCHIVE_EXTENSION;
use crate::error::{CtdError, Result};
use glob::{MatchOptions, Pattern};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Enumerates source archives under an input path
#[derive(Debug, Clone)]
pub struct SourceWalker {
    root: PathBuf,
    member_patterns: Arc<[Pattern]>,
}

impl SourceWalker {
    /// Create a walker over a folder of archives or a single archive
    pub fn new(root: impl Into<PathBuf>, config: &CtdConfig) -> Result<Self> {
        let member_patterns = config
            .member_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| CtdError::Configuration {
                    message: format!("invalid member pattern '{}': {}", pattern, e),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            member_patterns: member_patterns.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive paths sorted by file name
    pub fn discover_archives(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(CtdError::InputNotFound {
                path: self.root.clone(),
            });
        }

        if self.root.is_file() {
            return Ok(if is_archive(&self.root) {
                vec![self.root.clone()]
            } else {
                Vec::new()
            });
        }

        let mut archives = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_archive(entry.path()) {
                archives.push(entry.into_path());
            }
        }

        debug!(
            "Found {} archives in {}",
            archives.len(),
            self.root.display()
        );
        Ok(archives)
    }

    /// Open one archive for member enumeration
    pub fn open(&self, path: &Path) -> Result<SourceArchive> {
        SourceArchive::open(path, Arc::clone(&self.member_patterns))
    }
}

/// Archive id derived from the file name
pub fn archive_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Check if a path has the archive extension, ignoring case
fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// An open zip archive
pub struct SourceArchive {
    id: String,
    zip: ZipArchive<File>,
    member_patterns: Arc<[Pattern]>,
}

impl std::fmt::Debug for SourceArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceArchive")
            .field("id", &self.id)
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl SourceArchive {
    fn open(path: &Path, member_patterns: Arc<[Pattern]>) -> Result<Self> {
        let id = archive_id(path);
        let file = File::open(path).map_err(|e| CtdError::archive_read(&id, e))?;
        let zip = ZipArchive::new(file).map_err(|e| CtdError::archive_read(&id, e))?;

        Ok(Self {
            id,
            zip,
            member_patterns,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of entries in the archive, directories included
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Lazily read the selected members in archive order
    pub fn members(&mut self) -> Members<'_> {
        Members {
            archive: self,
            next: 0,
            ignored: 0,
        }
    }
}

/// Members are matched on their file name, ignoring directories and case
fn is_selected(patterns: &[Pattern], name: &str) -> bool {
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let file_name = name.rsplit('/').next().unwrap_or(name);
    patterns
        .iter()
        .any(|pattern| pattern.matches_with(file_name, options))
}

/// Text of one archive member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMember {
    pub archive_id: String,
    pub name: String,
    pub text: String,
}

/// Iterator over the selected members of an archive
#[derive(Debug)]
pub struct Members<'a> {
    archive: &'a mut SourceArchive,
    next: usize,
    ignored: usize,
}

impl Members<'_> {
    /// Files skipped because no member pattern matched them
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    fn read(&mut self, index: usize) -> Result<Option<SourceMember>> {
        let archive_id = self.archive.id.clone();
        let mut entry = self
            .archive
            .zip
            .by_index(index)
            .map_err(|e| CtdError::archive_read(&archive_id, e))?;

        if !entry.is_file() {
            return Ok(None);
        }

        let name = entry.name().to_string();
        if !is_selected(&self.archive.member_patterns, &name) {
            debug!("Ignoring member {} of {}", name, archive_id);
            self.ignored += 1;
            return Ok(None);
        }

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| CtdError::archive_read(&archive_id, format!("{}: {}", name, e)))?;

        let text = String::from_utf8_lossy(&bytes);
        Ok(Some(SourceMember {
            archive_id,
            name,
            text: text.trim_start_matches('\u{feff}').to_string(),
        }))
    }
}

impl Iterator for Members<'_> {
    type Item = Result<SourceMember>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.archive.zip.len() {
            let index = self.next;
            self.next += 1;
            match self.read(index) {
                Ok(Some(member)) => return Some(Ok(member)),
                Ok(None) => continue,
                Err(e) => {
                    // A damaged entry ends the archive
                    self.next = self.archive.zip.len();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
