//! Checks that only look at the local working tree.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use log::*;
use regex::bytes::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::error::{CheckExecutionError, ConfigError};

/// Version control metadata is not part of the submission.
const VCS_DIR: &str = ".git";
/// Files are read in chunks of this size, so large binaries such as demo
/// videos are never held in memory whole.
const READ_CHUNK: usize = 64 * 1024;

pub fn file_exists(root: &Path, relative: &str) -> bool {
  root.join(relative).is_file()
}

pub fn dir_exists(root: &Path, relative: &str) -> bool {
  root.join(relative).is_dir()
}

/// A top-level directory and the subdirectories it must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRequirement {
  pub dir: String,
  pub children: Vec<String>,
}

impl FromStr for DirectoryRequirement {
  type Err = ConfigError;

  /// Parses `dir` or `dir=child1,child2`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (dir, children) = match s.split_once('=') {
      Some((dir, children)) => (dir.trim(), children),
      None => (s.trim(), ""),
    };

    if dir.is_empty() {
      return Err(ConfigError::InvalidLayout(s.to_string()));
    }

    let children: Vec<String> = children
      .split(',')
      .map(str::trim)
      .filter(|c| !c.is_empty())
      .map(String::from)
      .collect();

    Ok(DirectoryRequirement {
      dir: dir.to_string(),
      children,
    })
  }
}

/// The expected folder layout of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout(pub Vec<DirectoryRequirement>);

impl Default for FolderLayout {
  fn default() -> Self {
    FolderLayout(vec![
      DirectoryRequirement {
        dir: "artifacts".to_string(),
        children: vec!["demo".to_string()],
      },
      DirectoryRequirement {
        dir: "code".to_string(),
        children: Vec::new(),
      },
    ])
  }
}

/// True iff every required directory exists along with all of its required
/// children.
pub fn folder_structure_ok(root: &Path, layout: &FolderLayout) -> bool {
  for requirement in &layout.0 {
    let dir_path = root.join(&requirement.dir);
    if !dir_path.is_dir() {
      debug!("Missing directory: {}", requirement.dir);
      return false;
    }

    for child in &requirement.children {
      if !dir_path.join(child).is_dir() {
        debug!("Missing directory: {}/{}", requirement.dir, child);
        return false;
      }
    }
  }

  true
}

fn is_vcs_metadata(entry: &DirEntry) -> bool {
  entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == VCS_DIR
}

/// Every regular file under `root`, skipping version control metadata.
fn tree_files(root: &Path) -> impl Iterator<Item = Result<DirEntry, walkdir::Error>> {
  WalkDir::new(root)
    .into_iter()
    .filter_entry(|e| !is_vcs_metadata(e))
    .filter(|e| match e {
      Ok(entry) => entry.file_type().is_file(),
      Err(_) => true,
    })
}

fn open(path: &Path) -> io::Result<BufReader<File>> {
  Ok(BufReader::with_capacity(READ_CHUNK, File::open(path)?))
}

/// Streams `path` through `pattern`. The last `overlap` bytes of each chunk
/// are carried into the next one so a match split across chunks is found.
fn stream_contains(path: &Path, pattern: &Regex, overlap: usize) -> io::Result<bool> {
  let mut reader = open(path)?;
  let mut window = Vec::with_capacity(READ_CHUNK + overlap);

  loop {
    let chunk = reader.fill_buf()?;
    if chunk.is_empty() {
      return Ok(false);
    }

    window.extend_from_slice(chunk);
    let consumed = chunk.len();
    reader.consume(consumed);

    if pattern.is_match(&window) {
      return Ok(true);
    }

    let keep = overlap.min(window.len());
    window.drain(..window.len() - keep);
  }
}

/// Returns `true` when none of `markers` appears in any file of the tree.
pub fn no_secrets_found(root: &Path, markers: &[String]) -> Result<bool, CheckExecutionError> {
  let markers: Vec<&str> = markers
    .iter()
    .map(String::as_str)
    .filter(|m| !m.is_empty())
    .collect();

  let Some(longest) = markers.iter().map(|m| m.len()).max() else {
    return Ok(true);
  };

  let alternation: Vec<String> = markers.iter().map(|m| regex::escape(m)).collect();
  let pattern = Regex::new(&alternation.join("|"))?;

  for entry in tree_files(root) {
    let entry = entry?;
    let found = stream_contains(entry.path(), &pattern, longest - 1).map_err(|source| {
      CheckExecutionError::Io {
        path: entry.path().to_path_buf(),
        source,
      }
    })?;

    if found {
      warn!("Secret marker found in {}", entry.path().display());
      return Ok(false);
    }
  }

  Ok(true)
}

/// Lines of text in a tree, plus how many files could not be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocCount {
  pub lines: u64,
  pub skipped_files: u64,
}

/// Counts lines across every UTF-8 file in the tree. Files that cannot be
/// read or decoded are skipped and tallied rather than reported as errors.
pub fn count_lines(root: &Path) -> LocCount {
  let mut count = LocCount::default();

  for entry in tree_files(root) {
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) => {
        debug!("Skipping unreadable entry: {}", e);
        count.skipped_files += 1;
        continue;
      }
    };

    match text_lines(entry.path()) {
      Some(lines) => count.lines += lines,
      None => {
        debug!("Skipping undecodable file: {}", entry.path().display());
        count.skipped_files += 1;
      }
    }
  }

  count
}

/// Number of lines in a UTF-8 text file, or `None` if it cannot be read or
/// is not valid UTF-8. A trailing newline does not start another line.
fn text_lines(path: &Path) -> Option<u64> {
  let mut reader = open(path).ok()?;
  let mut line = Vec::new();
  let mut lines = 0;

  loop {
    line.clear();
    if reader.read_until(b'\n', &mut line).ok()? == 0 {
      return Some(lines);
    }
    std::str::from_utf8(&line).ok()?;
    lines += 1;
  }
}
