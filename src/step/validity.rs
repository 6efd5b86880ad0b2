//! Deciding whether an existing output has to be produced again.

use crate::Result;
use eyre::WrapErr;
use regex::Regex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const TAIL_CHUNK: u64 = 8 * 1024;

/// The redo policy for one output.
///
/// An output is stale when overwrite is forced, when it does not exist, when it is smaller
/// than `threshold` bytes, or when its last non-blank line does not match `marker`. With
/// overwrite forced the file is never inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedoPolicy<'a> {
    pub overwrite: bool,
    pub threshold: Option<u64>,
    pub marker: Option<&'a Regex>,
}

impl RedoPolicy<'_> {
    pub fn is_stale(&self, output: &Path) -> Result<bool> {
        if self.overwrite {
            return Ok(true);
        }
        let Ok(metadata) = output.metadata() else {
            return Ok(true);
        };
        if let Some(threshold) = self.threshold
            && metadata.len() < threshold
        {
            trace!(
                "{}: {} bytes is below {threshold}",
                output.display(),
                metadata.len()
            );
            return Ok(true);
        }
        if let Some(marker) = self.marker
            && metadata.is_file()
        {
            let complete = last_line_with_content(output)?
                .map(|line| marker.is_match(&line))
                .unwrap_or(false);
            return Ok(!complete);
        }
        Ok(false)
    }
}

/// The last line of `path` that holds anything besides whitespace, trimmed.
///
/// Only the tail of the file is read, growing the window until a whole line is found.
pub fn last_line_with_content(path: &Path) -> Result<Option<String>> {
    let mut file =
        File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let len = file.metadata()?.len();
    let mut window = TAIL_CHUNK;
    loop {
        let start = len.saturating_sub(window);
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut buf)?;
        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end();
        match text.rfind('\n') {
            Some(i) => return Ok(Some(text[i + 1..].trim().to_string())),
            None if start == 0 => {
                return Ok((!text.trim().is_empty()).then(|| text.trim().to_string()));
            }
            None => window *= 2,
        }
    }
}

/// Swap the extension after the last `.` of the file name for `ending`.
///
/// `ending` may be given with or without its leading dot. A name without an extension gets
/// `ending` appended.
pub fn replace_file_ending<P: AsRef<Path>>(path: P, ending: &str) -> PathBuf {
    let ending = ending.strip_prefix('.').unwrap_or(ending);
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name.as_str(),
    };
    path.with_file_name(format!("{stem}.{ending}"))
}
