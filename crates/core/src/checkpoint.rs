use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::MAX_RESULTS;

// paths must not contain whitespace or the text format cannot be read back
#[derive(Debug, Clone)]
pub struct ResultEntry {
    pub score: f32,
    pub path_a: String,
    pub path_b: String,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.path_a.cmp(&other.path_a))
            .then_with(|| self.path_b.cmp(&other.path_b))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ResultEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ResultEntry {}

// inserting past the cap evicts the current minimum; identical entries
// collapse, which is what makes re-merging checkpoints after a resume safe
#[derive(Debug, Default, Clone)]
pub struct TopSet {
    entries: BTreeSet<ResultEntry>,
}

impl TopSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ResultEntry) {
        self.entries.insert(entry);
        while self.entries.len() > MAX_RESULTS {
            self.entries.pop_first();
        }
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ResultEntry>) {
        for entry in entries {
            self.insert(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // highest score first
    pub fn iter_desc(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter().rev()
    }
}

impl IntoIterator for TopSet {
    type Item = ResultEntry;
    type IntoIter = std::collections::btree_set::IntoIter<ResultEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(Debug, Default, Clone)]
pub struct Checkpoint {
    pub resume_index: usize,
    pub hi: TopSet,
    pub lo: TopSet,
}

pub fn worker_snap_path(target_dir: &Path, worker_id: usize) -> PathBuf {
    target_dir.join(format!("snap{worker_id}"))
}

// serialize to a *_temp sibling, sync, then rename over the target: a
// crash leaves either the old file or the new one, never a torn write
pub fn save_checkpoint(
    path: &Path,
    resume_index: usize,
    hi: &TopSet,
    lo: &TopSet,
) -> io::Result<()> {
    let temp = temp_path(path);
    {
        let file = File::create(&temp)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{} {} {}", resume_index, hi.len(), lo.len())?;
        for entry in hi.iter_desc() {
            writeln!(out, "{} {} {}", entry.score, entry.path_a, entry.path_b)?;
        }
        for entry in lo.iter_desc() {
            writeln!(out, "{} {} {}", entry.score, entry.path_a, entry.path_b)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&temp, path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push("_temp");
    path.with_file_name(name)
}

pub fn load_checkpoint(path: &Path) -> io::Result<Checkpoint> {
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(invalid("empty checkpoint file")),
    };
    let mut fields = header.split_whitespace();
    let resume_index = parse_header_field(fields.next(), "resume index")?;
    let hi_count: usize = parse_header_field(fields.next(), "hi count")?;
    let lo_count: usize = parse_header_field(fields.next(), "lo count")?;

    let mut checkpoint = Checkpoint {
        resume_index,
        ..Checkpoint::default()
    };
    for _ in 0..hi_count {
        checkpoint.hi.insert(read_entry(&mut lines)?);
    }
    for _ in 0..lo_count {
        checkpoint.lo.insert(read_entry(&mut lines)?);
    }
    Ok(checkpoint)
}

fn read_entry(lines: &mut impl Iterator<Item = io::Result<String>>) -> io::Result<ResultEntry> {
    let line = match lines.next() {
        Some(line) => line?,
        None => return Err(invalid("truncated checkpoint file")),
    };
    let mut fields = line.split_whitespace();
    let score = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| invalid(format!("bad checkpoint entry: {line:?}")))?;
    let path_a = fields
        .next()
        .ok_or_else(|| invalid(format!("bad checkpoint entry: {line:?}")))?
        .to_string();
    let path_b = fields
        .next()
        .ok_or_else(|| invalid(format!("bad checkpoint entry: {line:?}")))?
        .to_string();
    Ok(ResultEntry {
        score,
        path_a,
        path_b,
    })
}

fn parse_header_field<T: std::str::FromStr>(field: Option<&str>, what: &str) -> io::Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| invalid(format!("bad checkpoint header: missing {what}")))
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

// merges every snap* file plus partial; the resume index is the minimum
// over all files, so no owner pair claimed but not yet flushed by some
// worker is skipped. *_temp leftovers of interrupted writes are ignored
pub fn load_saved_state(target_dir: &Path) -> io::Result<Checkpoint> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(target_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with("snap") && name != "partial" {
            continue;
        }
        if name.ends_with("_temp") {
            tracing::warn!(file = name, "ignoring leftover of an interrupted checkpoint write");
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    let mut resume_index: Option<usize> = None;
    let mut merged = Checkpoint::default();
    for path in paths {
        tracing::info!(path = %path.display(), "loading checkpoint");
        let checkpoint = load_checkpoint(&path)?;
        resume_index = Some(match resume_index {
            Some(current) => current.min(checkpoint.resume_index),
            None => checkpoint.resume_index,
        });
        merged.hi.extend(checkpoint.hi);
        merged.lo.extend(checkpoint.lo);
    }
    merged.resume_index = resume_index.unwrap_or(0);
    Ok(merged)
}

// checkpoints remember absolute paths; when the best retained entry is not
// under source_dir the saved state belongs to a different corpus. returns
// the directory the saved state points at
pub fn foreign_source_dir(checkpoint: &Checkpoint, source_dir: &Path) -> Option<String> {
    let entry = checkpoint.hi.iter_desc().next()?;
    let prefix = source_dir.to_string_lossy();
    if entry.path_a.starts_with(prefix.as_ref()) {
        return None;
    }
    let recorded = Path::new(&entry.path_a);
    let dir = recorded
        .parent()
        .and_then(Path::parent)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| entry.path_a.clone());
    Some(dir)
}
