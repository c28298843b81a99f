use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

use ignore::WalkBuilder;

use crate::score::similarity;
use crate::tokenize::{SymbolTable, TokenFile};
use crate::types::{CorpusStats, SearchOptions, WORKER_STACK_BYTES};

// owners keep their ranking position even when their directory is missing,
// so resume indices and the review cutoff stay stable across runs
#[derive(Debug)]
pub struct Owner {
    pub name: String,
    pub files: Vec<ScoredFile>,
}

#[derive(Debug)]
pub struct ScoredFile {
    pub file: TokenFile,
    pub template_score: f32,
}

pub fn total_files(owners: &[Owner]) -> u64 {
    owners.iter().map(|owner| owner.files.len() as u64).sum()
}

// ranking file: whitespace-separated owner names, best placed first
pub fn read_ranking(path: &Path) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}

pub fn load_corpus(
    source_dir: &Path,
    ranking: &[String],
    resume_index: usize,
    options: &SearchOptions,
    symbols: &mut SymbolTable,
    stats: &mut CorpusStats,
) -> io::Result<Vec<Owner>> {
    let mut owners = Vec::with_capacity(ranking.len());
    for (index, name) in ranking.iter().enumerate() {
        let mut owner = Owner {
            name: name.clone(),
            files: Vec::new(),
        };
        // owners already covered by the saved state stay empty; their pairs
        // are all represented in the loaded checkpoints
        if index >= resume_index {
            let dir = source_dir.join(name);
            if dir.is_dir() {
                for path in list_files(&dir, stats) {
                    if let Some(file) = load_file(&path, options, symbols, stats) {
                        owner.files.push(ScoredFile {
                            file,
                            template_score: 0.0,
                        });
                    }
                }
            } else {
                tracing::warn!(owner = %name, dir = %dir.display(), "owner directory missing");
                stats.missing_owner_dirs = stats.missing_owner_dirs.saturating_add(1);
            }
        }
        owners.push(owner);
    }
    Ok(owners)
}

// template files carry a flag that lets them score against any submission
// regardless of group
pub fn load_templates(
    template_dir: &Path,
    options: &SearchOptions,
    symbols: &mut SymbolTable,
    stats: &mut CorpusStats,
) -> io::Result<Vec<TokenFile>> {
    let mut templates = Vec::new();
    for path in list_files(template_dir, stats) {
        if let Some(mut file) = load_file(&path, options, symbols, stats) {
            file.is_template = true;
            templates.push(file);
        }
    }
    Ok(templates)
}

fn load_file(
    path: &Path,
    options: &SearchOptions,
    symbols: &mut SymbolTable,
    stats: &mut CorpusStats,
) -> Option<TokenFile> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => return skip_unreadable(path, &err, stats),
    };
    if metadata.len() > options.max_file_bytes {
        tracing::warn!(
            path = %path.display(),
            size = metadata.len(),
            limit = options.max_file_bytes,
            "skipping oversized file"
        );
        stats.skipped_too_large = stats.skipped_too_large.saturating_add(1);
        return None;
    }
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => return skip_unreadable(path, &err, stats),
    };
    let text = String::from_utf8_lossy(&bytes);
    stats.loaded_files = stats.loaded_files.saturating_add(1);
    Some(TokenFile::parse(path.to_string_lossy(), &text, symbols))
}

// one unreadable file must not end the run
fn skip_unreadable(path: &Path, err: &io::Error, stats: &mut CorpusStats) -> Option<TokenFile> {
    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
    stats.skipped_unreadable = stats.skipped_unreadable.saturating_add(1);
    None
}

fn list_files(dir: &Path, stats: &mut CorpusStats) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let walker = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .standard_filters(false)
        .build();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                stats.walk_errors = stats.walk_errors.saturating_add(1);
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        if entry.file_type().is_some_and(|ft| ft.is_file()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    paths
}

// drops submissions that are mostly boilerplate and remembers the best
// template score of each survivor; the search later requires a pair to beat
// both files' scores. templates are judged on tokens alone
pub fn screen_templates(
    owners: &mut [Owner],
    templates: &[TokenFile],
    resume_index: usize,
    options: &SearchOptions,
    files_done: &AtomicU64,
    stats: &mut CorpusStats,
) -> io::Result<()> {
    if templates.is_empty() {
        return Ok(());
    }

    let cursor = AtomicUsize::new(resume_index);
    let threads = options.threads.max(1);
    let scored: Vec<(usize, Vec<f32>)> = {
        let shared: &[Owner] = owners;
        thread::scope(|scope| -> io::Result<Vec<(usize, Vec<f32>)>> {
            let mut handles = Vec::with_capacity(threads);
            for _ in 0..threads {
                let cursor = &cursor;
                let builder = thread::Builder::new().stack_size(WORKER_STACK_BYTES);
                let handle = builder.spawn_scoped(scope, move || {
                    let mut out = Vec::new();
                    loop {
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        if index >= shared.len() {
                            break;
                        }
                        let owner = &shared[index];
                        let mut scores = Vec::with_capacity(owner.files.len());
                        for entry in &owner.files {
                            let mut best = 0.0f32;
                            for template in templates {
                                let score = similarity(
                                    &entry.file,
                                    template,
                                    0.0,
                                    options.max_pair_tokens,
                                );
                                best = best.max(score);
                            }
                            scores.push(best);
                            files_done.fetch_add(1, Ordering::Relaxed);
                        }
                        out.push((index, scores));
                    }
                    out
                })?;
                handles.push(handle);
            }
            Ok(handles
                .into_iter()
                .flat_map(|handle| handle.join().expect("template screening worker panicked"))
                .collect())
        })
    }?;

    for (index, scores) in scored {
        let owner = &mut owners[index];
        for (entry, score) in owner.files.iter_mut().zip(&scores) {
            entry.template_score = *score;
        }
        let before = owner.files.len();
        owner
            .files
            .retain(|entry| entry.template_score <= options.template_cutoff);
        let excluded = (before - owner.files.len()) as u64;
        if excluded > 0 {
            tracing::debug!(owner = %owner.name, excluded, "excluded template-like submissions");
        }
        stats.excluded_as_template = stats.excluded_as_template.saturating_add(excluded);
    }
    Ok(())
}
