use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use crate::checkpoint::{Checkpoint, ResultEntry, TopSet, save_checkpoint, worker_snap_path};
use crate::corpus::Owner;
use crate::score::similarity;
use crate::types::{SearchOptions, WORKER_STACK_BYTES};

// polled by the progress display; exactness is not required
#[derive(Debug, Default)]
pub struct SearchProgress {
    pub pairs_done: AtomicU64,
    pub owners_claimed: AtomicUsize,
}

// every cross-owner pair among the owners from resume_index on
pub fn total_pairs(owners: &[Owner], resume_index: usize) -> u64 {
    let remaining = owners.iter().skip(resume_index);
    let total: u64 = remaining.clone().map(|o| o.files.len() as u64).sum();
    let mut pairs = 0u64;
    for owner in remaining {
        let n = owner.files.len() as u64;
        pairs += n * (total - n);
    }
    pairs / 2
}

// all-pairs search over the ranked owners; seed carries previously saved
// results and the position to resume from. the merged outcome is persisted
// to partial and total under target_dir before returning
pub fn run_search(
    owners: &[Owner],
    seed: Checkpoint,
    options: &SearchOptions,
    target_dir: &Path,
    progress: &SearchProgress,
) -> io::Result<Checkpoint> {
    let cursor = AtomicUsize::new(seed.resume_index);
    let threads = options.threads.max(1);

    let worker_sets = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let cursor = &cursor;
            let builder = thread::Builder::new().stack_size(WORKER_STACK_BYTES);
            let handle = builder.spawn_scoped(scope, move || {
                run_worker(owners, worker_id, options, target_dir, cursor, progress)
            })?;
            handles.push(handle);
        }
        handles
            .into_iter()
            .map(|handle| handle.join().expect("search worker panicked"))
            .collect::<io::Result<Vec<_>>>()
    })?;

    let mut merged = seed;
    for (hi, lo) in worker_sets {
        merged.hi.extend(hi);
        merged.lo.extend(lo);
    }
    merged.resume_index = owners.len();
    save_checkpoint(
        &target_dir.join("partial"),
        merged.resume_index,
        &merged.hi,
        &merged.lo,
    )?;
    save_checkpoint(
        &target_dir.join("total"),
        merged.resume_index,
        &merged.hi,
        &merged.lo,
    )?;
    Ok(merged)
}

fn run_worker(
    owners: &[Owner],
    worker_id: usize,
    options: &SearchOptions,
    target_dir: &Path,
    cursor: &AtomicUsize,
    progress: &SearchProgress,
) -> io::Result<(TopSet, TopSet)> {
    let snap_path = worker_snap_path(target_dir, worker_id);
    let mut hi = TopSet::new();
    let mut lo = TopSet::new();
    let mut last_snap = Instant::now();

    loop {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        if index >= owners.len() {
            break;
        }
        progress.owners_claimed.fetch_max(index + 1, Ordering::Relaxed);
        // snapshot before touching the claimed owner: its pairs are not in
        // this file yet, so the recorded index is safe to resume from
        if last_snap.elapsed() > options.snap_interval {
            last_snap = Instant::now();
            save_checkpoint(&snap_path, index, &hi, &lo)?;
        }

        let first = &owners[index];
        for second in &owners[index + 1..] {
            if let Some(entry) = best_pair(first, second, options) {
                let bucket = if index < options.cutoff { &mut hi } else { &mut lo };
                bucket.insert(entry);
            }
            progress
                .pairs_done
                .fetch_add((first.files.len() * second.files.len()) as u64, Ordering::Relaxed);
        }
    }
    tracing::debug!(worker_id, "worker drained the owner queue");
    save_checkpoint(&snap_path, owners.len(), &hi, &lo)?;
    Ok((hi, lo))
}

// a pair only counts when it reaches the template score of both files
// involved; ties keep the first maximum
fn best_pair(first: &Owner, second: &Owner, options: &SearchOptions) -> Option<ResultEntry> {
    let mut best: Option<ResultEntry> = None;
    for a in &first.files {
        for b in &second.files {
            let score =
                similarity(&a.file, &b.file, options.space_weight, options.max_pair_tokens);
            if score < a.template_score || score < b.template_score {
                continue;
            }
            if best.as_ref().is_none_or(|current| score > current.score) {
                best = Some(ResultEntry {
                    score,
                    path_a: a.file.path.clone(),
                    path_b: b.file.path.clone(),
                });
            }
        }
    }
    best
}
