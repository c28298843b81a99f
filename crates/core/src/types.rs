use std::time::Duration;

pub const MAX_RESULTS: usize = 500;
pub const TEMPLATE_SCORE_CUTOFF: f32 = 95.0;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 32 * 1024;
pub const DEFAULT_MAX_PAIR_TOKENS: usize = 30_000;
pub const DEFAULT_SPACE_WEIGHT: f32 = 0.3;
// rename recursion goes one frame per chain entry and chains reach 15 001
// entries at the pair-token cap; the platform default stack cannot hold that
pub const WORKER_STACK_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub cutoff: usize,
    pub threads: usize,
    pub space_weight: f32,
    pub max_pair_tokens: usize,
    pub max_file_bytes: u64,
    pub template_cutoff: f32,
    pub snap_interval: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            cutoff: 0,
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            space_weight: DEFAULT_SPACE_WEIGHT,
            max_pair_tokens: DEFAULT_MAX_PAIR_TOKENS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            template_cutoff: TEMPLATE_SCORE_CUTOFF,
            snap_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub loaded_files: u64,
    pub skipped_too_large: u64,
    pub skipped_unreadable: u64,
    pub missing_owner_dirs: u64,
    pub walk_errors: u64,
    pub excluded_as_template: u64,
}
