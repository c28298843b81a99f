mod align;
mod checkpoint;
mod corpus;
mod rename;
mod score;
mod search;
mod tokenize;
mod types;

pub use align::{Alignment, Diff, align, edit_dist};

pub use checkpoint::{
    Checkpoint, ResultEntry, TopSet, foreign_source_dir, load_checkpoint, load_saved_state,
    save_checkpoint, worker_snap_path,
};

pub use corpus::{
    Owner, ScoredFile, load_corpus, load_templates, read_ranking, screen_templates, total_files,
};

pub use rename::rename_dist;

pub use score::similarity;

pub use search::{SearchProgress, run_search, total_pairs};

pub use tokenize::{PUNCTUATION, SymbolId, SymbolTable, TokenFile, punct_text};

pub use types::{
    CorpusStats, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_PAIR_TOKENS, DEFAULT_SPACE_WEIGHT,
    MAX_RESULTS, SearchOptions, TEMPLATE_SCORE_CUTOFF,
};
