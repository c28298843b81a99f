mod progress;
mod render;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use copycatch_core::{
    Checkpoint, CorpusStats, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_PAIR_TOKENS,
    DEFAULT_SPACE_WEIGHT, ResultEntry, SearchOptions, SearchProgress, SymbolTable,
    TEMPLATE_SCORE_CUTOFF, TokenFile, align, edit_dist, foreign_source_dir, load_corpus,
    load_saved_state, load_templates, read_ranking, rename_dist, run_search, save_checkpoint,
    screen_templates, total_files, total_pairs,
};

#[derive(Parser, Debug)]
#[command(name = "copycatch", version)]
#[command(about = "Finds suspiciously similar contest submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score every cross-contestant file pair and keep the strongest matches.
    Search(SearchArgs),
    /// Align two files and print their scores plus a colored diff.
    Compare(CompareArgs),
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Directory holding one subdirectory of submissions per contestant.
    solutions: PathBuf,

    /// Directory of template files every contestant received.
    templates: PathBuf,

    /// Ranking file: whitespace-separated contestant names, best first.
    ranking: PathBuf,

    /// Contestants ranked before this position fill the priority bucket.
    cutoff: usize,

    /// Directory for checkpoints and results.
    target: PathBuf,

    /// Worker threads; defaults to the available parallelism.
    #[arg(long)]
    threads: Option<usize>,

    /// Weight of whitespace similarity in the blended score.
    #[arg(long, default_value_t = DEFAULT_SPACE_WEIGHT)]
    space_weight: f32,

    /// Skip files larger than this many bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_BYTES)]
    max_file_size: u64,

    /// Score a pair 0 when the two files' token counts sum above this.
    #[arg(long, default_value_t = DEFAULT_MAX_PAIR_TOKENS)]
    max_pair_tokens: usize,

    /// Seconds between a worker's periodic checkpoints.
    #[arg(long, default_value_t = 0)]
    snap_interval: u64,

    /// Drop submissions scoring above this against any template.
    #[arg(long, default_value_t = TEMPLATE_SCORE_CUTOFF)]
    template_cutoff: f32,

    /// Accept checkpoints recorded against a different solutions directory.
    #[arg(long)]
    yes: bool,

    /// Print the retained pairs as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct CompareArgs {
    first: PathBuf,
    second: PathBuf,

    /// Weight of whitespace similarity in the blended score.
    #[arg(long, default_value_t = DEFAULT_SPACE_WEIGHT)]
    space_weight: f32,

    /// Refuse to align when the two files' token counts sum above this.
    #[arg(long, default_value_t = DEFAULT_MAX_PAIR_TOKENS)]
    max_pair_tokens: usize,

    /// Print only the scores, not the diff.
    #[arg(long)]
    no_diff: bool,

    /// Print the scores as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Search(args) => run_search_command(args),
        Commands::Compare(args) => run_compare_command(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_search_command(args: SearchArgs) -> Result<()> {
    let defaults = SearchOptions::default();
    let options = SearchOptions {
        cutoff: args.cutoff,
        threads: args.threads.unwrap_or(defaults.threads).max(1),
        space_weight: args.space_weight,
        max_pair_tokens: args.max_pair_tokens,
        max_file_bytes: args.max_file_size,
        template_cutoff: args.template_cutoff,
        snap_interval: Duration::from_secs(args.snap_interval),
    };

    fs::create_dir_all(&args.target)
        .with_context(|| format!("creating target directory {}", args.target.display()))?;
    let state = load_saved_state(&args.target)
        .with_context(|| format!("loading checkpoints from {}", args.target.display()))?;
    if state.resume_index > 0 || !state.hi.is_empty() || !state.lo.is_empty() {
        tracing::info!(
            resume_index = state.resume_index,
            hi = state.hi.len(),
            lo = state.lo.len(),
            "resuming from saved state"
        );
    }
    confirm_same_corpus(&state, &args.solutions, args.yes)?;
    // fold every per-worker snapshot into one file before the workers start
    // overwriting them
    save_checkpoint(
        &args.target.join("partial"),
        state.resume_index,
        &state.hi,
        &state.lo,
    )
    .context("saving merged checkpoint")?;

    let ranking = read_ranking(&args.ranking)
        .with_context(|| format!("reading ranking {}", args.ranking.display()))?;
    if args.cutoff > ranking.len() {
        tracing::warn!(
            cutoff = args.cutoff,
            owners = ranking.len(),
            "cutoff exceeds the ranking"
        );
    }

    let resume_index = state.resume_index;
    let mut symbols = SymbolTable::new();
    let mut stats = CorpusStats::default();
    let templates = load_templates(&args.templates, &options, &mut symbols, &mut stats)
        .with_context(|| format!("loading templates from {}", args.templates.display()))?;
    let mut owners = load_corpus(
        &args.solutions,
        &ranking,
        resume_index,
        &options,
        &mut symbols,
        &mut stats,
    )
    .with_context(|| format!("loading submissions from {}", args.solutions.display()))?;
    tracing::info!(
        owners = owners.len(),
        files = stats.loaded_files,
        templates = templates.len(),
        "corpus loaded"
    );

    let files_done = AtomicU64::new(0);
    // the bar counts screened submissions; templates went through the same
    // loader but are never screened themselves
    let bar = progress::Progress::new(total_files(&owners), "files");
    with_poller(
        || bar.set_position(files_done.load(Ordering::Relaxed)),
        || {
            screen_templates(
                &mut owners,
                &templates,
                resume_index,
                &options,
                &files_done,
                &mut stats,
            )
        },
    )
    .context("screening against the templates")?;
    bar.finish_and_clear();
    if stats.excluded_as_template > 0 {
        tracing::info!(
            excluded = stats.excluded_as_template,
            "template-like submissions excluded"
        );
    }

    // token ids are fixed from here on; the table is only ballast
    drop(symbols);
    drop(templates);

    let pairs = total_pairs(&owners, resume_index);
    let owner_count = owners.len();
    let search_progress = SearchProgress::default();
    let bar = progress::Progress::new(pairs, "pairs");
    let outcome = with_poller(
        || {
            bar.set_position(search_progress.pairs_done.load(Ordering::Relaxed));
            let claimed = search_progress.owners_claimed.load(Ordering::Relaxed);
            bar.set_message(format!("owner {}/{owner_count}", claimed.min(owner_count)));
        },
        || run_search(&owners, state, &options, &args.target, &search_progress),
    )
    .context("running the pair search")?;
    bar.finish_and_clear();

    report_search(&args, &stats, owner_count, &outcome)
}

// runs work on the calling thread while a helper refreshes the progress
// display a few times a second
fn with_poller<R>(tick: impl Fn() + Send + Sync, work: impl FnOnce() -> R) -> R {
    let done = AtomicBool::new(false);
    thread::scope(|scope| {
        let done = &done;
        let tick = &tick;
        let poller = scope.spawn(move || {
            while !done.load(Ordering::Relaxed) {
                tick();
                thread::sleep(Duration::from_millis(200));
            }
            tick();
        });
        let result = work();
        done.store(true, Ordering::Relaxed);
        poller.join().expect("progress poller panicked");
        result
    })
}

fn confirm_same_corpus(state: &Checkpoint, solutions: &Path, assume_yes: bool) -> Result<()> {
    let Some(recorded) = foreign_source_dir(state, solutions) else {
        return Ok(());
    };
    eprintln!(
        "{} checkpoints in the target directory refer to {recorded}, not {}",
        style("warning:").yellow().bold(),
        solutions.display()
    );
    eprintln!("continuing would merge results from two different runs");
    if assume_yes {
        tracing::warn!("continuing anyway (--yes)");
        return Ok(());
    }
    let proceed = Confirm::new()
        .with_prompt("Continue with these checkpoints?")
        .default(false)
        .interact()
        .context("reading the confirmation answer")?;
    if !proceed {
        bail!("aborted: checkpoints belong to a different solutions directory");
    }
    Ok(())
}

fn report_search(
    args: &SearchArgs,
    stats: &CorpusStats,
    owner_count: usize,
    outcome: &Checkpoint,
) -> Result<()> {
    if args.json {
        let report = JsonSearchReport {
            owners: owner_count,
            loaded_files: stats.loaded_files,
            skipped_too_large: stats.skipped_too_large,
            skipped_unreadable: stats.skipped_unreadable,
            missing_owner_dirs: stats.missing_owner_dirs,
            excluded_as_template: stats.excluded_as_template,
            results_file: args.target.join("total").display().to_string(),
            hi: outcome.hi.iter_desc().map(JsonResultEntry::from).collect(),
            lo: outcome.lo.iter_desc().map(JsonResultEntry::from).collect(),
        };
        let json = serde_json::to_string_pretty(&report).context("json encode")?;
        println!("{json}");
        return Ok(());
    }

    println!("== results ==");
    println!(
        "owners={owner_count} files={} excluded_templates={}",
        stats.loaded_files, stats.excluded_as_template
    );
    let mut skips: Vec<(&str, u64)> = vec![
        ("too_large", stats.skipped_too_large),
        ("unreadable", stats.skipped_unreadable),
        ("missing_owner_dirs", stats.missing_owner_dirs),
        ("walk_errors", stats.walk_errors),
    ];
    skips.retain(|(_, v)| *v > 0);
    if !skips.is_empty() {
        println!("skipped:");
        for (k, v) in skips {
            println!("- {k}={v}");
        }
    }
    println!("hi={} lo={}", outcome.hi.len(), outcome.lo.len());
    for entry in outcome.hi.iter_desc().take(10) {
        println!("{:8.3} {} {}", entry.score, entry.path_a, entry.path_b);
    }
    println!("full results: {}", args.target.join("total").display());
    Ok(())
}

fn run_compare_command(args: CompareArgs) -> Result<()> {
    let mut symbols = SymbolTable::new();
    let first = read_token_file(&args.first, &mut symbols)?;
    let second = read_token_file(&args.second, &mut symbols)?;

    let token_total = first.len() + second.len();
    if token_total > args.max_pair_tokens {
        // over the DP guard: the pair scores 0 without being aligned
        if args.json {
            let report = JsonCompareReport {
                path_a: first.path.clone(),
                path_b: second.path.clone(),
                tokens_a: first.len(),
                tokens_b: second.len(),
                edit_dist: None,
                token_dist: None,
                space_dist: None,
                token_pct: None,
                space_pct: None,
                similarity: 0.0,
            };
            let json = serde_json::to_string_pretty(&report).context("json encode")?;
            println!("{json}");
        } else {
            println!("== scores ==");
            println!(
                "tokens={}+{} above the {} pair limit, alignment skipped",
                first.len(),
                second.len(),
                args.max_pair_tokens
            );
            println!("similarity=0.00");
        }
        return Ok(());
    }

    let alignment = align(&first, &second);
    let token_dist = alignment.add_del_count + rename_dist(&alignment.substitutions);
    let space_total = first.spaces.len() + second.spaces.len();
    let token_pct = percentage(token_dist, token_total);
    let space_pct = percentage(alignment.space_dist, space_total);
    let blended = token_pct * (1.0 - args.space_weight) + space_pct * args.space_weight;
    let plain_edits = edit_dist(&first, &second);

    if args.json {
        let report = JsonCompareReport {
            path_a: first.path.clone(),
            path_b: second.path.clone(),
            tokens_a: first.len(),
            tokens_b: second.len(),
            edit_dist: Some(plain_edits),
            token_dist: Some(token_dist),
            space_dist: Some(alignment.space_dist),
            token_pct: Some(token_pct),
            space_pct: Some(space_pct),
            similarity: blended,
        };
        let json = serde_json::to_string_pretty(&report).context("json encode")?;
        println!("{json}");
    } else {
        println!("== scores ==");
        println!(
            "tokens={}+{} add_del={} edit_dist={plain_edits}",
            first.len(),
            second.len(),
            alignment.add_del_count
        );
        println!("token_dist={token_dist} space_dist={}", alignment.space_dist);
        println!("token_pct={token_pct:.2} space_pct={space_pct:.2}");
        println!("similarity={blended:.2}");
    }

    if !args.no_diff {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out)?;
        render::render_file_diff(
            &mut out,
            &first,
            &alignment.diff_a,
            &alignment.wdiff_a,
            &symbols,
        )?;
        writeln!(out)?;
        render::render_file_diff(
            &mut out,
            &second,
            &alignment.diff_b,
            &alignment.wdiff_b,
            &symbols,
        )?;
    }
    Ok(())
}

fn read_token_file(path: &Path, symbols: &mut SymbolTable) -> Result<TokenFile> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(TokenFile::parse(path.to_string_lossy(), &text, symbols))
}

fn percentage(dist: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        100.0 - 100.0 * dist as f32 / total as f32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonResultEntry {
    score: f32,
    path_a: String,
    path_b: String,
}

impl From<&ResultEntry> for JsonResultEntry {
    fn from(entry: &ResultEntry) -> Self {
        Self {
            score: entry.score,
            path_a: entry.path_a.clone(),
            path_b: entry.path_b.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSearchReport {
    owners: usize,
    loaded_files: u64,
    skipped_too_large: u64,
    skipped_unreadable: u64,
    missing_owner_dirs: u64,
    excluded_as_template: u64,
    results_file: String,
    hi: Vec<JsonResultEntry>,
    lo: Vec<JsonResultEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonCompareReport {
    path_a: String,
    path_b: String,
    tokens_a: usize,
    tokens_b: usize,
    edit_dist: Option<usize>,
    token_dist: Option<usize>,
    space_dist: Option<usize>,
    token_pct: Option<f32>,
    space_pct: Option<f32>,
    similarity: f32,
}
