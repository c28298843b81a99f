use crate::align::align;
use crate::rename::rename_dist;
use crate::tokenize::TokenFile;

// blended similarity percentage, 0 to 100. pairs from different groups
// score 0 unless one side is a template; pairs over the combined token cap
// score 0 without running the quadratic alignment
pub fn similarity(a: &TokenFile, b: &TokenFile, space_weight: f32, max_pair_tokens: usize) -> f32 {
    if a.group != b.group && !a.is_template && !b.is_template {
        return 0.0;
    }
    let token_total = a.content.len() + b.content.len();
    if token_total > max_pair_tokens {
        return 0.0;
    }

    let alignment = align(a, b);
    let token_dist = alignment.add_del_count + rename_dist(&alignment.substitutions);
    let token_pct = if token_total == 0 {
        100.0
    } else {
        100.0 - 100.0 * token_dist as f32 / token_total as f32
    };
    let space_total = a.spaces.len() + b.spaces.len();
    let space_pct = 100.0 - 100.0 * alignment.space_dist as f32 / space_total as f32;

    token_pct * (1.0 - space_weight) + space_pct * space_weight
}
