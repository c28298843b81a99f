use std::collections::HashMap;

use crate::tokenize::SymbolId;

// a symbol always matched against the same counterpart costs one edit for
// the whole run, not one per occurrence
pub fn rename_dist(substitutions: &HashMap<SymbolId, Vec<SymbolId>>) -> usize {
    substitutions.values().map(|targets| chain_cost(targets)).sum()
}

fn chain_cost(targets: &[SymbolId]) -> usize {
    // next[j] = first index after j holding the same value, len if none
    let mut next = vec![targets.len(); targets.len()];
    let mut seen: HashMap<SymbolId, usize> = HashMap::new();
    for j in (0..targets.len()).rev() {
        if let Some(&later) = seen.get(&targets[j]) {
            next[j] = later;
        }
        seen.insert(targets[j], j);
    }
    let mut memo = HashMap::new();
    span_cost(targets, 1, targets.len(), 0, &next, &mut memo)
}

// cheapest way to explain v[l..r] when the value in force entering the span
// is v[base]: an end that already agrees is free, otherwise pay one edit for
// v[l] and try handing back to base at each later repeat of its value
fn span_cost(
    v: &[SymbolId],
    l: usize,
    r: usize,
    base: usize,
    next: &[usize],
    memo: &mut HashMap<(usize, usize, usize), usize>,
) -> usize {
    if l >= r {
        return 0;
    }
    if let Some(&cost) = memo.get(&(l, r, base)) {
        return cost;
    }
    // peel agreeing ends in place; recursing here would cost one stack
    // frame per element of an identical run
    let (mut pl, mut pr, mut pb) = (l, r, base);
    while pl < pr {
        if v[pl] == v[pb] {
            pb = pl;
            pl += 1;
        } else if v[pr - 1] == v[pb] {
            pr -= 1;
        } else {
            break;
        }
    }
    let cost = if pl >= pr {
        0
    } else if let Some(&cost) = memo.get(&(pl, pr, pb)) {
        cost
    } else {
        let mut best = 1 + span_cost(v, pl + 1, pr, pl, next, memo);
        let mut split = next[pb];
        while split < pr {
            let candidate = span_cost(v, pl, split, pb, next, memo)
                + span_cost(v, split + 1, pr, split, next, memo);
            best = best.min(candidate);
            split = next[split];
        }
        memo.insert((pl, pr, pb), best);
        best
    };
    memo.insert((l, r, base), cost);
    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WORKER_STACK_BYTES;

    fn cost(values: &[SymbolId]) -> usize {
        let mut substitutions = HashMap::new();
        substitutions.insert(values[0], values.to_vec());
        rename_dist(&substitutions)
    }

    #[test]
    fn identity_history_costs_nothing() {
        assert_eq!(cost(&[7]), 0);
        assert_eq!(cost(&[7, 7, 7, 7]), 0);
    }

    #[test]
    fn consistent_rename_costs_one() {
        // every occurrence went to the same new symbol
        assert_eq!(cost(&[3, 9, 9, 9]), 1);
    }

    #[test]
    fn late_return_to_identity_still_costs_one() {
        // the middle occurrences were renamed, the rest kept the original
        assert_eq!(cost(&[3, 9, 9, 3, 3]), 1);
    }

    #[test]
    fn each_new_target_costs_one() {
        assert_eq!(cost(&[1, 5, 6, 7]), 3);
    }

    #[test]
    fn alternating_targets_cost_per_switch_back() {
        assert_eq!(cost(&[1, 9, 1, 9, 1]), 2);
    }

    #[test]
    fn independent_symbols_sum() {
        let mut substitutions = HashMap::new();
        substitutions.insert(1, vec![1, 4, 4]);
        substitutions.insert(2, vec![2, 2]);
        substitutions.insert(3, vec![3, 8, 9]);
        assert_eq!(rename_dist(&substitutions), 3);
    }

    #[test]
    fn empty_map_is_zero() {
        assert_eq!(rename_dist(&HashMap::new()), 0);
    }

    #[test]
    fn long_consistent_run_with_one_outlier() {
        assert_eq!(cost(&[2, 6, 6, 6, 6, 5, 6, 6]), 2);
    }

    #[test]
    fn identity_history_at_the_pair_cap_costs_nothing() {
        // 30 000 combined tokens make a 15 001-entry history; this must not
        // descend one frame per entry
        assert_eq!(cost(&vec![7; 15_001]), 0);
    }

    #[test]
    fn worst_case_chain_fits_a_worker_stack() {
        // every occurrence renamed to a fresh symbol keeps the recursion as
        // deep as the chain, so run it on the stack the workers get
        let chain: Vec<SymbolId> = (0..15_001).collect();
        let handle = std::thread::Builder::new()
            .stack_size(WORKER_STACK_BYTES)
            .spawn(move || {
                let mut substitutions = HashMap::new();
                substitutions.insert(chain[0], chain);
                rename_dist(&substitutions)
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), 15_000);
    }
}
