use std::collections::HashMap;

use crate::tokenize::{SymbolId, TokenFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diff {
    Same,
    Added,
    Changed,
}

// substitutions maps each word symbol of the first file to its history: the
// symbol itself, then every symbol it aligned against, in file order. the
// wdiff vectors tag whitespace runs and have one entry more than tokens
#[derive(Debug)]
pub struct Alignment {
    pub substitutions: HashMap<SymbolId, Vec<SymbolId>>,
    pub add_del_count: usize,
    pub space_dist: usize,
    pub diff_a: Vec<Diff>,
    pub diff_b: Vec<Diff>,
    pub wdiff_a: Vec<Diff>,
    pub wdiff_b: Vec<Diff>,
}

// substitution is only allowed between two word tokens; punctuation either
// matches itself exactly or is added and deleted
pub fn align(a: &TokenFile, b: &TokenFile) -> Alignment {
    let len_a = a.content.len();
    let len_b = b.content.len();
    let cols = len_a + 1;

    let mut dp = vec![0u32; (len_b + 1) * cols];
    for ia in 0..=len_a {
        dp[ia] = ia as u32;
    }
    for ib in 1..=len_b {
        dp[ib * cols] = ib as u32;
        let sb = b.content[ib - 1];
        for ia in 1..=len_a {
            let sa = a.content[ia - 1];
            let cell = if sa == sb {
                dp[(ib - 1) * cols + ia - 1]
            } else {
                let mut best = dp[(ib - 1) * cols + ia].min(dp[ib * cols + ia - 1]);
                if sa >= 0 && sb >= 0 {
                    best = best.min(dp[(ib - 1) * cols + ia - 1]);
                }
                best + 1
            };
            dp[ib * cols + ia] = cell;
        }
    }

    let mut ia = len_a;
    let mut ib = len_b;
    let mut add_del_count = 0usize;
    let mut space_dist = a.spaces.len() + b.spaces.len();
    let mut pairs_a: Vec<SymbolId> = Vec::new();
    let mut pairs_b: Vec<SymbolId> = Vec::new();
    let mut diff_a: Vec<Diff> = Vec::with_capacity(len_a);
    let mut diff_b: Vec<Diff> = Vec::with_capacity(len_b);
    let mut wdiff_a = vec![Diff::Added; len_a + 1];
    let mut wdiff_b = vec![Diff::Added; len_b + 1];
    // a run pair is only comparable while both sides sit between matched
    // tokens; any add/delete in between breaks the boundary
    let mut boundary = true;

    while ia > 0 && ib > 0 {
        let sa = a.content[ia - 1];
        let sb = b.content[ib - 1];
        let cell = dp[ib * cols + ia];
        if sa == sb {
            if boundary {
                mark_runs(
                    &a.spaces[ia],
                    &b.spaces[ib],
                    &mut wdiff_a[ia],
                    &mut wdiff_b[ib],
                    &mut space_dist,
                );
            }
            boundary = true;
            if sa >= 0 {
                pairs_a.push(sa);
                pairs_b.push(sb);
            }
            diff_a.push(Diff::Same);
            diff_b.push(Diff::Same);
            ia -= 1;
            ib -= 1;
        } else if sa >= 0 && sb >= 0 && cell == dp[(ib - 1) * cols + ia - 1] + 1 {
            if boundary {
                mark_runs(
                    &a.spaces[ia],
                    &b.spaces[ib],
                    &mut wdiff_a[ia],
                    &mut wdiff_b[ib],
                    &mut space_dist,
                );
            }
            boundary = true;
            pairs_a.push(sa);
            pairs_b.push(sb);
            diff_a.push(Diff::Changed);
            diff_b.push(Diff::Changed);
            ia -= 1;
            ib -= 1;
        } else if cell == dp[ib * cols + ia - 1] + 1 {
            // token only in the first file
            diff_a.push(Diff::Added);
            add_del_count += 1;
            boundary = false;
            ia -= 1;
        } else {
            diff_b.push(Diff::Added);
            add_del_count += 1;
            boundary = false;
            ib -= 1;
        }
    }
    if ia == 0 && ib == 0 && boundary {
        mark_runs(
            &a.spaces[0],
            &b.spaces[0],
            &mut wdiff_a[0],
            &mut wdiff_b[0],
            &mut space_dist,
        );
    }
    add_del_count += ia + ib;
    for _ in 0..ia {
        diff_a.push(Diff::Added);
    }
    for _ in 0..ib {
        diff_b.push(Diff::Added);
    }

    diff_a.reverse();
    diff_b.reverse();
    pairs_a.reverse();
    pairs_b.reverse();

    let mut substitutions: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
    for (&sa, &sb) in pairs_a.iter().zip(&pairs_b) {
        substitutions.entry(sa).or_insert_with(|| vec![sa]).push(sb);
    }

    Alignment {
        substitutions,
        add_del_count,
        space_dist,
        diff_a,
        diff_b,
        wdiff_a,
        wdiff_b,
    }
}

fn mark_runs(run_a: &str, run_b: &str, tag_a: &mut Diff, tag_b: &mut Diff, dist: &mut usize) {
    if run_a == run_b {
        *dist -= 2;
        *tag_a = Diff::Same;
        *tag_b = Diff::Same;
    } else {
        *tag_a = Diff::Changed;
        *tag_b = Diff::Changed;
    }
}

// plain alignment cost, with no credit for consistent renames
pub fn edit_dist(a: &TokenFile, b: &TokenFile) -> usize {
    let alignment = align(a, b);
    let mut dist = alignment.add_del_count;
    for (&symbol, targets) in &alignment.substitutions {
        dist += targets.iter().filter(|&&t| t != symbol).count();
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::SymbolTable;

    fn parse_pair(first: &str, second: &str) -> (TokenFile, TokenFile, SymbolTable) {
        let mut symbols = SymbolTable::new();
        let a = TokenFile::parse("a", first, &mut symbols);
        let b = TokenFile::parse("b", second, &mut symbols);
        (a, b, symbols)
    }

    #[test]
    fn identical_files_align_with_zero_cost() {
        let (a, b, _) = parse_pair("int main() { return 0; }", "int main() { return 0; }");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 0);
        assert_eq!(alignment.space_dist, 0);
        assert!(alignment.diff_a.iter().all(|&d| d == Diff::Same));
        assert!(alignment.diff_b.iter().all(|&d| d == Diff::Same));
        assert!(alignment.wdiff_a.iter().all(|&d| d == Diff::Same));
        assert!(alignment.wdiff_b.iter().all(|&d| d == Diff::Same));
        assert_eq!(edit_dist(&a, &b), 0);
    }

    #[test]
    fn single_rename_is_one_substitution() {
        let (a, b, symbols) = parse_pair("int a = 1;", "int b = 1;");
        let _ = symbols;
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 0);
        assert_eq!(edit_dist(&a, &b), 1);
        let changed: Vec<_> = alignment
            .diff_a
            .iter()
            .filter(|&&d| d == Diff::Changed)
            .collect();
        assert_eq!(changed.len(), 1);
    }

    #[test]
    fn substitution_history_keeps_file_order() {
        // both words of the first file are the same symbol and align against
        // two different symbols; the history starts with the identity
        let (a, b, mut symbols) = parse_pair("p p", "q r");
        let alignment = align(&a, &b);
        let p = symbols.intern("p");
        let q = symbols.intern("q");
        let r = symbols.intern("r");
        assert_eq!(alignment.substitutions[&p], vec![p, q, r]);
    }

    #[test]
    fn matches_also_enter_the_history() {
        let (a, b, mut symbols) = parse_pair("x y", "x z");
        let alignment = align(&a, &b);
        let x = symbols.intern("x");
        let y = symbols.intern("y");
        let z = symbols.intern("z");
        assert_eq!(alignment.substitutions[&x], vec![x, x]);
        assert_eq!(alignment.substitutions[&y], vec![y, z]);
    }

    #[test]
    fn punctuation_never_substitutes_for_words() {
        let (a, b, _) = parse_pair("a", ";");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 2);
        assert!(alignment.substitutions.is_empty());
    }

    #[test]
    fn different_punctuation_never_substitutes() {
        let (a, b, _) = parse_pair(";", ",");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 2);
    }

    #[test]
    fn fully_disjoint_files_are_all_additions() {
        // ten words against ten punctuation marks: no substitution is legal
        let (a, b, _) = parse_pair("a b c d e f g h i j", "! ? , . ; : ( ) { }");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 20);
        assert!(alignment.diff_a.iter().all(|&d| d == Diff::Added));
        assert!(alignment.diff_b.iter().all(|&d| d == Diff::Added));
    }

    #[test]
    fn unmatched_prefix_is_tagged_added() {
        let (a, b, _) = parse_pair("x y z", "z");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 2);
        assert_eq!(alignment.diff_a, vec![Diff::Added, Diff::Added, Diff::Same]);
        assert_eq!(alignment.diff_b, vec![Diff::Same]);
    }

    #[test]
    fn crossed_words_align_diagonally() {
        let (a, b, _) = parse_pair("p q", "q p");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 0);
        assert_eq!(alignment.diff_a, vec![Diff::Changed, Diff::Changed]);
        assert_eq!(edit_dist(&a, &b), 2);
    }

    #[test]
    fn indentation_change_costs_two() {
        let (a, b, _) = parse_pair("a\n  b", "a\n\tb");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 0);
        assert_eq!(alignment.space_dist, 2);
        assert_eq!(
            alignment.wdiff_a,
            vec![Diff::Same, Diff::Changed, Diff::Same]
        );
    }

    #[test]
    fn runs_next_to_insertions_are_not_compared() {
        let (a, b, _) = parse_pair("x m", "m");
        let alignment = align(&a, &b);
        // only the trailing run pair is comparable; the leading pair sits
        // next to the deleted token on one side
        assert_eq!(alignment.space_dist, 3);
        assert_eq!(alignment.wdiff_a, vec![Diff::Added, Diff::Added, Diff::Same]);
        assert_eq!(alignment.wdiff_b, vec![Diff::Added, Diff::Same]);
    }

    #[test]
    fn leading_runs_compare_when_first_tokens_match() {
        let (a, b, _) = parse_pair("  m", "\tm x");
        let alignment = align(&a, &b);
        // leading runs differ, m matches, everything after is interrupted
        assert_eq!(alignment.wdiff_a[0], Diff::Changed);
        assert_eq!(alignment.wdiff_b[0], Diff::Changed);
    }

    #[test]
    fn empty_files_align_trivially() {
        let (a, b, _) = parse_pair("", "");
        let alignment = align(&a, &b);
        assert_eq!(alignment.add_del_count, 0);
        // the two empty leading runs still compare equal
        assert_eq!(alignment.space_dist, 0);
        assert_eq!(edit_dist(&a, &b), 0);
    }

    #[test]
    fn edit_dist_counts_each_divergent_occurrence() {
        let (a, b, _) = parse_pair("v v v", "w w v");
        // rename credit is not applied here: two occurrences diverge
        assert_eq!(edit_dist(&a, &b), 2);
    }

    #[test]
    fn edit_dist_is_symmetric() {
        let (a, b, _) = parse_pair("int a = 1 ; extra", "int b = 1 ;");
        assert_eq!(edit_dist(&a, &b), 2);
        assert_eq!(edit_dist(&b, &a), 2);
    }
}
