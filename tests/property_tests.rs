//! Property-based tests using proptest
//!
//! These tests check matcher invariants over generated inputs for a fixed
//! set of grammars.

use grammatic::engine::{RuleKind, TraceAction};
use grammatic::{Grammar, Match, Options};
use proptest::prelude::*;

const GRAMMARS: &[&str] = &[
    "ROOT = 'a' | 'b' 'a'",
    "ROOT = /[ab]/ [ ' ' /[ab]+/ ]*",
    "ROOT = 'a'+ 'b'?",
    "ROOT = 'a'*? 'b'",
    "ROOT = [ 'a' | 'ab' ]{1,3} 'b'",
    "ROOT = /[ab]/ 'a' 1",
    "ROOT = ~'a' /[ab]+/ !'b'",
    "ROOT = !-'a' 'b'+",
    "ROOT = 'a'+ : 'b' | 'a'",
    "ROOT = 'b' <ROOT> | 'a'",
    "ROOT = <x> <x>\nx = 'a' | 'ab'",
];

fn all_results(g: &Grammar, text: &str, options: Options) -> Vec<(usize, usize, usize)> {
    g.find(text, options)
        .unwrap()
        .map(|m| (m.start(), m.end(), m.size()))
        .collect()
}

fn grammar(index: usize) -> Grammar {
    GRAMMARS[index].parse().unwrap()
}

// =============================================================================
// Determinism
// =============================================================================

proptest! {
    /// Two fresh invocations give the same results in the same order
    #[test]
    fn test_deterministic(index in 0..GRAMMARS.len(), text in "[ab ]{0,12}") {
        let g = grammar(index);
        let opts = Options::new().match_all();
        prop_assert_eq!(all_results(&g, &text, opts), all_results(&g, &text, opts));
    }

    /// Studying only prunes offsets where nothing could match
    #[test]
    fn test_study_transparent(index in 0..GRAMMARS.len(), text in "[ab ]{0,12}") {
        let g = grammar(index);
        let studied = Options::new().match_all();
        let plain = studied.with_study(false);
        prop_assert_eq!(all_results(&g, &text, studied), all_results(&g, &text, plain));
    }
}

// =============================================================================
// Structural Invariants
// =============================================================================

fn zero_width_ok(g: &Grammar, m: &Match) -> bool {
    m.walk(&mut |node: &Match| match g.rule(node.rule()).kind() {
        RuleKind::Assertion { .. } | RuleKind::Barrier { .. } => node.start() == node.end(),
        _ => node.start() <= node.end(),
    })
}

proptest! {
    /// Assertions and barriers never consume text
    #[test]
    fn test_zero_width_nodes(index in 0..GRAMMARS.len(), text in "[ab ]{0,10}") {
        let g = grammar(index);
        for m in g.find(&text, Options::new().match_all()).unwrap() {
            prop_assert!(zero_width_ok(&g, &m));
        }
    }

    /// Children of a sequence tile their parent
    #[test]
    fn test_children_inside_parent(text in "[ab]{0,10}") {
        let g = grammar(1);
        for m in g.find(&text, Options::new().match_all()).unwrap() {
            let ok = m.walk(&mut |node: &Match| {
                let mut at = node.start();
                for c in node.children() {
                    if c.start() != at {
                        return false;
                    }
                    at = c.end();
                }
                node.children().is_empty() || at == node.end()
            });
            prop_assert!(ok);
        }
    }

    /// Without overlap, results never overlap and move strictly forward
    #[test]
    fn test_find_results_disjoint(index in 0..GRAMMARS.len(), text in "[ab ]{0,12}") {
        let g = grammar(index);
        let found: Vec<Match> = g.find(&text, Options::default()).unwrap().collect();
        for pair in found.windows(2) {
            prop_assert!(pair[0].start() < pair[1].start());
            prop_assert!(pair[0].end() <= pair[1].start() || pair[0].is_zero_width());
        }
    }
}

// =============================================================================
// Repetition Bounds
// =============================================================================

proptest! {
    /// Every result has between `lo` and `hi` iterations
    #[test]
    fn test_repetition_bounds(lo in 0usize..3, extra in 0usize..3, text in "a{0,8}") {
        let hi = lo + 1 + extra;
        let g: Grammar = format!("ROOT = 'a'{{{},{}}}", lo, hi).parse().unwrap();
        for m in g.looking_at(&text, Options::new().match_all()).unwrap() {
            let n = m.children().len();
            prop_assert!(lo <= n && n <= hi, "{} iterations outside {}..={}", n, lo, hi);
        }
    }

    /// A possessive repetition offers one arrangement at most
    #[test]
    fn test_possessive_single_result(text in "a{0,8}b?") {
        let g: Grammar = "ROOT = 'a'*+".parse().unwrap();
        let n = g.looking_at(&text, Options::new().match_all()).unwrap().count();
        prop_assert_eq!(n, 1);
    }

    /// Greedy and stingy see the same arrangements, in opposite orders
    #[test]
    fn test_greedy_stingy_mirror(text in "a{0,6}") {
        let greedy: Grammar = "ROOT = 'a'{1,4}".parse().unwrap();
        let stingy: Grammar = "ROOT = 'a'{1,4}?".parse().unwrap();
        let ends = |g: &Grammar| -> Vec<usize> {
            g.looking_at(&text, Options::new().match_all())
                .unwrap()
                .map(|m| m.end())
                .collect()
        };
        let mut forward = ends(&greedy);
        forward.reverse();
        prop_assert_eq!(forward, ends(&stingy));
    }
}

// =============================================================================
// Cache Consistency
// =============================================================================

proptest! {
    /// A rule that failed at an offset is never entered there again
    #[test]
    fn test_failed_rule_not_rerun(text in "[aqcdz]{0,10}") {
        let g: Grammar = "ROOT = <x> 'c' | <x> 'd' | /[a-z]/\nx = 'a' 'q'".parse().unwrap();
        let x = g.rule_id("x").unwrap();
        let mut it = g.find(&text, Options::new().match_all().trace(true)).unwrap();
        it.by_ref().for_each(drop);
        let trace = it.trace().unwrap();
        for offset in 0..=text.len() {
            if text[offset..].starts_with("aq") {
                continue;
            }
            let entered = trace
                .entries
                .iter()
                .filter(|e| e.rule == x && e.offset == offset && e.action == TraceAction::Enter)
                .count();
            prop_assert!(entered <= 1, "x entered {} times at {}", entered, offset);
        }
    }
}

// =============================================================================
// Describe Round Trip
// =============================================================================

proptest! {
    /// Re-parsing a description accepts exactly what the original accepts
    #[test]
    fn test_describe_round_trip(index in 0..GRAMMARS.len(), text in "[ab ]{0,10}") {
        let g = grammar(index);
        let again: Grammar = g.describe().parse().unwrap();
        let opts = Options::new().match_all();
        let spans = |g: &Grammar| -> Vec<(usize, usize)> {
            g.find(&text, opts).unwrap().map(|m| (m.start(), m.end())).collect()
        };
        prop_assert_eq!(spans(&g), spans(&again));
    }
}
