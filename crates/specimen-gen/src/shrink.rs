//! Structural shrinking for terms.
//!
//! When a property fails, shrinking walks toward a minimal
//! counterexample: integers halve toward zero, collections drop
//! elements before shrinking the survivors, tuples keep their arity.

use specimen_term::{Bits, Term, TermMap};

/// Candidate simplifications of a term, roughly smallest-first.
///
/// Callers re-check the failing property (and any membership
/// constraints) against each candidate; this function only proposes.
pub fn shrink_term(value: &Term) -> Vec<Term> {
    match value {
        Term::Int(n) => shrink_int(*n).into_iter().map(Term::Int).collect(),
        Term::Float(x) => shrink_float(*x).into_iter().map(Term::Float).collect(),
        Term::Atom(_) | Term::Ref(_) => Vec::new(),
        Term::Bits(b) => shrink_bits(b),
        Term::Tuple(elems) => shrink_elements(elems)
            .into_iter()
            .map(Term::Tuple)
            .collect(),
        Term::List(elems) => {
            let mut out = Vec::new();
            if !elems.is_empty() {
                out.push(Term::nil());
            }
            for i in 0..elems.len() {
                let mut fewer = elems.clone();
                fewer.remove(i);
                out.push(Term::List(fewer));
            }
            for shorter in shrink_elements(elems) {
                out.push(Term::List(shorter));
            }
            out
        }
        Term::Improper(elems, tail) => {
            let mut out = vec![Term::List(elems.clone())];
            for i in 0..elems.len() {
                let mut fewer = elems.clone();
                fewer.remove(i);
                out.push(Term::improper(fewer, (**tail).clone()));
            }
            for simpler_tail in shrink_term(tail) {
                out.push(Term::improper(elems.clone(), simpler_tail));
            }
            out
        }
        Term::Map(m) => shrink_map(m),
    }
}

fn shrink_int(n: i64) -> Vec<i64> {
    if n == 0 {
        return Vec::new();
    }
    let step = if n > 0 { -1 } else { 1 };
    let mut out = vec![0, n / 2, n.saturating_add(step)];
    out.retain(|c| c.unsigned_abs() < n.unsigned_abs());
    out.dedup();
    out
}

fn shrink_float(x: f64) -> Vec<f64> {
    if x == 0.0 || !x.is_finite() {
        return Vec::new();
    }
    let mut out = vec![0.0, x / 2.0, x.trunc()];
    out.retain(|c| c.abs() < x.abs());
    out
}

fn shrink_bits(b: &Bits) -> Vec<Term> {
    if b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![Term::Bits(Bits::empty())];
    let half = b.bit_len() / 2;
    if half > 0 {
        out.push(Term::Bits(Bits::new(b.as_bytes().to_vec(), half)));
    }
    out.push(Term::Bits(Bits::new(
        b.as_bytes().to_vec(),
        b.bit_len() - 1,
    )));
    out
}

/// Shrink one element at a time, preserving length.
fn shrink_elements(elems: &[Term]) -> Vec<Vec<Term>> {
    let mut out = Vec::new();
    for (i, elem) in elems.iter().enumerate() {
        for smaller in shrink_term(elem) {
            let mut next = elems.to_vec();
            next[i] = smaller;
            out.push(next);
        }
    }
    out
}

fn shrink_map(m: &TermMap) -> Vec<Term> {
    let mut out = Vec::new();
    if !m.is_empty() {
        out.push(Term::Map(TermMap::new()));
    }
    let keys: Vec<Term> = m.keys().cloned().collect();
    for key in &keys {
        let mut fewer = m.clone();
        fewer.remove(key);
        out.push(Term::Map(fewer));
    }
    for key in &keys {
        if let Some(v) = m.get(key) {
            for smaller in shrink_term(v) {
                let mut next = m.clone();
                next.insert(key.clone(), smaller);
                out.push(Term::Map(next));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_shrinks_toward_zero() {
        let candidates = shrink_term(&Term::Int(10));
        assert!(candidates.contains(&Term::Int(0)));
        assert!(candidates.contains(&Term::Int(5)));
        assert!(candidates.contains(&Term::Int(9)));
        assert!(shrink_term(&Term::Int(0)).is_empty());
    }

    #[test]
    fn negative_int_shrinks_toward_zero() {
        let candidates = shrink_term(&Term::Int(-10));
        assert!(candidates.contains(&Term::Int(0)));
        assert!(candidates.contains(&Term::Int(-5)));
        assert!(candidates.contains(&Term::Int(-9)));
    }

    #[test]
    fn list_tries_empty_then_removals() {
        let list = Term::list(vec![Term::int(1), Term::int(2)]);
        let candidates = shrink_term(&list);
        assert_eq!(candidates[0], Term::nil());
        assert!(candidates.contains(&Term::list(vec![Term::int(2)])));
        assert!(candidates.contains(&Term::list(vec![Term::int(1)])));
    }

    #[test]
    fn tuple_preserves_arity() {
        let tuple = Term::tuple(vec![Term::int(4), Term::atom("x")]);
        for candidate in shrink_term(&tuple) {
            assert_eq!(candidate.as_tuple().map(<[Term]>::len), Some(2));
        }
    }

    #[test]
    fn improper_offers_proper_variant() {
        let improper = Term::improper(vec![Term::int(1)], Term::int(7));
        let candidates = shrink_term(&improper);
        assert_eq!(candidates[0], Term::list(vec![Term::int(1)]));
    }

    #[test]
    fn map_drops_entries() {
        let m = Term::map([
            (Term::atom("a"), Term::int(1)),
            (Term::atom("b"), Term::int(2)),
        ]);
        let candidates = shrink_term(&m);
        assert_eq!(candidates[0], Term::map([]));
        assert!(candidates.contains(&Term::map([(Term::atom("b"), Term::int(2))])));
    }
}
