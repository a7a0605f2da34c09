//! Randomized value generation for specimen.
//!
//! Provides the combinator library the type-driven builders fold into:
//! - `Generator<T>`: a pure, clonable function from (Seed, Size) to T
//! - `gen`: primitive and structural combinators, including the
//!   depth-bounded `tree` combinator recursive types rely on
//! - Structural shrinking for terms
//! - A property runner with shrinking and discard budgets
//!
//! Generators are deterministic: re-running with the same seed and size
//! reproduces the same value.

pub mod generator;
pub mod property;
pub mod runner;
pub mod shrink;

pub use generator::{gen, Generator, Seed, Size};
pub use property::{Counterexample, PropertyResult};
pub use runner::{TestConfig, TestResult, TestRunner};
pub use shrink::shrink_term;

#[cfg(test)]
mod tests {
    use super::*;
    use specimen_term::Term;

    #[test]
    fn generation_is_deterministic() {
        let g = gen::int_range(0, 1_000_000);
        let a = g.generate(Seed::new(7), Size::new(50));
        let b = g.generate(Seed::new(7), Size::new(50));
        assert_eq!(a, b);
    }

    #[test]
    fn runner_finds_and_shrinks_counterexample() {
        let g = gen::int_range(0, 1000).map(Term::Int);
        let mut runner = TestRunner::new(TestConfig {
            seed: Some(42),
            ..TestConfig::default()
        });
        let result = runner.check_all(&g, shrink_term, |t| {
            match t.as_int() {
                Some(n) if n < 5 => PropertyResult::Pass,
                _ => PropertyResult::Fail,
            }
        });
        match result {
            TestResult::Failure { counterexample, .. } => {
                // Greedy shrinking should land on the boundary.
                assert_eq!(counterexample.shrunk, Term::Int(5));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn runner_passes_valid_property() {
        let g = gen::int_range(0, 100).map(Term::Int);
        let mut runner = TestRunner::new(TestConfig {
            seed: Some(1),
            ..TestConfig::default()
        });
        let result = runner.check_all(&g, shrink_term, |t| {
            if matches!(t, Term::Int(n) if (0..=100).contains(n)) {
                PropertyResult::Pass
            } else {
                PropertyResult::Fail
            }
        });
        assert!(result.is_success());
    }
}
