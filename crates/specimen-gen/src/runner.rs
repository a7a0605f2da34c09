//! Property runner.
//!
//! Draws values from a generator with a ramping size parameter, checks a
//! property, and shrinks the first failing draw to a minimal
//! counterexample. Campaigns are bounded by a test count and a discard
//! budget.

use crate::generator::{Generator, Seed, Size};
use crate::property::{Counterexample, PropertyResult};

/// Campaign configuration.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Number of passing draws required
    pub tests: usize,
    /// Maximum successful shrink steps per counterexample
    pub max_shrinks: usize,
    /// Maximum discarded draws before giving up
    pub max_discards: usize,
    /// Fixed seed; None draws from entropy
    pub seed: Option<u64>,
    /// Size of the first draw
    pub initial_size: usize,
    /// Size ceiling reached by the last draw
    pub max_size: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            tests: 100,
            max_shrinks: 200,
            max_discards: 1000,
            seed: None,
            initial_size: 1,
            max_size: 100,
        }
    }
}

/// Outcome of a campaign.
#[derive(Debug, Clone)]
pub enum TestResult<T> {
    /// Every draw passed
    Success { tests: usize, discards: usize },
    /// A draw failed; carries the shrunk counterexample
    Failure {
        counterexample: Counterexample<T>,
        tests_before_failure: usize,
    },
    /// The discard budget ran out first
    GaveUp { tests: usize, discards: usize },
}

impl<T> TestResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestResult::Failure { .. })
    }
}

/// Drives property campaigns.
pub struct TestRunner {
    config: TestConfig,
    seed: Seed,
}

impl TestRunner {
    pub fn new(config: TestConfig) -> Self {
        let seed = config.seed.map(Seed::new).unwrap_or_default();
        Self { config, seed }
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Run a property over draws from `generator`.
    ///
    /// `shrink` proposes simplifications of a failing value; candidates
    /// are accepted only while the property keeps failing, so the
    /// property must be a pure function of the value.
    pub fn check_all<T, S, P>(
        &mut self,
        generator: &Generator<T>,
        shrink: S,
        property: P,
    ) -> TestResult<T>
    where
        T: Clone,
        S: Fn(&T) -> Vec<T>,
        P: Fn(&T) -> PropertyResult,
    {
        let mut tests = 0;
        let mut discards = 0;

        while tests < self.config.tests {
            if discards >= self.config.max_discards {
                return TestResult::GaveUp { tests, discards };
            }

            let (draw_seed, rest) = self.seed.split();
            self.seed = rest;
            let size = self.size_for(tests);
            let value = generator.generate(draw_seed, size);

            match property(&value) {
                PropertyResult::Pass => tests += 1,
                PropertyResult::Discard => discards += 1,
                PropertyResult::Fail => {
                    let (shrunk, steps) = self.shrink_failure(value.clone(), &shrink, &property);
                    return TestResult::Failure {
                        counterexample: Counterexample {
                            original: value,
                            shrunk,
                            shrink_steps: steps,
                            seed: draw_seed.state(),
                        },
                        tests_before_failure: tests,
                    };
                }
            }
        }

        TestResult::Success { tests, discards }
    }

    /// Ramp the size linearly from initial to max across the campaign.
    fn size_for(&self, test_index: usize) -> Size {
        let TestConfig {
            tests,
            initial_size,
            max_size,
            ..
        } = self.config;
        if tests <= 1 {
            return Size::new(max_size);
        }
        let span = max_size.saturating_sub(initial_size);
        Size::new(initial_size + span * test_index / (tests - 1))
    }

    /// Greedy descent: take the first candidate that still fails.
    fn shrink_failure<T, S, P>(&self, value: T, shrink: &S, property: &P) -> (T, usize)
    where
        T: Clone,
        S: Fn(&T) -> Vec<T>,
        P: Fn(&T) -> PropertyResult,
    {
        let mut current = value;
        let mut steps = 0;

        while steps < self.config.max_shrinks {
            let mut improved = false;
            for candidate in shrink(&current) {
                if property(&candidate).is_fail() {
                    current = candidate;
                    steps += 1;
                    improved = true;
                    break;
                }
            }
            if !improved {
                break;
            }
        }

        (current, steps)
    }
}
