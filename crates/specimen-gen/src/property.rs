//! Property results and counterexamples.

/// The outcome of checking a property against one drawn value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyResult {
    /// Property held
    Pass,
    /// Property failed; the drawn value is the counterexample
    Fail,
    /// Precondition failed, draw does not count
    Discard,
}

impl PropertyResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, PropertyResult::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, PropertyResult::Fail)
    }

    /// Lift a boolean check.
    pub fn from_bool(ok: bool) -> PropertyResult {
        if ok {
            PropertyResult::Pass
        } else {
            PropertyResult::Fail
        }
    }
}

/// A failing input, before and after shrinking.
#[derive(Debug, Clone)]
pub struct Counterexample<T> {
    /// The originally drawn failing input
    pub original: T,
    /// The minimal failing input shrinking arrived at
    pub shrunk: T,
    /// Number of successful shrink steps
    pub shrink_steps: usize,
    /// Seed of the failing draw, for reproduction
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bool_maps_to_pass_fail() {
        assert!(PropertyResult::from_bool(true).is_pass());
        assert!(PropertyResult::from_bool(false).is_fail());
    }
}
