//! Generator combinators.
//!
//! Generators are deterministic functions from (Seed, Size) -> T. Seeds
//! split into independent sub-seeds so composite values draw from
//! decorrelated streams; the size parameter bounds collection lengths
//! and numeric magnitudes and is what keeps recursive generation finite.

use std::sync::Arc;

// ============================================================================
// Seed
// ============================================================================

/// A splittable random seed for deterministic generation.
#[derive(Debug, Clone, Copy)]
pub struct Seed {
    state: u64,
}

/// splitmix64 finalizer; decorrelates sibling seeds before a draw.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

impl Seed {
    pub fn new(value: u64) -> Self {
        Self { state: value }
    }

    /// A seed from system entropy.
    pub fn random() -> Self {
        Self::new(rand::random::<u64>())
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    /// Advance to the next seed.
    pub fn next(&self) -> Self {
        Self {
            state: self
                .state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407),
        }
    }

    /// Split into two independent seeds.
    pub fn split(&self) -> (Self, Self) {
        let s1 = self.next();
        let s2 = s1.next();
        (
            Self { state: mix(s1.state) },
            Self { state: mix(s2.state ^ 0xDEADBEEF) },
        )
    }

    /// Split into three independent seeds.
    pub fn split3(&self) -> (Self, Self, Self) {
        let (s1, rest) = self.split();
        let (s2, s3) = rest.split();
        (s1, s2, s3)
    }

    /// Draw an integer in `[min, max]`.
    pub fn next_int(&self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        let span = max.wrapping_sub(min) as u64;
        if span == u64::MAX {
            return mix(self.state) as i64;
        }
        min.wrapping_add((mix(self.state) % (span + 1)) as i64)
    }

    /// Draw a usize in `[min, max]`.
    pub fn next_usize(&self, min: usize, max: usize) -> usize {
        if min >= max {
            return min;
        }
        let range = (max - min) as u64 + 1;
        min + (mix(self.state) % range) as usize
    }

    /// Draw a float in `[min, max]`.
    pub fn next_float(&self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        let normalized = mix(self.state) as f64 / u64::MAX as f64;
        min + normalized * (max - min)
    }

    pub fn next_bool(&self) -> bool {
        mix(self.state) & 1 == 0
    }

    pub fn next_u64(&self) -> u64 {
        mix(self.state)
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::random()
    }
}

// ============================================================================
// Size
// ============================================================================

/// Size parameter controlling generated value complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub usize);

impl Size {
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    pub fn value(&self) -> usize {
        self.0
    }

    /// Scale by a factor, saturating at zero.
    pub fn scale(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor) as usize)
    }

    /// Square-root damping, used to keep nested collections small.
    pub fn sqrt(self) -> Self {
        Self((self.0 as f64).sqrt() as usize)
    }
}

impl Default for Size {
    fn default() -> Self {
        Self(100)
    }
}

impl From<usize> for Size {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// A generator for random values.
///
/// Clonable and cheap to share: cloning copies a reference to the
/// generation function, not the function itself. Supports monadic
/// composition through `map` and `flat_map`.
pub struct Generator<T> {
    gen_fn: Arc<dyn Fn(Seed, Size) -> T + Send + Sync>,
}

impl<T> Clone for Generator<T> {
    fn clone(&self) -> Self {
        Self {
            gen_fn: Arc::clone(&self.gen_fn),
        }
    }
}

impl<T> std::fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator").finish_non_exhaustive()
    }
}

impl<T> Generator<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Seed, Size) -> T + Send + Sync + 'static,
    {
        Self { gen_fn: Arc::new(f) }
    }

    /// Generate one value.
    pub fn generate(&self, seed: Seed, size: Size) -> T {
        (self.gen_fn)(seed, size)
    }

    /// Whether two handles share the same generation function.
    pub fn ptr_eq(&self, other: &Generator<T>) -> bool {
        Arc::ptr_eq(&self.gen_fn, &other.gen_fn)
    }

    /// An infinite stream of values with a ramping size parameter.
    pub fn sample(&self, seed: Seed, max_size: Size) -> impl Iterator<Item = T> + '_ {
        let mut current = seed;
        let mut i = 0usize;
        std::iter::from_fn(move || {
            let (draw, rest) = current.split();
            current = rest;
            let size = Size::new((i + 1).min(max_size.value()));
            i += 1;
            Some(self.generate(draw, size))
        })
    }

    /// Transform generated values.
    pub fn map<U, F>(&self, f: F) -> Generator<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        T: 'static,
    {
        let inner = self.clone();
        Generator::new(move |seed, size| f(inner.generate(seed, size)))
    }

    /// Chain generators (monadic bind).
    pub fn flat_map<U, F>(&self, f: F) -> Generator<U>
    where
        F: Fn(T) -> Generator<U> + Send + Sync + 'static,
        T: 'static,
    {
        let inner = self.clone();
        Generator::new(move |seed, size| {
            let (s1, s2) = seed.split();
            f(inner.generate(s1, size)).generate(s2, size)
        })
    }

    /// Fix the size parameter.
    pub fn resize(&self, new_size: Size) -> Generator<T>
    where
        T: 'static,
    {
        let inner = self.clone();
        Generator::new(move |seed, _| inner.generate(seed, new_size))
    }

    /// Rescale the size parameter.
    pub fn scale<F>(&self, scale_fn: F) -> Generator<T>
    where
        F: Fn(Size) -> Size + Send + Sync + 'static,
        T: 'static,
    {
        let inner = self.clone();
        Generator::new(move |seed, size| inner.generate(seed, scale_fn(size)))
    }
}

impl<T: 'static> Generator<T> {
    /// Filter generated values, retrying with advanced seeds. Falls back
    /// to the last attempt when the predicate never holds.
    pub fn filter<P>(&self, predicate: P, max_attempts: usize) -> Generator<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let inner = self.clone();
        Generator::new(move |seed, size| {
            let mut current = seed;
            for _ in 0..max_attempts {
                let candidate = inner.generate(current, size);
                if predicate(&candidate) {
                    return candidate;
                }
                current = current.next();
            }
            inner.generate(current, size)
        })
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Generator combinators.
pub mod gen {
    use super::*;

    /// Always the same value.
    pub fn constant<T: Clone + Send + Sync + 'static>(value: T) -> Generator<T> {
        Generator::new(move |_, _| value.clone())
    }

    /// Uniform choice from a list of values.
    pub fn elements<T: Clone + Send + Sync + 'static>(choices: Vec<T>) -> Generator<T> {
        assert!(!choices.is_empty(), "elements requires non-empty choices");
        Generator::new(move |seed, _| {
            let idx = seed.next_usize(0, choices.len() - 1);
            choices[idx].clone()
        })
    }

    /// Uniform choice from a list of generators.
    pub fn one_of<T: 'static>(generators: Vec<Generator<T>>) -> Generator<T> {
        assert!(!generators.is_empty(), "one_of requires non-empty generators");
        Generator::new(move |seed, size| {
            let (s1, s2) = seed.split();
            let idx = s1.next_usize(0, generators.len() - 1);
            generators[idx].generate(s2, size)
        })
    }

    /// Weighted choice from a list of generators.
    pub fn frequency<T: 'static>(weighted: Vec<(usize, Generator<T>)>) -> Generator<T> {
        assert!(!weighted.is_empty(), "frequency requires non-empty list");
        let total: usize = weighted.iter().map(|(w, _)| w).sum();
        assert!(total > 0, "frequency requires positive total weight");

        Generator::new(move |seed, size| {
            let (s1, s2) = seed.split();
            let mut target = s1.next_usize(0, total - 1);
            for (weight, g) in &weighted {
                if target < *weight {
                    return g.generate(s2, size);
                }
                target -= weight;
            }
            weighted[weighted.len() - 1].1.generate(s2, size)
        })
    }

    /// Integer in `[min, max]`.
    pub fn int_range(min: i64, max: i64) -> Generator<i64> {
        Generator::new(move |seed, _| seed.next_int(min, max))
    }

    /// Positive integer scaled by size.
    pub fn positive_int() -> Generator<i64> {
        Generator::new(|seed, size| seed.next_int(1, size.value().max(1) as i64))
    }

    /// Non-negative integer scaled by size.
    pub fn non_negative_int() -> Generator<i64> {
        Generator::new(|seed, size| seed.next_int(0, size.value() as i64))
    }

    /// Negative integer scaled by size.
    pub fn negative_int() -> Generator<i64> {
        Generator::new(|seed, size| -seed.next_int(1, size.value().max(1) as i64))
    }

    /// Integer in `[-size, size]`.
    pub fn sized_int() -> Generator<i64> {
        Generator::new(|seed, size| {
            let bound = size.value() as i64;
            seed.next_int(-bound, bound)
        })
    }

    /// Float in `[min, max]`.
    pub fn float_range(min: f64, max: f64) -> Generator<f64> {
        Generator::new(move |seed, _| seed.next_float(min, max))
    }

    /// Float in `[-size, size]`.
    pub fn sized_float() -> Generator<f64> {
        Generator::new(|seed, size| {
            let bound = size.value() as f64;
            seed.next_float(-bound, bound)
        })
    }

    pub fn boolean() -> Generator<bool> {
        Generator::new(|seed, _| seed.next_bool())
    }

    /// Variable-length list, bounded by size.
    pub fn list<T: 'static>(elem: Generator<T>) -> Generator<Vec<T>> {
        Generator::new(move |seed, size| {
            let len = seed.next_usize(0, size.value().min(50));
            fill(&elem, seed.next(), size, len)
        })
    }

    /// List with a length drawn from `[min_len, max_len]`.
    pub fn list_of_length<T: 'static>(
        elem: Generator<T>,
        min_len: usize,
        max_len: usize,
    ) -> Generator<Vec<T>> {
        Generator::new(move |seed, size| {
            let len = seed.next_usize(min_len, max_len);
            fill(&elem, seed.next(), size, len)
        })
    }

    /// Non-empty variable-length list.
    pub fn non_empty_list<T: 'static>(elem: Generator<T>) -> Generator<Vec<T>> {
        Generator::new(move |seed, size| {
            let len = seed.next_usize(1, size.value().max(1).min(50));
            fill(&elem, seed.next(), size, len)
        })
    }

    /// Fixed-length list.
    pub fn vector<T: 'static>(n: usize, elem: Generator<T>) -> Generator<Vec<T>> {
        list_of_length(elem, n, n)
    }

    /// Parallel zip of heterogeneous generators into one draw each.
    pub fn zip<T: 'static>(generators: Vec<Generator<T>>) -> Generator<Vec<T>> {
        Generator::new(move |seed, size| {
            let mut current = seed;
            let mut out = Vec::with_capacity(generators.len());
            for g in &generators {
                let (s1, s2) = current.split();
                out.push(g.generate(s1, size));
                current = s2;
            }
            out
        })
    }

    /// String from a character generator with length in `[min_len, max_len]`.
    pub fn string(chars: Generator<char>, min_len: usize, max_len: usize) -> Generator<String> {
        Generator::new(move |seed, size| {
            let len = seed.next_usize(min_len, max_len.min(size.value().max(min_len)));
            let mut out = String::with_capacity(len);
            let mut current = seed.next();
            for _ in 0..len {
                let (s1, s2) = current.split();
                out.push(chars.generate(s1, size));
                current = s2;
            }
            out
        })
    }

    pub fn lowercase_char() -> Generator<char> {
        elements(('a'..='z').collect())
    }

    pub fn alphanumeric_char() -> Generator<char> {
        elements(
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
                .chars()
                .collect(),
        )
    }

    /// Dispatch on the size parameter.
    pub fn sized<T: 'static, F>(f: F) -> Generator<T>
    where
        F: Fn(Size) -> Generator<T> + Send + Sync + 'static,
    {
        Generator::new(move |seed, size| f(size).generate(seed, size))
    }

    /// Depth-bounded recursive generation.
    ///
    /// Draws a depth bounded by the size parameter, then applies `grow`
    /// that many times starting from `base`. Each application sees the
    /// previous depth's generator, so a level draws from the level below
    /// it; leaves are size-damped so deep values stay finite and small.
    pub fn tree<T, F>(base: Generator<T>, grow: F) -> Generator<T>
    where
        T: 'static,
        F: Fn(Generator<T>) -> Generator<T> + Send + Sync + 'static,
    {
        Generator::new(move |seed, size| {
            let (s1, s2) = seed.split();
            let max_depth = (usize::BITS - size.value().max(1).leading_zeros()) as usize;
            let depth = s1.next_usize(0, max_depth.min(6));
            let damp = 1.0 / (depth as f64 + 1.0);
            let mut g = base.scale(move |s| s.scale(damp));
            for _ in 0..depth {
                g = grow(g);
            }
            g.generate(s2, size)
        })
    }

    fn fill<T>(elem: &Generator<T>, seed: Seed, size: Size, len: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(len);
        let mut current = seed;
        for _ in 0..len {
            let (s1, s2) = current.split();
            out.push(elem.generate(s1, size));
            current = s2;
        }
        out
    }
}
