//! Dynamic value vocabulary for specimen.
//!
//! Every generator in the workspace emits [`Term`]s and every validator
//! judges them. `Term` is closed over everything a structural type can
//! inhabit: atoms, integers, floats, bitstrings, references, tuples,
//! proper and improper lists, and maps.
//!
//! Terms carry a total order (number < atom < reference < tuple < map <
//! list < bitstring) so maps can be tree-backed and map keys stay
//! distinct between `1` and `1.0`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub use smol_str::SmolStr;

pub mod bits;
pub mod map;

pub use bits::Bits;
pub use map::TermMap;

/// A dynamically typed runtime value.
#[derive(Debug, Clone)]
pub enum Term {
    /// Interned symbolic constant
    Atom(SmolStr),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point number
    Float(f64),

    /// Bit sequence; byte-aligned sequences are binaries
    Bits(Bits),

    /// Opaque identity token
    Ref(u64),

    /// Fixed-arity ordered collection
    Tuple(Vec<Term>),

    /// Proper list; the empty list doubles as nil
    List(Vec<Term>),

    /// Improperly terminated list: at least one element, non-list tail
    Improper(Vec<Term>, Box<Term>),

    /// Key/value bag ordered by term order
    Map(TermMap),
}

impl Term {
    /// The empty list.
    pub fn nil() -> Term {
        Term::List(Vec::new())
    }

    pub fn atom(name: impl Into<SmolStr>) -> Term {
        Term::Atom(name.into())
    }

    pub fn int(n: i64) -> Term {
        Term::Int(n)
    }

    pub fn float(f: f64) -> Term {
        Term::Float(f)
    }

    /// A byte-aligned bitstring.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Term {
        Term::Bits(Bits::from_bytes(bytes.into()))
    }

    pub fn tuple(elems: impl Into<Vec<Term>>) -> Term {
        Term::Tuple(elems.into())
    }

    pub fn list(elems: impl Into<Vec<Term>>) -> Term {
        Term::List(elems.into())
    }

    /// Build an improper list, normalizing list tails: a proper-list tail
    /// collapses into a proper list, an improper tail splices its cells.
    pub fn improper(elems: impl Into<Vec<Term>>, tail: Term) -> Term {
        let mut elems = elems.into();
        match tail {
            Term::List(rest) => {
                elems.extend(rest);
                Term::List(elems)
            }
            Term::Improper(mid, tail) => {
                elems.extend(mid);
                if elems.is_empty() {
                    *tail
                } else {
                    Term::Improper(elems, tail)
                }
            }
            tail if elems.is_empty() => tail,
            tail => Term::Improper(elems, Box::new(tail)),
        }
    }

    pub fn map(pairs: impl IntoIterator<Item = (Term, Term)>) -> Term {
        Term::Map(pairs.into_iter().collect())
    }

    /// Name of this value's shape, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Term::Atom(_) => "atom",
            Term::Int(_) => "integer",
            Term::Float(_) => "float",
            Term::Bits(b) if b.is_binary() => "binary",
            Term::Bits(_) => "bitstring",
            Term::Ref(_) => "reference",
            Term::Tuple(_) => "tuple",
            Term::List(_) => "list",
            Term::Improper(_, _) => "improper list",
            Term::Map(_) => "map",
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Term::Atom(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Term::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Term::Float(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Term::Int(_) | Term::Float(_))
    }

    /// True for the atoms `true` and `false`.
    pub fn is_bool(&self) -> bool {
        matches!(self, Term::Atom(a) if a == "true" || a == "false")
    }

    /// True for proper lists, including the empty list.
    pub fn is_list(&self) -> bool {
        matches!(self, Term::List(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::List(elems) if elems.is_empty())
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Term::Tuple(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Term::Map(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Term::Ref(_))
    }

    pub fn is_bitstring(&self) -> bool {
        matches!(self, Term::Bits(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Term::Bits(b) if b.is_binary())
    }

    pub fn as_atom(&self) -> Option<&SmolStr> {
        match self {
            Term::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Term::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            Term::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&TermMap> {
        match self {
            Term::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Term::Bits(b) => Some(b),
            _ => None,
        }
    }

    /// Ordering class of this term. Numbers sort first, bitstrings last.
    fn rank(&self) -> u8 {
        match self {
            Term::Int(_) | Term::Float(_) => 0,
            Term::Atom(_) => 1,
            Term::Ref(_) => 2,
            Term::Tuple(_) => 3,
            Term::Map(_) => 4,
            Term::List(_) | Term::Improper(_, _) => 5,
            Term::Bits(_) => 6,
        }
    }
}

fn cmp_numbers(a: &Term, b: &Term) -> Ordering {
    match (a, b) {
        (Term::Int(x), Term::Int(y)) => x.cmp(y),
        // Floats compare by total order, so the ordering stays total
        // even for NaN payloads a caller might construct by hand.
        (Term::Float(x), Term::Float(y)) => x.total_cmp(y),
        (Term::Int(x), Term::Float(y)) => (*x as f64)
            .total_cmp(y)
            .then(Ordering::Less),
        (Term::Float(x), Term::Int(y)) => x
            .total_cmp(&(*y as f64))
            .then(Ordering::Greater),
        _ => unreachable!("cmp_numbers on non-numbers"),
    }
}

/// Compare list shapes cell-wise. Proper lists carry an implicit nil
/// tail; improper tails are guaranteed non-list by construction.
fn cmp_lists(a_elems: &[Term], a_tail: Option<&Term>, b_elems: &[Term], b_tail: Option<&Term>) -> Ordering {
    let common = a_elems.len().min(b_elems.len());
    for i in 0..common {
        match a_elems[i].cmp(&b_elems[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    match (a_elems.len() == common, b_elems.len() == common) {
        (true, true) => match (a_tail, b_tail) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y),
        },
        // One side ran out of cells: an exhausted proper list is a
        // strict prefix, an exhausted improper tail compares by class
        // against the surviving cons cell.
        (true, false) => match a_tail {
            None => Ordering::Less,
            Some(t) => t.rank().cmp(&5).then(Ordering::Less),
        },
        (false, true) => match b_tail {
            None => Ordering::Greater,
            Some(t) => 5.cmp(&t.rank()).then(Ordering::Greater),
        },
        (false, false) => unreachable!("common prefix exhausted both"),
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            other => return other,
        }
        match (self, other) {
            (Term::Int(_) | Term::Float(_), Term::Int(_) | Term::Float(_)) => {
                cmp_numbers(self, other)
            }
            (Term::Atom(a), Term::Atom(b)) => a.cmp(b),
            (Term::Ref(a), Term::Ref(b)) => a.cmp(b),
            (Term::Tuple(a), Term::Tuple(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Term::Map(a), Term::Map(b)) => a.cmp(b),
            (Term::List(a), Term::List(b)) => cmp_lists(a, None, b, None),
            (Term::List(a), Term::Improper(b, bt)) => cmp_lists(a, None, b, Some(&**bt)),
            (Term::Improper(a, at), Term::List(b)) => cmp_lists(a, Some(&**at), b, None),
            (Term::Improper(a, at), Term::Improper(b, bt)) => {
                cmp_lists(a, Some(&**at), b, Some(&**bt))
            }
            (Term::Bits(a), Term::Bits(b)) => a.cmp(b),
            _ => unreachable!("rank mismatch already handled"),
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Term {}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(a) => write!(f, "{}", a),
            Term::Int(n) => write!(f, "{}", n),
            Term::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Term::Bits(b) => write!(f, "{}", b),
            Term::Ref(n) => write!(f, "#Ref<{}>", n),
            Term::Tuple(elems) => {
                write!(f, "{{")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
            Term::List(elems) => {
                write!(f, "[")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Term::Improper(elems, tail) => {
                write!(f, "[")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, " | {}]", tail)
            }
            Term::Map(m) => {
                write!(f, "#{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Default for Term {
    fn default() -> Self {
        Term::nil()
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Int(n)
    }
}

impl From<f64> for Term {
    fn from(f: f64) -> Self {
        Term::Float(f)
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::Atom(if b { SmolStr::new_static("true") } else { SmolStr::new_static("false") })
    }
}

impl From<BTreeMap<Term, Term>> for Term {
    fn from(m: BTreeMap<Term, Term>) -> Self {
        Term::Map(TermMap::from(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_source_syntax() {
        assert_eq!(Term::atom("ok").to_string(), "ok");
        assert_eq!(Term::int(-3).to_string(), "-3");
        assert_eq!(Term::float(1.0).to_string(), "1.0");
        assert_eq!(
            Term::tuple(vec![Term::atom("a"), Term::int(1)]).to_string(),
            "{a, 1}"
        );
        assert_eq!(
            Term::improper(vec![Term::int(1)], Term::int(2)).to_string(),
            "[1 | 2]"
        );
        assert_eq!(
            Term::map([(Term::atom("k"), Term::int(1))]).to_string(),
            "#{k => 1}"
        );
    }

    #[test]
    fn term_order_is_class_first() {
        let ordered = [
            Term::int(99),
            Term::atom("a"),
            Term::Ref(0),
            Term::tuple(vec![]),
            Term::map([]),
            Term::nil(),
            Term::binary(vec![0]),
        ];
        for w in ordered.windows(2) {
            assert!(w[0] < w[1], "{} should sort before {}", w[0], w[1]);
        }
    }

    #[test]
    fn numbers_compare_numerically_int_first_on_tie() {
        assert!(Term::int(1) < Term::int(2));
        assert!(Term::int(1) < Term::float(1.5));
        assert!(Term::float(0.5) < Term::int(1));
        assert!(Term::int(1) < Term::float(1.0));
        assert_ne!(Term::int(1), Term::float(1.0));
    }

    #[test]
    fn list_order_prefix_and_improper() {
        assert!(Term::nil() < Term::list(vec![Term::int(0)]));
        assert!(Term::list(vec![Term::int(1)]) < Term::list(vec![Term::int(1), Term::int(0)]));
        // Improper tail is a number, which sorts before the surviving cons.
        let improper = Term::improper(vec![Term::int(1)], Term::int(9));
        let longer = Term::list(vec![Term::int(1), Term::int(0)]);
        assert!(improper < longer);
    }

    #[test]
    fn improper_constructor_normalizes_list_tails() {
        let t = Term::improper(vec![Term::int(1)], Term::list(vec![Term::int(2)]));
        assert_eq!(t, Term::list(vec![Term::int(1), Term::int(2)]));

        let spliced = Term::improper(
            vec![Term::int(1)],
            Term::improper(vec![Term::int(2)], Term::atom("t")),
        );
        assert_eq!(
            spliced,
            Term::improper(vec![Term::int(1), Term::int(2)], Term::atom("t"))
        );
    }

    #[test]
    fn tuples_order_by_arity_then_elements() {
        assert!(Term::tuple(vec![Term::int(9)]) < Term::tuple(vec![Term::int(0), Term::int(0)]));
        assert!(
            Term::tuple(vec![Term::int(1), Term::int(2)])
                < Term::tuple(vec![Term::int(1), Term::int(3)])
        );
    }
}
