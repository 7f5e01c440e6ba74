//! Affine expressions over dimensions and symbols.
//!
//! Expressions are immutable and cheaply cloneable. Constructors fold constants eagerly; the heavier
//! rewrites (floordiv/mod elimination from variable bounds, term merging) live in [`AffineExpr::simplify`].

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::Arc;

use super::Interval;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AffineKind {
    Dim(usize),
    Symbol(usize),
    Constant(i64),
    Add(AffineExpr, AffineExpr),
    /// Multiplication by a constant.
    Mul(AffineExpr, i64),
    /// Floor division by a positive constant.
    FloorDiv(AffineExpr, i64),
    /// Euclidean remainder by a positive constant.
    Mod(AffineExpr, i64),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AffineExpr(Arc<AffineKind>);

impl AffineExpr {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn dim(index: usize) -> Self {
        Self(Arc::new(AffineKind::Dim(index)))
    }

    pub fn symbol(index: usize) -> Self {
        Self(Arc::new(AffineKind::Symbol(index)))
    }

    pub fn constant(value: i64) -> Self {
        Self(Arc::new(AffineKind::Constant(value)))
    }

    fn sum(lhs: Self, rhs: Self) -> Self {
        match (lhs.as_constant(), rhs.as_constant()) {
            (Some(a), Some(b)) => Self::constant(a + b),
            (Some(0), _) => rhs,
            (_, Some(0)) => lhs,
            _ => Self(Arc::new(AffineKind::Add(lhs, rhs))),
        }
    }

    fn product(self, factor: i64) -> Self {
        if factor == 0 {
            return Self::constant(0);
        }
        if factor == 1 {
            return self;
        }
        if let AffineKind::Constant(c) = *self.kind() {
            return Self::constant(c * factor);
        }
        if let AffineKind::Mul(inner, c) = self.kind() {
            return inner.clone().product(c * factor);
        }
        Self(Arc::new(AffineKind::Mul(self, factor)))
    }

    pub fn floor_div(self, divisor: i64) -> Self {
        assert!(divisor > 0, "floordiv by non-positive {divisor}");
        if divisor == 1 {
            return self;
        }
        match self.as_constant() {
            Some(c) => Self::constant(c.div_euclid(divisor)),
            None => Self(Arc::new(AffineKind::FloorDiv(self, divisor))),
        }
    }

    pub fn modulo(self, divisor: i64) -> Self {
        assert!(divisor > 0, "mod by non-positive {divisor}");
        if divisor == 1 {
            return Self::constant(0);
        }
        match self.as_constant() {
            Some(c) => Self::constant(c.rem_euclid(divisor)),
            None => Self(Arc::new(AffineKind::Mod(self, divisor))),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn kind(&self) -> &AffineKind {
        &self.0
    }

    pub fn as_constant(&self) -> Option<i64> {
        match *self.0 {
            AffineKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Visit this expression and every subexpression, parents first.
    pub fn walk(&self, f: &mut impl FnMut(&AffineExpr)) {
        f(self);
        match self.kind() {
            AffineKind::Add(a, b) => {
                a.walk(f);
                b.walk(f);
            }
            AffineKind::Mul(x, _) | AffineKind::FloorDiv(x, _) | AffineKind::Mod(x, _) => x.walk(f),
            AffineKind::Dim(_) | AffineKind::Symbol(_) | AffineKind::Constant(_) => {}
        }
    }

    pub fn uses_dim(&self, index: usize) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= matches!(*e.kind(), AffineKind::Dim(i) if i == index));
        found
    }

    pub fn uses_symbol(&self, index: usize) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= matches!(*e.kind(), AffineKind::Symbol(i) if i == index));
        found
    }

    /// Number of dimensions and symbols needed to evaluate this expression.
    pub fn arity(&self) -> (usize, usize) {
        let (mut dims, mut symbols) = (0, 0);
        self.walk(&mut |e| match *e.kind() {
            AffineKind::Dim(i) => dims = dims.max(i + 1),
            AffineKind::Symbol(i) => symbols = symbols.max(i + 1),
            _ => {}
        });
        (dims, symbols)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    pub fn evaluate(&self, dims: &[i64], symbols: &[i64]) -> i64 {
        match *self.kind() {
            AffineKind::Dim(i) => dims[i],
            AffineKind::Symbol(i) => symbols[i],
            AffineKind::Constant(c) => c,
            AffineKind::Add(ref a, ref b) => a.evaluate(dims, symbols) + b.evaluate(dims, symbols),
            AffineKind::Mul(ref x, c) => x.evaluate(dims, symbols) * c,
            AffineKind::FloorDiv(ref x, c) => x.evaluate(dims, symbols).div_euclid(c),
            AffineKind::Mod(ref x, c) => x.evaluate(dims, symbols).rem_euclid(c),
        }
    }

    /// Conservative range of the expression given ranges of its variables.
    pub fn range(&self, dims: &[Interval], symbols: &[Interval]) -> Interval {
        match *self.kind() {
            AffineKind::Dim(i) => dims[i],
            AffineKind::Symbol(i) => symbols[i],
            AffineKind::Constant(c) => Interval::point(c),
            AffineKind::Add(ref a, ref b) => a.range(dims, symbols).add(b.range(dims, symbols)),
            AffineKind::Mul(ref x, c) => x.range(dims, symbols).scale(c),
            AffineKind::FloorDiv(ref x, c) => x.range(dims, symbols).floor_div(c),
            AffineKind::Mod(ref x, c) => x.range(dims, symbols).modulo(c),
        }
    }

    /// Substitute every `d_i` by `dims[i]` and every `s_i` by `symbols[i]`.
    pub fn replace(&self, dims: &[AffineExpr], symbols: &[AffineExpr]) -> AffineExpr {
        match *self.kind() {
            AffineKind::Dim(i) => dims[i].clone(),
            AffineKind::Symbol(i) => symbols[i].clone(),
            AffineKind::Constant(_) => self.clone(),
            AffineKind::Add(ref a, ref b) => a.replace(dims, symbols) + b.replace(dims, symbols),
            AffineKind::Mul(ref x, c) => x.replace(dims, symbols) * c,
            AffineKind::FloorDiv(ref x, c) => x.replace(dims, symbols).floor_div(c),
            AffineKind::Mod(ref x, c) => x.replace(dims, symbols).modulo(c),
        }
    }

    // =========================================================================
    // Simplification
    // =========================================================================

    /// Rewrite into a canonical sum of terms, using the variable ranges to remove floordiv and mod where the
    /// result is determined by the bounds.
    ///
    /// The result evaluates identically to `self` at every point inside `dims` x `symbols`.
    pub fn simplify(&self, dims: &[Interval], symbols: &[Interval]) -> AffineExpr {
        Simplifier { dims, symbols }.simplify(self)
    }
}

// ============================================================================
// Operators
// ============================================================================

impl Add for AffineExpr {
    type Output = AffineExpr;

    fn add(self, rhs: AffineExpr) -> AffineExpr {
        AffineExpr::sum(self, rhs)
    }
}

impl Add<i64> for AffineExpr {
    type Output = AffineExpr;

    fn add(self, rhs: i64) -> AffineExpr {
        AffineExpr::sum(self, AffineExpr::constant(rhs))
    }
}

impl Sub for AffineExpr {
    type Output = AffineExpr;

    fn sub(self, rhs: AffineExpr) -> AffineExpr {
        AffineExpr::sum(self, rhs.product(-1))
    }
}

impl Sub<i64> for AffineExpr {
    type Output = AffineExpr;

    fn sub(self, rhs: i64) -> AffineExpr {
        AffineExpr::sum(self, AffineExpr::constant(-rhs))
    }
}

impl Mul<i64> for AffineExpr {
    type Output = AffineExpr;

    fn mul(self, rhs: i64) -> AffineExpr {
        self.product(rhs)
    }
}

/// Product of two expressions; one side must be a constant for the result to stay affine.
impl Mul for AffineExpr {
    type Output = AffineExpr;

    fn mul(self, rhs: AffineExpr) -> AffineExpr {
        match (self.as_constant(), rhs.as_constant()) {
            (Some(c), _) => rhs.product(c),
            (_, Some(c)) => self.product(c),
            _ => panic!("non-affine product {self} * {rhs}"),
        }
    }
}

impl Neg for AffineExpr {
    type Output = AffineExpr;

    fn neg(self) -> AffineExpr {
        self.product(-1)
    }
}

impl From<i64> for AffineExpr {
    fn from(value: i64) -> Self {
        AffineExpr::constant(value)
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn operand(f: &mut fmt::Formatter<'_>, e: &AffineExpr) -> fmt::Result {
            match e.kind() {
                AffineKind::Add(..) => write!(f, "({e})"),
                _ => write!(f, "{e}"),
            }
        }

        match self.kind() {
            AffineKind::Dim(i) => write!(f, "d{i}"),
            AffineKind::Symbol(i) => write!(f, "s{i}"),
            AffineKind::Constant(c) => write!(f, "{c}"),
            AffineKind::Add(a, b) => match b.kind() {
                AffineKind::Constant(c) if *c < 0 => write!(f, "{a} - {}", -c),
                AffineKind::Mul(x, -1) => {
                    write!(f, "{a} - ")?;
                    operand(f, x)
                }
                AffineKind::Mul(x, c) if *c < 0 => {
                    write!(f, "{a} - ")?;
                    operand(f, x)?;
                    write!(f, " * {}", -c)
                }
                _ => write!(f, "{a} + {b}"),
            },
            AffineKind::Mul(x, c) => {
                operand(f, x)?;
                write!(f, " * {c}")
            }
            AffineKind::FloorDiv(x, c) => {
                operand(f, x)?;
                write!(f, " floordiv {c}")
            }
            AffineKind::Mod(x, c) => {
                operand(f, x)?;
                write!(f, " mod {c}")
            }
        }
    }
}

impl fmt::Debug for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

// ============================================================================
// Simplifier
// ============================================================================

/// Sum of `coefficient * atom` terms plus a constant. Atoms are dimensions, symbols, floordivs and mods.
#[derive(Debug, Default, Clone)]
struct Linear {
    terms: Vec<(AffineExpr, i64)>,
    constant: i64,
}

impl Linear {
    fn add_term(&mut self, atom: AffineExpr, coefficient: i64) {
        match self.terms.iter().position(|(a, _)| *a == atom) {
            Some(pos) => {
                self.terms[pos].1 += coefficient;
                if self.terms[pos].1 == 0 {
                    self.terms.remove(pos);
                }
            }
            None if coefficient != 0 => self.terms.push((atom, coefficient)),
            None => {}
        }
    }

    /// Flatten an already simplified expression.
    fn collect(&mut self, expr: &AffineExpr, coefficient: i64) {
        match *expr.kind() {
            AffineKind::Constant(c) => self.constant += c * coefficient,
            AffineKind::Add(ref a, ref b) => {
                self.collect(a, coefficient);
                self.collect(b, coefficient);
            }
            AffineKind::Mul(ref x, c) => self.collect(x, coefficient * c),
            _ => self.add_term(expr.clone(), coefficient),
        }
    }

    fn of(expr: &AffineExpr) -> Self {
        let mut linear = Self::default();
        linear.collect(expr, 1);
        linear
    }

    /// `x mod c * k + x floordiv c * (c * k)` is `x * k`.
    fn recombine(&mut self) {
        loop {
            let found = self.terms.iter().enumerate().find_map(|(i, (atom, k))| {
                let AffineKind::Mod(x, c) = atom.kind() else { return None };
                let quotient = AffineExpr(Arc::new(AffineKind::FloorDiv(x.clone(), *c)));
                let j = self.terms.iter().position(|(a, q)| *a == quotient && *q == k * c)?;
                Some((i, j, x.clone(), *k))
            });
            let Some((i, j, x, k)) = found else { break };
            let (first, second) = (i.max(j), i.min(j));
            self.terms.remove(first);
            self.terms.remove(second);
            self.collect(&x, k);
        }
    }

    /// Split off the terms that are multiples of `divisor`: `self = divisor * quotient + rest`.
    fn split(&self, divisor: i64) -> (Linear, Linear) {
        let mut quotient = Linear { terms: Vec::new(), constant: self.constant.div_euclid(divisor) };
        let mut rest = Linear { terms: Vec::new(), constant: self.constant.rem_euclid(divisor) };
        for (atom, k) in &self.terms {
            if k % divisor == 0 {
                quotient.terms.push((atom.clone(), k / divisor));
            } else {
                rest.terms.push((atom.clone(), *k));
            }
        }
        (quotient, rest)
    }

    fn single_atom(&self) -> Option<&AffineExpr> {
        match self.terms.as_slice() {
            [(atom, 1)] if self.constant == 0 => Some(atom),
            _ => None,
        }
    }

    fn into_expr(mut self) -> AffineExpr {
        self.terms.sort_by_cached_key(|(atom, _)| match *atom.kind() {
            AffineKind::Dim(i) => (0, i, String::new()),
            AffineKind::Symbol(i) => (1, i, String::new()),
            _ => (2, 0, atom.to_string()),
        });
        let constant = self.constant;
        let sum = self.terms.into_iter().map(|(atom, k)| atom * k).reduce(|acc, term| acc + term);
        match sum {
            Some(sum) => sum + constant,
            None => AffineExpr::constant(constant),
        }
    }
}

struct Simplifier<'a> {
    dims: &'a [Interval],
    symbols: &'a [Interval],
}

impl Simplifier<'_> {
    fn range(&self, expr: &AffineExpr) -> Interval {
        expr.range(self.dims, self.symbols)
    }

    fn simplify(&self, expr: &AffineExpr) -> AffineExpr {
        let mut linear = Linear::default();
        self.flatten(expr, 1, &mut linear);
        linear.recombine();
        linear.into_expr()
    }

    fn flatten(&self, expr: &AffineExpr, coefficient: i64, out: &mut Linear) {
        match *expr.kind() {
            AffineKind::Dim(i) if self.dims[i].is_point() => out.constant += self.dims[i].lower * coefficient,
            AffineKind::Symbol(i) if self.symbols[i].is_point() => out.constant += self.symbols[i].lower * coefficient,
            AffineKind::Dim(_) | AffineKind::Symbol(_) => out.add_term(expr.clone(), coefficient),
            AffineKind::Constant(c) => out.constant += c * coefficient,
            AffineKind::Add(ref a, ref b) => {
                self.flatten(a, coefficient, out);
                self.flatten(b, coefficient, out);
            }
            AffineKind::Mul(ref x, c) => self.flatten(x, coefficient * c, out),
            AffineKind::FloorDiv(ref x, c) => {
                let simplified = self.floor_div(Linear::of(&self.simplify(x)), c);
                out.collect(&simplified, coefficient);
            }
            AffineKind::Mod(ref x, c) => {
                let simplified = self.modulo(Linear::of(&self.simplify(x)), c);
                out.collect(&simplified, coefficient);
            }
        }
    }

    fn floor_div(&self, numerator: Linear, divisor: i64) -> AffineExpr {
        let (quotient, rest) = numerator.split(divisor);
        let extracted = !quotient.terms.is_empty() || quotient.constant != 0;

        // (y floordiv a) floordiv b == y floordiv (a * b)
        if !extracted && let Some(atom) = rest.single_atom() && let AffineKind::FloorDiv(y, a) = atom.kind() {
            return self.floor_div(Linear::of(y), a * divisor);
        }

        let rest = rest.into_expr();
        let range = self.range(&rest);
        let tail = if !range.is_empty() && range.lower.div_euclid(divisor) == range.upper.div_euclid(divisor) {
            AffineExpr::constant(range.lower.div_euclid(divisor))
        } else {
            rest.floor_div(divisor)
        };
        quotient.into_expr() + tail
    }

    fn modulo(&self, numerator: Linear, divisor: i64) -> AffineExpr {
        let (_, rest) = numerator.split(divisor);

        // (y mod a) mod b == y mod b when b divides a
        if let Some(atom) = rest.single_atom() && let AffineKind::Mod(y, a) = atom.kind() && a % divisor == 0 {
            return self.modulo(Linear::of(y), divisor);
        }

        let rest = rest.into_expr();
        let range = self.range(&rest);
        if !range.is_empty() && range.lower.div_euclid(divisor) == range.upper.div_euclid(divisor) {
            rest - divisor * range.lower.div_euclid(divisor)
        } else {
            rest.modulo(divisor)
        }
    }
}
