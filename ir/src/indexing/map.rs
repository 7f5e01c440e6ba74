use std::fmt;

use smallvec::SmallVec;

use super::{AffineExpr, Interval};
use crate::shape::Index;

/// A named, bounded dimension or symbol of an indexing map domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub name: String,
    pub bounds: Interval,
}

impl Variable {
    pub fn new(name: impl Into<String>, bounds: Interval) -> Self {
        Self { name: name.into(), bounds }
    }
}

/// Symbolic affine function from `(dimensions)[symbols]` to a tuple of results.
///
/// The domain is the box of dimension and symbol bounds, restricted by `constraints`: each constraint is an
/// expression that must evaluate inside its interval. A map is a pure value; every operation returns a new
/// map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexingMap {
    dimensions: Vec<Variable>,
    symbols: Vec<Variable>,
    results: SmallVec<[AffineExpr; 4]>,
    constraints: Vec<(AffineExpr, Interval)>,
}

impl IndexingMap {
    /// # Panics
    ///
    /// If a result or constraint refers to a dimension or symbol that is not declared.
    pub fn new(
        dimensions: Vec<Variable>,
        symbols: Vec<Variable>,
        results: impl IntoIterator<Item = AffineExpr>,
        constraints: Vec<(AffineExpr, Interval)>,
    ) -> Self {
        let results: SmallVec<[AffineExpr; 4]> = results.into_iter().collect();
        for expr in results.iter().chain(constraints.iter().map(|(e, _)| e)) {
            let (dims, syms) = expr.arity();
            assert!(dims <= dimensions.len(), "{expr} uses an undeclared dimension (domain has {})", dimensions.len());
            assert!(syms <= symbols.len(), "{expr} uses an undeclared symbol (domain has {})", symbols.len());
        }
        Self { dimensions, symbols, results, constraints }
    }

    /// Identity on a box of the given sizes.
    pub fn identity(shape: &[usize]) -> Self {
        let dimensions = shape.iter().enumerate().map(|(i, &d)| Variable::new(format!("d{i}"), Interval::extent(d)));
        Self::new(dimensions.collect(), Vec::new(), (0..shape.len()).map(AffineExpr::dim), Vec::new())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn dimensions(&self) -> &[Variable] {
        &self.dimensions
    }

    pub fn symbols(&self) -> &[Variable] {
        &self.symbols
    }

    pub fn results(&self) -> &[AffineExpr] {
        &self.results
    }

    pub fn constraints(&self) -> &[(AffineExpr, Interval)] {
        &self.constraints
    }

    pub fn dimension_bounds(&self) -> SmallVec<[Interval; 4]> {
        self.dimensions.iter().map(|v| v.bounds).collect()
    }

    pub fn symbol_bounds(&self) -> SmallVec<[Interval; 4]> {
        self.symbols.iter().map(|v| v.bounds).collect()
    }

    /// Conservative range of each result over the domain box.
    pub fn result_ranges(&self) -> SmallVec<[Interval; 4]> {
        let (dims, syms) = (self.dimension_bounds(), self.symbol_bounds());
        self.results.iter().map(|r| r.range(&dims, &syms)).collect()
    }

    // =========================================================================
    // Transformations
    // =========================================================================

    /// Add a constraint `expr in interval`.
    pub fn with_constraint(mut self, expr: AffineExpr, interval: Interval) -> Self {
        let (dims, syms) = expr.arity();
        assert!(dims <= self.dimensions.len() && syms <= self.symbols.len(), "{expr} uses undeclared variables");
        self.constraints.push((expr, interval));
        self
    }

    /// The map `next(self(x))`.
    ///
    /// The symbols of `next` are appended after the symbols of `self`, and the dimension bounds of `next`
    /// become constraints on the results of `self`.
    ///
    /// # Panics
    ///
    /// If the number of results of `self` differs from the number of dimensions of `next`.
    pub fn compose(&self, next: &IndexingMap) -> IndexingMap {
        assert_eq!(
            self.results.len(),
            next.dimensions.len(),
            "cannot compose a map with {} results into a map with {} dimensions",
            self.results.len(),
            next.dimensions.len()
        );

        let offset = self.symbols.len();
        let symbol_replacements: Vec<_> = (0..next.symbols.len()).map(|i| AffineExpr::symbol(offset + i)).collect();
        let substitute = |expr: &AffineExpr| expr.replace(&self.results, &symbol_replacements);

        let mut constraints = self.constraints.clone();
        for (result, variable) in self.results.iter().zip(&next.dimensions) {
            constraints.push((result.clone(), variable.bounds));
        }
        constraints.extend(next.constraints.iter().map(|(expr, interval)| (substitute(expr), *interval)));

        let mut symbols = self.symbols.clone();
        symbols.extend(next.symbols.iter().cloned());

        IndexingMap::new(self.dimensions.clone(), symbols, next.results.iter().map(substitute), constraints)
    }

    /// Simplify results and constraints using the domain bounds.
    ///
    /// Constraints on a single variable are folded into its bounds, constraints implied by the bounds are
    /// dropped and constraints on the same expression are intersected. The simplified map evaluates identically
    /// on every point of the original domain.
    pub fn simplify(mut self) -> Self {
        // Tightening one bound can make another constraint trivially true; a handful of rounds is enough for
        // the maps built here.
        for _ in 0..4 {
            let before = (self.dimension_bounds(), self.symbol_bounds(), self.constraints.len());
            self.tighten_bounds();
            let (dims, syms) = (self.dimension_bounds(), self.symbol_bounds());

            let mut constraints: Vec<(AffineExpr, Interval)> = Vec::new();
            for (expr, interval) in std::mem::take(&mut self.constraints) {
                let expr = expr.simplify(&dims, &syms);
                if interval.covers(expr.range(&dims, &syms)) {
                    continue;
                }
                match constraints.iter_mut().find(|(e, _)| *e == expr) {
                    Some((_, known)) => *known = known.intersect(interval),
                    None => constraints.push((expr, interval)),
                }
            }
            self.constraints = constraints;

            if before == (self.dimension_bounds(), self.symbol_bounds(), self.constraints.len()) {
                break;
            }
        }

        let (dims, syms) = (self.dimension_bounds(), self.symbol_bounds());
        self.results = self.results.iter().map(|r| r.simplify(&dims, &syms)).collect();
        self
    }

    /// Fold constraints of the form `a * x + k in [lo, hi]` (a > 0) into the bounds of `x`.
    fn tighten_bounds(&mut self) {
        let (dims, syms) = (self.dimension_bounds(), self.symbol_bounds());
        let mut remaining = Vec::with_capacity(self.constraints.len());

        for (expr, interval) in std::mem::take(&mut self.constraints) {
            let expr = expr.simplify(&dims, &syms);
            let Some((variable, factor, offset)) = single_variable(&expr) else {
                remaining.push((expr, interval));
                continue;
            };
            let lower = -(offset - interval.lower).div_euclid(factor);
            let upper = (interval.upper - offset).div_euclid(factor);
            let slot = match variable {
                VariableRef::Dim(i) => &mut self.dimensions[i].bounds,
                VariableRef::Symbol(i) => &mut self.symbols[i].bounds,
            };
            *slot = slot.intersect(Interval::new(lower, upper));
        }

        self.constraints = remaining;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Evaluate at a point; `None` if the point is outside the domain or violates a constraint.
    pub fn evaluate(&self, dims: &[i64], symbols: &[i64]) -> Option<Index> {
        assert_eq!(dims.len(), self.dimensions.len(), "expected {} dimension values", self.dimensions.len());
        assert_eq!(symbols.len(), self.symbols.len(), "expected {} symbol values", self.symbols.len());

        let in_box = dims.iter().zip(&self.dimensions).all(|(&v, var)| var.bounds.contains(v))
            && symbols.iter().zip(&self.symbols).all(|(&v, var)| var.bounds.contains(v));
        if !in_box || !self.constraints.iter().all(|(e, interval)| interval.contains(e.evaluate(dims, symbols))) {
            return None;
        }
        Some(self.results.iter().map(|r| r.evaluate(dims, symbols)).collect())
    }

    /// All symbol tuples of the domain box, last symbol fastest.
    pub fn symbol_points(&self) -> Points {
        Points::new(self.symbol_bounds())
    }

    /// All dimension tuples of the domain box, last dimension fastest.
    pub fn dimension_points(&self) -> Points {
        Points::new(self.dimension_bounds())
    }

    /// Whether the domain is provably empty (an empty bound or a constraint that can never hold).
    pub fn is_known_empty(&self) -> bool {
        let (dims, syms) = (self.dimension_bounds(), self.symbol_bounds());
        dims.iter().chain(syms.iter()).any(Interval::is_empty)
            || self.constraints.iter().any(|(e, interval)| e.range(&dims, &syms).intersect(*interval).is_empty())
    }
}

enum VariableRef {
    Dim(usize),
    Symbol(usize),
}

/// Match `factor * variable + offset` with a positive factor.
fn single_variable(expr: &AffineExpr) -> Option<(VariableRef, i64, i64)> {
    use super::AffineKind;

    let (term, offset) = match expr.kind() {
        AffineKind::Add(term, constant) => (term, constant.as_constant()?),
        _ => (expr, 0),
    };
    let (atom, factor) = match term.kind() {
        AffineKind::Mul(atom, factor) if *factor > 0 => (atom, *factor),
        _ => (term, 1),
    };
    match *atom.kind() {
        AffineKind::Dim(i) => Some((VariableRef::Dim(i), factor, offset)),
        AffineKind::Symbol(i) => Some((VariableRef::Symbol(i), factor, offset)),
        _ => None,
    }
}

/// Row-major iterator over the integer points of a box.
#[derive(Debug, Clone)]
pub struct Points {
    bounds: SmallVec<[Interval; 4]>,
    next: Option<Index>,
}

impl Points {
    fn new(bounds: SmallVec<[Interval; 4]>) -> Self {
        let next = (!bounds.iter().any(Interval::is_empty)).then(|| bounds.iter().map(|b| b.lower).collect());
        Self { bounds, next }
    }
}

impl Iterator for Points {
    type Item = Index;

    fn next(&mut self) -> Option<Index> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        for (value, bound) in advanced.iter_mut().zip(&self.bounds).rev() {
            if *value < bound.upper {
                *value += 1;
                self.next = Some(advanced);
                return Some(current);
            }
            *value = bound.lower;
        }
        Some(current)
    }
}

impl fmt::Display for IndexingMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: Vec<String>| items.join(", ");
        let dims = join((0..self.dimensions.len()).map(|i| format!("d{i}")).collect());
        let syms = join((0..self.symbols.len()).map(|i| format!("s{i}")).collect());
        let results = join(self.results.iter().map(ToString::to_string).collect());

        write!(f, "({dims})")?;
        if !self.symbols.is_empty() {
            write!(f, "[{syms}]")?;
        }
        writeln!(f, " -> ({results}),")?;
        writeln!(f, "domain:")?;
        for (i, variable) in self.dimensions.iter().enumerate() {
            writeln!(f, "d{i} in {}  // {}", variable.bounds, variable.name)?;
        }
        for (i, variable) in self.symbols.iter().enumerate() {
            writeln!(f, "s{i} in {}  // {}", variable.bounds, variable.name)?;
        }
        for (expr, interval) in &self.constraints {
            writeln!(f, "{expr} in {interval}")?;
        }
        Ok(())
    }
}
