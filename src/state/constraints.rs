use std::fmt;

use z3::ast::Bool;

/// Ordered path constraints; satisfiability is that of their conjunction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints<'ctx> {
    items: Vec<Bool<'ctx>>,
}

impl<'ctx> Constraints<'ctx> {
    pub fn new() -> Self {
        Constraints { items: Vec::new() }
    }

    pub fn append(&mut self, constraint: Bool<'ctx>) {
        self.items.push(constraint);
    }

    /// A copy of these constraints with `extra` appended. The original members
    /// are always kept, so the result only ever narrows the path.
    pub fn narrowed<I>(&self, extra: I) -> Constraints<'ctx>
    where
        I: IntoIterator<Item = Bool<'ctx>>,
    {
        let mut items = self.items.clone();
        items.extend(extra);
        Constraints { items }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bool<'ctx>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when every member of `self` appears, in order, as a prefix of `other`.
    pub fn is_prefix_of(&self, other: &Constraints<'ctx>) -> bool {
        self.items.len() <= other.items.len()
            && self.items.iter().zip(other.items.iter()).all(|(a, b)| a == b)
    }
}

impl<'ctx> FromIterator<Bool<'ctx>> for Constraints<'ctx> {
    fn from_iter<T: IntoIterator<Item = Bool<'ctx>>>(iter: T) -> Self {
        Constraints {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'ctx> fmt::Display for Constraints<'ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for constraint in &self.items {
            writeln!(f, "{}", constraint)?;
        }
        Ok(())
    }
}
