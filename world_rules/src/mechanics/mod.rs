//! Game mechanics: the shared expression resolver used by passages, combat
//! and triggers.
//!
//! The resolver is a seam. Everything that needs "resolve an expression
//! against actor attributes" takes a `&mut dyn ExpressionResolver`; the
//! default [`DiceResolver`] parses a small dice-and-comparison language and
//! draws its randomness from a [`RollSource`].

mod attributes;
mod expression;

pub use attributes::*;
pub use expression::Expr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    /// Booleans as-is, numbers true when non-zero.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
        }
    }

    pub fn as_number(&self) -> Result<f64, ResolveError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(_) => Err(ResolveError::TypeMismatch {
                expected: "number",
                found: "boolean",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("syntax error at {position} in `{expr}`: {message}")]
    Syntax {
        expr: String,
        position: usize,
        message: String,
    },

    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("expected a {expected}, found a {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid dice `{0}`")]
    InvalidDice(String),

    #[error("division by zero")]
    DivisionByZero,
}

/// Source of attribute values for expression evaluation.
pub trait AttributeSource {
    /// Look up an attribute path such as `skill.attack` or `target.armor`.
    ///
    /// `None` means the path itself is not understood.
    fn lookup(&self, path: &str) -> Option<f64>;
}

/// Attribute source with nothing in it.
pub struct NoAttributes;

impl AttributeSource for NoAttributes {
    fn lookup(&self, _path: &str) -> Option<f64> {
        None
    }
}

/// Source of die rolls.
pub trait RollSource {
    /// Roll one die with `sides` faces (1..=sides).
    fn roll(&mut self, sides: u32) -> u32;
}

/// Seeded pseudo-random rolls, reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct SeededRolls {
    rng: StdRng,
}

impl SeededRolls {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RollSource for SeededRolls {
    fn roll(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// Predetermined rolls, for replays and tests.
///
/// Each roll takes the next scripted value (clamped to the die); when the
/// script runs out, `fallback` is used.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRolls {
    script: VecDeque<u32>,
    fallback: u32,
}

impl ScriptedRolls {
    pub fn new(script: impl IntoIterator<Item = u32>, fallback: u32) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl RollSource for ScriptedRolls {
    fn roll(&mut self, sides: u32) -> u32 {
        let value = self.script.pop_front().unwrap_or(self.fallback);
        value.clamp(1, sides.max(1))
    }
}

/// Resolve an expression against attributes.
pub trait ExpressionResolver {
    fn evaluate(&mut self, expr: &str, attrs: &dyn AttributeSource) -> Result<Value, ResolveError>;

    /// Evaluate as a condition.
    fn check(&mut self, expr: &str, attrs: &dyn AttributeSource) -> Result<bool, ResolveError> {
        Ok(self.evaluate(expr, attrs)?.truthy())
    }

    /// Evaluate as a quantity.
    fn roll(&mut self, expr: &str, attrs: &dyn AttributeSource) -> Result<f64, ResolveError> {
        self.evaluate(expr, attrs)?.as_number()
    }
}

/// Default resolver for the dice expression language.
#[derive(Debug, Clone)]
pub struct DiceResolver<R: RollSource = SeededRolls> {
    rolls: R,
}

impl DiceResolver<SeededRolls> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(SeededRolls::new(seed))
    }
}

impl<R: RollSource> DiceResolver<R> {
    pub fn new(rolls: R) -> Self {
        Self { rolls }
    }

    pub fn rolls(&self) -> &R {
        &self.rolls
    }
}

impl<R: RollSource> ExpressionResolver for DiceResolver<R> {
    fn evaluate(&mut self, expr: &str, attrs: &dyn AttributeSource) -> Result<Value, ResolveError> {
        let parsed = Expr::parse(expr)?;
        parsed.eval(attrs, &mut self.rolls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapAttributes(HashMap<&'static str, f64>);

    impl AttributeSource for MapAttributes {
        fn lookup(&self, path: &str) -> Option<f64> {
            self.0.get(path).copied()
        }
    }

    #[test]
    fn test_value_coercions() {
        assert!(Value::Number(2.0).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Bool(true).as_number().is_err());
    }

    #[test]
    fn test_seeded_rolls_are_reproducible() {
        let mut a = SeededRolls::new(7);
        let mut b = SeededRolls::new(7);
        let first: Vec<_> = (0..10).map(|_| a.roll(20)).collect();
        let second: Vec<_> = (0..10).map(|_| b.roll(20)).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|r| (1..=20).contains(r)));
    }

    #[test]
    fn test_scripted_rolls() {
        let mut rolls = ScriptedRolls::new([4, 30], 1);
        assert_eq!(rolls.roll(6), 4);
        assert_eq!(rolls.roll(6), 6);
        assert_eq!(rolls.roll(6), 1);
        assert_eq!(rolls.remaining(), 0);
    }

    #[test]
    fn test_resolver_checks_and_rolls() {
        let attrs = MapAttributes(HashMap::from([("skill.attack", 3.0), ("target.armor", 2.0)]));
        let mut resolver = DiceResolver::new(ScriptedRolls::new([10, 4], 1));

        assert!(resolver.check("d20 + skill.attack >= 10 + target.armor", &attrs).unwrap());
        assert_eq!(resolver.roll("1d6 + 1", &attrs).unwrap(), 5.0);
        assert!(resolver.roll("1 < 2", &attrs).is_err());
    }
}
