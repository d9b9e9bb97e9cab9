//! Parser and evaluator for the dice expression language.
//!
//! ```text
//! expr    := or
//! or      := and ("or" and)*
//! and     := compare ("and" compare)*
//! compare := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := ("-" | "not") unary | atom
//! atom    := number | dice | "true" | "false" | path | "(" expr ")"
//! dice    := [count] "d" sides
//! ```

use super::{AttributeSource, ResolveError, RollSource, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Dice { count: u32, sides: u32 },
    Attribute(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const MAX_DICE: u32 = 100;
/// Deepest run of prefix operators and parentheses the parser accepts.
const MAX_DEPTH: usize = 64;

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ResolveError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // `2d6` lexes as a single identifier-like dice token.
            if i < chars.len() && chars[i] == 'd' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
                continue;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| syntax(source, start, "bad number"))?;
            tokens.push((start, Token::Number(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
            continue;
        }

        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let op = match two.as_str() {
            "==" => Some("=="),
            "!=" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            _ => None,
        };
        if let Some(op) = op {
            tokens.push((start, Token::Op(op)));
            i += 2;
            continue;
        }

        let token = match c {
            '+' => Token::Op("+"),
            '-' => Token::Op("-"),
            '*' => Token::Op("*"),
            '/' => Token::Op("/"),
            '<' => Token::Op("<"),
            '>' => Token::Op(">"),
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => return Err(syntax(source, start, &format!("unexpected `{c}`"))),
        };
        tokens.push((start, token));
        i += 1;
    }

    Ok(tokens)
}

fn syntax(expr: &str, position: usize, message: &str) -> ResolveError {
    ResolveError::Syntax {
        expr: expr.to_string(),
        position,
        message: message.to_string(),
    }
}

/// Parse `[count]d<sides>`; `None` if the identifier is not dice.
fn parse_dice(ident: &str) -> Option<Result<(u32, u32), ResolveError>> {
    let (count, sides) = ident.split_once('d')?;
    if sides.is_empty() || !sides.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !count.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let count = if count.is_empty() { Ok(1) } else { count.parse::<u32>() };
    let parsed = match (count, sides.parse::<u32>()) {
        (Ok(count), Ok(sides)) if count > 0 && count <= MAX_DICE && sides > 0 => Ok((count, sides)),
        _ => Err(ResolveError::InvalidDice(ident.to_string())),
    };
    Some(parsed)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(at, _)| *at)
            .unwrap_or(self.source.len())
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword)) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    /// Run a nested parse one level deeper, refusing past [`MAX_DEPTH`].
    fn nested(
        &mut self,
        at: usize,
        parse: impl FnOnce(&mut Self) -> Result<Expr, ResolveError>,
    ) -> Result<Expr, ResolveError> {
        if self.depth >= MAX_DEPTH {
            return Err(syntax(self.source, at, "expression nested too deeply"));
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn or(&mut self) -> Result<Expr, ResolveError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ResolveError> {
        let mut left = self.compare()?;
        while self.eat_keyword("and") {
            let right = self.compare()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn compare(&mut self) -> Result<Expr, ResolveError> {
        let left = self.sum()?;
        let Some(op) = self.eat_op(&["==", "!=", "<", "<=", ">", ">="]) else {
            return Ok(left);
        };
        let op = match op {
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            _ => BinaryOp::Ge,
        };
        let right = self.sum()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn sum(&mut self) -> Result<Expr, ResolveError> {
        let mut left = self.product()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.product()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<Expr, ResolveError> {
        let mut left = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let right = self.unary()?;
            let op = if op == "*" { BinaryOp::Mul } else { BinaryOp::Div };
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ResolveError> {
        let at = self.offset();
        if self.eat_op(&["-"]).is_some() {
            let inner = self.nested(at, Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat_keyword("not") {
            let inner = self.nested(at, Self::unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, ResolveError> {
        let at = self.offset();
        let Some(token) = self.peek().cloned() else {
            return Err(syntax(self.source, at, "unexpected end of expression"));
        };
        self.pos += 1;

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::LParen => {
                let inner = self.nested(at, Self::or)?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(syntax(self.source, self.offset(), "expected `)`")),
                }
            }
            Token::Ident(word) => {
                if word.eq_ignore_ascii_case("true") {
                    return Ok(Expr::Bool(true));
                }
                if word.eq_ignore_ascii_case("false") {
                    return Ok(Expr::Bool(false));
                }
                if let Some(dice) = parse_dice(&word) {
                    let (count, sides) = dice?;
                    return Ok(Expr::Dice { count, sides });
                }
                Ok(Expr::Attribute(word))
            }
            Token::Op(op) => Err(syntax(self.source, at, &format!("unexpected `{op}`"))),
            Token::RParen => Err(syntax(self.source, at, "unexpected `)`")),
        }
    }
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, ResolveError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.or()?;
        if parser.pos < parser.tokens.len() {
            return Err(syntax(source, parser.offset(), "trailing input"));
        }
        Ok(expr)
    }

    pub fn eval(&self, attrs: &dyn AttributeSource, rolls: &mut dyn RollSource) -> Result<Value, ResolveError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Dice { count, sides } => {
                let total: u64 = (0..*count).map(|_| u64::from(rolls.roll(*sides))).sum();
                Ok(Value::Number(total as f64))
            }
            Expr::Attribute(path) => attrs
                .lookup(path)
                .map(Value::Number)
                .ok_or_else(|| ResolveError::UnknownAttribute(path.clone())),
            Expr::Neg(inner) => Ok(Value::Number(-inner.eval(attrs, rolls)?.as_number()?)),
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval(attrs, rolls)?.truthy())),
            Expr::Binary(BinaryOp::And, left, right) => {
                if !left.eval(attrs, rolls)?.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(right.eval(attrs, rolls)?.truthy()))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                if left.eval(attrs, rolls)?.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(right.eval(attrs, rolls)?.truthy()))
            }
            Expr::Binary(op, left, right) => {
                let lhs = left.eval(attrs, rolls)?;
                let rhs = right.eval(attrs, rolls)?;
                binary(*op, lhs, rhs)
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ResolveError> {
    let value = match op {
        BinaryOp::Eq => Value::Bool(lhs == rhs),
        BinaryOp::Ne => Value::Bool(lhs != rhs),
        BinaryOp::And => Value::Bool(lhs.truthy() && rhs.truthy()),
        BinaryOp::Or => Value::Bool(lhs.truthy() || rhs.truthy()),
        BinaryOp::Add => Value::Number(lhs.as_number()? + rhs.as_number()?),
        BinaryOp::Sub => Value::Number(lhs.as_number()? - rhs.as_number()?),
        BinaryOp::Mul => Value::Number(lhs.as_number()? * rhs.as_number()?),
        BinaryOp::Div => {
            let (a, b) = (lhs.as_number()?, rhs.as_number()?);
            if b == 0.0 {
                return Err(ResolveError::DivisionByZero);
            }
            Value::Number(a / b)
        }
        BinaryOp::Lt => Value::Bool(lhs.as_number()? < rhs.as_number()?),
        BinaryOp::Le => Value::Bool(lhs.as_number()? <= rhs.as_number()?),
        BinaryOp::Gt => Value::Bool(lhs.as_number()? > rhs.as_number()?),
        BinaryOp::Ge => Value::Bool(lhs.as_number()? >= rhs.as_number()?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanics::{NoAttributes, ScriptedRolls};

    fn eval(source: &str) -> Result<Value, ResolveError> {
        let mut rolls = ScriptedRolls::new(Vec::new(), 3);
        Expr::parse(source)?.eval(&NoAttributes, &mut rolls)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Number(9.0));
        assert_eq!(eval("-2 + 5").unwrap(), Value::Number(3.0));
        assert_eq!(eval("1 + 1 == 2 and not false").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 > 2 or 3 >= 3").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_dice_parsing() {
        assert_eq!(Expr::parse("2d6").unwrap(), Expr::Dice { count: 2, sides: 6 });
        assert_eq!(Expr::parse("d20").unwrap(), Expr::Dice { count: 1, sides: 20 });
        assert_eq!(eval("2d6 + 1").unwrap(), Value::Number(7.0));
        assert!(matches!(Expr::parse("0d6"), Err(ResolveError::InvalidDice(_))));
    }

    #[test]
    fn test_attribute_paths() {
        assert_eq!(
            Expr::parse("target.skill.dodge").unwrap(),
            Expr::Attribute("target.skill.dodge".into())
        );
        assert!(matches!(eval("skill.attack"), Err(ResolveError::UnknownAttribute(_))));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(eval("1 +"), Err(ResolveError::Syntax { .. })));
        assert!(matches!(eval("(1 + 2"), Err(ResolveError::Syntax { .. })));
        assert!(matches!(eval("1 2"), Err(ResolveError::Syntax { .. })));
        assert!(matches!(eval("1 $ 2"), Err(ResolveError::Syntax { .. })));
    }

    #[test]
    fn test_nesting_depth_is_capped() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(eval(&deep).unwrap(), Value::Number(1.0));
        assert_eq!(eval(&format!("{}1", "-".repeat(MAX_DEPTH))).unwrap(), Value::Number(1.0));

        let too_deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(matches!(eval(&too_deep), Err(ResolveError::Syntax { .. })));
        assert!(matches!(eval(&format!("{}1", "-".repeat(10_000))), Err(ResolveError::Syntax { .. })));
        assert!(matches!(eval(&"(".repeat(10_000)), Err(ResolveError::Syntax { .. })));
        assert!(matches!(eval(&"not ".repeat(10_000)), Err(ResolveError::Syntax { .. })));
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(eval("true + 1"), Err(ResolveError::TypeMismatch { .. })));
        assert_eq!(eval("4 / 0"), Err(ResolveError::DivisionByZero));
    }

    #[test]
    fn test_short_circuit_skips_unknown_attributes() {
        assert_eq!(eval("false and mystery").unwrap(), Value::Bool(false));
        assert_eq!(eval("true or mystery").unwrap(), Value::Bool(true));
    }
}
