//! Arithmetic captcha evaluation.
//!
//! The portal's captcha shows an expression such as `12+7=`; the expected
//! answer is its value, not the literal text.

/// Evaluate a decoded captcha as arithmetic.
///
/// The first `=`-separated segment that holds an operator is used (or the
/// first non-empty one), so both `12+7=` and `3+4=7` evaluate the left
/// side. Returns `None` when the text is not pure `0-9+-*/`.
pub fn evaluate(text: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let segments: Vec<&str> = cleaned.split('=').filter(|s| !s.is_empty()).collect();
    let expr = segments
        .iter()
        .find(|s| s.contains(['+', '-', '*', '/']))
        .or_else(|| segments.first())?;

    if !expr.chars().all(|c| c.is_ascii_digit() || "+-*/".contains(c))
        || !expr.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut parser = Parser {
        input: expr.as_bytes(),
        pos: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.input.len() || !value.is_finite() {
        return None;
    }
    Some(format!("{}", value.round() as i64))
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expr(&mut self) -> Option<f64> {
        let mut acc = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == b'+' { acc + rhs } else { acc - rhs };
        }
        Some(acc)
    }

    fn term(&mut self) -> Option<f64> {
        let mut acc = self.factor()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == b'/' && rhs == 0.0 {
                return None;
            }
            acc = if op == b'*' { acc * rhs } else { acc / rhs };
        }
        Some(acc)
    }

    fn factor(&mut self) -> Option<f64> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
            return self.factor().map(|v| -v);
        }
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }
}
