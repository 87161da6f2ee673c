//! Formula parser
//!
//! A recursive descent parser for spreadsheet formulas with proper operator
//! precedence. Unknown function names and wrong argument counts are rejected
//! here, so a tree that parses only fails at evaluation on data.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::Function;
use crate::options::ParseLimits;
use fincalc_core::{CellRange, CellReference};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Parse a formula string into an AST
///
/// The leading '=' is optional. Error offsets count characters in `formula`
/// exactly as given.
///
/// # Example
/// ```rust
/// use fincalc_formula::{parse_formula, ParseLimits};
///
/// let ast = parse_formula("=1+2", ParseLimits::default()).unwrap();
/// let ast = parse_formula("=SUM(A1:A10)", ParseLimits::default()).unwrap();
/// let ast = parse_formula("IF(A1>0, B1, -B1)", ParseLimits::default()).unwrap();
/// ```
pub fn parse_formula(formula: &str, limits: ParseLimits) -> FormulaResult<FormulaExpr> {
    let length = formula.chars().count();
    if length > limits.max_formula_length {
        return Err(FormulaError::LimitExceeded(format!(
            "formula is {} characters long (limit {})",
            length, limits.max_formula_length
        )));
    }

    let mut start = formula.len() - formula.trim_start().len();
    if formula[start..].starts_with('=') {
        start += 1;
    }

    let mut parser = FormulaParser::new(formula, start, limits)?;
    if parser.current_token == Token::Eof {
        return Err(parser.error_here("formula is empty"));
    }

    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if parser.current_token != Token::Eof {
        return Err(parser.error_here(format!(
            "unexpected {} after expression",
            parser.current_token
        )));
    }

    parser.check_depth(expr.depth())?;
    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals and references
    Number(Decimal),
    CellRef(CellReference),
    Identifier(String), // Function name; always followed by '('

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::CellRef(cell) => write!(f, "reference {}", cell),
            Token::Identifier(name) => write!(f, "name {}", name),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Caret => f.write_str("'^'"),
            Token::Percent => f.write_str("'%'"),
            Token::Equal => f.write_str("'='"),
            Token::NotEqual => f.write_str("'<>'"),
            Token::LessThan => f.write_str("'<'"),
            Token::LessEqual => f.write_str("'<='"),
            Token::GreaterThan => f.write_str("'>'"),
            Token::GreaterEqual => f.write_str("'>='"),
            Token::Colon => f.write_str("':'"),
            Token::Comma => f.write_str("','"),
            Token::LeftParen => f.write_str("'('"),
            Token::RightParen => f.write_str("')'"),
            Token::Eof => f.write_str("end of formula"),
        }
    }
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
    /// Byte position where the current token starts
    token_start: usize,
    depth: usize,
    limits: ParseLimits,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str, start: usize, limits: ParseLimits) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: start,
            current_token: Token::Eof,
            token_start: start,
            depth: 0,
            limits,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Errors ===

    fn char_offset(&self, byte: usize) -> usize {
        self.input[..byte].chars().count()
    }

    fn error_at<S: Into<String>>(&self, byte: usize, message: S) -> FormulaError {
        FormulaError::syntax(self.char_offset(byte), message)
    }

    fn error_here<S: Into<String>>(&self, message: S) -> FormulaError {
        self.error_at(self.token_start, message)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        // Multi-character tokens
        match c {
            '<' => {
                self.advance();
                return Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                });
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::GreaterEqual);
                }
                return Ok(Token::GreaterThan);
            }
            '!' => {
                if self.peek_char_at(1) == Some('=') {
                    self.advance();
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                return Err(self.error_here("unexpected character '!'"));
            }
            c if c.is_ascii_digit() || c == '.' => return self.scan_number(),
            c if c.is_ascii_alphabetic() || c == '_' => return self.scan_identifier_or_ref(),
            _ => {}
        }

        // Single-character tokens
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '%' => Token::Percent,
            '=' => Token::Equal,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '$' => {
                return Err(self.error_here("absolute references ('$') are not supported"));
            }
            other => return Err(self.error_here(format!("unexpected character '{}'", other))),
        };
        self.advance();
        Ok(token)
    }

    fn scan_digits(&mut self) -> usize {
        let start = self.pos;
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
        self.pos - start
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        // Integer part
        let mut digits = self.scan_digits();

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            digits += self.scan_digits();
        }

        if digits == 0 {
            return Err(self.error_at(start, "expected digits in number"));
        }
        let mantissa = self.input[start..self.pos].trim_end_matches('.');

        // Exponent part, only when digits follow
        let exponent_follows = match (self.peek_char(), self.peek_char_at(1), self.peek_char_at(2)) {
            (Some('e' | 'E'), Some(d), _) if d.is_ascii_digit() => true,
            (Some('e' | 'E'), Some('+' | '-'), Some(d)) if d.is_ascii_digit() => true,
            _ => false,
        };

        let parsed = if exponent_follows {
            let exponent_start = self.pos + 1;
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            self.scan_digits();
            let exponent = &self.input[exponent_start..self.pos];
            Decimal::from_scientific(&format!("{}e{}", normalize_mantissa(mantissa), exponent))
        } else {
            Decimal::from_str(&normalize_mantissa(mantissa))
        };

        parsed.map(Token::Number).map_err(|_| {
            self.error_at(
                start,
                format!("number '{}' is out of range", &self.input[start..self.pos]),
            )
        })
    }

    fn scan_identifier_or_ref(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // A name followed by '(' is a function call, even if it looks like a
        // cell reference (LOG10 is a function, not column LOG row 10)
        if self.next_non_whitespace() == Some('(') {
            return Ok(Token::Identifier(text.to_string()));
        }

        if !Self::is_cell_reference(text) {
            return Err(self.error_at(start, format!("invalid reference '{}'", text)));
        }

        CellReference::parse(text)
            .map(Token::CellRef)
            .map_err(|e| self.error_at(start, format!("invalid reference '{}': {}", text, e)))
    }

    /// Letters followed by digits and nothing else
    fn is_cell_reference(text: &str) -> bool {
        let letters = text.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let rest = &text[letters..];
        letters > 0 && !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn next_non_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    /// Consume a ')' matching the '(' at byte position `open`
    fn expect_closing(&mut self, open: usize) -> FormulaResult<()> {
        if self.current_token == Token::RightParen {
            self.consume()?;
            Ok(())
        } else {
            Err(self.error_here(format!(
                "expected ')' to close '(' at offset {}, got {}",
                self.char_offset(open),
                self.current_token
            )))
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> FormulaResult<T>) -> FormulaResult<T> {
        if self.depth >= self.limits.max_nesting_depth {
            return Err(FormulaError::LimitExceeded(format!(
                "formula nesting exceeds {} levels",
                self.limits.max_nesting_depth
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Reject a tree deeper than the expression limit
    ///
    /// Operator chains are folded in loops rather than by recursion, so the
    /// nesting counter alone does not bound the depth of what they build.
    fn check_depth(&self, depth: usize) -> FormulaResult<()> {
        if depth > self.limits.max_expression_depth {
            return Err(FormulaError::LimitExceeded(format!(
                "expression is more than {} levels deep",
                self.limits.max_expression_depth
            )));
        }
        Ok(())
    }

    /// Build `left op right`, tracking the depth of the growing chain
    ///
    /// `depth` starts at zero and is measured from `left` on the first fold.
    fn fold(
        &self,
        op: BinaryOperator,
        left: FormulaExpr,
        right: FormulaExpr,
        depth: &mut usize,
    ) -> FormulaResult<FormulaExpr> {
        if *depth == 0 {
            *depth = left.depth();
        }
        *depth = (*depth).max(right.depth()) + 1;
        self.check_depth(*depth)?;
        Ok(FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, !=, <, <=, >, >=
    // 2. Addition/Subtraction: +, -
    // 3. Multiplication/Division: *, /
    // 4. Exponentiation: ^ (right associative)
    // 5. Prefix sign: -, +
    // 6. Postfix percent: %
    // 7. Range: :
    // 8. Primary: numbers, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.nested(Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;
        let mut depth = 0;

        loop {
            let op = match self.current_token {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_additive()?;
            left = self.fold(op, left, right, &mut depth)?;
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;
        let mut depth = 0;

        loop {
            let op = match self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = self.fold(op, left, right, &mut depth)?;
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;
        let mut depth = 0;

        loop {
            let op = match self.current_token {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_exponent()?;
            left = self.fold(op, left, right, &mut depth)?;
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if self.current_token == Token::Caret {
            self.consume()?;
            let right = self.nested(Self::parse_exponent)?; // Right associative
            return Ok(FormulaExpr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        // Prefix minus
        if self.current_token == Token::Minus {
            self.consume()?;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        // Prefix plus (no-op)
        if self.current_token == Token::Plus {
            self.consume()?;
            return self.nested(Self::parse_unary);
        }

        // Parse primary, then check for postfix percent
        let mut expr = self.parse_primary()?;
        let mut depth = 0;

        while self.current_token == Token::Percent {
            self.consume()?;
            if depth == 0 {
                depth = expr.depth();
            }
            depth += 1;
            self.check_depth(depth)?;
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let start = self.token_start;

        match self.current_token.clone() {
            Token::Number(n) => {
                self.consume()?;
                Ok(FormulaExpr::Number(n))
            }

            Token::CellRef(cell) => {
                self.consume()?;
                self.parse_range(cell)
            }

            Token::Identifier(name) => {
                self.consume()?;
                self.parse_function_call(&name)
            }

            Token::LeftParen => {
                self.consume()?;
                let expr = self.parse_expression()?;
                self.expect_closing(start)?;
                Ok(expr)
            }

            Token::Eof => Err(self.error_here("unexpected end of formula")),

            other => Err(self.error_here(format!("unexpected {}", other))),
        }
    }

    fn parse_range(&mut self, start: CellReference) -> FormulaResult<FormulaExpr> {
        if self.current_token != Token::Colon {
            return Ok(FormulaExpr::CellRef(start));
        }
        self.consume()?;

        match self.current_token {
            Token::CellRef(end) => {
                self.consume()?;
                Ok(FormulaExpr::RangeRef(CellRange::new(start, end)))
            }
            _ => Err(self.error_here(format!(
                "expected a cell reference after ':', got {}",
                self.current_token
            ))),
        }
    }

    fn parse_function_call(&mut self, name: &str) -> FormulaResult<FormulaExpr> {
        let func = Function::from_name(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_ascii_uppercase()))?;

        let open = self.token_start;
        if self.current_token != Token::LeftParen {
            return Err(self.error_here(format!("expected '(' after {}", func)));
        }
        self.consume()?;

        let mut args = Vec::new();

        // Parse arguments
        if self.current_token != Token::RightParen {
            loop {
                if matches!(self.current_token, Token::Comma | Token::RightParen) {
                    return Err(self.error_here(format!("missing argument to {}", func)));
                }
                args.push(self.parse_expression()?);

                if self.current_token != Token::Comma {
                    break;
                }
                self.consume()?;
            }
        }

        self.expect_closing(open)?;
        func.check_arity(args.len())?;

        Ok(FormulaExpr::Function { func, args })
    }
}

/// Give a mantissa like ".5" or "5." a digit on each side of the point
fn normalize_mantissa(mantissa: &str) -> String {
    if mantissa.starts_with('.') {
        format!("0{}", mantissa)
    } else {
        mantissa.to_string()
    }
}
