use std::collections::HashMap;

use crate::frontend::syntax::{Token, TokenKind};

/// Marks a name as a reference variable. Reserved, not yet accepted.
pub const REFERENCE_MARKER: char = '\'';

/// Static lookups shared by every parse routine: binary operator
/// precedence plus the name and literal shape rules.
#[derive(Debug, Clone)]
pub struct ParseTable {
    precedences: HashMap<TokenKind, u8>,
}

impl Default for ParseTable {
    fn default() -> Self {
        Self {
            precedences: HashMap::from([
                (TokenKind::Add, 8),
                (TokenKind::Sub, 7),
                (TokenKind::Mul, 9),
                (TokenKind::Div, 11),
                (TokenKind::Mod, 10),
                (TokenKind::Exp, 13),
                (TokenKind::Root, 12),
            ]),
        }
    }
}

impl ParseTable {
    /// `None` when `kind` is not a binary operator.
    #[inline]
    pub fn precedence(&self, kind: TokenKind) -> Option<u8> {
        self.precedences.get(&kind).copied()
    }

    #[inline]
    pub fn is_binary(&self, kind: TokenKind) -> bool {
        self.precedences.contains_key(&kind)
    }

    pub fn is_valid_name(&self, name: &str) -> bool {
        let mut chars = name.chars();

        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }

        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn is_valid_type_name(&self, name: &str) -> bool {
        self.is_valid_name(name)
    }

    pub fn is_valid_func_name(&self, name: &str) -> bool {
        self.is_valid_name(name)
    }

    pub fn is_reference_name(&self, name: &str) -> bool {
        name.len() > 1 && name.ends_with(REFERENCE_MARKER)
    }

    /// Tokens that may open a declaration or name a parameter type.
    /// `void` is deliberately excluded.
    pub fn is_type_token(&self, token: &Token) -> bool {
        match token.kind {
            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeString => true,
            TokenKind::Name => self.is_valid_type_name(&token.text),
            _ => false,
        }
    }

    pub fn is_literal(&self, kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::LitInt | TokenKind::LitFloat | TokenKind::LitString
        )
    }

    /// Parses an int literal: optional leading `-`, then digits only, and it
    /// has to fit the 32-bit target integer.
    pub fn literal_int(&self, text: &str) -> Option<i32> {
        let digits = text.strip_prefix('-').unwrap_or(text);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        text.parse::<i32>().ok()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_precedences() {
        let table = ParseTable::default();

        assert_eq!(table.precedence(TokenKind::Add), Some(8));
        assert_eq!(table.precedence(TokenKind::Sub), Some(7));
        assert_eq!(table.precedence(TokenKind::Mul), Some(9));
        assert_eq!(table.precedence(TokenKind::Div), Some(11));
        assert_eq!(table.precedence(TokenKind::Mod), Some(10));
        assert_eq!(table.precedence(TokenKind::AssignVal), None);
        assert!(!table.is_binary(TokenKind::Semicolon));
    }

    #[test_case("x", true; "single letter")]
    #[test_case("_tmp1", true; "underscore and digit")]
    #[test_case("1x", false; "leading digit")]
    #[test_case("x'", false; "reference marker")]
    #[test_case("", false; "empty")]
    fn test_valid_name(name: &str, valid: bool) {
        assert_eq!(ParseTable::default().is_valid_name(name), valid);
    }

    #[test_case("42", Some(42); "positive")]
    #[test_case("-7", Some(-7); "negative")]
    #[test_case("2147483647", Some(i32::MAX); "max")]
    #[test_case("2147483648", None; "overflow")]
    #[test_case("-", None; "sign only")]
    #[test_case("4x", None; "trailing garbage")]
    fn test_literal_int(text: &str, expected: Option<i32>) {
        assert_eq!(ParseTable::default().literal_int(text), expected);
    }

    #[test]
    fn test_type_tokens() {
        let table = ParseTable::default();

        assert!(table.is_type_token(&Token::new(TokenKind::TypeInt, "int")));
        assert!(table.is_type_token(&Token::new(TokenKind::Name, "vec3")));
        assert!(!table.is_type_token(&Token::new(TokenKind::TypeVoid, "void")));
        assert!(!table.is_type_token(&Token::new(TokenKind::Name, "x'")));
    }
}
