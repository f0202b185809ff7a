use crate::frontend::syntax::{Token, TokenKind};

/// Cursor over a finished token sequence. Reading past the end yields a
/// synthetic `End` token, forever.
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    end: Token,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        let end = match tokens.last() {
            Some(last) => Token::end().at(last.line, last.column + last.text.len()),
            None => Token::end().at(1, 0),
        };

        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    #[inline]
    pub fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.end)
    }

    #[inline]
    pub fn peek(&self) -> &Token {
        self.tokens.get(self.pos + 1).unwrap_or(&self.end)
    }

    /// Consumes the current token and returns the new current one.
    pub fn advance(&mut self) -> &Token {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }

        self.current()
    }

    #[inline]
    pub fn at(&self, kind: TokenKind) -> bool {
        self.current().is(kind)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.at(TokenKind::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(kinds: &[TokenKind]) -> TokenStream {
        TokenStream::new(kinds.iter().map(|k| Token::new(*k, "")).collect())
    }

    #[test]
    fn test_advance_and_peek() {
        let mut tokens = stream(&[TokenKind::Name, TokenKind::ParenOpen, TokenKind::ParenClose]);

        assert_eq!(tokens.current().kind, TokenKind::Name);
        assert_eq!(tokens.peek().kind, TokenKind::ParenOpen);
        assert_eq!(tokens.advance().kind, TokenKind::ParenOpen);
        assert_eq!(tokens.peek().kind, TokenKind::ParenClose);
        assert_eq!(tokens.advance().kind, TokenKind::ParenClose);
        assert_eq!(tokens.peek().kind, TokenKind::End);
    }

    #[test]
    fn test_end_is_sticky() {
        let mut tokens = stream(&[TokenKind::Semicolon]);

        assert_eq!(tokens.advance().kind, TokenKind::End);

        for _ in 0..3 {
            assert_eq!(tokens.advance().kind, TokenKind::End);
            assert_eq!(tokens.peek().kind, TokenKind::End);
            assert!(tokens.is_exhausted());
        }
    }

    #[test]
    fn test_empty() {
        let mut tokens = stream(&[]);

        assert!(tokens.is_exhausted());
        assert_eq!(tokens.peek().kind, TokenKind::End);
        assert_eq!(tokens.advance().kind, TokenKind::End);
    }
}
