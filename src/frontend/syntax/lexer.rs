use logos::{FilterResult, Lexer, Logos};

use crate::frontend::syntax::{Token, TokenKind};

pub struct LexerExtras {
    pub line: usize,
    pub column: usize,
}

impl LexerExtras {
    pub fn apply(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;

                continue;
            }

            self.column += 1;
        }
    }
}

impl Default for LexerExtras {
    fn default() -> Self {
        Self { line: 1, column: 0 }
    }
}

fn skip(lex: &mut Lexer<RawToken>) -> logos::Skip {
    lex.extras.apply(lex.slice());
    logos::Skip
}

/// Skips a `/* ... */` comment. An unclosed comment swallows the rest of
/// the input as one invalid token.
fn block_comment(lex: &mut Lexer<RawToken>) -> FilterResult<()> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            lex.extras.apply(lex.slice());
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(extras = LexerExtras)]
enum RawToken {
    #[token("return")]
    Return,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token("=")]
    AssignVal,

    #[token("'=")]
    AssignRef,

    #[token("+")]
    Add,

    #[token("-")]
    Sub,

    #[token("*")]
    Mul,

    #[token("/")]
    Div,

    #[token("%")]
    Mod,

    #[token("^")]
    Exp,

    #[token("¬/")]
    Root,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("void")]
    TypeVoid,

    #[token("float")]
    TypeFloat,

    #[token("int")]
    TypeInt,

    #[token("string")]
    TypeString,

    #[token("int'")]
    TypeIntRef,

    #[regex(r"[0-9]+\.[0-9]+|\.[0-9]+")]
    LitFloat,

    #[regex(r"[0-9]+")]
    LitInt,

    #[regex(r#""[^"]*""#)]
    LitString,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*'?")]
    Name,

    #[regex(r"//[^\n]*", skip)]
    #[token("/*", block_comment)]
    #[regex(r"[ \r\n\t\f]+", skip)]
    #[error]
    Invalid,
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Return => TokenKind::Return,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Semicolon => TokenKind::Semicolon,
            RawToken::AssignVal => TokenKind::AssignVal,
            RawToken::AssignRef => TokenKind::AssignRef,
            RawToken::Add => TokenKind::Add,
            RawToken::Sub => TokenKind::Sub,
            RawToken::Mul => TokenKind::Mul,
            RawToken::Div => TokenKind::Div,
            RawToken::Mod => TokenKind::Mod,
            RawToken::Exp => TokenKind::Exp,
            RawToken::Root => TokenKind::Root,
            RawToken::BraceOpen => TokenKind::BraceOpen,
            RawToken::BraceClose => TokenKind::BraceClose,
            RawToken::ParenOpen => TokenKind::ParenOpen,
            RawToken::ParenClose => TokenKind::ParenClose,
            RawToken::TypeVoid => TokenKind::TypeVoid,
            RawToken::TypeFloat => TokenKind::TypeFloat,
            RawToken::TypeInt => TokenKind::TypeInt,
            RawToken::TypeString => TokenKind::TypeString,
            RawToken::TypeIntRef => TokenKind::TypeIntRef,
            RawToken::LitFloat => TokenKind::LitFloat,
            RawToken::LitInt => TokenKind::LitInt,
            RawToken::LitString => TokenKind::LitString,
            RawToken::Name => TokenKind::Name,
            RawToken::Invalid => TokenKind::Invalid,
        }
    }
}

/// Splits `source` into tokens. Never fails: unrecognised input becomes
/// `Invalid` tokens which the parser reports in context.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = vec![];

    while let Some(raw) = lexer.next() {
        let (line, column) = (lexer.extras.line, lexer.extras.column);
        let slice = lexer.slice();
        let kind = TokenKind::from(raw);

        let text = match kind {
            TokenKind::LitString => &slice[1..slice.len() - 1],
            _ => slice,
        };

        tokens.push(Token::new(kind, text).at(line, column));
        lexer.extras.apply(slice);
    }

    tracing::trace!(count = tokens.len(), "tokenized");

    tokens
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test_case("return", TokenKind::Return; "return keyword")]
    #[test_case("int", TokenKind::TypeInt; "int type")]
    #[test_case("int'", TokenKind::TypeIntRef; "int reference type")]
    #[test_case("integer", TokenKind::Name; "name with keyword prefix")]
    #[test_case("x'", TokenKind::Name; "reference name")]
    #[test_case("'=", TokenKind::AssignRef; "reference assign")]
    #[test_case("¬/", TokenKind::Root; "root operator")]
    #[test_case("42", TokenKind::LitInt; "int literal")]
    #[test_case("4.2", TokenKind::LitFloat; "float literal")]
    #[test_case(".5", TokenKind::LitFloat; "float shorthand")]
    #[test_case("\"hi\"", TokenKind::LitString; "string literal")]
    #[test_case("@", TokenKind::Invalid; "invalid")]
    fn test_single_token(source: &str, kind: TokenKind) {
        assert_eq!(kinds(source), vec![kind]);
    }

    #[test]
    fn test_statement() {
        assert_eq!(
            kinds("int x = a + 5;"),
            vec![
                TokenKind::TypeInt,
                TokenKind::Name,
                TokenKind::AssignVal,
                TokenKind::Name,
                TokenKind::Add,
                TokenKind::LitInt,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a // line comment\n/* block\n * comment */ b"),
            vec![TokenKind::Name, TokenKind::Name]
        );
    }

    #[test_case("/* a * b */ x"; "star inside")]
    #[test_case("/** x **/ x"; "doubled stars")]
    #[test_case("/**/ x"; "empty")]
    #[test_case("/* a / b */ x"; "slash inside")]
    #[test_case("/* one\n * two\n */ x"; "multi line")]
    fn test_block_comment(source: &str) {
        assert_eq!(kinds(source), vec![TokenKind::Name]);
    }

    #[test]
    fn test_block_comment_positions() {
        let tokens = tokenize("/* one\ntwo */ x / y");

        assert_eq!(tokens[0].kind, TokenKind::Name);
        assert_eq!((tokens[0].line, tokens[0].column), (2, 7));
        assert_eq!(tokens[1].kind, TokenKind::Div);
        assert_eq!((tokens[2].line, tokens[2].column), (2, 11));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let tokens = tokenize("a /* never\nclosed");

        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Name, TokenKind::Invalid]
        );
        assert_eq!(tokens[1].text, "/* never\nclosed");
    }

    #[test]
    fn test_string_quotes_stripped() {
        let tokens = tokenize("\"hello world\"");

        assert_eq!(tokens[0].text, "hello world");
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("int f()\n{\n  return 1;\n}");
        let ret = &tokens[5];

        assert_eq!(ret.kind, TokenKind::Return);
        assert_eq!((ret.line, ret.column), (3, 2));
    }
}
