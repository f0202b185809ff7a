use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Return,

    Comma,
    Semicolon,

    AssignVal,
    AssignRef,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Root,

    BraceOpen,
    BraceClose,
    ParenOpen,
    ParenClose,

    LitFloat,
    LitInt,
    LitString,

    TypeVoid,
    TypeFloat,
    TypeInt,
    TypeString,
    TypeIntRef,

    Name,
    Invalid,
    End,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::Return => "'return'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::AssignVal => "'='",
            TokenKind::AssignRef => "''='",
            TokenKind::Add => "'+'",
            TokenKind::Sub => "'-'",
            TokenKind::Mul => "'*'",
            TokenKind::Div => "'/'",
            TokenKind::Mod => "'%'",
            TokenKind::Exp => "'^'",
            TokenKind::Root => "'¬/'",
            TokenKind::BraceOpen => "'{'",
            TokenKind::BraceClose => "'}'",
            TokenKind::ParenOpen => "'('",
            TokenKind::ParenClose => "')'",
            TokenKind::LitFloat => "float literal",
            TokenKind::LitInt => "int literal",
            TokenKind::LitString => "string literal",
            TokenKind::TypeVoid => "'void'",
            TokenKind::TypeFloat => "'float'",
            TokenKind::TypeInt => "'int'",
            TokenKind::TypeString => "'string'",
            TokenKind::TypeIntRef => "'int''",
            TokenKind::Name => "name",
            TokenKind::Invalid => "invalid token",
            TokenKind::End => "end of input",
        };

        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            line: 0,
            column: 0,
        }
    }

    pub fn end() -> Self {
        Self::new(TokenKind::End, "")
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} {:?}", self.line, self.column, self.kind)?;

        if !self.text.is_empty() {
            write!(f, " `{}`", self.text)?;
        }

        Ok(())
    }
}
