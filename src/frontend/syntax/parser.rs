use tracing::{debug, trace};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, ErrorKind, Result};
use crate::frontend::syntax::{
    Assign, BinaryOp, Call, Declaration, Function, Node, Param, ParseTable, Return, Signature,
    Target, Token, TokenKind, TokenStream, Variable,
};

const REFERENCE_UNSUPPORTED: &str = "reference variables are not supported yet";

/// Recursive-descent parser. Every routine starts on the first token of
/// its construct and leaves the stream on the first token after it. The
/// first failure is recorded and aborts the whole parse.
pub struct Parser<'a> {
    tokens: TokenStream,
    table: &'a ParseTable,
    diagnostics: &'a mut dyn Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: Vec<Token>,
        table: &'a ParseTable,
        diagnostics: &'a mut dyn Diagnostics,
    ) -> Self {
        Self {
            tokens: TokenStream::new(tokens),
            table,
            diagnostics,
        }
    }

    fn record(&mut self, error: Error) {
        let token = self.tokens.current();
        let diagnostic = Diagnostic::new(token.line, token.column, error);

        self.diagnostics.record(diagnostic);
    }

    fn fail<T>(&mut self, message: impl Into<String>) -> Result<T> {
        let error = Error::new(ErrorKind::Syntax, message);

        self.record(error.clone());

        Err(error)
    }

    /// Adds a context line for a failure coming up from a nested routine.
    fn note<T>(&mut self, result: Result<T>, message: &str) -> Result<T> {
        if let Err(err) = &result {
            self.record(Error::new(err.kind, message));
        }

        result
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<()> {
        if !self.tokens.at(kind) {
            let found = self.tokens.current().kind;
            return self.fail(format!("{}, found {}", message, found));
        }

        self.tokens.advance();

        Ok(())
    }

    fn type_name(token: &Token) -> String {
        match token.kind {
            TokenKind::TypeInt => "int".to_string(),
            TokenKind::TypeFloat => "float".to_string(),
            TokenKind::TypeString => "string".to_string(),
            _ => token.text.clone(),
        }
    }

    /// Parses top-level functions until the input runs out. Stops at the
    /// first function that fails and returns what was parsed before it.
    pub fn parse_program(mut self) -> (Vec<Node>, Option<Error>) {
        let mut items = vec![];

        while !self.tokens.is_exhausted() {
            let result = self.function();

            match self.note(result, "failed to parse function") {
                Ok(item) => items.push(item),
                Err(err) => return (items, Some(err)),
            }
        }

        debug!(count = items.len(), "parsed program");

        (items, None)
    }

    /// A full function, or just its signature when no body follows.
    pub fn function(&mut self) -> Result<Node> {
        let result = self.signature();
        let signature = self.note(result, "failed to parse function signature")?;

        if !self.tokens.at(TokenKind::BraceOpen) {
            if self.tokens.at(TokenKind::Semicolon) {
                self.tokens.advance();
            }

            trace!(name = %signature.name, "parsed declaration");
            return Ok(Node::Signature(signature));
        }

        self.tokens.advance();

        let mut body = vec![];

        loop {
            match self.tokens.current().kind {
                TokenKind::BraceClose => {
                    self.tokens.advance();
                    break;
                }
                TokenKind::End => return self.fail("expected '}', got end of input"),
                _ => {
                    let result = self.statement();
                    body.push(self.note(result, "failed to parse statement")?);
                }
            }
        }

        trace!(name = %signature.name, statements = body.len(), "parsed function");

        Ok(Node::Function(Function { signature, body }))
    }

    fn return_types(&mut self) -> Result<Vec<String>> {
        let mut returns = vec![];

        if self.tokens.at(TokenKind::ParenOpen) {
            self.tokens.advance();

            loop {
                let token = self.tokens.current().clone();

                match token.kind {
                    TokenKind::ParenClose if returns.is_empty() => {
                        return self.fail(
                            "no return types in a function return type list, perhaps you meant 'void'?",
                        );
                    }
                    TokenKind::TypeVoid => {
                        return self.fail("'void' included in a function return type list");
                    }
                    TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeString => {
                        returns.push(Self::type_name(&token));
                    }
                    TokenKind::Name if self.table.is_valid_type_name(&token.text) => {
                        returns.push(token.text);
                    }
                    TokenKind::Name => return self.fail("invalid type name in return type list"),
                    _ => {
                        return self.fail(format!(
                            "expected a return type, found {}",
                            token.kind
                        ))
                    }
                }

                match self.tokens.advance().kind {
                    TokenKind::Comma => {
                        self.tokens.advance();
                    }
                    TokenKind::ParenClose => {
                        self.tokens.advance();
                        break;
                    }
                    _ => return self.fail("expected ',' or ')' in function return type list"),
                }
            }

            return Ok(returns);
        }

        let token = self.tokens.current().clone();

        match token.kind {
            TokenKind::TypeVoid => {}
            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeString => {
                returns.push(Self::type_name(&token));
            }
            TokenKind::Name if self.table.is_valid_type_name(&token.text) => {
                returns.push(token.text);
            }
            TokenKind::Name => return self.fail("invalid return type name"),
            _ => return self.fail(format!("expected return type, found {}", token.kind)),
        }

        self.tokens.advance();

        Ok(returns)
    }

    pub fn signature(&mut self) -> Result<Signature> {
        let returns = self.return_types()?;

        let token = self.tokens.current().clone();

        if !token.is(TokenKind::Name) {
            return self.fail(format!(
                "expected function name after return list, found {}",
                token.kind
            ));
        }

        if !self.table.is_valid_func_name(&token.text) {
            return self.fail(format!("invalid function name '{}'", token.text));
        }

        self.tokens.advance();
        self.expect(TokenKind::ParenOpen, "expected '(' opening function parameter list")?;

        let mut params = vec![];

        if self.tokens.at(TokenKind::ParenClose) {
            self.tokens.advance();
        } else {
            loop {
                let ty = self.tokens.current().clone();

                if !self.table.is_type_token(&ty) {
                    return self.fail(format!(
                        "expected type name of a function parameter, found {}",
                        ty.kind
                    ));
                }

                let name = self.tokens.advance().clone();

                if !name.is(TokenKind::Name) || !self.table.is_valid_name(&name.text) {
                    return self.fail("expected name of a function parameter");
                }

                params.push(Param {
                    ty: Self::type_name(&ty),
                    name: name.text,
                });

                match self.tokens.advance().kind {
                    TokenKind::Comma => {
                        self.tokens.advance();
                    }
                    TokenKind::ParenClose => {
                        self.tokens.advance();
                        break;
                    }
                    _ => {
                        return self.fail(
                            "expected ')' to close function parameter list, or ',' to continue it",
                        )
                    }
                }
            }
        }

        Ok(Signature {
            name: token.text,
            returns,
            params,
        })
    }

    /// One statement, including its terminating semicolon.
    pub fn statement(&mut self) -> Result<Node> {
        let first = self.tokens.current().clone();

        if first.is(TokenKind::Return) {
            return self.return_stmt();
        }

        if first.is(TokenKind::TypeIntRef)
            || (first.is(TokenKind::Name) && self.table.is_reference_name(&first.text))
        {
            return self.fail(REFERENCE_UNSUPPORTED);
        }

        if !self.table.is_type_token(&first) {
            return self.fail(format!(
                "expected a statement within function body, found {}",
                first.kind
            ));
        }

        let stmt = if first.is(TokenKind::Name) && self.tokens.peek().is(TokenKind::ParenOpen) {
            Node::Call(self.call()?)
        } else {
            let second = self.tokens.advance().clone();

            match second.kind {
                TokenKind::Name if self.table.is_reference_name(&second.text) => {
                    return self.fail(REFERENCE_UNSUPPORTED);
                }
                TokenKind::Name => {
                    let decl = Declaration {
                        name: second.text,
                        ty: Self::type_name(&first),
                    };

                    match self.tokens.advance().kind {
                        TokenKind::AssignVal => {
                            Node::Assign(self.assign(Target::Declaration(decl))?)
                        }
                        TokenKind::AssignRef => return self.fail(REFERENCE_UNSUPPORTED),
                        _ => Node::Declaration(decl),
                    }
                }
                TokenKind::AssignVal if first.is(TokenKind::Name) => {
                    Node::Assign(self.assign(Target::Variable(Variable::new(first.text)))?)
                }
                TokenKind::AssignVal => {
                    return self.fail(format!("cannot assign to type name '{}'", first.text));
                }
                TokenKind::AssignRef => return self.fail(REFERENCE_UNSUPPORTED),
                _ => return self.fail("expected assignment or declaration"),
            }
        };

        self.expect(TokenKind::Semicolon, "expected ';' closing statement")?;

        Ok(stmt)
    }

    fn assign(&mut self, target: Target) -> Result<Assign> {
        self.tokens.advance();

        let result = self.rhs();
        let value = self.note(result, "failed to parse right-hand side of assignment")?;

        Ok(Assign {
            target,
            value: value.into(),
        })
    }

    fn return_stmt(&mut self) -> Result<Node> {
        self.tokens.advance();

        let mut values = vec![];

        if !self.tokens.at(TokenKind::Semicolon) {
            loop {
                let result = self.rhs();
                values.push(self.note(
                    result,
                    "expected a value-reducible expression in return statement",
                )?);

                match self.tokens.current().kind {
                    TokenKind::Comma => {
                        self.tokens.advance();
                    }
                    TokenKind::Semicolon => break,
                    _ => return self.fail("expected ',' or ';' in return statement"),
                }
            }
        }

        self.tokens.advance();

        Ok(Node::Return(Return { values }))
    }

    /// A value-reducible expression: one operand, optionally continued by
    /// a chain of binary operators.
    pub fn rhs(&mut self) -> Result<Node> {
        let initial = self.operand()?;

        if self.table.is_binary(self.tokens.current().kind) {
            return self.binary(initial);
        }

        Ok(initial)
    }

    fn operand(&mut self) -> Result<Node> {
        let token = self.tokens.current().clone();

        match token.kind {
            TokenKind::LitInt => self.literal(),
            TokenKind::ParenOpen => self.group(),
            TokenKind::Name if self.table.is_reference_name(&token.text) => {
                self.fail(REFERENCE_UNSUPPORTED)
            }
            TokenKind::Name => self.name(),
            kind if self.table.is_literal(kind) => {
                self.fail(format!("{} is not supported in expressions yet", kind))
            }
            kind => self.fail(format!("expected a value-reducible expression, found {}", kind)),
        }
    }

    fn literal(&mut self) -> Result<Node> {
        let text = self.tokens.current().text.clone();

        match self.table.literal_int(&text) {
            Some(value) => {
                self.tokens.advance();
                Ok(Node::Literal(value))
            }
            None => self.fail(format!("invalid int literal '{}'", text)),
        }
    }

    fn group(&mut self) -> Result<Node> {
        self.tokens.advance();

        let result = self.rhs();
        let inner = self.note(
            result,
            "failed to parse an expression within parentheses",
        )?;

        self.expect(
            TokenKind::ParenClose,
            "expected ')' to close a parenthesised expression",
        )?;

        Ok(Node::group(inner))
    }

    /// A name followed by `(` is a call, anything else a variable.
    fn name(&mut self) -> Result<Node> {
        if self.tokens.peek().is(TokenKind::ParenOpen) {
            return Ok(Node::Call(self.call()?));
        }

        let name = self.tokens.current().text.clone();
        self.tokens.advance();

        Ok(Node::Variable(Variable::new(name)))
    }

    fn call(&mut self) -> Result<Call> {
        let name = self.tokens.current().text.clone();
        let mut args = vec![];

        self.tokens.advance();

        if self.tokens.advance().is(TokenKind::ParenClose) {
            self.tokens.advance();
            return Ok(Call { name, args });
        }

        loop {
            let result = self.rhs();
            args.push(self.note(result, "expected an argument expression or ')' in call")?);

            match self.tokens.current().kind {
                TokenKind::ParenClose => {
                    self.tokens.advance();
                    return Ok(Call { name, args });
                }
                TokenKind::Comma => {
                    self.tokens.advance();
                }
                _ => return self.fail("expected ',' or ')' after an argument in a call"),
            }
        }
    }

    /// Precedence climbing, entered with `left` parsed and the stream on a
    /// binary operator. When the following operator binds tighter, the
    /// nested chain becomes the left operand and `left` moves to the right:
    /// `a + b * c` yields `(b * c) + a`.
    fn binary(&mut self, left: Node) -> Result<Node> {
        let kind = self.tokens.current().kind;

        let (op, precedence) = match (BinaryOp::from_token(kind), self.table.precedence(kind)) {
            (Some(op), Some(precedence)) => (op, precedence),
            _ => return self.fail(format!("expected a binary operator, found {}", kind)),
        };

        self.tokens.advance();

        let result = self.operand();
        let right = self.note(
            result,
            "failed to parse right-hand side of a binary operation",
        )?;

        let further = match self.table.precedence(self.tokens.current().kind) {
            Some(further) => further,
            None => return Ok(Node::binary(op, left, right)),
        };

        if precedence >= further {
            return self.binary(Node::binary(op, left, right));
        }

        let nested = self.binary(right)?;

        Ok(Node::binary(op, nested, left))
    }
}
