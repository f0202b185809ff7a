use std::fmt::{self, Display, Formatter};

use crate::frontend::syntax::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Root,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Add => BinaryOp::Add,
            TokenKind::Sub => BinaryOp::Sub,
            TokenKind::Mul => BinaryOp::Mul,
            TokenKind::Div => BinaryOp::Div,
            TokenKind::Mod => BinaryOp::Mod,
            TokenKind::Exp => BinaryOp::Exp,
            TokenKind::Root => BinaryOp::Root,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "^",
            BinaryOp::Root => "¬/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Node>,
}

/// Something that yields an address when assigned to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Variable(Variable),
    Declaration(Declaration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: Target,
    pub value: Box<Node>,
}

/// Introduces a binding. The initial value, if any, comes from an
/// enclosing `Assign`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub returns: Vec<String>,
    pub params: Vec<Param>,
}

impl Signature {
    pub fn is_param(&self, name: &str) -> bool {
        self.params.iter().any(|param| param.name == name)
    }

    /// First parameter name that repeats an earlier one.
    pub fn duplicate_param(&self) -> Option<&str> {
        self.params
            .iter()
            .enumerate()
            .find(|(idx, param)| self.params[..*idx].iter().any(|p| p.name == param.name))
            .map(|(_, param)| param.name.as_str())
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.returns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub signature: Signature,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub values: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(i32),
    Variable(Variable),
    Binary(Binary),
    Call(Call),
    Assign(Assign),
    Declaration(Declaration),
    Signature(Signature),
    Function(Function),
    Return(Return),
    Group(Box<Node>),
}

impl Node {
    pub fn var(name: impl Into<String>) -> Self {
        Node::Variable(Variable::new(name))
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::Binary(Binary {
            op,
            left: left.into(),
            right: right.into(),
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Call(Call {
            name: name.into(),
            args,
        })
    }

    pub fn group(inner: Node) -> Self {
        Node::Group(inner.into())
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Node::Literal(_) => "literal",
            Node::Variable(_) => "variable",
            Node::Binary(_) => "binary expression",
            Node::Call(_) => "call",
            Node::Assign(_) => "assignment",
            Node::Declaration(_) => "declaration",
            Node::Signature(_) => "signature",
            Node::Function(_) => "function",
            Node::Return(_) => "return statement",
            Node::Group(_) => "parenthesised expression",
        }
    }

    fn write_tree(&self, f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);

        match self {
            Node::Literal(value) => writeln!(f, "{}Literal {}", indent, value),
            Node::Variable(var) => match &var.ty {
                Some(ty) => writeln!(f, "{}Variable {}: {}", indent, var.name, ty),
                None => writeln!(f, "{}Variable {}", indent, var.name),
            },
            Node::Binary(binary) => {
                writeln!(f, "{}Binary {}", indent, binary.op.symbol())?;
                binary.left.write_tree(f, depth + 1)?;
                binary.right.write_tree(f, depth + 1)
            }
            Node::Call(call) => {
                writeln!(f, "{}Call {}", indent, call.name)?;

                for arg in &call.args {
                    arg.write_tree(f, depth + 1)?;
                }

                Ok(())
            }
            Node::Assign(assign) => {
                writeln!(f, "{}Assign", indent)?;

                match &assign.target {
                    Target::Variable(var) => Node::Variable(var.clone()).write_tree(f, depth + 1)?,
                    Target::Declaration(decl) => {
                        Node::Declaration(decl.clone()).write_tree(f, depth + 1)?
                    }
                }

                assign.value.write_tree(f, depth + 1)
            }
            Node::Declaration(decl) => {
                writeln!(f, "{}Declaration {} {}", indent, decl.ty, decl.name)
            }
            Node::Signature(sig) => writeln!(f, "{}Signature {}", indent, sig),
            Node::Function(func) => {
                writeln!(f, "{}Function {}", indent, func.signature)?;

                for stmt in &func.body {
                    stmt.write_tree(f, depth + 1)?;
                }

                Ok(())
            }
            Node::Return(ret) => {
                writeln!(f, "{}Return", indent)?;

                for value in &ret.values {
                    value.write_tree(f, depth + 1)?;
                }

                Ok(())
            }
            Node::Group(inner) => {
                writeln!(f, "{}Group", indent)?;
                inner.write_tree(f, depth + 1)
            }
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.returns.len() {
            0 => write!(f, "void")?,
            1 => write!(f, "{}", self.returns[0])?,
            _ => write!(f, "({})", self.returns.join(", "))?,
        }

        let params = self
            .params
            .iter()
            .map(|param| format!("{} {}", param.ty, param.name))
            .collect::<Vec<_>>();

        write!(f, " {}({})", self.name, params.join(", "))
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: &[&str]) -> Signature {
        Signature {
            name: "f".to_string(),
            returns: vec!["int".to_string()],
            params: params
                .iter()
                .map(|name| Param {
                    ty: "int".to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_param_queries() {
        assert!(sig(&["a", "b"]).is_param("b"));
        assert!(!sig(&["a", "b"]).is_param("c"));
        assert_eq!(sig(&["a", "b"]).duplicate_param(), None);
        assert_eq!(sig(&["a", "b", "a"]).duplicate_param(), Some("a"));
    }

    #[test]
    fn test_print_tree() {
        let func = Node::Function(Function {
            signature: sig(&["a"]),
            body: vec![Node::Return(Return {
                values: vec![Node::binary(BinaryOp::Add, Node::var("a"), Node::Literal(1))],
            })],
        });

        assert_eq!(
            func.to_string(),
            "Function int f(int a)\n  Return\n    Binary +\n      Variable a\n      Literal 1\n"
        );
    }
}
