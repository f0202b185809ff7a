use std::fmt::{self, Display, Formatter};

use crate::backend::ArithOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int32,
    Float32,
    Ptr,
    Struct(Vec<Type>),
    Void,
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int32 => write!(f, "i32"),
            Type::Float32 => write!(f, "float"),
            Type::Ptr => write!(f, "ptr"),
            Type::Void => write!(f, "void"),
            Type::Struct(fields) => {
                let fields = fields.iter().map(|ty| ty.to_string()).collect::<Vec<_>>();
                write!(f, "{{ {} }}", fields.join(", "))
            }
        }
    }
}

/// Identifies an instruction within its function, stable across inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    ConstInt(i32),
    Param(usize),
    Instr(InstrId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    Alloca(Type),
    Load { ty: Type, ptr: Value },
    Store { value: Value, ptr: Value },
    Arith { op: ArithOp, lhs: Value, rhs: Value },
    Call { callee: String, args: Vec<Value> },
    ExtractValue { aggregate: Value, index: u32 },
    Ret(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub id: InstrId,
    pub name: String,
    pub kind: InstrKind,
}

impl Instr {
    #[inline]
    pub fn is_terminator(&self) -> bool {
        matches!(self.kind, InstrKind::Ret(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub body: Vec<Instr>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: vec![],
        }
    }

    pub fn terminator(&self) -> Option<&Instr> {
        self.body.last().filter(|instr| instr.is_terminator())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fn {
    pub name: String,
    pub params: Vec<(Type, String)>,
    pub return_type: Type,
    pub body: Vec<Block>,
    next_id: usize,
}

impl Fn {
    pub fn new(name: impl Into<String>, params: Vec<(Type, String)>, return_type: Type) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
            body: vec![],
            next_id: 0,
        }
    }

    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.body.is_empty()
    }

    pub fn make_instr(&mut self, name: &str, kind: InstrKind) -> Instr {
        let id = InstrId(self.next_id);

        self.next_id += 1;

        Instr {
            id,
            name: name.to_string(),
            kind,
        }
    }

    pub fn instr(&self, id: InstrId) -> Option<&Instr> {
        self.body
            .iter()
            .flat_map(|block| block.body.iter())
            .find(|instr| instr.id == id)
    }

    pub fn instr_count(&self) -> usize {
        self.body.iter().map(|block| block.body.len()).sum()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub funcs: Vec<Fn>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            funcs: vec![],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Fn> {
        self.funcs.iter().find(|func| func.name == name)
    }

    /// Type a value evaluates to inside `func`, `None` for instructions that
    /// produce nothing or for dangling references.
    pub fn value_type(&self, func: &Fn, value: &Value) -> Option<Type> {
        match value {
            Value::ConstInt(_) => Some(Type::Int32),
            Value::Param(idx) => func.params.get(*idx).map(|(ty, _)| ty.clone()),
            Value::Instr(id) => match &func.instr(*id)?.kind {
                InstrKind::Alloca(_) => Some(Type::Ptr),
                InstrKind::Load { ty, .. } => Some(ty.clone()),
                InstrKind::Arith { .. } => Some(Type::Int32),
                InstrKind::Call { callee, .. } => match &self.get(callee)?.return_type {
                    Type::Void => None,
                    ty => Some(ty.clone()),
                },
                InstrKind::ExtractValue { aggregate, index } => {
                    match self.value_type(func, aggregate)? {
                        Type::Struct(fields) => fields.get(*index as usize).cloned(),
                        _ => None,
                    }
                }
                InstrKind::Store { .. } | InstrKind::Ret(_) => None,
            },
        }
    }

    fn fmt_value(&self, func: &Fn, value: &Value) -> String {
        let ty = self
            .value_type(func, value)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| "?".to_string());

        match value {
            Value::ConstInt(v) => format!("{} {}", ty, v),
            Value::Param(idx) => match func.params.get(*idx) {
                Some((_, name)) => format!("{} %{}", ty, name),
                None => format!("{} %arg{}", ty, idx),
            },
            Value::Instr(id) => format!("{} %{}", ty, id.0),
        }
    }

    fn fmt_instr(&self, f: &mut Formatter<'_>, func: &Fn, instr: &Instr) -> fmt::Result {
        let id = instr.id.0;

        match &instr.kind {
            InstrKind::Alloca(ty) => write!(f, "%{} = alloca {}", id, ty)?,
            InstrKind::Load { ty, ptr } => {
                write!(f, "%{} = load {}, {}", id, ty, self.fmt_value(func, ptr))?
            }
            InstrKind::Store { value, ptr } => write!(
                f,
                "store {}, {}",
                self.fmt_value(func, value),
                self.fmt_value(func, ptr)
            )?,
            InstrKind::Arith { op, lhs, rhs } => write!(
                f,
                "%{} = {} {}, {}",
                id,
                op,
                self.fmt_value(func, lhs),
                self.fmt_value(func, rhs)
            )?,
            InstrKind::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.fmt_value(func, arg))
                    .collect::<Vec<_>>();
                let ty = self
                    .get(callee)
                    .map(|callee| callee.return_type.clone())
                    .unwrap_or(Type::Void);

                if ty != Type::Void {
                    write!(f, "%{} = ", id)?;
                }

                write!(f, "call {} @{}({})", ty, callee, args.join(", "))?
            }
            InstrKind::ExtractValue { aggregate, index } => write!(
                f,
                "%{} = extractvalue {}, {}",
                id,
                self.fmt_value(func, aggregate),
                index
            )?,
            InstrKind::Ret(values) if values.is_empty() => write!(f, "ret void")?,
            InstrKind::Ret(values) => {
                let values = values
                    .iter()
                    .map(|value| self.fmt_value(func, value))
                    .collect::<Vec<_>>();
                write!(f, "ret {} {{ {} }}", func.return_type, values.join(", "))?
            }
        }

        if !instr.name.is_empty() {
            write!(f, " ; {}", instr.name)?;
        }

        Ok(())
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;

        for func in self.funcs.iter() {
            let params = func
                .params
                .iter()
                .map(|(ty, name)| format!("{} %{}", ty, name))
                .collect::<Vec<_>>();
            let keyword = if func.is_declaration() {
                "declare"
            } else {
                "define"
            };

            write!(
                f,
                "\n{} {} @{}({})",
                keyword,
                func.return_type,
                func.name,
                params.join(", ")
            )?;

            if func.is_declaration() {
                writeln!(f)?;
                continue;
            }

            writeln!(f, " {{")?;

            for block in func.body.iter() {
                writeln!(f, "{}:", block.name)?;

                for instr in block.body.iter() {
                    write!(f, "  ")?;
                    self.fmt_instr(f, func, instr)?;
                    writeln!(f)?;
                }
            }

            writeln!(f, "}}")?;
        }

        Ok(())
    }
}
