use std::collections::HashSet;

use tracing::trace;

use crate::backend::module::{Block, Fn, InstrId, InstrKind, Module, Type, Value};
use crate::backend::{ArithOp, Backend};
use crate::error::{error, Result};
use crate::frontend::types::Primitive;

/// Index of a function within the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FnRef(pub usize);

/// A stack allocation together with the type it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: InstrId,
    pub ty: Type,
}

/// The in-crate target: builds a `Module` that can be printed, verified
/// and executed by the interpreter.
#[derive(Debug)]
pub struct IrBackend {
    module: Module,
    cursor: Option<usize>,
}

impl IrBackend {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module: Module::new(module_name),
            cursor: None,
        }
    }

    #[inline]
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    fn func(&self, func: &FnRef) -> Result<&Fn> {
        match self.module.funcs.get(func.0) {
            Some(func) => Ok(func),
            None => error!(Backend, "dangling function reference {}", func.0),
        }
    }

    fn current(&mut self) -> Result<&mut Fn> {
        match self.cursor.and_then(|idx| self.module.funcs.get_mut(idx)) {
            Some(func) => Ok(func),
            None => error!(Backend, "no insertion point"),
        }
    }

    /// Appends an instruction at the ordinary insertion point.
    fn emit(&mut self, name: &str, kind: InstrKind) -> Result<InstrId> {
        let func = self.current()?;
        let instr = func.make_instr(name, kind);
        let id = instr.id;

        match func.body.last_mut() {
            Some(block) => block.body.push(instr),
            None => return error!(Backend, "function '{}' has no blocks", func.name),
        }

        Ok(id)
    }
}

impl Backend for IrBackend {
    type Type = Type;
    type Value = Value;
    type Slot = Slot;
    type Function = FnRef;

    fn basic_type(&self, ty: Primitive) -> Result<Type> {
        match ty {
            Primitive::Int => Ok(Type::Int32),
            Primitive::Float => Ok(Type::Float32),
            Primitive::String => error!(Type, "string values are not supported yet"),
            Primitive::Void => error!(Type, "'void' is not a value type"),
        }
    }

    fn const_int(&self, value: i32) -> Value {
        Value::ConstInt(value)
    }

    fn get_function(&self, name: &str) -> Option<FnRef> {
        self.module
            .funcs
            .iter()
            .position(|func| func.name == name)
            .map(FnRef)
    }

    fn declare_function(
        &mut self,
        name: &str,
        params: &[(Type, &str)],
        returns: &[Type],
    ) -> Result<FnRef> {
        if self.get_function(name).is_some() {
            return error!(Redeclaration, "function '{}' is already declared", name);
        }

        let return_type = if returns.is_empty() {
            Type::Void
        } else {
            Type::Struct(returns.to_vec())
        };
        let params = params
            .iter()
            .map(|(ty, name)| (ty.clone(), name.to_string()))
            .collect();

        self.module.funcs.push(Fn::new(name, params, return_type));

        Ok(FnRef(self.module.funcs.len() - 1))
    }

    fn param_count(&self, func: &FnRef) -> usize {
        self.func(func).map(|func| func.params.len()).unwrap_or(0)
    }

    fn param(&self, func: &FnRef, idx: usize) -> Result<Value> {
        let target = self.func(func)?;

        if idx >= target.params.len() {
            return error!(Backend, "'{}' has no parameter {}", target.name, idx);
        }

        Ok(Value::Param(idx))
    }

    fn has_body(&self, func: &FnRef) -> bool {
        self.func(func)
            .map(|func| !func.is_declaration())
            .unwrap_or(false)
    }

    fn append_entry_block(&mut self, func: &FnRef) -> Result<()> {
        self.func(func)?;
        self.module.funcs[func.0].body.push(Block::new("entry"));
        self.cursor = Some(func.0);

        Ok(())
    }

    fn build_alloca_after(&mut self, after: Option<&Slot>, ty: &Type, name: &str) -> Result<Slot> {
        let func = self.current()?;
        let instr = func.make_instr(name, InstrKind::Alloca(ty.clone()));
        let id = instr.id;

        let entry = match func.body.first_mut() {
            Some(entry) => entry,
            None => return error!(Backend, "function '{}' has no entry block", func.name),
        };

        let pos = match after {
            Some(slot) => match entry.body.iter().position(|instr| instr.id == slot.id) {
                Some(pos) => pos + 1,
                None => return error!(Backend, "allocation cursor is not in the entry block"),
            },
            None => 0,
        };

        trace!(%name, pos, "alloca");
        entry.body.insert(pos, instr);

        Ok(Slot {
            id,
            ty: ty.clone(),
        })
    }

    fn build_load(&mut self, slot: &Slot, name: &str) -> Result<Value> {
        let kind = InstrKind::Load {
            ty: slot.ty.clone(),
            ptr: Value::Instr(slot.id),
        };

        Ok(Value::Instr(self.emit(name, kind)?))
    }

    fn build_store(&mut self, slot: &Slot, value: Value) -> Result<()> {
        let kind = InstrKind::Store {
            value,
            ptr: Value::Instr(slot.id),
        };

        self.emit("", kind)?;

        Ok(())
    }

    fn build_arith(&mut self, op: ArithOp, lhs: Value, rhs: Value, name: &str) -> Result<Value> {
        Ok(Value::Instr(
            self.emit(name, InstrKind::Arith { op, lhs, rhs })?,
        ))
    }

    fn build_call(&mut self, func: &FnRef, args: &[Value], name: &str) -> Result<Option<Value>> {
        let callee = self.func(func)?;
        let returns_void = callee.return_type == Type::Void;
        let kind = InstrKind::Call {
            callee: callee.name.clone(),
            args: args.to_vec(),
        };
        let id = self.emit(name, kind)?;

        Ok(if returns_void {
            None
        } else {
            Some(Value::Instr(id))
        })
    }

    fn build_extract_value(&mut self, aggregate: Value, index: u32, name: &str) -> Result<Value> {
        Ok(Value::Instr(self.emit(
            name,
            InstrKind::ExtractValue { aggregate, index },
        )?))
    }

    fn build_return(&mut self, values: &[Value]) -> Result<()> {
        self.emit("", InstrKind::Ret(values.to_vec()))?;

        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.cursor
            .and_then(|idx| self.module.funcs.get(idx))
            .and_then(|func| func.body.last())
            .map(|block| block.terminator().is_some())
            .unwrap_or(false)
    }

    fn verify(&self, func: &FnRef) -> Result<()> {
        verify(&self.module, self.func(func)?)
    }

    fn dump(&self) -> String {
        self.module.to_string()
    }
}

fn alloca_type<'f>(func: &'f Fn, ptr: &Value) -> Option<&'f Type> {
    match ptr {
        Value::Instr(id) => match &func.instr(*id)?.kind {
            InstrKind::Alloca(ty) => Some(ty),
            _ => None,
        },
        _ => None,
    }
}

/// Structural checks on a finished function. Declarations always pass.
pub fn verify(module: &Module, func: &Fn) -> Result<()> {
    let mut defined = HashSet::new();

    let check_operand = |defined: &HashSet<InstrId>, value: &Value| -> Result<()> {
        match value {
            Value::ConstInt(_) => Ok(()),
            Value::Param(idx) if *idx < func.params.len() => Ok(()),
            Value::Param(idx) => error!(Verification, "parameter {} does not exist", idx),
            Value::Instr(id) if defined.contains(id) => Ok(()),
            Value::Instr(id) => error!(Verification, "%{} is used before it is defined", id.0),
        }
    };
    let type_of = |value: &Value| module.value_type(func, value);

    for block in func.body.iter() {
        match block.terminator() {
            Some(_) => {}
            None => {
                return error!(
                    Verification,
                    "block '{}' in '{}' does not end in a terminator",
                    block.name,
                    func.name
                )
            }
        }

        let last = block.body.len() - 1;

        for (idx, instr) in block.body.iter().enumerate() {
            if instr.is_terminator() && idx != last {
                return error!(
                    Verification,
                    "terminator in the middle of block '{}' in '{}'",
                    block.name,
                    func.name
                );
            }

            match &instr.kind {
                InstrKind::Alloca(_) => {}
                InstrKind::Load { ty, ptr } => {
                    check_operand(&defined, ptr)?;

                    if alloca_type(func, ptr) != Some(ty) {
                        return error!(Verification, "%{} loads through an invalid pointer", instr.id.0);
                    }
                }
                InstrKind::Store { value, ptr } => {
                    check_operand(&defined, value)?;
                    check_operand(&defined, ptr)?;

                    let slot = match alloca_type(func, ptr) {
                        Some(slot) => slot,
                        None => return error!(Verification, "store through an invalid pointer"),
                    };

                    if type_of(value).as_ref() != Some(slot) {
                        return error!(
                            Verification,
                            "stored value does not match slot type {}",
                            slot
                        );
                    }
                }
                InstrKind::Arith { op, lhs, rhs } => {
                    check_operand(&defined, lhs)?;
                    check_operand(&defined, rhs)?;

                    if type_of(lhs) != Some(Type::Int32) || type_of(rhs) != Some(Type::Int32) {
                        return error!(Verification, "{} expects integer operands", op);
                    }
                }
                InstrKind::Call { callee, args } => {
                    for arg in args {
                        check_operand(&defined, arg)?;
                    }

                    let target = match module.get(callee) {
                        Some(target) => target,
                        None => return error!(Verification, "call to unknown function '{}'", callee),
                    };

                    if target.params.len() != args.len() {
                        return error!(
                            Verification,
                            "call to '{}' passes {} arguments, expected {}",
                            callee,
                            args.len(),
                            target.params.len()
                        );
                    }

                    for (arg, (ty, name)) in args.iter().zip(target.params.iter()) {
                        if type_of(arg).as_ref() != Some(ty) {
                            return error!(
                                Verification,
                                "argument '{}' of '{}' expects {}",
                                name,
                                callee,
                                ty
                            );
                        }
                    }
                }
                InstrKind::ExtractValue { aggregate, index } => {
                    check_operand(&defined, aggregate)?;

                    match type_of(aggregate) {
                        Some(Type::Struct(fields)) if (*index as usize) < fields.len() => {}
                        _ => {
                            return error!(
                                Verification,
                                "extractvalue index {} out of range",
                                index
                            )
                        }
                    }
                }
                InstrKind::Ret(values) => {
                    for value in values {
                        check_operand(&defined, value)?;
                    }

                    let actual = values.iter().map(|value| type_of(value)).collect::<Vec<_>>();

                    let matches = match &func.return_type {
                        Type::Void => values.is_empty(),
                        Type::Struct(fields) => {
                            fields.len() == actual.len()
                                && fields
                                    .iter()
                                    .zip(actual.iter())
                                    .all(|(field, ty)| ty.as_ref() == Some(field))
                        }
                        _ => false,
                    };

                    if !matches {
                        return error!(
                            Verification,
                            "return does not match the declared return type {} of '{}'",
                            func.return_type,
                            func.name
                        );
                    }
                }
            }

            defined.insert(instr.id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn backend_with(name: &str, params: &[(Type, &str)], returns: &[Type]) -> (IrBackend, FnRef) {
        let mut backend = IrBackend::new("test");
        let func = backend.declare_function(name, params, returns).unwrap();

        backend.append_entry_block(&func).unwrap();

        (backend, func)
    }

    fn entry_kinds(backend: &IrBackend, func: &FnRef) -> Vec<InstrKind> {
        backend.module().funcs[func.0].body[0]
            .body
            .iter()
            .map(|instr| instr.kind.clone())
            .collect()
    }

    #[test]
    fn test_allocas_follow_cursor() {
        let (mut backend, func) = backend_with("f", &[], &[Type::Int32]);

        let a = backend.build_alloca_after(None, &Type::Int32, "a").unwrap();
        backend.build_store(&a, Value::ConstInt(1)).unwrap();
        let b = backend.build_alloca_after(Some(&a), &Type::Int32, "b").unwrap();
        backend.build_store(&b, Value::ConstInt(2)).unwrap();

        let names = backend.module().funcs[func.0].body[0]
            .body
            .iter()
            .map(|instr| instr.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["a", "b", "", ""]);
        assert!(matches!(entry_kinds(&backend, &func)[2], InstrKind::Store { .. }));
    }

    #[test]
    fn test_declare_aggregate_return() {
        let mut backend = IrBackend::new("test");
        let func = backend
            .declare_function("f", &[(Type::Int32, "a")], &[Type::Int32])
            .unwrap();
        let void = backend.declare_function("g", &[], &[]).unwrap();

        assert_eq!(
            backend.module().funcs[func.0].return_type,
            Type::Struct(vec![Type::Int32])
        );
        assert_eq!(backend.module().funcs[void.0].return_type, Type::Void);
        assert!(!backend.has_body(&func));
        assert_eq!(backend.param_count(&func), 1);
        assert_eq!(
            backend.declare_function("f", &[], &[]).map_err(|e| e.kind),
            Err(ErrorKind::Redeclaration)
        );
    }

    #[test]
    fn test_verify_ok() {
        let (mut backend, func) = backend_with("f", &[(Type::Int32, "a")], &[Type::Int32]);

        let slot = backend.build_alloca_after(None, &Type::Int32, "a").unwrap();
        let param = backend.param(&func, 0).unwrap();
        backend.build_store(&slot, param).unwrap();
        let value = backend.build_load(&slot, "").unwrap();
        let sum = backend
            .build_arith(ArithOp::Add, value, Value::ConstInt(1), "")
            .unwrap();
        backend.build_return(&[sum]).unwrap();

        assert!(backend.is_terminated());
        assert_eq!(backend.verify(&func), Ok(()));
    }

    #[test]
    fn test_verify_missing_terminator() {
        let (backend, func) = backend_with("f", &[], &[]);

        assert!(!backend.is_terminated());
        assert_eq!(
            backend.verify(&func).map_err(|e| e.kind),
            Err(ErrorKind::Verification)
        );
    }

    #[test]
    fn test_verify_return_shape() {
        let (mut backend, func) = backend_with("f", &[], &[Type::Int32]);

        backend.build_return(&[]).unwrap();

        assert_eq!(
            backend.verify(&func).map_err(|e| e.kind),
            Err(ErrorKind::Verification)
        );
    }

    #[test]
    fn test_verify_store_type() {
        let (mut backend, func) = backend_with("f", &[(Type::Float32, "x")], &[]);

        let slot = backend.build_alloca_after(None, &Type::Int32, "x").unwrap();
        let param = backend.param(&func, 0).unwrap();
        backend.build_store(&slot, param).unwrap();
        backend.build_return(&[]).unwrap();

        assert_eq!(
            backend.verify(&func).map_err(|e| e.kind),
            Err(ErrorKind::Verification)
        );
    }

    #[test]
    fn test_verify_terminator_in_middle() {
        let (mut backend, func) = backend_with("f", &[], &[]);

        backend.build_return(&[]).unwrap();
        backend.build_return(&[]).unwrap();

        assert_eq!(
            backend.verify(&func).map_err(|e| e.kind),
            Err(ErrorKind::Verification)
        );
    }

    #[test]
    fn test_emit_without_block() {
        let mut backend = IrBackend::new("test");

        assert_eq!(
            backend.build_return(&[]).map_err(|e| e.kind),
            Err(ErrorKind::Backend)
        );
    }
}
