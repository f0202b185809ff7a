use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use tracing::trace;

use crate::backend::module::{Fn, Instr, InstrId, InstrKind, Module, Value};
use crate::backend::ArithOp;
use crate::error::{error, Result};

const MAX_CALL_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeValue {
    Int(i32),
    Float(f32),
    Aggregate(Vec<RuntimeValue>),
    Void,
}

impl RuntimeValue {
    fn as_int(&self) -> Result<i32> {
        match self {
            RuntimeValue::Int(value) => Ok(*value),
            value => error!(Type, "expected an int, found {}", value),
        }
    }
}

impl Display for RuntimeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeValue::Int(value) => write!(f, "{}", value),
            RuntimeValue::Float(value) => write!(f, "{}", value),
            RuntimeValue::Void => write!(f, "void"),
            RuntimeValue::Aggregate(values) => {
                let values = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                write!(f, "{{ {} }}", values.join(", "))
            }
        }
    }
}

/// Applies one arithmetic instruction with 32-bit wrapping semantics.
/// Division and remainder by zero trap, as does `i32::MIN / -1`.
pub fn arith(op: ArithOp, lhs: i32, rhs: i32) -> Result<i32> {
    match op {
        ArithOp::Add => Ok(lhs.wrapping_add(rhs)),
        ArithOp::Sub => Ok(lhs.wrapping_sub(rhs)),
        ArithOp::Mul => Ok(lhs.wrapping_mul(rhs)),
        ArithOp::SDiv if rhs == 0 => error!(Trap, "division by zero"),
        ArithOp::SDiv => match lhs.checked_div(rhs) {
            Some(value) => Ok(value),
            None => error!(Trap, "signed division overflow"),
        },
        ArithOp::URem if rhs == 0 => error!(Trap, "remainder by zero"),
        ArithOp::URem => Ok(((lhs as u32) % (rhs as u32)) as i32),
    }
}

struct Frame<'m> {
    func: &'m Fn,
    args: Vec<RuntimeValue>,
    instrs: Vec<&'m Instr>,
    pc: usize,
    values: HashMap<InstrId, RuntimeValue>,
    slots: HashMap<InstrId, Option<RuntimeValue>>,
}

impl<'m> Frame<'m> {
    fn new(func: &'m Fn, args: Vec<RuntimeValue>) -> Self {
        Self {
            func,
            args,
            instrs: func.body.iter().flat_map(|block| block.body.iter()).collect(),
            pc: 0,
            values: HashMap::new(),
            slots: HashMap::new(),
        }
    }

    fn eval(&self, value: &Value) -> Result<RuntimeValue> {
        match value {
            Value::ConstInt(value) => Ok(RuntimeValue::Int(*value)),
            Value::Param(idx) => match self.args.get(*idx) {
                Some(value) => Ok(value.clone()),
                None => error!(Backend, "parameter {} out of range", idx),
            },
            Value::Instr(id) => match self.values.get(id) {
                Some(value) => Ok(value.clone()),
                None => error!(Backend, "%{} has no value", id.0),
            },
        }
    }

    fn eval_all(&self, values: &[Value]) -> Result<Vec<RuntimeValue>> {
        values.iter().map(|value| self.eval(value)).collect()
    }

    /// Stores the result of the instruction at `pc` and moves past it.
    fn complete(&mut self, value: RuntimeValue) -> Result<()> {
        match self.instrs.get(self.pc) {
            Some(instr) => {
                self.values.insert(instr.id, value);
                self.pc += 1;

                Ok(())
            }
            None => error!(Backend, "no instruction to complete in '{}'", self.func.name),
        }
    }
}

enum Step {
    Next,
    Call(String, Vec<RuntimeValue>),
    Return(RuntimeValue),
}

/// Executes functions of a reference IR module.
///
/// Calls run on an explicit call stack, so deep recursion traps at
/// `MAX_CALL_DEPTH` instead of exhausting the native stack.
pub struct Interpreter<'m> {
    module: &'m Module,
    call_stack: Vec<Frame<'m>>,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            call_stack: vec![],
        }
    }

    pub fn call(&mut self, name: &str, args: Vec<RuntimeValue>) -> Result<RuntimeValue> {
        self.call_stack.clear();

        let result = self.run(name, args);

        self.call_stack.clear();

        result
    }

    fn run(&mut self, name: &str, args: Vec<RuntimeValue>) -> Result<RuntimeValue> {
        self.enter(name, args)?;

        loop {
            let step = match self.call_stack.last_mut() {
                Some(frame) => Self::step(frame)?,
                None => return error!(Backend, "empty call stack"),
            };

            match step {
                Step::Next => {}
                Step::Call(callee, args) => self.enter(&callee, args)?,
                Step::Return(value) => {
                    self.call_stack.pop();

                    match self.call_stack.last_mut() {
                        Some(caller) => caller.complete(value)?,
                        None => return Ok(value),
                    }
                }
            }
        }
    }

    fn enter(&mut self, name: &str, args: Vec<RuntimeValue>) -> Result<()> {
        let func = match self.module.get(name) {
            Some(func) => func,
            None => return error!(UnresolvedName, "unknown function '{}'", name),
        };

        if func.is_declaration() {
            return error!(Backend, "function '{}' has no body", name);
        }

        if func.params.len() != args.len() {
            return error!(
                Arity,
                "'{}' takes {} arguments, got {}",
                name,
                func.params.len(),
                args.len()
            );
        }

        if self.call_stack.len() >= MAX_CALL_DEPTH {
            return error!(Trap, "stack overflow calling '{}'", name);
        }

        trace!(%name, depth = self.call_stack.len(), "call");

        self.call_stack.push(Frame::new(func, args));

        Ok(())
    }

    fn slot(value: &Value) -> Result<InstrId> {
        match value {
            Value::Instr(id) => Ok(*id),
            _ => error!(Backend, "not a stack slot"),
        }
    }

    fn step(frame: &mut Frame<'m>) -> Result<Step> {
        let instr = match frame.instrs.get(frame.pc) {
            Some(instr) => *instr,
            None => return error!(Verification, "'{}' ended without a return", frame.func.name),
        };

        let result = match &instr.kind {
            InstrKind::Alloca(_) => {
                frame.slots.insert(instr.id, None);
                frame.pc += 1;

                return Ok(Step::Next);
            }
            InstrKind::Load { ptr, .. } => {
                let id = Self::slot(ptr)?;

                match frame.slots.get(&id) {
                    Some(Some(value)) => value.clone(),
                    Some(None) => return error!(Trap, "load from uninitialised slot %{}", id.0),
                    None => return error!(Backend, "%{} is not a stack slot", id.0),
                }
            }
            InstrKind::Store { value, ptr } => {
                let value = frame.eval(value)?;
                let id = Self::slot(ptr)?;

                match frame.slots.get_mut(&id) {
                    Some(slot) => *slot = Some(value),
                    None => return error!(Backend, "%{} is not a stack slot", id.0),
                }

                frame.pc += 1;

                return Ok(Step::Next);
            }
            InstrKind::Arith { op, lhs, rhs } => {
                let lhs = frame.eval(lhs)?.as_int()?;
                let rhs = frame.eval(rhs)?.as_int()?;

                RuntimeValue::Int(arith(*op, lhs, rhs)?)
            }
            InstrKind::Call { callee, args } => {
                return Ok(Step::Call(callee.clone(), frame.eval_all(args)?));
            }
            InstrKind::ExtractValue { aggregate, index } => match frame.eval(aggregate)? {
                RuntimeValue::Aggregate(mut values) if (*index as usize) < values.len() => {
                    values.swap_remove(*index as usize)
                }
                value => return error!(Type, "cannot extract {} from {}", index, value),
            },
            InstrKind::Ret(values) if values.is_empty() => return Ok(Step::Return(RuntimeValue::Void)),
            InstrKind::Ret(values) => {
                return Ok(Step::Return(RuntimeValue::Aggregate(frame.eval_all(values)?)));
            }
        };

        frame.complete(result)?;

        Ok(Step::Next)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::backend::module::Type;
    use crate::backend::{Backend, IrBackend};
    use crate::error::ErrorKind;

    #[test_case(ArithOp::Add, i32::MAX, 1, Ok(i32::MIN); "add wraps")]
    #[test_case(ArithOp::Sub, 2, 5, Ok(-3); "sub")]
    #[test_case(ArithOp::Mul, 6, 7, Ok(42); "mul")]
    #[test_case(ArithOp::SDiv, -7, 2, Ok(-3); "sdiv truncates")]
    #[test_case(ArithOp::SDiv, 1, 0, Err(ErrorKind::Trap); "sdiv by zero")]
    #[test_case(ArithOp::SDiv, i32::MIN, -1, Err(ErrorKind::Trap); "sdiv overflow")]
    #[test_case(ArithOp::URem, 7, 3, Ok(1); "urem")]
    #[test_case(ArithOp::URem, -1, 10, Ok(5); "urem is unsigned")]
    #[test_case(ArithOp::URem, 7, 0, Err(ErrorKind::Trap); "urem by zero")]
    fn test_arith(op: ArithOp, lhs: i32, rhs: i32, expected: std::result::Result<i32, ErrorKind>) {
        assert_eq!(arith(op, lhs, rhs).map_err(|e| e.kind), expected);
    }

    #[test]
    fn test_call_with_args() {
        let mut backend = IrBackend::new("test");
        let double = backend
            .declare_function("double", &[(Type::Int32, "x")], &[Type::Int32])
            .unwrap();

        backend.append_entry_block(&double).unwrap();

        let x = backend.param(&double, 0).unwrap();
        let value = backend.build_arith(ArithOp::Mul, x, Value::ConstInt(2), "").unwrap();
        backend.build_return(&[value]).unwrap();

        let module = backend.into_module();
        let mut interp = Interpreter::new(&module);

        assert_eq!(
            interp.call("double", vec![RuntimeValue::Int(21)]),
            Ok(RuntimeValue::Aggregate(vec![RuntimeValue::Int(42)]))
        );
        assert_eq!(
            interp.call("double", vec![]).map_err(|e| e.kind),
            Err(ErrorKind::Arity)
        );
        assert_eq!(
            interp.call("missing", vec![]).map_err(|e| e.kind),
            Err(ErrorKind::UnresolvedName)
        );
    }

    #[test]
    fn test_uninitialised_load_traps() {
        let mut backend = IrBackend::new("test");
        let func = backend.declare_function("f", &[], &[Type::Int32]).unwrap();

        backend.append_entry_block(&func).unwrap();

        let slot = backend.build_alloca_after(None, &Type::Int32, "x").unwrap();
        let value = backend.build_load(&slot, "").unwrap();
        backend.build_return(&[value]).unwrap();

        let module = backend.into_module();

        assert_eq!(
            Interpreter::new(&module).call("f", vec![]).map_err(|e| e.kind),
            Err(ErrorKind::Trap)
        );
    }

    fn runaway() -> Module {
        let mut backend = IrBackend::new("test");
        let func = backend.declare_function("loop", &[], &[]).unwrap();

        backend.append_entry_block(&func).unwrap();
        backend.build_call(&func, &[], "").unwrap();
        backend.build_return(&[]).unwrap();

        backend.into_module()
    }

    #[test]
    fn test_runaway_recursion_traps() {
        let module = runaway();
        let mut interp = Interpreter::new(&module);

        assert_eq!(
            interp.call("loop", vec![]).map_err(|e| e.kind),
            Err(ErrorKind::Trap)
        );
        assert_eq!(interp.call_stack.len(), 0);
    }

    #[test]
    fn test_runaway_recursion_traps_on_small_stack() {
        let result = std::thread::Builder::new()
            .stack_size(64 * 1024)
            .spawn(|| {
                let module = runaway();
                let result = Interpreter::new(&module).call("loop", vec![]);

                result.map_err(|e| e.kind)
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(result, Err(ErrorKind::Trap));
    }

    #[test]
    fn test_nested_calls_return_to_caller() {
        let mut backend = IrBackend::new("test");
        let inc = backend
            .declare_function("inc", &[(Type::Int32, "x")], &[Type::Int32])
            .unwrap();

        backend.append_entry_block(&inc).unwrap();

        let x = backend.param(&inc, 0).unwrap();
        let value = backend.build_arith(ArithOp::Add, x, Value::ConstInt(1), "").unwrap();
        backend.build_return(&[value]).unwrap();

        let twice = backend
            .declare_function("twice", &[(Type::Int32, "x")], &[Type::Int32])
            .unwrap();

        backend.append_entry_block(&twice).unwrap();

        let x = backend.param(&twice, 0).unwrap();
        let first = backend.build_call(&inc, &[x], "").unwrap().unwrap();
        let first = backend.build_extract_value(first, 0, "").unwrap();
        let second = backend.build_call(&inc, &[first], "").unwrap().unwrap();
        let second = backend.build_extract_value(second, 0, "").unwrap();
        backend.build_return(&[second]).unwrap();

        let module = backend.into_module();

        assert_eq!(
            Interpreter::new(&module).call("twice", vec![RuntimeValue::Int(40)]),
            Ok(RuntimeValue::Aggregate(vec![RuntimeValue::Int(42)]))
        );
    }
}
