use std::fmt::{Debug, Display, Formatter};

use crate::error::Result;
use crate::frontend::types::Primitive;

#[cfg(feature = "llvm")]
mod codegen;
mod interp;
mod ir;
mod module;

#[cfg(feature = "llvm")]
pub use codegen::{CodeGen, LlvmSlot};
pub use interp::{Interpreter, RuntimeValue};
pub use ir::{FnRef, IrBackend, Slot};
pub use module::{Block, Fn, Instr, InstrId, InstrKind, Module, Type, Value};

/// The arithmetic instructions lowering may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    SDiv,
    URem,
}

impl ArithOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::SDiv => "sdiv",
            ArithOp::URem => "urem",
        }
    }
}

impl Display for ArithOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Target IR capability set the generator lowers into.
///
/// A backend owns one module and one ordinary insertion point, which
/// `append_entry_block` moves to the end of a fresh entry block. Stack
/// allocations never use that insertion point: callers pass the allocation
/// they want the new one to follow (or `None` for the very start of the
/// entry block).
pub trait Backend {
    type Type: Clone + Debug;
    type Value: Clone + Debug;
    type Slot: Clone + Debug;
    type Function: Clone + Debug;

    fn basic_type(&self, ty: Primitive) -> Result<Self::Type>;

    fn const_int(&self, value: i32) -> Self::Value;

    fn get_function(&self, name: &str) -> Option<Self::Function>;

    /// Declares a function with external linkage. A non-empty `returns`
    /// always becomes an aggregate return type, even with one element.
    fn declare_function(
        &mut self,
        name: &str,
        params: &[(Self::Type, &str)],
        returns: &[Self::Type],
    ) -> Result<Self::Function>;

    fn param_count(&self, func: &Self::Function) -> usize;

    fn param(&self, func: &Self::Function, idx: usize) -> Result<Self::Value>;

    fn has_body(&self, func: &Self::Function) -> bool;

    fn append_entry_block(&mut self, func: &Self::Function) -> Result<()>;

    fn build_alloca_after(
        &mut self,
        after: Option<&Self::Slot>,
        ty: &Self::Type,
        name: &str,
    ) -> Result<Self::Slot>;

    fn build_load(&mut self, slot: &Self::Slot, name: &str) -> Result<Self::Value>;

    fn build_store(&mut self, slot: &Self::Slot, value: Self::Value) -> Result<()>;

    fn build_arith(
        &mut self,
        op: ArithOp,
        lhs: Self::Value,
        rhs: Self::Value,
        name: &str,
    ) -> Result<Self::Value>;

    /// `None` when the callee returns void.
    fn build_call(
        &mut self,
        func: &Self::Function,
        args: &[Self::Value],
        name: &str,
    ) -> Result<Option<Self::Value>>;

    fn build_extract_value(
        &mut self,
        aggregate: Self::Value,
        index: u32,
        name: &str,
    ) -> Result<Self::Value>;

    /// An empty `values` emits a void return, anything else an aggregate
    /// return of all values in order.
    fn build_return(&mut self, values: &[Self::Value]) -> Result<()>;

    /// Whether the block at the ordinary insertion point already ends in a
    /// terminator.
    fn is_terminated(&self) -> bool;

    fn verify(&self, func: &Self::Function) -> Result<()>;

    /// Textual form of the whole module.
    fn dump(&self) -> String;
}
