use anyhow::{anyhow, Result as AnyResult};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::{Linkage, Module};
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValue, BasicValueEnum, FunctionValue, IntValue, PointerValue,
};
use inkwell::OptimizationLevel;

use crate::backend::{ArithOp, Backend};
use crate::error::{error, Result};
use crate::frontend::types::Primitive;

#[derive(Debug, Clone, Copy)]
pub struct LlvmSlot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: BasicTypeEnum<'ctx>,
}

/// LLVM target. Stack slots are emitted by a second builder that is
/// repositioned after the previous alloca for every allocation, so the
/// ordinary builder never sees them.
pub struct CodeGen<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    alloca_builder: Builder<'ctx>,
    current: Option<FunctionValue<'ctx>>,
}

impl<'ctx> CodeGen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        Self {
            module: context.create_module(module_name),
            builder: context.create_builder(),
            alloca_builder: context.create_builder(),
            current: None,
            context,
        }
    }

    fn int_operand(value: BasicValueEnum<'ctx>) -> Result<IntValue<'ctx>> {
        match value {
            BasicValueEnum::IntValue(value) => Ok(value),
            other => error!(Type, "expected an integer operand, found {:?}", other.get_type()),
        }
    }

    /// Verifies the whole module and writes it out as a native object.
    pub fn emit_object(&self, optimize: bool) -> AnyResult<MemoryBuffer> {
        self.module
            .verify()
            .map_err(|e| anyhow!("failed to verify module: {}", e))?;

        Target::initialize_native(&InitializationConfig::default())
            .map_err(|e| anyhow!("failed to initialize target: {}", e))?;

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|e| anyhow!("unsupported target {:?}: {}", triple, e))?;
        let level = if optimize {
            OptimizationLevel::Aggressive
        } else {
            OptimizationLevel::None
        };
        let machine = target
            .create_target_machine(
                &triple,
                &TargetMachine::get_host_cpu_name().to_string(),
                &TargetMachine::get_host_cpu_features().to_string(),
                level,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| anyhow!("failed to create target machine for {:?}", triple))?;

        machine
            .write_to_memory_buffer(&self.module, FileType::Object)
            .map_err(|e| anyhow!("failed to write to memory buffer: {}", e))
    }
}

impl<'ctx> Backend for CodeGen<'ctx> {
    type Type = BasicTypeEnum<'ctx>;
    type Value = BasicValueEnum<'ctx>;
    type Slot = LlvmSlot<'ctx>;
    type Function = FunctionValue<'ctx>;

    fn basic_type(&self, ty: Primitive) -> Result<Self::Type> {
        match ty {
            Primitive::Int => Ok(self.context.i32_type().as_basic_type_enum()),
            Primitive::Float => Ok(self.context.f32_type().as_basic_type_enum()),
            Primitive::String => error!(Type, "string values are not supported yet"),
            Primitive::Void => error!(Type, "'void' is not a value type"),
        }
    }

    fn const_int(&self, value: i32) -> Self::Value {
        self.context
            .i32_type()
            .const_int(value as u64, value < 0)
            .as_basic_value_enum()
    }

    fn get_function(&self, name: &str) -> Option<Self::Function> {
        self.module.get_function(name)
    }

    fn declare_function(
        &mut self,
        name: &str,
        params: &[(Self::Type, &str)],
        returns: &[Self::Type],
    ) -> Result<Self::Function> {
        let param_types = params
            .iter()
            .map(|(ty, _)| BasicMetadataTypeEnum::from(*ty))
            .collect::<Vec<_>>();

        let fn_type = if returns.is_empty() {
            self.context.void_type().fn_type(&param_types, false)
        } else {
            self.context
                .struct_type(returns, false)
                .fn_type(&param_types, false)
        };

        let func = self
            .module
            .add_function(name, fn_type, Some(Linkage::External));

        for (param, (_, name)) in func.get_param_iter().zip(params.iter()) {
            param.set_name(name);
        }

        Ok(func)
    }

    fn param_count(&self, func: &Self::Function) -> usize {
        func.count_params() as usize
    }

    fn param(&self, func: &Self::Function, idx: usize) -> Result<Self::Value> {
        match func.get_nth_param(idx as u32) {
            Some(value) => Ok(value),
            None => error!(Backend, "function has no parameter {}", idx),
        }
    }

    fn has_body(&self, func: &Self::Function) -> bool {
        func.count_basic_blocks() > 0
    }

    fn append_entry_block(&mut self, func: &Self::Function) -> Result<()> {
        let block = self.context.append_basic_block(*func, "entry");

        self.builder.position_at_end(block);
        self.current = Some(*func);

        Ok(())
    }

    fn build_alloca_after(
        &mut self,
        after: Option<&Self::Slot>,
        ty: &Self::Type,
        name: &str,
    ) -> Result<Self::Slot> {
        let entry = match self.current.and_then(|func| func.get_first_basic_block()) {
            Some(entry) => entry,
            None => return error!(Backend, "no entry block to allocate in"),
        };

        let next = match after {
            Some(slot) => match slot.ptr.as_instruction_value() {
                Some(alloca) => alloca.get_next_instruction(),
                None => return error!(Backend, "allocation cursor is not an instruction"),
            },
            None => entry.get_first_instruction(),
        };

        match next {
            Some(instr) => self.alloca_builder.position_before(&instr),
            None => self.alloca_builder.position_at_end(entry),
        }

        let ptr = self.alloca_builder.build_alloca(*ty, name)?;

        Ok(LlvmSlot { ptr, ty: *ty })
    }

    fn build_load(&mut self, slot: &Self::Slot, name: &str) -> Result<Self::Value> {
        Ok(self.builder.build_load(slot.ty, slot.ptr, name)?)
    }

    fn build_store(&mut self, slot: &Self::Slot, value: Self::Value) -> Result<()> {
        self.builder.build_store(slot.ptr, value)?;

        Ok(())
    }

    fn build_arith(
        &mut self,
        op: ArithOp,
        lhs: Self::Value,
        rhs: Self::Value,
        name: &str,
    ) -> Result<Self::Value> {
        let (lhs, rhs) = (Self::int_operand(lhs)?, Self::int_operand(rhs)?);

        let value = match op {
            ArithOp::Add => self.builder.build_int_add(lhs, rhs, name)?,
            ArithOp::Sub => self.builder.build_int_sub(lhs, rhs, name)?,
            ArithOp::Mul => self.builder.build_int_mul(lhs, rhs, name)?,
            ArithOp::SDiv => self.builder.build_int_signed_div(lhs, rhs, name)?,
            ArithOp::URem => self.builder.build_int_unsigned_rem(lhs, rhs, name)?,
        };

        Ok(value.as_basic_value_enum())
    }

    fn build_call(
        &mut self,
        func: &Self::Function,
        args: &[Self::Value],
        name: &str,
    ) -> Result<Option<Self::Value>> {
        let args = args
            .iter()
            .map(|arg| BasicMetadataValueEnum::from(*arg))
            .collect::<Vec<_>>();

        Ok(self
            .builder
            .build_call(*func, &args, name)?
            .try_as_basic_value()
            .left())
    }

    fn build_extract_value(
        &mut self,
        aggregate: Self::Value,
        index: u32,
        name: &str,
    ) -> Result<Self::Value> {
        let aggregate = match aggregate {
            BasicValueEnum::StructValue(value) => value,
            other => return error!(Type, "cannot extract from {:?}", other.get_type()),
        };

        Ok(self.builder.build_extract_value(aggregate, index, name)?)
    }

    fn build_return(&mut self, values: &[Self::Value]) -> Result<()> {
        if values.is_empty() {
            self.builder.build_return(None)?;
        } else {
            self.builder.build_aggregate_return(values)?;
        }

        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    fn verify(&self, func: &Self::Function) -> Result<()> {
        if !func.verify(false) {
            let name = func.get_name().to_string_lossy();
            return error!(Verification, "function '{}' failed LLVM verification", name);
        }

        Ok(())
    }

    fn dump(&self) -> String {
        self.module.print_to_string().to_string()
    }
}
