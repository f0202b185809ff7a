use crate::backend::Backend;
use crate::error::Result;
use crate::frontend::scope::ScopeStack;

/// Per-function lowering state. Ordinary instructions go through the
/// backend's insertion point, stack allocations through `last_alloca`,
/// which keeps every allocation ahead of the code that uses it and in
/// declaration order.
pub struct FunctionBuilder<B: Backend> {
    func: B::Function,
    last_alloca: Option<B::Slot>,
}

impl<B: Backend> FunctionBuilder<B> {
    /// Creates the entry block, points both cursors at its start and opens
    /// a scope frame for the body.
    pub fn begin(
        backend: &mut B,
        scope: &mut ScopeStack<B::Slot>,
        func: B::Function,
    ) -> Result<Self> {
        backend.append_entry_block(&func)?;
        scope.push_frame();

        Ok(Self {
            func,
            last_alloca: None,
        })
    }

    #[inline]
    pub fn func(&self) -> &B::Function {
        &self.func
    }

    /// Emits a stack slot right after the previous one and binds `name` to
    /// it in the innermost frame.
    pub fn allocate(
        &mut self,
        backend: &mut B,
        scope: &mut ScopeStack<B::Slot>,
        ty: &B::Type,
        name: &str,
    ) -> Result<B::Slot> {
        let slot = backend.build_alloca_after(self.last_alloca.as_ref(), ty, name)?;

        scope.bind(name, slot.clone());
        self.last_alloca = Some(slot.clone());

        Ok(slot)
    }
}
