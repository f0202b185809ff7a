use tracing::{debug, trace, warn};

use crate::backend::{ArithOp, Backend};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, ErrorKind, Result};
use crate::frontend::builder::FunctionBuilder;
use crate::frontend::scope::ScopeStack;
use crate::frontend::syntax::{
    Assign, Binary, BinaryOp, Call, Declaration, Function, Node, Return, Signature, Target,
};
use crate::frontend::types::Primitive;

/// Lowers parsed top-level items into a backend module. Every failure is
/// recorded at the point it happens; enclosing constructs add a context
/// line on the way out.
pub struct Generator<'a, B: Backend> {
    backend: &'a mut B,
    diagnostics: &'a mut dyn Diagnostics,
    scope: ScopeStack<B::Slot>,
}

impl<'a, B: Backend> Generator<'a, B> {
    pub fn new(backend: &'a mut B, diagnostics: &'a mut dyn Diagnostics) -> Self {
        Self {
            backend,
            diagnostics,
            scope: ScopeStack::new(),
        }
    }

    fn record(&mut self, error: Error) {
        self.diagnostics.record(Diagnostic::unpositioned(error));
    }

    fn fail<T>(&mut self, kind: ErrorKind, message: impl Into<String>) -> Result<T> {
        let error = Error::new(kind, message);

        self.record(error.clone());

        Err(error)
    }

    /// Records a failure that originates outside the generator (the backend
    /// or type resolution).
    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.record(err.clone());
        }

        result
    }

    fn note<T>(&mut self, result: Result<T>, message: impl Into<String>) -> Result<T> {
        if let Err(err) = &result {
            self.record(Error::new(err.kind, message));
        }

        result
    }

    /// Lowers every item, carrying on past failed ones.
    pub fn generate(&mut self, items: &[Node]) -> Vec<Result<B::Function>> {
        let results = items
            .iter()
            .map(|item| self.lower_item(item))
            .collect::<Vec<_>>();

        debug!(
            items = results.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "generated module"
        );

        results
    }

    pub fn lower_item(&mut self, item: &Node) -> Result<B::Function> {
        match item {
            Node::Function(func) => {
                let result = self.lower_function(func);
                self.note(
                    result,
                    format!("failed to generate function '{}'", func.signature.name),
                )
            }
            Node::Signature(sig) => match self.backend.get_function(&sig.name) {
                Some(existing) => Ok(existing),
                None => self.lower_signature(sig),
            },
            other => self.fail(
                ErrorKind::Type,
                format!("expected a function at top level, found {}", other.describe()),
            ),
        }
    }

    fn resolve_type(&mut self, name: &str) -> Result<B::Type> {
        let result = match Primitive::from_name(name) {
            Some(primitive) => self.backend.basic_type(primitive),
            None => Err(Error::new(
                ErrorKind::UnresolvedName,
                format!("unknown type '{}'", name),
            )),
        };

        self.report(result)
    }

    /// Declares the function. Parameters keep their declared order and a
    /// non-empty return list always becomes an aggregate.
    pub fn lower_signature(&mut self, sig: &Signature) -> Result<B::Function> {
        if let Some(name) = sig.duplicate_param() {
            return self.fail(
                ErrorKind::Redeclaration,
                format!("parameter '{}' is declared twice in '{}'", name, sig.name),
            );
        }

        let mut params = Vec::with_capacity(sig.params.len());

        for param in sig.params.iter() {
            params.push((self.resolve_type(&param.ty)?, param.name.as_str()));
        }

        let mut returns = Vec::with_capacity(sig.returns.len());

        for ty in sig.returns.iter() {
            returns.push(self.resolve_type(ty)?);
        }

        let result = self.backend.declare_function(&sig.name, &params, &returns);

        trace!(name = %sig.name, "declared function");

        self.report(result)
    }

    pub fn lower_function(&mut self, func: &Function) -> Result<B::Function> {
        let sig = &func.signature;

        let target = match self.backend.get_function(&sig.name) {
            Some(existing) if self.backend.has_body(&existing) => {
                return self.fail(
                    ErrorKind::Redeclaration,
                    format!("function '{}' already has a body", sig.name),
                );
            }
            Some(existing) if self.backend.param_count(&existing) != sig.params.len() => {
                return self.fail(
                    ErrorKind::Redeclaration,
                    format!("'{}' does not match its earlier declaration", sig.name),
                );
            }
            Some(existing) => existing,
            None => {
                let result = self.lower_signature(sig);
                self.note(result, format!("failed to declare '{}'", sig.name))?
            }
        };

        debug!(name = %sig.name, "lowering function");

        let result = FunctionBuilder::begin(self.backend, &mut self.scope, target.clone());
        let mut builder = self.report(result)?;

        let result = self.lower_body(&mut builder, func);
        self.scope.pop_frame();
        result?;

        if sig.is_void() && !self.backend.is_terminated() {
            let result = self.backend.build_return(&[]);
            self.report(result)?;
        }

        if let Err(err) = self.backend.verify(&target) {
            warn!(name = %sig.name, %err, "function failed verification");

            self.record(err.clone());

            return Err(err);
        }

        Ok(target)
    }

    fn lower_body(&mut self, builder: &mut FunctionBuilder<B>, func: &Function) -> Result<()> {
        for (idx, param) in func.signature.params.iter().enumerate() {
            if self.scope.lookup(&param.name).is_some() {
                return self.fail(
                    ErrorKind::Redeclaration,
                    format!("parameter '{}' is already declared", param.name),
                );
            }

            let ty = self.resolve_type(&param.ty)?;
            let result = builder.allocate(self.backend, &mut self.scope, &ty, &param.name);
            let slot = self.report(result)?;
            let result = self.backend.param(builder.func(), idx);
            let value = self.report(result)?;
            let result = self.backend.build_store(&slot, value);
            self.report(result)?;
        }

        for stmt in func.body.iter() {
            let result = self.lower_statement(builder, stmt);
            self.note(result, format!("failed to generate {}", stmt.describe()))?;
        }

        Ok(())
    }

    pub fn lower_statement(&mut self, builder: &mut FunctionBuilder<B>, stmt: &Node) -> Result<()> {
        match stmt {
            Node::Declaration(decl) => self.lower_declaration(builder, decl).map(|_| ()),
            Node::Assign(assign) => self.lower_assign(builder, assign),
            Node::Call(call) => self.lower_call(call).map(|_| ()),
            Node::Return(ret) => self.lower_return(ret),
            other => self.fail(
                ErrorKind::Type,
                format!("{} cannot be used as a statement", other.describe()),
            ),
        }
    }

    fn lower_declaration(
        &mut self,
        builder: &mut FunctionBuilder<B>,
        decl: &Declaration,
    ) -> Result<B::Slot> {
        if self.scope.lookup(&decl.name).is_some() {
            return self.fail(
                ErrorKind::Redeclaration,
                format!("'{}' is already declared", decl.name),
            );
        }

        let ty = self.resolve_type(&decl.ty)?;
        let result = builder.allocate(self.backend, &mut self.scope, &ty, &decl.name);

        self.report(result)
    }

    /// The storage an assignment writes to.
    fn lower_address(
        &mut self,
        builder: &mut FunctionBuilder<B>,
        target: &Target,
    ) -> Result<B::Slot> {
        match target {
            Target::Declaration(decl) => self.lower_declaration(builder, decl),
            Target::Variable(var) => match self.scope.lookup(&var.name) {
                Some(slot) => Ok(slot.clone()),
                None => self.fail(
                    ErrorKind::UnresolvedName,
                    format!("'{}' is not declared", var.name),
                ),
            },
        }
    }

    /// The target goes first so an inline declaration is bound before the
    /// value is lowered.
    fn lower_assign(&mut self, builder: &mut FunctionBuilder<B>, assign: &Assign) -> Result<()> {
        let slot = self.lower_address(builder, &assign.target)?;
        let result = self.lower_value(&assign.value);
        let value = self.note(result, "failed to generate right-hand side of assignment")?;
        let result = self.backend.build_store(&slot, value);

        self.report(result)
    }

    pub fn lower_value(&mut self, node: &Node) -> Result<B::Value> {
        match node {
            Node::Literal(value) => Ok(self.backend.const_int(*value)),
            Node::Variable(var) => {
                let slot = match self.scope.lookup(&var.name) {
                    Some(slot) => slot.clone(),
                    None => {
                        return self.fail(
                            ErrorKind::UnresolvedName,
                            format!("'{}' is not declared", var.name),
                        )
                    }
                };
                let result = self.backend.build_load(&slot, &var.name);

                self.report(result)
            }
            Node::Group(inner) => self.lower_value(inner),
            Node::Binary(binary) => self.lower_binary(binary),
            Node::Call(call) => match self.lower_call(call)? {
                Some(value) => Ok(value),
                None => self.fail(
                    ErrorKind::Type,
                    format!("'{}' returns void and has no value", call.name),
                ),
            },
            other => self.fail(
                ErrorKind::Type,
                format!("{} does not produce a value", other.describe()),
            ),
        }
    }

    fn lower_binary(&mut self, binary: &Binary) -> Result<B::Value> {
        let lhs = self.lower_value(&binary.left)?;
        let rhs = self.lower_value(&binary.right)?;

        let op = match binary.op {
            BinaryOp::Add => ArithOp::Add,
            BinaryOp::Sub => ArithOp::Sub,
            BinaryOp::Mul => ArithOp::Mul,
            BinaryOp::Div => ArithOp::SDiv,
            BinaryOp::Mod => ArithOp::URem,
            BinaryOp::Exp | BinaryOp::Root => {
                return self.fail(
                    ErrorKind::UnsupportedOperator,
                    format!("operator '{}' is not implemented", binary.op.symbol()),
                )
            }
        };

        let result = self.backend.build_arith(op, lhs, rhs, "");

        self.report(result)
    }

    /// Emits the call and yields element zero of the callee's aggregate
    /// return, or `None` for a void callee.
    fn lower_call(&mut self, call: &Call) -> Result<Option<B::Value>> {
        let func = match self.backend.get_function(&call.name) {
            Some(func) => func,
            None => {
                return self.fail(
                    ErrorKind::UnresolvedName,
                    format!("unknown function '{}'", call.name),
                )
            }
        };

        let expected = self.backend.param_count(&func);

        if expected != call.args.len() {
            return self.fail(
                ErrorKind::Arity,
                format!(
                    "'{}' takes {} arguments but {} were given",
                    call.name,
                    expected,
                    call.args.len()
                ),
            );
        }

        let mut args = Vec::with_capacity(call.args.len());

        for (idx, arg) in call.args.iter().enumerate() {
            let result = self.lower_value(arg);
            args.push(self.note(
                result,
                format!("failed to generate argument {} of '{}'", idx + 1, call.name),
            )?);
        }

        let result = self.backend.build_call(&func, &args, &call.name);

        match self.report(result)? {
            Some(aggregate) => {
                let result = self.backend.build_extract_value(aggregate, 0, "");
                self.report(result).map(Some)
            }
            None => Ok(None),
        }
    }

    fn lower_return(&mut self, ret: &Return) -> Result<()> {
        let mut values = Vec::with_capacity(ret.values.len());

        for value in ret.values.iter() {
            values.push(self.lower_value(value)?);
        }

        let result = self.backend.build_return(&values);

        self.report(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FnRef, InstrKind, Interpreter, IrBackend, RuntimeValue};
    use crate::frontend::syntax::{tokenize, ParseTable, Parser};

    struct Lowered {
        backend: IrBackend,
        results: Vec<Result<FnRef>>,
        diagnostics: Vec<Diagnostic>,
    }

    impl Lowered {
        fn run(&self, name: &str) -> Result<RuntimeValue> {
            Interpreter::new(self.backend.module()).call(name, vec![])
        }

        fn kinds(&self) -> Vec<Option<ErrorKind>> {
            self.results
                .iter()
                .map(|r| r.as_ref().err().map(|e| e.kind))
                .collect()
        }

        fn messages(&self) -> Vec<&str> {
            self.diagnostics
                .iter()
                .map(|d| d.error.message.as_str())
                .collect()
        }
    }

    fn lower(source: &str) -> Lowered {
        let table = ParseTable::default();
        let mut diagnostics: Vec<Diagnostic> = vec![];
        let (items, err) = Parser::new(tokenize(source), &table, &mut diagnostics).parse_program();

        assert_eq!(err, None, "{:?}", diagnostics);

        let mut backend = IrBackend::new("test");
        let results = Generator::new(&mut backend, &mut diagnostics).generate(&items);

        Lowered {
            backend,
            results,
            diagnostics,
        }
    }

    fn single(value: i32) -> Result<RuntimeValue> {
        Ok(RuntimeValue::Aggregate(vec![RuntimeValue::Int(value)]))
    }

    #[test]
    fn test_scalar_return() {
        let lowered = lower("int f() { return 2 + 3; }");

        assert_eq!(lowered.kinds(), vec![None]);
        assert_eq!(lowered.run("f"), single(5));
    }

    #[test]
    fn test_store_then_load() {
        let lowered = lower("int f() { int x; x = 5; return x; }");

        assert_eq!(lowered.run("f"), single(5));
    }

    #[test]
    fn test_void_function() {
        let lowered = lower("void g() { }");
        let func = lowered.backend.module().get("g").unwrap();

        assert_eq!(lowered.kinds(), vec![None]);
        assert_eq!(func.instr_count(), 1);
        assert_eq!(func.body[0].body[0].kind, InstrKind::Ret(vec![]));
        assert_eq!(lowered.run("g"), Ok(RuntimeValue::Void));
    }

    #[test]
    fn test_params_and_calls() {
        let lowered = lower(
            "int add(int a, int b) { return a + b; }\n\
             int main() { return add(2, 40); }",
        );

        assert_eq!(lowered.kinds(), vec![None, None]);
        assert_eq!(lowered.run("main"), single(42));
    }

    #[test]
    fn test_forward_declaration() {
        let lowered = lower(
            "int twice(int x);\n\
             int main() { return twice(4); }\n\
             int twice(int x) { return x * 2; }",
        );

        assert_eq!(lowered.kinds(), vec![None, None, None]);
        assert_eq!(lowered.run("main"), single(8));
    }

    #[test]
    fn test_allocas_stay_in_declaration_order() {
        let lowered = lower("int f(int a) { int b = a; int c = b; return c; }");
        let func = lowered.backend.module().get("f").unwrap();
        let allocas = func.body[0]
            .body
            .iter()
            .take_while(|instr| matches!(instr.kind, InstrKind::Alloca(_)))
            .map(|instr| instr.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(allocas, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_first_of_multiple_returns() {
        let lowered = lower(
            "(int, int) pair() { return 1, 2; }\n\
             int first() { return pair(); }",
        );

        assert_eq!(
            lowered.run("pair"),
            Ok(RuntimeValue::Aggregate(vec![
                RuntimeValue::Int(1),
                RuntimeValue::Int(2)
            ]))
        );
        assert_eq!(lowered.run("first"), single(1));
    }

    #[test]
    fn test_remainder_is_unsigned() {
        let lowered = lower("int f() { int x = 0 - 1; return x % 10; }");

        assert_eq!(lowered.run("f"), single(5));
    }

    #[test]
    fn test_climbing_operand_order_is_kept() {
        let lowered = lower("int f() { return 10 - 2 * 3; }");

        assert_eq!(lowered.run("f"), single(-4));
    }

    #[test]
    fn test_redeclaration_across_frames() {
        let mut backend = IrBackend::new("test");
        let mut diagnostics: Vec<Diagnostic> = vec![];
        let mut gen = Generator::new(&mut backend, &mut diagnostics);
        let func = gen.backend.declare_function("f", &[], &[]).unwrap();
        let mut builder = FunctionBuilder::begin(gen.backend, &mut gen.scope, func).unwrap();
        let decl = Declaration {
            name: "x".to_string(),
            ty: "int".to_string(),
        };

        assert!(gen.lower_declaration(&mut builder, &decl).is_ok());

        gen.scope.push_frame();

        assert_eq!(
            gen.lower_declaration(&mut builder, &decl).map_err(|e| e.kind),
            Err(ErrorKind::Redeclaration)
        );

        drop(gen);

        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_local_shadowing_param() {
        let lowered = lower("void f(int a) { int a; }");

        assert_eq!(lowered.kinds(), vec![Some(ErrorKind::Redeclaration)]);
    }

    #[test]
    fn test_arity_mismatch_emits_no_call() {
        let lowered = lower(
            "int add(int a, int b);\n\
             int main() { return add(1); }",
        );

        assert_eq!(lowered.kinds(), vec![None, Some(ErrorKind::Arity)]);

        let calls = lowered
            .backend
            .module()
            .funcs
            .iter()
            .flat_map(|func| func.body.iter())
            .flat_map(|block| block.body.iter())
            .filter(|instr| matches!(instr.kind, InstrKind::Call { .. }))
            .count();

        assert_eq!(calls, 0);
    }

    #[test]
    fn test_function_redefinition() {
        let lowered = lower("int f() { return 1; }\nint f() { return 2; }");

        assert_eq!(lowered.kinds(), vec![None, Some(ErrorKind::Redeclaration)]);
        assert_eq!(lowered.backend.module().get("f").unwrap().instr_count(), 1);
        assert_eq!(lowered.run("f"), single(1));
    }

    #[test]
    fn test_failures_are_per_function() {
        let lowered = lower("int a() { return y; }\nint b() { return 1; }");

        assert_eq!(lowered.kinds(), vec![Some(ErrorKind::UnresolvedName), None]);
        assert_eq!(
            lowered.messages(),
            vec![
                "'y' is not declared",
                "failed to generate return statement",
                "failed to generate function 'a'",
            ]
        );
        assert!(lowered.diagnostics.iter().all(|d| (d.line, d.column) == (0, 0)));
        assert_eq!(lowered.run("b"), single(1));
    }

    #[test]
    fn test_missing_return_fails_verification() {
        let lowered = lower("int f() { }");

        assert_eq!(lowered.kinds(), vec![Some(ErrorKind::Verification)]);
        assert!(lowered.backend.module().get("f").is_some());
    }

    #[test]
    fn test_unsupported_operator() {
        let lowered = lower("int f() { return 2 ^ 3; }");

        assert_eq!(lowered.kinds(), vec![Some(ErrorKind::UnsupportedOperator)]);
    }

    #[test]
    fn test_void_call_as_value() {
        let lowered = lower("void g() { }\nint f() { return g(); }");

        assert_eq!(lowered.kinds(), vec![None, Some(ErrorKind::Type)]);
    }

    #[test]
    fn test_unknown_function() {
        let lowered = lower("void f() { missing(); }");

        assert_eq!(lowered.kinds(), vec![Some(ErrorKind::UnresolvedName)]);
    }

    #[test]
    fn test_unsupported_types() {
        let lowered = lower("void f(string s) { }\nvoid g() { vec3 v; }");

        assert_eq!(
            lowered.kinds(),
            vec![Some(ErrorKind::Type), Some(ErrorKind::UnresolvedName)]
        );
    }

    #[test]
    fn test_duplicate_params() {
        let lowered = lower("int f(int a, int a) { return a; }");

        assert_eq!(lowered.kinds(), vec![Some(ErrorKind::Redeclaration)]);
        assert!(lowered.backend.module().get("f").is_none());
    }
}
