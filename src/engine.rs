use anyhow::{anyhow, Result};
use tracing::info;

use crate::backend::{Backend, Interpreter, IrBackend, RuntimeValue};
use crate::diagnostics::Diagnostic;
use crate::error::Error;
use crate::frontend::syntax::{tokenize, Node, ParseTable, Parser};
use crate::frontend::Generator;

pub struct Options {
    pub module_name: String,
    pub print_tokens: bool,
    pub print_ast: bool,
    pub print_ir: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            module_name: "adze".to_string(),
            print_tokens: false,
            print_ast: false,
            print_ir: false,
        }
    }
}

/// Outcome of one pass over a source file. Items parsed before a syntax
/// error are still lowered.
pub struct Report<F> {
    pub items: Vec<Node>,
    pub parse_error: Option<Error>,
    pub functions: Vec<Result<F, Error>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<F> Report<F> {
    pub fn failed(&self) -> usize {
        self.functions.iter().filter(|func| func.is_err()).count()
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.parse_error.is_none() && self.failed() == 0
    }
}

/// Tokenizes, parses and lowers `source` into `backend`.
pub fn compile<B: Backend>(backend: &mut B, source: &str, opts: &Options) -> Report<B::Function> {
    let tokens = tokenize(source);

    if opts.print_tokens {
        for token in tokens.iter() {
            println!("{}", token);
        }
    }

    let table = ParseTable::default();
    let mut diagnostics: Vec<Diagnostic> = vec![];
    let (items, parse_error) = Parser::new(tokens, &table, &mut diagnostics).parse_program();

    if opts.print_ast {
        for item in items.iter() {
            print!("{}", item);
        }
    }

    let functions = Generator::new(backend, &mut diagnostics).generate(&items);

    if opts.print_ir {
        println!("{}", backend.dump());
    }

    let report = Report {
        items,
        parse_error,
        functions,
        diagnostics,
    };

    info!(
        module = %opts.module_name,
        functions = report.functions.len(),
        failed = report.failed(),
        "compiled"
    );

    report
}

/// Compiles against the reference backend and runs `entry` in the
/// interpreter. Fails on any diagnostic.
pub fn run(source: &str, opts: &Options, entry: &str, args: Vec<i32>) -> Result<RuntimeValue> {
    let mut backend = IrBackend::new(&opts.module_name);
    let report = compile(&mut backend, source, opts);

    if !report.is_ok() {
        return Err(anyhow!(
            "compilation failed with {} diagnostics",
            report.diagnostics.len()
        ));
    }

    let module = backend.into_module();
    let args = args.into_iter().map(RuntimeValue::Int).collect();

    Ok(Interpreter::new(&module).call(entry, args)?)
}

/// Compiles with LLVM and links a native executable at `dest`.
#[cfg(feature = "llvm")]
pub fn build(source: &str, opts: &Options, dest: &std::path::Path, optimize: bool) -> Result<()> {
    use inkwell::context::Context;

    use crate::backend::CodeGen;

    let context = Context::create();
    let mut codegen = CodeGen::new(&context, &opts.module_name);
    let report = compile(&mut codegen, source, opts);

    if !report.is_ok() {
        return Err(anyhow!(
            "compilation failed with {} diagnostics",
            report.diagnostics.len()
        ));
    }

    let object = codegen.emit_object(optimize)?;

    crate::gcc::link(object.as_slice(), dest, optimize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_args() {
        let source = "int add(int a, int b) { return a + b; }";

        assert_eq!(
            run(source, &Options::default(), "add", vec![40, 2]).unwrap(),
            RuntimeValue::Aggregate(vec![RuntimeValue::Int(42)])
        );
    }

    #[test]
    fn test_report_counts_failures() {
        let mut backend = IrBackend::new("test");
        let report = compile(
            &mut backend,
            "int a() { return x; }\nint b() { return 1; }\nint c( {",
            &Options::default(),
        );

        assert_eq!(report.items.len(), 2);
        assert!(report.parse_error.is_some());
        assert_eq!(report.failed(), 1);
        assert!(!report.is_ok());
        assert!(run("int f() { return 1 }", &Options::default(), "f", vec![]).is_err());
    }
}
