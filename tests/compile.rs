use libscript::{Engine, SourceFile, Type};

fn compile(src: &str) -> (Engine, usize, bool) {
    let mut engine = Engine::new();
    let script = engine.new_script(SourceFile::from_string(src));
    let ok = engine.compile(script);
    (engine, script, ok)
}

fn compile_ok(src: &str) -> (Engine, usize) {
    let (engine, script, ok) = compile(src);
    if !ok {
        let messages: Vec<String> = engine
            .script(script)
            .messages
            .iter()
            .map(|m| m.to_string())
            .collect();
        panic!("compilation failed:\n{}", messages.join("\n"));
    }
    (engine, script)
}

#[test]
fn test_global_variable_and_assignment() {
    let (engine, script) = compile_ok("int a = 2; a = a + 1;");

    let s = engine.script(script);
    assert!(s.compiled);
    assert_eq!(s.globals.len(), 1);
    assert_eq!(s.globals[0].0, "a");
    assert_eq!(s.globals[0].1, Type::INT);
    assert_eq!(s.global_initializers.len(), 1);
    assert!(s.root_function.is_some());
}

#[test]
fn test_function_declaration_and_call() {
    let (engine, script) = compile_ok("int incr(int n) { return n + 1; } int b = incr(4);");

    let s = engine.script(script);
    let ns = engine.symbols.namespace(s.namespace.unwrap());
    assert!(ns.functions.contains_key("incr"));
    assert_eq!(s.globals[0].0, "b");
    assert_eq!(s.globals[0].1, Type::INT);
}

#[test]
fn test_auto_deduction() {
    let (engine, script) = compile_ok("auto a = 1.5; auto b = true;");
    let s = engine.script(script);
    assert_eq!(s.globals[0].1, Type::DOUBLE);
    assert_eq!(s.globals[1].1, Type::BOOLEAN);
}

#[test]
fn test_enum_with_skipped_entries() {
    let (engine, script) = compile_ok("enum E { X, Y, , Z };");

    let s = engine.script(script);
    let ns = engine.symbols.namespace(s.namespace.unwrap());
    let e = engine.symbols.enumeration(ns.enums[0]);

    let entries: Vec<(&str, i64)> = e.values.iter().map(|(n, v)| (n.as_str(), *v)).collect();
    assert_eq!(entries, vec![("X", 0), ("Y", 1), ("Z", 2)]);
    assert!(e.assignment.is_some());
}

#[test]
fn test_enum_assignment_compiles() {
    compile_ok("enum E { A, B }; E e = A; e = B;");
}

#[test]
fn test_compile_failure_reports_messages() {
    let (engine, script, ok) = compile("int a = \"text\";");
    assert!(!ok);

    let s = engine.script(script);
    assert!(!s.compiled);
    assert!(!s.messages.is_empty());
    let text = s.messages[0].to_string();
    assert!(text.starts_with("[error]"), "got: {text}");
}

#[test]
fn test_failed_session_rolls_back_symbols() {
    let mut engine = Engine::new();
    let classes_before = engine.symbols.classes.len();
    let functions_before = engine.symbols.functions.len();
    let namespaces_before = engine.symbols.namespaces.len();

    let script = engine.new_script(SourceFile::from_string(
        "class Good { int n; }; int f() { return 1; } int x = undeclared_name;",
    ));
    assert!(!engine.compile(script));

    // no partial symbols remain
    assert_eq!(engine.symbols.classes.len(), classes_before);
    assert_eq!(engine.symbols.functions.len(), functions_before);
    assert_eq!(engine.symbols.namespaces.len(), namespaces_before);
    assert!(engine.script(script).namespace.is_none());
    assert!(engine.script(script).globals.is_empty());
}

#[test]
fn test_two_scripts_do_not_interfere() {
    let mut engine = Engine::new();
    let first = engine.new_script(SourceFile::from_string("int a = 1;"));
    assert!(engine.compile(first));

    let second = engine.new_script(SourceFile::from_string("double a = 2.0;"));
    assert!(engine.compile(second));

    assert_eq!(engine.script(first).globals[0].1, Type::INT);
    assert_eq!(engine.script(second).globals[0].1, Type::DOUBLE);
}

#[test]
fn test_references_must_be_initialized() {
    let (_, _, ok) = compile("int & r;");
    assert!(!ok);
}

#[test]
fn test_narrowing_rejected_in_brace_initialization() {
    let (_, _, ok) = compile("int a = {1.5};");
    assert!(!ok);

    // the plain copy form narrows silently
    let (_, _, ok) = compile("int a = 1.5;");
    assert!(ok);
}

#[test]
fn test_brace_initializing_fundamental_yields_zero() {
    compile_ok("int a = {}; double b = {};");
}

#[test]
fn test_default_arguments() {
    compile_ok("int f(int a, int b = 2) { return a + b; } int x = f(1); int y = f(1, 5);");
}

#[test]
fn test_default_arguments_must_be_trailing() {
    // rejected at the declaration, before any call site
    let (engine, script, ok) = compile("int f(int a = 1, int b) { return a + b; }");
    assert!(!ok);

    let text = engine.script(script).messages[0].to_string();
    assert!(text.contains("trailing"), "got: {text}");

    let (_, _, ok) = compile("int f(int a, int b = 2, int c) { return a; }");
    assert!(!ok);
}

#[test]
fn test_conditional_expression_types() {
    compile_ok("int a = true ? 1 : 2;");
    compile_ok("double d = true ? 1 : 2.0;");

    let (_, _, ok) = compile("int a = true ? 1 : \"x\";");
    assert!(!ok);
}

#[test]
fn test_for_loop_and_jumps() {
    compile_ok(
        "int f() {\n\
            int total = 0;\n\
            for (int i = 0; i < 10; ++i) {\n\
                if (i == 5) { continue; }\n\
                if (i == 8) { break; }\n\
                total = total + i;\n\
            }\n\
            return total;\n\
        }",
    );
}

#[test]
fn test_break_outside_loop_is_an_error() {
    let (_, _, ok) = compile("int f() { break; return 1; }");
    assert!(!ok);
}

#[test]
fn test_void_return_rules() {
    let (_, _, ok) = compile("void f() { return 1; }");
    assert!(!ok);

    let (_, _, ok) = compile("int f() { return; }");
    assert!(!ok);

    compile_ok("void f() { return; }");
}

#[test]
fn test_typedef_and_alias() {
    compile_ok("typedef int Length; Length x = 3;");
    compile_ok("using Length = int; Length x = 3;");
}

#[test]
fn test_namespaces_and_qualified_lookup() {
    compile_ok(
        "namespace math { int square(int x) { return x * x; } }\n\
         int a = math::square(3);",
    );
}

#[test]
fn test_using_directive() {
    compile_ok(
        "namespace math { int square(int x) { return x * x; } }\n\
         using namespace math;\n\
         int a = square(3);",
    );
}

#[test]
fn test_namespace_alias() {
    compile_ok(
        "namespace outer { namespace inner { int one() { return 1; } } }\n\
         namespace oi = outer::inner;\n\
         int a = oi::one();",
    );
}

#[test]
fn test_string_operations() {
    compile_ok("string s = \"a\"; s = s + \"b\"; bool eq = s == \"ab\";");
}

#[test]
fn test_user_defined_literal() {
    compile_ok(
        "double operator\"\" _km(double x) { return x * 1000.0; }\n\
         double d = 2.5_km;",
    );
}

#[test]
fn test_unknown_literal_suffix_fails() {
    let (_, _, ok) = compile("double d = 2.5_unknown;");
    assert!(!ok);
}

#[test]
fn test_unknown_module_is_an_error() {
    let (_, _, ok) = compile("import no.such.module;");
    assert!(!ok);
}

#[test]
fn test_source_module_import() {
    let mut engine = Engine::new();
    engine.new_source_module(
        "math",
        SourceFile::from_string("int square(int x) { return x * x; }"),
    );

    let script = engine.new_script(SourceFile::from_string(
        "import math; int a = square(4);",
    ));
    assert!(engine.compile(script), "{:?}", engine.script(script).messages);
}

#[test]
fn test_command_compilation() {
    let mut engine = Engine::new();
    let context = engine.new_context();
    let x = engine.new_int(5);
    engine
        .context_mut(context)
        .variables
        .insert("x".into(), x);

    let expr = engine.compile_command("x + 1", context).unwrap();
    assert_eq!(expr.ty(), Type::INT);

    // assignment to a context variable lowers to a bind
    let expr = engine.compile_command("x = 7", context).unwrap();
    assert!(matches!(
        expr,
        libscript::program::Expression::BindExpression { .. }
    ));
}

#[test]
fn test_command_lambda_must_be_captureless() {
    let mut engine = Engine::new();
    let context = engine.new_context();
    let x = engine.new_int(5);
    engine
        .context_mut(context)
        .variables
        .insert("x".into(), x);

    assert!(engine.compile_command("[](int n) { return n; }", context).is_ok());
}
