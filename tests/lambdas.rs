use libscript::{Engine, SourceFile};

fn compile_ok(src: &str) -> (Engine, usize) {
    let mut engine = Engine::new();
    let script = engine.new_script(SourceFile::from_string(src));
    let ok = engine.compile(script);
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

fn fails(src: &str) {
    let mut engine = Engine::new();
    let script = engine.new_script(SourceFile::from_string(src));
    assert!(!engine.compile(script), "expected a compile failure");
}

#[test]
fn test_captureless_lambda_call() {
    let (engine, _) = compile_ok(
        "int f() {\n\
            auto add = [](int a, int b) { return a + b; };\n\
            return add(1, 2);\n\
        }",
    );

    // one closure type with one call operator was generated
    assert_eq!(engine.symbols.closures.len(), 1);
    let closure = &engine.symbols.closures[0];
    assert!(closure.captures.is_empty());
    assert!(closure.call.is_some());
}

#[test]
fn test_capture_by_value() {
    let (engine, _) = compile_ok(
        "int f() {\n\
            int base = 10;\n\
            auto bump = [base](int n) { return n + base; };\n\
            return bump(5);\n\
        }",
    );

    let closure = &engine.symbols.closures[0];
    assert_eq!(closure.captures.len(), 1);
    assert_eq!(closure.captures[0].name, "base");
    assert!(!closure.captures[0].by_ref);
}

#[test]
fn test_capture_by_reference() {
    let (engine, _) = compile_ok(
        "int f() {\n\
            int total = 0;\n\
            auto accumulate = [&total](int n) { total = total + n; return total; };\n\
            return accumulate(5);\n\
        }",
    );

    let closure = &engine.symbols.closures[0];
    assert!(closure.captures[0].by_ref);
}

#[test]
fn test_default_capture_collects_used_locals() {
    let (engine, _) = compile_ok(
        "int f() {\n\
            int a = 1;\n\
            int b = 2;\n\
            int unused = 3;\n\
            auto sum = [=]() { return a + b; };\n\
            return sum();\n\
        }",
    );

    // only the referenced locals are captured
    let closure = &engine.symbols.closures[0];
    let names: Vec<&str> = closure.captures.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_unused_explicit_capture_is_elided() {
    let (engine, _) = compile_ok(
        "int f() {\n\
            int a = 1;\n\
            int b = 2;\n\
            auto g = [a, b]() { return a; };\n\
            return g();\n\
        }",
    );

    let closure = &engine.symbols.closures[0];
    let names: Vec<&str> = closure.captures.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a"]);
}

#[test]
fn test_capture_with_initializer() {
    compile_ok(
        "int f() {\n\
            int a = 1;\n\
            auto g = [b = a + 1]() { return b; };\n\
            return g();\n\
        }",
    );
}

#[test]
fn test_mixed_default_capture_is_an_error() {
    fails("int f() { auto g = [=, &]() { return 0; }; return g(); }");
}

#[test]
fn test_unknown_capture_name() {
    fails("int f() { auto g = [q]() { return q; }; return g(); }");
}

#[test]
fn test_enclosing_local_not_visible_without_capture() {
    fails(
        "int f() {\n\
            int a = 1;\n\
            auto g = []() { return a; };\n\
            return g();\n\
        }",
    );
}

#[test]
fn test_this_capture_in_member_function() {
    compile_ok(
        "class Counter {\n\
           public:\n\
             int n;\n\
             int snapshot() {\n\
                 auto read = [this]() { return n; };\n\
                 return read();\n\
             }\n\
         };",
    );
}

#[test]
fn test_this_capture_outside_member_is_an_error() {
    fails("int f() { auto g = [this]() { return 0; }; return g(); }");
}

#[test]
fn test_lambda_return_type_deduction() {
    let (engine, _) = compile_ok(
        "int f() {\n\
            auto choose = [](bool c) { if (c) { return 1; } return 2; };\n\
            return choose(true);\n\
        }",
    );

    let closure = &engine.symbols.closures[0];
    let call = engine.symbols.function(closure.call.unwrap());
    assert_eq!(call.return_type(), libscript::Type::INT);
}

#[test]
fn test_conflicting_returns_cannot_be_deduced() {
    fails(
        "int f() {\n\
            auto g = [](bool c) { if (c) { return 1; } return 1.5; };\n\
            return g(true);\n\
        }",
    );
}
