use libscript::symbols::{TemplateArgument, TemplateInstance};
use libscript::{Engine, SourceFile, Type};

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

fn script_template(engine: &Engine, script: usize, name: &str) -> libscript::symbols::TemplateId {
    let ns = engine
        .symbols
        .namespace(engine.script(script).namespace.unwrap());
    ns.templates
        .iter()
        .copied()
        .find(|&t| engine.symbols.template(t).name == name)
        .unwrap_or_else(|| panic!("no template named '{name}'"))
}

#[test]
fn test_class_template_instance() {
    let (engine, script) = compile_ok("template<typename T> class Box { T value; }; Box<int> b;");

    let tid = script_template(&engine, script, "Box");
    let template = engine.symbols.template(tid);
    assert_eq!(template.instances.len(), 1);

    let (args, instance) = template.instances.iter().next().unwrap();
    assert_eq!(args, &vec![TemplateArgument::Type(Type::INT)]);
    let TemplateInstance::Class(class) = instance else {
        panic!("expected a class instance");
    };

    let class = engine.symbols.class(*class);
    assert_eq!(class.data_members.len(), 1);
    assert_eq!(class.data_members[0].ty, Type::INT);
    assert_eq!(class.instance_of, Some(tid));
}

#[test]
fn test_instances_are_cached() {
    let mut engine = Engine::new();
    let array = engine.symbols.builtins.array;

    let first = engine
        .instantiate(array, vec![TemplateArgument::Type(Type::INT)])
        .unwrap();
    let second = engine
        .instantiate(array, vec![TemplateArgument::Type(Type::INT)])
        .unwrap();
    assert_eq!(first, second);

    let other = engine
        .instantiate(array, vec![TemplateArgument::Type(Type::DOUBLE)])
        .unwrap();
    assert_ne!(first, other);
}

#[test]
fn test_array_instance_surface() {
    let mut engine = Engine::new();
    let array = engine.symbols.builtins.array;
    let class = engine
        .instantiate(array, vec![TemplateArgument::Type(Type::INT)])
        .unwrap();

    let c = engine.symbols.class(class);
    assert_eq!(c.constructors.len(), 2);
    assert!(c.destructor.is_some());
    assert!(c.methods.contains_key("size"));
    assert!(c.methods.contains_key("resize"));
    // subscript (mutable + const) and copy assignment
    assert_eq!(c.operators.len(), 3);
    assert!(engine.symbols.is_array(Type::object(class)));
}

#[test]
fn test_initializer_list_instance_surface() {
    let mut engine = Engine::new();
    let il = engine.symbols.builtins.initializer_list;
    let class = engine
        .instantiate(il, vec![TemplateArgument::Type(Type::INT)])
        .unwrap();

    let c = engine.symbols.class(class);
    assert!(c.methods.contains_key("size"));
    assert!(c.methods.contains_key("begin"));
    assert!(c.methods.contains_key("end"));
    assert!(engine.symbols.is_initializer_list(Type::object(class)));

    // the iterator is a nested class with get/increment/equality
    assert_eq!(c.classes.len(), 1);
    let iterator = engine.symbols.class(c.classes[0]);
    assert!(iterator.methods.contains_key("get"));
}

#[test]
fn test_array_expression_instantiates_array() {
    let (engine, script) = compile_ok("int f() { auto xs = [1, 2, 3]; return xs.size(); }");

    let array = engine.symbols.builtins.array;
    assert!(engine
        .symbols
        .template(array)
        .has_instance(&[TemplateArgument::Type(Type::INT)]));
    let _ = script;
}

#[test]
fn test_function_template_deduction() {
    let (engine, script) = compile_ok(
        "template<typename T> T same(T x) { return x; }\n\
         int a = same(3);\n\
         double b = same(1.5);",
    );

    let tid = script_template(&engine, script, "same");
    let template = engine.symbols.template(tid);
    assert_eq!(template.instances.len(), 2);
    assert!(template.has_instance(&[TemplateArgument::Type(Type::INT)]));
    assert!(template.has_instance(&[TemplateArgument::Type(Type::DOUBLE)]));

    let s = engine.script(script);
    assert_eq!(s.globals[0].1, Type::INT);
    assert_eq!(s.globals[1].1, Type::DOUBLE);
}

#[test]
fn test_conflicting_deduction_rejects_candidate() {
    fails(
        "template<typename T> T pick(T a, T b) { return a; }\n\
         int x = pick(1, 2.0);",
    );
    compile_ok(
        "template<typename T> T pick(T a, T b) { return a; }\n\
         int x = pick(1, 2);",
    );
}

#[test]
fn test_non_template_preferred_over_template() {
    let (engine, script) = compile_ok(
        "int twice(int x) { return x + x; }\n\
         template<typename T> T twice(T x) { return x; }\n\
         int a = twice(3);\n\
         double b = twice(1.5);",
    );

    // the int call used the plain function, so only the double instance
    // exists
    let tid = script_template(&engine, script, "twice");
    let template = engine.symbols.template(tid);
    assert_eq!(template.instances.len(), 1);
    assert!(template.has_instance(&[TemplateArgument::Type(Type::DOUBLE)]));
}

#[test]
fn test_explicit_template_arguments() {
    compile_ok(
        "template<typename T> T zero_of() { return T(); }\n\
         int a = zero_of<int>();",
    );
}

#[test]
fn test_default_template_argument() {
    let (engine, script) = compile_ok(
        "template<typename T = int> class Holder { T value; };\n\
         Holder<> h;",
    );

    let tid = script_template(&engine, script, "Holder");
    assert!(engine
        .symbols
        .template(tid)
        .has_instance(&[TemplateArgument::Type(Type::INT)]));
    let _ = script;
}

#[test]
fn test_missing_non_defaulted_parameter() {
    fails("template<typename T> class Holder { T value; }; Holder<> h;");
}

#[test]
fn test_non_type_template_parameter() {
    let (engine, script) = compile_ok(
        "template<int N> class Sized { int capacity; };\n\
         Sized<4> s;",
    );

    let tid = script_template(&engine, script, "Sized");
    assert!(engine
        .symbols
        .template(tid)
        .has_instance(&[TemplateArgument::Integer(4)]));
}

#[test]
fn test_full_specialization() {
    let (engine, script) = compile_ok(
        "template<typename T> class Holder { T value; };\n\
         template<> class Holder<bool> { int packed; };\n\
         Holder<int> a;\n\
         Holder<bool> b;",
    );

    let tid = script_template(&engine, script, "Holder");
    let template = engine.symbols.template(tid);

    let TemplateInstance::Class(generic) = template
        .get_instance(&[TemplateArgument::Type(Type::INT)])
        .unwrap()
    else {
        panic!("expected a class");
    };
    let TemplateInstance::Class(special) = template
        .get_instance(&[TemplateArgument::Type(Type::BOOLEAN)])
        .unwrap()
    else {
        panic!("expected a class");
    };

    assert_eq!(engine.symbols.class(generic).data_members[0].name, "value");
    assert_eq!(engine.symbols.class(special).data_members[0].name, "packed");
}

#[test]
fn test_partial_specialization_selection() {
    let (engine, script) = compile_ok(
        "template<typename T> class Wrap { T plain; };\n\
         template<typename T> class Wrap<T&> { T referred; };\n\
         Wrap<int> a;\n\
         Wrap<int&> b;",
    );

    let tid = script_template(&engine, script, "Wrap");
    let template = engine.symbols.template(tid);
    assert_eq!(template.specializations.len(), 1);

    let TemplateInstance::Class(plain) = template
        .get_instance(&[TemplateArgument::Type(Type::INT)])
        .unwrap()
    else {
        panic!("expected a class");
    };
    let TemplateInstance::Class(referred) = template
        .get_instance(&[TemplateArgument::Type(Type::reference(Type::INT))])
        .unwrap()
    else {
        panic!("expected a class");
    };

    assert_eq!(engine.symbols.class(plain).data_members[0].name, "plain");
    assert_eq!(
        engine.symbols.class(referred).data_members[0].name,
        "referred"
    );
}

#[test]
fn test_parameter_pack_takes_trailing_arguments() {
    let (engine, script) = compile_ok(
        "template<typename T, typename... Rest> class Tuple { T head; };\n\
         Tuple<int> a;\n\
         Tuple<int, double, bool> b;",
    );

    let tid = script_template(&engine, script, "Tuple");
    let template = engine.symbols.template(tid);
    assert_eq!(template.instances.len(), 2);

    assert!(template.has_instance(&[
        TemplateArgument::Type(Type::INT),
        TemplateArgument::Pack(vec![]),
    ]));
    assert!(template.has_instance(&[
        TemplateArgument::Type(Type::INT),
        TemplateArgument::Pack(vec![
            TemplateArgument::Type(Type::DOUBLE),
            TemplateArgument::Type(Type::BOOLEAN),
        ]),
    ]));
}

#[test]
fn test_initializer_list_constructor() {
    compile_ok(
        "class IntList { public: IntList(InitializerList<int> values) { } };\n\
         IntList xs = {1, 2, 3};",
    );
}

#[test]
fn test_template_argument_cannot_be_an_enumeration() {
    fails(
        "enum E { A };\n\
         template<typename T> class Box { T value; };\n\
         Box<E> b;",
    );
}
