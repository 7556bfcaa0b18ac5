use libscript::{Engine, Type};

#[test]
fn test_type_name_round_trip() {
    let mut engine = Engine::new();

    for canonical in [
        "int",
        "const int",
        "int &",
        "const int &",
        "double &&",
        "bool",
        "string",
        "int(int, bool)",
        "void()",
    ] {
        let t = engine.type_id(canonical).unwrap();
        assert_eq!(engine.type_name(t), canonical);
    }
}

#[test]
fn test_unknown_type_name_fails() {
    let mut engine = Engine::new();
    assert!(engine.type_id("NoSuchType").is_err());
}

#[test]
fn test_template_instance_type_name() {
    let mut engine = Engine::new();
    let t = engine.type_id("Array<double>").unwrap();
    assert_eq!(engine.type_name(t), "Array<double>");
    assert!(engine.symbols.is_array(t));
}

#[test]
fn test_function_types_are_interned() {
    let mut engine = Engine::new();
    let a = engine.type_id("int(bool)").unwrap();
    let b = engine.type_id("int(bool)").unwrap();
    assert_eq!(a, b);

    let c = engine.type_id("int(int)").unwrap();
    assert_ne!(a, c);
}

#[test]
fn test_qualifier_queries() {
    let mut engine = Engine::new();
    let t = engine.type_id("const double &").unwrap();
    assert!(t.is_const());
    assert!(t.is_reference());
    assert_eq!(t.base_type(), Type::DOUBLE);
}
