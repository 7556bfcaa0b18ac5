use libscript::ast::{Declaration, Expression, Statement, VariableInit};
use libscript::operators::OperatorKind;
use libscript::parser::parse_script;
use libscript::SourceFile;

fn parse(src: &str) -> Vec<Statement> {
    parse_script(&SourceFile::from_string(src)).unwrap().statements
}

fn parse_single_expression(src: &str) -> Expression {
    let mut statements = parse(src);
    match statements.remove(0) {
        Statement::Expression(e) => e,
        other => panic!("expected an expression statement, got {other:?}"),
    }
}

#[test]
fn test_operator_precedence() {
    let expr = parse_single_expression("a = b + c * d;");

    let Expression::Operation { op, rhs, .. } = expr else {
        panic!("expected an assignment");
    };
    assert_eq!(op, OperatorKind::Assignment);

    let Expression::Operation { op, rhs, .. } = *rhs.unwrap() else {
        panic!("expected an addition");
    };
    assert_eq!(op, OperatorKind::Addition);

    let Expression::Operation { op, .. } = *rhs.unwrap() else {
        panic!("expected a multiplication");
    };
    assert_eq!(op, OperatorKind::Multiplication);
}

#[test]
fn test_template_id_vs_comparison() {
    // a declaration when the angle brackets read as template arguments
    let statements = parse("Box<int> b;");
    assert!(matches!(statements[0], Statement::Declaration(_)));

    // a comparison chain otherwise
    let expr = parse_single_expression("a < b;");
    assert!(matches!(
        expr,
        Expression::Operation {
            op: OperatorKind::Less,
            ..
        }
    ));

    // shift-flavored chains stay expressions
    let expr = parse_single_expression("a < b << c;");
    assert!(matches!(
        expr,
        Expression::Operation {
            op: OperatorKind::Less,
            ..
        }
    ));
}

#[test]
fn test_nested_template_arguments_split_right_shift() {
    let statements = parse("Box<Box<int>> b;");
    let Statement::Declaration(decl) = &statements[0] else {
        panic!("expected a declaration");
    };
    let Declaration::Variable(v) = decl.as_ref() else {
        panic!("expected a variable");
    };
    assert_eq!(v.name, "b");
}

#[test]
fn test_call_and_member_postfix() {
    let expr = parse_single_expression("o.m(1)[2];");
    let Expression::Subscript { object, .. } = expr else {
        panic!("expected a subscript");
    };
    let Expression::Call { callee, .. } = *object else {
        panic!("expected a call");
    };
    assert!(matches!(*callee, Expression::Member { .. }));
}

#[test]
fn test_conditional_expression() {
    let expr = parse_single_expression("c ? a : b;");
    assert!(matches!(expr, Expression::Conditional { .. }));
}

#[test]
fn test_lambda_expression() {
    let expr = parse_single_expression("[x, &y](int n) { return n; };");
    let Expression::Lambda(lambda) = expr else {
        panic!("expected a lambda");
    };
    assert_eq!(lambda.captures.len(), 2);
    assert_eq!(lambda.params.len(), 1);
}

#[test]
fn test_array_vs_lambda() {
    assert!(matches!(
        parse_single_expression("[1, 2, 3];"),
        Expression::ArrayExpression { .. }
    ));
    assert!(matches!(
        parse_single_expression("[](){ };"),
        Expression::Lambda(_)
    ));
}

#[test]
fn test_brace_construction_and_list() {
    assert!(matches!(
        parse_single_expression("Point{1, 2};"),
        Expression::BraceConstruction { .. }
    ));
}

#[test]
fn test_for_statement() {
    let statements = parse("for (int i = 0; i < 10; ++i) { }");
    let Statement::For {
        init,
        condition,
        loop_increment,
        ..
    } = &statements[0]
    else {
        panic!("expected a for loop");
    };
    assert!(init.is_some());
    assert!(condition.is_some());
    assert!(loop_increment.is_some());
}

#[test]
fn test_constructor_with_initializer_list() {
    let statements = parse("class A { int n; A() : n(0) { } };");
    let Statement::Declaration(decl) = &statements[0] else {
        panic!("expected a declaration");
    };
    let Declaration::Class(c) = decl.as_ref() else {
        panic!("expected a class");
    };
    let Declaration::Function(ctor) = &c.members[1].decl else {
        panic!("expected the constructor");
    };
    assert_eq!(ctor.member_initializers.len(), 1);
    assert!(matches!(
        ctor.member_initializers[0].init,
        VariableInit::Constructor(_)
    ));
}

#[test]
fn test_variable_initializer_forms() {
    let forms = [
        ("int a = 1;", "assignment"),
        ("A a(1, 2);", "constructor"),
        ("A a{1, 2};", "brace"),
    ];
    for (src, what) in forms {
        let statements = parse(src);
        let Statement::Declaration(decl) = &statements[0] else {
            panic!("{what}: expected a declaration");
        };
        assert!(matches!(decl.as_ref(), Declaration::Variable(_)), "{what}");
    }
}

#[test]
fn test_syntax_error_reports_location() {
    let err = parse_script(&SourceFile::from_string("int a = ;")).unwrap_err();
    let loc = err.location();
    assert_eq!(loc.line, 1);
}
