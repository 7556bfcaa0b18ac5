//! Typed compilation failures.
//!
//! A [`CompilationFailure`] carries an error kind and the source location
//! it was raised at; it propagates out of the innermost operation and is
//! caught at the session boundary, where it becomes a diagnostic message.

use std::error::Error;
use std::fmt;

use crate::diagnostic::{DiagnosticMessage, MessageBuilder};
use crate::operators::OperatorKind;
use crate::source::SourceLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A lexer or parser failure surfaced through the session.
    SyntaxError(String),

    // name resolution
    InvalidTypeName(String),
    InvalidNameInUsingDirective(String),
    AmbiguousFunctionName(String),
    UnknownCaptureName(String),
    TemplateNamesAreNotExpressions,
    TypeNameInExpression,
    NamespaceNameInExpression,
    NoSuchMember(String),
    InaccessibleMember(String),
    CannotAccessMemberOfNonObject(String),

    // typing
    CouldNotConvert { from: String, to: String },
    NarrowingConversion { from: String, to: String },
    ArrayElementNotConvertible,
    InitializerListAsFirstArrayElement,
    ReferencesMustBeInitialized,
    EnumerationsMustBeInitialized,
    FunctionVariablesMustBeInitialized,
    VariableCannotBeDefaultConstructed(String),
    AutoMustBeUsedWithAssignment,
    IllegalUseOfThis,
    ConditionalExpressionTypeMismatch { left: String, right: String },

    // overload resolution
    CouldNotFindValidConstructor,
    CouldNotFindValidMemberFunction(String),
    CouldNotFindValidOperator(OperatorKind),
    CouldNotFindValidOverload(String),
    CouldNotFindValidCallOperator,
    CouldNotFindValidSubscriptOperator,
    CouldNotFindValidLiteralOperator(String),
    ArraySubscriptOnNonObject,
    CallToDeletedFunction(String),

    // statements
    ReturnStatementWithoutValue,
    ReturnStatementWithValue,
    BreakOutsideLoop,
    ContinueOutsideLoop,

    // classes
    InvalidBaseClass(String),
    BaseClassIsFinal(String),
    DataMemberCannotBeAuto,
    DataMemberAlreadyHasInitializer(String),
    NotDataMember(String),
    InheritedDataMember(String),
    MissingStaticInitialization,
    ObjectHasNoDestructor,
    ParentHasNoDefaultConstructor,
    ParentHasDeletedDefaultConstructor,
    ParentHasNoCopyConstructor,
    ParentHasDeletedCopyConstructor,
    ParentHasNoAssignmentOperator,
    ParentHasDeletedAssignmentOperator,
    DataMemberHasNoDefaultConstructor(String),
    DataMemberIsNotCopyable(String),
    DataMemberHasNoAssignmentOperator(String),
    DataMemberIsReferenceAndCannotBeAssigned(String),
    EnumMemberCannotBeDefaultConstructed(String),
    FunctionCannotBeDefaulted,
    DefaultArgumentsMustBeTrailing,
    InvalidUseOfVirtualKeyword,
    InvalidUseOfStaticKeyword,
    InvalidUseOfConstKeyword,
    InvalidUseOfExplicitKeyword,
    InvalidParamCountInOperatorOverload { expected: usize, got: usize },
    OpOverloadMustBeDeclaredAsMember(OperatorKind),

    // lambdas
    CannotCaptureThis,
    CannotCaptureByValueAndByRef,
    LambdaMustBeCaptureless,
    CannotDeduceLambdaReturnType,

    // templates
    InvalidTemplateArgument,
    InvalidLiteralTemplateArgument,
    NonConstExprTemplateArgument,
    TemplateArgumentMustBeAType,
    TemplateArgumentCannotBeAnEnumeration,
    MissingNonDefaultedTemplateParameter(String),
    TypeMustBeDefaultConstructible(String),
    TypeMustBeCopyConstructible(String),
    TypeMustBeDestructible(String),
    TemplateInstantiationFailure(String),

    // literals
    InvalidCharacterLiteral,
    MalformedLiteral(String),

    // brace initialization
    UnknownTypeInBraceInitialization(String),
    TooManyArgumentInVariableInitialization,

    // modules
    UnknownModule(String),
    ModuleImportFailure(String),

    // declarations
    DeclarationProcessingError,

    NotImplemented(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CompileError::*;
        match self {
            SyntaxError(message) => f.write_str(message),
            InvalidTypeName(n) => write!(f, "'{n}' does not name a type"),
            InvalidNameInUsingDirective(n) => {
                write!(f, "'{n}' does not name a namespace in using-directive")
            }
            AmbiguousFunctionName(n) => write!(f, "function name '{n}' is ambiguous"),
            UnknownCaptureName(n) => write!(f, "unknown capture name '{n}'"),
            TemplateNamesAreNotExpressions => {
                f.write_str("template names are not expressions")
            }
            TypeNameInExpression => f.write_str("a type name cannot be used as an expression"),
            NamespaceNameInExpression => {
                f.write_str("a namespace name cannot be used as an expression")
            }
            NoSuchMember(n) => write!(f, "no member named '{n}'"),
            InaccessibleMember(n) => write!(f, "member '{n}' is not accessible here"),
            CannotAccessMemberOfNonObject(n) => {
                write!(f, "cannot access member '{n}' of a non-object value")
            }
            CouldNotConvert { from, to } => {
                write!(f, "could not convert from '{from}' to '{to}'")
            }
            NarrowingConversion { from, to } => write!(
                f,
                "narrowing conversion from '{from}' to '{to}' in brace initialization"
            ),
            ArrayElementNotConvertible => {
                f.write_str("array element is not convertible to the element type")
            }
            InitializerListAsFirstArrayElement => {
                f.write_str("an initializer list cannot be the first element of an array")
            }
            ReferencesMustBeInitialized => f.write_str("references must be initialized"),
            EnumerationsMustBeInitialized => f.write_str("enumerations must be initialized"),
            FunctionVariablesMustBeInitialized => {
                f.write_str("function variables must be initialized")
            }
            VariableCannotBeDefaultConstructed(t) => {
                write!(f, "a variable of type '{t}' cannot be default constructed")
            }
            AutoMustBeUsedWithAssignment => {
                f.write_str("'auto' requires an initializer to deduce from")
            }
            IllegalUseOfThis => f.write_str("illegal use of 'this'"),
            ConditionalExpressionTypeMismatch { left, right } => write!(
                f,
                "operands of '?:' have no common type ('{left}' and '{right}')"
            ),
            CouldNotFindValidConstructor => f.write_str("could not find a valid constructor"),
            CouldNotFindValidMemberFunction(n) => {
                write!(f, "could not find a valid member function '{n}'")
            }
            CouldNotFindValidOperator(op) => write!(f, "could not find a valid '{op}'"),
            CouldNotFindValidOverload(n) => {
                write!(f, "could not find a valid overload of '{n}'")
            }
            CouldNotFindValidCallOperator => {
                f.write_str("could not find a valid call operator")
            }
            CouldNotFindValidSubscriptOperator => {
                f.write_str("could not find a valid subscript operator")
            }
            CouldNotFindValidLiteralOperator(s) => {
                write!(f, "could not find a valid literal operator for suffix '{s}'")
            }
            ArraySubscriptOnNonObject => {
                f.write_str("subscript applied to a non-object value")
            }
            CallToDeletedFunction(n) => write!(f, "call to deleted function '{n}'"),
            ReturnStatementWithoutValue => {
                f.write_str("return statement without a value in a non-void function")
            }
            ReturnStatementWithValue => {
                f.write_str("return statement with a value in a void function")
            }
            BreakOutsideLoop => f.write_str("'break' outside of an iteration statement"),
            ContinueOutsideLoop => f.write_str("'continue' outside of an iteration statement"),
            InvalidBaseClass(n) => write!(f, "'{n}' is not a valid base class"),
            BaseClassIsFinal(n) => write!(f, "cannot derive from final class '{n}'"),
            DataMemberCannotBeAuto => f.write_str("a data member cannot have type 'auto'"),
            DataMemberAlreadyHasInitializer(n) => {
                write!(f, "data member '{n}' already has an initializer")
            }
            NotDataMember(n) => write!(f, "'{n}' is not a data member"),
            InheritedDataMember(n) => {
                write!(f, "cannot initialize inherited data member '{n}'")
            }
            MissingStaticInitialization => {
                f.write_str("a static data member requires an initializer")
            }
            ObjectHasNoDestructor => f.write_str("object has no destructor"),
            ParentHasNoDefaultConstructor => {
                f.write_str("base class has no default constructor")
            }
            ParentHasDeletedDefaultConstructor => {
                f.write_str("base class has a deleted default constructor")
            }
            ParentHasNoCopyConstructor => f.write_str("base class has no copy constructor"),
            ParentHasDeletedCopyConstructor => {
                f.write_str("base class has a deleted copy constructor")
            }
            ParentHasNoAssignmentOperator => {
                f.write_str("base class has no assignment operator")
            }
            ParentHasDeletedAssignmentOperator => {
                f.write_str("base class has a deleted assignment operator")
            }
            DataMemberHasNoDefaultConstructor(n) => {
                write!(f, "data member '{n}' has no default constructor")
            }
            DataMemberIsNotCopyable(n) => write!(f, "data member '{n}' is not copyable"),
            DataMemberHasNoAssignmentOperator(n) => {
                write!(f, "data member '{n}' has no assignment operator")
            }
            DataMemberIsReferenceAndCannotBeAssigned(n) => {
                write!(f, "data member '{n}' is a reference and cannot be assigned")
            }
            EnumMemberCannotBeDefaultConstructed(n) => {
                write!(f, "enum data member '{n}' cannot be default constructed")
            }
            FunctionCannotBeDefaulted => f.write_str("this function cannot be defaulted"),
            DefaultArgumentsMustBeTrailing => {
                f.write_str("default arguments may only appear on trailing parameters")
            }
            InvalidUseOfVirtualKeyword => f.write_str("invalid use of 'virtual'"),
            InvalidUseOfStaticKeyword => f.write_str("invalid use of 'static'"),
            InvalidUseOfConstKeyword => f.write_str("invalid use of 'const'"),
            InvalidUseOfExplicitKeyword => f.write_str("invalid use of 'explicit'"),
            InvalidParamCountInOperatorOverload { expected, got } => write!(
                f,
                "invalid parameter count in operator overload: expected {expected}, got {got}"
            ),
            OpOverloadMustBeDeclaredAsMember(op) => {
                write!(f, "'{op}' must be declared as a member function")
            }
            CannotCaptureThis => f.write_str("'this' cannot be captured here"),
            CannotCaptureByValueAndByRef => {
                f.write_str("cannot default-capture both by value and by reference")
            }
            LambdaMustBeCaptureless => f.write_str("this lambda must be captureless"),
            CannotDeduceLambdaReturnType => {
                f.write_str("could not deduce the lambda's return type")
            }
            InvalidTemplateArgument => f.write_str("invalid template argument"),
            InvalidLiteralTemplateArgument => {
                f.write_str("invalid literal template argument")
            }
            NonConstExprTemplateArgument => {
                f.write_str("template argument is not a constant expression")
            }
            TemplateArgumentMustBeAType => f.write_str("template argument must be a type"),
            TemplateArgumentCannotBeAnEnumeration => {
                f.write_str("template argument cannot be an enumeration")
            }
            MissingNonDefaultedTemplateParameter(n) => {
                write!(f, "missing argument for template parameter '{n}'")
            }
            TypeMustBeDefaultConstructible(t) => {
                write!(f, "type '{t}' must be default constructible")
            }
            TypeMustBeCopyConstructible(t) => {
                write!(f, "type '{t}' must be copy constructible")
            }
            TypeMustBeDestructible(t) => write!(f, "type '{t}' must be destructible"),
            TemplateInstantiationFailure(n) => {
                write!(f, "failed to instantiate template '{n}'")
            }
            InvalidCharacterLiteral => f.write_str("invalid character literal"),
            MalformedLiteral(text) => write!(f, "malformed literal '{text}'"),
            UnknownTypeInBraceInitialization(n) => {
                write!(f, "unknown type '{n}' in brace initialization")
            }
            TooManyArgumentInVariableInitialization => {
                f.write_str("too many arguments in variable initialization")
            }
            UnknownModule(n) => write!(f, "unknown module '{n}'"),
            ModuleImportFailure(n) => write!(f, "failed to import module '{n}'"),
            DeclarationProcessingError => {
                f.write_str("could not process all declarations")
            }
            NotImplemented(what) => write!(f, "not implemented: {what}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationFailure {
    pub kind: CompileError,
    pub location: Option<SourceLocation>,
}

impl CompilationFailure {
    pub fn new(kind: CompileError) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    pub fn at(kind: CompileError, span: crate::lexer::Span) -> Self {
        Self {
            kind,
            location: Some(span.location()),
        }
    }

    pub fn to_message(&self) -> DiagnosticMessage {
        let mut builder = MessageBuilder::error();
        if let Some(loc) = self.location {
            builder = builder.at(loc);
        }
        builder.part(&self.kind).build()
    }
}

impl fmt::Display for CompilationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl Error for CompilationFailure {}

pub type CResult<T> = Result<T, CompilationFailure>;
