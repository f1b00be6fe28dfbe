//! Abstract syntax tree consumed by the Cb interpreter core.
//!
//! The lexer and recursive-descent parser that produce this tree are
//! external collaborators (out of scope for this crate, per the spec) — the
//! core makes no assumption about which grammar rule produced which node.
//! `AstNode` is a tagged sum rather than the original's flat
//! `left`/`right`/`third`-slot struct: each variant holds exactly the
//! fields it needs, which both documents the grammar and removes a whole
//! class of "which slot means what for this node kind" bugs the original
//! carries.

use crate::types::{ArrayTypeInfo, TypeInfo, TypeQualifiers};
use std::path::PathBuf;

/// Source location for error reporting, mirroring the span the
/// lexer/parser would attach to each node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        SourceLocation {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
    BitNot,
    AddressOf,
    Deref,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

/// A single function/method parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub type_info: TypeInfo,
    pub type_name: Option<String>,
    pub qualifiers: TypeQualifiers,
    pub array_type: Option<ArrayTypeInfo>,
    pub is_function_pointer: bool,
}

/// A struct member field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub type_info: TypeInfo,
    pub type_name: Option<String>,
    pub qualifiers: TypeQualifiers,
    pub array_type: Option<ArrayTypeInfo>,
    pub is_private: bool,
}

/// A payload carried by an enum variant distinct from its discriminant
/// (spec: "an enum with associated value retains both the scalar `value`
/// ... and the payload"). Declared alongside the variant, not supplied at
/// each access site.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumAssociatedValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariantDecl {
    pub name: String,
    pub value: Option<i64>,
    pub associated_value: Option<EnumAssociatedValue>,
}

/// The tagged node set the interpreter core evaluates/executes.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    // ---- literals & leaves ----
    Number {
        value: i64,
        type_hint: Option<TypeInfo>,
        loc: Option<SourceLocation>,
    },
    FloatNumber {
        value: f64,
        type_hint: TypeInfo,
        loc: Option<SourceLocation>,
    },
    StringLiteral {
        value: String,
        loc: Option<SourceLocation>,
    },
    NullPtr {
        loc: Option<SourceLocation>,
    },
    Variable {
        name: String,
        loc: Option<SourceLocation>,
    },

    // ---- arrays & structs as values ----
    ArrayRef {
        base: Box<AstNode>,
        index: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    ArrayLiteral {
        elements: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },
    StructLiteral {
        struct_name: Option<String>,
        fields: Vec<(Option<String>, AstNode)>,
        loc: Option<SourceLocation>,
    },

    // ---- operators ----
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    TernaryOp {
        cond: Box<AstNode>,
        then_expr: Box<AstNode>,
        else_expr: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    Assign {
        target: Box<AstNode>,
        value: Box<AstNode>,
        loc: Option<SourceLocation>,
    },

    // ---- declarations ----
    VarDecl {
        name: String,
        type_info: TypeInfo,
        type_name: Option<String>,
        qualifiers: TypeQualifiers,
        array_type: Option<ArrayTypeInfo>,
        init_expr: Option<Box<AstNode>>,
        is_static: bool,
        is_function_pointer_target: Option<String>,
        loc: Option<SourceLocation>,
    },
    StructDecl {
        name: String,
        fields: Vec<FieldDecl>,
        loc: Option<SourceLocation>,
    },
    StructTypedefDecl {
        alias: String,
        struct_name: String,
        loc: Option<SourceLocation>,
    },
    InterfaceDecl {
        name: String,
        method_signatures: Vec<(String, Vec<ParamDecl>, TypeInfo)>,
        loc: Option<SourceLocation>,
    },
    ImplDecl {
        interface_name: String,
        struct_name: String,
        methods: Vec<AstNode>, // each a FuncDecl
        loc: Option<SourceLocation>,
    },
    EnumDecl {
        name: String,
        variants: Vec<EnumVariantDecl>,
        loc: Option<SourceLocation>,
    },
    TypedefDecl {
        alias: String,
        target: TypeInfo,
        target_name: Option<String>,
        union_members: Option<Vec<String>>,
        loc: Option<SourceLocation>,
    },
    FuncDecl {
        name: String,
        params: Vec<ParamDecl>,
        return_type: TypeInfo,
        return_type_name: Option<String>,
        body: Box<AstNode>, // StmtList
        loc: Option<SourceLocation>,
    },

    // ---- calls & access ----
    FuncCall {
        callee: Box<AstNode>,
        arguments: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },
    MemberAccess {
        base: Box<AstNode>,
        name: String,
        loc: Option<SourceLocation>,
    },
    MemberArrayAccess {
        base: Box<AstNode>,
        name: String,
        indices: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },
    ArrowAccess {
        base: Box<AstNode>,
        name: String,
        loc: Option<SourceLocation>,
    },
    EnumAccess {
        enum_name: String,
        variant: String,
        loc: Option<SourceLocation>,
    },

    // ---- statements ----
    If {
        cond: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Option<Box<AstNode>>,
        loc: Option<SourceLocation>,
    },
    While {
        cond: Box<AstNode>,
        body: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    For {
        init: Option<Box<AstNode>>,
        cond: Option<Box<AstNode>>,
        update: Option<Box<AstNode>>,
        body: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    Return {
        value: Option<Box<AstNode>>,
        loc: Option<SourceLocation>,
    },
    Break {
        loc: Option<SourceLocation>,
    },
    Continue {
        loc: Option<SourceLocation>,
    },
    Assert {
        cond: Box<AstNode>,
        message: Option<String>,
        loc: Option<SourceLocation>,
    },
    StmtList {
        statements: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },

    // ---- I/O ----
    PrintStmt {
        arguments: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },
    PrintlnStmt {
        arguments: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },
    PrintfStmt {
        format: Box<AstNode>,
        arguments: Vec<AstNode>,
        loc: Option<SourceLocation>,
    },

    // ---- memory ----
    NewExpr {
        type_info: TypeInfo,
        type_name: Option<String>,
        array_size: Option<Box<AstNode>>,
        loc: Option<SourceLocation>,
    },
    DeleteExpr {
        target: Box<AstNode>,
        loc: Option<SourceLocation>,
    },
    SizeofExpr {
        operand: SizeofOperand,
        loc: Option<SourceLocation>,
    },

    // ---- misc ----
    TypeSpec {
        type_info: TypeInfo,
        type_name: Option<String>,
        loc: Option<SourceLocation>,
    },
    StorageSpec {
        is_static: bool,
        is_const: bool,
        loc: Option<SourceLocation>,
    },
    PreprocessorDirective {
        text: String,
        loc: Option<SourceLocation>,
    },
}

/// `sizeof` accepts either a bare type name or an arbitrary expression; the
/// spec's open question ("sizeof on an expression returns sizeof(i64)
/// unconditionally") is fixed here by keeping the two cases distinct so the
/// evaluator can route to "look up a type's size" vs. "infer an
/// expression's static type, then size that".
#[derive(Debug, Clone, PartialEq)]
pub enum SizeofOperand {
    Type(TypeInfo, Option<String>),
    Expr(Box<AstNode>),
}

impl AstNode {
    pub fn loc(&self) -> Option<&SourceLocation> {
        match self {
            AstNode::Number { loc, .. }
            | AstNode::FloatNumber { loc, .. }
            | AstNode::StringLiteral { loc, .. }
            | AstNode::NullPtr { loc }
            | AstNode::Variable { loc, .. }
            | AstNode::ArrayRef { loc, .. }
            | AstNode::ArrayLiteral { loc, .. }
            | AstNode::StructLiteral { loc, .. }
            | AstNode::BinaryOp { loc, .. }
            | AstNode::UnaryOp { loc, .. }
            | AstNode::TernaryOp { loc, .. }
            | AstNode::Assign { loc, .. }
            | AstNode::VarDecl { loc, .. }
            | AstNode::StructDecl { loc, .. }
            | AstNode::StructTypedefDecl { loc, .. }
            | AstNode::InterfaceDecl { loc, .. }
            | AstNode::ImplDecl { loc, .. }
            | AstNode::EnumDecl { loc, .. }
            | AstNode::TypedefDecl { loc, .. }
            | AstNode::FuncDecl { loc, .. }
            | AstNode::FuncCall { loc, .. }
            | AstNode::MemberAccess { loc, .. }
            | AstNode::MemberArrayAccess { loc, .. }
            | AstNode::ArrowAccess { loc, .. }
            | AstNode::EnumAccess { loc, .. }
            | AstNode::If { loc, .. }
            | AstNode::While { loc, .. }
            | AstNode::For { loc, .. }
            | AstNode::Return { loc, .. }
            | AstNode::Break { loc }
            | AstNode::Continue { loc }
            | AstNode::Assert { loc, .. }
            | AstNode::StmtList { loc, .. }
            | AstNode::PrintStmt { loc, .. }
            | AstNode::PrintlnStmt { loc, .. }
            | AstNode::PrintfStmt { loc, .. }
            | AstNode::NewExpr { loc, .. }
            | AstNode::DeleteExpr { loc, .. }
            | AstNode::SizeofExpr { loc, .. }
            | AstNode::TypeSpec { loc, .. }
            | AstNode::StorageSpec { loc, .. }
            | AstNode::PreprocessorDirective { loc, .. } => loc.as_ref(),
        }
    }
}
