//! The per-unit syntax tree.
//!
//! Expressions live in one arena per unit and refer to each other by
//! [`ExprId`]; statements are expressions, as are declarations. Every node
//! carries its resolved type (assigned during analysis), plus the two
//! bottom-up flags: `literal_constant` (foldable to a value) and
//! `comptime_compat` (legal in a compile-time-evaluated context). The whole
//! arena is dropped as soon as the unit's bodies have been lowered.

use crate::compiler::symbols::{FunctionId, ModuleId, ScopeId, VarId};
use crate::compiler::tokens::{IntLitKind, TextLocation};
use crate::compiler::types::{TypeId, TypeTable};
use crate::compiler::words::{WordId, WordTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    AddrOf,
    PreInc,
    PreDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq | BinOp::EqEq | BinOp::NotEq
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Assign => "=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::LtEq => "<=",
            BinOp::GtEq => ">=",
            BinOp::EqEq => "==",
            BinOp::NotEq => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IfBranch {
    pub cond: ExprId,
    pub scope: ScopeId,
    pub body: Vec<ExprId>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit {
        value: u64,
        kind: IntLitKind,
    },
    FloatLit(f32),
    DoubleLit(f64),
    CharLit(u8),
    BoolLit(bool),
    Null,
    StrLit(Box<str>),

    Ident {
        name: WordId,
        sym: Option<VarId>,
        /// Set when this is the `length` of an array dot chain
        is_array_length: bool,
        /// Set when a leading dot-chain identifier names a module
        references_module: bool,
    },
    This,

    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Cast {
        to: TypeId,
        value: ExprId,
        /// False for the coercions analysis inserts
        explicit: bool,
    },
    Call {
        name: WordId,
        args: Vec<ExprId>,
        sym: Option<FunctionId>,
        /// Set when the call constructs a module instance instead of
        /// invoking a function
        constructed_module: Option<ModuleId>,
        assumed_default_constructor: bool,
    },
    ArrayAccess {
        ident: ExprId,
        indexes: Vec<ExprId>,
    },
    ArrayLit {
        elements: Vec<ExprId>,
        /// Declared dimension size, filled by the size check
        dim_size: Option<u32>,
    },
    DotChain {
        factors: Vec<ExprId>,
    },

    VarDecl {
        var: VarId,
        /// `lhs = rhs` binary over the declared identifier, like any other
        /// assignment, so folding and lowering share one path
        assignment: Option<ExprId>,
        /// Explicit dimension size expressions, outermost first. `None`
        /// entries are unsized dimensions.
        dim_sizes: Vec<Option<ExprId>>,
    },
    Return {
        value: Option<ExprId>,
    },
    If {
        branches: Vec<IfBranch>,
        else_scope: Option<ScopeId>,
        else_body: Vec<ExprId>,
    },
    For {
        decls: Vec<ExprId>,
        cond: ExprId,
        post: Vec<ExprId>,
        scope: ScopeId,
        body: Vec<ExprId>,
    },
    While {
        cond: ExprId,
        scope: ScopeId,
        body: Vec<ExprId>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
    pub loc: TextLocation,
    pub literal_constant: bool,
    pub comptime_compat: bool,
}

#[derive(Debug)]
pub struct FunctionAst {
    pub sym: FunctionId,
    pub scope: ScopeId,
    pub body: Vec<ExprId>,
    pub loc: TextLocation,
}

#[derive(Debug)]
pub struct ModuleAst {
    pub sym: ModuleId,
    pub name: WordId,
    pub loc: TextLocation,
    pub fields: Vec<ExprId>,
    pub globals: Vec<ExprId>,
    pub constructors: Vec<FunctionAst>,
    pub functions: Vec<FunctionAst>,
}

#[derive(Debug, Default)]
pub struct UnitAst {
    pub exprs: Vec<Expr>,
    pub modules: Vec<ModuleAst>,
}

impl UnitAst {
    pub fn alloc(&mut self, kind: ExprKind, loc: TextLocation) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr {
            kind,
            loc,
            // The error sentinel doubles as "not yet analyzed"
            ty: TypeTable::ERROR,
            literal_constant: true,
            comptime_compat: true,
        });
        id
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    #[inline]
    pub fn ty(&self, id: ExprId) -> TypeId {
        self.exprs[id.index()].ty
    }
}

/// Prints a unit's tree for the `-display-ast` flag.
pub fn dump_unit(ast: &UnitAst, words: &WordTable, types: &TypeTable) {
    for module in &ast.modules {
        println!("module {}", words.resolve(module.name));
        for &field in &module.fields {
            dump_expr(ast, field, words, types, 1);
        }
        for &global in &module.globals {
            dump_expr(ast, global, words, types, 1);
        }
        for function in module.constructors.iter().chain(&module.functions) {
            println!("  function #{}", function.sym.as_u32());
            for &stmt in &function.body {
                dump_expr(ast, stmt, words, types, 2);
            }
        }
    }
}

fn dump_expr(ast: &UnitAst, id: ExprId, words: &WordTable, types: &TypeTable, depth: usize) {
    let expr = ast.expr(id);
    let indent = "  ".repeat(depth);
    let label = match &expr.kind {
        ExprKind::IntLit { value, .. } => format!("int {value}"),
        ExprKind::FloatLit(value) => format!("float {value}"),
        ExprKind::DoubleLit(value) => format!("double {value}"),
        ExprKind::CharLit(value) => format!("char '{}'", *value as char),
        ExprKind::BoolLit(value) => format!("bool {value}"),
        ExprKind::Null => "null".to_string(),
        ExprKind::StrLit(text) => format!("string {text:?}"),
        ExprKind::Ident { name, .. } => format!("ident {}", words.resolve(*name)),
        ExprKind::This => "this".to_string(),
        ExprKind::Unary { op, .. } => format!("unary {op:?}"),
        ExprKind::Binary { op, .. } => format!("binary {}", op.symbol()),
        ExprKind::Cast { to, explicit, .. } => {
            format!(
                "cast to {}{}",
                types.name(*to, words),
                if *explicit { "" } else { " (implicit)" }
            )
        }
        ExprKind::Call { name, .. } => format!("call {}", words.resolve(*name)),
        ExprKind::ArrayAccess { .. } => "array access".to_string(),
        ExprKind::ArrayLit { elements, .. } => format!("array literal [{}]", elements.len()),
        ExprKind::DotChain { .. } => "dot chain".to_string(),
        ExprKind::VarDecl { var, .. } => format!("var decl #{}", var.as_u32()),
        ExprKind::Return { .. } => "return".to_string(),
        ExprKind::If { .. } => "if".to_string(),
        ExprKind::For { .. } => "for".to_string(),
        ExprKind::While { .. } => "while".to_string(),
    };
    println!("{indent}{label}: {}", types.name(expr.ty, words));

    for child in child_ids(&expr.kind) {
        dump_expr(ast, child, words, types, depth + 1);
    }
}

fn child_ids(kind: &ExprKind) -> Vec<ExprId> {
    match kind {
        ExprKind::Unary { operand, .. } => vec![*operand],
        ExprKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
        ExprKind::Cast { value, .. } => vec![*value],
        ExprKind::Call { args, .. } => args.clone(),
        ExprKind::ArrayAccess { ident, indexes } => {
            let mut children = vec![*ident];
            children.extend(indexes);
            children
        }
        ExprKind::ArrayLit { elements, .. } => elements.clone(),
        ExprKind::DotChain { factors } => factors.clone(),
        ExprKind::VarDecl { assignment, .. } => assignment.iter().copied().collect(),
        ExprKind::Return { value } => value.iter().copied().collect(),
        ExprKind::If {
            branches,
            else_body,
            ..
        } => {
            let mut children = Vec::new();
            for branch in branches {
                children.push(branch.cond);
                children.extend(&branch.body);
            }
            children.extend(else_body);
            children
        }
        ExprKind::For {
            decls,
            cond,
            post,
            body,
            ..
        } => {
            let mut children = decls.clone();
            children.push(*cond);
            children.extend(post);
            children.extend(body);
            children
        }
        ExprKind::While { cond, body, .. } => {
            let mut children = vec![*cond];
            children.extend(body);
            children
        }
        _ => Vec::new(),
    }
}
