//! Semantic analysis: the central subsystem of the compiler.
//!
//! Walks a parsed, import-resolved unit and leaves every expression carrying
//! a resolved type, symbol handles on identifiers and calls, implicit casts
//! at coercion points, and the `literal_constant` / `comptime_compat` flags
//! propagated bottom up. Control flow is validated along the way.
//!
//! Errors never abort the walk early: the offending expression's type
//! becomes the error sentinel, which parents observe to stop their own
//! checks while sibling analysis continues, so one run can surface many
//! diagnostics.

use crate::backends::{ConstBinOp, ConstExpr, IrBackend};
use crate::compiler::ast::{
    BinOp, ExprId, ExprKind, FunctionAst, ModuleAst, UnaryOp, UnitAst,
};
use crate::compiler::compiler_errors::{CompilerError, ErrorKind};
use crate::compiler::symbols::{FunctionId, Modifiers, ModuleId, ScopeId, SymbolRegistry};
use crate::compiler::tokens::{IntLitKind, Keywords, TextLocation};
use crate::compiler::types::{TypeId, TypeKind, TypeTable};
use crate::compiler::unit::FileUnit;
use crate::compiler::words::{WordId, WordTable};
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use std::path::PathBuf;

/// Checks one unit. Appends diagnostics to the unit and reports whether it
/// stayed clean.
pub fn analyze_unit<B: IrBackend>(
    unit: &mut FileUnit,
    words: &WordTable,
    keywords: &Keywords,
    types: &mut TypeTable,
    symbols: &mut SymbolRegistry,
    backend: &B,
) -> bool {
    let Some(ast) = unit.ast.take() else {
        return !unit.failed();
    };

    let mut analysis = Analysis {
        words,
        keywords,
        types,
        symbols,
        backend,
        ast,
        path: unit.system_path.clone(),
        loaded_modules: unit.loaded_modules.clone(),
        errors: Vec::new(),
        module: None,
        scope: None,
        function: None,
        checking_fields: false,
        checking_globals: false,
    };

    analysis.check_unit();

    let clean = analysis.errors.is_empty();
    unit.ast = Some(analysis.ast);
    unit.errors.append(&mut analysis.errors);
    clean
}

/// The implicit-conversion table: whether a value of type `from` may be
/// assigned to a destination of type `to` without an explicit cast.
pub fn assignable_to(types: &TypeTable, to: TypeId, from: TypeId) -> bool {
    // Integers widen, never narrow
    if types.is_int(to) {
        return types.is_int(from) && types.mem_size(to) >= types.mem_size(from);
    }

    match types.kind(to) {
        TypeKind::Float | TypeKind::Double => {
            if types.is_float(from) {
                types.mem_size(to) >= types.mem_size(from)
            } else {
                // Integers always fit a float destination
                types.is_int(from)
            }
        }
        TypeKind::Bool => from == TypeTable::BOOL,
        TypeKind::Ptr { .. } => {
            if types.is_ptr(from) {
                types.ptr_depth(to) == types.ptr_depth(from)
                    && types.base_type(to) == types.base_type(from)
            } else if from == TypeTable::NULL {
                true
            } else if types.is_arr(from) {
                types.ptr_depth(to) == types.arr_depth(from)
                    && types.base_type(to) == types.base_type(from)
            } else if from == TypeTable::STRING {
                types.ptr_depth(to) == 1 && types.is_char(types.base_type(to))
            } else {
                false
            }
        }
        TypeKind::Arr { .. } => {
            if types.is_arr(from) {
                types.arr_depth(to) == types.arr_depth(from)
                    && (types.base_type(from) == TypeTable::MIXED
                        || types.base_type(to) == types.base_type(from))
            } else if from == TypeTable::STRING {
                types.arr_depth(to) == 1 && types.is_char(types.base_type(to))
            } else {
                false
            }
        }
        TypeKind::Module { unique_id } => {
            // No subtyping between modules
            types.module_unique_id(from) == Some(unique_id)
        }
        _ => false,
    }
}

struct Analysis<'a, B: IrBackend> {
    words: &'a WordTable,
    keywords: &'a Keywords,
    types: &'a mut TypeTable,
    symbols: &'a mut SymbolRegistry,
    backend: &'a B,
    ast: UnitAst,
    path: PathBuf,
    loaded_modules: FxHashMap<WordId, ModuleId>,
    errors: Vec<CompilerError>,

    module: Option<ModuleId>,
    scope: Option<ScopeId>,
    function: Option<FunctionId>,
    checking_fields: bool,
    checking_globals: bool,
}

impl<'a, B: IrBackend> Analysis<'a, B> {
    fn err(&mut self, kind: ErrorKind, msg: impl Into<String>, loc: TextLocation) {
        self.errors
            .push(CompilerError::new(kind, msg, loc.to_error_location(&self.path)));
    }

    fn module_id(&self) -> ModuleId {
        self.module.expect("analysis is always inside a module")
    }

    fn scope_id(&self) -> ScopeId {
        self.scope.expect("analysis is always inside a scope")
    }

    fn ty(&self, id: ExprId) -> TypeId {
        self.ast.ty(id)
    }

    fn set_ty(&mut self, id: ExprId, ty: TypeId) {
        self.ast.expr_mut(id).ty = ty;
    }

    fn type_name(&self, ty: TypeId) -> String {
        self.types.name(ty, self.words)
    }

    fn find_module(&self, name: WordId) -> Option<ModuleId> {
        self.loaded_modules.get(&name).copied()
    }

    /// Whether `this` is absent at the current position.
    fn static_context(&self) -> bool {
        if self.checking_fields {
            return false;
        }
        match self.function {
            Some(function) => {
                let function = self.symbols.function(function);
                function.mods.contains(Modifiers::STATIC) || function.is_main
            }
            None => true,
        }
    }

    // ------------------------------------------------------------------
    // Walk order: modules in declaration order; within each, fields then
    // globals then constructors then functions
    // ------------------------------------------------------------------

    fn check_unit(&mut self) {
        let mut modules = std::mem::take(&mut self.ast.modules);
        for module_ast in &mut modules {
            self.check_module(module_ast);
        }
        self.ast.modules = modules;
    }

    fn check_module(&mut self, module_ast: &mut ModuleAst) {
        self.module = Some(module_ast.sym);
        self.scope = Some(self.symbols.module(module_ast.sym).scope);

        self.checking_fields = true;
        let outer_id = self.symbols.module(module_ast.sym).unique_id;
        for &field in &module_ast.fields {
            self.check_expression(field);
            let field_ty = self.ty(field);
            if self.types.is_module(field_ty) {
                let target = self.types.module_unique_id(field_ty).unwrap();
                let mut visited = FxHashSet::default();
                self.check_circular_fields(
                    self.ast.expr(field).loc,
                    ModuleId::new(target),
                    outer_id,
                    &mut visited,
                );
            }
        }
        self.checking_fields = false;

        self.checking_globals = true;
        for &global in &module_ast.globals {
            self.check_expression(global);
        }
        self.checking_globals = false;

        for constructor in &mut module_ast.constructors {
            self.check_function(constructor);
        }
        for function in &mut module_ast.functions {
            self.check_function(function);
        }

        self.module = None;
        self.scope = None;
    }

    /// Cyclic field composition check: following module-typed fields from
    /// the outer module must never reach the outer module again.
    fn check_circular_fields(
        &mut self,
        origin: TextLocation,
        module: ModuleId,
        outer_unique_id: u32,
        visited: &mut FxHashSet<u32>,
    ) -> bool {
        if !visited.insert(module.as_u32()) {
            return false;
        }

        let fields = self.symbols.module(module).fields.clone();
        for field in fields {
            let field_ty = self.symbols.variable(field).ty;
            if let Some(unique_id) = self.types.module_unique_id(field_ty) {
                if unique_id == outer_unique_id {
                    self.err(
                        ErrorKind::CircularFields,
                        "Modules may not recursively contain each other as fields",
                        origin,
                    );
                    return true;
                }
                if self.check_circular_fields(
                    origin,
                    ModuleId::new(unique_id),
                    outer_unique_id,
                    visited,
                ) {
                    return true;
                }
            }
        }
        false
    }

    fn check_function(&mut self, function_ast: &mut FunctionAst) {
        let function = self.symbols.function(function_ast.sym);
        if function.is_external() {
            return;
        }
        let return_type = function.return_type;
        let mods = function.mods;

        self.function = Some(function_ast.sym);
        self.scope = Some(function_ast.scope);

        let mut comptime = true;
        self.check_scope_stmts(&function_ast.body, &mut comptime);

        if !self.symbols.scope(function_ast.scope).found_return {
            if return_type == TypeTable::VOID {
                // Void functions get their return added for them
                let ret = self
                    .ast
                    .alloc(ExprKind::Return { value: None }, function_ast.loc);
                self.set_ty(ret, TypeTable::VOID);
                self.ast.expr_mut(ret).literal_constant = false;
                function_ast.body.push(ret);
            } else {
                self.err(
                    ErrorKind::FunctionExpectsReturn,
                    "Function with a non-void return type must return on every path",
                    function_ast.loc,
                );
            }
        }

        if mods.contains(Modifiers::COMPTIME) && !comptime {
            self.err(
                ErrorKind::ComptimeNotComputable,
                "Function is marked comptime but cannot be evaluated at compile time",
                function_ast.loc,
            );
        }

        self.function = None;
        self.scope = Some(self.symbols.module(self.module_id()).scope);
    }

    fn check_scope_stmts(&mut self, stmts: &[ExprId], comptime: &mut bool) {
        for &stmt in stmts {
            if self.symbols.scope(self.scope_id()).found_return {
                self.err(
                    ErrorKind::StmtsAfterReturn,
                    "Statement is unreachable, the scope already returned",
                    self.ast.expr(stmt).loc,
                );
                break;
            }
            self.check_expression(stmt);
            if !self.ast.expr(stmt).comptime_compat {
                *comptime = false;
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn check_expression(&mut self, id: ExprId) {
        let kind = self.ast.expr(id).kind.clone();
        match kind {
            ExprKind::IntLit { kind, .. } => {
                let ty = match kind {
                    IntLitKind::Int => TypeTable::INT,
                    IntLitKind::Long => TypeTable::LONG,
                    IntLitKind::ULong => TypeTable::ULONG,
                };
                self.set_ty(id, ty);
            }
            ExprKind::FloatLit(_) => self.set_ty(id, TypeTable::FLOAT),
            ExprKind::DoubleLit(_) => self.set_ty(id, TypeTable::DOUBLE),
            ExprKind::CharLit(_) => self.set_ty(id, TypeTable::CHAR8),
            ExprKind::BoolLit(_) => self.set_ty(id, TypeTable::BOOL),
            ExprKind::Null => self.set_ty(id, TypeTable::NULL),
            ExprKind::StrLit(_) => self.set_ty(id, TypeTable::STRING),

            ExprKind::Ident { .. } => {
                let static_context = self.static_context();
                self.check_ident(static_context, self.scope_id(), id);
            }
            ExprKind::This => {
                self.err(
                    ErrorKind::ThisKeywordExpectsDotOp,
                    "'this' must be followed by a '.' access",
                    self.ast.expr(id).loc,
                );
                self.set_ty(id, TypeTable::ERROR);
            }
            ExprKind::Unary { op, operand } => self.check_unary(id, op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(id, op, lhs, rhs),
            ExprKind::Cast { to, value, .. } => {
                self.check_expression(value);
                if !self.ast.expr(value).comptime_compat {
                    self.ast.expr_mut(id).comptime_compat = false;
                }
                if !self.ast.expr(value).literal_constant {
                    self.ast.expr_mut(id).literal_constant = false;
                }
                self.set_ty(id, to);
            }
            ExprKind::Call { .. } => {
                let static_context = self.static_context();
                self.check_call(static_context, self.module_id(), id, false, true);
            }
            ExprKind::ArrayAccess { .. } => {
                let static_context = self.static_context();
                self.check_array_access(static_context, self.scope_id(), id);
            }
            ExprKind::ArrayLit { .. } => self.check_array_literal(id),
            ExprKind::DotChain { .. } => self.check_dot_chain(id),
            ExprKind::VarDecl { .. } => self.check_variable_decl(id),
            ExprKind::Return { value } => self.check_return(id, value),
            ExprKind::If { .. } => self.check_if(id),
            ExprKind::For {
                decls,
                cond,
                post,
                scope,
                body,
            } => self.check_for(id, &decls, cond, &post, scope, &body),
            ExprKind::While { cond, scope, body } => {
                self.check_while(id, cond, scope, &body)
            }
        }
    }

    fn check_ident(&mut self, static_context: bool, lookup_scope: ScopeId, id: ExprId) {
        self.ast.expr_mut(id).literal_constant = false;

        let (name, loc) = match &self.ast.expr(id).kind {
            ExprKind::Ident { name, .. } => (*name, self.ast.expr(id).loc),
            _ => return,
        };

        let Some(var) = self.symbols.lookup_variable(lookup_scope, name) else {
            self.err(
                ErrorKind::UndeclaredVariable,
                format!("Undeclared variable '{}'", self.words.resolve(name)),
                loc,
            );
            self.set_ty(id, TypeTable::ERROR);
            return;
        };

        let variable = self.symbols.variable(var);
        let is_field = variable.is_field();
        let is_plain_local = !is_field && !variable.is_global();
        let declared_at = variable.declared_at;
        let var_module = variable.module;
        let var_mods = variable.mods;
        let var_ty = variable.ty;

        // Only block-scoped variables have declaration order inside their
        // scope; fields and globals are visible everywhere in the module
        if is_plain_local && loc.offset < declared_at {
            self.err(
                ErrorKind::UseOfVariableBeforeDeclaration,
                format!(
                    "Variable '{}' is used before it is declared",
                    self.words.resolve(name)
                ),
                loc,
            );
        }

        if static_context && is_field {
            self.err(
                ErrorKind::AccessingFieldFromStaticContext,
                format!(
                    "Cannot access field '{}' without an instance",
                    self.words.resolve(name)
                ),
                loc,
            );
        }

        if var_module != self.module_id()
            && var_mods.access_mods().contains(Modifiers::PRIVATE)
        {
            self.err(
                ErrorKind::FieldNotVisible,
                format!("'{}' is private to its module", self.words.resolve(name)),
                loc,
            );
        }

        if let ExprKind::Ident { sym, .. } = &mut self.ast.expr_mut(id).kind {
            *sym = Some(var);
        }
        self.set_ty(id, var_ty);
    }

    fn check_unary(&mut self, id: ExprId, op: UnaryOp, operand: ExprId) {
        self.check_expression(operand);
        let operand_ty = self.ty(operand);
        if operand_ty == TypeTable::ERROR {
            self.set_ty(id, TypeTable::ERROR);
            return;
        }
        if !self.ast.expr(operand).comptime_compat {
            self.ast.expr_mut(id).comptime_compat = false;
        }
        if !self.ast.expr(operand).literal_constant {
            self.ast.expr_mut(id).literal_constant = false;
        }
        let loc = self.ast.expr(id).loc;

        match op {
            UnaryOp::Neg | UnaryOp::Plus => {
                if !self.types.is_number(operand_ty) {
                    self.err(
                        ErrorKind::OpCannotApplyTo,
                        format!("Operator cannot apply to '{}'", self.type_name(operand_ty)),
                        loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
                self.set_ty(id, operand_ty);
            }
            UnaryOp::AddrOf => {
                self.ast.expr_mut(id).literal_constant = false;
                let ty = self.types.ptr_to(operand_ty);
                self.set_ty(id, ty);
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                if !self.types.is_int(operand_ty) {
                    self.err(
                        ErrorKind::OpCannotApplyTo,
                        format!("Operator cannot apply to '{}'", self.type_name(operand_ty)),
                        loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
                self.set_ty(id, operand_ty);
            }
            UnaryOp::Not => {
                if operand_ty != TypeTable::BOOL {
                    self.err(
                        ErrorKind::OpCannotApplyTo,
                        format!("'!' expects a bool, found '{}'", self.type_name(operand_ty)),
                        loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
                self.set_ty(id, TypeTable::BOOL);
            }
        }
    }

    /// Both operands of an arithmetic binary promote to one width through
    /// inserted cast nodes: integers to the wider operand (signed when
    /// either side is), floats dominate integers.
    fn promote_numeric(&mut self, id: ExprId, lhs: ExprId, rhs: ExprId) -> TypeId {
        let lhs_ty = self.ty(lhs);
        let rhs_ty = self.ty(rhs);
        let larger = self.types.mem_size(lhs_ty).max(self.types.mem_size(rhs_ty));

        let to = if self.types.is_int(lhs_ty) && self.types.is_int(rhs_ty) {
            let signed = self.types.is_signed(lhs_ty) || self.types.is_signed(rhs_ty);
            TypeTable::int_with_size(larger, signed)
        } else {
            TypeTable::float_with_size(larger.max(4))
        };

        let new_lhs = self.make_cast(lhs, to);
        let new_rhs = self.make_cast(rhs, to);
        if let ExprKind::Binary { lhs, rhs, .. } = &mut self.ast.expr_mut(id).kind {
            *lhs = new_lhs;
            *rhs = new_rhs;
        }
        to
    }

    fn op_error(&mut self, id: ExprId, symbol: &str, ty: TypeId) {
        let loc = self.ast.expr(id).loc;
        let name = self.type_name(ty);
        self.err(
            ErrorKind::OpCannotApplyTo,
            format!("Operator '{symbol}' cannot apply to '{name}'"),
            loc,
        );
        self.set_ty(id, TypeTable::ERROR);
    }

    fn check_binary(&mut self, id: ExprId, op: BinOp, lhs: ExprId, rhs: ExprId) {
        self.check_expression(lhs);
        self.check_expression(rhs);

        let lhs_ty = self.ty(lhs);
        let rhs_ty = self.ty(rhs);
        if lhs_ty == TypeTable::ERROR || rhs_ty == TypeTable::ERROR {
            self.set_ty(id, TypeTable::ERROR);
            return;
        }

        if !self.ast.expr(lhs).comptime_compat || !self.ast.expr(rhs).comptime_compat {
            self.ast.expr_mut(id).comptime_compat = false;
        }
        if !self.ast.expr(lhs).literal_constant || !self.ast.expr(rhs).literal_constant {
            self.ast.expr_mut(id).literal_constant = false;
        }

        match op {
            BinOp::Assign => {
                if !self.expr_assignable(lhs_ty, rhs) {
                    let loc = self.ast.expr(id).loc;
                    let from = self.type_name(rhs_ty);
                    let to = self.type_name(lhs_ty);
                    self.err(
                        ErrorKind::CannotAssign,
                        format!("Cannot assign a value of type '{from}' to '{to}'"),
                        loc,
                    );
                }
                let new_rhs = self.attempt_assignment(lhs_ty, rhs);
                if let ExprKind::Binary { rhs, .. } = &mut self.ast.expr_mut(id).kind {
                    *rhs = new_rhs;
                }
                let ty = self.ty(lhs);
                self.set_ty(id, ty);
            }

            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if !self.types.is_number(lhs_ty) {
                    return self.op_error(id, op.symbol(), lhs_ty);
                }
                if !self.types.is_number(rhs_ty) {
                    return self.op_error(id, op.symbol(), rhs_ty);
                }
                let to = self.promote_numeric(id, lhs, rhs);
                self.set_ty(id, to);
            }

            BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl
            | BinOp::Shr => {
                if !self.types.is_int(lhs_ty) {
                    return self.op_error(id, op.symbol(), lhs_ty);
                }
                if !self.types.is_int(rhs_ty) {
                    return self.op_error(id, op.symbol(), rhs_ty);
                }
                let to = self.promote_numeric(id, lhs, rhs);
                self.set_ty(id, to);
            }

            op if op.is_comparison() => {
                if !self.types.is_number(lhs_ty) {
                    return self.op_error(id, op.symbol(), lhs_ty);
                }
                if !self.types.is_number(rhs_ty) {
                    return self.op_error(id, op.symbol(), rhs_ty);
                }
                // Promoted so both sides reach the comparison at one width
                self.promote_numeric(id, lhs, rhs);
                self.set_ty(id, TypeTable::BOOL);
            }

            BinOp::And | BinOp::Or => {
                if lhs_ty != TypeTable::BOOL {
                    return self.op_error(id, op.symbol(), lhs_ty);
                }
                if rhs_ty != TypeTable::BOOL {
                    return self.op_error(id, op.symbol(), rhs_ty);
                }
                self.set_ty(id, TypeTable::BOOL);
            }

            _ => unreachable!("all binary operators are covered"),
        }
    }

    fn check_call(
        &mut self,
        static_call: bool,
        lookup_module: ModuleId,
        id: ExprId,
        is_constructor: bool,
        allow_module_construct: bool,
    ) {
        let (name, args) = match &self.ast.expr(id).kind {
            ExprKind::Call { name, args, .. } => (*name, args.clone()),
            _ => return,
        };
        let loc = self.ast.expr(id).loc;

        for &arg in &args {
            self.check_expression(arg);
            if self.ty(arg) == TypeTable::ERROR {
                self.set_ty(id, TypeTable::ERROR);
                return;
            }
            if !self.ast.expr(arg).comptime_compat {
                self.ast.expr_mut(id).comptime_compat = false;
            }
        }

        // A call naming no function but naming a module constructs an
        // instance of that module instead
        if !is_constructor
            && allow_module_construct
            && self
                .symbols
                .functions_named(lookup_module, name)
                .is_empty()
        {
            if let Some(module) = self.find_module(name) {
                self.check_var_object(id, module, &args);
                return;
            }
        }

        let candidates: Vec<FunctionId> = if is_constructor {
            self.symbols.constructors(lookup_module).to_vec()
        } else {
            self.symbols.functions_named(lookup_module, name).to_vec()
        };

        let arg_types: Vec<TypeId> = args.iter().map(|&arg| self.ty(arg)).collect();
        let Some(matched) = self.find_best_candidate(&candidates, name, &arg_types) else {
            if is_constructor {
                self.err(
                    ErrorKind::CouldNotFindConstructor,
                    format!(
                        "Could not find a constructor of '{}' taking these arguments",
                        self.words.resolve(name)
                    ),
                    loc,
                );
            } else {
                self.err(
                    ErrorKind::CouldNotFindFunction,
                    format!(
                        "Could not find a function '{}' taking these arguments",
                        self.words.resolve(name)
                    ),
                    loc,
                );
            }
            self.set_ty(id, TypeTable::ERROR);
            return;
        };

        let function = self.symbols.function(matched);
        let is_member = function.is_member_function();
        let function_module = function.module;
        let function_mods = function.mods;
        let param_types = function.param_types.clone();
        let return_type = function.return_type;

        if static_call && is_member && !is_constructor {
            self.err(
                ErrorKind::CalledNonStaticFuncFromStatic,
                format!(
                    "Cannot call member function '{}' without an instance",
                    self.words.resolve(name)
                ),
                loc,
            );
        }

        if function_module != self.module_id()
            && function_mods.access_mods().contains(Modifiers::PRIVATE)
        {
            self.err(
                ErrorKind::FunctionNotVisible,
                format!("'{}' is private to its module", self.words.resolve(name)),
                loc,
            );
        }

        // Arguments coerce to the matched signature
        let mut new_args = args.clone();
        for (index, &param_ty) in param_types.iter().enumerate() {
            new_args[index] = self.attempt_assignment(param_ty, new_args[index]);
        }
        if let ExprKind::Call { args, sym, .. } = &mut self.ast.expr_mut(id).kind {
            *args = new_args;
            *sym = Some(matched);
        }

        self.set_ty(id, return_type);
        self.ast.expr_mut(id).literal_constant = false;
        self.ast.expr_mut(id).comptime_compat = false;
    }

    /// Constructor-style call: `Mod(...)` where `Mod` names a module in this
    /// unit's visible set.
    fn check_var_object(&mut self, id: ExprId, module: ModuleId, args: &[ExprId]) {
        self.ast.expr_mut(id).literal_constant = false;

        let module_sym = self.symbols.module(module);
        let no_constructors = module_sym.no_constructors_declared;
        let unique_id = module_sym.unique_id;
        let module_ty = self.types.module(unique_id);

        if no_constructors && args.is_empty() {
            // Assumed default constructor
            if let ExprKind::Call {
                constructed_module,
                assumed_default_constructor,
                ..
            } = &mut self.ast.expr_mut(id).kind
            {
                *constructed_module = Some(module);
                *assumed_default_constructor = true;
            }
            self.set_ty(id, module_ty);
            return;
        }

        self.check_call(false, module, id, true, false);
        if self.ty(id) == TypeTable::ERROR {
            return;
        }
        if let ExprKind::Call {
            constructed_module, ..
        } = &mut self.ast.expr_mut(id).kind
        {
            *constructed_module = Some(module);
        }
        self.set_ty(id, module_ty);
    }

    /// Candidate viability plus conflict scoring. A viable candidate takes
    /// every argument by assignability; the best has the fewest positions
    /// whose type is not already exact. Ties keep the first declared.
    fn find_best_candidate(
        &self,
        candidates: &[FunctionId],
        name: WordId,
        arg_types: &[TypeId],
    ) -> Option<FunctionId> {
        let mut least_conflicts = u32::MAX;
        let mut selection = None;

        for &candidate in candidates {
            let function = self.symbols.function(candidate);
            if !function.is_constructor && function.name != name {
                continue;
            }
            if function.param_types.len() != arg_types.len() {
                continue;
            }

            let viable = arg_types
                .iter()
                .zip(&function.param_types)
                .all(|(&arg, &param)| self.assignable(param, arg));
            if !viable {
                continue;
            }

            let conflicts = arg_types
                .iter()
                .zip(&function.param_types)
                .filter(|(arg, param)| arg != param)
                .count() as u32;

            if conflicts < least_conflicts {
                least_conflicts = conflicts;
                selection = Some(candidate);
            }
        }

        selection
    }

    fn check_array_access(&mut self, static_context: bool, lookup_scope: ScopeId, id: ExprId) {
        self.ast.expr_mut(id).literal_constant = false;

        let (ident, indexes) = match &self.ast.expr(id).kind {
            ExprKind::ArrayAccess { ident, indexes } => (*ident, indexes.clone()),
            _ => return,
        };
        let loc = self.ast.expr(id).loc;

        self.check_ident(static_context, lookup_scope, ident);
        let ident_ty = self.ty(ident);
        if ident_ty == TypeTable::ERROR {
            self.set_ty(id, TypeTable::ERROR);
            return;
        }
        if !self.ast.expr(ident).comptime_compat {
            self.ast.expr_mut(id).comptime_compat = false;
        }

        let mut type_at_index = ident_ty;
        for &index in &indexes {
            self.check_expression(index);
            if self.ty(index) == TypeTable::ERROR {
                self.set_ty(id, TypeTable::ERROR);
                return;
            }
            if !self.types.is_int(self.ty(index)) {
                self.err(
                    ErrorKind::ArrayAccessExpectsInt,
                    "Array indexes must be integers",
                    self.ast.expr(index).loc,
                );
                self.set_ty(id, TypeTable::ERROR);
                return;
            }

            if !(self.types.is_arr(type_at_index) || self.types.is_ptr(type_at_index)) {
                self.err(
                    ErrorKind::ArrayAccessOnInvalidType,
                    format!(
                        "Cannot index into a value of type '{}'",
                        self.type_name(type_at_index)
                    ),
                    loc,
                );
                self.set_ty(id, TypeTable::ERROR);
                return;
            }

            if !self.ast.expr(index).comptime_compat {
                self.ast.expr_mut(id).comptime_compat = false;
            }

            type_at_index = self.types.elem(type_at_index).unwrap_or(TypeTable::ERROR);
        }

        let depth_limit = self.types.arr_depth(ident_ty) + self.types.ptr_depth(ident_ty);
        if indexes.len() as u32 > depth_limit {
            self.err(
                ErrorKind::TooManyArrayAccessIndexes,
                "More indexes than the array has dimensions",
                loc,
            );
            self.set_ty(id, TypeTable::ERROR);
            return;
        }

        let ty = self.types.after_indexing(ident_ty, indexes.len() as u32);
        self.set_ty(id, ty);
    }

    /// Array literals type bottom-up; the innermost nesting level is left
    /// `mixed` so the assignment destination can pin the element type.
    fn check_array_literal(&mut self, id: ExprId) {
        self.ast.expr_mut(id).literal_constant = false;

        let elements = match &self.ast.expr(id).kind {
            ExprKind::ArrayLit { elements, .. } => elements.clone(),
            _ => return,
        };

        let mut last_nesting_level = elements.is_empty();
        let mut element_array_type = None;

        for &element in &elements {
            if matches!(self.ast.expr(element).kind, ExprKind::ArrayLit { .. }) {
                self.check_array_literal(element);
                element_array_type = Some(self.ty(element));
            } else {
                last_nesting_level = true;
                self.check_expression(element);
            }

            if self.ty(element) == TypeTable::ERROR {
                self.set_ty(id, TypeTable::ERROR);
                return;
            }
            if !self.ast.expr(element).comptime_compat {
                self.ast.expr_mut(id).comptime_compat = false;
            }
        }

        let elem_ty = if last_nesting_level {
            TypeTable::MIXED
        } else {
            element_array_type.unwrap_or(TypeTable::MIXED)
        };
        let ty = self.types.arr_of(elem_ty);
        self.set_ty(id, ty);
    }

    // ------------------------------------------------------------------
    // Dot expressions
    // ------------------------------------------------------------------

    /// A dot chain folds left, tracking the scope the next identifier
    /// resolves in, the module the next call resolves against, and whether
    /// `this` is absent.
    fn check_dot_chain(&mut self, id: ExprId) {
        let factors = match &self.ast.expr(id).kind {
            ExprKind::DotChain { factors } => factors.clone(),
            _ => return,
        };

        let mut ref_scope = self.scope_id();
        let mut ref_module = self.module_id();
        let mut static_context = match self.function {
            Some(function) => !self.symbols.function(function).is_member_function(),
            None => true,
        };

        for (idx, &factor) in factors.iter().enumerate() {
            let last = idx + 1 == factors.len();
            let factor_kind = self.ast.expr(factor).kind.clone();
            let factor_loc = self.ast.expr(factor).loc;

            let factor_name = match factor_kind {
                ExprKind::Ident { name, .. } => {
                    // A leading identifier that names no variable but names
                    // a module switches the chain to that module
                    if idx == 0 && self.symbols.lookup_variable(ref_scope, name).is_none() {
                        if let Some(module) = self.find_module(name) {
                            ref_scope = self.symbols.module(module).scope;
                            ref_module = module;
                            static_context = true;
                            if let ExprKind::Ident {
                                references_module, ..
                            } = &mut self.ast.expr_mut(factor).kind
                            {
                                *references_module = true;
                            }
                            continue;
                        }
                    }

                    self.check_ident(static_context, ref_scope, factor);
                    name
                }
                ExprKind::ArrayAccess { ident, .. } => {
                    self.check_array_access(static_context, ref_scope, factor);
                    match self.ast.expr(ident).kind {
                        ExprKind::Ident { name, .. } => name,
                        _ => self.keywords.length,
                    }
                }
                ExprKind::Call { name, .. } => {
                    self.check_call(static_context, ref_module, factor, false, false);
                    name
                }
                ExprKind::This => {
                    if static_context {
                        self.err(
                            ErrorKind::CannotUseThisKeywordInStaticContext,
                            "'this' is not available in a static context",
                            factor_loc,
                        );
                        self.set_ty(id, TypeTable::ERROR);
                        return;
                    }
                    if idx != 0 {
                        self.err(
                            ErrorKind::ThisKeywordMustComeFirst,
                            "'this' may only start a dot expression",
                            factor_loc,
                        );
                        self.set_ty(id, TypeTable::ERROR);
                        return;
                    }
                    // Look later factors up in the enclosing module's scope
                    ref_scope = self.symbols.module(self.module_id()).scope;
                    continue;
                }
                _ => {
                    self.err(
                        ErrorKind::DotOpExpectsVariable,
                        "Dot expressions join identifiers, indexes and calls",
                        factor_loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
            };

            let factor_ty = self.ty(factor);
            if factor_ty == TypeTable::ERROR {
                self.set_ty(id, TypeTable::ERROR);
                return;
            }

            if !last {
                if self.types.is_arr(factor_ty) {
                    // The only thing after an array is its final `length`
                    let next = factors[idx + 1];
                    let next_is_length = idx + 2 == factors.len()
                        && matches!(
                            self.ast.expr(next).kind,
                            ExprKind::Ident { name, .. } if name == self.keywords.length
                        );
                    if next_is_length {
                        if let ExprKind::Ident {
                            is_array_length, ..
                        } = &mut self.ast.expr_mut(next).kind
                        {
                            *is_array_length = true;
                        }
                        // Lengths are in uint
                        self.set_ty(id, TypeTable::UINT);
                        return;
                    }
                    self.err(
                        ErrorKind::TypeDoesNotHaveField,
                        format!(
                            "'{}' has no such field",
                            self.words.resolve(factor_name)
                        ),
                        factor_loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                } else if self.types.is_module(factor_ty) {
                    let unique_id = self.types.module_unique_id(factor_ty).unwrap();
                    let module = ModuleId::new(unique_id);
                    static_context = false;
                    ref_module = module;
                    ref_scope = self.symbols.module(module).scope;
                } else {
                    self.err(
                        ErrorKind::TypeDoesNotHaveField,
                        format!(
                            "'{}' of type '{}' has no fields",
                            self.words.resolve(factor_name),
                            self.type_name(factor_ty)
                        ),
                        factor_loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
            } else {
                let ty = self.ty(factor);
                self.set_ty(id, ty);
            }
        }
    }

    // ------------------------------------------------------------------
    // Declarations and statements
    // ------------------------------------------------------------------

    fn check_variable_decl(&mut self, id: ExprId) {
        let (var, assignment, dim_sizes) = match &self.ast.expr(id).kind {
            ExprKind::VarDecl {
                var,
                assignment,
                dim_sizes,
            } => (*var, *assignment, dim_sizes.clone()),
            _ => return,
        };
        let loc = self.ast.expr(id).loc;

        let var_mods = self.symbols.variable(var).mods;
        let var_ty = self.symbols.variable(var).ty;
        self.ast.expr_mut(id).literal_constant = var_mods.contains(Modifiers::COMPTIME);
        self.set_ty(id, var_ty);

        if let Some(assignment) = assignment {
            self.check_expression(assignment);
            if !self.ast.expr(assignment).comptime_compat {
                self.ast.expr_mut(id).comptime_compat = false;
            }
            if self.ty(assignment) == TypeTable::ERROR {
                self.set_ty(id, TypeTable::ERROR);
                return;
            }
        }

        if self.types.is_arr(var_ty) {
            // Fold the explicit dimension sizes: int[n][k] — those n and k
            let mut computed = Vec::new();
            for dim in dim_sizes.iter().flatten() {
                self.check_expression(*dim);
                let dim_ty = self.ty(*dim);
                if dim_ty == TypeTable::ERROR {
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
                if !self.types.is_int(dim_ty) {
                    self.err(
                        ErrorKind::ArrSizeNotConstant,
                        "Array dimension sizes must be integers",
                        self.ast.expr(*dim).loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }

                let folded = self
                    .const_expr_of(*dim)
                    .and_then(|expr| self.backend.fold_constant(&expr));
                let Some(size) = folded else {
                    self.err(
                        ErrorKind::ArrSizeNotConstant,
                        "Array dimension sizes must be compile-time constants",
                        self.ast.expr(*dim).loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                };
                if size <= 0 {
                    self.err(
                        ErrorKind::ArrSizeMustBePositive,
                        "Array dimension sizes must be positive",
                        self.ast.expr(*dim).loc,
                    );
                    self.set_ty(id, TypeTable::ERROR);
                    return;
                }
                computed.push(size as u32);
            }
            self.symbols.variable_mut(var).computed_arr_dim_sizes = computed.clone();

            if let Some(assignment) = assignment {
                if !computed.is_empty() {
                    let rhs = match self.ast.expr(assignment).kind {
                        ExprKind::Binary { rhs, .. } => Some(rhs),
                        _ => None,
                    };
                    if let Some(rhs) = rhs {
                        match self.ast.expr(rhs).kind.clone() {
                            ExprKind::ArrayLit { .. } => {
                                if !self.compare_arr_size(rhs, &computed, 0) {
                                    self.set_ty(id, TypeTable::ERROR);
                                    return;
                                }
                            }
                            ExprKind::StrLit(text) => {
                                if text.len() as u32 > computed[0] {
                                    self.err(
                                        ErrorKind::ArrTooManyInitValues,
                                        "String literal is longer than the declared array size",
                                        self.ast.expr(rhs).loc,
                                    );
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        // The declared identifier forced the assignment non-constant when it
        // was checked; a constant right side still folds
        if let Some(assignment) = assignment {
            if let ExprKind::Binary { rhs, .. } = self.ast.expr(assignment).kind {
                if self.ast.expr(rhs).literal_constant {
                    self.ast.expr_mut(assignment).literal_constant = true;
                }
            }
        }

        if var_mods.contains(Modifiers::COMPTIME) && !self.ast.expr(id).comptime_compat {
            self.err(
                ErrorKind::ComptimeNotComputable,
                "Variable is marked comptime but cannot be evaluated at compile time",
                loc,
            );
        }
    }

    fn compare_arr_size(&mut self, arr: ExprId, sizes: &[u32], depth: usize) -> bool {
        let elements = match &self.ast.expr(arr).kind {
            ExprKind::ArrayLit { elements, .. } => elements.clone(),
            _ => return true,
        };

        if depth >= sizes.len() {
            return true;
        }
        if elements.len() as u32 > sizes[depth] {
            self.err(
                ErrorKind::ArrTooManyInitValues,
                "Array literal has more values than the declared size",
                self.ast.expr(arr).loc,
            );
            return false;
        }
        if let ExprKind::ArrayLit { dim_size, .. } = &mut self.ast.expr_mut(arr).kind {
            *dim_size = Some(sizes[depth]);
        }

        if depth + 1 < sizes.len() {
            for element in elements {
                if matches!(self.ast.expr(element).kind, ExprKind::ArrayLit { .. })
                    && !self.compare_arr_size(element, sizes, depth + 1)
                {
                    return false;
                }
            }
        }
        true
    }

    fn check_return(&mut self, id: ExprId, value: Option<ExprId>) {
        self.ast.expr_mut(id).literal_constant = false;
        let loc = self.ast.expr(id).loc;
        self.set_ty(id, TypeTable::VOID);

        let scope = self.scope_id();
        self.symbols.scope_mut(scope).found_return = true;

        let return_type = match self.function {
            Some(function) => self.symbols.function(function).return_type,
            None => TypeTable::VOID,
        };

        match value {
            Some(value) => {
                self.check_expression(value);
                if self.ty(value) == TypeTable::ERROR {
                    return;
                }
                if !self.ast.expr(value).comptime_compat {
                    self.ast.expr_mut(id).comptime_compat = false;
                }
                if self.expr_assignable(return_type, value) {
                    let new_value = self.attempt_assignment(return_type, value);
                    if let ExprKind::Return { value } = &mut self.ast.expr_mut(id).kind {
                        *value = Some(new_value);
                    }
                } else {
                    let found = self.type_name(self.ty(value));
                    let expected = self.type_name(return_type);
                    self.err(
                        ErrorKind::ReturnValueNotCompatibleWithReturnType,
                        format!("Cannot return '{found}' from a function returning '{expected}'"),
                        loc,
                    );
                }
            }
            None => {
                if return_type != TypeTable::VOID {
                    self.err(
                        ErrorKind::FunctionExpectsReturnValue,
                        "Function expects a return value",
                        loc,
                    );
                }
            }
        }
    }

    /// An if-chain proves a return iff every branch returns and the chain
    /// ends in an else.
    fn check_if(&mut self, id: ExprId) {
        self.ast.expr_mut(id).literal_constant = false;
        self.set_ty(id, TypeTable::VOID);

        let (branches, else_scope, else_body) = match &self.ast.expr(id).kind {
            ExprKind::If {
                branches,
                else_scope,
                else_body,
            } => (branches.clone(), *else_scope, else_body.clone()),
            _ => return,
        };

        let outer_scope = self.scope_id();
        let mut all_branches_return = true;
        let mut comptime = true;

        for branch in &branches {
            self.check_expression(branch.cond);
            if self.ty(branch.cond) == TypeTable::ERROR {
                return;
            }
            if self.ty(branch.cond) != TypeTable::BOOL {
                self.err(
                    ErrorKind::ExpectedBoolCond,
                    "Condition must be a bool",
                    self.ast.expr(branch.cond).loc,
                );
            }
            if !self.ast.expr(branch.cond).comptime_compat {
                comptime = false;
            }

            self.scope = Some(branch.scope);
            self.check_scope_stmts(&branch.body, &mut comptime);
            if !self.symbols.scope(branch.scope).found_return {
                all_branches_return = false;
            }
        }

        match else_scope {
            Some(scope) => {
                self.scope = Some(scope);
                self.check_scope_stmts(&else_body, &mut comptime);
                if !self.symbols.scope(scope).found_return {
                    all_branches_return = false;
                }
            }
            None => all_branches_return = false,
        }

        self.scope = Some(outer_scope);
        if !comptime {
            self.ast.expr_mut(id).comptime_compat = false;
        }

        if all_branches_return {
            self.symbols.scope_mut(outer_scope).found_return = true;
        }
    }

    fn check_for(
        &mut self,
        id: ExprId,
        decls: &[ExprId],
        cond: ExprId,
        post: &[ExprId],
        scope: ScopeId,
        body: &[ExprId],
    ) {
        self.ast.expr_mut(id).literal_constant = false;
        self.set_ty(id, TypeTable::VOID);

        let outer_scope = self.scope_id();
        self.scope = Some(scope);

        for &decl in decls {
            self.check_expression(decl);
            if self.ty(decl) == TypeTable::ERROR {
                self.scope = Some(outer_scope);
                return;
            }
            if !self.ast.expr(decl).comptime_compat {
                self.ast.expr_mut(id).comptime_compat = false;
            }
        }

        self.check_loop(id, cond, body, post);
        self.scope = Some(outer_scope);
    }

    fn check_while(&mut self, id: ExprId, cond: ExprId, scope: ScopeId, body: &[ExprId]) {
        self.ast.expr_mut(id).literal_constant = false;
        self.set_ty(id, TypeTable::VOID);

        let outer_scope = self.scope_id();
        self.scope = Some(scope);
        self.check_loop(id, cond, body, &[]);
        self.scope = Some(outer_scope);
    }

    /// Loop bodies do not contribute to the enclosing return proof: the
    /// `found_return` they set stays on the loop's own scope.
    fn check_loop(&mut self, id: ExprId, cond: ExprId, body: &[ExprId], post: &[ExprId]) {
        self.check_expression(cond);
        if self.ty(cond) == TypeTable::ERROR {
            return;
        }
        if !self.ast.expr(cond).comptime_compat {
            self.ast.expr_mut(id).comptime_compat = false;
        }
        if self.ty(cond) != TypeTable::BOOL {
            self.err(
                ErrorKind::ExpectedBoolCond,
                "Condition must be a bool",
                self.ast.expr(cond).loc,
            );
        }

        let mut comptime = true;
        self.check_scope_stmts(body, &mut comptime);
        if !comptime {
            self.ast.expr_mut(id).comptime_compat = false;
        }

        for &expr in post {
            self.check_expression(expr);
            if !self.ast.expr(expr).comptime_compat {
                self.ast.expr_mut(id).comptime_compat = false;
            }
        }
    }

    // ------------------------------------------------------------------
    // Assignability and coercion
    // ------------------------------------------------------------------

    /// The implicit-conversion table: `assignable(to, from)`.
    fn assignable(&self, to: TypeId, from: TypeId) -> bool {
        assignable_to(self.types, to, from)
    }

    /// Assignability with one extension over the type table: an integer
    /// literal fits any integer destination wide enough for its value, so
    /// `byte b = 5;` works while `byte b = a;` for an int `a` does not.
    fn expr_assignable(&self, to: TypeId, value: ExprId) -> bool {
        self.assignable(to, self.ty(value)) || self.int_literal_fits(to, value)
    }

    fn int_literal_value(&self, value: ExprId) -> Option<(u64, bool)> {
        match &self.ast.expr(value).kind {
            ExprKind::IntLit { value, .. } => Some((*value, false)),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match &self.ast.expr(*operand).kind {
                ExprKind::IntLit { value, .. } => Some((*value, true)),
                _ => None,
            },
            _ => None,
        }
    }

    fn int_literal_fits(&self, to: TypeId, value: ExprId) -> bool {
        if !self.types.is_int(to) {
            return false;
        }
        let Some((magnitude, negative)) = self.int_literal_value(value) else {
            return false;
        };

        let bits = self.types.mem_size(to) * 8;
        let signed = self.types.is_signed(to);
        if negative {
            signed && (bits >= 64 || magnitude <= 1u64 << (bits - 1))
        } else if signed {
            bits >= 64 || magnitude <= (1u64 << (bits - 1)) - 1
        } else {
            bits >= 64 || magnitude <= (1u64 << bits) - 1
        }
    }

    /// Pins a fitting integer literal to the destination type in place.
    fn pin_int_literal(&mut self, value: ExprId, to: TypeId) {
        self.set_ty(value, to);
        let inner = match &self.ast.expr(value).kind {
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Some(*operand),
            _ => None,
        };
        if let Some(inner) = inner {
            self.set_ty(inner, to);
        }
    }

    /// Wraps `value` in a cast node unless it already has the target type.
    fn make_cast(&mut self, value: ExprId, to: TypeId) -> ExprId {
        if self.ty(value) == to {
            return value;
        }
        let loc = self.ast.expr(value).loc;
        let literal_constant = self.ast.expr(value).literal_constant;
        let comptime_compat = self.ast.expr(value).comptime_compat;
        let cast = self.ast.alloc(
            ExprKind::Cast {
                to,
                value,
                explicit: false,
            },
            loc,
        );
        self.set_ty(cast, to);
        self.ast.expr_mut(cast).literal_constant = literal_constant;
        self.ast.expr_mut(cast).comptime_compat = comptime_compat;
        cast
    }

    /// Reshapes an already-assignable value to its destination type:
    /// strings and nulls take the destination type outright, array literals
    /// get their `mixed` element type pinned, everything else gets a cast.
    /// Returns the id to use in place of `value`.
    fn attempt_assignment(&mut self, to: TypeId, value: ExprId) -> ExprId {
        let value_ty = self.ty(value);

        if value_ty == TypeTable::STRING {
            self.set_ty(value, to);
            value
        } else if self.types.is_arr(value_ty) && self.types.is_arr(to) {
            if matches!(self.ast.expr(value).kind, ExprKind::ArrayLit { .. }) {
                let to_base = self.types.base_type(to);
                self.attempt_array_assignment(to_base, value);
            }
            let to_base = self.types.base_type(to);
            let pinned = self.types.with_base_type(value_ty, to_base);
            self.set_ty(value, pinned);
            value
        } else if value_ty == TypeTable::NULL {
            // Null takes on the pointer type it initializes
            self.set_ty(value, to);
            value
        } else if value_ty != to && self.int_literal_fits(to, value) {
            self.pin_int_literal(value, to);
            value
        } else if value_ty != to {
            self.make_cast(value, to)
        } else {
            value
        }
    }

    fn attempt_array_assignment(&mut self, to_base: TypeId, arr: ExprId) -> bool {
        let elements = match &self.ast.expr(arr).kind {
            ExprKind::ArrayLit { elements, .. } => elements.clone(),
            _ => return true,
        };

        let mut new_elements = elements.clone();
        for (index, &element) in elements.iter().enumerate() {
            if matches!(self.ast.expr(element).kind, ExprKind::ArrayLit { .. }) {
                if !self.attempt_array_assignment(to_base, element) {
                    return false;
                }
                let pinned = {
                    let elem_ty = self.ty(element);
                    self.types.with_base_type(elem_ty, to_base)
                };
                self.set_ty(element, pinned);
            } else if self.expr_assignable(to_base, element) {
                new_elements[index] = self.attempt_assignment(to_base, element);
            } else {
                let found = self.type_name(self.ty(element));
                let expected = self.type_name(to_base);
                self.err(
                    ErrorKind::ElementOfArrayNotCompatibleWithArray,
                    format!("Array element of type '{found}' does not fit '{expected}'"),
                    self.ast.expr(element).loc,
                );
                return false;
            }
        }

        if let ExprKind::ArrayLit { elements, .. } = &mut self.ast.expr_mut(arr).kind {
            *elements = new_elements;
        }
        true
    }

    // ------------------------------------------------------------------
    // Compile-time integer folding for array dimension sizes
    // ------------------------------------------------------------------

    /// Rebuilds an expression as the backend's pure constant tree, when it
    /// is one.
    fn const_expr_of(&self, id: ExprId) -> Option<ConstExpr> {
        match &self.ast.expr(id).kind {
            ExprKind::IntLit { value, .. } => Some(ConstExpr::Int(*value as i64)),
            ExprKind::CharLit(value) => Some(ConstExpr::Int(*value as i64)),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Some(ConstExpr::Neg(Box::new(self.const_expr_of(*operand)?))),
            ExprKind::Unary {
                op: UnaryOp::Plus,
                operand,
            } => self.const_expr_of(*operand),
            ExprKind::Cast { value, .. } => self.const_expr_of(*value),
            ExprKind::Binary { op, lhs, rhs } => {
                let op = match op {
                    BinOp::Add => ConstBinOp::Add,
                    BinOp::Sub => ConstBinOp::Sub,
                    BinOp::Mul => ConstBinOp::Mul,
                    BinOp::Div => ConstBinOp::Div,
                    BinOp::Mod => ConstBinOp::Rem,
                    BinOp::Shl => ConstBinOp::Shl,
                    BinOp::Shr => ConstBinOp::Shr,
                    BinOp::BitAnd => ConstBinOp::And,
                    BinOp::BitOr => ConstBinOp::Or,
                    BinOp::BitXor => ConstBinOp::Xor,
                    _ => return None,
                };
                Some(ConstExpr::Binary {
                    op,
                    lhs: Box::new(self.const_expr_of(*lhs)?),
                    rhs: Box::new(self.const_expr_of(*rhs)?),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NUMERIC: [TypeId; 13] = [
        TypeTable::BYTE,
        TypeTable::SHORT,
        TypeTable::INT,
        TypeTable::LONG,
        TypeTable::UBYTE,
        TypeTable::USHORT,
        TypeTable::UINT,
        TypeTable::ULONG,
        TypeTable::CHAR8,
        TypeTable::CHAR16,
        TypeTable::CHAR32,
        TypeTable::FLOAT,
        TypeTable::DOUBLE,
    ];

    #[test]
    fn assignability_is_reflexive_for_non_sentinels() {
        let mut types = TypeTable::new();
        let mut all = NUMERIC.to_vec();
        all.push(TypeTable::BOOL);
        all.push(types.ptr_to(TypeTable::INT));
        all.push(types.arr_of(TypeTable::DOUBLE));
        all.push(types.module(3));

        for ty in all {
            assert!(assignable_to(&types, ty, ty), "not reflexive for {ty:?}");
        }
    }

    proptest! {
        // Mutual assignability between numeric types means they share a
        // width, and for integers a signedness class
        #[test]
        fn numeric_assignability_is_antisymmetric_up_to_width(
            a in 0usize..13,
            b in 0usize..13,
        ) {
            let types = TypeTable::new();
            let (a, b) = (NUMERIC[a], NUMERIC[b]);
            if assignable_to(&types, a, b) && assignable_to(&types, b, a) {
                prop_assert_eq!(types.mem_size(a), types.mem_size(b));
                prop_assert_eq!(types.is_float(a), types.is_float(b));
            }
        }
    }

    #[test]
    fn null_fits_pointers_and_nothing_else() {
        let mut types = TypeTable::new();
        let ptr = types.ptr_to(TypeTable::INT);
        let ptr_ptr = types.ptr_to(ptr);
        assert!(assignable_to(&types, ptr, TypeTable::NULL));
        assert!(assignable_to(&types, ptr_ptr, TypeTable::NULL));
        assert!(!assignable_to(&types, TypeTable::INT, TypeTable::NULL));
        assert!(!assignable_to(&types, TypeTable::BOOL, TypeTable::NULL));
    }

    #[test]
    fn arrays_convert_to_pointers_of_matching_shape() {
        let mut types = TypeTable::new();
        let arr = types.arr_of(TypeTable::INT);
        let ptr = types.ptr_to(TypeTable::INT);
        let deep_arr = types.arr_of(arr);
        assert!(assignable_to(&types, ptr, arr));
        assert!(!assignable_to(&types, ptr, deep_arr));
    }

    #[test]
    fn mixed_element_arrays_fit_any_matching_depth() {
        let mut types = TypeTable::new();
        let mixed_arr = types.arr_of(TypeTable::MIXED);
        let int_arr = types.arr_of(TypeTable::INT);
        let double_arr = types.arr_of(TypeTable::DOUBLE);
        assert!(assignable_to(&types, int_arr, mixed_arr));
        assert!(assignable_to(&types, double_arr, mixed_arr));
        assert!(!assignable_to(&types, int_arr, double_arr));
    }

    #[test]
    fn modules_require_identity() {
        let mut types = TypeTable::new();
        let first = types.module(1);
        let second = types.module(2);
        assert!(assignable_to(&types, first, first));
        assert!(!assignable_to(&types, first, second));
    }
}
