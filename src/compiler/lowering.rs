//! Lowering: drives the IR backend over analyzed units.
//!
//! Emission per unit happens in three phases the orchestrator schedules
//! across the dependency graph: named aggregate types for modules, function
//! signatures (with entry blocks and parameter slots), then globals and
//! function bodies. Global initializers that are not literal constants are
//! deferred and spliced into `main`'s entry block during startup wiring,
//! followed by calls to every `StartUp` function.
//!
//! The value policy: expressions denoting lvalues (identifiers, array
//! accesses, dot accesses ending in a field or element) produce addresses;
//! loads are inserted where an rvalue is required.

use crate::backends::{
    BinOp as IrBinOp, BlockRef, CastKind, CmpPred, FuncRef, IrBackend, IrConst, IrType, Linkage,
    ValueRef,
};
use crate::codegen_log;
use crate::compiler::ast::{BinOp, ExprId, ExprKind, FunctionAst, ModuleAst, UnaryOp, UnitAst};
use crate::compiler::symbols::{
    FunctionId, Modifiers, ModuleId, SymbolRegistry, VarId, VarSlot,
};
use crate::compiler::tokens::Keywords;
use crate::compiler::types::{TypeId, TypeKind, TypeTable};
use crate::compiler::unit::FileUnit;
use crate::compiler::words::WordTable;

/// A global whose initializer could not be embedded as a constant; its
/// declaration is re-run in front of `main`'s first user statement.
#[derive(Debug, Clone, Copy)]
pub struct DeferredInit {
    pub unit: usize,
    pub decl: ExprId,
}

/// Emission bookkeeping shared by every unit's lowering.
#[derive(Debug, Default)]
pub struct GenState {
    num_functions: u32,
    num_globals: u32,
    pub deferred: Vec<DeferredInit>,
    pub startup_functions: Vec<FuncRef>,
    /// Insertion point in front of `main`'s body for deferred initializers
    /// and startup calls
    pub main_preamble: Option<(FuncRef, BlockRef, u32)>,
}

impl GenState {
    fn next_function(&mut self) -> u32 {
        let count = self.num_functions;
        self.num_functions += 1;
        count
    }

    fn next_global(&mut self) -> u32 {
        let count = self.num_globals;
        self.num_globals += 1;
        count
    }
}

pub struct Lowering<'a, B: IrBackend> {
    pub backend: &'a mut B,
    pub words: &'a WordTable,
    pub keywords: &'a Keywords,
    pub types: &'a TypeTable,
    pub symbols: &'a mut SymbolRegistry,
    pub units: &'a [FileUnit],
    pub state: &'a mut GenState,

    cur_func: Option<FuncRef>,
    this_val: Option<ValueRef>,
    initializing_globals: bool,
}

impl<'a, B: IrBackend> Lowering<'a, B> {
    pub fn new(
        backend: &'a mut B,
        words: &'a WordTable,
        keywords: &'a Keywords,
        types: &'a TypeTable,
        symbols: &'a mut SymbolRegistry,
        units: &'a [FileUnit],
        state: &'a mut GenState,
    ) -> Self {
        Lowering {
            backend,
            words,
            keywords,
            types,
            symbols,
            units,
            state,
            cur_func: None,
            this_val: None,
            initializing_globals: false,
        }
    }

    fn ast_of(&self, unit: usize) -> &UnitAst {
        self.units[unit]
            .ast
            .as_ref()
            .expect("unit ASTs live until startup wiring")
    }

    fn module_ast(&self, module: ModuleId) -> &ModuleAst {
        let unit = self.symbols.module(module).unit as usize;
        self.ast_of(unit)
            .modules
            .iter()
            .find(|m| m.sym == module)
            .expect("module has a declaration")
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn ir_type_of(&self, ty: TypeId) -> IrType {
        match self.types.kind(ty) {
            TypeKind::Byte | TypeKind::UByte | TypeKind::Char8 => IrType::I8,
            TypeKind::Bool => IrType::I1,
            TypeKind::Short | TypeKind::UShort | TypeKind::Char16 => IrType::I16,
            TypeKind::Int | TypeKind::UInt | TypeKind::Char32 => IrType::I32,
            TypeKind::Long | TypeKind::ULong => IrType::I64,
            TypeKind::Float => IrType::F32,
            TypeKind::Double => IrType::F64,
            TypeKind::Void => IrType::Void,
            // Arrays are a single pointer to their length-prefixed block;
            // element types ride along explicitly wherever they matter
            TypeKind::Ptr { .. } | TypeKind::Arr { .. } | TypeKind::Null => {
                IrType::I8.ptr_to()
            }
            TypeKind::Module { unique_id } => {
                let strct = self
                    .symbols
                    .module(ModuleId::new(unique_id))
                    .ir_struct
                    .expect("module structs are declared before use");
                IrType::Struct(strct)
            }
            TypeKind::Str | TypeKind::Mixed | TypeKind::Error | TypeKind::FdModule { .. } => {
                IrType::I8.ptr_to()
            }
        }
    }

    // ------------------------------------------------------------------
    // Phase: type declarations
    // ------------------------------------------------------------------

    pub fn gen_type_declarations(&mut self, unit: usize) {
        let modules: Vec<ModuleId> = self.units[unit].own_modules.clone();
        for module in modules {
            self.ensure_struct(module);
        }
    }

    fn ensure_struct(&mut self, module: ModuleId) -> crate::backends::StructRef {
        if let Some(existing) = self.symbols.module(module).ir_struct {
            return existing;
        }

        let fields = self.symbols.module(module).fields.clone();
        let mut members = Vec::with_capacity(fields.len());
        for field in fields {
            let field_ty = self.symbols.variable(field).ty;
            // Nested module fields are inlined, so their structs must exist
            // first; field cycles were rejected during analysis
            if let Some(unique_id) = self.types.module_unique_id(field_ty) {
                self.ensure_struct(ModuleId::new(unique_id));
            }
            members.push(self.ir_type_of(field_ty));
        }
        if members.is_empty() {
            // Every module gets a non-zero address identity
            members.push(IrType::I8);
        }

        let name = self.words.resolve(self.symbols.module(module).name).to_string();
        let strct = self.backend.declare_struct(&name, members);
        self.symbols.module_mut(module).ir_struct = Some(strct);
        strct
    }

    // ------------------------------------------------------------------
    // Phase: body declarations (signatures, entry blocks, parameter slots)
    // ------------------------------------------------------------------

    pub fn gen_body_declarations(&mut self, unit: usize) {
        let modules: Vec<ModuleId> = self.units[unit].own_modules.clone();
        for module in modules {
            let constructors = self.symbols.module(module).constructors.clone();
            for constructor in constructors {
                self.gen_function_declaration(constructor);
            }

            let module_ast = self.module_ast(module);
            let functions: Vec<FunctionId> =
                module_ast.functions.iter().map(|f| f.sym).collect();
            for function in functions {
                self.gen_function_declaration(function);
            }
        }
    }

    fn gen_function_declaration(&mut self, function_id: FunctionId) {
        let function = self.symbols.function(function_id);
        let is_member = function.is_member_function();
        let is_external = function.is_external();
        let is_main = function.is_main;
        let is_constructor = function.is_constructor;
        let name_key = function.name;
        let params = function.params.clone();
        let param_types = function.param_types.clone();
        let return_type = function.return_type;
        let mods = function.mods;

        let ret = self.ir_type_of(return_type);
        let mut ir_params = Vec::with_capacity(param_types.len() + 1);
        if is_member {
            // Member functions take a pointer to the owning module first
            ir_params.push(IrType::I8.ptr_to());
        }
        for &param_ty in &param_types {
            ir_params.push(self.ir_type_of(param_ty));
        }

        let mut name = String::new();
        if is_constructor {
            name.push_str("_C");
        }
        name.push_str(self.words.resolve(name_key));
        if !is_main && !is_external {
            // Unique numeric suffixes let overloaded names coexist
            name.push('_');
            if is_member {
                name.push('M');
            }
            name.push('.');
            name.push_str(&self.state.next_function().to_string());
        }

        let linkage = if is_external {
            Linkage::DllImport
        } else {
            Linkage::Export
        };
        let func = self
            .backend
            .declare_function(&name, ret, ir_params, linkage, is_external);
        self.symbols.function_mut(function_id).ir_func = Some(func);

        if is_external {
            return;
        }

        let entry = self.backend.create_block(func);
        self.backend.position_at_end(func, entry);

        // Parameter values land in stack slots so bodies can address them
        let param_offset = if is_member { 1u32 } else { 0 };
        for (index, &param) in params.iter().enumerate() {
            let param_ty = self.symbols.variable(param).ty;
            let ir_ty = self.ir_type_of(param_ty);
            let slot = self.backend.build_alloca(ir_ty, None);
            let incoming = self.backend.param(func, index as u32 + param_offset);
            self.backend.build_store(incoming, slot);
            self.symbols.variable_mut(param).slot = VarSlot::Local(slot);
        }

        if is_main {
            self.state.main_preamble = Some((func, entry, self.backend.cursor_index()));
        }

        // Parameterless static functions named StartUp run before main
        if !is_constructor
            && name_key == self.keywords.startup
            && param_types.is_empty()
            && mods.contains(Modifiers::STATIC)
        {
            self.state.startup_functions.push(func);
        }
    }

    // ------------------------------------------------------------------
    // Phase: globals and bodies
    // ------------------------------------------------------------------

    pub fn gen_unit(&mut self, unit: usize) {
        codegen_log!(format!("lowering unit {}", self.units[unit].internal_path));

        let modules: Vec<ModuleId> = self.units[unit].own_modules.clone();
        for module in modules {
            let module_ast = self.module_ast(module);
            let globals: Vec<ExprId> = module_ast.globals.clone();
            let constructors: Vec<FunctionId> =
                module_ast.constructors.iter().map(|f| f.sym).collect();
            let functions: Vec<FunctionId> =
                module_ast.functions.iter().map(|f| f.sym).collect();

            for global in globals {
                self.gen_global_variable(unit, global);
            }
            for constructor in constructors {
                self.gen_function_body(unit, module, constructor);
            }
            for function in functions {
                self.gen_function_body(unit, module, function);
            }
        }
    }

    fn find_function_ast<'b>(
        module_ast: &'b ModuleAst,
        function: FunctionId,
    ) -> Option<&'b FunctionAst> {
        module_ast
            .constructors
            .iter()
            .chain(&module_ast.functions)
            .find(|f| f.sym == function)
    }

    fn gen_function_body(&mut self, unit: usize, module: ModuleId, function_id: FunctionId) {
        let function = self.symbols.function(function_id);
        if function.is_external() {
            return;
        }
        let func = function.ir_func.expect("declared before bodies");
        let is_member = function.is_member_function();
        let return_type = function.return_type;

        let module_ast = self.module_ast(module);
        let function_ast =
            Self::find_function_ast(module_ast, function_id).expect("body exists");
        let body = function_ast.body.clone();

        let entry = self.backend.entry_block(func);
        self.backend.position_at_end(func, entry);
        self.cur_func = Some(func);
        self.this_val = if is_member {
            Some(self.backend.param(func, 0))
        } else {
            None
        };

        for &stmt in &body {
            self.gen_expression(unit, stmt);
        }

        // Structured control flow can leave a trailing block open even when
        // every source path returned
        let current = self.backend.current_block();
        if !self.backend.block_is_terminated(func, current) {
            if return_type == TypeTable::VOID {
                self.backend.build_ret(None);
            } else {
                let zero = self
                    .backend
                    .const_int(self.ir_type_of(return_type), 0);
                self.backend.build_ret(Some(zero));
            }
        }

        self.cur_func = None;
        self.this_val = None;
    }

    // ------------------------------------------------------------------
    // Globals
    // ------------------------------------------------------------------

    fn gen_global_variable(&mut self, unit: usize, decl: ExprId) {
        let ast = self.ast_of(unit);
        let (var, assignment) = match &ast.expr(decl).kind {
            ExprKind::VarDecl {
                var, assignment, ..
            } => (*var, *assignment),
            _ => return,
        };

        let var_ty = self.symbols.variable(var).ty;
        let name = format!(
            "g_{}.{}",
            self.words.resolve(self.symbols.variable(var).name),
            self.state.next_global()
        );
        let ir_ty = self.ir_type_of(var_ty);

        let global = match self.types.kind(var_ty) {
            TypeKind::Arr { .. } => {
                // Arrays always carry a runtime allocation
                let global = self
                    .backend
                    .define_global(&name, ir_ty.clone(), IrConst::Null(ir_ty));
                self.state.deferred.push(DeferredInit { unit, decl });
                global
            }
            TypeKind::Module { unique_id } => {
                let init = self.const_module_init(ModuleId::new(unique_id));
                let global = self.backend.define_global(&name, ir_ty, init);
                self.state.deferred.push(DeferredInit { unit, decl });
                global
            }
            _ => match assignment {
                None => self
                    .backend
                    .define_global(&name, ir_ty.clone(), IrConst::Zero(ir_ty)),
                Some(assignment) => {
                    let ast = self.ast_of(unit);
                    let rhs = match ast.expr(assignment).kind {
                        ExprKind::Binary { rhs, .. } => rhs,
                        _ => assignment,
                    };
                    let embedded = if ast.expr(assignment).literal_constant {
                        self.const_of_expr(unit, rhs, var_ty)
                    } else {
                        None
                    };
                    match embedded {
                        Some(init) => self.backend.define_global(&name, ir_ty, init),
                        None => {
                            let global = self.backend.define_global(
                                &name,
                                ir_ty.clone(),
                                IrConst::Zero(ir_ty),
                            );
                            self.state.deferred.push(DeferredInit { unit, decl });
                            global
                        }
                    }
                }
            },
        };

        self.symbols.variable_mut(var).slot = VarSlot::Global(global);
    }

    /// Synthesizes the constant aggregate for a module-typed global: literal
    /// constant leaves are embedded, everything else is zeroed here and
    /// filled by the deferred initializer.
    fn const_module_init(&mut self, module: ModuleId) -> IrConst {
        let strct = self.ensure_struct(module);
        let module_unit = self.symbols.module(module).unit as usize;
        let fields = self.symbols.module(module).fields.clone();

        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let field_ty = self.symbols.variable(field).ty;
            let value = match self.types.kind(field_ty) {
                TypeKind::Module { unique_id } => {
                    self.const_module_init(ModuleId::new(unique_id))
                }
                TypeKind::Arr { .. } => IrConst::Null(IrType::I8.ptr_to()),
                _ => self
                    .field_const_init(module_unit, module, field)
                    .unwrap_or(IrConst::Zero(self.ir_type_of(field_ty))),
            };
            values.push(value);
        }
        if values.is_empty() {
            values.push(IrConst::Int {
                ty: IrType::I8,
                value: 0,
            });
        }

        IrConst::Struct {
            ty: strct,
            fields: values,
        }
    }

    fn field_const_init(
        &self,
        module_unit: usize,
        module: ModuleId,
        field: VarId,
    ) -> Option<IrConst> {
        let module_ast = self.module_ast(module);
        let ast = self.ast_of(module_unit);
        let field_ty = self.symbols.variable(field).ty;

        for &decl in &module_ast.fields {
            if let ExprKind::VarDecl {
                var,
                assignment: Some(assignment),
                ..
            } = &ast.expr(decl).kind
            {
                if *var != field {
                    continue;
                }
                if !ast.expr(*assignment).literal_constant {
                    return None;
                }
                if let ExprKind::Binary { rhs, .. } = ast.expr(*assignment).kind {
                    return self.const_of_expr(module_unit, rhs, field_ty);
                }
            }
        }
        None
    }

    /// Folds a literal-constant expression into a backend constant.
    fn const_of_expr(&self, unit: usize, id: ExprId, ty: TypeId) -> Option<IrConst> {
        let ast = self.ast_of(unit);
        let ir_ty = self.ir_type_of(ty);
        match &ast.expr(id).kind {
            ExprKind::IntLit { value, .. } => Some(IrConst::Int {
                ty: ir_ty,
                value: *value,
            }),
            ExprKind::CharLit(value) => Some(IrConst::Int {
                ty: ir_ty,
                value: *value as u64,
            }),
            ExprKind::BoolLit(value) => Some(IrConst::Int {
                ty: ir_ty,
                value: *value as u64,
            }),
            ExprKind::FloatLit(value) => Some(IrConst::Float {
                ty: ir_ty,
                value: *value as f64,
            }),
            ExprKind::DoubleLit(value) => Some(IrConst::Float {
                ty: ir_ty,
                value: *value,
            }),
            ExprKind::Null => Some(IrConst::Null(ir_ty)),
            ExprKind::Cast { value, to, .. } => self.const_of_expr(unit, *value, *to),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Startup wiring
    // ------------------------------------------------------------------

    /// Emits the deferred global initializers then the startup calls in
    /// front of `main`'s first user statement.
    pub fn gen_startup_wiring(&mut self) {
        let Some((func, block, index)) = self.state.main_preamble else {
            return;
        };
        self.backend.position_at(func, block, index);
        self.cur_func = Some(func);
        self.initializing_globals = true;

        let deferred = std::mem::take(&mut self.state.deferred);
        for init in &deferred {
            self.gen_variable_decl(init.unit, init.decl, false);
        }
        self.state.deferred = deferred;
        self.initializing_globals = false;

        let startup = self.state.startup_functions.clone();
        for startup_func in startup {
            self.backend.build_call(startup_func, Vec::new());
        }

        self.cur_func = None;
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Emits one expression. Lvalue-denoting expressions come back as
    /// addresses; use [`Self::gen_rvalue`] when the value itself is needed.
    fn gen_expression(&mut self, unit: usize, id: ExprId) -> Option<ValueRef> {
        let kind = self.ast_of(unit).expr(id).kind.clone();
        let ty = self.ast_of(unit).expr(id).ty;

        match kind {
            ExprKind::VarDecl { .. } => self.gen_variable_decl(unit, id, true),
            ExprKind::Return { value } => {
                let value = value.map(|value| self.gen_rvalue(unit, value));
                self.backend.build_ret(value);
                None
            }
            ExprKind::IntLit { value, .. } => {
                Some(self.backend.const_int(self.ir_type_of(ty), value))
            }
            ExprKind::FloatLit(value) => {
                Some(self.backend.const_float(IrType::F32, value as f64))
            }
            ExprKind::DoubleLit(value) => Some(self.backend.const_float(IrType::F64, value)),
            ExprKind::CharLit(value) => Some(self.backend.const_int(IrType::I8, value as u64)),
            ExprKind::BoolLit(value) => Some(self.backend.const_int(IrType::I1, value as u64)),
            ExprKind::Null => Some(self.backend.const_null(self.ir_type_of(ty))),
            ExprKind::StrLit(text) => Some(self.gen_string(ty, &text)),
            ExprKind::Ident { .. } => self.gen_ident(unit, id),
            ExprKind::Unary { op, operand } => Some(self.gen_unary(unit, ty, op, operand)),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(unit, id, op, lhs, rhs),
            ExprKind::Cast { to, value, .. } => Some(self.gen_cast(unit, to, value)),
            ExprKind::Call { .. } => self.gen_call_expr(unit, id),
            ExprKind::ArrayAccess { .. } => Some(self.gen_array_access_expr(unit, id)),
            ExprKind::ArrayLit { .. } => Some(self.gen_array_literal(unit, id)),
            ExprKind::DotChain { factors } => self.gen_dot_chain(unit, &factors),
            ExprKind::This => self.this_val,
            ExprKind::If { .. } => {
                self.gen_if(unit, id);
                None
            }
            ExprKind::For {
                decls,
                cond,
                post,
                body,
                ..
            } => {
                self.gen_loop(unit, &decls, cond, &post, &body);
                None
            }
            ExprKind::While { cond, body, .. } => {
                self.gen_loop(unit, &[], cond, &[], &body);
                None
            }
        }
    }

    /// Loads the value out of lvalue-producing expressions.
    fn gen_rvalue(&mut self, unit: usize, id: ExprId) -> ValueRef {
        let value = self
            .gen_expression(unit, id)
            .expect("rvalue positions always produce a value");
        let ir_ty = self.ir_type_of(self.ast_of(unit).expr(id).ty);

        let needs_load = match &self.ast_of(unit).expr(id).kind {
            ExprKind::Ident { .. } | ExprKind::ArrayAccess { .. } => true,
            ExprKind::DotChain { factors } => {
                let last = *factors.last().expect("chains are never empty");
                // Calls already yield rvalues; fields and elements are
                // addresses
                matches!(
                    self.ast_of(unit).expr(last).kind,
                    ExprKind::Ident { .. } | ExprKind::ArrayAccess { .. }
                )
            }
            _ => false,
        };

        if needs_load {
            self.backend.build_load(ir_ty, value)
        } else {
            value
        }
    }

    fn gen_variable_decl(
        &mut self,
        unit: usize,
        id: ExprId,
        allocate: bool,
    ) -> Option<ValueRef> {
        let (var, assignment) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::VarDecl {
                var, assignment, ..
            } => (*var, *assignment),
            _ => return None,
        };

        let var_ty = self.symbols.variable(var).ty;
        if allocate {
            let slot = self.backend.build_alloca(self.ir_type_of(var_ty), None);
            self.symbols.variable_mut(var).slot = VarSlot::Local(slot);
        }

        if let Some(assignment) = assignment {
            self.gen_expression(unit, assignment);
        } else {
            let dims = self.symbols.variable(var).computed_arr_dim_sizes.clone();
            let slot = self.var_addr(var);
            if !dims.is_empty() {
                let block = self.gen_precomputed_array_alloca(var_ty, &dims, 0);
                self.backend.build_store(block, slot);
                self.gen_default_array(var_ty, block, &dims, 0);
            } else if let Some(unique_id) = self.types.module_unique_id(var_ty) {
                if self.initializing_globals {
                    // The constant aggregate covered the literal fields;
                    // only the runtime part remains
                    self.gen_global_module_init(ModuleId::new(unique_id), slot);
                } else {
                    self.gen_default_value(var_ty, slot);
                }
            } else if !self.initializing_globals {
                self.gen_default_value(var_ty, slot);
            }
        }

        Some(self.var_addr(var))
    }

    fn var_addr(&mut self, var: VarId) -> ValueRef {
        match self.symbols.variable(var).slot {
            VarSlot::Local(value) => value,
            VarSlot::Global(global) => self.backend.global_addr(global),
            VarSlot::None => {
                // Fields outside module initialization resolve through this
                let index = self.symbols.variable(var).field_index();
                let this = self.this_val.expect("field access outside member body");
                let module = self.symbols.variable(var).module;
                let strct = self.symbols.module(module).ir_struct.expect("declared");
                self.backend.build_struct_gep(strct, this, index)
            }
        }
    }

    fn gen_default_value(&mut self, ty: TypeId, slot: ValueRef) {
        match self.types.kind(ty) {
            TypeKind::Module { .. } => {
                let ir_ty = self.ir_type_of(ty);
                let size = self.backend.type_size(&ir_ty);
                let len = self.backend.const_int(IrType::I32, size as u64);
                self.backend.build_memset(slot, 0, len);
            }
            TypeKind::Ptr { .. } | TypeKind::Arr { .. } => {
                let null = self.backend.const_null(IrType::I8.ptr_to());
                self.backend.build_store(null, slot);
            }
            TypeKind::Float | TypeKind::Double => {
                let zero = self.backend.const_float(self.ir_type_of(ty), 0.0);
                self.backend.build_store(zero, slot);
            }
            TypeKind::Void => {}
            _ => {
                let zero = self.backend.const_int(self.ir_type_of(ty), 0);
                self.backend.build_store(zero, slot);
            }
        }
    }

    /// Fills the runtime-initialized part of a module-typed global: fields
    /// whose initializers were not literal constants, arrays, and the same
    /// recursively through nested module fields.
    fn gen_global_module_init(&mut self, module: ModuleId, struct_addr: ValueRef) {
        let module_unit = self.symbols.module(module).unit as usize;
        let strct = self.symbols.module(module).ir_struct.expect("declared");
        let field_decls: Vec<ExprId> = self.module_ast(module).fields.clone();

        for decl in field_decls {
            let (var, assignment) = match &self.ast_of(module_unit).expr(decl).kind {
                ExprKind::VarDecl {
                    var, assignment, ..
                } => (*var, *assignment),
                _ => continue,
            };
            let field_ty = self.symbols.variable(var).ty;
            let index = self.symbols.variable(var).field_index();
            let slot = self.backend.build_struct_gep(strct, struct_addr, index);

            match self.types.kind(field_ty) {
                TypeKind::Module { unique_id } if assignment.is_none() => {
                    self.gen_global_module_init(ModuleId::new(unique_id), slot);
                }
                _ => {
                    let literal_scalar = !self.types.is_arr(field_ty)
                        && !self.types.is_module(field_ty)
                        && assignment
                            .map(|a| self.ast_of(module_unit).expr(a).literal_constant)
                            .unwrap_or(true);
                    if literal_scalar {
                        continue;
                    }
                    self.symbols.variable_mut(var).slot = VarSlot::Local(slot);
                    self.gen_variable_decl(module_unit, decl, false);
                    self.symbols.variable_mut(var).slot = VarSlot::None;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Number of leading element slots reserved for the 32-bit length.
    fn header_elems(&self, elem: TypeId) -> u32 {
        let mem_size = self.types.mem_size(elem).max(1);
        if mem_size >= 4 {
            1
        } else {
            4 / mem_size
        }
    }

    /// Allocates a length-prefixed block for `count` elements and stores the
    /// length in the header.
    fn gen_array_alloca(&mut self, elem: TypeId, count: ValueRef) -> ValueRef {
        let elem_ir = self.ir_type_of(elem);
        let header = self.backend.const_int(IrType::I32, self.header_elems(elem) as u64);
        let real = self.backend.build_bin(IrBinOp::Add, count, header);
        let block = self.backend.build_alloca(elem_ir, Some(real));
        // The first four bytes of the block carry the length as a u32
        self.backend.build_store(count, block);
        block
    }

    /// The element region: the block pointer adjusted past the header.
    fn arr_data_ptr(&mut self, elem: TypeId, block: ValueRef) -> ValueRef {
        let elem_ir = self.ir_type_of(elem);
        let offset = self
            .backend
            .const_int(IrType::I32, self.header_elems(elem) as u64);
        self.backend.build_gep(elem_ir, block, offset)
    }

    fn gen_precomputed_array_alloca(&mut self, ty: TypeId, dims: &[u32], depth: usize) -> ValueRef {
        let elem = self.types.elem(ty).expect("sized declarations are arrays");
        let count = self.backend.const_int(IrType::I32, dims[depth] as u64);
        let block = self.gen_array_alloca(elem, count);

        if depth + 1 < dims.len() {
            let data = self.arr_data_ptr(elem, block);
            for index in 0..dims[depth] {
                let inner = self.gen_precomputed_array_alloca(elem, dims, depth + 1);
                let index_val = self.backend.const_int(IrType::I32, index as u64);
                let addr = self
                    .backend
                    .build_gep(self.ir_type_of(elem), data, index_val);
                self.backend.build_store(inner, addr);
            }
        }
        block
    }

    fn gen_default_array(&mut self, ty: TypeId, block: ValueRef, dims: &[u32], depth: usize) {
        let elem = self.types.elem(ty).expect("arrays have elements");
        let data = self.arr_data_ptr(elem, block);

        if depth + 1 == dims.len() {
            let bytes = dims[depth] * self.types.mem_size(elem).max(1);
            let len = self.backend.const_int(IrType::I32, bytes as u64);
            self.backend.build_memset(data, 0, len);
        } else {
            for index in 0..dims[depth] {
                let index_val = self.backend.const_int(IrType::I32, index as u64);
                let addr = self
                    .backend
                    .build_gep(self.ir_type_of(elem), data, index_val);
                let inner = self.backend.build_load(IrType::I8.ptr_to(), addr);
                self.gen_default_array(elem, inner, dims, depth + 1);
            }
        }
    }

    fn gen_array_literal(&mut self, unit: usize, id: ExprId) -> ValueRef {
        let (elements, dim_size) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::ArrayLit { elements, dim_size } => (elements.clone(), *dim_size),
            _ => unreachable!(),
        };
        let ty = self.ast_of(unit).expr(id).ty;
        let elem = self.types.elem(ty).expect("literals carry array types");

        let count = dim_size.unwrap_or(elements.len() as u32).max(elements.len() as u32);
        let count_val = self.backend.const_int(IrType::I32, count as u64);
        let block = self.gen_array_alloca(elem, count_val);
        let data = self.arr_data_ptr(elem, block);

        for (index, &element) in elements.iter().enumerate() {
            let value = self.gen_rvalue(unit, element);
            let index_val = self.backend.const_int(IrType::I32, index as u64);
            let addr = self
                .backend
                .build_gep(self.ir_type_of(elem), data, index_val);
            self.backend.build_store(value, addr);
        }
        block
    }

    fn gen_string(&mut self, ty: TypeId, text: &str) -> ValueRef {
        let elem = match self.types.kind(ty) {
            TypeKind::Arr { elem, .. } | TypeKind::Ptr { elem, .. } => elem,
            _ => TypeTable::CHAR8,
        };
        let count = self.backend.const_int(IrType::I32, text.len() as u64);
        let block = self.gen_array_alloca(elem, count);
        let data = self.arr_data_ptr(elem, block);

        let elem_ir = self.ir_type_of(elem);
        for (index, byte) in text.bytes().enumerate() {
            let value = self.backend.const_int(elem_ir.clone(), byte as u64);
            let index_val = self.backend.const_int(IrType::I32, index as u64);
            let addr = self.backend.build_gep(elem_ir.clone(), data, index_val);
            self.backend.build_store(value, addr);
        }

        // A string pinned to a pointer destination hands over the element
        // region instead of the block
        if self.types.is_ptr(ty) {
            data
        } else {
            block
        }
    }

    fn gen_array_access_expr(&mut self, unit: usize, id: ExprId) -> ValueRef {
        let (ident, indexes) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::ArrayAccess { ident, indexes } => (*ident, indexes.clone()),
            _ => unreachable!(),
        };
        let base = self
            .gen_ident(unit, ident)
            .expect("array accesses start at variables");
        let ident_ty = self.ast_of(unit).expr(ident).ty;
        self.gen_array_access(unit, base, ident_ty, &indexes)
    }

    /// Walks index chains: loads the block pointer at each level, steps past
    /// the header for arrays (pointers have none) and addresses the element.
    fn gen_array_access(
        &mut self,
        unit: usize,
        location: ValueRef,
        ident_ty: TypeId,
        indexes: &[ExprId],
    ) -> ValueRef {
        let mut addr = location;
        let mut ty = ident_ty;

        for &index in indexes {
            let block = self.backend.build_load(IrType::I8.ptr_to(), addr);
            let elem = self.types.elem(ty).expect("checked during analysis");
            let data = if self.types.is_arr(ty) {
                self.arr_data_ptr(elem, block)
            } else {
                block
            };
            let index_val = self.gen_rvalue(unit, index);
            addr = self.backend.build_gep(self.ir_type_of(elem), data, index_val);
            ty = elem;
        }
        addr
    }

    // ------------------------------------------------------------------
    // Identifiers, calls, dot chains
    // ------------------------------------------------------------------

    /// Identifiers come back as addresses: the stack slot, the global, or a
    /// field projection through the implicit `this`.
    fn gen_ident(&mut self, unit: usize, id: ExprId) -> Option<ValueRef> {
        let (sym, references_module) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::Ident {
                sym,
                references_module,
                ..
            } => (*sym, *references_module),
            _ => return None,
        };
        if references_module {
            return None;
        }
        let var = sym.expect("analysis bound every identifier");
        Some(self.var_addr(var))
    }

    fn gen_call_expr(&mut self, unit: usize, id: ExprId) -> Option<ValueRef> {
        let constructed = match &self.ast_of(unit).expr(id).kind {
            ExprKind::Call {
                constructed_module, ..
            } => *constructed_module,
            _ => return None,
        };

        if let Some(module) = constructed {
            // A constructed value with no destination still needs storage
            let ir_ty = {
                let strct = self.symbols.module(module).ir_struct.expect("declared");
                IrType::Struct(strct)
            };
            let slot = self.backend.build_alloca(ir_ty, None);
            return Some(self.gen_var_object(unit, slot, id));
        }

        self.gen_function_call(unit, self.this_val, id)
    }

    fn gen_function_call(
        &mut self,
        unit: usize,
        ptr_to_struct: Option<ValueRef>,
        id: ExprId,
    ) -> Option<ValueRef> {
        let (args, sym) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::Call { args, sym, .. } => (args.clone(), *sym),
            _ => return None,
        };
        let function_id = sym.expect("analysis matched the call");
        let function = self.symbols.function(function_id);
        let func = function.ir_func.expect("declared before bodies");
        let is_member = function.is_member_function();

        let mut values = Vec::with_capacity(args.len() + 1);
        if is_member {
            values.push(ptr_to_struct.expect("member calls carry an instance"));
        }
        for &arg in &args {
            values.push(self.gen_rvalue(unit, arg));
        }

        Some(self.backend.build_call(func, values))
    }

    /// Initializes a module instance in place: field initializers (or their
    /// defaults), then the constructor unless it was assumed.
    fn gen_var_object(&mut self, unit: usize, struct_addr: ValueRef, id: ExprId) -> ValueRef {
        let (module, assumed_default) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::Call {
                constructed_module,
                assumed_default_constructor,
                ..
            } => (
                constructed_module.expect("constructed calls carry a module"),
                *assumed_default_constructor,
            ),
            _ => return struct_addr,
        };

        let module_unit = self.symbols.module(module).unit as usize;
        let strct = self.symbols.module(module).ir_struct.expect("declared");
        let field_decls: Vec<ExprId> = self.module_ast(module).fields.clone();

        for decl in field_decls {
            let ast = self.ast_of(module_unit);
            let (var, assignment) = match &ast.expr(decl).kind {
                ExprKind::VarDecl {
                    var, assignment, ..
                } => (*var, *assignment),
                _ => continue,
            };

            // Globals already embedded literal-constant scalar fields
            if self.initializing_globals {
                let field_ty = self.symbols.variable(var).ty;
                let scalar = !self.types.is_arr(field_ty) && !self.types.is_module(field_ty);
                let literal = assignment
                    .map(|a| self.ast_of(module_unit).expr(a).literal_constant)
                    .unwrap_or(false);
                if scalar && literal {
                    continue;
                }
            }

            let index = self.symbols.variable(var).field_index();
            let slot = self.backend.build_struct_gep(strct, struct_addr, index);
            self.symbols.variable_mut(var).slot = VarSlot::Local(slot);

            if assignment.is_some() {
                self.gen_variable_decl(module_unit, decl, false);
            } else {
                let field_ty = self.symbols.variable(var).ty;
                let dims = self.symbols.variable(var).computed_arr_dim_sizes.clone();
                if !dims.is_empty() {
                    let block = self.gen_precomputed_array_alloca(field_ty, &dims, 0);
                    self.backend.build_store(block, slot);
                    self.gen_default_array(field_ty, block, &dims, 0);
                } else if let Some(unique_id) = self.types.module_unique_id(field_ty) {
                    if self.initializing_globals {
                        self.gen_global_module_init(ModuleId::new(unique_id), slot);
                    } else {
                        self.gen_default_value(field_ty, slot);
                    }
                } else {
                    self.gen_default_value(field_ty, slot);
                }
            }

            self.symbols.variable_mut(var).slot = VarSlot::None;
        }

        if !assumed_default {
            self.gen_function_call(unit, Some(struct_addr), id);
        }
        struct_addr
    }

    fn gen_dot_chain(&mut self, unit: usize, factors: &[ExprId]) -> Option<ValueRef> {
        let mut location: Option<ValueRef> = None;

        for &factor in factors {
            let kind = self.ast_of(unit).expr(factor).kind.clone();
            match kind {
                ExprKind::This => {
                    // Field factors after `this` resolve through the member
                    // pointer on their own
                }
                ExprKind::Ident {
                    sym,
                    is_array_length,
                    references_module,
                    ..
                } => {
                    if is_array_length {
                        let addr = location.expect("length follows an array factor");
                        let block = self.backend.build_load(IrType::I8.ptr_to(), addr);
                        // The block pointer is the address of the u32 length
                        return Some(block);
                    }
                    if references_module {
                        continue;
                    }

                    match location {
                        None => location = self.gen_ident(unit, factor),
                        Some(base) => {
                            let var = sym.expect("bound during analysis");
                            let index = self.symbols.variable(var).field_index();
                            let module = self.symbols.variable(var).module;
                            let strct =
                                self.symbols.module(module).ir_struct.expect("declared");
                            location =
                                Some(self.backend.build_struct_gep(strct, base, index));
                        }
                    }
                }
                ExprKind::ArrayAccess { ident, indexes } => {
                    let ident_ty = self.ast_of(unit).expr(ident).ty;
                    match location {
                        None => {
                            let base = self
                                .gen_ident(unit, ident)
                                .expect("chain heads are variables");
                            location =
                                Some(self.gen_array_access(unit, base, ident_ty, &indexes));
                        }
                        Some(base) => {
                            let var = match self.ast_of(unit).expr(ident).kind {
                                ExprKind::Ident { sym, .. } => sym.expect("bound"),
                                _ => return None,
                            };
                            let index = self.symbols.variable(var).field_index();
                            let module = self.symbols.variable(var).module;
                            let strct =
                                self.symbols.module(module).ir_struct.expect("declared");
                            let field_addr =
                                self.backend.build_struct_gep(strct, base, index);
                            location = Some(self.gen_array_access(
                                unit, field_addr, ident_ty, &indexes,
                            ));
                        }
                    }
                }
                ExprKind::Call { .. } => {
                    location = self.gen_function_call(unit, location.or(self.this_val), factor);
                }
                _ => return None,
            }
        }

        location
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn gen_unary(&mut self, unit: usize, ty: TypeId, op: UnaryOp, operand: ExprId) -> ValueRef {
        match op {
            UnaryOp::Plus => self.gen_rvalue(unit, operand),
            UnaryOp::Neg => {
                let value = self.gen_rvalue(unit, operand);
                if self.types.is_float(ty) {
                    let zero = self.backend.const_float(self.ir_type_of(ty), 0.0);
                    self.backend.build_bin(IrBinOp::FSub, zero, value)
                } else {
                    let zero = self.backend.const_int(self.ir_type_of(ty), 0);
                    self.backend.build_bin(IrBinOp::Sub, zero, value)
                }
            }
            UnaryOp::Not => {
                let value = self.gen_rvalue(unit, operand);
                let one = self.backend.const_int(IrType::I1, 1);
                self.backend.build_bin(IrBinOp::Xor, value, one)
            }
            UnaryOp::AddrOf => self
                .gen_expression(unit, operand)
                .expect("address-of takes lvalues"),
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let addr = self
                    .gen_expression(unit, operand)
                    .expect("operand is an lvalue");
                let ir_ty = self.ir_type_of(ty);
                let value = self.backend.build_load(ir_ty.clone(), addr);
                let one = self.backend.const_int(ir_ty, 1);
                let op = if op == UnaryOp::PreInc {
                    IrBinOp::Add
                } else {
                    IrBinOp::Sub
                };
                let result = self.backend.build_bin(op, value, one);
                self.backend.build_store(result, addr);
                result
            }
        }
    }

    fn gen_binary(
        &mut self,
        unit: usize,
        id: ExprId,
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Option<ValueRef> {
        let ty = self.ast_of(unit).expr(id).ty;

        match op {
            BinOp::Assign => {
                let addr = self
                    .gen_expression(unit, lhs)
                    .expect("assignment targets are lvalues");

                let rhs_constructs = matches!(
                    self.ast_of(unit).expr(rhs).kind,
                    ExprKind::Call {
                        constructed_module: Some(_),
                        ..
                    }
                );
                if rhs_constructs {
                    return Some(self.gen_var_object(unit, addr, rhs));
                }

                let value = self.gen_rvalue(unit, rhs);
                self.backend.build_store(value, addr);
                // Chained assignments reuse the stored value
                Some(value)
            }

            BinOp::And | BinOp::Or => Some(self.gen_short_circuit(unit, op, lhs, rhs)),

            op if op.is_comparison() => {
                let operand_ty = self.ast_of(unit).expr(lhs).ty;
                let lhs_val = self.gen_rvalue(unit, lhs);
                let rhs_val = self.gen_rvalue(unit, rhs);
                let pred = comparison_pred(
                    op,
                    self.types.is_float(operand_ty),
                    self.types.is_signed(operand_ty),
                );
                Some(self.backend.build_cmp(pred, lhs_val, rhs_val))
            }

            _ => {
                let lhs_val = self.gen_rvalue(unit, lhs);
                let rhs_val = self.gen_rvalue(unit, rhs);
                let is_float = self.types.is_float(ty);
                let is_signed = self.types.is_signed(ty);
                let ir_op = arithmetic_op(op, is_float, is_signed);
                Some(self.backend.build_bin(ir_op, lhs_val, rhs_val))
            }
        }
    }

    /// `&&` and `||` evaluate their right side only when it can still
    /// change the answer.
    fn gen_short_circuit(&mut self, unit: usize, op: BinOp, lhs: ExprId, rhs: ExprId) -> ValueRef {
        let func = self.cur_func.expect("expressions live inside functions");
        let result = self.backend.build_alloca(IrType::I1, None);

        let lhs_val = self.gen_rvalue(unit, lhs);
        self.backend.build_store(lhs_val, result);

        let rhs_block = self.backend.create_block(func);
        let merge_block = self.backend.create_block(func);

        match op {
            BinOp::And => self.backend.build_cond_br(lhs_val, rhs_block, merge_block),
            _ => self.backend.build_cond_br(lhs_val, merge_block, rhs_block),
        }

        self.backend.position_at_end(func, rhs_block);
        let rhs_val = self.gen_rvalue(unit, rhs);
        self.backend.build_store(rhs_val, result);
        self.backend.build_br(merge_block);

        self.backend.position_at_end(func, merge_block);
        self.backend.build_load(IrType::I1, result)
    }

    fn gen_cast(&mut self, unit: usize, to: TypeId, value: ExprId) -> ValueRef {
        let from = self.ast_of(unit).expr(value).ty;
        let raw = self.gen_rvalue(unit, value);
        if from == to {
            return raw;
        }

        let to_ir = self.ir_type_of(to);
        let types = self.types;

        // Arrays decay to their element region when cast to pointers
        if types.is_arr(from) && types.is_ptr(to) {
            let elem = types.elem(from).unwrap();
            return self.arr_data_ptr(elem, raw);
        }

        let kind = if types.is_int(from) && types.is_int(to) {
            let from_size = types.mem_size(from);
            let to_size = types.mem_size(to);
            if to_size < from_size {
                CastKind::Trunc
            } else if to_size > from_size {
                if types.is_signed(from) {
                    CastKind::SExt
                } else {
                    CastKind::ZExt
                }
            } else {
                return raw;
            }
        } else if types.is_int(from) && types.is_float(to) {
            if types.is_signed(from) {
                CastKind::SiToFp
            } else {
                CastKind::UiToFp
            }
        } else if types.is_float(from) && types.is_int(to) {
            if types.is_signed(to) {
                CastKind::FpToSi
            } else {
                CastKind::FpToUi
            }
        } else if types.is_float(from) && types.is_float(to) {
            if types.mem_size(to) > types.mem_size(from) {
                CastKind::FpExt
            } else {
                CastKind::FpTrunc
            }
        } else if types.is_int(from) && (types.is_ptr(to) || types.is_arr(to)) {
            CastKind::IntToPtr
        } else if (types.is_ptr(from) || types.is_arr(from)) && types.is_int(to) {
            CastKind::PtrToInt
        } else {
            CastKind::Bitcast
        };

        self.backend.build_cast(kind, to_ir, raw)
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    fn branch_if_not_term(&mut self, target: BlockRef) {
        let func = self.cur_func.expect("inside a function");
        let current = self.backend.current_block();
        if !self.backend.block_is_terminated(func, current) {
            self.backend.build_br(target);
        }
    }

    fn gen_if(&mut self, unit: usize, id: ExprId) {
        let (branches, else_body) = match &self.ast_of(unit).expr(id).kind {
            ExprKind::If {
                branches,
                else_body,
                ..
            } => (branches.clone(), else_body.clone()),
            _ => return,
        };
        let func = self.cur_func.expect("inside a function");
        let finish = self.backend.create_block(func);

        for (index, branch) in branches.iter().enumerate() {
            let body_block = self.backend.create_block(func);
            let last = index + 1 == branches.len();
            let next_block = if !last || !else_body.is_empty() {
                self.backend.create_block(func)
            } else {
                finish
            };

            let cond = self.gen_rvalue(unit, branch.cond);
            self.backend.build_cond_br(cond, body_block, next_block);

            self.backend.position_at_end(func, body_block);
            for &stmt in &branch.body {
                self.gen_expression(unit, stmt);
            }
            self.branch_if_not_term(finish);

            self.backend.position_at_end(func, next_block);
            if last && !else_body.is_empty() {
                for &stmt in &else_body {
                    self.gen_expression(unit, stmt);
                }
                self.branch_if_not_term(finish);
                self.backend.position_at_end(func, finish);
                return;
            }
        }

        // No else: the fall-through block is the finish block
        let current = self.backend.current_block();
        if current != finish {
            self.branch_if_not_term(finish);
            self.backend.position_at_end(func, finish);
        }
    }

    fn gen_loop(
        &mut self,
        unit: usize,
        decls: &[ExprId],
        cond: ExprId,
        post: &[ExprId],
        body: &[ExprId],
    ) {
        let func = self.cur_func.expect("inside a function");

        for &decl in decls {
            self.gen_expression(unit, decl);
        }

        let cond_block = self.backend.create_block(func);
        let body_block = self.backend.create_block(func);
        let finish = self.backend.create_block(func);

        self.backend.build_br(cond_block);
        self.backend.position_at_end(func, cond_block);
        let cond_val = self.gen_rvalue(unit, cond);
        self.backend.build_cond_br(cond_val, body_block, finish);

        self.backend.position_at_end(func, body_block);
        for &stmt in body {
            self.gen_expression(unit, stmt);
        }
        for &expr in post {
            self.gen_expression(unit, expr);
        }
        self.branch_if_not_term(cond_block);

        self.backend.position_at_end(func, finish);
    }
}

fn arithmetic_op(op: BinOp, is_float: bool, is_signed: bool) -> IrBinOp {
    match op {
        BinOp::Add => {
            if is_float {
                IrBinOp::FAdd
            } else {
                IrBinOp::Add
            }
        }
        BinOp::Sub => {
            if is_float {
                IrBinOp::FSub
            } else {
                IrBinOp::Sub
            }
        }
        BinOp::Mul => {
            if is_float {
                IrBinOp::FMul
            } else {
                IrBinOp::Mul
            }
        }
        BinOp::Div => {
            if is_float {
                IrBinOp::FDiv
            } else if is_signed {
                IrBinOp::SDiv
            } else {
                IrBinOp::UDiv
            }
        }
        BinOp::Mod => {
            if is_signed {
                IrBinOp::SRem
            } else {
                IrBinOp::URem
            }
        }
        BinOp::BitAnd => IrBinOp::And,
        BinOp::BitOr => IrBinOp::Or,
        BinOp::BitXor => IrBinOp::Xor,
        BinOp::Shl => IrBinOp::Shl,
        BinOp::Shr => IrBinOp::LShr,
        _ => IrBinOp::Add,
    }
}

fn comparison_pred(op: BinOp, is_float: bool, is_signed: bool) -> CmpPred {
    if is_float {
        return match op {
            BinOp::Lt => CmpPred::FLt,
            BinOp::Gt => CmpPred::FGt,
            BinOp::LtEq => CmpPred::FLe,
            BinOp::GtEq => CmpPred::FGe,
            BinOp::NotEq => CmpPred::FNe,
            _ => CmpPred::FEq,
        };
    }
    if is_signed {
        match op {
            BinOp::Lt => CmpPred::SLt,
            BinOp::Gt => CmpPred::SGt,
            BinOp::LtEq => CmpPred::SLe,
            BinOp::GtEq => CmpPred::SGe,
            BinOp::NotEq => CmpPred::Ne,
            _ => CmpPred::Eq,
        }
    } else {
        match op {
            BinOp::Lt => CmpPred::ULt,
            BinOp::Gt => CmpPred::UGt,
            BinOp::LtEq => CmpPred::ULe,
            BinOp::GtEq => CmpPred::UGe,
            BinOp::NotEq => CmpPred::Ne,
            _ => CmpPred::Eq,
        }
    }
}
