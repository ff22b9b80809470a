use crate::backends::{FuncRef, GlobalRef, StructRef, ValueRef};
use crate::compiler::types::TypeId;
use crate::compiler::words::WordId;
use bitflags::bitflags;
use rustc_hash::FxHashMap;

bitflags! {
    /// Declaration modifiers, parsed in any order before a declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        const STATIC    = 0x01;
        const PRIVATE   = 0x02;
        const PROTECTED = 0x04;
        const PUBLIC    = 0x08;
        const EXTERNAL  = 0x10;
        const CONST     = 0x20;
        const COMPTIME  = 0x40;
    }
}

impl Modifiers {
    pub fn access_mods(self) -> Modifiers {
        self & (Modifiers::PRIVATE | Modifiers::PROTECTED | Modifiers::PUBLIC)
    }
}

/// Identifies a module across the entire program. Two modules with the same
/// source name in different units get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ModuleId {
    pub fn new(id: u32) -> Self {
        ModuleId(id)
    }
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl FunctionId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl VarId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
pub struct ModuleSymbol {
    pub name: WordId,
    pub unique_id: u32,
    pub unit: u32,
    pub mods: Modifiers,
    /// Scope holding the module's fields and globals
    pub scope: ScopeId,
    /// Field variables in declaration order
    pub fields: Vec<VarId>,
    pub globals: Vec<VarId>,
    /// Overload sets grouped by name key, each in declaration order
    pub functions: FxHashMap<WordId, Vec<FunctionId>>,
    pub constructors: Vec<FunctionId>,
    pub no_constructors_declared: bool,
    /// Backend handle for the module's aggregate type
    pub ir_struct: Option<StructRef>,
}

#[derive(Debug)]
pub struct FunctionSymbol {
    pub name: WordId,
    pub module: ModuleId,
    pub mods: Modifiers,
    pub params: Vec<VarId>,
    pub param_types: Vec<TypeId>,
    pub return_type: TypeId,
    pub is_constructor: bool,
    pub is_main: bool,
    pub ir_func: Option<FuncRef>,
}

impl FunctionSymbol {
    /// Member functions take an implicit pointer to the owning module as
    /// their first backend parameter. The program entry is never a member.
    pub fn is_member_function(&self) -> bool {
        !self.mods.contains(Modifiers::STATIC) && !self.is_main
    }

    pub fn is_external(&self) -> bool {
        self.mods.contains(Modifiers::EXTERNAL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRole {
    Field { index: u32 },
    Global,
    Local,
    Param,
}

/// Backend storage slot a variable resolves to during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSlot {
    None,
    Local(ValueRef),
    Global(GlobalRef),
}

#[derive(Debug)]
pub struct VariableSymbol {
    pub name: WordId,
    pub module: ModuleId,
    pub mods: Modifiers,
    pub ty: TypeId,
    pub role: VarRole,
    /// Flat byte offset of the declaring identifier, for the
    /// use-before-declaration check. Fields and globals are exempt.
    pub declared_at: u32,
    /// Filled by analysis when the declaration carries explicit dimension
    /// sizes, outermost dimension first.
    pub computed_arr_dim_sizes: Vec<u32>,
    pub slot: VarSlot,
}

impl VariableSymbol {
    pub fn is_field(&self) -> bool {
        matches!(self.role, VarRole::Field { .. })
    }

    pub fn is_global(&self) -> bool {
        self.role == VarRole::Global
    }

    pub fn field_index(&self) -> u32 {
        match self.role {
            VarRole::Field { index } => index,
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub locals: FxHashMap<WordId, VarId>,
    pub found_return: bool,
}

/// Program-wide symbol storage. Symbols are declared by exactly one unit;
/// everything else holds plain ids into these arenas.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    modules: Vec<ModuleSymbol>,
    functions: Vec<FunctionSymbol>,
    variables: Vec<VariableSymbol>,
    scopes: Vec<Scope>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module, assigning it the next globally unique id.
    pub fn new_module(&mut self, name: WordId, unit: u32, scope: ScopeId) -> ModuleId {
        let unique_id = self.modules.len() as u32;
        self.modules.push(ModuleSymbol {
            name,
            unique_id,
            unit,
            mods: Modifiers::empty(),
            scope,
            fields: Vec::new(),
            globals: Vec::new(),
            functions: FxHashMap::default(),
            constructors: Vec::new(),
            no_constructors_declared: true,
            ir_struct: None,
        });
        ModuleId(unique_id)
    }

    pub fn module(&self, id: ModuleId) -> &ModuleSymbol {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut ModuleSymbol {
        &mut self.modules[id.0 as usize]
    }

    pub fn register_function(&mut self, function: FunctionSymbol) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        let module = function.module;
        let name = function.name;
        let is_constructor = function.is_constructor;
        self.functions.push(function);

        let module = self.module_mut(module);
        if is_constructor {
            module.constructors.push(id);
            module.no_constructors_declared = false;
        } else {
            module.functions.entry(name).or_default().push(id);
        }
        id
    }

    pub fn function(&self, id: FunctionId) -> &FunctionSymbol {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionSymbol {
        &mut self.functions[id.0 as usize]
    }

    /// The overload set for `name` inside `module`, in declaration order.
    pub fn functions_named(&self, module: ModuleId, name: WordId) -> &[FunctionId] {
        self.module(module)
            .functions
            .get(&name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn constructors(&self, module: ModuleId) -> &[FunctionId] {
        &self.module(module).constructors
    }

    pub fn register_variable(&mut self, variable: VariableSymbol) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(variable);
        id
    }

    pub fn variable(&self, id: VarId) -> &VariableSymbol {
        &self.variables[id.0 as usize]
    }

    pub fn variable_mut(&mut self, id: VarId) -> &mut VariableSymbol {
        &mut self.variables[id.0 as usize]
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            locals: FxHashMap::default(),
            found_return: false,
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Declares a variable in a scope. Fails with the already-present
    /// variable when the name is taken in that same scope.
    pub fn declare_in_scope(
        &mut self,
        scope: ScopeId,
        name: WordId,
        var: VarId,
    ) -> Result<(), VarId> {
        let scope = self.scope_mut(scope);
        if let Some(&existing) = scope.locals.get(&name) {
            return Err(existing);
        }
        scope.locals.insert(name, var);
        Ok(())
    }

    /// Looks a variable up starting at `scope` and climbing the parent chain.
    pub fn lookup_variable(&self, scope: ScopeId, name: WordId) -> Option<VarId> {
        let mut current = Some(scope);
        while let Some(scope_id) = current {
            let scope = self.scope(scope_id);
            if let Some(&var) = scope.locals.get(&name) {
                return Some(var);
            }
            current = scope.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::TypeTable;
    use crate::compiler::words::WordTable;

    fn test_variable(name: WordId, module: ModuleId) -> VariableSymbol {
        VariableSymbol {
            name,
            module,
            mods: Modifiers::empty(),
            ty: TypeTable::INT,
            role: VarRole::Local,
            declared_at: 0,
            computed_arr_dim_sizes: Vec::new(),
            slot: VarSlot::None,
        }
    }

    #[test]
    fn scope_lookup_climbs_parents() {
        let mut words = WordTable::new();
        let mut symbols = SymbolRegistry::new();

        let outer = symbols.new_scope(None);
        let inner = symbols.new_scope(Some(outer));
        let module = symbols.new_module(words.intern("M"), 0, outer);

        let name = words.intern("total");
        let var = symbols.register_variable(test_variable(name, module));
        symbols.declare_in_scope(outer, name, var).unwrap();

        assert_eq!(symbols.lookup_variable(inner, name), Some(var));
        assert_eq!(symbols.lookup_variable(outer, name), Some(var));
        assert_eq!(
            symbols.lookup_variable(inner, words.intern("missing")),
            None
        );
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut words = WordTable::new();
        let mut symbols = SymbolRegistry::new();

        let scope = symbols.new_scope(None);
        let module = symbols.new_module(words.intern("M"), 0, scope);
        let name = words.intern("x");

        let first = symbols.register_variable(test_variable(name, module));
        let second = symbols.register_variable(test_variable(name, module));
        symbols.declare_in_scope(scope, name, first).unwrap();
        assert_eq!(symbols.declare_in_scope(scope, name, second), Err(first));
    }

    #[test]
    fn overload_sets_keep_declaration_order() {
        let mut words = WordTable::new();
        let mut symbols = SymbolRegistry::new();

        let scope = symbols.new_scope(None);
        let module = symbols.new_module(words.intern("Math"), 0, scope);
        let name = words.intern("f");

        let make = |symbols: &mut SymbolRegistry, param: TypeId| {
            symbols.register_function(FunctionSymbol {
                name,
                module,
                mods: Modifiers::STATIC,
                params: Vec::new(),
                param_types: vec![param],
                return_type: TypeTable::INT,
                is_constructor: false,
                is_main: false,
                ir_func: None,
            })
        };

        let first = make(&mut symbols, TypeTable::INT);
        let second = make(&mut symbols, TypeTable::DOUBLE);
        assert_eq!(symbols.functions_named(module, name), &[first, second]);
    }
}
