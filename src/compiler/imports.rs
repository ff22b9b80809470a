//! Import resolution: runs after parsing, before analysis.
//!
//! Loads the dependency units' top-level module symbols into this unit's
//! `loaded_modules` under their locally visible names, then replaces every
//! forward-declared module type the parser produced with the concrete module
//! type. Types stay canonical because replacement goes back through the type
//! table.

use crate::compiler::ast::{ExprKind, UnitAst};
use crate::compiler::compiler_errors::{CompilerError, ErrorKind};
use crate::compiler::symbols::{ModuleId, SymbolRegistry};
use crate::compiler::tokens::TextLocation;
use crate::compiler::types::TypeTable;
use crate::compiler::unit::FileUnit;
use crate::compiler::words::{WordId, WordTable};

/// The dependency module lists this unit imports from, keyed the same way as
/// the unit's import vector.
pub struct DependencyExports {
    /// `(name, module)` pairs of each dependency's top-level modules, in the
    /// order of this unit's imports
    pub per_import: Vec<Vec<(WordId, ModuleId)>>,
}

/// Fills `loaded_modules` and rewrites forward-declared types. Appends any
/// resolution errors to the unit's diagnostics and reports whether the unit
/// is still clean.
pub fn resolve_imports(
    unit: &mut FileUnit,
    exports: DependencyExports,
    symbols: &mut SymbolRegistry,
    types: &mut TypeTable,
    words: &WordTable,
) -> bool {
    // The unit's own modules are visible first; imports layer on top
    for &module in &unit.own_modules {
        let name = symbols.module(module).name;
        unit.loaded_modules.insert(name, module);
    }

    let mut errors: Vec<CompilerError> = Vec::new();

    for (import, exported) in unit.imports.iter().zip(exports.per_import) {
        if import.aliases.is_empty() {
            for (name, module) in exported {
                unit.loaded_modules.insert(name, module);
            }
            continue;
        }

        for &(local, remote) in &import.aliases {
            match exported.iter().find(|(name, _)| *name == remote) {
                Some(&(_, module)) => {
                    unit.loaded_modules.insert(local, module);
                }
                None => {
                    errors.push(CompilerError::new(
                        ErrorKind::CouldNotFindModuleType,
                        format!(
                            "Module '{}' does not exist in '{}'",
                            words.resolve(remote),
                            import.path
                        ),
                        import.location.to_error_location(&unit.system_path),
                    ));
                }
            }
        }
    }

    // With the visible-name map complete, rewrite every type the parser
    // left forward-declared
    if let Some(ast) = unit.ast.take() {
        substitute_unit_types(unit, &ast, symbols, types, words, &mut errors);
        unit.ast = Some(ast);
    }

    let clean = errors.is_empty();
    unit.errors.extend(errors);
    clean
}

fn substitute_unit_types(
    unit: &FileUnit,
    ast: &UnitAst,
    symbols: &mut SymbolRegistry,
    types: &mut TypeTable,
    words: &WordTable,
    errors: &mut Vec<CompilerError>,
) {
    let mut report = |name: WordId, loc: TextLocation, errors: &mut Vec<CompilerError>| {
        errors.push(CompilerError::new(
            ErrorKind::CouldNotFindModuleType,
            format!("Could not find module type '{}'", words.resolve(name)),
            loc.to_error_location(&unit.system_path),
        ));
    };

    // Every variable declaration in the tree, fields and locals alike,
    // carries its declared type on the symbol
    for expr in &ast.exprs {
        if let ExprKind::VarDecl { var, .. } = &expr.kind {
            let ty = symbols.variable(*var).ty;
            match types.resolve_fd(ty, &unit.loaded_modules) {
                Ok(resolved) => symbols.variable_mut(*var).ty = resolved,
                Err(name) => report(name, expr.loc, errors),
            }
        }
    }

    // Function signatures: parameters and return types
    for module_ast in &ast.modules {
        for function_ast in module_ast.constructors.iter().chain(&module_ast.functions) {
            let function = symbols.function(function_ast.sym);
            let params = function.params.clone();
            let return_type = function.return_type;

            for param in params {
                let ty = symbols.variable(param).ty;
                match types.resolve_fd(ty, &unit.loaded_modules) {
                    Ok(resolved) => {
                        symbols.variable_mut(param).ty = resolved;
                    }
                    Err(name) => report(name, function_ast.loc, errors),
                }
            }

            match types.resolve_fd(return_type, &unit.loaded_modules) {
                Ok(resolved) => symbols.function_mut(function_ast.sym).return_type = resolved,
                Err(name) => report(name, function_ast.loc, errors),
            }

            // Rebuild the signature's parameter type list from the now
            // resolved parameter symbols
            let function = symbols.function(function_ast.sym);
            let param_types: Vec<_> = function
                .params
                .iter()
                .map(|&param| symbols.variable(param).ty)
                .collect();
            symbols.function_mut(function_ast.sym).param_types = param_types;
        }
    }
}

/// Rewrites explicit cast target types in place. Runs with mutable AST
/// access right after [`resolve_imports`].
pub fn resolve_cast_targets(
    unit: &mut FileUnit,
    types: &mut TypeTable,
    words: &WordTable,
) -> bool {
    let Some(mut ast) = unit.ast.take() else {
        return true;
    };

    let mut errors = Vec::new();
    for expr in &mut ast.exprs {
        if let ExprKind::Cast { to, .. } = &mut expr.kind {
            match types.resolve_fd(*to, &unit.loaded_modules) {
                Ok(resolved) => *to = resolved,
                Err(name) => {
                    errors.push(CompilerError::new(
                        ErrorKind::CouldNotFindModuleType,
                        format!("Could not find module type '{}'", words.resolve(name)),
                        expr.loc.to_error_location(&unit.system_path),
                    ));
                }
            }
        }
    }

    unit.ast = Some(ast);
    let clean = errors.is_empty();
    unit.errors.extend(errors);
    clean
}
