//! The compilation orchestrator: discovers units and drives each through
//! the phase state machine, advancing dependencies to the minimum state a
//! phase needs before entering it.
//!
//! Prerequisites per phase of a unit U, for every import target of U:
//!
//! | Phase of U          | dependency prerequisite |
//! |---------------------|-------------------------|
//! | Parsed              | (none)                  |
//! | ImportsResolved     | Parsed                  |
//! | Analyzed            | ImportsResolved         |
//! | TypeDeclsEmitted    | Analyzed                |
//! | BodyDeclsEmitted    | TypeDeclsEmitted        |
//! | BodiesEmitted       | BodyDeclsEmitted        |
//!
//! Import cycles are tolerated: every phase sets a guard flag at entry, and
//! each dependency-driving loop holds a resumable cursor into the unit's
//! import list, so re-entering a unit that is already advancing through a
//! phase returns immediately.

use crate::backends::IrBackend;
use crate::compiler::ast;
use crate::compiler::compiler_errors::{CompilerError, ErrorKind, ErrorLocation};
use crate::compiler::imports::{self, DependencyExports};
use crate::compiler::lexer::tokenize;
use crate::compiler::lowering::{GenState, Lowering};
use crate::compiler::parser::parse_unit;
use crate::compiler::source_files::{FileLocation, collect_source_files};
use crate::compiler::symbols::{FunctionId, SymbolRegistry};
use crate::compiler::tokens::Keywords;
use crate::compiler::types::TypeTable;
use crate::compiler::unit::{FileUnit, UnitPhase};
use crate::compiler::words::WordTable;
use crate::compiler::{analysis, display_messages};
use crate::settings::{DEFAULT_EXECUTABLE_NAME, DEFAULT_MAIN_PATH};
use crate::timer_log;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// Stage-limit bits compose with the display bits below
pub const COMPFLAG_ONLY_PARSE: u32 = 0x0000;
pub const COMPFLAG_ONLY_PARSE_AND_ANALYZE: u32 = 0x0001;
pub const COMPFLAG_ONLY_GEN_OBJECT: u32 = 0x0002;
pub const COMPFLAGS_FULL_COMPILATION: u32 = 0x0003;
pub const COMPFLAGS_VERBOSE: u32 = 0x0004;
pub const COMPFLAG_DISPLAY_AST: u32 = 0x0008;
pub const COMPFLAG_DISPLAY_STAGES: u32 = 0x0010;
pub const COMPFLAG_DISPLAY_SOURCE_PATHS: u32 = 0x0020;
pub const COMPFLAG_DISPLAY_LLVM_IR: u32 = 0x0040;
pub const COMPFLAG_DISPLAY_TIMES: u32 = 0x0080;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub flags: u32,
    pub executable_name: String,
    /// Internal path of the unit nominated to declare the program entry
    pub main_path: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            flags: COMPFLAGS_FULL_COMPILATION,
            executable_name: DEFAULT_EXECUTABLE_NAME.to_string(),
            main_path: DEFAULT_MAIN_PATH.to_string(),
        }
    }
}

/// One whole-program compilation over a chosen backend.
pub struct Compilation<B: IrBackend> {
    pub words: WordTable,
    pub keywords: Keywords,
    pub types: TypeTable,
    pub symbols: SymbolRegistry,
    pub units: Vec<FileUnit>,
    unit_lookup: FxHashMap<String, usize>,

    backend: B,
    gen_state: GenState,

    flags: u32,
    executable_name: String,
    main_path: String,

    main_function: Option<FunctionId>,
    global_errors: Vec<CompilerError>,
    found_errors: bool,

    total_parse_time: Duration,
    total_gen_time: Duration,
}

impl<B: IrBackend> Compilation<B> {
    pub fn new(backend: B, options: CompileOptions) -> Self {
        let mut words = WordTable::new();
        let keywords = Keywords::install(&mut words);

        let mut flags = options.flags;
        if flags & COMPFLAGS_VERBOSE != 0 {
            flags |= COMPFLAG_DISPLAY_AST
                | COMPFLAG_DISPLAY_STAGES
                | COMPFLAG_DISPLAY_SOURCE_PATHS
                | COMPFLAG_DISPLAY_LLVM_IR;
        }

        Compilation {
            words,
            keywords,
            types: TypeTable::new(),
            symbols: SymbolRegistry::new(),
            units: Vec::new(),
            unit_lookup: FxHashMap::default(),
            backend,
            gen_state: GenState::default(),
            flags,
            executable_name: options.executable_name,
            main_path: options.main_path,
            main_function: None,
            global_errors: Vec::new(),
            found_errors: false,
            total_parse_time: Duration::ZERO,
            total_gen_time: Duration::ZERO,
        }
    }

    fn should_analyze(&self) -> bool {
        (self.flags & COMPFLAGS_FULL_COMPILATION) >= COMPFLAG_ONLY_PARSE_AND_ANALYZE
    }

    fn should_gen_obj_code(&self) -> bool {
        (self.flags & COMPFLAGS_FULL_COMPILATION) >= COMPFLAG_ONLY_GEN_OBJECT
    }

    fn display_stages(&self) -> bool {
        self.flags & COMPFLAG_DISPLAY_STAGES != 0
    }

    pub fn executable_name(&self) -> &str {
        &self.executable_name
    }

    pub fn found_errors(&self) -> bool {
        self.found_errors
    }

    pub fn main_function(&self) -> Option<FunctionId> {
        self.main_function
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Every diagnostic the compilation produced, unit-local and global.
    pub fn all_errors(&self) -> Vec<CompilerError> {
        let mut errors = self.global_errors.clone();
        for unit in &self.units {
            errors.extend(unit.errors.iter().cloned());
        }
        errors
    }

    pub fn print_errors(&self) {
        display_messages::print_errors(&self.all_errors());
    }

    pub fn unit_by_path(&self, internal_path: &str) -> Option<&FileUnit> {
        self.unit_lookup
            .get(internal_path)
            .map(|&index| &self.units[index])
    }

    // ------------------------------------------------------------------
    // Entry
    // ------------------------------------------------------------------

    /// Compiles every source directory. Returns true when no unit failed.
    pub fn compile(&mut self, src_directories: &[PathBuf]) -> bool {
        if !self.discover(src_directories) {
            return false;
        }

        let Some(&main_index) = self.unit_lookup.get(&self.main_path) else {
            self.global_errors.push(CompilerError::new(
                ErrorKind::FileWithMainFunctionDoesNotExist,
                format!(
                    "The file expected to hold the main function does not exist: '{}'",
                    self.main_path
                ),
                ErrorLocation::default(),
            ));
            self.found_errors = true;
            return false;
        };
        self.units[main_index].search_for_main = true;

        // The unit nominated to hold the entry point is processed in full;
        // everything else only needs analysis unless a dependency pulls it
        // further
        self.process_unit(main_index);

        let save_flags = self.flags;
        if self.should_analyze() {
            self.flags =
                (self.flags & !COMPFLAGS_FULL_COMPILATION) | COMPFLAG_ONLY_PARSE_AND_ANALYZE;
        }
        for index in 0..self.units.len() {
            if !self.units[index].started_processing {
                self.process_unit(index);
            }
        }
        self.flags = save_flags;

        if self.main_function.is_none() && self.should_analyze() {
            self.global_errors.push(CompilerError::new(
                ErrorKind::MainFunctionNotFound,
                "No main function was found in the program",
                ErrorLocation::default(),
            ));
            self.found_errors = true;
        }

        if self.found_errors {
            return false;
        }

        if self.should_gen_obj_code() {
            // Deferred global initializers, then StartUp calls, spliced in
            // front of main's first user statement
            let mut lowering = Lowering::new(
                &mut self.backend,
                &self.words,
                &self.keywords,
                &self.types,
                &mut self.symbols,
                &self.units,
                &mut self.gen_state,
            );
            lowering.gen_startup_wiring();
        }

        // Lowering is done with the trees
        for unit in &mut self.units {
            unit.ast = None;
        }

        if self.flags & COMPFLAG_DISPLAY_LLVM_IR != 0 {
            self.backend.display_ir();
        }

        if self.flags & COMPFLAG_DISPLAY_TIMES != 0 {
            println!("-- Compilation times");
            println!("---------------------------");
            println!("Parse time:  {:?}", self.total_parse_time);
            println!("Lowering:    {:?}", self.total_gen_time);
        }

        !self.found_errors
    }

    /// Writes the backend's output artifact for the linker.
    pub fn write_object(&mut self, path: &Path) -> std::io::Result<()> {
        self.backend.write_object(path)
    }

    fn discover(&mut self, src_directories: &[PathBuf]) -> bool {
        let mut source_files: Vec<FileLocation> = Vec::new();
        for directory in src_directories {
            if let Err(e) = collect_source_files(directory, "", &mut source_files) {
                self.global_errors.push(e);
                self.found_errors = true;
                return false;
            }
        }

        for location in source_files {
            if self.flags & COMPFLAG_DISPLAY_SOURCE_PATHS != 0 {
                println!("-- Full path relative to compiler: {}", location.system_path.display());
                println!("-- Internal path: {}", location.internal_path);
            }

            if self.unit_lookup.contains_key(&location.internal_path) {
                self.global_errors.push(CompilerError::file_error(
                    ErrorKind::ConflictingInternalPaths,
                    &location.system_path,
                    format!(
                        "Two source files share the internal path '{}'",
                        location.internal_path
                    ),
                ));
                self.found_errors = true;
                return false;
            }

            let index = self.units.len();
            self.unit_lookup
                .insert(location.internal_path.clone(), index);
            self.units.push(FileUnit::new(
                index,
                location.system_path,
                location.internal_path,
                false,
            ));
        }

        true
    }

    fn set_main_function(&mut self, function: FunctionId) {
        if self.main_function.is_some() {
            self.global_errors.push(CompilerError::new(
                ErrorKind::MultipleMainFunctionsInProgram,
                "The program declares more than one main function",
                ErrorLocation::default(),
            ));
            self.found_errors = true;
            return;
        }
        self.main_function = Some(function);
    }

    fn fail_unit(&mut self, index: usize) {
        self.units[index].mark_failed();
        self.found_errors = true;
    }

    // ------------------------------------------------------------------
    // The per-unit pump
    // ------------------------------------------------------------------

    fn process_unit(&mut self, index: usize) {
        if self.units[index].started_processing {
            return;
        }
        self.units[index].started_processing = true;

        if self.display_stages() {
            println!("-- Processing: {}", self.units[index].system_path.display());
        }

        // Parse
        self.parse_phase(index);
        if self.units[index].failed() {
            self.found_errors = true;
            return;
        }

        // Dependencies parse next so imports can resolve
        self.parse_dependencies(index);

        self.resolve_imports_phase(index);
        if self.units[index].failed() {
            self.found_errors = true;
            return;
        }

        if !self.resolve_dependency_imports(index) {
            self.fail_unit(index);
            return;
        }

        if !self.should_analyze() {
            return;
        }

        self.analyze_phase(index);
        if self.units[index].failed() {
            self.found_errors = true;
            return;
        }

        if !self.analyze_dependencies(index) {
            self.fail_unit(index);
            return;
        }

        if !self.should_gen_obj_code() || self.found_errors {
            return;
        }

        self.gen_type_decls_phase(index);
        self.gen_dependency_type_decls(index);
        self.gen_body_decls_phase(index);
        self.gen_dependency_body_decls(index);
        self.gen_bodies_phase(index);
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    fn parse_phase(&mut self, index: usize) {
        if self.units[index].started_parsing {
            return;
        }
        self.units[index].started_parsing = true;
        let time = Instant::now();

        let source = match std::fs::read_to_string(&self.units[index].system_path) {
            Ok(source) => source,
            Err(e) => {
                let error = CompilerError::file_error(
                    ErrorKind::FailedToReadFile,
                    &self.units[index].system_path,
                    format!("Failed to read source file: {e}"),
                );
                self.units[index].errors.push(error);
                self.fail_unit(index);
                return;
            }
        };

        let (tokens, lex_errors) = tokenize(
            &source,
            &self.units[index].system_path,
            &mut self.words,
            &self.keywords,
        );
        if !lex_errors.is_empty() {
            self.units[index].errors.extend(lex_errors);
            self.fail_unit(index);
            return;
        }

        let unit_path = self.units[index].system_path.clone();
        let parsed = parse_unit(
            tokens,
            index,
            &unit_path,
            &mut self.words,
            &self.keywords,
            &mut self.types,
            &mut self.symbols,
        );
        self.total_parse_time += time.elapsed();
        timer_log!(time, "Parsed in: ");

        let output = match parsed {
            Ok(output) => output,
            Err(e) => {
                self.units[index].errors.push(e);
                self.fail_unit(index);
                return;
            }
        };

        // Import targets must exist before any dependency loop runs
        for import in &output.imports {
            if !self.unit_lookup.contains_key(&import.path) {
                let error = CompilerError::new(
                    ErrorKind::CouldNotFindImport,
                    format!("Import does not name a known source file: '{}'", import.path),
                    import
                        .location
                        .to_error_location(&self.units[index].system_path),
                );
                self.units[index].errors.push(error);
            }
        }
        if !self.units[index].errors.is_empty() {
            self.fail_unit(index);
            return;
        }

        for &candidate in &output.main_candidates {
            self.set_main_function(candidate);
        }

        let unit = &mut self.units[index];
        unit.ast = Some(output.ast);
        unit.imports = output.imports;
        unit.own_modules = output.own_modules;
        unit.advance_to(UnitPhase::Parsed);
    }

    fn parse_dependencies(&mut self, index: usize) {
        loop {
            let cursor = self.units[index].parse_cursor;
            if cursor >= self.units[index].imports.len() {
                return;
            }
            let dep = self.unit_lookup[&self.units[index].imports[cursor].path];
            if !self.units[dep].started_processing {
                self.process_unit(dep);
            }
            let unit = &mut self.units[index];
            if unit.parse_cursor < unit.imports.len() {
                unit.parse_cursor += 1;
            }
        }
    }

    fn resolve_imports_phase(&mut self, index: usize) {
        if self.units[index].started_import_resolution {
            return;
        }
        self.units[index].started_import_resolution = true;

        if self.display_stages() {
            println!(
                "-- Resolving imports: {}",
                self.units[index].system_path.display()
            );
        }

        // Gather each dependency's top-level modules under their names
        let mut per_import = Vec::with_capacity(self.units[index].imports.len());
        for import_index in 0..self.units[index].imports.len() {
            let path = self.units[index].imports[import_index].path.clone();
            let dep = self.unit_lookup[&path];
            let exported: Vec<_> = self.units[dep]
                .own_modules
                .iter()
                .map(|&module| (self.symbols.module(module).name, module))
                .collect();
            per_import.push(exported);
        }

        let clean = imports::resolve_imports(
            &mut self.units[index],
            DependencyExports { per_import },
            &mut self.symbols,
            &mut self.types,
            &self.words,
        ) && imports::resolve_cast_targets(
            &mut self.units[index],
            &mut self.types,
            &self.words,
        );

        if !clean {
            self.fail_unit(index);
            return;
        }
        self.units[index].advance_to(UnitPhase::ImportsResolved);
    }

    fn resolve_dependency_imports(&mut self, index: usize) -> bool {
        loop {
            let cursor = self.units[index].resolve_cursor;
            if cursor >= self.units[index].imports.len() {
                return true;
            }
            let dep = self.unit_lookup[&self.units[index].imports[cursor].path];

            self.ensure_state(dep, UnitPhase::Parsed);
            if self.units[dep].failed() {
                return false;
            }
            self.resolve_imports_phase(dep);
            if self.units[dep].failed() {
                return false;
            }

            let unit = &mut self.units[index];
            if unit.resolve_cursor < unit.imports.len() {
                unit.resolve_cursor += 1;
            }
        }
    }

    fn analyze_phase(&mut self, index: usize) {
        if self.units[index].started_analysis {
            return;
        }
        self.units[index].started_analysis = true;

        if self.display_stages() {
            println!("-- Analyzing: {}", self.units[index].system_path.display());
        }

        let clean = analysis::analyze_unit(
            &mut self.units[index],
            &self.words,
            &self.keywords,
            &mut self.types,
            &mut self.symbols,
            &self.backend,
        );
        if !clean {
            self.fail_unit(index);
            return;
        }

        if self.flags & COMPFLAG_DISPLAY_AST != 0 {
            if let Some(unit_ast) = &self.units[index].ast {
                ast::dump_unit(unit_ast, &self.words, &self.types);
            }
        }

        self.units[index].advance_to(UnitPhase::Analyzed);
    }

    fn analyze_dependencies(&mut self, index: usize) -> bool {
        loop {
            let cursor = self.units[index].analyze_cursor;
            if cursor >= self.units[index].imports.len() {
                return true;
            }
            let dep = self.unit_lookup[&self.units[index].imports[cursor].path];

            if self.units[dep].failed() {
                return false;
            }
            self.ensure_state(dep, UnitPhase::ImportsResolved);
            self.analyze_phase(dep);
            if self.units[dep].failed() {
                return false;
            }

            let unit = &mut self.units[index];
            if unit.analyze_cursor < unit.imports.len() {
                unit.analyze_cursor += 1;
            }
        }
    }

    fn with_lowering<R>(&mut self, f: impl FnOnce(&mut Lowering<'_, B>) -> R) -> R {
        let mut lowering = Lowering::new(
            &mut self.backend,
            &self.words,
            &self.keywords,
            &self.types,
            &mut self.symbols,
            &self.units,
            &mut self.gen_state,
        );
        f(&mut lowering)
    }

    fn gen_type_decls_phase(&mut self, index: usize) {
        if self.units[index].started_type_decl_emission {
            return;
        }
        self.units[index].started_type_decl_emission = true;

        if self.display_stages() {
            println!("-- Gen module decls: {}", self.units[index].system_path.display());
        }

        self.with_lowering(|lowering| lowering.gen_type_declarations(index));
        self.units[index].advance_to(UnitPhase::TypeDeclsEmitted);
    }

    fn gen_dependency_type_decls(&mut self, index: usize) {
        loop {
            let cursor = self.units[index].type_decl_cursor;
            if cursor >= self.units[index].imports.len() {
                return;
            }
            let dep = self.unit_lookup[&self.units[index].imports[cursor].path];

            self.ensure_state(dep, UnitPhase::Analyzed);
            self.gen_type_decls_phase(dep);

            let unit = &mut self.units[index];
            if unit.type_decl_cursor < unit.imports.len() {
                unit.type_decl_cursor += 1;
            }
        }
    }

    fn gen_body_decls_phase(&mut self, index: usize) {
        if self.units[index].started_body_decl_emission {
            return;
        }
        self.units[index].started_body_decl_emission = true;

        if self.display_stages() {
            println!(
                "-- Gen function decls: {}",
                self.units[index].system_path.display()
            );
        }

        self.with_lowering(|lowering| lowering.gen_body_declarations(index));
        self.units[index].advance_to(UnitPhase::BodyDeclsEmitted);
    }

    fn gen_dependency_body_decls(&mut self, index: usize) {
        loop {
            let cursor = self.units[index].body_decl_cursor;
            if cursor >= self.units[index].imports.len() {
                return;
            }
            let dep = self.unit_lookup[&self.units[index].imports[cursor].path];

            self.ensure_state(dep, UnitPhase::TypeDeclsEmitted);
            self.gen_body_decls_phase(dep);

            let unit = &mut self.units[index];
            if unit.body_decl_cursor < unit.imports.len() {
                unit.body_decl_cursor += 1;
            }
        }
    }

    fn gen_bodies_phase(&mut self, index: usize) {
        if self.units[index].started_body_emission {
            return;
        }
        self.units[index].started_body_emission = true;

        let time = Instant::now();
        self.with_lowering(|lowering| lowering.gen_unit(index));
        self.total_gen_time += time.elapsed();

        self.units[index].advance_to(UnitPhase::BodiesEmitted);
    }

    /// Advances a dependency's own dependencies far enough for `state`.
    fn ensure_state(&mut self, dep: usize, state: UnitPhase) {
        self.parse_dependencies(dep);
        if state < UnitPhase::ImportsResolved {
            return;
        }
        self.resolve_dependency_imports(dep);
        if state < UnitPhase::Analyzed {
            return;
        }
        self.analyze_dependencies(dep);
        if state < UnitPhase::TypeDeclsEmitted {
            return;
        }
        self.gen_dependency_type_decls(dep);
        if state < UnitPhase::BodyDeclsEmitted {
            return;
        }
        self.gen_dependency_body_decls(dep);
    }
}
