use crate::compiler::ast::UnitAst;
use crate::compiler::compiler_errors::CompilerError;
use crate::compiler::symbols::ModuleId;
use crate::compiler::tokens::TextLocation;
use crate::compiler::words::WordId;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Where a unit is in the pipeline. `Failed` is absorbing: once a unit (or a
/// dependency it needs) raises an error it never advances again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitPhase {
    Discovered,
    Parsed,
    ImportsResolved,
    Analyzed,
    TypeDeclsEmitted,
    BodyDeclsEmitted,
    BodiesEmitted,
    Failed,
}

/// One `import` statement: the internal path of the dependency unit plus the
/// modules pulled in. An empty alias list imports every top-level module of
/// the dependency under its own name.
#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    /// `(local_name, remote_name)` pairs when the import names specific
    /// modules
    pub aliases: Vec<(WordId, WordId)>,
    pub location: TextLocation,
}

/// Per-unit symbol table and pipeline state.
///
/// The `started_*` flags are the re-entrancy guards of the phase machine: a
/// phase is initiated at most once per unit, and re-entering a unit that is
/// mid-phase returns immediately, which is what makes import cycles safe.
/// The `*_cursor` fields are the resumable positions in the unit's import
/// list for each dependency-driving loop.
#[derive(Debug)]
pub struct FileUnit {
    pub index: usize,
    pub system_path: PathBuf,
    pub internal_path: String,
    /// True for the unit nominated to declare the program entry
    pub search_for_main: bool,

    pub phase: UnitPhase,
    pub started_processing: bool,
    pub started_parsing: bool,
    pub started_import_resolution: bool,
    pub started_analysis: bool,
    pub started_type_decl_emission: bool,
    pub started_body_decl_emission: bool,
    pub started_body_emission: bool,

    pub parse_cursor: usize,
    pub resolve_cursor: usize,
    pub analyze_cursor: usize,
    pub type_decl_cursor: usize,
    pub body_decl_cursor: usize,

    pub imports: Vec<Import>,
    /// This unit's own modules plus every import under its visible name.
    /// Doubles as the forward-declared-type resolution map.
    pub loaded_modules: FxHashMap<WordId, ModuleId>,
    pub own_modules: Vec<ModuleId>,

    pub ast: Option<UnitAst>,
    pub errors: Vec<CompilerError>,
}

impl FileUnit {
    pub fn new(
        index: usize,
        system_path: PathBuf,
        internal_path: String,
        search_for_main: bool,
    ) -> Self {
        FileUnit {
            index,
            system_path,
            internal_path,
            search_for_main,
            phase: UnitPhase::Discovered,
            started_processing: false,
            started_parsing: false,
            started_import_resolution: false,
            started_analysis: false,
            started_type_decl_emission: false,
            started_body_decl_emission: false,
            started_body_emission: false,
            parse_cursor: 0,
            resolve_cursor: 0,
            analyze_cursor: 0,
            type_decl_cursor: 0,
            body_decl_cursor: 0,
            imports: Vec::new(),
            loaded_modules: FxHashMap::default(),
            own_modules: Vec::new(),
            ast: None,
            errors: Vec::new(),
        }
    }

    pub fn failed(&self) -> bool {
        self.phase == UnitPhase::Failed
    }

    pub fn mark_failed(&mut self) {
        self.phase = UnitPhase::Failed;
    }

    /// Advances the phase unless the unit already failed.
    pub fn advance_to(&mut self, phase: UnitPhase) {
        if !self.failed() {
            self.phase = phase;
        }
    }
}
