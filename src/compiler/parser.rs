use crate::compiler::ast::{BinOp, ExprId, ExprKind, FunctionAst, IfBranch, ModuleAst, UnaryOp, UnitAst};
use crate::compiler::compiler_errors::CompilerError;
use crate::compiler::symbols::{
    FunctionId, FunctionSymbol, Modifiers, ModuleId, ScopeId, SymbolRegistry, VarId, VarRole,
    VarSlot, VariableSymbol,
};
use crate::compiler::tokens::{Keyword, Keywords, TextLocation, Token, TokenKind};
use crate::compiler::types::{TypeId, TypeTable};
use crate::compiler::unit::Import;
use crate::compiler::words::{WordId, WordTable};
use crate::return_syntax_error;
use std::path::Path;

#[derive(Debug)]
pub struct ParseOutput {
    pub ast: UnitAst,
    pub imports: Vec<Import>,
    pub own_modules: Vec<ModuleId>,
    /// Functions named `main`, reported to the orchestrator for entry-point
    /// bookkeeping
    pub main_candidates: Vec<FunctionId>,
}

/// Parses one unit's token stream, registering its symbols as it goes.
pub fn parse_unit(
    tokens: Vec<Token>,
    unit_index: usize,
    path: &Path,
    words: &mut WordTable,
    keywords: &Keywords,
    types: &mut TypeTable,
    symbols: &mut SymbolRegistry,
) -> Result<ParseOutput, CompilerError> {
    let mut ast = UnitAst::default();
    ast.exprs
        .reserve(tokens.len() / crate::settings::TOKEN_TO_NODE_RATIO);

    let mut parser = Parser {
        tokens,
        pos: 0,
        unit_index,
        path,
        words,
        keywords,
        types,
        symbols,
        ast,
        imports: Vec::new(),
        own_modules: Vec::new(),
        main_candidates: Vec::new(),
        current_module: None,
        scope_stack: Vec::new(),
    };
    parser.parse_file()?;

    Ok(ParseOutput {
        ast: parser.ast,
        imports: parser.imports,
        own_modules: parser.own_modules,
        main_candidates: parser.main_candidates,
    })
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    unit_index: usize,
    path: &'a Path,
    words: &'a mut WordTable,
    keywords: &'a Keywords,
    types: &'a mut TypeTable,
    symbols: &'a mut SymbolRegistry,

    ast: UnitAst,
    imports: Vec<Import>,
    own_modules: Vec<ModuleId>,
    main_candidates: Vec<FunctionId>,

    current_module: Option<ModuleId>,
    scope_stack: Vec<ScopeId>,
}

/// The type spelled at the head of a declaration, along with any explicit
/// array dimension size expressions (outermost dimension first) and the
/// module name when the base type was a not-yet-resolved module reference.
struct ParsedType {
    ty: TypeId,
    dim_sizes: Vec<Option<ExprId>>,
    module_name: Option<WordId>,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn loc(&self) -> TextLocation {
        self.current().location
    }

    fn peek_kind(&self, ahead: usize) -> &TokenKind {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn next(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.kind() == kind {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompilerError> {
        if self.kind() == &kind {
            Ok(self.next())
        } else {
            let found = self.kind().describe(self.words);
            let expected = kind.describe(self.words);
            return_syntax_error!(
                ExpectedToken,
                format!("Expected '{expected}' but found '{found}'"),
                self.loc().to_error_location(self.path)
            );
        }
    }

    fn expect_ident(&mut self) -> Result<(WordId, TextLocation), CompilerError> {
        match self.kind().clone() {
            TokenKind::Ident(word) => {
                let location = self.loc();
                self.next();
                Ok((word, location))
            }
            other => {
                let found = other.describe(self.words);
                return_syntax_error!(
                    ExpectedIdentifier,
                    format!("Expected an identifier but found '{found}'"),
                    self.loc().to_error_location(self.path)
                );
            }
        }
    }

    fn scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack is never empty here")
    }

    fn module(&self) -> ModuleId {
        self.current_module.expect("inside a module")
    }

    // ---------------------------------------------------------------------
    // File level
    // ---------------------------------------------------------------------

    fn parse_file(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.kind() {
                TokenKind::Keyword(Keyword::Import) => self.parse_import()?,
                TokenKind::Keyword(Keyword::Module) => self.parse_module()?,
                TokenKind::Eof => return Ok(()),
                other => {
                    let found = other.describe(self.words);
                    return_syntax_error!(
                        ExpectedStmt,
                        format!("Expected 'module' or 'import' but found '{found}'"),
                        self.loc().to_error_location(self.path)
                    );
                }
            }
        }
    }

    /// `import a.b.c;` or `import a.b.c { Local = Remote, Other };`
    fn parse_import(&mut self) -> Result<(), CompilerError> {
        let start = self.loc();
        self.next(); // import

        let (first, _) = self.expect_ident()?;
        let mut path = self.words.resolve(first).to_string();
        while self.eat(&TokenKind::Dot) {
            let (segment, _) = self.expect_ident()?;
            path.push('/');
            path.push_str(self.words.resolve(segment));
        }

        let mut aliases = Vec::new();
        if self.eat(&TokenKind::LBrace) {
            loop {
                let (local, _) = self.expect_ident()?;
                let remote = if self.eat(&TokenKind::Assign) {
                    let (remote, _) = self.expect_ident()?;
                    remote
                } else {
                    local
                };
                aliases.push((local, remote));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
        }

        self.expect(TokenKind::Semicolon)?;
        self.imports.push(Import {
            path,
            aliases,
            location: start,
        });
        Ok(())
    }

    fn parse_module(&mut self) -> Result<(), CompilerError> {
        let start = self.loc();
        self.next(); // module
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let scope = self.symbols.new_scope(None);
        let module = self
            .symbols
            .new_module(name, self.unit_index as u32, scope);
        self.own_modules.push(module);
        self.current_module = Some(module);
        self.scope_stack.push(scope);

        let mut module_ast = ModuleAst {
            sym: module,
            name,
            loc: start,
            fields: Vec::new(),
            globals: Vec::new(),
            constructors: Vec::new(),
            functions: Vec::new(),
        };

        while !self.eat(&TokenKind::RBrace) {
            self.parse_module_member(&mut module_ast)?;
        }

        self.scope_stack.pop();
        self.current_module = None;
        self.ast.modules.push(module_ast);
        Ok(())
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut mods = Modifiers::empty();
        loop {
            let flag = match self.kind() {
                TokenKind::Keyword(Keyword::Static) => Modifiers::STATIC,
                TokenKind::Keyword(Keyword::Private) => Modifiers::PRIVATE,
                TokenKind::Keyword(Keyword::Protected) => Modifiers::PROTECTED,
                TokenKind::Keyword(Keyword::Public) => Modifiers::PUBLIC,
                TokenKind::Keyword(Keyword::External) => Modifiers::EXTERNAL,
                TokenKind::Keyword(Keyword::Const) => Modifiers::CONST,
                TokenKind::Keyword(Keyword::Comptime) => Modifiers::COMPTIME,
                _ => return mods,
            };
            mods |= flag;
            self.next();
        }
    }

    fn parse_module_member(&mut self, module_ast: &mut ModuleAst) -> Result<(), CompilerError> {
        let mods = self.parse_modifiers();

        // A constructor looks like the module name followed directly by a
        // parameter list
        if let TokenKind::Ident(name) = *self.kind() {
            if name == module_ast.name && self.peek_kind(1) == &TokenKind::LParen {
                let constructor = self.parse_function(name, TypeTable::VOID, mods, true)?;
                module_ast.constructors.push(constructor);
                return Ok(());
            }
        }

        let parsed = self.parse_type()?;
        let (name, name_loc) = self.expect_ident()?;

        if self.kind() == &TokenKind::LParen && parsed.dim_sizes.is_empty() {
            // Module-typed declarations with constructor arguments also look
            // like `Type name(...)`, but members that are functions always
            // have a body or semicolon after the parameter list, so functions
            // win here and constructor-style declarations live in statements.
            let function = self.parse_function(name, parsed.ty, mods, false)?;
            module_ast.functions.push(function);
            return Ok(());
        }

        // Field or global declaration list
        let decls = self.parse_variable_decl_list(parsed, name, name_loc, mods, true)?;
        if mods.contains(Modifiers::STATIC) {
            module_ast.globals.extend(decls);
        } else {
            module_ast.fields.extend(decls);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------

    fn primitive_type(keyword: Keyword) -> Option<TypeId> {
        Some(match keyword {
            Keyword::Byte => TypeTable::BYTE,
            Keyword::Short => TypeTable::SHORT,
            Keyword::Int => TypeTable::INT,
            Keyword::Long => TypeTable::LONG,
            Keyword::UByte => TypeTable::UBYTE,
            Keyword::UShort => TypeTable::USHORT,
            Keyword::UInt => TypeTable::UINT,
            Keyword::ULong => TypeTable::ULONG,
            Keyword::Float => TypeTable::FLOAT,
            Keyword::Double => TypeTable::DOUBLE,
            Keyword::Bool => TypeTable::BOOL,
            Keyword::Void => TypeTable::VOID,
            Keyword::Char => TypeTable::CHAR8,
            Keyword::Char16 => TypeTable::CHAR16,
            Keyword::Char32 => TypeTable::CHAR32,
            _ => return None,
        })
    }

    fn parse_type(&mut self) -> Result<ParsedType, CompilerError> {
        let (mut ty, module_name) = match self.kind().clone() {
            TokenKind::Keyword(keyword) => match Self::primitive_type(keyword) {
                Some(ty) => {
                    self.next();
                    (ty, None)
                }
                None => {
                    let found = self.kind().describe(self.words);
                    return_syntax_error!(
                        ExpectedToken,
                        format!("Expected a type but found '{found}'"),
                        self.loc().to_error_location(self.path)
                    );
                }
            },
            TokenKind::Ident(name) => {
                self.next();
                (self.types.fd_module(name), Some(name))
            }
            other => {
                let found = other.describe(self.words);
                return_syntax_error!(
                    ExpectedToken,
                    format!("Expected a type but found '{found}'"),
                    self.loc().to_error_location(self.path)
                );
            }
        };

        while self.eat(&TokenKind::Star) {
            ty = self.types.ptr_to(ty);
        }

        let mut dim_sizes = Vec::new();
        while self.eat(&TokenKind::LBracket) {
            if self.eat(&TokenKind::RBracket) {
                dim_sizes.push(None);
            } else {
                let size = self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                dim_sizes.push(Some(size));
            }
        }
        for _ in &dim_sizes {
            ty = self.types.arr_of(ty);
        }

        Ok(ParsedType {
            ty,
            dim_sizes,
            module_name,
        })
    }

    /// True when the tokens from the current position spell the head of a
    /// variable declaration: a type followed by an identifier.
    fn looks_like_decl(&self) -> bool {
        let mut index = self.pos;
        match &self.tokens[index].kind {
            TokenKind::Keyword(keyword) => {
                if Self::primitive_type(*keyword).is_none() {
                    return false;
                }
            }
            TokenKind::Ident(_) => {}
            _ => return false,
        }
        index += 1;

        while self.tokens.get(index).map(|t| &t.kind) == Some(&TokenKind::Star) {
            index += 1;
        }
        while self.tokens.get(index).map(|t| &t.kind) == Some(&TokenKind::LBracket) {
            let mut depth = 1;
            index += 1;
            while depth > 0 {
                match self.tokens.get(index).map(|t| &t.kind) {
                    Some(TokenKind::LBracket) => depth += 1,
                    Some(TokenKind::RBracket) => depth -= 1,
                    Some(TokenKind::Eof) | None => return false,
                    _ => {}
                }
                index += 1;
            }
        }

        matches!(
            self.tokens.get(index).map(|t| &t.kind),
            Some(TokenKind::Ident(_))
        )
    }

    // ---------------------------------------------------------------------
    // Functions
    // ---------------------------------------------------------------------

    fn parse_function(
        &mut self,
        name: WordId,
        return_type: TypeId,
        mods: Modifiers,
        is_constructor: bool,
    ) -> Result<FunctionAst, CompilerError> {
        let loc = self.loc();
        if is_constructor {
            self.next(); // the module name
        }
        self.expect(TokenKind::LParen)?;

        let module = self.module();
        let module_scope = self.symbols.module(module).scope;
        let scope = self.symbols.new_scope(Some(module_scope));
        self.scope_stack.push(scope);

        let mut params = Vec::new();
        let mut param_types = Vec::new();
        while self.kind() != &TokenKind::RParen {
            if !params.is_empty() {
                self.expect(TokenKind::Comma)?;
            }
            let parsed = self.parse_type()?;
            let (param_name, param_loc) = self.expect_ident()?;
            let var = self.symbols.register_variable(VariableSymbol {
                name: param_name,
                module,
                mods: Modifiers::empty(),
                ty: parsed.ty,
                role: VarRole::Param,
                declared_at: param_loc.offset,
                computed_arr_dim_sizes: Vec::new(),
                slot: VarSlot::None,
            });
            self.declare(scope, param_name, var, param_loc)?;
            params.push(var);
            param_types.push(parsed.ty);
        }
        self.expect(TokenKind::RParen)?;

        let is_main = !is_constructor && name == self.keywords.main;
        let function = self.symbols.register_function(FunctionSymbol {
            name,
            module,
            mods,
            params,
            param_types,
            return_type,
            is_constructor,
            is_main,
            ir_func: None,
        });
        if is_main {
            self.main_candidates.push(function);
        }

        let mut body = Vec::new();
        if mods.contains(Modifiers::EXTERNAL) {
            self.expect(TokenKind::Semicolon)?;
        } else {
            self.expect(TokenKind::LBrace)?;
            while !self.eat(&TokenKind::RBrace) {
                self.parse_stmt(&mut body)?;
            }
        }

        self.scope_stack.pop();
        Ok(FunctionAst {
            sym: function,
            scope,
            body,
            loc,
        })
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_stmt(&mut self, out: &mut Vec<ExprId>) -> Result<(), CompilerError> {
        match self.kind() {
            TokenKind::Keyword(Keyword::Return) => {
                let loc = self.loc();
                self.next();
                let value = if self.kind() == &TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenKind::Semicolon)?;
                out.push(self.ast.alloc(ExprKind::Return { value }, loc));
                Ok(())
            }
            TokenKind::Keyword(Keyword::If) => {
                let stmt = self.parse_if()?;
                out.push(stmt);
                Ok(())
            }
            TokenKind::Keyword(Keyword::For) => {
                let stmt = self.parse_for()?;
                out.push(stmt);
                Ok(())
            }
            TokenKind::Keyword(Keyword::While) => {
                let stmt = self.parse_while()?;
                out.push(stmt);
                Ok(())
            }
            TokenKind::Semicolon => {
                self.next();
                Ok(())
            }
            _ if self.looks_like_decl() => {
                let parsed = self.parse_type()?;
                let (name, name_loc) = self.expect_ident()?;
                let decls =
                    self.parse_variable_decl_list(parsed, name, name_loc, Modifiers::empty(), false)?;
                out.extend(decls);
                Ok(())
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semicolon)?;
                out.push(expr);
                Ok(())
            }
        }
    }

    /// Parses the rest of `type name (= expr)? (, name (= expr)?)* ;` given
    /// the first name. Also handles the constructor-argument form
    /// `Mod m(args)` for module typed declarations.
    fn parse_variable_decl_list(
        &mut self,
        parsed: ParsedType,
        first_name: WordId,
        first_loc: TextLocation,
        mods: Modifiers,
        in_module_body: bool,
    ) -> Result<Vec<ExprId>, CompilerError> {
        let mut decls = Vec::new();
        let mut name = first_name;
        let mut name_loc = first_loc;

        loop {
            let decl =
                self.parse_single_decl(&parsed, name, name_loc, mods, in_module_body)?;
            decls.push(decl);

            if self.eat(&TokenKind::Comma) {
                let (next_name, next_loc) = self.expect_ident()?;
                name = next_name;
                name_loc = next_loc;
            } else {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(decls)
    }

    fn parse_single_decl(
        &mut self,
        parsed: &ParsedType,
        name: WordId,
        name_loc: TextLocation,
        mods: Modifiers,
        in_module_body: bool,
    ) -> Result<ExprId, CompilerError> {
        let module = self.module();
        let role = if !in_module_body {
            VarRole::Local
        } else if mods.contains(Modifiers::STATIC) {
            VarRole::Global
        } else {
            let index = self.symbols.module(module).fields.len() as u32;
            VarRole::Field { index }
        };

        let var = self.symbols.register_variable(VariableSymbol {
            name,
            module,
            mods,
            ty: parsed.ty,
            role,
            declared_at: name_loc.offset,
            computed_arr_dim_sizes: Vec::new(),
            slot: VarSlot::None,
        });
        match role {
            VarRole::Field { .. } => self.symbols.module_mut(module).fields.push(var),
            VarRole::Global => self.symbols.module_mut(module).globals.push(var),
            _ => {}
        }
        self.declare(self.scope(), name, var, name_loc)?;

        let assignment = if self.eat(&TokenKind::Assign) {
            let value = self.parse_expression()?;
            Some(self.make_decl_assignment(name, var, name_loc, value))
        } else if self.kind() == &TokenKind::LParen && parsed.module_name.is_some() {
            // Constructor-argument declaration: `Mod m(1, 2);`
            let ctor_name = parsed.module_name.unwrap();
            let call_loc = self.loc();
            let args = self.parse_call_args()?;
            let call = self.ast.alloc(
                ExprKind::Call {
                    name: ctor_name,
                    args,
                    sym: None,
                    constructed_module: None,
                    assumed_default_constructor: false,
                },
                call_loc,
            );
            Some(self.make_decl_assignment(name, var, name_loc, call))
        } else {
            None
        };

        Ok(self.ast.alloc(
            ExprKind::VarDecl {
                var,
                assignment,
                dim_sizes: parsed.dim_sizes.clone(),
            },
            name_loc,
        ))
    }

    /// Declarations carry their initializer as a plain assignment over the
    /// declared identifier so analysis and lowering treat it like any `=`.
    fn make_decl_assignment(
        &mut self,
        name: WordId,
        var: VarId,
        loc: TextLocation,
        value: ExprId,
    ) -> ExprId {
        let ident = self.ast.alloc(
            ExprKind::Ident {
                name,
                sym: Some(var),
                is_array_length: false,
                references_module: false,
            },
            loc,
        );
        self.ast.alloc(
            ExprKind::Binary {
                op: BinOp::Assign,
                lhs: ident,
                rhs: value,
            },
            loc,
        )
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: WordId,
        var: VarId,
        loc: TextLocation,
    ) -> Result<(), CompilerError> {
        if self.symbols.declare_in_scope(scope, name, var).is_err() {
            let word = self.words.resolve(name);
            return_syntax_error!(
                VariableRedeclaration,
                format!("Variable '{word}' is already declared in this scope"),
                loc.to_error_location(self.path)
            );
        }
        Ok(())
    }

    fn parse_if(&mut self) -> Result<ExprId, CompilerError> {
        let loc = self.loc();
        let mut branches = Vec::new();
        let mut else_scope = None;
        let mut else_body = Vec::new();

        loop {
            self.next(); // if
            let cond = self.parse_expression()?;
            let scope = self.symbols.new_scope(Some(self.scope()));
            self.scope_stack.push(scope);
            let mut body = Vec::new();
            self.expect(TokenKind::LBrace)?;
            while !self.eat(&TokenKind::RBrace) {
                self.parse_stmt(&mut body)?;
            }
            self.scope_stack.pop();
            branches.push(IfBranch { cond, scope, body });

            if self.kind() == &TokenKind::Keyword(Keyword::Else) {
                if self.peek_kind(1) == &TokenKind::Keyword(Keyword::If) {
                    self.next(); // else, loop handles the if
                    continue;
                }
                self.next(); // else
                let scope = self.symbols.new_scope(Some(self.scope()));
                self.scope_stack.push(scope);
                self.expect(TokenKind::LBrace)?;
                while !self.eat(&TokenKind::RBrace) {
                    self.parse_stmt(&mut else_body)?;
                }
                self.scope_stack.pop();
                else_scope = Some(scope);
            }
            break;
        }

        Ok(self.ast.alloc(
            ExprKind::If {
                branches,
                else_scope,
                else_body,
            },
            loc,
        ))
    }

    /// `for decls? ; cond? ; post-exprs? { body }`
    fn parse_for(&mut self) -> Result<ExprId, CompilerError> {
        let loc = self.loc();
        self.next(); // for

        let scope = self.symbols.new_scope(Some(self.scope()));
        self.scope_stack.push(scope);

        let mut decls = Vec::new();
        if !self.eat(&TokenKind::Semicolon) {
            let parsed = self.parse_type()?;
            let (name, name_loc) = self.expect_ident()?;
            let list =
                self.parse_variable_decl_list(parsed, name, name_loc, Modifiers::empty(), false)?;
            decls.extend(list);
        }

        let cond = if self.kind() == &TokenKind::Semicolon {
            self.ast.alloc(ExprKind::BoolLit(true), self.loc())
        } else {
            self.parse_expression()?
        };
        self.expect(TokenKind::Semicolon)?;

        let mut post = Vec::new();
        while self.kind() != &TokenKind::LBrace {
            if !post.is_empty() {
                self.expect(TokenKind::Comma)?;
            }
            post.push(self.parse_expression()?);
        }

        let mut body = Vec::new();
        self.expect(TokenKind::LBrace)?;
        while !self.eat(&TokenKind::RBrace) {
            self.parse_stmt(&mut body)?;
        }
        self.scope_stack.pop();

        Ok(self.ast.alloc(
            ExprKind::For {
                decls,
                cond,
                post,
                scope,
                body,
            },
            loc,
        ))
    }

    fn parse_while(&mut self) -> Result<ExprId, CompilerError> {
        let loc = self.loc();
        self.next(); // while
        let cond = self.parse_expression()?;

        let scope = self.symbols.new_scope(Some(self.scope()));
        self.scope_stack.push(scope);
        let mut body = Vec::new();
        self.expect(TokenKind::LBrace)?;
        while !self.eat(&TokenKind::RBrace) {
            self.parse_stmt(&mut body)?;
        }
        self.scope_stack.pop();

        Ok(self.ast.alloc(ExprKind::While { cond, scope, body }, loc))
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<ExprId, CompilerError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<ExprId, CompilerError> {
        let lhs = self.parse_binary(0)?;

        let compound = match self.kind() {
            TokenKind::Assign => None,
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::PercentEq => Some(BinOp::Mod),
            TokenKind::AmpEq => Some(BinOp::BitAnd),
            TokenKind::BarEq => Some(BinOp::BitOr),
            TokenKind::CaretEq => Some(BinOp::BitXor),
            TokenKind::ShlEq => Some(BinOp::Shl),
            TokenKind::ShrEq => Some(BinOp::Shr),
            _ => return Ok(lhs),
        };

        let loc = self.loc();
        self.next();
        let rhs = self.parse_assignment()?;

        // Compound assignments desugar to a plain store of the combined
        // value; the left side node is shared between the two uses
        let value = match compound {
            Some(op) => self.ast.alloc(ExprKind::Binary { op, lhs, rhs }, loc),
            None => rhs,
        };
        Ok(self
            .ast
            .alloc(ExprKind::Binary { op: BinOp::Assign, lhs, rhs: value }, loc))
    }

    fn binary_op_for(&self, level: u32) -> Option<BinOp> {
        let op = match (level, self.kind()) {
            (0, TokenKind::BarBar) => BinOp::Or,
            (1, TokenKind::AmpAmp) => BinOp::And,
            (2, TokenKind::Bar) => BinOp::BitOr,
            (3, TokenKind::Caret) => BinOp::BitXor,
            (4, TokenKind::Amp) => BinOp::BitAnd,
            (5, TokenKind::EqEq) => BinOp::EqEq,
            (5, TokenKind::NotEq) => BinOp::NotEq,
            (6, TokenKind::Lt) => BinOp::Lt,
            (6, TokenKind::Gt) => BinOp::Gt,
            (6, TokenKind::LtEq) => BinOp::LtEq,
            (6, TokenKind::GtEq) => BinOp::GtEq,
            (7, TokenKind::Shl) => BinOp::Shl,
            (7, TokenKind::Shr) => BinOp::Shr,
            (8, TokenKind::Plus) => BinOp::Add,
            (8, TokenKind::Minus) => BinOp::Sub,
            (9, TokenKind::Star) => BinOp::Mul,
            (9, TokenKind::Slash) => BinOp::Div,
            (9, TokenKind::Percent) => BinOp::Mod,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, level: u32) -> Result<ExprId, CompilerError> {
        if level > 9 {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = self.binary_op_for(level) {
            let loc = self.loc();
            self.next();
            let rhs = self.parse_binary(level + 1)?;
            lhs = self.ast.alloc(ExprKind::Binary { op, lhs, rhs }, loc);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ExprId, CompilerError> {
        let op = match self.kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Amp => Some(UnaryOp::AddrOf),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };

        if let Some(op) = op {
            let loc = self.loc();
            self.next();
            let operand = self.parse_unary()?;
            return Ok(self.ast.alloc(ExprKind::Unary { op, operand }, loc));
        }

        if self.kind() == &TokenKind::Keyword(Keyword::Cast) {
            let loc = self.loc();
            self.next();
            self.expect(TokenKind::LParen)?;
            let parsed = self.parse_type()?;
            self.expect(TokenKind::RParen)?;
            let value = self.parse_unary()?;
            return Ok(self.ast.alloc(
                ExprKind::Cast {
                    to: parsed.ty,
                    value,
                    explicit: true,
                },
                loc,
            ));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ExprId, CompilerError> {
        let first = self.parse_factor()?;

        if self.kind() != &TokenKind::Dot {
            return Ok(first);
        }

        let loc = self.ast.expr(first).loc;
        let mut factors = vec![first];
        while self.eat(&TokenKind::Dot) {
            factors.push(self.parse_factor()?);
        }
        Ok(self.ast.alloc(ExprKind::DotChain { factors }, loc))
    }

    fn parse_call_args(&mut self) -> Result<Vec<ExprId>, CompilerError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while self.kind() != &TokenKind::RParen {
            if !args.is_empty() {
                self.expect(TokenKind::Comma)?;
            }
            args.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    /// One dot-chain factor: a literal, `this`, an identifier, a call, an
    /// indexed identifier, a parenthesized expression or an array literal.
    fn parse_factor(&mut self) -> Result<ExprId, CompilerError> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::IntLit { value, kind } => {
                self.next();
                Ok(self.ast.alloc(ExprKind::IntLit { value, kind }, loc))
            }
            TokenKind::FloatLit(value) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::FloatLit(value), loc))
            }
            TokenKind::DoubleLit(value) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::DoubleLit(value), loc))
            }
            TokenKind::CharLit(value) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::CharLit(value), loc))
            }
            TokenKind::StrLit(text) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::StrLit(text), loc))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::BoolLit(true), loc))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::BoolLit(false), loc))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::Null, loc))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.next();
                Ok(self.ast.alloc(ExprKind::This, loc))
            }
            TokenKind::LParen => {
                self.next();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBrace => {
                self.next();
                let mut elements = Vec::new();
                while self.kind() != &TokenKind::RBrace {
                    if !elements.is_empty() {
                        self.expect(TokenKind::Comma)?;
                    }
                    elements.push(self.parse_expression()?);
                }
                self.expect(TokenKind::RBrace)?;
                Ok(self.ast.alloc(
                    ExprKind::ArrayLit {
                        elements,
                        dim_size: None,
                    },
                    loc,
                ))
            }
            TokenKind::Ident(name) => {
                self.next();
                if self.kind() == &TokenKind::LParen {
                    let args = self.parse_call_args()?;
                    return Ok(self.ast.alloc(
                        ExprKind::Call {
                            name,
                            args,
                            sym: None,
                            constructed_module: None,
                            assumed_default_constructor: false,
                        },
                        loc,
                    ));
                }

                let ident = self.ast.alloc(
                    ExprKind::Ident {
                        name,
                        sym: None,
                        is_array_length: false,
                        references_module: false,
                    },
                    loc,
                );

                if self.kind() == &TokenKind::LBracket {
                    let mut indexes = Vec::new();
                    while self.eat(&TokenKind::LBracket) {
                        indexes.push(self.parse_expression()?);
                        self.expect(TokenKind::RBracket)?;
                    }
                    return Ok(self
                        .ast
                        .alloc(ExprKind::ArrayAccess { ident, indexes }, loc));
                }

                Ok(ident)
            }
            other => {
                let found = other.describe(self.words);
                return_syntax_error!(
                    ExpectedFactor,
                    format!("Expected an expression but found '{found}'"),
                    self.loc().to_error_location(self.path)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::tokenize;

    fn parse(source: &str) -> Result<(ParseOutput, SymbolRegistry, WordTable), CompilerError> {
        let mut words = WordTable::new();
        let keywords = Keywords::install(&mut words);
        let mut types = TypeTable::new();
        let mut symbols = SymbolRegistry::new();
        let (tokens, errors) = tokenize(source, Path::new("test.nyla"), &mut words, &keywords);
        assert!(errors.is_empty(), "lex errors: {errors:?}");
        let output = parse_unit(
            tokens,
            0,
            Path::new("test.nyla"),
            &mut words,
            &keywords,
            &mut types,
            &mut symbols,
        )?;
        Ok((output, symbols, words))
    }

    #[test]
    fn parses_module_with_members() {
        let (output, symbols, words) = parse(
            "module Counter {
                int count = 0;
                static int shared;

                Counter(int start) {
                    this.count = start;
                }

                int bump() {
                    count = count + 1;
                    return count;
                }
            }",
        )
        .unwrap();

        assert_eq!(output.own_modules.len(), 1);
        let module = symbols.module(output.own_modules[0]);
        assert_eq!(words.resolve(module.name), "Counter");
        assert_eq!(module.fields.len(), 1);
        assert_eq!(module.globals.len(), 1);
        assert_eq!(module.constructors.len(), 1);
        assert!(!module.no_constructors_declared);
        assert_eq!(module.functions.len(), 1);
    }

    #[test]
    fn parses_imports_with_aliases() {
        let (output, _, words) = parse(
            "import util.math;
             import util.vectors { Vec = Vector, Matrix };
             module Main { }",
        )
        .unwrap();

        assert_eq!(output.imports.len(), 2);
        assert_eq!(output.imports[0].path, "util/math");
        assert!(output.imports[0].aliases.is_empty());
        assert_eq!(output.imports[1].path, "util/vectors");
        let aliases = &output.imports[1].aliases;
        assert_eq!(words.resolve(aliases[0].0), "Vec");
        assert_eq!(words.resolve(aliases[0].1), "Vector");
        assert_eq!(words.resolve(aliases[1].0), "Matrix");
        assert_eq!(words.resolve(aliases[1].1), "Matrix");
    }

    #[test]
    fn main_function_is_flagged() {
        let (output, symbols, _) = parse("module App { int main() { return 0; } }").unwrap();
        assert_eq!(output.main_candidates.len(), 1);
        assert!(symbols.function(output.main_candidates[0]).is_main);
    }

    #[test]
    fn redeclaration_is_a_parse_error() {
        let err = parse("module M { int f() { int a; int a; return 0; } }").unwrap_err();
        assert_eq!(
            err.kind,
            crate::compiler::compiler_errors::ErrorKind::VariableRedeclaration
        );
    }

    #[test]
    fn array_dimension_sizes_are_kept_in_order() {
        let (output, _, _) = parse("module M { int f() { int[3][4] grid; return 0; } }").unwrap();
        let ast = &output.ast;
        let decl = ast
            .exprs
            .iter()
            .find_map(|e| match &e.kind {
                ExprKind::VarDecl { dim_sizes, .. } if !dim_sizes.is_empty() => Some(dim_sizes),
                _ => None,
            })
            .expect("a sized declaration");
        assert_eq!(decl.len(), 2);
        assert!(decl.iter().all(Option::is_some));
    }

    #[test]
    fn compound_assignment_desugars_to_store() {
        let (output, _, _) = parse("module M { int f() { int a = 1; a += 2; return a; } }")
            .unwrap();
        let has_plain_assign_of_add = output.ast.exprs.iter().any(|e| match &e.kind {
            ExprKind::Binary {
                op: BinOp::Assign,
                rhs,
                ..
            } => matches!(
                output.ast.expr(*rhs).kind,
                ExprKind::Binary { op: BinOp::Add, .. }
            ),
            _ => false,
        });
        assert!(has_plain_assign_of_add);
    }
}
