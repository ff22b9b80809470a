use crate::compiler::compiler_errors::ErrorLocation;
use crate::compiler::words::{WordId, WordTable};
use rustc_hash::FxHashMap;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CharPosition {
    pub line_number: i32,
    pub char_column: i32,
}

/// A source span. `offset` is the flat byte position of the span start,
/// which is what the use-before-declaration check compares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TextLocation {
    pub start_pos: CharPosition,
    pub end_pos: CharPosition,
    pub offset: u32,
}

impl TextLocation {
    pub fn new(start: CharPosition, end: CharPosition, offset: u32) -> Self {
        Self {
            start_pos: start,
            end_pos: end,
            offset,
        }
    }

    /// Spans the range from the start of `self` to the end of `other`.
    pub fn up_to(self, other: TextLocation) -> TextLocation {
        TextLocation {
            start_pos: self.start_pos,
            end_pos: other.end_pos,
            offset: self.offset,
        }
    }

    pub fn to_error_location(self, path: &Path) -> ErrorLocation {
        ErrorLocation::new(path.to_path_buf(), self.start_pos, self.end_pos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Types
    Byte,
    Short,
    Int,
    Long,
    UByte,
    UShort,
    UInt,
    ULong,
    Float,
    Double,
    Bool,
    Void,
    Char,
    Char16,
    Char32,
    // Values
    True,
    False,
    Null,
    // Control flow
    If,
    Else,
    For,
    While,
    Return,
    // Declarations
    Module,
    Static,
    Private,
    Protected,
    Public,
    External,
    Const,
    Comptime,
    Import,
    // Expressions
    Cast,
    This,
}

/// The keyword keys and well-known identifiers, interned once at startup so
/// the lexer and parser can recognize them by key.
#[derive(Debug)]
pub struct Keywords {
    map: FxHashMap<WordId, Keyword>,
    pub main: WordId,
    pub length: WordId,
    pub startup: WordId,
}

impl Keywords {
    pub fn install(words: &mut WordTable) -> Keywords {
        let mut map = FxHashMap::default();
        let mut reserve = |text: &str, keyword: Keyword, words: &mut WordTable| {
            map.insert(words.intern(text), keyword);
        };

        reserve("byte", Keyword::Byte, words);
        reserve("short", Keyword::Short, words);
        reserve("int", Keyword::Int, words);
        reserve("long", Keyword::Long, words);
        reserve("ubyte", Keyword::UByte, words);
        reserve("ushort", Keyword::UShort, words);
        reserve("uint", Keyword::UInt, words);
        reserve("ulong", Keyword::ULong, words);
        reserve("float", Keyword::Float, words);
        reserve("double", Keyword::Double, words);
        reserve("bool", Keyword::Bool, words);
        reserve("void", Keyword::Void, words);
        reserve("char", Keyword::Char, words);
        reserve("char16", Keyword::Char16, words);
        reserve("char32", Keyword::Char32, words);
        reserve("true", Keyword::True, words);
        reserve("false", Keyword::False, words);
        reserve("null", Keyword::Null, words);
        reserve("if", Keyword::If, words);
        reserve("else", Keyword::Else, words);
        reserve("for", Keyword::For, words);
        reserve("while", Keyword::While, words);
        reserve("return", Keyword::Return, words);
        reserve("module", Keyword::Module, words);
        reserve("static", Keyword::Static, words);
        reserve("private", Keyword::Private, words);
        reserve("protected", Keyword::Protected, words);
        reserve("public", Keyword::Public, words);
        reserve("external", Keyword::External, words);
        reserve("const", Keyword::Const, words);
        reserve("comptime", Keyword::Comptime, words);
        reserve("import", Keyword::Import, words);
        reserve("cast", Keyword::Cast, words);
        reserve("this", Keyword::This, words);

        Keywords {
            map,
            main: words.intern("main"),
            length: words.intern("length"),
            startup: words.intern("StartUp"),
        }
    }

    pub fn get(&self, word: WordId) -> Option<Keyword> {
        self.map.get(&word).copied()
    }
}

/// Which integer type a literal landed in, decided by its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntLitKind {
    Int,
    Long,
    ULong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(WordId),
    Keyword(Keyword),
    IntLit { value: u64, kind: IntLitKind },
    FloatLit(f32),
    DoubleLit(f64),
    CharLit(u8),
    StrLit(Box<str>),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Bar,
    Caret,
    Not,
    Assign,
    Lt,
    Gt,
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    BarEq,
    CaretEq,
    BarBar,
    AmpAmp,
    NotEq,
    EqEq,
    Shl,
    Shr,
    ShlEq,
    ShrEq,
    LtEq,
    GtEq,
    Arrow,

    Eof,
}

impl TokenKind {
    /// Printable form for "expected X found Y" diagnostics.
    pub fn describe(&self, words: &WordTable) -> String {
        match self {
            TokenKind::Ident(word) => words.resolve(*word).to_string(),
            TokenKind::Keyword(keyword) => format!("{keyword:?}").to_lowercase(),
            TokenKind::IntLit { value, .. } => value.to_string(),
            TokenKind::FloatLit(value) => value.to_string(),
            TokenKind::DoubleLit(value) => value.to_string(),
            TokenKind::CharLit(value) => format!("'{}'", *value as char),
            TokenKind::StrLit(value) => format!("\"{value}\""),
            TokenKind::Eof => "end of file".to_string(),
            other => {
                let symbol = match other {
                    TokenKind::Plus => "+",
                    TokenKind::Minus => "-",
                    TokenKind::Star => "*",
                    TokenKind::Slash => "/",
                    TokenKind::Percent => "%",
                    TokenKind::Amp => "&",
                    TokenKind::Bar => "|",
                    TokenKind::Caret => "^",
                    TokenKind::Not => "!",
                    TokenKind::Assign => "=",
                    TokenKind::Lt => "<",
                    TokenKind::Gt => ">",
                    TokenKind::Dot => ".",
                    TokenKind::Comma => ",",
                    TokenKind::Semicolon => ";",
                    TokenKind::LParen => "(",
                    TokenKind::RParen => ")",
                    TokenKind::LBrace => "{",
                    TokenKind::RBrace => "}",
                    TokenKind::LBracket => "[",
                    TokenKind::RBracket => "]",
                    TokenKind::PlusPlus => "++",
                    TokenKind::MinusMinus => "--",
                    TokenKind::PlusEq => "+=",
                    TokenKind::MinusEq => "-=",
                    TokenKind::StarEq => "*=",
                    TokenKind::SlashEq => "/=",
                    TokenKind::PercentEq => "%=",
                    TokenKind::AmpEq => "&=",
                    TokenKind::BarEq => "|=",
                    TokenKind::CaretEq => "^=",
                    TokenKind::BarBar => "||",
                    TokenKind::AmpAmp => "&&",
                    TokenKind::NotEq => "!=",
                    TokenKind::EqEq => "==",
                    TokenKind::Shl => "<<",
                    TokenKind::Shr => ">>",
                    TokenKind::ShlEq => "<<=",
                    TokenKind::ShrEq => ">>=",
                    TokenKind::LtEq => "<=",
                    TokenKind::GtEq => ">=",
                    TokenKind::Arrow => "->",
                    _ => "?",
                };
                symbol.to_string()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub location: TextLocation,
}

impl Token {
    pub fn new(kind: TokenKind, location: TextLocation) -> Self {
        Self { kind, location }
    }
}
