use crate::compiler::compiler_errors::{CompilerError, ErrorKind};
use crate::compiler::tokens::{
    CharPosition, IntLitKind, Keywords, TextLocation, Token, TokenKind,
};
use crate::compiler::words::WordTable;
use crate::settings::SRC_TO_TOKEN_RATIO;
use crate::token_log;
use std::path::Path;

/// Scans one unit's source text into a token stream. Lexical errors are
/// collected rather than fatal so a file can surface several at once.
pub fn tokenize(
    source: &str,
    path: &Path,
    words: &mut WordTable,
    keywords: &Keywords,
) -> (Vec<Token>, Vec<CompilerError>) {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        line: 0,
        column: 1,
        words,
        keywords,
        path,
        tokens: Vec::with_capacity(source.len() / SRC_TO_TOKEN_RATIO),
        errors: Vec::new(),
    };
    lexer.run();

    token_log!(format!("{:#?}", lexer.tokens));

    (lexer.tokens, lexer.errors)
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: i32,
    column: i32,
    words: &'a mut WordTable,
    keywords: &'a Keywords,
    path: &'a Path,
    tokens: Vec<Token>,
    errors: Vec<CompilerError>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) {
        loop {
            self.skip_trivia();
            if self.pos >= self.source.len() {
                let location = self.location_here(0);
                self.tokens.push(Token::new(TokenKind::Eof, location));
                return;
            }

            let start = self.mark();
            let byte = self.source[self.pos];
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_word(start),
                b'0'..=b'9' => self.lex_number(start),
                b'"' => self.lex_string(start),
                b'\'' => self.lex_char(start),
                _ => self.lex_symbol(start),
            }
        }
    }

    fn mark(&self) -> (usize, CharPosition) {
        (
            self.pos,
            CharPosition {
                line_number: self.line,
                char_column: self.column,
            },
        )
    }

    fn location_from(&self, start: (usize, CharPosition)) -> TextLocation {
        TextLocation::new(
            start.1,
            CharPosition {
                line_number: self.line,
                char_column: (self.column - 1).max(start.1.char_column),
            },
            start.0 as u32,
        )
    }

    fn location_here(&self, len: i32) -> TextLocation {
        let start = CharPosition {
            line_number: self.line,
            char_column: self.column,
        };
        TextLocation::new(
            start,
            CharPosition {
                line_number: self.line,
                char_column: self.column + len,
            },
            self.pos as u32,
        )
    }

    fn advance(&mut self) -> u8 {
        let byte = self.source[self.pos];
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        byte
    }

    fn peek(&self, ahead: usize) -> u8 {
        self.source.get(self.pos + ahead).copied().unwrap_or(0)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek(0) {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek(1) == b'/' => {
                    while self.pos < self.source.len() && self.peek(0) != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek(1) == b'*' => {
                    self.advance();
                    self.advance();
                    while self.pos < self.source.len() {
                        if self.peek(0) == b'*' && self.peek(1) == b'/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: (usize, CharPosition)) {
        let location = self.location_from(start);
        self.tokens.push(Token::new(kind, location));
    }

    fn lex_word(&mut self, start: (usize, CharPosition)) {
        while matches!(self.peek(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start.0..self.pos]).unwrap_or("");
        let word = self.words.intern(text);
        let kind = match self.keywords.get(word) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(word),
        };
        self.push(kind, start);
    }

    fn lex_number(&mut self, start: (usize, CharPosition)) {
        let mut value: u64 = 0;
        let mut too_large = false;
        while self.peek(0).is_ascii_digit() {
            let digit = (self.advance() - b'0') as u64;
            value = match value
                .checked_mul(10)
                .and_then(|value| value.checked_add(digit))
            {
                Some(value) => value,
                None => {
                    too_large = true;
                    value
                }
            };
        }

        // A '.' followed by a digit makes this a float literal
        if self.peek(0) == b'.' && self.peek(1).is_ascii_digit() {
            self.advance();
            let mut fraction = 0.0f64;
            let mut scale = 0.1f64;
            while self.peek(0).is_ascii_digit() {
                fraction += (self.advance() - b'0') as f64 * scale;
                scale /= 10.0;
            }
            let number = value as f64 + fraction;
            if self.peek(0) == b'f' {
                self.advance();
                self.push(TokenKind::FloatLit(number as f32), start);
            } else {
                self.push(TokenKind::DoubleLit(number), start);
            }
            return;
        }

        if self.peek(0) == b'f' {
            self.advance();
            self.push(TokenKind::FloatLit(value as f32), start);
            return;
        }

        if too_large {
            let location = self.location_from(start);
            self.errors.push(CompilerError::new(
                ErrorKind::IntTooLarge,
                "Integer literal is too large to be represented",
                location.to_error_location(self.path),
            ));
            self.push(
                TokenKind::IntLit {
                    value: 0,
                    kind: IntLitKind::Int,
                },
                start,
            );
            return;
        }

        let kind = if value <= i32::MAX as u64 {
            IntLitKind::Int
        } else if value <= i64::MAX as u64 {
            IntLitKind::Long
        } else {
            IntLitKind::ULong
        };
        self.push(TokenKind::IntLit { value, kind }, start);
    }

    fn escape(&mut self) -> u8 {
        match self.advance() {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'0' => 0,
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            other => other,
        }
    }

    fn lex_string(&mut self, start: (usize, CharPosition)) {
        self.advance(); // opening quote
        let mut text = String::new();
        while self.pos < self.source.len() && self.peek(0) != b'"' {
            let byte = self.advance();
            if byte == b'\\' && self.pos < self.source.len() {
                text.push(self.escape() as char);
            } else {
                text.push(byte as char);
            }
        }
        if self.pos < self.source.len() {
            self.advance(); // closing quote
        }
        self.push(TokenKind::StrLit(text.into_boxed_str()), start);
    }

    fn lex_char(&mut self, start: (usize, CharPosition)) {
        self.advance(); // opening quote
        let value = if self.peek(0) == b'\\' {
            self.advance();
            self.escape()
        } else {
            self.advance()
        };
        if self.peek(0) == b'\'' {
            self.advance();
        }
        self.push(TokenKind::CharLit(value), start);
    }

    fn lex_symbol(&mut self, start: (usize, CharPosition)) {
        use TokenKind::*;
        let first = self.advance();
        let second = self.peek(0);

        let kind = match (first, second) {
            (b'+', b'+') => self.two(PlusPlus),
            (b'+', b'=') => self.two(PlusEq),
            (b'+', _) => Plus,
            (b'-', b'-') => self.two(MinusMinus),
            (b'-', b'=') => self.two(MinusEq),
            (b'-', b'>') => self.two(Arrow),
            (b'-', _) => Minus,
            (b'*', b'=') => self.two(StarEq),
            (b'*', _) => Star,
            (b'/', b'=') => self.two(SlashEq),
            (b'/', _) => Slash,
            (b'%', b'=') => self.two(PercentEq),
            (b'%', _) => Percent,
            (b'&', b'&') => self.two(AmpAmp),
            (b'&', b'=') => self.two(AmpEq),
            (b'&', _) => Amp,
            (b'|', b'|') => self.two(BarBar),
            (b'|', b'=') => self.two(BarEq),
            (b'|', _) => Bar,
            (b'^', b'=') => self.two(CaretEq),
            (b'^', _) => Caret,
            (b'!', b'=') => self.two(NotEq),
            (b'!', _) => Not,
            (b'=', b'=') => self.two(EqEq),
            (b'=', _) => Assign,
            (b'<', b'<') => {
                self.advance();
                if self.peek(0) == b'=' {
                    self.two(ShlEq)
                } else {
                    Shl
                }
            }
            (b'<', b'=') => self.two(LtEq),
            (b'<', _) => Lt,
            (b'>', b'>') => {
                self.advance();
                if self.peek(0) == b'=' {
                    self.two(ShrEq)
                } else {
                    Shr
                }
            }
            (b'>', b'=') => self.two(GtEq),
            (b'>', _) => Gt,
            (b'.', _) => Dot,
            (b',', _) => Comma,
            (b';', _) => Semicolon,
            (b'(', _) => LParen,
            (b')', _) => RParen,
            (b'{', _) => LBrace,
            (b'}', _) => RBrace,
            (b'[', _) => LBracket,
            (b']', _) => RBracket,
            (other, _) => {
                let location = self.location_from(start);
                self.errors.push(CompilerError::new(
                    ErrorKind::UnknownChar,
                    format!("Unknown character '{}'", other as char),
                    location.to_error_location(self.path),
                ));
                return;
            }
        };
        self.push(kind, start);
    }

    fn two(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::tokens::Keyword;

    fn lex(source: &str) -> (Vec<Token>, Vec<CompilerError>) {
        let mut words = WordTable::new();
        let keywords = Keywords::install(&mut words);
        tokenize(source, Path::new("test.nyla"), &mut words, &keywords)
    }

    #[test]
    fn keywords_are_recognized_by_key() {
        let (tokens, errors) = lex("module int while");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Module));
        assert_eq!(tokens[1].kind, TokenKind::Keyword(Keyword::Int));
        assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::While));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn largest_ulong_is_accepted() {
        let (tokens, errors) = lex("18446744073709551615");
        assert!(errors.is_empty());
        assert_eq!(
            tokens[0].kind,
            TokenKind::IntLit {
                value: u64::MAX,
                kind: IntLitKind::ULong
            }
        );
    }

    #[test]
    fn one_past_ulong_max_is_rejected() {
        let (_, errors) = lex("18446744073709551616");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::IntTooLarge);
    }

    #[test]
    fn int_literal_kinds_follow_magnitude() {
        let (tokens, _) = lex("7 3000000000 9223372036854775808");
        assert!(matches!(
            tokens[0].kind,
            TokenKind::IntLit {
                kind: IntLitKind::Int,
                ..
            }
        ));
        assert!(matches!(
            tokens[1].kind,
            TokenKind::IntLit {
                kind: IntLitKind::Long,
                ..
            }
        ));
        assert!(matches!(
            tokens[2].kind,
            TokenKind::IntLit {
                kind: IntLitKind::ULong,
                ..
            }
        ));
    }

    #[test]
    fn compound_operators_lex_whole() {
        let (tokens, _) = lex("a <<= b >>= c && d");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::ShlEq));
        assert!(kinds.contains(&TokenKind::ShrEq));
        assert!(kinds.contains(&TokenKind::AmpAmp));
    }

    #[test]
    fn comments_are_skipped() {
        let (tokens, _) = lex("1 // comment\n/* block\n */ 2");
        assert!(matches!(tokens[0].kind, TokenKind::IntLit { value: 1, .. }));
        assert!(matches!(tokens[1].kind, TokenKind::IntLit { value: 2, .. }));
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn unknown_character_is_reported() {
        let (_, errors) = lex("int @ x");
        assert_eq!(errors[0].kind, ErrorKind::UnknownChar);
    }

    #[test]
    fn string_escapes_resolve() {
        let (tokens, _) = lex(r#""a\nb""#);
        match &tokens[0].kind {
            TokenKind::StrLit(text) => assert_eq!(text.as_ref(), "a\nb"),
            other => panic!("expected string, got {other:?}"),
        }
    }
}
