//! Lexer implementation
//!
//! The surface language mixes three sub-syntaxes (file level,
//! expression level, dice-roll level), so the scanner keeps an explicit
//! mode stack: `NdM` pushes Roll mode, `{` pushes Expr, `(` pushes
//! Call, and `?` / `}` / `)` pop them. End-of-line is a real token;
//! spaces, tabs, and `#` comments are elided. A comment line whose
//! first non-blank character is `#` disappears entirely, newline
//! included.
//!
//! The scanner never fails: invalid input becomes `Error` tokens with a
//! position, and the stream always ends with `Eof`.

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Expr,
    Call,
    Roll,
}

/// Lexer for the table language.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
    modes: Vec<Mode>,
    fresh_line: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
            modes: Vec::new(),
            fresh_line: true,
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn mode(&self) -> Option<Mode> {
        self.modes.last().copied()
    }

    /// Get the next token from the source.
    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some('\n') => {
                self.advance();
                self.newline();
                TokenKind::Eol
            }
            Some('\r') => {
                self.advance();
                if self.peek_char() == Some('\n') {
                    self.advance();
                }
                self.newline();
                TokenKind::Eol
            }
            Some(_) if self.mode() == Some(Mode::Roll) => self.scan_roll_token(),
            Some(c) => self.scan_common_token(c),
        };

        if kind != TokenKind::Eol && kind != TokenKind::Eof {
            self.fresh_line = false;
        }

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
        self.fresh_line = true;
    }

    /// Tokens of the Root / Expr / Call modes.
    fn scan_common_token(&mut self, c: char) -> TokenKind {
        let in_root = self.mode().is_none();
        let in_value = matches!(self.mode(), Some(Mode::Expr) | Some(Mode::Call));

        match c {
            '{' => {
                self.advance();
                self.modes.push(Mode::Expr);
                TokenKind::ExprStart
            }
            '}' if self.mode() == Some(Mode::Expr) => {
                self.advance();
                self.modes.pop();
                TokenKind::ExprEnd
            }
            '(' => {
                self.advance();
                self.modes.push(Mode::Call);
                TokenKind::CallStart
            }
            ')' if self.mode() == Some(Mode::Call) => {
                self.advance();
                self.modes.pop();
                TokenKind::CallEnd
            }
            '!' => {
                self.advance();
                TokenKind::CallSignal
            }
            '@' => {
                self.advance();
                TokenKind::VarPrefix
            }
            '.' => {
                self.advance();
                TokenKind::Dot
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '=' if self.mode() == Some(Mode::Expr) => {
                self.advance();
                TokenKind::VarAssign
            }
            ';' if self.mode() == Some(Mode::Expr) => {
                self.advance();
                TokenKind::EndVarList
            }
            ':' if in_root => {
                self.advance();
                TokenKind::Colon
            }
            '~' if in_root => {
                self.advance();
                TokenKind::TagStart
            }
            '[' if in_root => {
                self.advance();
                TokenKind::GenStart
            }
            ']' if in_root => {
                self.advance();
                TokenKind::GenEnd
            }
            '-' => self.scan_dash(in_value),
            '"' => self.scan_string(),
            'f' if in_root && self.peek_next_char() == Some('"') => {
                self.advance(); // f
                match self.scan_string() {
                    TokenKind::Str(path) => TokenKind::FilePath(path),
                    error => error,
                }
            }
            c if c.is_ascii_digit() => self.scan_number(false),
            c if c.is_ascii_alphabetic() => self.scan_identifier(in_root),
            c => {
                self.advance();
                TokenKind::Error(format!("unexpected character: {}", c))
            }
        }
    }

    /// Dashes split three ways at file level: `->` continues a row,
    /// three or more dashes form a table barrier, a single dash is a
    /// range separator. Inside expressions a dash can only open a
    /// negative number.
    fn scan_dash(&mut self, in_value: bool) -> TokenKind {
        self.advance();
        if in_value {
            return if self.peek_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.scan_number(true)
            } else {
                TokenKind::Error("unexpected character: -".to_string())
            };
        }
        if self.peek_char() == Some('>') {
            self.advance();
            return TokenKind::ExtendLine;
        }
        let mut dashes = 1;
        while self.peek_char() == Some('-') {
            self.advance();
            dashes += 1;
        }
        match dashes {
            1 => TokenKind::RangeDash,
            2 => TokenKind::Error("unexpected '--'".to_string()),
            _ => TokenKind::TableBarrier,
        }
    }

    /// Scan an identifier; at file level, check the keyword table.
    fn scan_identifier(&mut self, in_root: bool) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else if c == '-'
                && self
                    .peek_next_char()
                    .map(|n| n.is_ascii_alphanumeric() || n == '_' || n == '-')
                    .unwrap_or(false)
            {
                self.advance();
            } else {
                break;
            }
        }
        let ident = &self.source[start..self.pos];

        if !in_root {
            return TokenKind::Ident(ident.to_string());
        }

        match ident {
            "TablePack" if self.peek_char() == Some(':') => {
                self.advance();
                TokenKind::PackStart
            }
            "TableDef" if self.peek_char() == Some(':') => {
                self.advance();
                TokenKind::TableStart
            }
            "Import" if self.peek_char() == Some(':') => {
                self.advance();
                TokenKind::Import
            }
            "As" if self.peek_char() == Some(':') => {
                self.advance();
                TokenKind::PackAlias
            }
            "Default" => TokenKind::Default,
            "w" if self.peek_char() == Some('=') => {
                self.advance();
                TokenKind::WeightMarker
            }
            "c" if self.peek_char() == Some('=') => {
                self.advance();
                TokenKind::CountMarker
            }
            _ => TokenKind::Ident(ident.to_string()),
        }
    }

    /// Scan a number, or an `NdM` roll opener.
    fn scan_number(&mut self, negative: bool) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let digits = &self.source[start..self.pos];
        let value = match digits.parse::<i64>() {
            Ok(v) => v,
            Err(_) => return TokenKind::Error(format!("invalid number: {}", digits)),
        };

        // `NdM` opens roll mode; negatives never do.
        if !negative
            && self.peek_char() == Some('d')
            && self
                .peek_next_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.advance(); // d
            let sides_start = self.pos;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
            let sides = &self.source[sides_start..self.pos];
            return match sides.parse::<i64>() {
                Ok(sides) => {
                    self.modes.push(Mode::Roll);
                    TokenKind::RollOpen {
                        count: value,
                        sides,
                    }
                }
                Err(_) => TokenKind::Error(format!("invalid dice sides: {}", sides)),
            };
        }

        TokenKind::Number(if negative { -value } else { value })
    }

    /// Roll-mode tokens: subset selectors, aggregators, the `.str`
    /// cast, multipliers, and the closing `?`.
    fn scan_roll_token(&mut self) -> TokenKind {
        match self.peek_char() {
            Some('?') => {
                self.advance();
                self.modes.pop();
                TokenKind::RollEnd
            }
            Some('l') => {
                self.advance();
                TokenKind::RollSubset(false)
            }
            Some('h') => {
                self.advance();
                TokenKind::RollSubset(true)
            }
            Some('x') => {
                self.advance();
                TokenKind::RollCountMult
            }
            Some('.') => {
                self.advance();
                match self.peek_char() {
                    Some('+') => {
                        self.advance();
                        TokenKind::RollCountSign(1)
                    }
                    Some('-') => {
                        self.advance();
                        TokenKind::RollCountSign(-1)
                    }
                    Some(c) if c.is_ascii_alphabetic() => {
                        let start = self.pos;
                        while let Some(c) = self.peek_char() {
                            if c.is_ascii_alphabetic() {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                        let word = &self.source[start..self.pos];
                        match word {
                            "min" | "max" | "sum" | "avg" | "mode" | "median" => {
                                TokenKind::RollFnAggr(word.to_string())
                            }
                            "str" => TokenKind::RollCast,
                            _ => TokenKind::Error(format!("unknown roll aggregator: .{}", word)),
                        }
                    }
                    _ => TokenKind::Error("dangling '.' in roll".to_string()),
                }
            }
            Some(c) if c.is_ascii_digit() => self.scan_number(false),
            Some(c) => {
                self.advance();
                TokenKind::Error(format!("unexpected character in roll: {}", c))
            }
            None => TokenKind::Eof,
        }
    }

    /// Scan a string literal with escape sequences.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None => return TokenKind::Error("unterminated string".to_string()),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        }
                        Some('"') => {
                            self.advance();
                            value.push('"');
                        }
                        _ => value.push('\\'),
                    }
                }
                Some('\n') => return TokenKind::Error("unterminated string".to_string()),
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::Str(value)
    }

    /// Skip spaces, tabs, and comments. A comment that starts its line
    /// is elided together with its newline.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') => {
                    self.advance();
                }
                Some('\r') if self.peek_next_char() != Some('\n') => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.advance();
                    }
                    if self.fresh_line {
                        if self.peek_char() == Some('\r') {
                            self.advance();
                        }
                        if self.peek_char() == Some('\n') {
                            self.advance();
                            self.newline();
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            self.column += 1;
            Some(c)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_file_keywords() {
        let tokens = kinds("TablePack: foo.bar\nTableDef: baz");
        assert_eq!(tokens[0], TokenKind::PackStart);
        assert_eq!(tokens[1], TokenKind::Ident("foo".to_string()));
        assert_eq!(tokens[2], TokenKind::Dot);
        assert_eq!(tokens[3], TokenKind::Ident("bar".to_string()));
        assert_eq!(tokens[4], TokenKind::Eol);
        assert_eq!(tokens[5], TokenKind::TableStart);
        assert_eq!(tokens[6], TokenKind::Ident("baz".to_string()));
        assert_eq!(tokens[7], TokenKind::Eof);
    }

    #[test]
    fn test_import_line() {
        let tokens = kinds("Import: f\"./other.tbl\" As: other");
        assert_eq!(tokens[0], TokenKind::Import);
        assert_eq!(tokens[1], TokenKind::FilePath("./other.tbl".to_string()));
        assert_eq!(tokens[2], TokenKind::PackAlias);
        assert_eq!(tokens[3], TokenKind::Ident("other".to_string()));
    }

    #[test]
    fn test_row_prefix_tokens() {
        let tokens = kinds("Default w=3 c=6 1,3-9,40 foo:");
        assert_eq!(tokens[0], TokenKind::Default);
        assert_eq!(tokens[1], TokenKind::WeightMarker);
        assert_eq!(tokens[2], TokenKind::Number(3));
        assert_eq!(tokens[3], TokenKind::CountMarker);
        assert_eq!(tokens[4], TokenKind::Number(6));
        assert_eq!(tokens[5], TokenKind::Number(1));
        assert_eq!(tokens[6], TokenKind::Comma);
        assert_eq!(tokens[7], TokenKind::Number(3));
        assert_eq!(tokens[8], TokenKind::RangeDash);
        assert_eq!(tokens[9], TokenKind::Number(9));
        assert_eq!(tokens[10], TokenKind::Comma);
        assert_eq!(tokens[11], TokenKind::Number(40));
        assert_eq!(tokens[12], TokenKind::Ident("foo".to_string()));
        assert_eq!(tokens[13], TokenKind::Colon);
    }

    #[test]
    fn test_table_barrier_and_extend() {
        assert_eq!(kinds("---")[0], TokenKind::TableBarrier);
        assert_eq!(kinds("-----")[0], TokenKind::TableBarrier);
        assert_eq!(kinds("->")[0], TokenKind::ExtendLine);
        assert!(matches!(kinds("--")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_expression_mode() {
        let tokens = kinds("{ @foo=5, @bar=add(@foo, -4); @bar }");
        assert_eq!(tokens[0], TokenKind::ExprStart);
        assert_eq!(tokens[1], TokenKind::VarPrefix);
        assert_eq!(tokens[2], TokenKind::Ident("foo".to_string()));
        assert_eq!(tokens[3], TokenKind::VarAssign);
        assert_eq!(tokens[4], TokenKind::Number(5));
        assert_eq!(tokens[5], TokenKind::Comma);
        assert_eq!(tokens[6], TokenKind::VarPrefix);
        assert_eq!(tokens[7], TokenKind::Ident("bar".to_string()));
        assert_eq!(tokens[8], TokenKind::VarAssign);
        assert_eq!(tokens[9], TokenKind::Ident("add".to_string()));
        assert_eq!(tokens[10], TokenKind::CallStart);
        assert_eq!(tokens[11], TokenKind::VarPrefix);
        assert_eq!(tokens[12], TokenKind::Ident("foo".to_string()));
        assert_eq!(tokens[13], TokenKind::Comma);
        assert_eq!(tokens[14], TokenKind::Number(-4));
        assert_eq!(tokens[15], TokenKind::CallEnd);
        assert_eq!(tokens[16], TokenKind::EndVarList);
        assert_eq!(tokens[17], TokenKind::VarPrefix);
        assert_eq!(tokens[18], TokenKind::Ident("bar".to_string()));
        assert_eq!(tokens[19], TokenKind::ExprEnd);
        assert_eq!(tokens[20], TokenKind::Eof);
    }

    #[test]
    fn test_roll_mode() {
        let tokens = kinds("{ 6d8l4.str? }");
        assert_eq!(tokens[0], TokenKind::ExprStart);
        assert_eq!(tokens[1], TokenKind::RollOpen { count: 6, sides: 8 });
        assert_eq!(tokens[2], TokenKind::RollSubset(false));
        assert_eq!(tokens[3], TokenKind::Number(4));
        assert_eq!(tokens[4], TokenKind::RollCast);
        assert_eq!(tokens[5], TokenKind::RollEnd);
        assert_eq!(tokens[6], TokenKind::ExprEnd);
    }

    #[test]
    fn test_roll_aggregators() {
        let tokens = kinds("{ 3d20.median? }");
        assert_eq!(tokens[2], TokenKind::RollFnAggr("median".to_string()));

        let tokens = kinds("{ 4d20.-4x3.+18x6? }");
        assert_eq!(tokens[2], TokenKind::RollCountSign(-1));
        assert_eq!(tokens[3], TokenKind::Number(4));
        assert_eq!(tokens[4], TokenKind::RollCountMult);
        assert_eq!(tokens[5], TokenKind::Number(3));
        assert_eq!(tokens[6], TokenKind::RollCountSign(1));
        assert_eq!(tokens[7], TokenKind::Number(18));
        assert_eq!(tokens[8], TokenKind::RollCountMult);
        assert_eq!(tokens[9], TokenKind::Number(6));
        assert_eq!(tokens[10], TokenKind::RollEnd);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#""hello" "esc\"aped" "tab\there""#);
        assert_eq!(tokens[0], TokenKind::Str("hello".to_string()));
        assert_eq!(tokens[1], TokenKind::Str("esc\"aped".to_string()));
        assert_eq!(tokens[2], TokenKind::Str("tab\there".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(kinds("\"oops")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_comments() {
        // Trailing comment keeps its newline; a full comment line
        // vanishes entirely.
        let tokens = kinds("foo # comment\n# whole line\nbar");
        assert_eq!(tokens[0], TokenKind::Ident("foo".to_string()));
        assert_eq!(tokens[1], TokenKind::Eol);
        assert_eq!(tokens[2], TokenKind::Ident("bar".to_string()));
    }

    #[test]
    fn test_crlf_is_one_eol() {
        let tokens = kinds("a\r\nb");
        assert_eq!(tokens[1], TokenKind::Eol);
        assert_eq!(tokens[2], TokenKind::Ident("b".to_string()));
    }

    #[test]
    fn test_generator_brackets() {
        let tokens = kinds("[\"A\", \"2\"][\" of \"]");
        assert_eq!(tokens[0], TokenKind::GenStart);
        assert_eq!(tokens[1], TokenKind::Str("A".to_string()));
        assert_eq!(tokens[2], TokenKind::Comma);
        assert_eq!(tokens[3], TokenKind::Str("2".to_string()));
        assert_eq!(tokens[4], TokenKind::GenEnd);
        assert_eq!(tokens[5], TokenKind::GenStart);
        assert_eq!(tokens[6], TokenKind::Str(" of ".to_string()));
        assert_eq!(tokens[7], TokenKind::GenEnd);
    }

    #[test]
    fn test_identifiers_with_dashes() {
        let tokens = kinds("S0mething_cool-ish");
        assert_eq!(tokens[0], TokenKind::Ident("S0mething_cool-ish".to_string()));
        // A trailing arrow is not swallowed by the identifier.
        let tokens = kinds("foo->");
        assert_eq!(tokens[0], TokenKind::Ident("foo".to_string()));
        assert_eq!(tokens[1], TokenKind::ExtendLine);
    }

    #[test]
    fn test_line_and_column_positions() {
        let mut lexer = Lexer::new("a\n  b");
        let tokens = lexer.tokenize();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[0].span.column, 1);
        assert_eq!(tokens[2].span.line, 2);
        assert_eq!(tokens[2].span.column, 3);
    }

    #[test]
    fn test_tokenize_always_ends_with_eof() {
        for source in ["", "   ", "\n\n", "TablePack: x", "\u{1F409}"] {
            let tokens = Lexer::new(source).tokenize();
            assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        }
    }
}
