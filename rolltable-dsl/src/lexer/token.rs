//! Lexer token types

use serde::{Deserialize, Serialize};

/// Token kinds for the table language.
///
/// The surface syntax has three intermingled sub-syntaxes (file level,
/// expression level, dice-roll level); several kinds below only occur
/// inside one lexer mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // File-level keywords (Root mode)
    /// `TablePack:`
    PackStart,
    /// `TableDef:`
    TableStart,
    /// `Import:`
    Import,
    /// `As:`
    PackAlias,
    /// `Default`
    Default,
    /// `w=`
    WeightMarker,
    /// `c=`
    CountMarker,
    /// `->` at end of a row line
    ExtendLine,
    /// `---` (three or more dashes) between tables
    TableBarrier,
    /// `f"…"` import path, wrapper stripped
    FilePath(String),
    /// `~` tag line opener
    TagStart,
    /// `[` opening a generator step
    GenStart,
    /// `]` closing a generator step
    GenEnd,
    Colon,
    /// `-` inside a range list
    RangeDash,

    // Shared atomic tokens
    Ident(String),
    /// Quoted string, unescaped
    Str(String),
    Number(i64),
    /// `NdM` — pushes Roll mode
    RollOpen { count: i64, sides: i64 },
    /// `!` table-call marker
    CallSignal,
    /// `@` variable prefix
    VarPrefix,
    Dot,
    Comma,
    Eol,

    // Roll mode
    /// `l` / `h` subset selector; true = keep high
    RollSubset(bool),
    /// `.min` `.max` `.sum` `.avg` `.mode` `.median`
    RollFnAggr(String),
    /// `.+` / `.-` count-aggregator opener; +1 or -1
    RollCountSign(i64),
    /// `x` multiplier marker
    RollCountMult,
    /// `.str` output flag
    RollCast,
    /// `?` — pops Roll mode
    RollEnd,

    // Expression / call modes
    /// `=` variable assignment
    VarAssign,
    /// `;` terminates the variable list
    EndVarList,
    /// `{` — pushes Expr mode
    ExprStart,
    /// `}` — pops Expr mode
    ExprEnd,
    /// `(` — pushes Call mode
    CallStart,
    /// `)` — pops Call mode
    CallEnd,

    // Special
    Eof,
    Error(String),
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
