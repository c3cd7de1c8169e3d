//! Abstract syntax tree types

use serde::{Deserialize, Serialize};

/// One parsed source file: a header and its tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFileAst {
    pub header: FileHeader,
    pub tables: Vec<TableDecl>,
}

/// `TablePack:` line plus any imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    /// Dotted pack name, e.g. `foo.bar`.
    pub name: String,
    pub imports: Vec<ImportDecl>,
}

/// `Import: f"<path>"` with an optional `As:` alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    pub path: String,
    pub alias: Option<String>,
}

/// `TableDef:` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDecl {
    pub name: String,
    pub tags: Vec<TagDecl>,
    pub body: TableBody,
}

/// `~ key: value` metadata line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDecl {
    pub key: String,
    pub value: String,
}

/// A table holds literal rows or a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableBody {
    Rows(Vec<RowDecl>),
    Generator(Vec<GeneratorStep>),
}

/// One `[ "…", "…" ]` generator step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorStep {
    pub values: Vec<String>,
}

/// One table row: optional selection prefix, then one or more items.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowDecl {
    pub is_default: bool,
    pub weight: Option<i64>,
    pub count: Option<i64>,
    pub ranges: Vec<RangeDecl>,
    pub label: Option<LabelDecl>,
    pub items: Vec<RowItem>,
}

/// A closed integer interval; single numbers have `low == high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDecl {
    pub low: i64,
    pub high: i64,
}

/// A label, either bare (`foo`) or quoted (`"was a"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDecl {
    pub text: String,
    pub quoted: bool,
}

/// One row item: a string literal or a braced expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowItem {
    Text(String),
    Expr(ExpressionDecl),
}

/// `{ vars ; value }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionDecl {
    pub vars: Vec<VarDecl>,
    pub value: ValueExpr,
}

/// `@name = value` binding; declaration order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub value: ValueExpr,
}

/// A value inside an expression or call argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueExpr {
    Roll(RollExpr),
    Number(i64),
    Call(CallExpr),
    Label(LabelDecl),
    Var(String),
}

/// Function or table call; `!` marks table calls, and the dotted path's
/// last segment is the table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub is_table: bool,
    pub path: Vec<String>,
    pub args: Vec<ValueExpr>,
}

impl CallExpr {
    /// Everything before the final path segment, joined with dots.
    /// Empty for unqualified calls.
    pub fn pack_name(&self) -> String {
        self.path[..self.path.len().saturating_sub(1)].join(".")
    }

    /// The final path segment.
    pub fn target_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// The whole path joined with dots.
    pub fn full_name(&self) -> String {
        self.path.join(".")
    }
}

/// `NdM` roll with its modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollExpr {
    pub count: i64,
    pub sides: i64,
    pub subset: Option<SubsetDecl>,
    pub fn_aggr: Option<String>,
    pub count_aggrs: Vec<CountAggrDecl>,
    pub as_str: bool,
}

/// `hK` / `lK` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetDecl {
    pub high: bool,
    pub count: i64,
}

/// `.+N` / `.-N` with optional `xM`; the multiplier carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountAggrDecl {
    pub face: i64,
    pub multiplier: i64,
}
