//! Multi-pack compiler - link imports and lower to the executable tree
//!
//! # Pipeline
//!
//! ```text
//! root source → parse → breadth-first import link → lower → Program
//!                              │
//!                    content key = hex(MD5(bytes))
//! ```
//!
//! Files are addressed by the MD5 of their raw bytes, so two identical
//! files share one pack entry and import cycles terminate: an
//! already-seen key is never enqueued again. Each file gets its own
//! name map (`""` → its own key, alias or imported dotted name → key),
//! which the lowering uses to resolve every table call to a concrete
//! `(pack key, pack name, table name)` triple at compile time.

use crate::parser::ast::*;
use crate::parser::{parse_expression, parse_file, ParseError};
use md5::{Digest, Md5};
use rolltable_engine::{
    lookup_function, Evaluable, Pack, PackMap, Program, Range, RollAggr, RollCountAggr,
    RollSelect, RollSpec, Table, TableRow, ROOT_PACK,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// COMPILE ERRORS
// ============================================================================

/// Errors raised while compiling sources into a program.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("source file '{path}' is not valid UTF-8")]
    InvalidEncoding { path: String },

    #[error("cannot read imported file '{path}': {reason}")]
    ImportNotFound { path: String, reason: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("too few arguments to '{function}': expected at least {min}, got {got}")]
    TooFewArguments {
        function: String,
        min: usize,
        got: usize,
    },

    #[error("too many arguments to '{function}': expected at most {max}, got {got}")]
    TooManyArguments {
        function: String,
        max: usize,
        got: usize,
    },

    #[error("unknown pack name '{name}'")]
    UnknownPackName { name: String },

    #[error("too many arguments to table call '{table}': at most 2 permitted, got {got}")]
    TooManyTableArguments { table: String, got: usize },

    #[error("unknown roll aggregator '{name}'")]
    UnknownRollAggregator { name: String },

    #[error("duplicate count aggregator for face {face}")]
    DuplicateCountAggrFace { face: i64 },

    #[error("duplicate label '{label}' in table '{table}'")]
    DuplicateLabel { table: String, label: String },

    #[error("duplicate table '{table}' in pack '{pack}'")]
    DuplicateTable { pack: String, table: String },

    #[error("table '{table}' has no selectable weight")]
    ZeroWeight { table: String },
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// SOURCE RESOLUTION
// ============================================================================

/// Maps a file name to its raw source bytes.
///
/// The compiler never touches the filesystem directly; imports go
/// through this seam so tests and embedders can supply sources from
/// memory.
pub trait SourceResolver {
    fn load(&self, path: &Path) -> Result<Vec<u8>, String>;
}

/// Filesystem-backed resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsResolver;

impl SourceResolver for FsResolver {
    fn load(&self, path: &Path) -> Result<Vec<u8>, String> {
        std::fs::read(path).map_err(|err| err.to_string())
    }
}

/// In-memory resolver keyed by exact path strings.
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    files: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), source.into());
        self
    }
}

impl SourceResolver for MemoryResolver {
    fn load(&self, path: &Path) -> Result<Vec<u8>, String> {
        let key = path.to_string_lossy();
        self.files
            .get(key.as_ref())
            .map(|source| source.as_bytes().to_vec())
            .ok_or_else(|| "no such file".to_string())
    }
}

/// Hex-encoded MD5 of raw source bytes: the pack key.
pub fn content_key(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Import paths resolve relative to the importing file when that file's
/// path is absolute, otherwise relative to the process working
/// directory. Absolute import paths stand on their own.
fn resolve_import_path(importing: Option<&Path>, raw: &str) -> PathBuf {
    let import = Path::new(raw);
    if import.is_absolute() {
        return import.to_path_buf();
    }
    match importing {
        Some(parent_file) if parent_file.is_absolute() => match parent_file.parent() {
            Some(dir) => dir.join(import),
            None => import.to_path_buf(),
        },
        _ => import.to_path_buf(),
    }
}

// ============================================================================
// COMPILER
// ============================================================================

struct PendingFile {
    key: String,
    path: Option<PathBuf>,
    ast: TableFileAst,
}

/// Compiles root sources (files or strings) into programs.
pub struct Compiler<R: SourceResolver = FsResolver> {
    resolver: R,
}

impl Compiler<FsResolver> {
    pub fn new() -> Self {
        Self {
            resolver: FsResolver,
        }
    }
}

impl Default for Compiler<FsResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SourceResolver> Compiler<R> {
    pub fn with_resolver(resolver: R) -> Self {
        Self { resolver }
    }

    /// Compile a root file and everything it imports.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> CompileResult<Program> {
        let path = path.as_ref();
        let bytes = self
            .resolver
            .load(path)
            .map_err(|reason| CompileError::ImportNotFound {
                path: path.display().to_string(),
                reason,
            })?;
        self.link(bytes, Some(path.to_path_buf()))
    }

    /// Compile an in-memory root source; its imports still go through
    /// the resolver.
    pub fn compile_source(&self, source: &str) -> CompileResult<Program> {
        self.link(source.as_bytes().to_vec(), None)
    }

    /// Lower an interactive `{…}` expression against a compiled
    /// program's name map. Unqualified table calls hit the root pack.
    pub fn compile_expression(
        &self,
        source: &str,
        program: &Program,
    ) -> CompileResult<Arc<Evaluable>> {
        compile_expression(source, program)
    }

    fn link(&self, root_bytes: Vec<u8>, root_path: Option<PathBuf>) -> CompileResult<Program> {
        let root_source = decode(root_bytes, root_path.as_deref())?;
        let root_key = content_key(root_source.as_bytes());
        let root_ast = parse_file(&root_source)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut discovery: Vec<String> = Vec::new();
        let mut name_by_key: HashMap<String, String> = HashMap::new();

        seen.insert(root_key.clone());
        discovery.push(root_key.clone());
        name_by_key.insert(root_key.clone(), root_ast.header.name.clone());

        let mut queue = VecDeque::new();
        queue.push_back(PendingFile {
            key: root_key.clone(),
            path: root_path,
            ast: root_ast,
        });

        let mut packs = PackMap::new();
        while let Some(file) = queue.pop_front() {
            let mut names: HashMap<String, String> = HashMap::new();
            names.insert(String::new(), file.key.clone());

            for import in &file.ast.header.imports {
                let target = resolve_import_path(file.path.as_deref(), &import.path);
                let bytes =
                    self.resolver
                        .load(&target)
                        .map_err(|reason| CompileError::ImportNotFound {
                            path: target.display().to_string(),
                            reason,
                        })?;
                let key = content_key(&bytes);
                if seen.insert(key.clone()) {
                    let source = decode(bytes, Some(target.as_path()))?;
                    let ast = parse_file(&source)?;
                    discovery.push(key.clone());
                    name_by_key.insert(key.clone(), ast.header.name.clone());
                    queue.push_back(PendingFile {
                        key: key.clone(),
                        path: Some(target),
                        ast,
                    });
                }
                let pack_name = import
                    .alias
                    .clone()
                    .or_else(|| name_by_key.get(&key).cloned())
                    .unwrap_or_default();
                names.insert(pack_name, key.clone());
            }

            let pack = lower_file(&file.ast, &file.key, &names)?;
            packs.insert(file.key.clone(), Arc::new(pack));
        }

        // Program-level name map for interactive expressions: dotted
        // pack names in discovery order (first registration wins), and
        // the empty name addressing the root alias.
        let mut program_names = HashMap::new();
        program_names.insert(String::new(), ROOT_PACK.to_string());
        for key in &discovery {
            if let Some(name) = name_by_key.get(key) {
                program_names.entry(name.clone()).or_insert(key.clone());
            }
        }

        Ok(Program::new(packs, program_names, root_key))
    }
}

/// Lower an interactive `{…}` expression against a compiled program.
pub fn compile_expression(source: &str, program: &Program) -> CompileResult<Arc<Evaluable>> {
    let decl = parse_expression(source)?;
    Ok(Arc::new(lower_expression(&decl, program.names())?))
}

fn decode(bytes: Vec<u8>, path: Option<&Path>) -> CompileResult<String> {
    String::from_utf8(bytes).map_err(|_| CompileError::InvalidEncoding {
        path: path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string()),
    })
}

// ============================================================================
// LOWERING
// ============================================================================

fn lower_file(
    ast: &TableFileAst,
    key: &str,
    names: &HashMap<String, String>,
) -> CompileResult<Pack> {
    let mut tables = HashMap::new();
    for decl in &ast.tables {
        if tables.contains_key(&decl.name) {
            return Err(CompileError::DuplicateTable {
                pack: ast.header.name.clone(),
                table: decl.name.clone(),
            });
        }
        let table = lower_table(decl, names)?;
        tables.insert(decl.name.clone(), table);
    }
    Ok(Pack::new(ast.header.name.clone(), key, tables))
}

fn lower_table(decl: &TableDecl, names: &HashMap<String, String>) -> CompileResult<Table> {
    let tags: HashMap<String, String> = decl
        .tags
        .iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect();

    let rows = match &decl.body {
        TableBody::Rows(row_decls) => {
            let mut rows = Vec::with_capacity(row_decls.len());
            let mut labels = HashSet::new();
            for row_decl in row_decls {
                let row = lower_row(row_decl, names)?;
                if let Some(label) = row.label() {
                    if !labels.insert(label.to_string()) {
                        return Err(CompileError::DuplicateLabel {
                            table: decl.name.clone(),
                            label: label.to_string(),
                        });
                    }
                }
                rows.push(row);
            }
            rows
        }
        TableBody::Generator(steps) => generate_rows(steps),
    };

    if rows.iter().map(TableRow::weight).sum::<i64>() <= 0 {
        return Err(CompileError::ZeroWeight {
            table: decl.name.clone(),
        });
    }

    Ok(Table::new(decl.name.clone(), tags, rows))
}

/// Expand generator steps into their Cartesian product. The first step
/// varies fastest, and product row `i` (zero-based) gets the singleton
/// range `[i+1, i+1]`.
fn generate_rows(steps: &[GeneratorStep]) -> Vec<TableRow> {
    let mut rows = Vec::new();
    let mut counters = vec![0usize; steps.len()];
    let mut range_at = 1i64;
    loop {
        let mut value = String::new();
        for (step, counter) in steps.iter().zip(&counters) {
            value.push_str(&step.values[*counter]);
        }
        rows.push(TableRow::new(
            None,
            vec![Range::single(range_at)],
            1,
            1,
            false,
            Arc::new(Evaluable::text(value)),
        ));
        range_at += 1;

        let mut step_index = 0;
        while step_index < steps.len() {
            counters[step_index] += 1;
            if counters[step_index] == steps[step_index].values.len() {
                counters[step_index] = 0;
                step_index += 1;
            } else {
                break;
            }
        }
        if step_index == steps.len() {
            break;
        }
    }
    rows
}

fn lower_row(decl: &RowDecl, names: &HashMap<String, String>) -> CompileResult<TableRow> {
    let mut items = Vec::with_capacity(decl.items.len());
    for item in &decl.items {
        match item {
            RowItem::Text(text) => items.push(Arc::new(Evaluable::text(text.clone()))),
            RowItem::Expr(expr) => items.push(Arc::new(lower_expression(expr, names)?)),
        }
    }
    let value = Arc::new(Evaluable::List(items));

    let ranges = decl
        .ranges
        .iter()
        .map(|range| Range::new(range.low, range.high))
        .collect();

    Ok(TableRow::new(
        decl.label.as_ref().map(|label| label.text.clone()),
        ranges,
        decl.weight.unwrap_or(1),
        decl.count.unwrap_or(1),
        decl.is_default,
        value,
    ))
}

fn lower_expression(
    decl: &ExpressionDecl,
    names: &HashMap<String, String>,
) -> CompileResult<Evaluable> {
    let mut vars = Vec::with_capacity(decl.vars.len());
    for var in &decl.vars {
        vars.push((var.name.clone(), Arc::new(lower_value(&var.value, names)?)));
    }
    let body = Arc::new(lower_value(&decl.value, names)?);
    Ok(Evaluable::Expr { vars, body })
}

fn lower_value(expr: &ValueExpr, names: &HashMap<String, String>) -> CompileResult<Evaluable> {
    match expr {
        ValueExpr::Number(value) => Ok(Evaluable::Number(*value)),
        ValueExpr::Label(label) => Ok(Evaluable::Text {
            value: label.text.clone(),
            label: !label.quoted,
        }),
        ValueExpr::Var(name) => Ok(Evaluable::Variable(name.clone())),
        ValueExpr::Roll(roll) => lower_roll(roll),
        ValueExpr::Call(call) if call.is_table => lower_table_call(call, names),
        ValueExpr::Call(call) => lower_function_call(call, names),
    }
}

fn lower_roll(roll: &RollExpr) -> CompileResult<Evaluable> {
    let mut spec = RollSpec::new(roll.count, roll.sides);
    spec.as_string = roll.as_str;
    spec.selector = roll.subset.map(|subset| RollSelect {
        high: subset.high,
        count: subset.count,
    });
    if let Some(name) = &roll.fn_aggr {
        spec.aggr = match name.as_str() {
            "sum" => RollAggr::Sum,
            "min" => RollAggr::Min,
            "max" => RollAggr::Max,
            "avg" => RollAggr::Avg,
            "mode" => RollAggr::Mode,
            "median" => RollAggr::Median,
            other => {
                return Err(CompileError::UnknownRollAggregator {
                    name: other.to_string(),
                })
            }
        };
    }

    let mut faces = HashSet::new();
    for aggr in &roll.count_aggrs {
        if !faces.insert(aggr.face) {
            return Err(CompileError::DuplicateCountAggrFace { face: aggr.face });
        }
        spec.count_aggrs.push(RollCountAggr {
            face: aggr.face,
            multiplier: aggr.multiplier,
        });
    }

    Ok(Evaluable::Roll(spec))
}

fn lower_table_call(call: &CallExpr, names: &HashMap<String, String>) -> CompileResult<Evaluable> {
    let pack_name = call.pack_name();
    let table = call.target_name().to_string();
    let pack_key = names
        .get(&pack_name)
        .cloned()
        .ok_or_else(|| CompileError::UnknownPackName {
            name: pack_name.clone(),
        })?;

    if call.args.len() > 2 {
        return Err(CompileError::TooManyTableArguments {
            table,
            got: call.args.len(),
        });
    }

    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(Arc::new(lower_value(arg, names)?));
    }
    Ok(Evaluable::TableCall {
        pack_key,
        pack_name,
        table,
        args,
    })
}

fn lower_function_call(
    call: &CallExpr,
    names: &HashMap<String, String>,
) -> CompileResult<Evaluable> {
    let name = call.full_name();
    let got = call.args.len();

    // `if` lowers to its own lazily-branching node.
    if name == "if" {
        if got < 3 {
            return Err(CompileError::TooFewArguments {
                function: name,
                min: 3,
                got,
            });
        }
        if got > 3 {
            return Err(CompileError::TooManyArguments {
                function: name,
                max: 3,
                got,
            });
        }
        return Ok(Evaluable::If {
            condition: Arc::new(lower_value(&call.args[0], names)?),
            then_branch: Arc::new(lower_value(&call.args[1], names)?),
            else_branch: Arc::new(lower_value(&call.args[2], names)?),
        });
    }

    let def = lookup_function(&name).ok_or_else(|| CompileError::UnknownFunction {
        name: name.clone(),
    })?;
    if got < def.min_params {
        return Err(CompileError::TooFewArguments {
            function: name,
            min: def.min_params,
            got,
        });
    }
    if let Some(max) = def.max_params {
        if got > max {
            return Err(CompileError::TooManyArguments {
                function: name,
                max,
                got,
            });
        }
    }

    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(Arc::new(lower_value(arg, names)?));
    }
    Ok(Evaluable::Function { def, args })
}
