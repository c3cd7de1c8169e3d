//! Parser implementation
//!
//! Recursive descent over the token vector. The only backtracking is
//! the optional row prefix (`Default`, `w=`, `c=`, ranges, label),
//! which commits when its closing `:` is found and rewinds otherwise.

use super::ast::*;
use crate::lexer::*;
use thiserror::Error;

/// Parse error with source position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Parse a whole source file.
pub fn parse_file(source: &str) -> Result<TableFileAst, ParseError> {
    let mut parser = Parser::new(Lexer::new(source).tokenize());
    parser.file()
}

/// Parse a single `TableDef:` block (tests and tooling).
pub fn parse_table(source: &str) -> Result<TableDecl, ParseError> {
    let mut parser = Parser::new(Lexer::new(source).tokenize());
    let table = parser.table()?;
    parser.finish()?;
    Ok(table)
}

/// Parse a single row (tests and tooling).
pub fn parse_row(source: &str) -> Result<RowDecl, ParseError> {
    let mut parser = Parser::new(Lexer::new(source).tokenize());
    let row = parser.row()?;
    parser.finish()?;
    Ok(row)
}

/// Parse a single braced expression, the REPL/session input form.
pub fn parse_expression(source: &str) -> Result<ExpressionDecl, ParseError> {
    let mut parser = Parser::new(Lexer::new(source).tokenize());
    parser.skip_eols();
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Values (hence call arguments) may nest; cap the descent so hostile
/// input cannot exhaust the host stack.
const MAX_VALUE_DEPTH: usize = 256;

/// Recursive-descent parser over a token vector.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ========================================================================
    // File structure
    // ========================================================================

    pub fn file(&mut self) -> Result<TableFileAst, ParseError> {
        self.skip_eols();
        let header = self.header()?;

        let mut tables = Vec::new();
        loop {
            let save = self.pos;
            self.skip_eols_and_barriers();
            if self.check(&TokenKind::TableStart) {
                tables.push(self.table()?);
            } else {
                self.pos = save;
                break;
            }
        }

        self.skip_eols_and_barriers();
        if !self.is_at_end() {
            return Err(self.error("expected a table definition"));
        }
        Ok(TableFileAst { header, tables })
    }

    fn header(&mut self) -> Result<FileHeader, ParseError> {
        self.expect(TokenKind::PackStart)?;
        let name = self.dotted_name()?;

        let mut imports = Vec::new();
        loop {
            let save = self.pos;
            if self.skip_eols() == 0 {
                break;
            }
            if self.check(&TokenKind::Import) {
                self.advance();
                let path = self.expect_file_path()?;
                let alias = if self.check(&TokenKind::PackAlias) {
                    self.advance();
                    Some(self.dotted_name()?)
                } else {
                    None
                };
                imports.push(ImportDecl { path, alias });
            } else {
                self.pos = save;
                break;
            }
        }
        Ok(FileHeader { name, imports })
    }

    pub fn table(&mut self) -> Result<TableDecl, ParseError> {
        self.expect(TokenKind::TableStart)?;
        let name = self.expect_ident()?;

        let mut tags = Vec::new();
        loop {
            let save = self.pos;
            if self.skip_eols() == 0 {
                self.pos = save;
                break;
            }
            if self.check(&TokenKind::TagStart) {
                self.advance();
                let key = self.label_text()?;
                self.expect(TokenKind::Colon)?;
                let value = self.label_text()?;
                tags.push(TagDecl { key, value });
            } else {
                self.pos = save;
                break;
            }
        }

        if self.skip_eols() == 0 {
            return Err(self.error("expected table rows"));
        }
        let body = if self.check(&TokenKind::GenStart) {
            TableBody::Generator(self.generator()?)
        } else {
            let mut rows = vec![self.row()?];
            loop {
                let save = self.pos;
                if self.skip_eols() == 0 {
                    self.pos = save;
                    break;
                }
                if self.row_starts_here() {
                    rows.push(self.row()?);
                } else {
                    self.pos = save;
                    break;
                }
            }
            TableBody::Rows(rows)
        };
        Ok(TableDecl { name, tags, body })
    }

    fn generator(&mut self) -> Result<Vec<GeneratorStep>, ParseError> {
        let mut steps = vec![self.generator_step()?];
        loop {
            let save = self.pos;
            self.skip_eols();
            if self.check(&TokenKind::GenStart) {
                steps.push(self.generator_step()?);
            } else {
                self.pos = save;
                break;
            }
        }
        Ok(steps)
    }

    fn generator_step(&mut self) -> Result<GeneratorStep, ParseError> {
        self.expect(TokenKind::GenStart)?;
        let mut values = vec![self.expect_string()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            self.skip_eols();
            values.push(self.expect_string()?);
        }
        self.expect(TokenKind::GenEnd)?;
        Ok(GeneratorStep { values })
    }

    /// Whether the current token can open a row.
    fn row_starts_here(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Default
                | TokenKind::WeightMarker
                | TokenKind::CountMarker
                | TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::Ident(_)
                | TokenKind::ExprStart
        )
    }

    pub fn row(&mut self) -> Result<RowDecl, ParseError> {
        let save = self.pos;
        let mut row = RowDecl::default();

        // Optional prefix, committed only when its ':' shows up.
        if self.check(&TokenKind::Default) {
            self.advance();
            row.is_default = true;
        }
        if self.check(&TokenKind::WeightMarker) {
            self.advance();
            row.weight = Some(self.expect_number()?);
        }
        if self.check(&TokenKind::CountMarker) {
            self.advance();
            row.count = Some(self.expect_number()?);
        }
        if self.check(&TokenKind::Number(0)) {
            row.ranges = self.range_list()?;
        }
        match &self.current().kind {
            TokenKind::Ident(text) if self.peek_is(&TokenKind::Colon) => {
                row.label = Some(LabelDecl {
                    text: text.clone(),
                    quoted: false,
                });
                self.advance();
            }
            TokenKind::Str(text) if self.peek_is(&TokenKind::Colon) => {
                row.label = Some(LabelDecl {
                    text: text.clone(),
                    quoted: true,
                });
                self.advance();
            }
            _ => {}
        }
        if self.check(&TokenKind::Colon) {
            self.advance();
        } else {
            self.pos = save;
            row = RowDecl::default();
        }

        loop {
            match &self.current().kind {
                TokenKind::Str(text) => {
                    row.items.push(RowItem::Text(text.clone()));
                    self.advance();
                }
                TokenKind::ExprStart => {
                    row.items.push(RowItem::Expr(self.expression()?));
                }
                _ => break,
            }
            // `->` at line end continues the row on the next line.
            if self.check(&TokenKind::ExtendLine) {
                self.advance();
                self.expect(TokenKind::Eol)?;
            }
        }
        if row.items.is_empty() {
            return Err(self.error("expected a row value (string or expression)"));
        }
        Ok(row)
    }

    fn range_list(&mut self) -> Result<Vec<RangeDecl>, ParseError> {
        let mut ranges = vec![self.range()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            ranges.push(self.range()?);
        }
        Ok(ranges)
    }

    fn range(&mut self) -> Result<RangeDecl, ParseError> {
        let low = self.expect_number()?;
        if self.check(&TokenKind::RangeDash) {
            self.advance();
            let high = self.expect_number()?;
            Ok(RangeDecl { low, high })
        } else {
            Ok(RangeDecl { low, high: low })
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn expression(&mut self) -> Result<ExpressionDecl, ParseError> {
        self.expect(TokenKind::ExprStart)?;
        self.skip_eols();

        let mut vars = Vec::new();
        if self.check(&TokenKind::VarPrefix) && self.binding_follows() {
            loop {
                vars.push(self.var_decl()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    self.skip_eols();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::EndVarList)?;
            self.skip_eols();
        }

        let value = self.value_expr()?;
        self.skip_eols();
        self.expect(TokenKind::ExprEnd)?;
        Ok(ExpressionDecl { vars, value })
    }

    /// Distinguish `@x = …` bindings from a bare `@x` body reference.
    fn binding_follows(&self) -> bool {
        matches!(self.peek_kind(1), Some(TokenKind::Ident(_)))
            && matches!(self.peek_kind(2), Some(TokenKind::VarAssign))
    }

    fn var_decl(&mut self) -> Result<VarDecl, ParseError> {
        self.expect(TokenKind::VarPrefix)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::VarAssign)?;
        let value = self.value_expr()?;
        Ok(VarDecl { name, value })
    }

    fn value_expr(&mut self) -> Result<ValueExpr, ParseError> {
        self.depth += 1;
        if self.depth > MAX_VALUE_DEPTH {
            self.depth -= 1;
            return Err(self.error("expression nests too deeply"));
        }
        let value = self.value_expr_inner();
        self.depth -= 1;
        value
    }

    fn value_expr_inner(&mut self) -> Result<ValueExpr, ParseError> {
        match &self.current().kind {
            TokenKind::RollOpen { .. } => Ok(ValueExpr::Roll(self.roll()?)),
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Ok(ValueExpr::Number(value))
            }
            TokenKind::Str(text) => {
                let text = text.clone();
                self.advance();
                Ok(ValueExpr::Label(LabelDecl { text, quoted: true }))
            }
            TokenKind::VarPrefix => {
                self.advance();
                Ok(ValueExpr::Var(self.expect_ident()?))
            }
            TokenKind::CallSignal => {
                self.advance();
                let path = self.dotted_path()?;
                let args = self.call_args()?;
                Ok(ValueExpr::Call(CallExpr {
                    is_table: true,
                    path,
                    args,
                }))
            }
            TokenKind::Ident(_) => {
                let path = self.dotted_path()?;
                if self.check(&TokenKind::CallStart) {
                    let args = self.call_args()?;
                    Ok(ValueExpr::Call(CallExpr {
                        is_table: false,
                        path,
                        args,
                    }))
                } else if path.len() == 1 {
                    Ok(ValueExpr::Label(LabelDecl {
                        text: path.into_iter().next().unwrap_or_default(),
                        quoted: false,
                    }))
                } else {
                    Err(self.error("expected '(' after dotted name"))
                }
            }
            _ => Err(self.error("expected a value")),
        }
    }

    fn call_args(&mut self) -> Result<Vec<ValueExpr>, ParseError> {
        self.expect(TokenKind::CallStart)?;
        self.skip_eols();
        let mut args = Vec::new();
        if !self.check(&TokenKind::CallEnd) {
            args.push(self.value_expr()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                self.skip_eols();
                args.push(self.value_expr()?);
            }
        }
        self.skip_eols();
        self.expect(TokenKind::CallEnd)?;
        Ok(args)
    }

    fn roll(&mut self) -> Result<RollExpr, ParseError> {
        let (count, sides) = match &self.current().kind {
            TokenKind::RollOpen { count, sides } => (*count, *sides),
            _ => return Err(self.error("expected a roll")),
        };
        self.advance();

        let mut roll = RollExpr {
            count,
            sides,
            subset: None,
            fn_aggr: None,
            count_aggrs: Vec::new(),
            as_str: false,
        };

        if let TokenKind::RollSubset(high) = self.current().kind {
            self.advance();
            roll.subset = Some(SubsetDecl {
                high,
                count: self.expect_number()?,
            });
        }

        if let TokenKind::RollFnAggr(name) = &self.current().kind {
            roll.fn_aggr = Some(name.clone());
            self.advance();
        } else {
            while let TokenKind::RollCountSign(sign) = self.current().kind {
                self.advance();
                let face = self.expect_number()?;
                let multiplier = if self.check(&TokenKind::RollCountMult) {
                    self.advance();
                    self.expect_number()?
                } else {
                    1
                };
                roll.count_aggrs.push(CountAggrDecl {
                    face,
                    multiplier: sign * multiplier,
                });
            }
        }

        if self.check(&TokenKind::RollCast) {
            self.advance();
            roll.as_str = true;
        }
        self.expect(TokenKind::RollEnd)?;
        Ok(roll)
    }

    // ========================================================================
    // Names and labels
    // ========================================================================

    /// Dotted name flattened to a string (`foo.bar`).
    fn dotted_name(&mut self) -> Result<String, ParseError> {
        Ok(self.dotted_path()?.join("."))
    }

    /// Dotted name as its segments.
    fn dotted_path(&mut self) -> Result<Vec<String>, ParseError> {
        let mut parts = vec![self.expect_ident()?];
        while self.check(&TokenKind::Dot) {
            self.advance();
            parts.push(self.expect_ident()?);
        }
        Ok(parts)
    }

    /// A label position accepts a bare identifier or a quoted string.
    fn label_text(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Ident(text) => {
                let text = text.clone();
                self.advance();
                Ok(text)
            }
            TokenKind::Str(text) => {
                let text = text.clone();
                self.advance();
                Ok(text)
            }
            _ => Err(self.error("expected a label")),
        }
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.peek_kind(1)
            .map(|k| std::mem::discriminant(k) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    fn expect_number(&mut self) -> Result<i64, ParseError> {
        match &self.current().kind {
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Ok(value)
            }
            _ => Err(self.error("expected a number")),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Str(text) => {
                let text = text.clone();
                self.advance();
                Ok(text)
            }
            _ => Err(self.error("expected a string")),
        }
    }

    fn expect_file_path(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::FilePath(path) => {
                let path = path.clone();
                self.advance();
                Ok(path)
            }
            _ => Err(self.error("expected a file path (f\"…\")")),
        }
    }

    /// Consume a run of EOL tokens, returning how many were skipped.
    fn skip_eols(&mut self) -> usize {
        let mut skipped = 0;
        while self.check(&TokenKind::Eol) {
            self.advance();
            skipped += 1;
        }
        skipped
    }

    fn skip_eols_and_barriers(&mut self) {
        while self.check(&TokenKind::Eol) || self.check(&TokenKind::TableBarrier) {
            self.advance();
        }
    }

    /// For single-unit entry points: nothing but EOLs may remain.
    fn finish(&mut self) -> Result<(), ParseError> {
        self.skip_eols();
        if !self.is_at_end() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(())
    }

    fn error(&self, msg: &str) -> ParseError {
        let token = self.current();
        let message = match &token.kind {
            TokenKind::Error(lex_msg) => format!("{} ({})", msg, lex_msg),
            kind => format!("{}, found {:?}", msg, kind),
        };
        ParseError {
            message,
            line: token.span.line,
            column: token.span.column,
        }
    }
}
