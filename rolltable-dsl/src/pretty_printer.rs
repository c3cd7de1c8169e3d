//! Pretty-printer - render an AST back to table-language source
//!
//! Primarily a test instrument: parse → print → parse must reproduce an
//! equivalent AST, which pins the parser and the surface syntax to each
//! other. The printer emits a canonical layout (one row per line, one
//! blank line between tables) rather than preserving original
//! whitespace.

use crate::parser::ast::*;

/// Print a whole source file.
pub fn print_file(ast: &TableFileAst) -> String {
    let mut out = String::new();
    out.push_str(&format!("TablePack: {}\n", ast.header.name));
    for import in &ast.header.imports {
        match &import.alias {
            Some(alias) => {
                out.push_str(&format!("Import: f\"{}\" As: {}\n", import.path, alias))
            }
            None => out.push_str(&format!("Import: f\"{}\"\n", import.path)),
        }
    }
    for table in &ast.tables {
        out.push('\n');
        out.push_str(&print_table(table));
    }
    out
}

/// Print one table definition.
pub fn print_table(decl: &TableDecl) -> String {
    let mut out = String::new();
    out.push_str(&format!("TableDef: {}\n", decl.name));
    for tag in &decl.tags {
        out.push_str(&format!(
            "~ {}: {}\n",
            print_label_text(&tag.key),
            print_label_text(&tag.value)
        ));
    }
    match &decl.body {
        TableBody::Rows(rows) => {
            for row in rows {
                out.push_str(&print_row(row));
                out.push('\n');
            }
        }
        TableBody::Generator(steps) => {
            for step in steps {
                let values: Vec<String> =
                    step.values.iter().map(|v| quote_string(v)).collect();
                out.push_str(&format!("[{}]\n", values.join(", ")));
            }
        }
    }
    out
}

/// Print one row.
pub fn print_row(row: &RowDecl) -> String {
    let mut prefix = Vec::new();
    if row.is_default {
        prefix.push("Default".to_string());
    }
    if let Some(weight) = row.weight {
        prefix.push(format!("w={}", weight));
    }
    if let Some(count) = row.count {
        prefix.push(format!("c={}", count));
    }
    if !row.ranges.is_empty() {
        let ranges: Vec<String> = row.ranges.iter().map(print_range).collect();
        prefix.push(ranges.join(","));
    }
    if let Some(label) = &row.label {
        prefix.push(print_label(label));
    }

    let items: Vec<String> = row.items.iter().map(print_item).collect();
    if prefix.is_empty() {
        items.join(" ")
    } else {
        format!("{}: {}", prefix.join(" "), items.join(" "))
    }
}

fn print_range(range: &RangeDecl) -> String {
    if range.low == range.high {
        range.low.to_string()
    } else {
        format!("{}-{}", range.low, range.high)
    }
}

fn print_item(item: &RowItem) -> String {
    match item {
        RowItem::Text(text) => quote_string(text),
        RowItem::Expr(expr) => print_expression(expr),
    }
}

/// Print a braced expression.
pub fn print_expression(expr: &ExpressionDecl) -> String {
    let mut out = String::from("{ ");
    if !expr.vars.is_empty() {
        let vars: Vec<String> = expr
            .vars
            .iter()
            .map(|var| format!("@{}={}", var.name, print_value(&var.value)))
            .collect();
        out.push_str(&vars.join(", "));
        out.push_str("; ");
    }
    out.push_str(&print_value(&expr.value));
    out.push_str(" }");
    out
}

fn print_value(value: &ValueExpr) -> String {
    match value {
        ValueExpr::Number(number) => number.to_string(),
        ValueExpr::Var(name) => format!("@{}", name),
        ValueExpr::Label(label) => print_label(label),
        ValueExpr::Roll(roll) => print_roll(roll),
        ValueExpr::Call(call) => {
            let args: Vec<String> = call.args.iter().map(print_value).collect();
            let marker = if call.is_table { "!" } else { "" };
            format!("{}{}({})", marker, call.path.join("."), args.join(", "))
        }
    }
}

fn print_roll(roll: &RollExpr) -> String {
    let mut out = format!("{}d{}", roll.count, roll.sides);
    if let Some(subset) = &roll.subset {
        out.push(if subset.high { 'h' } else { 'l' });
        out.push_str(&subset.count.to_string());
    }
    if let Some(aggr) = &roll.fn_aggr {
        out.push('.');
        out.push_str(aggr);
    }
    for aggr in &roll.count_aggrs {
        out.push('.');
        out.push(if aggr.multiplier < 0 { '-' } else { '+' });
        out.push_str(&aggr.face.to_string());
        let magnitude = aggr.multiplier.abs();
        if magnitude != 1 {
            out.push('x');
            out.push_str(&magnitude.to_string());
        }
    }
    if roll.as_str {
        out.push_str(".str");
    }
    out.push('?');
    out
}

fn print_label(label: &LabelDecl) -> String {
    if label.quoted {
        quote_string(&label.text)
    } else {
        label.text.clone()
    }
}

/// Bare identifiers stay bare; anything else gets quoted.
fn print_label_text(text: &str) -> String {
    if is_bare_ident(text) {
        text.to_string()
    } else {
        quote_string(text)
    }
}

fn is_bare_ident(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
