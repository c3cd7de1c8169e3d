//! The closed function registry
//!
//! Every callable function is an entry here: arity bounds checked at
//! compile time, per-argument type predicate checked as results arrive,
//! and a reducer from the evaluated arguments to a result. `if` is not
//! in the registry; it lowers to its own node so only one branch is
//! ever evaluated.

use once_cell::sync::Lazy;
use rolltable_core::{EvalError, EvalResult, ExpressionResult};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Per-argument type requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Text,
    Any,
}

impl ArgType {
    pub fn accepts(&self, value: &ExpressionResult) -> bool {
        match self {
            ArgType::Int => value.is_int(),
            ArgType::Text => value.is_text(),
            ArgType::Any => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArgType::Int => "int",
            ArgType::Text => "string",
            ArgType::Any => "any",
        }
    }
}

/// One registry entry.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: &'static str,
    pub min_params: usize,
    /// `None` means unbounded.
    pub max_params: Option<usize>,
    pub arg_type: ArgType,
    pub resolve: fn(&[ExpressionResult]) -> EvalResult<ExpressionResult>,
}

static FUNCTIONS: Lazy<HashMap<&'static str, FunctionDef>> = Lazy::new(|| {
    let defs = [
        FunctionDef {
            name: "add",
            min_params: 1,
            max_params: None,
            arg_type: ArgType::Int,
            resolve: add_resolve,
        },
        FunctionDef {
            name: "sum",
            min_params: 1,
            max_params: None,
            arg_type: ArgType::Int,
            resolve: add_resolve,
        },
        FunctionDef {
            name: "sub",
            min_params: 1,
            max_params: None,
            arg_type: ArgType::Int,
            resolve: sub_resolve,
        },
        FunctionDef {
            name: "concat",
            min_params: 1,
            max_params: None,
            arg_type: ArgType::Text,
            resolve: concat_resolve,
        },
        FunctionDef {
            name: "upper",
            min_params: 1,
            max_params: Some(1),
            arg_type: ArgType::Text,
            resolve: upper_resolve,
        },
        FunctionDef {
            name: "lower",
            min_params: 1,
            max_params: Some(1),
            arg_type: ArgType::Text,
            resolve: lower_resolve,
        },
        FunctionDef {
            name: "str",
            min_params: 1,
            max_params: Some(1),
            arg_type: ArgType::Any,
            resolve: to_str_resolve,
        },
        FunctionDef {
            name: "int",
            min_params: 1,
            max_params: Some(1),
            arg_type: ArgType::Any,
            resolve: to_int_resolve,
        },
        FunctionDef {
            name: "eq",
            min_params: 2,
            max_params: Some(2),
            arg_type: ArgType::Any,
            resolve: eq_resolve,
        },
        FunctionDef {
            name: "gt",
            min_params: 2,
            max_params: Some(2),
            arg_type: ArgType::Any,
            resolve: gt_resolve,
        },
        FunctionDef {
            name: "gte",
            min_params: 2,
            max_params: Some(2),
            arg_type: ArgType::Any,
            resolve: gte_resolve,
        },
        FunctionDef {
            name: "lt",
            min_params: 2,
            max_params: Some(2),
            arg_type: ArgType::Any,
            resolve: lt_resolve,
        },
        FunctionDef {
            name: "lte",
            min_params: 2,
            max_params: Some(2),
            arg_type: ArgType::Any,
            resolve: lte_resolve,
        },
        FunctionDef {
            name: "and",
            min_params: 2,
            max_params: None,
            arg_type: ArgType::Int,
            resolve: and_resolve,
        },
        FunctionDef {
            name: "or",
            min_params: 2,
            max_params: None,
            arg_type: ArgType::Int,
            resolve: or_resolve,
        },
        FunctionDef {
            name: "not",
            min_params: 1,
            max_params: Some(1),
            arg_type: ArgType::Int,
            resolve: not_resolve,
        },
    ];
    defs.into_iter().map(|def| (def.name, def)).collect()
});

/// Look up a registry entry by name.
pub fn lookup_function(name: &str) -> Option<&'static FunctionDef> {
    FUNCTIONS.get(name)
}

fn int_arg(
    function: &'static str,
    args: &[ExpressionResult],
    index: usize,
) -> EvalResult<i64> {
    args[index]
        .as_int()
        .ok_or_else(|| EvalError::WrongArgumentType {
            function: function.to_string(),
            index: index + 1,
            expected: "int",
        })
}

fn text_arg<'a>(
    function: &'static str,
    args: &'a [ExpressionResult],
    index: usize,
) -> EvalResult<&'a str> {
    args[index]
        .as_text()
        .ok_or_else(|| EvalError::WrongArgumentType {
            function: function.to_string(),
            index: index + 1,
            expected: "string",
        })
}

fn add_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    let mut sum = 0;
    for index in 0..args.len() {
        sum += int_arg("add", args, index)?;
    }
    Ok(ExpressionResult::Int(sum))
}

fn sub_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    let mut value = int_arg("sub", args, 0)?;
    for index in 1..args.len() {
        value -= int_arg("sub", args, index)?;
    }
    Ok(ExpressionResult::Int(value))
}

fn concat_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    let mut out = String::new();
    for index in 0..args.len() {
        out.push_str(text_arg("concat", args, index)?);
    }
    Ok(ExpressionResult::Text(out))
}

fn upper_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    Ok(ExpressionResult::Text(
        text_arg("upper", args, 0)?.to_uppercase(),
    ))
}

fn lower_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    Ok(ExpressionResult::Text(
        text_arg("lower", args, 0)?.to_lowercase(),
    ))
}

fn to_str_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    Ok(match &args[0] {
        ExpressionResult::Int(v) => ExpressionResult::Text(v.to_string()),
        text @ ExpressionResult::Text(_) => text.clone(),
    })
}

fn to_int_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    match &args[0] {
        int @ ExpressionResult::Int(_) => Ok(int.clone()),
        ExpressionResult::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(ExpressionResult::Int)
            .map_err(|_| EvalError::UnparsableInt { value: s.clone() }),
    }
}

fn eq_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    Ok(ExpressionResult::Int(i64::from(args[0] == args[1])))
}

fn compare_resolve(
    function: &'static str,
    args: &[ExpressionResult],
    accept: fn(Ordering) -> bool,
) -> EvalResult<ExpressionResult> {
    let (a, b) = (&args[0], &args[1]);
    if !a.same_type(b) {
        return Err(EvalError::TypeMismatch {
            function: function.to_string(),
        });
    }
    let ordering = match (a, b) {
        (ExpressionResult::Int(x), ExpressionResult::Int(y)) => x.cmp(y),
        (ExpressionResult::Text(x), ExpressionResult::Text(y)) => x.cmp(y),
        _ => unreachable!("same_type checked above"),
    };
    Ok(ExpressionResult::Int(i64::from(accept(ordering))))
}

fn gt_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    compare_resolve("gt", args, |o| o == Ordering::Greater)
}

fn gte_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    compare_resolve("gte", args, |o| o != Ordering::Less)
}

fn lt_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    compare_resolve("lt", args, |o| o == Ordering::Less)
}

fn lte_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    compare_resolve("lte", args, |o| o != Ordering::Greater)
}

fn and_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    for index in 0..args.len() {
        if int_arg("and", args, index)? == 0 {
            return Ok(ExpressionResult::Int(0));
        }
    }
    Ok(ExpressionResult::Int(1))
}

fn or_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    for index in 0..args.len() {
        if int_arg("or", args, index)? != 0 {
            return Ok(ExpressionResult::Int(1));
        }
    }
    Ok(ExpressionResult::Int(0))
}

fn not_resolve(args: &[ExpressionResult]) -> EvalResult<ExpressionResult> {
    Ok(ExpressionResult::Int(i64::from(
        int_arg("not", args, 0)? == 0,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<ExpressionResult> {
        values.iter().copied().map(ExpressionResult::Int).collect()
    }

    fn texts(values: &[&str]) -> Vec<ExpressionResult> {
        values.iter().map(|s| ExpressionResult::text(*s)).collect()
    }

    #[test]
    fn test_registry_arities() {
        let add = lookup_function("add").unwrap();
        assert_eq!(add.min_params, 1);
        assert_eq!(add.max_params, None);

        let eq = lookup_function("eq").unwrap();
        assert_eq!(eq.max_params, Some(2));

        assert!(lookup_function("frobnicate").is_none());
        // `if` is specialized, never a registry entry.
        assert!(lookup_function("if").is_none());
    }

    #[test]
    fn test_add_and_sub() {
        let add = lookup_function("add").unwrap();
        assert_eq!(
            (add.resolve)(&ints(&[3, 7])).unwrap(),
            ExpressionResult::Int(10)
        );
        let sub = lookup_function("sub").unwrap();
        assert_eq!(
            (sub.resolve)(&ints(&[21, 3, 3, 3, 3, 3, 6])).unwrap(),
            ExpressionResult::Int(0)
        );
        assert_eq!(
            (sub.resolve)(&ints(&[6])).unwrap(),
            ExpressionResult::Int(6)
        );
    }

    #[test]
    fn test_add_rejects_strings() {
        let add = lookup_function("add").unwrap();
        let err = (add.resolve)(&texts(&["foo"])).unwrap_err();
        assert!(matches!(err, EvalError::WrongArgumentType { index: 1, .. }));
    }

    #[test]
    fn test_string_functions() {
        let concat = lookup_function("concat").unwrap();
        assert_eq!(
            (concat.resolve)(&texts(&["foo", "bar", "baz"])).unwrap(),
            ExpressionResult::text("foobarbaz")
        );
        let upper = lookup_function("upper").unwrap();
        assert_eq!(
            (upper.resolve)(&texts(&["Hello World"])).unwrap(),
            ExpressionResult::text("HELLO WORLD")
        );
        let lower = lookup_function("lower").unwrap();
        assert_eq!(
            (lower.resolve)(&texts(&["hELLO wOrlD"])).unwrap(),
            ExpressionResult::text("hello world")
        );
    }

    #[test]
    fn test_coercions() {
        let to_str = lookup_function("str").unwrap();
        assert_eq!(
            (to_str.resolve)(&ints(&[-23])).unwrap(),
            ExpressionResult::text("-23")
        );
        let to_int = lookup_function("int").unwrap();
        assert_eq!(
            (to_int.resolve)(&texts(&["-8357"])).unwrap(),
            ExpressionResult::Int(-8357)
        );
        let err = (to_int.resolve)(&texts(&["not a number"])).unwrap_err();
        assert!(matches!(err, EvalError::UnparsableInt { .. }));
    }

    #[test]
    fn test_eq_across_types() {
        let eq = lookup_function("eq").unwrap();
        let mixed = vec![ExpressionResult::text("thing"), ExpressionResult::Int(8)];
        assert_eq!((eq.resolve)(&mixed).unwrap(), ExpressionResult::Int(0));
        assert_eq!(
            (eq.resolve)(&ints(&[101, 101])).unwrap(),
            ExpressionResult::Int(1)
        );
    }

    #[test]
    fn test_comparisons() {
        let gt = lookup_function("gt").unwrap();
        assert_eq!(
            (gt.resolve)(&texts(&["z", "a"])).unwrap(),
            ExpressionResult::Int(1)
        );
        let lte = lookup_function("lte").unwrap();
        assert_eq!(
            (lte.resolve)(&ints(&[6, 6])).unwrap(),
            ExpressionResult::Int(1)
        );

        let mixed = vec![ExpressionResult::text("a"), ExpressionResult::Int(5)];
        let err = (gt.resolve)(&mixed).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_logic() {
        let and = lookup_function("and").unwrap();
        assert_eq!(
            (and.resolve)(&ints(&[1, 1, 1, 1, 0, 1])).unwrap(),
            ExpressionResult::Int(0)
        );
        let or = lookup_function("or").unwrap();
        assert_eq!(
            (or.resolve)(&ints(&[0, 1])).unwrap(),
            ExpressionResult::Int(1)
        );
        let not = lookup_function("not").unwrap();
        assert_eq!(
            (not.resolve)(&ints(&[-3])).unwrap(),
            ExpressionResult::Int(0)
        );
        assert_eq!(
            (not.resolve)(&ints(&[0])).unwrap(),
            ExpressionResult::Int(1)
        );
    }
}
