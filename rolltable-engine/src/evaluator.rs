//! The explicit-stack evaluation loop

use crate::context::ExecutionContext;
use crate::evaluation::Evaluation;
use crate::tree::Evaluable;
use rolltable_core::{EvalError, EvalResult, ExpressionResult};
use std::sync::Arc;

/// Evaluate a compiled expression against a context.
///
/// The loop owns an explicit work stack, so host recursion depth stays
/// constant no matter how deep the expression tree is: peek the top; if
/// it still has sub-expressions, push the next one; otherwise resolve
/// it and feed the result into the frame below. Errors short-circuit
/// the whole evaluation.
pub fn evaluate(expr: &Arc<Evaluable>, ctx: &ExecutionContext) -> EvalResult<ExpressionResult> {
    let mut stack: Vec<Evaluation> = vec![expr.eval().set_context(ctx.child())];
    loop {
        let top = match stack.last_mut() {
            Some(top) => top,
            None => return Err(EvalError::internal("evaluation stack underflow")),
        };
        if top.has_next() {
            let next = top.next()?;
            stack.push(next);
            continue;
        }
        let finished = match stack.pop() {
            Some(finished) => finished,
            None => return Err(EvalError::internal("evaluation stack underflow")),
        };
        let result = finished.resolve()?;
        match stack.last_mut() {
            None => return Ok(result),
            Some(parent) => parent.provide(result)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::lookup_function;
    use crate::program::PackMap;
    use rolltable_core::{QueueRandom, RollHistory, ThreadRandom};

    fn root_ctx() -> ExecutionContext {
        ExecutionContext::root(
            Arc::new(PackMap::new()),
            ThreadRandom::shared(),
            Arc::new(RollHistory::new()),
        )
    }

    fn ctx_with_samples(samples: &[i64]) -> ExecutionContext {
        let (rng, _) = QueueRandom::shared(samples.to_vec());
        ExecutionContext::root(Arc::new(PackMap::new()), rng, Arc::new(RollHistory::new()))
    }

    fn function(name: &str, args: Vec<Evaluable>) -> Evaluable {
        Evaluable::Function {
            def: lookup_function(name).unwrap(),
            args: args.into_iter().map(Arc::new).collect(),
        }
    }

    #[test]
    fn test_leaf_nodes() {
        let ctx = root_ctx();
        let num = Arc::new(Evaluable::Number(42));
        assert_eq!(evaluate(&num, &ctx).unwrap(), ExpressionResult::Int(42));

        let text = Arc::new(Evaluable::text("foo"));
        assert_eq!(evaluate(&text, &ctx).unwrap(), ExpressionResult::text("foo"));
    }

    #[test]
    fn test_variable_resolution() {
        let ctx = root_ctx();
        ctx.set("who", ExpressionResult::text("goblin"));
        let var = Arc::new(Evaluable::Variable("who".to_string()));
        assert_eq!(evaluate(&var, &ctx).unwrap(), ExpressionResult::text("goblin"));

        let missing = Arc::new(Evaluable::Variable("nope".to_string()));
        let err = evaluate(&missing, &ctx).unwrap_err();
        assert!(matches!(err, EvalError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_function_call() {
        let ctx = root_ctx();
        let call = Arc::new(function(
            "add",
            vec![Evaluable::Number(3), Evaluable::Number(7)],
        ));
        assert_eq!(evaluate(&call, &ctx).unwrap(), ExpressionResult::Int(10));
    }

    #[test]
    fn test_nested_function_calls() {
        // sub(add(5, 4), 1) == 8
        let ctx = root_ctx();
        let inner = function("add", vec![Evaluable::Number(5), Evaluable::Number(4)]);
        let outer = Arc::new(function("sub", vec![inner, Evaluable::Number(1)]));
        assert_eq!(evaluate(&outer, &ctx).unwrap(), ExpressionResult::Int(8));
    }

    #[test]
    fn test_expression_binds_in_declaration_order() {
        // { @x=5, @y=add(@x, 4); sub(@y, 1) } == 8
        let ctx = root_ctx();
        let expr = Arc::new(Evaluable::Expr {
            vars: vec![
                ("x".to_string(), Arc::new(Evaluable::Number(5))),
                (
                    "y".to_string(),
                    Arc::new(function(
                        "add",
                        vec![
                            Evaluable::Variable("x".to_string()),
                            Evaluable::Number(4),
                        ],
                    )),
                ),
            ],
            body: Arc::new(function(
                "sub",
                vec![Evaluable::Variable("y".to_string()), Evaluable::Number(1)],
            )),
        });
        assert_eq!(evaluate(&expr, &ctx).unwrap(), ExpressionResult::Int(8));
    }

    #[test]
    fn test_expression_bindings_do_not_leak() {
        let ctx = root_ctx();
        let expr = Arc::new(Evaluable::Expr {
            vars: vec![("x".to_string(), Arc::new(Evaluable::Number(1)))],
            body: Arc::new(Evaluable::Variable("x".to_string())),
        });
        evaluate(&expr, &ctx).unwrap();
        assert!(ctx.resolve("x").is_none());
    }

    #[test]
    fn test_if_evaluates_one_branch_only() {
        // Both branches are rolls; only one may consume RNG samples.
        let ctx = ctx_with_samples(&[1, 4]);
        let expr = Arc::new(Evaluable::If {
            condition: Arc::new(Evaluable::Number(1)),
            then_branch: Arc::new(Evaluable::Roll(crate::tree::RollSpec::new(1, 6))),
            else_branch: Arc::new(Evaluable::Roll(crate::tree::RollSpec::new(2, 6))),
        });
        assert_eq!(evaluate(&expr, &ctx).unwrap(), ExpressionResult::Int(1));
        // One sample drawn, one roll recorded.
        assert_eq!(ctx.history().len(), 1);

        let ctx = ctx_with_samples(&[2, 3]);
        let expr = Arc::new(Evaluable::If {
            condition: Arc::new(Evaluable::Number(0)),
            then_branch: Arc::new(Evaluable::text("then")),
            else_branch: Arc::new(Evaluable::text("else")),
        });
        assert_eq!(evaluate(&expr, &ctx).unwrap(), ExpressionResult::text("else"));
    }

    #[test]
    fn test_if_condition_must_be_int() {
        let ctx = root_ctx();
        let expr = Arc::new(Evaluable::If {
            condition: Arc::new(Evaluable::text("asdf")),
            then_branch: Arc::new(Evaluable::text("then")),
            else_branch: Arc::new(Evaluable::text("else")),
        });
        let err = evaluate(&expr, &ctx).unwrap_err();
        assert!(matches!(
            err,
            EvalError::WrongArgumentType { index: 1, .. }
        ));
    }

    #[test]
    fn test_list_concatenates_mixed_results() {
        let ctx = root_ctx();
        let expr = Arc::new(Evaluable::List(vec![
            Arc::new(Evaluable::text("rolled ")),
            Arc::new(Evaluable::Number(7)),
            Arc::new(Evaluable::text(" times")),
        ]));
        assert_eq!(
            evaluate(&expr, &ctx).unwrap(),
            ExpressionResult::text("rolled 7 times")
        );
    }

    #[test]
    fn test_deep_nesting_stays_on_heap() {
        // A pathologically deep chain must not blow the host stack
        // during evaluation. Building (and dropping) the tree itself
        // recurses through drop glue, so give that a roomy thread.
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let mut node = Evaluable::Number(0);
                for _ in 0..50_000 {
                    node = function("add", vec![node, Evaluable::Number(1)]);
                }
                let ctx = root_ctx();
                evaluate(&Arc::new(node), &ctx)
            })
            .unwrap();
        let result = handle.join().unwrap().unwrap();
        assert_eq!(result, ExpressionResult::Int(50_000));
    }

    #[test]
    fn test_runtime_type_error_bubbles() {
        let ctx = root_ctx();
        let call = Arc::new(function("add", vec![Evaluable::text("foo")]));
        let err = evaluate(&call, &ctx).unwrap_err();
        assert!(matches!(err, EvalError::WrongArgumentType { .. }));
    }
}
