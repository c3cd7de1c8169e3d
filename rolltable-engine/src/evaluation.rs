//! Per-invocation evaluation state machines
//!
//! Each `Evaluable` variant has a matching `Evaluation` variant carrying
//! the mutable state of one invocation. The contract, driven by the
//! evaluator's work stack:
//!
//! - `set_context` installs the fresh child context for the invocation;
//! - `has_next` is true while a sub-expression still needs evaluating;
//! - `next` yields that sub-expression's evaluation, ready to push;
//! - `provide` feeds back the result of the most recently yielded child;
//! - `resolve` computes the node's own result once `has_next` is false.
//!
//! Sub-expressions run in declaration order, left to right. The one
//! deliberate exception is `if`: condition first, then exactly one
//! branch, which is observable through deck draws and roll-history
//! appends.

use crate::context::ExecutionContext;
use crate::roll::resolve_roll;
use crate::table::DeckMode;
use crate::tree::{Evaluable, RollSpec};
use rolltable_core::{EvalError, EvalResult, ExpressionResult};
use std::sync::Arc;

impl Evaluable {
    /// Begin an invocation of this node. Callers chain
    /// `node.eval().set_context(ctx.child())`.
    pub fn eval(self: &Arc<Self>) -> Evaluation {
        let state = match self.as_ref() {
            Evaluable::Number(value) => State::Number { value: *value },
            Evaluable::Text { value, .. } => State::Text {
                value: value.clone(),
            },
            Evaluable::Variable(name) => State::Variable { name: name.clone() },
            Evaluable::Function { def, args } => State::Function {
                def: *def,
                args: args.clone(),
                results: Vec::with_capacity(args.len()),
            },
            Evaluable::If {
                condition,
                then_branch,
                else_branch,
            } => State::If {
                condition: condition.clone(),
                then_branch: then_branch.clone(),
                else_branch: else_branch.clone(),
                phase: IfPhase::Condition,
                result: None,
            },
            Evaluable::TableCall {
                pack_key,
                pack_name,
                table,
                args,
            } => State::TableCall {
                pack_key: pack_key.clone(),
                pack_name: pack_name.clone(),
                table: table.clone(),
                args: args.clone(),
                arg_values: Vec::with_capacity(args.len()),
                row_dispatched: false,
                result: None,
            },
            Evaluable::Roll(spec) => State::Roll { spec: spec.clone() },
            Evaluable::List(items) => State::List {
                items: items.clone(),
                results: Vec::with_capacity(items.len()),
            },
            Evaluable::Expr { vars, body } => State::Expr {
                vars: vars.clone(),
                body: body.clone(),
                index: 0,
                result: None,
            },
        };
        Evaluation { ctx: None, state }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IfPhase {
    Condition,
    Branch,
    Done,
}

enum State {
    Number {
        value: i64,
    },
    Text {
        value: String,
    },
    Variable {
        name: String,
    },
    Function {
        def: &'static crate::functions::FunctionDef,
        args: Vec<Arc<Evaluable>>,
        results: Vec<ExpressionResult>,
    },
    If {
        condition: Arc<Evaluable>,
        then_branch: Arc<Evaluable>,
        else_branch: Arc<Evaluable>,
        phase: IfPhase,
        result: Option<ExpressionResult>,
    },
    TableCall {
        pack_key: String,
        pack_name: String,
        table: String,
        args: Vec<Arc<Evaluable>>,
        arg_values: Vec<ExpressionResult>,
        row_dispatched: bool,
        result: Option<ExpressionResult>,
    },
    Roll {
        spec: RollSpec,
    },
    List {
        items: Vec<Arc<Evaluable>>,
        results: Vec<ExpressionResult>,
    },
    Expr {
        vars: Vec<(String, Arc<Evaluable>)>,
        body: Arc<Evaluable>,
        index: usize,
        result: Option<ExpressionResult>,
    },
}

/// The in-flight state of one node invocation.
pub struct Evaluation {
    ctx: Option<ExecutionContext>,
    state: State,
}

impl Evaluation {
    /// Install the context for this invocation.
    pub fn set_context(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    fn ctx(&self) -> EvalResult<&ExecutionContext> {
        self.ctx
            .as_ref()
            .ok_or_else(|| EvalError::internal("evaluation has no context"))
    }

    /// True while a sub-expression must still be evaluated.
    pub fn has_next(&self) -> bool {
        match &self.state {
            State::Number { .. } | State::Text { .. } | State::Variable { .. } | State::Roll { .. } => {
                false
            }
            State::Function { args, results, .. } => results.len() < args.len(),
            State::If { phase, .. } => *phase != IfPhase::Done,
            State::TableCall { result, .. } => result.is_none(),
            State::List { items, results } => results.len() < items.len(),
            // One step per variable binding, then one for the body.
            State::Expr { vars, index, .. } => *index <= vars.len(),
        }
    }

    /// The next sub-expression to push, in declaration order.
    pub fn next(&mut self) -> EvalResult<Evaluation> {
        let child_ctx = self.ctx()?.child();
        match &mut self.state {
            State::Function { args, results, .. } => {
                let item = args
                    .get(results.len())
                    .ok_or_else(|| EvalError::internal("function arguments exhausted"))?;
                Ok(item.eval().set_context(child_ctx))
            }
            State::If {
                condition,
                then_branch,
                else_branch,
                phase,
                result,
                ..
            } => match phase {
                IfPhase::Condition => Ok(condition.eval().set_context(child_ctx)),
                IfPhase::Branch => {
                    // `result` temporarily holds the condition value.
                    let take_then = result
                        .take()
                        .ok_or_else(|| EvalError::internal("if condition missing"))?
                        .truthy();
                    let branch = if take_then { then_branch } else { else_branch };
                    Ok(branch.eval().set_context(child_ctx))
                }
                IfPhase::Done => Err(EvalError::internal("if has no further sub-expressions")),
            },
            State::TableCall {
                args,
                arg_values,
                row_dispatched,
                ..
            } => {
                if arg_values.len() < args.len() {
                    let item = &args[arg_values.len()];
                    return Ok(item.eval().set_context(child_ctx));
                }
                if *row_dispatched {
                    return Err(EvalError::internal("table call row already dispatched"));
                }
                *row_dispatched = true;
                let row_value = self.select_row()?;
                Ok(row_value.eval().set_context(self.ctx()?.child()))
            }
            State::List { items, results } => {
                let item = items
                    .get(results.len())
                    .ok_or_else(|| EvalError::internal("list items exhausted"))?;
                Ok(item.eval().set_context(child_ctx))
            }
            State::Expr { vars, body, index, .. } => {
                if *index < vars.len() {
                    Ok(vars[*index].1.eval().set_context(child_ctx))
                } else {
                    Ok(body.eval().set_context(child_ctx))
                }
            }
            _ => Err(EvalError::internal("node has no sub-expressions")),
        }
    }

    /// Feed in the result of the most recently yielded sub-expression.
    pub fn provide(&mut self, value: ExpressionResult) -> EvalResult<()> {
        let ctx = self.ctx.clone();
        match &mut self.state {
            State::Function { def, args, results } => {
                if results.len() >= args.len() {
                    return Err(EvalError::internal("extra result provided to function"));
                }
                if !def.arg_type.accepts(&value) {
                    return Err(EvalError::WrongArgumentType {
                        function: def.name.to_string(),
                        index: results.len() + 1,
                        expected: def.arg_type.name(),
                    });
                }
                results.push(value);
                Ok(())
            }
            State::If { phase, result, .. } => match phase {
                IfPhase::Condition => {
                    if !value.is_int() {
                        return Err(EvalError::WrongArgumentType {
                            function: "if".to_string(),
                            index: 1,
                            expected: "int",
                        });
                    }
                    *result = Some(value);
                    *phase = IfPhase::Branch;
                    Ok(())
                }
                IfPhase::Branch => {
                    *result = Some(value);
                    *phase = IfPhase::Done;
                    Ok(())
                }
                IfPhase::Done => Err(EvalError::internal("extra result provided to if")),
            },
            State::TableCall {
                args,
                arg_values,
                result,
                ..
            } => {
                if arg_values.len() < args.len() {
                    arg_values.push(value);
                } else {
                    *result = Some(value);
                }
                Ok(())
            }
            State::List { items, results } => {
                if results.len() >= items.len() {
                    return Err(EvalError::internal("extra result provided to row value"));
                }
                results.push(value);
                Ok(())
            }
            State::Expr {
                vars,
                index,
                result,
                ..
            } => {
                if *index < vars.len() {
                    let ctx =
                        ctx.ok_or_else(|| EvalError::internal("evaluation has no context"))?;
                    ctx.set(vars[*index].0.clone(), value);
                } else {
                    *result = Some(value);
                }
                *index += 1;
                Ok(())
            }
            _ => Err(EvalError::internal("node takes no sub-expression results")),
        }
    }

    /// Compute this node's final result.
    pub fn resolve(self) -> EvalResult<ExpressionResult> {
        let ctx = self
            .ctx
            .ok_or_else(|| EvalError::internal("evaluation has no context"))?;
        match self.state {
            State::Number { value } => Ok(ExpressionResult::Int(value)),
            State::Text { value } => Ok(ExpressionResult::Text(value)),
            State::Variable { name } => ctx
                .resolve(&name)
                .ok_or(EvalError::UndefinedVariable { name }),
            State::Function { def, results, .. } => (def.resolve)(&results),
            State::If { result, .. } => {
                result.ok_or_else(|| EvalError::internal("if resolved before its branch"))
            }
            State::TableCall { result, .. } => {
                result.ok_or_else(|| EvalError::internal("table call resolved before its row"))
            }
            State::Roll { spec } => resolve_roll(&spec, &ctx),
            State::List { results, .. } => {
                let mut out = String::new();
                for item in &results {
                    match item {
                        ExpressionResult::Text(s) => out.push_str(s),
                        ExpressionResult::Int(v) => out.push_str(&v.to_string()),
                    }
                }
                Ok(ExpressionResult::Text(out))
            }
            State::Expr { result, .. } => {
                result.ok_or_else(|| EvalError::internal("expression resolved before its body"))
            }
        }
    }

    /// Dispatch a table call once its arguments are evaluated: pick the
    /// mode from the first argument (default `roll`) and select a row.
    /// Deck state is locked only for the draw itself; the returned row
    /// value evaluates without the lock.
    fn select_row(&self) -> EvalResult<Arc<Evaluable>> {
        let ctx = self.ctx()?;
        let (pack_key, pack_name, table_name, arg_values) = match &self.state {
            State::TableCall {
                pack_key,
                pack_name,
                table,
                arg_values,
                ..
            } => (pack_key, pack_name, table, arg_values),
            _ => return Err(EvalError::internal("select_row outside a table call")),
        };

        let pack = ctx.pack(pack_key).ok_or_else(|| EvalError::UnknownPack {
            key: pack_key.clone(),
        })?;
        let table = pack
            .table(table_name)
            .ok_or_else(|| EvalError::UnknownTable {
                pack: pack_name.clone(),
                table: table_name.clone(),
            })?;

        let mode = match arg_values.first() {
            None => "roll",
            Some(ExpressionResult::Text(s)) => s.as_str(),
            Some(other) => {
                return Err(EvalError::UnknownCallMode {
                    mode: other.to_string(),
                })
            }
        };

        let row = match mode {
            "roll" => {
                require_arg_count(mode, arg_values, 1)?;
                table.roll_row(ctx)?
            }
            "weighted" => {
                require_arg_count(mode, arg_values, 1)?;
                table.weighted_row(ctx)?
            }
            "index" => {
                let index = match arg_values.get(1) {
                    Some(ExpressionResult::Int(v)) => *v,
                    Some(other) => {
                        return Err(EvalError::BadCallArgument {
                            mode: mode.to_string(),
                            reason: format!("expected an integer index, got '{}'", other),
                        })
                    }
                    None => {
                        return Err(EvalError::BadCallArgument {
                            mode: mode.to_string(),
                            reason: "an index argument is required".to_string(),
                        })
                    }
                };
                table.index_row(index)?
            }
            "label" => {
                let label = match arg_values.get(1) {
                    Some(ExpressionResult::Text(s)) => s.clone(),
                    Some(other) => {
                        return Err(EvalError::BadCallArgument {
                            mode: mode.to_string(),
                            reason: format!("expected a string label, got '{}'", other),
                        })
                    }
                    None => {
                        return Err(EvalError::BadCallArgument {
                            mode: mode.to_string(),
                            reason: "a label argument is required".to_string(),
                        })
                    }
                };
                table.label_row(&label)?
            }
            "deck" => {
                let deck_mode = match arg_values.get(1) {
                    None => DeckMode::NoShuffle,
                    Some(ExpressionResult::Text(s)) if s == "shuffle" => DeckMode::Shuffle,
                    Some(ExpressionResult::Text(s)) if s == "no-shuffle" => DeckMode::NoShuffle,
                    Some(other) => {
                        return Err(EvalError::BadCallArgument {
                            mode: mode.to_string(),
                            reason: format!(
                                "expected 'shuffle' or 'no-shuffle', got '{}'",
                                other
                            ),
                        })
                    }
                };
                table.deck_draw(ctx, deck_mode)?
            }
            unknown => {
                return Err(EvalError::UnknownCallMode {
                    mode: unknown.to_string(),
                })
            }
        };
        Ok(row.value().clone())
    }
}

fn require_arg_count(mode: &str, arg_values: &[ExpressionResult], max: usize) -> EvalResult<()> {
    if arg_values.len() > max {
        return Err(EvalError::BadCallArgument {
            mode: mode.to_string(),
            reason: format!("takes no extra arguments, got {}", arg_values.len() - 1),
        });
    }
    Ok(())
}
