//! Tree-walking evaluator for viewer scripts.
//!
//! Scripts compute over JSON values. Host access happens exclusively
//! through the named builtins at the bottom of this file, each dispatched
//! against the [`CapabilityContext`]; there is no other door. Evaluation
//! is synchronous; builtins that start asynchronous work (`http_get`,
//! `alert`, `modal`) are fire-and-forget and evaluate to null.
//!
//! Faults (unknown variable, bad operand types, unknown builtin, arity
//! mismatch) are [`ScriptError`]s propagated to the caller uncaught.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::capability::CapabilityContext;
use crate::error::{ScriptError, ScriptErrorKind};
use crate::script::parser::{BinaryOp, Expr, Program, Stmt, UnaryOp};

/// Runs a program against the fixed script scope.
///
/// `value`, `issue`, and `field` are the viewer call arguments; `target`
/// and `filter` come from the registry's composition contract.
pub fn run(
    program: &Program,
    ctx: &CapabilityContext,
    value: Value,
    issue: Value,
    field: &str,
) -> Result<Value, ScriptError> {
    let mut scope = Scope::new(ctx);
    scope.vars.insert("value".to_string(), value);
    scope.vars.insert("issue".to_string(), issue);
    scope
        .vars
        .insert("field".to_string(), Value::String(field.to_string()));
    scope.vars.insert(
        "target".to_string(),
        Value::String(ctx.target.clone()),
    );
    // Always null in the current composition.
    scope.vars.insert("filter".to_string(), Value::Null);

    match scope.block(&program.stmts)? {
        Flow::Normal(v) | Flow::Return(v) => Ok(v),
    }
}

/// Statement outcome: keep going or unwind to the caller.
enum Flow {
    Normal(Value),
    Return(Value),
}

struct Scope<'a> {
    vars: HashMap<String, Value>,
    ctx: &'a CapabilityContext,
}

impl<'a> Scope<'a> {
    fn new(ctx: &'a CapabilityContext) -> Self {
        Self {
            vars: HashMap::new(),
            ctx,
        }
    }

    /// Runs a statement block; the block's value is the last expression
    /// statement's value unless a `return` unwinds first.
    fn block(&mut self, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
        let mut last = Value::Null;
        for stmt in stmts {
            match stmt {
                Stmt::Let { name, value } => {
                    let v = self.eval(value)?;
                    self.vars.insert(name.clone(), v);
                }
                Stmt::Return(expr) => {
                    let v = match expr {
                        Some(e) => self.eval(e)?,
                        None => Value::Null,
                    };
                    return Ok(Flow::Return(v));
                }
                Stmt::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    let branch = if truthy(&self.eval(cond)?) {
                        then_block
                    } else {
                        else_block
                    };
                    match self.block(branch)? {
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal(v) => last = v,
                    }
                }
                Stmt::Expr(expr) => last = self.eval(expr)?,
            }
        }
        Ok(Flow::Normal(last))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var { name, offset } => self.vars.get(name).cloned().ok_or_else(|| {
                ScriptError::new(ScriptErrorKind::Eval, format!("unknown variable '{name}'"))
                    .at(*offset)
            }),
            Expr::Member {
                object,
                name,
                offset,
            } => {
                let obj = self.eval(object)?;
                match obj {
                    Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
                    Value::Null => Err(ScriptError::new(
                        ScriptErrorKind::Eval,
                        format!("cannot read field '{name}' of null"),
                    )
                    .at(*offset)),
                    other => Err(ScriptError::new(
                        ScriptErrorKind::Eval,
                        format!("cannot read field '{name}' of {}", type_name(&other)),
                    )
                    .at(*offset)),
                }
            }
            Expr::Index {
                object,
                index,
                offset,
            } => {
                let obj = self.eval(object)?;
                let idx = self.eval(index)?;
                match (&obj, &idx) {
                    (Value::Object(map), Value::String(key)) => {
                        Ok(map.get(key).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Array(items), Value::Number(n)) => {
                        let i = n.as_u64().and_then(|i| usize::try_from(i).ok());
                        Ok(i.and_then(|i| items.get(i)).cloned().unwrap_or(Value::Null))
                    }
                    _ => Err(ScriptError::new(
                        ScriptErrorKind::Eval,
                        format!(
                            "cannot index {} with {}",
                            type_name(&obj),
                            type_name(&idx)
                        ),
                    )
                    .at(*offset)),
                }
            }
            Expr::Call { name, args, offset } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg)?);
                }
                self.builtin(name, &evaluated, *offset)
            }
            Expr::Unary {
                op,
                operand,
                offset,
            } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                    UnaryOp::Neg => {
                        let n = as_number(&v).ok_or_else(|| {
                            ScriptError::new(
                                ScriptErrorKind::Eval,
                                format!("cannot negate {}", type_name(&v)),
                            )
                            .at(*offset)
                        })?;
                        number(-n, *offset)
                    }
                }
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                offset,
            } => self.binary(*op, lhs, rhs, *offset),
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        offset: usize,
    ) -> Result<Value, ScriptError> {
        // Short-circuit forms evaluate the right side lazily and yield the
        // deciding operand, not a coerced boolean.
        if op == BinaryOp::And {
            let left = self.eval(lhs)?;
            return if truthy(&left) { self.eval(rhs) } else { Ok(left) };
        }
        if op == BinaryOp::Or {
            let left = self.eval(lhs)?;
            return if truthy(&left) { Ok(left) } else { self.eval(rhs) };
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::NotEq => Ok(Value::Bool(left != right)),
            BinaryOp::Add => {
                if left.is_string() || right.is_string() {
                    return Ok(Value::String(format!(
                        "{}{}",
                        stringify(&left),
                        stringify(&right)
                    )));
                }
                arith(op, &left, &right, offset)
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                arith(op, &left, &right, offset)
            }
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                compare(op, &left, &right, offset)
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    /// The capability surface. Every host operation a script can perform
    /// is one arm of this match.
    fn builtin(
        &mut self,
        name: &str,
        args: &[Value],
        offset: usize,
    ) -> Result<Value, ScriptError> {
        let arity = |expected: usize| -> Result<(), ScriptError> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ScriptError::new(
                    ScriptErrorKind::Eval,
                    format!(
                        "{name} expects {expected} argument(s), got {}",
                        args.len()
                    ),
                )
                .at(offset))
            }
        };
        let string_arg = |i: usize| -> Result<String, ScriptError> {
            match &args[i] {
                Value::String(s) => Ok(s.clone()),
                other => Ok(stringify(other)),
            }
        };

        match name {
            // Pure formatting helpers, delegated to the injected collaborators.
            "parse_number" => {
                arity(1)?;
                let parsed = match &args[0] {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => self.ctx.fmt.parse_number(s),
                    _ => None,
                };
                Ok(parsed
                    .and_then(crate::script::json_number)
                    .unwrap_or(Value::Null))
            }
            "escape_html" => {
                arity(1)?;
                Ok(Value::String(self.ctx.fmt.escape_html(&string_arg(0)?)))
            }
            "nl2br" => {
                arity(1)?;
                Ok(Value::String(self.ctx.fmt.nl2br(&string_arg(0)?)))
            }
            "auto_link" => {
                arity(1)?;
                Ok(Value::String(self.ctx.fmt.auto_link(&string_arg(0)?)))
            }

            // Dates.
            "format_date" => {
                arity(2)?;
                let fmt = string_arg(1)?;
                match self.ctx.dates.format(&args[0], &fmt) {
                    Some(s) => Ok(Value::String(s)),
                    None => Ok(Value::Null),
                }
            }
            "now" => {
                arity(0)?;
                Ok(Value::String(self.ctx.dates.now().to_rfc3339()))
            }

            // Host state accessors.
            "session" => {
                arity(0)?;
                Ok(self.ctx.auth.session())
            }
            "project" => {
                arity(0)?;
                match self.ctx.store.project() {
                    Some(p) => Ok(serde_json::to_value(p).unwrap_or(Value::Null)),
                    None => Ok(Value::Null),
                }
            }
            "meta_loaded" => {
                arity(0)?;
                Ok(Value::Bool(self.ctx.store.meta().is_some()))
            }
            "filter_label" => {
                arity(1)?;
                let name = string_arg(0)?;
                let label = self
                    .ctx
                    .store
                    .meta()
                    .and_then(|m| m.filter_label(&name).map(String::from));
                Ok(label.map_or(Value::Null, Value::String))
            }
            "map_link" => {
                arity(1)?;
                Ok(self.ctx.map.resolve(&args[0]))
            }

            // Fire-and-forget side effects.
            "alert" => {
                arity(1)?;
                self.ctx.alerts.alert(&string_arg(0)?);
                Ok(Value::Null)
            }
            "modal" => {
                arity(1)?;
                self.ctx.alerts.modal(&string_arg(0)?);
                Ok(Value::Null)
            }
            "http_get" => {
                arity(1)?;
                self.ctx.spawn_get(string_arg(0)?);
                Ok(Value::Null)
            }

            // Generic helpers.
            "len" => {
                arity(1)?;
                let n = match &args[0] {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    _ => {
                        return Err(ScriptError::new(
                            ScriptErrorKind::Eval,
                            format!("len of {}", type_name(&args[0])),
                        )
                        .at(offset));
                    }
                };
                Ok(Value::Number(Number::from(n as u64)))
            }
            "str" => {
                arity(1)?;
                Ok(Value::String(stringify(&args[0])))
            }
            "json" => {
                arity(1)?;
                match &args[0] {
                    Value::String(s) => Ok(serde_json::from_str(s).unwrap_or(Value::Null)),
                    other => Ok(other.clone()),
                }
            }

            _ => Err(ScriptError::new(
                ScriptErrorKind::Eval,
                format!("unknown builtin '{name}'"),
            )
            .at(offset)),
        }
    }
}

/// Script truthiness: null, false, 0, and "" are falsy; everything else
/// (arrays and objects included, empty or not) is truthy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Display form used by `str()` and string concatenation.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(n: f64, offset: usize) -> Result<Value, ScriptError> {
    crate::script::json_number(n).ok_or_else(|| {
        ScriptError::new(ScriptErrorKind::Eval, "non-finite arithmetic result").at(offset)
    })
}

fn arith(op: BinaryOp, left: &Value, right: &Value, offset: usize) -> Result<Value, ScriptError> {
    let (Some(a), Some(b)) = (as_number(left), as_number(right)) else {
        return Err(ScriptError::new(
            ScriptErrorKind::Eval,
            format!(
                "cannot apply arithmetic to {} and {}",
                type_name(left),
                type_name(right)
            ),
        )
        .at(offset));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => unreachable!("non-arithmetic operator"),
    };
    number(result, offset)
}

fn compare(op: BinaryOp, left: &Value, right: &Value, offset: usize) -> Result<Value, ScriptError> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ord) = ordering else {
        return Err(ScriptError::new(
            ScriptErrorKind::Eval,
            format!(
                "cannot compare {} and {}",
                type_name(left),
                type_name(right)
            ),
        )
        .at(offset));
    };
    let result = match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::LtEq => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::GtEq => ord.is_ge(),
        _ => unreachable!("non-comparison operator"),
    };
    Ok(Value::Bool(result))
}
