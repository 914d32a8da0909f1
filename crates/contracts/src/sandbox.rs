//! Sandboxed evaluation of trigger conditions.
//!
//! The interpreter walks a parsed [`Expr`] against a read-only view of the
//! tool output. The only names in scope are `tool_output`, comprehension
//! variables, and the builtins in [`SAFE_BUILTINS`]. Node visits, iteration
//! steps and the linear work inside operations are charged against a step
//! budget; string work pays one step per KiB scanned. Every operation that
//! builds a string or list is also checked against a size cap, so evaluation
//! always terminates in bounded time and memory.

use crate::EvalError;
use crate::parser::{
    BinaryOp, Clause, CompareOp, Expr, LogicalOp, Method, UnaryOp, parse_expression,
};
use crate::value::{Builtin, Number, Value, dict_lookup};
use std::borrow::Cow;
use std::cmp::Ordering;
use tracing::warn;

/// The name the tool output is bound to inside a condition.
pub const TOOL_OUTPUT: &str = "tool_output";

/// Names of every function a condition may call.
pub const SAFE_BUILTINS: [&str; 14] = [
    "len",
    "all",
    "any",
    "isinstance",
    "str",
    "int",
    "float",
    "bool",
    "list",
    "dict",
    "min",
    "max",
    "sum",
    "abs",
];

/// Resource bounds for parsing and evaluating one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    pub max_expression_len: usize,
    pub max_depth: usize,
    pub max_steps: u64,
    pub max_collection_len: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_expression_len: 4096,
            max_depth: 64,
            max_steps: 10_000,
            max_collection_len: 100_000,
        }
    }
}

/// Parse and evaluate `expression` against `output`.
pub fn try_evaluate(
    expression: &str,
    output: &serde_json::Value,
    limits: &EvalLimits,
) -> Result<bool, EvalError> {
    let expr = parse_expression(expression, limits)?;
    evaluate_expr(&expr, output, limits)
}

/// Evaluate an already-parsed condition against `output`.
///
/// The result is the truthiness of the expression's value.
pub fn evaluate_expr(
    expr: &Expr,
    output: &serde_json::Value,
    limits: &EvalLimits,
) -> Result<bool, EvalError> {
    let bound = Value::from(output);
    let mut interpreter = Interpreter::new(&bound, limits);
    let triggered = interpreter.eval(expr)?.is_truthy();
    Ok(triggered)
}

/// Evaluate a condition, treating every failure as "not triggered".
///
/// A missing expression, a parse error, or a runtime fault is logged as a
/// warning and yields `false`.
pub fn evaluate_condition(expression: Option<&str>, output: &serde_json::Value) -> bool {
    let result = match expression {
        Some(expr) => try_evaluate(expr, output, &EvalLimits::default()),
        None => Err(EvalError::MissingExpression),
    };
    match result {
        Ok(triggered) => triggered,
        Err(e) => {
            warn!("error evaluating expression: {e}");
            false
        }
    }
}

/// Bytes of string data one step pays for.
const STR_BYTES_PER_STEP: usize = 1024;

type Eval<'a> = Result<Cow<'a, Value>, EvalError>;

/// Evaluated keyword arguments, in call order.
type Keywords<'a> = Vec<(&'a str, Cow<'a, Value>)>;

struct Interpreter<'a> {
    tool_output: &'a Value,
    limits: EvalLimits,
    steps: u64,
    depth: usize,
    /// Comprehension bindings, innermost last.
    scopes: Vec<(String, Cow<'a, Value>)>,
}

impl<'a> Interpreter<'a> {
    fn new(tool_output: &'a Value, limits: &EvalLimits) -> Self {
        Self {
            tool_output,
            limits: *limits,
            steps: 0,
            depth: 0,
            scopes: Vec::new(),
        }
    }

    fn charge(&mut self, units: usize) -> Result<(), EvalError> {
        self.steps = self.steps.saturating_add(units as u64);
        if self.steps > self.limits.max_steps {
            return Err(EvalError::BudgetExhausted(self.limits.max_steps));
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), EvalError> {
        if len > self.limits.max_collection_len {
            return Err(EvalError::TooLarge(self.limits.max_collection_len));
        }
        Ok(())
    }

    fn eval(&mut self, expr: &'a Expr) -> Eval<'a> {
        self.charge(1)?;
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            self.depth -= 1;
            return Err(EvalError::TooDeep(self.limits.max_depth));
        }
        let out = self.eval_node(expr);
        self.depth -= 1;
        out
    }

    fn eval_node(&mut self, expr: &'a Expr) -> Eval<'a> {
        match expr {
            Expr::Literal(v) => Ok(Cow::Borrowed(v)),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                self.check_len(items.len())?;
                let values = items
                    .iter()
                    .map(|e| self.eval(e).map(Cow::into_owned))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Cow::Owned(Value::List(values)))
            }
            Expr::Dict(entries) => {
                self.check_len(entries.len())?;
                let mut out = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = self.eval(k)?.into_owned();
                    let value = self.eval(v)?.into_owned();
                    insert_entry(&mut out, key, value)?;
                }
                Ok(Cow::Owned(Value::Dict(out)))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, &value).map(Cow::Owned)
            }
            Expr::Binary { .. } => self.binary_chain(expr),
            Expr::Logical { op, operands } => {
                // The deciding operand is the result, not a bool.
                let mut last = Cow::Owned(Value::None);
                for operand in operands {
                    last = self.eval(operand)?;
                    let truthy = last.is_truthy();
                    match op {
                        LogicalOp::And if !truthy => break,
                        LogicalOp::Or if truthy => break,
                        _ => {}
                    }
                }
                Ok(last)
            }
            Expr::Compare { left, comparisons } => {
                let mut lhs = self.eval(left)?;
                for (op, right) in comparisons {
                    let rhs = self.eval(right)?;
                    if !self.comparison(*op, &lhs, &rhs)? {
                        return Ok(Cow::Owned(Value::Bool(false)));
                    }
                    lhs = rhs;
                }
                Ok(Cow::Owned(Value::Bool(true)))
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call {
                function,
                args,
                kwargs,
            } => {
                let callee = self.lookup(function)?;
                let Value::Builtin(builtin) = callee.as_ref() else {
                    return Err(EvalError::Type(format!(
                        "'{}' object is not callable",
                        callee.type_name()
                    )));
                };
                let builtin = *builtin;
                if let (
                    Builtin::Any | Builtin::All,
                    [Expr::Comprehension { element, clauses }],
                    [],
                ) = (builtin, args.as_slice(), kwargs.as_slice())
                {
                    let found = self.any_all(builtin, element, clauses)?;
                    return Ok(Cow::Owned(Value::Bool(found)));
                }
                let values = self.eval_args(args)?;
                let keywords = self.eval_kwargs(kwargs)?;
                self.call_builtin(builtin, values, keywords).map(Cow::Owned)
            }
            Expr::Index { .. } | Expr::Slice { .. } | Expr::MethodCall { .. } => {
                self.postfix_chain(expr)
            }
            Expr::Comprehension { element, clauses } => {
                let limit = self.limits.max_collection_len;
                let mut items = Vec::new();
                self.comprehend(element, clauses, &mut |value| {
                    if items.len() >= limit {
                        return Err(EvalError::TooLarge(limit));
                    }
                    items.push(value.into_owned());
                    Ok(true)
                })?;
                Ok(Cow::Owned(Value::List(items)))
            }
        }
    }

    fn lookup(&self, name: &str) -> Eval<'a> {
        if let Some((_, value)) = self.scopes.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        if name == TOOL_OUTPUT {
            return Ok(Cow::Borrowed(self.tool_output));
        }
        Builtin::lookup(name)
            .map(|b| Cow::Owned(Value::Builtin(b)))
            .ok_or_else(|| EvalError::UndefinedName(name.to_string()))
    }

    fn eval_args(&mut self, args: &'a [Expr]) -> Result<Vec<Cow<'a, Value>>, EvalError> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn eval_kwargs(&mut self, kwargs: &'a [(String, Expr)]) -> Result<Keywords<'a>, EvalError> {
        kwargs
            .iter()
            .map(|(name, e)| Ok((name.as_str(), self.eval(e)?)))
            .collect()
    }

    /// `a + b - c * d ...`: the left spine is walked in a loop, so a long
    /// flat chain costs one level of recursion.
    fn binary_chain(&mut self, expr: &'a Expr) -> Eval<'a> {
        let mut links = Vec::new();
        let mut node = expr;
        while let Expr::Binary { op, left, right } = node {
            links.push((*op, right.as_ref()));
            node = left.as_ref();
        }
        let mut value = self.eval(node)?;
        for (op, right) in links.into_iter().rev() {
            self.charge(1)?;
            let rhs = self.eval(right)?;
            value = Cow::Owned(self.binary(op, &value, &rhs)?);
        }
        Ok(value)
    }

    /// `x['a'][0].get('b')...`, applied innermost first.
    fn postfix_chain(&mut self, expr: &'a Expr) -> Eval<'a> {
        let mut links = Vec::new();
        let mut node = expr;
        while let Some(target) = node.postfix_target() {
            links.push(node);
            node = target;
        }
        let mut value = self.eval(node)?;
        for link in links.into_iter().rev() {
            self.charge(1)?;
            value = self.postfix(link, value)?;
        }
        Ok(value)
    }

    fn postfix(&mut self, link: &'a Expr, container: Cow<'a, Value>) -> Eval<'a> {
        match link {
            Expr::Index { index, .. } => {
                let key = self.eval(index)?;
                if matches!(container.as_ref(), Value::Str(_) | Value::Dict(_)) {
                    self.charge(scan_cost(&container))?;
                }
                subscript(container, &key)
            }
            Expr::Slice {
                start, stop, step, ..
            } => {
                let start = self.slice_bound(start.as_deref())?;
                let stop = self.slice_bound(stop.as_deref())?;
                let step = self.slice_bound(step.as_deref())?.unwrap_or(1);
                if step == 0 {
                    return Err(EvalError::Value("slice step cannot be zero".into()));
                }
                self.slice(&container, start, stop, step).map(Cow::Owned)
            }
            Expr::MethodCall {
                method,
                args,
                kwargs,
                ..
            } => {
                let values = self.eval_args(args)?;
                let keywords = self.eval_kwargs(kwargs)?;
                self.call_method(container, *method, values, keywords)
            }
            // `postfix_target` only yields the forms above.
            _ => Ok(container),
        }
    }

    /// Materialize `value` for iteration.
    fn items(&mut self, value: Cow<'a, Value>) -> Result<Vec<Cow<'a, Value>>, EvalError> {
        if let Value::Str(s) = value.as_ref() {
            self.charge(str_cost(s))?;
            // Every consumer pays a step per item, so characters past the
            // remaining budget can never be reached.
            let remaining = self.limits.max_steps.saturating_sub(self.steps);
            let reachable = usize::try_from(remaining).unwrap_or(usize::MAX).saturating_add(1);
            return Ok(s
                .chars()
                .take(reachable)
                .map(|c| Cow::Owned(Value::Str(c.to_string())))
                .collect());
        }
        iterate(value)
    }

    /// Drive the `for` clauses of a comprehension, outermost first, handing
    /// each produced element to `sink`. Returns `false` once `sink` asks to
    /// stop.
    fn comprehend<F>(
        &mut self,
        element: &'a Expr,
        clauses: &'a [Clause],
        sink: &mut F,
    ) -> Result<bool, EvalError>
    where
        F: FnMut(Cow<'a, Value>) -> Result<bool, EvalError>,
    {
        let Some((clause, rest)) = clauses.split_first() else {
            let value = self.eval(element)?;
            return sink(value);
        };
        let source = self.eval(&clause.iter)?;
        for item in self.items(source)? {
            self.charge(1)?;
            let mark = self.scopes.len();
            let proceed = self
                .bind(&clause.targets, item)
                .and_then(|()| self.passes(&clause.filters))
                .and_then(|passed| {
                    if passed {
                        self.comprehend(element, rest, sink)
                    } else {
                        Ok(true)
                    }
                });
            self.scopes.truncate(mark);
            if !proceed? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn passes(&mut self, filters: &'a [Expr]) -> Result<bool, EvalError> {
        for filter in filters {
            if !self.eval(filter)?.is_truthy() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn bind(&mut self, targets: &[String], item: Cow<'a, Value>) -> Result<(), EvalError> {
        if let [name] = targets {
            self.scopes.push((name.clone(), item));
            return Ok(());
        }
        let parts: Vec<Cow<'a, Value>> = match item {
            Cow::Borrowed(Value::List(items)) => items.iter().map(Cow::Borrowed).collect(),
            Cow::Owned(Value::List(items)) => items.into_iter().map(Cow::Owned).collect(),
            other => {
                return Err(EvalError::Type(format!(
                    "cannot unpack non-sequence {}",
                    other.type_name()
                )));
            }
        };
        if parts.len() != targets.len() {
            return Err(EvalError::Value(format!(
                "expected {} values to unpack, got {}",
                targets.len(),
                parts.len()
            )));
        }
        for (name, part) in targets.iter().zip(parts) {
            self.scopes.push((name.clone(), part));
        }
        Ok(())
    }

    /// `any(...)` / `all(...)` over a generator stop at the first deciding
    /// element, so later elements are never evaluated.
    fn any_all(
        &mut self,
        builtin: Builtin,
        element: &'a Expr,
        clauses: &'a [Clause],
    ) -> Result<bool, EvalError> {
        let looking_for = builtin == Builtin::Any;
        let mut found = false;
        self.comprehend(element, clauses, &mut |value| {
            if value.is_truthy() == looking_for {
                found = true;
                Ok(false)
            } else {
                Ok(true)
            }
        })?;
        Ok(if looking_for { found } else { !found })
    }

    fn slice_bound(&mut self, expr: Option<&'a Expr>) -> Result<Option<i64>, EvalError> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval(expr)?.as_ref() {
            Value::None => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            other => Err(EvalError::Type(format!(
                "slice indices must be integers or None, not '{}'",
                other.type_name()
            ))),
        }
    }

    fn slice(
        &mut self,
        container: &Value,
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    ) -> Result<Value, EvalError> {
        match container {
            Value::Str(s) => {
                self.charge(str_cost(s))?;
                let chars: Vec<char> = s.chars().collect();
                let picked = slice_indices(chars.len(), start, stop, step);
                self.charge(picked.len())?;
                Ok(Value::Str(picked.into_iter().map(|i| chars[i]).collect()))
            }
            Value::List(items) => {
                let picked = slice_indices(items.len(), start, stop, step);
                self.charge(picked.len())?;
                Ok(Value::List(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            other => Err(EvalError::Type(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// A comparison stops at the shorter operand; membership scans the
    /// whole container.
    fn comparison(
        &mut self,
        op: CompareOp,
        left: &Value,
        right: &Value,
    ) -> Result<bool, EvalError> {
        let cost = match op {
            CompareOp::In | CompareOp::NotIn => scan_cost(right),
            CompareOp::Is | CompareOp::IsNot => 0,
            _ => scan_cost(left).min(scan_cost(right)),
        };
        self.charge(cost)?;
        compare(op, left, right)
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return arithmetic(op, a, b);
        }
        match (op, left, right) {
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
                self.check_len(a.len() + b.len())?;
                self.charge(str_cost(a) + str_cost(b))?;
                Ok(Value::Str(format!("{a}{b}")))
            }
            (BinaryOp::Add, Value::List(a), Value::List(b)) => {
                self.check_len(a.len() + b.len())?;
                self.charge(a.len() + b.len())?;
                Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            (BinaryOp::Mul, Value::Str(s), Value::Int(n))
            | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
                let count = usize::try_from(*n).unwrap_or(0);
                let total = s.len().saturating_mul(count);
                self.check_len(total)?;
                self.charge(total.div_ceil(STR_BYTES_PER_STEP))?;
                Ok(Value::Str(s.repeat(count)))
            }
            (BinaryOp::Mul, Value::List(items), Value::Int(n))
            | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
                let count = usize::try_from(*n).unwrap_or(0);
                let total = items.len().saturating_mul(count);
                self.check_len(total)?;
                self.charge(total)?;
                Ok(Value::List(
                    std::iter::repeat_n(items, count).flatten().cloned().collect(),
                ))
            }
            _ => Err(EvalError::Type(format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                binary_symbol(op),
                left.type_name(),
                right.type_name()
            ))),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Cow<'a, Value>>,
        kwargs: Keywords<'a>,
    ) -> Result<Value, EvalError> {
        let name = builtin.name();
        if !kwargs.is_empty() && !matches!(builtin, Builtin::Min | Builtin::Max | Builtin::Sum) {
            return Err(no_keywords(name));
        }
        match builtin {
            Builtin::Len => {
                arity(name, &args, 1, 1)?;
                let len = match args[0].as_ref() {
                    Value::Str(s) => {
                        self.charge(str_cost(s))?;
                        s.chars().count()
                    }
                    Value::List(items) => items.len(),
                    Value::Dict(entries) => entries.len(),
                    other => {
                        return Err(EvalError::Type(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Builtin::All | Builtin::Any => {
                let items = self.single_iterable(name, args)?;
                let result = if builtin == Builtin::Any {
                    items.iter().any(|v| v.is_truthy())
                } else {
                    items.iter().all(|v| v.is_truthy())
                };
                Ok(Value::Bool(result))
            }
            Builtin::IsInstance => {
                arity(name, &args, 2, 2)?;
                let classes = type_list(&args[1])?;
                Ok(Value::Bool(classes.into_iter().any(|c| instance_of(&args[0], c))))
            }
            Builtin::Str => {
                arity(name, &args, 0, 1)?;
                let text = args.first().map(|v| v.to_string()).unwrap_or_default();
                self.charge(str_cost(&text))?;
                Ok(Value::Str(text))
            }
            Builtin::Int => {
                arity(name, &args, 0, 1)?;
                args.first().map_or(Ok(Value::Int(0)), |v| to_int(v))
            }
            Builtin::Float => {
                arity(name, &args, 0, 1)?;
                args.first().map_or(Ok(Value::Float(0.0)), |v| to_float(v))
            }
            Builtin::Bool => {
                arity(name, &args, 0, 1)?;
                Ok(Value::Bool(args.first().is_some_and(|v| v.is_truthy())))
            }
            Builtin::List => {
                arity(name, &args, 0, 1)?;
                if args.is_empty() {
                    return Ok(Value::List(Vec::new()));
                }
                let items = self.single_iterable(name, args)?;
                Ok(Value::List(items.into_iter().map(Cow::into_owned).collect()))
            }
            Builtin::Dict => {
                arity(name, &args, 0, 1)?;
                match args.into_iter().next() {
                    None => Ok(Value::Dict(Vec::new())),
                    Some(arg) => self.to_dict(arg.into_owned()),
                }
            }
            Builtin::Min | Builtin::Max => self.extreme(builtin, args, kwargs),
            Builtin::Sum => {
                let args = with_keywords(name, args, kwargs, 1, &[("start", Value::Int(0))])?;
                arity(name, &args, 1, 2)?;
                let mut args = args.into_iter();
                let iterable = args.next().unwrap_or(Cow::Owned(Value::None));
                let mut total = args.next().map(Cow::into_owned).unwrap_or(Value::Int(0));
                if matches!(total, Value::Str(_)) {
                    return Err(EvalError::Type("sum() can't sum strings".into()));
                }
                let items = self.items(iterable)?;
                self.charge(items.len())?;
                for item in items {
                    total = self.binary(BinaryOp::Add, &total, &item)?;
                }
                Ok(total)
            }
            Builtin::Abs => {
                arity(name, &args, 1, 1)?;
                match args[0].as_number() {
                    Some(Number::Int(i)) => {
                        i.checked_abs().map(Value::Int).ok_or(EvalError::Overflow)
                    }
                    Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                    None => Err(EvalError::Type(format!(
                        "bad operand type for abs(): '{}'",
                        args[0].type_name()
                    ))),
                }
            }
        }
    }

    /// `min` / `max`, with the optional `key=` callable and `default=`
    /// fallback for an empty iterable. Ties keep the first candidate.
    fn extreme(
        &mut self,
        builtin: Builtin,
        args: Vec<Cow<'a, Value>>,
        kwargs: Keywords<'a>,
    ) -> Result<Value, EvalError> {
        let name = builtin.name();
        let mut key = None;
        let mut default = None;
        for (keyword, value) in kwargs {
            match keyword {
                "key" => key = Some(value),
                "default" => default = Some(value),
                other => return Err(unexpected_keyword(name, other)),
            }
        }
        arity(name, &args, 1, usize::MAX)?;
        let key = match key.as_deref() {
            None | Some(Value::None) => None,
            Some(Value::Builtin(f)) => Some(*f),
            Some(other) => {
                return Err(EvalError::Type(format!(
                    "'{}' object is not callable",
                    other.type_name()
                )));
            }
        };
        let mut candidates = if args.len() == 1 {
            self.single_iterable(name, args)?
        } else if default.is_some() {
            return Err(EvalError::Type(format!(
                "Cannot specify a default for {name}() with multiple positional arguments"
            )));
        } else {
            args
        };
        if candidates.is_empty() {
            return default
                .map(Cow::into_owned)
                .ok_or_else(|| EvalError::Value(format!("{name}() arg is an empty sequence")));
        }
        let ranks = match key {
            Some(f) => Some(
                candidates
                    .iter()
                    .map(|c| self.call_builtin(f, vec![c.clone()], Vec::new()))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        let wanted = if builtin == Builtin::Min {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        let mut best = 0;
        for i in 1..candidates.len() {
            let (challenger, leader) = match &ranks {
                Some(ranks) => (&ranks[i], &ranks[best]),
                None => (candidates[i].as_ref(), candidates[best].as_ref()),
            };
            self.charge(scan_cost(challenger).min(scan_cost(leader)))?;
            let ord = challenger
                .loose_cmp(leader)
                .map_err(|()| unorderable(CompareOp::Lt, challenger, leader))?;
            if ord == Some(wanted) {
                best = i;
            }
        }
        Ok(candidates.swap_remove(best).into_owned())
    }

    fn single_iterable(
        &mut self,
        name: &str,
        args: Vec<Cow<'a, Value>>,
    ) -> Result<Vec<Cow<'a, Value>>, EvalError> {
        arity(name, &args, 1, 1)?;
        let items = match args.into_iter().next() {
            Some(arg) => self.items(arg)?,
            None => Vec::new(),
        };
        self.charge(items.len())?;
        Ok(items)
    }

    fn to_dict(&mut self, arg: Value) -> Result<Value, EvalError> {
        match arg {
            Value::Dict(entries) => Ok(Value::Dict(entries)),
            Value::List(pairs) => {
                self.charge(pairs.len())?;
                let mut out = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    match pair {
                        Value::List(mut kv) if kv.len() == 2 => {
                            let value = kv.pop().unwrap_or(Value::None);
                            let key = kv.pop().unwrap_or(Value::None);
                            insert_entry(&mut out, key, value)?;
                        }
                        _ => {
                            return Err(EvalError::Type(
                                "dict() needs a sequence of key/value pairs".into(),
                            ));
                        }
                    }
                }
                Ok(Value::Dict(out))
            }
            other => Err(EvalError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    fn call_method(
        &mut self,
        target: Cow<'a, Value>,
        method: Method,
        args: Vec<Cow<'a, Value>>,
        kwargs: Keywords<'a>,
    ) -> Eval<'a> {
        let name = method.name();
        let args = match (target.as_ref(), method) {
            (Value::Str(_), Method::Split) => with_keywords(
                name,
                args,
                kwargs,
                0,
                &[("sep", Value::None), ("maxsplit", Value::Int(-1))],
            )?,
            (Value::Str(_), Method::Replace) => {
                with_keywords(name, args, kwargs, 2, &[("count", Value::Int(-1))])?
            }
            _ if kwargs.is_empty() => args,
            _ => return Err(no_keywords(name)),
        };
        if method == Method::Get {
            arity(name, &args, 1, 2)?;
            let key = &args[0];
            if !key.is_hashable() {
                return Err(unhashable(key));
            }
            self.charge(scan_cost(&target))?;
            let found = match target {
                Cow::Borrowed(Value::Dict(entries)) => {
                    dict_lookup(entries, key).map(Cow::Borrowed)
                }
                Cow::Owned(Value::Dict(entries)) => {
                    dict_lookup(&entries, key).cloned().map(Cow::Owned)
                }
                other => return Err(no_attribute(&other, method)),
            };
            return Ok(match found {
                Some(value) => value,
                None => args.into_iter().nth(1).unwrap_or(Cow::Owned(Value::None)),
            });
        }
        self.method_value(&target, method, &args).map(Cow::Owned)
    }

    fn method_value(
        &mut self,
        target: &Value,
        method: Method,
        args: &[Cow<'a, Value>],
    ) -> Result<Value, EvalError> {
        let name = method.name();
        if let Value::Str(s) = target {
            // Affix checks only look at the ends; everything else walks the string.
            if !matches!(method, Method::StartsWith | Method::EndsWith) {
                self.charge(str_cost(s))?;
            }
        }
        match (target, method) {
            (Value::Str(s), Method::Lower) => {
                arity(name, args, 0, 0)?;
                Ok(Value::Str(s.to_lowercase()))
            }
            (Value::Str(s), Method::Upper) => {
                arity(name, args, 0, 0)?;
                Ok(Value::Str(s.to_uppercase()))
            }
            (Value::Str(s), Method::Strip | Method::Lstrip | Method::Rstrip) => {
                arity(name, args, 0, 1)?;
                let set: Option<Vec<char>> = match args.first().map(|a| a.as_ref()) {
                    None | Some(Value::None) => None,
                    Some(Value::Str(chars)) => {
                        self.charge(str_cost(chars))?;
                        let mut set: Vec<char> = chars.chars().collect();
                        set.sort_unstable();
                        set.dedup();
                        Some(set)
                    }
                    Some(other) => {
                        return Err(EvalError::Type(format!(
                            "{name} arg must be None or str, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                let strip = |c: char| match &set {
                    Some(set) => set.binary_search(&c).is_ok(),
                    None => c.is_whitespace(),
                };
                let out = match method {
                    Method::Strip => s.trim_matches(strip),
                    Method::Lstrip => s.trim_start_matches(strip),
                    _ => s.trim_end_matches(strip),
                };
                Ok(Value::Str(out.to_string()))
            }
            (Value::Str(s), Method::StartsWith | Method::EndsWith) => {
                arity(name, args, 1, 1)?;
                let affixes = str_or_strs(name, &args[0])?;
                self.charge(affixes.iter().map(|a| str_cost(a)).sum())?;
                let hit = affixes.iter().any(|a| {
                    if method == Method::StartsWith {
                        s.starts_with(*a)
                    } else {
                        s.ends_with(*a)
                    }
                });
                Ok(Value::Bool(hit))
            }
            (Value::Str(s), Method::Split) => {
                arity(name, args, 0, 2)?;
                let sep = match args.first().map(|a| a.as_ref()) {
                    None | Some(Value::None) => None,
                    Some(Value::Str(sep)) if sep.is_empty() => {
                        return Err(EvalError::Value("empty separator".into()));
                    }
                    Some(Value::Str(sep)) => Some(sep.as_str()),
                    Some(other) => {
                        return Err(EvalError::Type(format!(
                            "must be str or None, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                let max_split = match args.get(1).map(|a| a.as_ref()) {
                    None => None,
                    Some(Value::Int(n)) => usize::try_from(*n).ok(),
                    Some(other) => {
                        return Err(EvalError::Type(format!(
                            "maxsplit must be an integer, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                let parts = split(s, sep, max_split);
                self.check_len(parts.len())?;
                self.charge(parts.len())?;
                Ok(Value::List(parts.into_iter().map(Value::Str).collect()))
            }
            (Value::Str(s), Method::Count) => {
                arity(name, args, 1, 1)?;
                let sub = str_arg(name, &args[0])?;
                Ok(Value::Int(s.matches(sub).count() as i64))
            }
            (Value::Str(s), Method::Find | Method::Index) => {
                arity(name, args, 1, 1)?;
                let sub = str_arg(name, &args[0])?;
                match s.find(sub) {
                    Some(byte) => Ok(Value::Int(s[..byte].chars().count() as i64)),
                    None if method == Method::Find => Ok(Value::Int(-1)),
                    None => Err(EvalError::Value("substring not found".into())),
                }
            }
            (Value::Str(s), Method::Replace) => {
                arity(name, args, 2, 3)?;
                let old = str_arg(name, &args[0])?;
                let new = str_arg(name, &args[1])?;
                let limit = match args.get(2).map(|a| a.as_ref()) {
                    None => None,
                    Some(Value::Int(n)) => usize::try_from(*n).ok(),
                    Some(other) => {
                        return Err(EvalError::Type(format!(
                            "replace count must be an integer, not '{}'",
                            other.type_name()
                        )));
                    }
                };
                let mut occurrences = if old.is_empty() {
                    s.chars().count() + 1
                } else {
                    s.matches(old).count()
                };
                if let Some(limit) = limit {
                    occurrences = occurrences.min(limit);
                }
                let len = s.len().saturating_add(occurrences.saturating_mul(new.len()));
                self.check_len(len)?;
                self.charge(len.div_ceil(STR_BYTES_PER_STEP))?;
                Ok(Value::Str(match limit {
                    Some(limit) => s.replacen(old, new, limit),
                    None => s.replace(old, new),
                }))
            }
            (Value::Dict(entries), Method::Keys | Method::Values | Method::Items) => {
                arity(name, args, 0, 0)?;
                self.charge(entries.len())?;
                let items = entries
                    .iter()
                    .map(|(k, v)| match method {
                        Method::Keys => k.clone(),
                        Method::Values => v.clone(),
                        _ => Value::List(vec![k.clone(), v.clone()]),
                    })
                    .collect();
                Ok(Value::List(items))
            }
            (Value::List(items), Method::Count) => {
                arity(name, args, 1, 1)?;
                self.charge(items.len())?;
                Ok(Value::Int(items.iter().filter(|v| v.loose_eq(&args[0])).count() as i64))
            }
            (Value::List(items), Method::Index) => {
                arity(name, args, 1, 1)?;
                self.charge(items.len())?;
                items
                    .iter()
                    .position(|v| v.loose_eq(&args[0]))
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| EvalError::Value(format!("{} is not in list", args[0].repr())))
            }
            _ => Err(no_attribute(target, method)),
        }
    }
}

// ─── Operators ───────────────────────────────────────────────────────

fn unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value.as_number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Some(Number::Int(i))) => {
            i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow)
        }
        (UnaryOp::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(n)) => Ok(n.into_value()),
        (_, None) => Err(EvalError::Type(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            value.type_name()
        ))),
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
    }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Value, EvalError> {
    match (op, a, b) {
        (BinaryOp::Div, _, _) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Ok(Value::Float(a.as_f64() / divisor))
        }
        (_, Number::Int(x), Number::Int(y)) => int_arithmetic(op, x, y),
        _ => float_arithmetic(op, a.as_f64(), b.as_f64()),
    }
}

fn int_arithmetic(op: BinaryOp, x: i64, y: i64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(EvalError::ZeroDivision);
            }
            x.checked_div(y)
                .map(|q| if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q })
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(EvalError::ZeroDivision);
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Some(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        BinaryOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(EvalError::ZeroDivision);
                }
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            u32::try_from(y).ok().and_then(|e| x.checked_pow(e))
        }
        BinaryOp::Div => return float_arithmetic(op, x as f64, y as f64),
    };
    result.map(Value::Int).ok_or(EvalError::Overflow)
}

fn float_arithmetic(op: BinaryOp, x: f64, y: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => {
            return Err(EvalError::ZeroDivision);
        }
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(EvalError::Value(
                    "negative number cannot be raised to a fractional power".into(),
                ));
            }
            let r = x.powf(y);
            if r.is_infinite() && x.is_finite() && y.is_finite() {
                return Err(EvalError::Overflow);
            }
            r
        }
    };
    Ok(Value::Float(result))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(left.loose_eq(right)),
        CompareOp::NotEq => Ok(!left.loose_eq(right)),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Is => Ok(identical(left, right)),
        CompareOp::IsNot => Ok(!identical(left, right)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let Some(ord) = left
                .loose_cmp(right)
                .map_err(|()| unorderable(op, left, right))?
            else {
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Le => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
    }
}

/// Identity only exists for the singletons.
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        _ => false,
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|v| v.loose_eq(item))),
        Value::Dict(entries) => {
            if !item.is_hashable() {
                return Err(unhashable(item));
            }
            Ok(dict_lookup(entries, item).is_some())
        }
        other => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

// ─── Containers ──────────────────────────────────────────────────────

/// Steps charged for one linear pass over `value`.
fn scan_cost(value: &Value) -> usize {
    match value {
        Value::Str(s) => str_cost(s),
        Value::List(items) => items.len(),
        Value::Dict(entries) => entries.len(),
        _ => 0,
    }
}

fn str_cost(s: &str) -> usize {
    s.len().div_ceil(STR_BYTES_PER_STEP)
}

/// Items of a list, or keys of a dict. Strings are split into characters by
/// the interpreter, which charges for them.
fn iterate(value: Cow<'_, Value>) -> Result<Vec<Cow<'_, Value>>, EvalError> {
    match value {
        Cow::Borrowed(v) => match v {
            Value::List(items) => Ok(items.iter().map(Cow::Borrowed).collect()),
            Value::Dict(entries) => Ok(entries.iter().map(|(k, _)| Cow::Borrowed(k)).collect()),
            other => Err(not_iterable(other)),
        },
        Cow::Owned(v) => match v {
            Value::List(items) => Ok(items.into_iter().map(Cow::Owned).collect()),
            Value::Dict(entries) => Ok(entries.into_iter().map(|(k, _)| Cow::Owned(k)).collect()),
            other => Err(not_iterable(&other)),
        },
    }
}

fn insert_entry(
    entries: &mut Vec<(Value, Value)>,
    key: Value,
    value: Value,
) -> Result<(), EvalError> {
    if !key.is_hashable() {
        return Err(unhashable(&key));
    }
    match entries.iter_mut().find(|(k, _)| k.loose_eq(&key)) {
        Some((_, slot)) => *slot = value,
        None => entries.push((key, value)),
    }
    Ok(())
}

fn subscript<'a>(container: Cow<'a, Value>, key: &Value) -> Eval<'a> {
    if let Value::Str(s) = container.as_ref() {
        let index = int_index(key, "string")?;
        let pos = normalize_index(index, s.chars().count())
            .ok_or_else(|| EvalError::Index("string index out of range".into()))?;
        let ch = s.chars().nth(pos).map(String::from).unwrap_or_default();
        return Ok(Cow::Owned(Value::Str(ch)));
    }
    match container {
        Cow::Borrowed(v) => item(v, key).map(Cow::Borrowed),
        Cow::Owned(v) => item(&v, key).map(|found| Cow::Owned(found.clone())),
    }
}

fn item<'v>(container: &'v Value, key: &Value) -> Result<&'v Value, EvalError> {
    match container {
        Value::List(items) => {
            let index = int_index(key, "list")?;
            normalize_index(index, items.len())
                .map(|i| &items[i])
                .ok_or_else(|| EvalError::Index("list index out of range".into()))
        }
        Value::Dict(entries) => {
            if !key.is_hashable() {
                return Err(unhashable(key));
            }
            dict_lookup(entries, key).ok_or_else(|| EvalError::Key(key.repr()))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn int_index(key: &Value, kind: &str) -> Result<i64, EvalError> {
    match key {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(EvalError::Type(format!(
            "{kind} indices must be integers, not '{}'",
            other.type_name()
        ))),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let adjust = |i: i64| if i < 0 { i + len } else { i };
    if step > 0 {
        let start = start.map_or(0, |s| adjust(s).clamp(0, len));
        let stop = stop.map_or(len, |s| adjust(s).clamp(0, len));
        (start..stop)
            .step_by(step.unsigned_abs() as usize)
            .map(|i| i as usize)
            .collect()
    } else {
        let start = start.map_or(len - 1, |s| adjust(s).clamp(-1, len - 1));
        let stop = stop.map_or(-1, |s| adjust(s).clamp(-1, len - 1));
        let mut out = Vec::new();
        let mut i = start;
        while i > stop {
            out.push(i as usize);
            i += step;
        }
        out
    }
}

fn split(s: &str, sep: Option<&str>, max_split: Option<usize>) -> Vec<String> {
    match (sep, max_split) {
        (Some(sep), Some(max)) => s.splitn(max + 1, sep).map(String::from).collect(),
        (Some(sep), None) => s.split(sep).map(String::from).collect(),
        (None, max) => {
            let mut parts = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() {
                if max.is_some_and(|m| parts.len() >= m) {
                    parts.push(rest.to_string());
                    break;
                }
                match rest.find(char::is_whitespace) {
                    Some(i) => {
                        parts.push(rest[..i].to_string());
                        rest = rest[i..].trim_start();
                    }
                    None => {
                        parts.push(rest.to_string());
                        break;
                    }
                }
            }
            parts
        }
    }
}

// ─── Builtin helpers ─────────────────────────────────────────────────

fn arity(name: &str, args: &[Cow<'_, Value>], min: usize, max: usize) -> Result<(), EvalError> {
    let given = args.len();
    if (min..=max).contains(&given) {
        return Ok(());
    }
    let expected = match (min, max) {
        (0, 0) => "no arguments".to_string(),
        (1, 1) => "exactly one argument".to_string(),
        (a, b) if a == b => format!("exactly {a} arguments"),
        (a, usize::MAX) => format!("at least {a} argument{}", if a == 1 { "" } else { "s" }),
        (a, b) => format!("{a} to {b} arguments"),
    };
    Err(EvalError::Type(format!("{name}() takes {expected} ({given} given)")))
}

/// Fold keyword arguments into positional slots. `params` names the
/// parameters, from position `first` on, that may be passed by keyword; a
/// slot skipped over takes the listed default.
fn with_keywords<'a>(
    name: &str,
    mut args: Vec<Cow<'a, Value>>,
    kwargs: Keywords<'a>,
    first: usize,
    params: &[(&str, Value)],
) -> Result<Vec<Cow<'a, Value>>, EvalError> {
    if kwargs.is_empty() {
        return Ok(args);
    }
    if args.len() < first {
        return Err(EvalError::Type(format!(
            "{name}() missing required positional arguments"
        )));
    }
    if args.len() > first + params.len() {
        return Err(EvalError::Type(format!(
            "{name}() takes at most {} arguments ({} given)",
            first + params.len(),
            args.len() + kwargs.len()
        )));
    }
    let mut slots: Vec<Option<Cow<'a, Value>>> =
        args.split_off(first).into_iter().map(Some).collect();
    slots.resize(params.len(), None);
    for (keyword, value) in kwargs {
        let Some(pos) = params.iter().position(|(param, _)| *param == keyword) else {
            return Err(unexpected_keyword(name, keyword));
        };
        if slots[pos].is_some() {
            return Err(EvalError::Type(format!(
                "{name}() got multiple values for argument '{keyword}'"
            )));
        }
        slots[pos] = Some(value);
    }
    while slots.last().is_some_and(Option::is_none) {
        slots.pop();
    }
    args.extend(
        slots
            .into_iter()
            .zip(params)
            .map(|(slot, (_, default))| slot.unwrap_or_else(|| Cow::Owned(default.clone()))),
    );
    Ok(args)
}

fn str_arg<'v>(name: &str, value: &'v Value) -> Result<&'v str, EvalError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::Type(format!(
            "{name}() argument must be str, not '{}'",
            other.type_name()
        ))),
    }
}

fn str_or_strs<'v>(name: &str, value: &'v Value) -> Result<Vec<&'v str>, EvalError> {
    match value {
        Value::Str(s) => Ok(vec![s.as_str()]),
        Value::List(items) => items.iter().map(|v| str_arg(name, v)).collect(),
        other => Err(EvalError::Type(format!(
            "{name} first arg must be str or a tuple of str, not '{}'",
            other.type_name()
        ))),
    }
}

fn type_list(value: &Value) -> Result<Vec<Builtin>, EvalError> {
    let as_type = |v: &Value| match v {
        Value::Builtin(b) if b.is_type() => Ok(*b),
        _ => Err(EvalError::Type(
            "isinstance() arg 2 must be a type or tuple of types".into(),
        )),
    };
    match value {
        Value::List(items) => items.iter().map(as_type).collect(),
        other => Ok(vec![as_type(other)?]),
    }
}

fn instance_of(value: &Value, class: Builtin) -> bool {
    matches!(
        (class, value),
        (Builtin::Str, Value::Str(_))
            | (Builtin::Int, Value::Int(_) | Value::Bool(_))
            | (Builtin::Float, Value::Float(_))
            | (Builtin::Bool, Value::Bool(_))
            | (Builtin::List, Value::List(_))
            | (Builtin::Dict, Value::Dict(_))
    )
}

fn to_int(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(EvalError::Value(format!("cannot convert float {value} to integer")));
            }
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(EvalError::Overflow);
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::Value(format!("invalid literal for int(): {}", value.repr()))),
        other => Err(EvalError::Type(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| {
                EvalError::Value(format!("could not convert string to float: {}", value.repr()))
            }),
        other => match other.as_number() {
            Some(n) => Ok(Value::Float(n.as_f64())),
            None => Err(EvalError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn no_keywords(name: &str) -> EvalError {
    EvalError::Type(format!("{name}() takes no keyword arguments"))
}

fn unexpected_keyword(name: &str, keyword: &str) -> EvalError {
    EvalError::Type(format!("{name}() got an unexpected keyword argument '{keyword}'"))
}

fn unhashable(value: &Value) -> EvalError {
    EvalError::Type(format!("unhashable type: '{}'", value.type_name()))
}

fn not_iterable(value: &Value) -> EvalError {
    EvalError::Type(format!("'{}' object is not iterable", value.type_name()))
}

fn no_attribute(value: &Value, method: Method) -> EvalError {
    EvalError::Type(format!(
        "'{}' object has no method '{}'",
        value.type_name(),
        method.name()
    ))
}

fn unorderable(op: CompareOp, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "'{}' not supported between instances of '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

// ─── Tests ──────────────────────────────────────────────────────────
