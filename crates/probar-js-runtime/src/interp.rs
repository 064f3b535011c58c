//! Tree-walking evaluator.
//!
//! Statements run against a [`Scope`] chain. `var` and function
//! declarations are hoisted to the enclosing function scope before its body
//! runs; `let`/`const` bind in the scope where they execute. Control flow
//! (`return`, labelled or plain `break` and `continue`) travels as a
//! [`Completion`]; exceptions travel as `Err(RuntimeError)`.
//!
//! Both recursive walks grow the native stack on demand, so the depth a
//! script can reach is bounded by the parser's nesting limit and
//! [`MAX_CALL_DEPTH`] rather than by the host thread's stack size.

use crate::error::{Result, RuntimeError};
use crate::runtime::{Runtime, MAX_CALL_DEPTH};
use crate::scope::{Resolved, Scope};
use crate::value::{FunctionKind, JsRegExp, Object, ObjectRef, Property, Value};
use probar_js::hir::*;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Remaining stack below which evaluation moves to a fresh segment.
const STACK_RED_ZONE: usize = 64 * 1024;

/// Size of each segment allocated when the red zone is hit.
const STACK_SIZE: usize = 1024 * 1024;

/// How a statement finished.
#[derive(Debug)]
pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

/// What a loop does after one run of its body.
enum LoopStep {
    Next,
    Exit,
    Propagate(Completion),
}

/// Classify a loop body's completion against the loop's own labels.
fn loop_step(completion: Completion, labels: &[&str]) -> LoopStep {
    match completion {
        Completion::Normal | Completion::Continue(None) => LoopStep::Next,
        Completion::Continue(Some(label)) if labels.contains(&label.as_str()) => LoopStep::Next,
        Completion::Break(None) => LoopStep::Exit,
        other => LoopStep::Propagate(other),
    }
}

/// An assignable location.
enum Reference {
    Binding(String),
    Property(Value, String),
}

impl Runtime {
    /// Run a script in the global scope and return the value of its last
    /// expression statement.
    ///
    /// # Example
    ///
    /// ```rust
    /// use probar_js_runtime::Runtime;
    ///
    /// let runtime = Runtime::new();
    /// let value = runtime.eval("var a = 2; a * 21").unwrap();
    /// assert_eq!(value.as_number(), Some(42.0));
    /// ```
    pub fn eval(&self, source: &str) -> Result<Value> {
        let program = probar_js::compile(source).map_err(|source| RuntimeError::Syntax {
            key: "<eval>".to_string(),
            source,
        })?;
        self.hoist(&program.body, &self.globals);

        let mut last = Value::Undefined;
        for stmt in &program.body {
            if let StmtKind::Expr(expr) = &stmt.kind {
                last = self.eval_expr(expr, &self.globals)?;
            } else if !matches!(self.exec_stmt(stmt, &self.globals)?, Completion::Normal) {
                break;
            }
        }
        Ok(last)
    }

    /// Call a function value.
    ///
    /// # Errors
    ///
    /// Returns a type error if `callee` is not callable, and whatever the
    /// function body throws.
    pub fn call(&self, callee: &Value, this: Value, args: &[Value]) -> Result<Value> {
        let Value::Function(function) = callee else {
            return Err(RuntimeError::type_error(format!(
                "{} is not a function",
                callee.to_js_string()
            )));
        };

        match &function.kind {
            FunctionKind::Native(native) => native(self, &this, args),
            FunctionKind::Bound {
                target,
                this: bound_this,
                args: bound_args,
            } => {
                let mut all = bound_args.clone();
                all.extend_from_slice(args);
                self.call(target, bound_this.clone(), &all)
            }
            FunctionKind::Script { decl, scope } => {
                let depth = self.depth.get();
                if depth >= MAX_CALL_DEPTH {
                    return Err(RuntimeError::StackOverflow);
                }
                self.depth.set(depth + 1);

                let call_scope = if decl.is_arrow {
                    Scope::arrow(scope)
                } else {
                    let call_scope = Scope::function(scope, this);
                    if let Some(name) = &decl.name {
                        call_scope.declare(name.as_str(), callee.clone());
                    }
                    call_scope.declare("arguments", Value::array(args.to_vec()));
                    call_scope
                };
                for (i, param) in decl.params.iter().enumerate() {
                    call_scope.declare(param.as_str(), args.get(i).cloned().unwrap_or_default());
                }
                self.hoist(&decl.body.body, &call_scope);
                let completion = self.exec_stmts(&decl.body.body, &call_scope);

                self.depth.set(depth);
                match completion? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    /// Apply `new` to a constructor value.
    ///
    /// The new object inherits from the constructor's `prototype`. If the
    /// constructor returns an object, that object is the result instead.
    ///
    /// # Errors
    ///
    /// Returns a type error for values that are not constructors, such as
    /// arrow functions.
    pub fn construct(&self, callee: &Value, args: &[Value]) -> Result<Value> {
        let function = match callee {
            Value::Function(function) if function.is_constructor() => function,
            _ => {
                return Err(RuntimeError::type_error(format!(
                    "{} is not a constructor",
                    callee.to_js_string()
                )))
            }
        };
        if let FunctionKind::Bound {
            target,
            args: bound_args,
            ..
        } = &function.kind
        {
            let mut all = bound_args.clone();
            all.extend_from_slice(args);
            return self.construct(target, &all);
        }

        let proto = match self.get_property(callee, "prototype")? {
            Value::Object(proto) => proto,
            _ => Rc::clone(&self.intrinsics.object),
        };
        let this = Value::Object(Rc::new(RefCell::new(Object::with_proto(proto))));
        let result = self.call(callee, this.clone(), args)?;
        Ok(if result.is_object() { result } else { this })
    }

    /// Run a module factory body with its parameters bound to `args`.
    pub(crate) fn run_factory(
        &self,
        params: &[String],
        program: &Program,
        this: Value,
        args: &[Value],
    ) -> Result<()> {
        let scope = Scope::function(&self.globals, this);
        for (i, param) in params.iter().enumerate() {
            scope.declare(param, args.get(i).cloned().unwrap_or_default());
        }
        self.hoist(&program.body, &scope);
        self.exec_stmts(&program.body, &scope)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hoisting
    // ------------------------------------------------------------------

    fn hoist(&self, stmts: &[Stmt], scope: &Scope) {
        for stmt in stmts {
            self.hoist_stmt(stmt, scope);
        }
    }

    fn hoist_stmt(&self, stmt: &Stmt, scope: &Scope) {
        match &stmt.kind {
            StmtKind::Var {
                kind: VarKind::Var,
                decls,
            } => {
                for decl in decls {
                    scope.declare_var(decl.name.as_str());
                }
            }
            StmtKind::For { init, body, .. } => {
                if let Some(ForInit::Var {
                    kind: VarKind::Var,
                    decls,
                }) = init
                {
                    for decl in decls {
                        scope.declare_var(decl.name.as_str());
                    }
                }
                self.hoist_stmt(body, scope);
            }
            StmtKind::ForIn { left, body, .. } => {
                if let ForInLeft::Var {
                    kind: VarKind::Var,
                    name,
                } = left
                {
                    scope.declare_var(name.as_str());
                }
                self.hoist_stmt(body, scope);
            }
            StmtKind::Function(function) => {
                if let Some(name) = &function.name {
                    let value = Value::script_function(Rc::clone(function), scope.clone());
                    scope.declare(name.as_str(), value);
                }
            }
            StmtKind::If {
                consequent,
                alternate,
                ..
            } => {
                self.hoist_stmt(consequent, scope);
                if let Some(alternate) = alternate {
                    self.hoist_stmt(alternate, scope);
                }
            }
            StmtKind::Block(block) => self.hoist(&block.body, scope),
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::Labeled { body, .. }
            | StmtKind::With { body, .. } => self.hoist_stmt(body, scope),
            StmtKind::Switch { cases, .. } => {
                for case in cases {
                    self.hoist(&case.consequent, scope);
                }
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.hoist(&block.body, scope);
                if let Some(handler) = handler {
                    self.hoist(&handler.body.body, scope);
                }
                if let Some(finalizer) = finalizer {
                    self.hoist(&finalizer.body, scope);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub(crate) fn exec_stmts(&self, stmts: &[Stmt], scope: &Scope) -> Result<Completion> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, scope: &Scope) -> Result<Completion> {
        self.exec_labeled(stmt, scope, &[])
    }

    /// Run `stmt`, which carries `labels` when it is the body of one or
    /// more labelled statements.
    fn exec_labeled(&self, stmt: &Stmt, scope: &Scope, labels: &[&str]) -> Result<Completion> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SIZE, || {
            self.exec_kind(stmt, scope, labels)
        })
    }

    fn exec_kind(&self, stmt: &Stmt, scope: &Scope, labels: &[&str]) -> Result<Completion> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, scope)?;
            }
            StmtKind::Var { kind, decls } => self.exec_declarations(*kind, decls, scope)?,
            StmtKind::Function(_) | StmtKind::Empty | StmtKind::Debugger => {}
            StmtKind::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Completion::Return(value));
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, scope)?.is_truthy() {
                    return self.exec_stmt(consequent, scope);
                }
                if let Some(alternate) = alternate {
                    return self.exec_stmt(alternate, scope);
                }
            }
            StmtKind::Block(block) => return self.exec_stmts(&block.body, scope),
            StmtKind::While { test, body } => {
                while self.eval_expr(test, scope)?.is_truthy() {
                    match loop_step(self.exec_stmt(body, scope)?, labels) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(completion) => return Ok(completion),
                    }
                }
            }
            StmtKind::DoWhile { body, test } => loop {
                match loop_step(self.exec_stmt(body, scope)?, labels) {
                    LoopStep::Next => {}
                    LoopStep::Exit => break,
                    LoopStep::Propagate(completion) => return Ok(completion),
                }
                if !self.eval_expr(test, scope)?.is_truthy() {
                    break;
                }
            },
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => return self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope, labels),
            StmtKind::ForIn { left, right, body } => {
                return self.exec_for_in(left, right, body, scope, labels)
            }
            StmtKind::Labeled { label, body } => {
                let mut nested = labels.to_vec();
                nested.push(label.as_str());
                return match self.exec_labeled(body, scope, &nested)? {
                    Completion::Break(Some(target)) if target == label.as_str() => {
                        Ok(Completion::Normal)
                    }
                    other => Ok(other),
                };
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => return self.exec_switch(discriminant, cases, scope),
            StmtKind::Break(label) => {
                return Ok(Completion::Break(label.as_ref().map(|l| l.as_str().to_string())))
            }
            StmtKind::Continue(label) => {
                return Ok(Completion::Continue(
                    label.as_ref().map(|l| l.as_str().to_string()),
                ))
            }
            StmtKind::Throw(argument) => {
                let value = self.eval_expr(argument, scope)?;
                return Err(RuntimeError::Thrown(value));
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => return self.exec_try(block, handler.as_ref(), finalizer.as_ref(), scope),
            StmtKind::With { object, body } => {
                let object = self.eval_expr(object, scope)?;
                if object.is_nullish() {
                    return Err(RuntimeError::type_error(
                        "Cannot convert undefined or null to object",
                    ));
                }
                return self.exec_stmt(body, &Scope::with(scope, object));
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_declarations(
        &self,
        kind: VarKind,
        decls: &[VarDeclarator],
        scope: &Scope,
    ) -> Result<()> {
        for decl in decls {
            let name = decl.name.as_str();
            match (kind, &decl.init) {
                (VarKind::Var, Some(init)) => {
                    let value = self.eval_expr(init, scope)?;
                    self.put_binding(name, value, scope)?;
                }
                (VarKind::Var, None) => scope.declare_var(name),
                (VarKind::Let | VarKind::Const, init) => {
                    let value = match init {
                        Some(init) => self.eval_expr(init, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(name, value);
                }
            }
        }
        Ok(())
    }

    fn exec_for(
        &self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &Scope,
        labels: &[&str],
    ) -> Result<Completion> {
        let scope = match init {
            Some(ForInit::Var {
                kind: VarKind::Let | VarKind::Const,
                ..
            }) => Scope::block(scope),
            _ => scope.clone(),
        };
        match init {
            Some(ForInit::Var { kind, decls }) => self.exec_declarations(*kind, decls, &scope)?,
            Some(ForInit::Expr(expr)) => {
                self.eval_expr(expr, &scope)?;
            }
            None => {}
        }
        loop {
            if let Some(test) = test {
                if !self.eval_expr(test, &scope)?.is_truthy() {
                    break;
                }
            }
            match loop_step(self.exec_stmt(body, &scope)?, labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(completion) => return Ok(completion),
            }
            if let Some(update) = update {
                self.eval_expr(update, &scope)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_in(
        &self,
        left: &ForInLeft,
        right: &Expr,
        body: &Stmt,
        scope: &Scope,
        labels: &[&str],
    ) -> Result<Completion> {
        let object = self.eval_expr(right, scope)?;
        for key in self.for_in_keys(&object) {
            let key = Value::from(key);
            let iteration = match left {
                ForInLeft::Var {
                    kind: VarKind::Let | VarKind::Const,
                    name,
                } => {
                    let iteration = Scope::block(scope);
                    iteration.declare(name.as_str(), key);
                    iteration
                }
                ForInLeft::Var { name, .. } => {
                    self.put_binding(name.as_str(), key, scope)?;
                    scope.clone()
                }
                ForInLeft::Target(target) => {
                    let reference = self.reference(target, scope)?;
                    self.put_reference(reference, key, scope)?;
                    scope.clone()
                }
            };
            match loop_step(self.exec_stmt(body, &iteration)?, labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(completion) => return Ok(completion),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_switch(
        &self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        scope: &Scope,
    ) -> Result<Completion> {
        let value = self.eval_expr(discriminant, scope)?;

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval_expr(test, scope)?.strict_equals(&value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };

        for case in &cases[start..] {
            match self.exec_stmts(&case.consequent, scope)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &self,
        block: &Block,
        handler: Option<&CatchClause>,
        finalizer: Option<&Block>,
        scope: &Scope,
    ) -> Result<Completion> {
        let result = match (self.exec_stmts(&block.body, scope), handler) {
            (Err(err), Some(handler)) if err.is_catchable() => {
                trace!(error = %err, "caught");
                let catch_scope = Scope::block(scope);
                let value = self.error_value(err);
                if let Some(param) = &handler.param {
                    catch_scope.declare(param.as_str(), value);
                }
                self.exec_stmts(&handler.body.body, &catch_scope)
            }
            (result, _) => result,
        };

        if let Some(finalizer) = finalizer {
            match self.exec_stmts(&finalizer.body, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub(crate) fn eval_expr(&self, expr: &Expr, scope: &Scope) -> Result<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SIZE, || self.eval_kind(expr, scope))
    }

    fn eval_kind(&self, expr: &Expr, scope: &Scope) -> Result<Value> {
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Num(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::string(s)),
            ExprKind::Regex { pattern, flags } => {
                Ok(Value::RegExp(Rc::new(JsRegExp::new(pattern, flags)?)))
            }
            ExprKind::Template { quasis, exprs } => {
                let mut text = quasis.first().cloned().unwrap_or_default();
                for (i, expr) in exprs.iter().enumerate() {
                    text.push_str(&self.eval_expr(expr, scope)?.to_js_string());
                    text.push_str(quasis.get(i + 1).map_or("", String::as_str));
                }
                Ok(Value::from(text))
            }
            ExprKind::Ident(name) => self.get_binding(name.as_str(), scope),
            ExprKind::This => Ok(scope.this()),
            ExprKind::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| match item {
                        Some(item) => self.eval_expr(item, scope),
                        None => Ok(Value::Undefined),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            ExprKind::Object(properties) => self.eval_object(properties, scope),
            ExprKind::Function(function) => {
                Ok(Value::script_function(Rc::clone(function), scope.clone()))
            }
            ExprKind::Unary { op, argument } => self.eval_unary(*op, argument, scope),
            ExprKind::Update {
                op,
                prefix,
                argument,
            } => {
                let reference = self.reference(argument, scope)?;
                let old = self.get_reference(&reference, scope)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.put_reference(reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                self.binary(*op, &left, &right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval_expr(left, scope)?;
                if short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    self.eval_expr(right, scope)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let reference = self.reference(target, scope)?;
                let value = match op {
                    AssignOp::Assign => self.eval_expr(value, scope)?,
                    AssignOp::Compound(bin) => {
                        let current = self.get_reference(&reference, scope)?;
                        let rhs = self.eval_expr(value, scope)?;
                        self.binary(*bin, &current, &rhs)?
                    }
                    AssignOp::Logical(logical) => {
                        let current = self.get_reference(&reference, scope)?;
                        if short_circuits(*logical, &current) {
                            return Ok(current);
                        }
                        self.eval_expr(value, scope)?
                    }
                };
                self.put_reference(reference, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, scope)?.is_truthy() {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            ExprKind::Call { callee, args } => {
                let (function, this) = match &callee.kind {
                    ExprKind::Member { object, property } => {
                        let object = self.eval_expr(object, scope)?;
                        (self.get_property(&object, property.as_str())?, object)
                    }
                    ExprKind::Index { object, index } => {
                        let object = self.eval_expr(object, scope)?;
                        let key = self.eval_expr(index, scope)?.to_js_string();
                        (self.get_property(&object, &key)?, object)
                    }
                    _ => (self.eval_expr(callee, scope)?, Value::Undefined),
                };
                let args = self.eval_args(args, scope)?;
                if !function.is_function() {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                }
                self.call(&function, this, &args)
            }
            ExprKind::New { callee: target, args } => {
                let constructor = self.eval_expr(target, scope)?;
                let args = self.eval_args(args, scope)?;
                if !matches!(&constructor, Value::Function(f) if f.is_constructor()) {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a constructor",
                        describe(target)
                    )));
                }
                self.construct(&constructor, &args)
            }
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, scope)?;
                self.get_property(&object, property.as_str())
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(index, scope)?.to_js_string();
                self.get_property(&object, &key)
            }
            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval_expr(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_args(&self, args: &[Expr], scope: &Scope) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval_expr(arg, scope)).collect()
    }

    fn eval_object(&self, properties: &[probar_js::hir::Property], scope: &Scope) -> Result<Value> {
        let object: ObjectRef = Rc::new(RefCell::new(Object::with_proto(Rc::clone(
            &self.intrinsics.object,
        ))));
        for property in properties {
            let key = match &property.key {
                PropertyKey::Static(key) => key.clone(),
                PropertyKey::Computed(expr) => self.eval_expr(expr, scope)?.to_js_string(),
            };
            let value = self.eval_expr(&property.value, scope)?;
            let mut object = object.borrow_mut();
            match property.kind {
                PropertyKind::Init => object.set(key, value),
                PropertyKind::Get => object.define_accessor(key, Some(value), None),
                PropertyKind::Set => object.define_accessor(key, None, Some(value)),
            }
        }
        Ok(Value::Object(object))
    }

    fn eval_unary(&self, op: UnaryOp, argument: &Expr, scope: &Scope) -> Result<Value> {
        match op {
            UnaryOp::TypeOf => {
                if let ExprKind::Ident(name) = &argument.kind {
                    if self.resolve_name(name.as_str(), scope).is_none() {
                        return Ok(Value::from("undefined"));
                    }
                }
                Ok(Value::from(self.eval_expr(argument, scope)?.type_of()))
            }
            UnaryOp::Delete => {
                match &argument.kind {
                    ExprKind::Member { .. } | ExprKind::Index { .. } => {
                        if let Reference::Property(object, key) = self.reference(argument, scope)? {
                            self.delete_property(&object, &key);
                        }
                    }
                    _ => {
                        self.eval_expr(argument, scope)?;
                    }
                }
                Ok(Value::Bool(true))
            }
            UnaryOp::Not => Ok(Value::Bool(!self.eval_expr(argument, scope)?.is_truthy())),
            UnaryOp::Neg => Ok(Value::Number(-self.eval_expr(argument, scope)?.to_number())),
            UnaryOp::Plus => Ok(Value::Number(self.eval_expr(argument, scope)?.to_number())),
            UnaryOp::BitNot => Ok(Value::Number(f64::from(
                !self.eval_expr(argument, scope)?.to_int32(),
            ))),
            UnaryOp::Void => {
                self.eval_expr(argument, scope)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn binary(&self, op: BinOp, left: &Value, right: &Value) -> Result<Value> {
        let value = match op {
            BinOp::Add => {
                let (l, r) = (left.to_primitive(), right.to_primitive());
                if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                    Value::from(format!("{}{}", l.to_js_string(), r.to_js_string()))
                } else {
                    Value::Number(l.to_number() + r.to_number())
                }
            }
            BinOp::Sub => Value::Number(left.to_number() - right.to_number()),
            BinOp::Mul => Value::Number(left.to_number() * right.to_number()),
            BinOp::Div => Value::Number(left.to_number() / right.to_number()),
            BinOp::Mod => Value::Number(left.to_number() % right.to_number()),
            BinOp::Exp => {
                let (base, exponent) = (left.to_number(), right.to_number());
                // powf(1, NaN) and powf(±1, ±Infinity) are 1; JavaScript says NaN
                if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
                    Value::Number(f64::NAN)
                } else {
                    Value::Number(base.powf(exponent))
                }
            }
            BinOp::Eq => Value::Bool(left.loose_equals(right)),
            BinOp::Ne => Value::Bool(!left.loose_equals(right)),
            BinOp::EqStrict => Value::Bool(left.strict_equals(right)),
            BinOp::NeStrict => Value::Bool(!left.strict_equals(right)),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                Value::Bool(compare(op, &left.to_primitive(), &right.to_primitive()))
            }
            BinOp::BitAnd => Value::Number(f64::from(left.to_int32() & right.to_int32())),
            BinOp::BitOr => Value::Number(f64::from(left.to_int32() | right.to_int32())),
            BinOp::BitXor => Value::Number(f64::from(left.to_int32() ^ right.to_int32())),
            BinOp::Shl => Value::Number(f64::from(
                left.to_int32().wrapping_shl(right.to_uint32() & 31),
            )),
            BinOp::Shr => Value::Number(f64::from(left.to_int32() >> (right.to_uint32() & 31))),
            BinOp::UShr => Value::Number(f64::from(left.to_uint32() >> (right.to_uint32() & 31))),
            BinOp::In => {
                if !right.is_object() {
                    return Err(RuntimeError::type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        left.to_js_string(),
                        right.to_js_string()
                    )));
                }
                Value::Bool(self.has_property(right, &left.to_js_string()))
            }
            BinOp::InstanceOf => Value::Bool(self.instance_of(left, right)?),
        };
        Ok(value)
    }

    fn instance_of(&self, value: &Value, constructor: &Value) -> Result<bool> {
        let Value::Function(function) = constructor else {
            return Err(RuntimeError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        };
        if let FunctionKind::Bound { target, .. } = &function.kind {
            return self.instance_of(value, target);
        }
        if !value.is_object() {
            return Ok(false);
        }
        let Value::Object(target) = self.get_property(constructor, "prototype")? else {
            return Err(RuntimeError::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        let mut current = self.prototype_of(value);
        while let Some(proto) = current {
            if Rc::ptr_eq(&proto, &target) {
                return Ok(true);
            }
            current = proto.borrow().proto();
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Bindings and references
    // ------------------------------------------------------------------

    fn resolve_name(&self, name: &str, scope: &Scope) -> Option<Resolved> {
        scope.resolve(name, &|object, key| self.has_property(object, key))
    }

    fn get_binding(&self, name: &str, scope: &Scope) -> Result<Value> {
        match self.resolve_name(name, scope) {
            Some(Resolved::Binding(owner)) => Ok(owner.get_own(name).unwrap_or_default()),
            Some(Resolved::Object(object)) => self.get_property(&object, name),
            None => Err(RuntimeError::ReferenceError {
                name: name.to_string(),
            }),
        }
    }

    /// Assign to the nearest binding; unbound names become globals.
    fn put_binding(&self, name: &str, value: Value, scope: &Scope) -> Result<()> {
        match self.resolve_name(name, scope) {
            Some(Resolved::Binding(owner)) => owner.declare(name, value),
            Some(Resolved::Object(object)) => self.set_property(&object, name, value)?,
            None => self.globals.declare(name, value),
        }
        Ok(())
    }

    fn reference(&self, target: &Expr, scope: &Scope) -> Result<Reference> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Reference::Binding(name.as_str().to_string())),
            ExprKind::Member { object, property } => Ok(Reference::Property(
                self.eval_expr(object, scope)?,
                property.as_str().to_string(),
            )),
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(index, scope)?.to_js_string();
                Ok(Reference::Property(object, key))
            }
            _ => Err(RuntimeError::type_error(format!(
                "Invalid assignment target: {}",
                describe(target)
            ))),
        }
    }

    fn get_reference(&self, reference: &Reference, scope: &Scope) -> Result<Value> {
        match reference {
            Reference::Binding(name) => self.get_binding(name, scope),
            Reference::Property(object, key) => self.get_property(object, key),
        }
    }

    fn put_reference(&self, reference: Reference, value: Value, scope: &Scope) -> Result<()> {
        match reference {
            Reference::Binding(name) => self.put_binding(&name, value, scope),
            Reference::Property(object, key) => self.set_property(&object, &key, value),
        }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read `object[key]`, following prototypes and calling getters.
    ///
    /// # Errors
    ///
    /// Returns a type error when `object` is `undefined` or `null`, and
    /// whatever a getter throws.
    pub fn get_property(&self, object: &Value, key: &str) -> Result<Value> {
        match object {
            Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            ))),
            Value::Object(target) => {
                let found = target.borrow().lookup(key);
                self.read_property(found, object)
            }
            Value::Function(function) => {
                let own = function.properties.borrow().property(key).cloned();
                if own.is_some() {
                    return self.read_property(own, object);
                }
                match key {
                    "name" => Ok(Value::from(function.name.as_str())),
                    "length" => Ok(Value::Number(function.arity() as f64)),
                    "prototype" if has_own_prototype(&function.kind) => {
                        let proto = self.new_object();
                        function
                            .properties
                            .borrow_mut()
                            .define_hidden("prototype", proto.clone());
                        Ok(proto)
                    }
                    _ => self.inherited(&self.intrinsics.function, key, object),
                }
            }
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or_default());
                }
                self.inherited(&self.intrinsics.array, key, object)
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.encode_utf16().count() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(s
                        .encode_utf16()
                        .nth(index)
                        .map_or(Value::Undefined, |unit| {
                            Value::from(String::from_utf16_lossy(&[unit]))
                        }));
                }
                self.inherited(&self.intrinsics.string, key, object)
            }
            Value::RegExp(regexp) => match key {
                "source" => Ok(Value::from(regexp.source())),
                "flags" => Ok(Value::from(regexp.flags())),
                "global" => Ok(Value::Bool(regexp.is_global())),
                "ignoreCase" => Ok(Value::Bool(regexp.flags().contains('i'))),
                "multiline" => Ok(Value::Bool(regexp.flags().contains('m'))),
                "lastIndex" => Ok(Value::Number(regexp.last_index() as f64)),
                _ => self.inherited(&self.intrinsics.regexp, key, object),
            },
            Value::Number(_) => self.inherited(&self.intrinsics.number, key, object),
            Value::Bool(_) => self.inherited(&self.intrinsics.object, key, object),
        }
    }

    fn inherited(&self, proto: &ObjectRef, key: &str, receiver: &Value) -> Result<Value> {
        let found = proto.borrow().lookup(key);
        self.read_property(found, receiver)
    }

    fn read_property(&self, property: Option<Property>, receiver: &Value) -> Result<Value> {
        match property {
            None
            | Some(Property::Accessor {
                get: None, ..
            }) => Ok(Value::Undefined),
            Some(Property::Data(value)) => Ok(value),
            Some(Property::Accessor {
                get: Some(getter), ..
            }) => self.call(&getter, receiver.clone(), &[]),
        }
    }

    /// Write `object[key] = value`, calling setters found on the
    /// prototype chain.
    ///
    /// # Errors
    ///
    /// Returns a type error when `object` is `undefined` or `null`, and
    /// whatever a setter throws.
    pub fn set_property(&self, object: &Value, key: &str, value: Value) -> Result<()> {
        match object {
            Value::Undefined | Value::Null => {
                return Err(RuntimeError::type_error(format!(
                    "Cannot set properties of {} (setting '{key}')",
                    object.to_js_string()
                )));
            }
            Value::Object(target) => {
                let found = target.borrow().lookup(key);
                if let Some(Property::Accessor { set, .. }) = found {
                    if let Some(setter) = set {
                        self.call(&setter, object.clone(), &[value])?;
                    }
                    return Ok(());
                }
                target.borrow_mut().set(key, value);
            }
            Value::Function(function) => {
                let own = function.properties.borrow().property(key).cloned();
                match own {
                    Some(Property::Accessor { set, .. }) => {
                        if let Some(setter) = set {
                            self.call(&setter, object.clone(), &[value])?;
                        }
                    }
                    _ if key == "prototype" => {
                        function.properties.borrow_mut().define_hidden(key, value);
                    }
                    _ => function.properties.borrow_mut().set(key, value),
                }
            }
            Value::Array(items) => {
                if let Some(index) = array_index(key) {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                } else if key == "length" {
                    items.borrow_mut().resize(value.to_uint32() as usize, Value::Undefined);
                }
            }
            Value::RegExp(regexp) => {
                if key == "lastIndex" {
                    let index = value.to_number();
                    regexp.set_last_index(if index > 0.0 { index as usize } else { 0 });
                }
            }
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
        Ok(())
    }

    fn delete_property(&self, object: &Value, key: &str) {
        match object {
            Value::Object(object) => {
                object.borrow_mut().remove(key);
            }
            Value::Function(function) => {
                function.properties.borrow_mut().remove(key);
            }
            Value::Array(items) => {
                if let Some(index) = array_index(key) {
                    if let Some(slot) = items.borrow_mut().get_mut(index) {
                        *slot = Value::Undefined;
                    }
                }
            }
            _ => {}
        }
    }

    /// The `in` operator: own or inherited property.
    pub(crate) fn has_property(&self, object: &Value, key: &str) -> bool {
        if self.has_own_property(object, key) {
            return true;
        }
        match object {
            Value::Object(object) => object.borrow().has(key),
            Value::Function(function) if key == "prototype" => has_own_prototype(&function.kind),
            other => self
                .prototype_of(other)
                .is_some_and(|proto| proto.borrow().has(key)),
        }
    }

    /// `Object.prototype.hasOwnProperty`.
    pub(crate) fn has_own_property(&self, object: &Value, key: &str) -> bool {
        match object {
            Value::Object(object) => object.borrow().contains(key),
            Value::Function(function) => {
                matches!(key, "name" | "length") || function.properties.borrow().contains(key)
            }
            Value::Array(items) => {
                key == "length" || array_index(key).is_some_and(|i| i < items.borrow().len())
            }
            Value::String(s) => {
                key == "length" || array_index(key).is_some_and(|i| i < s.encode_utf16().count())
            }
            Value::RegExp(_) => key == "lastIndex",
            _ => false,
        }
    }

    /// The object property reads fall back to after missing on `value`.
    pub(crate) fn prototype_of(&self, value: &Value) -> Option<ObjectRef> {
        let intrinsic = match value {
            Value::Undefined | Value::Null => return None,
            Value::Object(object) => return object.borrow().proto(),
            Value::Bool(_) => &self.intrinsics.object,
            Value::Number(_) => &self.intrinsics.number,
            Value::String(_) => &self.intrinsics.string,
            Value::Array(_) => &self.intrinsics.array,
            Value::Function(_) => &self.intrinsics.function,
            Value::RegExp(_) => &self.intrinsics.regexp,
        };
        Some(Rc::clone(intrinsic))
    }

    /// `Object.keys`.
    pub(crate) fn own_enumerable_keys(&self, value: &Value) -> Result<Vec<String>> {
        let keys = match value {
            Value::Undefined | Value::Null => {
                return Err(RuntimeError::type_error(
                    "Cannot convert undefined or null to object",
                ))
            }
            Value::Object(object) => object.borrow().enumerable_keys().map(str::to_string).collect(),
            Value::Function(function) => function
                .properties
                .borrow()
                .enumerable_keys()
                .map(str::to_string)
                .collect(),
            Value::Array(items) => index_keys(items.borrow().len()),
            Value::String(s) => index_keys(s.encode_utf16().count()),
            Value::Bool(_) | Value::Number(_) | Value::RegExp(_) => Vec::new(),
        };
        Ok(keys)
    }

    /// Keys a `for-in` loop visits: own enumerable keys, then inherited
    /// ones not already seen.
    fn for_in_keys(&self, value: &Value) -> Vec<String> {
        let Ok(mut keys) = self.own_enumerable_keys(value) else {
            return Vec::new();
        };
        let mut next = match value {
            Value::Object(object) => object.borrow().proto(),
            _ => None,
        };
        while let Some(proto) = next {
            let proto = proto.borrow();
            for key in proto.enumerable_keys() {
                if !keys.iter().any(|seen| seen == key) {
                    keys.push(key.to_string());
                }
            }
            next = proto.proto();
        }
        keys
    }
}

/// Whether a logical operator returns its left operand without evaluating
/// the right one.
fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.is_truthy(),
        LogicalOp::Or => left.is_truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

/// Script functions other than arrows get a `prototype` on first use.
fn has_own_prototype(kind: &FunctionKind) -> bool {
    matches!(kind, FunctionKind::Script { decl, .. } if !decl.is_arrow)
}

/// Canonical array index: decimal digits without a leading zero.
fn array_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key.len() == 1 || !key.starts_with('0'));
    if canonical {
        key.parse().ok()
    } else {
        None
    }
}

fn index_keys(len: usize) -> Vec<String> {
    (0..len).map(|i| i.to_string()).collect()
}

/// Short source-like name of an expression for error messages.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.as_str().to_string(),
        ExprKind::This => "this".to_string(),
        ExprKind::Member { object, property } => format!("{}.{}", describe(object), property),
        ExprKind::Index { object, index } => match &index.kind {
            ExprKind::Str(key) => format!("{}[{key:?}]", describe(object)),
            ExprKind::Num(n) => format!("{}[{}]", describe(object), probar_js::format_number(*n)),
            _ => format!("{}[...]", describe(object)),
        },
        ExprKind::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

/// Relational comparison of two primitives.
fn compare(op: BinOp, left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
        return match op {
            BinOp::Lt => l < r,
            BinOp::Le => l <= r,
            BinOp::Gt => l > r,
            _ => l >= r,
        };
    }
    let (l, r) = (left.to_number(), right.to_number());
    match op {
        BinOp::Lt => l < r,
        BinOp::Le => l <= r,
        BinOp::Gt => l > r,
        _ => l >= r,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Value {
        Runtime::new().eval(source).unwrap()
    }

    fn eval_num(source: &str) -> f64 {
        eval(source).as_number().unwrap()
    }

    fn eval_str(source: &str) -> String {
        eval(source).to_js_string()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval_num("1 + 2 * 3"), 7.0);
        assert_eq!(eval_num("(1 + 2) * 3"), 9.0);
        assert_eq!(eval_num("7 % 4 - -1"), 4.0);
        assert_eq!(eval_num("-7 % 4"), -3.0);
        assert!(eval_num("0 / 0").is_nan());
        assert_eq!(eval_num("2 ** 10"), 1024.0);
        assert!(eval_num("1 ** NaN").is_nan());
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval_str("'a' + 1 + 2"), "a12");
        assert_eq!(eval_str("1 + 2 + 'a'"), "3a");
        assert_eq!(eval_str("'x' + [1, 2]"), "x1,2");
        assert_eq!(eval_str("var b = 2; `a${b}c${b + 1}`"), "a2c3");
    }

    #[test]
    fn typeof_operator() {
        assert_eq!(eval_str("typeof 1"), "number");
        assert_eq!(eval_str("typeof 'a'"), "string");
        assert_eq!(eval_str("typeof undeclared"), "undefined");
        assert_eq!(eval_str("typeof null"), "object");
        assert_eq!(eval_str("typeof function(){}"), "function");
        assert_eq!(eval_str("typeof /x/"), "object");
    }

    #[test]
    fn loose_equality_matches_mul_guard() {
        assert!(eval("'number' == typeof 3").is_truthy());
        assert!(!eval("'number' == typeof undefined").is_truthy());
    }

    #[test]
    fn bitwise_operators() {
        assert_eq!(eval_num("5 & 3"), 1.0);
        assert_eq!(eval_num("5 | 3"), 7.0);
        assert_eq!(eval_num("5 ^ 3"), 6.0);
        assert_eq!(eval_num("~5"), -6.0);
        assert_eq!(eval_num("1 << 4"), 16.0);
        assert_eq!(eval_num("-16 >> 2"), -4.0);
        assert_eq!(eval_num("-1 >>> 28"), 15.0);
    }

    #[test]
    fn functions_closures_and_recursion() {
        let source = "
            function counter() {
              var n = 0;
              return function () { n += 1; return n; };
            }
            var next = counter();
            next(); next();
            function fact(k) { return k <= 1 ? 1 : k * fact(k - 1); }
            next() * 100 + fact(5)
        ";
        assert_eq!(eval_num(source), 420.0);
    }

    #[test]
    fn hoisting() {
        assert_eq!(eval_str("var r = typeof later; function later() {} r"), "function");
        assert_eq!(eval_str("var r = typeof x; var x = 1; r"), "undefined");
    }

    #[test]
    fn method_calls_bind_this() {
        let source = "var o = { v: 3, get: function () { return this.v; } }; o.get()";
        assert_eq!(eval_num(source), 3.0);
    }

    #[test]
    fn arrows_take_this_from_their_definer() {
        let source = "
            var o = {
              v: 5,
              run: function () { var f = (d) => this.v + d; return f(1); }
            };
            var inc = (a) => a + 1;
            o.run() * 10 + inc(1)
        ";
        assert_eq!(eval_num(source), 62.0);
        let err = Runtime::new().eval("var f = () => 1; new f()").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: f is not a constructor");
    }

    #[test]
    fn loops_and_switch() {
        let source = "
            var total = 0;
            for (var i = 0; i < 10; i++) {
              if (i % 2) continue;
              if (i > 6) break;
              total += i;
            }
            var j = 0;
            while (true) { j++; if (j == 3) break; }
            do { j += 10; } while (j < 20);
            var s = '';
            switch (total) {
              case 1: s = 'one';
              case 12: s += 'twelve';
              case 13: s += '!'; break;
              default: s = 'other';
            }
            s + ':' + total + ':' + j
        ";
        assert_eq!(eval_str(source), "twelve!:12:23");
    }

    #[test]
    fn labelled_break_and_continue() {
        let source = "
            var hits = [];
            outer: for (var i = 0; i < 3; i++) {
              for (var j = 0; j < 3; j++) {
                if (j == 1) continue outer;
                if (i == 2) break outer;
                hits.push(i + '' + j);
              }
            }
            block: { hits.push('in'); break block; hits.push('never'); }
            hits.join(',')
        ";
        assert_eq!(eval_str(source), "00,10,in");
    }

    #[test]
    fn labelled_continue_in_while_and_switch() {
        let source = "
            var n = 0, seen = '';
            loop: while (n < 4) {
              n++;
              switch (n) {
                case 2: continue loop;
                case 4: break loop;
              }
              seen += n;
            }
            seen
        ";
        assert_eq!(eval_str(source), "13");
    }

    #[test]
    fn for_in_visits_own_then_inherited_keys() {
        let source = "
            function Base() {}
            Base.prototype.inherited = 1;
            var o = new Base();
            o.a = 1; o.b = 2;
            var keys = [];
            for (var k in o) { keys.push(k); }
            for (var i in [7, 8]) { keys.push(i); }
            for (k in null) { keys.push('never'); }
            keys.join(',')
        ";
        assert_eq!(eval_str(source), "a,b,inherited,0,1");
    }

    #[test]
    fn for_in_skips_builtin_methods() {
        let source = "var n = 0; for (var k in {}) { n++; } for (var k in []) { n++; } n";
        assert_eq!(eval_num(source), 0.0);
    }

    #[test]
    fn construction_and_prototypes() {
        let source = "
            function Point(x) { this.x = x; }
            Point.prototype.double = function () { return this.x * 2; };
            var p = new Point(4);
            [p.double(), p instanceof Point, p instanceof Object, {} instanceof Point].join()
        ";
        assert_eq!(eval_str(source), "8,true,true,false");
    }

    #[test]
    fn constructors_returning_objects_replace_this() {
        assert_eq!(eval_num("function F() { return { v: 9 }; } new F().v"), 9.0);
        assert_eq!(eval_num("function G() { this.v = 1; return 5; } new G().v"), 1.0);
    }

    #[test]
    fn new_error_and_instanceof() {
        let source = "
            var e;
            try { throw new Error('x'); } catch (caught) { e = caught; }
            [e instanceof Error, e.message, String(e)].join('|')
        ";
        assert_eq!(eval_str(source), "true|x|Error: x");
        let err = Runtime::new().eval("throw new TypeError('bad');").unwrap_err();
        assert_eq!(err.to_string(), "Uncaught TypeError: bad");
    }

    #[test]
    fn host_errors_are_instances_of_their_constructors() {
        let source = "
            var r = [];
            try { missing(); } catch (e) { r.push(e instanceof ReferenceError); }
            try { null.x; } catch (e) { r.push(e instanceof TypeError, e instanceof Error); }
            r.join()
        ";
        assert_eq!(eval_str(source), "true,true,true");
    }

    #[test]
    fn regular_expressions() {
        let source = "
            var re = /ab+c/i;
            [re.test('xABBCx'), re.test('ac'), re.source, re.flags, String(re)].join()
        ";
        assert_eq!(eval_str(source), "true,false,ab+c,i,/ab+c/i");
        assert_eq!(eval_str("/(\\d+)-(\\d+)/.exec('a 12-34 b').join('|')"), "12-34|12|34");
        assert!(matches!(eval("/x/.exec('y')"), Value::Null));
        assert_eq!(eval_str("'a-b-c'.replace(/-/g, '+')"), "a+b+c");
        assert_eq!(eval_str("'2024-10'.replace(/(\\d+)-(\\d+)/, '$2/$1')"), "10/2024");
    }

    #[test]
    fn invalid_regexp_is_a_catchable_syntax_error() {
        let source = "var r; try { new RegExp('('); } catch (e) { r = e instanceof SyntaxError; } r";
        assert!(eval(source).is_truthy());
    }

    #[test]
    fn getters_and_setters() {
        let source = "
            var o = {
              _v: 1,
              get v() { return this._v * 10; },
              set v(x) { this._v = x; }
            };
            o.v = 4;
            o.v + o._v
        ";
        assert_eq!(eval_num(source), 44.0);
    }

    #[test]
    fn with_statement_resolves_through_the_object() {
        let source = "
            var o = { a: 1 };
            var b = 2;
            with (o) { a = a + b; b = 5; var a = a * 10; }
            o.a + ':' + b
        ";
        assert_eq!(eval_str(source), "30:5");
    }

    #[test]
    fn arguments_and_function_methods() {
        let source = "
            function sum() {
              var t = 0;
              for (var i = 0; i < arguments.length; i++) t += arguments[i];
              return t + (this && this.bonus || 0);
            }
            var bonus = { bonus: 100 };
            var add10 = sum.bind(bonus, 10);
            [sum(1, 2, 3), sum.call(bonus, 1), sum.apply(null, [4, 5]), add10(1)].join()
        ";
        assert_eq!(eval_str(source), "6,101,9,111");
    }

    #[test]
    fn nullish_and_logical_assignment() {
        assert_eq!(eval_num("var a = null; a ?? 7"), 7.0);
        assert_eq!(eval_num("var z = 0; z ?? 7"), 0.0);
        let source = "
            var a = null, b = 1, c = 0, calls = 0;
            function f() { calls++; return 9; }
            a ??= 5; b ||= f(); c &&= f();
            [a, b, c, calls].join()
        ";
        assert_eq!(eval_str(source), "5,1,0,0");
    }

    #[test]
    fn array_holes_and_methods() {
        assert_eq!(eval_str("var a = [1,,3]; [a.length, typeof a[1]].join()"), "3,undefined");
        assert_eq!(eval_str("[1, 2, 3].map((x) => x * 2).join()"), "2,4,6");
        assert_eq!(eval_str("[1, 2, 3, 4].filter((x) => x % 2).slice(-1).join()"), "3");
        assert_eq!(eval_num("[5, 6, 7].indexOf(7)"), 2.0);
        assert_eq!(eval_str("[1].concat([2, 3], 4).join('')"), "1234");
    }

    #[test]
    fn string_methods() {
        assert_eq!(eval_str("'Hello'.toUpperCase() + 'Hello'.slice(-3)"), "HELLOllo");
        assert_eq!(eval_str("'a,b,c'.split(',').join('|')"), "a|b|c");
        assert_eq!(eval_num("'abcabc'.indexOf('c', 3)"), 5.0);
        assert_eq!(eval_str("'  x '.trim() + 'abc'.charAt(1)"), "xb");
    }

    #[test]
    fn global_conversions() {
        assert_eq!(eval_num("parseInt('42px') + parseFloat('0.5')"), 42.5);
        assert!(eval("isNaN('abc')").is_truthy());
        assert_eq!(eval_str("Object.keys({ a: 1, b: 2 }).join()"), "a,b");
        assert!(eval("Array.isArray([]) && !Array.isArray({})").is_truthy());
        assert_eq!(eval_str("(1.005).toFixed(1)"), "1.0");
    }

    #[test]
    fn try_catch_finally() {
        let source = "
            var log = [];
            try { log.push('try'); throw 'boom'; }
            catch (e) { log.push(e); }
            finally { log.push('finally'); }
            try { missing(); } catch (e) { log.push(e.name); }
            try { missing(); } catch { log.push('bare'); }
            log.join('|')
        ";
        assert_eq!(eval_str(source), "try|boom|finally|ReferenceError|bare");
    }

    #[test]
    fn uncaught_throw_surfaces_value() {
        let err = Runtime::new().eval("throw Error('bad');").unwrap_err();
        assert_eq!(err.to_string(), "Uncaught Error: bad");
    }

    #[test]
    fn fatal_errors_bypass_catch() {
        let runtime = Runtime::new();
        runtime.define_global(
            "explode",
            Value::native("explode", |_, _, _| Err(RuntimeError::fatal("host failure"))),
        );
        let err = runtime
            .eval("var caught = false; try { explode(); } catch (e) { caught = true; }")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Fatal { .. }));
        assert!(!runtime.global("caught").unwrap().is_truthy());
    }

    #[test]
    fn property_errors() {
        let err = Runtime::new().eval("var u; u.x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of undefined (reading 'x')"
        );
        let err = Runtime::new().eval("var o = {}; o.f()").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: o.f is not a function");
    }

    #[test]
    fn deep_recursion_is_bounded() {
        let err = Runtime::new()
            .eval("function f() { return f(); } f()")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::StackOverflow));
    }

    #[test]
    fn deeply_nested_source_is_a_syntax_error() {
        let source = format!("x = {}1{};", "(".repeat(20_000), ")".repeat(20_000));
        let err = Runtime::new().eval(&source).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Syntax {
                source: probar_js::ParseError::TooDeep { .. },
                ..
            }
        ));
    }

    #[test]
    fn nesting_below_the_limit_evaluates() {
        let depth = probar_js::MAX_NESTING_DEPTH - 8;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(eval_num(&source), 1.0);
    }

    #[test]
    fn arrays_and_objects() {
        assert_eq!(eval_num("var a = [1, 2]; a.push(3); a[5] = 6; a.length"), 6.0);
        assert_eq!(eval_str("var o = { a: 1 }; delete o.a; 'a' in o"), "false");
        assert_eq!(eval_num("'héllo'.length"), 5.0);
        assert_eq!(eval_str("'abc'[1]"), "b");
        assert!(eval("'toString' in {}").is_truthy());
        assert!(eval("var o = { k: 1 }; o.hasOwnProperty('k') && !o.hasOwnProperty('toString')").is_truthy());
    }

    #[test]
    fn update_and_compound_assignment() {
        assert_eq!(eval_num("var o = { n: 1 }; o.n++; ++o.n; o.n *= 10; o.n"), 30.0);
        assert_eq!(eval_num("var i = 5; var j = i--; j - i"), 1.0);
    }

    #[test]
    fn let_and_const_bindings() {
        assert_eq!(eval_num("let a = 1; const b = 2; a + b"), 3.0);
        assert_eq!(eval_num("var t = 0; for (let i = 0; i < 3; i++) { t += i; } t"), 3.0);
    }

    #[test]
    fn debugger_is_a_no_op() {
        assert_eq!(eval_num("debugger; 1"), 1.0);
    }
}
