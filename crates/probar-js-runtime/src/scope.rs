//! Lexical scope chain.
//!
//! Each link is a [`Frame`]: the global scope, a function call, an arrow
//! call, a block, or the object of a `with` statement. `var` declarations
//! land in the nearest global, function or arrow frame; `this` comes from
//! the nearest function frame, so arrows see their definer's `this`.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A scope in the chain. Cloning shares the same bindings.
#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

struct ScopeData {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Scope>,
    frame: Frame,
}

/// Kind of scope link.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Root scope
    Global,
    /// Call of a non-arrow function, with its `this`
    Function(Value),
    /// Call of an arrow function
    Arrow,
    /// `catch` clause or per-iteration binding
    Block,
    /// Body of `with (object)`
    With(Value),
}

/// Where a name resolved to.
#[derive(Debug)]
pub enum Resolved {
    /// A binding owned by this scope
    Binding(Scope),
    /// A property of a `with` object
    Object(Value),
}

impl Scope {
    fn link(parent: Option<&Self>, frame: Frame) -> Self {
        Self(Rc::new(ScopeData {
            bindings: RefCell::new(HashMap::new()),
            parent: parent.cloned(),
            frame,
        }))
    }

    /// Create a root (global) scope.
    #[must_use]
    pub fn global() -> Self {
        Self::link(None, Frame::Global)
    }

    /// Create the scope for one function call.
    #[must_use]
    pub fn function(parent: &Self, this: Value) -> Self {
        Self::link(Some(parent), Frame::Function(this))
    }

    /// Create the scope for one arrow call.
    #[must_use]
    pub fn arrow(parent: &Self) -> Self {
        Self::link(Some(parent), Frame::Arrow)
    }

    /// Create a nested block scope.
    #[must_use]
    pub fn block(parent: &Self) -> Self {
        Self::link(Some(parent), Frame::Block)
    }

    /// Create the scope of a `with` body.
    #[must_use]
    pub fn with(parent: &Self, object: Value) -> Self {
        Self::link(Some(parent), Frame::With(object))
    }

    /// This link's frame.
    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.0.frame
    }

    fn is_var_scope(&self) -> bool {
        matches!(self.0.frame, Frame::Global | Frame::Function(_) | Frame::Arrow)
    }

    /// Bind `name` in this scope, shadowing outer bindings.
    pub fn declare(&self, name: &str, value: Value) {
        self.0.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Bind `name` in the nearest var scope unless it is already bound
    /// there.
    pub fn declare_var(&self, name: &str) {
        let mut scope = self;
        while !scope.is_var_scope() {
            match &scope.0.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
            .0
            .bindings
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(Value::Undefined);
    }

    /// Resolve `name` through the chain, consulting `with` objects through
    /// `has_property`.
    pub fn resolve(&self, name: &str, has_property: &dyn Fn(&Value, &str) -> bool) -> Option<Resolved> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Frame::With(object) = &current.0.frame {
                if has_property(object, name) {
                    return Some(Resolved::Object(object.clone()));
                }
            } else if current.has_own(name) {
                return Some(Resolved::Binding(current.clone()));
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    /// Resolve `name` through plain bindings, ignoring `with` objects.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    /// Overwrite the nearest binding of `name`; unbound names are created
    /// in the root scope.
    pub fn assign(&self, name: &str, value: Value) {
        let mut scope = self;
        loop {
            if let Some(slot) = scope.0.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return;
            }
            match &scope.0.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope.declare(name, value);
    }

    /// Read a binding of this scope only.
    #[must_use]
    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.0.bindings.borrow().get(name).cloned()
    }

    /// Whether this scope itself binds `name`.
    #[must_use]
    pub fn has_own(&self, name: &str) -> bool {
        self.0.bindings.borrow().contains_key(name)
    }

    /// Remove a binding of this scope.
    pub fn remove_own(&self, name: &str) -> Option<Value> {
        self.0.bindings.borrow_mut().remove(name)
    }

    /// `this` of the nearest function scope.
    #[must_use]
    pub fn this(&self) -> Value {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Frame::Function(this) = &current.0.frame {
                return this.clone();
            }
            scope = current.0.parent.as_ref();
        }
        Value::Undefined
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.0.bindings.borrow().keys().cloned().collect();
        names.sort();
        let frame = match self.0.frame {
            Frame::Global => "global",
            Frame::Function(_) => "function",
            Frame::Arrow => "arrow",
            Frame::Block => "block",
            Frame::With(_) => "with",
        };
        f.debug_struct("Scope")
            .field("frame", &frame)
            .field("bindings", &names)
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}
