//! Runtime values.
//!
//! Objects, arrays, functions and regular expressions are shared by
//! reference (`Rc`), primitives by value. Objects carry an optional
//! prototype link; property reads walk that chain. Conversions follow the
//! JavaScript abstract operations (`ToNumber`, `ToString`, loose and strict
//! equality) for the value kinds the evaluator supports.

use crate::error::{Result, RuntimeError};
use crate::runtime::Runtime;
use crate::scope::Scope;
use probar_js::format_number;
use probar_js::hir::Function;
use regex::{Regex, RegexBuilder};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Host function callable from scripts: `(runtime, this, args) -> value`.
pub type NativeFn = Rc<dyn Fn(&Runtime, &Value, &[Value]) -> Result<Value>>;

/// Shared object handle.
pub type ObjectRef = Rc<RefCell<Object>>;

/// Shared array handle.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// A JavaScript value.
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// IEEE-754 double
    Number(f64),
    /// Immutable string
    String(Rc<str>),
    /// Plain object
    Object(ObjectRef),
    /// Array; holes read as `undefined`
    Array(ArrayRef),
    /// Script, native or bound function
    Function(Rc<JsFunction>),
    /// Regular expression
    RegExp(Rc<JsRegExp>),
}

/// A property slot's content.
#[derive(Clone)]
pub enum Property {
    /// Plain value
    Data(Value),
    /// Getter and setter pair; either half may be missing
    Accessor {
        /// Called with the receiver as `this` on read
        get: Option<Value>,
        /// Called with the receiver as `this` and the new value on write
        set: Option<Value>,
    },
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => value.fmt(f),
            Self::Accessor { get, set } => write!(
                f,
                "[{}{}]",
                if get.is_some() { "Getter" } else { "" },
                if set.is_some() { "/Setter" } else { "" }
            ),
        }
    }
}

#[derive(Clone)]
struct Slot {
    key: String,
    property: Property,
    enumerable: bool,
}

/// Property bag with insertion order and an optional prototype.
#[derive(Default)]
pub struct Object {
    slots: Vec<Slot>,
    proto: Option<ObjectRef>,
}

impl Object {
    /// Create an empty object without a prototype.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            proto: None,
        }
    }

    /// Create an empty object inheriting from `proto`.
    #[must_use]
    pub fn with_proto(proto: ObjectRef) -> Self {
        Self {
            slots: Vec::new(),
            proto: Some(proto),
        }
    }

    /// Prototype link.
    #[must_use]
    pub fn proto(&self) -> Option<ObjectRef> {
        self.proto.clone()
    }

    /// Replace the prototype link.
    pub fn set_proto(&mut self, proto: Option<ObjectRef>) {
        self.proto = proto;
    }

    fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.key == key)
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.key == key)
    }

    /// Read an own data property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.property(key)? {
            Property::Data(value) => Some(value.clone()),
            Property::Accessor { .. } => None,
        }
    }

    /// Own property slot.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.slot(key).map(|slot| &slot.property)
    }

    /// Find `key` on this object or along its prototype chain.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Property> {
        if let Some(property) = self.property(key) {
            return Some(property.clone());
        }
        let mut next = self.proto.clone();
        while let Some(current) = next {
            let object = current.borrow();
            if let Some(property) = object.property(key) {
                return Some(property.clone());
            }
            next = object.proto.clone();
        }
        None
    }

    /// Write an enumerable data property, keeping its position if it
    /// already exists.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.put(key.into(), Property::Data(value), true);
    }

    /// Write a data property that `for-in` and `Object.keys` skip.
    pub fn define_hidden(&mut self, key: impl Into<String>, value: Value) {
        self.put(key.into(), Property::Data(value), false);
    }

    /// Install one half of an accessor pair, keeping the other half.
    pub fn define_accessor(&mut self, key: impl Into<String>, get: Option<Value>, set: Option<Value>) {
        let key = key.into();
        let (get, set) = match self.property(&key) {
            Some(Property::Accessor {
                get: old_get,
                set: old_set,
            }) => (get.or_else(|| old_get.clone()), set.or_else(|| old_set.clone())),
            _ => (get, set),
        };
        self.put(key, Property::Accessor { get, set }, true);
    }

    fn put(&mut self, key: String, property: Property, enumerable: bool) {
        if let Some(slot) = self.slot_mut(&key) {
            slot.property = property;
        } else {
            self.slots.push(Slot {
                key,
                property,
                enumerable,
            });
        }
    }

    /// Remove an own property, returning its data value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.slots.iter().position(|slot| slot.key == key)?;
        match self.slots.remove(index).property {
            Property::Data(value) => Some(value),
            Property::Accessor { .. } => None,
        }
    }

    /// Whether the object itself has the property.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.slot(key).is_some()
    }

    /// Whether the object or its prototype chain has the property.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Own property names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.key.as_str())
    }

    /// Own enumerable property names in insertion order.
    pub fn enumerable_keys(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|slot| slot.enumerable)
            .map(|slot| slot.key.as_str())
    }

    /// Number of own properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the object has no own properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (&slot.key, &slot.property)))
            .finish()
    }
}

/// What a function runs when called.
pub enum FunctionKind {
    /// Function or arrow defined in script, with the scope it closes over
    Script {
        /// Lowered declaration, expression or arrow
        decl: Rc<Function>,
        /// Defining scope
        scope: Scope,
    },
    /// Host function
    Native(NativeFn),
    /// Result of `Function.prototype.bind`
    Bound {
        /// Function being wrapped
        target: Value,
        /// Fixed `this`
        this: Value,
        /// Arguments prepended to every call
        args: Vec<Value>,
    },
}

impl fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script { decl, scope } => f
                .debug_struct("Script")
                .field("params", &decl.params)
                .field("is_arrow", &decl.is_arrow)
                .field("span", &decl.span)
                .field("scope", scope)
                .finish(),
            Self::Native(_) => f.write_str("Native"),
            Self::Bound { target, this, args } => f
                .debug_struct("Bound")
                .field("target", target)
                .field("this", this)
                .field("args", args)
                .finish(),
        }
    }
}

/// A callable value with its own property bag.
#[derive(Debug)]
pub struct JsFunction {
    /// Function name (empty for anonymous functions)
    pub name: String,
    /// Body to run
    pub kind: FunctionKind,
    /// Properties assigned onto the function
    pub properties: RefCell<Object>,
}

impl JsFunction {
    /// Whether `new` may be applied to this function.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        match &self.kind {
            FunctionKind::Script { decl, .. } => !decl.is_arrow,
            FunctionKind::Native(_) => true,
            FunctionKind::Bound { target, .. } => {
                matches!(target, Value::Function(target) if target.is_constructor())
            }
        }
    }

    /// Declared parameter count.
    #[must_use]
    pub fn arity(&self) -> usize {
        match &self.kind {
            FunctionKind::Script { decl, .. } => decl.params.len(),
            FunctionKind::Native(_) => 0,
            FunctionKind::Bound { target, args, .. } => match target {
                Value::Function(target) => target.arity().saturating_sub(args.len()),
                _ => 0,
            },
        }
    }
}

/// A compiled regular expression with its JavaScript flags.
///
/// `i`, `m` and `s` become inline flags of the compiled pattern; `g` and
/// `y` make `exec` and `test` advance `lastIndex`.
pub struct JsRegExp {
    source: String,
    flags: String,
    regex: Regex,
    last_index: Cell<usize>,
}

impl JsRegExp {
    /// Compile `/source/flags`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RegExp`] for unknown or repeated flags and
    /// for patterns the regex engine cannot express, such as
    /// backreferences and lookaround.
    pub fn new(source: &str, flags: &str) -> Result<Self> {
        let invalid = |message: String| RuntimeError::RegExp {
            pattern: source.to_string(),
            message,
        };
        let mut builder = RegexBuilder::new(source);
        for (i, flag) in flags.char_indices() {
            if flags[..i].contains(flag) {
                return Err(invalid(format!("duplicate flag '{flag}'")));
            }
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'y' | 'u' | 'd' => {}
                other => return Err(invalid(format!("invalid flag '{other}'"))),
            }
        }
        let regex = builder.build().map_err(|err| invalid(err.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
            last_index: Cell::new(0),
        })
    }

    /// Pattern text between the slashes.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Flag letters.
    #[must_use]
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Whether the `g` flag is set.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }

    /// Whether `exec` resumes from `lastIndex`.
    fn is_stateful(&self) -> bool {
        self.is_global() || self.flags.contains('y')
    }

    /// Current `lastIndex`, in UTF-16 code units.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.last_index.get()
    }

    /// Set `lastIndex`.
    pub fn set_last_index(&self, index: usize) {
        self.last_index.set(index);
    }

    /// The compiled pattern.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Run one match the way `RegExp.prototype.exec` does.
    ///
    /// Returns the whole match followed by each capture group (`None` for
    /// groups that did not participate) and the match's UTF-16 index.
    #[must_use]
    pub fn exec(&self, input: &str) -> Option<(Vec<Option<String>>, usize)> {
        let start = if self.is_stateful() {
            let Some(start) = utf16_to_byte(input, self.last_index.get()) else {
                self.last_index.set(0);
                return None;
            };
            start
        } else {
            0
        };
        let captures = self.regex.captures_at(input, start);
        let Some(captures) = captures else {
            if self.is_stateful() {
                self.last_index.set(0);
            }
            return None;
        };
        let whole = captures.get(0)?;
        if self.flags.contains('y') && whole.start() != start {
            self.last_index.set(0);
            return None;
        }
        if self.is_stateful() {
            let mut end = whole.end();
            if whole.is_empty() {
                end = next_char_boundary(input, end);
            }
            self.last_index.set(byte_to_utf16(input, end));
        }
        let groups = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_string()))
            .collect();
        Some((groups, byte_to_utf16(input, whole.start())))
    }
}

impl fmt::Debug for JsRegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// Byte offset of the `index`-th UTF-16 code unit, if it lies on a char
/// boundary within `s`.
pub(crate) fn utf16_to_byte(s: &str, index: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, c) in s.char_indices() {
        if units == index {
            return Some(byte);
        }
        units += c.len_utf16();
        if units > index {
            return None;
        }
    }
    (units == index).then_some(s.len())
}

/// UTF-16 length of `s[..byte]`.
pub(crate) fn byte_to_utf16(s: &str, byte: usize) -> usize {
    s.get(..byte).map_or(0, |prefix| prefix.encode_utf16().count())
}

fn next_char_boundary(s: &str, byte: usize) -> usize {
    s.get(byte..)
        .and_then(|rest| rest.chars().next())
        .map_or(byte + 1, |c| byte + c.len_utf8())
}

impl Value {
    /// Create a string value.
    #[must_use]
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    /// Create an empty object without a prototype.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Rc::new(RefCell::new(Object::new())))
    }

    /// Create an object from key/value pairs.
    #[must_use]
    pub fn object_from(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut object = Object::new();
        for (key, value) in pairs {
            object.set(key, value);
        }
        Self::Object(Rc::new(RefCell::new(object)))
    }

    /// Create an array.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    /// Create an error-like object with `name` and `message` properties.
    ///
    /// Scripts see errors built by [`Runtime::make_error`], which also link
    /// the matching prototype.
    #[must_use]
    pub fn error(name: &str, message: &str) -> Self {
        Self::object_from([
            ("name".to_string(), Self::string(name)),
            ("message".to_string(), Self::string(message)),
        ])
    }

    /// Wrap a host closure as a callable value.
    pub fn native<F>(name: &str, f: F) -> Self
    where
        F: Fn(&Runtime, &Value, &[Value]) -> Result<Value> + 'static,
    {
        Self::Function(Rc::new(JsFunction {
            name: name.to_string(),
            kind: FunctionKind::Native(Rc::new(f)),
            properties: RefCell::new(Object::new()),
        }))
    }

    /// Create a script function closing over `scope`.
    #[must_use]
    pub fn script_function(decl: Rc<Function>, scope: Scope) -> Self {
        let name = decl
            .name
            .as_ref()
            .map(|n| n.as_str().to_string())
            .unwrap_or_default();
        Self::Function(Rc::new(JsFunction {
            name,
            kind: FunctionKind::Script { decl, scope },
            properties: RefCell::new(Object::new()),
        }))
    }

    /// Result of the `typeof` operator.
    #[must_use]
    pub const fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Object(_) | Self::Array(_) | Self::RegExp(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
        }
    }

    /// Whether the value is callable.
    #[must_use]
    pub const fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Whether the value is an object of any kind.
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(
            self,
            Self::Object(_) | Self::Array(_) | Self::Function(_) | Self::RegExp(_)
        )
    }

    /// Whether the value is `undefined` or `null`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// JavaScript truthiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) | Self::Array(_) | Self::Function(_) | Self::RegExp(_) => true,
        }
    }

    /// The string content if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number if this is a number value.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// `ToNumber`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Object(_) | Self::Array(_) | Self::Function(_) | Self::RegExp(_) => {
                string_to_number(&self.to_js_string())
            }
        }
    }

    /// `ToInt32`.
    #[must_use]
    pub fn to_int32(&self) -> i32 {
        self.to_uint32() as i32
    }

    /// `ToUint32`.
    #[must_use]
    pub fn to_uint32(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n.trunc().rem_euclid(4_294_967_296.0) as u32
    }

    /// `ToString`.
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.to_string(),
            Self::Object(object) => {
                let object = object.borrow();
                match (object.lookup("name"), object.lookup("message")) {
                    (
                        Some(Property::Data(Self::String(name))),
                        Some(Property::Data(Self::String(message))),
                    ) => {
                        if message.is_empty() {
                            name.to_string()
                        } else {
                            format!("{name}: {message}")
                        }
                    }
                    _ => "[object Object]".to_string(),
                }
            }
            Self::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Function(function) => {
                format!("function {}() {{ [native code] }}", function.name)
            }
            Self::RegExp(regexp) => format!("/{}/{}", regexp.source, regexp.flags),
        }
    }

    /// Convert objects to their string form, leaving primitives alone.
    #[must_use]
    pub fn to_primitive(&self) -> Self {
        if self.is_object() {
            Self::from(self.to_js_string())
        } else {
            self.clone()
        }
    }

    /// The `===` operator.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::RegExp(a), Self::RegExp(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The `==` operator.
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Number(_), Self::String(_)) | (Self::String(_), Self::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Self::Bool(_), _) => Self::Number(self.to_number()).loose_equals(other),
            (_, Self::Bool(_)) => self.loose_equals(&Self::Number(other.to_number())),
            (a, b @ (Self::Number(_) | Self::String(_))) if a.is_object() => {
                a.to_primitive().loose_equals(b)
            }
            (a @ (Self::Number(_) | Self::String(_)), b) if b.is_object() => {
                a.loose_equals(&b.to_primitive())
            }
            _ => self.strict_equals(other),
        }
    }
}

/// `ToNumber` applied to a string.
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust accepts "inf" and "nan" spellings JavaScript does not
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(object) => match object.try_borrow() {
                Ok(object) => object.fmt(f),
                Err(_) => f.write_str("{<borrowed>}"),
            },
            Self::Array(items) => match items.try_borrow() {
                Ok(items) => f.debug_list().entries(items.iter()).finish(),
                Err(_) => f.write_str("[<borrowed>]"),
            },
            Self::Function(function) => write!(f, "[Function {}]", function.name),
            Self::RegExp(regexp) => regexp.fmt(f),
        }
    }
}
