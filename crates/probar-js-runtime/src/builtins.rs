//! Built-in prototypes and global bindings.
//!
//! Every runtime owns one [`Intrinsics`] set: the prototype objects that
//! primitive and object values inherit their methods from. Property reads
//! on an array, string, number, function or regular expression that miss
//! the value itself continue on the matching prototype, and all of those
//! chains end at `Object.prototype`.

use crate::error::{Result, RuntimeError};
use crate::runtime::Runtime;
use crate::value::{byte_to_utf16, FunctionKind, JsFunction, JsRegExp, Object, ObjectRef, Value};
use probar_js::format_number;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

/// Error constructors installed as globals, base class first.
pub(crate) const ERROR_NAMES: [&str; 5] = [
    "Error",
    "TypeError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
];

/// Prototype objects shared by every value of a kind.
pub(crate) struct Intrinsics {
    pub(crate) object: ObjectRef,
    pub(crate) function: ObjectRef,
    pub(crate) array: ObjectRef,
    pub(crate) string: ObjectRef,
    pub(crate) number: ObjectRef,
    pub(crate) regexp: ObjectRef,
    errors: Vec<(&'static str, ObjectRef)>,
}

fn new_ref(object: Object) -> ObjectRef {
    Rc::new(RefCell::new(object))
}

impl Intrinsics {
    pub(crate) fn new() -> Self {
        let object = new_ref(Object::new());
        let inherit = || new_ref(Object::with_proto(Rc::clone(&object)));
        let function = inherit();
        let array = inherit();
        let string = inherit();
        let number = inherit();
        let regexp = inherit();

        let base_error = inherit();
        let mut errors = vec![("Error", Rc::clone(&base_error))];
        for name in &ERROR_NAMES[1..] {
            errors.push((*name, new_ref(Object::with_proto(Rc::clone(&base_error)))));
        }
        for (name, proto) in &errors {
            let mut proto = proto.borrow_mut();
            proto.define_hidden("name", Value::from(*name));
            proto.define_hidden("message", Value::from(""));
        }

        let intrinsics = Self {
            object,
            function,
            array,
            string,
            number,
            regexp,
            errors,
        };
        intrinsics.install_object_methods();
        intrinsics.install_function_methods();
        intrinsics.install_array_methods();
        intrinsics.install_string_methods();
        intrinsics.install_number_methods();
        intrinsics.install_regexp_methods();
        method(&base_error, "toString", |_, this, _| {
            Ok(Value::from(this.to_js_string()))
        });
        intrinsics
    }

    /// Prototype of errors created by the constructor `name`.
    pub(crate) fn error(&self, name: &str) -> ObjectRef {
        self.errors
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .or_else(|| self.errors.first())
            .map_or_else(|| Rc::clone(&self.object), |(_, proto)| Rc::clone(proto))
    }

    fn install_object_methods(&self) {
        method(&self.object, "hasOwnProperty", |runtime, this, args| {
            let key = arg(args, 0).to_js_string();
            Ok(Value::Bool(runtime.has_own_property(this, &key)))
        });
        method(&self.object, "toString", |_, this, _| {
            Ok(Value::from(format!("[object {}]", class_of(this))))
        });
        method(&self.object, "valueOf", |_, this, _| Ok(this.clone()));
    }

    fn install_function_methods(&self) {
        method(&self.function, "call", |runtime, this, args| {
            let rest = args.get(1..).unwrap_or_default();
            runtime.call(this, arg(args, 0), rest)
        });
        method(&self.function, "apply", |runtime, this, args| {
            let list = match arg(args, 1) {
                Value::Undefined | Value::Null => Vec::new(),
                Value::Array(items) => items.borrow().clone(),
                _ => {
                    return Err(RuntimeError::type_error(
                        "CreateListFromArrayLike called on non-object",
                    ))
                }
            };
            runtime.call(this, arg(args, 0), &list)
        });
        method(&self.function, "bind", |_, this, args| {
            let Value::Function(target) = this else {
                return Err(RuntimeError::type_error("Bind must be called on a function"));
            };
            Ok(Value::Function(Rc::new(JsFunction {
                name: format!("bound {}", target.name),
                kind: FunctionKind::Bound {
                    target: this.clone(),
                    this: arg(args, 0),
                    args: args.get(1..).unwrap_or_default().to_vec(),
                },
                properties: RefCell::new(Object::new()),
            })))
        });
        method(&self.function, "toString", |_, this, _| {
            Ok(Value::from(this.to_js_string()))
        });
    }

    fn install_array_methods(&self) {
        let proto = &self.array;
        method(proto, "push", |_, this, args| {
            let items = this_array(this, "push")?;
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Ok(Value::Number(items.len() as f64))
        });
        method(proto, "pop", |_, this, _| {
            Ok(this_array(this, "pop")?.borrow_mut().pop().unwrap_or_default())
        });
        method(proto, "shift", |_, this, _| {
            let items = this_array(this, "shift")?;
            let mut items = items.borrow_mut();
            Ok(if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            })
        });
        method(proto, "join", |_, this, args| {
            let items = this_array(this, "join")?;
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                sep => sep.to_js_string(),
            };
            let joined = items
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
                .join(&separator);
            Ok(Value::from(joined))
        });
        method(proto, "toString", |_, this, _| Ok(Value::from(this.to_js_string())));
        method(proto, "indexOf", |_, this, args| {
            let items = this_array(this, "indexOf")?;
            let items = items.borrow();
            let needle = arg(args, 0);
            let from = relative_index(&arg(args, 1), items.len(), 0);
            let found = items
                .iter()
                .enumerate()
                .skip(from)
                .find(|(_, item)| item.strict_equals(&needle))
                .map_or(-1.0, |(i, _)| i as f64);
            Ok(Value::Number(found))
        });
        method(proto, "slice", |_, this, args| {
            let items = this_array(this, "slice")?;
            let items = items.borrow();
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Ok(Value::array(items.get(start..end).unwrap_or_default().to_vec()))
        });
        method(proto, "concat", |_, this, args| {
            let mut items = this_array(this, "concat")?.borrow().clone();
            for value in args {
                match value {
                    Value::Array(more) => items.extend(more.borrow().iter().cloned()),
                    other => items.push(other.clone()),
                }
            }
            Ok(Value::array(items))
        });
        method(proto, "forEach", |runtime, this, args| {
            let snapshot = this_array(this, "forEach")?.borrow().clone();
            let callback = arg(args, 0);
            for (i, item) in snapshot.into_iter().enumerate() {
                runtime.call(&callback, arg(args, 1), &[item, Value::Number(i as f64), this.clone()])?;
            }
            Ok(Value::Undefined)
        });
        method(proto, "map", |runtime, this, args| {
            let snapshot = this_array(this, "map")?.borrow().clone();
            let callback = arg(args, 0);
            let mapped = snapshot
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    runtime.call(&callback, arg(args, 1), &[item, Value::Number(i as f64), this.clone()])
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::array(mapped))
        });
        method(proto, "filter", |runtime, this, args| {
            let snapshot = this_array(this, "filter")?.borrow().clone();
            let callback = arg(args, 0);
            let mut kept = Vec::new();
            for (i, item) in snapshot.into_iter().enumerate() {
                let call_args = [item.clone(), Value::Number(i as f64), this.clone()];
                if runtime.call(&callback, arg(args, 1), &call_args)?.is_truthy() {
                    kept.push(item);
                }
            }
            Ok(Value::array(kept))
        });
    }

    fn install_string_methods(&self) {
        let proto = &self.string;
        method(proto, "toString", |_, this, _| Ok(Value::from(this_string(this)?)));
        method(proto, "charAt", |_, this, args| {
            let units = utf16(&this_string(this)?);
            let index = arg(args, 0).to_number();
            let text = unit_at(&units, index).map_or_else(String::new, |unit| {
                String::from_utf16_lossy(&[unit])
            });
            Ok(Value::from(text))
        });
        method(proto, "charCodeAt", |_, this, args| {
            let units = utf16(&this_string(this)?);
            let code = unit_at(&units, arg(args, 0).to_number()).map_or(f64::NAN, f64::from);
            Ok(Value::Number(code))
        });
        method(proto, "indexOf", |_, this, args| {
            let units = utf16(&this_string(this)?);
            let needle = utf16(&arg(args, 0).to_js_string());
            let from = relative_index(&arg(args, 1), units.len(), 0);
            Ok(Value::Number(
                find_units(&units, &needle, from).map_or(-1.0, |i| i as f64),
            ))
        });
        method(proto, "slice", |_, this, args| {
            let units = utf16(&this_string(this)?);
            let start = relative_index(&arg(args, 0), units.len(), 0);
            let end = relative_index(&arg(args, 1), units.len(), units.len());
            Ok(Value::from(String::from_utf16_lossy(
                units.get(start..end).unwrap_or_default(),
            )))
        });
        method(proto, "substring", |_, this, args| {
            let units = utf16(&this_string(this)?);
            let clamp = |value: Value, default: usize| match value {
                Value::Undefined => default,
                value => {
                    let n = value.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(units.len())
                    }
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), units.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::from(String::from_utf16_lossy(&units[start..end])))
        });
        method(proto, "toUpperCase", |_, this, _| {
            Ok(Value::from(this_string(this)?.to_uppercase()))
        });
        method(proto, "toLowerCase", |_, this, _| {
            Ok(Value::from(this_string(this)?.to_lowercase()))
        });
        method(proto, "trim", |_, this, _| {
            Ok(Value::from(this_string(this)?.trim()))
        });
        method(proto, "split", |_, this, args| {
            let text = this_string(this)?;
            let limit = match arg(args, 1) {
                Value::Undefined => usize::MAX,
                limit => limit.to_uint32() as usize,
            };
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::from(text)],
                Value::RegExp(regexp) => regexp.regex().split(&text).map(Value::from).collect(),
                separator => {
                    let separator = separator.to_js_string();
                    if separator.is_empty() {
                        utf16(&text)
                            .chunks(1)
                            .map(|unit| Value::from(String::from_utf16_lossy(unit)))
                            .collect()
                    } else {
                        text.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            Ok(Value::array(parts.into_iter().take(limit).collect()))
        });
        method(proto, "replace", |runtime, this, args| {
            let text = this_string(this)?;
            replace(runtime, &text, &arg(args, 0), &arg(args, 1))
        });
    }

    fn install_number_methods(&self) {
        method(&self.number, "toString", |_, this, _| {
            Ok(Value::from(format_number(this.to_number())))
        });
        method(&self.number, "toFixed", |runtime, this, args| {
            let digits = arg(args, 0).to_number();
            if digits < 0.0 || digits > 100.0 {
                return Err(runtime.throw_error(
                    "RangeError",
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            let digits = if digits.is_nan() { 0 } else { digits as usize };
            let n = this.to_number();
            if !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{n:.digits$}")))
        });
    }

    fn install_regexp_methods(&self) {
        method(&self.regexp, "test", |_, this, args| {
            let regexp = this_regexp(this, "test")?;
            Ok(Value::Bool(regexp.exec(&arg(args, 0).to_js_string()).is_some()))
        });
        method(&self.regexp, "exec", |_, this, args| {
            let regexp = this_regexp(this, "exec")?;
            Ok(match regexp.exec(&arg(args, 0).to_js_string()) {
                Some((groups, _)) => Value::array(
                    groups
                        .into_iter()
                        .map(|group| group.map_or(Value::Undefined, Value::from))
                        .collect(),
                ),
                None => Value::Null,
            })
        });
        method(&self.regexp, "toString", |_, this, _| Ok(Value::from(this.to_js_string())));
    }
}

impl Runtime {
    pub(crate) fn install_builtins(&self) {
        self.define_global("undefined", Value::Undefined);
        self.define_global("NaN", Value::Number(f64::NAN));
        self.define_global("Infinity", Value::Number(f64::INFINITY));

        let log = Value::native("log", |_, _, args| {
            let line = args
                .iter()
                .map(Value::to_js_string)
                .collect::<Vec<_>>()
                .join(" ");
            info!(target: "probar_js_runtime::console", "{line}");
            Ok(Value::Undefined)
        });
        self.define_global("console", Value::object_from([("log".to_string(), log)]));

        self.define_global(
            "require",
            Value::native("require", |runtime, _, args| {
                let path = crate::runtime::require_path(args)?;
                runtime.require_from(None, &path)
            }),
        );

        self.install_constructors();
        self.install_conversions();
    }

    fn install_constructors(&self) {
        let intrinsics = &self.intrinsics;

        let object = constructor("Object", &intrinsics.object, |runtime, _, args| {
            Ok(match arg(args, 0) {
                value if value.is_object() => value,
                _ => runtime.new_object(),
            })
        });
        static_method(&object, "keys", |runtime, _, args| {
            let keys = runtime.own_enumerable_keys(&arg(args, 0))?;
            Ok(Value::array(keys.into_iter().map(Value::from).collect()))
        });
        static_method(&object, "create", |_, _, args| match arg(args, 0) {
            Value::Object(proto) => Ok(Value::Object(new_ref(Object::with_proto(proto)))),
            Value::Null => Ok(Value::object()),
            _ => Err(RuntimeError::type_error(
                "Object prototype may only be an Object or null",
            )),
        });
        static_method(&object, "getPrototypeOf", |runtime, _, args| {
            Ok(runtime
                .prototype_of(&arg(args, 0))
                .map_or(Value::Null, Value::Object))
        });
        self.define_global("Object", object);

        self.define_global(
            "Function",
            constructor("Function", &intrinsics.function, |_, _, _| {
                Err(RuntimeError::type_error("Function constructor is not supported"))
            }),
        );

        let array = constructor("Array", &intrinsics.array, |runtime, _, args| {
            if let [Value::Number(n)] = args {
                if n.fract() != 0.0 || *n < 0.0 || *n > f64::from(u32::MAX) {
                    return Err(runtime.throw_error("RangeError", "Invalid array length"));
                }
                return Ok(Value::array(vec![Value::Undefined; *n as usize]));
            }
            Ok(Value::array(args.to_vec()))
        });
        static_method(&array, "isArray", |_, _, args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
        });
        self.define_global("Array", array);

        self.define_global(
            "String",
            constructor("String", &intrinsics.string, |_, _, args| {
                Ok(Value::from(match args.first() {
                    Some(value) => value.to_js_string(),
                    None => String::new(),
                }))
            }),
        );
        self.define_global(
            "Number",
            constructor("Number", &intrinsics.number, |_, _, args| {
                Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
            }),
        );
        self.define_global(
            "RegExp",
            constructor("RegExp", &intrinsics.regexp, |_, _, args| {
                let (source, flags) = match (arg(args, 0), arg(args, 1)) {
                    (Value::RegExp(regexp), Value::Undefined) => {
                        (regexp.source().to_string(), regexp.flags().to_string())
                    }
                    (Value::RegExp(regexp), flags) => (regexp.source().to_string(), flags.to_js_string()),
                    (Value::Undefined, flags) => ("(?:)".to_string(), undefined_as_empty(&flags)),
                    (source, flags) => (source.to_js_string(), undefined_as_empty(&flags)),
                };
                Ok(Value::RegExp(Rc::new(JsRegExp::new(&source, &flags)?)))
            }),
        );

        for name in ERROR_NAMES {
            let proto = intrinsics.error(name);
            self.define_global(
                name,
                constructor(name, &proto, move |runtime, _, args| {
                    let message = undefined_as_empty(&arg(args, 0));
                    Ok(runtime.make_error(name, &message))
                }),
            );
        }
    }

    fn install_conversions(&self) {
        self.define_global(
            "Boolean",
            Value::native("Boolean", |_, _, args| Ok(Value::Bool(arg(args, 0).is_truthy()))),
        );
        self.define_global(
            "isNaN",
            Value::native("isNaN", |_, _, args| Ok(Value::Bool(arg(args, 0).to_number().is_nan()))),
        );
        self.define_global(
            "parseFloat",
            Value::native("parseFloat", |_, _, args| {
                let text = arg(args, 0).to_js_string();
                Ok(Value::Number(parse_float(text.trim_start())))
            }),
        );
        self.define_global(
            "parseInt",
            Value::native("parseInt", |_, _, args| {
                let text = arg(args, 0).to_js_string();
                Ok(Value::Number(parse_int(text.trim_start(), arg(args, 1).to_int32())))
            }),
        );
    }
}

fn method<F>(proto: &ObjectRef, name: &str, f: F)
where
    F: Fn(&Runtime, &Value, &[Value]) -> Result<Value> + 'static,
{
    proto.borrow_mut().define_hidden(name, Value::native(name, f));
}

fn static_method<F>(target: &Value, name: &str, f: F)
where
    F: Fn(&Runtime, &Value, &[Value]) -> Result<Value> + 'static,
{
    if let Value::Function(function) = target {
        function
            .properties
            .borrow_mut()
            .define_hidden(name, Value::native(name, f));
    }
}

fn constructor<F>(name: &str, prototype: &ObjectRef, f: F) -> Value
where
    F: Fn(&Runtime, &Value, &[Value]) -> Result<Value> + 'static,
{
    let function = Value::native(name, f);
    static_property(&function, "prototype", Value::Object(Rc::clone(prototype)));
    function
}

fn static_property(target: &Value, name: &str, value: Value) {
    if let Value::Function(function) = target {
        function.properties.borrow_mut().define_hidden(name, value);
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn undefined_as_empty(value: &Value) -> String {
    match value {
        Value::Undefined => String::new(),
        other => other.to_js_string(),
    }
}

fn class_of(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Object(_) => "Object",
        Value::Array(_) => "Array",
        Value::Function(_) => "Function",
        Value::RegExp(_) => "RegExp",
    }
}

fn this_array(this: &Value, name: &str) -> Result<crate::value::ArrayRef> {
    match this {
        Value::Array(items) => Ok(Rc::clone(items)),
        _ => Err(RuntimeError::type_error(format!(
            "Array.prototype.{name} called on non-array"
        ))),
    }
}

fn this_string(this: &Value) -> Result<String> {
    if this.is_nullish() {
        return Err(RuntimeError::type_error(
            "String.prototype method called on null or undefined",
        ));
    }
    Ok(this.to_js_string())
}

fn this_regexp<'a>(this: &'a Value, name: &str) -> Result<&'a JsRegExp> {
    match this {
        Value::RegExp(regexp) => Ok(&**regexp),
        _ => Err(RuntimeError::type_error(format!(
            "RegExp.prototype.{name} called on incompatible receiver"
        ))),
    }
}

/// `start`/`end` argument of `slice`: negative counts from the end, the
/// result is clamped to `0..=len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let len = len as f64;
    let index = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    index as usize
}

fn utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

fn unit_at(units: &[u16], index: f64) -> Option<u16> {
    let index = if index.is_nan() { 0.0 } else { index.trunc() };
    if index < 0.0 {
        return None;
    }
    units.get(index as usize).copied()
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .skip(from)
        .find(|(_, window)| *window == needle)
        .map(|(i, _)| i)
}

/// `String.prototype.replace` with a string or regular expression pattern.
fn replace(runtime: &Runtime, text: &str, pattern: &Value, replacement: &Value) -> Result<Value> {
    let matches: Vec<(usize, usize, Vec<Option<String>>)> = match pattern {
        Value::RegExp(regexp) => {
            let groups = |captures: regex::Captures<'_>| {
                let whole = captures.get(0).map_or((0, 0), |m| (m.start(), m.end()));
                let groups = captures
                    .iter()
                    .map(|group| group.map(|m| m.as_str().to_string()))
                    .collect();
                (whole.0, whole.1, groups)
            };
            if regexp.is_global() {
                regexp.set_last_index(0);
                regexp.regex().captures_iter(text).map(groups).collect()
            } else {
                regexp.regex().captures(text).map(groups).into_iter().collect()
            }
        }
        _ => {
            let needle = pattern.to_js_string();
            text.find(&needle)
                .map(|start| (start, start + needle.len(), vec![Some(needle.clone())]))
                .into_iter()
                .collect()
        }
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end, groups) in matches {
        out.push_str(&text[last..start]);
        if replacement.is_function() {
            let mut args: Vec<Value> = groups
                .iter()
                .map(|group| group.as_deref().map_or(Value::Undefined, Value::from))
                .collect();
            args.push(Value::Number(byte_to_utf16(text, start) as f64));
            args.push(Value::from(text));
            out.push_str(&runtime.call(replacement, Value::Undefined, &args)?.to_js_string());
        } else {
            expand_replacement(&mut out, &replacement.to_js_string(), &groups);
        }
        last = end;
    }
    out.push_str(&text[last..]);
    Ok(Value::from(out))
}

/// Expand `$$`, `$&` and `$1`..`$9` in a replacement string.
fn expand_replacement(out: &mut String, template: &str, groups: &[Option<String>]) {
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(groups.first().and_then(Option::as_deref).unwrap_or_default());
            }
            Some(digit @ '1'..='9') if (digit as usize - '0' as usize) < groups.len() => {
                chars.next();
                let index = digit as usize - '0' as usize;
                out.push_str(groups[index].as_deref().unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
}

/// Longest prefix of `text` that reads as a decimal literal.
fn parse_float(text: &str) -> f64 {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits = |from: usize| {
        let mut i = from;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };
    let int_end = digits(end);
    let mut seen_digits = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits(end + 1);
        if frac_end > end + 1 || seen_digits {
            seen_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !seen_digits {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    text[..end].parse::<f64>().unwrap_or(f64::NAN)
}

/// `parseInt` over already-trimmed text.
fn parse_int(text: &str, radix: i32) -> f64 {
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let has_hex_prefix = rest.starts_with("0x") || rest.starts_with("0X");
    let (radix, digits) = match radix {
        0 if has_hex_prefix => (16, &rest[2..]),
        0 => (10, rest),
        16 if has_hex_prefix => (16, &rest[2..]),
        2..=36 => (radix.unsigned_abs(), rest),
        _ => return f64::NAN,
    };
    let mut value = 0.0;
    let mut any = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_indices_count_from_the_end() {
        assert_eq!(relative_index(&Value::Number(-1.0), 5, 0), 4);
        assert_eq!(relative_index(&Value::Number(-9.0), 5, 0), 0);
        assert_eq!(relative_index(&Value::Number(9.0), 5, 0), 5);
        assert_eq!(relative_index(&Value::Undefined, 5, 5), 5);
    }

    #[test]
    fn unit_search() {
        let hay = utf16("abcabc");
        assert_eq!(find_units(&hay, &utf16("c"), 0), Some(2));
        assert_eq!(find_units(&hay, &utf16("c"), 3), Some(5));
        assert_eq!(find_units(&hay, &utf16("x"), 0), None);
        assert_eq!(find_units(&hay, &[], 9), Some(6));
    }

    #[test]
    fn replacement_patterns() {
        let groups = vec![Some("ab".to_string()), Some("b".to_string()), None];
        let mut out = String::new();
        expand_replacement(&mut out, "[$&|$1|$2|$$|$9]", &groups);
        assert_eq!(out, "[ab|b||$|$9]");
    }

    #[test]
    fn float_prefixes() {
        assert_eq!(parse_float("3.5px"), 3.5);
        assert_eq!(parse_float("-.5"), -0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("px").is_nan());
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn integer_prefixes() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("-0x1f", 0), -31.0);
        assert_eq!(parse_int("ff", 16), 255.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("z", 10).is_nan());
        assert!(parse_int("1", 1).is_nan());
    }

    #[test]
    fn error_prototypes_chain_to_error() {
        let intrinsics = Intrinsics::new();
        let type_error = intrinsics.error("TypeError");
        let base = type_error.borrow().proto().unwrap_or_else(|| Rc::clone(&intrinsics.object));
        assert!(Rc::ptr_eq(&base, &intrinsics.error("Error")));
        assert!(Rc::ptr_eq(&intrinsics.error("Unknown"), &intrinsics.error("Error")));
    }
}
