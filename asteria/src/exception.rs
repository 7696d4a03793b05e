//! Thrown values and their backtraces (`spec.md` §3 "Exception", §4.3
//! "try/catch").
//!
//! Grounded directly on `exception.hpp` from the original implementation:
//! an `Exception` pairs an arbitrary [`Value`] with the source location it
//! was thrown from and a list of frames accumulated as it unwinds through
//! nested `try` blocks and function calls.

use std::fmt;

use crate::value::Value;

/// A `(file, line)` pair identifying a point in the source (`spec.md` §3
/// "Source location").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Box<str>,
    pub line: u32,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: impl Into<Box<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// The location reported for exceptions converted from a host error
    /// rather than a `throw` statement, matching the original
    /// implementation's `std::exception` constructor overload.
    #[must_use]
    pub fn native() -> Self {
        Self::new("<native code>", 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A value in flight through `throw`/`catch` (`spec.md` §4.3).
///
/// `origin` is the location of the `throw` statement (or `<native code>` for
/// a host-raised error) and never changes; `frames` accumulates one entry
/// per stack level the exception unwinds through before being caught, in
/// the order outermost call site is pushed last onto `__backtrace` at the
/// catch site (`spec.md` §4.3 "binds `__backtrace`").
#[derive(Debug, Clone)]
pub struct Exception {
    origin: SourceLocation,
    value: Value,
    frames: Vec<SourceLocation>,
}

impl Exception {
    #[must_use]
    pub fn new(origin: SourceLocation, value: Value) -> Self {
        Self {
            origin,
            value,
            frames: Vec::new(),
        }
    }

    /// Wraps a host-raised error message as a string-valued exception
    /// originating from `<native code>`, mirroring the original
    /// implementation's `Exception(const std::exception&)` constructor.
    #[must_use]
    pub fn from_native(message: impl Into<String>) -> Self {
        Self::new(SourceLocation::native(), Value::new_string(message.into()))
    }

    #[must_use]
    pub fn origin(&self) -> &SourceLocation {
        &self.origin
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn frames(&self) -> &[SourceLocation] {
        &self.frames
    }

    /// Appends one unwind frame. Called once per stack level the exception
    /// passes through on its way to the nearest enclosing `catch`, or to the
    /// top-level driver if none catches it (`spec.md` §4.5 "uncaught
    /// exceptions propagate out of `execute_as_function` with a frame
    /// appended for the call site").
    pub fn append_backtrace(&mut self, location: SourceLocation) {
        self.frames.push(location);
    }

    /// Builds the `__backtrace` array bound in a `catch` clause: the origin
    /// followed by every accumulated frame, each rendered as an
    /// `{file, line}` object (`spec.md` §4.3).
    #[must_use]
    pub fn backtrace_value(&self) -> Value {
        let mut entries = Vec::with_capacity(1 + self.frames.len());
        entries.push(location_to_value(&self.origin));
        entries.extend(self.frames.iter().map(location_to_value));
        Value::new_array(entries)
    }

    /// Renders a human-readable report for the top-level driver (`spec.md`
    /// §7 "User-visible behavior"): the origin, the pretty-printed value,
    /// then one line per backtrace frame.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("unhandled exception at {}: {}\n", self.origin, self.value);
        for frame in &self.frames {
            out.push_str(&format!("  from {frame}\n"));
        }
        out
    }
}

fn location_to_value(loc: &SourceLocation) -> Value {
    let mut obj = crate::value::Object::new();
    obj.insert(std::rc::Rc::from("file"), Value::new_string(loc.file.as_ref()));
    obj.insert(std::rc::Rc::from("line"), Value::Integer(i64::from(loc.line)));
    Value::new_object(obj)
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_exceptions_originate_from_native_code() {
        let exc = Exception::from_native("boom");
        assert_eq!(exc.origin().file.as_ref(), "<native code>");
        assert!(exc.value().equals(&Value::new_string("boom")));
    }

    #[test]
    fn backtrace_value_includes_origin_then_frames() {
        let mut exc = Exception::new(SourceLocation::new("a.ast", 3), Value::Null);
        exc.append_backtrace(SourceLocation::new("a.ast", 9));
        let bt = exc.backtrace_value();
        match bt {
            Value::Array(arr) => {
                assert_eq!(arr.len(), 2);
                match &arr[0] {
                    Value::Object(o) => {
                        assert!(o.get("line").unwrap().equals(&Value::Integer(3)));
                    }
                    _ => panic!("expected object"),
                }
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn render_includes_origin_and_each_frame() {
        let mut exc = Exception::new(SourceLocation::new("a.ast", 1), Value::new_string("oops"));
        exc.append_backtrace(SourceLocation::new("a.ast", 5));
        let text = exc.render();
        assert!(text.contains("a.ast:1"));
        assert!(text.contains("a.ast:5"));
        assert!(text.contains("oops"));
    }
}
