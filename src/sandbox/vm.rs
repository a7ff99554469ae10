//! Image interpreter.
//!
//! A [`Runtime`] owns every image it loaded. Nothing is shared between runtimes, so dropping one
//! releases all of its images and instances.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::resolver::{ResolutionError, Resolver};
use crate::image::{BinaryOp, Const, Expr, Image, Intrinsic, MethodImage, Stmt, TypeImage, UnaryOp};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// Largest accepted call depth limit. Calls recurse on the native stack, so a higher limit would
/// overflow it before the depth check can fault.
pub const MAX_CALL_DEPTH_LIMIT: usize = 256;

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Unit => "unit",
        }
    }

    /// Rendering used in assertion messages; strings are quoted.
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Unit => write!(f, "()"),
        }
    }
}

/// A failure raised while running code inside a runtime.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("{message}")]
    Assertion { message: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("attempted to divide by zero")]
    DivideByZero,

    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("unit '{0}' is not loaded")]
    UnitNotLoaded(String),

    #[error("type '{0}' not found")]
    TypeNotFound(String),

    #[error("method '{method}' not found on type '{type_name}'")]
    MethodNotFound { type_name: String, method: String },

    #[error("'{method}' takes {expected} argument(s) but {found} were supplied")]
    Arity {
        method: String,
        expected: usize,
        found: usize,
    },

    /// A fault raised by the target of an invocation.
    #[error("exception has been thrown by the target of an invocation ({target})")]
    Invocation { target: String, source: Box<Fault> },
}

impl Fault {
    /// The innermost cause, unwrapping every [`Fault::Invocation`] layer.
    pub fn root_cause(&self) -> &Fault {
        let mut fault = self;
        while let Fault::Invocation { source, .. } = fault {
            fault = source;
        }
        fault
    }

    /// Whether the root cause means the code could not be found rather than that it failed.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self.root_cause(),
            Fault::UnitNotLoaded(_) | Fault::TypeNotFound(_) | Fault::MethodNotFound { .. }
        )
    }

    fn invocation(target: String, source: Fault) -> Fault {
        Fault::Invocation {
            target,
            source: Box::new(source),
        }
    }
}

/// A live object: the owning unit, its type and its field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub unit: String,
    pub type_name: String,
    pub fields: Vec<Value>,
}

impl Instance {
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }
}

enum Flow {
    Next,
    Return(Value),
}

/// An interpreter loaded with one entry image and its transitive references.
#[derive(Debug)]
pub struct Runtime {
    entry: String,
    images: HashMap<String, Arc<Image>>,
    max_call_depth: usize,
}

impl Runtime {
    /// Load `entry` and, transitively, every image it references.
    ///
    /// ## Errors
    /// The first name the resolver cannot supply.
    pub fn load(entry: &str, resolver: &dyn Resolver, max_call_depth: usize) -> Result<Self, ResolutionError> {
        let mut images = HashMap::new();
        let mut queue = VecDeque::from([entry.to_string()]);

        while let Some(name) = queue.pop_front() {
            if images.contains_key(&name) {
                continue;
            }
            let image = resolver.resolve(&name)?;
            queue.extend(image.references.iter().cloned());
            images.insert(name, Arc::new(image));
        }

        tracing::debug!(entry, images = images.len(), "runtime loaded");
        Ok(Self {
            entry: entry.to_string(),
            images,
            max_call_depth: max_call_depth.min(MAX_CALL_DEPTH_LIMIT),
        })
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// The image loaded under `name`.
    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.get(name).map(Arc::as_ref)
    }

    /// Create an instance of `type_name` declared in `unit`, running field initializers.
    pub fn instantiate(&self, unit: &str, type_name: &str) -> Result<Instance, Fault> {
        self.instantiate_at(unit, type_name, 0)
    }

    /// Invoke a parameterless method by name. Faults are wrapped as the target of an invocation.
    pub fn invoke(&self, instance: &mut Instance, method: &str) -> Result<Value, Fault> {
        self.call_method(instance, method, Vec::new(), 0).map_err(|fault| {
            Fault::invocation(format!("{}.{}", instance.type_name, method), fault)
        })
    }

    fn type_image(&self, unit: &str, type_name: &str) -> Result<&TypeImage, Fault> {
        self.images
            .get(unit)
            .ok_or_else(|| Fault::UnitNotLoaded(unit.to_string()))?
            .find_type(type_name)
            .ok_or_else(|| Fault::TypeNotFound(type_name.to_string()))
    }

    fn instantiate_at(&self, unit: &str, type_name: &str, depth: usize) -> Result<Instance, Fault> {
        let ty = self.type_image(unit, type_name)?;
        let mut instance = Instance {
            unit: unit.to_string(),
            type_name: type_name.to_string(),
            fields: vec![Value::Unit; ty.fields.len()],
        };
        for (index, field) in ty.fields.iter().enumerate() {
            let value = self.eval(&field.init, &mut instance, &mut Vec::new(), depth)?;
            instance.fields[index] = value;
        }
        Ok(instance)
    }

    fn call_method(
        &self,
        instance: &mut Instance,
        method: &str,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, Fault> {
        if depth >= self.max_call_depth {
            return Err(Fault::CallDepthExceeded(self.max_call_depth));
        }
        let ty = self.type_image(&instance.unit, &instance.type_name)?;
        let body: &MethodImage = ty.method(method).ok_or_else(|| Fault::MethodNotFound {
            type_name: instance.type_name.clone(),
            method: method.to_string(),
        })?;
        if body.arity != args.len() {
            return Err(Fault::Arity {
                method: method.to_string(),
                expected: body.arity,
                found: args.len(),
            });
        }

        let mut locals = args;
        locals.resize(body.locals.max(body.arity), Value::Unit);
        match self.exec_block(&body.body, instance, &mut locals, depth)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Unit),
        }
    }

    fn exec_block(
        &self,
        body: &[Stmt],
        instance: &mut Instance,
        locals: &mut Vec<Value>,
        depth: usize,
    ) -> Result<Flow, Fault> {
        for stmt in body {
            if let Flow::Return(value) = self.exec(stmt, instance, locals, depth)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&self, stmt: &Stmt, instance: &mut Instance, locals: &mut Vec<Value>, depth: usize) -> Result<Flow, Fault> {
        match stmt {
            Stmt::SetLocal(slot, expr) => {
                let value = self.eval(expr, instance, locals, depth)?;
                store(locals, *slot, value)?;
            }
            Stmt::SetField(index, expr) => {
                let value = self.eval(expr, instance, locals, depth)?;
                store(&mut instance.fields, *index, value)?;
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, instance, locals, depth)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                let branch = if self.condition(condition, instance, locals, depth)? {
                    then_body
                } else {
                    else_body
                };
                return self.exec_block(branch, instance, locals, depth);
            }
            Stmt::While { condition, body } => {
                while self.condition(condition, instance, locals, depth)? {
                    if let Flow::Return(value) = self.exec_block(body, instance, locals, depth)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Expr(expr) => {
                self.eval(expr, instance, locals, depth)?;
            }
        }
        Ok(Flow::Next)
    }

    fn condition(&self, expr: &Expr, instance: &mut Instance, locals: &mut Vec<Value>, depth: usize) -> Result<bool, Fault> {
        match self.eval(expr, instance, locals, depth)? {
            Value::Bool(b) => Ok(b),
            other => Err(Fault::TypeMismatch(format!("condition must be bool, found {}", other.kind()))),
        }
    }

    fn eval(&self, expr: &Expr, instance: &mut Instance, locals: &mut Vec<Value>, depth: usize) -> Result<Value, Fault> {
        match expr {
            Expr::Const(c) => Ok(match c {
                Const::Int(v) => Value::Int(*v),
                Const::Bool(b) => Value::Bool(*b),
                Const::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Local(slot) => load(locals, *slot),
            Expr::Field(index) => load(&instance.fields, *index),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, instance, locals, depth)?;
                unary(*op, value)
            }
            Expr::Binary(lhs, BinaryOp::And, rhs) => {
                if !self.condition(lhs, instance, locals, depth)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.condition(rhs, instance, locals, depth)?))
            }
            Expr::Binary(lhs, BinaryOp::Or, rhs) => {
                if self.condition(lhs, instance, locals, depth)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.condition(rhs, instance, locals, depth)?))
            }
            Expr::Binary(lhs, op, rhs) => {
                let lhs = self.eval(lhs, instance, locals, depth)?;
                let rhs = self.eval(rhs, instance, locals, depth)?;
                binary(*op, lhs, rhs)
            }
            Expr::CallSelf { method, args } => {
                let args = self.eval_args(args, instance, locals, depth)?;
                self.call_method(instance, method, args, depth + 1)
            }
            Expr::CallStatic {
                unit,
                type_name,
                method,
                args,
            } => {
                let args = self.eval_args(args, instance, locals, depth)?;
                let target = format!("{type_name}.{method}");
                let mut fresh = self
                    .instantiate_at(unit, type_name, depth + 1)
                    .map_err(|fault| Fault::invocation(target.clone(), fault))?;
                self.call_method(&mut fresh, method, args, depth + 1)
                    .map_err(|fault| Fault::invocation(target, fault))
            }
            Expr::Intrinsic { intrinsic, args } => {
                let args = self.eval_args(args, instance, locals, depth)?;
                run_intrinsic(*intrinsic, args)
            }
        }
    }

    fn eval_args(&self, args: &[Expr], instance: &mut Instance, locals: &mut Vec<Value>, depth: usize) -> Result<Vec<Value>, Fault> {
        args.iter().map(|arg| self.eval(arg, instance, locals, depth)).collect()
    }
}

fn load(slots: &[Value], index: usize) -> Result<Value, Fault> {
    slots
        .get(index)
        .cloned()
        .ok_or_else(|| Fault::TypeMismatch(format!("slot {index} out of range")))
}

fn store(slots: &mut [Value], index: usize, value: Value) -> Result<(), Fault> {
    let slot = slots
        .get_mut(index)
        .ok_or_else(|| Fault::TypeMismatch(format!("slot {index} out of range")))?;
    *slot = value;
    Ok(())
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, Fault> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(v)) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Fault::Overflow(format!("-({v})"))),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(Fault::TypeMismatch(format!("cannot negate {}", other.kind()))),
        (UnaryOp::Not, other) => Err(Fault::TypeMismatch(format!("cannot apply '!' to {}", other.kind()))),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, Fault> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => return Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Add => {
            if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
                return Ok(Value::Str(format!("{lhs}{rhs}")));
            }
        }
        _ => {}
    }

    let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) else {
        return Err(Fault::TypeMismatch(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            lhs.kind(),
            rhs.kind()
        )));
    };
    let (a, b) = (*a, *b);
    let overflow = || Fault::Overflow(format!("{a} {} {b}", op.symbol()));

    Ok(match op {
        BinaryOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinaryOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinaryOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(Fault::DivideByZero),
        BinaryOp::Div => Value::Int(a.checked_div(b).ok_or_else(overflow)?),
        BinaryOp::Mod => Value::Int(a.checked_rem(b).ok_or_else(overflow)?),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::And | BinaryOp::Or => {
            return Err(Fault::TypeMismatch(format!("unexpected operator '{}'", op.symbol())));
        }
    })
}

fn run_intrinsic(intrinsic: Intrinsic, args: Vec<Value>) -> Result<Value, Fault> {
    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or(Value::Unit);

    match intrinsic {
        Intrinsic::Assert => match next() {
            Value::Bool(true) => Ok(Value::Unit),
            Value::Bool(false) => Err(Fault::Assertion {
                message: "Expected: true but was: false".to_string(),
            }),
            other => Err(Fault::TypeMismatch(format!("assert expects bool, found {}", other.kind()))),
        },
        Intrinsic::AssertEq => {
            let (expected, actual) = (next(), next());
            if expected == actual {
                Ok(Value::Unit)
            } else {
                Err(Fault::Assertion {
                    message: format!("Expected: {} but was: {}", expected.render(), actual.render()),
                })
            }
        }
        Intrinsic::AssertNe => {
            let (expected, actual) = (next(), next());
            if expected != actual {
                Ok(Value::Unit)
            } else {
                Err(Fault::Assertion {
                    message: format!(
                        "Expected: not equal to {} but was: {}",
                        expected.render(),
                        actual.render()
                    ),
                })
            }
        }
        Intrinsic::Fail => Err(Fault::Assertion {
            message: next().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;
    use crate::unit::CompilationUnit;

    struct MapResolver(HashMap<String, Image>);

    impl Resolver for MapResolver {
        fn resolve(&self, name: &str) -> Result<Image, ResolutionError> {
            self.0.get(name).cloned().ok_or_else(|| ResolutionError::NotInClosure {
                name: name.to_string(),
            })
        }
    }

    fn runtime_with_depth(source: &str, max_call_depth: usize) -> Runtime {
        let unit = CompilationUnit::new("App").with_source("app.tdl", source);
        let image = compiler::compile(&unit, &[]).unwrap();
        let resolver = MapResolver(HashMap::from([("App".to_string(), image)]));
        Runtime::load("App", &resolver, max_call_depth).unwrap()
    }

    fn runtime(source: &str) -> Runtime {
        runtime_with_depth(source, DEFAULT_MAX_CALL_DEPTH)
    }

    fn run(source: &str, method: &str) -> Result<Value, Fault> {
        let runtime = runtime(source);
        let mut instance = runtime.instantiate("App", "T")?;
        runtime.invoke(&mut instance, method)
    }

    #[test]
    fn test_arithmetic_and_control_flow() {
        let source = r#"
            class T {
                fn sum_to(n) {
                    let total = 0;
                    let i = 1;
                    while i <= n { total = total + i; i = i + 1; }
                    return total;
                }
                fn go() { return sum_to(10); }
                fn branch() { if 10 % 3 == 1 && !false { return "yes"; } else { return "no"; } }
            }
        "#;
        assert_eq!(run(source, "go").unwrap(), Value::Int(55));
        assert_eq!(run(source, "branch").unwrap(), Value::Str("yes".to_string()));
    }

    #[test]
    fn test_fields_are_initialized_and_mutable() {
        let runtime = runtime("class T { let age = 1; fn grow() { age = age + 1; } }");
        let mut instance = runtime.instantiate("App", "T").unwrap();
        assert_eq!(instance.field(0), Some(&Value::Int(1)));
        runtime.invoke(&mut instance, "grow").unwrap();
        assert_eq!(instance.field(0), Some(&Value::Int(2)));
    }

    #[test]
    fn test_assertion_fault_is_wrapped_and_unwrapped() {
        let fault = run("class T { fn t() { assert_eq(1, 2); } }", "t").unwrap_err();
        assert!(matches!(fault, Fault::Invocation { ref target, .. } if target == "T.t"));
        assert_eq!(fault.root_cause().to_string(), "Expected: 1 but was: 2");
        assert!(!fault.is_load_failure());
    }

    #[test]
    fn test_nested_invocations_unwrap_fully() {
        let source = r#"
            class Helper { fn boom() { fail("deep"); } }
            class T { fn t() { Helper.boom(); } }
        "#;
        let fault = run(source, "t").unwrap_err();
        let Fault::Invocation { source, .. } = &fault else {
            panic!("expected invocation");
        };
        assert!(matches!(**source, Fault::Invocation { .. }));
        assert_eq!(fault.root_cause().to_string(), "deep");
    }

    #[test]
    fn test_runtime_faults() {
        let source = r#"
            class T {
                fn div() { return 1 / 0; }
                fn over() { return 9223372036854775807 + 1; }
                fn mismatch() { return 1 + true; }
                fn cond() { if 1 { return; } }
                fn strings() { assert_eq("a1", "a" + 1); assert_ne("x", "y"); }
                fn rec() { return rec(); }
            }
        "#;
        assert!(matches!(run(source, "div").unwrap_err().root_cause(), Fault::DivideByZero));
        assert!(matches!(run(source, "over").unwrap_err().root_cause(), Fault::Overflow(_)));
        assert!(matches!(run(source, "mismatch").unwrap_err().root_cause(), Fault::TypeMismatch(_)));
        assert!(matches!(run(source, "cond").unwrap_err().root_cause(), Fault::TypeMismatch(_)));
        assert!(run(source, "strings").is_ok());

        let shallow = runtime_with_depth(source, 16);
        let mut instance = shallow.instantiate("App", "T").unwrap();
        let fault = shallow.invoke(&mut instance, "rec").unwrap_err();
        assert!(matches!(fault.root_cause(), Fault::CallDepthExceeded(16)));
    }

    #[test]
    fn test_call_depth_is_capped() {
        let source = "class T { fn f() {} }";
        assert_eq!(runtime_with_depth(source, 16).max_call_depth(), 16);
        assert_eq!(runtime_with_depth(source, usize::MAX).max_call_depth(), MAX_CALL_DEPTH_LIMIT);
    }

    #[test]
    fn test_missing_method_is_load_failure() {
        let fault = run("class T {}", "absent").unwrap_err();
        assert!(fault.is_load_failure());
        let runtime = runtime("class T {}");
        assert!(matches!(runtime.instantiate("App", "Nope"), Err(Fault::TypeNotFound(_))));
        assert!(matches!(runtime.instantiate("Other", "T"), Err(Fault::UnitNotLoaded(_))));
    }

    #[test]
    fn test_load_fails_on_unresolvable_reference() {
        let mut image = compiler::compile(&CompilationUnit::new("App").with_source("a.tdl", "class T {}"), &[]).unwrap();
        image.references.push("Missing".to_string());
        let resolver = MapResolver(HashMap::from([("App".to_string(), image)]));
        let err = Runtime::load("App", &resolver, DEFAULT_MAX_CALL_DEPTH).unwrap_err();
        assert!(matches!(err, ResolutionError::NotInClosure { ref name } if name == "Missing"));
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(Value::Str("x".into()).render(), "\"x\"");
        assert_eq!(Value::Int(-3).render(), "-3");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
