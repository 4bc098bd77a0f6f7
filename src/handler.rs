//! Handler surface: controllers, free callables and their declared signatures.
//!
//! # What stands in for reflection
//!
//! A route needs three things from a handler: a way to call it, the list of
//! parameters it declares (name, required-ness, default) and optional metadata
//! for the self-description. Controllers publish all of it through
//! [`Controller::members`]; free closures carry it on a [`Callable`].
//!
//! ```text
//! Controller::members()  ──► RouteTable::collect     (convention routes)
//! Mount::post("login", "postLogin")                 (explicit, by member name)
//! Mount::get("test", callable(|_| "hi"))             (explicit, closure)
//!        ↓ request time
//! binder::bind_parameters(signature, request)  ──►  Args
//!        ↓
//! Controller::invoke(name, args) / Callable::call(args)  ──►  Outcome
//! ```
//!
//! Every handler, whatever it returns, is normalised to an [`Outcome`] through
//! [`IntoOutcome`], so the dispatcher only ever sees one shape.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{HandlerError, short_type_name};

/// What a handler produced: the `data` of a success envelope, or a failure.
pub type Outcome = Result<Value, HandlerError>;

// ── Declared parameters ───────────────────────────────────────────────────────

/// One declared handler parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    name: String,
    ty: String,
    default: Option<Value>,
}

impl Param {
    /// A parameter that must be present in the query or the body.
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), ty: "mixed".to_owned(), default: None }
    }

    /// A parameter that falls back to `default` when the request omits it.
    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self { name: name.into(), ty: "mixed".to_owned(), default: Some(default.into()) }
    }

    /// Type label shown in the self-description (`string`, `int`, ...).
    pub fn ty(mut self, label: impl Into<String>) -> Self {
        self.ty = label.into();
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn type_label(&self) -> &str { &self.ty }
    pub fn default(&self) -> Option<&Value> { self.default.as_ref() }
    pub fn is_required(&self) -> bool { self.default.is_none() }
}

/// Declared parameters plus the metadata a doc comment would carry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    returns: Option<String>,
    description: Option<String>,
    urls: Vec<String>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, label: impl Into<String>) -> Self {
        self.returns = Some(label.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// An explicit URL pattern. When at least one is declared, convention
    /// routing uses these instead of the name-derived pattern.
    pub fn url(mut self, pattern: impl Into<String>) -> Self {
        self.urls.push(pattern.into());
        self
    }

    pub fn params(&self) -> &[Param] { &self.params }
    pub fn return_label(&self) -> Option<&str> { self.returns.as_deref() }
    pub fn description_text(&self) -> Option<&str> { self.description.as_deref() }
    pub fn urls(&self) -> &[String] { &self.urls }
}

// ── Controllers ───────────────────────────────────────────────────────────────

/// A callable member of a controller.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    name: String,
    signature: Signature,
    public: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self { name: name.into(), signature, public: true }
    }

    /// A member that can be routed explicitly but is never collected.
    pub fn private(name: impl Into<String>, signature: Signature) -> Self {
        Self { name: name.into(), signature, public: false }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn signature(&self) -> &Signature { &self.signature }
    pub fn is_public(&self) -> bool { self.public }
}

/// An object whose members can be mounted as routes.
///
/// `members` must be deterministic: route collection walks it in order and
/// the first pattern registered wins ties during regex fallback.
///
/// ```rust
/// use baton::{Args, Controller, HandlerError, IntoOutcome, Member, Outcome, Param, Signature};
///
/// struct Auth;
///
/// impl Auth {
///     fn login(&self, args: &Args) -> Result<bool, HandlerError> {
///         Ok(args.str(0)? == "peter" && args.str(1)? == "pwd")
///     }
/// }
///
/// impl Controller for Auth {
///     fn members(&self) -> Vec<Member> {
///         vec![Member::new(
///             "postLogin",
///             Signature::new().param(Param::required("username")).param(Param::required("password")),
///         )]
///     }
///
///     fn invoke(&self, member: &str, args: Args) -> Option<Outcome> {
///         match member {
///             "postLogin" => Some(self.login(&args).into_outcome()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Every callable member with its declared signature.
    fn members(&self) -> Vec<Member>;

    /// Calls `member`. `None` when no such member exists.
    fn invoke(&self, member: &str, args: Args) -> Option<Outcome>;

    /// Shown in `MethodNotFoundException` messages.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn member(&self, name: &str) -> Option<Member> {
        self.members().into_iter().find(|m| m.name == name)
    }
}

/// The controller of a mount that only carries closure routes.
impl Controller for () {
    fn members(&self) -> Vec<Member> {
        Vec::new()
    }

    fn invoke(&self, _member: &str, _args: Args) -> Option<Outcome> {
        None
    }

    fn name(&self) -> &str {
        "Mount"
    }
}

// ── Bound arguments ───────────────────────────────────────────────────────────

/// The ordered argument list a handler is called with.
///
/// Position 0 is the HTTP verb for any-method handlers, then regex captures,
/// then named parameters in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn value(&self, index: usize) -> Option<&Value> { self.values.get(index) }
    pub fn iter(&self) -> std::slice::Iter<'_, Value> { self.values.iter() }
    pub fn into_vec(self) -> Vec<Value> { self.values }

    /// Argument `index` as text. Numbers and booleans are stringified.
    #[track_caller]
    pub fn str(&self, index: usize) -> Result<String, HandlerError> {
        match self.required(index)? {
            Value::String(s) => Ok(s.clone()),
            v @ (Value::Number(_) | Value::Bool(_)) => Ok(v.to_string()),
            other => Err(HandlerError::type_error(format!(
                "argument #{} must be of type string, {} given",
                index + 1,
                value_type(other),
            ))),
        }
    }

    /// Argument `index` converted to `T`.
    ///
    /// Query values arrive as strings, so a string that does not convert
    /// directly is retried as a JSON scalar: `"23"` reads as `23u32`,
    /// `"true"` as `true`.
    #[track_caller]
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, HandlerError> {
        let value = self.required(index)?;
        if let Ok(v) = serde_json::from_value::<T>(value.clone()) {
            return Ok(v);
        }
        if let Value::String(s) = value {
            if let Ok(v) = serde_json::from_str::<T>(s) {
                return Ok(v);
            }
        }
        Err(HandlerError::type_error(format!(
            "argument #{} must be of type {}, {} given",
            index + 1,
            short_type_name::<T>(),
            value_type(value),
        )))
    }

    #[track_caller]
    fn required(&self, index: usize) -> Result<&Value, HandlerError> {
        self.values.get(index).ok_or_else(|| {
            HandlerError::new(
                "ArgumentCountError",
                format!("too few arguments, {} passed and at least {} expected", self.len(), index + 1),
            )
        })
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

fn value_type(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_)  => "array",
        Value::Object(_) => "object",
    }
}

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into an [`Outcome`].
///
/// Implemented for the common scalar types, `serde_json::Value`, [`Json`],
/// `Option<T>` (`None` → `null`) and `Result<T, E>` where `E` converts into
/// a [`HandlerError`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

/// Wraps any `Serialize` value returned from a handler.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoOutcome for Json<T> {
    fn into_outcome(self) -> Outcome {
        Ok(serde_json::to_value(self.0)?)
    }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> Outcome { Ok(self) }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome { Ok(Value::Null) }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome { Ok(Value::from(self)) }
}

macro_rules! into_outcome_via_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $t {
                fn into_outcome(self) -> Outcome { Ok(Value::from(self)) }
            }
        )*
    };
}

into_outcome_via_from!(String, bool, i32, i64, u32, u64, usize, f64);

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome {
        match self {
            Some(v) => v.into_outcome(),
            None    => Ok(Value::Null),
        }
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<HandlerError>,
{
    fn into_outcome(self) -> Outcome {
        self.map_err(Into::<HandlerError>::into)?.into_outcome()
    }
}

// ── Type-erased callables ─────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the public [`Handler`] trait.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, args: Args) -> Outcome;
}

/// A type-erased handler shared by every request that routes to it.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every closure usable as a route handler:
///
/// ```text
/// Fn(Args) -> impl IntoOutcome
/// ```
///
/// Sealed: only the blanket impl below satisfies it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
}

impl<F, R> Handler for F
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete closure to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Args) -> R + Send + Sync,
    R: IntoOutcome,
{
    fn call(&self, args: Args) -> Outcome {
        (self.0)(args).into_outcome()
    }
}

/// A free closure routed directly, with its declared signature.
#[derive(Clone)]
pub struct Callable {
    signature: Signature,
    handler: BoxedHandler,
}

/// Wraps a closure as a route target. Declare its parameters with
/// [`Callable::param`]; a closure without parameters needs nothing more.
///
/// ```rust
/// use baton::{callable, Param};
///
/// let greet = callable(|args| Ok::<_, baton::HandlerError>(format!("hello {}", args.str(0)?)))
///     .param(Param::optional("name", "world"));
/// ```
pub fn callable<F, R>(handler: F) -> Callable
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    Callable { signature: Signature::new(), handler: handler.into_boxed_handler() }
}

impl Callable {
    pub fn param(mut self, param: Param) -> Self {
        self.signature = self.signature.param(param);
        self
    }

    /// Replaces the whole signature.
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn declared(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, args: Args) -> Outcome {
        self.handler.call(args)
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable").field("signature", &self.signature).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn typed_access_reads_query_strings() {
        let args = Args::new(vec![json!("23"), json!("true"), json!("peter"), json!(7)]);
        assert_eq!(args.get::<u32>(0).unwrap(), 23);
        assert!(args.get::<bool>(1).unwrap());
        assert_eq!(args.get::<String>(2).unwrap(), "peter");
        assert_eq!(args.str(3).unwrap(), "7");
    }

    #[test]
    fn typed_access_reports_mismatches() {
        let args = Args::new(vec![json!("abc")]);
        let err = args.get::<u32>(0).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
        assert_eq!(err.message(), "argument #1 must be of type u32, string given");

        let err = args.str(4).unwrap_err();
        assert_eq!(err.kind(), "ArgumentCountError");
    }

    #[test]
    fn outcomes() {
        assert_eq!("x".into_outcome().unwrap(), json!("x"));
        assert_eq!(true.into_outcome().unwrap(), json!(true));
        assert_eq!(().into_outcome().unwrap(), Value::Null);
        assert_eq!(None::<String>.into_outcome().unwrap(), Value::Null);
        assert_eq!(Json(vec![1, 2]).into_outcome().unwrap(), json!([1, 2]));

        let failed: Result<String, HandlerError> = Err(HandlerError::msg("nope"));
        assert_eq!(failed.into_outcome().unwrap_err().message(), "nope");
    }

    #[test]
    fn callables_carry_their_signature() {
        let c = callable(|args: Args| args.len()).param(Param::required("a")).param(Param::optional("b", 2));
        assert_eq!(c.declared().params().len(), 2);
        assert!(c.declared().params()[0].is_required());
        assert!(!c.declared().params()[1].is_required());
        assert_eq!(c.call(Args::new(vec![json!(1)])).unwrap(), json!(1));
    }

    #[test]
    fn unit_controller_has_no_members() {
        assert!(().members().is_empty());
        assert!(().invoke("get", Args::default()).is_none());
        assert_eq!(Controller::name(&()), "Mount");
    }
}
