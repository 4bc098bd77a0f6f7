//! Controller mounts and the request lifecycle.
//!
//! A [`Mount`] is one routing scope: a trigger prefix, a controller, a route
//! table and child mounts. Dispatch walks the tree children-first:
//!
//! ```text
//! Mount::dispatch(req)
//!   ├─ each child, in mount order ── first Matched wins, returned as is
//!   ├─ outside our prefix?          ── Unmatched
//!   ├─ RouteTable::find_route
//!   ├─ OPTIONS without an options handler ── self-description
//!   ├─ no route: nested ── Unmatched | root ── fallback or RouteNotFound
//!   ├─ bind_parameters
//!   ├─ check_access hook
//!   └─ invoke ── success / exception envelope
//! ```
//!
//! The tree is built once and only read afterwards, so a `Mount` can be
//! shared between worker threads behind an `Arc`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::binder;
use crate::describe;
use crate::error::{DispatchError, Error, HandlerError};
use crate::handler::{Args, Controller, Signature};
use crate::method::{Method, MethodKey};
use crate::path;
use crate::request::Request;
use crate::response::{Envelope, Response};
use crate::router::{Exclude, IntoTarget, RouteTable, Target};
use crate::status::Status;

/// Called with `(request path, bound arguments)` once a route is resolved.
/// Returning an error stops the request with an exception envelope.
pub type AccessHook = Arc<dyn Fn(&str, &Args) -> Result<(), HandlerError> + Send + Sync>;

/// Observes handler failures. Cannot change the response.
pub type ExceptionHook = Arc<dyn Fn(&HandlerError) + Send + Sync>;

/// Transforms successful handler data before it is enveloped.
pub type SuccessWrapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Builds a controller by name for [`Mount::mount_named`].
pub type ControllerFactory = Arc<dyn Fn(&str) -> Option<Arc<dyn Controller>> + Send + Sync>;

/// Configuration a child inherits from its parent when it is mounted.
///
/// Copied once; changing the parent afterwards does not reach existing
/// children.
#[derive(Clone)]
pub struct Settings {
    check_access: Option<AccessHook>,
    on_exception: Option<ExceptionHook>,
    success_wrapper: Option<SuccessWrapper>,
    factory: Option<ControllerFactory>,
    debug: bool,
    with_status_codes: bool,
    describe_routes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_access: None,
            on_exception: None,
            success_wrapper: None,
            factory: None,
            debug: false,
            with_status_codes: true,
            describe_routes: true,
        }
    }
}

impl Settings {
    pub fn debug(&self) -> bool { self.debug }
    pub fn with_status_codes(&self) -> bool { self.with_status_codes }
    pub fn describe_routes(&self) -> bool { self.describe_routes }
}

/// Result of offering a request to a mount.
#[derive(Debug)]
pub enum Dispatch {
    /// The mount (or one of its children) produced the response.
    Matched(Response),
    /// Not ours; an ancestor may still claim it.
    Unmatched,
}

/// A routing scope mounted at a trigger prefix.
///
/// ```rust
/// use baton::{callable, Mount};
///
/// let api = Mount::new("/")
///     .get("", callable(|_| "root GET"))
///     .mount("v1", (), |v1| v1.get("ping", callable(|_| "pong")));
///
/// assert_eq!(
///     api.simulate_call("/v1/ping", "get"),
///     "{\n    \"status\": 200,\n    \"data\": \"pong\"\n}",
/// );
/// ```
pub struct Mount {
    trigger: String,
    controller: Arc<dyn Controller>,
    routes: RouteTable,
    children: Vec<Mount>,
    nested: bool,
    settings: Settings,
    fallback: Option<String>,
    exclude: Exclude,
}

impl Mount {
    /// A root mount without a controller; routes are closures.
    pub fn new(trigger: &str) -> Self {
        Self::with_shared(trigger, Arc::new(()))
    }

    pub fn with_controller(trigger: &str, controller: impl Controller) -> Self {
        Self::with_shared(trigger, Arc::new(controller))
    }

    pub fn with_shared(trigger: &str, controller: Arc<dyn Controller>) -> Self {
        Self {
            trigger: path::normalize(trigger),
            controller,
            routes: RouteTable::new(),
            children: Vec::new(),
            nested: false,
            settings: Settings::default(),
            fallback: None,
            exclude: Exclude::default(),
        }
    }

    /// A root mount whose controller is built by `factory`.
    pub fn with_factory(
        trigger: &str,
        name: &str,
        factory: impl Fn(&str) -> Option<Arc<dyn Controller>> + Send + Sync + 'static,
    ) -> Result<Self, Error> {
        let factory: ControllerFactory = Arc::new(factory);
        let controller = factory(name).ok_or_else(|| Error::ControllerInit(name.to_owned()))?;
        let mut mount = Self::with_shared(trigger, controller);
        mount.settings.factory = Some(factory);
        Ok(mount)
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    /// Adds `file`, `line` and `trace` to exception envelopes.
    pub fn debug(mut self, on: bool) -> Self {
        self.settings.debug = on;
        self
    }

    /// Whether a live transport sends the envelope status. On by default.
    pub fn with_status_codes(mut self, on: bool) -> Self {
        self.settings.with_status_codes = on;
        self
    }

    /// Whether OPTIONS requests without an options handler get the
    /// self-description. On by default.
    pub fn describe_routes(mut self, on: bool) -> Self {
        self.settings.describe_routes = on;
        self
    }

    pub fn check_access(
        mut self,
        hook: impl Fn(&str, &Args) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self {
        self.settings.check_access = Some(Arc::new(hook));
        self
    }

    pub fn on_exception(mut self, hook: impl Fn(&HandlerError) + Send + Sync + 'static) -> Self {
        self.settings.on_exception = Some(Arc::new(hook));
        self
    }

    pub fn success_wrapper(mut self, wrap: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.settings.success_wrapper = Some(Arc::new(wrap));
        self
    }

    /// Factory inherited by children built with [`mount_named`](Self::mount_named).
    pub fn controller_factory(
        mut self,
        factory: impl Fn(&str) -> Option<Arc<dyn Controller>> + Send + Sync + 'static,
    ) -> Self {
        self.settings.factory = Some(Arc::new(factory));
        self
    }

    /// Controller member answering unmatched requests on a root mount.
    pub fn fallback(mut self, member: impl Into<String>) -> Self {
        self.fallback = Some(member.into());
        self
    }

    /// Members skipped by [`collect_routes`](Self::collect_routes).
    pub fn collect_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = exclude;
        self
    }

    // ── Routes ────────────────────────────────────────────────────────────────

    pub fn add_route(mut self, pattern: &str, target: impl IntoTarget, key: impl Into<MethodKey>) -> Self {
        self.routes.add_route(pattern, target, key);
        self
    }

    /// Registers under the any-method slot; the handler receives the verb
    /// as its first argument.
    pub fn any(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, MethodKey::Any)
    }

    pub fn get(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Get)
    }

    pub fn post(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Post)
    }

    pub fn put(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Put)
    }

    pub fn patch(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Patch)
    }

    pub fn delete(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Delete)
    }

    pub fn head(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Head)
    }

    pub fn options(self, pattern: &str, target: impl IntoTarget) -> Self {
        self.add_route(pattern, target, Method::Options)
    }

    /// Convention routing over the controller's members.
    pub fn collect_routes(mut self) -> Self {
        self.routes.collect(self.controller.as_ref(), &self.exclude);
        self
    }

    // ── Children ──────────────────────────────────────────────────────────────

    /// Mounts `controller` under `prefix` (relative to this mount) and lets
    /// `build` configure the child.
    pub fn mount(
        self,
        prefix: &str,
        controller: impl Controller,
        build: impl FnOnce(Mount) -> Mount,
    ) -> Self {
        self.mount_shared(prefix, Arc::new(controller), build)
    }

    pub fn mount_shared(
        mut self,
        prefix: &str,
        controller: Arc<dyn Controller>,
        build: impl FnOnce(Mount) -> Mount,
    ) -> Self {
        let child = self.child(prefix, controller);
        self.children.push(build(child));
        self
    }

    /// Mounts a controller built by the inherited factory.
    pub fn mount_named(
        self,
        prefix: &str,
        name: &str,
        build: impl FnOnce(Mount) -> Mount,
    ) -> Result<Self, Error> {
        let controller = self.settings.factory.as_ref()
            .and_then(|factory| factory(name))
            .ok_or_else(|| Error::ControllerInit(name.to_owned()))?;
        Ok(self.mount_shared(prefix, controller, build))
    }

    fn child(&self, prefix: &str, controller: Arc<dyn Controller>) -> Mount {
        let base = if self.trigger == "/" { "" } else { self.trigger.as_str() };
        let prefix = path::normalize(prefix);
        let trigger = if prefix == "/" { path::normalize(base) } else { format!("{base}{prefix}") };
        Mount {
            trigger,
            controller,
            routes: RouteTable::new(),
            children: Vec::new(),
            nested: true,
            settings: self.settings.clone(),
            fallback: None,
            exclude: Exclude::default(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Normalised trigger prefix, including every ancestor's prefix.
    pub fn trigger(&self) -> &str { &self.trigger }
    pub fn controller(&self) -> &dyn Controller { self.controller.as_ref() }
    pub fn routes(&self) -> &RouteTable { &self.routes }
    pub fn children(&self) -> &[Mount] { &self.children }
    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn is_nested(&self) -> bool { self.nested }

    /// Declared signature behind a route target, if it still exists.
    pub(crate) fn signature_of(&self, target: &Target) -> Option<Signature> {
        match target {
            Target::Member(name) => self.controller.member(name).map(|m| m.signature().clone()),
            Target::Callable(c)  => Some(c.declared().clone()),
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Full dispatch. Always produces a response.
    pub fn run(&self, req: &Request) -> Response {
        match self.dispatch(req) {
            Dispatch::Matched(response) => response,
            Dispatch::Unmatched => {
                let uri = path::normalize(req.path());
                self.fail(req, DispatchError::RouteNotFound(uri))
            }
        }
    }

    /// In-process client: no transport, no status emission. `uri` may carry
    /// a query string.
    pub fn simulate_call(&self, uri: &str, method: &str) -> String {
        let req = Request::builder().uri(uri).force_method(Method::resolve(method)).build();
        self.run(&req).into_body()
    }

    /// Offers `req` to the children, then to this mount.
    pub fn dispatch(&self, req: &Request) -> Dispatch {
        for child in &self.children {
            if let Dispatch::Matched(response) = child.dispatch(req) {
                return Dispatch::Matched(response);
            }
        }

        let requested = path::normalize(req.path());
        let Some(local) = self.local_path(&requested) else {
            return Dispatch::Unmatched;
        };
        let method = req.method();
        let found = self.routes.find_route(local, method);

        if method == Method::Options
            && self.settings.describe_routes
            && found.as_ref().is_none_or(|m| m.key != MethodKey::Verb(Method::Options))
        {
            debug!(mount = %self.trigger, uri = local, "serving route description");
            let description = describe::describe(self, Some(local), false);
            return Dispatch::Matched(self.succeed(req, description));
        }

        let Some(found) = found else {
            if self.nested {
                return Dispatch::Unmatched;
            }
            let response = match &self.fallback {
                Some(member) => self.call(req, &Target::Member(member.clone()), Args::default()),
                None         => self.fail(req, DispatchError::RouteNotFound(local.to_owned())),
            };
            return Dispatch::Matched(response);
        };

        debug!(
            mount = %self.trigger,
            pattern = found.pattern,
            key = %found.key,
            captures = found.captures.len(),
            "route resolved",
        );

        let Some(signature) = self.signature_of(found.target) else {
            return Dispatch::Matched(self.fail(req, self.method_not_found(found.target)));
        };
        let verb = (found.key == MethodKey::Any).then_some(method);
        let args = match binder::bind_parameters(signature.params(), req, found.captures, verb) {
            Ok(args) => args,
            Err(e)   => return Dispatch::Matched(self.fail(req, e)),
        };

        if let Some(hook) = &self.settings.check_access {
            if let Err(e) = hook(req.path(), &args) {
                return Dispatch::Matched(self.fail(req, DispatchError::Handler(e)));
            }
        }

        Dispatch::Matched(self.call(req, found.target, args))
    }

    /// Mount-local path (no leading slash) when `requested` is inside this
    /// mount. Prefixes only match on segment boundaries.
    fn local_path<'a>(&self, requested: &'a str) -> Option<&'a str> {
        if self.trigger == "/" {
            return Some(&requested[1..]);
        }
        let rest = requested.strip_prefix(self.trigger.as_str())?;
        match rest {
            ""   => Some(""),
            rest => rest.strip_prefix('/'),
        }
    }

    fn call(&self, req: &Request, target: &Target, args: Args) -> Response {
        let outcome = match target {
            Target::Member(name) => {
                match guarded(|| self.controller.invoke(name, args)) {
                    Ok(Some(outcome)) => outcome,
                    Ok(None)          => return self.fail(req, self.method_not_found(target)),
                    Err(panic)        => Err(panic),
                }
            }
            Target::Callable(callable) => guarded(|| callable.call(args)).and_then(|outcome| outcome),
        };

        match outcome {
            Ok(data) => self.succeed(req, data),
            Err(e)   => self.fail(req, DispatchError::Handler(e)),
        }
    }

    fn method_not_found(&self, target: &Target) -> DispatchError {
        let member = match target {
            Target::Member(name) => name.clone(),
            Target::Callable(_)  => "<callable>".to_owned(),
        };
        DispatchError::MethodNotFound { member, controller: self.controller.name().to_owned() }
    }

    fn succeed(&self, req: &Request, data: Value) -> Response {
        let data = match &self.settings.success_wrapper {
            Some(wrap) => wrap(data),
            None       => data,
        };
        self.respond(req, &Envelope::data(Status::Ok, data))
    }

    fn fail(&self, req: &Request, err: DispatchError) -> Response {
        let mut envelope = Envelope::error(err.status(), err.kind(), &err.to_string());
        match &err {
            DispatchError::Handler(e) => {
                error!(mount = %self.trigger, kind = e.kind(), "handler failed: {}", e.message());
                if let Some(hook) = &self.settings.on_exception {
                    hook(e);
                }
                if self.settings.debug {
                    envelope = envelope
                        .with("file", e.file())
                        .with("line", e.line())
                        .with("trace", e.trace());
                }
            }
            other => warn!(mount = %self.trigger, kind = other.kind(), "{other}"),
        }
        self.respond(req, &envelope)
    }

    fn respond(&self, req: &Request, envelope: &Envelope) -> Response {
        let emit = self.settings.with_status_codes && !req.suppress_status_code();
        Response::new(envelope, req.format(), emit)
    }
}

/// Runs handler code, turning a panic into a `HandlerError`.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, HandlerError> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload.downcast_ref::<&str>().map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_owned());
        HandlerError::new("Panic", message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::callable;

    #[test]
    fn child_triggers_compose() {
        for root in ["/", "", "//"] {
            let m = Mount::new(root).mount("sub", (), |s| s.mount("/deeper/", (), |d| d));
            assert_eq!(m.trigger(), "/");
            assert_eq!(m.children()[0].trigger(), "/sub");
            assert_eq!(m.children()[0].children()[0].trigger(), "/sub/deeper");
        }
        let m = Mount::new("v1/").mount("sub/", (), |s| s);
        assert_eq!(m.trigger(), "/v1");
        assert_eq!(m.children()[0].trigger(), "/v1/sub");
    }

    #[test]
    fn prefixes_match_on_segment_boundaries() {
        let m = Mount::new("/v1");
        assert_eq!(m.local_path("/v1"), Some(""));
        assert_eq!(m.local_path("/v1/login"), Some("login"));
        assert_eq!(m.local_path("/v10/login"), None);
        assert_eq!(m.local_path("/other"), None);
        assert_eq!(Mount::new("/").local_path("/login"), Some("login"));
    }

    #[test]
    fn settings_are_copied_down_once() {
        let m = Mount::new("/").debug(true).with_status_codes(false).mount("a", (), |a| a).debug(false);
        assert!(!m.settings().debug());
        assert!(m.children()[0].settings().debug());
        assert!(!m.children()[0].settings().with_status_codes());
        assert!(m.children()[0].is_nested());
    }

    #[test]
    fn unmatched_nested_mounts_yield_to_the_parent() {
        let m = Mount::new("/").mount("sub", (), |s| s.get("x", callable(|_| "x")));
        let req = Request::builder().uri("/sub/y").build();
        assert!(matches!(m.children()[0].dispatch(&req), Dispatch::Unmatched));
        assert_eq!(m.run(&req).status(), 400);
    }

    #[test]
    fn factory_builds_root_and_named_children() {
        let factory = |name: &str| match name {
            "empty" => Some(Arc::new(()) as Arc<dyn Controller>),
            _       => None,
        };
        let m = Mount::with_factory("/", "empty", factory).unwrap();
        assert_eq!(m.controller().name(), "Mount");

        let m = m.mount_named("child", "empty", |c| c).unwrap();
        assert_eq!(m.children()[0].trigger(), "/child");
        assert!(matches!(Mount::with_factory("/", "missing", factory), Err(Error::ControllerInit(_))));
    }

    #[test]
    fn panics_become_exception_envelopes() {
        let m = Mount::new("/").get("boom", callable(|_| -> &'static str { panic!("kaboom") }));
        let body = m.simulate_call("/boom", "get");
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["status"], 500);
        assert_eq!(v["error"], "Panic");
        assert_eq!(v["message"], "kaboom");
    }
}
