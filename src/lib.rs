//! # baton
//!
//! Convention-driven REST dispatch. A controller lists its members; member
//! names become routes (`getStats` → `GET stats`, `postLogin` → `POST login`),
//! declared parameters are bound from captures, query and body, and every
//! result is wrapped in a status envelope:
//!
//! ```text
//! {"status": 200, "data": …}
//! {"status": 400, "error": "RouteNotFoundException", "message": "…"}
//! ```
//!
//! Mounts nest. A child mount owns a longer prefix and gets the first look
//! at every request; when it has no route the parent tries its own table.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use baton::{callable, Mount, Param, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), baton::Error> {
//!     let api = Mount::new("/api")
//!         .get("stats/([0-9]+)", callable(|args| args.str(0)).param(Param::required("id")))
//!         .post("login", callable(|args| {
//!             Ok::<_, baton::HandlerError>(args.str(0)? == "peter" && args.str(1)? == "pw")
//!         })
//!         .param(Param::required("username"))
//!         .param(Param::required("password")));
//!
//!     Server::bind("0.0.0.0:3000").serve(api).await
//! }
//! ```
//!
//! Without a transport, [`Mount::simulate_call`] runs the whole lifecycle
//! in-process and returns the encoded envelope.

mod describe;
mod error;
mod handler;
mod method;
mod mount;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod binder;
pub mod format;
pub mod path;

pub use describe::describe;
pub use error::{DispatchError, Error, HandlerError};
pub use format::{Encoder, Format, JsonEncoder, XmlEncoder};
pub use handler::{
    Args, Callable, Controller, Handler, IntoOutcome, Json, Member, Outcome, Param, Signature, callable,
};
pub use method::{Method, MethodKey};
pub use mount::{AccessHook, ControllerFactory, Dispatch, ExceptionHook, Mount, Settings, SuccessWrapper};
pub use request::{Request, RequestBuilder};
pub use response::{Envelope, Response, wrap};
pub use router::{Exclude, IntoTarget, Route, RouteMatch, RouteTable, Target};
pub use server::{Server, serve_listener};
pub use status::{Status, status_line};
