//! A small controller served over HTTP.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api
//!   curl http://localhost:3000/api/stats/23
//!   curl http://localhost:3000/api/stats.xml
//!   curl -X POST 'http://localhost:3000/api/login?username=peter&password=pwd'
//!   curl -X OPTIONS http://localhost:3000/api
//!   curl http://localhost:3000/api/admin/users

use baton::{Args, Controller, HandlerError, IntoOutcome, Member, Mount, Outcome, Param, Server, Signature, callable};
use serde_json::json;

struct Site;

impl Site {
    fn login(&self, args: &Args) -> Result<bool, HandlerError> {
        Ok(args.str(0)? == "peter" && args.str(1)? == "pwd")
    }

    fn stats(&self, args: &Args) -> Result<String, HandlerError> {
        let server: u32 = args.get(0)?;
        Ok(format!("Stats for {server}"))
    }
}

impl Controller for Site {
    fn members(&self) -> Vec<Member> {
        vec![
            Member::new("get", Signature::new().description("Landing page.").returns("string")),
            Member::new(
                "postLogin",
                Signature::new()
                    .param(Param::required("username").ty("string"))
                    .param(Param::required("password").ty("string"))
                    .returns("bool"),
            ),
            Member::new(
                "getStats",
                Signature::new()
                    .param(Param::optional("server", "1").ty("int"))
                    .url("stats/([0-9]+)")
                    .url("stats")
                    .returns("string"),
            ),
        ]
    }

    fn invoke(&self, member: &str, args: Args) -> Option<Outcome> {
        let outcome = match member {
            "get"       => "welcome".into_outcome(),
            "postLogin" => self.login(&args).into_outcome(),
            "getStats"  => self.stats(&args).into_outcome(),
            _ => return None,
        };
        Some(outcome)
    }
}

#[tokio::main]
async fn main() -> Result<(), baton::Error> {
    tracing_subscriber::fmt::init();

    let api = Mount::with_controller("/api", Site)
        .collect_routes()
        .on_exception(|e| tracing::warn!(kind = e.kind(), "request failed: {}", e.message()))
        .mount("admin", (), |admin| {
            admin.get("users", callable(|_| json!([{"id": 1, "name": "peter"}])))
        });

    Server::bind("0.0.0.0:3000").serve(api).await
}
