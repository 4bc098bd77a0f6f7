//! Self-description served for `OPTIONS` requests.

use serde_json::{Map, Value, json};

use crate::binder::argument_name;
use crate::handler::Signature;
use crate::mount::Mount;

/// Describes `mount`'s routes.
///
/// With a non-empty `uri`, only routes whose pattern matches it are listed
/// and capture-bound parameters are marked with `fromRegex`. Without one,
/// every route is listed and each child mount is nested under
/// `subController`. `only_routes` drops the reserved-parameter table.
pub fn describe(mount: &Mount, uri: Option<&str>, only_routes: bool) -> Value {
    let uri = uri.filter(|u| !u.is_empty());
    let mut out = Map::new();

    if !only_routes {
        out.insert("parameters".to_owned(), reserved_parameters());
    }

    let mut routes = Map::new();
    for route in mount.routes().routes() {
        let captures = match uri {
            Some(uri) => match route.captures(uri) {
                Some(caps) => caps,
                None       => continue,
            },
            None => Vec::new(),
        };

        let mut methods = Map::new();
        for (key, target) in route.handlers() {
            if let Some(signature) = mount.signature_of(target) {
                methods.insert(key.as_str().to_ascii_uppercase(), method_entry(&signature, &captures));
            }
        }
        routes.insert(
            route.pattern().to_owned(),
            json!({ "uri": route_uri(mount.trigger(), route.pattern()), "methods": methods }),
        );
    }

    let mut controller = Map::new();
    controller.insert("entryPoint".to_owned(), Value::from(mount.trigger()));
    if !routes.is_empty() {
        controller.insert("routes".to_owned(), Value::Object(routes));
    }
    out.insert("controller".to_owned(), Value::Object(controller));

    if uri.is_none() && !mount.children().is_empty() {
        let children = mount.children().iter()
            .map(|child| (child.trigger().to_owned(), describe(child, None, true)))
            .collect();
        out.insert("subController".to_owned(), Value::Object(children));
    }

    Value::Object(out)
}

fn reserved_parameters() -> Value {
    json!({
        "_method": {
            "description": "Can be used as HTTP METHOD if the client does not support HTTP methods.",
            "type": "string",
            "values": "GET, POST, PUT, DELETE, HEAD, OPTIONS, PATCH",
        },
        "_suppress_status_code": {
            "description": "Suppress the HTTP status code.",
            "type": "boolean",
            "values": "1, 0",
        },
        "_format": {
            "description": "Format of generated data. Can be added as suffix .json .xml",
            "type": "string",
            "values": "json, xml",
        },
    })
}

fn route_uri(trigger: &str, pattern: &str) -> String {
    match trigger {
        "/"     => format!("/{pattern}"),
        trigger => format!("{trigger}/{pattern}"),
    }
}

fn method_entry(signature: &Signature, captures: &[String]) -> Value {
    let mut parameters = Map::new();
    for (i, param) in signature.params().iter().enumerate() {
        let mut entry = Map::new();
        entry.insert("type".to_owned(), Value::from(param.type_label()));
        if captures.get(i).is_some_and(|c| !c.is_empty()) {
            entry.insert("fromRegex".to_owned(), Value::from(format!("${}", i + 1)));
        }
        entry.insert("required".to_owned(), Value::from(param.is_required()));
        if let Some(default) = param.default() {
            entry.insert("default".to_owned(), default.clone());
        }
        parameters.insert(argument_name(param.name()).into_owned(), Value::Object(entry));
    }

    let mut out = Map::new();
    out.insert("parameters".to_owned(), Value::Object(parameters));
    out.insert("return".to_owned(), json!({ "type": signature.return_label().unwrap_or("mixed") }));
    if let Some(text) = signature.description_text() {
        out.insert("description".to_owned(), Value::from(text));
    }
    if !signature.urls().is_empty() {
        out.insert("url".to_owned(), Value::from(signature.urls().to_vec()));
    }
    Value::Object(out)
}
