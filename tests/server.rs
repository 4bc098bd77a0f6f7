use baton::{Mount, Param, callable, serve_listener};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn roundtrip(addr: std::net::SocketAddr, request: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head.to_owned(), body.to_owned())
}

#[tokio::test]
async fn serves_envelopes_over_http() {
    let api = Mount::new("/api")
        .post(
            "login",
            callable(|args| Ok::<_, baton::HandlerError>(args.str(0)? == "peter" && args.str(1)? == "pwd"))
                .param(Param::required("username"))
                .param(Param::required("password")),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_listener(listener, api, async {
        let _ = stopped.await;
    }));

    let body = "username=peter&password=pwd";
    let (head, payload) = roundtrip(
        addr,
        &format!(
            "POST /api/login HTTP/1.1\r\nhost: test\r\ncontent-type: application/x-www-form-urlencoded\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len(),
        ),
    )
    .await;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
    assert_eq!(serde_json::from_str::<Value>(&payload).unwrap(), json!({"status": 200, "data": true}));

    let (head, _) = roundtrip(addr, "GET /api/missing HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n").await;
    assert!(head.starts_with("HTTP/1.1 400 Bad Request"), "{head}");

    let (head, payload) = roundtrip(
        addr,
        "GET /api/missing?_suppress_status_code=1 HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n",
    )
    .await;
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{head}");
    assert_eq!(serde_json::from_str::<Value>(&payload).unwrap()["status"], 400);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn rejects_bad_addresses() {
    let err = baton::Server::bind("not an address").serve(Mount::new("/")).await.unwrap_err();
    assert!(matches!(err, baton::Error::InvalidAddress(_)));
}
