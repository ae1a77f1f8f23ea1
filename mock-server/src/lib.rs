use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub value: Option<Value>,
}

/// What `/echo` saw: method, path, lower-cased headers and the raw body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", get(status))
        .route("/paths/{key}", get(path_body))
        .route("/raw", get(raw))
        .route("/empty", get(empty))
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).put(update_item).delete(delete_item))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    let reason = status.canonical_reason().unwrap_or("unknown");
    Ok((status, Json(json!({ "error": reason, "code": code }))))
}

/// Deterministic body keyed by path, after a short delay so concurrent
/// requests overlap.
async fn path_body(Path(key): Path<String>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    Json(json!({ "key": key }))
}

async fn raw() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        r#"{"raw":"data"}"#,
    )
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(
    State(db): State<Db>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        value: input.value,
    };
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, StatusCode> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateItem>,
) -> Result<Json<Item>, StatusCode> {
    let mut items = db.write().await;
    let item = items.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        item.name = name;
    }
    if let Some(value) = input.value {
        item.value = value;
    }
    Ok(Json(item.clone()))
}

async fn delete_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut items = db.write().await;
    items.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

/// Bind a blocking listener on a random port and serve `app()` from a
/// background thread with its own runtime. Returns the bound address.
pub fn spawn_background() -> std::io::Result<SocketAddr> {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = std_listener.local_addr()?;
    std_listener.set_nonblocking(true)?;

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(err) => {
                tracing::error!(%err, "failed to start mock server runtime");
                return;
            }
        };
        let result = rt.block_on(async {
            let listener = TcpListener::from_std(std_listener)?;
            run(listener).await
        });
        if let Err(err) = result {
            tracing::error!(%err, "mock server stopped");
        }
    });

    Ok(addr)
}

/// Listener that accepts each connection and closes it without a response,
/// so every client attempt fails at the transport level. The counter tracks
/// how many connections were accepted.
pub fn spawn_closing_listener() -> std::io::Result<(SocketAddr, Arc<AtomicUsize>)> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(stream);
                }
                Err(err) => {
                    tracing::warn!(%err, "closing listener accept failed");
                }
            }
        }
    });

    Ok((addr, accepted))
}

/// Listener that accepts each connection and holds it open without ever
/// answering, so every client attempt runs into its timeout. The counter
/// tracks how many connections were accepted.
pub fn spawn_silent_listener() -> std::io::Result<(SocketAddr, Arc<AtomicUsize>)> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    held.push(stream);
                }
                Err(err) => {
                    tracing::warn!(%err, "silent listener accept failed");
                }
            }
        }
    });

    Ok((addr, accepted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes_to_json() {
        let item = Item {
            id: Uuid::nil(),
            name: "Test".to_string(),
            value: json!(42),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Test");
        assert_eq!(json["value"], 42);
    }

    #[test]
    fn create_item_defaults_value_to_null() {
        let input: CreateItem = serde_json::from_str(r#"{"name":"No value"}"#).unwrap();
        assert_eq!(input.name, "No value");
        assert!(input.value.is_null());
    }

    #[test]
    fn create_item_rejects_missing_name() {
        let result: Result<CreateItem, _> = serde_json::from_str(r#"{"value":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn update_item_all_fields_optional() {
        let input: UpdateItem = serde_json::from_str(r#"{}"#).unwrap();
        assert!(input.name.is_none());
        assert!(input.value.is_none());
    }

    #[test]
    fn silent_listener_never_answers() {
        use std::io::Read;

        let (addr, accepted) = spawn_silent_listener().unwrap();
        let mut stream = std::net::TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let mut buf = [0u8; 16];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closing_listener_counts_connections() {
        let (addr, accepted) = spawn_closing_listener().unwrap();
        for _ in 0..2 {
            let _ = std::net::TcpStream::connect(addr).unwrap();
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while accepted.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }
}
