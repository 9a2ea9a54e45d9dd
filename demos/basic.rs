//! Minimal ferry service: CRUD-style JSON routes over an in-memory store,
//! plus one download route.
//!
//! Run with:
//!   cargo run --example basic [path/to/ferry.toml]
//!
//! Try:
//!   curl http://localhost:3000/users/1
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/users -d 'name=carol'
//!   curl -X PUT http://localhost:3000/users/1 \
//!        -H 'content-type: application/json' -d '{"name":"bob"}'
//!   curl -X DELETE http://localhost:3000/users/1
//!   curl -OJ http://localhost:3000/users/export

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ferry::middleware::{Next, compression, cors, trace};
use ferry::{ApiError, Config, Download, IntoResponse, Request, Response, Router, Server, middlewares};
use http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct UserInput {
    name: String,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<u64, User>,
    next_id: u64,
}

type Db = Arc<Mutex<Store>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    ferry::telemetry::init(&config.log);

    let db = Db::default();

    let app = Router::with_settings(config.routes.settings()?)
        .method_override(config.routes.method_override)
        .layer(cors(config.cors.clone()))
        .layer(trace())
        .layer(compression())
        .download("/users/export", middlewares![], with_db(&db, export_users))
        .get("/users/{id}", middlewares![], with_db(&db, get_user))
        .post("/users", middlewares![], with_db(&db, create_user))
        .put("/users/{id}", middlewares![require_json], with_db(&db, replace_user))
        .delete("/users/{id}", middlewares![], with_db(&db, delete_user));

    Server::new(config.server).serve(app).await?;
    Ok(())
}

/// Hands every request to `f` together with the shared store.
fn with_db<F, Fut, T>(db: &Db, f: F) -> impl Fn(Request) -> Fut + Send + Sync + 'static
where
    F: Fn(Db, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    let db = Arc::clone(db);
    move |req| f(Arc::clone(&db), req)
}

async fn require_json(req: Request, next: Next) -> Response {
    match req.header("content-type") {
        Some(ct) if ct.starts_with("application/json") => next.run(req).await,
        _ => StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response(),
    }
}

fn id(req: &Request) -> Result<u64, ApiError> {
    req.param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "id must be a number"))
}

// GET /users/{id}: a missing user answers 404 "Entity not found".
async fn get_user(db: Db, req: Request) -> Result<Option<User>, ApiError> {
    let id = id(&req)?;
    let store = db.lock().map_err(ApiError::opaque)?;
    Ok(store.users.get(&id).cloned())
}

// POST /users accepts JSON or an HTML form.
async fn create_user(db: Db, req: Request) -> Result<User, ApiError> {
    let input: UserInput = match req.header("content-type") {
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => req.form()?,
        _ => req.json()?,
    };
    if input.name.trim().is_empty() {
        return Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty"));
    }

    let mut store = db.lock().map_err(ApiError::opaque)?;
    store.next_id += 1;
    let user = User { id: store.next_id, name: input.name };
    store.users.insert(user.id, user.clone());
    Ok(user)
}

async fn replace_user(db: Db, req: Request) -> Result<Option<User>, ApiError> {
    let id = id(&req)?;
    let input: UserInput = req.json()?;
    let mut store = db.lock().map_err(ApiError::opaque)?;
    Ok(store.users.get_mut(&id).map(|user| {
        user.name = input.name;
        user.clone()
    }))
}

async fn delete_user(db: Db, req: Request) -> Result<Option<User>, ApiError> {
    let id = id(&req)?;
    let mut store = db.lock().map_err(ApiError::opaque)?;
    Ok(store.users.remove(&id))
}

// GET /users/export: the whole store as a CSV attachment.
async fn export_users(db: Db, _req: Request) -> Result<Download, ApiError> {
    let store = db.lock().map_err(ApiError::opaque)?;
    let mut csv = String::from("id,name\n");
    for user in store.users.values() {
        csv.push_str(&format!("{},{}\n", user.id, user.name));
    }
    Ok(Download::new(csv, "text/csv", "users.csv"))
}
