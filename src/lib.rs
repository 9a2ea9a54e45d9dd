//! # ferry
//!
//! Declarative HTTP routes over async business functions.
//!
//! A route is a path, an ordered list of middlewares and one business
//! function. The business function only ever returns `Result<T, E>`; ferry
//! turns that into exactly one HTTP response:
//!
//! - `Ok(value)`: the verb's success status (read 200, create 201, replace
//!   201, delete 201 by default) and `value` as JSON.
//! - `Ok(value)` serializing to `null` (e.g. `Ok(None)`): `404` with
//!   `{"message": "Entity not found"}`.
//! - `Err(e)`: `e` is normalized into an [`ApiError`]; its status (or the
//!   policy's error status) and `{"message": ...}`. The failure is logged.
//! - Download routes send the resolved [`Download`] as an attachment.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ferry::middleware::{cors, trace};
//! use ferry::{middlewares, ApiError, Config, Request, Router, Server};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct User { id: u64, name: String }
//!
//! #[derive(Deserialize)]
//! struct NewUser { name: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("ferry.toml")?;
//!     ferry::telemetry::init(&config.log);
//!
//!     let app = Router::with_settings(config.routes.settings()?)
//!         .layer(cors(config.cors.clone()))
//!         .get("/users/{id}", middlewares![trace()], get_user)
//!         .post("/users", middlewares![trace()], create_user);
//!
//!     Server::new(config.server).serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn get_user(req: Request) -> Result<Option<User>, ApiError> {
//!     let id: u64 = req.param("id").unwrap_or_default().parse().map_err(|_| ApiError::message("bad id"))?;
//!     Ok((id == 42).then(|| User { id, name: "alice".into() }))
//! }
//!
//! async fn create_user(req: Request) -> Result<User, ApiError> {
//!     let input: NewUser = req.json()?;
//!     Ok(User { id: 99, name: input.name })
//! }
//! ```

mod api_error;
mod config;
mod download;
mod error;
mod handler;
mod method;
mod policy;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;
pub mod telemetry;
pub mod translate;

pub use api_error::{ApiError, DriverError, NOT_FOUND_MESSAGE, TIMEOUT_MESSAGE, VALIDATION_SENTINEL};
pub use config::{Config, ConfigError, LogConfig, RoutesConfig, ServerConfig, SuccessTable};
pub use download::Download;
pub use error::Error;
pub use handler::BusinessFn;
pub use method::{Method, Verb};
pub use policy::{ErrorLogFormat, ErrorPolicy, RouteSettings, StatusPolicy};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBody, ResponseBuilder};
pub use router::Router;
pub use server::Server;
