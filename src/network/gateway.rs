//! HTTP Gateway
//!
//! Routes requests under `/api` to the engine and renders JSON responses.
//!
//! ## Routes
//! ```text
//! GET    /api/databases                                   list databases
//! POST   /api/databases                {name}             create database
//! DELETE /api/databases/{db}                              delete database
//! GET    /api/databases/{db}/collections                  list collections
//! POST   /api/databases/{db}/collections {name, schema}   create collection
//! DELETE /api/databases/{db}/collections/{coll}           delete collection
//! GET    .../collections/{coll}/schema                    get schema
//! GET    .../collections/{coll}/instances?query=f:v,...   list/find instances
//! POST   .../collections/{coll}/instances {fields}        insert instance
//! GET    .../instances/{id}                               get instance
//! PUT    .../instances/{id}                {fields}       update instance
//! DELETE .../instances/{id}                               delete instance
//! POST   /api/execute                  {command, arguments}
//! ```

use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, SydbError};
use crate::pool::WorkerGauge;
use crate::protocol::{Command, ExecuteRequest, Method, Request, Response};
use crate::rate_limit::RateLimiter;
use crate::schema::FieldDescriptor;
use crate::validation::{validate_collection_name, validate_database_name, validate_instance_id};

const DATABASES_PREFIX: &str = "/api/databases";
const EXECUTE_PATH: &str = "/api/execute";

/// A resource addressed by a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Databases,
    Database {
        database: String,
    },
    Collections {
        database: String,
    },
    Collection {
        database: String,
        collection: String,
    },
    Schema {
        database: String,
        collection: String,
    },
    Instances {
        database: String,
        collection: String,
    },
    Instance {
        database: String,
        collection: String,
        id: String,
    },
    Execute,
}

impl Route {
    /// Match a path against the route table; `None` when nothing matches.
    ///
    /// Components are only split here. `validate` checks them.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        if path == EXECUTE_PATH {
            return Some(Route::Execute);
        }

        let rest = path.strip_prefix(DATABASES_PREFIX)?;
        if rest.is_empty() {
            return Some(Route::Databases);
        }
        let rest = rest.strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();

        let route = match segments.as_slice() {
            [db] => Route::Database {
                database: db.to_string(),
            },
            [db, "collections"] => Route::Collections {
                database: db.to_string(),
            },
            [db, "collections", coll] => Route::Collection {
                database: db.to_string(),
                collection: coll.to_string(),
            },
            [db, "collections", coll, "schema"] => Route::Schema {
                database: db.to_string(),
                collection: coll.to_string(),
            },
            [db, "collections", coll, "instances"] => Route::Instances {
                database: db.to_string(),
                collection: coll.to_string(),
            },
            [db, "collections", coll, "instances", id] => Route::Instance {
                database: db.to_string(),
                collection: coll.to_string(),
                id: id.to_string(),
            },
            _ => return None,
        };
        Some(route)
    }

    /// Length- and character-check every path component
    pub fn validate(&self) -> Result<()> {
        match self {
            Route::Databases | Route::Execute => Ok(()),
            Route::Database { database } | Route::Collections { database } => {
                validate_database_name(database)
            }
            Route::Collection {
                database,
                collection,
            }
            | Route::Schema {
                database,
                collection,
            }
            | Route::Instances {
                database,
                collection,
            } => {
                validate_database_name(database)?;
                validate_collection_name(collection)
            }
            Route::Instance {
                database,
                collection,
                id,
            } => {
                validate_database_name(database)?;
                validate_collection_name(collection)?;
                validate_instance_id(id)
            }
        }
    }

    /// Methods this resource supports, for dispatch and the `Allow` header
    pub fn allowed_methods(&self) -> &'static [&'static str] {
        match self {
            Route::Databases | Route::Collections { .. } | Route::Instances { .. } => {
                &["GET", "POST"]
            }
            Route::Database { .. } | Route::Collection { .. } => &["DELETE"],
            Route::Schema { .. } => &["GET"],
            Route::Instance { .. } => &["GET", "PUT", "DELETE"],
            Route::Execute => &["POST"],
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods().contains(&method.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct CreateDatabaseBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateCollectionBody {
    name: String,
    #[serde(default)]
    schema: Vec<FieldDescriptor>,
}

/// Request router shared by all workers
pub struct Gateway {
    engine: Arc<Engine>,
    limiter: RateLimiter,
    /// Set once the server's worker pool exists
    workers: OnceLock<Arc<WorkerGauge>>,
}

impl Gateway {
    pub fn new(engine: Arc<Engine>, limiter: RateLimiter) -> Self {
        Self {
            engine,
            limiter,
            workers: OnceLock::new(),
        }
    }

    /// Gateway with a rate limiter built from `config`
    pub fn from_config(engine: Arc<Engine>, config: &Config) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_window(), config.rate_limit_max_requests);
        Self::new(engine, limiter)
    }

    /// Expose worker pool counters through the `stats` command
    pub fn attach_workers(&self, gauge: Arc<WorkerGauge>) {
        let _ = self.workers.set(gauge);
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Answer one request from `client`. Never fails: errors become JSON bodies.
    pub fn handle(&self, request: &Request, client: IpAddr) -> Response {
        if let Err(e) = self.limiter.check(client) {
            tracing::warn!("Rejected {} {} from {}: {}", request.method, request.path, client, e);
            return Response::from_error(&e);
        }

        let Some(route) = Route::parse(&request.path) else {
            tracing::debug!("No route for {} {}", request.method, request.path);
            return Response::not_found();
        };
        if !route.allows(&request.method) {
            return Response::method_not_allowed(route.allowed_methods());
        }

        match route.validate().and_then(|()| self.dispatch(route, request)) {
            Ok(response) => response,
            Err(e) => {
                let status = e.status_code();
                if status >= 500 {
                    tracing::error!("{} {} failed: {}", request.method, request.path, e);
                } else {
                    tracing::debug!("{} {} -> {}: {}", request.method, request.path, status, e);
                }
                Response::from_error(&e)
            }
        }
    }

    fn dispatch(&self, route: Route, request: &Request) -> Result<Response> {
        let engine = &self.engine;

        let response = match (route, &request.method) {
            (Route::Databases, Method::Get) => {
                Response::ok(json!({ "databases": engine.list_databases()? }))
            }
            (Route::Databases, Method::Post) => {
                let body: CreateDatabaseBody = serde_json::from_slice(&request.body)?;
                engine.create_database(&body.name)?;
                Response::success(
                    201,
                    json!({
                        "message": format!("database '{}' created", body.name),
                        "database": body.name,
                    }),
                )
            }
            (Route::Database { database }, Method::Delete) => {
                engine.delete_database(&database)?;
                Response::ok(json!({ "message": format!("database '{}' deleted", database) }))
            }

            (Route::Collections { database }, Method::Get) => Response::ok(json!({
                "database": database,
                "collections": engine.list_collections(&database)?,
            })),
            (Route::Collections { database }, Method::Post) => {
                let body: CreateCollectionBody = serde_json::from_slice(&request.body)?;
                engine.create_collection(&database, &body.name, body.schema)?;
                Response::success(
                    201,
                    json!({
                        "message": format!("collection '{}/{}' created", database, body.name),
                        "database": database,
                        "collection": body.name,
                    }),
                )
            }
            (
                Route::Collection {
                    database,
                    collection,
                },
                Method::Delete,
            ) => {
                engine.delete_collection(&database, &collection)?;
                Response::ok(json!({
                    "message": format!("collection '{}/{}' deleted", database, collection)
                }))
            }

            (
                Route::Schema {
                    database,
                    collection,
                },
                Method::Get,
            ) => Response::ok(json!({
                "database": database,
                "collection": collection,
                "schema": engine.schema(&database, &collection)?,
            })),

            (
                Route::Instances {
                    database,
                    collection,
                },
                Method::Get,
            ) => {
                let query = request.query_param("query").unwrap_or_default();
                let instances = engine.find_instances(&database, &collection, &query)?;
                Response::ok(json!({ "count": instances.len(), "instances": instances }))
            }
            (
                Route::Instances {
                    database,
                    collection,
                },
                Method::Post,
            ) => {
                let id = engine.insert_instance(&database, &collection, &request.body_str())?;
                Response::success(201, json!({ "id": id }))
            }

            (
                Route::Instance {
                    database,
                    collection,
                    id,
                },
                Method::Get,
            ) => Response::ok(json!({
                "instance": engine.get_instance(&database, &collection, &id)?
            })),
            (
                Route::Instance {
                    database,
                    collection,
                    id,
                },
                Method::Put,
            ) => Response::ok(json!({
                "instance": engine.update_instance(&database, &collection, &id, &request.body_str())?
            })),
            (
                Route::Instance {
                    database,
                    collection,
                    id,
                },
                Method::Delete,
            ) => {
                engine.delete_instance(&database, &collection, &id)?;
                Response::ok(json!({ "message": format!("instance '{}' deleted", id) }))
            }

            (Route::Execute, Method::Post) => {
                let body: ExecuteRequest = serde_json::from_slice(&request.body)?;
                let name = body.command.clone();
                let result = self.execute(Command::try_from(body)?)?;
                Response::ok(json!({ "command": name, "result": result }))
            }

            (route, method) => {
                return Err(SydbError::Protocol(format!(
                    "{} is not routed for {:?}",
                    method, route
                )))
            }
        };

        Ok(response)
    }

    /// Run an admin command; `stats` also reports gateway-level counters
    pub fn execute(&self, command: Command) -> Result<Value> {
        let mut result = self.engine.execute(command.clone())?;
        if command == Command::Stats {
            if let Some(stats) = result.as_object_mut() {
                stats.insert(
                    "rate_limit".to_string(),
                    json!({
                        "max_requests": self.limiter.max_requests(),
                        "window_ms": self.limiter.window().as_millis() as u64,
                        "tracked_clients": self.limiter.tracked_clients(),
                        "rejected": self.limiter.rejected_count(),
                    }),
                );
                if let Some(gauge) = self.workers.get() {
                    stats.insert("workers".to_string(), serde_json::to_value(gauge.snapshot())?);
                }
            }
        }
        Ok(result)
    }
}
