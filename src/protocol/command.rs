//! Command definitions
//!
//! Administrative commands accepted by `POST /api/execute` as
//! `{"command": "...", "arguments": [...]}`.

use serde::Deserialize;

use crate::error::{Result, SydbError};
use crate::schema::FieldDescriptor;

/// Raw execute request body
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// A parsed administrative command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ListDatabases,
    ListCollections { database: String },
    ListInstances { database: String, collection: String },
    CreateDatabase { database: String },
    CreateCollection {
        database: String,
        collection: String,
        fields: Vec<FieldDescriptor>,
    },
    InsertInstance {
        database: String,
        collection: String,
        document: String,
    },
    FindInstances {
        database: String,
        collection: String,
        query: String,
    },
    Schema { database: String, collection: String },
    UpdateInstance {
        database: String,
        collection: String,
        id: String,
        document: String,
    },
    DeleteDatabase { database: String },
    DeleteCollection { database: String, collection: String },
    DeleteInstance {
        database: String,
        collection: String,
        id: String,
    },
    Verify { database: String, collection: String },
    Compact { database: String, collection: String },
    Stats,
}

impl Command {
    /// Parse a command name plus its arguments
    ///
    /// ```text
    /// list [db [coll]]
    /// create db
    /// create db coll --schema name-type[-req][-idx] ...
    /// create db coll --insert-one '{"k":"v"}'
    /// find db coll [--where "f:v,..."]
    /// schema db coll
    /// update db coll id '{"k":"v"}'
    /// delete db [coll [id]]
    /// verify db coll
    /// compact db coll
    /// stats
    /// ```
    pub fn parse(command: &str, args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match (command, args.as_slice()) {
            ("list", []) => Ok(Command::ListDatabases),
            ("list", [db]) => Ok(Command::ListCollections {
                database: db.to_string(),
            }),
            ("list", [db, coll]) => Ok(Command::ListInstances {
                database: db.to_string(),
                collection: coll.to_string(),
            }),

            ("create", [db]) => Ok(Command::CreateDatabase {
                database: db.to_string(),
            }),
            ("create", [db, coll, "--schema", specs @ ..]) if !specs.is_empty() => {
                let fields = specs
                    .iter()
                    .map(|spec| FieldDescriptor::parse_spec(spec))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Command::CreateCollection {
                    database: db.to_string(),
                    collection: coll.to_string(),
                    fields,
                })
            }
            ("create", [db, coll, "--insert-one", document]) => Ok(Command::InsertInstance {
                database: db.to_string(),
                collection: coll.to_string(),
                document: document.to_string(),
            }),

            ("find", [db, coll]) => Ok(Command::FindInstances {
                database: db.to_string(),
                collection: coll.to_string(),
                query: String::new(),
            }),
            ("find", [db, coll, "--where", query]) => Ok(Command::FindInstances {
                database: db.to_string(),
                collection: coll.to_string(),
                query: query.to_string(),
            }),

            ("schema", [db, coll]) => Ok(Command::Schema {
                database: db.to_string(),
                collection: coll.to_string(),
            }),

            ("update", [db, coll, id, document]) => Ok(Command::UpdateInstance {
                database: db.to_string(),
                collection: coll.to_string(),
                id: id.to_string(),
                document: document.to_string(),
            }),

            ("delete", [db]) => Ok(Command::DeleteDatabase {
                database: db.to_string(),
            }),
            ("delete", [db, coll]) => Ok(Command::DeleteCollection {
                database: db.to_string(),
                collection: coll.to_string(),
            }),
            ("delete", [db, coll, id]) => Ok(Command::DeleteInstance {
                database: db.to_string(),
                collection: coll.to_string(),
                id: id.to_string(),
            }),

            ("verify", [db, coll]) => Ok(Command::Verify {
                database: db.to_string(),
                collection: coll.to_string(),
            }),
            ("compact", [db, coll]) => Ok(Command::Compact {
                database: db.to_string(),
                collection: coll.to_string(),
            }),
            ("stats", []) => Ok(Command::Stats),

            (
                "list" | "create" | "find" | "schema" | "update" | "delete" | "verify" | "compact"
                | "stats",
                _,
            ) => Err(SydbError::Validation(format!(
                "wrong arguments for '{}': {:?}",
                command, args
            ))),
            _ => Err(SydbError::Validation(format!(
                "unknown command '{}'",
                command
            ))),
        }
    }
}

impl TryFrom<ExecuteRequest> for Command {
    type Error = SydbError;

    fn try_from(request: ExecuteRequest) -> Result<Self> {
        Command::parse(&request.command, &request.arguments)
    }
}
