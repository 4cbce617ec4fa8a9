use crate::junction::junction_spec;
use crate::schema::{describe_record, Record, Value};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Integrity(String),
    #[error("`{column}` is not a valid column name for {collection}")]
    UnknownColumn { collection: String, column: String },
    #[error("refusing to {op} {collection} records without a filter")]
    EmptyFilter {
        collection: String,
        op: &'static str,
    },
    #[error("nothing to insert into {0}")]
    EmptyRecord(String),
    #[error("unknown collection `{0}`")]
    UnknownCollection(String),
    #[error("sqlite: {0}")]
    Sqlite(rusqlite::Error),
}

impl StoreError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::Integrity(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, msg) if f.code == ErrorCode::ConstraintViolation => {
                StoreError::Integrity(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => StoreError::Sqlite(e),
        }
    }
}

/// Keyed-record CRUD over one table. Records are plain column -> value maps.
pub trait Collection {
    fn column_names(&self) -> &[&'static str];
    fn find(&self, filter: &Record) -> Result<Vec<Record>, StoreError>;
    fn insert(&self, record: &Record) -> Result<(), StoreError>;
    fn update(&self, filter: &Record, new_record: &Record) -> Result<usize, StoreError>;
    fn delete(&self, filter: &Record) -> Result<usize, StoreError>;
}

/// Looks collections up by entity name.
pub trait CollectionSource {
    fn collection(&self, name: &str) -> Option<&dyn Collection>;
}

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "student",
        table: "students",
        columns: &[
            "id",
            "student_name",
            "age",
            "year_enrolled",
            "graduating_year",
            "class_id",
        ],
    },
    TableSpec {
        name: "class",
        table: "classes",
        columns: &["id", "class_name", "level"],
    },
    TableSpec {
        name: "club",
        table: "clubs",
        columns: &["id", "club_name"],
    },
    TableSpec {
        name: "activity",
        table: "activities",
        columns: &["id", "start_date", "end_date", "description"],
    },
    TableSpec {
        name: "membership",
        table: "student_club",
        columns: &["student_id", "club_id", "role"],
    },
    TableSpec {
        name: "participation",
        table: "student_activity",
        columns: &[
            "student_id",
            "activity_id",
            "category",
            "role",
            "award",
            "hours",
        ],
    },
];

pub fn table_spec(name: &str) -> Option<&'static TableSpec> {
    TABLES.iter().find(|t| t.name == name)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn value_from_ref(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Text(f.to_string()),
        ValueRef::Text(b) | ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).to_string()),
    }
}

/// `a = ? AND b IS NULL`, plus the bound values in order.
fn where_clause<'v>(filter: &'v Record, qualify: impl Fn(&str) -> String) -> (String, Vec<&'v Value>) {
    let mut conds = Vec::with_capacity(filter.len());
    let mut params = Vec::with_capacity(filter.len());
    for (key, value) in filter {
        let col = qualify(key);
        if matches!(value, Value::Null) {
            conds.push(format!("{col} IS NULL"));
        } else {
            conds.push(format!("{col} = ?"));
            params.push(value);
        }
    }
    (conds.join(" AND "), params)
}

pub struct SqliteCollection<'c> {
    conn: &'c Connection,
    spec: &'static TableSpec,
}

impl<'c> SqliteCollection<'c> {
    pub fn new(conn: &'c Connection, spec: &'static TableSpec) -> Self {
        Self { conn, spec }
    }

    fn check_columns(&self, record: &Record) -> Result<(), StoreError> {
        for key in record.keys() {
            if !self.spec.columns.contains(&key.as_str()) {
                return Err(StoreError::UnknownColumn {
                    collection: self.spec.name.to_string(),
                    column: key.clone(),
                });
            }
        }
        Ok(())
    }

    /// (qualified, bare) column pairs returned by `find`. Junction collections also expose
    /// the owners' natural columns so rows can be searched and edited in expanded form.
    fn select_columns(&self) -> Vec<(String, &'static str)> {
        let own = |t: &TableSpec| -> Vec<(String, &'static str)> {
            t.columns
                .iter()
                .map(|c| (format!("{}.{}", t.table, c), *c))
                .collect()
        };
        let Some(junction) = junction_spec(self.spec.name) else {
            return own(self.spec);
        };
        let mut cols = Vec::new();
        for owner in &junction.owners {
            if let Some(t) = table_spec(owner.collection) {
                cols.extend(own(t).into_iter().filter(|(_, c)| *c != "id"));
            }
        }
        cols.extend(own(self.spec));
        cols
    }

    fn from_clause(&self) -> String {
        let Some(junction) = junction_spec(self.spec.name) else {
            return self.spec.table.to_string();
        };
        let mut sql = self.spec.table.to_string();
        for owner in &junction.owners {
            if let Some(t) = table_spec(owner.collection) {
                sql.push_str(&format!(
                    " JOIN {ot} ON {ot}.id = {jt}.{key}",
                    ot = t.table,
                    jt = self.spec.table,
                    key = owner.key
                ));
            }
        }
        sql
    }
}

impl Collection for SqliteCollection<'_> {
    fn column_names(&self) -> &[&'static str] {
        self.spec.columns
    }

    fn find(&self, filter: &Record) -> Result<Vec<Record>, StoreError> {
        let columns = self.select_columns();
        for key in filter.keys() {
            if !columns.iter().any(|(_, c)| c == key) {
                return Err(StoreError::UnknownColumn {
                    collection: self.spec.name.to_string(),
                    column: key.clone(),
                });
            }
        }

        // Later entries win so the junction's own columns shadow owner columns of the same name.
        let qualify = |key: &str| {
            columns
                .iter()
                .rev()
                .find(|(_, c)| *c == key)
                .map(|(q, _)| q.clone())
                .unwrap_or_else(|| key.to_string())
        };
        let (conds, params) = where_clause(filter, qualify);
        let select = columns
            .iter()
            .map(|(q, _)| q.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {select} FROM {}", self.from_clause());
        if !conds.is_empty() {
            sql.push_str(&format!(" WHERE {conds}"));
        }
        sql.push_str(&format!(" ORDER BY {}.rowid", self.spec.table));
        tracing::debug!(collection = self.spec.name, %sql, "find");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let mut rec = Record::new();
                for (i, (_, name)) in columns.iter().enumerate() {
                    rec.insert(name.to_string(), value_from_ref(row.get_ref(i)?));
                }
                Ok(rec)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert(&self, record: &Record) -> Result<(), StoreError> {
        self.check_columns(record)?;
        if record.is_empty() {
            return Err(StoreError::EmptyRecord(self.spec.name.to_string()));
        }

        let existing = self.find(record)?;
        if !existing.is_empty() {
            return Err(StoreError::Integrity(format!(
                "Record {} already exists in {}",
                describe_record(record),
                self.spec.name
            )));
        }

        let cols = record.keys().map(String::as_str).collect::<Vec<_>>();
        let marks = vec!["?"; cols.len()].join(", ");
        let sql = format!(
            "INSERT INTO {}({}) VALUES({})",
            self.spec.table,
            cols.join(", "),
            marks
        );
        tracing::debug!(collection = self.spec.name, %sql, "insert");
        self.conn.execute(&sql, params_from_iter(record.values()))?;
        Ok(())
    }

    fn update(&self, filter: &Record, new_record: &Record) -> Result<usize, StoreError> {
        self.check_columns(filter)?;
        self.check_columns(new_record)?;
        if filter.is_empty() {
            return Err(StoreError::EmptyFilter {
                collection: self.spec.name.to_string(),
                op: "update",
            });
        }
        if new_record.is_empty() {
            return Ok(0);
        }

        let set = new_record
            .keys()
            .map(|k| format!("{k} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let (conds, filter_params) = where_clause(filter, str::to_string);
        let sql = format!("UPDATE {} SET {set} WHERE {conds}", self.spec.table);
        let params = new_record.values().chain(filter_params);
        tracing::debug!(collection = self.spec.name, %sql, "update");
        Ok(self.conn.execute(&sql, params_from_iter(params))?)
    }

    fn delete(&self, filter: &Record) -> Result<usize, StoreError> {
        self.check_columns(filter)?;
        if filter.is_empty() {
            return Err(StoreError::EmptyFilter {
                collection: self.spec.name.to_string(),
                op: "delete",
            });
        }
        let (conds, params) = where_clause(filter, str::to_string);
        let sql = format!("DELETE FROM {} WHERE {conds}", self.spec.table);
        tracing::debug!(collection = self.spec.name, %sql, "delete");
        Ok(self.conn.execute(&sql, params_from_iter(params))?)
    }
}

/// One collection per known table, all sharing the workspace connection. Statements run in
/// autocommit mode, so each write is its own transaction.
pub struct Registry<'c> {
    collections: Vec<SqliteCollection<'c>>,
}

impl<'c> Registry<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            collections: TABLES
                .iter()
                .map(|spec| SqliteCollection::new(conn, spec))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqliteCollection<'c>> {
        self.collections.iter().find(|c| c.spec.name == name)
    }
}

impl CollectionSource for Registry<'_> {
    fn collection(&self, name: &str) -> Option<&dyn Collection> {
        self.get(name).map(|c| c as &dyn Collection)
    }
}
