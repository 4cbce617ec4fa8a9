//! Writes to relationship tables from their expanded, natural-key form.
//!
//! Users edit a membership as
//! `{student_name: 'OBAMA', age: 69, ..., club_name: 'WHITE HOUSE', role: 'member'}`
//! while `student_club` stores `{student_id: 6, club_id: 1, role: 'member'}`. Each owner's
//! natural columns are looked up in the owner's collection to recover its id; the remaining
//! junction columns are copied across.

use crate::delta::{Method, RecordDelta};
use crate::schema::{describe_record, Record, Value};
use crate::store::{Collection, CollectionSource, StoreError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct Owner {
    /// Owner collection, e.g. `club`.
    pub collection: &'static str,
    /// Foreign-key column in the junction table, e.g. `club_id`.
    pub key: &'static str,
}

#[derive(Debug)]
pub struct JunctionSpec {
    pub name: &'static str,
    pub owners: [Owner; 2],
}

pub const JUNCTIONS: &[JunctionSpec] = &[
    JunctionSpec {
        name: "membership",
        owners: [
            Owner {
                collection: "club",
                key: "club_id",
            },
            Owner {
                collection: "student",
                key: "student_id",
            },
        ],
    },
    JunctionSpec {
        name: "participation",
        owners: [
            Owner {
                collection: "activity",
                key: "activity_id",
            },
            Owner {
                collection: "student",
                key: "student_id",
            },
        ],
    },
];

pub fn junction_spec(name: &str) -> Option<&'static JunctionSpec> {
    JUNCTIONS.iter().find(|j| j.name == name)
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid junction collection `{0}`")]
    UnknownJunction(String),
    #[error("No {entity} fields given to match against")]
    NoLookupFields { entity: &'static str },
    #[error("No {entity} records found. Matching against: {filter}")]
    NotFound { entity: &'static str, filter: String },
    #[error("More than 1 {entity} records found ({count}). Matching against: {filter}")]
    Ambiguous {
        entity: &'static str,
        count: usize,
        filter: String,
    },
    #[error("{entity} record has no integer id")]
    MissingId { entity: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-row result of a commit. Failures carry the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub is_ok: bool,
    pub message: String,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            is_ok: true,
            message: String::new(),
        }
    }

    pub fn failed(method: Method, reason: impl std::fmt::Display) -> Self {
        Self {
            is_ok: false,
            message: format!("ERROR WHILE {}: {reason}", method.progressive()),
        }
    }
}

/// Owner columns present in `record`, used to look the owner row up.
fn sub_filter(columns: &[&'static str], record: &Record) -> Record {
    columns
        .iter()
        .filter_map(|c| {
            record
                .get(*c)
                .filter(|v| !v.is_empty())
                .map(|v| (c.to_string(), v.clone()))
        })
        .collect()
}

/// Junction-only columns (not the owner keys) present and non-empty in `record`.
fn copy_relation_columns(spec: &JunctionSpec, junction: &dyn Collection, record: &Record, row: &mut Record) {
    for column in junction.column_names() {
        if spec.owners.iter().any(|o| o.key == *column) {
            continue;
        }
        if let Some(v) = record.get(*column).filter(|v| !v.is_empty()) {
            row.insert(column.to_string(), v.clone());
        }
    }
}

/// Relation columns set in `old_record` but blanked in `new_record` are written as Null.
fn clear_blanked_columns(
    spec: &JunctionSpec,
    junction: &dyn Collection,
    old_record: &Record,
    new_record: &Record,
    row: &mut Record,
) {
    for column in junction.column_names() {
        if spec.owners.iter().any(|o| o.key == *column) {
            continue;
        }
        let was_set = old_record.get(*column).is_some_and(|v| !v.is_empty());
        let now_blank = new_record.get(*column).map_or(true, Value::is_empty);
        if was_set && now_blank {
            row.insert(column.to_string(), Value::Null);
        }
    }
}

pub struct Resolver<'a> {
    source: &'a dyn CollectionSource,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a dyn CollectionSource) -> Self {
        Self { source }
    }

    pub fn insert(&self, junction: &str, new_record: &Record) -> Outcome {
        self.finish(junction, Method::Insert, self.try_insert(junction, new_record))
    }

    pub fn update(&self, junction: &str, old_record: &Record, new_record: &Record) -> Outcome {
        self.finish(
            junction,
            Method::Update,
            self.try_update(junction, old_record, new_record),
        )
    }

    pub fn delete(&self, junction: &str, record: &Record) -> Outcome {
        self.finish(junction, Method::Delete, self.try_delete(junction, record))
    }

    pub fn apply(&self, junction: &str, delta: &RecordDelta) -> Outcome {
        match delta.method {
            Method::Insert => self.insert(junction, &delta.new),
            Method::Update => self.update(junction, &delta.old, &delta.new),
            Method::Delete => self.delete(junction, &delta.old),
        }
    }

    fn finish(&self, junction: &str, method: Method, res: Result<(), ResolveError>) -> Outcome {
        match res {
            Ok(()) => {
                tracing::info!(junction, method = method.as_str(), "junction row written");
                Outcome::success()
            }
            Err(e) => {
                tracing::warn!(junction, method = method.as_str(), error = %e, "junction row failed");
                Outcome::failed(method, e)
            }
        }
    }

    fn spec_and_collection(
        &self,
        junction: &str,
    ) -> Result<(&'static JunctionSpec, &'a dyn Collection), ResolveError> {
        let spec =
            junction_spec(junction).ok_or_else(|| ResolveError::UnknownJunction(junction.to_string()))?;
        Ok((spec, self.collection(spec.name)?))
    }

    fn collection(&self, name: &str) -> Result<&'a dyn Collection, ResolveError> {
        self.source
            .collection(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()).into())
    }

    /// Exactly one owner row must match the owner's columns in `record`.
    fn resolve_id(&self, owner: &Owner, record: &Record) -> Result<i64, ResolveError> {
        let coll = self.collection(owner.collection)?;
        let filter = sub_filter(coll.column_names(), record);
        if filter.is_empty() {
            return Err(ResolveError::NoLookupFields {
                entity: owner.collection,
            });
        }
        let found = coll.find(&filter)?;
        match found.as_slice() {
            [one] => one
                .get("id")
                .and_then(Value::as_int)
                .ok_or(ResolveError::MissingId {
                    entity: owner.collection,
                }),
            [] => Err(ResolveError::NotFound {
                entity: owner.collection,
                filter: describe_record(&filter),
            }),
            many => Err(ResolveError::Ambiguous {
                entity: owner.collection,
                count: many.len(),
                filter: describe_record(&filter),
            }),
        }
    }

    fn keyed_row(&self, spec: &JunctionSpec, record: &Record) -> Result<Record, ResolveError> {
        let mut row = Record::new();
        for owner in &spec.owners {
            let id = self.resolve_id(owner, record)?;
            row.insert(owner.key.to_string(), Value::Int(id));
        }
        Ok(row)
    }

    fn try_insert(&self, junction: &str, new_record: &Record) -> Result<(), ResolveError> {
        let (spec, coll) = self.spec_and_collection(junction)?;
        let mut row = self.keyed_row(spec, new_record)?;
        copy_relation_columns(spec, coll, new_record, &mut row);
        coll.insert(&row)?;
        Ok(())
    }

    fn try_update(
        &self,
        junction: &str,
        old_record: &Record,
        new_record: &Record,
    ) -> Result<(), ResolveError> {
        let (spec, coll) = self.spec_and_collection(junction)?;
        let mut old_row = Record::new();
        let mut new_row = Record::new();
        for owner in &spec.owners {
            old_row.insert(
                owner.key.to_string(),
                Value::Int(self.resolve_id(owner, old_record)?),
            );
            new_row.insert(
                owner.key.to_string(),
                Value::Int(self.resolve_id(owner, new_record)?),
            );
        }
        copy_relation_columns(spec, coll, old_record, &mut old_row);
        copy_relation_columns(spec, coll, new_record, &mut new_row);
        clear_blanked_columns(spec, coll, old_record, new_record, &mut new_row);
        let n = coll.update(&old_row, &new_row)?;
        if n == 0 {
            tracing::warn!(junction, filter = %describe_record(&old_row), "update matched no rows");
        }
        Ok(())
    }

    fn try_delete(&self, junction: &str, record: &Record) -> Result<(), ResolveError> {
        let (spec, coll) = self.spec_and_collection(junction)?;
        let mut row = self.keyed_row(spec, record)?;
        copy_relation_columns(spec, coll, record, &mut row);
        let n = coll.delete(&row)?;
        if n == 0 {
            tracing::warn!(junction, filter = %describe_record(&row), "delete matched no rows");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collections that record every write, for exercising the commit path
    //! without SQLite.

    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Write {
        Insert(Record),
        Update(Record, Record),
        Delete(Record),
    }

    pub struct MemoryCollection {
        columns: &'static [&'static str],
        pub rows: RefCell<Vec<Record>>,
        pub writes: RefCell<Vec<Write>>,
        pub fail_writes: Option<String>,
    }

    impl MemoryCollection {
        pub fn new(columns: &'static [&'static str], rows: Vec<Record>) -> Self {
            Self {
                columns,
                rows: RefCell::new(rows),
                writes: RefCell::new(Vec::new()),
                fail_writes: None,
            }
        }

        fn check(&self) -> Result<(), StoreError> {
            match &self.fail_writes {
                Some(msg) => Err(StoreError::Integrity(msg.clone())),
                None => Ok(()),
            }
        }
    }

    impl Collection for MemoryCollection {
        fn column_names(&self) -> &[&'static str] {
            self.columns
        }

        fn find(&self, filter: &Record) -> Result<Vec<Record>, StoreError> {
            Ok(self
                .rows
                .borrow()
                .iter()
                .filter(|r| filter.iter().all(|(k, v)| r.get(k) == Some(v)))
                .cloned()
                .collect())
        }

        fn insert(&self, record: &Record) -> Result<(), StoreError> {
            self.check()?;
            self.writes.borrow_mut().push(Write::Insert(record.clone()));
            Ok(())
        }

        fn update(&self, filter: &Record, new_record: &Record) -> Result<usize, StoreError> {
            self.check()?;
            self.writes
                .borrow_mut()
                .push(Write::Update(filter.clone(), new_record.clone()));
            Ok(1)
        }

        fn delete(&self, filter: &Record) -> Result<usize, StoreError> {
            self.check()?;
            self.writes.borrow_mut().push(Write::Delete(filter.clone()));
            Ok(1)
        }
    }

    #[derive(Default)]
    pub struct MemorySource {
        pub collections: BTreeMap<&'static str, MemoryCollection>,
    }

    impl CollectionSource for MemorySource {
        fn collection(&self, name: &str) -> Option<&dyn Collection> {
            self.collections.get(name).map(|c| c as &dyn Collection)
        }
    }

    pub fn rec(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    pub fn student(id: i64, name: &str) -> Record {
        rec(&[
            ("id", Value::Int(id)),
            ("student_name", Value::from(name)),
            ("age", Value::Int(69)),
            ("year_enrolled", Value::Int(2008)),
            ("graduating_year", Value::Int(2016)),
            ("class_id", Value::Null),
        ])
    }

    pub fn club(id: i64, name: &str) -> Record {
        rec(&[("id", Value::Int(id)), ("club_name", Value::from(name))])
    }

    /// Students OBAMA (6) and BIDEN (7); clubs WHITE HOUSE (1) and OBAMA FOUNDATION (4).
    pub fn membership_source() -> MemorySource {
        let mut source = MemorySource::default();
        source.collections.insert(
            "student",
            MemoryCollection::new(
                &[
                    "id",
                    "student_name",
                    "age",
                    "year_enrolled",
                    "graduating_year",
                    "class_id",
                ],
                vec![student(6, "OBAMA"), student(7, "BIDEN")],
            ),
        );
        source.collections.insert(
            "club",
            MemoryCollection::new(
                &["id", "club_name"],
                vec![club(1, "WHITE HOUSE"), club(4, "OBAMA FOUNDATION")],
            ),
        );
        source.collections.insert(
            "membership",
            MemoryCollection::new(&["student_id", "club_id", "role"], Vec::new()),
        );
        source
    }

    pub fn expanded(student_name: &str, club_name: &str, role: &str) -> Record {
        rec(&[
            ("student_name", Value::from(student_name)),
            ("club_name", Value::from(club_name)),
            ("role", Value::from(role)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn writes(source: &MemorySource, name: &str) -> Vec<Write> {
        source.collections[name].writes.borrow().clone()
    }

    #[test]
    fn insert_resolves_both_owner_ids() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.insert("membership", &expanded("OBAMA", "WHITE HOUSE", "member"));
        assert!(out.is_ok, "{}", out.message);
        assert_eq!(
            writes(&source, "membership"),
            vec![Write::Insert(rec(&[
                ("student_id", Value::Int(6)),
                ("club_id", Value::Int(1)),
                ("role", Value::from("member")),
            ]))]
        );
    }

    #[test]
    fn ambiguous_student_is_a_failed_outcome() {
        let source = membership_source();
        source.collections["student"]
            .rows
            .borrow_mut()
            .push(student(8, "OBAMA"));
        let resolver = Resolver::new(&source);
        let out = resolver.insert("membership", &expanded("OBAMA", "WHITE HOUSE", "member"));
        assert!(!out.is_ok);
        assert!(out.message.contains("student"), "{}", out.message);
        assert!(out.message.starts_with("ERROR WHILE INSERTING"), "{}", out.message);
        assert!(out.message.contains("OBAMA"), "{}", out.message);
        assert!(writes(&source, "membership").is_empty());
    }

    #[test]
    fn missing_club_is_not_found() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.insert("membership", &expanded("OBAMA", "GOLF", "member"));
        assert!(!out.is_ok);
        assert!(out.message.contains("No club records found"), "{}", out.message);
    }

    #[test]
    fn update_resolves_old_and_new_sides() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.update(
            "membership",
            &expanded("OBAMA", "WHITE HOUSE", "member"),
            &expanded("OBAMA", "OBAMA FOUNDATION", "leader"),
        );
        assert!(out.is_ok, "{}", out.message);
        assert_eq!(
            writes(&source, "membership"),
            vec![Write::Update(
                rec(&[
                    ("student_id", Value::Int(6)),
                    ("club_id", Value::Int(1)),
                    ("role", Value::from("member")),
                ]),
                rec(&[
                    ("student_id", Value::Int(6)),
                    ("club_id", Value::Int(4)),
                    ("role", Value::from("leader")),
                ]),
            )]
        );
    }

    #[test]
    fn update_fails_when_new_side_does_not_resolve() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.update(
            "membership",
            &expanded("OBAMA", "WHITE HOUSE", "member"),
            &expanded("TRUMP", "WHITE HOUSE", "member"),
        );
        assert!(!out.is_ok);
        assert!(out.message.starts_with("ERROR WHILE UPDATING"), "{}", out.message);
        assert!(writes(&source, "membership").is_empty());
    }

    #[test]
    fn update_nulls_relation_columns_blanked_on_the_new_side() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.update(
            "membership",
            &expanded("OBAMA", "WHITE HOUSE", "member"),
            &expanded("OBAMA", "WHITE HOUSE", ""),
        );
        assert!(out.is_ok, "{}", out.message);
        assert_eq!(
            writes(&source, "membership"),
            vec![Write::Update(
                rec(&[
                    ("student_id", Value::Int(6)),
                    ("club_id", Value::Int(1)),
                    ("role", Value::from("member")),
                ]),
                rec(&[
                    ("student_id", Value::Int(6)),
                    ("club_id", Value::Int(1)),
                    ("role", Value::Null),
                ]),
            )]
        );
    }

    #[test]
    fn delete_uses_ids_and_relation_columns() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.delete("membership", &expanded("BIDEN", "WHITE HOUSE", "member"));
        assert!(out.is_ok, "{}", out.message);
        assert_eq!(
            writes(&source, "membership"),
            vec![Write::Delete(rec(&[
                ("student_id", Value::Int(7)),
                ("club_id", Value::Int(1)),
                ("role", Value::from("member")),
            ]))]
        );
    }

    #[test]
    fn store_errors_become_outcomes() {
        let mut source = membership_source();
        if let Some(m) = source.collections.get_mut("membership") {
            m.fail_writes = Some("UNIQUE constraint failed".to_string());
        }
        let resolver = Resolver::new(&source);
        let out = resolver.insert("membership", &expanded("OBAMA", "WHITE HOUSE", "member"));
        assert!(!out.is_ok);
        assert!(out.message.contains("UNIQUE constraint failed"), "{}", out.message);
    }

    #[test]
    fn unknown_junction_and_empty_lookup() {
        let source = membership_source();
        let resolver = Resolver::new(&source);
        let out = resolver.insert("friendship", &expanded("OBAMA", "WHITE HOUSE", "member"));
        assert!(!out.is_ok);
        assert!(out.message.contains("friendship"));

        let out = resolver.insert(
            "membership",
            &rec(&[("club_name", Value::from("WHITE HOUSE"))]),
        );
        assert!(!out.is_ok);
        assert!(out.message.contains("No student fields"), "{}", out.message);
    }
}
