use super::field::{Field, FieldKind};
use super::value::{Record, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("entity `{entity}` declares field `{field}` more than once")]
    DuplicateField { entity: String, field: String },
    #[error("entity `{0}` is registered more than once")]
    DuplicateEntity(String),
}

/// An entity-level field predicate rejected a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid field, `{field}`: `{value}`")]
pub struct ValidationFailed {
    pub field: String,
    pub value: Value,
}

/// Ordered, named field list describing one record kind.
#[derive(Debug, Clone)]
pub struct Entity {
    name: &'static str,
    label: &'static str,
    fields: Vec<Field>,
}

impl Entity {
    pub fn new(
        name: &'static str,
        label: &'static str,
        fields: Vec<Field>,
    ) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.name) {
                return Err(SchemaError::DuplicateField {
                    entity: name.to_string(),
                    field: f.name.to_string(),
                });
            }
        }
        Ok(Self {
            name,
            label,
            fields,
        })
    }

    /// Relationship entity: the owners' fields in order, then the relation-only fields.
    pub fn composite(
        name: &'static str,
        label: &'static str,
        owners: &[&Entity],
        relation_fields: Vec<Field>,
    ) -> Result<Self, SchemaError> {
        let fields = owners
            .iter()
            .flat_map(|e| e.fields.iter().copied())
            .chain(relation_fields)
            .collect();
        Self::new(name, label, fields)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Validates `record` against every field and returns it restricted to this entity's
    /// fields. Missing values are checked as Null; blank optional values come back as Null.
    pub fn instantiate(&self, record: &Record) -> Result<Record, ValidationFailed> {
        let mut out = Record::new();
        for field in &self.fields {
            let value = record.get(field.name).cloned().unwrap_or(Value::Null);
            if !field.validate(&value) {
                return Err(ValidationFailed {
                    field: field.name.to_string(),
                    value,
                });
            }
            let value = if field.kind.is_optional() && value.is_empty() {
                Value::Null
            } else {
                value
            };
            out.insert(field.name.to_string(), value);
        }
        Ok(out)
    }
}

const CLASS_LEVELS: &[&str] = &["JC1", "JC2"];
const PARTICIPATION_CATEGORIES: &[&str] = &["ACHIEVEMENT", "ENRICHMENT", "LEADERSHIP", "SERVICE"];

/// Every entity the daemon knows about, built once at start-up.
#[derive(Debug, Clone)]
pub struct Schema {
    entities: Vec<Entity>,
}

impl Schema {
    pub fn standard() -> Result<Self, SchemaError> {
        let student = Entity::new(
            "student",
            "Student",
            vec![
                Field::new("student_name", "Name (as in NRIC)", FieldKind::Text),
                Field::new("age", "Age", FieldKind::Number),
                Field::new("year_enrolled", "Year Enrolled", FieldKind::Year),
                Field::new("graduating_year", "Graduating Year", FieldKind::Year),
            ],
        )?;
        let class = Entity::new(
            "class",
            "Class",
            vec![
                Field::new("class_name", "Name", FieldKind::Text),
                Field::new("level", "Level", FieldKind::Choice(CLASS_LEVELS)),
            ],
        )?;
        let club = Entity::new(
            "club",
            "Club",
            vec![Field::new("club_name", "Name of club", FieldKind::Text)],
        )?;
        let activity = Entity::new(
            "activity",
            "Activity",
            vec![
                Field::new("start_date", "Start Date", FieldKind::Date),
                Field::new("end_date", "End Date", FieldKind::Optional(&FieldKind::Date)),
                Field::new("description", "Description", FieldKind::Text),
            ],
        )?;
        let membership = Entity::composite(
            "membership",
            "Membership",
            &[&student, &club],
            vec![Field::new("role", "Role", FieldKind::Text)],
        )?;
        let participation = Entity::composite(
            "participation",
            "Participation",
            &[&student, &activity],
            vec![
                Field::new(
                    "category",
                    "Category",
                    FieldKind::Choice(PARTICIPATION_CATEGORIES),
                ),
                Field::new("role", "Role", FieldKind::Text),
                Field::new("award", "Award", FieldKind::Optional(&FieldKind::Text)),
                Field::new("hours", "Hours", FieldKind::Optional(&FieldKind::Number)),
            ],
        )?;

        let mut schema = Schema {
            entities: Vec::new(),
        };
        for e in [student, class, club, activity, membership, participation] {
            schema.register(e)?;
        }
        Ok(schema)
    }

    fn register(&mut self, entity: Entity) -> Result<(), SchemaError> {
        if self.get(entity.name).is_some() {
            return Err(SchemaError::DuplicateEntity(entity.name.to_string()));
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }
}
