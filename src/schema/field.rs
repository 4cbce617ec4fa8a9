use super::value::Value;
use crate::validate;

/// Closed set of field types. Selects validation, numeric coercion and the UI input widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Year,
    Date,
    Email,
    Choice(&'static [&'static str]),
    Optional(&'static FieldKind),
}

impl FieldKind {
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text => validate::non_empty_string(value),
            FieldKind::Number => validate::number(value),
            FieldKind::Year => validate::year(value),
            FieldKind::Date => validate::date(value),
            FieldKind::Email => validate::email(value),
            FieldKind::Choice(options) => validate::one_of(value, options),
            FieldKind::Optional(inner) => value.is_empty() || inner.validate(value),
        }
    }

    /// Whether form strings must be cast to integers before validation.
    /// Optional numbers are left alone: "" is a legal value for them.
    pub fn is_coerced_number(&self) -> bool {
        match self {
            FieldKind::Number | FieldKind::Year => true,
            FieldKind::Text
            | FieldKind::Date
            | FieldKind::Email
            | FieldKind::Choice(_)
            | FieldKind::Optional(_) => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldKind::Optional(_))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Year => "year",
            FieldKind::Date => "date",
            FieldKind::Email => "email",
            FieldKind::Choice(_) => "choice",
            FieldKind::Optional(inner) => inner.tag(),
        }
    }

    /// HTML input type the front end should render for this kind.
    pub fn input_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number | FieldKind::Year => "number",
            FieldKind::Date => "date",
            FieldKind::Email => "email",
            FieldKind::Choice(_) => "select",
            FieldKind::Optional(inner) => inner.input_type(),
        }
    }

    pub fn options(&self) -> Option<&'static [&'static str]> {
        match self {
            FieldKind::Choice(options) => Some(*options),
            FieldKind::Optional(inner) => inner.options(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { name, label, kind }
    }

    pub fn validate(&self, value: &Value) -> bool {
        self.kind.validate(value)
    }
}
