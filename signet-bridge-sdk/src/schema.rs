use serde_json::{Map, Value};
use thiserror::Error;

/// Expected JSON type of a declared payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
}

impl FieldKind {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }
}

/// A named field inside an object-shaped payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
        }
    }

    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
        }
    }
}

/// Wire shape of one declared event.
///
/// `Signal` events carry no payload and travel as `{"type": "<name>"}`.
/// `Text` events carry a single string under the event name:
/// `{"<name>": "..."}`. `Object` events carry a JSON object under the event
/// name in which every declared field must be present with the declared
/// primitive type; unknown extra fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Signal,
    Text,
    Object(&'static [FieldSpec]),
}

/// One declared event: stable wire name plus payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSchema {
    pub name: &'static str,
    pub shape: PayloadShape,
}

impl EventSchema {
    pub const fn signal(name: &'static str) -> Self {
        Self {
            name,
            shape: PayloadShape::Signal,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            shape: PayloadShape::Text,
        }
    }

    pub const fn object(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self {
            name,
            shape: PayloadShape::Object(fields),
        }
    }

    /// Probe a raw top-level object against this schema.
    fn probe(&self, raw: &Map<String, Value>) -> Probe {
        match self.shape {
            PayloadShape::Signal => match raw.get("type").and_then(Value::as_str) {
                Some(tag) if tag == self.name => Probe::Hit(Value::Null),
                _ => Probe::Miss,
            },
            PayloadShape::Text => match raw.get(self.name) {
                None => Probe::Miss,
                Some(value) if value.is_string() => Probe::Hit(value.clone()),
                Some(value) => Probe::Invalid(format!(
                    "payload must be a string, got {}",
                    json_type_name(value)
                )),
            },
            PayloadShape::Object(fields) => match raw.get(self.name) {
                None => Probe::Miss,
                Some(Value::Object(payload)) => {
                    let problems = field_problems(fields, payload);
                    if problems.is_empty() {
                        Probe::Hit(Value::Object(payload.clone()))
                    } else {
                        Probe::Invalid(problems.join("; "))
                    }
                }
                Some(value) => Probe::Invalid(format!(
                    "payload must be an object, got {}",
                    json_type_name(value)
                )),
            },
        }
    }
}

enum Probe {
    /// The raw object does not claim this event.
    Miss,
    /// The raw object claims this event with a valid payload.
    Hit(Value),
    /// The raw object claims this event but the payload is malformed.
    Invalid(String),
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collect every declared-field problem in an object payload.
fn field_problems(fields: &[FieldSpec], payload: &Map<String, Value>) -> Vec<String> {
    let mut problems: Vec<String> = Vec::new();
    for field in fields {
        match payload.get(field.name) {
            None => problems.push(format!("missing field '{}'", field.name)),
            Some(value) if field.kind.matches(value) => {}
            Some(value) => problems.push(format!(
                "field '{}' must be {}, got {}",
                field.name,
                field.kind.as_str(),
                json_type_name(value)
            )),
        }
    }
    problems
}

/// A received message that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Declared name of the matched event.
    pub event: &'static str,
    /// Validated payload (`Null` for signal events).
    pub payload: Value,
}

/// Why a raw message was rejected by a schema set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message matched no declared {direction} event")]
    Unrecognized { direction: &'static str },
    #[error("message matched multiple declared events ('{first}' and '{second}')")]
    Ambiguous {
        first: &'static str,
        second: &'static str,
    },
    #[error("event '{event}' payload invalid: {reason}")]
    InvalidPayload { event: &'static str, reason: String },
    #[error("event '{event}' is not declared for direction {direction}")]
    UndeclaredEvent {
        event: String,
        direction: &'static str,
    },
}

/// Direction-scoped set of declared events.
///
/// Pure and stateless; a `SchemaSet` is `Copy` and safe to share across any
/// number of channels.
#[derive(Debug, Clone, Copy)]
pub struct SchemaSet {
    direction: &'static str,
    events: &'static [EventSchema],
}

impl SchemaSet {
    pub const fn new(direction: &'static str, events: &'static [EventSchema]) -> Self {
        Self { direction, events }
    }

    #[inline]
    pub fn direction(&self) -> &'static str {
        self.direction
    }

    #[inline]
    pub fn events(&self) -> &'static [EventSchema] {
        self.events
    }

    /// Whether `event` is declared in this direction.
    pub fn contains(&self, event: &str) -> bool {
        self.events.iter().any(|schema| schema.name == event)
    }

    /// Validate a payload claimed to belong to `event`.
    pub fn validate(&self, event: &str, payload: &Value) -> Result<(), SchemaViolation> {
        let schema = self
            .events
            .iter()
            .find(|schema| schema.name == event)
            .ok_or_else(|| SchemaViolation::UndeclaredEvent {
                event: event.to_string(),
                direction: self.direction,
            })?;
        match schema.shape {
            PayloadShape::Signal => Ok(()),
            PayloadShape::Text => {
                if payload.is_string() {
                    Ok(())
                } else {
                    Err(SchemaViolation::InvalidPayload {
                        event: schema.name,
                        reason: format!("payload must be a string, got {}", json_type_name(payload)),
                    })
                }
            }
            PayloadShape::Object(fields) => {
                let Some(map) = payload.as_object() else {
                    return Err(SchemaViolation::InvalidPayload {
                        event: schema.name,
                        reason: format!("payload must be an object, got {}", json_type_name(payload)),
                    });
                };
                let problems = field_problems(fields, map);
                if problems.is_empty() {
                    Ok(())
                } else {
                    Err(SchemaViolation::InvalidPayload {
                        event: schema.name,
                        reason: problems.join("; "),
                    })
                }
            }
        }
    }

    /// Classify a raw posted value against every declared event.
    ///
    /// A message is accepted only when it matches exactly one declared
    /// schema; zero matches, ambiguous matches, and claimed-but-malformed
    /// payloads are all rejected so nothing is ever partially processed.
    pub fn classify(&self, raw: &Value) -> Result<Envelope, SchemaViolation> {
        let Some(object) = raw.as_object() else {
            return Err(SchemaViolation::NotAnObject);
        };

        let mut hit: Option<Envelope> = None;
        let mut invalid: Option<SchemaViolation> = None;

        for schema in self.events {
            match schema.probe(object) {
                Probe::Miss => {}
                Probe::Hit(payload) => {
                    if let Some(first) = &hit {
                        return Err(SchemaViolation::Ambiguous {
                            first: first.event,
                            second: schema.name,
                        });
                    }
                    hit = Some(Envelope {
                        event: schema.name,
                        payload,
                    });
                }
                Probe::Invalid(reason) => {
                    if invalid.is_none() {
                        invalid = Some(SchemaViolation::InvalidPayload {
                            event: schema.name,
                            reason,
                        });
                    }
                }
            }
        }

        match (hit, invalid) {
            (Some(envelope), _) => Ok(envelope),
            (None, Some(violation)) => Err(violation),
            (None, None) => Err(SchemaViolation::Unrecognized {
                direction: self.direction,
            }),
        }
    }
}
