//! Request body validation.
//!
//! Bodies arrive as loose JSON so that every field problem can be reported at
//! once, keyed by its dotted path (`item.name`), instead of failing on the
//! first serde type mismatch.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::item::{ItemChanges, ItemName, MAX_NAME_CHARS, NameError};

const MAX_STRING_CHARS: usize = 255;
pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message.into()),
            None => self.fields.push((field.to_string(), vec![message.into()])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, m)| m.as_slice())
    }

    /// Summary line: the first message, plus a count of the rest.
    pub fn summary(&self) -> String {
        let total: usize = self.fields.iter().map(|(_, m)| m.len()).sum();
        let first = self
            .fields
            .first()
            .and_then(|(_, m)| m.first())
            .cloned()
            .unwrap_or_else(|| "The given data was invalid.".to_string());
        match total {
            0 | 1 => first,
            2 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {} more errors)", n - 1),
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, messages) in &self.fields {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// `{item: {name}}` for item creation. Other keys are ignored.
pub fn new_item(body: &Value) -> Result<ItemName, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = match lookup(body, &["item", "name"]) {
        None => {
            errors.add("item.name", required("item.name"));
            None
        }
        Some(raw) => item_name(raw, &mut errors),
    };
    match name {
        Some(name) => errors.into_result(name),
        None => Err(errors),
    }
}

/// `{item: {name?, completed?}}` for item updates. Missing and null fields
/// are left unchanged.
pub fn item_changes(body: &Value) -> Result<ItemChanges, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut changes = ItemChanges::default();

    match body.get("item") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => errors.add("item", "The item field must be an object."),
    }
    if let Some(raw) = lookup(body, &["item", "name"]) {
        changes.name = item_name(raw, &mut errors);
    }
    if let Some(raw) = lookup(body, &["item", "completed"]) {
        match boolean(raw) {
            Some(flag) => changes.completed = Some(flag),
            None => errors.add("item.completed", "The item.completed field must be true or false."),
        }
    }
    errors.into_result(changes)
}

pub fn registration(body: &Value) -> Result<Registration, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = bounded_string(body, "name", &mut errors);
    let email = bounded_string(body, "email", &mut errors).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if !email.contains('@') {
            errors.add("email", "The email field must be a valid email address.");
        }
    }
    let password = required_string(body, "password", &mut errors);
    if let Some(password) = &password {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            errors.add(
                "password",
                format!("The password field must be at least {MIN_PASSWORD_CHARS} characters."),
            );
        }
    }
    match (name, email, password) {
        (Some(name), Some(email), Some(password)) => {
            errors.into_result(Registration { name, email, password })
        }
        _ => Err(errors),
    }
}

pub fn credentials(body: &Value) -> Result<Credentials, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = required_string(body, "email", &mut errors).map(|e| e.trim().to_lowercase());
    let password = required_string(body, "password", &mut errors);
    match (email, password) {
        (Some(email), Some(password)) => errors.into_result(Credentials { email, password }),
        _ => Err(errors),
    }
}

fn item_name(raw: &Value, errors: &mut ValidationErrors) -> Option<ItemName> {
    let Some(text) = raw.as_str() else {
        errors.add("item.name", must_be_string("item.name"));
        return None;
    };
    match ItemName::parse(text) {
        Ok(name) => Some(name),
        Err(NameError::Empty) => {
            errors.add("item.name", required("item.name"));
            None
        }
        Err(NameError::TooLong) => {
            errors.add("item.name", too_long("item.name", MAX_NAME_CHARS));
            None
        }
    }
}

fn required_string(body: &Value, field: &str, errors: &mut ValidationErrors) -> Option<String> {
    match lookup(body, &[field]) {
        None => {
            errors.add(field, required(field));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, required(field));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(field, must_be_string(field));
            None
        }
    }
}

fn bounded_string(body: &Value, field: &str, errors: &mut ValidationErrors) -> Option<String> {
    let value = required_string(body, field, errors)?.trim().to_string();
    if value.chars().count() > MAX_STRING_CHARS {
        errors.add(field, too_long(field, MAX_STRING_CHARS));
        return None;
    }
    Some(value)
}

/// Accepts the usual loose boolean encodings: `true/false`, `1/0`, `"1"/"0"`.
fn boolean(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Walks `path`; a JSON null anywhere counts as absent.
fn lookup<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(body, |node, key| node.get(key))
        .filter(|v| !v.is_null())
}

fn required(field: &str) -> String {
    format!("The {field} field is required.")
}

fn must_be_string(field: &str) -> String {
    format!("The {field} field must be a string.")
}

fn too_long(field: &str, max: usize) -> String {
    format!("The {field} field must not be greater than {max} characters.")
}
