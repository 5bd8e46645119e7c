//! Typed observable attributes.
//!
//! An [`Attribute`] is a bag of role data: a value plus an open set of
//! metadata (title, tooltip, menu paths, UI models, preference path, ...)
//! keyed by [`Role`]. Attributes do not notify anyone themselves; the owning
//! [`Module`](crate::module::Module) runs the change pipeline when a write
//! reports a change.
//!
//! # Example
//!
//! ```
//! use attrsync::attribute::{Attribute, FloatOptions, Role};
//!
//! let mut volume = Attribute::float("Volume", "Vol", 1.0, FloatOptions::default());
//! assert!(volume.set_role_data(Role::Value, 0.5).unwrap());
//! assert!(!volume.set_role_data(Role::Value, 0.5).unwrap());
//! assert_eq!(volume.get_role_data::<f64>(Role::Value).unwrap(), 0.5);
//! assert!(volume.set_role_data(Role::Value, "loud").is_err());
//! ```

mod role;
mod value;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AttributeError;
use crate::logging::targets;

pub use role::Role;
pub use value::{AttributeValue, ColourTriplet, FromAttributeValue};

/// The UI widget family of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Float,
    Integer,
    Boolean,
    String,
    StringChoice,
    Json,
    Colour,
    FloatVector,
    Vec4,
    QmlCode,
    Action,
}

impl AttributeKind {
    /// The type name published in the `type` role.
    pub const fn type_name(self) -> &'static str {
        match self {
            AttributeKind::Float => "FloatScrubber",
            AttributeKind::Integer => "IntegerValue",
            AttributeKind::Boolean => "OnOffToggle",
            AttributeKind::String => "LineEdit",
            AttributeKind::StringChoice => "ComboBox",
            AttributeKind::Json => "JsonAttribute",
            AttributeKind::Colour => "ColourAttribute",
            AttributeKind::FloatVector => "FloatVector",
            AttributeKind::Vec4 => "Vec4f",
            AttributeKind::QmlCode => "QmlCode",
            AttributeKind::Action => "Action",
        }
    }

    pub fn from_type_name(name: &str) -> Option<AttributeKind> {
        [
            AttributeKind::Float,
            AttributeKind::Integer,
            AttributeKind::Boolean,
            AttributeKind::String,
            AttributeKind::StringChoice,
            AttributeKind::Json,
            AttributeKind::Colour,
            AttributeKind::FloatVector,
            AttributeKind::Vec4,
            AttributeKind::QmlCode,
            AttributeKind::Action,
        ]
        .into_iter()
        .find(|kind| kind.type_name() == name)
    }
}

/// Scrub range and display settings of a float attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatOptions {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub display_decimals: i64,
    pub sensitivity: f64,
}

impl Default for FloatOptions {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            step: 1.0,
            display_decimals: 2,
            sensitivity: 1.0,
        }
    }
}

impl FloatOptions {
    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn display_decimals(mut self, decimals: i64) -> Self {
        self.display_decimals = decimals;
        self
    }

    pub fn sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }
}

/// A typed property with role data.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    uuid: Uuid,
    kind: AttributeKind,
    roles: BTreeMap<Role, AttributeValue>,
    redraw_viewport: bool,
    partially_linked: bool,
}

impl Attribute {
    /// Every attribute starts enabled, with its type, titles, uuid and an
    /// empty list of UI models.
    fn base(title: &str, abbr_title: &str, kind: AttributeKind) -> Self {
        let uuid = Uuid::new_v4();
        let mut roles = BTreeMap::new();
        roles.insert(Role::Enabled, AttributeValue::Bool(true));
        roles.insert(Role::Type, AttributeValue::from(kind.type_name()));
        roles.insert(Role::Title, AttributeValue::from(title));
        roles.insert(Role::AbbrTitle, AttributeValue::from(abbr_title));
        roles.insert(Role::Uuid, AttributeValue::Uuid(uuid));
        roles.insert(Role::UiDataModels, AttributeValue::StringList(Vec::new()));
        Self {
            uuid,
            kind,
            roles,
            redraw_viewport: false,
            partially_linked: false,
        }
    }

    fn with_value(mut self, value: AttributeValue) -> Self {
        self.roles.insert(Role::Value, value);
        self
    }

    fn with_role(mut self, role: Role, value: impl Into<AttributeValue>) -> Self {
        self.roles.insert(role, value.into());
        self
    }

    pub fn float(title: &str, abbr_title: &str, value: f64, options: FloatOptions) -> Self {
        Self::base(title, abbr_title, AttributeKind::Float)
            .with_value(AttributeValue::Float(value))
            .with_role(Role::DefaultValue, value)
            .with_role(Role::FloatScrubMin, options.min)
            .with_role(Role::FloatScrubMax, options.max)
            .with_role(Role::FloatScrubStep, options.step)
            .with_role(Role::FloatDisplayDecimals, options.display_decimals)
            .with_role(Role::FloatScrubSensitivity, options.sensitivity)
    }

    pub fn integer(title: &str, abbr_title: &str, value: i64, min: i64, max: i64) -> Self {
        Self::base(title, abbr_title, AttributeKind::Integer)
            .with_value(AttributeValue::Integer(value))
            .with_role(Role::DefaultValue, value)
            .with_role(Role::IntegerMin, min)
            .with_role(Role::IntegerMax, max)
    }

    pub fn boolean(title: &str, abbr_title: &str, value: bool) -> Self {
        Self::base(title, abbr_title, AttributeKind::Boolean)
            .with_value(AttributeValue::Bool(value))
            .with_role(Role::DefaultValue, value)
    }

    pub fn string(title: &str, abbr_title: &str, value: &str) -> Self {
        Self::base(title, abbr_title, AttributeKind::String)
            .with_value(AttributeValue::from(value))
            .with_role(Role::DefaultValue, value)
    }

    /// A combo box. Abbreviated options default to the full options.
    pub fn string_choice(
        title: &str,
        abbr_title: &str,
        value: &str,
        options: Vec<String>,
        abbr_options: Vec<String>,
    ) -> Self {
        let abbr_options = if abbr_options.is_empty() {
            options.clone()
        } else {
            abbr_options
        };
        let enabled = vec![true; options.len()];
        Self::base(title, abbr_title, AttributeKind::StringChoice)
            .with_value(AttributeValue::from(value))
            .with_role(Role::DefaultValue, value)
            .with_role(Role::StringChoices, options)
            .with_role(Role::AbbrStringChoices, abbr_options)
            .with_role(Role::StringChoicesEnabled, enabled)
    }

    pub fn json(title: &str, abbr_title: &str, value: Value) -> Self {
        Self::base(title, abbr_title, AttributeKind::Json).with_value(AttributeValue::Json(value))
    }

    pub fn colour(title: &str, abbr_title: &str, value: ColourTriplet) -> Self {
        Self::base(title, abbr_title, AttributeKind::Colour)
            .with_value(AttributeValue::Colour(value))
            .with_role(Role::DefaultValue, value)
    }

    pub fn float_vector(title: &str, abbr_title: &str, value: Vec<f64>) -> Self {
        Self::base(title, abbr_title, AttributeKind::FloatVector)
            .with_value(AttributeValue::FloatList(value))
    }

    pub fn vec4(title: &str, abbr_title: &str, value: [f32; 4]) -> Self {
        Self::base(title, abbr_title, AttributeKind::Vec4).with_value(AttributeValue::Vec4(value))
    }

    pub fn qml_code(title: &str, code: &str) -> Self {
        Self::base(title, title, AttributeKind::QmlCode).with_role(Role::QmlCode, code)
    }

    /// A button-like attribute with no value; triggering sets `activated`.
    pub fn action(title: &str, abbr_title: &str) -> Self {
        Self::base(title, abbr_title, AttributeKind::Action).with_role(Role::Activated, false)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        self.role_str(Role::Title).unwrap_or_default()
    }

    /// The role value as a string slice, if it is a string.
    pub fn role_str(&self, role: Role) -> Option<&str> {
        self.roles.get(&role).and_then(AttributeValue::as_str)
    }

    pub fn role_value(&self, role: Role) -> Option<&AttributeValue> {
        self.roles.get(&role)
    }

    /// Iterate over role data in role order.
    pub fn roles(&self) -> impl Iterator<Item = (Role, &AttributeValue)> {
        self.roles.iter().map(|(role, value)| (*role, value))
    }

    /// Read role data as `T`.
    pub fn get_role_data<T: FromAttributeValue>(&self, role: Role) -> Result<T, AttributeError> {
        let value = self.roles.get(&role).ok_or_else(|| AttributeError::RoleNotFound {
            title: self.title().to_string(),
            role,
        })?;
        value.get::<T>().ok_or_else(|| AttributeError::TypeMismatch {
            title: self.title().to_string(),
            role,
            expected: T::EXPECTED,
            found: value.kind_name(),
        })
    }

    pub fn has_role_data(&self, role: Role) -> bool {
        self.roles.contains_key(&role)
    }

    /// Write role data. Returns whether the stored value changed.
    ///
    /// Once a role holds a value, later writes must be convertible to the
    /// same type. The uuid role is fixed at construction.
    pub fn set_role_data(
        &mut self,
        role: Role,
        value: impl Into<AttributeValue>,
    ) -> Result<bool, AttributeError> {
        let value = value.into();
        if role == Role::Uuid {
            tracing::debug!(target: targets::ATTRIBUTE, title = self.title(), "ignoring uuid write");
            return Ok(false);
        }
        let converted = match self.roles.get(&role) {
            None => value,
            Some(current) => {
                let found = value.kind_name();
                let converted = current.convert_like(value).ok_or_else(|| {
                    AttributeError::TypeMismatch {
                        title: self.title().to_string(),
                        role,
                        expected: current.kind_name(),
                        found,
                    }
                })?;
                if *current == converted {
                    return Ok(false);
                }
                converted
            }
        };
        self.roles.insert(role, converted);
        Ok(true)
    }

    /// Write role data from its JSON encoding.
    pub fn set_role_data_json(&mut self, role: Role, value: &Value) -> Result<bool, AttributeError> {
        let typed = match self.roles.get(&role) {
            Some(current) => current.decode_like(value).ok_or_else(|| AttributeError::TypeMismatch {
                title: self.title().to_string(),
                role,
                expected: current.kind_name(),
                found: json_kind(value),
            })?,
            None => AttributeValue::from_json(value),
        };
        self.set_role_data(role, typed)
    }

    /// Remove role data. Returns true if the role was present.
    pub fn delete_role_data(&mut self, role: Role) -> bool {
        if role == Role::Uuid {
            return false;
        }
        self.roles.remove(&role).is_some()
    }

    pub fn role_data_as_json(&self, role: Role) -> Result<Value, AttributeError> {
        self.roles
            .get(&role)
            .map(AttributeValue::to_json)
            .ok_or_else(|| AttributeError::RoleNotFound {
                title: self.title().to_string(),
                role,
            })
    }

    /// The value role as JSON, or null for attributes without a value.
    pub fn value_json(&self) -> Value {
        self.role_data_as_json(Role::Value).unwrap_or(Value::Null)
    }

    /// The full role map keyed by role name.
    pub fn as_json(&self) -> Value {
        let map: Map<String, Value> = self
            .roles
            .iter()
            .map(|(role, value)| (role.name().to_string(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Apply a role-name keyed document.
    ///
    /// The uuid role and unknown role names are skipped; values that do not
    /// fit the stored type are logged and skipped. Returns the roles that
    /// changed, in document order.
    pub fn update_from_json(&mut self, doc: &Value) -> Vec<Role> {
        let Some(map) = doc.as_object() else {
            return Vec::new();
        };
        let mut changed = Vec::new();
        for (name, value) in map {
            let Some(role) = Role::from_name(name) else {
                tracing::debug!(target: targets::ATTRIBUTE, role = %name, "skipping unknown role");
                continue;
            };
            if role == Role::Uuid {
                continue;
            }
            match self.set_role_data_json(role, value) {
                Ok(true) => changed.push(role),
                Ok(false) => {}
                Err(err) => tracing::warn!(target: targets::ATTRIBUTE, error = %err, "role update skipped"),
            }
        }
        changed
    }

    /// Names of the UI models the attribute is exposed in.
    pub fn ui_data_models(&self) -> Vec<String> {
        self.get_role_data(Role::UiDataModels).unwrap_or_default()
    }

    pub fn belongs_to_model(&self, model: &str) -> bool {
        self.ui_data_models().iter().any(|m| m == model)
    }

    /// True if the attribute is exposed in any of `models`.
    pub fn belongs_to_models(&self, models: &[String]) -> bool {
        self.ui_data_models().iter().any(|m| models.contains(m))
    }

    /// Add or remove `model` from the attribute's UI models.
    pub fn expose_in_ui_model(&mut self, model: &str, expose: bool) -> bool {
        let mut models = self.ui_data_models();
        let present = models.iter().any(|m| m == model);
        match (expose, present) {
            (true, false) => models.push(model.to_string()),
            (false, true) => models.retain(|m| m != model),
            _ => return false,
        }
        self.roles
            .insert(Role::UiDataModels, AttributeValue::StringList(models));
        true
    }

    pub fn set_preference_path(&mut self, path: &str) -> Result<bool, AttributeError> {
        self.set_role_data(Role::PreferencePath, path)
    }

    pub fn set_tool_tip(&mut self, tool_tip: &str) -> Result<bool, AttributeError> {
        self.set_role_data(Role::ToolTip, tool_tip)
    }

    pub fn set_redraw_viewport_on_change(&mut self, redraw: bool) {
        self.redraw_viewport = redraw;
    }

    pub fn redraw_viewport_on_change(&self) -> bool {
        self.redraw_viewport
    }

    /// Opt in to forwarding over partial links.
    pub fn set_partially_linked(&mut self, linked: bool) {
        self.partially_linked = linked;
    }

    pub fn is_partially_linked(&self) -> bool {
        self.partially_linked
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
