//! Human-interaction descriptors
//!
//! A declarative form description emitted when a task requests human
//! input. The engine produces and transports these; rendering and
//! answer collection happen in an external surface.

use crate::ids::RoleId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The form a human answerer is asked to fill in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionDescriptor {
    /// Roles allowed to answer; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleId>,
    pub ui: Vec<UiItem>,
}

impl InteractionDescriptor {
    pub fn new(roles: Vec<RoleId>, ui: Vec<UiItem>) -> Self {
        Self { roles, ui }
    }
}

/// Kind of form control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiControl {
    /// Static explanatory text, no input
    Info,
    /// Single-line text input
    Line,
    /// Multi-line text input
    Text,
    /// Yes/no input
    Binary,
    /// Pick one of the declared options
    Choice,
}

/// One element of a form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiItem {
    /// Key of the value in the submitted payload; absent for info items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub control: UiControl,
    pub label: String,
    /// `(label, value)` pairs for choice controls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<UiOption>,
    /// Show this item only when another field holds a given value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<UiCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl UiItem {
    pub fn info(label: impl Into<String>) -> Self {
        Self::bare(None, UiControl::Info, label)
    }

    pub fn line(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::bare(Some(name.into()), UiControl::Line, label)
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::bare(Some(name.into()), UiControl::Text, label)
    }

    pub fn binary(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::bare(Some(name.into()), UiControl::Binary, label)
    }

    pub fn choice(
        name: impl Into<String>,
        label: impl Into<String>,
        options: Vec<UiOption>,
    ) -> Self {
        let mut item = Self::bare(Some(name.into()), UiControl::Choice, label);
        item.options = options;
        item
    }

    pub fn with_condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition = Some(UiCondition {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn bare(name: Option<String>, control: UiControl, label: impl Into<String>) -> Self {
        Self {
            name,
            control,
            label: label.into(),
            options: Vec::new(),
            condition: None,
            default: None,
        }
    }
}

/// One selectable option of a choice control.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiOption {
    pub label: String,
    pub value: String,
}

impl UiOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Visibility condition: show the item when `field` holds `value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiCondition {
    pub field: String,
    pub value: Value,
}
