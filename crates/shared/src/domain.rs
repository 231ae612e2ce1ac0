use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(ScreenId);
id_newtype!(ControlId);
id_newtype!(ActionId);

/// Generates a string-backed enum whose unknown values survive as `Other`.
macro_rules! open_str_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $($text => Self::$variant,)+
                    _ => Self::Other(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

open_str_enum!(Trigger {
    Press => "press",
    ToggleOn => "toggle_on",
    ToggleOff => "toggle_off",
    ValueChange => "value_change",
    ValueRelease => "value_release",
});

open_str_enum!(ActionType {
    RunApp => "run_app",
    KeyPress => "key_press",
    NavigateScreen => "navigate_screen",
    ShowResolution => "show_resolution",
});

impl Trigger {
    /// Trigger fired by a toggle control for the given checked state.
    pub fn for_toggle(checked: bool) -> Self {
        if checked {
            Self::ToggleOn
        } else {
            Self::ToggleOff
        }
    }
}

impl ActionType {
    /// Action kinds the panel handles itself instead of forwarding to the agent.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::NavigateScreen | Self::ShowResolution)
    }
}

/// Persisted reaction to a control trigger. `payload_template` holds the raw
/// JSON document exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub id: ActionId,
    pub control_id: ControlId,
    pub trigger: Trigger,
    pub action_type: ActionType,
    pub payload_template: String,
    pub value_key: Option<String>,
}
