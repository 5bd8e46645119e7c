//! The closed set of attribute roles.

use std::fmt;

use crate::error::AttributeError;

macro_rules! roles {
    ($($(#[$meta:meta])* $variant:ident => $name:literal,)+) => {
        /// A semantic slot of an attribute's role data.
        ///
        /// Roles are integer coded; the numeric value is the declaration order.
        /// Each role also has a wire name used as the JSON key in attribute
        /// descriptions and registry nodes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum Role {
            $($(#[$meta])* $variant,)+
        }

        impl Role {
            /// Every role, in index order.
            pub const ALL: &'static [Role] = &[$(Role::$variant,)+];

            /// The wire name of the role.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Role::$variant => $name,)+
                }
            }

            /// Look a role up by its wire name.
            pub fn from_name(name: &str) -> Option<Role> {
                match name {
                    $($name => Some(Role::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

roles! {
    /// UI type name of the attribute, e.g. `FloatScrubber`.
    Type => "type",
    Enabled => "attr_enabled",
    /// Set on action attributes when they are triggered.
    Activated => "activated",
    Title => "title",
    AbbrTitle => "abbr_title",
    StringChoices => "combo_box_options",
    AbbrStringChoices => "combo_box_abbr_options",
    StringChoicesEnabled => "combo_box_options_enabled",
    ToolTip => "tooltip",
    CustomMessage => "custom_message",
    IntegerMin => "integer_min",
    IntegerMax => "integer_max",
    FloatScrubMin => "float_scrub_min",
    FloatScrubMax => "float_scrub_max",
    FloatScrubStep => "float_scrub_step",
    FloatScrubSensitivity => "float_scrub_sensitivity",
    FloatDisplayDecimals => "float_display_decimals",
    DisabledValue => "disabled_value",
    Value => "value",
    DefaultValue => "default_value",
    AbbrValue => "short_value",
    Uuid => "attr_uuid",
    /// Names of the UI models the attribute is exposed in.
    UiDataModels => "ui_data_models",
    /// Every menu the attribute was inserted into, `[MARKER|]*model|path|node`.
    MenuPaths => "menu_paths",
    ToolbarPosition => "toolbar_position",
    OverrideValue => "override_value",
    SerializeKey => "serialize_key",
    QmlCode => "qml_code",
    /// Preference the attribute tracks for its whole lifetime.
    PreferencePath => "preference_path",
    /// Preference read once when the module attaches.
    InitOnlyPreferencePath => "init_only_preference_path",
    FontSize => "font_size",
    FontFamily => "font_family",
    TextAlignment => "text_alignment",
    TextContainerBox => "text_alignment_box",
    Colour => "attr_colour",
    HotkeyUuid => "hotkey_uuid",
    UserData => "user_data",
}

impl Role {
    /// The integer code of the role.
    pub const fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Role> {
        Self::ALL.get(index as usize).copied()
    }

    /// Like [`from_name`](Self::from_name) but with a typed error.
    pub fn parse(name: &str) -> Result<Role, AttributeError> {
        Self::from_name(name).ok_or_else(|| AttributeError::UnknownRole(name.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for (i, role) in Role::ALL.iter().enumerate() {
            assert_eq!(role.index() as usize, i);
            assert_eq!(Role::from_index(role.index()), Some(*role));
            assert_eq!(Role::from_name(role.name()), Some(*role));
        }
        assert_eq!(Role::from_index(Role::ALL.len() as u32), None);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Role::Uuid.name(), "attr_uuid");
        assert_eq!(Role::AbbrValue.name(), "short_value");
        assert_eq!(Role::StringChoices.to_string(), "combo_box_options");
        assert_eq!(Role::from_name("colour"), None);
        assert!(matches!(Role::parse("nope"), Err(AttributeError::UnknownRole(n)) if n == "nope"));
    }
}
