// src/models/enums.rs
//! Все типы через единый макрос define_label_enum!

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Макрос для генерации enum с as_str, parse, Display и serde через строку
macro_rules! define_label_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident => $str_val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $variant ),+
        }

        impl $name {
            #[inline]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $str_val ),+
                }
            }

            /// Case-insensitive, ignores surrounding whitespace
            pub fn parse(s: &str) -> Option<Self> {
                let needle = s.trim();
                $(
                    if needle.eq_ignore_ascii_case($str_val) {
                        return Some($name::$variant);
                    }
                )+
                None
            }

            /// Все допустимые значения
            pub const fn all_values() -> &'static [&'static str] {
                &[ $( $str_val ),+ ]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| format!("Invalid {}: '{}'", stringify!($name), s))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// ==================== ТИПЫ ПОЗИЦИЙ ====================

define_label_enum! {
    /// Тип принятой/выданной позиции. Only `Toner` moves the stock ledger.
    pub enum ItemType {
        Toner => "Toner",
        Keyboard => "Keyboard",
        Mouse => "Mouse",
        Cable => "Cable",
        Monitor => "Monitor",
        Other => "Other",
    }
}

define_label_enum! {
    pub enum TonerColor {
        Black => "Black",
        Cyan => "Cyan",
        Magenta => "Magenta",
        Yellow => "Yellow",
        ColorSet => "Color Set",
    }
}

define_label_enum! {
    pub enum TonerType {
        BlackAndWhite => "Black & White",
        Color => "Color",
    }
}

// ==================== ТИПЫ УСТРОЙСТВ ====================

define_label_enum! {
    pub enum DeviceType {
        Computer => "Computer",
        Laptop => "Laptop",
        Printer => "Printer",
        Monitor => "Monitor",
        Phone => "Phone",
        Other => "Other",
    }
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Other
    }
}
