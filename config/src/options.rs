use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use show::Choice;

use crate::Error;

/// Defines a closed enumeration with its wire names, parsing and display.
macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident => $string:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $string)]
                $variant,
            )+
        }

        impl $name {
            /// All values in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the name used in asset paths and configuration files.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $string,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|option| option.as_str() == value)
                    .ok_or_else(|| Error::UnknownOption {
                        kind: stringify!($name),
                        value: value.to_owned(),
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Choice for $name {
            const CHOICES: &'static [Self] = Self::ALL;
        }
    };
}

closed_enum! {
    /// A physical keyboard design.
    KeyboardModel {
        /// The Quefrency split staggered keyboard.
        Quefrency => "quefrency",
        /// The Sinc split keyboard with function row.
        Sinc => "sinc",
        /// The KBO split keyboard built from a base layout with blockers.
        Kbo => "kbo",
    }
}

impl KeyboardModel {
    /// Returns the single character identifying the model in asset paths.
    #[must_use]
    pub fn initial(self) -> char {
        match self {
            Self::Quefrency => 'q',
            Self::Sinc => 's',
            Self::Kbo => 'k',
        }
    }
}

closed_enum! {
    /// One half of a split keyboard.
    Side {
        /// The left half.
        Left => "left",
        /// The right half.
        Right => "right",
    }
}

closed_enum! {
    /// A case style.
    CaseType {
        /// Type 1 case.
        One => "1",
        /// Type 2 case.
        Two => "2",
        /// Type 3 case.
        Three => "3",
        /// Gasket case.
        G => "g",
        /// Extended gasket case.
        Gx => "gx",
        /// Machined case.
        M => "m",
    }
}

closed_enum! {
    /// A selectable layout state of one keyboard side.
    VariantOption {
        /// Macro pad attached.
        Macro => "macro",
        /// Macro pad removed.
        NoMacro => "no-macro",
        /// 60% layout.
        Sixty => "60",
        /// 65% layout.
        SixtyFive => "65",
        /// 65% layout with the navigation column blocked.
        SixtyFiveBlocked => "65-b",
        /// Generic blocker.
        Blocker => "blocker",
        /// First blocker variant.
        Blocker1 => "blocker-1",
        /// Second blocker variant.
        Blocker2 => "blocker-2",
        /// No blocker, all extra switches populated.
        NoBlocker => "no-blocker",
        /// The base layout without any extra parts.
        Base => "base",
    }
}

closed_enum! {
    /// The category of a variant option.
    OptionCategory {
        /// Changes the case and plate structure.
        Macro => "macro",
        /// Changes only the switch population and blocker visibility.
        Blocker => "blocker",
    }
}

closed_enum! {
    /// A bottom case style.
    #[derive(Default)]
    BottomCase {
        /// Closed bottom case.
        #[default]
        Standard => "standard",
        /// Vented bottom case.
        Vented => "vented",
    }
}

closed_enum! {
    /// The width of the right shift key.
    #[derive(Default)]
    RightShift {
        /// 1.75 units.
        U1_75 => "175",
        /// 2.75 units.
        #[default]
        U2_75 => "275",
    }
}

closed_enum! {
    /// A mounting angle preset, looked up per variant in the geometry catalog.
    #[derive(Default)]
    MountingAngle {
        /// Flat mounting.
        #[default]
        Flat => "0",
        /// Three degree preset.
        Three => "3",
        /// Six degree preset.
        Six => "6",
    }
}
