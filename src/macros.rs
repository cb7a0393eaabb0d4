macro_rules! attribute_registry {
    (
    $(#[$enum_attrs:meta])*
    pub enum $Enum:ident {
        point {
            $(pub $PVariant:ident, $pname:literal;)*
        }
        derived {
            $(pub $DVariant:ident, $dname:literal;)*
        }
    }) => {
        $(#[$enum_attrs])*
        pub enum $Enum {
            $( $PVariant, )*
            $( $DVariant, )*
        }

        impl $Enum {
            pub const COUNT: usize = 0
                $( + 1 + (0 * $Enum::$PVariant as usize) )*
                $( + 1 + (0 * $Enum::$DVariant as usize) )*
                ;

            /// Point variants are declared first, so an index below this bound
            /// identifies a point attribute.
            pub const POINT_COUNT: usize = 0
                $( + 1 + (0 * $Enum::$PVariant as usize) )*
                ;

            #[allow(unused_variables)]
            pub fn from_index(i: usize) -> $Enum {
                let orig_i = i;
                $(
                    if i == 0 {
                        return $Enum::$PVariant;
                    }
                    let i = i - 1;
                )*
                $(
                    if i == 0 {
                        return $Enum::$DVariant;
                    }
                    let i = i - 1;
                )*
                panic!(concat!("index {} out of bounds for ", stringify!($Enum)), orig_i)
            }

            pub fn iter() -> impl Iterator<Item = $Enum> {
                (0 .. $Enum::COUNT).map($Enum::from_index)
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( $Enum::$PVariant => $pname, )*
                    $( $Enum::$DVariant => $dname, )*
                }
            }

            pub fn from_name(name: &str) -> Option<$Enum> {
                match name {
                    $( $pname => Some($Enum::$PVariant), )*
                    $( $dname => Some($Enum::$DVariant), )*
                    _ => None,
                }
            }

            /// Point attributes take half-to-even rounding when a conversion
            /// writes into them.
            pub fn is_point(self) -> bool {
                (self as usize) < $Enum::POINT_COUNT
            }
        }
    };
}
