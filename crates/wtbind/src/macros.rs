//! Declarative macros for option structs and token enums.

/// Declares an option struct and its [`EncodeConfig`](crate::config::EncodeConfig)
/// implementation.
///
/// Fields are written in declaration order under their own names, so a
/// field's name is the engine option key. Every field type must implement
/// [`ConfigValue`](crate::config::ConfigValue); any other type fails to
/// compile.
macro_rules! config_options {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::config::EncodeConfig for $name {
            fn encode_into(&self, out: &mut $crate::config::ConfigWriter) {
                $( out.field(stringify!($field), &self.$field); )*
            }
        }
    };
}

/// Declares an enum of bare configuration tokens.
///
/// Each variant maps to the exact token the engine expects. Token values are
/// never "unset": wrap them in `Option` or `Vec` to make them omittable.
macro_rules! config_tokens {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $token:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// The token as the engine spells it.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $token, )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $crate::config::ConfigToken for $name {
            fn token(&self) -> &'static str {
                self.as_str()
            }
        }

        impl $crate::config::ConfigValue for $name {
            fn is_unset(&self) -> bool {
                false
            }

            fn write_value(&self, out: &mut String) {
                out.push_str(self.as_str());
            }
        }
    };
}
