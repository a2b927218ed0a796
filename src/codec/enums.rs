//! Enumerated arguments rendered as fixed string tokens.
//!
//! Use the [`at_enum!`](crate::at_enum) macro to declare an enum together
//! with its token table:
//!
//! ```
//! use atwire::at_enum;
//! use atwire::codec::AtEnum;
//!
//! at_enum! {
//!     /// Radio access technology.
//!     pub enum Rat {
//!         Default => "DEFAULT",
//!         CatM => "CATM",
//!         NbIot => "NBIOT",
//!     }
//! }
//!
//! assert_eq!(Rat::CatM.token(), "CATM");
//! assert_eq!(Rat::from_token("NBIOT"), Some(Rat::NbIot));
//! assert_eq!(Rat::from_token("catm"), None);
//! ```

use crate::error::{AtError, Result};

/// Longest token an enum decode will look at.
pub const MAX_ENUM_TOKEN_LEN: usize = 30;

/// An enumerated value with a fixed wire token per variant.
pub trait AtEnum: Sized + Copy + 'static {
    /// All variants in table order.
    const ALL: &'static [Self];

    /// Wire token for this value.
    fn token(&self) -> &'static str;

    /// Exact, case-sensitive token lookup.
    fn from_token(token: &str) -> Option<Self>;
}

/// Decode a token into an enum, bounded by [`MAX_ENUM_TOKEN_LEN`].
pub fn decode_enum<E: AtEnum>(token: &str) -> Result<E> {
    if token.len() > MAX_ENUM_TOKEN_LEN {
        return Err(AtError::malformed(format!(
            "enum token longer than {} bytes",
            MAX_ENUM_TOKEN_LEN
        )));
    }
    E::from_token(token)
        .ok_or_else(|| AtError::malformed(format!("{:?} matches no known value", token)))
}

/// Declare an enum and implement [`AtEnum`](crate::codec::AtEnum) for it.
#[macro_export]
macro_rules! at_enum {
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

        impl $crate::codec::AtEnum for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn token(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            fn from_token(token: &str) -> Option<Self> {
                match token {
                    $($token => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::codec::AtEnum::token(self))
            }
        }
    };
}
