//! Service result codes.
//!
//! Every plugin service reports outcomes through its own closed enumeration.
//! Two values carry fixed meaning across services: `Success` is the only
//! terminal-OK code and `Next` (where a service has it) marks an in-progress
//! frame. Everything else is a terminal failure.

use std::fmt;

/// How a result code affects the call or stream that carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Terminal success.
    Success,
    /// Progress frame, more to come.
    Next,
    /// Terminal failure.
    Failure,
}

/// A service-specific result enumeration.
///
/// Implemented through [`result_code!`](crate::result_code) rather than by
/// hand.
pub trait ResultCode: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Service name used in error messages.
    const SERVICE: &'static str;

    /// Decode a wire value. Values this client does not know map to an
    /// `Unrecognized` arm instead of failing.
    fn from_code(code: i32) -> Self;

    /// The wire value.
    fn code(self) -> i32;

    /// Classify this code.
    fn outcome(self) -> Outcome;
}

/// The `{result, result_str}` pair embedded in a response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedResult {
    pub code: i32,
    pub message: String,
}

impl ReportedResult {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Declare a service result enumeration.
///
/// ```
/// drone_rpc_core::result_code! {
///     /// Possible results returned by the calibration service.
///     pub enum CalibrationResult {
///         service: "calibration",
///         success: Success,
///         next: [Next],
///         codes: {
///             Unknown = 0,
///             Success = 1,
///             Next = 2,
///             Busy = 6,
///         }
///     }
/// }
///
/// use drone_rpc_core::{Outcome, ResultCode};
/// assert_eq!(CalibrationResult::from_code(2).outcome(), Outcome::Next);
/// assert_eq!(CalibrationResult::from(42), CalibrationResult::Unrecognized(42));
/// ```
///
/// Services without a progress sentinel pass `next: []`.
#[macro_export]
macro_rules! result_code {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            service: $service:literal,
            success: $success:ident,
            next: [$($next:ident)?],
            codes: {
                $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A code this client does not know about.
            Unrecognized(i32),
        }

        impl $crate::ResultCode for $name {
            const SERVICE: &'static str = $service;

            fn from_code(code: i32) -> Self {
                match code {
                    $( $value => Self::$variant, )+
                    other => Self::Unrecognized(other),
                }
            }

            fn code(self) -> i32 {
                match self {
                    $( Self::$variant => $value, )+
                    Self::Unrecognized(other) => other,
                }
            }

            fn outcome(self) -> $crate::Outcome {
                match self {
                    Self::$success => $crate::Outcome::Success,
                    $( Self::$next => $crate::Outcome::Next, )?
                    _ => $crate::Outcome::Failure,
                }
            }
        }

        impl ::std::convert::From<i32> for $name {
            fn from(code: i32) -> Self {
                <Self as $crate::ResultCode>::from_code(code)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $( Self::$variant => f.write_str(stringify!($variant)), )+
                    Self::Unrecognized(code) => write!(f, "Unrecognized({code})"),
                }
            }
        }
    };
}
