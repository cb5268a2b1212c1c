//! Coercion of header values to their string form.

/// Conversion of a value into the string stored in a header slot.
///
/// The formatting is fixed so that the same input always produces the same
/// bytes on the wire:
///
/// - strings are stored as-is
/// - integers use plain decimal notation
/// - `bool` is `true` or `false`
/// - floats use the shortest decimal that round-trips, never an exponent;
///   `-0.0` is `0` and non-finite values are `NaN`, `Infinity` and
///   `-Infinity`
pub trait IntoHeaderValue {
    /// Returns the string form of this value.
    fn into_header_value(self) -> String;
}

impl IntoHeaderValue for String {
    fn into_header_value(self) -> String {
        self
    }
}

impl IntoHeaderValue for &str {
    fn into_header_value(self) -> String {
        self.to_owned()
    }
}

impl IntoHeaderValue for &String {
    fn into_header_value(self) -> String {
        self.clone()
    }
}

impl IntoHeaderValue for char {
    fn into_header_value(self) -> String {
        self.to_string()
    }
}

impl IntoHeaderValue for bool {
    fn into_header_value(self) -> String {
        self.to_string()
    }
}

macro_rules! integer_header_value {
    ($($t:ty),*) => {
        $(
            impl IntoHeaderValue for $t {
                fn into_header_value(self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

integer_header_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float_header_value {
    ($($t:ty),*) => {
        $(
            impl IntoHeaderValue for $t {
                fn into_header_value(self) -> String {
                    if self.is_nan() {
                        "NaN".to_owned()
                    } else if self.is_infinite() {
                        if self.is_sign_positive() { "Infinity" } else { "-Infinity" }.to_owned()
                    } else if self == 0.0 {
                        "0".to_owned()
                    } else {
                        self.to_string()
                    }
                }
            }
        )*
    };
}

float_header_value!(f32, f64);
