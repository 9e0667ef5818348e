//! Fixed-point quantities exchanged with the analyzer
//!
//! Voltages and frequencies are kept in fixed point so the number that is logged, the number
//! written to the instrument and the number saved in the output file are the same. Voltages
//! carry thousandths of a volt. Frequencies carry whole hertz.

use std::fmt::{ self, Write };

/// Signed decimal value with milli (10e-3) precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct DecimalMilli
{
    millis: i64,
}

impl DecimalMilli
{
    /// Rounds to the nearest thousandth
    fn from_f64(num: f64) -> Self
    {
        Self { millis: (num * 1000.0).round() as i64 }
    }

    /// Returns `None` when the value is not finite or does not fit
    fn checked_from_f64(num: f64) -> Option<Self>
    {
        let millis = (num * 1000.0).round();

        if millis.is_finite() && millis.abs() < i64::MAX as f64 {
            Some(Self { millis: millis as i64 })
        }
        else {
            None
        }
    }

    /// Saturates at the representable range
    fn from_whole(whole: i64) -> Self
    {
        Self { millis: whole.saturating_mul(1000) }
    }

    fn checked_from_whole(whole: i64) -> Option<Self>
    {
        whole.checked_mul(1000).map(|millis| Self { millis: millis })
    }

    fn as_f64(&self) -> f64
    {
        self.millis as f64 / 1000.0
    }
}

/// Defines a scalar prefix type for displaying units without changing the underlying value e.g.
/// "kilo-" or "milli-"
///
/// # Implementation
/// Values are stored with thousandths precision, so prefixes smaller than "milli-" cannot be
/// displayed and are not defined.
pub trait Scalar
{
    /// Return the power of 10 of this scalar
    ///
    /// For example, a prefix of "milli-" should return -3.
    fn magnitude() -> i32;

    /// Return this scalar's written shorthand notation
    fn notation() -> &'static str;
}

macro_rules! impl_prefix
{
    { $name:ident, $magnitude:literal, $notation:literal } => {
        pub struct $name {}

        impl Scalar for $name
        {
            fn magnitude() -> i32
            {
                $magnitude
            }

            fn notation() -> &'static str
            {
                $notation
            }
        }
    }
}

impl_prefix!{ Milli, -3, "m" }
impl_prefix!{ Base, 0, "" }
impl_prefix!{ Kilo, 3, "k" }
impl_prefix!{ Mega, 6, "M" }

/// Formats a fixed-point value relative to a prefix
///
/// Without a precision, trailing zeros of the fraction are dropped. With a precision, digits
/// past it are truncated and missing digits are zero-filled.
pub struct UnitDisplay
{
    symbol: &'static str,
    notation: &'static str,
    magnitude: i32,
    value: DecimalMilli,
    hide_unit: bool,
}

impl fmt::Display for UnitDisplay
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let mut divisor = 10u64.pow((3 + self.magnitude) as u32);
        let abs_millis = self.value.millis.unsigned_abs();
        let whole = abs_millis / divisor;
        let mut fraction = abs_millis % divisor;

        if self.value.millis < 0 {
            f.write_char('-')?;
        }
        write!(f, "{}", whole)?;

        if let Some(precision) = f.precision() {
            if precision != 0 {
                f.write_char('.')?;
            }

            for _index in 0..precision {
                if fraction == 0 {
                    f.write_char('0')?;
                }
                else {
                    divisor /= 10;
                    let digit = fraction / divisor;
                    fraction %= divisor;
                    f.write_char(char::from(b'0' + digit as u8))?;
                }
            }
        }
        else {
            if fraction != 0 {
                f.write_char('.')?;
            }
            while fraction != 0 {
                divisor /= 10;
                let digit = fraction / divisor;
                fraction %= divisor;
                f.write_char(char::from(b'0' + digit as u8))?;
            }
        }

        if self.hide_unit {
            Ok(())
        }
        else {
            f.write_str(self.notation)?;
            f.write_str(self.symbol)
        }
    }
}

/// A voltage with millivolt precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volt
{
    value: DecimalMilli,
}

/// A frequency
///
/// Only whole hertz are ever constructed since the sweep setters take integer frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hertz
{
    value: DecimalMilli,
}

macro_rules! impl_unit
{
    { $u:ty, $symbol:literal } => {
        impl $u
        {
            /// The written shorthand symbol
            pub const SYMBOL: &'static str = $symbol;

            /// Displays the unit with a given scalar prefix
            pub fn display<S: Scalar>(&self) -> UnitDisplay
            {
                UnitDisplay {
                    symbol: Self::SYMBOL,
                    notation: S::notation(),
                    magnitude: S::magnitude(),
                    value: self.value,
                    hide_unit: false,
                }
            }

            /// Displays the bare number in base units, as the instrument expects it
            pub fn display_anon_base(&self) -> UnitDisplay
            {
                UnitDisplay {
                    symbol: Self::SYMBOL,
                    notation: Base::notation(),
                    magnitude: Base::magnitude(),
                    value: self.value,
                    hide_unit: true,
                }
            }

            /// Constructs a new value from a whole number of base units
            pub fn from_whole(num: i64) -> Self
            {
                Self { value: DecimalMilli::from_whole(num) }
            }

            /// Like [`Self::from_whole`] but `None` when the value cannot be represented
            pub fn checked_from_whole(num: i64) -> Option<Self>
            {
                DecimalMilli::checked_from_whole(num).map(|value| Self { value: value })
            }

            pub fn as_f64(&self) -> f64
            {
                self.value.as_f64()
            }

            pub fn is_zero(&self) -> bool
            {
                self.value.millis == 0
            }
        }
    }
}

impl_unit!{ Volt, "V" }
impl_unit!{ Hertz, "Hz" }

impl Volt
{
    /// Constructs a voltage rounded to the nearest millivolt
    pub fn from_f64(volts: f64) -> Self
    {
        Self { value: DecimalMilli::from_f64(volts) }
    }

    /// Rounds to the nearest millivolt, `None` for values that are not finite or out of range
    pub fn checked_from_f64(volts: f64) -> Option<Self>
    {
        DecimalMilli::checked_from_f64(volts).map(|value| Self { value: value })
    }
}

impl Hertz
{
    /// Constructs a frequency, dropping any fractional hertz
    pub fn from_f64_truncated(hertz: f64) -> Self
    {
        Self::from_whole(hertz.trunc() as i64)
    }

    /// Like [`Self::from_f64_truncated`] but `None` for values that are not finite or out of
    /// range
    pub fn checked_from_f64_truncated(hertz: f64) -> Option<Self>
    {
        if hertz.is_finite() && hertz.abs() < i64::MAX as f64 {
            Self::checked_from_whole(hertz.trunc() as i64)
        }
        else {
            None
        }
    }
}

macro_rules! view
{
    ( $u:expr ) => {
        $u.display::<$crate::units::Base>()
    };
    ( $u:expr, $prefix:ident ) => {
        $u.display::<$crate::units::$prefix>()
    };
}

macro_rules! view_anon
{
    ( $u:expr ) => {
        $u.display_anon_base()
    };
}
