use core::{cmp::Ordering, fmt};

use crate::error::{SchemeError, SchemeResult};


/// Numbers are exact integers, exact rationals or inexact reals.
///
/// A `Rational` is always normalized: positive denominator greater than one,
/// numerator and denominator coprime. Anything with denominator one is an
/// `Integer`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Integer(i64),
    Rational(i64, i64),
    Real(f64),
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

fn narrow(value: i128) -> SchemeResult<i64> {
    i64::try_from(value).map_err(|_| SchemeError::IntegerOverflow)
}

impl Number {
    pub(crate) fn rational(numerator: i128, denominator: i128) -> SchemeResult<Self> {
        if denominator == 0 { return Err(SchemeError::DivisionByZero); }

        let sign = if denominator < 0 { -1 } else { 1 };
        let divisor = gcd(numerator, denominator).max(1);
        let (numerator, denominator) = (sign * numerator / divisor, sign * denominator / divisor);

        if denominator == 1 { return Ok(Self::Integer(narrow(numerator)?)) }
        Ok(Self::Rational(narrow(numerator)?, narrow(denominator)?))
    }

    fn exact_parts(self) -> Option<(i128, i128)> {
        match self {
            Self::Integer(value) => Some((value as i128, 1)),
            Self::Rational(numerator, denominator) => Some((numerator as i128, denominator as i128)),
            Self::Real(_) => None,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Rational(numerator, denominator) => numerator as f64 / denominator as f64,
            Self::Real(value) => value,
        }
    }

    /// Inexact results that hold an integral value collapse back to integers.
    pub(crate) fn integral(self) -> Self {
        match self {
            Self::Real(value) if value.fract() == 0.0 && value.abs() < 9.0e15 => Self::Integer(value as i64),
            other => other,
        }
    }

    fn combine(
        self,
        other: Self,
        exact: impl Fn((i128, i128), (i128, i128)) -> (i128, i128),
        real: impl Fn(f64, f64) -> f64,
    ) -> SchemeResult<Self> {
        match (self.exact_parts(), other.exact_parts()) {
            (Some(a), Some(b)) => {
                let (numerator, denominator) = exact(a, b);
                Self::rational(numerator, denominator)
            }
            _ => Ok(Self::Real(real(self.to_f64(), other.to_f64())).integral()),
        }
    }

    pub fn add(self, other: Self) -> SchemeResult<Self> {
        self.combine(other, |(a, b), (c, d)| (a * d + c * b, b * d), |a, b| a + b)
    }

    pub fn sub(self, other: Self) -> SchemeResult<Self> {
        self.combine(other, |(a, b), (c, d)| (a * d - c * b, b * d), |a, b| a - b)
    }

    pub fn mul(self, other: Self) -> SchemeResult<Self> {
        self.combine(other, |(a, b), (c, d)| (a * c, b * d), |a, b| a * b)
    }

    /// Division always goes through reals, like the reference driver's `/`.
    pub fn div(self, other: Self) -> SchemeResult<Self> {
        if other.is_zero() { return Err(SchemeError::DivisionByZero); }
        Ok(Self::Real(self.to_f64() / other.to_f64()).integral())
    }

    pub fn negate(self) -> SchemeResult<Self> {
        Self::Integer(0).sub(self)
    }

    /// Floor division.
    pub fn quotient(self, other: Self) -> SchemeResult<Self> {
        if other.is_zero() { return Err(SchemeError::DivisionByZero); }
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => {
                let quotient = a.checked_div(b).ok_or(SchemeError::IntegerOverflow)?;
                let adjust = a % b != 0 && ((a < 0) != (b < 0));
                Ok(Self::Integer(if adjust { quotient - 1 } else { quotient }))
            }
            _ => Ok(Self::Real((self.to_f64() / other.to_f64()).floor())),
        }
    }

    /// Remainder carrying the sign of the divisor.
    pub fn modulo(self, other: Self) -> SchemeResult<Self> {
        if other.is_zero() { return Err(SchemeError::DivisionByZero); }
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => {
                let remainder = a.checked_rem(b).ok_or(SchemeError::IntegerOverflow)?;
                let adjust = remainder != 0 && ((remainder < 0) != (b < 0));
                Ok(Self::Integer(if adjust { remainder + b } else { remainder }))
            }
            _ => {
                let (a, b) = (self.to_f64(), other.to_f64());
                Ok(Self::Real(a - b * (a / b).floor()))
            }
        }
    }

    /// Remainder carrying the sign of the dividend.
    pub fn remainder(self, other: Self) -> SchemeResult<Self> {
        if other.is_zero() { return Err(SchemeError::DivisionByZero); }
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.checked_rem(b).map(Self::Integer).ok_or(SchemeError::IntegerOverflow),
            _ => Ok(Self::Real(self.to_f64() % other.to_f64())),
        }
    }

    pub fn floor(self) -> Self {
        match self {
            Self::Rational(numerator, denominator) => Self::Integer(numerator.div_euclid(denominator)),
            Self::Real(value) => Self::Real(value.floor()).integral(),
            integer => integer,
        }
    }

    pub fn ceiling(self) -> Self {
        match self {
            Self::Rational(numerator, denominator) => Self::Integer(numerator.div_euclid(denominator) + 1),
            Self::Real(value) => Self::Real(value.ceil()).integral(),
            integer => integer,
        }
    }

    pub fn compare(self, other: Self) -> Option<Ordering> {
        match (self.exact_parts(), other.exact_parts()) {
            (Some((a, b)), Some((c, d))) => Some((a * d).cmp(&(c * b))),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Self::Integer(value) => value == 0,
            Self::Rational(..) => false,
            Self::Real(value) => value == 0.0,
        }
    }

    pub fn is_integer(self) -> bool {
        match self {
            Self::Integer(_) => true,
            Self::Rational(..) => false,
            Self::Real(value) => value.is_finite() && value.fract() == 0.0,
        }
    }

    pub fn signum(self) -> Ordering {
        self.compare(Self::Integer(0)).unwrap_or(Ordering::Equal)
    }

    /// Reads a numeric literal: integers, `n/d` rationals and decimals with an
    /// optional exponent. Anything else is left to be read as a symbol.
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(integer) = text.parse::<i64>() {
            return Some(Self::Integer(integer));
        }

        if let Some((numerator, denominator)) = text.split_once('/') {
            let denominator_is_digits = !denominator.is_empty() && denominator.bytes().all(|b| b.is_ascii_digit());
            if !denominator_is_digits { return None; }
            let numerator: i128 = numerator.parse().ok()?;
            let denominator: i128 = denominator.parse().ok()?;
            return Self::rational(numerator, denominator).ok();
        }

        let first_is_numeric = text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
        let all_numeric = text.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
        let has_digit = text.chars().any(|c| c.is_ascii_digit());
        if !(first_is_numeric && all_numeric && has_digit) { return None; }

        text.parse::<f64>().ok().map(Self::Real)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(*other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Rational(numerator, denominator) => write!(f, "{}/{}", numerator, denominator),
            Self::Real(value) if value.is_nan() => write!(f, "nan"),
            Self::Real(value) if value.is_infinite() => write!(f, "{}inf", if value < 0.0 { "-" } else { "" }),
            Self::Real(value) if value != 0.0 && (value.abs() >= 1.0e16 || value.abs() < 1.0e-4) => write!(f, "{:e}", value),
            Self::Real(value) if value.fract() == 0.0 => write!(f, "{:.1}", value),
            Self::Real(value) => write!(f, "{}", value),
        }
    }
}
