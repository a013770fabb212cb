//! Measured-value text such as `2.5m`, `8 sec` or `1,5 m/s`.

use thiserror::Error;
use winnow::{
    Parser as _,
    ascii::{digit1, multispace0},
    combinator::{opt, preceded},
    error::ModalResult,
    token::{one_of, take_while},
};

use floorplan_core::units::{Quantity, Unit};

/// Errors produced while reading a measured value.
///
/// Offsets are byte offsets into the original text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty value")]
    Empty,

    #[error("expected a number at offset {offset}")]
    InvalidNumber { offset: usize },

    #[error("unknown unit `{unit}` at offset {offset}")]
    UnknownUnit { unit: String, offset: usize },

    #[error("unexpected trailing text at offset {offset}")]
    TrailingInput { offset: usize },
}

/// Signed decimal number; both `.` and `,` are accepted as decimal separator.
fn number(input: &mut &str) -> ModalResult<f64> {
    preceded(
        multispace0,
        (
            opt(one_of(['+', '-'])),
            digit1,
            opt((one_of(['.', ',']), digit1)),
        )
            .take()
            .try_map(|text: &str| text.replace(',', ".").parse::<f64>()),
    )
    .parse_next(input)
}

fn unit_symbol<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(
        multispace0,
        take_while(0.., |c: char| c.is_alphabetic() || c == '/'),
    )
    .parse_next(input)
}

/// Parses a measured value with an optional unit.
///
/// # Examples
///
/// ```
/// # use floorplan_parser::parse_quantity;
/// # use floorplan_core::units::Unit;
/// let speed = parse_quantity("1,5 m/s").unwrap();
/// assert_eq!(speed.value(), 1.5);
/// assert_eq!(speed.unit(), Unit::MeterPerSecond);
///
/// let count = parse_quantity("3").unwrap();
/// assert_eq!(count.unit(), Unit::Unitless);
/// ```
pub fn parse_quantity(text: &str) -> Result<Quantity, QuantityError> {
    if text.trim().is_empty() {
        return Err(QuantityError::Empty);
    }
    let offset_of = |rest: &str| text.len() - rest.len();

    let mut input = text;
    let value = number.parse_next(&mut input).map_err(|_| QuantityError::InvalidNumber {
        offset: text.len() - text.trim_start().len(),
    })?;

    let unit_offset = offset_of(input.trim_start());
    let symbol = unit_symbol
        .parse_next(&mut input)
        .map_err(|_| QuantityError::TrailingInput {
            offset: unit_offset,
        })?;

    let rest = input.trim_start();
    if !rest.is_empty() {
        return Err(QuantityError::TrailingInput {
            offset: offset_of(rest),
        });
    }

    let unit = Unit::from_symbol(symbol).ok_or_else(|| QuantityError::UnknownUnit {
        unit: symbol.to_string(),
        offset: unit_offset,
    })?;

    Ok(Quantity::new(value, unit))
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn integer_meters_round_trip(value in 0u32..1_000_000, spaces in 0usize..3) {
            let text = format!("{value}{}m", " ".repeat(spaces));
            let q = parse_quantity(&text).unwrap();
            prop_assert!(approx_eq!(f64, q.value(), f64::from(value)));
            prop_assert_eq!(q.unit(), Unit::Meter);
        }

        #[test]
        fn decimal_comma_matches_point(whole in 0u32..10_000, frac in 0u32..1000) {
            let with_point = parse_quantity(&format!("{whole}.{frac} s")).unwrap();
            let with_comma = parse_quantity(&format!("{whole},{frac} s")).unwrap();
            prop_assert!(approx_eq!(f64, with_point.value(), with_comma.value()));
        }

        #[test]
        fn never_panics(text in "\\PC{0,24}") {
            let _ = parse_quantity(&text);
        }
    }
}
