//! Physical quantities and their canonical units.
//!
//! Every [`Unit`] belongs to one [`Dimension`] and converts to that
//! dimension's canonical unit (meter, second, meter per second, or a plain
//! count) through a fixed multiplicative factor.

use std::fmt;

/// The physical dimension a unit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Length,
    Time,
    Speed,
    Count,
}

impl Dimension {
    /// Returns the symbol of the canonical unit for this dimension.
    pub fn canonical_symbol(self) -> &'static str {
        match self {
            Self::Length => "m",
            Self::Time => "s",
            Self::Speed => "m/s",
            Self::Count => "",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Length => "length",
            Self::Time => "time",
            Self::Speed => "speed",
            Self::Count => "count",
        };
        write!(f, "{name}")
    }
}

/// A unit of measurement recognized in extracted property text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Millimeter,
    Centimeter,
    Meter,
    Kilometer,
    Millisecond,
    Second,
    Minute,
    Hour,
    MillimeterPerSecond,
    CentimeterPerSecond,
    MeterPerSecond,
    MeterPerMinute,
    KilometerPerHour,
    /// No unit was written; the value is read in the canonical unit of
    /// whatever dimension the consumer expects.
    Unitless,
}

impl Unit {
    /// Resolves a unit from its textual symbol.
    ///
    /// Matching is case-insensitive and accepts the common spelled-out
    /// forms (`sec`, `seconds`, `min`, `meters`, ...).
    ///
    /// # Examples
    ///
    /// ```
    /// # use floorplan_core::units::Unit;
    /// assert_eq!(Unit::from_symbol("m/s"), Some(Unit::MeterPerSecond));
    /// assert_eq!(Unit::from_symbol("Sec"), Some(Unit::Second));
    /// assert_eq!(Unit::from_symbol("furlong"), None);
    /// ```
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let unit = match symbol.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Self::Millimeter,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Self::Centimeter,
            "m" | "meter" | "meters" | "metre" | "metres" => Self::Meter,
            "km" | "kilometer" | "kilometers" => Self::Kilometer,
            "ms" | "millisecond" | "milliseconds" => Self::Millisecond,
            "s" | "sec" | "secs" | "second" | "seconds" => Self::Second,
            "min" | "mins" | "minute" | "minutes" => Self::Minute,
            "h" | "hr" | "hrs" | "hour" | "hours" => Self::Hour,
            "mm/s" => Self::MillimeterPerSecond,
            "cm/s" => Self::CentimeterPerSecond,
            "m/s" | "mps" | "m/sec" => Self::MeterPerSecond,
            "m/min" => Self::MeterPerMinute,
            "km/h" | "kph" => Self::KilometerPerHour,
            "" => Self::Unitless,
            _ => return None,
        };
        Some(unit)
    }

    /// Returns the dimension this unit measures.
    ///
    /// [`Unit::Unitless`] reports [`Dimension::Count`].
    pub fn dimension(self) -> Dimension {
        match self {
            Self::Millimeter | Self::Centimeter | Self::Meter | Self::Kilometer => {
                Dimension::Length
            }
            Self::Millisecond | Self::Second | Self::Minute | Self::Hour => Dimension::Time,
            Self::MillimeterPerSecond
            | Self::CentimeterPerSecond
            | Self::MeterPerSecond
            | Self::MeterPerMinute
            | Self::KilometerPerHour => Dimension::Speed,
            Self::Unitless => Dimension::Count,
        }
    }

    /// Returns the factor converting a value in this unit to the canonical unit.
    pub fn factor(self) -> f64 {
        match self {
            Self::Millimeter => 0.001,
            Self::Centimeter => 0.01,
            Self::Meter => 1.0,
            Self::Kilometer => 1000.0,
            Self::Millisecond => 0.001,
            Self::Second => 1.0,
            Self::Minute => 60.0,
            Self::Hour => 3600.0,
            Self::MillimeterPerSecond => 0.001,
            Self::CentimeterPerSecond => 0.01,
            Self::MeterPerSecond => 1.0,
            Self::MeterPerMinute => 1.0 / 60.0,
            Self::KilometerPerHour => 1000.0 / 3600.0,
            Self::Unitless => 1.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Millimeter => "mm",
            Self::Centimeter => "cm",
            Self::Meter => "m",
            Self::Kilometer => "km",
            Self::Millisecond => "ms",
            Self::Second => "s",
            Self::Minute => "min",
            Self::Hour => "h",
            Self::MillimeterPerSecond => "mm/s",
            Self::CentimeterPerSecond => "cm/s",
            Self::MeterPerSecond => "m/s",
            Self::MeterPerMinute => "m/min",
            Self::KilometerPerHour => "km/h",
            Self::Unitless => "",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A measured value together with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Returns the value as written, in [`Quantity::unit`].
    pub fn value(self) -> f64 {
        self.value
    }

    pub fn unit(self) -> Unit {
        self.unit
    }

    pub fn dimension(self) -> Dimension {
        self.unit.dimension()
    }

    /// Returns the value converted to the canonical unit of its dimension.
    ///
    /// # Examples
    ///
    /// ```
    /// # use floorplan_core::units::{Quantity, Unit};
    /// let q = Quantity::new(2.0, Unit::Minute);
    /// assert_eq!(q.to_canonical(), 120.0);
    /// ```
    pub fn to_canonical(self) -> f64 {
        self.value * self.unit.factor()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::Unitless => write!(f, "{}", self.value),
            unit => write!(f, "{} {}", self.value, unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_from_symbol_aliases() {
        assert_eq!(Unit::from_symbol("sec"), Some(Unit::Second));
        assert_eq!(Unit::from_symbol("SECONDS"), Some(Unit::Second));
        assert_eq!(Unit::from_symbol("mins"), Some(Unit::Minute));
        assert_eq!(Unit::from_symbol("metres"), Some(Unit::Meter));
        assert_eq!(Unit::from_symbol("mm/s"), Some(Unit::MillimeterPerSecond));
        assert_eq!(Unit::from_symbol(""), Some(Unit::Unitless));
        assert_eq!(Unit::from_symbol("parsec"), None);
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(Unit::Centimeter.dimension(), Dimension::Length);
        assert_eq!(Unit::Hour.dimension(), Dimension::Time);
        assert_eq!(Unit::MeterPerMinute.dimension(), Dimension::Speed);
        assert_eq!(Unit::Unitless.dimension(), Dimension::Count);
    }

    #[test]
    fn test_to_canonical() {
        assert!(approx_eq!(
            f64,
            Quantity::new(120.0, Unit::Millimeter).to_canonical(),
            0.12,
            epsilon = 1e-12
        ));
        assert!(approx_eq!(
            f64,
            Quantity::new(2.0, Unit::Minute).to_canonical(),
            120.0
        ));
        assert!(approx_eq!(
            f64,
            Quantity::new(36.0, Unit::KilometerPerHour).to_canonical(),
            10.0,
            epsilon = 1e-9
        ));
        assert!(approx_eq!(
            f64,
            Quantity::new(3.0, Unit::Unitless).to_canonical(),
            3.0
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::new(2.5, Unit::Meter).to_string(), "2.5 m");
        assert_eq!(Quantity::new(3.0, Unit::Unitless).to_string(), "3");
        assert_eq!(Dimension::Speed.to_string(), "speed");
    }
}
