//! Aggregation methods and their configuration aliases.

use std::fmt;

use confluence_core::ConfigError;

/// How a window of instantaneous values collapses into one aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregationMethod {
    /// Only the latest value in the window survives to emission.
    Point,
    /// Values are summed over the window.
    Sum,
    /// Values are summed and divided by the sample count at closure.
    Mean,
    /// The running minimum over the window.
    Minimum,
    /// The running maximum over the window.
    Maximum,
}

impl AggregationMethod {
    /// Every method, in the canonical order used by dump headers.
    pub const ALL: [AggregationMethod; 5] = [
        AggregationMethod::Point,
        AggregationMethod::Sum,
        AggregationMethod::Mean,
        AggregationMethod::Minimum,
        AggregationMethod::Maximum,
    ];

    /// Parse a configuration name, accepting the usual aliases
    /// (`average`, `cumulative`, `instantaneous`, `min`, `max`).
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "point" | "instantaneous" => Ok(Self::Point),
            "sum" | "cumulative" => Ok(Self::Sum),
            "mean" | "average" => Ok(Self::Mean),
            "min" | "minimum" => Ok(Self::Minimum),
            "max" | "maximum" => Ok(Self::Maximum),
            _ => Err(ConfigError::UnknownMethod { name: name.into() }),
        }
    }

    /// Canonical lowercase name, as used in file variables.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
        }
    }

    /// Stable single-byte tag used in dump file headers.
    pub fn code(self) -> u8 {
        match self {
            Self::Point => 0,
            Self::Sum => 1,
            Self::Mean => 2,
            Self::Minimum => 3,
            Self::Maximum => 4,
        }
    }

    /// Inverse of [`code()`](AggregationMethod::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Point),
            1 => Some(Self::Sum),
            2 => Some(Self::Mean),
            3 => Some(Self::Minimum),
            4 => Some(Self::Maximum),
            _ => None,
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical_methods() {
        assert_eq!(
            AggregationMethod::from_name("average").unwrap(),
            AggregationMethod::Mean
        );
        assert_eq!(
            AggregationMethod::from_name("cumulative").unwrap(),
            AggregationMethod::Sum
        );
        assert_eq!(
            AggregationMethod::from_name("instantaneous").unwrap(),
            AggregationMethod::Point
        );
        assert_eq!(
            AggregationMethod::from_name("min").unwrap(),
            AggregationMethod::Minimum
        );
        assert_eq!(
            AggregationMethod::from_name("max").unwrap(),
            AggregationMethod::Maximum
        );
    }

    #[test]
    fn unknown_method_rejected() {
        let err = AggregationMethod::from_name("median").unwrap_err();
        assert!(err.to_string().contains("median"));
    }

    #[test]
    fn code_round_trips() {
        for method in AggregationMethod::ALL {
            assert_eq!(AggregationMethod::from_code(method.code()), Some(method));
        }
        assert_eq!(AggregationMethod::from_code(5), None);
    }
}
