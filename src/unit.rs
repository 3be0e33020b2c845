//! # Unit
//!
//! The closed set of units CloudWatch accepts for a metric, and the normalization of
//! caller supplied units into it
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/APIReference/API_MetricDatum.html>

use super::Error;
use std::borrow::Cow;
use std::fmt;

/// A CloudWatch metric unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricUnit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    BytesPerSecond,
    KilobytesPerSecond,
    MegabytesPerSecond,
    GigabytesPerSecond,
    TerabytesPerSecond,
    BitsPerSecond,
    KilobitsPerSecond,
    MegabitsPerSecond,
    GigabitsPerSecond,
    TerabitsPerSecond,
    CountPerSecond,
    None,
}

impl MetricUnit {
    pub const ALL: [MetricUnit; 27] = [
        MetricUnit::Seconds,
        MetricUnit::Microseconds,
        MetricUnit::Milliseconds,
        MetricUnit::Bytes,
        MetricUnit::Kilobytes,
        MetricUnit::Megabytes,
        MetricUnit::Gigabytes,
        MetricUnit::Terabytes,
        MetricUnit::Bits,
        MetricUnit::Kilobits,
        MetricUnit::Megabits,
        MetricUnit::Gigabits,
        MetricUnit::Terabits,
        MetricUnit::Percent,
        MetricUnit::Count,
        MetricUnit::BytesPerSecond,
        MetricUnit::KilobytesPerSecond,
        MetricUnit::MegabytesPerSecond,
        MetricUnit::GigabytesPerSecond,
        MetricUnit::TerabytesPerSecond,
        MetricUnit::BitsPerSecond,
        MetricUnit::KilobitsPerSecond,
        MetricUnit::MegabitsPerSecond,
        MetricUnit::GigabitsPerSecond,
        MetricUnit::TerabitsPerSecond,
        MetricUnit::CountPerSecond,
        MetricUnit::None,
    ];

    /// The canonical string written into the `Unit` member of a metric descriptor
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Seconds => "Seconds",
            MetricUnit::Microseconds => "Microseconds",
            MetricUnit::Milliseconds => "Milliseconds",
            MetricUnit::Bytes => "Bytes",
            MetricUnit::Kilobytes => "Kilobytes",
            MetricUnit::Megabytes => "Megabytes",
            MetricUnit::Gigabytes => "Gigabytes",
            MetricUnit::Terabytes => "Terabytes",
            MetricUnit::Bits => "Bits",
            MetricUnit::Kilobits => "Kilobits",
            MetricUnit::Megabits => "Megabits",
            MetricUnit::Gigabits => "Gigabits",
            MetricUnit::Terabits => "Terabits",
            MetricUnit::Percent => "Percent",
            MetricUnit::Count => "Count",
            MetricUnit::BytesPerSecond => "Bytes/Second",
            MetricUnit::KilobytesPerSecond => "Kilobytes/Second",
            MetricUnit::MegabytesPerSecond => "Megabytes/Second",
            MetricUnit::GigabytesPerSecond => "Gigabytes/Second",
            MetricUnit::TerabytesPerSecond => "Terabytes/Second",
            MetricUnit::BitsPerSecond => "Bits/Second",
            MetricUnit::KilobitsPerSecond => "Kilobits/Second",
            MetricUnit::MegabitsPerSecond => "Megabits/Second",
            MetricUnit::GigabitsPerSecond => "Gigabits/Second",
            MetricUnit::TerabitsPerSecond => "Terabits/Second",
            MetricUnit::CountPerSecond => "Count/Second",
            MetricUnit::None => "None",
        }
    }

    /// The symbolic name of the unit, accepted as an alias by [normalize]
    pub fn alias(&self) -> &'static str {
        match self {
            MetricUnit::Seconds => "Seconds",
            MetricUnit::Microseconds => "Microseconds",
            MetricUnit::Milliseconds => "Milliseconds",
            MetricUnit::Bytes => "Bytes",
            MetricUnit::Kilobytes => "Kilobytes",
            MetricUnit::Megabytes => "Megabytes",
            MetricUnit::Gigabytes => "Gigabytes",
            MetricUnit::Terabytes => "Terabytes",
            MetricUnit::Bits => "Bits",
            MetricUnit::Kilobits => "Kilobits",
            MetricUnit::Megabits => "Megabits",
            MetricUnit::Gigabits => "Gigabits",
            MetricUnit::Terabits => "Terabits",
            MetricUnit::Percent => "Percent",
            MetricUnit::Count => "Count",
            MetricUnit::BytesPerSecond => "BytesPerSecond",
            MetricUnit::KilobytesPerSecond => "KilobytesPerSecond",
            MetricUnit::MegabytesPerSecond => "MegabytesPerSecond",
            MetricUnit::GigabytesPerSecond => "GigabytesPerSecond",
            MetricUnit::TerabytesPerSecond => "TerabytesPerSecond",
            MetricUnit::BitsPerSecond => "BitsPerSecond",
            MetricUnit::KilobitsPerSecond => "KilobitsPerSecond",
            MetricUnit::MegabitsPerSecond => "MegabitsPerSecond",
            MetricUnit::GigabitsPerSecond => "GigabitsPerSecond",
            MetricUnit::TerabitsPerSecond => "TerabitsPerSecond",
            MetricUnit::CountPerSecond => "CountPerSecond",
            MetricUnit::None => "None",
        }
    }

    fn from_alias(alias: &str) -> Option<Self> {
        let unit = match alias {
            "Seconds" => MetricUnit::Seconds,
            "Microseconds" => MetricUnit::Microseconds,
            "Milliseconds" => MetricUnit::Milliseconds,
            "Bytes" => MetricUnit::Bytes,
            "Kilobytes" => MetricUnit::Kilobytes,
            "Megabytes" => MetricUnit::Megabytes,
            "Gigabytes" => MetricUnit::Gigabytes,
            "Terabytes" => MetricUnit::Terabytes,
            "Bits" => MetricUnit::Bits,
            "Kilobits" => MetricUnit::Kilobits,
            "Megabits" => MetricUnit::Megabits,
            "Gigabits" => MetricUnit::Gigabits,
            "Terabits" => MetricUnit::Terabits,
            "Percent" => MetricUnit::Percent,
            "Count" => MetricUnit::Count,
            "BytesPerSecond" => MetricUnit::BytesPerSecond,
            "KilobytesPerSecond" => MetricUnit::KilobytesPerSecond,
            "MegabytesPerSecond" => MetricUnit::MegabytesPerSecond,
            "GigabytesPerSecond" => MetricUnit::GigabytesPerSecond,
            "TerabytesPerSecond" => MetricUnit::TerabytesPerSecond,
            "BitsPerSecond" => MetricUnit::BitsPerSecond,
            "KilobitsPerSecond" => MetricUnit::KilobitsPerSecond,
            "MegabitsPerSecond" => MetricUnit::MegabitsPerSecond,
            "GigabitsPerSecond" => MetricUnit::GigabitsPerSecond,
            "TerabitsPerSecond" => MetricUnit::TerabitsPerSecond,
            "CountPerSecond" => MetricUnit::CountPerSecond,
            "None" => MetricUnit::None,
            _ => return None,
        };
        Some(unit)
    }

    fn from_canonical(canonical: &str) -> Option<Self> {
        // Only the rate units differ from their alias
        let unit = match canonical {
            "Bytes/Second" => MetricUnit::BytesPerSecond,
            "Kilobytes/Second" => MetricUnit::KilobytesPerSecond,
            "Megabytes/Second" => MetricUnit::MegabytesPerSecond,
            "Gigabytes/Second" => MetricUnit::GigabytesPerSecond,
            "Terabytes/Second" => MetricUnit::TerabytesPerSecond,
            "Bits/Second" => MetricUnit::BitsPerSecond,
            "Kilobits/Second" => MetricUnit::KilobitsPerSecond,
            "Megabits/Second" => MetricUnit::MegabitsPerSecond,
            "Gigabits/Second" => MetricUnit::GigabitsPerSecond,
            "Terabits/Second" => MetricUnit::TerabitsPerSecond,
            "Count/Second" => MetricUnit::CountPerSecond,
            other => return Self::from_alias(other),
        };
        Some(unit)
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit as handed to [Collector::add_metric](super::Collector::add_metric), either already
/// typed or still raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitInput<'a> {
    Unit(MetricUnit),
    Text(Cow<'a, str>),
}

impl From<MetricUnit> for UnitInput<'_> {
    fn from(unit: MetricUnit) -> Self {
        UnitInput::Unit(unit)
    }
}

impl<'a> From<&'a str> for UnitInput<'a> {
    fn from(text: &'a str) -> Self {
        UnitInput::Text(Cow::Borrowed(text))
    }
}

impl<'a> From<&'a String> for UnitInput<'a> {
    fn from(text: &'a String) -> Self {
        UnitInput::Text(Cow::Borrowed(text))
    }
}

impl From<String> for UnitInput<'_> {
    fn from(text: String) -> Self {
        UnitInput::Text(Cow::Owned(text))
    }
}

/// Convert a metrics::Unit into the matching CloudWatch unit
///
/// CloudWatch has no nanosecond unit, that one is kept as text and rejected by [normalize]
impl From<metrics::Unit> for UnitInput<'_> {
    fn from(unit: metrics::Unit) -> Self {
        let unit = match unit {
            metrics::Unit::Count => MetricUnit::Count,
            metrics::Unit::Percent => MetricUnit::Percent,
            metrics::Unit::Seconds => MetricUnit::Seconds,
            metrics::Unit::Milliseconds => MetricUnit::Milliseconds,
            metrics::Unit::Microseconds => MetricUnit::Microseconds,
            metrics::Unit::Nanoseconds => return UnitInput::Text(Cow::Borrowed(unit.as_str())),
            metrics::Unit::Tebibytes => MetricUnit::Terabytes,
            metrics::Unit::Gibibytes => MetricUnit::Gigabytes,
            metrics::Unit::Mebibytes => MetricUnit::Megabytes,
            metrics::Unit::Kibibytes => MetricUnit::Kilobytes,
            metrics::Unit::Bytes => MetricUnit::Bytes,
            metrics::Unit::TerabitsPerSecond => MetricUnit::TerabitsPerSecond,
            metrics::Unit::GigabitsPerSecond => MetricUnit::GigabitsPerSecond,
            metrics::Unit::MegabitsPerSecond => MetricUnit::MegabitsPerSecond,
            metrics::Unit::KilobitsPerSecond => MetricUnit::KilobitsPerSecond,
            metrics::Unit::BitsPerSecond => MetricUnit::BitsPerSecond,
            metrics::Unit::CountPerSecond => MetricUnit::CountPerSecond,
        };
        UnitInput::Unit(unit)
    }
}

/// Resolve a unit input into the catalog
///
/// Typed units pass through, text is looked up first as an alias and then as a canonical
/// string. Anything else is [Error::InvalidUnit].
pub fn normalize<'a>(input: impl Into<UnitInput<'a>>) -> Result<MetricUnit, Error> {
    match input.into() {
        UnitInput::Unit(unit) => Ok(unit),
        UnitInput::Text(text) => MetricUnit::from_alias(&text)
            .or_else(|| MetricUnit::from_canonical(&text))
            .ok_or_else(|| Error::InvalidUnit {
                unit: text.into_owned(),
                expected: MetricUnit::ALL.iter().map(MetricUnit::alias).collect(),
            }),
    }
}
