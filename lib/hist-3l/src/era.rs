use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// An unrecognized data-taking era.
#[derive(Debug, Snafu)]
#[snafu(display("Invalid era '{}': expected one of 2016, 2017 or 2018.", value))]
pub struct InvalidEra {
    value: String,
}

/// The data-taking period an analysis job runs over.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "RawEra", into = "String")]
pub enum Era {
    /// 2016 data-taking.
    Era2016,

    /// 2017 data-taking.
    Era2017,

    /// 2018 data-taking.
    Era2018,
}

impl Era {
    /// Returns the era as its year string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Era2016 => "2016",
            Self::Era2017 => "2017",
            Self::Era2018 => "2018",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Era {
    type Err = InvalidEra;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2016" => Ok(Self::Era2016),
            "2017" => Ok(Self::Era2017),
            "2018" => Ok(Self::Era2018),
            other => Err(InvalidEra {
                value: other.to_string(),
            }),
        }
    }
}

impl From<Era> for String {
    fn from(era: Era) -> Self {
        era.as_str().to_string()
    }
}

// Unquoted years in YAML, and years set through environment variables, arrive as integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEra {
    Year(i64),
    Text(String),
}

impl TryFrom<RawEra> for Era {
    type Error = InvalidEra;

    fn try_from(raw: RawEra) -> Result<Self, Self::Error> {
        match raw {
            RawEra::Year(year) => year.to_string().parse(),
            RawEra::Text(text) => text.parse(),
        }
    }
}
