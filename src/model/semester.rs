use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" => Ok(Season::Fall),
            "winter" => Ok(Season::Winter),
            other => Err(format!("unknown season '{other}'")),
        }
    }
}

// Accepts the same spellings as `FromStr`, so "fall" in a body or a path means Fall.
impl<'de> Deserialize<'de> for Season {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// An academic term, the (season, year) pair every offering is scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Semester {
    pub season: Season,
    pub year: i32,
}

impl Semester {
    pub fn new(season: Season, year: i32) -> Self {
        Self { season, year }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_parsing_ignores_case() {
        assert_eq!("fall".parse::<Season>(), Ok(Season::Fall));
        assert_eq!(" Spring ".parse::<Season>(), Ok(Season::Spring));
        assert!("autumn".parse::<Season>().is_err());
    }

    #[test]
    fn season_deserializes_like_it_parses() {
        let season: Season = serde_json::from_str(r#""fall""#).unwrap();
        assert_eq!(season, Season::Fall);
        let semester: Semester =
            serde_json::from_str(r#"{ "season": "WINTER", "year": 2025 }"#).unwrap();
        assert_eq!(semester, Semester::new(Season::Winter, 2025));
        assert!(serde_json::from_str::<Season>(r#""Autumn""#).is_err());
    }
}
