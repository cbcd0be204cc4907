use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

/// Stored in place of a letter while a student has no grade in a class.
pub const UNGRADED: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LetterGrade {
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    DMinus,
    E,
}

use LetterGrade::*;

/// Lower bounds (inclusive) on the class percentage, highest first. Anything below the last
/// bound is an E.
const PERCENTAGE_THRESHOLDS: [(f64, LetterGrade); 11] = [
    (93.0, A),
    (90.0, AMinus),
    (87.0, BPlus),
    (83.0, B),
    (80.0, BMinus),
    (77.0, CPlus),
    (73.0, C),
    (70.0, CMinus),
    (67.0, DPlus),
    (63.0, D),
    (60.0, DMinus),
];

static GRADE_POINTS: [(LetterGrade, &str, f64); 12] = [
    (A, "A", 4.0),
    (AMinus, "A-", 3.7),
    (BPlus, "B+", 3.3),
    (B, "B", 3.0),
    (BMinus, "B-", 2.7),
    (CPlus, "C+", 2.3),
    (C, "C", 2.0),
    (CMinus, "C-", 1.7),
    (DPlus, "D+", 1.3),
    (D, "D", 1.0),
    (DMinus, "D-", 0.7),
    (E, "E", 0.0),
];

impl LetterGrade {
    pub fn from_percentage(percentage: f64) -> Self {
        PERCENTAGE_THRESHOLDS
            .iter()
            .find(|(bound, _)| percentage >= *bound)
            .map(|(_, letter)| *letter)
            .unwrap_or(E)
    }

    pub fn grade_points(self) -> f64 {
        self.entry().2
    }

    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    fn entry(self) -> &'static (LetterGrade, &'static str, f64) {
        // Every variant has exactly one row.
        &GRADE_POINTS[self as usize]
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GRADE_POINTS
            .iter()
            .find(|(_, text, _)| *text == s)
            .map(|(letter, _, _)| *letter)
            .ok_or_else(|| format!("'{s}' is not a letter grade"))
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A student's standing in one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Ungraded,
    Letter(LetterGrade),
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Ungraded => f.write_str(UNGRADED),
            Grade::Letter(letter) => letter.fmt(f),
        }
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == UNGRADED {
            Ok(Grade::Ungraded)
        } else {
            s.parse().map(Grade::Letter)
        }
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
