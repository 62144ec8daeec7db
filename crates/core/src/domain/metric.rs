use crate::error::EtlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The count columns of `daily_cases` that queries may aggregate over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalCases,
    NewCases,
    TotalDeaths,
    NewDeaths,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::TotalCases,
        Metric::NewCases,
        Metric::TotalDeaths,
        Metric::NewDeaths,
    ];

    /// Column name in `daily_cases`. Only these literals are ever interpolated into SQL.
    pub fn column(self) -> &'static str {
        match self {
            Metric::TotalCases => "total_cases",
            Metric::NewCases => "new_cases",
            Metric::TotalDeaths => "total_deaths",
            Metric::NewDeaths => "new_deaths",
        }
    }

    /// Column name with the first letter upper-cased, for report headers.
    pub fn label(self) -> String {
        let col = self.column();
        let mut chars = col.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.column() == wanted)
            .ok_or_else(|| {
                EtlError::validation(format!(
                    "unknown metric {wanted:?} (expected one of total_cases, new_cases, total_deaths, new_deaths)"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_column_name() {
        for m in Metric::ALL {
            assert_eq!(m.column().parse::<Metric>().unwrap(), m);
        }
    }

    #[test]
    fn rejects_unknown_metric_as_validation_error() {
        let err = "recovered".parse::<Metric>().unwrap_err();
        assert!(err.is_validation());

        // Column names are matched exactly; no SQL fragments get through.
        assert!("new_cases; DROP TABLE daily_cases".parse::<Metric>().is_err());
        assert!("NEW_CASES".parse::<Metric>().is_err());
    }

    #[test]
    fn label_capitalizes_first_letter_only() {
        assert_eq!(Metric::NewCases.label(), "New_cases");
        assert_eq!(Metric::TotalDeaths.label(), "Total_deaths");
    }
}
