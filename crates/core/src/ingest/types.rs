use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The full source document: one block per country.
///
/// Only the top level must be a JSON array. Anything malformed below that (a non-object block,
/// a `null` day, a float or string count) degrades to "absent" instead of failing the document,
/// so one bad country cannot hide the others.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RawCountryPayload {
    pub blocks: Vec<CountryBlock>,
}

impl<'de> Deserialize<'de> for RawCountryPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        let blocks = raw
            .into_iter()
            .map(|v| serde_json::from_value::<CountryBlock>(v).unwrap_or_default())
            .collect();
        Ok(Self { blocks })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryBlock {
    #[serde(default, deserialize_with = "lenient")]
    pub country: Option<CountryInfo>,
    #[serde(default, deserialize_with = "lenient_days")]
    pub dates: Option<BTreeMap<String, Option<DayEntry>>>,
}

impl CountryBlock {
    pub fn name(&self) -> &str {
        self.country
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub new: Option<Counts>,
    #[serde(default, deserialize_with = "lenient")]
    pub cumulative: Option<Counts>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counts {
    #[serde(default, deserialize_with = "lenient_count")]
    pub cases: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub deaths: Option<i64>,
}

/// One source day for one country, before date parsing and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRow {
    pub date: String,
    pub country: String,
    pub total_cases: i64,
    pub new_cases: i64,
    pub total_deaths: i64,
    pub new_deaths: i64,
}

// A value of the wrong shape becomes `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(v).ok())
}

fn lenient_days<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, Option<DayEntry>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(obj) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        obj.into_iter()
            .map(|(date, day)| (date, serde_json::from_value::<DayEntry>(day).ok()))
            .collect(),
    ))
}

/// Integers pass through. Finite floats are truncated and numeric strings are parsed.
/// Anything else is `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(count_from_value(&Value::deserialize(deserializer)?))
}

fn count_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_accept_floats_strings_and_garbage() {
        let c: Counts = serde_json::from_value(json!({"cases": 12.0, "deaths": "7"})).unwrap();
        assert_eq!(c.cases, Some(12));
        assert_eq!(c.deaths, Some(7));

        let c: Counts = serde_json::from_value(json!({"cases": null, "deaths": [1]})).unwrap();
        assert_eq!(c.cases, None);
        assert_eq!(c.deaths, None);

        let c: Counts = serde_json::from_value(json!({"cases": "n/a", "deaths": true})).unwrap();
        assert_eq!(c.cases, None);
        assert_eq!(c.deaths, None);
    }

    #[test]
    fn malformed_blocks_degrade_instead_of_failing_the_document() {
        let p: RawCountryPayload = serde_json::from_value(json!([
            null,
            42,
            {"country": "Brazil", "dates": ["2021-01-01"]},
            {
                "country": {"name": "Chile"},
                "dates": {"2021-01-01": null, "2021-01-02": "bad", "2021-01-03": {"new": 5}}
            }
        ]))
        .unwrap();

        assert_eq!(p.blocks.len(), 4);
        assert_eq!(p.blocks[0].name(), "");
        assert_eq!(p.blocks[2].name(), "");
        assert!(p.blocks[2].dates.is_none());

        let chile = p.blocks[3].dates.as_ref().unwrap();
        assert_eq!(chile.len(), 3);
        assert!(chile["2021-01-01"].is_none());
        assert!(chile["2021-01-02"].is_none());
        assert!(chile["2021-01-03"].as_ref().unwrap().new.is_none());
    }

    #[test]
    fn top_level_must_still_be_a_list() {
        assert!(serde_json::from_value::<RawCountryPayload>(json!({"not": "a list"})).is_err());
    }
}
