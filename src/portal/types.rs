use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Profile shown after login; every field is `None` when the page could not be read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: Option<String>,
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub school: Option<String>,
    pub birth_year: Option<String>,
}

/// A course the account is enrolled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub cid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Completion percentage as reported by the portal
    #[serde(default)]
    pub per: i64,
}

/// A unit (lesson group) of a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub unitname: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub visible: String,
}

/// Identifiers of the course last opened, needed by study requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseContext {
    pub cid: String,
    pub uid: String,
    pub classid: String,
}

/// Units of a course together with the identifiers scraped alongside them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseUnits {
    pub context: CourseContext,
    pub units: Vec<UnitInfo>,
}

/// Accept strings, numbers and booleans where the portal is inconsistent
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
