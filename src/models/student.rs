use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::flexible::deserialize_opt_u32_flexible;

/// A student as listed in the staff roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default, rename = "studentId", alias = "student_id", alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub regno: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "department")]
    pub dept: Option<String>,
    #[serde(default, rename = "collegename", alias = "college_name")]
    pub college: Option<String>,
    #[serde(default, deserialize_with = "deserialize_year")]
    pub year: Option<String>,
    #[serde(default, rename = "profileImage")]
    pub profile_image: Option<String>,
}

// Years come back as "III", "3" or 3 depending on who imported the student.
fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Num(u64),
        Text(String),
    }

    Ok(match Option::<Year>::deserialize(deserializer)? {
        None => None,
        Some(Year::Num(n)) => Some(n.to_string()),
        Some(Year::Text(s)) if s.trim().is_empty() => None,
        Some(Year::Text(s)) => Some(s.trim().to_string()),
    })
}

/// Body of `GET /studentprofile/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterResponse {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub staff_role: Option<String>,
    #[serde(default, deserialize_with = "deserialize_departments")]
    pub staff_department: Vec<String>,
    #[serde(default)]
    pub staff_college: Option<String>,
}

fn deserialize_departments<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Departments {
        Many(Vec<String>),
        One(String),
    }

    Ok(match Option::<Departments>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Departments::Many(v)) => v,
        Some(Departments::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(Departments::One(s)) => vec![s],
    })
}

/// Body of `GET /students/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentStats {
    #[serde(default, deserialize_with = "deserialize_opt_u32_flexible")]
    pub total_students: Option<u32>,
}
