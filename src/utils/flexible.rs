//! Lenient deserializers for form-backed backend fields.
//!
//! The backend echoes form values back as they were typed, so numbers may
//! arrive as `"60"`, `60` or `""`, and flags as `true`, `"true"` or `1`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::utils::time::parse_portal_datetime;

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

pub fn deserialize_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Loose::Bool(b)) => Ok(b),
        Some(Loose::Int(i)) => Ok(i != 0),
        Some(Loose::Float(f)) => Ok(f != 0.0),
        Some(Loose::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("Invalid boolean string: {}", s))),
        },
    }
}

/// Empty strings and nulls become `None`; negative numbers are rejected.
pub fn deserialize_opt_u32_flexible<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Loose>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Loose::Bool(_)) => return Err(serde::de::Error::custom("expected a number, got a boolean")),
        Some(Loose::Int(i)) => i as f64,
        Some(Loose::Float(f)) => f,
        Some(Loose::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("Invalid number: {}", s)))?
        }
    };
    if value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!("Number out of range: {}", value)));
    }
    Ok(Some(value.trunc() as u32))
}

pub fn deserialize_u32_flexible<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_u32_flexible(deserializer)?.unwrap_or(0))
}

/// Tags arrive either as a list or as one comma separated string.
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Tags::List(list)) => list
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        Some(Tags::Joined(joined)) => split_tags(&joined),
    })
}

pub fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Accepts RFC 3339 and the zone-less `datetime-local` form format.
pub fn deserialize_opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_portal_datetime(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid date: {}", s))),
    }
}

/// `"Yes"` / `"No"` form selects.
pub mod yes_no {
    use super::*;

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "Yes" } else { "No" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_bool_flexible(deserializer)
    }
}
