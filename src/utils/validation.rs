use validator::{Validate, ValidationErrors};

pub fn validate<T: Validate>(val: &T) -> Result<(), ValidationErrors> {
    val.validate()
}

/// First message attached to any field, for a one-line notification.
pub fn first_message(errors: &ValidationErrors) -> Option<String> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .next()
}
