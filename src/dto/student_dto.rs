use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePicturePayload {
    pub profile_image_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegnoQuery<'a> {
    pub regno: &'a str,
}
