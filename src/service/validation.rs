//! Member request body and its validation rules.

use crate::error::AppError;
use crate::media::UPLOADS_PREFIX;
use regex::Regex;
use serde::Deserialize;

const INLINE_IMAGE_PATTERN: &str = r"^data:image/(png|jpe?g|gif|webp);base64,[A-Za-z0-9+/=\r\n]+$";
const REMOTE_IMAGE_PATTERN: &str = r"^https?://[^\s]+$";

/// Body of create and update requests. Every field is optional at the wire level; the rules
/// for which combinations are accepted live in the methods below.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MemberInput {
    #[serde(default)]
    pub poste: Option<String>,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub fonction: Option<String>,
    /// Inline image: a base64 data URL or an absolute http(s) URL.
    #[serde(default)]
    pub photo: Option<String>,
    /// Path of a file already stored through the upload endpoint.
    #[serde(default)]
    pub photo_path: Option<String>,
    #[serde(default, alias = "rank")]
    pub ordre: Option<i64>,
}

/// The three fields that identify a member on the board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub poste: String,
    pub nom: String,
    pub fonction: String,
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl MemberInput {
    /// Parse a JSON body. Type mismatches are reported as validation errors.
    pub fn from_json(body: serde_json::Value) -> Result<Self, AppError> {
        if !body.is_object() {
            return Err(AppError::BadRequest("body must be a JSON object".into()));
        }
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))
    }

    /// Create: poste, nom and fonction must all be non-empty.
    pub fn required_identity(&self) -> Result<Identity, AppError> {
        match (present(&self.poste), present(&self.nom), present(&self.fonction)) {
            (Some(poste), Some(nom), Some(fonction)) => Ok(Identity {
                poste: poste.to_string(),
                nom: nom.to_string(),
                fonction: fonction.to_string(),
            }),
            _ => Err(AppError::Validation("poste, nom and fonction are required".into())),
        }
    }

    /// Update: the identity fields travel together or not at all. Empty strings count as absent.
    pub fn identity_update(&self) -> Result<Option<Identity>, AppError> {
        let any = present(&self.poste).is_some() || present(&self.nom).is_some() || present(&self.fonction).is_some();
        if !any {
            return Ok(None);
        }
        self.required_identity()
            .map(Some)
            .map_err(|_| AppError::Validation("poste, nom and fonction must be provided together".into()))
    }

    /// Resolve the photo reference to store, if one was supplied.
    pub fn photo_reference(&self) -> Result<Option<String>, AppError> {
        match (present(&self.photo), present(&self.photo_path)) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "photo and photo_path are mutually exclusive".into(),
            )),
            (Some(inline), None) => validate_inline_photo(inline).map(Some),
            (None, Some(path)) => validate_stored_path(path).map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Requested rank, if any. Negative values mean "unranked".
    pub fn requested_rank(&self) -> Result<Option<i32>, AppError> {
        self.ordre
            .map(|r| {
                i32::try_from(r)
                    .map(|r| r.max(0))
                    .map_err(|_| AppError::Validation(format!("ordre out of range: {}", r)))
            })
            .transpose()
    }
}

fn validate_inline_photo(v: &str) -> Result<String, AppError> {
    for pattern in [INLINE_IMAGE_PATTERN, REMOTE_IMAGE_PATTERN] {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation("invalid photo pattern".into()))?;
        if re.is_match(v) {
            return Ok(v.to_string());
        }
    }
    Err(AppError::Validation(
        "photo must be a base64 image data URL or an http(s) URL".into(),
    ))
}

fn validate_stored_path(v: &str) -> Result<String, AppError> {
    let name = v.strip_prefix(UPLOADS_PREFIX).unwrap_or("");
    if name.is_empty() || name.contains('/') || name.contains("..") {
        return Err(AppError::Validation(format!(
            "photo_path must be a file under {}",
            UPLOADS_PREFIX
        )));
    }
    Ok(v.to_string())
}
