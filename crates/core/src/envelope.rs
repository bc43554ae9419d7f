//! Typed metadata envelopes sent alongside a package.
//!
//! A first publish and an update carry different fields: the owning user
//! and language section are fixed once a template is published, so the
//! update envelope has no slot for them. Both are validated when built.

use serde::Serialize;

use crate::error::CoreError;
use crate::template::Template;
use crate::version::TemplateVersion;

/// Metadata for a first publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateEnvelope {
    pub user_uid: String,
    pub title: String,
    pub language_section_uid: String,
    pub version: TemplateVersion,
    pub duration: f64,
    pub tags: Vec<String>,
}

/// Metadata for an update of an already-published template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEnvelope {
    pub cloud_uid: String,
    pub title: String,
    pub version: TemplateVersion,
    pub duration: f64,
    pub tags: Vec<String>,
}

/// Either envelope, serialized as the `metadata` multipart part.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataEnvelope {
    Create(CreateEnvelope),
    Update(UpdateEnvelope),
}

impl CreateEnvelope {
    pub fn from_template(
        template: &Template,
        user_uid: &str,
        language_section_uid: &str,
    ) -> Result<Self, CoreError> {
        require_non_empty("user_uid", user_uid)?;
        require_non_empty("language_section_uid", language_section_uid)?;
        require_non_empty("title", &template.title)?;
        validate_duration(template.duration_secs)?;

        Ok(Self {
            user_uid: user_uid.to_string(),
            title: template.title.trim().to_string(),
            language_section_uid: language_section_uid.to_string(),
            version: template.version.clone(),
            duration: template.duration_secs,
            tags: clean_tags(&template.tags),
        })
    }
}

impl UpdateEnvelope {
    pub fn from_template(template: &Template) -> Result<Self, CoreError> {
        let cloud_uid = template
            .cloud_uid
            .as_deref()
            .ok_or_else(|| CoreError::Validation("Template has no cloud_uid".into()))?;
        require_non_empty("cloud_uid", cloud_uid)?;
        require_non_empty("title", &template.title)?;
        validate_duration(template.duration_secs)?;

        Ok(Self {
            cloud_uid: cloud_uid.to_string(),
            title: template.title.trim().to_string(),
            version: template.version.clone(),
            duration: template.duration_secs,
            tags: clean_tags(&template.tags),
        })
    }
}

impl MetadataEnvelope {
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_duration(duration: f64) -> Result<(), CoreError> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(CoreError::Validation(format!(
            "duration must be a non-negative number, got {duration}"
        )));
    }
    Ok(())
}

/// Trim tags and drop empty ones.
fn clean_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn template() -> Template {
        let mut t = Template::new(" Warmup ", 10.0, TemplateVersion::new(1, 1), Utc::now());
        t.tags = vec!["vocal".into(), "  ".into(), " breath ".into()];
        t
    }

    #[test]
    fn create_envelope_fields() {
        let env = CreateEnvelope::from_template(&template(), "user-1", "section-en").unwrap();
        let json = serde_json::to_value(MetadataEnvelope::Create(env)).unwrap();
        assert_eq!(json["user_uid"], "user-1");
        assert_eq!(json["language_section_uid"], "section-en");
        assert_eq!(json["title"], "Warmup");
        assert_eq!(json["version"], "1.1");
        assert_eq!(json["duration"], 10.0);
        assert_eq!(json["tags"], serde_json::json!(["vocal", "breath"]));
        assert!(json.get("cloud_uid").is_none());
    }

    #[test]
    fn update_envelope_has_no_user_or_section() {
        let mut t = template();
        t.cloud_uid = Some("abc".into());
        let env = UpdateEnvelope::from_template(&t).unwrap();
        let json = serde_json::to_value(MetadataEnvelope::Update(env)).unwrap();
        assert_eq!(json["cloud_uid"], "abc");
        assert!(json.get("user_uid").is_none());
        assert!(json.get("language_section_uid").is_none());
    }

    #[test]
    fn update_requires_cloud_uid() {
        assert_matches!(
            UpdateEnvelope::from_template(&template()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn create_rejects_blank_identifiers() {
        assert_matches!(
            CreateEnvelope::from_template(&template(), "", "section"),
            Err(CoreError::Validation(msg)) if msg.contains("user_uid")
        );
        assert_matches!(
            CreateEnvelope::from_template(&template(), "user", " "),
            Err(CoreError::Validation(msg)) if msg.contains("language_section_uid")
        );
    }

    #[test]
    fn rejects_negative_duration() {
        let mut t = template();
        t.duration_secs = -1.0;
        assert_matches!(
            CreateEnvelope::from_template(&t, "u", "s"),
            Err(CoreError::Validation(_))
        );
    }
}
