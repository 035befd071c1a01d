use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

use crate::error::app_error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Json,
}

impl SettingType {
    /// Whether `value` is a well-formed literal of this type.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            SettingType::String => true,
            SettingType::Number => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
            SettingType::Boolean => matches!(value, "true" | "false"),
            SettingType::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::Number => "number",
            SettingType::Boolean => "boolean",
            SettingType::Json => "json",
        }
    }
}

impl FromStr for SettingType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SettingType::String),
            "number" => Ok(SettingType::Number),
            "boolean" => Ok(SettingType::Boolean),
            "json" => Ok(SettingType::Json),
            other => Err(AppError::BadRequest(format!("Unknown setting type: {}", other))),
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub setting_type: String,
}

impl Setting {
    /// Interpret the stored value as a boolean flag; anything but `"true"` is false.
    pub fn as_bool(&self) -> bool {
        self.value == "true"
    }
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: String,
}

impl From<&Setting> for SettingResponse {
    fn from(setting: &Setting) -> Self {
        Self {
            key: setting.key.clone(),
            value: setting.value.clone(),
            setting_type: setting.setting_type.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
#[validate(schema(function = "validate_setting_value"))]
pub struct SettingRequest {
    #[validate(length(max = 10000, message = "Value must be less than 10000 characters"))]
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
}

fn validate_setting_value(request: &SettingRequest) -> Result<(), ValidationError> {
    if request.setting_type.accepts(&request.value) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_setting_value").with_message(Cow::Owned(format!(
            "Value is not a valid {}",
            request.setting_type
        ))))
    }
}

pub const ENABLE_COMMENTS: &str = "enable_comments";

/// Settings seeded by the maintenance bootstrap.
pub const DEFAULT_SETTINGS: &[(&str, &str, SettingType)] = &[
    ("site_title", "Inkpress", SettingType::String),
    ("site_description", "A blog powered by Inkpress", SettingType::String),
    ("posts_per_page", "10", SettingType::Number),
    (ENABLE_COMMENTS, "true", SettingType::Boolean),
];
