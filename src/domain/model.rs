use crate::utils::error::{ErrorKind, ForgeError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// Raw, caller-shaped parameters. Keys and value types vary by form, preset and legacy payload.
pub type ParameterBag = serde_json::Map<String, serde_json::Value>;

/// 目前商店提供的參數化模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownModel {
    CableTray,
    VesaAdapter,
    RouterMount,
    HeadsetStand,
    SsdHolder,
    WallHook,
    PhoneStand,
    DeskGrommet,
}

impl KnownModel {
    pub fn all() -> &'static [KnownModel] {
        &[
            KnownModel::CableTray,
            KnownModel::VesaAdapter,
            KnownModel::RouterMount,
            KnownModel::HeadsetStand,
            KnownModel::SsdHolder,
            KnownModel::WallHook,
            KnownModel::PhoneStand,
            KnownModel::DeskGrommet,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::CableTray => "cable_tray",
            KnownModel::VesaAdapter => "vesa_adapter",
            KnownModel::RouterMount => "router_mount",
            KnownModel::HeadsetStand => "headset_stand",
            KnownModel::SsdHolder => "ssd_holder",
            KnownModel::WallHook => "wall_hook",
            KnownModel::PhoneStand => "phone_stand",
            KnownModel::DeskGrommet => "desk_grommet",
        }
    }

    pub fn lookup(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|m| m.as_str() == value)
    }
}

/// Model identifier as sent by the caller. Unknown identifiers are valid; they simply have no
/// per-model overrides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ModelId(String);

fn model_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").expect("valid model pattern"))
}

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ForgeError::invalid_request("model is required"));
        }
        if !model_id_pattern().is_match(trimmed) {
            return Err(ForgeError::invalid_request(format!(
                "invalid model identifier: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> Option<KnownModel> {
        KnownModel::lookup(&self.0)
    }
}

impl From<KnownModel> for ModelId {
    fn from(model: KnownModel) -> Self {
        Self(model.as_str().to_string())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalParams {
    pub length_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub thickness_mm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillet_mm: Option<f64>,
    /// Every other (coerced) key from the raw bag, passed through to the generator.
    #[serde(flatten)]
    pub extra: ParameterBag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    pub x_mm: f64,
    pub y_mm: f64,
    pub d_mm: f64,
}

impl Hole {
    pub fn check(&self) -> Result<()> {
        if !self.x_mm.is_finite() || !self.y_mm.is_finite() {
            return Err(ForgeError::invalid_request("hole position must be finite"));
        }
        if !self.d_mm.is_finite() || self.d_mm <= 0.0 {
            return Err(ForgeError::invalid_request(format!(
                "hole diameter must be positive, got {}",
                self.d_mm
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Oneoff,
    Maker,
    Commercial,
}

impl Plan {
    pub fn is_subscription(&self) -> bool {
        matches!(self, Plan::Maker | Plan::Commercial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Active,
    Canceled,
    Expired,
}

/// One grant of access, written by the billing webhook and only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub email: String,
    pub plan: Plan,
    /// `None` covers every model.
    pub model: Option<String>,
    pub status: EntitlementStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntitlementRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == EntitlementStatus::Active && self.expires_at.map_or(true, |at| at > now)
    }

    pub fn grants_subscription(&self, now: DateTime<Utc>) -> bool {
        self.plan.is_subscription() && self.is_live(now)
    }

    pub fn grants_model(&self, model: &ModelId, now: DateTime<Utc>) -> bool {
        self.plan == Plan::Oneoff
            && self.model.as_deref() == Some(model.as_str())
            && self.is_live(now)
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: ModelId,
    pub params: ParameterBag,
    pub holes: Vec<Hole>,
    /// Already trimmed and lower-cased by the boundary.
    pub identity: Option<String>,
}

/// Payload forwarded to the generation backend.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub model: ModelId,
    pub params: CanonicalParams,
    pub holes: Vec<Hole>,
}

/// Decoded leniently by the backend adapter; `error` may arrive as a string or a nested object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorReply {
    pub object_key: Option<String>,
    pub thumb_key: Option<String>,
    /// Some backends answer 200 with `{ok: false, error}` instead of a non-OK status.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOutput {
    pub url: String,
    pub object_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
}

/// Boundary response: `{ok: true, url, object_key, thumb_url?}` or `{ok: false, error}`.
/// `kind` stays on the server side and is never serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum ForgeReply {
    Ok(GenerateOutput),
    Err { kind: ErrorKind, error: String },
}

impl ForgeReply {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ForgeReply::Err {
                kind: ErrorKind::Upstream,
                ..
            }
        )
    }
}

impl From<&ForgeError> for ForgeReply {
    fn from(err: &ForgeError) -> Self {
        ForgeReply::Err {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

impl Serialize for ForgeReply {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ForgeReply::Ok(output) => {
                let len = if output.thumb_url.is_some() { 4 } else { 3 };
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("url", &output.url)?;
                map.serialize_entry("object_key", &output.object_key)?;
                if let Some(thumb_url) = &output.thumb_url {
                    map.serialize_entry("thumb_url", thumb_url)?;
                }
                map.end()
            }
            ForgeReply::Err { error, .. } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(plan: Plan, model: Option<&str>, expires_at: Option<DateTime<Utc>>) -> EntitlementRecord {
        EntitlementRecord {
            email: "buyer@example.com".to_string(),
            plan,
            model: model.map(str::to_string),
            status: EntitlementStatus::Active,
            expires_at,
        }
    }

    #[test]
    fn test_model_id_parse() {
        assert_eq!(ModelId::parse(" cable_tray ").unwrap().as_str(), "cable_tray");
        assert_eq!(
            ModelId::parse("headset_stand").unwrap().kind(),
            Some(KnownModel::HeadsetStand)
        );
        assert_eq!(ModelId::parse("custom-bracket").unwrap().kind(), None);
        assert!(ModelId::parse("").is_err());
        assert!(ModelId::parse("   ").is_err());
        assert!(ModelId::parse("../etc/passwd").is_err());
        assert!(ModelId::parse("Cable Tray").is_err());
    }

    #[test]
    fn test_known_model_names_round_trip() {
        for model in KnownModel::all() {
            assert_eq!(KnownModel::lookup(model.as_str()), Some(*model));
        }
    }

    #[test]
    fn test_hole_check() {
        assert!(Hole { x_mm: 10.0, y_mm: 5.0, d_mm: 4.0 }.check().is_ok());
        assert!(Hole { x_mm: 10.0, y_mm: 5.0, d_mm: 0.0 }.check().is_err());
        assert!(Hole { x_mm: f64::NAN, y_mm: 5.0, d_mm: 3.0 }.check().is_err());
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        assert!(!record(Plan::Maker, None, Some(now)).grants_subscription(now));
        assert!(record(Plan::Maker, None, Some(now + Duration::seconds(1))).grants_subscription(now));
        assert!(record(Plan::Commercial, None, None).grants_subscription(now));
        assert!(!record(Plan::Oneoff, None, None).grants_subscription(now));
    }

    #[test]
    fn test_canceled_record_grants_nothing() {
        let now = Utc::now();
        let mut canceled = record(Plan::Oneoff, Some("vesa_adapter"), None);
        canceled.status = EntitlementStatus::Canceled;
        let model = ModelId::from(KnownModel::VesaAdapter);
        assert!(!canceled.grants_model(&model, now));
    }

    #[test]
    fn test_reply_envelope_shape() {
        let ok = ForgeReply::Ok(GenerateOutput {
            url: "https://cdn.example.com/abc/out.stl?token=t".to_string(),
            object_key: "abc/out.stl".to_string(),
            thumb_url: None,
        });
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({
                "ok": true,
                "url": "https://cdn.example.com/abc/out.stl?token=t",
                "object_key": "abc/out.stl"
            })
        );

        let err = ForgeReply::from(&ForgeError::invalid_request("model is required"));
        assert!(matches!(
            err,
            ForgeReply::Err {
                kind: ErrorKind::Input,
                ..
            }
        ));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"ok": false, "error": "Invalid request: model is required"})
        );
    }

    #[test]
    fn test_error_reply_keeps_kind_for_retries() {
        let upstream = ForgeReply::from(&ForgeError::GeneratorUnavailable {
            message: "503".to_string(),
        });
        assert!(upstream.is_retriable());

        let denied = ForgeReply::from(&ForgeError::NotEntitled {
            model: "vesa_adapter".to_string(),
        });
        assert!(!denied.is_retriable());
        assert_eq!(serde_json::to_value(&denied).unwrap()["ok"], serde_json::json!(false));
        assert!(serde_json::to_value(&denied).unwrap().get("kind").is_none());
    }
}
