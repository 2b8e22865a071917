//! Canonical parameter resolution.
//!
//! Model forms, presets, example payloads and older clients all named the same dimensions
//! differently. Every bag is folded into the five canonical `*_mm` fields before it reaches the
//! generator. Alias order is load-bearing: the first alias carrying a finite number wins, so
//! reordering a list changes which legacy caller's field name takes precedence.

use crate::domain::model::{CanonicalParams, KnownModel, ModelId, ParameterBag};
use crate::utils::error::{ForgeError, Result};
use serde_json::{Number, Value};

pub const LENGTH_MM: &str = "length_mm";
pub const WIDTH_MM: &str = "width_mm";
pub const HEIGHT_MM: &str = "height_mm";
pub const THICKNESS_MM: &str = "thickness_mm";
pub const FILLET_MM: &str = "fillet_mm";

pub const CANONICAL_FIELDS: [&str; 5] = [LENGTH_MM, WIDTH_MM, HEIGHT_MM, THICKNESS_MM, FILLET_MM];

const LENGTH_ALIASES: &[&str] = &[
    "length", "largo_mm", "largo", "ancho_mm", "width", "drive_l", "hub_w", "base_w", "plate_w",
];
const WIDTH_ALIASES: &[&str] = &[
    "width", "ancho", "fondo_mm", "depth_mm", "depth", "drive_w", "hub_d", "base_d", "plate_h",
];
const HEIGHT_ALIASES: &[&str] = &["height", "alto_mm", "alto", "drive_h", "hub_h", "wall_h"];
const THICKNESS_ALIASES: &[&str] = &[
    "thickness", "grosor_mm", "grosor", "espesor_mm", "wall", "wall_mm",
];
const FILLET_ALIASES: &[&str] = &["fillet", "radius", "radio_mm", "corner_r"];

const DEFAULT_LENGTH_MM: f64 = 1.0;
const DEFAULT_WIDTH_MM: f64 = 1.0;
const DEFAULT_HEIGHT_MM: f64 = 1.0;
const DEFAULT_THICKNESS_MM: f64 = 2.0;

/// Extra fallback for one canonical field of one model. Fires only while the field is unset.
#[derive(Debug, Clone, Copy)]
pub struct FieldOverride {
    pub field: &'static str,
    pub chain: &'static [&'static str],
    pub default: Option<f64>,
}

const fn ov(
    field: &'static str,
    chain: &'static [&'static str],
    default: Option<f64>,
) -> FieldOverride {
    FieldOverride {
        field,
        chain,
        default,
    }
}

const VESA_ADAPTER: &[FieldOverride] = &[
    ov(LENGTH_MM, &["vesa_to", "vesa_mm"], Some(100.0)),
    ov(WIDTH_MM, &["vesa_to", "vesa_mm"], Some(100.0)),
    ov(THICKNESS_MM, &["plate_t"], Some(5.0)),
];
const ROUTER_MOUNT: &[FieldOverride] = &[
    ov(LENGTH_MM, &["router_w"], None),
    ov(WIDTH_MM, &["router_d"], None),
    ov(HEIGHT_MM, &["router_h", "lip_h"], None),
];
const HEADSET_STAND: &[FieldOverride] = &[ov(HEIGHT_MM, &["stem_h"], None)];
const SSD_HOLDER: &[FieldOverride] = &[
    ov(LENGTH_MM, &["drive_l"], Some(100.0)),
    ov(WIDTH_MM, &["drive_w"], Some(70.0)),
    ov(HEIGHT_MM, &["drive_h"], Some(7.0)),
];
const WALL_HOOK: &[FieldOverride] = &[
    ov(HEIGHT_MM, &["hook_len", "reach_mm"], None),
    ov(FILLET_MM, &["hook_r"], None),
];
const PHONE_STAND: &[FieldOverride] = &[
    ov(HEIGHT_MM, &["back_h"], None),
    ov(WIDTH_MM, &["phone_t", "slot_w"], None),
];
const DESK_GROMMET: &[FieldOverride] = &[
    ov(LENGTH_MM, &["hole_d", "diameter"], None),
    ov(WIDTH_MM, &["hole_d", "diameter"], None),
    ov(HEIGHT_MM, &["desk_t"], None),
];

/// 各模型的額外回退規則
pub fn model_overrides(model: KnownModel) -> &'static [FieldOverride] {
    match model {
        KnownModel::CableTray => &[],
        KnownModel::VesaAdapter => VESA_ADAPTER,
        KnownModel::RouterMount => ROUTER_MOUNT,
        KnownModel::HeadsetStand => HEADSET_STAND,
        KnownModel::SsdHolder => SSD_HOLDER,
        KnownModel::WallHook => WALL_HOOK,
        KnownModel::PhoneStand => PHONE_STAND,
        KnownModel::DeskGrommet => DESK_GROMMET,
    }
}

/// Rejects override entries that could never fire or would write a non-canonical key.
/// Run once at startup.
pub fn validate_override_table() -> Result<()> {
    for model in KnownModel::all() {
        for entry in model_overrides(*model) {
            if !CANONICAL_FIELDS.contains(&entry.field) {
                return Err(ForgeError::ConfigError {
                    message: format!(
                        "override for {} targets non-canonical field {}",
                        model.as_str(),
                        entry.field
                    ),
                });
            }
            if entry.chain.is_empty() && entry.default.is_none() {
                return Err(ForgeError::ConfigError {
                    message: format!(
                        "override for {}.{} has neither aliases nor a default",
                        model.as_str(),
                        entry.field
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Finite number, from a JSON number or a trimmed numeric string (`,` accepted as decimal mark).
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_bag(raw: &ParameterBag) -> ParameterBag {
    raw.iter()
        .map(|(key, value)| {
            let coerced = match value {
                Value::String(_) => coerce_number(value)
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| value.clone()),
                _ => value.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

fn defined(bag: &ParameterBag, key: &str) -> Option<f64> {
    bag.get(key).and_then(Value::as_f64).filter(|f| f.is_finite())
}

fn first_defined(bag: &ParameterBag, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| defined(bag, key))
}

fn aliases_for(field: &str) -> &'static [&'static str] {
    match field {
        LENGTH_MM => LENGTH_ALIASES,
        WIDTH_MM => WIDTH_ALIASES,
        HEIGHT_MM => HEIGHT_ALIASES,
        THICKNESS_MM => THICKNESS_ALIASES,
        FILLET_MM => FILLET_ALIASES,
        _ => &[],
    }
}

/// Total over every model identifier and bag: the four required dimensions always come back
/// finite.
pub fn normalize(model: &ModelId, raw: &ParameterBag) -> CanonicalParams {
    let bag = coerce_bag(raw);

    // 1. 標準欄位優先，其次依序嘗試別名
    let mut resolved: [Option<f64>; 5] = [None; 5];
    for (slot, field) in resolved.iter_mut().zip(CANONICAL_FIELDS) {
        *slot = defined(&bag, field).or_else(|| first_defined(&bag, aliases_for(field)));
    }

    // 2. 模型專屬回退
    if let Some(kind) = model.kind() {
        for entry in model_overrides(kind) {
            let Some(index) = CANONICAL_FIELDS.iter().position(|f| *f == entry.field) else {
                continue;
            };
            if resolved[index].is_none() {
                resolved[index] = first_defined(&bag, entry.chain).or(entry.default);
            }
        }
    }

    let [length, width, height, thickness, fillet] = resolved;

    let mut extra = bag;
    for field in CANONICAL_FIELDS {
        extra.remove(field);
    }

    CanonicalParams {
        length_mm: length.unwrap_or(DEFAULT_LENGTH_MM),
        width_mm: width.unwrap_or(DEFAULT_WIDTH_MM),
        height_mm: height.unwrap_or(DEFAULT_HEIGHT_MM),
        thickness_mm: thickness.unwrap_or(DEFAULT_THICKNESS_MM),
        fillet_mm: fillet,
        extra,
    }
}
