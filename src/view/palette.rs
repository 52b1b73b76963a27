//! Colors for classes, mask labels and selection state.

use crate::model::ClassId;

/// RGBA color with 8-bit channels.
pub type Rgba = [u8; 4];

pub const SELECTED_COLOR: Rgba = [255, 255, 255, 255];
pub const COMMENT_COLOR: Rgba = [255, 196, 0, 255];
pub const DRAFT_COLOR: Rgba = [0, 200, 255, 255];

// Golden angle keeps consecutive ids far apart on the hue circle
const HUE_STEP: f32 = 137.508;

/// Convert HSV to RGB.
///
/// # Arguments
/// * `h` - Hue in degrees (0-360)
/// * `s` - Saturation (0.0-1.0)
/// * `v` - Value/brightness (0.0-1.0)
///
/// # Returns
/// RGB tuple with values in range 0.0-1.0
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

fn to_rgba((r, g, b): (f32, f32, f32), alpha: u8) -> Rgba {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [channel(r), channel(g), channel(b), alpha]
}

fn hue_for(n: u64) -> f32 {
    ((n % 360) as f32 * HUE_STEP) % 360.0
}

/// Stable color of an annotation class; unclassified annotations are grey.
pub fn class_color(class_id: Option<ClassId>) -> Rgba {
    match class_id {
        Some(id) => to_rgba(hsv_to_rgb(hue_for(id), 0.75, 0.95), 255),
        None => [160, 160, 160, 255],
    }
}

/// Translucent fill for a mask label. Label 0 is fully transparent.
pub fn label_color(label: u8) -> Rgba {
    if label == 0 {
        return [0, 0, 0, 0];
    }
    to_rgba(hsv_to_rgb(hue_for(u64::from(label)), 0.8, 1.0), 128)
}
