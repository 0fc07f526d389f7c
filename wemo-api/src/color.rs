//! RGB to CIE xy chromaticity conversion for color-capable bulbs.

/// Convert an 8-bit RGB triple to the bridge's native chromaticity encoding.
///
/// Channels are mixed through a fixed linear RGB→XYZ matrix and the resulting
/// `x = X/(X+Y+Z)`, `y = Y/(X+Y+Z)` are scaled to `0..=65535` and rounded.
/// Black has no chromaticity and maps to `[0, 0]`.
pub fn rgb2xy(red: u8, green: u8, blue: u8) -> [u16; 2] {
    let (r, g, b) = (f64::from(red), f64::from(green), f64::from(blue));

    let x = 0.545053 * r + 0.357580 * g + 0.180423 * b;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = 0.019334 * r + 0.119193 * g + 0.950227 * b;

    let sum = x + y + z;
    if sum == 0.0 {
        return [0, 0];
    }

    [scale(x / sum), scale(y / sum)]
}

fn scale(component: f64) -> u16 {
    (component * 65535.0).round().clamp(0.0, 65535.0) as u16
}

/// Capability value for color capability `10300`: `x:y:transition`.
pub fn color_capability_value(red: u8, green: u8, blue: u8) -> String {
    let [x, y] = rgb2xy(red, green, blue);
    format!("{x}:{y}:0")
}
