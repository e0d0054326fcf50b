/// Round to a fixed number of decimal places.
///
/// Used wherever the plan/forecast contracts specify 2-, 3- or 4-decimal
/// outputs; intermediate math always stays unrounded.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
