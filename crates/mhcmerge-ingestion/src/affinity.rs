//! Conversions between IC50 (nM) and the 0–1 binding affinity scale used by
//! the NetMHC family (`BA-score`, `1-log50k`).

/// IC50 values are capped here before scaling.
pub const IC50_CAP_NM: f64 = 50_000.0;

/// Scale an IC50 in nM to binding affinity: `1 - log(ic50) / log(50000)`.
///
/// Values above the cap map to 0. Expects a positive IC50.
pub fn ic50_to_ba(ic50: f64) -> f64 {
    let ic50 = ic50.min(IC50_CAP_NM);
    1.0 - ic50.ln() / IC50_CAP_NM.ln()
}

/// Inverse of [`ic50_to_ba`]: `nM = 50000^(1 - BA)`.
pub fn ba_to_ic50(ba: f64) -> f64 {
    IC50_CAP_NM.powf(1.0 - ba)
}
