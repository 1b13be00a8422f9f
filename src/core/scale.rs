use crate::types::{BackscatterScale, BandData};

/// Convert linear power to dB; non-positive values become masked
pub fn to_db(linear: &BandData) -> BandData {
    linear.mapv(|v| if v > 0.0 { 10.0 * v.log10() } else { f32::NAN })
}

/// Convert dB to linear power
pub fn to_linear(db: &BandData) -> BandData {
    db.mapv(|v| 10.0f32.powf(v / 10.0))
}

/// Bring a band into linear power from `scale`
pub fn into_linear(band: &BandData, scale: BackscatterScale) -> BandData {
    match scale {
        BackscatterScale::Linear => band.clone(),
        BackscatterScale::Decibel => to_linear(band),
    }
}

/// Bring a linear band back into `scale`
pub fn from_linear(band: &BandData, scale: BackscatterScale) -> BandData {
    match scale {
        BackscatterScale::Linear => band.clone(),
        BackscatterScale::Decibel => to_db(band),
    }
}
