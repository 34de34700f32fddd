//! Quality classification of observed values
//!
//! Maps a (category, value) pair to a public-facing quality band with a display
//! colour and a short health message. Air uses the US EPA AQI bands.

use crate::Category;
use serde::Serialize;

/// Quality band for an observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityInfo {
    pub quality_label: &'static str,
    pub color_code: &'static str,
    pub health_msg: &'static str,
}

const fn band(quality_label: &'static str, color_code: &'static str, health_msg: &'static str) -> QualityInfo {
    QualityInfo {
        quality_label,
        color_code,
        health_msg,
    }
}

/// Band used when the value cannot be classified
pub const UNKNOWN: QualityInfo = band("Unknown", "#808080", "No specific health advice available.");

/// Classify a value within its category
pub fn classify(category: Category, value: f64) -> QualityInfo {
    if !value.is_finite() {
        return UNKNOWN;
    }
    match category {
        Category::Air => classify_air(value),
        Category::Water => classify_water(value),
        Category::Biodiversity => classify_biodiversity(value),
        Category::Noise => classify_noise(value),
        Category::Waste => classify_waste(value),
        Category::Weather => classify_weather(value),
        Category::Soil => classify_soil(value),
        Category::Radiation => classify_radiation(value),
    }
}

fn classify_air(value: f64) -> QualityInfo {
    if value <= 50.0 {
        band("Good", "#00E400", "Air quality is satisfactory, and air pollution poses little or no risk.")
    } else if value <= 100.0 {
        band("Moderate", "#FFFF00", "Air quality is acceptable; unusually sensitive people may be at some risk.")
    } else if value <= 150.0 {
        band("Unhealthy for Sensitive Groups", "#FF7E00", "Members of sensitive groups may experience health effects.")
    } else if value <= 200.0 {
        band("Unhealthy", "#FF0000", "Some members of the general public may experience health effects.")
    } else if value <= 300.0 {
        band("Very Unhealthy", "#8F3F97", "Health alert: the risk of health effects is increased for everyone.")
    } else {
        band("Hazardous", "#7E0023", "Health warning of emergency conditions: everyone is more likely to be affected.")
    }
}

// Contamination level, lower is better
fn classify_water(value: f64) -> QualityInfo {
    if value <= 20.0 {
        band("Excellent", "#0000FF", "Water is pristine and safe for all uses.")
    } else if value <= 40.0 {
        band("Good", "#00E400", "Water quality is good, minor treatment may be needed for drinking.")
    } else if value <= 60.0 {
        band("Fair", "#FFFF00", "Water quality is fair; filtration recommended.")
    } else if value <= 80.0 {
        band("Poor", "#FF7E00", "Water quality is poor; significant treatment required.")
    } else {
        band("Unsafe", "#FF0000", "Water is unsafe for consumption or contact.")
    }
}

fn classify_biodiversity(value: f64) -> QualityInfo {
    // Accept both 0-1 and 0-100 index scales
    let v = if value <= 1.0 { value * 100.0 } else { value };
    if v >= 80.0 {
        band("Pristine", "#00E400", "Ecosystem is thriving with high species richness and minimal disturbance.")
    } else if v >= 60.0 {
        band("Thriving", "#92D050", "System is stable and demonstrating strong resilience.")
    } else if v >= 40.0 {
        band("Fair", "#FFFF00", "Ecological balance is maintained but vulnerable to external stress.")
    } else if v >= 20.0 {
        band("Degraded", "#FF7E00", "Signs of habitat loss or invasive species dominance detected.")
    } else {
        band("Critical", "#FF0000", "Severe habitat destruction or local extinction event in progress.")
    }
}

fn classify_noise(value: f64) -> QualityInfo {
    if value <= 40.0 {
        band("Quiet", "#00E400", "Low ambient noise level.")
    } else if value <= 60.0 {
        band("Moderate", "#FFFF00", "Common city noise levels.")
    } else if value <= 85.0 {
        band("Loud", "#FF7E00", "Threshold for long-term hearing protection.")
    } else {
        band("Extreme", "#FF0000", "Immediate risk of hearing damage.")
    }
}

fn classify_waste(value: f64) -> QualityInfo {
    if value >= 80.0 {
        band("Efficient", "#00E400", "Optimized waste collection and management.")
    } else if value >= 50.0 {
        band("Standard", "#FFFF00", "Standard waste management protocols.")
    } else {
        band("Poor", "#FF0000", "Risk of environmental contamination from waste.")
    }
}

// Temperature in degrees Celsius
fn classify_weather(value: f64) -> QualityInfo {
    if (15.0..=25.0).contains(&value) {
        band("Pleasant", "#00E400", "Optimal weather conditions.")
    } else if !(0.0..=35.0).contains(&value) {
        band("Extreme", "#FF0000", "Caution recommended for outdoor activities.")
    } else {
        band("Moderate", "#FFFF00", "Standard weather conditions.")
    }
}

fn classify_radiation(value: f64) -> QualityInfo {
    if value <= 2.0 {
        band("Low", "#00E400", "Low UV/Radiation levels.")
    } else if value <= 5.0 {
        band("Moderate", "#FFFF00", "Moderate risk; sun protection recommended.")
    } else if value <= 10.0 {
        band("High", "#FF7E00", "High risk; limit midday sun exposure.")
    } else {
        band("Extreme", "#FF0000", "Very high risk; avoid outdoor exposure.")
    }
}

// Moisture or soil health index, 0-100
fn classify_soil(value: f64) -> QualityInfo {
    if value >= 70.0 {
        band("Superior", "#00E400", "Excellent soil moisture and nutrient profile.")
    } else if value >= 40.0 {
        band("Good", "#92D050", "Healthy soil conditions for vegetation.")
    } else if value >= 20.0 {
        band("Dry", "#FFFF00", "Soil is becoming dry; irrigation may be needed.")
    } else {
        band("Arid", "#FF0000", "Critical moisture deficit; soil health is at risk.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_air_bands_follow_aqi_breakpoints() {
        assert_eq!(classify(Category::Air, 45.0).quality_label, "Good");
        assert_eq!(classify(Category::Air, 50.0).quality_label, "Good");
        assert_eq!(classify(Category::Air, 51.0).quality_label, "Moderate");
        assert_eq!(classify(Category::Air, 180.0).quality_label, "Unhealthy");
        assert_eq!(classify(Category::Air, 450.0).quality_label, "Hazardous");
    }

    #[test]
    fn test_biodiversity_fractional_scale() {
        assert_eq!(classify(Category::Biodiversity, 0.85).quality_label, "Pristine");
        assert_eq!(classify(Category::Biodiversity, 85.0).quality_label, "Pristine");
        assert_eq!(classify(Category::Biodiversity, 0.1).quality_label, "Critical");
    }

    #[test]
    fn test_weather_extremes() {
        assert_eq!(classify(Category::Weather, 20.0).quality_label, "Pleasant");
        assert_eq!(classify(Category::Weather, 40.0).quality_label, "Extreme");
        assert_eq!(classify(Category::Weather, -5.0).quality_label, "Extreme");
        assert_eq!(classify(Category::Weather, 30.0).quality_label, "Moderate");
    }

    #[test]
    fn test_non_finite_is_unknown() {
        assert_eq!(classify(Category::Noise, f64::NAN), UNKNOWN);
    }
}
