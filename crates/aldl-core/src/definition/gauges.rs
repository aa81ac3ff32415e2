//! Initial gauge selection
//!
//! Picks a handful of well-known sensors out of a definition so a front end
//! has something to show before the user configures a dashboard.

use serde::{Deserialize, Serialize};

use super::types::ParameterDef;

/// Maximum number of gauges derived from a definition
pub const MAX_INITIAL_GAUGES: usize = 6;

/// Title keywords that mark a parameter as gauge-worthy
pub const GAUGE_KEYWORDS: [&str; 7] = ["RPM", "TPS", "MAP", "TEMP", "SPEED", "VOLT", "O2"];

/// Default gauge accent color
pub const DEFAULT_GAUGE_COLOR: &str = "#3b82f6";

/// A gauge bound to one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeDef {
    /// Gauge identifier
    pub id: String,

    /// Display label
    pub label: String,

    /// Unit label
    pub unit: String,

    /// Minimum display value
    pub min: f64,

    /// Maximum display value
    pub max: f64,

    /// Accent color as a CSS hex string
    pub color: String,

    /// Parameter id the gauge displays
    pub field: String,
}

impl GaugeDef {
    /// Create a gauge for a parameter, choosing its range from the title
    pub fn for_parameter(param: &ParameterDef) -> Self {
        Self {
            id: format!("g-{}", param.id),
            label: param.title.clone(),
            unit: param.units.clone(),
            min: 0.0,
            max: display_max(&param.title),
            color: DEFAULT_GAUGE_COLOR.to_string(),
            field: param.id.clone(),
        }
    }
}

/// Whether a parameter title names a sensor worth a default gauge
pub fn is_gauge_candidate(title: &str) -> bool {
    let upper = title.to_uppercase();
    GAUGE_KEYWORDS.iter().any(|k| upper.contains(k))
}

/// Display maximum picked by keyword
pub fn display_max(title: &str) -> f64 {
    let upper = title.to_uppercase();
    if upper.contains("RPM") {
        7000.0
    } else if upper.contains("TPS") {
        100.0
    } else {
        255.0
    }
}

/// Derive the initial gauges, preserving parameter order
pub fn derive_gauges(parameters: &[ParameterDef]) -> Vec<GaugeDef> {
    parameters
        .iter()
        .filter(|p| is_gauge_candidate(&p.title))
        .take(MAX_INITIAL_GAUGES)
        .map(GaugeDef::for_parameter)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_ranges() {
        assert_eq!(display_max("Engine rpm"), 7000.0);
        assert_eq!(display_max("TPS Percent"), 100.0);
        assert_eq!(display_max("Coolant Temp"), 255.0);
    }

    #[test]
    fn test_derive_gauges_caps_and_filters() {
        let titles = [
            "Engine RPM", "Spark Advance", "TPS", "MAP", "Coolant Temp", "Vehicle Speed",
            "Battery Volts", "O2 Sensor",
        ];
        let params: Vec<ParameterDef> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| ParameterDef::new(format!("p{i}"), *t, i))
            .collect();

        let gauges = derive_gauges(&params);
        assert_eq!(gauges.len(), MAX_INITIAL_GAUGES);
        let fields: Vec<&str> = gauges.iter().map(|g| g.field.as_str()).collect();
        assert_eq!(fields, vec!["p0", "p2", "p3", "p4", "p5", "p6"]);
        assert_eq!(gauges[0].id, "g-p0");
        assert_eq!(gauges[0].max, 7000.0);
        assert_eq!(gauges[1].max, 100.0);
    }
}
