//! Verdict classification of a completed analysis.

use serde::Deserialize;
use std::collections::BTreeMap;

/// At most this many engine detections are reported.
pub const MAX_REPORTED_DETECTIONS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisStats {
    #[serde(default)]
    pub malicious: u64,
    #[serde(default)]
    pub suspicious: u64,
    #[serde(default)]
    pub undetected: u64,
    #[serde(default)]
    pub harmless: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineResult {
    pub category: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// `data.attributes` of an analysis object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisAttributes {
    pub status: String,
    #[serde(default)]
    pub stats: AnalysisStats,
    /// Keyed by engine name; ordered alphabetically
    #[serde(default)]
    pub results: BTreeMap<String, EngineResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Suspicious,
    Malicious,
}

impl Verdict {
    pub fn key(&self) -> &'static str {
        match self {
            Verdict::Safe => "upload-result-safe",
            Verdict::Suspicious => "upload-result-suspicious",
            Verdict::Malicious => "upload-result-malicious",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub engine: String,
    pub category: String,
    /// Signature name; `"unknown"` when the engine gave none
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub verdict: Verdict,
    pub malicious: u64,
    pub suspicious: u64,
    pub total: u64,
    /// `"{malicious + suspicious}/{total}"`
    pub detection_ratio: String,
    /// First detections in engine name order, never more than five
    pub detections: Vec<Detection>,
}

pub fn classify(attributes: &AnalysisAttributes) -> ScanReport {
    let stats = &attributes.stats;
    let total = stats.undetected + stats.malicious + stats.suspicious;

    let verdict = if stats.malicious > 0 {
        Verdict::Malicious
    } else if stats.suspicious > 0 {
        Verdict::Suspicious
    } else {
        Verdict::Safe
    };

    let detection_ratio = if total == 0 {
        "0/0".to_string()
    } else {
        format!("{}/{}", stats.malicious + stats.suspicious, total)
    };

    let detections = attributes
        .results
        .iter()
        .filter(|(_, r)| r.category == "malicious" || r.category == "suspicious")
        .take(MAX_REPORTED_DETECTIONS)
        .map(|(engine, r)| Detection {
            engine: engine.clone(),
            category: r.category.clone(),
            result: r.result.clone().unwrap_or_else(|| "unknown".to_string()),
        })
        .collect();

    ScanReport {
        verdict,
        malicious: stats.malicious,
        suspicious: stats.suspicious,
        total,
        detection_ratio,
        detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attrs(json: serde_json::Value) -> AnalysisAttributes {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_clean_file_is_safe() {
        let report = classify(&attrs(serde_json::json!({
            "status": "completed",
            "stats": {"malicious": 0, "suspicious": 0, "undetected": 60, "harmless": 0},
            "results": {}
        })));
        assert_eq!(report.verdict, Verdict::Safe);
        assert_eq!(report.detection_ratio, "0/60");
        assert!(report.detections.is_empty());
    }

    #[test]
    fn test_suspicious_only() {
        let report = classify(&attrs(serde_json::json!({
            "status": "completed",
            "stats": {"malicious": 0, "suspicious": 2, "undetected": 58},
            "results": {
                "Beta": {"category": "suspicious", "result": null},
                "Alpha": {"category": "undetected", "result": null}
            }
        })));
        assert_eq!(report.verdict, Verdict::Suspicious);
        assert_eq!(report.detection_ratio, "2/60");
        assert_eq!(
            report.detections,
            vec![Detection {
                engine: "Beta".into(),
                category: "suspicious".into(),
                result: "unknown".into()
            }]
        );
    }

    #[test]
    fn test_empty_stats_ratio() {
        let report = classify(&attrs(serde_json::json!({"status": "completed"})));
        assert_eq!(report.detection_ratio, "0/0");
        assert_eq!(report.total, 0);
        assert_eq!(report.verdict, Verdict::Safe);
    }

    #[test]
    fn test_detections_truncated_alphabetically() {
        let results: serde_json::Map<String, serde_json::Value> = ["G", "F", "E", "D", "C", "B", "A"]
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    serde_json::json!({"category": "malicious", "result": format!("Trojan.{name}")}),
                )
            })
            .collect();
        let report = classify(&attrs(serde_json::json!({
            "status": "completed",
            "stats": {"malicious": 7, "suspicious": 0, "undetected": 3},
            "results": results
        })));

        assert_eq!(report.verdict, Verdict::Malicious);
        assert_eq!(report.detection_ratio, "7/10");
        let engines: Vec<&str> = report.detections.iter().map(|d| d.engine.as_str()).collect();
        assert_eq!(engines, vec!["A", "B", "C", "D", "E"]);
    }
}
