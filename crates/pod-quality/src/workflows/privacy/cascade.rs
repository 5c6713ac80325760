//! OpenCV Haar cascade model (`opencv-cascade-classifier` XML format).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

/// Boosted cascade of stump/tree classifiers over Haar rectangle features.
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stage {
    pub(crate) threshold: f64,
    pub(crate) classifiers: Vec<WeakClassifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeakClassifier {
    pub(crate) nodes: Vec<Node>,
    pub(crate) leaves: Vec<f64>,
}

/// Children greater than zero index `nodes`; zero or below index `leaves`
/// by negation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Node {
    pub(crate) left: i32,
    pub(crate) right: i32,
    pub(crate) feature: usize,
    pub(crate) threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HaarFeature {
    pub(crate) rects: Vec<WeightedRect>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WeightedRect {
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) weight: f64,
}

impl HaarCascade {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|source| DetectorError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let cascade = Self::from_xml_str(&xml)?;
        info!(
            path = %path.display(),
            stages = cascade.stages.len(),
            features = cascade.features.len(),
            "face cascade loaded"
        );
        Ok(cascade)
    }

    pub fn from_xml_str(xml: &str) -> Result<Self, DetectorError> {
        let storage: OpenCvStorage =
            quick_xml::de::from_str(xml).map_err(|err| DetectorError::Malformed(err.to_string()))?;
        storage.cascade.into_model()
    }

    /// Base detection window `(width, height)`.
    pub fn window(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub(crate) fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub(crate) fn features(&self) -> &[HaarFeature] {
        &self.features
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("face cascade {path} is unreadable: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("face cascade is malformed: {0}")]
    Malformed(String),
    #[error("unsupported face cascade: {0}")]
    Unsupported(String),
}

#[derive(Debug, Deserialize)]
struct OpenCvStorage {
    cascade: CascadeXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CascadeXml {
    stage_type: String,
    feature_type: String,
    height: String,
    width: String,
    stages: Items<StageXml>,
    features: Items<FeatureXml>,
}

/// OpenCV persistence writes list entries as `<_>` elements.
#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(rename = "_", default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageXml {
    stage_threshold: String,
    weak_classifiers: Items<WeakXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeakXml {
    internal_nodes: String,
    leaf_values: String,
}

#[derive(Debug, Deserialize)]
struct FeatureXml {
    rects: Items<String>,
    #[serde(default)]
    tilted: Option<String>,
}

impl CascadeXml {
    fn into_model(self) -> Result<HaarCascade, DetectorError> {
        if self.stage_type.trim() != "BOOST" {
            return Err(DetectorError::Unsupported(format!(
                "stage type {}",
                self.stage_type.trim()
            )));
        }
        if self.feature_type.trim() != "HAAR" {
            return Err(DetectorError::Unsupported(format!(
                "feature type {}",
                self.feature_type.trim()
            )));
        }

        let width: u32 = parse_number(&self.width, "width")?;
        let height: u32 = parse_number(&self.height, "height")?;
        if width < 3 || height < 3 {
            return Err(DetectorError::Malformed(format!(
                "window {width}x{height} is too small"
            )));
        }

        let features = self
            .features
            .items
            .into_iter()
            .map(|feature| feature.into_model(width, height))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = self
            .stages
            .items
            .into_iter()
            .map(|stage| stage.into_model(features.len()))
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(DetectorError::Malformed("cascade has no stages".to_string()));
        }

        Ok(HaarCascade {
            window: (width, height),
            stages,
            features,
        })
    }
}

impl StageXml {
    fn into_model(self, feature_count: usize) -> Result<Stage, DetectorError> {
        let threshold = parse_number(&self.stage_threshold, "stageThreshold")?;
        let classifiers = self
            .weak_classifiers
            .items
            .into_iter()
            .map(|weak| weak.into_model(feature_count))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Stage {
            threshold,
            classifiers,
        })
    }
}

impl WeakXml {
    fn into_model(self, feature_count: usize) -> Result<WeakClassifier, DetectorError> {
        let tokens: Vec<&str> = self.internal_nodes.split_whitespace().collect();
        if tokens.is_empty() || tokens.len() % 4 != 0 {
            return Err(DetectorError::Malformed(format!(
                "internalNodes must hold groups of four values (got {})",
                tokens.len()
            )));
        }

        let nodes = tokens
            .chunks(4)
            .map(|chunk| {
                Ok(Node {
                    left: parse_number(chunk[0], "internalNodes")?,
                    right: parse_number(chunk[1], "internalNodes")?,
                    feature: parse_number(chunk[2], "internalNodes")?,
                    threshold: parse_number(chunk[3], "internalNodes")?,
                })
            })
            .collect::<Result<Vec<_>, DetectorError>>()?;

        let leaves = self
            .leaf_values
            .split_whitespace()
            .map(|token| parse_number(token, "leafValues"))
            .collect::<Result<Vec<f64>, _>>()?;

        for (index, node) in nodes.iter().enumerate() {
            if node.feature >= feature_count {
                return Err(DetectorError::Malformed(format!(
                    "feature index {} out of range",
                    node.feature
                )));
            }
            for child in [node.left, node.right] {
                let valid = if child > 0 {
                    (child as usize) > index && (child as usize) < nodes.len()
                } else {
                    (child.unsigned_abs() as usize) < leaves.len()
                };
                if !valid {
                    return Err(DetectorError::Malformed(format!(
                        "tree child {child} of node {index} is out of range"
                    )));
                }
            }
        }

        Ok(WeakClassifier { nodes, leaves })
    }
}

impl FeatureXml {
    fn into_model(self, window_width: u32, window_height: u32) -> Result<HaarFeature, DetectorError> {
        if self
            .tilted
            .as_deref()
            .map(|value| value.trim() != "0")
            .unwrap_or(false)
        {
            return Err(DetectorError::Unsupported("tilted Haar features".to_string()));
        }

        let rects = self
            .rects
            .items
            .iter()
            .map(|raw| parse_rect(raw, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()?;
        if rects.is_empty() {
            return Err(DetectorError::Malformed("feature without rects".to_string()));
        }
        Ok(HaarFeature { rects })
    }
}

fn parse_rect(raw: &str, window_width: u32, window_height: u32) -> Result<WeightedRect, DetectorError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != 5 {
        return Err(DetectorError::Malformed(format!("rect '{}'", raw.trim())));
    }
    let rect = WeightedRect {
        x: parse_number(tokens[0], "rects")?,
        y: parse_number(tokens[1], "rects")?,
        width: parse_number(tokens[2], "rects")?,
        height: parse_number(tokens[3], "rects")?,
        weight: parse_number(tokens[4], "rects")?,
    };
    if rect.x + rect.width > window_width || rect.y + rect.height > window_height {
        return Err(DetectorError::Malformed(format!(
            "rect '{}' exceeds the detection window",
            raw.trim()
        )));
    }
    Ok(rect)
}

fn parse_number<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T, DetectorError> {
    raw.trim()
        .parse()
        .map_err(|_| DetectorError::Malformed(format!("{field} value '{}' is not numeric", raw.trim())))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One-stage cascade accepting windows whose top half is brighter than
    /// the bottom half.
    pub(crate) const BRIGHT_TOP_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier"><stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageParams>
    <maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams>
    <maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1.0000000149011612e-01</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 24 24 -1.</_>
        <_>
          0 0 24 12 2.</_></rects></_></features></cascade>
</opencv_storage>
"#;

    #[test]
    fn parses_opencv_cascade_xml() {
        let cascade = HaarCascade::from_xml_str(BRIGHT_TOP_CASCADE).expect("valid cascade");
        assert_eq!(cascade.window(), (24, 24));
        assert_eq!(cascade.stage_count(), 1);

        let stage = &cascade.stages()[0];
        assert_eq!(stage.threshold, 0.0);
        let weak = &stage.classifiers[0];
        assert_eq!(weak.leaves, vec![-1.0, 1.0]);
        assert_eq!(weak.nodes[0].left, 0);
        assert_eq!(weak.nodes[0].right, -1);
        assert!((weak.nodes[0].threshold - 0.1).abs() < 1e-9);

        let rects = &cascade.features()[0].rects;
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[1].height, 12);
        assert_eq!(rects[1].weight, 2.0);
    }

    #[test]
    fn rejects_non_haar_cascades() {
        let lbp = BRIGHT_TOP_CASCADE.replace("<featureType>HAAR", "<featureType>LBP");
        assert!(matches!(
            HaarCascade::from_xml_str(&lbp),
            Err(DetectorError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_tilted_features() {
        let tilted = BRIGHT_TOP_CASCADE.replace("</rects></_>", "</rects>\n      <tilted>1</tilted></_>");
        assert!(matches!(
            HaarCascade::from_xml_str(&tilted),
            Err(DetectorError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_feature_index() {
        let broken = BRIGHT_TOP_CASCADE.replace("0 -1 0 1.0000000149011612e-01", "0 -1 7 0.1");
        assert!(matches!(
            HaarCascade::from_xml_str(&broken),
            Err(DetectorError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_garbage_and_missing_files() {
        assert!(matches!(
            HaarCascade::from_xml_str("<opencv_storage></opencv_storage>"),
            Err(DetectorError::Malformed(_))
        ));
        assert!(matches!(
            HaarCascade::from_path("/nonexistent/haarcascade_frontalface_default.xml"),
            Err(DetectorError::Unreadable { .. })
        ));
    }
}
