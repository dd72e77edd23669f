use std::path::Path;

use anyhow::Result;

use super::ModelSpec;
use crate::error::RecognizerError;

/// Read newline-separated class names. Line order is the class id.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        RecognizerError::configuration(format!(
            "failed to read label file {}: {}",
            path.display(),
            e
        ))
    })?;
    let labels: Vec<String> = raw.lines().map(str::to_string).collect();
    if labels.is_empty() {
        return Err(RecognizerError::configuration(format!(
            "label file {} is empty",
            path.display()
        )));
    }
    Ok(labels)
}

/// Read the JSON model config that accompanies the weights.
pub fn load_model_spec(path: &Path) -> Result<ModelSpec> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        RecognizerError::configuration(format!(
            "failed to read model config {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        RecognizerError::configuration(format!(
            "invalid model config {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelOrder;

    #[test]
    fn labels_keep_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coco.names");
        std::fs::write(&path, "person\nbicycle\ncar\n").unwrap();

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["person", "bicycle", "car"]);
    }

    #[test]
    fn missing_label_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_labels(&dir.path().join("absent.names")).unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(RecognizerError::Configuration(_))
        ));
    }

    #[test]
    fn empty_label_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.names");
        std::fs::write(&path, "").unwrap();
        assert!(load_labels(&path).is_err());
    }

    #[test]
    fn model_spec_fields_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yolov3.json");
        std::fs::write(&path, r#"{"channel_order": "bgr"}"#).unwrap();

        let spec = load_model_spec(&path).unwrap();
        assert_eq!(spec.input_size, 320);
        assert_eq!(spec.channel_order, ChannelOrder::Bgr);
        assert_eq!(spec.num_classes, None);
    }
}
