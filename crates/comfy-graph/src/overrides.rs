//! High-level generation overrides.
//!
//! Callers usually want "set the prompt, the dimensions, the seed" rather
//! than addressing widget slots by hand. An override set is compiled against
//! an analysis into the `"<nodeId>.<fieldName>"` update map that
//! [`apply_updates`](crate::update::apply_updates) consumes, targeting every
//! parameter whose semantic matches.

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::skip_serializing_none;

use crate::analyze::Analysis;
use crate::schema::Semantic;
use crate::update::ParamUpdates;

/// User-configurable generation settings, routed by semantic rather than by
/// node id. Fields left unset are not written.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationOverrides {
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frames: Option<u32>,
    pub fps: Option<u32>,
    pub seed: Option<i64>,
    pub steps: Option<u32>,
    pub cfg: Option<f64>,
}

impl GenerationOverrides {
    /// Compiles the overrides into an update map against the parameters the
    /// analysis surfaced. A semantic with no matching parameter is simply
    /// not written; a semantic matched by several nodes (e.g. two samplers)
    /// is written on each.
    pub fn to_updates(&self, analysis: &Analysis) -> ParamUpdates {
        let mut updates = ParamUpdates::new();
        for param in &analysis.configurable {
            let key = format!("{}.{}", param.node_id, param.name);
            match param.semantic {
                Semantic::Prompt => {
                    if let Some(prompt) = &self.prompt {
                        updates.insert(key, json!(prompt));
                    }
                }
                Semantic::NegativePrompt => {
                    if let Some(negative) = &self.negative_prompt {
                        updates.insert(key, json!(negative));
                    }
                }
                Semantic::Width => {
                    if let Some(width) = self.width {
                        updates.insert(key, json!(width));
                    }
                }
                Semantic::Height => {
                    if let Some(height) = self.height {
                        updates.insert(key, json!(height));
                    }
                }
                Semantic::Frames => {
                    if let Some(frames) = self.frames {
                        updates.insert(key, json!(frames));
                    }
                }
                Semantic::Fps => {
                    if let Some(fps) = self.fps {
                        updates.insert(key, json!(fps));
                    }
                }
                Semantic::Seed => {
                    if let Some(seed) = self.seed {
                        updates.insert(key, json!(seed));
                    }
                }
                Semantic::Steps => {
                    if let Some(steps) = self.steps {
                        updates.insert(key, json!(steps));
                    }
                }
                Semantic::Cfg => {
                    if let Some(cfg) = self.cfg {
                        updates.insert(key, json!(cfg));
                    }
                }
                _ => {}
            }
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::analyze::analyze;
    use crate::document::WorkflowDocument;
    use crate::update::apply_updates;

    use super::*;

    fn image_doc() -> WorkflowDocument {
        WorkflowDocument::from_value(json!({
            "nodes": [
                {
                    "id": "6",
                    "type": "CLIPTextEncode",
                    "title": "Positive Prompt",
                    "widgets_values": ["placeholder"]
                },
                {
                    "id": "7",
                    "type": "CLIPTextEncode",
                    "title": "Negative Prompt",
                    "widgets_values": ["placeholder"]
                },
                {
                    "id": "3",
                    "type": "KSampler",
                    "widgets_values": [0, "fixed", 20, 8.0, "euler", "normal", 1.0]
                },
                {
                    "id": "5",
                    "type": "EmptyLatentImage",
                    "widgets_values": [512, 512, 1]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn overrides_target_parameters_by_semantic() {
        let analysis = analyze(&image_doc());
        let overrides = GenerationOverrides {
            prompt: Some("a red fox".to_string()),
            negative_prompt: Some("blurry".to_string()),
            width: Some(1024),
            height: Some(768),
            seed: Some(42),
            steps: Some(30),
            ..Default::default()
        };
        let updates = overrides.to_updates(&analysis);
        assert_eq!(updates.get("6.text"), Some(&json!("a red fox")));
        assert_eq!(updates.get("7.text"), Some(&json!("blurry")));
        assert_eq!(updates.get("3.seed"), Some(&json!(42)));
        assert_eq!(updates.get("3.steps"), Some(&json!(30)));
        assert_eq!(updates.get("5.width"), Some(&json!(1024)));
        assert_eq!(updates.get("5.height"), Some(&json!(768)));
        // cfg was not set, so the slot is untouched.
        assert!(updates.get("3.cfg").is_none());
    }

    #[test]
    fn overrides_round_trip_through_apply() {
        let document = image_doc();
        let analysis = analyze(&document);
        let overrides = GenerationOverrides {
            prompt: Some("a lighthouse at dawn".to_string()),
            steps: Some(35),
            ..Default::default()
        };
        let outcome = apply_updates(&document, &overrides.to_updates(&analysis));
        assert!(outcome.skipped.is_empty());
        let widgets = outcome.document.node("6").unwrap().widgets_values.as_ref().unwrap();
        assert_eq!(widgets.index(0), Some(&json!("a lighthouse at dawn")));
        let widgets = outcome.document.node("3").unwrap().widgets_values.as_ref().unwrap();
        assert_eq!(widgets.index(2), Some(&json!(35)));
    }

    #[test]
    fn video_semantics_route_to_video_tables() {
        let document = WorkflowDocument::from_value(json!({
            "nodes": [
                {
                    "id": "16",
                    "type": "WanVideoTextEncode",
                    "widgets_values": ["placeholder", "placeholder", true]
                },
                {
                    "id": "37",
                    "type": "WanVideoEmptyEmbeds",
                    "widgets_values": [832, 480, 48]
                },
                {
                    "id": "30",
                    "type": "VHS_VideoCombine",
                    "widgets_values": {"frame_rate": 24}
                }
            ]
        }))
        .unwrap();
        let analysis = analyze(&document);
        let overrides = GenerationOverrides {
            prompt: Some("waves crashing".to_string()),
            negative_prompt: Some("pixelated".to_string()),
            frames: Some(96),
            fps: Some(30),
            ..Default::default()
        };
        let updates = overrides.to_updates(&analysis);
        assert_eq!(updates.get("16.positive_prompt"), Some(&json!("waves crashing")));
        assert_eq!(updates.get("16.negative_prompt"), Some(&json!("pixelated")));
        assert_eq!(updates.get("37.num_frames"), Some(&json!(96)));
        assert_eq!(updates.get("30.frame_rate"), Some(&json!(30)));
    }
}
