//! End-to-end exercise of the analyze → override → update → transform
//! pipeline on a realistic text-to-image graph export.

use serde_json::json;

use comfy_graph::{
    analyze, apply_updates, to_execution_payload, GenerationOverrides, Semantic, WorkflowDocument,
};

fn text_to_image_graph() -> WorkflowDocument {
    WorkflowDocument::from_value(json!({
        "nodes": [
            {
                "id": 4,
                "type": "CheckpointLoaderSimple",
                "pos": [26, 474],
                "widgets_values": ["sd_xl_base_1.0.safetensors"]
            },
            {
                "id": 5,
                "type": "EmptyLatentImage",
                "widgets_values": [512, 512, 1]
            },
            {
                "id": 6,
                "type": "CLIPTextEncode",
                "title": "Positive Prompt",
                "widgets_values": ["a placeholder prompt, best quality"],
                "inputs": [{"name": "clip", "type": "CLIP", "link": 3}]
            },
            {
                "id": 7,
                "type": "CLIPTextEncode",
                "title": "Negative Prompt",
                "widgets_values": ["blurry, low quality"],
                "inputs": [{"name": "clip", "type": "CLIP", "link": 5}]
            },
            {
                "id": 3,
                "type": "KSampler",
                "widgets_values": [851616300011539u64, "randomize", 20, 8.0, "euler", "normal", 1.0],
                "inputs": [
                    {"name": "model", "type": "MODEL", "link": 1},
                    {"name": "positive", "type": "CONDITIONING", "link": 4},
                    {"name": "negative", "type": "CONDITIONING", "link": 6},
                    {"name": "latent_image", "type": "LATENT", "link": 2}
                ]
            },
            {
                "id": 8,
                "type": "VAEDecode",
                "inputs": [
                    {"name": "samples", "type": "LATENT", "link": 7},
                    {"name": "vae", "type": "VAE", "link": 8}
                ]
            },
            {
                "id": 9,
                "type": "SaveImage",
                "widgets_values": ["ComfyUI"],
                "inputs": [{"name": "images", "type": "IMAGE", "link": 9}]
            },
            {
                "id": 20,
                "type": "Note",
                "widgets_values": ["tuning notes, not executed"]
            }
        ],
        "links": [
            [1, 4, 0, 3, 0, "MODEL"],
            [2, 5, 0, 3, 3, "LATENT"],
            [3, 4, 1, 6, 0, "CLIP"],
            [4, 6, 0, 3, 1, "CONDITIONING"],
            [5, 4, 1, 7, 0, "CLIP"],
            [6, 7, 0, 3, 2, "CONDITIONING"],
            [7, 3, 0, 8, 0, "LATENT"],
            [8, 4, 2, 8, 1, "VAE"],
            [9, 8, 0, 9, 0, "IMAGE"]
        ],
        "extra_data": {"version": 0.4}
    }))
    .unwrap()
}

#[test]
fn analyze_override_update_transform() {
    let document = text_to_image_graph();

    let analysis = analyze(&document);
    assert!(analysis.has_valid_structure);
    assert!(analysis.errors.is_empty());
    assert_eq!(analysis.text_nodes.len(), 2);

    // The two prompt slots are routed by their titles.
    let positive = analysis
        .configurable
        .iter()
        .find(|p| p.node_id == "6" && p.name == "text")
        .unwrap();
    assert_eq!(positive.semantic, Semantic::Prompt);
    let negative = analysis
        .configurable
        .iter()
        .find(|p| p.node_id == "7" && p.name == "text")
        .unwrap();
    assert_eq!(negative.semantic, Semantic::NegativePrompt);

    let overrides = GenerationOverrides {
        prompt: Some("a lighthouse at dawn, volumetric light".to_string()),
        negative_prompt: Some("blurry, watermark".to_string()),
        width: Some(1024),
        height: Some(768),
        seed: Some(7),
        steps: Some(30),
        cfg: Some(6.5),
        ..Default::default()
    };
    let outcome = apply_updates(&document, &overrides.to_updates(&analysis));
    assert_eq!(outcome.skipped, Vec::<String>::new());
    assert_eq!(outcome.applied, 7);

    // The source document is untouched.
    let original_sampler = document.node("3").unwrap().widgets_values.as_ref().unwrap();
    assert_eq!(original_sampler.index(2), Some(&json!(20)));

    let transformed = to_execution_payload(&outcome.document);
    assert!(transformed.warnings.is_empty());
    // Note node dropped; everything else present.
    assert_eq!(transformed.payload.len(), 7);

    let sampler = transformed.payload.get("3").unwrap();
    assert_eq!(sampler.inputs.get("seed").unwrap().value(), Some(&json!(7)));
    assert_eq!(sampler.inputs.get("steps").unwrap().value(), Some(&json!(30)));
    assert_eq!(sampler.inputs.get("cfg").unwrap().value(), Some(&json!(6.5)));
    let positive = sampler.inputs.get("positive").unwrap().connection().unwrap();
    assert_eq!((positive.node_id.as_str(), positive.output_index), ("6", 0));

    let encode = transformed.payload.get("6").unwrap();
    assert_eq!(
        encode.inputs.get("text").unwrap().value(),
        Some(&json!("a lighthouse at dawn, volumetric light"))
    );
    // VAEDecode has no widget table entry and no widgets; connections only.
    let decode = transformed.payload.get("8").unwrap();
    assert_eq!(decode.inputs.len(), 2);
    assert!(decode.inputs.get("samples").unwrap().connection().is_some());
}
