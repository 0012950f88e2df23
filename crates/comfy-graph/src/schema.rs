//! The widget-layout registry.
//!
//! The positional meaning of widget slot *k* on a node is determined entirely
//! by the node's type tag and is not self-describing. This module holds that
//! external knowledge once, as declarative per-type field tables, and the
//! analyze/update/transform operations are three interpreters over it.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Capability class of a node type. Video-family nodes carry layouts that
/// differ enough from the standard image family that they get their own
/// table entries; the tag lets callers ask per node instead of sniffing the
/// whole document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    Standard,
    Video,
}

/// Primitive kind of a widget slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Float,
    Text,
    Bool,
    Choice,
}

/// Semantic meaning of a widget slot, used to route high-level overrides
/// and to present parameters to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semantic {
    Prompt,
    NegativePrompt,
    Seed,
    SamplerControl,
    Steps,
    Cfg,
    SamplerName,
    Scheduler,
    Denoise,
    Width,
    Height,
    BatchSize,
    Frames,
    Fps,
    Model,
    Filename,
    ImagePath,
    Shift,
    Strength,
    Precision,
    Device,
    Other,
    Generic,
}

/// A default emitted into the execution payload when the widget slot is
/// absent from the document.
#[derive(Clone, Copy, Debug)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Bool(b) => json!(b),
            DefaultValue::Int(i) => json!(i),
            DefaultValue::Float(f) => json!(f),
            DefaultValue::Str(s) => json!(s),
        }
    }
}

/// One widget slot: its payload field name, position, semantics, and
/// payload-construction behavior.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Position in a positional store. Unused for keyed stores and for
    /// payload-only fields.
    pub index: usize,
    pub semantic: Semantic,
    pub kind: ValueKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub choices: &'static [&'static str],
    /// A required field is filled from its default (with a warning) when the
    /// document does not supply it.
    pub required: bool,
    /// Whether the transformer writes this field into the payload at all.
    /// UI-only slots (`control_after_generate`, upload buttons) are not sent.
    pub emit: bool,
    /// Whether the field is sourced from the widget store. Payload-only
    /// fields are always emitted from their default.
    pub from_widget: bool,
    pub default: Option<DefaultValue>,
    /// Value repair applied before the slot reaches the payload.
    pub sanitize: Option<fn(Value) -> Value>,
}

impl FieldSpec {
    const fn new(index: usize, name: &'static str, semantic: Semantic, kind: ValueKind) -> Self {
        Self {
            name,
            index,
            semantic,
            kind,
            min: None,
            max: None,
            choices: &[],
            required: false,
            emit: true,
            from_widget: true,
            default: None,
            sanitize: None,
        }
    }

    const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Keep the slot out of the execution payload.
    const fn ui_only(mut self) -> Self {
        self.emit = false;
        self
    }

    /// Emit the field from its default, never from the widget store.
    const fn payload_only(mut self) -> Self {
        self.from_widget = false;
        self
    }

    const fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    const fn sanitized(mut self, sanitize: fn(Value) -> Value) -> Self {
        self.sanitize = Some(sanitize);
        self
    }
}

/// The layout of one node type.
#[derive(Clone, Copy, Debug)]
pub struct NodeSchema {
    pub node_type: &'static str,
    pub class: NodeClass,
    /// Whether the widget store is object-keyed rather than positional.
    pub keyed: bool,
    pub fields: &'static [FieldSpec],
}

fn clamp_non_negative(value: Value) -> Value {
    match value.as_f64() {
        Some(v) if v < 0.0 => json!(0.0),
        _ => value,
    }
}

fn coerce_bool(value: Value) -> Value {
    match &value {
        Value::String(s) => json!(s == "true"),
        _ => value,
    }
}

/// fp8 quantization modes fail on the backend; fall back to disabled.
fn quantization_guard(value: Value) -> Value {
    match value.as_str() {
        Some(s) if s.to_ascii_lowercase().contains("fp8") => json!("disabled"),
        _ => value,
    }
}

const SAMPLER_NAMES: &[&str] = &[
    "euler",
    "euler_ancestral",
    "heun",
    "dpm_2",
    "dpm_2_ancestral",
    "lms",
    "dpmpp_2m",
    "dpmpp_sde",
    "dpmpp_2m_sde",
    "ddim",
    "uni_pc",
];

const SCHEDULERS: &[&str] = &[
    "normal",
    "karras",
    "exponential",
    "sgm_uniform",
    "simple",
    "ddim_uniform",
];

const SAMPLER_CONTROL: &[&str] = &["fixed", "increment", "decrement", "randomize"];

const OFFLOAD_DEVICES: &[&str] = &["main_device", "offload_device"];

const LATENT_DIMENSIONS: &[FieldSpec] = &[
    FieldSpec::new(0, "width", Semantic::Width, ValueKind::Int).range(16.0, 8192.0),
    FieldSpec::new(1, "height", Semantic::Height, ValueKind::Int).range(16.0, 8192.0),
    FieldSpec::new(2, "batch_size", Semantic::BatchSize, ValueKind::Int).range(1.0, 64.0),
];

const CHECKPOINT_LOADER: &[FieldSpec] =
    &[FieldSpec::new(0, "ckpt_name", Semantic::Model, ValueKind::Text)];

const MODEL_AND_PRECISION: &[FieldSpec] = &[
    FieldSpec::new(0, "model_name", Semantic::Model, ValueKind::Text),
    FieldSpec::new(1, "precision", Semantic::Precision, ValueKind::Choice)
        .choices(&["fp16", "fp32", "bf16"]),
];

static SCHEMAS: &[NodeSchema] = &[
    NodeSchema {
        node_type: "KSampler",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "seed", Semantic::Seed, ValueKind::Int).range(0.0, 18446744073709551615.0),
            FieldSpec::new(1, "control_after_generate", Semantic::SamplerControl, ValueKind::Choice)
                .choices(SAMPLER_CONTROL)
                .ui_only(),
            FieldSpec::new(2, "steps", Semantic::Steps, ValueKind::Int).range(1.0, 10000.0),
            FieldSpec::new(3, "cfg", Semantic::Cfg, ValueKind::Float).range(0.0, 100.0),
            FieldSpec::new(4, "sampler_name", Semantic::SamplerName, ValueKind::Choice)
                .choices(SAMPLER_NAMES),
            FieldSpec::new(5, "scheduler", Semantic::Scheduler, ValueKind::Choice)
                .choices(SCHEDULERS),
            FieldSpec::new(6, "denoise", Semantic::Denoise, ValueKind::Float).range(0.0, 1.0),
        ],
    },
    NodeSchema {
        node_type: "CLIPTextEncode",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[FieldSpec::new(0, "text", Semantic::Prompt, ValueKind::Text)],
    },
    NodeSchema {
        node_type: "EmptyLatentImage",
        class: NodeClass::Standard,
        keyed: false,
        fields: LATENT_DIMENSIONS,
    },
    NodeSchema {
        node_type: "EmptySD3LatentImage",
        class: NodeClass::Standard,
        keyed: false,
        fields: LATENT_DIMENSIONS,
    },
    NodeSchema {
        node_type: "CheckpointLoaderSimple",
        class: NodeClass::Standard,
        keyed: false,
        fields: CHECKPOINT_LOADER,
    },
    NodeSchema {
        node_type: "ImageOnlyCheckpointLoader",
        class: NodeClass::Standard,
        keyed: false,
        fields: CHECKPOINT_LOADER,
    },
    NodeSchema {
        node_type: "VAELoader",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[FieldSpec::new(0, "vae_name", Semantic::Model, ValueKind::Text)],
    },
    NodeSchema {
        node_type: "UNETLoader",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "unet_name", Semantic::Model, ValueKind::Text),
            FieldSpec::new(1, "weight_dtype", Semantic::Precision, ValueKind::Text)
                .default_value(DefaultValue::Str("default")),
        ],
    },
    NodeSchema {
        node_type: "QuadrupleCLIPLoader",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "clip_name1", Semantic::Model, ValueKind::Text),
            FieldSpec::new(1, "clip_name2", Semantic::Model, ValueKind::Text),
            FieldSpec::new(2, "clip_name3", Semantic::Model, ValueKind::Text),
            FieldSpec::new(3, "clip_name4", Semantic::Model, ValueKind::Text),
        ],
    },
    NodeSchema {
        node_type: "ModelSamplingSD3",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[FieldSpec::new(0, "shift", Semantic::Shift, ValueKind::Float)
            .default_value(DefaultValue::Int(5))],
    },
    NodeSchema {
        node_type: "LoraLoader",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "lora_name", Semantic::Model, ValueKind::Text),
            FieldSpec::new(1, "strength_model", Semantic::Strength, ValueKind::Float)
                .range(-20.0, 20.0),
            FieldSpec::new(2, "strength_clip", Semantic::Strength, ValueKind::Float)
                .range(-20.0, 20.0),
        ],
    },
    NodeSchema {
        node_type: "SaveImage",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[FieldSpec::new(0, "filename_prefix", Semantic::Filename, ValueKind::Text)],
    },
    NodeSchema {
        node_type: "LoadImage",
        class: NodeClass::Standard,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "image", Semantic::ImagePath, ValueKind::Text)
                .required()
                .default_value(DefaultValue::Str("example.png")),
            FieldSpec::new(1, "upload", Semantic::Other, ValueKind::Text).ui_only(),
        ],
    },
    // Video family.
    NodeSchema {
        node_type: "WanVideoTextEncode",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "positive_prompt", Semantic::Prompt, ValueKind::Text),
            FieldSpec::new(1, "negative_prompt", Semantic::NegativePrompt, ValueKind::Text),
            FieldSpec::new(2, "force_zeros", Semantic::Other, ValueKind::Bool)
                .default_value(DefaultValue::Bool(true)),
        ],
    },
    NodeSchema {
        node_type: "WanVideoEmptyEmbeds",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "width", Semantic::Width, ValueKind::Int).range(16.0, 8192.0),
            FieldSpec::new(1, "height", Semantic::Height, ValueKind::Int).range(16.0, 8192.0),
            FieldSpec::new(2, "num_frames", Semantic::Frames, ValueKind::Int).range(1.0, 1024.0),
        ],
    },
    NodeSchema {
        node_type: "WanVideoBlockSwap",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "blocks_to_swap", Semantic::Other, ValueKind::Int).range(0.0, 40.0),
            FieldSpec::new(1, "offload_txt_emb", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(2, "offload_img_emb", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(3, "non_blocking", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(4, "vace_blocks_to_swap", Semantic::Other, ValueKind::Int)
                .default_value(DefaultValue::Int(0)),
        ],
    },
    NodeSchema {
        node_type: "WanVideoTorchCompileSettings",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "backend", Semantic::Other, ValueKind::Choice)
                .choices(&["inductor", "cudagraphs"]),
            FieldSpec::new(1, "fullgraph", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(2, "mode", Semantic::Other, ValueKind::Text),
            FieldSpec::new(3, "max_autotune", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(4, "max_autotune_gemm_backends", Semantic::Other, ValueKind::Int),
            FieldSpec::new(5, "use_fp16_cast", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(6, "max_autotune_gemm_warmup", Semantic::Other, ValueKind::Int),
            FieldSpec::new(7, "compile_transformer_blocks_only", Semantic::Other, ValueKind::Bool)
                .payload_only()
                .default_value(DefaultValue::Bool(false)),
            FieldSpec::new(8, "dynamic", Semantic::Other, ValueKind::Bool)
                .payload_only()
                .default_value(DefaultValue::Bool(false)),
            FieldSpec::new(9, "dynamo_cache_size_limit", Semantic::Other, ValueKind::Int)
                .payload_only()
                .default_value(DefaultValue::Int(64)),
        ],
    },
    NodeSchema {
        node_type: "WanVideoTeaCache",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "start_step", Semantic::Other, ValueKind::Float).range(0.0, 1.0),
            FieldSpec::new(1, "end_step", Semantic::Other, ValueKind::Float).range(0.0, 1.0),
            FieldSpec::new(2, "rel_l1_thresh", Semantic::Other, ValueKind::Float)
                .sanitized(clamp_non_negative),
            FieldSpec::new(3, "cache_device", Semantic::Device, ValueKind::Choice)
                .choices(OFFLOAD_DEVICES),
            FieldSpec::new(4, "use_coefficients", Semantic::Other, ValueKind::Bool)
                .sanitized(coerce_bool),
            FieldSpec::new(5, "coeff_mode", Semantic::Other, ValueKind::Text),
        ],
    },
    NodeSchema {
        node_type: "WanVideoEnhanceAVideo",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "enhance_factor", Semantic::Other, ValueKind::Float),
            FieldSpec::new(1, "enhance_start", Semantic::Other, ValueKind::Float),
            FieldSpec::new(2, "enhance_end", Semantic::Other, ValueKind::Float),
            FieldSpec::new(3, "start_percent", Semantic::Other, ValueKind::Int)
                .payload_only()
                .default_value(DefaultValue::Int(0)),
            FieldSpec::new(4, "end_percent", Semantic::Other, ValueKind::Int)
                .payload_only()
                .default_value(DefaultValue::Int(1)),
            FieldSpec::new(5, "weight", Semantic::Other, ValueKind::Int)
                .payload_only()
                .default_value(DefaultValue::Int(1)),
        ],
    },
    NodeSchema {
        node_type: "WanVideoSampler",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "steps", Semantic::Steps, ValueKind::Int).range(1.0, 10000.0),
            FieldSpec::new(1, "cfg", Semantic::Cfg, ValueKind::Float).range(0.0, 100.0),
            FieldSpec::new(2, "shift", Semantic::Shift, ValueKind::Float),
            FieldSpec::new(3, "seed", Semantic::Seed, ValueKind::Int)
                .range(0.0, 4294967295.0),
            FieldSpec::new(4, "sampler_name", Semantic::SamplerName, ValueKind::Text),
            FieldSpec::new(5, "diffusion_type", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(6, "scheduler", Semantic::Scheduler, ValueKind::Choice)
                .choices(&["unipc", "dpm++", "euler"]),
            FieldSpec::new(7, "riflex_freq_index", Semantic::Other, ValueKind::Int),
            FieldSpec::new(10, "implementation", Semantic::Other, ValueKind::Text)
                .default_value(DefaultValue::Str("comfy")),
        ],
    },
    NodeSchema {
        node_type: "WanVideoDecode",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "restore_faces", Semantic::Other, ValueKind::Bool),
            FieldSpec::new(1, "tile_x", Semantic::Other, ValueKind::Int),
            FieldSpec::new(2, "tile_y", Semantic::Other, ValueKind::Int),
            FieldSpec::new(3, "tile_stride_x", Semantic::Other, ValueKind::Int),
            FieldSpec::new(4, "tile_stride_y", Semantic::Other, ValueKind::Int),
            FieldSpec::new(5, "enable_vae_tiling", Semantic::Other, ValueKind::Bool)
                .payload_only()
                .default_value(DefaultValue::Bool(true)),
        ],
    },
    NodeSchema {
        node_type: "WanVideoVAELoader",
        class: NodeClass::Video,
        keyed: false,
        fields: MODEL_AND_PRECISION,
    },
    NodeSchema {
        node_type: "LoadWanVideoT5TextEncoder",
        class: NodeClass::Video,
        keyed: false,
        fields: MODEL_AND_PRECISION,
    },
    NodeSchema {
        node_type: "WanVideoModelLoader",
        class: NodeClass::Video,
        keyed: false,
        fields: &[
            FieldSpec::new(0, "model", Semantic::Model, ValueKind::Text),
            FieldSpec::new(1, "base_precision", Semantic::Precision, ValueKind::Choice)
                .choices(&["fp32", "bf16", "fp16"]),
            FieldSpec::new(2, "quantization", Semantic::Other, ValueKind::Text)
                .sanitized(quantization_guard),
            FieldSpec::new(3, "load_device", Semantic::Device, ValueKind::Choice)
                .choices(OFFLOAD_DEVICES),
            FieldSpec::new(4, "attention_implementation", Semantic::Other, ValueKind::Choice)
                .choices(&["sdpa", "flash_attn_2", "sageattn"]),
        ],
    },
    NodeSchema {
        node_type: "VHS_VideoCombine",
        class: NodeClass::Video,
        keyed: true,
        fields: &[
            FieldSpec::new(0, "frame_rate", Semantic::Fps, ValueKind::Int)
                .range(1.0, 120.0)
                .default_value(DefaultValue::Int(24)),
            FieldSpec::new(1, "loop_count", Semantic::Other, ValueKind::Int)
                .default_value(DefaultValue::Int(0)),
            FieldSpec::new(2, "filename_prefix", Semantic::Filename, ValueKind::Text)
                .default_value(DefaultValue::Str("video_output")),
            FieldSpec::new(3, "format", Semantic::Other, ValueKind::Text)
                .default_value(DefaultValue::Str("video/h264-mp4")),
            FieldSpec::new(4, "pingpong", Semantic::Other, ValueKind::Bool)
                .default_value(DefaultValue::Bool(false)),
            FieldSpec::new(5, "save_output", Semantic::Other, ValueKind::Bool)
                .default_value(DefaultValue::Bool(true)),
        ],
    },
];

lazy_static! {
    static ref BY_TYPE: HashMap<&'static str, &'static NodeSchema> =
        SCHEMAS.iter().map(|s| (s.node_type, s)).collect();
}

/// Looks up the layout for a node type, if one is registered.
pub fn schema_for(node_type: &str) -> Option<&'static NodeSchema> {
    BY_TYPE.get(node_type).copied()
}

/// Capability class for a node type; unregistered types are standard.
pub fn node_class(node_type: &str) -> NodeClass {
    schema_for(node_type)
        .map(|s| s.class)
        .unwrap_or(NodeClass::Standard)
}

impl NodeSchema {
    /// Looks up a widget-sourced field by payload name. Payload-only fields
    /// are not addressable (they have no widget slot to read or write).
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name && f.from_widget)
    }
}
