//! Declarative capability table for the video-generation models.
//!
//! New models are added as rows here; the submission adapter never branches on
//! a model id directly.

/// How a model is addressed at the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelReference {
    /// A pinned `owner/name:version` reference
    Version(&'static str),
    /// An `owner/name` model served through the model predictions endpoint
    Official(&'static str),
}

/// What a model accepts for output geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapability {
    pub id: &'static str,

    pub reference: ModelReference,

    /// Longest side the model can render
    pub max_dimension: u32,

    /// Both output dimensions must be a multiple of this
    pub dimension_step: u32,

    /// Renders 9:16 output without distortion
    pub portrait_safe: bool,
}

pub const MODEL_CAPABILITIES: &[ModelCapability] = &[
    ModelCapability {
        id: "zeroscope",
        reference: ModelReference::Version(
            "anotherjesse/zeroscope-v2-xl:9f747673945c62801b13b84701c783929c0ee784e4748ec062204894dda1a351",
        ),
        max_dimension: 1024,
        dimension_step: 2,
        portrait_safe: true,
    },
    ModelCapability {
        id: "svd",
        reference: ModelReference::Official("stability-ai/stable-video-diffusion"),
        max_dimension: 1024,
        dimension_step: 64,
        portrait_safe: false,
    },
    ModelCapability {
        id: "animatediff",
        reference: ModelReference::Official("lucataco/animate-diff"),
        max_dimension: 768,
        dimension_step: 8,
        portrait_safe: false,
    },
];

/// Look up a model by id
pub fn find_model(id: &str) -> Option<&'static ModelCapability> {
    MODEL_CAPABILITIES.iter().find(|model| model.id == id)
}

/// First model in the table that handles portrait output acceptably
pub fn portrait_model() -> &'static ModelCapability {
    MODEL_CAPABILITIES
        .iter()
        .find(|model| model.portrait_safe)
        .unwrap_or(&MODEL_CAPABILITIES[0])
}

/// Pick the model for a request: the requested one, or the portrait-safe one
/// when portrait output was asked for from a model that distorts it.
pub fn select_model(requested: &str, portrait: bool) -> &'static ModelCapability {
    let model = find_model(requested).unwrap_or_else(|| {
        tracing::warn!("Unknown model '{}', using {}", requested, MODEL_CAPABILITIES[0].id);
        &MODEL_CAPABILITIES[0]
    });

    if portrait && !model.portrait_safe {
        let forced = portrait_model();
        tracing::info!(
            "Model {} distorts portrait output, switching to {}",
            model.id,
            forced.id
        );
        forced
    } else {
        model
    }
}

/// Scale `width`x`height` down to fit the model's longest side, preserving the
/// aspect ratio, then snap both sides down to the model's dimension step.
pub fn clamp_dimensions(model: &ModelCapability, width: u32, height: u32) -> (u32, u32) {
    let step = model.dimension_step.max(1);
    let longest = width.max(height).max(1);

    let (scaled_w, scaled_h) = if longest > model.max_dimension {
        let scale = |value: u32| (value as u64 * model.max_dimension as u64 / longest as u64) as u32;
        (scale(width), scale(height))
    } else {
        (width, height)
    };

    let snap = |value: u32| ((value / step) * step).max(step);
    (snap(scaled_w), snap(scaled_h))
}
