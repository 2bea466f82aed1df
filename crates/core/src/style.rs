//! Style catalog: recipes, output shapes, and eligibility rules.
//!
//! The catalog is a fixed table. Submissions referencing an unknown style
//! id are rejected at validation time; the worker still re-checks and
//! fails the job instead of panicking if an invalid id slips through.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

/// Output dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

/// Default square output used by most styles.
pub const SIZE_SQUARE: OutputSize = OutputSize {
    width: 1024,
    height: 1024,
};

/// Portrait output used by face-centric styles.
pub const SIZE_PORTRAIT: OutputSize = OutputSize {
    width: 832,
    height: 1216,
};

/// Rendering quality tier passed through to the generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    High,
}

impl Quality {
    /// Stable string form used on the provider wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::High => "high",
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Standard
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// One entry in the style catalog.
#[derive(Debug, Clone, Copy)]
pub struct StyleRecipe {
    /// Caller-visible identifier, e.g. `"watercolor"`.
    pub id: &'static str,
    /// Human-readable name for UI listings.
    pub display_name: &'static str,
    /// Leading prompt fragment describing the target aesthetic.
    pub base_prompt: &'static str,
    /// Output size used when the caller does not override it.
    pub default_size: OutputSize,
    /// Whether face restoration/enhancement makes sense for this style.
    ///
    /// Heavily abstracted styles distort faces on purpose; re-imposing
    /// the original face would fight the style.
    pub face_restorable: bool,
}

/// The fixed style catalog.
pub const STYLES: &[StyleRecipe] = &[
    StyleRecipe {
        id: "watercolor",
        display_name: "Watercolor",
        base_prompt: "a delicate watercolor painting, soft washes of pigment, visible paper texture",
        default_size: SIZE_SQUARE,
        face_restorable: true,
    },
    StyleRecipe {
        id: "oil-portrait",
        display_name: "Oil Portrait",
        base_prompt: "a classical oil portrait, rich impasto brushwork, warm gallery lighting",
        default_size: SIZE_PORTRAIT,
        face_restorable: true,
    },
    StyleRecipe {
        id: "anime",
        display_name: "Anime",
        base_prompt: "a vibrant anime illustration, clean line art, expressive cel shading",
        default_size: SIZE_PORTRAIT,
        face_restorable: true,
    },
    StyleRecipe {
        id: "cyberpunk",
        display_name: "Cyberpunk",
        base_prompt: "a neon-drenched cyberpunk scene, holographic signage, rain-slick streets",
        default_size: SIZE_SQUARE,
        face_restorable: true,
    },
    StyleRecipe {
        id: "pop-art",
        display_name: "Pop Art",
        base_prompt: "a bold pop art print, halftone dots, saturated primary colors",
        default_size: SIZE_SQUARE,
        face_restorable: true,
    },
    StyleRecipe {
        id: "pencil-sketch",
        display_name: "Pencil Sketch",
        base_prompt: "a loose graphite sketch, cross-hatched shading, rough paper grain",
        default_size: SIZE_SQUARE,
        face_restorable: false,
    },
    StyleRecipe {
        id: "claymation",
        display_name: "Claymation",
        base_prompt: "a handcrafted claymation character, soft studio lighting, fingerprint texture",
        default_size: SIZE_SQUARE,
        face_restorable: false,
    },
];

/// Look up a style recipe by id.
///
/// Unknown ids are a validation error; callers surface the message to the
/// submitter (or fail the job, if the worker is the one catching it).
pub fn lookup(style_id: &str) -> Result<&'static StyleRecipe, CoreError> {
    STYLES
        .iter()
        .find(|recipe| recipe.id == style_id)
        .ok_or_else(|| CoreError::Validation(format!("Unknown style id: '{style_id}'")))
}

/// Resolve the output size for a job: caller override wins, otherwise the
/// style's default.
pub fn resolve_output_size(recipe: &StyleRecipe, requested: Option<OutputSize>) -> OutputSize {
    requested.unwrap_or(recipe.default_size)
}
