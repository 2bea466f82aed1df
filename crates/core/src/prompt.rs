//! Prompt composition.
//!
//! Builds the full generation prompt from a style recipe plus the
//! submission's sliders, toggles, and optional freeform text. Pure
//! string assembly; the style id is validated before this point.

use crate::job::StyleRequest;
use crate::style::StyleRecipe;

/// Strength above which the prompt asks for a full transformation.
const STRENGTH_STRONG: f32 = 0.7;
/// Strength below which the prompt asks for a light touch.
const STRENGTH_SUBTLE: f32 = 0.35;
/// Detail level above which fine detailing is requested.
const DETAIL_HIGH: f32 = 0.65;

/// Compose the full provider prompt for one job.
///
/// Fragment order is fixed: recipe base, strength wording, detail
/// wording, toggles, then the caller's freeform text (trimmed). The
/// freeform text goes last so it refines rather than overrides the
/// recipe.
pub fn compose(recipe: &StyleRecipe, request: &StyleRequest) -> String {
    let mut fragments: Vec<&str> = vec![recipe.base_prompt];

    if request.strength >= STRENGTH_STRONG {
        fragments.push("fully transformed into the style");
    } else if request.strength <= STRENGTH_SUBTLE {
        fragments.push("subtle stylization, close to the original photo");
    } else {
        fragments.push("balanced stylization");
    }

    if request.detail >= DETAIL_HIGH {
        fragments.push("intricate fine detail");
    }

    if request.preserve_background {
        fragments.push("original background preserved");
    }
    if request.vivid_colors {
        fragments.push("vivid saturated colors");
    }

    let user_text = request
        .user_prompt
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(text) = user_text {
        fragments.push(text);
    }

    fragments.join(", ")
}
