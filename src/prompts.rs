//! Prompts for the two AI calls.
//!
//! Both prompts are fixed; only the description produced by the vision
//! call is spliced into the generation template.

/// Instruction sent alongside the uploaded photo.
pub const DESCRIBE_PROMPT: &str = "Analyze this image and describe what you see in detail. \
Focus on the main subjects, objects, shapes, and overall composition. \
If there are people or animals, describe their faces and facial features \
(eyes, nose, mouth, expression) precisely. \
This description will be used to draw a black-and-white coloring book outline, \
so prefer concrete shapes and outlines over colors and lighting.";

/// Longest description spliced into the generation prompt.
///
/// Image models cap prompt length (4000 chars for dall-e-3); the template
/// itself uses well under 1000.
pub const MAX_DESCRIPTION_CHARS: usize = 2800;

const GENERATION_TEMPLATE: &str = "Create a black and white line drawing for a coloring book \
based on this description: \"{description}\". \
Use only clean, bold black outlines on a pure white background. \
No colors, no shading, no grayscale, no filled areas, no hatching. \
Keep faces recognizable: draw eyes, nose, mouth and expression as clear outlines. \
Every region must be an empty white shape that can be colored in, \
exactly like a traditional coloring book page.";

/// Build the generation prompt from a vision description.
///
/// Double quotes are replaced so the description cannot close the quoted
/// span early, and overlong descriptions are cut at a char boundary.
pub fn generation_prompt(description: &str) -> String {
    let cleaned = description.trim().replace('"', "'");
    let clipped: String = cleaned.chars().take(MAX_DESCRIPTION_CHARS).collect();
    GENERATION_TEMPLATE.replace("{description}", &clipped)
}
