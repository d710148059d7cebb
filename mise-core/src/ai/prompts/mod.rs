//! AI prompt templates.

pub mod extract_recipe;

pub use extract_recipe::{
    render_extract_prompt, render_feedback_prompt, render_system_prompt, response_schema,
};
