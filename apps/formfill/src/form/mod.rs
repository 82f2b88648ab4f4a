// Field classification: raw page metadata in, typed descriptors out.
// Pure and deterministic; nothing in here touches the page.

pub mod classifier;
pub mod handlers;
pub mod models;
