//! Pipeline stages for photo-to-coloring-page processing.
//!
//! Each submodule implements one step; [`crate::process`] strings them
//! together and owns the timeouts.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ encode ──▶ ai::describe ──▶ ai::generate ──▶ fetch ──▶ render
//! (bytes)    (base64)   (vision, 30 s)   (images, 60 s)   (HTTP)    (A4 PDF)
//! ```
//!
//! 1. [`encode`] base64-wraps the upload for the multimodal request body
//! 2. [`ai`] holds the [`ai::ColoringAi`] seam and its OpenAI-backed
//!    implementation; the only stage that talks to a model
//! 3. [`fetch`] downloads the generated outline from the URL the images
//!    API returned
//! 4. [`render`] lays the outline onto a single A4 page; runs in
//!    `spawn_blocking` because decoding and deflating are CPU-bound

pub mod ai;
pub mod encode;
pub mod fetch;
pub mod render;
