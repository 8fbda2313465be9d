//! Text and image generation against the upstream model service
//!
//! - [`client`] - `GenerationService` trait and its reqwest implementation
//! - [`prompt`] - image prompt builder
//! - [`segment`] - segmentation, preview, validation, optimisation
//! - [`templates`] - note card template catalogue
//! - [`worker`] - engine workers for images and segmentation

pub mod client;
pub mod prompt;
pub mod segment;
pub mod templates;
pub mod worker;

pub use client::{
    ChatMessage, ChatRequest, GeneratedImage, GenerationError, GenerationService,
    HttpGenerationClient, ImageOptions,
};
pub use prompt::{TemplateStyle, build_image_prompt};
pub use segment::{OptimizationKind, SegmentType, Segmentation, TextValidation};
pub use worker::{ImageResult, ImageWorker, SegmentRequest, SegmentWorker, segment_label};
