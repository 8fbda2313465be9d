//! Engine workers backed by the generation service

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{GeneratedImage, GenerationService, ImageOptions};
use super::prompt::{TemplateStyle, build_image_prompt};
use super::segment::{Segmentation, segment_text};
use crate::engine::{ItemError, WorkItem, Worker};

/// Card label for the segment at `index`: the first segment is the cover
pub fn segment_label(index: usize) -> String {
    if index == 0 {
        "cover".to_string()
    } else {
        format!("content {index}")
    }
}

/// Images generated for one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub label: String,
    pub segment: String,
    pub images: Vec<GeneratedImage>,
    pub prompt: String,
}

/// Generates the image(s) for one text segment per item
pub struct ImageWorker {
    service: Arc<dyn GenerationService>,
    style: TemplateStyle,
    options: ImageOptions,
    note_labels: bool,
}

impl ImageWorker {
    pub fn new(service: Arc<dyn GenerationService>, style: TemplateStyle, options: ImageOptions) -> Self {
        Self {
            service,
            style,
            options,
            note_labels: true,
        }
    }

    /// Label items `image N` instead of cover/content
    pub fn with_plain_labels(mut self) -> Self {
        self.note_labels = false;
        self
    }

    fn item_label(&self, index: usize) -> String {
        if self.note_labels {
            segment_label(index)
        } else {
            format!("image {}", index + 1)
        }
    }
}

#[async_trait]
impl Worker for ImageWorker {
    type Input = String;
    type Output = ImageResult;

    async fn process(&self, item: &WorkItem<String>) -> Result<ImageResult, ItemError> {
        let prompt = build_image_prompt(&item.input, self.style);
        let images = self.service.generate_image(&prompt, &self.options).await?;

        Ok(ImageResult {
            label: self.item_label(item.index),
            segment: item.input.clone(),
            images,
            prompt,
        })
    }

    fn label(&self, item: &WorkItem<String>) -> String {
        if self.note_labels {
            format!("{} image", segment_label(item.index))
        } else {
            self.item_label(item.index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub text: String,
    pub segment_count: Option<usize>,
    pub custom_prompt: Option<String>,
}

/// Splits one text into note segments; always used as a job of size 1
pub struct SegmentWorker {
    service: Arc<dyn GenerationService>,
}

impl SegmentWorker {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Worker for SegmentWorker {
    type Input = SegmentRequest;
    type Output = Segmentation;

    async fn process(&self, item: &WorkItem<SegmentRequest>) -> Result<Segmentation, ItemError> {
        let request = &item.input;
        let segmentation = segment_text(
            self.service.as_ref(),
            &request.text,
            request.segment_count,
            request.custom_prompt.as_deref(),
        )
        .await?;
        Ok(segmentation)
    }

    fn label(&self, _item: &WorkItem<SegmentRequest>) -> String {
        "Segmentation".to_string()
    }
}
