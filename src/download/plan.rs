//! Turn saved generation results into a list of downloads

use serde::Deserialize;

use super::locator::inline_png;
use super::worker::DownloadRequest;
use crate::engine::{ItemOutcome, ItemRecord};
use crate::generation::{GeneratedImage, ImageResult};

/// Accepted input shapes: the `images-generated` payload or a bare result array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResultsFile {
    Payload { results: Vec<ItemRecord<ImageResult>> },
    Bare(Vec<ItemRecord<ImageResult>>),
}

impl ResultsFile {
    pub fn into_records(self) -> Vec<ItemRecord<ImageResult>> {
        match self {
            ResultsFile::Payload { results } => results,
            ResultsFile::Bare(results) => results,
        }
    }
}

/// One download per image of every successful result. Failed results are skipped.
pub fn plan_downloads(records: &[ItemRecord<ImageResult>]) -> Vec<DownloadRequest> {
    let mut requests = Vec::new();

    for record in records {
        let ItemOutcome::Success { payload } = &record.outcome else {
            continue;
        };

        let stem = file_stem(&payload.label, record.index);
        let usable: Vec<String> = payload.images.iter().filter_map(locator_for).collect();
        let numbered = usable.len() > 1;

        for (n, locator) in usable.into_iter().enumerate() {
            let file_name = if numbered {
                format!("note_{stem}_{}.png", n + 1)
            } else {
                format!("note_{stem}.png")
            };
            requests.push(DownloadRequest { file_name, locator });
        }
    }

    requests
}

/// Inline payloads are preferred over URLs that may have expired
fn locator_for(image: &GeneratedImage) -> Option<String> {
    match (&image.b64_json, &image.url) {
        (Some(b64), _) if !b64.is_empty() => Some(inline_png(b64)),
        (_, Some(url)) if !url.is_empty() => Some(url.clone()),
        _ => None,
    }
}

fn file_stem(label: &str, index: usize) -> String {
    let stem: String = label
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();

    if stem.is_empty() {
        format!("item_{}", index + 1)
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: &str, images: Vec<GeneratedImage>) -> ImageResult {
        ImageResult {
            label: label.to_string(),
            segment: "segment".to_string(),
            images,
            prompt: "prompt".to_string(),
        }
    }

    fn url(u: &str) -> GeneratedImage {
        GeneratedImage {
            url: Some(u.to_string()),
            b64_json: None,
        }
    }

    #[test]
    fn test_plan_names_and_skips_failures() {
        let records = vec![
            ItemRecord {
                index: 0,
                outcome: ItemOutcome::Success {
                    payload: result("cover", vec![url("https://x/1.png")]),
                },
            },
            ItemRecord {
                index: 1,
                outcome: ItemOutcome::Failure {
                    reason: "timeout".to_string(),
                },
            },
            ItemRecord {
                index: 2,
                outcome: ItemOutcome::Success {
                    payload: result("content 2", vec![url("https://x/2a.png"), url("https://x/2b.png")]),
                },
            },
        ];

        let plan = plan_downloads(&records);
        let names: Vec<&str> = plan.iter().map(|r| r.file_name.as_str()).collect();

        assert_eq!(names, vec!["note_cover.png", "note_content_2_1.png", "note_content_2_2.png"]);
        assert_eq!(plan[1].locator, "https://x/2a.png");
    }

    #[test]
    fn test_inline_image_becomes_data_locator() {
        let records = vec![ItemRecord {
            index: 0,
            outcome: ItemOutcome::Success {
                payload: result(
                    "",
                    vec![GeneratedImage {
                        url: Some("https://x/1.png".to_string()),
                        b64_json: Some("aGVsbG8=".to_string()),
                    }],
                ),
            },
        }];

        let plan = plan_downloads(&records);

        assert_eq!(plan[0].file_name, "note_item_1.png");
        assert_eq!(plan[0].locator, "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_results_file_shapes() {
        let payload = r#"{"taskId": "t", "success": true, "results": [
            {"index": 0, "outcome": "failure", "reason": "boom"}
        ]}"#;
        let bare = r#"[{"index": 0, "outcome": "success",
            "payload": {"label": "cover", "segment": "s", "images": [], "prompt": "p"}}]"#;

        let from_payload: ResultsFile = serde_json::from_str(payload).unwrap();
        let from_bare: ResultsFile = serde_json::from_str(bare).unwrap();

        assert_eq!(from_payload.into_records().len(), 1);
        assert!(from_bare.into_records()[0].outcome.is_success());
    }
}
