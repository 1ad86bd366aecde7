//! Normalizes status-endpoint bodies into [`JobStatusSnapshot`]s.
//!
//! The status endpoint has changed layout several times. Each known layout is
//! one entry in [`SHAPES`], tried in order; the first structural match that
//! classifies to a known state decides the snapshot. A match that classifies to
//! `Unknown` only wins when no later shape does better. Resolution never fails:
//! anything unrecognized becomes [`JobState::Unknown`] with the raw body kept
//! for diagnostics.

use serde_json::Value;

use crate::models::job::{JobResult, JobState, JobStatusSnapshot, ResponseShape};

/// Fields pulled out of a payload by a shape's extractor.
#[derive(Default)]
struct Extracted {
    status: Option<String>,
    worker_id: Option<String>,
    delay_time: Option<u64>,
    input_image: Option<String>,
    outputs: Vec<String>,
}

struct Shape {
    kind: ResponseShape,
    matches: fn(&Value) -> bool,
    extract: fn(&Value) -> Extracted,
}

/// Known layouts, highest priority first.
const SHAPES: &[Shape] = &[
    Shape { kind: ResponseShape::QueueWrapper, matches: is_queue_wrapper, extract: extract_queue_wrapper },
    Shape { kind: ResponseShape::SimpleStatus, matches: is_simple_status, extract: extract_simple_status },
    Shape { kind: ResponseShape::NestedSuccess, matches: is_nested_success, extract: extract_nested_success },
    Shape { kind: ResponseShape::Direct, matches: is_direct, extract: extract_direct },
];

/// Resolve a raw response body. Non-JSON bodies resolve to `Unknown`.
pub fn resolve(raw_body: &str) -> JobStatusSnapshot {
    match serde_json::from_str::<Value>(raw_body) {
        Ok(value) => resolve_value(value),
        Err(_) => JobStatusSnapshot::unknown(Value::String(raw_body.to_string())),
    }
}

/// Resolve an already-parsed payload.
pub fn resolve_value(raw: Value) -> JobStatusSnapshot {
    let mut matched: Vec<(ResponseShape, JobState, Extracted)> = SHAPES
        .iter()
        .filter(|shape| (shape.matches)(&raw))
        .map(|shape| {
            let extracted = (shape.extract)(&raw);
            let state = classify(extracted.status.as_deref(), &extracted.outputs);
            (shape.kind, state, extracted)
        })
        .collect();

    if matched.is_empty() {
        return JobStatusSnapshot::unknown(raw);
    }
    let pick = matched
        .iter()
        .position(|(_, state, _)| *state != JobState::Unknown)
        .unwrap_or(0);
    let (kind, state, extracted) = matched.swap_remove(pick);

    let result = (state == JobState::Succeeded).then(|| JobResult {
        input_image: extracted.input_image,
        output_urls: extracted.outputs,
    });

    JobStatusSnapshot {
        state,
        shape: Some(kind),
        status: extracted.status,
        worker_id: extracted.worker_id,
        delay_time: extracted.delay_time,
        result,
        raw,
    }
}

/// Error keywords win over outputs; outputs win over status words.
fn classify(status: Option<&str>, outputs: &[String]) -> JobState {
    let status = status.map(str::to_ascii_lowercase);
    if let Some(status) = status.as_deref() {
        if status.contains("failed") || status.contains("error") {
            return JobState::Failed;
        }
    }
    if !outputs.is_empty() {
        return JobState::Succeeded;
    }
    match status.as_deref() {
        Some("in_queue" | "queued" | "pending") => JobState::Queued,
        Some("in_progress" | "running" | "processing") => JobState::Running,
        _ => JobState::Unknown,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Non-empty strings from a JSON array; anything else yields an empty list.
fn url_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn is_queue_wrapper(value: &Value) -> bool {
    value
        .get("data")
        .is_some_and(|data| data.get("status").is_some_and(Value::is_string))
}

fn extract_queue_wrapper(value: &Value) -> Extracted {
    let data = &value["data"];
    let output = data.get("output");
    let mut outputs = url_list(output.and_then(|o| o.get("output_images")));
    if outputs.is_empty() {
        outputs = url_list(output.and_then(|o| o.get("generated_image")));
    }
    Extracted {
        status: str_field(data, "status"),
        worker_id: str_field(data, "workerId"),
        delay_time: data.get("delayTime").and_then(Value::as_u64),
        input_image: output.and_then(|o| str_field(o, "input_image")),
        outputs,
    }
}

fn is_simple_status(value: &Value) -> bool {
    value.get("status").is_some_and(Value::is_string)
}

fn extract_simple_status(value: &Value) -> Extracted {
    Extracted {
        status: str_field(value, "status"),
        input_image: str_field(value, "input_image"),
        outputs: url_list(value.get("output_images")),
        ..Extracted::default()
    }
}

fn is_nested_success(value: &Value) -> bool {
    value.get("success").is_some_and(Value::is_object)
}

fn extract_nested_success(value: &Value) -> Extracted {
    let success = &value["success"];
    Extracted {
        status: str_field(success, "status"),
        input_image: str_field(success, "original_image"),
        outputs: url_list(success.get("generated_image")),
        ..Extracted::default()
    }
}

fn is_direct(value: &Value) -> bool {
    value.get("input_image").is_some() && value.get("output_images").is_some()
}

fn extract_direct(value: &Value) -> Extracted {
    Extracted {
        input_image: str_field(value, "input_image"),
        outputs: url_list(value.get("output_images")),
        ..Extracted::default()
    }
}
