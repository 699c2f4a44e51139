//! Receipt extraction
//!
//! From an uploaded image or voice memo to typed receipt records: classify
//! the file, get text out of it (or hand the image straight to the model),
//! then structure that text against the closed category taxonomy.

pub mod ingest;
pub mod model;
pub mod structurer;

pub use ingest::{detect_file_kind, join_ocr_segments, FileKind, OcrProvider, OcrSegment, TranscriptionProvider};
pub use model::{Category, Receipt, ReceiptItem};
pub use structurer::{LlmStructurer, ReceiptStructurer};
