//! Upload classification and extraction providers
//!
//! Decides what an incoming file is and defines the boundaries to the
//! external engines that turn it into text. The engines themselves (OCR,
//! speech transcription) live outside this crate; hosts plug them in
//! through the provider traits.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Audio,
    Unknown,
}

/// Classify an upload by MIME type first, file extension second.
pub fn detect_file_kind(path: &Path) -> FileKind {
    if let Some(mime) = mime_guess::from_path(path).first() {
        match mime.type_().as_str() {
            "image" => return FileKind::Image,
            "audio" => return FileKind::Audio,
            _ => {}
        }
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        FileKind::Image
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        FileKind::Audio
    } else {
        FileKind::Unknown
    }
}

/// One recognized text segment with the engine's confidence in it.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSegment {
    pub text: String,
    pub confidence: f32,
}

/// Optical character recognition boundary: image bytes in, ordered text
/// segments out.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> Result<Vec<OcrSegment>>;
}

/// Speech transcription boundary: audio bytes in, transcript out.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Join OCR segments into the block of text handed to the structurer,
/// one segment per line, reading order preserved.
pub fn join_ocr_segments(segments: &[OcrSegment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_images_by_mime() {
        for name in ["receipt.jpg", "receipt.JPEG", "scan.png", "old.bmp", "fax.tiff"] {
            assert_eq!(detect_file_kind(Path::new(name)), FileKind::Image, "{}", name);
        }
    }

    #[test]
    fn test_detects_audio_by_mime() {
        for name in ["memo.mp3", "memo.WAV", "memo.m4a", "memo.ogg"] {
            assert_eq!(detect_file_kind(Path::new(name)), FileKind::Audio, "{}", name);
        }
    }

    #[test]
    fn test_unknown_types_are_unknown() {
        assert_eq!(detect_file_kind(Path::new("notes.txt")), FileKind::Unknown);
        assert_eq!(detect_file_kind(Path::new("data.pdf")), FileKind::Unknown);
        assert_eq!(detect_file_kind(Path::new("no_extension")), FileKind::Unknown);
    }

    #[test]
    fn test_join_preserves_reading_order() {
        let segments = vec![
            OcrSegment {
                text: "REWE Markt".to_string(),
                confidence: 0.98,
            },
            OcrSegment {
                text: "Summe 23,40".to_string(),
                confidence: 0.91,
            },
        ];
        assert_eq!(join_ocr_segments(&segments), "REWE Markt\nSumme 23,40");
        assert_eq!(join_ocr_segments(&[]), "");
    }
}
