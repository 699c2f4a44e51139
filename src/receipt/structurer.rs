//! Receipt structuring
//!
//! Turns unstructured receipt material (OCR text, transcripts, raw image
//! bytes) into typed [`Receipt`] records via the model. One receipt source
//! can yield several receipts, so every path returns a `Vec`.

use super::model::{Category, Receipt};
use crate::error::{QuittungError, Result};
use crate::llm::{extract_json_block, LlmClient};
use async_trait::async_trait;

/// Structuring seam. Implementations own their prompt and transport.
#[async_trait]
pub trait ReceiptStructurer: Send + Sync {
    /// Structure text that came out of OCR or speech transcription.
    async fn structure_text(&self, text: &str) -> Result<Vec<Receipt>>;

    /// Structure an image directly, skipping OCR entirely.
    async fn structure_image(&self, image: &[u8], mime: &str) -> Result<Vec<Receipt>>;
}

pub struct LlmStructurer {
    llm: LlmClient,
}

impl LlmStructurer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// The model is asked for an array but sometimes answers with a single
    /// object; accept both.
    fn parse_receipts(response: &str) -> Result<Vec<Receipt>> {
        let json = extract_json_block(response);
        if let Ok(receipts) = serde_json::from_str::<Vec<Receipt>>(&json) {
            return Ok(receipts);
        }
        let single: Receipt = serde_json::from_str(&json).map_err(|e| {
            QuittungError::Structuring(format!("Unusable structuring output: {}", e))
        })?;
        Ok(vec![single])
    }

    fn shape_instructions() -> String {
        format!(
            "Return the result as a JSON array of receipts. Every receipt is an object with keys: \
             vendor (string), date (string), total (number) and items (array of objects with keys \
             name, quantity, price_per_item and category).\n\
             The category must be one of: {}.",
            Category::LABELS.join(", ")
        )
    }
}

#[async_trait]
impl ReceiptStructurer for LlmStructurer {
    async fn structure_text(&self, text: &str) -> Result<Vec<Receipt>> {
        let prompt = format!(
            "Extract the structured information from this receipt OCR text:\n---\n{}\n---\n{}\nKeep the same language.",
            text,
            Self::shape_instructions()
        );
        let response = self.llm.complete_json(&prompt).await?;
        Self::parse_receipts(&response)
    }

    async fn structure_image(&self, image: &[u8], mime: &str) -> Result<Vec<Receipt>> {
        let prompt = format!(
            "Extract the structured information from this receipt image.\n{}\nKeep the same language.",
            Self::shape_instructions()
        );
        let response = self.llm.complete_with_image(&prompt, image, mime).await?;
        Self::parse_receipts(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::model::Category;

    #[test]
    fn test_parse_receipts_accepts_fenced_array() {
        let response = r#"```json
[{"vendor": "REWE", "date": "2025-02-01", "total": 23.40,
  "items": [{"name": "Milk", "quantity": 2, "price_per_item": 1.20, "category": "Groceries"}]}]
```"#;
        let receipts = LlmStructurer::parse_receipts(response).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].items[0].category, Category::Groceries);
    }

    #[test]
    fn test_parse_receipts_accepts_single_object() {
        let response = r#"{"vendor": "Esso", "date": "2025-02-02", "total": 50.0, "items": []}"#;
        let receipts = LlmStructurer::parse_receipts(response).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].vendor, "Esso");
    }

    #[test]
    fn test_parse_receipts_rejects_garbage() {
        let err = LlmStructurer::parse_receipts("I could not read the receipt, sorry.");
        assert!(err.is_err());
    }

    #[test]
    fn test_shape_instructions_enumerate_all_categories() {
        let instructions = LlmStructurer::shape_instructions();
        for label in Category::LABELS {
            assert!(instructions.contains(label), "missing category {}", label);
        }
    }
}
