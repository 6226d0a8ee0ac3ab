//! Schema-driven record extraction from listing pages.

use crate::error::ExtractionError;
use crate::models::ExtractedRecord;
use crate::schema::OtaSchema;
use scraper::{ElementRef, Html};
use tracing::{debug, trace};

/// Extract one record per content block in `html`.
///
/// Records follow document order and their fields follow schema order. A
/// field missing from a block is left out of that record; a block yielding
/// no fields at all is dropped.
pub fn extract(html: &str, schema: &OtaSchema) -> Result<Vec<ExtractedRecord>, ExtractionError> {
    let content_block = schema
        .content_block
        .as_ref()
        .ok_or_else(|| ExtractionError::MissingContentBlock(schema.ota_id.clone()))?;

    let document = Html::parse_document(html);
    let blocks: Vec<ElementRef> = document.select(&content_block.selector).collect();
    if blocks.is_empty() {
        return Err(ExtractionError::NoContent {
            ota: schema.ota_id.clone(),
            selector: content_block.css.clone(),
        });
    }
    debug!("OTA {}: found {} content blocks", schema.ota_id, blocks.len());

    let mut records = Vec::with_capacity(blocks.len());
    for (idx, block) in blocks.iter().enumerate() {
        let mut record = ExtractedRecord::new();
        for field in &schema.fields {
            match block.select(&field.selector).next() {
                Some(element) => record.insert(field.variable_name.as_str(), element_text(element)),
                None => trace!(
                    "OTA {}: block {} has no {} ({})",
                    schema.ota_id,
                    idx,
                    field.variable_name,
                    field.css
                ),
            }
        }

        if record.is_empty() {
            debug!("OTA {}: block {} yielded no fields, dropping it", schema.ota_id, idx);
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

/// Text content with surrounding whitespace removed and inner runs collapsed
fn element_text(element: ElementRef) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
