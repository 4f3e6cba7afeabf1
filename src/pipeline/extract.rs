//! PDF text extraction: flatten every page's text runs into one string.
//!
//! Each page is decoded into its content-stream operations and the strings
//! passed to the text-showing operators are collected in the order the
//! stream lists them. Those strings are glyph codes, so each one is decoded
//! through the encoding of the font selected by the preceding `Tf` (standard
//! and WinAnsi/Mac tables, or the font's ToUnicode CMap for composite fonts).
//! No geometric re-ordering or reflow happens; a page's fragments are joined
//! with a single space and prefixed by a `--- Página N ---` header.
//!
//! Parsing is CPU-bound, so [`extract_text_async`] moves it onto tokio's
//! blocking pool.

use crate::error::AgentError;
use crate::prompts::page_header;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Font resource name → decoder for the text shown in that font.
type PageEncodings<'a> = BTreeMap<Vec<u8>, Encoding<'a>>;

/// Extract the text of every page, in page order, with page headers.
///
/// A page without text still gets its header. A document with zero pages
/// yields an empty string. Any parse failure, of the document or of a single
/// page's content, is an [`AgentError::Extraction`] carrying the parser's
/// message.
pub fn extract_text(bytes: &[u8]) -> Result<String, AgentError> {
    let doc = Document::load_mem(bytes).map_err(AgentError::extraction)?;
    let pages = doc.get_pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut full_text = String::new();
    for (page_num, page_id) in pages {
        let fragments = page_fragments(&doc, page_id)
            .map_err(|e| AgentError::extraction(format!("page {page_num}: {e}")))?;
        debug!("Page {}: {} text fragments", page_num, fragments.len());

        full_text.push('\n');
        full_text.push_str(&page_header(page_num as usize));
        full_text.push('\n');
        full_text.push_str(&fragments.join(" "));
        full_text.push('\n');
    }

    Ok(full_text.trim().to_string())
}

/// Run [`extract_text`] on the blocking pool.
pub async fn extract_text_async(bytes: Arc<[u8]>) -> Result<String, AgentError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|e| AgentError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn page_fragments(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings = page_encodings(doc, page_id)?;
    let content = Content::decode(&doc.get_page_content(page_id)?)?;
    Ok(text_fragments(&content.operations, &encodings))
}

/// Decoders for the fonts a page declares. A font whose encoding cannot be
/// resolved is left out, so text shown in it is skipped.
fn page_encodings(doc: &Document, page_id: ObjectId) -> lopdf::Result<PageEncodings<'_>> {
    let mut encodings = PageEncodings::new();
    for (name, font) in doc.get_page_fonts(page_id)? {
        match font.get_font_encoding(doc) {
            Ok(encoding) => {
                encodings.insert(name, encoding);
            }
            Err(e) => warn!(
                "Font /{} has no usable encoding, its text is skipped: {}",
                String::from_utf8_lossy(&name),
                e
            ),
        }
    }
    Ok(encodings)
}

/// Collect the strings shown by `Tj`, `'`, `"` and `TJ`, in stream order.
///
/// A `TJ` array is one fragment: its string elements are concatenated and
/// the numeric kerning adjustments between them are dropped.
fn text_fragments(operations: &[Operation], encodings: &PageEncodings<'_>) -> Vec<String> {
    let mut current: Option<&Encoding<'_>> = None;
    let mut fragments = Vec::new();
    for op in operations {
        let shown: Vec<&[u8]> = match op.operator.as_str() {
            "Tf" => {
                current = op
                    .operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .and_then(|name| encodings.get(name));
                continue;
            }
            "Tj" | "'" => match op.operands.first().and_then(string_bytes) {
                Some(bytes) => vec![bytes],
                None => continue,
            },
            "\"" => match op.operands.get(2).and_then(string_bytes) {
                Some(bytes) => vec![bytes],
                None => continue,
            },
            "TJ" => match op.operands.first() {
                Some(Object::Array(items)) => items.iter().filter_map(string_bytes).collect(),
                _ => continue,
            },
            _ => continue,
        };

        let Some(encoding) = current else {
            debug!("Text shown without a resolvable font; skipped");
            continue;
        };
        let mut fragment = String::new();
        for bytes in shown {
            match Document::decode_text(encoding, bytes) {
                Ok(text) => fragment.push_str(&text),
                Err(e) => warn!("Undecodable text run skipped: {}", e),
            }
        }
        fragments.push(fragment);
    }
    fragments
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}
