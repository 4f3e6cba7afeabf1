//! Prompt templates.
//!
//! Every literal that ends up in the request body lives here, so the exact
//! wording can be checked by unit tests without a provider.

/// Lead-in placed before the extracted document text in the user message.
pub const DOCUMENT_PREAMBLE: &str = "Aquí está el contenido del PDF:";

/// Header written before each page's text. `{n}` is the 1-indexed page number.
pub fn page_header(page_num: usize) -> String {
    format!("--- Página {page_num} ---")
}

/// Build the user message: preamble, document text and, when present and
/// non-blank, the auxiliary message.
pub fn user_message(document_text: &str, auxiliary_message: Option<&str>) -> String {
    let mut content = format!("{DOCUMENT_PREAMBLE}\n\n{document_text}");
    if let Some(aux) = auxiliary_message.filter(|m| !m.trim().is_empty()) {
        content.push_str("\n\n");
        content.push_str(aux);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_without_auxiliary() {
        assert_eq!(
            user_message("Hello world", None),
            "Aquí está el contenido del PDF:\n\nHello world"
        );
    }

    #[test]
    fn user_message_with_auxiliary() {
        assert_eq!(
            user_message("Hello world", Some("¿Cuáles son mis gastos más altos?")),
            "Aquí está el contenido del PDF:\n\nHello world\n\n¿Cuáles son mis gastos más altos?"
        );
    }

    #[test]
    fn blank_auxiliary_is_omitted() {
        assert_eq!(user_message("x", Some("   ")), user_message("x", None));
        assert_eq!(user_message("x", Some("")), user_message("x", None));
    }

    #[test]
    fn header_format() {
        assert_eq!(page_header(3), "--- Página 3 ---");
    }
}
