//! Batch deduplication by document id

use crate::document::NewDocument;
use std::collections::HashSet;

/// Drop documents whose id already appeared earlier in the batch
///
/// # Arguments
/// * `documents` - (resolved id, document) pairs in submission order
///
/// # Returns
/// The first occurrence of every id, in order, and the number dropped
pub fn deduplicate_documents(
    documents: Vec<(String, NewDocument)>,
) -> (Vec<(String, NewDocument)>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let total = documents.len();

    let kept: Vec<(String, NewDocument)> = documents
        .into_iter()
        .filter(|(id, _)| seen.insert(id.clone()))
        .collect();

    let dropped = total - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentMetadata;

    fn doc(code: &str, explanation: &str) -> (String, NewDocument) {
        let document = NewDocument::new(code, explanation, DocumentMetadata::default());
        (document.resolved_id(), document)
    }

    #[test]
    fn test_deduplication() {
        let docs = vec![
            doc("print(1)", "first"),
            doc("print(2)", "other"),
            doc("print(1)", "second"), // Duplicate
        ];

        let (kept, dropped) = deduplicate_documents(docs);

        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].1.explanation, "first"); // Keeps first occurrence
        assert_eq!(kept[1].1.code, "print(2)");
    }

    #[test]
    fn test_explicit_ids_collide() {
        let a = NewDocument::new("a", "", DocumentMetadata::default()).with_id("same");
        let b = NewDocument::new("b", "", DocumentMetadata::default()).with_id("same");

        let (kept, dropped) =
            deduplicate_documents(vec![(a.resolved_id(), a), (b.resolved_id(), b)]);
        assert_eq!(dropped, 1);
        assert_eq!(kept[0].1.code, "a");
    }
}
