//! Source documents and the metadata copied onto every chunk.

use serde::{Deserialize, Serialize};

/// A regulatory document as supplied for indexing.
///
/// Every field is optional in the JSON form. Missing strings default to
/// empty. The four fields printed in the regulatory header stay `None` when
/// absent so the header can tell a missing value from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub business_group: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_type: Option<String>,
    pub source_link: String,
}

/// Flat metadata record attached verbatim to each chunk of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub title: String,
    pub date: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub level: String,
    pub business_group: String,
    pub region: String,
    pub risk_type: String,
    pub source_link: String,
}

impl Document {
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            document_id: self.id.clone(),
            title: self.title.clone(),
            date: self.date.clone().unwrap_or_default(),
            doc_type: self.doc_type.clone().unwrap_or_default(),
            level: self.level.clone().unwrap_or_default(),
            business_group: self.business_group.clone(),
            region: self.region.clone(),
            risk_type: self.risk_type.clone().unwrap_or_default(),
            source_link: self.source_link.clone(),
        }
    }

    /// Build the text that gets chunked and embedded.
    ///
    /// Non-empty content is preceded by a regulatory header (document type,
    /// risk type, publication date, level) so that queries naming one of
    /// those values can match on the header alone. Absent header fields are
    /// printed as a fallback; present but empty ones are printed as-is.
    ///
    /// # Examples
    ///
    /// ```
    /// use regrag::document::Document;
    ///
    /// let doc = Document {
    ///     title: "Basel III".into(),
    ///     content: "CET1 minimum is 4.5%.".into(),
    ///     risk_type: Some("Capital Risk".into()),
    ///     ..Document::default()
    /// };
    /// let text = doc.composite_text();
    /// assert!(text.starts_with("Title: Basel III"));
    /// assert!(text.contains("RISK TYPE: Capital Risk"));
    /// ```
    pub fn composite_text(&self) -> String {
        let content = if self.content.is_empty() {
            String::new()
        } else {
            format!(
                "\nREGULATORY DOCUMENT: {}\nRISK TYPE: {}\nPUBLICATION DATE: {}\nREGULATORY LEVEL: {}\n\n{}\n",
                self.doc_type.as_deref().unwrap_or("Banking Document"),
                self.risk_type.as_deref().unwrap_or("General"),
                self.date.as_deref().unwrap_or("Unknown"),
                self.level.as_deref().unwrap_or("Unknown"),
                self.content,
            )
        };

        format!(
            "Title: {}\n\nSummary: {}\n\nContent: {}",
            self.title, self.summary, content
        )
    }
}
