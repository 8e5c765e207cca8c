//! Transcript content model.
//!
//! A transcript is a list of paragraphs, each spoken by one speaker in one
//! language and made of timed atoms (words or word pieces).

use serde::{Deserialize, Serialize};

/// Speaker assigned to paragraphs before diarization names anyone.
pub const UNKNOWN_SPEAKER: &str = "Speaker 1";

/// A timed piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// The text of this atom, including any leading whitespace
    pub text: String,
    /// Start time in milliseconds
    pub start: f64,
    /// End time in milliseconds
    pub end: f64,
    /// Recognition confidence
    pub conf: f64,
}

impl Atom {
    /// Create an atom.
    pub fn new(text: impl Into<String>, start: f64, end: f64, conf: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            conf,
        }
    }
}

/// A run of atoms from one speaker in one language.
///
/// Serialized with a `"type": "paragraph"` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "paragraph")]
pub struct Paragraph {
    /// Speaker label
    pub speaker: String,
    /// Atoms in playback order
    pub children: Vec<Atom>,
    /// Language code
    pub lang: String,
}

impl Paragraph {
    /// Create an empty paragraph.
    pub fn new(speaker: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            children: Vec::new(),
            lang: lang.into(),
        }
    }

    /// Concatenated text of all atoms.
    pub fn text(&self) -> String {
        self.children.iter().map(|a| a.text.as_str()).collect()
    }

    /// Start of the first atom.
    pub fn start(&self) -> Option<f64> {
        self.children.first().map(|a| a.start)
    }

    /// End of the last atom.
    pub fn end(&self) -> Option<f64> {
        self.children.last().map(|a| a.end)
    }
}

/// The document content: an ordered list of paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Paragraphs in document order
    pub paragraphs: Vec<Paragraph>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated text of all paragraphs.
    pub fn text(&self) -> String {
        self.paragraphs.iter().map(Paragraph::text).collect()
    }

    /// Start of the first paragraph, if it has any atoms.
    pub fn start(&self) -> Option<f64> {
        self.paragraphs.first().and_then(Paragraph::start)
    }

    /// End of the last paragraph, if it has any atoms.
    pub fn end(&self) -> Option<f64> {
        self.paragraphs.last().and_then(Paragraph::end)
    }

    /// True if no paragraph contains an atom.
    ///
    /// A transcript with empty paragraphs is still empty. Atoms with empty
    /// text still count, so check [`Transcript::text`] for visible content.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.children.is_empty())
    }

    /// All atoms in document order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.paragraphs.iter().flat_map(|p| p.children.iter())
    }

    /// Group consecutive paragraphs by language.
    ///
    /// Returns `(lang, atoms)` pairs; a new block starts whenever the
    /// language differs from the previous paragraph's.
    pub fn lang_blocks(&self) -> Vec<(&str, Vec<&Atom>)> {
        let mut blocks: Vec<(&str, Vec<&Atom>)> = Vec::new();
        for paragraph in &self.paragraphs {
            let continues = blocks
                .last()
                .is_some_and(|(lang, _)| *lang == paragraph.lang);
            if continues {
                if let Some((_, atoms)) = blocks.last_mut() {
                    atoms.extend(paragraph.children.iter());
                }
            } else {
                blocks.push((paragraph.lang.as_str(), paragraph.children.iter().collect()));
            }
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(lang: &str, words: &[(&str, f64, f64)]) -> Paragraph {
        let mut p = Paragraph::new(UNKNOWN_SPEAKER, lang);
        for (text, start, end) in words {
            p.children.push(Atom::new(*text, *start, *end, 1.0));
        }
        p
    }

    #[test]
    fn text_concatenates_atoms() {
        let doc = Transcript {
            paragraphs: vec![
                paragraph("en", &[("Hello", 0.0, 1.0), (" world", 1.0, 2.0)]),
                paragraph("en", &[(" again", 3.0, 4.0)]),
            ],
        };
        assert_eq!(doc.text(), "Hello world again");
        assert_eq!(doc.start(), Some(0.0));
        assert_eq!(doc.end(), Some(4.0));
        assert_eq!(doc.atoms().count(), 3);
    }

    #[test]
    fn empty_paragraphs_make_empty_transcript() {
        let mut doc = Transcript::new();
        assert!(doc.is_empty());
        assert_eq!(doc.start(), None);

        doc.paragraphs.push(Paragraph::new("A", "en"));
        assert!(doc.is_empty());
        assert_eq!(doc.end(), None);

        doc.paragraphs[0].children.push(Atom::new("", 0.0, 0.0, 0.0));
        assert!(!doc.is_empty());
        assert_eq!(doc.text(), "");
    }

    #[test]
    fn lang_blocks_merge_consecutive_languages() {
        let doc = Transcript {
            paragraphs: vec![
                paragraph("en", &[("a", 0.0, 1.0)]),
                paragraph("en", &[("b", 1.0, 2.0)]),
                paragraph("de", &[("c", 2.0, 3.0)]),
                paragraph("en", &[("d", 3.0, 4.0)]),
            ],
        };

        let blocks = doc.lang_blocks();
        let summary: Vec<(&str, String)> = blocks
            .iter()
            .map(|(lang, atoms)| (*lang, atoms.iter().map(|a| a.text.as_str()).collect()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("en", "ab".to_string()),
                ("de", "c".to_string()),
                ("en", "d".to_string())
            ]
        );
    }

    #[test]
    fn paragraphs_serialize_with_type_tag() {
        let doc = Transcript {
            paragraphs: vec![paragraph("en", &[("Hi", 0.0, 1.0)])],
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["paragraphs"][0]["type"], "paragraph");
        assert_eq!(value["paragraphs"][0]["speaker"], UNKNOWN_SPEAKER);

        let back: Transcript = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn lang_blocks_of_empty_transcript() {
        assert!(Transcript::new().lang_blocks().is_empty());
    }
}
