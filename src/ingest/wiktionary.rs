//! Wiktionary ingester: parses a simplified XML dump of `<entry>` elements
//! (headword plus typed `<sense>`/`<relation>` children) into synonym,
//! antonym, hypernym and gloss relations.
//!
//! Real Wiktionary XML dumps are MediaWiki wikitext inside `<page><text>`;
//! a full wikitext parser is out of scope, so this targets a pre-extracted
//! flat schema of the form:
//! ```xml
//! <entry word="happy">
//!   <gloss text="feeling or showing pleasure"/>
//!   <relation type="synonym" target="glad"/>
//!   <relation type="antonym" target="sad"/>
//! </entry>
//! ```

use crate::cache::IngestionCache;
use crate::error::{Result, SubstrateError};
use crate::ingest::common::{self, content_id_for_source, IngestStats, RelationCandidate, SourceKind};
use crate::storage::AsyncFlusher;
use crate::unicode::AtomLookup;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

struct WiktionaryEntry {
    word: String,
    gloss: Option<String>,
    relations: Vec<(SourceKind, String)>,
}

fn parse_entries(xml: &str) -> Result<Vec<WiktionaryEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<WiktionaryEntry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"entry" => {
                let word = attr(&e, "word").unwrap_or_default();
                current = Some(WiktionaryEntry {
                    word,
                    gloss: None,
                    relations: Vec::new(),
                });
            }
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"gloss" => {
                if let Some(entry) = current.as_mut() {
                    entry.gloss = attr(&e, "text");
                }
            }
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"relation" => {
                if let Some(entry) = current.as_mut() {
                    let kind = attr(&e, "type").unwrap_or_default();
                    let target = attr(&e, "target").unwrap_or_default();
                    if let Some(kind) = relation_kind(&kind) {
                        if !target.is_empty() {
                            entry.relations.push((kind, target));
                        }
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"entry" => {
                if let Some(entry) = current.take() {
                    entries.push(entry);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SubstrateError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn relation_kind(tag: &str) -> Option<SourceKind> {
    match tag {
        "synonym" => Some(SourceKind::Synonym),
        "antonym" => Some(SourceKind::Antonym),
        "hypernym" => Some(SourceKind::Hypernym),
        _ => None,
    }
}

fn attr(e: &quick_xml::events::BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(a.value.as_ref()).to_string())
        } else {
            None
        }
    })
}

pub async fn ingest_wiktionary(
    source_name: &str,
    xml: &str,
    lookup: &dyn AtomLookup,
    flusher: &AsyncFlusher,
) -> Result<IngestStats> {
    let content_id = content_id_for_source(source_name);
    let mut cache = IngestionCache::new();
    let entries = parse_entries(xml)?;

    let chunks: Vec<_> = entries
        .into_iter()
        .map(|entry| {
            let mut texts = vec![entry.word.clone()];
            let mut candidates = Vec::new();

            if let Some(gloss) = entry.gloss {
                texts.push(gloss.clone());
                candidates.push(RelationCandidate {
                    left_text: entry.word.clone(),
                    right_text: gloss,
                    kind: SourceKind::Gloss,
                });
            }
            for (kind, target) in entry.relations {
                texts.push(target.clone());
                candidates.push(RelationCandidate {
                    left_text: entry.word.clone(),
                    right_text: target,
                    kind,
                });
            }
            (texts, candidates)
        })
        .collect();

    common::ingest_chunks(chunks, content_id, lookup, &mut cache, flusher).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entry_with_gloss_and_relations() {
        let xml = r#"<root>
<entry word="happy">
  <gloss text="feeling pleasure"/>
  <relation type="synonym" target="glad"/>
  <relation type="antonym" target="sad"/>
</entry>
</root>"#;
        let entries = parse_entries(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word, "happy");
        assert_eq!(entries[0].gloss.as_deref(), Some("feeling pleasure"));
        assert_eq!(entries[0].relations.len(), 2);
    }

    #[test]
    fn unknown_relation_types_are_dropped() {
        let xml = r#"<root><entry word="x"><relation type="derived" target="y"/></entry></root>"#;
        let entries = parse_entries(xml).unwrap();
        assert!(entries[0].relations.is_empty());
    }
}
