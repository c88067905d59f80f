//! UCD Loader: parses `ucd.all.flat.xml` into a total semantic order
//! over every assigned codepoint.
//!
//! The ordering key mirrors the original ingestor's clustering rationale
//! (general category, then script, then a UCA-derived weight, then Han
//! radical/stroke, then a base codepoint for canonical variants, with the
//! raw codepoint as a final tiebreak) without reproducing every UCD field:
//! only what feeds the order and the Atom's surface properties is kept.

use crate::error::{Result, SubstrateError};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::io::BufRead;

/// Per-codepoint properties relevant to semantic ordering and surface
/// rendering. Everything else in the UCD XML is dropped at parse time.
#[derive(Debug, Clone, Default)]
pub struct CodepointRecord {
    pub codepoint: u32,
    pub name: String,
    pub general_category: String,
    pub script: String,
    pub uca_primary_weight: u32,
    pub han_radical: u32,
    pub han_strokes: i32,
    /// For canonical-equivalent variants (e.g. fullwidth forms), the
    /// codepoint of the base form; 0 when the codepoint is its own base.
    pub base_codepoint: u32,
    /// Position in the total semantic order, assigned after all records are
    /// collected and sorted; filled in by [`UcdLoader::total_order`].
    pub sequence_index: u32,
}

impl CodepointRecord {
    /// Sort key implementing the total semantic order: category, script,
    /// UCA weight, radical, strokes, base codepoint, codepoint tiebreak.
    fn order_key(&self) -> (String, String, u32, u32, i32, u32, u32) {
        (
            self.general_category.clone(),
            self.script.clone(),
            self.uca_primary_weight,
            self.han_radical,
            self.han_strokes,
            self.base_codepoint,
            self.codepoint,
        )
    }
}

/// Parses UCD XML (the flattened `ucd.all.flat.xml` distribution) into an
/// ordered list of [`CodepointRecord`]s.
pub struct UcdLoader;

impl UcdLoader {
    /// Parse a `ucd.all.flat.xml` document and return every assigned
    /// codepoint's record, sorted and indexed by the total semantic order.
    pub fn load_xml<R: BufRead>(reader: R) -> Result<Vec<CodepointRecord>> {
        let mut xml = Reader::from_reader(reader);
        xml.trim_text(true);

        let mut records = Vec::new();
        let mut buf = Vec::new();

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                    let local = e.local_name();
                    if local.as_ref() == b"char" {
                        if let Some(record) = parse_char_element(&e)? {
                            records.push(record);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(SubstrateError::Ucd(format!(
                        "xml parse error at position {}: {err}",
                        xml.buffer_position()
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(Self::total_order(records))
    }

    /// Sort by the total semantic order and stamp each record's
    /// `sequence_index` with its rank, which is what seeds the
    /// Super-Fibonacci lattice position (index `i` of `n`).
    pub fn total_order(mut records: Vec<CodepointRecord>) -> Vec<CodepointRecord> {
        records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        for (i, record) in records.iter_mut().enumerate() {
            record.sequence_index = i as u32;
        }
        records
    }
}

fn parse_char_element(e: &quick_xml::events::BytesStart) -> Result<Option<CodepointRecord>> {
    let mut attrs: HashMap<String, String> = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SubstrateError::Ucd(format!("bad attribute: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = String::from_utf8_lossy(attr.value.as_ref()).to_string();
        attrs.insert(key, value);
    }

    // cp is absent for ranged <group>/<char> spans in the flat format; those
    // are skipped here since per-codepoint seeding needs explicit codepoints.
    let cp = match attrs.get("cp") {
        Some(v) => u32::from_str_radix(v, 16)
            .map_err(|_| SubstrateError::Ucd(format!("bad cp attribute: {v}")))?,
        None => return Ok(None),
    };

    let general_category = attrs.get("gc").cloned().unwrap_or_else(|| "Cn".to_string());
    if general_category == "Cn" || general_category == "Co" || general_category == "Cs" {
        // Unassigned, private-use and surrogate codepoints are not seeded.
        return Ok(None);
    }

    let uca_primary_weight = attrs
        .get("dm")
        .and_then(|dm| dm.chars().next())
        .map(|c| c as u32)
        .unwrap_or(cp);

    Ok(Some(CodepointRecord {
        codepoint: cp,
        name: attrs.get("na").cloned().unwrap_or_default(),
        general_category,
        script: attrs.get("sc").cloned().unwrap_or_else(|| "Zzzz".to_string()),
        uca_primary_weight,
        han_radical: attrs
            .get("kRSUnicode")
            .and_then(|s| s.split('.').next())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        han_strokes: attrs
            .get("kRSUnicode")
            .and_then(|s| s.split('.').nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        base_codepoint: attrs
            .get("dm")
            .filter(|dm| attrs.get("dt").map(|dt| dt == "can").unwrap_or(false))
            .and_then(|dm| dm.split_whitespace().next())
            .and_then(|s| u32::from_str_radix(s, 16).ok())
            .unwrap_or(0),
        sequence_index: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_char_elements() {
        let xml = br#"<?xml version="1.0"?>
<ucd>
<repertoire>
<char cp="0041" na="LATIN CAPITAL LETTER A" gc="Lu" sc="Latn"/>
<char cp="0030" na="DIGIT ZERO" gc="Nd" sc="Zyyy"/>
<char cp="E000" na="" gc="Co"/>
</repertoire>
</ucd>
"#;
        let records = UcdLoader::load_xml(&xml[..]).unwrap();
        assert_eq!(records.len(), 2, "private-use codepoint should be skipped");
    }

    #[test]
    fn total_order_assigns_dense_sequence_indices() {
        let records = vec![
            CodepointRecord {
                codepoint: 0x41,
                general_category: "Lu".into(),
                script: "Latn".into(),
                ..Default::default()
            },
            CodepointRecord {
                codepoint: 0x30,
                general_category: "Nd".into(),
                script: "Zyyy".into(),
                ..Default::default()
            },
        ];
        let ordered = UcdLoader::total_order(records);
        let indices: Vec<u32> = ordered.iter().map(|r| r.sequence_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
