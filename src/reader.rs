/*!
 * XML reader for flattree documents
 *
 * Accepts exactly what [`XmlWriter`](crate::writer::XmlWriter) produces,
 * with or without presentation wrapping.
 */

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Result;
use crate::types::{Document, Entry};
use crate::writer::{FENCE_CLOSE, FENCE_OPEN, FILE_TAG, ROOT_TAG};
use crate::{bail, ensure, error};

/// Attributes of a `<file>` element
struct FileHeader {
    path: String,
    perm: String,
    hex: bool,
}

/// Reader for serialized documents
#[derive(Debug, Default)]
pub struct XmlReader;

impl XmlReader {
    /// Create a new reader
    pub fn new() -> Self {
        Self
    }

    /// Parse a serialized document
    pub fn decode(&self, input: &[u8]) -> Result<Document> {
        let text = match std::str::from_utf8(input) {
            Ok(text) => text,
            Err(e) => bail!(Parse, "document is not valid UTF-8: {}", e),
        };
        let xml = unwrap_presentation(text);

        let mut reader = Reader::from_str(xml);
        let mut document = Document::new();
        let mut seen_root = false;
        let mut finished = false;
        let mut current: Option<(FileHeader, String)> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| error!(Parse, "malformed XML at byte {}: {}", position, e))?;

            match event {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Start(e) if !seen_root => {
                    ensure_root(&e)?;
                    seen_root = true;
                }
                Event::Empty(e) if !seen_root => {
                    ensure_root(&e)?;
                    seen_root = true;
                    finished = true;
                }
                Event::Start(e) => {
                    ensure!(current.is_none(), Parse, "nested element inside <{}>", FILE_TAG);
                    current = Some((read_header(&e)?, String::new()));
                }
                Event::Empty(e) => {
                    ensure!(current.is_none(), Parse, "nested element inside <{}>", FILE_TAG);
                    let header = read_header(&e)?;
                    insert(&mut document, header, String::new())?;
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| error!(Parse, "bad text at byte {}: {}", position, err))?;
                    match current.as_mut() {
                        Some((_, content)) => content.push_str(&text),
                        None => ensure!(
                            text.trim().is_empty(),
                            Parse,
                            "unexpected text outside <{}>",
                            FILE_TAG
                        ),
                    }
                }
                Event::CData(e) => match current.as_mut() {
                    Some((_, content)) => content.push_str(&String::from_utf8_lossy(&e)),
                    None => bail!(Parse, "unexpected CDATA outside <{}>", FILE_TAG),
                },
                Event::End(e) => match current.take() {
                    Some((header, content)) => {
                        ensure!(
                            e.name().as_ref() == FILE_TAG.as_bytes(),
                            Parse,
                            "mismatched closing tag"
                        );
                        insert(&mut document, header, content)?;
                    }
                    None => {
                        ensure!(
                            e.name().as_ref() == ROOT_TAG.as_bytes(),
                            Parse,
                            "mismatched closing tag"
                        );
                        finished = true;
                    }
                },
                Event::Eof => break,
            }
        }

        ensure!(seen_root, Parse, "missing <{}> element", ROOT_TAG);
        ensure!(finished, Parse, "unterminated <{}> element", ROOT_TAG);
        Ok(document)
    }
}

/// Strip the fence and trailer added by presentation wrapping
///
/// Input without an opening fence is returned unchanged.
pub fn unwrap_presentation(text: &str) -> &str {
    let trimmed = text.trim_start();
    let Some(rest) = trimmed.strip_prefix(FENCE_OPEN) else {
        return text;
    };
    // Skip the remainder of the fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => "",
    };

    match body.rfind(&format!("\n{}", FENCE_CLOSE)) {
        Some(end) => &body[..end + 1],
        None => body,
    }
}

fn ensure_root(e: &BytesStart) -> Result<()> {
    ensure!(
        e.name().as_ref() == ROOT_TAG.as_bytes(),
        Parse,
        "expected <{}> root element, found <{}>",
        ROOT_TAG,
        String::from_utf8_lossy(e.name().as_ref())
    );
    Ok(())
}

fn read_header(e: &BytesStart) -> Result<FileHeader> {
    ensure!(
        e.name().as_ref() == FILE_TAG.as_bytes(),
        Parse,
        "unexpected element <{}>",
        String::from_utf8_lossy(e.name().as_ref())
    );

    let mut path = None;
    let mut perm = None;
    let mut hex = false;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| error!(Parse, "bad attribute: {}", err))?;
        let value = attr
            .unescape_value()
            .map_err(|err| error!(Parse, "bad attribute value: {}", err))?
            .into_owned();

        match attr.key.as_ref() {
            b"path" => path = Some(value),
            b"perm" => perm = Some(value),
            b"encoding" => match value.as_str() {
                "hex" => hex = true,
                "text" => hex = false,
                other => bail!(Parse, "unknown content encoding '{}'", other),
            },
            _ => {}
        }
    }

    let path = path.ok_or_else(|| error!(Parse, "<{}> without a path attribute", FILE_TAG))?;
    let perm = perm.ok_or_else(|| error!(Parse, "<{}> '{}' has no perm attribute", FILE_TAG, path))?;
    ensure!(!path.is_empty(), Parse, "<{}> with an empty path", FILE_TAG);

    Ok(FileHeader { path, perm, hex })
}

fn insert(document: &mut Document, header: FileHeader, content: String) -> Result<()> {
    let bytes = if header.hex {
        hex::decode(content.trim())
            .map_err(|e| error!(Parse, "bad hex content for '{}': {}", header.path, e))?
    } else {
        content.into_bytes()
    };

    ensure!(
        !document.contains(&header.path),
        Parse,
        "duplicate path '{}'",
        header.path
    );
    document.insert(header.path, Entry::with_perm(header.perm, bytes));
    Ok(())
}
