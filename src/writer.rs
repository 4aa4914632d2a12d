/*!
 * XML writer implementation for flattree
 */

use std::io::{self, Write};

use chrono::Local;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::types::{Document, Entry};

/// Root element of a document
pub const ROOT_TAG: &str = "filetree";

/// Element holding one file
pub const FILE_TAG: &str = "file";

/// Opening fence of a wrapped document
pub const FENCE_OPEN: &str = "```xml";

/// Closing fence of a wrapped document
pub const FENCE_CLOSE: &str = "```";

/// Instructions appended after a wrapped document
pub const PRESENTATION_TRAILER: &str = "\
The block above is a flattened file tree. Each <file> element is one file: \
its \"path\" attribute is the path relative to the project root, its \"perm\" \
attribute holds the octal permission bits, and its text is the complete file \
content (XML-escaped). Files marked encoding=\"hex\" carry hex-encoded bytes. \
Directories are implied by the paths and never listed.

Reply with a document in exactly the same format, inside a single xml fenced \
block, containing every file you add or change with its full new content. \
Leave out files you do not change.
";

/// XML writer for documents
pub struct XmlWriter {
    /// Wrap output in a fence followed by instructions
    presentation: bool,
}

impl XmlWriter {
    /// Create a new XML writer
    pub fn new(presentation: bool) -> Self {
        Self { presentation }
    }

    /// Serialize a document to bytes
    pub fn encode(&self, document: &Document) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(document, &mut out)?;
        Ok(out)
    }

    /// Serialize a document into `out`
    pub fn write_to<W: Write>(&self, document: &Document, mut out: W) -> Result<()> {
        if self.presentation {
            writeln!(out, "{}", FENCE_OPEN)?;
        }

        self.write_document(document, &mut out)?;
        writeln!(out)?;

        if self.presentation {
            writeln!(out, "{}", FENCE_CLOSE)?;
            writeln!(out)?;
            out.write_all(PRESENTATION_TRAILER.as_bytes())?;
        }

        out.flush()?;
        Ok(())
    }

    fn write_document<W: Write>(&self, document: &Document, out: W) -> io::Result<()> {
        let mut xml_writer = Writer::new_with_indent(out, b' ', 2);

        // Write XML declaration
        xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        // Start root element with timestamp
        let mut start_tag = BytesStart::new(ROOT_TAG);
        let timestamp = Local::now().to_rfc3339();
        start_tag.push_attribute(("generated", timestamp.as_str()));
        xml_writer.write_event(Event::Start(start_tag))?;

        for (path, entry) in document {
            self.write_file(path, entry, &mut xml_writer)?;
        }

        xml_writer.write_event(Event::End(BytesEnd::new(ROOT_TAG)))?;

        Ok(())
    }

    /// Write one file element
    fn write_file<W: Write>(&self, path: &str, entry: &Entry, writer: &mut Writer<W>) -> io::Result<()> {
        let mut start_tag = BytesStart::new(FILE_TAG);
        start_tag.push_attribute(("path", path));
        start_tag.push_attribute(("perm", entry.perm.as_str()));

        // Empty files carry no content at all
        if entry.content.is_empty() {
            writer.write_event(Event::Empty(start_tag))?;
            return Ok(());
        }

        match entry.text().filter(|text| is_xml_text(text)) {
            Some(text) => {
                writer.write_event(Event::Start(start_tag))?;
                writer.write_event(Event::Text(BytesText::from_escaped(escape_text(text))))?;
            }
            None => {
                start_tag.push_attribute(("encoding", "hex"));
                writer.write_event(Event::Start(start_tag))?;
                let encoded = hex::encode(&entry.content);
                writer.write_event(Event::Text(BytesText::new(&encoded)))?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new(FILE_TAG)))?;

        Ok(())
    }
}

/// Whether every character can appear in XML 1.0 character data
fn is_xml_text(text: &str) -> bool {
    text.chars().all(|c| {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    })
}

/// Escape markup characters; `\r` becomes a character reference so parsers
/// do not fold it into a line feed
fn escape_text(text: &str) -> String {
    quick_xml::escape::escape(text).replace('\r', "&#13;")
}
