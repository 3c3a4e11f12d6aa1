use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{cells, Column, ExportError, ExportRow, ExportSink};
use crate::output::escape_xml;

const MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2">
 <manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
 <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>
"#;

/// OpenDocument spreadsheet with a single sheet.
pub struct OdsSink<W: Write> {
    inner: W,
}

impl<W: Write> OdsSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> ExportSink for OdsSink<W> {
    fn write_table(&mut self, columns: &[Column], rows: &[ExportRow]) -> Result<(), ExportError> {
        // The archive needs Seek, so it is assembled in memory first.
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // mimetype must be the first entry and stored uncompressed.
        zip.start_file(
            "mimetype",
            FileOptions::default().compression_method(CompressionMethod::Stored),
        )?;
        zip.write_all(MIMETYPE.as_bytes())?;

        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("META-INF/manifest.xml", deflated)?;
        zip.write_all(MANIFEST.as_bytes())?;

        zip.start_file("content.xml", deflated)?;
        zip.write_all(content_xml(columns, rows).as_bytes())?;

        let archive = zip.finish()?.into_inner();
        self.inner.write_all(&archive)?;
        self.inner.flush()?;
        Ok(())
    }
}

fn content_xml(columns: &[Column], rows: &[ExportRow]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2">
<office:body><office:spreadsheet><table:table table:name="Report">
"#,
    );

    let headers: Vec<&str> = columns.iter().map(|c| c.header).collect();
    push_row(&mut xml, &headers);
    for row in rows {
        push_row(&mut xml, &cells(columns, row));
    }

    xml.push_str("</table:table></office:spreadsheet></office:body></office:document-content>\n");
    xml
}

fn push_row(xml: &mut String, values: &[&str]) {
    xml.push_str("<table:table-row>");
    for value in values {
        xml.push_str(r#"<table:table-cell office:value-type="string"><text:p>"#);
        xml.push_str(&escape_xml(value));
        xml.push_str("</text:p></table:table-cell>");
    }
    xml.push_str("</table:table-row>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn archive_starts_with_stored_mimetype() {
        let columns = [Column { key: "fullname", header: "Course" }];
        let rows = vec![ExportRow::from([("fullname", "R&D <intro>".to_string())])];

        let mut out = Vec::new();
        OdsSink::new(&mut out).write_table(&columns, &rows).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(out)).unwrap();
        {
            let first = archive.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), CompressionMethod::Stored);
        }

        let mut content = String::new();
        archive
            .by_name("content.xml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.contains("<text:p>Course</text:p>"));
        assert!(content.contains("<text:p>R&amp;D &lt;intro&gt;</text:p>"));
    }
}
