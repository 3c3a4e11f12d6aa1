use std::io::Write;

use super::{cells, Column, ExportError, ExportRow, ExportSink};
use crate::output::escape_xml;

/// Excel 2003 XML spreadsheet, opened by Excel and LibreOffice as .xls.
pub struct XlsSink<W: Write> {
    inner: W,
}

impl<W: Write> XlsSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> ExportSink for XlsSink<W> {
    fn write_table(&mut self, columns: &[Column], rows: &[ExportRow]) -> Result<(), ExportError> {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<?mso-application progid="Excel.Sheet"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet" xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
<Worksheet ss:Name="Report"><Table>
"#,
        );

        let headers: Vec<&str> = columns.iter().map(|c| c.header).collect();
        push_row(&mut xml, &headers);
        for row in rows {
            push_row(&mut xml, &cells(columns, row));
        }
        xml.push_str("</Table></Worksheet></Workbook>\n");

        self.inner.write_all(xml.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }
}

fn push_row(xml: &mut String, values: &[&str]) {
    xml.push_str("<Row>");
    for value in values {
        xml.push_str(r#"<Cell><Data ss:Type="String">"#);
        xml.push_str(&escape_xml(value));
        xml.push_str("</Data></Cell>");
    }
    xml.push_str("</Row>\n");
}
