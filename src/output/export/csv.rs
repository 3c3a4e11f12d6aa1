use std::io::Write;

use super::{cells, Column, ExportError, ExportRow, ExportSink};

pub struct CsvSink<W: Write> {
    inner: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> ExportSink for CsvSink<W> {
    fn write_table(&mut self, columns: &[Column], rows: &[ExportRow]) -> Result<(), ExportError> {
        let mut wtr = ::csv::WriterBuilder::new().from_writer(&mut self.inner);
        let headers: Vec<&str> = columns.iter().map(|c| c.header).collect();
        wtr.write_record(&headers)?;
        for row in rows {
            wtr.write_record(cells(columns, row))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_then_rows_in_column_order() {
        let columns = [
            Column { key: "id", header: "id" },
            Column { key: "fullname", header: "Course" },
        ];
        let rows = vec![
            ExportRow::from([("fullname", "Algebra, I".to_string()), ("id", "5".to_string())]),
            ExportRow::from([("id", "6".to_string())]),
        ];

        let mut out = Vec::new();
        CsvSink::new(&mut out).write_table(&columns, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,Course\n5,\"Algebra, I\"\n6,\n");
    }
}
