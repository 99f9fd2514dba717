use crate::models::{ListingRecord, COLUMNS};
use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::path::Path;
use tracing::info;

pub const WORKSHEET_NAME: &str = "Cars";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    /// Picks the format from the file extension, spreadsheet by default.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("csv") => ExportFormat::Csv,
            Some("json") => ExportFormat::Json,
            _ => ExportFormat::Xlsx,
        }
    }
}

pub fn export_records(records: &[ListingRecord], output_path: &Path) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(output_path);
    match format {
        ExportFormat::Xlsx => save_records_to_xlsx(records, output_path)?,
        ExportFormat::Csv => save_records_to_csv(records, output_path)?,
        ExportFormat::Json => save_records_to_json(records, output_path)?,
    }
    info!("Exported {} listings to {}", records.len(), output_path.display());
    Ok(format)
}

pub fn save_records_to_csv(records: &[ListingRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create output file: {}", output_path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_records_to_json(records: &[ListingRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create output file: {}", output_path.display()))?;
    serde_json::to_writer_pretty(file, records).context("Failed to write JSON export")?;
    Ok(())
}

/// Numeric columns are written as numbers; an absent reference price stays blank.
fn numeric_cells(record: &ListingRecord) -> [(u16, Option<f64>); 6] {
    [
        (1, Some(record.price_local as f64)),
        (2, record.price_reference),
        (3, Some(f64::from(record.year))),
        (4, Some(f64::from(record.mileage))),
        (5, Some(record.engine_volume)),
        (6, Some(f64::from(record.horsepower))),
    ]
}

pub fn save_records_to_xlsx(records: &[ListingRecord], output_path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(WORKSHEET_NAME)
        .context("Failed to name worksheet")?;

    for (col, header) in COLUMNS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .context(format!("Failed to write header '{}'", header))?;
    }

    for (i, record) in records.iter().enumerate() {
        let r = (i + 1) as u32;
        let row = record.to_row();
        let numeric = numeric_cells(record);

        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            match numeric.iter().find(|(c, _)| *c == col) {
                Some((_, Some(number))) => {
                    worksheet
                        .write_number(r, col, *number)
                        .context(format!("Failed to write {} for {}", COLUMNS[col as usize], record.id))?;
                }
                Some((_, None)) => {}
                None => {
                    worksheet
                        .write_string(r, col, value)
                        .context(format!("Failed to write {} for {}", COLUMNS[col as usize], record.id))?;
                }
            }
        }
    }

    workbook
        .save(output_path)
        .context(format!("Failed to save workbook: {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_record;
    use std::path::PathBuf;

    fn tmp_file(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("avitofinder_export_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("cars.csv")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("cars.JSON")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("cars.xlsx")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_path(Path::new("cars")), ExportFormat::Xlsx);
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let path = tmp_file("one.csv");
        let mut record = sample_record("42");
        record.flags.is_market_price = true;
        export_records(&[record], &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "42");
        assert_eq!(&rows[0][1], "1250000");
        assert_eq!(&rows[0][10], "true");
        assert_eq!(&rows[0][11], "false");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn csv_of_empty_store_is_header_only() {
        let path = tmp_file("empty.csv");
        export_records(&[], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("id,price_local,price_reference"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn json_keeps_missing_reference_price_as_null() {
        let path = tmp_file("one.json");
        let mut record = sample_record("8");
        record.price_reference = None;
        export_records(&[record], &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert!(value[0]["price_reference"].is_null());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn xlsx_is_written() {
        let path = tmp_file("cars.xlsx");
        export_records(&[sample_record("1"), sample_record("2")], &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
        let _ = std::fs::remove_file(path);
    }
}
