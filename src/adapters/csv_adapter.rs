//! CSV price bar import.
//!
//! Expected columns, with a header row:
//! `symbol,day,open,high,low,close,volume[,source]`. Rows without a source
//! take the adapter's default source.

use crate::domain::error::PaperTraderError;
use crate::domain::price_bar::PriceBar;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub struct CsvAdapter {
    default_source: String,
}

impl CsvAdapter {
    pub fn new(default_source: impl Into<String>) -> Self {
        Self {
            default_source: default_source.into(),
        }
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<PriceBar>, PaperTraderError> {
        let content = fs::read_to_string(path)?;
        self.read_str(&content)
    }

    /// Parse bars from CSV text. The first malformed row aborts the import.
    pub fn read_str(&self, content: &str) -> Result<Vec<PriceBar>, PaperTraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| PaperTraderError::PriceImport {
                line: e.position().map(|p| p.line() as usize).unwrap_or(0),
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            let day = NaiveDate::parse_from_str(field(&record, line, 1, "day")?, "%Y-%m-%d")
                .map_err(|e| PaperTraderError::PriceImport {
                    line,
                    reason: format!("invalid day format: {}", e),
                })?;
            let volume: i64 = field(&record, line, 6, "volume")?
                .parse()
                .map_err(|e| PaperTraderError::PriceImport {
                    line,
                    reason: format!("invalid volume value: {}", e),
                })?;
            let source = record
                .get(7)
                .filter(|v| !v.is_empty())
                .unwrap_or(self.default_source.as_str())
                .to_string();

            bars.push(PriceBar {
                symbol: field(&record, line, 0, "symbol")?.to_string(),
                day,
                open: decimal_field(&record, line, 2, "open")?,
                high: decimal_field(&record, line, 3, "high")?,
                low: decimal_field(&record, line, 4, "low")?,
                close: decimal_field(&record, line, 5, "close")?,
                volume,
                source,
            });
        }

        Ok(bars)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    line: usize,
    idx: usize,
    name: &str,
) -> Result<&'r str, PaperTraderError> {
    record
        .get(idx)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaperTraderError::PriceImport {
            line,
            reason: format!("missing {} column", name),
        })
}

fn decimal_field(
    record: &csv::StringRecord,
    line: usize,
    idx: usize,
    name: &str,
) -> Result<Decimal, PaperTraderError> {
    let raw = field(record, line, idx, name)?;
    Decimal::from_str(raw).map_err(|e| PaperTraderError::PriceImport {
        line,
        reason: format!("invalid {} value: {}", name, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "symbol,day,open,high,low,close,volume,source\n";

    #[test]
    fn reads_bars_with_default_source() {
        let content = format!(
            "{HEADER}aapl,2024-01-02,185.10,186.50,184.00,185.64,5000\nMSFT,2024-01-02,370,372,368,370.87,3000,manual\n"
        );
        let bars = CsvAdapter::new("yfinance").read_str(&content).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, "aapl");
        assert_eq!(bars[0].close, dec!(185.64));
        assert_eq!(bars[0].source, "yfinance");
        assert_eq!(bars[1].source, "manual");
        assert_eq!(bars[1].day, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn invalid_decimal_reports_line() {
        let content = format!("{HEADER}AAPL,2024-01-02,1,2,1,abc,10\n");
        match CsvAdapter::new("yfinance").read_str(&content) {
            Err(PaperTraderError::PriceImport { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("close"));
            }
            other => panic!("expected PriceImport, got {other:?}"),
        }
    }

    #[test]
    fn invalid_day_fails() {
        let content = format!("{HEADER}AAPL,01/02/2024,1,2,1,1.5,10\n");
        assert!(matches!(
            CsvAdapter::new("yfinance").read_str(&content),
            Err(PaperTraderError::PriceImport { .. })
        ));
    }

    #[test]
    fn missing_volume_fails() {
        let content = format!("{HEADER}AAPL,2024-01-02,1,2,1,1.5\n");
        match CsvAdapter::new("yfinance").read_str(&content) {
            Err(PaperTraderError::PriceImport { reason, .. }) => {
                assert!(reason.contains("volume"))
            }
            other => panic!("expected PriceImport, got {other:?}"),
        }
    }

    #[test]
    fn read_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{HEADER}AAPL,2024-01-02,1,2,1,1.5,10\n").unwrap();
        let bars = CsvAdapter::new("yfinance").read_file(file.path()).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            CsvAdapter::new("yfinance").read_file(Path::new("/nonexistent/prices.csv")),
            Err(PaperTraderError::Io(_))
        ));
    }
}
