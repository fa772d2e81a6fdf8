//! Holiday calendar loaded from the workbook sheet or a CSV export of it.

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Days, NaiveDate};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::errors::RpaError;
use crate::utils::parse_day_first_date;

#[allow(clippy::expect_used)]
static DATE_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)feriad|data|date").expect("static pattern"));

/// Extensions read as workbooks rather than CSV.
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Where the holiday calendar lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolidaySource {
    /// A CSV export of the sheet.
    Csv(PathBuf),
    /// A sheet inside a workbook.
    Workbook {
        /// Workbook file.
        path: PathBuf,
        /// Sheet name.
        sheet: String,
    },
}

impl HolidaySource {
    /// Picks the reader from the file extension: workbook formats read
    /// `sheet`, anything else is treated as CSV.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>, sheet: &str) -> Self {
        let path = path.into();
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                WORKBOOK_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_workbook {
            Self::Workbook {
                path,
                sheet: sheet.to_string(),
            }
        } else {
            Self::Csv(path)
        }
    }

    /// The file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Csv(path) | Self::Workbook { path, .. } => path,
        }
    }
}

/// A sheet of rows with a header line, as read from the calendar workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayTable {
    /// Column names.
    pub headers: Vec<String>,
    /// Data rows; short rows are allowed.
    pub rows: Vec<Vec<String>>,
}

impl HolidayTable {
    /// Creates a table from headers and rows.
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Reads the table from either kind of source.
    ///
    /// # Errors
    ///
    /// Returns `RpaError::Holiday` if the source cannot be opened or parsed.
    pub fn read(source: &HolidaySource) -> Result<Self, RpaError> {
        match source {
            HolidaySource::Csv(path) => Self::from_csv_path(path),
            HolidaySource::Workbook { path, sheet } => Self::from_workbook(path, sheet),
        }
    }

    /// Reads one sheet of a workbook. The first row is the header.
    ///
    /// # Errors
    ///
    /// Returns `RpaError::Holiday` if the workbook cannot be opened or has no
    /// such sheet.
    pub fn from_workbook(path: &Path, sheet: &str) -> Result<Self, RpaError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| RpaError::Holiday(format!("{}: {e}", path.display())))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| RpaError::Holiday(format!("{} [{sheet}]: {e}", path.display())))?;
        Ok(Self::from_range(&range))
    }

    /// Converts a worksheet range. Date cells become `dd/mm/yyyy` text.
    #[must_use]
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let headers = rows
            .next()
            .map(|row| row.into_iter().map(|h| h.trim().to_string()).collect())
            .unwrap_or_default();
        Self {
            headers,
            rows: rows.collect(),
        }
    }

    /// Reads a CSV export. Row lengths may vary.
    ///
    /// # Errors
    ///
    /// Returns `RpaError::Holiday` if the file cannot be opened or parsed.
    pub fn from_csv_path(path: &Path) -> Result<Self, RpaError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| RpaError::Holiday(format!("{}: {e}", path.display())))?;
        Self::from_reader(&mut reader)
    }

    /// Reads CSV text; used by tests and by callers that already hold the bytes.
    ///
    /// # Errors
    ///
    /// Returns `RpaError::Holiday` on malformed CSV.
    pub fn from_csv_str(text: &str) -> Result<Self, RpaError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        Self::from_reader(&mut reader)
    }

    fn from_reader<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Self, RpaError> {
        let headers = reader
            .headers()
            .map_err(|e| RpaError::Holiday(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| RpaError::Holiday(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Index of the column holding holiday dates: the first whose name looks
    /// date-like, else the first column.
    ///
    /// # Errors
    ///
    /// Returns `RpaError::Holiday` if the table has no columns.
    pub fn date_column(&self) -> Result<usize, RpaError> {
        if self.headers.is_empty() {
            return Err(RpaError::Holiday("calendar has no columns".to_string()));
        }
        Ok(self
            .headers
            .iter()
            .position(|h| DATE_COLUMN.is_match(h))
            .unwrap_or(0))
    }
}

/// Immutable set of non-working dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    /// An empty calendar.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the date column of `table`. Cells that are not dates are dropped.
    ///
    /// # Errors
    ///
    /// Returns `RpaError::Holiday` if no date column can be selected.
    pub fn parse(table: &HolidayTable) -> Result<Self, RpaError> {
        let column = table.date_column()?;
        let dates: BTreeSet<NaiveDate> = table
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter_map(|cell| parse_day_first_date(cell).ok())
            .collect();

        debug!(
            column = %table.headers[column],
            parsed = dates.len(),
            rows = table.rows.len(),
            "Parsed holiday calendar"
        );
        Ok(Self { dates })
    }

    /// Like [`HolidaySet::parse`], but a calendar that cannot be read
    /// degrades to an empty set.
    #[must_use]
    pub fn parse_or_empty(table: &HolidayTable) -> Self {
        Self::parse(table).unwrap_or_else(|e| {
            warn!(error = %e, "Holiday calendar unusable, continuing without holidays");
            Self::empty()
        })
    }

    /// Reads and parses the calendar, degrading to an empty set on any failure.
    #[must_use]
    pub fn load_or_empty(source: &HolidaySource) -> Self {
        match HolidayTable::read(source) {
            Ok(table) => Self::parse_or_empty(&table),
            Err(e) => {
                warn!(error = %e, "Holiday calendar unreadable, continuing without holidays");
                Self::empty()
            }
        }
    }

    /// Returns true if `date` is a holiday.
    #[must_use]
    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.dates.contains(date)
    }

    /// Number of holidays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns true if there are no holidays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Holidays in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.iter()
    }
}

fn cell_text(cell: &Data) -> String {
    let as_date = match cell {
        Data::Float(serial) => serial_date(*serial),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(serial) => serial_date(*serial as f64),
        Data::DateTime(value) => serial_date(value.as_f64()),
        _ => None,
    };
    as_date.map_or_else(|| cell.to_string(), |d| d.format("%d/%m/%Y").to_string())
}

/// Day of a 1900-system spreadsheet serial number; serials count from 1899-12-30.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = serial.trunc() as u64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days))
}

impl FromIterator<NaiveDate> for HolidaySet {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_column_prefers_keyword() {
        let table = HolidayTable::new(
            vec!["Descricao".into(), "Data Feriado".into(), "Date".into()],
            vec![],
        );
        assert_eq!(table.date_column().unwrap(), 1);
    }

    #[test]
    fn test_date_column_is_case_insensitive() {
        let table = HolidayTable::new(vec!["Nome".into(), "FERIADO".into()], vec![]);
        assert_eq!(table.date_column().unwrap(), 1);
    }

    #[test]
    fn test_date_column_falls_back_to_first() {
        let table = HolidayTable::new(vec!["Dia".into(), "Nome".into()], vec![]);
        assert_eq!(table.date_column().unwrap(), 0);
    }

    #[test]
    fn test_parse_drops_unparseable_cells() {
        let table = HolidayTable::from_csv_str(
            "Nome,Feriado\nNatal,25/12/2025\nConfraternizacao,01/01/2026\nPendente,a definir\nVazio,\n",
        )
        .unwrap();

        let set = HolidaySet::parse(&table).unwrap();
        assert_eq!(
            set.iter().copied().collect::<Vec<_>>(),
            vec![date(2025, 12, 25), date(2026, 1, 1)]
        );
    }

    #[test]
    fn test_parse_reads_day_first() {
        let table = HolidayTable::from_csv_str("Data\n02/11/2025\n").unwrap();
        let set = HolidaySet::parse(&table).unwrap();
        assert!(set.contains(&date(2025, 11, 2)));
        assert!(!set.contains(&date(2025, 2, 11)));
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let table = HolidayTable::from_csv_str("Nome,Data\nSemData\nTiradentes,21/04/2025\n").unwrap();
        let set = HolidaySet::parse(&table).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_empty_table_degrades_to_empty() {
        let table = HolidayTable::default();
        assert!(HolidaySet::parse(&table).is_err());
        assert!(HolidaySet::parse_or_empty(&table).is_empty());
    }

    #[test]
    fn test_load_missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = HolidaySet::load_or_empty(&HolidaySource::Csv(dir.path().join("missing.csv")));
        assert!(set.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Feriado.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Feriado,Descricao").unwrap();
        writeln!(file, "07/09/2025,Independencia").unwrap();
        drop(file);

        let set = HolidaySet::load_or_empty(&HolidaySource::from_path(&path, "Feriados"));
        assert!(set.contains(&date(2025, 9, 7)));
    }

    #[test]
    fn test_source_from_extension() {
        assert_eq!(
            HolidaySource::from_path("Config.XLSX", "Feriados"),
            HolidaySource::Workbook {
                path: PathBuf::from("Config.XLSX"),
                sheet: "Feriados".to_string(),
            }
        );
        assert_eq!(
            HolidaySource::from_path("feriados.csv", "Feriados"),
            HolidaySource::Csv(PathBuf::from("feriados.csv"))
        );
    }

    #[test]
    fn test_range_with_date_cells() {
        let mut range: Range<Data> = Range::new((0, 0), (3, 1));
        range.set_value((0, 0), Data::String("Descricao".to_string()));
        range.set_value((0, 1), Data::String("Data Feriado".to_string()));
        range.set_value((1, 0), Data::String("Feriado municipal".to_string()));
        // 45940 is 2025-10-10 in the 1900 date system.
        range.set_value((1, 1), Data::Float(45940.0));
        range.set_value((2, 0), Data::String("Natal".to_string()));
        range.set_value((2, 1), Data::String("25/12/2025".to_string()));
        range.set_value((3, 0), Data::String("Sem data".to_string()));

        let table = HolidayTable::from_range(&range);
        assert_eq!(table.headers, vec!["Descricao".to_string(), "Data Feriado".to_string()]);
        assert_eq!(table.rows[0][1], "10/10/2025");

        let set = HolidaySet::parse(&table).unwrap();
        assert_eq!(
            set.iter().copied().collect::<Vec<_>>(),
            vec![date(2025, 10, 10), date(2025, 12, 25)]
        );
    }

    #[test]
    fn test_serial_date_bounds() {
        assert_eq!(serial_date(45940.75), Some(date(2025, 10, 10)));
        assert_eq!(serial_date(0.0), None);
        assert_eq!(serial_date(-3.0), None);
    }

    #[test]
    fn test_unreadable_workbook_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.xlsx");
        std::fs::write(&path, "not a zip archive").unwrap();

        let source = HolidaySource::from_path(&path, "Feriados");
        assert!(HolidayTable::read(&source).is_err());
        assert!(HolidaySet::load_or_empty(&source).is_empty());
    }
}
