use crate::error::{BookingError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    Room,
    Close,
    Open,
    User,
    Check,
    Book,
    Intent,
    Pay,
    Decline,
    Confirm,
    Notify,
    Cancel,
    AdminCancel,
    AdminConfirm,
    Advance,
    Sweep,
}

/// One row of a command script. Which columns are required depends on
/// `command`; the runner checks them when it executes the row.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub command: CommandKind,
    pub room: Option<u32>,
    pub user: Option<u32>,
    pub booking: Option<u64>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub intent: Option<String>,
    /// Parsed from the literal text so large amounts keep every digit.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub value: Option<Decimal>,
}

/// Reads commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Command>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BookingError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "command, room, user, booking, check_in, check_out, intent, value\n";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}room, 1, , , , , , 120.50\nbook, 1, 2, , 2025-03-10, 2025-03-12, ,\nadmin-cancel, , 1, 1, , , ,\npay, , , , , , pi_1,"
        );
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<Command>> = reader.commands().collect();
        assert_eq!(results.len(), 4);

        let room = results[0].as_ref().unwrap();
        assert_eq!(room.command, CommandKind::Room);
        assert_eq!(room.room, Some(1));
        assert_eq!(room.value, Some(dec!(120.50)));

        let book = results[1].as_ref().unwrap();
        assert_eq!(book.check_in, NaiveDate::from_ymd_opt(2025, 3, 10));
        assert_eq!(book.booking, None);

        assert_eq!(results[2].as_ref().unwrap().command, CommandKind::AdminCancel);
        assert_eq!(results[3].as_ref().unwrap().intent.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_reader_short_rows_are_accepted() {
        let data = format!("{HEADER}sweep\nadvance, , , , , , , 20");
        let results: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();
        assert_eq!(results[0].as_ref().unwrap().command, CommandKind::Sweep);
        assert_eq!(results[1].as_ref().unwrap().value, Some(dec!(20)));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}teleport, 1, , , , , ,\nbook, 1, 2, , 2025-13-40, 2025-03-12, ,");
        let results: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();

        assert!(matches!(results[0], Err(BookingError::CsvError(_))));
        assert!(results[1].is_err());
    }

    #[test]
    fn test_reader_keeps_every_digit_of_large_values() {
        let data = format!("{HEADER}room, 1, , , , , , 79228162514264337593543950.3
room, 2, , , , , , abc");
        let results: Vec<Result<Command>> = CommandReader::new(data.as_bytes()).commands().collect();

        assert_eq!(
            results[0].as_ref().unwrap().value,
            Some(dec!(79228162514264337593543950.3))
        );
        assert!(matches!(results[1], Err(BookingError::CsvError(_))));
    }
}
