//! Record layout and the record order.
//!
//! A record is `"<u64><separator><text>"`, for example `"415. Apple"`. Records are ordered by
//! their text first (ordinal, byte by byte) and by their number second. All sorting and
//! merging uses this order, including the tie break on the number.

use std::cmp::Ordering;

use memchr::memmem;

use crate::error::SortError;

/// Separates the number from the text: dot and space.
pub const SEPARATOR: &str = ". ";

/// Longest text a generated record carries.
pub const MAX_TEXT_LENGTH: usize = 1024;

/// Digits of `u64::MAX` + separator + longest text. Sizes every record buffer.
pub const MAX_RECORD_LENGTH: usize = 20 + SEPARATOR.len() + MAX_TEXT_LENGTH;

/// Index of the first separator in `record`.
///
/// Fails when the separator is absent or when there is no number in front of it.
pub fn find_separator(record: &str) -> Result<usize, SortError> {
    match memmem::find(record.as_bytes(), SEPARATOR.as_bytes()) {
        Some(index) if index > 0 => Ok(index),
        _ => Err(SortError::format(record, format!("separator {:?} not found", SEPARATOR))),
    }
}

/// Compare two records, text first, then number.
pub fn compare(a: &str, b: &str) -> Result<Ordering, SortError> {
    compare_at(a, find_separator(a)?, b, find_separator(b)?)
}

/// Same as [compare] for callers that already know where each separator is.
///
/// Fails when a separator index does not point at a separator.
pub fn compare_at(a: &str, a_separator: usize, b: &str, b_separator: usize) -> Result<Ordering, SortError> {
    let (a_number, a_text) = split_at_separator(a, a_separator)?;
    let (b_number, b_text) = split_at_separator(b, b_separator)?;
    let ordering = a_text.as_bytes().cmp(b_text.as_bytes());
    if ordering != Ordering::Equal {
        return Ok(ordering);
    }
    Ok(number(a, a_number)?.cmp(&number(b, b_number)?))
}

// Number and text on either side of the separator at `separator`.
fn split_at_separator(record: &str, separator: usize) -> Result<(&str, &str), SortError> {
    match (record.get(..separator), record.get(separator..)) {
        (Some(number), Some(rest)) if separator > 0 && rest.starts_with(SEPARATOR) => {
            Ok((number, &rest[SEPARATOR.len()..]))
        }
        _ => Err(SortError::format(record, format!("no separator at index {separator}"))),
    }
}

fn number(record: &str, number: &str) -> Result<u64, SortError> {
    number
        .parse::<u64>()
        .map_err(|e| SortError::format(record, format!("number: {e}")))
}

/// A validated record with its separator index and number cached, so that ordering records
/// never rescans or fails.
#[derive(Debug, Clone)]
pub struct Record {
    line: String,
    separator: usize,
    number: u64,
}

impl Record {
    pub fn new(line: String) -> Result<Record, SortError> {
        let separator = find_separator(&line)?;
        let number = number(&line, &line[..separator])?;
        Ok(
            Record {
                line,
                separator,
                number,
            }
        )
    }

    pub fn line(&self) -> &str {
        self.line.as_str()
    }

    pub fn into_line(self) -> String {
        self.line
    }

    pub fn separator(&self) -> usize {
        self.separator
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn text(&self) -> &str {
        &self.line[self.separator + SEPARATOR.len()..]
    }
}

impl Eq for Record {}

impl PartialEq<Self> for Record {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text().as_bytes()
            .cmp(other.text().as_bytes())
            .then(self.number.cmp(&other.number))
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::record::{compare, compare_at, find_separator, Record, MAX_RECORD_LENGTH};

    #[test]
    fn test_text_first() -> Result<(), anyhow::Error> {
        assert_eq!(compare("1. banana", "9. apple")?, Ordering::Greater);
        assert_eq!(compare("9. apple", "1. banana")?, Ordering::Less);
        Ok(())
    }

    #[test]
    fn test_number_breaks_tie() -> Result<(), anyhow::Error> {
        assert_eq!(compare("1. apple", "5. apple")?, Ordering::Less);
        assert_eq!(compare("5. apple", "1. apple")?, Ordering::Greater);
        assert_eq!(compare("5. apple", "5. apple")?, Ordering::Equal);
        // numeric, not lexicographic
        assert_eq!(compare("10. apple", "9. apple")?, Ordering::Greater);
        Ok(())
    }

    #[test]
    fn test_ordinal_text() -> Result<(), anyhow::Error> {
        // upper case letters sort before lower case letters
        assert_eq!(compare("1. Zebra", "1. apple")?, Ordering::Less);
        assert_eq!(compare("1. app", "1. apple")?, Ordering::Less);
        Ok(())
    }

    #[test]
    fn test_separator() -> Result<(), anyhow::Error> {
        assert_eq!(find_separator("415. Apple")?, 3);
        // the first occurrence wins
        assert_eq!(find_separator("2. a. b")?, 1);
        assert!(find_separator("415 Apple").unwrap_err().is_format());
        assert!(find_separator(". Apple").unwrap_err().is_format());
        assert!(find_separator("").unwrap_err().is_format());
        Ok(())
    }

    #[test]
    fn test_compare_at() -> Result<(), anyhow::Error> {
        assert_eq!(compare_at("12. abc", 2, "3. abc", 1)?, Ordering::Greater);
        Ok(())
    }

    #[test]
    fn test_compare_at_wrong_index() {
        // past the end
        assert!(compare_at("1. a", 10, "1. b", 1).unwrap_err().is_format());
        // not a separator
        assert!(compare_at("12. a", 1, "1. b", 1).unwrap_err().is_format());
        assert!(compare_at("1. a", 1, "1. b", 0).unwrap_err().is_format());
        // inside a multi byte character
        assert!(compare_at("1. a", 1, "\u{3a9}. b", 1).unwrap_err().is_format());
    }

    #[test]
    fn test_bad_number() {
        assert!(compare("x1. apple", "1. apple").unwrap_err().is_format());
        assert!(compare("18446744073709551616. apple", "1. apple").unwrap_err().is_format());
        assert!(Record::new("-1. apple".to_string()).unwrap_err().is_format());
    }

    #[test]
    fn test_record_order_matches_compare() -> Result<(), anyhow::Error> {
        let lines = vec!["5. banana", "1. apple", "9. apple", "18446744073709551615. apple", "0. Banana"];
        let mut records: Vec<Record> = lines.iter().map(|l| Record::new(l.to_string())).collect::<Result<_, _>>()?;
        records.sort();
        let sorted: Vec<&str> = records.iter().map(|r| r.line()).collect();
        assert_eq!(sorted, vec!["0. Banana", "1. apple", "9. apple", "18446744073709551615. apple", "5. banana"]);
        for pair in sorted.windows(2) {
            assert_ne!(compare(pair[0], pair[1])?, Ordering::Greater);
        }
        Ok(())
    }

    #[test]
    fn test_record_parts() -> Result<(), anyhow::Error> {
        let record = Record::new("42. Answer".to_string())?;
        assert_eq!(record.number(), 42);
        assert_eq!(record.separator(), 2);
        assert_eq!(record.text(), "Answer");
        assert_eq!(MAX_RECORD_LENGTH, 20 + 2 + 1024);
        Ok(())
    }
}
