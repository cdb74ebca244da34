//! Ticker universe loading from CSV.
//!
//! The file needs a `symbol` (or `ticker`) header; other columns are ignored.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Loads tickers from a CSV file: trimmed, upper-cased, de-duplicated with
/// first-seen order kept.
///
/// # Errors
/// Returns an error if the file cannot be read or has no symbol column.
pub fn load_universe_csv(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open universe CSV: {}", path.display()))?;
    let tickers = parse_universe(file)
        .with_context(|| format!("Failed to parse universe CSV: {}", path.display()))?;
    info!(path = %path.display(), tickers = tickers.len(), "Loaded universe CSV");
    Ok(tickers)
}

/// Parses universe CSV content from any reader.
///
/// # Errors
/// Returns an error on malformed CSV or a missing symbol column.
pub fn parse_universe<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = ["symbol", "ticker"]
        .iter()
        .find_map(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)));
    let Some(column) = column else {
        bail!("universe CSV needs a 'symbol' or 'ticker' column");
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let Some(raw) = record.get(column) else {
            continue;
        };
        let ticker = raw.trim().to_uppercase();
        if ticker.is_empty() {
            continue;
        }
        if seen.insert(ticker.clone()) {
            out.push(ticker);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_symbol_column_trimmed_upper_deduped() {
        let csv = "name,symbol\nApple, aapl \nMicrosoft,MSFT\nApple again,AAPL\nBlank,\nCoke,ko\n";
        let tickers = parse_universe(csv.as_bytes()).unwrap();
        assert_eq!(tickers, vec!["AAPL", "MSFT", "KO"]);
    }

    #[test]
    fn test_ticker_column_fallback() {
        let csv = "Ticker\nnvda\namd\n";
        assert_eq!(parse_universe(csv.as_bytes()).unwrap(), vec!["NVDA", "AMD"]);
    }

    #[test]
    fn test_missing_column_is_error() {
        let csv = "name,price\nApple,150\n";
        assert!(parse_universe(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbol").unwrap();
        writeln!(file, "spy").unwrap();
        writeln!(file, "qqq").unwrap();
        let tickers = load_universe_csv(file.path()).unwrap();
        assert_eq!(tickers, vec!["SPY", "QQQ"]);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_universe_csv("/nonexistent/universe.csv").is_err());
    }
}
