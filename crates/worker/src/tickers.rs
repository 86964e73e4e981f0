use anyhow::Context;
use std::collections::BTreeSet;
use std::path::Path;

/// Builds the batch's ticker list from CLI input. The batch contract wants unique
/// tickers, so duplicates collapse onto their first position.
pub fn load_tickers(arg: Option<&str>, file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let mut raw: Vec<String> = Vec::new();

    if let Some(s) = arg {
        raw.extend(s.split(',').map(|t| t.trim().to_string()));
    }

    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ticker file {}", path.display()))?;
        raw.extend(parse_ticker_lines(&text));
    }

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for ticker in raw {
        if ticker.is_empty() {
            continue;
        }
        if seen.insert(ticker.clone()) {
            out.push(ticker);
        }
    }

    anyhow::ensure!(
        !out.is_empty(),
        "no tickers given; use --tickers or --tickers-file"
    );
    Ok(out)
}

fn parse_ticker_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        out.push(line.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims_comma_lists() {
        let out = load_tickers(Some(" AAPL, BRK-B ,TSLA"), None).unwrap();
        assert_eq!(out, vec!["AAPL", "BRK-B", "TSLA"]);
    }

    #[test]
    fn dedupes_preserving_first_position() {
        let out = load_tickers(Some("TSLA,AAPL,TSLA,AAPL"), None).unwrap();
        assert_eq!(out, vec!["TSLA", "AAPL"]);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(load_tickers(Some(" , ,"), None).is_err());
        assert!(load_tickers(None, None).is_err());
    }

    #[test]
    fn file_lines_skip_blanks_and_comments() {
        let text = "# watchlist\nAAPL\n\n  BRK-B\n# done\nTSLA\n";
        assert_eq!(parse_ticker_lines(text), vec!["AAPL", "BRK-B", "TSLA"]);
    }
}
