use std::io::BufRead;

use hist_error::{generic_error, ErrorContext as _, GenericError};
use serde::Deserialize;

/// Event-level quantities of one selected 3ℓ event.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Event3l {
    pub num_electrons: i32,
    pub num_muons: i32,
    pub num_had_taus: i32,
    pub num_jets: i32,
    pub num_bjets_loose: i32,
    pub num_bjets_medium: i32,
    pub mva_output_3l_ttv: f64,
    pub mva_output_3l_ttbar: f64,
    pub mva_discr_3l: f64,
    pub evt_weight: f64,
}

/// Reads events from JSON lines.
///
/// Blank lines are skipped. Reading stops at the first line that cannot be read or parsed, and the error names its
/// (one-based) line number.
pub fn read_events<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Event3l, GenericError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line_number = idx + 1;
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(
                    serde_json::from_str::<Event3l>(&line)
                        .with_error_context(|| format!("Failed to parse event on line {}.", line_number)),
                ),
                Err(e) => Some(Err(generic_error!("Failed to read line {}: {}", line_number, e))),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{"num_electrons":1,"num_muons":2,"num_had_taus":0,"num_jets":4,"num_bjets_loose":2,"num_bjets_medium":1,"mva_output_3l_ttv":0.25,"mva_output_3l_ttbar":-0.5,"mva_discr_3l":6.0,"evt_weight":0.75}"#;

    #[test]
    fn skips_blank_lines() {
        let input = format!("{}\n\n   \n{}\n", EVENT, EVENT);
        let events = read_events(input.as_bytes()).collect::<Result<Vec<_>, _>>().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].num_muons, 2);
        assert_eq!(events[1].evt_weight, 0.75);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let input = format!("{}\n{{\"num_electrons\": 1}}\n", EVENT);
        let results = read_events(input.as_bytes()).collect::<Vec<_>>();

        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse event on line 2.");
    }
}
