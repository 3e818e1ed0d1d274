//! Fills the event-level histograms of the 3ℓ category from a stream of selected events and writes them to a
//! histogram file.

#![deny(warnings)]
#![deny(missing_docs)]

use std::{fs::File, io::BufReader};

use clap::Parser as _;
use hist_3l::EvtHistManager3l;
use hist_app::prelude::*;
use hist_config::ConfigurationLoader;
use hist_core::{HistManager as _, HistogramFile};
use hist_error::{ErrorContext as _, GenericError};
use tracing::{error, info};

mod cli;
use self::cli::Cli;

mod events;
use self::events::read_events;

const ENV_PREFIX: &str = "ANALYZE";

fn main() {
    if let Err(e) = initialize_logging(None) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => info!("analyze-3l stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<(), GenericError> {
    info!(config = %cli.config.display(), input = %cli.input.display(), "analyze-3l starting...");

    let config = ConfigurationLoader::default()
        .from_yaml(&cli.config)
        .error_context("Failed to load configuration file.")?
        .from_environment(ENV_PREFIX)?
        .into_generic();

    let mut manager = EvtHistManager3l::from_configuration(&config)?;
    info!(
        era = %manager.era(),
        process = manager.booker().process(),
        category = manager.booker().category(),
        central_or_shift = manager.booker().central_or_shift(),
        "Configured histogram manager."
    );

    let mut file = HistogramFile::new();
    let directory = file.mkdir(&cli.directory)?;
    manager.book_histograms(&directory)?;

    let input = File::open(&cli.input)
        .with_error_context(|| format!("Failed to open event file '{}'.", cli.input.display()))?;

    let mut num_events = 0u64;
    for event in read_events(BufReader::new(input)) {
        let event = event?;
        manager.fill_histograms(
            event.num_electrons,
            event.num_muons,
            event.num_had_taus,
            event.num_jets,
            event.num_bjets_loose,
            event.num_bjets_medium,
            event.mva_output_3l_ttv,
            event.mva_output_3l_ttbar,
            event.mva_discr_3l,
            event.evt_weight,
        )?;
        num_events += 1;
    }

    if let Some(counter) = manager.event_counter_histogram() {
        info!(
            num_events,
            entries = counter.entries(),
            sum_of_weights = counter.integral(),
            "Processed events."
        );
    }

    manager.write_histograms(&mut file)?;
    file.write_json(&cli.output)
        .with_error_context(|| format!("Failed to write histogram file '{}'.", cli.output.display()))?;

    info!(output = %cli.output.display(), histograms = file.len(), "Wrote histograms.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn write(path: &Path, contents: &str) {
        std::fs::write(path, contents).unwrap();
    }

    fn event_line(num_jets: i32, evt_weight: f64) -> String {
        format!(
            r#"{{"num_electrons":1,"num_muons":2,"num_had_taus":0,"num_jets":{},"num_bjets_loose":1,"num_bjets_medium":1,"mva_output_3l_ttv":0.1,"mva_output_3l_ttbar":0.2,"mva_discr_3l":4.0,"evt_weight":{}}}"#,
            num_jets, evt_weight
        )
    }

    #[test]
    fn run_fills_and_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: tmp.path().join("config.yaml"),
            input: tmp.path().join("events.jsonl"),
            output: tmp.path().join("histograms.json"),
            directory: "hh_3l".to_string(),
        };

        write(&cli.config, "era: \"2016\"\nprocess: signal\ncategory: OS_Tight/sel/evt\n");
        write(
            &cli.input,
            &[event_line(3, 0.5), String::new(), event_line(5, 0.25)].join("\n"),
        );

        run(&cli).unwrap();

        let file = HistogramFile::read_json(&cli.output).unwrap();
        assert_eq!(file.len(), 12);

        let counter = file
            .get("hh_3l/OS_Tight/sel/evt/signal/EventCounter")
            .and_then(|h| h.as_1d())
            .unwrap();
        assert_eq!(counter.integral(), 0.75);
        assert_eq!(counter.entries(), 2);

        let jets = file
            .get("hh_3l/OS_Tight/sel/evt/signal/numJets")
            .and_then(|h| h.as_1d())
            .unwrap();
        assert_eq!(jets.bin_content(4), 0.5);
        assert_eq!(jets.bin_content(6), 0.25);
    }

    #[test]
    fn run_fails_on_missing_input() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: tmp.path().join("config.yaml"),
            input: tmp.path().join("missing.jsonl"),
            output: tmp.path().join("histograms.json"),
            directory: String::new(),
        };
        write(&cli.config, "era: \"2018\"\nprocess: signal\ncategory: hh_3l\n");

        let err = run(&cli).unwrap_err();
        assert!(err.to_string().starts_with("Failed to open event file"));
        assert!(!cli.output.exists());
    }
}
