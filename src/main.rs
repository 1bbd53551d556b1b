use std::fs;
use std::process;

use log::info;

use gridfill::word_list::parse_word_list;
use gridfill::{fill, FillOptions, Grid, GridInput, WordIndexStore};

const USAGE: &str = "usage: gridfill <word list> <template or template file>";

fn load_dictionary(path: &str) -> Result<Vec<(String, i32)>, String> {
    fs::read_to_string(path)
        .map(|text| parse_word_list(&text))
        .map_err(|err| format!("couldn't read word list {}: {}", path, err))
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let dictionary_path = args.next().ok_or(USAGE)?;
    let template_arg = args.next().ok_or(USAGE)?;

    // The template can be given inline or as a file.
    let template = fs::read_to_string(&template_arg).unwrap_or(template_arg);

    let mut store = WordIndexStore::new();
    let report = store.preprocess(0, &load_dictionary(&dictionary_path)?);
    info!("indexed {} words, rejected {}", report.indexed, report.rejected);

    let input = GridInput::from_template(&template).map_err(|err| err.to_string())?;
    let outcome = fill(&store, 0, &input, None, &FillOptions::default()).map_err(|err| err.to_string())?;

    let mut grid = Grid::load(&input).map_err(|err| err.to_string())?;
    for &(x, y, letter) in &outcome.diff {
        grid.place((x, y), letter as u8);
    }

    println!("{:?}", outcome.statistics);
    println!("{:?}: {} of {} slots", outcome.status, outcome.done_slots, outcome.total_slots);
    println!("{}", grid);

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(message) = run() {
        eprintln!("{}", message);
        process::exit(1);
    }
}
