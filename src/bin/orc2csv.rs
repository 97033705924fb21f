//! Dump selected columns of an ORC file as CSV.

use std::process::ExitCode;

use clap::Parser;

use orcfile::{Reader, Value};

#[derive(Parser)]
#[command(name = "orc2csv", about = "Dump selected columns of an ORC file as CSV")]
struct Args {
    /// Path to the ORC file.
    #[arg(short = 'f', long = "file")]
    file: String,

    /// Comma-separated list of column names. All top-level columns when
    /// omitted.
    #[arg(short = 'c', long = "columns")]
    columns: Option<String>,
}

fn csv_field(value: &Value) -> String {
    let text = value.to_string();
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

fn run(args: &Args) -> orcfile::Result<()> {
    let reader = Reader::open(&args.file)?;
    let schema = reader.schema()?;
    let all_columns: Vec<String> = schema.field_names().to_vec();
    let columns: Vec<&str> = match &args.columns {
        Some(list) => list.split(',').map(str::trim).collect(),
        None => all_columns.iter().map(String::as_str).collect(),
    };

    println!("{}", columns.join(","));
    let mut cursor = reader.select(&columns)?;
    while cursor.stripes() {
        while cursor.next() {
            let line: Vec<String> = cursor.row().iter().map(csv_field).collect();
            println!("{}", line.join(","));
        }
    }
    if let Some(err) = cursor.take_err() {
        return Err(err);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("orc2csv: {}", err);
            ExitCode::FAILURE
        }
    }
}
