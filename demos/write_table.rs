// In carrow-core/demos/write_table.rs

//! Builds a small typed table and writes it to an object store.
//!
//! ```text
//! cargo run --example write_table -- --db /tmp/store.sock --id 42
//! cargo run --example write_table -- --db /tmp/store.sock --id 42 --serve
//! ```

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use carrow::{
    init_logging, BoolArrayBuilder, Client, Column, Field, Float64ArrayBuilder, Int64ArrayBuilder,
    Metadata, ObjectId, StoreServer, StringArrayBuilder, Table, TimestampArrayBuilder,
};

#[derive(Parser, Debug)]
#[command(name = "write_table", about = "Write a generated table to an object store")]
struct Args {
    /// Path of the store's Unix socket
    #[arg(long)]
    db: PathBuf,

    /// Object index, at least 1; stored under its 20-digit zero-padded form
    #[arg(long)]
    id: NonZeroU64,

    /// Number of rows to generate
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// Start an in-process store at --db instead of connecting to a running one
    #[arg(long, default_value_t = false)]
    serve: bool,

    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn build_table(rows: usize) -> carrow::Result<Table> {
    let start = chrono::Utc::now();

    let mut ids = Int64ArrayBuilder::new()?;
    let mut scores = Float64ArrayBuilder::new()?;
    let mut flags = BoolArrayBuilder::new()?;
    let mut labels = StringArrayBuilder::new()?;
    let mut times = TimestampArrayBuilder::new()?;
    for i in 0..rows {
        ids.append(i as i64)?;
        scores.append((i as f64).sqrt())?;
        flags.append(i % 3 == 0)?;
        labels.append(format!("item-{i}"))?;
        times.append(start + chrono::Duration::milliseconds(i as i64))?;
    }

    let arrays = [
        ("id", ids.finish()?),
        ("score", scores.finish()?),
        ("flag", flags.finish()?),
        ("label", labels.finish()?),
        ("created_at", times.finish()?),
    ];
    let columns = arrays
        .iter()
        .map(|(name, array)| Column::new(&Field::new(name, array.dtype())?, array))
        .collect::<carrow::Result<Vec<_>>>()?;
    Table::from_columns(&columns)
}

fn run(args: &Args) -> carrow::Result<()> {
    let _store = if args.serve {
        Some(StoreServer::bind(&args.db)?.spawn()?)
    } else {
        None
    };

    let table = build_table(args.rows)?;
    let mut meta = Metadata::new()?;
    meta.set("generator", "write_table")?;
    meta.set("version", carrow::VERSION)?;
    let mut schema = table.schema()?;
    schema.set_metadata(&meta)?;

    let arrays = (0..table.num_cols()).map(|i| table.column(i)).collect::<carrow::Result<Vec<_>>>()?;
    let table = Table::from_arrays(&schema, &arrays)?;

    let id = ObjectId::from_index(args.id.get());
    let mut client = Client::connect(&args.db)?;
    let size = client.write_table(&table, &id)?;
    println!("wrote {} rows ({} bytes) as object {}", table.num_rows(), size, id);

    if args.serve {
        let back = client.read_table(&id, Duration::from_secs(1))?;
        println!("read back {} rows x {} columns", back.num_rows(), back.num_cols());
    }
    client.disconnect()
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    if let Err(e) = init_logging(level, None) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
