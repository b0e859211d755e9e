//! List the named files of a local CASC installation.
//!
//! Usage: `cargo run --example list_local -- <install-dir>`

use casc_reader::{CascReader, LocalCascReader};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let install = std::env::args()
        .nth(1)
        .ok_or("usage: list_local <install-dir>")?;

    let mut reader = LocalCascReader::open(&install)?;
    let files = reader.list_files();
    println!(
        "{} named files, {} unnamed",
        files.len(),
        reader.list_unnamed_files().len()
    );

    for (name, ckey) in files.iter().take(20) {
        let size = reader.get_file_size(ckey).await?;
        match size {
            Some(size) => println!("{size:>12}  {name}  ({ckey})"),
            None => println!("{:>12}  {name}  ({ckey})", "?"),
        }
    }
    Ok(())
}
