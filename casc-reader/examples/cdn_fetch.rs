//! Fetch one file by name straight off the CDN.
//!
//! Usage: `cargo run --example cdn_fetch -- <product> <name>`
//!
//! Try `_ROOT` or `_ENCODING` as the name; they exist for every product.

use casc_reader::{CascReader, CdnCascReader};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(product), Some(wanted)) = (args.next(), args.next()) else {
        return Err("usage: cdn_fetch <product> <name>".into());
    };

    let mut reader = CdnCascReader::open(&product, "us").await?;
    let Some((_, ckey)) = reader
        .list_files()
        .into_iter()
        .find(|(name, _)| name == &wanted)
    else {
        return Err(format!("no file named {wanted:?}").into());
    };

    // An 8 KiB preview is plenty for a look at the header bytes.
    let preview = reader
        .get_file(&ckey, Some(8192))
        .await?
        .ok_or("file not resolvable")?;
    println!(
        "{wanted}: {} bytes total, previewing {}",
        reader.get_file_size(&ckey).await?.unwrap_or(0),
        preview.len()
    );
    for chunk in preview.chunks(16).take(8) {
        println!("{}", hex::encode(chunk));
    }
    Ok(())
}
