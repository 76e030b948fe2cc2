//! reverb-cli — command-line client for the reverbd daemon.
//!
//! Splits a text file into randomly-sized chunks, sends each chunk for
//! reversal over one connection, prints every reversed chunk as it arrives,
//! and writes the reassembled result to `<base name>_reversed.txt` next to
//! the input. On a protocol error the transfer aborts and no file is written.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::net::TcpStream;

use reverb_core::chunk::{reversed_output_path, split_chunks};
use reverb_net::client::run_transfer;

struct Options {
    server: String,
    port: u16,
    file: String,
    lmin: usize,
    lmax: usize,
}

fn print_usage() {
    println!("Usage: reverb-cli --server <ip> --port <port> --file <path> --lmin <n> --lmax <n>");
    println!();
    println!("Options:");
    println!("  --server <ip>    Server address");
    println!("  --port <port>    Server port");
    println!("  --file <path>    Text file to send");
    println!("  --lmin <n>       Minimum chunk length (characters)");
    println!("  --lmax <n>       Maximum chunk length (characters)");
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut server = None;
    let mut port = None;
    let mut file = None;
    let mut lmin = None;
    let mut lmax = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || -> Result<&String> {
            args.get(i + 1)
                .with_context(|| format!("{flag} requires a value"))
        };
        match flag {
            "--server" => server = Some(value()?.clone()),
            "--port" => port = Some(value()?.parse().context("--port must be a number")?),
            "--file" => file = Some(value()?.clone()),
            "--lmin" => lmin = Some(value()?.parse().context("--lmin must be a number")?),
            "--lmax" => lmax = Some(value()?.parse().context("--lmax must be a number")?),
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown option: {other}");
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
        i += 2;
    }

    Ok(Options {
        server: server.context("--server is required")?,
        port: port.context("--port is required")?,
        file: file.context("--file is required")?,
        lmin: lmin.context("--lmin is required")?,
        lmax: lmax.context("--lmax is required")?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        std::process::exit(1);
    }
    let opts = parse_args(&args)?;

    let content = std::fs::read_to_string(&opts.file)
        .with_context(|| format!("failed to read file: {}", opts.file))?;

    let mut rng = rand::thread_rng();
    let chunks = split_chunks(&content, opts.lmin, opts.lmax, &mut rng)?;
    if chunks.is_empty() {
        bail!("{} is empty — nothing to send", opts.file);
    }
    println!(
        "Sending {} in {} chunks of {}..={} characters",
        opts.file,
        chunks.len(),
        opts.lmin,
        opts.lmax
    );

    let addr = format!("{}:{}", opts.server, opts.port);
    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr} — is reverbd running?"))?;

    let reversed = run_transfer(&mut stream, &chunks, |index, text| {
        println!("{index}: {text}");
    })
    .await
    .context("transfer aborted")?;

    let output = reversed_output_path(Path::new(&opts.file));
    std::fs::write(&output, &reversed)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Reversed content written to {}", output.display());

    Ok(())
}
