// U3D Check Tool
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Justification: Fields on DecoderOptions and BlockReaderOptions may change at any time, but
// u3d-check doesn't want to be updated every time those fields change, therefore always fill in
// the remaining fields with default values.
#![allow(clippy::needless_update)]

use u3d_core::arith::{ArithmeticDecoder, DecoderOptions};
use u3d_core::errors::{Error, Result};
use u3d_core::io::{BlockReader, BlockReaderOptions, SourceStream};

use clap::{Arg, ArgAction};
use log::{info, warn};

mod info;

use info::{BlockSummary, FileHeader, FileSummary, FILE_HEADER_BLOCK_TYPE};

#[derive(Default)]
struct CheckOptions {
    is_strict: bool,
    is_quiet: bool,
    is_json: bool,
}

fn print_block(block: &BlockSummary) {
    println!(
        "[{:#010x}] type={:#010x} ({}), data_size={}, metadata_size={}",
        block.offset,
        block.block_type,
        block.name.unwrap_or("Unknown"),
        block.data_size,
        block.metadata_size
    );

    if let Some(header) = &block.file_header {
        println!("    version:            {}.{}", header.major_version, header.minor_version);
        println!("    profile:            {:#x}", header.profile);
        println!("    declaration size:   {}", header.declaration_size);
        println!("    file size:          {}", header.file_size);
        println!("    character encoding: {}", header.character_encoding);

        if let Some(scale) = header.units_scale {
            println!("    units scale:        {}", scale);
        }
    }

    if let Some(overrun) = &block.overrun {
        println!(
            "    [WARN] data overrun at bit {} of {}",
            overrun.bit_position, overrun.bit_len
        );
    }
}

fn run_check(path: &str, opts: &CheckOptions, summary: &mut FileSummary) -> Result<()> {
    let source = SourceStream::open(path)?;

    let mut reader = BlockReader::new(source, BlockReaderOptions { ..Default::default() });

    let dec_opts = DecoderOptions { fail_on_overrun: opts.is_strict, ..Default::default() };

    let mut dec = ArithmeticDecoder::new(dec_opts);

    loop {
        let header = match reader.open_block() {
            Ok(header) => header,
            Err(Error::EndOfStream) => break,
            Err(err) => return Err(err),
        };

        let mut block = BlockSummary::new(&header);

        // Every block's data is an independently coded stream.
        dec.reset();

        if header.block_type == FILE_HEADER_BLOCK_TYPE {
            block.file_header = Some(FileHeader::read(&mut dec, reader.data_mut())?);
        }
        else if summary.blocks.is_empty() {
            warn!("first block is not a file header");
        }

        if let Some(overrun) = dec.overrun() {
            block.overrun = Some(overrun.into());
            summary.n_overruns += 1;
        }

        if !opts.is_quiet && !opts.is_json {
            print_block(&block);
        }

        summary.blocks.push(block);
    }

    info!("read {} blocks", summary.blocks.len());

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let matches = clap::Command::new("U3D Check")
        .version("1.0")
        .about("Check the block structure of a U3D file")
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Treat a data buffer overrun as an error"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Only print the result"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print a JSON summary of the file"),
        )
        .arg(Arg::new("INPUT").help("The input file path").index(1))
        .get_matches();

    let path = match matches.get_one::<String>("INPUT") {
        Some(path) => path.clone(),
        None => {
            eprintln!("Please specify an input file.");
            std::process::exit(1);
        }
    };

    let opts = CheckOptions {
        is_strict: matches.get_flag("strict"),
        is_quiet: matches.get_flag("quiet"),
        is_json: matches.get_flag("json"),
        ..Default::default()
    };

    let mut summary = FileSummary { path: path.clone(), ..Default::default() };

    if !opts.is_quiet && !opts.is_json {
        println!("Input Path: {}", path);
        println!();
    }

    if let Err(err) = run_check(&path, &opts, &mut summary) {
        eprintln!("Check interrupted by error: {}", err);
        std::process::exit(2);
    }

    if opts.is_json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("Failed to serialize summary: {}", err);
                std::process::exit(2);
            }
        }
    }
    else if !opts.is_quiet {
        println!();
        println!("  Blocks:   {:>8}", summary.blocks.len());
        println!("  Overruns: {:>8}", summary.n_overruns);
        println!();
    }

    eprintln!("{} successfully parsed.", path);
}
