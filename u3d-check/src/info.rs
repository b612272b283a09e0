// U3D Check Tool
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Serialize;

use u3d_core::arith::ArithmeticDecoder;
use u3d_core::errors::{Overrun, Result};
use u3d_core::io::{BitSource, BlockHeader};

/// The block type of the file header block.
pub const FILE_HEADER_BLOCK_TYPE: u32 = 0x0044_3355;

/// The profile flag indicating the file header carries a units scaling factor.
const PROFILE_UNITS_SCALE: u32 = 0x8;

/// Gets the name of a well-known block type.
pub fn block_type_name(block_type: u32) -> Option<&'static str> {
    let name = match block_type {
        FILE_HEADER_BLOCK_TYPE => "File Header",
        0xffff_ff12 => "File Reference",
        0xffff_ff14 => "Modifier Chain",
        0xffff_ff15 => "Priority Update",
        0xffff_ff16 => "New Object Type",
        0xffff_ff21 => "Group Node",
        0xffff_ff22 => "Model Node",
        0xffff_ff23 => "Light Node",
        0xffff_ff24 => "View Node",
        0xffff_ff31 => "CLOD Mesh Declaration",
        0xffff_ff36 => "Point Set Declaration",
        0xffff_ff37 => "Line Set Declaration",
        0xffff_ff3b => "CLOD Progressive Mesh Continuation",
        0xffff_ff3c => "LOD Modifier",
        0xffff_ff3e => "Point Set Continuation",
        0xffff_ff3f => "Line Set Continuation",
        0xffff_ff41 => "2D Glyph Modifier",
        0xffff_ff42 => "Subdivision Modifier",
        0xffff_ff43 => "Animation Modifier",
        0xffff_ff44 => "Bone Weight Modifier",
        0xffff_ff45 => "Shading Modifier",
        0xffff_ff46 => "CLOD Modifier",
        0xffff_ff51 => "Light Resource",
        0xffff_ff52 => "View Resource",
        0xffff_ff53 => "Lit Texture Shader",
        0xffff_ff54 => "Material Resource",
        0xffff_ff55 => "Texture Declaration",
        0xffff_ff56 => "Motion Resource",
        0xffff_ff5c => "Texture Continuation",
        _ => return None,
    };

    Some(name)
}

/// The decoded contents of the file header block.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileHeader {
    pub major_version: i16,
    pub minor_version: i16,
    pub profile: u32,
    pub declaration_size: u32,
    pub file_size: u64,
    pub character_encoding: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units_scale: Option<f64>,
}

impl FileHeader {
    /// Decodes a file header from the data payload of a file header block. The decoder's coding
    /// interval must have been reset for the block.
    pub fn read(dec: &mut ArithmeticDecoder, src: &mut BitSource) -> Result<FileHeader> {
        let major_version = dec.read_i16(src)?;
        let minor_version = dec.read_i16(src)?;
        let profile = dec.read_u32(src)?;
        let declaration_size = dec.read_u32(src)?;
        let file_size = dec.read_u64(src)?;
        let character_encoding = dec.read_u32(src)?;

        let units_scale = if profile & PROFILE_UNITS_SCALE != 0 {
            Some(dec.read_f64(src)?)
        }
        else {
            None
        };

        Ok(FileHeader {
            major_version,
            minor_version,
            profile,
            declaration_size,
            file_size,
            character_encoding,
            units_scale,
        })
    }
}

/// A summary of one block.
#[derive(Clone, Debug, Serialize)]
pub struct BlockSummary {
    pub offset: u64,
    pub block_type: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    pub data_size: u32,
    pub metadata_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_header: Option<FileHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrun: Option<OverrunSummary>,
}

impl BlockSummary {
    pub fn new(header: &BlockHeader) -> Self {
        BlockSummary {
            offset: header.offset,
            block_type: header.block_type,
            name: block_type_name(header.block_type),
            data_size: header.data_size,
            metadata_size: header.metadata_size,
            file_header: None,
            overrun: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct OverrunSummary {
    pub bit_position: u64,
    pub bit_len: u64,
}

impl From<Overrun> for OverrunSummary {
    fn from(overrun: Overrun) -> Self {
        OverrunSummary { bit_position: overrun.bit_position, bit_len: overrun.bit_len }
    }
}

/// A summary of a whole file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub blocks: Vec<BlockSummary>,
    pub n_overruns: usize,
}
