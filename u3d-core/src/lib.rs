// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core bitstream, block, and arithmetic decoding for Universal 3D (U3D) files.

pub mod arith;
pub mod errors;
pub mod io;
pub mod util;
