// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level file contracts: text cloud input, PLY/OFF exports, and the
//! plain-text and JSON sidecars.

pub mod lineset;
pub mod off;
pub mod ply;
pub mod strokes;
pub mod txt;
