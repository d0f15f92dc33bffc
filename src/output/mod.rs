// SPDX-License-Identifier: GPL-3.0-or-later
mod raw;
mod settings;

pub(crate) use raw::{RawStreamReader, RawStreamWriter, StreamHeader};
pub(crate) use settings::StreamSettings;
