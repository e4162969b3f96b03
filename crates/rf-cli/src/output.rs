// SPDX-License-Identifier: MIT

//! Text/JSON output switch, mirroring the teacher's `OutputFormat` enum in
//! `cli/src/output.rs`.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Serialize `value` as pretty JSON when `format` is `Json`; otherwise hand
/// it to `render` for the text rendering.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, render: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Text => render(value),
    }
    Ok(())
}
