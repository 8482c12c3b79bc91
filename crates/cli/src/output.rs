//! Result rendering.
//!
//! Text mode prints a human summary on success; JSON mode prints the
//! `{ success, data, message }` envelope for success and failure alike.

use std::io::{self, Write};

use pantry_sync::{ApiResponse, SyncError};
use serde::Serialize;

use crate::commands::CliError;

pub struct Output {
    json: bool,
}

impl Output {
    pub const fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `result`, rendering success with `render` in text mode.
    ///
    /// Failures in JSON mode are printed as an envelope and reported as
    /// [`CliError::Reported`] so the caller only sets the exit status.
    pub fn emit<T: Serialize>(
        &self,
        result: Result<T, SyncError>,
        render: impl FnOnce(&T) -> String,
    ) -> Result<(), CliError> {
        if self.json {
            let failed = result.is_err();
            let envelope = ApiResponse::from(result);
            let body = serde_json::to_string_pretty(&envelope)?;
            write_line(&body)?;
            return if failed { Err(CliError::Reported) } else { Ok(()) };
        }

        let data = result?;
        write_line(&render(&data))?;
        Ok(())
    }

    /// Print a confirmation with no payload.
    pub fn done(&self, message: &str) -> Result<(), CliError> {
        if self.json {
            let envelope = ApiResponse {
                success: true,
                data: None::<()>,
                message: Some(message.to_string()),
            };
            write_line(&serde_json::to_string_pretty(&envelope)?)?;
        } else {
            write_line(message)?;
        }
        Ok(())
    }
}

fn write_line(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")
}
