//! User-facing error message formatting.
//!
//! Uses typed error matching (PolarsError variants, io::ErrorKind) rather than
//! string parsing to produce messages a person uploading a CSV can act on.

use polars::prelude::PolarsError;
use std::io;

/// Format a PolarsError raised while reading or analysing a CSV upload.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("Column not found: {}", msg),
        PE::Duplicate(msg) => format!(
            "Duplicate column name in header: {}. Rename the column and upload again.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("The file contains no data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Inconsistent column types: {}", msg),
        PE::ShapeMismatch(msg) => format!("Rows have differing numbers of fields: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index out of bounds: {}", msg),
        PE::ComputeError(msg) => simplify_compute_message(msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data (is the file UTF-8 encoded CSV?).".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by walking its cause chain for known error types.
pub fn user_message_from_report(report: &color_eyre::eyre::Report) -> String {
    for cause in report.chain() {
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return user_message_from_polars(pe);
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return user_message_from_io(io_err, None);
        }
    }

    // Fallback: first line of display to avoid long tracebacks
    let display = report.to_string();
    display
        .lines()
        .next()
        .map(str::trim)
        .unwrap_or("An error occurred")
        .to_string()
}

/// Strip polars-internal phrasing from compute errors.
fn simplify_compute_message(msg: &str) -> String {
    let msg = msg.trim();
    if let Some(idx) = msg.find("\n\nYou might want to try") {
        return msg[..idx].trim().to_string();
    }
    if msg.contains("could not parse") {
        return format!(
            "Could not parse a value: {}",
            msg.lines().next().unwrap_or(msg)
        );
    }
    msg.lines().next().unwrap_or(msg).to_string()
}
