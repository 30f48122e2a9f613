use serde::Serialize;
use tally_core::error::TallyError;
use tally_core::response::Response;

/// Print `value` wrapped in the `{"ok": true, "data": ...}` envelope.
pub fn print<T: Serialize>(value: &T) -> Result<(), TallyError> {
    let json = serde_json::to_string_pretty(&Response::Ok(value))?;
    println!("{json}");
    Ok(())
}
