use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;

pub fn write_instructions(path: &Path, rows: &[&str]) -> Result<(), Error> {
    let mut file = File::create(path)?;
    writeln!(file, "op, enrollment, amount, method, agent")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(())
}

#[allow(dead_code)]
pub fn write_roster(path: &Path, rows: &[(&str, &str)]) -> Result<(), Error> {
    let mut file = File::create(path)?;
    writeln!(file, "first_name, last_name")?;
    for (first, last) in rows {
        writeln!(file, "{first}, {last}")?;
    }
    Ok(())
}
