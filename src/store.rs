//! Line-oriented recipient files.
//!
//! The candidate list, the already-sent log and the bad-address log all share
//! one format: one recipient per line, `name<TAB>email`. The raw line is the
//! identity of a recipient, so the logs store candidate lines verbatim.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::error::{Error, Result};

const BOM: char = '\u{FEFF}';
const DELIMITER: char = '\t';

/// Reads `path`, dropping byte order marks, surrounding whitespace and blank
/// lines. Order is preserved.
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|source| Error::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(|line| line.trim().replace(BOM, ""))
        .filter(|line| !line.is_empty())
        .collect())
}

pub fn load_recipients(path: &Path) -> Result<Vec<String>> {
    load_lines(path)
}

pub fn load_already_sent(path: &Path) -> Result<Vec<String>> {
    load_lines(path)
}

pub fn load_bad(path: &Path) -> Result<Vec<String>> {
    load_lines(path)
}

/// Appends `lines` to `path`, creating it when missing. Existing content is
/// never truncated, and a last record without its line break is terminated
/// first so the batch does not run into it. Callers skip this for an empty
/// batch.
pub fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    let persist_err = |source| Error::Persist {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(persist_err)?;
    let mut buf = String::new();
    if !ends_with_newline(&mut file).map_err(persist_err)? {
        buf.push('\n');
    }
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes()).map_err(persist_err)?;
    file.sync_all().map_err(persist_err)
}

/// `true` for an empty file too: there is no record to terminate.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// A candidate line split into its two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

impl<'a> Recipient<'a> {
    pub fn parse(line: &'a str) -> Result<Recipient<'a>> {
        let mut fields = line.split(DELIMITER).map(str::trim);
        match (fields.next(), fields.next()) {
            (Some(name), Some(email)) if !name.is_empty() && !email.is_empty() => {
                Ok(Recipient { name, email })
            }
            _ => Err(Error::MalformedRecipient(line.to_string())),
        }
    }
}
