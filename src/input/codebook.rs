use std::collections::HashSet;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use crate::input::codes::MAX_CODE_DYES;
use crate::input::{InputError, open_maybe_gz};
use crate::model::GeneCodes;

/// Reads a code book: one `gene_name code` pair per line.
pub fn read_codebook(path: &Path) -> Result<GeneCodes, InputError> {
    let reader = open_maybe_gz(path)?;
    parse_codebook(reader)
}

pub fn parse_codebook<R: BufRead>(reader: R) -> Result<GeneCodes, InputError> {
    let mut names = Vec::new();
    let mut codes: Vec<Vec<u8>> = Vec::new();
    let mut seen_names = HashSet::new();
    let mut seen_codes = HashSet::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let (Some(name), Some(code), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(InputError::Parse(format!(
                "code book line {}: expected `gene_name code`",
                line_no + 1
            )));
        };
        let mut dyes = Vec::with_capacity(code.len());
        for ch in code.chars() {
            let Some(d) = ch.to_digit(10) else {
                return Err(InputError::Parse(format!(
                    "code book line {}: non-digit `{}` in code {}",
                    line_no + 1,
                    ch,
                    code
                )));
            };
            dyes.push(d as u8);
        }
        if let Some(first) = codes.first() {
            if first.len() != dyes.len() {
                return Err(InputError::InvalidInput(format!(
                    "gene {} has code length {}, expected {}",
                    name,
                    dyes.len(),
                    first.len()
                )));
            }
        }
        if !seen_names.insert(name.to_string()) {
            return Err(InputError::InvalidInput(format!(
                "duplicate gene name in code book: {}",
                name
            )));
        }
        if !seen_codes.insert(dyes.clone()) {
            return Err(InputError::InvalidInput(format!(
                "duplicate gene code in code book: {} ({})",
                code, name
            )));
        }
        names.push(name.to_string());
        codes.push(dyes);
    }

    if names.is_empty() {
        return Err(InputError::InvalidInput("code book has no genes".to_string()));
    }
    Ok(GeneCodes { names, codes })
}

pub fn write_codebook(path: &Path, codes: &GeneCodes) -> Result<(), InputError> {
    if let Some(dye) = codes.max_dye().filter(|&d| usize::from(d) >= MAX_CODE_DYES) {
        return Err(InputError::InvalidInput(format!(
            "dye {} cannot be written as a single code book digit",
            dye
        )));
    }
    let mut out = String::new();
    for g in 0..codes.n_genes() {
        out.push_str(&codes.names[g]);
        out.push(' ');
        out.push_str(&codes.code_string(g));
        out.push('\n');
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, out)?;
    Ok(())
}
