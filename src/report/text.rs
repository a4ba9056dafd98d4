use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::report::{SpotRow, format_f32_6};

pub const SPOTS_HEADER: &str = "tile\ty\tx\tz\tgene\tscore";

pub fn render_spot_row(row: &SpotRow) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        row.tile,
        format_f32_6(row.global_yxz[0]),
        format_f32_6(row.global_yxz[1]),
        format_f32_6(row.global_yxz[2]),
        row.gene,
        format_f32_6(row.score)
    )
}

pub fn write_spots_tsv(path: &Path, rows: &[SpotRow]) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{}", SPOTS_HEADER)?;
    for row in rows {
        writeln!(w, "{}", render_spot_row(row))?;
    }
    w.flush()
}
