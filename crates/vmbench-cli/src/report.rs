//! Result table and unit formatting
//!
//! Plain-text, terminal-friendly output: a left-aligned table with
//! computed column widths, decimal (SI) byte units for bandwidth and SI
//! prefixes for operation rates.

/// Left-aligned plain-text table
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with the given column headers
    #[must_use]
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row; short rows are padded with empty cells
    pub fn add_row(&mut self, row: impl IntoIterator<Item = impl Into<String>>) {
        let mut row: Vec<String> = row.into_iter().map(Into::into).collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Render the table
    #[must_use]
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut output = String::new();
        render_line(&mut output, &self.headers, &widths);
        for row in &self.rows {
            render_line(&mut output, row, &widths);
        }
        output
    }
}

fn render_line(output: &mut String, cells: &[String], widths: &[usize]) {
    for (i, cell) in cells.iter().enumerate() {
        output.push_str(cell);
        if i + 1 < cells.len() {
            let pad = widths[i] - cell.chars().count() + 2;
            output.extend(std::iter::repeat(' ').take(pad));
        }
    }
    output.push('\n');
}

const BYTE_UNITS: &[&str] = &["B", "kB", "MB", "GB", "TB", "PB"];
const SI_PREFIXES: &[&str] = &["", "k", "M", "G", "T"];

/// Humanize a byte count with decimal (1000-based) units
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let exp = ((bytes as f64).log10() / 3.0).floor() as usize;
    let exp = exp.min(BYTE_UNITS.len() - 1);
    let value = bytes as f64 / 1000f64.powi(exp as i32);
    format!("{} {}", trim_trailing_zeros(value, 1), BYTE_UNITS[exp])
}

/// Humanize a rate with an SI prefix, e.g. `20.48 kIOPS`
#[must_use]
pub fn format_si(value: f64, digits: usize, unit: &str) -> String {
    if value == 0.0 {
        return format!("0 {unit}");
    }
    let exp = ((value.abs().log10() / 3.0).floor() as usize).min(SI_PREFIXES.len() - 1);
    let scaled = value / 1000f64.powi(exp as i32);
    format!(
        "{} {}{}",
        trim_trailing_zeros(scaled, digits),
        SI_PREFIXES[exp],
        unit
    )
}

/// Format a duration as `1h2m3s` / `3m42s` / `42s`
#[must_use]
pub fn format_duration(duration: std::time::Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m{seconds}s"),
        _ => format!("{hours}h{minutes}m{seconds}s"),
    }
}

fn trim_trailing_zeros(value: f64, digits: usize) -> String {
    let formatted = format!("{value:.digits$}");
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn table_alignment() {
        let mut table = Table::new(["Name", "Executor", "Time"]);
        table.add_row(["XcodeBenchmark", "local", "3m42s"]);
        table.add_row(["XcodeBenchmark", "vm", "4m1s"]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Name            Executor  Time");
        assert_eq!(lines[1], "XcodeBenchmark  local     3m42s");
        assert_eq!(lines[2], "XcodeBenchmark  vm        4m1s");
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1000), "1 kB");
        assert_eq!(format_bytes(81_920_000), "81.9 MB");
        assert_eq!(format_bytes(2_500_000_000), "2.5 GB");
    }

    #[test]
    fn si_formatting() {
        assert_eq!(format_si(0.0, 2, "IOPS"), "0 IOPS");
        assert_eq!(format_si(950.0, 2, "IOPS"), "950 IOPS");
        assert_eq!(format_si(20480.5, 2, "IOPS"), "20.48 kIOPS");
        assert_eq!(format_si(1_200_000.0, 2, "IOPS"), "1.2 MIOPS");
    }

    #[test]
    fn duration_formatting() {
        use std::time::Duration;
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(222)), "3m42s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h2m3s");
    }
}
