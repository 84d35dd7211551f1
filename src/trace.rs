//! CSV trace writer
//!
//! Writes recorded ticks as `time_s,vin,iout,phase` rows. Paused ticks carry
//! the phase `paused`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::host::TraceSample;

pub const CSV_HEADER: &str = "time_s,vin,iout,phase";

/// Write a trace to any writer
pub fn write_trace<W: Write>(mut writer: W, samples: &[TraceSample]) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for sample in samples {
        let phase = sample.phase.map_or("paused", |p| p.as_str());
        writeln!(
            writer,
            "{:.9},{:e},{:e},{}",
            sample.time, sample.input, sample.output, phase
        )?;
    }
    writer.flush()
}

/// Write a trace to a CSV file
///
/// # Example
/// ```no_run
/// use istep::trace::write_trace_csv;
///
/// # fn main() -> std::io::Result<()> {
/// write_trace_csv("trace.csv", &[])?;
/// # Ok(())
/// # }
/// ```
pub fn write_trace_csv(path: impl AsRef<Path>, samples: &[TraceSample]) -> io::Result<()> {
    let file = File::create(path)?;
    write_trace(BufWriter::new(file), samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Phase;

    #[test]
    fn test_trace_layout() {
        let samples = [
            TraceSample {
                time: 0.0,
                input: -0.065,
                output: 1.5e-10,
                phase: Some(Phase::Active),
            },
            TraceSample {
                time: 0.001,
                input: -0.065,
                output: 0.0,
                phase: None,
            },
        ];

        let mut buffer = Vec::new();
        write_trace(&mut buffer, &samples).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "0.000000000,-6.5e-2,1.5e-10,active");
        assert_eq!(lines[2], "0.001000000,-6.5e-2,0e0,paused");
    }

    #[test]
    fn test_empty_trace_has_header_only() {
        let mut buffer = Vec::new();
        write_trace(&mut buffer, &[]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), format!("{}\n", CSV_HEADER));
    }
}
