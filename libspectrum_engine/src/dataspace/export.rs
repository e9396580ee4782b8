use std::io::Write;

use super::Dataspace;
use crate::error::ExportError;

fn write_row<W: Write>(
    writer: &mut W,
    space: &Dataspace,
    width: u32,
    point: impl Fn(u32) -> Vec<u32>,
) -> Result<(), ExportError> {
    let row: Vec<String> = (0..=width)
        .map(|i| space.get(&point(i)).to_string())
        .collect();
    writer.write_all(row.join(",").as_bytes())?;
    Ok(())
}

impl Dataspace {
    /// Write the dataspace as CSV.
    ///
    /// 1-D data is a single line. 2-D data has one line per coordinate 1 row,
    /// columns over coordinate 0, each line terminated by `;`. 3-D data is one
    /// such block per coordinate 0 index, preceded by `x=<index>`. Higher
    /// dimensions fall back to one `c0,...,cn,weight` line per entry.
    pub fn export_csv<W: Write>(&self, writer: &mut W) -> Result<(), ExportError> {
        let limits = match self.limits() {
            Some(l) => l.to_vec(),
            None => return Ok(()),
        };
        match limits.len() {
            0 => writeln!(writer, "{}", self.get(&[]))?,
            1 => {
                write_row(writer, self, limits[0], |x| vec![x])?;
                writeln!(writer)?;
            }
            2 => {
                for y in 0..=limits[1] {
                    write_row(writer, self, limits[0], |x| vec![x, y])?;
                    writeln!(writer, ";")?;
                }
            }
            3 => {
                for x in 0..=limits[0] {
                    writeln!(writer, "x={x}")?;
                    for z in 0..=limits[2] {
                        write_row(writer, self, limits[1], |y| vec![x, y, z])?;
                        writeln!(writer, ";")?;
                    }
                }
            }
            _ => {
                for entry in self.range(&[]) {
                    let mut fields: Vec<String> =
                        entry.coords.iter().map(|c| c.to_string()).collect();
                    fields.push(entry.weight.to_string());
                    writeln!(writer, "{}", fields.join(","))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::calibration::{Axis, Calibration};
    use crate::dataspace::{Dataspace, StorageKind};

    fn space(n: usize) -> Dataspace {
        let axes = (0..n)
            .map(|_| Axis::new(Calibration::default(), 0, ""))
            .collect();
        Dataspace::new(StorageKind::SparseMap, axes)
    }

    fn export(space: &Dataspace) -> String {
        let mut buffer = Vec::new();
        space.export_csv(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_export_1d() {
        let mut s = space(1);
        s.add_one(&[0]);
        s.add_one(&[2]);
        s.add_one(&[2]);
        assert_eq!(export(&s), "1,0,2\n");
    }

    #[test]
    fn test_export_2d() {
        let mut s = space(2);
        s.add_one(&[0, 0]);
        s.add_one(&[1, 1]);
        s.add_one(&[1, 1]);
        assert_eq!(export(&s), "1,0;\n0,2;\n");
    }

    #[test]
    fn test_export_3d() {
        let mut s = space(3);
        s.add_one(&[0, 0, 0]);
        s.add_one(&[1, 1, 0]);
        assert_eq!(export(&s), "x=0\n1,0;\nx=1\n0,1;\n");
    }

    #[test]
    fn test_export_empty() {
        assert_eq!(export(&space(2)), "");
    }
}
