//! Number formatting and small helpers for the fixed-column files read by
//! the Fortran chemistry code.
//!
//! Rust's `{:e}` formatting writes exponents as `e-5`, while the files we
//! emit (and the programs reading them) use the C/Python convention of an
//! explicit sign and at least two exponent digits, e.g. `1.0000e-05`.
//! The functions here produce that convention.
use std::path::Path;

pub mod nan_array;

/// Width that file names are padded to in PAC input files.
pub const NAME_COLUMN_WIDTH: usize = 35;

/// Format `value` in scientific notation with `precision` digits after the
/// decimal point, using a signed, at least two digit exponent. If `upper` is
/// `true`, the exponent marker is `E` instead of `e`.
///
/// Non-finite values are written as `nan`, `inf` or `-inf` (uppercase if `upper`).
pub fn format_sci(value: f64, precision: usize, upper: bool) -> String {
    if !value.is_finite() {
        let s = format_non_finite(value);
        return if upper { s.to_uppercase() } else { s };
    }

    let s = format!("{value:.precision$e}");
    let (mantissa, exponent) = match s.split_once('e') {
        Some(parts) => parts,
        None => return s,
    };
    let exponent: i32 = match exponent.parse() {
        Ok(e) => e,
        Err(_) => return s,
    };

    let marker = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}{marker}{sign}{:02}", exponent.abs())
}

/// Format `value` in fixed point notation with `precision` decimal places.
/// Non-finite values are written as `nan`, `inf` or `-inf`.
pub fn format_fixed(value: f64, precision: usize) -> String {
    if value.is_finite() {
        format!("{value:.precision$}")
    } else {
        format_non_finite(value)
    }
}

fn format_non_finite(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

/// Right-pad `name` with spaces to [`NAME_COLUMN_WIDTH`] characters. Names that are
/// already longer are returned unchanged, with no separating space.
pub fn pad_name(name: &str) -> String {
    pad_to(name, NAME_COLUMN_WIDTH)
}

/// Right-pad `s` with spaces to `width` characters.
pub fn pad_to(s: &str, width: usize) -> String {
    let n = s.chars().count();
    let mut out = s.to_string();
    if n < width {
        out.push_str(&" ".repeat(width - n));
    }
    out
}

/// Parse a Fortran-style floating point value, which may use `d` or `D` as the
/// exponent marker (e.g. `1.0d0`, `2.5D-3`).
pub fn parse_fortran_f64(s: &str) -> Result<f64, std::num::ParseFloatError> {
    s.trim().replace(['d', 'D'], "e").parse()
}

/// Returns `true` if `p` points to an existing directory. An empty path is never
/// considered a directory, even though some platforms resolve it to the
/// current directory.
pub fn is_existing_dir(p: &Path) -> bool {
    !p.as_os_str().is_empty() && p.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sci() {
        assert_eq!(format_sci(1e-5, 4, false), "1.0000e-05");
        assert_eq!(format_sci(10.0, 5, true), "1.00000E+01");
        assert_eq!(format_sci(0.0, 2, false), "0.00e+00");
        assert_eq!(format_sci(-2.5e123, 1, false), "-2.5e+123");
        assert_eq!(format_sci(f64::NAN, 4, true), "NAN");
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(100.0, 1), "100.0");
        assert_eq!(format_fixed(1.0, 3), "1.000");
        assert_eq!(format_fixed(f64::NAN, 2), "nan");
        assert_eq!(format_fixed(f64::NEG_INFINITY, 2), "-inf");
    }

    #[test]
    fn test_padding() {
        assert_eq!(pad_name("template.spec").len(), NAME_COLUMN_WIDTH);
        let long = "x".repeat(40);
        assert_eq!(pad_name(&long), long);
    }

    #[test]
    fn test_fortran_double() {
        assert_eq!(parse_fortran_f64("1.000d0").unwrap(), 1.0);
        assert_eq!(parse_fortran_f64(" 2.5D-3 ").unwrap(), 2.5e-3);
        assert_eq!(parse_fortran_f64("1.0000e-05").unwrap(), 1e-5);
        assert!(parse_fortran_f64("abc").is_err());
    }

    #[test]
    fn test_empty_dir() {
        assert!(!is_existing_dir(Path::new("")));
        assert!(is_existing_dir(Path::new(env!("CARGO_MANIFEST_DIR"))));
    }
}
