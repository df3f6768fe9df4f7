//! The PAC main input file (`<model>.inp`).
//!
//! PAC reads this file by position, so each line has a fixed layout: file names
//! are padded to 35 characters, numeric lines use Fortran `d0` doubles, and every
//! line ends in a `!` comment describing its fields. The 1D layout has 14 lines;
//! the pseudo-2D layout switches the numerical method to solid body rotation and
//! adds the lpt file and the longitude/rotation counts.
use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{PacDim, PacError};
use crate::dataset::GriddedDataset;
use crate::utils::{format_fixed, format_sci, pad_name, pad_to, parse_fortran_f64, NAME_COLUMN_WIDTH};

pub const DEFAULT_SPEC_FILE: &str = "template.spec";
pub const DEFAULT_REAC_FILE: &str = "template.reac";
pub const DEFAULT_THERM_FILE: &str = "template.therm";
pub const DEFAULT_STAR_FILE: &str = "template.star";
pub const DEFAULT_IPHO_FILE: &str = "template.ipho";
pub const DEFAULT_R_STAR: f64 = 1.0;
pub const DEFAULT_R_PLANET: f64 = 11.2;
pub const DEFAULT_M_PLANET: f64 = 317.8;
pub const DEFAULT_A: f64 = 0.01;
pub const DEFAULT_ZENITH_ANGLE: f64 = 48.0;
pub const DEFAULT_ALBEDO: f64 = 0.0;
pub const DEFAULT_NLON: u32 = 90;
pub const DEFAULT_NROT: u32 = 30;

const NUMERICAL_METHOD_1D: &str = "2";
const NUMERICAL_METHOD_SBR: &str = "-1";

/// User overrides for the input file. Anything left as `None` (or an empty file
/// name) takes its default when resolved against a dataset.
///
/// `pressure_bot` and `pressure_top` are given in the pressure unit of the dataset.
/// `lpt_file`, `nlon`, `nrot` and `use_2d_eddy` only apply to pseudo-2D runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFileOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zab_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reac_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therm_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eddy_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub star_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipho_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lpt_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_bot: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub np: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_star: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_planet: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m_planet: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zenith_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub albedo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nlon: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nrot: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_2d_eddy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_mixing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_photo: Option<bool>,
}

/// Every value written to an input file, after defaults have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFileRecord {
    pub model_name: String,
    pub spec_file: String,
    pub zab_file: String,
    pub reac_file: String,
    pub therm_file: String,
    pub eddy_file: String,
    pub star_file: String,
    pub ipho_file: String,
    pub lpt_file: String,
    /// Bottom (highest) pressure in bar
    pub pressure_bot: f64,
    /// Top (lowest) pressure in bar
    pub pressure_top: f64,
    /// Number of heights
    pub np: usize,
    /// Stellar radius in solar radii
    pub r_star: f64,
    /// Planetary radius in Earth radii
    pub r_planet: f64,
    /// Planetary mass in Earth masses
    pub m_planet: f64,
    /// Orbital distance in AU
    pub a: f64,
    /// Zenith angle in degrees
    pub zenith_angle: f64,
    pub albedo: f64,
    pub nlon: u32,
    pub nrot: u32,
    pub use_2d_eddy: bool,
    pub use_mixing: bool,
    pub use_photo: bool,
}

fn name_or(name: &Option<String>, default: impl FnOnce() -> String) -> String {
    match name {
        Some(n) if !n.is_empty() => n.clone(),
        _ => default(),
    }
}

impl InputFileRecord {
    /// Apply the defaults for everything not set in `options`.
    ///
    /// The model name defaults to the dataset tag and the pressure range and
    /// number of heights to those of the dataset.
    pub fn resolve(ds: &GriddedDataset, options: &InputFileOptions) -> Result<Self, PacError> {
        let model_name = match (&options.model_name, ds.tag()) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(tag)) => tag.to_string(),
            _ => return Err(PacError::MissingModelName),
        };

        let p_max = ds.z.iter().copied().fold(f64::NAN, f64::max);
        let p_min = ds.z.iter().copied().fold(f64::NAN, f64::min);
        let p_unit = ds.attrs.p_unit;

        Ok(Self {
            spec_file: name_or(&options.spec_file, || DEFAULT_SPEC_FILE.to_string()),
            zab_file: name_or(&options.zab_file, || format!("{model_name}.zab")),
            reac_file: name_or(&options.reac_file, || DEFAULT_REAC_FILE.to_string()),
            therm_file: name_or(&options.therm_file, || DEFAULT_THERM_FILE.to_string()),
            eddy_file: name_or(&options.eddy_file, || format!("{model_name}.eddy")),
            star_file: name_or(&options.star_file, || DEFAULT_STAR_FILE.to_string()),
            ipho_file: name_or(&options.ipho_file, || DEFAULT_IPHO_FILE.to_string()),
            lpt_file: name_or(&options.lpt_file, || format!("{model_name}.lpt")),
            pressure_bot: p_unit.to_bar(options.pressure_bot.unwrap_or(p_max)),
            pressure_top: p_unit.to_bar(options.pressure_top.unwrap_or(p_min)),
            np: options.np.unwrap_or(ds.z.len()),
            r_star: options.r_star.unwrap_or(DEFAULT_R_STAR),
            r_planet: options.r_planet.unwrap_or(DEFAULT_R_PLANET),
            m_planet: options.m_planet.unwrap_or(DEFAULT_M_PLANET),
            a: options.a.unwrap_or(DEFAULT_A),
            zenith_angle: options.zenith_angle.unwrap_or(DEFAULT_ZENITH_ANGLE),
            albedo: options.albedo.unwrap_or(DEFAULT_ALBEDO),
            nlon: options.nlon.unwrap_or(DEFAULT_NLON),
            nrot: options.nrot.unwrap_or(DEFAULT_NROT),
            use_2d_eddy: options.use_2d_eddy.unwrap_or(false),
            use_mixing: options.use_mixing.unwrap_or(true),
            use_photo: options.use_photo.unwrap_or(true),
            model_name,
        })
    }

    /// Name of the input file itself.
    pub fn file_name(&self) -> String {
        format!("{}.inp", self.model_name)
    }

    /// The file contents for a `dim` run. The 1D layout ends with a newline,
    /// the pseudo-2D one does not.
    pub fn render(&self, dim: PacDim) -> String {
        let mut lines = self.common_lines(dim);
        match dim {
            PacDim::One => {
                lines.push(comment_line(NUMERICAL_METHOD_1D, 34, "numerical method (1/2/3) (-1 is solid body rotation)"));
                let mut s = lines.join("\n");
                s.push('\n');
                s
            },
            PacDim::Two => {
                lines.push(comment_line(NUMERICAL_METHOD_SBR, 33, "numerical method (1/2/3) (-1 is solid body rotation)"));
                lines.push(name_line(&self.lpt_file, "sbr: longitude-pressure-temperature structure file"));
                lines.push(comment_line(
                    &format!("{} {}", self.nlon, self.nrot), 30,
                    "sbr: No longitudes per period, No rotation periods"
                ));
                lines.join("\n")
            },
        }
    }

    fn common_lines(&self, dim: PacDim) -> Vec<String> {
        let eddy_flag = matches!(dim, PacDim::Two) && self.use_2d_eddy;
        vec![
            name_line(&self.spec_file, "species file"),
            name_line(&self.zab_file, "z,p,T (initial abundances) file"),
            comment_line("2  0", 31, "No reaction files, (0/1) not/use iondip treatment"),
            name_line(&self.reac_file, "reaction file"),
            name_line(&self.therm_file, "reaction file"),
            name_line(&format!("{} {}", self.eddy_file, u8::from(eddy_flag)), "eddy diffusion coefficient profile file"),
            name_line(&self.star_file, "stellar spectrum file"),
            name_line(&self.ipho_file, "photo cross sections info file"),
            comment_line(
                &format!("{}d0  {}  {}", format_fixed(self.pressure_bot, 1), format_sci(self.pressure_top, 4, false), self.np),
                12, "pressure [bar] at bottom/top, No heights"
            ),
            comment_line(&format!("{}d0", format_fixed(self.r_star, 3)), 28, "star radius [R(Sun)]"),
            comment_line(
                &format!("{}d0  {}d0", format_fixed(self.r_planet, 3), format_fixed(self.m_planet, 2)),
                17, "planet radius [R(Earth)], planet mass [m(Earth)]"
            ),
            comment_line(
                &format!("{}d0  {}d0  {}d0", format_fixed(self.a, 5), format_fixed(self.zenith_angle, 1), format_fixed(self.albedo, 1)),
                11, "orbital distance [AU], zenith angle [deg], surface albedo"
            ),
            comment_line(
                &format!("{}  {}", u8::from(self.use_mixing), u8::from(self.use_photo)),
                31, "deactivate/activate (0/1) diffusion and photochemistry"
            ),
        ]
    }
}

/// `value` padded to the name column, then the comment.
fn name_line(value: &str, comment: &str) -> String {
    format!("{}! {comment}", pad_name(value))
}

/// `value`, `gap` spaces, then the comment.
fn comment_line(value: &str, gap: usize, comment: &str) -> String {
    format!("{}! {comment}", pad_to(value, value.chars().count() + gap))
}

#[derive(Debug, thiserror::Error)]
pub enum ParseInputFileError {
    #[error("Input file has {0} lines, expected 14 (1D) or 16 (pseudo-2D)")]
    WrongLineCount(usize),
    #[error("Line {0} has no '!' comment marker")]
    NoComment(usize),
    #[error("Line {line}: expected {expected} values, found '{found}'")]
    WrongFieldCount { line: usize, expected: usize, found: String },
    #[error("Line {line}: could not parse '{value}' as a number")]
    BadNumber { line: usize, value: String },
    #[error("Line {line}: unknown numerical method '{value}'")]
    UnknownMethod { line: usize, value: String },
}

/// The values read back from an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInputFile {
    pub dim: PacDim,
    pub spec_file: String,
    pub zab_file: String,
    pub reac_file: String,
    pub therm_file: String,
    pub eddy_file: String,
    pub use_2d_eddy: bool,
    pub star_file: String,
    pub ipho_file: String,
    pub pressure_bot: f64,
    pub pressure_top: f64,
    pub np: usize,
    pub r_star: f64,
    pub r_planet: f64,
    pub m_planet: f64,
    pub a: f64,
    pub zenith_angle: f64,
    pub albedo: f64,
    pub use_mixing: bool,
    pub use_photo: bool,
    pub lpt_file: Option<String>,
    pub nlon: Option<u32>,
    pub nrot: Option<u32>,
}

static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?<value>[^!]*)!").unwrap());

/// Read back a 1D or pseudo-2D PAC input file.
pub fn parse_input_file(text: &str) -> Result<ParsedInputFile, ParseInputFileError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != 14 && lines.len() != 16 {
        return Err(ParseInputFileError::WrongLineCount(lines.len()));
    }

    let fields = lines.iter()
        .enumerate()
        .map(|(i, line)| {
            LINE_RE.captures(line)
                .and_then(|c| c.name("value"))
                .map(|v| v.as_str().split_whitespace().collect::<Vec<_>>())
                .ok_or(ParseInputFileError::NoComment(i + 1))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let values = |iline: usize, n: usize| field_values(&fields, iline, n);
    let name = |iline: usize| values(iline, 1).map(|v| v[0].to_string());

    let eddy = values(6, 2)?;
    let pressures = values(9, 3)?;
    let planet = values(11, 2)?;
    let orbit = values(12, 3)?;
    let switches = values(13, 2)?;
    let method = values(14, 1)?[0];

    let dim = match (method, lines.len()) {
        (NUMERICAL_METHOD_SBR, 16) => PacDim::Two,
        (NUMERICAL_METHOD_SBR, _) => return Err(ParseInputFileError::WrongLineCount(lines.len())),
        (_, 14) => PacDim::One,
        _ => return Err(ParseInputFileError::UnknownMethod { line: 14, value: method.to_string() }),
    };

    let (lpt_file, nlon, nrot) = if dim == PacDim::Two {
        let counts = values(16, 2)?;
        (Some(name(15)?), Some(parse_integer(16, counts[0])?), Some(parse_integer(16, counts[1])?))
    } else {
        (None, None, None)
    };

    Ok(ParsedInputFile {
        dim,
        spec_file: name(1)?,
        zab_file: name(2)?,
        reac_file: name(4)?,
        therm_file: name(5)?,
        eddy_file: eddy[0].to_string(),
        use_2d_eddy: parse_integer(6, eddy[1])? != 0,
        star_file: name(7)?,
        ipho_file: name(8)?,
        pressure_bot: parse_number(9, pressures[0])?,
        pressure_top: parse_number(9, pressures[1])?,
        np: parse_integer(9, pressures[2])? as usize,
        r_star: parse_number(10, values(10, 1)?[0])?,
        r_planet: parse_number(11, planet[0])?,
        m_planet: parse_number(11, planet[1])?,
        a: parse_number(12, orbit[0])?,
        zenith_angle: parse_number(12, orbit[1])?,
        albedo: parse_number(12, orbit[2])?,
        use_mixing: parse_integer(13, switches[0])? != 0,
        use_photo: parse_integer(13, switches[1])? != 0,
        lpt_file,
        nlon,
        nrot,
    })
}

fn field_values<'a>(fields: &'a [Vec<&'a str>], iline: usize, n: usize) -> Result<&'a [&'a str], ParseInputFileError> {
    let f = &fields[iline - 1];
    if f.len() != n {
        return Err(ParseInputFileError::WrongFieldCount { line: iline, expected: n, found: f.join(" ") });
    }
    Ok(f.as_slice())
}

fn parse_number(iline: usize, value: &str) -> Result<f64, ParseInputFileError> {
    parse_fortran_f64(value)
        .map_err(|_| ParseInputFileError::BadNumber { line: iline, value: value.to_string() })
}

fn parse_integer(iline: usize, value: &str) -> Result<u32, ParseInputFileError> {
    value.parse()
        .map_err(|_| ParseInputFileError::BadNumber { line: iline, value: value.to_string() })
}

impl Display for ParsedInputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} PAC input file", self.dim)?;
        writeln!(f, "  species/zab/reac/therm: {} {} {} {}", self.spec_file, self.zab_file, self.reac_file, self.therm_file)?;
        writeln!(f, "  eddy: {} (2D profile: {})", self.eddy_file, self.use_2d_eddy)?;
        writeln!(f, "  star/ipho: {} {}", self.star_file, self.ipho_file)?;
        writeln!(f, "  pressure: {} to {} bar on {} heights", self.pressure_bot, self.pressure_top, self.np)?;
        writeln!(f, "  R_star = {}, R_planet = {}, M_planet = {}", self.r_star, self.r_planet, self.m_planet)?;
        write!(f, "  a = {} AU, zenith angle = {}, albedo = {}", self.a, self.zenith_angle, self.albedo)?;
        if let (Some(lpt), Some(nlon), Some(nrot)) = (&self.lpt_file, self.nlon, self.nrot) {
            write!(f, "\n  lpt: {lpt}, {nlon} longitudes, {nrot} rotations")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_utils::uniform_dataset;
    use crate::units::PressureUnit;

    fn record(p_unit: PressureUnit, z: Vec<f64>) -> InputFileRecord {
        let ds = uniform_dataset(vec![0.0, 180.0], vec![0.0], z, p_unit, 1000.0, 10.0)
            .select_time(100.0)
            .unwrap();
        InputFileRecord::resolve(&ds, &InputFileOptions::default()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let rec = record(PressureUnit::Pa, vec![1e7, 1e5, 1e0]);
        assert_eq!(rec.model_name, "test_model");
        assert_eq!(rec.file_name(), "test_model.inp");
        assert_eq!(rec.zab_file, "test_model.zab");
        assert_eq!(rec.eddy_file, "test_model.eddy");
        assert_eq!(rec.lpt_file, "test_model.lpt");
        assert_eq!(rec.spec_file, DEFAULT_SPEC_FILE);
        assert_eq!(rec.pressure_bot, 100.0);
        assert_eq!(rec.pressure_top, 1e-5);
        assert_eq!(rec.np, 3);
    }

    #[test]
    fn test_empty_names_use_defaults() {
        let ds = uniform_dataset(vec![0.0, 180.0], vec![0.0], vec![1.0], PressureUnit::Bar, 1000.0, 10.0);
        let options = InputFileOptions {
            spec_file: Some(String::new()),
            model_name: Some("hd189".to_string()),
            ..Default::default()
        };
        let rec = InputFileRecord::resolve(&ds, &options).unwrap();
        assert_eq!(rec.spec_file, DEFAULT_SPEC_FILE);
        assert_eq!(rec.zab_file, "hd189.zab");
    }

    #[test]
    fn test_1d_layout() {
        let text = record(PressureUnit::Bar, vec![100.0, 1.0, 1e-5]).render(PacDim::One);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 14);
        assert!(text.ends_with('\n'));

        let expected = [
            "template.spec                      ! species file",
            "test_model.zab                     ! z,p,T (initial abundances) file",
            "2  0                               ! No reaction files, (0/1) not/use iondip treatment",
            "template.reac                      ! reaction file",
            "template.therm                     ! reaction file",
            "test_model.eddy 0                  ! eddy diffusion coefficient profile file",
            "template.star                      ! stellar spectrum file",
            "template.ipho                      ! photo cross sections info file",
            "100.0d0  1.0000e-05  3            ! pressure [bar] at bottom/top, No heights",
            "1.000d0                            ! star radius [R(Sun)]",
            "11.200d0  317.80d0                 ! planet radius [R(Earth)], planet mass [m(Earth)]",
            "0.01000d0  48.0d0  0.0d0           ! orbital distance [AU], zenith angle [deg], surface albedo",
            "1  1                               ! deactivate/activate (0/1) diffusion and photochemistry",
            "2                                  ! numerical method (1/2/3) (-1 is solid body rotation)",
        ];
        for (line, exp) in lines.iter().zip(expected) {
            assert_eq!(*line, exp);
        }
    }

    #[test]
    fn test_2d_layout() {
        let mut rec = record(PressureUnit::Bar, vec![100.0, 1e-5]);
        rec.use_2d_eddy = true;
        rec.ipho_file = "a_rather_long_photo_file.ipho".to_string();
        let text = rec.render(PacDim::Two);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        assert!(!text.ends_with('\n'));
        assert_eq!(lines[5], "test_model.eddy 1                  ! eddy diffusion coefficient profile file");
        // the comment starts at the same column regardless of the name length
        assert_eq!(lines[7].find('!'), Some(NAME_COLUMN_WIDTH));

        rec.spec_file = "short.spec".to_string();
        let ipho_line = "a_rather_long_photo_file.ipho      ! photo cross sections info file";
        for dim in [PacDim::One, PacDim::Two] {
            let text = rec.render(dim);
            assert_eq!(text.lines().nth(7), Some(ipho_line));
            assert_eq!(text.lines().next().unwrap().find('!'), Some(NAME_COLUMN_WIDTH));
        }
        assert_eq!(lines[13], "-1                                 ! numerical method (1/2/3) (-1 is solid body rotation)");
        assert_eq!(lines[14], "test_model.lpt                     ! sbr: longitude-pressure-temperature structure file");
        assert_eq!(lines[15], "90 30                              ! sbr: No longitudes per period, No rotation periods");
    }

    #[test]
    fn test_2d_eddy_ignored_in_1d() {
        let mut rec = record(PressureUnit::Bar, vec![100.0, 1e-5]);
        rec.use_2d_eddy = true;
        let text = rec.render(PacDim::One);
        assert!(text.lines().nth(5).unwrap().starts_with("test_model.eddy 0 "));
    }

    #[test]
    fn test_round_trip() {
        let ds = uniform_dataset(vec![0.0, 180.0], vec![0.0], vec![2e6, 3.5e-1], PressureUnit::Pa, 1000.0, 10.0);
        let options = InputFileOptions {
            star_file: Some("sun.star".to_string()),
            r_star: Some(0.805),
            a: Some(0.03142),
            zenith_angle: Some(60.0),
            use_photo: Some(false),
            nlon: Some(120),
            use_2d_eddy: Some(true),
            ..Default::default()
        };
        let rec = InputFileRecord::resolve(&ds, &options).unwrap();

        for dim in [PacDim::One, PacDim::Two] {
            let parsed = parse_input_file(&rec.render(dim)).unwrap();
            assert_eq!(parsed.dim, dim);
            assert_eq!(parsed.spec_file, rec.spec_file);
            assert_eq!(parsed.zab_file, rec.zab_file);
            assert_eq!(parsed.star_file, "sun.star");
            assert_eq!(parsed.eddy_file, rec.eddy_file);
            assert_eq!(parsed.use_2d_eddy, dim == PacDim::Two);
            assert_eq!(parsed.np, 2);
            assert!((parsed.pressure_bot - 20.0).abs() < 1e-9);
            assert!((parsed.pressure_top - 3.5e-6).abs() < 1e-12);
            assert!((parsed.r_star - 0.805).abs() < 1e-9);
            assert!((parsed.a - 0.03142).abs() < 1e-9);
            assert_eq!(parsed.zenith_angle, 60.0);
            assert!(parsed.use_mixing);
            assert!(!parsed.use_photo);
        }

        let parsed = parse_input_file(&rec.render(PacDim::Two)).unwrap();
        assert_eq!(parsed.lpt_file.as_deref(), Some(rec.lpt_file.as_str()));
        assert_eq!(parsed.nlon, Some(120));
        assert_eq!(parsed.nrot, Some(DEFAULT_NROT));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_input_file("a ! b\n"), Err(ParseInputFileError::WrongLineCount(1))));

        let text = record(PressureUnit::Bar, vec![100.0, 1.0]).render(PacDim::One);
        let broken = text.replacen("1.000d0", "abc", 1);
        assert!(matches!(parse_input_file(&broken), Err(ParseInputFileError::BadNumber { line: 10, .. })));
    }
}
