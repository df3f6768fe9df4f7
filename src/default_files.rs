use crate::config::PacConfig;
use crate::interface::pac::input_file::{self as inp, InputFileOptions};
use crate::interface::pac::LptOptions;

/// The default PAC configuration as TOML, listing every default that does not
/// depend on the dataset.
pub fn default_pac_config_toml() -> Result<String, toml::ser::Error> {
    let input_file = InputFileOptions {
        spec_file: Some(inp::DEFAULT_SPEC_FILE.to_string()),
        reac_file: Some(inp::DEFAULT_REAC_FILE.to_string()),
        therm_file: Some(inp::DEFAULT_THERM_FILE.to_string()),
        star_file: Some(inp::DEFAULT_STAR_FILE.to_string()),
        ipho_file: Some(inp::DEFAULT_IPHO_FILE.to_string()),
        r_star: Some(inp::DEFAULT_R_STAR),
        r_planet: Some(inp::DEFAULT_R_PLANET),
        m_planet: Some(inp::DEFAULT_M_PLANET),
        a: Some(inp::DEFAULT_A),
        zenith_angle: Some(inp::DEFAULT_ZENITH_ANGLE),
        albedo: Some(inp::DEFAULT_ALBEDO),
        nlon: Some(inp::DEFAULT_NLON),
        nrot: Some(inp::DEFAULT_NROT),
        use_2d_eddy: Some(false),
        use_mixing: Some(true),
        use_photo: Some(true),
        ..Default::default()
    };
    let default_cfg = PacConfig { input_file, lpt: LptOptions::default() };
    toml::to_string_pretty(&default_cfg)
}
