use std::path::PathBuf;

use clap::Parser;
use renderer::{FractalKind, DEFAULT_PALETTE_SIZE, MAX_PALETTE_SIZE};

#[derive(Parser, Debug)]
#[command(
    name = "fractalnova",
    author,
    version,
    about = "Interactive Mandelbrot and Julia set explorer"
)]
pub struct Cli {
    /// Escape-time iteration limit; clamped to 100..=1000.
    #[arg(
        long,
        value_name = "N",
        env = "FRACTALNOVA_ITERATIONS",
        default_value_t = 100,
        allow_negative_numbers = true
    )]
    pub iterations: i32,

    /// Fractal to start with: `mandelbrot` or `julia1` through `julia10`.
    #[arg(
        long,
        value_name = "NAME",
        value_parser = parse_fractal,
        default_value = "mandelbrot"
    )]
    pub fractal: FractalKind,

    /// Palette to start with; unknown names fall back to `rainbow`.
    #[arg(long, value_name = "NAME", default_value = "rainbow")]
    pub palette: String,

    /// Initial client size of the window (e.g. `1024x768`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_window_size,
        default_value = "800x600"
    )]
    pub window_size: (u32, u32),

    /// Wait for the display refresh before presenting each frame.
    #[arg(long, env = "FRACTALNOVA_VSYNC")]
    pub vsync: bool,

    /// Clear the frame target only once per second.
    #[arg(long)]
    pub lazy_clear: bool,

    /// Sample the palette with nearest filtering instead of linear.
    #[arg(long)]
    pub no_filtering: bool,

    /// Directory holding `mandelbrot.{vert,frag}` and `julia.{vert,frag}`.
    #[arg(
        long,
        value_name = "PATH",
        env = "FRACTALNOVA_SHADER_DIR",
        default_value = "shaders"
    )]
    pub shader_dir: PathBuf,

    /// Number of colors in the palette gradient (2..=8192).
    #[arg(
        long,
        value_name = "N",
        value_parser = parse_palette_size,
        default_value_t = DEFAULT_PALETTE_SIZE
    )]
    pub palette_size: u32,

    /// Log filter used when `RUST_LOG` is not set (e.g. `debug`, `renderer=trace`).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Render FRAMES frames against the recording driver and print the call
    /// trace instead of opening a window.
    #[arg(
        long,
        value_name = "FRAMES",
        num_args = 0..=1,
        default_missing_value = "1"
    )]
    pub dry_run: Option<u32>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_fractal(value: &str) -> Result<FractalKind, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("fractal name must not be empty".to_string());
    }
    trimmed.parse::<FractalKind>().map_err(|_| {
        format!("unknown fractal '{trimmed}'; expected mandelbrot or julia1..julia10")
    })
}

pub fn parse_window_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 800x600".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in window size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in window size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_palette_size(value: &str) -> Result<u32, String> {
    let size: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid palette size '{value}'"))?;
    if !(2..=MAX_PALETTE_SIZE).contains(&size) {
        return Err(format!(
            "palette size must be between 2 and {MAX_PALETTE_SIZE}, got {size}"
        ));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_accepts_common_separators() {
        assert_eq!(parse_window_size("800x600"), Ok((800, 600)));
        assert_eq!(parse_window_size(" 1024 X 768 "), Ok((1024, 768)));
        assert_eq!(parse_window_size("640×480"), Ok((640, 480)));
    }

    #[test]
    fn window_size_rejects_bad_input() {
        assert!(parse_window_size("800").is_err());
        assert!(parse_window_size("0x600").is_err());
        assert!(parse_window_size("widexhigh").is_err());
    }

    #[test]
    fn fractal_names_parse() {
        assert_eq!(parse_fractal("mandelbrot"), Ok(FractalKind::Mandelbrot));
        assert_eq!(parse_fractal("julia10"), Ok(FractalKind::Julia10));
        assert!(parse_fractal("").is_err());
        assert!(parse_fractal("julia11").is_err());
    }

    #[test]
    fn palette_size_has_a_floor() {
        assert_eq!(parse_palette_size("1024"), Ok(1024));
        assert!(parse_palette_size("1").is_err());
        assert!(parse_palette_size("many").is_err());
    }

    #[test]
    fn palette_size_has_a_ceiling() {
        assert_eq!(parse_palette_size("8192"), Ok(MAX_PALETTE_SIZE));
        assert!(parse_palette_size("8193").is_err());
        assert!(parse_palette_size("4000000000").is_err());
        assert!(Cli::try_parse_from(["fractalnova", "--palette-size", "4000000000"]).is_err());
    }

    #[test]
    fn dry_run_frames_default_to_one() {
        let cli = Cli::try_parse_from(["fractalnova", "--dry-run"]).expect("parse");
        assert_eq!(cli.dry_run, Some(1));

        let cli = Cli::try_parse_from(["fractalnova", "--dry-run", "5"]).expect("parse");
        assert_eq!(cli.dry_run, Some(5));

        let cli = Cli::try_parse_from(["fractalnova"]).expect("parse");
        assert_eq!(cli.dry_run, None);
    }

    #[test]
    fn defaults_match_renderer_defaults() {
        let cli = Cli::try_parse_from(["fractalnova"]).expect("parse");
        assert_eq!(cli.fractal, FractalKind::Mandelbrot);
        assert_eq!(cli.window_size, (800, 600));
        assert_eq!(cli.palette_size, DEFAULT_PALETTE_SIZE);
        assert!(!cli.no_filtering);
    }
}
