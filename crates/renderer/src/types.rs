use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};

/// Lowest iteration count the fragment shaders are driven with.
pub const MIN_ITERATIONS: i32 = 100;
/// Highest iteration count the fragment shaders are driven with.
pub const MAX_ITERATIONS: i32 = 1000;
/// Default number of samples in a palette gradient.
pub const DEFAULT_PALETTE_SIZE: u32 = 4 * 256;
/// Largest palette gradient; the texture width every wgpu adapter supports.
pub const MAX_PALETTE_SIZE: u32 = 8192;

/// Two floats as laid out in the shader parameter blocks.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

impl Vertex {
    pub const ZERO: Vertex = Vertex { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vertex {
    type Output = Vertex;

    fn add(self, rhs: Vertex) -> Vertex {
        Vertex::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Fractal selectable from the UI. Every Julia variant shares one shader pair
/// and differs only in its complex constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FractalKind {
    #[default]
    Mandelbrot,
    Julia1,
    Julia2,
    Julia3,
    Julia4,
    Julia5,
    Julia6,
    Julia7,
    Julia8,
    Julia9,
    Julia10,
}

impl FractalKind {
    pub const ALL: [FractalKind; 11] = [
        FractalKind::Mandelbrot,
        FractalKind::Julia1,
        FractalKind::Julia2,
        FractalKind::Julia3,
        FractalKind::Julia4,
        FractalKind::Julia5,
        FractalKind::Julia6,
        FractalKind::Julia7,
        FractalKind::Julia8,
        FractalKind::Julia9,
        FractalKind::Julia10,
    ];

    /// Shader family; selects `<family>.vert` / `<family>.frag`.
    pub fn family(self) -> &'static str {
        match self {
            FractalKind::Mandelbrot => "mandelbrot",
            _ => "julia",
        }
    }

    /// Complex constant fed to the fragment shader.
    pub fn complex(self) -> Vertex {
        match self {
            FractalKind::Mandelbrot => Vertex::ZERO,
            FractalKind::Julia1 => Vertex::new(-0.4, 0.6),
            FractalKind::Julia2 => Vertex::new(0.285, 0.0),
            FractalKind::Julia3 => Vertex::new(0.285, 0.01),
            FractalKind::Julia4 => Vertex::new(0.45, 0.1428),
            FractalKind::Julia5 => Vertex::new(-0.70176, -0.3842),
            FractalKind::Julia6 => Vertex::new(-0.835, -0.2321),
            FractalKind::Julia7 => Vertex::new(-0.8, 0.156),
            FractalKind::Julia8 => Vertex::new(-0.7269, 0.1889),
            FractalKind::Julia9 => Vertex::new(0.0, -0.8),
            FractalKind::Julia10 => Vertex::new(-0.1, 0.651),
        }
    }

    /// Julia variant by its 1-based number.
    pub fn julia(index: u32) -> Option<Self> {
        match index {
            1..=10 => Some(Self::ALL[index as usize]),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FractalKind::Mandelbrot => "mandelbrot",
            FractalKind::Julia1 => "julia1",
            FractalKind::Julia2 => "julia2",
            FractalKind::Julia3 => "julia3",
            FractalKind::Julia4 => "julia4",
            FractalKind::Julia5 => "julia5",
            FractalKind::Julia6 => "julia6",
            FractalKind::Julia7 => "julia7",
            FractalKind::Julia8 => "julia8",
            FractalKind::Julia9 => "julia9",
            FractalKind::Julia10 => "julia10",
        }
    }
}

impl fmt::Display for FractalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FractalKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown fractal '{value}'; expected mandelbrot or julia1..julia10"
                )
            })
    }
}

/// Named color gradients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PaletteKind {
    #[default]
    Rainbow,
    RainbowRev,
    Red,
    Green,
    Blue,
    BlackAndWhite,
    BlackAndWhiteRev,
}

impl PaletteKind {
    pub const ALL: [PaletteKind; 7] = [
        PaletteKind::Rainbow,
        PaletteKind::RainbowRev,
        PaletteKind::Red,
        PaletteKind::Green,
        PaletteKind::Blue,
        PaletteKind::BlackAndWhite,
        PaletteKind::BlackAndWhiteRev,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PaletteKind::Rainbow => "rainbow",
            PaletteKind::RainbowRev => "rainbow-rev",
            PaletteKind::Red => "red",
            PaletteKind::Green => "green",
            PaletteKind::Blue => "blue",
            PaletteKind::BlackAndWhite => "black-and-white",
            PaletteKind::BlackAndWhiteRev => "black-and-white-rev",
        }
    }

    /// Resolves a palette name, falling back to [`PaletteKind::Rainbow`] with a
    /// warning when the name is not recognised.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(kind) => kind,
            Err(_) => {
                tracing::warn!(palette = name, "unknown palette; falling back to rainbow");
                PaletteKind::Rainbow
            }
        }
    }
}

impl fmt::Display for PaletteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaletteKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        let kind = match normalized.as_str() {
            "rainbow" => PaletteKind::Rainbow,
            "rainbow-rev" | "rainbowrev" | "rainbow-reverse" => PaletteKind::RainbowRev,
            "red" => PaletteKind::Red,
            "green" => PaletteKind::Green,
            "blue" => PaletteKind::Blue,
            "black-and-white" | "blackandwhite" | "bw" => PaletteKind::BlackAndWhite,
            "black-and-white-rev" | "blackandwhiterev" | "bw-rev" => {
                PaletteKind::BlackAndWhiteRev
            }
            _ => return Err(format!("unknown palette '{value}'")),
        };
        Ok(kind)
    }
}

/// How frames reach the screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderBackend {
    /// Real window rendered through `wgpu`.
    #[default]
    Window,
    /// Recording driver and surface; renders `frames` frames and logs the
    /// driver call trace.
    DryRun { frames: u32 },
}

/// Runtime configuration passed from the CLI into the renderer.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub window_size: (u32, u32),
    pub iterations: i32,
    pub fractal: FractalKind,
    pub palette: PaletteKind,
    pub palette_size: u32,
    pub vsync: bool,
    pub lazy_clear: bool,
    pub texture_filtering: bool,
    pub shader_dir: PathBuf,
    pub backend: RenderBackend,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_size: (800, 600),
            iterations: MIN_ITERATIONS,
            fractal: FractalKind::Mandelbrot,
            palette: PaletteKind::Rainbow,
            palette_size: DEFAULT_PALETTE_SIZE,
            vsync: false,
            lazy_clear: false,
            texture_filtering: true,
            shader_dir: PathBuf::from("shaders"),
            backend: RenderBackend::Window,
        }
    }
}

/// Clamps an iteration count into the range the shaders are tuned for.
pub fn clamp_iterations(iterations: i32) -> i32 {
    iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS)
}
