use std::fmt;

/// How the pixels of a draw are combined with the pixels already in the target.
///
/// All factors assume premultiplied alpha. `Auto` means "inherit from the parent" and is never
/// committed to a [`RenderState`](crate::RenderState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    Auto,
    None,
    #[default]
    Normal,
    Add,
    Multiply,
    Screen,
    Erase,
    Mask,
    Below,
}

impl BlendMode {
    /// `(source, destination)` factors. `Auto` resolves to `Normal`.
    pub fn factors(self) -> (wgpu::BlendFactor, wgpu::BlendFactor) {
        use wgpu::BlendFactor::*;

        match self {
            BlendMode::None => (One, Zero),
            BlendMode::Auto | BlendMode::Normal => (One, OneMinusSrcAlpha),
            BlendMode::Add => (One, One),
            BlendMode::Multiply => (Dst, OneMinusSrcAlpha),
            BlendMode::Screen => (One, OneMinusSrc),
            BlendMode::Erase => (Zero, OneMinusSrcAlpha),
            BlendMode::Mask => (Zero, SrcAlpha),
            BlendMode::Below => (OneMinusDstAlpha, DstAlpha),
        }
    }

    pub fn to_wgpu(self) -> wgpu::BlendState {
        let (src_factor, dst_factor) = self.factors();
        let component = wgpu::BlendComponent {
            src_factor,
            dst_factor,
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState {
            color: component,
            alpha: component,
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlendMode::Auto => "auto",
            BlendMode::None => "none",
            BlendMode::Normal => "normal",
            BlendMode::Add => "add",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Erase => "erase",
            BlendMode::Mask => "mask",
            BlendMode::Below => "below",
        };
        f.write_str(name)
    }
}
