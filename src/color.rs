/// Represents a color in RGBA format, one byte per channel, straight (not premultiplied) alpha.
///
/// # Examples
///
/// ```
/// use quilt::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// assert_eq!(red.normalize(), [1.0, 0.0, 0.0, 1.0]);
///
/// let invisible = Color::rgba(255, 255, 255, 0);
/// assert_eq!(invisible.premultiplied(), [0.0, 0.0, 0.0, 0.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// Creates an opaque color.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Channel values mapped to `[0.0, 1.0]`.
    pub fn normalize(&self) -> [f32; 4] {
        self.0.map(|channel| channel as f32 / 255.0)
    }

    /// Normalized channels with red, green and blue multiplied by alpha. Vertex colors are
    /// stored in this form.
    pub fn premultiplied(&self) -> [f32; 4] {
        let [r, g, b, a] = self.normalize();
        [r * a, g * a, b * a, a]
    }

    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }

    /// Straight-alpha color in the layout expected by `wgpu` clear operations.
    pub(crate) fn to_wgpu(self, alpha: f32) -> wgpu::Color {
        let [r, g, b, a] = self.normalize();
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: (a * alpha) as f64,
        }
    }
}
