/// Drawing surface size in physical pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report 0x0; no render target can be built for that.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn aspect(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Pixel viewport inside the current render target.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub fn full(size: SurfaceSize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
        }
    }
}

/// Viewport expressed as fractions of the surface, so eye layouts survive
/// resizes unchanged.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub const FULL: ViewportRect = ViewportRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };
    pub const LEFT_HALF: ViewportRect = ViewportRect { x: 0.0, y: 0.0, width: 0.5, height: 1.0 };
    pub const RIGHT_HALF: ViewportRect = ViewportRect { x: 0.5, y: 0.0, width: 0.5, height: 1.0 };

    pub fn resolve(self, size: SurfaceSize) -> Viewport {
        let (w, h) = (size.width as f32, size.height as f32);
        Viewport {
            x: (self.x * w).round(),
            y: (self.y * h).round(),
            width: (self.width * w).round().max(1.0),
            height: (self.height * h).round().max(1.0),
        }
    }
}
