//! Axis-aligned node bounds and quadrant routing

/// Child position inside a subdivided node, in child-slot order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomRight,
        Quadrant::BottomLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Bounds with y pointing up, so `top >= bottom`. Containment is inclusive
/// on every edge.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NodeBounds {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn center(&self) -> [f32; 2] {
        [
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        ]
    }

    #[inline]
    pub fn contains(&self, point: [f32; 2]) -> bool {
        point[0] >= self.left
            && point[0] <= self.right
            && point[1] >= self.bottom
            && point[1] <= self.top
    }

    /// Quadrant of `point` relative to the center. Ties route right and up,
    /// so every point maps to exactly one child.
    #[inline]
    pub fn quadrant_of(&self, point: [f32; 2]) -> Quadrant {
        let [cx, cy] = self.center();
        match (point[0] >= cx, point[1] >= cy) {
            (false, true) => Quadrant::TopLeft,
            (true, true) => Quadrant::TopRight,
            (true, false) => Quadrant::BottomRight,
            (false, false) => Quadrant::BottomLeft,
        }
    }

    /// Bounds of one child. Children share the center lines exactly, so
    /// `self.child(self.quadrant_of(p)).contains(p)` holds for any `p` inside.
    pub fn child(&self, quadrant: Quadrant) -> NodeBounds {
        let [cx, cy] = self.center();
        match quadrant {
            Quadrant::TopLeft => NodeBounds::new(self.left, self.top, cx, cy),
            Quadrant::TopRight => NodeBounds::new(cx, self.top, self.right, cy),
            Quadrant::BottomRight => NodeBounds::new(cx, cy, self.right, self.bottom),
            Quadrant::BottomLeft => NodeBounds::new(self.left, cy, cx, self.bottom),
        }
    }
}
