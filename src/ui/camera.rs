/// Camera: which slice of the maze is on screen.
///
/// `(x, y)` is the maze cell drawn at the top-left of the map area and may
/// be negative when the maze is smaller than the view (it is centred).
/// `(view_w, view_h)` is how many cells fit, recomputed by the renderer
/// from the terminal size each frame.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Camera {
    pub x: i32,
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera::default()
    }

    /// Scroll only when the target leaves the inner dead zone
    /// (a fifth of the view on each side).
    pub fn follow(&mut self, target: (usize, usize), maze_w: usize, maze_h: usize) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = follow_axis(self.x, target.0, self.view_w, maze_w);
        self.y = follow_axis(self.y, target.1, self.view_h, maze_h);
    }

    /// Snap so the target sits in the middle. Used on level load and restart.
    pub fn center_on(&mut self, target: (usize, usize), maze_w: usize, maze_h: usize) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = center_axis(target.0, self.view_w, maze_w);
        self.y = center_axis(target.1, self.view_h, maze_h);
    }

    /// Maze cell to view cell, or None when off screen.
    pub fn world_to_view(&self, wx: usize, wy: usize) -> Option<(usize, usize)> {
        let vx = wx as i32 - self.x;
        let vy = wy as i32 - self.y;
        let inside = vx >= 0 && vy >= 0 && (vx as usize) < self.view_w && (vy as usize) < self.view_h;
        inside.then(|| (vx as usize, vy as usize))
    }

    /// View cell to maze cell; None for the void around a small maze.
    pub fn view_to_world(&self, vx: usize, vy: usize, maze_w: usize, maze_h: usize) -> Option<(usize, usize)> {
        let wx = vx as i32 + self.x;
        let wy = vy as i32 + self.y;
        let inside = wx >= 0 && wy >= 0 && (wx as usize) < maze_w && (wy as usize) < maze_h;
        inside.then(|| (wx as usize, wy as usize))
    }
}

// ── Per-axis helpers ──

fn centred_offset(view: usize, maze: usize) -> i32 {
    -((view as i32 - maze as i32) / 2)
}

fn clamp_offset(offset: i32, view: usize, maze: usize) -> i32 {
    offset.max(0).min((maze as i32 - view as i32).max(0))
}

fn follow_axis(offset: i32, target: usize, view: usize, maze: usize) -> i32 {
    if maze <= view {
        return centred_offset(view, maze);
    }
    let margin = view as i32 / 5;
    let t = target as i32;
    let low = offset + margin;
    let high = offset + view as i32 - margin - 1;
    let moved = if t < low {
        t - margin
    } else if t > high {
        t - view as i32 + margin + 1
    } else {
        offset
    };
    clamp_offset(moved, view, maze)
}

fn center_axis(target: usize, view: usize, maze: usize) -> i32 {
    if maze <= view {
        return centred_offset(view, maze);
    }
    clamp_offset(target as i32 - view as i32 / 2, view, maze)
}
