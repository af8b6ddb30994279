/// Horizontal extent of the canvas the slider is drawn on, in client pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub left: f64,
    pub width: f64,
}

/// Mouse and touch pointers collapse to a client x coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Mouse { client_x: f64 },
    /// Touch points in contact order; only the first one drives the slider.
    Touch { touches: Vec<f64> },
}

impl PointerEvent {
    pub fn client_x(&self) -> Option<f64> {
        match self {
            Self::Mouse { client_x } => Some(*client_x),
            Self::Touch { touches } => touches.first().copied(),
        }
    }
}

pub const CENTER: f64 = 50.0;

/// Before/after divider over the preview. `fraction` is the percentage of the
/// canvas width showing the original photo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareSlider {
    visible: bool,
    fraction: f64,
    dragging: bool,
}

impl Default for CompareSlider {
    fn default() -> Self {
        Self {
            visible: false,
            fraction: CENTER,
            dragging: false,
        }
    }
}

impl CompareSlider {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Turning compare on always re-centres the divider.
    pub fn show(&mut self) {
        self.visible = true;
        self.fraction = CENTER;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.dragging = false;
    }

    pub fn toggle(&mut self) {
        if self.visible {
            self.hide();
        } else {
            self.show();
        }
    }

    /// Returns whether a drag started; the handle only exists while visible.
    pub fn press(&mut self) -> bool {
        if self.visible {
            self.dragging = true;
        }
        self.dragging
    }

    pub fn pointer_move(&mut self, event: &PointerEvent, canvas: CanvasRect) {
        if !self.dragging || canvas.width <= 0.0 || !canvas.width.is_finite() {
            return;
        }
        let Some(client_x) = event.client_x().filter(|x| x.is_finite()) else {
            return;
        };
        let x = (client_x - canvas.left).clamp(0.0, canvas.width);
        self.fraction = x / canvas.width * 100.0;
    }

    pub fn release(&mut self) {
        self.dragging = false;
    }

    /// Right inset (percent) of the clip applied to the original-photo layer.
    pub fn clip_inset_right(&self) -> f64 {
        100.0 - self.fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: CanvasRect = CanvasRect {
        left: 40.0,
        width: 400.0,
    };

    fn mouse(client_x: f64) -> PointerEvent {
        PointerEvent::Mouse { client_x }
    }

    #[test]
    fn show_recentres_and_hide_stops_dragging() {
        let mut slider = CompareSlider::default();
        slider.show();
        slider.press();
        slider.pointer_move(&mouse(140.0), CANVAS);
        assert_eq!(slider.fraction(), 25.0);

        slider.hide();
        assert!(!slider.is_dragging());
        slider.toggle();
        assert!(slider.is_visible());
        assert_eq!(slider.fraction(), CENTER);
    }

    #[test]
    fn press_requires_visible_slider() {
        let mut slider = CompareSlider::default();
        assert!(!slider.press());
        slider.pointer_move(&mouse(100.0), CANVAS);
        assert_eq!(slider.fraction(), CENTER);
    }

    #[test]
    fn fraction_is_clamped_to_the_canvas() {
        let mut slider = CompareSlider::default();
        slider.show();
        slider.press();
        for (x, expected) in [(240.0, 50.0), (-500.0, 0.0), (9_000.0, 100.0), (440.0, 100.0)] {
            slider.pointer_move(&mouse(x), CANVAS);
            assert_eq!(slider.fraction(), expected, "x = {x}");
            assert!((0.0..=100.0).contains(&slider.fraction()));
        }
        assert_eq!(slider.clip_inset_right(), 0.0);
    }

    #[test]
    fn release_ends_drag_wherever_it_happens() {
        let mut slider = CompareSlider::default();
        slider.show();
        slider.press();
        slider.pointer_move(&mouse(340.0), CANVAS);
        slider.release();
        slider.pointer_move(&mouse(40.0), CANVAS);
        assert_eq!(slider.fraction(), 75.0);
        assert_eq!(slider.clip_inset_right(), 25.0);
    }

    #[test]
    fn touch_uses_first_point_and_zero_width_is_ignored() {
        let mut slider = CompareSlider::default();
        slider.show();
        slider.press();
        slider.pointer_move(
            &PointerEvent::Touch {
                touches: vec![80.0, 400.0],
            },
            CANVAS,
        );
        assert_eq!(slider.fraction(), 10.0);

        slider.pointer_move(&PointerEvent::Touch { touches: Vec::new() }, CANVAS);
        slider.pointer_move(
            &mouse(200.0),
            CanvasRect {
                left: 0.0,
                width: 0.0,
            },
        );
        assert_eq!(slider.fraction(), 10.0);
    }
}
