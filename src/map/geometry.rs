use crate::braille::BrailleCanvas;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a circle outline (used to halo the focused pin)
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 <= radius * radius && d2 > (radius - 1) * (radius - 1) {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        assert!(!canvas.is_blank());
        // Every cell along the top row should have its upper dots set
        for cx in 0..5 {
            assert!(canvas.cell_char(cx, 0).is_some());
        }
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert!(canvas.cell_char(0, 0).is_some());
        assert!(canvas.cell_char(0, 1).is_some());
    }

    #[test]
    fn test_circle_is_hollow() {
        let mut canvas = BrailleCanvas::new(4, 2);
        draw_circle(&mut canvas, 4, 4, 3);
        assert!(!canvas.is_blank());
        // Center pixel stays clear
        let mut center_only = BrailleCanvas::new(4, 2);
        center_only.set_pixel(4, 4);
        assert_ne!(canvas.to_text(), center_only.to_text());
    }
}
