//! Canvas2D painter.
//!
//! Walks the figure tree in paint order (primary layer, then handles, then
//! feedback) and draws each figure at its absolute, already-scrolled bounds.

use dg_render::{Anchor, Figure, FigureKind, FigureTree};
use kurbo::Rect;
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

/// Theme-dependent colors for the canvas painter.
pub struct CanvasTheme {
    pub bg: &'static str,
    pub shape_fill: &'static str,
    pub shape_stroke: &'static str,
    pub group_fill: &'static str,
    pub label: &'static str,
    pub accent: &'static str,
    pub handle_fill: &'static str,
}

impl CanvasTheme {
    pub fn light() -> Self {
        Self {
            bg: "#F5F5F7",
            shape_fill: "#FFFFFF",
            shape_stroke: "#86868B",
            group_fill: "rgba(142, 142, 147, 0.06)",
            label: "#1C1C1E",
            accent: "#0A84FF",
            handle_fill: "#FFFFFF",
        }
    }

    pub fn dark() -> Self {
        Self {
            bg: "#1C1C1E",
            shape_fill: "#2C2C2E",
            shape_stroke: "#636366",
            group_fill: "rgba(99, 99, 102, 0.08)",
            label: "#F5F5F7",
            accent: "#0A84FF",
            handle_fill: "#1C1C1E",
        }
    }
}

/// Repaint the whole canvas from the figure tree.
pub fn render_figures(ctx: &CanvasRenderingContext2d, figures: &FigureTree, width: f64, height: f64, theme: &CanvasTheme) {
    ctx.set_fill_style_str(theme.bg);
    ctx.fill_rect(0.0, 0.0, width, height);

    for (id, bounds) in figures.paint_list() {
        let Some(fig) = figures.get(id) else {
            continue;
        };
        // Anchored figures follow their owner even before the next flush.
        let bounds = if fig.anchor.is_some() { figures.resolved_bounds(id) } else { bounds };
        draw_figure(ctx, fig, bounds, theme);
    }
}

fn draw_figure(ctx: &CanvasRenderingContext2d, fig: &Figure, b: Rect, theme: &CanvasTheme) {
    match fig.kind {
        FigureKind::Layer => {}
        FigureKind::Rect => {
            draw_rect(ctx, b, fig.emphasized, theme);
            draw_label(ctx, b, &fig.label, theme);
        }
        FigureKind::Ellipse => {
            draw_ellipse(ctx, b, fig.emphasized, theme);
            draw_label(ctx, b, &fig.label, theme);
        }
        FigureKind::Group => draw_group(ctx, b, fig, theme),
        FigureKind::Handle => draw_handle(ctx, b, fig, theme),
        FigureKind::Ghost => draw_dashed(ctx, b, theme.shape_stroke, "rgba(10, 132, 255, 0.10)"),
        FigureKind::Marquee => draw_dashed(ctx, b, theme.accent, "rgba(10, 132, 255, 0.08)"),
        FigureKind::Highlight => draw_highlight(ctx, b, fig.emphasized, theme),
    }
}

fn draw_rect(ctx: &CanvasRenderingContext2d, b: Rect, selected: bool, theme: &CanvasTheme) {
    ctx.set_fill_style_str(theme.shape_fill);
    ctx.fill_rect(b.x0, b.y0, b.width(), b.height());
    ctx.set_stroke_style_str(if selected { theme.accent } else { theme.shape_stroke });
    ctx.set_line_width(if selected { 2.0 } else { 1.0 });
    ctx.stroke_rect(b.x0, b.y0, b.width(), b.height());
}

fn draw_ellipse(ctx: &CanvasRenderingContext2d, b: Rect, selected: bool, theme: &CanvasTheme) {
    let c = b.center();
    let (rx, ry) = (b.width() / 2.0, b.height() / 2.0);
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }
    ctx.begin_path();
    let _ = ctx.ellipse(c.x, c.y, rx, ry, 0.0, 0.0, std::f64::consts::TAU);
    ctx.set_fill_style_str(theme.shape_fill);
    ctx.fill();
    ctx.set_stroke_style_str(if selected { theme.accent } else { theme.shape_stroke });
    ctx.set_line_width(if selected { 2.0 } else { 1.0 });
    ctx.stroke();
}

fn draw_group(ctx: &CanvasRenderingContext2d, b: Rect, fig: &Figure, theme: &CanvasTheme) {
    ctx.set_fill_style_str(theme.group_fill);
    ctx.fill_rect(b.x0, b.y0, b.width(), b.height());
    ctx.set_stroke_style_str(if fig.emphasized { theme.accent } else { theme.shape_stroke });
    ctx.set_line_width(1.0);
    ctx.stroke_rect(b.x0, b.y0, b.width(), b.height());
    if !fig.label.is_empty() {
        ctx.set_font("600 11px Inter, system-ui, sans-serif");
        ctx.set_fill_style_str(theme.label);
        ctx.set_text_align("left");
        ctx.set_text_baseline("top");
        let _ = ctx.fill_text(&fig.label, b.x0 + 6.0, b.y0 + 4.0);
    }
}

fn draw_label(ctx: &CanvasRenderingContext2d, b: Rect, label: &str, theme: &CanvasTheme) {
    if label.is_empty() {
        return;
    }
    let c = b.center();
    ctx.set_font("13px Inter, system-ui, sans-serif");
    ctx.set_fill_style_str(theme.label);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    let _ = ctx.fill_text(label, c.x, c.y);
}

/// Knobs are filled squares; the move outline is a thin frame.
fn draw_handle(ctx: &CanvasRenderingContext2d, b: Rect, fig: &Figure, theme: &CanvasTheme) {
    ctx.set_stroke_style_str(theme.accent);
    ctx.set_line_width(1.0);
    if matches!(fig.anchor, Some(Anchor::Knob { .. })) {
        ctx.set_fill_style_str(if fig.emphasized { theme.accent } else { theme.handle_fill });
        ctx.fill_rect(b.x0, b.y0, b.width(), b.height());
    }
    ctx.stroke_rect(b.x0, b.y0, b.width(), b.height());
}

fn draw_highlight(ctx: &CanvasRenderingContext2d, b: Rect, strong: bool, theme: &CanvasTheme) {
    ctx.save();
    ctx.set_stroke_style_str(theme.accent);
    ctx.set_line_width(if strong { 2.0 } else { 1.0 });
    ctx.set_global_alpha(if strong { 1.0 } else { 0.6 });
    ctx.stroke_rect(b.x0, b.y0, b.width(), b.height());
    ctx.restore();
}

fn draw_dashed(ctx: &CanvasRenderingContext2d, b: Rect, stroke: &str, fill: &str) {
    ctx.save();
    ctx.set_fill_style_str(fill);
    ctx.fill_rect(b.x0, b.y0, b.width(), b.height());
    ctx.set_stroke_style_str(stroke);
    ctx.set_line_width(1.0);
    let _ = ctx.set_line_dash(&js_sys::Array::of2(&JsValue::from_f64(4.0), &JsValue::from_f64(4.0)));
    ctx.stroke_rect(b.x0, b.y0, b.width(), b.height());
    ctx.restore();
}
