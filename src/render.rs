use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context as _, anyhow};
use streamdeck_lib::Context;
use streamdeck_render::{Canvas, FontHandle, FontRegistry, TextOptions, WrapOptions, wrap_text};
use tracing::{info, warn};

/// Font shipped inside the `.sdPlugin` bundle, next to the plugin binary.
const FONT_FILE: &str = "fonts/UAV-OSD-Sans-Mono.ttf";
// Leave a small margin inside the 144px key.
const MAX_TEXT_WIDTH: f32 = 136.0;
const FONT_SIZES: [f32; 5] = [56.0, 44.0, 36.0, 28.0, 20.0];

static FONT: OnceLock<Option<FontHandle>> = OnceLock::new();

/// Load the key font. Called once at startup; a missing font is logged and
/// keys are then left without an image.
pub fn load_font() -> bool {
    font().is_some()
}

fn font() -> Option<&'static FontHandle> {
    FONT.get_or_init(|| match read_font() {
        Ok(font) => Some(font),
        Err(err) => {
            warn!("key font unavailable, images disabled: {err:#}");
            None
        }
    })
    .as_ref()
}

fn font_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("locating plugin binary")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("plugin binary has no parent directory"))?;
    Ok(dir.join(FONT_FILE))
}

fn read_font() -> anyhow::Result<FontHandle> {
    let path = font_path()?;
    let bytes =
        std::fs::read(&path).with_context(|| format!("reading font {}", path.display()))?;
    // Loaded once per process and kept for its lifetime.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());

    let mut reg = FontRegistry::new();
    let font = reg
        .load_bytes("mono", bytes)
        .map_err(|err| anyhow!("loading font {}: {err:?}", path.display()))?;
    info!(path = %path.display(), "key font loaded");
    Ok(font)
}

/// Render an integer value onto a Stream Deck button (144×144 PNG).
///
/// The font size scales down automatically for long numbers so they always fit.
pub fn render_number(cx: &Context, ctx_id: &str, value: i64) {
    render_centered_text(cx, ctx_id, &value.to_string());
}

/// Largest size whose single-line layout fits, else the smallest size.
fn choose_size(mut fits: impl FnMut(f32) -> bool) -> f32 {
    FONT_SIZES
        .iter()
        .copied()
        .find(|&size| fits(size))
        .unwrap_or(FONT_SIZES[FONT_SIZES.len() - 1])
}

fn render_centered_text(cx: &Context, ctx_id: &str, text: &str) {
    let Some(font) = font() else {
        return;
    };
    let opts = WrapOptions {
        max_width: MAX_TEXT_WIDTH,
        max_lines: 1,
    };

    let size = choose_size(|size| {
        let lines = wrap_text(font, size, text, &opts);
        lines.len() == 1 && lines[0].width_px <= MAX_TEXT_WIDTH
    });
    let lines = wrap_text(font, size, text, &opts);

    let mut canvas = Canvas::key_icon();
    if !lines.is_empty() {
        canvas
            .draw_text(&lines, &TextOptions::new(font.clone(), size))
            .ok();
    }

    if let Ok(data_url) = canvas.finish().to_data_url() {
        cx.sd().set_image(ctx_id, Some(data_url), None, None);
    }
}
