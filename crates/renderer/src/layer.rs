use model::SharedBoard;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CLEAR_COLOR;
use crate::error::RenderError;
use crate::target::RenderTarget;

/// User-facing knobs of one layer; persisted by the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOptions {
    pub name: String,
    pub enabled: bool,
    pub opacity: f32,
}

impl LayerOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            opacity: 1.0,
        }
    }

    fn is_visible(&self) -> bool {
        self.enabled && self.opacity > 0.0
    }
}

/// Read-only view of app state for one frame.
pub struct FrameContext<'a> {
    pub board: &'a SharedBoard,
    /// Board-to-clip transform; `None` until the view is fully known, in
    /// which case layers draw nothing.
    pub clip_matrix: Option<[f32; 16]>,
    /// Device pixels per board pixel.
    pub scale: f32,
    /// Board pixel under the pointer.
    pub hover: Option<(u32, u32)>,
    /// Packed color of the selected palette entry.
    pub selected_color: Option<u32>,
    /// False on devices without a hovering pointer.
    pub hover_capable: bool,
}

pub trait Layer {
    fn draw(&mut self, target: &mut dyn RenderTarget, frame: &FrameContext<'_>, opacity: f32);

    /// Releases every GPU object the layer created.
    fn destroy(&mut self, target: &mut dyn RenderTarget);
}

struct LayerEntry {
    options: LayerOptions,
    // None while only saved options are known for this name
    layer: Option<Box<dyn Layer>>,
}

/// Ordered set of named layers.
#[derive(Default)]
pub struct LayerStack {
    entries: Vec<LayerEntry>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `layer` with `defaults`, or attaches it to options merged
    /// earlier under the same name.
    pub fn register(
        &mut self,
        defaults: LayerOptions,
        layer: Box<dyn Layer>,
    ) -> Result<(), RenderError> {
        match self.entry_mut(&defaults.name) {
            Some(entry) if entry.layer.is_some() => {
                warn!(layer = %defaults.name, "layer already registered");
                Err(RenderError::DuplicateLayer(defaults.name))
            }
            Some(entry) => {
                debug!(layer = %defaults.name, "layer attached to saved options");
                entry.layer = Some(layer);
                Ok(())
            }
            None => {
                debug!(layer = %defaults.name, "layer registered");
                self.entries.push(LayerEntry {
                    options: defaults,
                    layer: Some(layer),
                });
                Ok(())
            }
        }
    }

    /// Removes the layer and its options; returns whether it existed.
    pub fn unregister(&mut self, name: &str, target: &mut dyn RenderTarget) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.options.name == name) else {
            return false;
        };
        let mut entry = self.entries.remove(index);
        if let Some(layer) = entry.layer.as_mut() {
            layer.destroy(target);
        }
        true
    }

    pub fn options(&self) -> Vec<LayerOptions> {
        self.entries
            .iter()
            .map(|entry| entry.options.clone())
            .collect()
    }

    pub fn layer_options(&self, name: &str) -> Option<&LayerOptions> {
        self.entries
            .iter()
            .find(|entry| entry.options.name == name)
            .map(|entry| &entry.options)
    }

    /// Applies saved options over the current ones. Unknown names are kept
    /// so a layer registered later picks them up.
    pub fn merge_options(&mut self, saved: &[LayerOptions]) {
        for options in saved {
            match self.entry_mut(&options.name) {
                Some(entry) => {
                    entry.options.enabled = options.enabled;
                    entry.options.opacity = options.opacity.clamp(0.0, 1.0);
                }
                None => self.entries.push(LayerEntry {
                    options: LayerOptions {
                        opacity: options.opacity.clamp(0.0, 1.0),
                        ..options.clone()
                    },
                    layer: None,
                }),
            }
        }
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entry_mut(name) {
            Some(entry) => {
                entry.options.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_opacity(&mut self, name: &str, opacity: f32) -> bool {
        match self.entry_mut(name) {
            Some(entry) => {
                entry.options.opacity = opacity.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Clears the target and draws every visible layer in registration order.
    pub fn render(
        &mut self,
        target: &mut dyn RenderTarget,
        frame: &FrameContext<'_>,
    ) -> Result<(), RenderError> {
        target.begin_frame(CLEAR_COLOR)?;
        for entry in &mut self.entries {
            if !entry.options.is_visible() {
                continue;
            }
            if let Some(layer) = entry.layer.as_mut() {
                layer.draw(target, frame, entry.options.opacity);
            }
        }
        target.end_frame();
        Ok(())
    }

    /// Destroys every layer's GPU objects, keeping names and options.
    pub fn release_gpu(&mut self, target: &mut dyn RenderTarget) {
        for layer in self.entries.iter_mut().filter_map(|entry| entry.layer.as_mut()) {
            layer.destroy(target);
        }
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut LayerEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.options.name == name)
    }
}
