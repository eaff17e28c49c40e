use crate::layer::{Layer, LayerResponse, PointerEvent, Popup, Style};
use std::collections::HashMap;
use tracing::debug;

/// What is currently on the map: attached layers in draw order, the open
/// popup, and per-feature style overrides from hover handling.
#[derive(Debug, Default, Clone)]
pub struct MapView {
    attached: Vec<String>,
    popup: Option<Popup>,
    feature_styles: HashMap<(String, usize), Style>,
}

impl MapView {
    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    pub fn is_attached(&self, code: &str) -> bool {
        self.attached.iter().any(|c| c == code)
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn feature_style(&self, code: &str, feature: usize) -> Option<&Style> {
        self.feature_styles.get(&(code.to_string(), feature))
    }

    pub fn attach(&mut self, code: &str) {
        if !self.is_attached(code) {
            debug!(layer = code, "Attaching layer");
            self.attached.push(code.to_string());
        }
    }

    /// Removes a layer along with any popup and style state bound to it.
    pub fn detach(&mut self, code: &str) {
        debug!(layer = code, "Detaching layer");
        self.attached.retain(|c| c != code);
        if self.popup.as_ref().is_some_and(|p| p.layer == code) {
            self.popup = None;
        }
        self.feature_styles.retain(|(layer, _), _| layer != code);
    }

    /// A click that reached the map background closes all popups.
    pub fn click_background(&mut self) {
        self.popup = None;
    }

    /// Routes a pointer event on a feature to its layer, then lets clicks the
    /// layer did not stop reach the map.
    pub fn dispatch(&mut self, layer: &Layer, feature: usize, event: &PointerEvent) {
        if !self.is_attached(layer.code()) {
            return;
        }

        let handled = layer.handle(feature, event);
        let propagate = handled.as_ref().map_or(true, |h| !h.stop_propagation);

        if let Some(handled) = handled {
            match handled.response {
                LayerResponse::OpenPopup(popup) => self.popup = Some(popup),
                LayerResponse::SetStyle { feature, style } => {
                    self.feature_styles
                        .insert((layer.code().to_string(), feature), style);
                }
            }
        }

        if propagate && matches!(event, PointerEvent::Click { .. }) {
            self.click_background();
        }
    }
}
