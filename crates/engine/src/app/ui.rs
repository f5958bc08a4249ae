use super::scene::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Display {
    #[default]
    None,
    Flex,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Full-bleed panel that swallows taps anywhere inside its rect.
    Overlay,
    Button,
}

/// Rect in normalized viewport units, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl UiRect {
    pub const FULL: UiRect = UiRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiElement {
    pub id: ElementId,
    pub dom_id: String,
    pub kind: ElementKind,
    pub rect: UiRect,
    pub text: Vec<String>,
    pub display: Display,
}

impl UiElement {
    pub fn is_shown(&self) -> bool {
        self.display != Display::None
    }
}

/// Raw RGBA video frame used as the passthrough background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Document-level overlay: elements, the camera background, a blocking alert,
/// and an optional full replacement of the whole document.
#[derive(Debug, Default)]
pub struct UiLayer {
    elements: Vec<UiElement>,
    next_id: u32,
    video_background: Option<VideoFrame>,
    alert: Option<String>,
    replaced_document: Option<String>,
    mutation_count: u64,
}

impl UiLayer {
    pub fn add_element(
        &mut self,
        dom_id: impl Into<String>,
        kind: ElementKind,
        rect: UiRect,
        text: Vec<String>,
    ) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.elements.push(UiElement {
            id,
            dom_id: dom_id.into(),
            kind,
            rect,
            text,
            display: Display::None,
        });
        id
    }

    /// Lookup by document identifier, e.g. `"clear-button"`.
    pub fn element_by_dom_id(&self, dom_id: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|element| element.dom_id == dom_id)
            .map(|element| element.id)
    }

    pub fn element(&self, id: ElementId) -> Option<&UiElement> {
        self.elements.iter().find(|element| element.id == id)
    }

    pub fn elements(&self) -> &[UiElement] {
        &self.elements
    }

    pub fn display(&self, id: ElementId) -> Option<Display> {
        self.element(id).map(|element| element.display)
    }

    pub fn is_shown(&self, id: ElementId) -> bool {
        self.element(id).is_some_and(UiElement::is_shown)
    }

    pub fn set_display(&mut self, id: ElementId, display: Display) {
        if let Some(element) = self.elements.iter_mut().find(|element| element.id == id) {
            if element.display != display {
                element.display = display;
                self.mutation_count = self.mutation_count.saturating_add(1);
            }
        }
    }

    /// Topmost shown element under a normalized point. Later elements stack above
    /// earlier ones, buttons above overlays.
    pub fn hit_test(&self, point: Vec2) -> Option<ElementId> {
        let hit = |kind: ElementKind| {
            self.elements
                .iter()
                .rev()
                .filter(|element| element.kind == kind && element.is_shown())
                .find(|element| element.rect.contains(point))
                .map(|element| element.id)
        };
        hit(ElementKind::Button).or_else(|| hit(ElementKind::Overlay))
    }

    pub fn set_video_background(&mut self, frame: Option<VideoFrame>) {
        self.video_background = frame;
        self.mutation_count = self.mutation_count.saturating_add(1);
    }

    pub fn video_background(&self) -> Option<&VideoFrame> {
        self.video_background.as_ref()
    }

    pub fn show_alert(&mut self, message: impl Into<String>) {
        self.alert = Some(message.into());
        self.mutation_count = self.mutation_count.saturating_add(1);
    }

    pub fn dismiss_alert(&mut self) -> bool {
        let was_open = self.alert.take().is_some();
        if was_open {
            self.mutation_count = self.mutation_count.saturating_add(1);
        }
        was_open
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Replaces the whole document with an inert message. Elements stop
    /// rendering and hit testing.
    pub fn replace_document(&mut self, message: impl Into<String>) {
        for element in &mut self.elements {
            element.display = Display::None;
        }
        self.replaced_document = Some(message.into());
        self.mutation_count = self.mutation_count.saturating_add(1);
    }

    pub fn replaced_document(&self) -> Option<&str> {
        self.replaced_document.as_deref()
    }

    /// Monotonic count of visible changes; lets callers assert a no-op.
    pub fn mutation_count(&self) -> u64 {
        self.mutation_count
    }
}
